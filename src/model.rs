use crate::xhtml::Section;

/// Character formats carried over to XHTML. The declaration order is the
/// canonical opening order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Format {
    Bold,
    Italic,
    Underline,
    Superscript,
    Subscript,
}

impl Format {
    pub fn tag(self) -> &'static str {
        match self {
            Format::Bold => "strong",
            Format::Italic => "em",
            Format::Underline => "span",
            Format::Superscript => "sup",
            Format::Subscript => "sub",
        }
    }

    pub fn class(self) -> Option<&'static str> {
        match self {
            Format::Underline => Some("underline"),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct ConvertOptions {
    /// Drop empty paragraphs instead of turning them into spacing classes
    /// on the next paragraph with text.
    pub ignore_empty_paragraphs: bool,
}

/// Where a TOC entry points: a section file plus an optional fragment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Target {
    pub section: String,
    pub fragment: Option<String>,
}

impl Target {
    pub fn href(&self) -> String {
        match &self.fragment {
            Some(id) => format!("{}#{}", self.section, id),
            None => self.section.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TitleNode {
    pub title: String,
    pub target: Target,
    pub children: Vec<TitleNode>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FootnoteReference {
    pub source_id: String,
    pub number: u32,
    pub section: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Image {
    pub name: String,
    pub data: Vec<u8>,
}

/// Everything one conversion produces.
#[derive(Debug, Default)]
pub struct EbookData {
    pub sections: Vec<Section>,
    pub notes: Option<Section>,
    pub images: Vec<Image>,
    pub toc: Vec<TitleNode>,
}

impl EbookData {
    /// Stores an image; a second image with the same name replaces the first.
    pub fn add_image(&mut self, image: Image) {
        match self.images.iter_mut().find(|i| i.name == image.name) {
            Some(existing) => existing.data = image.data,
            None => self.images.push(image),
        }
    }

    pub fn image(&self, name: &str) -> Option<&Image> {
        self.images.iter().find(|i| i.name == name)
    }
}

/// Book metadata consumed by the EPUB packager.
#[derive(Clone, Debug, Default)]
pub struct BookMetadata {
    pub title: String,
    pub authors: Vec<String>,
    pub language: String,
    pub identifier: String,
    pub publisher: Option<String>,
    pub description: Option<String>,
    pub date: Option<String>,
    pub cover_image: Option<Image>,
    pub author_bio: Option<String>,
}
