//! Boilerplate pages framing the converted text.

use crate::error::Error;
use crate::xhtml::Section;

pub const COVER_PAGE: &str = "cover.xhtml";
pub const TITLE_PAGE: &str = "title.xhtml";
pub const AUTHOR_PAGE: &str = "author.xhtml";

/// Cover page: the cover image when there is one, else the title in large type.
#[derive(Clone, Debug)]
pub struct CoverPage {
    pub title: String,
    /// File name of the cover image inside the Images directory.
    pub image: Option<String>,
}

impl CoverPage {
    pub fn to_xhtml(&self) -> Result<String, Error> {
        let mut page = Section::page(COVER_PAGE);
        page.set_title(&self.title);
        page.open_tag("div", &[("class", "cover")]);
        match &self.image {
            Some(name) => page.append_image(name),
            None => {
                page.open_tag("h1", &[("class", "cover-title")]);
                page.append_text(&self.title);
                page.close_tag("h1")?;
            }
        }
        page.close_tag("div")?;
        page.to_xhtml()
    }
}

#[derive(Clone, Debug)]
pub struct TitlePage {
    pub title: String,
    pub authors: Vec<String>,
    pub publisher: Option<String>,
    pub date: Option<String>,
}

impl TitlePage {
    pub fn to_xhtml(&self) -> Result<String, Error> {
        let mut page = Section::page(TITLE_PAGE);
        page.set_title(&self.title);
        page.open_tag("div", &[("class", "title-page")]);
        paragraph(&mut page, "book-title", &self.title)?;
        for author in &self.authors {
            paragraph(&mut page, "book-author", author)?;
        }
        if let Some(publisher) = &self.publisher {
            paragraph(&mut page, "book-publisher", publisher)?;
        }
        if let Some(date) = &self.date {
            paragraph(&mut page, "book-date", date)?;
        }
        page.close_tag("div")?;
        page.to_xhtml()
    }
}

/// "About the author" page; the biography is split into paragraphs at blank lines.
#[derive(Clone, Debug)]
pub struct AuthorPage {
    pub name: Option<String>,
    pub biography: String,
}

impl AuthorPage {
    pub fn to_xhtml(&self) -> Result<String, Error> {
        let mut page = Section::page(AUTHOR_PAGE);
        page.open_tag("div", &[("class", "author-page")]);
        page.open_tag("h2", &[]);
        page.append_text(self.name.as_deref().unwrap_or("About the author"));
        page.close_tag("h2")?;
        for text in self
            .biography
            .split("\n\n")
            .map(str::trim)
            .filter(|t| !t.is_empty())
        {
            page.open_tag("p", &[]);
            page.append_text(text);
            page.close_tag("p")?;
        }
        page.close_tag("div")?;
        page.to_xhtml()
    }
}

fn paragraph(page: &mut Section, class: &str, text: &str) -> Result<(), Error> {
    page.open_tag("p", &[("class", class)]);
    page.append_text(text);
    page.close_tag("p")
}
