//! EPUB 2 packaging: manifest, spine, OPF and NCX generation, and the
//! final ZIP container.

mod navigation;
mod pages;

use std::collections::HashSet;
use std::fmt::Write as _;
use std::io::{Seek, Write};

use zip::CompressionMethod;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use crate::error::Error;
use crate::model::{BookMetadata, EbookData};
use crate::xhtml::{Section, escape_attr, escape_text};

pub use navigation::{NavPoint, nav_depth, write_nav_points};
pub use pages::{AUTHOR_PAGE, AuthorPage, COVER_PAGE, CoverPage, TITLE_PAGE, TitlePage};

pub const STYLESHEET: &str = include_str!("style.css");

const CONTAINER_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>
"#;

const TEXT_DIR: &str = "Text";
const IMAGE_DIR: &str = "Images";
const STYLESHEET_PATH: &str = "Styles/style.css";

enum Source<'a> {
    Stylesheet,
    Cover,
    TitlePage,
    AuthorPage(&'a str),
    Section(&'a Section),
    Image(&'a [u8]),
}

struct ManifestItem<'a> {
    id: String,
    /// Relative to the OPF.
    href: String,
    media_type: &'static str,
    source: Source<'a>,
}

impl ManifestItem<'_> {
    fn in_spine(&self) -> bool {
        matches!(
            self.source,
            Source::Cover | Source::TitlePage | Source::AuthorPage(_) | Source::Section(_)
        )
    }
}

/// Lays out one book: every file, its manifest id, and the reading order.
pub struct Packager<'a> {
    book: &'a EbookData,
    metadata: &'a BookMetadata,
    items: Vec<ManifestItem<'a>>,
    /// File name and manifest id of the cover image.
    cover_image: Option<(String, String)>,
}

impl<'a> Packager<'a> {
    pub fn new(book: &'a EbookData, metadata: &'a BookMetadata) -> Self {
        let mut ids = HashSet::new();
        ids.insert("ncx".to_string());
        let mut items = Vec::new();
        let mut add = |name: &str, href: String, source: Source<'a>| -> String {
            let id = manifest_id(name, &mut ids);
            items.push(ManifestItem {
                id: id.clone(),
                media_type: media_type(&href),
                href,
                source,
            });
            id
        };

        add("style.css", STYLESHEET_PATH.to_string(), Source::Stylesheet);
        add(COVER_PAGE, text_href(COVER_PAGE), Source::Cover);
        add(TITLE_PAGE, text_href(TITLE_PAGE), Source::TitlePage);
        for section in &book.sections {
            add(section.name(), text_href(section.name()), Source::Section(section));
        }
        if let Some(bio) = metadata.author_bio.as_deref() {
            add(AUTHOR_PAGE, text_href(AUTHOR_PAGE), Source::AuthorPage(bio));
        }
        if let Some(notes) = &book.notes {
            add(notes.name(), text_href(notes.name()), Source::Section(notes));
        }

        let mut cover_image = None;
        if let Some(image) = &metadata.cover_image {
            // the cover must not overwrite a picture from the document
            let name = if book.image(&image.name).is_some() {
                format!("cover-{}", image.name)
            } else {
                image.name.clone()
            };
            let id = add(&name, image_href(&name), Source::Image(&image.data));
            cover_image = Some((name, id));
        }
        for image in &book.images {
            add(&image.name, image_href(&image.name), Source::Image(&image.data));
        }

        log::debug!(
            "Manifest: {} items, {} in spine",
            items.len() + 1,
            items.iter().filter(|i| i.in_spine()).count()
        );
        Packager {
            book,
            metadata,
            items,
            cover_image,
        }
    }

    /// Navigation tree: cover, title page, the document TOC, then the author
    /// page and notes when present.
    pub fn nav_points(&self) -> Vec<NavPoint> {
        let mut points = vec![
            NavPoint::new("Cover", text_href(COVER_PAGE)),
            NavPoint::new(self.title_label(), text_href(TITLE_PAGE)),
        ];
        points.extend(
            self.book
                .toc
                .iter()
                .map(|node| NavPoint::from_title(node, TEXT_DIR)),
        );
        if self.metadata.author_bio.is_some() {
            points.push(NavPoint::new("About the author", text_href(AUTHOR_PAGE)));
        }
        if let Some(notes) = &self.book.notes {
            points.push(NavPoint::new("Notes", text_href(notes.name())));
        }
        points
    }

    fn title_label(&self) -> &str {
        if self.metadata.title.is_empty() {
            "Title page"
        } else {
            &self.metadata.title
        }
    }

    pub fn content_opf(&self) -> String {
        let meta = self.metadata;
        let mut opf = String::new();
        opf.push_str(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" unique-identifier="BookId" version="2.0">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:opf="http://www.idpf.org/2007/opf">
"#,
        );
        let _ = writeln!(
            opf,
            "    <dc:identifier id=\"BookId\">{}</dc:identifier>",
            escape_text(&meta.identifier)
        );
        let _ = writeln!(opf, "    <dc:title>{}</dc:title>", escape_text(&meta.title));
        for author in &meta.authors {
            let _ = writeln!(
                opf,
                "    <dc:creator opf:role=\"aut\">{}</dc:creator>",
                escape_text(author)
            );
        }
        let _ = writeln!(
            opf,
            "    <dc:language>{}</dc:language>",
            escape_text(&meta.language)
        );
        if let Some(publisher) = &meta.publisher {
            let _ = writeln!(
                opf,
                "    <dc:publisher>{}</dc:publisher>",
                escape_text(publisher)
            );
        }
        if let Some(description) = &meta.description {
            let _ = writeln!(
                opf,
                "    <dc:description>{}</dc:description>",
                escape_text(description)
            );
        }
        if let Some(date) = &meta.date {
            let _ = writeln!(opf, "    <dc:date>{}</dc:date>", escape_text(date));
        }
        if let Some((_, id)) = &self.cover_image {
            let _ = writeln!(opf, "    <meta name=\"cover\" content=\"{}\"/>", escape_attr(id));
        }
        opf.push_str("  </metadata>\n");

        opf.push_str("  <manifest>\n");
        opf.push_str(
            "    <item id=\"ncx\" href=\"toc.ncx\" media-type=\"application/x-dtbncx+xml\"/>\n",
        );
        for item in &self.items {
            let _ = writeln!(
                opf,
                "    <item id=\"{}\" href=\"{}\" media-type=\"{}\"/>",
                escape_attr(&item.id),
                escape_attr(&item.href),
                item.media_type
            );
        }
        opf.push_str("  </manifest>\n");

        opf.push_str("  <spine toc=\"ncx\">\n");
        for item in self.items.iter().filter(|i| i.in_spine()) {
            let _ = writeln!(opf, "    <itemref idref=\"{}\"/>", escape_attr(&item.id));
        }
        opf.push_str("  </spine>\n");

        opf.push_str("  <guide>\n");
        let _ = writeln!(
            opf,
            "    <reference type=\"cover\" title=\"Cover\" href=\"{}\"/>",
            text_href(COVER_PAGE)
        );
        let _ = writeln!(
            opf,
            "    <reference type=\"title-page\" title=\"Title page\" href=\"{}\"/>",
            text_href(TITLE_PAGE)
        );
        if let Some(first) = self.book.sections.first() {
            let _ = writeln!(
                opf,
                "    <reference type=\"text\" title=\"Text\" href=\"{}\"/>",
                escape_attr(&text_href(first.name()))
            );
        }
        opf.push_str("  </guide>\n");
        opf.push_str("</package>\n");
        opf
    }

    pub fn toc_ncx(&self) -> String {
        let meta = self.metadata;
        let points = self.nav_points();
        let mut ncx = String::new();
        ncx.push_str(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE ncx PUBLIC "-//NISO//DTD ncx 2005-1//EN" "http://www.daisy.org/z3986/2005/ncx-2005-1.dtd">
<ncx xmlns="http://www.daisy.org/z3986/2005/ncx/" version="2005-1">
  <head>
"#,
        );
        let _ = writeln!(
            ncx,
            "    <meta name=\"dtb:uid\" content=\"{}\"/>",
            escape_attr(&meta.identifier)
        );
        let _ = writeln!(
            ncx,
            "    <meta name=\"dtb:depth\" content=\"{}\"/>",
            nav_depth(&points)
        );
        ncx.push_str("    <meta name=\"dtb:totalPageCount\" content=\"0\"/>\n");
        ncx.push_str("    <meta name=\"dtb:maxPageNumber\" content=\"0\"/>\n");
        ncx.push_str("  </head>\n");
        let _ = writeln!(
            ncx,
            "  <docTitle>\n    <text>{}</text>\n  </docTitle>",
            escape_text(&meta.title)
        );
        if !meta.authors.is_empty() {
            let _ = writeln!(
                ncx,
                "  <docAuthor>\n    <text>{}</text>\n  </docAuthor>",
                escape_text(&meta.authors.join(", "))
            );
        }
        ncx.push_str("  <navMap>\n");
        write_nav_points(&mut ncx, &points);
        ncx.push_str("  </navMap>\n</ncx>\n");
        ncx
    }

    fn render(&self, source: &Source<'_>) -> Result<Vec<u8>, Error> {
        let meta = self.metadata;
        let xhtml = match source {
            Source::Stylesheet => return Ok(STYLESHEET.as_bytes().to_vec()),
            Source::Image(data) => return Ok(data.to_vec()),
            Source::Cover => CoverPage {
                title: meta.title.clone(),
                image: self.cover_image.as_ref().map(|(name, _)| name.clone()),
            }
            .to_xhtml()?,
            Source::TitlePage => TitlePage {
                title: meta.title.clone(),
                authors: meta.authors.clone(),
                publisher: meta.publisher.clone(),
                date: meta.date.clone(),
            }
            .to_xhtml()?,
            Source::AuthorPage(bio) => AuthorPage {
                name: (meta.authors.len() == 1).then(|| meta.authors[0].clone()),
                biography: bio.to_string(),
            }
            .to_xhtml()?,
            Source::Section(section) => section.to_xhtml()?,
        };
        Ok(xhtml.into_bytes())
    }
}

/// Writes the complete EPUB container.
pub fn write_epub<W: Write + Seek>(
    book: &EbookData,
    metadata: &BookMetadata,
    writer: W,
) -> Result<(), Error> {
    let packager = Packager::new(book, metadata);
    let mut zip = ZipWriter::new(writer);
    let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    let deflated = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    // mimetype must be the first entry and uncompressed
    zip.start_file("mimetype", stored)?;
    zip.write_all(b"application/epub+zip")?;

    zip.start_file("META-INF/container.xml", deflated)?;
    zip.write_all(CONTAINER_XML.as_bytes())?;

    zip.start_file("OEBPS/content.opf", deflated)?;
    zip.write_all(packager.content_opf().as_bytes())?;

    zip.start_file("OEBPS/toc.ncx", deflated)?;
    zip.write_all(packager.toc_ncx().as_bytes())?;

    for item in &packager.items {
        let options = match item.source {
            Source::Image(_) => stored,
            _ => deflated,
        };
        zip.start_file(format!("OEBPS/{}", item.href), options)?;
        zip.write_all(&packager.render(&item.source)?)?;
    }

    zip.finish()?;
    log::debug!("Wrote {} package entries", packager.items.len() + 4);
    Ok(())
}

fn text_href(name: &str) -> String {
    format!("{}/{}", TEXT_DIR, name)
}

fn image_href(name: &str) -> String {
    format!("{}/{}", IMAGE_DIR, name)
}

/// Manifest id for a file name: an XML NCName, unique within the manifest.
fn manifest_id(name: &str, used: &mut HashSet<String>) -> String {
    let mut id: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if !id.starts_with(|c: char| c.is_ascii_alphabetic()) {
        id.insert(0, 'x');
    }
    let mut unique = id.clone();
    let mut n = 2;
    while used.contains(&unique) {
        unique = format!("{}-{}", id, n);
        n += 1;
    }
    used.insert(unique.clone());
    unique
}

fn media_type(path: &str) -> &'static str {
    let ext = path
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "xhtml" | "html" | "htm" => "application/xhtml+xml",
        "css" => "text/css",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "ncx" => "application/x-dtbncx+xml",
        _ => "application/octet-stream",
    }
}
