#![allow(dead_code)]

use std::io::{Cursor, Write};

use docxide_epub::docx::MemoryArchive;
use docxide_epub::xhtml::Section;
use docxide_epub::{ConvertOptions, EbookData};
use zip::CompressionMethod;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

const NAMESPACES: &str = concat!(
    r#"xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main" "#,
    r#"xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" "#,
    r#"xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" "#,
    r#"xmlns:wp="http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing" "#,
    r#"xmlns:mc="http://schemas.openxmlformats.org/markup-compatibility/2006" "#,
    r#"xmlns:v="urn:schemas-microsoft-com:vml""#,
);

const REL_BASE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

/// Builds a DOCX package in memory from WordprocessingML snippets.
#[derive(Default, Clone)]
pub struct DocxBuilder {
    body: String,
    styles: Option<String>,
    footnotes: Option<String>,
    document_rels: Vec<(String, String, String)>,
    footnote_rels: Vec<(String, String)>,
    media: Vec<(String, Vec<u8>)>,
}

impl DocxBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends raw body XML (paragraphs, tables).
    pub fn body(mut self, xml: &str) -> Self {
        self.body.push_str(xml);
        self
    }

    /// Adds `w:style` definitions; see [`paragraph_style`] and [`character_style`].
    pub fn styles(mut self, xml: &str) -> Self {
        self.styles.get_or_insert_with(String::new).push_str(xml);
        self
    }

    /// Adds a normal footnote with the given id and body XML.
    pub fn footnote(mut self, id: &str, xml: &str) -> Self {
        let notes = self.footnotes.get_or_insert_with(String::new);
        notes.push_str(&format!(r#"<w:footnote w:id="{}">{}</w:footnote>"#, id, xml));
        self
    }

    /// Registers `word/media/<name>` under a document relationship id.
    pub fn image(mut self, rel_id: &str, name: &str, data: &[u8]) -> Self {
        self.document_rels.push((
            rel_id.to_string(),
            format!("{}/image", REL_BASE),
            format!("media/{}", name),
        ));
        self.media.push((name.to_string(), data.to_vec()));
        self
    }

    /// An image relationship whose target is not in the package.
    pub fn dangling_image(mut self, rel_id: &str, name: &str) -> Self {
        self.document_rels.push((
            rel_id.to_string(),
            format!("{}/image", REL_BASE),
            format!("media/{}", name),
        ));
        self
    }

    /// Registers `word/media/<name>` under a footnotes-part relationship id.
    pub fn footnote_image(mut self, rel_id: &str, name: &str, data: &[u8]) -> Self {
        self.footnote_rels
            .push((rel_id.to_string(), format!("media/{}", name)));
        self.media.push((name.to_string(), data.to_vec()));
        self
    }

    fn entries(&self) -> Vec<(String, Vec<u8>)> {
        let mut entries = Vec::new();
        entries.push((
            "_rels/.rels".to_string(),
            format!(
                r#"<?xml version="1.0" encoding="UTF-8"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId1" Type="{}/officeDocument" Target="word/document.xml"/>
</Relationships>"#,
                REL_BASE
            )
            .into_bytes(),
        ));

        let mut rels = self.document_rels.clone();
        if self.styles.is_some() {
            rels.push((
                "rIdStyles".into(),
                format!("{}/styles", REL_BASE),
                "styles.xml".into(),
            ));
        }
        if self.footnotes.is_some() {
            rels.push((
                "rIdNotes".into(),
                format!("{}/footnotes", REL_BASE),
                "footnotes.xml".into(),
            ));
        }
        entries.push(("word/_rels/document.xml.rels".into(), relationships(&rels)));

        entries.push((
            "word/document.xml".into(),
            format!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document {}><w:body>{}<w:sectPr/></w:body></w:document>"#,
                NAMESPACES, self.body
            )
            .into_bytes(),
        ));

        if let Some(styles) = &self.styles {
            entries.push((
                "word/styles.xml".into(),
                format!(r#"<w:styles {}>{}</w:styles>"#, NAMESPACES, styles).into_bytes(),
            ));
        }
        if let Some(notes) = &self.footnotes {
            entries.push((
                "word/footnotes.xml".into(),
                format!(
                    r#"<w:footnotes {}><w:footnote w:type="separator" w:id="-1"><w:p/></w:footnote><w:footnote w:type="continuationSeparator" w:id="0"><w:p/></w:footnote>{}</w:footnotes>"#,
                    NAMESPACES, notes
                )
                .into_bytes(),
            ));
            if !self.footnote_rels.is_empty() {
                let rels: Vec<(String, String, String)> = self
                    .footnote_rels
                    .iter()
                    .map(|(id, target)| (id.clone(), format!("{}/image", REL_BASE), target.clone()))
                    .collect();
                entries.push(("word/_rels/footnotes.xml.rels".into(), relationships(&rels)));
            }
        }
        for (name, data) in &self.media {
            entries.push((format!("word/media/{}", name), data.clone()));
        }
        entries
    }

    /// Zipped DOCX bytes.
    pub fn build(&self) -> Vec<u8> {
        let mut buffer = Cursor::new(Vec::new());
        let mut zip = ZipWriter::new(&mut buffer);
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        for (name, data) in self.entries() {
            zip.start_file(name, options).unwrap();
            zip.write_all(&data).unwrap();
        }
        zip.finish().unwrap();
        buffer.into_inner()
    }

    pub fn archive(&self) -> MemoryArchive {
        let mut archive = MemoryArchive::new();
        for (name, data) in self.entries() {
            archive.insert(name, data);
        }
        archive
    }

    pub fn convert(&self) -> EbookData {
        self.convert_with(&ConvertOptions::default())
    }

    pub fn convert_with(&self, options: &ConvertOptions) -> EbookData {
        docxide_epub::convert_docx_bytes(&self.build(), options).expect("conversion failed")
    }
}

fn relationships(rels: &[(String, String, String)]) -> Vec<u8> {
    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    );
    for (id, rel_type, target) in rels {
        xml.push_str(&format!(
            r#"<Relationship Id="{}" Type="{}" Target="{}"/>"#,
            id, rel_type, target
        ));
    }
    xml.push_str("</Relationships>");
    xml.into_bytes()
}

pub fn paragraph_style(id: &str, name: &str) -> String {
    format!(
        r#"<w:style w:type="paragraph" w:styleId="{}"><w:name w:val="{}"/></w:style>"#,
        id, name
    )
}

pub fn character_style(id: &str, name: &str, rpr: &str) -> String {
    format!(
        r#"<w:style w:type="character" w:styleId="{}"><w:name w:val="{}"/><w:rPr>{}</w:rPr></w:style>"#,
        id, name, rpr
    )
}

/// Styles Heading1..Heading6 named "heading N".
pub fn heading_styles() -> String {
    (1..=6)
        .map(|n| paragraph_style(&format!("Heading{}", n), &format!("heading {}", n)))
        .collect()
}

pub fn p(text: &str) -> String {
    format!(r#"<w:p><w:r><w:t xml:space="preserve">{}</w:t></w:r></w:p>"#, text)
}

pub fn styled_p(style: &str, text: &str) -> String {
    format!(
        r#"<w:p><w:pPr><w:pStyle w:val="{}"/></w:pPr><w:r><w:t xml:space="preserve">{}</w:t></w:r></w:p>"#,
        style, text
    )
}

pub fn heading(level: usize, text: &str) -> String {
    styled_p(&format!("Heading{}", level), text)
}

pub fn empty_p() -> String {
    "<w:p/>".to_string()
}

pub fn list_item(ilvl: usize, text: &str) -> String {
    format!(
        r#"<w:p><w:pPr><w:numPr><w:ilvl w:val="{}"/><w:numId w:val="1"/></w:numPr></w:pPr><w:r><w:t>{}</w:t></w:r></w:p>"#,
        ilvl, text
    )
}

/// A run with raw `w:rPr` content.
pub fn run(rpr: &str, text: &str) -> String {
    format!(
        r#"<w:r><w:rPr>{}</w:rPr><w:t xml:space="preserve">{}</w:t></w:r>"#,
        rpr, text
    )
}

pub fn footnote_ref(id: &str) -> String {
    format!(
        r#"<w:r><w:rPr><w:vertAlign w:val="superscript"/></w:rPr><w:footnoteReference w:id="{}"/></w:r>"#,
        id
    )
}

pub fn page_break() -> String {
    r#"<w:p><w:r><w:br w:type="page"/></w:r></w:p>"#.to_string()
}

pub fn drawing(rel_id: &str) -> String {
    format!(
        r#"<w:r><w:drawing><wp:inline><a:graphic><a:graphicData><a:blip r:embed="{}"/></a:graphicData></a:graphic></wp:inline></w:drawing></w:r>"#,
        rel_id
    )
}

/// Inner markup of the serialized `<body>`.
pub fn body_of(section: &Section) -> String {
    let xhtml = section.to_xhtml().expect("section serializes");
    let start = xhtml.find("<body>\n").expect("body start") + "<body>\n".len();
    let end = xhtml.rfind("</body>").expect("body end");
    xhtml[start..end].to_string()
}

/// Parses XML that may carry a DOCTYPE.
pub fn parse_xml(text: &str) -> roxmltree::Document<'_> {
    let options = roxmltree::ParsingOptions {
        allow_dtd: true,
        ..roxmltree::ParsingOptions::default()
    };
    roxmltree::Document::parse_with_options(text, options).expect("well-formed XML")
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
