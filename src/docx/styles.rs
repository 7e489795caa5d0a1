use std::collections::HashMap;

use crate::error::{Error, ReferenceKind};
use crate::model::Format;

use super::package::strip_bom;
use super::{WML_NS, is_wml, wml, wml_attr, wml_bool};

/// Deepest heading level rendered as a heading. Deeper "heading N" styles
/// are treated as ordinary paragraphs.
pub const MAX_HEADING_LEVEL: usize = 6;

/// Style names starting with this marker become XHTML classes.
const EPUB_MARKER: &str = "epub_";
/// Suffixes Word appends to the character half of a linked style.
const CHARACTER_SUFFIXES: &[&str] = &[" Char", " Car"];
/// "heading N" as written by English and Spanish Word.
const HEADING_PREFIXES: &[&str] = &["heading ", "Título "];

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StyleDefinition {
    pub id: String,
    pub name: String,
    /// Present only for styles carrying the epub marker.
    pub class_name: Option<String>,
    /// Bold/italic/underline from the style's own run properties.
    pub formats: Vec<Format>,
}

impl StyleDefinition {
    /// Raw "heading N" level, or `None` for non-headings and N > 6.
    pub fn heading_level(&self) -> Option<usize> {
        heading_number(&self.name).filter(|&n| n <= MAX_HEADING_LEVEL)
    }
}

/// Style id → definition, built once per conversion.
#[derive(Debug, Default)]
pub struct StyleResolver {
    styles: HashMap<String, StyleDefinition>,
}

impl StyleResolver {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn parse(xml_content: &str) -> Result<Self, Error> {
        let xml = roxmltree::Document::parse(strip_bom(xml_content))?;
        let mut styles = HashMap::new();

        for style_node in xml.root_element().children() {
            if !is_wml(style_node, "style") {
                continue;
            }
            if !matches!(
                style_node.attribute((WML_NS, "type")),
                Some("paragraph" | "character")
            ) {
                continue;
            }
            let Some(style_id) = style_node.attribute((WML_NS, "styleId")) else {
                continue;
            };
            let name = wml_attr(style_node, "name").unwrap_or(style_id).to_string();

            let formats = wml(style_node, "rPr")
                .map(|rpr| {
                    let mut formats = Vec::new();
                    if wml_bool(rpr, "b") == Some(true) {
                        formats.push(Format::Bold);
                    }
                    if wml_bool(rpr, "i") == Some(true) {
                        formats.push(Format::Italic);
                    }
                    if underline(rpr) == Some(true) {
                        formats.push(Format::Underline);
                    }
                    formats
                })
                .unwrap_or_default();

            if let Some(n) = heading_number(&name)
                && n > MAX_HEADING_LEVEL
            {
                log::warn!(
                    "Style {} ({}) is deeper than heading level {}; treating it as a paragraph",
                    style_id,
                    name,
                    MAX_HEADING_LEVEL
                );
            }

            styles.insert(
                style_id.to_string(),
                StyleDefinition {
                    id: style_id.to_string(),
                    class_name: class_name(&name),
                    name,
                    formats,
                },
            );
        }

        log::debug!("Parsed {} paragraph/character styles", styles.len());
        Ok(StyleResolver { styles })
    }

    /// Looks up a style referenced by the document; unknown ids are an error.
    pub fn get(&self, id: &str) -> Result<&StyleDefinition, Error> {
        self.styles
            .get(id)
            .ok_or_else(|| Error::unresolved(ReferenceKind::Style, id))
    }

    pub fn len(&self) -> usize {
        self.styles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.styles.is_empty()
    }
}

/// `w:u` is on unless its value is "none".
pub(crate) fn underline(rpr: roxmltree::Node) -> Option<bool> {
    wml(rpr, "u").map(|u| u.attribute((WML_NS, "val")) != Some("none"))
}

fn heading_number(name: &str) -> Option<usize> {
    HEADING_PREFIXES
        .iter()
        .find_map(|prefix| name.strip_prefix(prefix))
        .and_then(|n| n.trim().parse::<usize>().ok())
        .filter(|&n| n >= 1)
}

fn class_name(name: &str) -> Option<String> {
    let rest = name.strip_prefix(EPUB_MARKER)?;
    let rest = CHARACTER_SUFFIXES
        .iter()
        .find_map(|suffix| rest.strip_suffix(suffix))
        .unwrap_or(rest);
    let class: String = rest
        .trim()
        .chars()
        .map(|c| if c.is_whitespace() { '-' } else { c })
        .collect();
    if class.is_empty() { None } else { Some(class) }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STYLES: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<w:styles xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
  <w:style w:type="paragraph" w:styleId="Normal"><w:name w:val="Normal"/></w:style>
  <w:style w:type="paragraph" w:styleId="Heading2">
    <w:name w:val="heading 2"/>
    <w:rPr><w:b/><w:i w:val="0"/></w:rPr>
  </w:style>
  <w:style w:type="paragraph" w:styleId="Ttulo3"><w:name w:val="Título 3"/></w:style>
  <w:style w:type="paragraph" w:styleId="Heading7"><w:name w:val="heading 7"/></w:style>
  <w:style w:type="paragraph" w:styleId="Cita"><w:name w:val="epub_big quote"/>
    <w:rPr><w:i/><w:u w:val="single"/><w:vertAlign w:val="superscript"/></w:rPr>
  </w:style>
  <w:style w:type="character" w:styleId="CitaCar"><w:name w:val="epub_big quote Car"/></w:style>
  <w:style w:type="table" w:styleId="TableGrid"><w:name w:val="Table Grid"/></w:style>
</w:styles>"#;

    #[test]
    fn headings_in_both_locales() {
        let styles = StyleResolver::parse(STYLES).unwrap();
        assert_eq!(styles.get("Heading2").unwrap().heading_level(), Some(2));
        assert_eq!(styles.get("Ttulo3").unwrap().heading_level(), Some(3));
        assert_eq!(styles.get("Normal").unwrap().heading_level(), None);
        assert_eq!(styles.get("Heading7").unwrap().heading_level(), None);
    }

    #[test]
    fn class_names_strip_marker_and_character_suffix() {
        let styles = StyleResolver::parse(STYLES).unwrap();
        assert_eq!(styles.get("Cita").unwrap().class_name.as_deref(), Some("big-quote"));
        assert_eq!(styles.get("CitaCar").unwrap().class_name.as_deref(), Some("big-quote"));
        assert_eq!(styles.get("Normal").unwrap().class_name, None);
        assert_eq!(class_name("epub_"), None);
        assert_eq!(class_name("heading 1"), None);
    }

    #[test]
    fn inherited_formats_ignore_vertical_alignment() {
        let styles = StyleResolver::parse(STYLES).unwrap();
        assert_eq!(styles.get("Heading2").unwrap().formats, vec![Format::Bold]);
        assert_eq!(
            styles.get("Cita").unwrap().formats,
            vec![Format::Italic, Format::Underline]
        );
    }

    #[test]
    fn table_styles_are_not_recorded_and_unknown_ids_fail() {
        let styles = StyleResolver::parse(STYLES).unwrap();
        assert_eq!(styles.len(), 6);
        assert!(matches!(
            styles.get("TableGrid"),
            Err(Error::UnresolvedReference {
                kind: ReferenceKind::Style,
                ..
            })
        ));
    }
}
