use std::collections::HashMap;

use crate::error::{Error, ReferenceKind};

use super::package::Relationships;
use super::{WML_NS, is_wml};

/// Footnote id → content node, with the footnotes part's own relationships
/// for pictures inside notes.
pub struct FootnoteResolver<'a> {
    notes: HashMap<String, roxmltree::Node<'a, 'a>>,
    rels: &'a Relationships,
}

impl<'a> FootnoteResolver<'a> {
    pub fn new(xml: &'a roxmltree::Document<'a>, rels: &'a Relationships) -> Result<Self, Error> {
        let mut notes = HashMap::new();
        for node in xml.root_element().children() {
            if !is_wml(node, "footnote") {
                continue;
            }
            // Skip separator/continuationSeparator footnotes
            if node
                .attribute((WML_NS, "type"))
                .is_some_and(|t| t != "normal")
            {
                continue;
            }
            let Some(id) = node.attribute((WML_NS, "id")) else {
                continue;
            };
            notes.insert(id.to_string(), node);
        }
        log::debug!(
            "Found {} footnotes ({} footnote relationships)",
            notes.len(),
            rels.len()
        );
        Ok(FootnoteResolver { notes, rels })
    }

    pub fn contains(&self, id: &str) -> bool {
        self.notes.contains_key(id)
    }

    pub fn footnote(&self, id: &str) -> Result<roxmltree::Node<'a, 'a>, Error> {
        self.notes
            .get(id)
            .copied()
            .ok_or_else(|| Error::unresolved(ReferenceKind::Footnote, id))
    }

    /// Resolves a picture relationship id in the footnotes namespace.
    pub fn image_target(&self, rel_id: &str) -> Result<&'a str, Error> {
        self.rels.target(rel_id)
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FOOTNOTES: &str = r#"<w:footnotes xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
  <w:footnote w:type="separator" w:id="-1"><w:p/></w:footnote>
  <w:footnote w:type="continuationSeparator" w:id="0"><w:p/></w:footnote>
  <w:footnote w:id="2"><w:p><w:r><w:t>Two</w:t></w:r></w:p></w:footnote>
</w:footnotes>"#;

    #[test]
    fn separators_are_skipped_and_ids_kept_verbatim() {
        let xml = roxmltree::Document::parse(FOOTNOTES).unwrap();
        let rels = Relationships::default();
        let notes = FootnoteResolver::new(&xml, &rels).unwrap();
        assert_eq!(notes.len(), 1);
        assert!(notes.contains("2"));
        assert!(!notes.contains("0"));
        assert!(notes.footnote("2").is_ok());
        assert!(matches!(
            notes.footnote("7"),
            Err(Error::UnresolvedReference {
                kind: ReferenceKind::Footnote,
                ..
            })
        ));
    }

    #[test]
    fn missing_relationships_resolve_nothing() {
        let xml = roxmltree::Document::parse(FOOTNOTES).unwrap();
        let rels = Relationships::default();
        let notes = FootnoteResolver::new(&xml, &rels).unwrap();
        assert!(notes.image_target("rId1").is_err());
    }
}
