mod convert;
mod footnotes;
mod formatting;
mod headings;
mod nodes;
mod package;
mod styles;

use crate::error::Error;
use crate::model::{ConvertOptions, EbookData};

pub use convert::Converter;
pub use footnotes::FootnoteResolver;
pub use headings::{HeadingStack, TocBuilder};
pub use package::{Archive, IMAGE_EXTENSIONS, MemoryArchive, Package, Part, Relationship, Relationships};
pub use styles::{MAX_HEADING_LEVEL, StyleDefinition, StyleResolver};

pub(crate) const WML_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
pub(crate) const DML_NS: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";
pub(crate) const REL_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
pub(crate) const MC_NS: &str = "http://schemas.openxmlformats.org/markup-compatibility/2006";
pub(crate) const VML_NS: &str = "urn:schemas-microsoft-com:vml";

/// Parse a WML boolean toggle element (e.g., w:b, w:i, w:strike).
/// Present with no val or val != "0"/"false" means true.
pub(crate) fn wml_bool(parent: roxmltree::Node, name: &str) -> Option<bool> {
    wml(parent, name).map(|n| {
        n.attribute((WML_NS, "val"))
            .is_none_or(|v| v != "0" && v != "false" && v != "off")
    })
}

pub(crate) fn wml<'a>(node: roxmltree::Node<'a, 'a>, name: &str) -> Option<roxmltree::Node<'a, 'a>> {
    node.children()
        .find(|n| n.tag_name().name() == name && n.tag_name().namespace() == Some(WML_NS))
}

pub(crate) fn wml_attr<'a>(node: roxmltree::Node<'a, 'a>, child: &str) -> Option<&'a str> {
    wml(node, child).and_then(|n| n.attribute((WML_NS, "val")))
}

pub(crate) fn is_wml(node: roxmltree::Node, name: &str) -> bool {
    node.tag_name().name() == name && node.tag_name().namespace() == Some(WML_NS)
}

/// Flatten SDT wrappers: descend into w:sdtContent and collect effective children.
pub(crate) fn collect_block_nodes<'a>(parent: roxmltree::Node<'a, 'a>) -> Vec<roxmltree::Node<'a, 'a>> {
    let mut nodes = Vec::new();
    for child in parent.children() {
        if is_wml(child, "sdt") || is_wml(child, "customXml") {
            let content = if is_wml(child, "sdt") {
                wml(child, "sdtContent")
            } else {
                Some(child)
            };
            if let Some(content) = content {
                nodes.extend(collect_block_nodes(content));
            }
        } else if child.is_element() {
            nodes.push(child);
        }
    }
    nodes
}

/// Runs the whole pipeline over an opened archive.
pub fn convert<A: Archive + ?Sized>(
    archive: &mut A,
    options: &ConvertOptions,
) -> Result<EbookData, Error> {
    let package = Package::open(archive)?;
    let styles = match package.styles.as_deref() {
        Some(xml) => StyleResolver::parse(xml)?,
        None => StyleResolver::empty(),
    };
    let footnote_xml = match package.footnotes.as_ref() {
        Some(part) => Some(roxmltree::Document::parse(package::strip_bom(&part.xml))?),
        None => None,
    };
    let footnotes = match (package.footnotes.as_ref(), footnote_xml.as_ref()) {
        (Some(part), Some(xml)) => Some(FootnoteResolver::new(xml, &part.rels)?),
        _ => None,
    };
    let document = roxmltree::Document::parse(package::strip_bom(&package.document.xml))?;
    let body = wml(document.root_element(), "body")
        .ok_or_else(|| Error::InvalidPackage("missing w:body".into()))?;

    let converter = Converter::new(&package, &styles, footnotes.as_ref(), *options);
    converter.run(body)
}
