mod common;

use common::*;

/// Text of every block-level element, in reading order across sections.
fn block_texts(book: &docxide_epub::EbookData) -> Vec<String> {
    let mut texts = Vec::new();
    for section in &book.sections {
        let xhtml = section.to_xhtml().unwrap();
        let doc = parse_xml(&xhtml);
        for node in doc.descendants() {
            let name = node.tag_name().name();
            if matches!(name, "p" | "h1" | "h2" | "h3" | "li") {
                let text: String = node
                    .children()
                    .filter(|c| !c.has_tag_name("ul"))
                    .flat_map(|c| c.descendants())
                    .filter(|d| d.is_text())
                    .filter_map(|d| d.text())
                    .collect();
                texts.push(text);
            }
        }
    }
    texts
}

#[test]
fn content_keeps_document_order_across_sections() {
    let styles = [heading_styles(), paragraph_style("Nota", "epub_note")].concat();
    let book = DocxBuilder::new()
        .styles(&styles)
        .body(&heading(1, "Chapter 1"))
        .body(&p("First paragraph"))
        .body(&styled_p("Nota", "Aside one"))
        .body(&styled_p("Nota", "Aside two"))
        .body(&list_item(0, "Item a"))
        .body(&list_item(1, "Item b"))
        .body(&list_item(0, "Item c"))
        .body(&page_break())
        .body(&heading(1, "Chapter 2"))
        .body(&heading(2, "Section 2.1"))
        .body(&format!(
            "<w:p>{}{}{}</w:p>",
            run("<w:b/>", "Mixed "),
            run("<w:i/>", "formatting"),
            run("", " here")
        ))
        .convert();

    assert_eq!(book.sections.len(), 2);
    let titles: Vec<String> = book.sections.iter().map(|s| s.title()).collect();
    assert_eq!(titles, ["Chapter 1", "Chapter 2"]);
    assert_eq!(
        block_texts(&book),
        [
            "Chapter 1",
            "First paragraph",
            "Aside one",
            "Aside two",
            "Item a",
            "Item b",
            "Item c",
            "Chapter 2",
            "Section 2.1",
            "Mixed formatting here",
        ]
    );
}

#[test]
fn every_section_is_standalone_xhtml() {
    let book = DocxBuilder::new()
        .body(&p("a &amp; b"))
        .body(&page_break())
        .body(&p("&lt;c&gt;"))
        .convert();
    for section in &book.sections {
        let xhtml = section.to_xhtml().unwrap();
        assert!(xhtml.starts_with("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<!DOCTYPE html"));
        let doc = parse_xml(&xhtml);
        let root = doc.root_element();
        assert_eq!(root.tag_name().namespace(), Some("http://www.w3.org/1999/xhtml"));
        let link = root
            .descendants()
            .find(|n| n.has_tag_name("link"))
            .unwrap();
        assert_eq!(link.attribute("href"), Some("../Styles/style.css"));
    }
    let texts = block_texts(&book);
    assert_eq!(texts, ["a & b", "<c>"]);
}
