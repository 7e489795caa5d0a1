//! Append-only XHTML fragment builder.
//!
//! A [`Section`] is built through paired open/close calls plus buffered text.
//! Text is flushed into the element that is open at the next structural
//! operation, so consecutive `append_text` calls end up in one text node.

mod notes;

use std::fmt::Write as _;

use crate::error::Error;

pub use notes::{citation_anchor_id, note_anchor_id};

pub const STYLESHEET_HREF: &str = "../Styles/style.css";
pub const IMAGE_DIR_HREF: &str = "../Images";
pub const NOTES_SECTION_NAME: &str = "notes.xhtml";

const XHTML_NS: &str = "http://www.w3.org/1999/xhtml";

const VOID_ELEMENTS: &[&str] = &["br", "img", "hr"];
const BLOCK_ELEMENTS: &[&str] = &[
    "p", "div", "h1", "h2", "h3", "h4", "h5", "h6", "ul", "ol", "li", "table", "tr", "td",
    "blockquote",
];
const HEADINGS: &[&str] = &["h1", "h2", "h3", "h4", "h5", "h6"];
/// Parents whose children are laid out one per line.
const ELEMENT_ONLY: &[&str] = &["body", "ul", "ol", "table", "tr"];

/// An element that was open when a section was split, so it can be reopened
/// in the following section.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OpenTag {
    pub name: String,
    pub attrs: Vec<(String, String)>,
}

/// Whether a heading gets an automatically generated fragment id.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HeadingId {
    Auto,
    Suppressed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SectionKind {
    Text,
    Notes,
}

#[derive(Debug)]
enum Child {
    Element(usize),
    Text(String),
}

#[derive(Debug)]
struct ElementData {
    name: String,
    attrs: Vec<(String, String)>,
    children: Vec<Child>,
}

#[derive(Debug)]
pub struct Section {
    name: String,
    kind: SectionKind,
    elements: Vec<ElementData>,
    open: Vec<usize>,
    pending_text: String,
    heading_ids: u32,
    note: Option<notes::OpenNote>,
    /// Wrappers reopened from the previous section, outermost first.
    reopened: Vec<usize>,
    title: Option<String>,
}

impl Section {
    /// A text section named `Section0001.xhtml`, `Section0002.xhtml`, …
    pub fn text(index: usize) -> Self {
        Self::with_name(format!("Section{:04}.xhtml", index), SectionKind::Text)
    }

    pub fn notes() -> Self {
        Self::with_name(NOTES_SECTION_NAME.to_string(), SectionKind::Notes)
    }

    /// A fixed-name page outside the converted text (cover, title page).
    pub(crate) fn page(name: &str) -> Self {
        Self::with_name(name.to_string(), SectionKind::Text)
    }

    fn with_name(name: String, kind: SectionKind) -> Self {
        let body = ElementData {
            name: "body".to_string(),
            attrs: Vec::new(),
            children: Vec::new(),
        };
        Section {
            name,
            kind,
            elements: vec![body],
            open: vec![0],
            pending_text: String::new(),
            heading_ids: 0,
            note: None,
            reopened: Vec::new(),
            title: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_title(&mut self, title: &str) {
        self.title = Some(title.to_string());
    }

    /// The `<title>` of the document: the explicit title if one was set,
    /// else the text of the first heading.
    pub fn title(&self) -> String {
        if let Some(title) = &self.title {
            return title.clone();
        }
        let mut text = String::new();
        if let Some(heading) = self.first_heading(0) {
            self.collect_text(heading, &mut text);
        }
        text.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    fn first_heading(&self, id: usize) -> Option<usize> {
        self.elements[id].children.iter().find_map(|child| match child {
            Child::Element(c) if HEADINGS.contains(&self.elements[*c].name.as_str()) => Some(*c),
            Child::Element(c) => self.first_heading(*c),
            Child::Text(_) => None,
        })
    }

    fn collect_text(&self, id: usize, out: &mut String) {
        for child in &self.elements[id].children {
            match child {
                Child::Text(text) => out.push_str(text),
                Child::Element(c) if self.elements[*c].name == "br" => out.push(' '),
                Child::Element(c) => self.collect_text(*c, out),
            }
        }
    }

    /// True when nothing but whitespace and the wrappers carried over by
    /// [`Section::reopen`] has been written to the body.
    pub fn is_empty(&self) -> bool {
        if !self.pending_text.trim().is_empty() {
            return false;
        }
        let mut parent = 0;
        let mut carried = self.reopened.iter();
        loop {
            let mut content = self.elements[parent]
                .children
                .iter()
                .filter(|c| !matches!(c, Child::Text(t) if t.trim().is_empty()));
            match (content.next(), content.next()) {
                (None, _) => return true,
                (Some(Child::Element(id)), None) if carried.next() == Some(id) => parent = *id,
                _ => return false,
            }
        }
    }

    /// Number of elements currently open below `body`.
    pub fn depth(&self) -> usize {
        self.open.len() - 1
    }

    fn top(&self) -> usize {
        // body is never popped
        self.open[self.open.len() - 1]
    }

    fn flush_text(&mut self) {
        if self.pending_text.is_empty() {
            return;
        }
        let text = std::mem::take(&mut self.pending_text);
        let top = self.top();
        match self.elements[top].children.last_mut() {
            Some(Child::Text(existing)) => existing.push_str(&text),
            _ => self.elements[top].children.push(Child::Text(text)),
        }
    }

    fn push_element(&mut self, name: &str, attrs: &[(&str, &str)]) -> usize {
        self.flush_text();
        let id = self.elements.len();
        self.elements.push(ElementData {
            name: name.to_string(),
            attrs: attrs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            children: Vec::new(),
        });
        let top = self.top();
        self.elements[top].children.push(Child::Element(id));
        id
    }

    pub fn open_tag(&mut self, name: &str, attrs: &[(&str, &str)]) {
        let id = self.push_element(name, attrs);
        self.open.push(id);
        if self.kind == SectionKind::Notes {
            self.inject_note_anchor(id);
        }
    }

    /// Closes the innermost open element, which must be `name`.
    pub fn close_tag(&mut self, name: &str) -> Result<(), Error> {
        if self.open.len() <= 1 {
            return Err(Error::TagMismatch {
                expected: None,
                found: name.to_string(),
            });
        }
        let top = self.top();
        if self.elements[top].name != name {
            return Err(Error::TagMismatch {
                expected: Some(self.elements[top].name.clone()),
                found: name.to_string(),
            });
        }
        self.flush_text();
        self.open.pop();
        Ok(())
    }

    pub fn append_text(&mut self, text: &str) {
        self.pending_text.push_str(text);
    }

    pub fn line_break(&mut self) {
        self.push_element("br", &[]);
    }

    pub fn append_image(&mut self, name: &str) {
        let src = format!("{}/{}", IMAGE_DIR_HREF, name);
        self.push_element("img", &[("alt", ""), ("src", &src)]);
    }

    /// Opens `<hN>`, returning the generated fragment id unless suppressed.
    pub fn open_heading(&mut self, level: usize, id: HeadingId) -> Option<String> {
        let tag = format!("h{}", level);
        match id {
            HeadingId::Suppressed => {
                self.open_tag(&tag, &[]);
                None
            }
            HeadingId::Auto => {
                self.heading_ids += 1;
                let fragment = format!("heading-{}", self.heading_ids);
                self.open_tag(&tag, &[("id", &fragment)]);
                Some(fragment)
            }
        }
    }

    pub fn close_heading(&mut self, level: usize) -> Result<(), Error> {
        self.close_tag(&format!("h{}", level))
    }

    /// Snapshot of the open elements below `body`, outermost first.
    pub fn open_tags(&self) -> Vec<OpenTag> {
        self.open[1..]
            .iter()
            .map(|&id| OpenTag {
                name: self.elements[id].name.clone(),
                attrs: self.elements[id].attrs.clone(),
            })
            .collect()
    }

    /// Closes every open element, returning them outermost first.
    pub fn close_all(&mut self) -> Result<Vec<OpenTag>, Error> {
        let tags = self.open_tags();
        for tag in tags.iter().rev() {
            self.close_tag(&tag.name)?;
        }
        Ok(tags)
    }

    pub fn reopen(&mut self, tags: &[OpenTag]) {
        for tag in tags {
            let attrs: Vec<(&str, &str)> = tag
                .attrs
                .iter()
                .map(|(k, v)| (k.as_str(), v.as_str()))
                .collect();
            self.open_tag(&tag.name, &attrs);
            self.reopened.push(self.top());
        }
    }

    /// Serializes the section as a complete XHTML 1.1 document.
    pub fn to_xhtml(&self) -> Result<String, Error> {
        if self.open.len() > 1 {
            let top = self.top();
            return Err(Error::TagMismatch {
                expected: Some(self.elements[top].name.clone()),
                found: "body".to_string(),
            });
        }
        let mut out = String::new();
        out.push_str("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n");
        out.push_str(
            "<!DOCTYPE html PUBLIC \"-//W3C//DTD XHTML 1.1//EN\" \"http://www.w3.org/TR/xhtml11/DTD/xhtml11.dtd\">\n\n",
        );
        let _ = writeln!(out, "<html xmlns=\"{}\">", XHTML_NS);
        let _ = writeln!(out, "<head>\n  <title>{}</title>", escape_text(&self.title()));
        let _ = writeln!(
            out,
            "  <link href=\"{}\" type=\"text/css\" rel=\"stylesheet\"/>",
            STYLESHEET_HREF
        );
        out.push_str("</head>\n\n<body>\n");
        for child in &self.elements[0].children {
            self.write_child(child, "body", &mut out);
        }
        if !self.pending_text.is_empty() {
            out.push_str(&escape_text(&self.pending_text));
        }
        out.push_str("</body>\n</html>\n");
        Ok(out)
    }

    fn write_child(&self, child: &Child, parent: &str, out: &mut String) {
        match child {
            Child::Text(text) => out.push_str(&escape_text(text)),
            Child::Element(id) => self.write_element(*id, parent, out),
        }
    }

    fn write_element(&self, id: usize, parent: &str, out: &mut String) {
        let el = &self.elements[id];
        out.push('<');
        out.push_str(&el.name);
        for (key, value) in &el.attrs {
            let _ = write!(out, " {}=\"{}\"", key, escape_attr(value));
        }
        if el.children.is_empty() && VOID_ELEMENTS.contains(&el.name.as_str()) {
            out.push_str("/>");
            return;
        }
        out.push('>');
        for child in &el.children {
            self.write_child(child, &el.name, out);
        }
        let _ = write!(out, "</{}>", el.name);
        if BLOCK_ELEMENTS.contains(&el.name.as_str()) && ELEMENT_ONLY.contains(&parent) {
            out.push('\n');
        }
    }
}

fn is_xml_char(c: char) -> bool {
    matches!(c, '\t' | '\n' | '\r') || (c >= ' ' && c != '\u{FFFE}' && c != '\u{FFFF}')
}

pub(crate) fn escape_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars().filter(|&c| is_xml_char(c)) {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

pub(crate) fn escape_attr(s: &str) -> String {
    escape_text(s).replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(section: &Section) -> String {
        let xhtml = section.to_xhtml().unwrap();
        let start = xhtml.find("<body>\n").unwrap() + "<body>\n".len();
        let end = xhtml.find("</body>").unwrap();
        xhtml[start..end].to_string()
    }

    #[test]
    fn text_is_buffered_into_one_node() {
        let mut s = Section::text(1);
        s.open_tag("p", &[]);
        s.append_text("Hello, ");
        s.append_text("world");
        s.close_tag("p").unwrap();
        assert_eq!(body(&s), "<p>Hello, world</p>\n");
    }

    #[test]
    fn tail_text_lands_after_closed_element() {
        let mut s = Section::text(1);
        s.open_tag("p", &[]);
        s.append_text("a ");
        s.open_tag("em", &[]);
        s.append_text("b");
        s.close_tag("em").unwrap();
        s.append_text(" c");
        s.line_break();
        s.append_text("d");
        s.close_tag("p").unwrap();
        assert_eq!(body(&s), "<p>a <em>b</em> c<br/>d</p>\n");
    }

    #[test]
    fn mismatched_close_is_an_error() {
        let mut s = Section::text(1);
        s.open_tag("p", &[]);
        s.open_tag("strong", &[]);
        match s.close_tag("p") {
            Err(Error::TagMismatch { expected, found }) => {
                assert_eq!(expected.as_deref(), Some("strong"));
                assert_eq!(found, "p");
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(
            Section::text(2).close_tag("p"),
            Err(Error::TagMismatch { expected: None, .. })
        ));
    }

    #[test]
    fn unclosed_section_refuses_to_serialize() {
        let mut s = Section::text(1);
        s.open_tag("div", &[("class", "x")]);
        assert!(s.to_xhtml().is_err());
    }

    #[test]
    fn heading_ids_are_unique_per_section() {
        let mut s = Section::text(1);
        assert_eq!(s.open_heading(1, HeadingId::Suppressed), None);
        s.close_heading(1).unwrap();
        assert_eq!(s.open_heading(2, HeadingId::Auto).as_deref(), Some("heading-1"));
        s.close_heading(2).unwrap();
        assert_eq!(s.open_heading(2, HeadingId::Auto).as_deref(), Some("heading-2"));
        s.close_heading(2).unwrap();
    }

    #[test]
    fn close_all_and_reopen_preserves_attributes() {
        let mut s = Section::text(1);
        s.open_tag("div", &[("class", "note")]);
        s.open_tag("ul", &[]);
        let tags = s.close_all().unwrap();
        assert_eq!(s.depth(), 0);
        let mut next = Section::text(2);
        next.reopen(&tags);
        assert_eq!(next.open_tags(), tags);
        assert_eq!(tags[0].attrs, vec![("class".to_string(), "note".to_string())]);
    }

    #[test]
    fn escapes_markup_and_drops_control_characters() {
        let mut s = Section::text(1);
        s.open_tag("p", &[("title", "\"q\"")]);
        s.append_text("a < b & c\u{0001}");
        s.close_tag("p").unwrap();
        assert_eq!(body(&s), "<p title=\"&quot;q&quot;\">a &lt; b &amp; c</p>\n");
    }

    #[test]
    fn line_separators_only_between_element_only_children() {
        let mut s = Section::text(1);
        s.open_tag("div", &[("class", "note")]);
        s.open_tag("p", &[]);
        s.append_text("a");
        s.close_tag("p").unwrap();
        s.open_tag("ul", &[]);
        s.open_tag("li", &[]);
        s.append_text("b");
        s.close_tag("li").unwrap();
        s.close_tag("ul").unwrap();
        s.close_tag("div").unwrap();
        assert_eq!(
            body(&s),
            "<div class=\"note\"><p>a</p><ul><li>b</li>\n</ul></div>\n"
        );

        let xhtml = s.to_xhtml().unwrap();
        let doc = roxmltree::Document::parse_with_options(
            &xhtml,
            roxmltree::ParsingOptions {
                allow_dtd: true,
                ..Default::default()
            },
        )
        .unwrap();
        let div = doc.descendants().find(|n| n.has_tag_name("div")).unwrap();
        let children: Vec<&str> = div.children().map(|c| c.tag_name().name()).collect();
        assert_eq!(children, ["p", "ul"]);
        let li = doc.descendants().find(|n| n.has_tag_name("li")).unwrap();
        assert_eq!(li.children().count(), 1);
    }

    #[test]
    fn reopened_wrappers_alone_are_empty() {
        let tags = vec![
            OpenTag {
                name: "div".to_string(),
                attrs: vec![("class".to_string(), "note".to_string())],
            },
            OpenTag {
                name: "ul".to_string(),
                attrs: Vec::new(),
            },
        ];
        let mut s = Section::text(2);
        s.reopen(&tags);
        assert!(s.is_empty());
        s.close_all().unwrap();
        assert!(s.is_empty());

        let mut s = Section::text(2);
        s.reopen(&tags);
        s.open_tag("li", &[]);
        assert!(!s.is_empty());

        let mut s = Section::text(2);
        s.reopen(&tags[..1]);
        s.append_text("x");
        assert!(!s.is_empty());
    }

    #[test]
    fn title_comes_from_the_first_heading() {
        let mut s = Section::text(1);
        assert_eq!(s.title(), "");
        s.open_tag("div", &[]);
        s.open_heading(2, HeadingId::Auto);
        s.append_text("Part ");
        s.line_break();
        s.append_text(" One & Two");
        s.close_heading(2).unwrap();
        s.close_tag("div").unwrap();
        s.open_heading(1, HeadingId::Auto);
        s.append_text("Later");
        s.close_heading(1).unwrap();
        assert_eq!(s.title(), "Part One & Two");
        assert!(s.to_xhtml().unwrap().contains("<title>Part One &amp; Two</title>"));

        s.set_title("Notes");
        assert_eq!(s.title(), "Notes");
    }

    #[test]
    fn whitespace_only_section_is_empty() {
        let mut s = Section::text(1);
        assert!(s.is_empty());
        s.append_text("  ");
        assert!(s.is_empty());
        s.append_image("a.png");
        assert!(!s.is_empty());
    }
}
