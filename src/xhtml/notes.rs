use crate::error::Error;

use super::{BLOCK_ELEMENTS, Child, ElementData, Section};

/// Elements that cannot hold inline content directly.
const NO_INLINE: &[&str] = &["table", "tr", "ul", "ol"];

#[derive(Debug)]
pub(super) struct OpenNote {
    number: u32,
    back_href: String,
    div: usize,
    anchor_injected: bool,
    reference_inserted: bool,
}

pub fn note_anchor_id(number: u32) -> String {
    format!("nt{}", number)
}

pub fn citation_anchor_id(number: u32) -> String {
    format!("rf{}", number)
}

impl Section {
    /// Starts note `number`; `back_href` is where its back-link points.
    pub fn open_note(&mut self, number: u32, back_href: &str) -> Result<(), Error> {
        if self.note.is_some() {
            return Err(Error::TagMismatch {
                expected: Some("div".to_string()),
                found: format!("note {}", number),
            });
        }
        let div = self.push_element("div", &[("class", "note")]);
        self.open.push(div);
        self.note = Some(OpenNote {
            number,
            back_href: back_href.to_string(),
            div,
            anchor_injected: false,
            reference_inserted: false,
        });
        Ok(())
    }

    /// Puts the hidden `nt{n}` anchor at the start of the first element
    /// opened inside the current note.
    pub(super) fn inject_note_anchor(&mut self, element: usize) {
        let number = match self.note.as_ref() {
            Some(note)
                if !note.anchor_injected
                    && element != note.div
                    && !NO_INLINE.contains(&self.elements[element].name.as_str()) =>
            {
                note.number
            }
            _ => return,
        };
        let anchor = self.new_anchor(number);
        self.elements[element].children.insert(0, Child::Element(anchor));
        if let Some(note) = self.note.as_mut() {
            note.anchor_injected = true;
        }
    }

    fn new_anchor(&mut self, number: u32) -> usize {
        let id = self.elements.len();
        self.elements.push(ElementData {
            name: "a".to_string(),
            attrs: vec![
                ("id".to_string(), note_anchor_id(number)),
                ("class".to_string(), "note-anchor".to_string()),
            ],
            children: Vec::new(),
        });
        id
    }

    /// Appends the back-link to the citing section as the last inline
    /// content of the note's last block.
    pub fn insert_note_reference(&mut self) {
        self.flush_text();
        let Some(note) = self.note.as_ref() else {
            return;
        };
        if note.reference_inserted {
            return;
        }
        let mut target = note.div;
        while let Some(Child::Element(last)) = self.elements[target].children.last() {
            if !BLOCK_ELEMENTS.contains(&self.elements[*last].name.as_str()) {
                break;
            }
            target = *last;
        }
        if NO_INLINE.contains(&self.elements[target].name.as_str()) {
            target = note.div;
        }
        let link = self.elements.len();
        self.elements.push(ElementData {
            name: "a".to_string(),
            attrs: vec![
                ("class".to_string(), "note-back".to_string()),
                ("href".to_string(), note.back_href.clone()),
            ],
            children: vec![Child::Text(format!("[{}]", note.number))],
        });
        let children = &mut self.elements[target].children;
        match children.last_mut() {
            Some(Child::Text(text)) => text.push(' '),
            _ => children.push(Child::Text(" ".to_string())),
        }
        children.push(Child::Element(link));
        if let Some(note) = self.note.as_mut() {
            note.reference_inserted = true;
        }
    }

    /// Finishes the current note: guarantees the anchor, inserts the
    /// back-link and closes the note's `div`.
    pub fn close_note(&mut self) -> Result<(), Error> {
        self.flush_text();
        let (div, number, injected) = match self.note.as_ref() {
            Some(note) => (note.div, note.number, note.anchor_injected),
            None => {
                return Err(Error::TagMismatch {
                    expected: None,
                    found: "note".to_string(),
                });
            }
        };
        if self.top() != div {
            return Err(Error::TagMismatch {
                expected: Some(self.elements[self.top()].name.clone()),
                found: "div".to_string(),
            });
        }
        if !injected {
            let anchor = self.new_anchor(number);
            self.elements[div].children.insert(0, Child::Element(anchor));
        }
        self.insert_note_reference();
        self.open.pop();
        self.note = None;
        Ok(())
    }
}
