use std::collections::BTreeSet;

use crate::error::Error;
use crate::model::Format;
use crate::xhtml::Section;

use super::nodes::{DirectFormats, VertAlign};
use super::styles::StyleDefinition;

/// Formats of one run in canonical order: paragraph style, then character
/// style, with the run's own toggles applied last.
pub(crate) fn effective_formats(
    paragraph: &[Format],
    character: Option<&StyleDefinition>,
    direct: &DirectFormats,
) -> Vec<Format> {
    let mut set: BTreeSet<Format> = paragraph.iter().copied().collect();
    if let Some(style) = character {
        set.extend(style.formats.iter().copied());
    }

    let mut toggle = |format, value: Option<bool>| match value {
        Some(true) => {
            set.insert(format);
        }
        Some(false) => {
            set.remove(&format);
        }
        None => {}
    };
    toggle(Format::Bold, direct.bold);
    toggle(Format::Italic, direct.italic);
    toggle(Format::Underline, direct.underline);

    match direct.vert_align {
        Some(VertAlign::Superscript) => {
            set.remove(&Format::Subscript);
            set.insert(Format::Superscript);
        }
        Some(VertAlign::Subscript) => {
            set.remove(&Format::Superscript);
            set.insert(Format::Subscript);
        }
        Some(VertAlign::Baseline) => {
            set.remove(&Format::Superscript);
            set.remove(&Format::Subscript);
        }
        None => {}
    }
    set.into_iter().collect()
}

/// Format tags currently open inside a paragraph, in opening order.
#[derive(Debug, Default)]
pub(crate) struct FormatState {
    open: Vec<Format>,
}

impl FormatState {
    /// Moves from the open formats to `wanted` with balanced tags: the first
    /// open format that is no longer wanted is closed together with
    /// everything opened after it, then missing formats are opened.
    pub(crate) fn apply(&mut self, section: &mut Section, wanted: &[Format]) -> Result<(), Error> {
        if let Some(pos) = self.open.iter().position(|f| !wanted.contains(f)) {
            self.close_from(section, pos)?;
        }
        for &format in wanted {
            if !self.open.contains(&format) {
                match format.class() {
                    Some(class) => section.open_tag(format.tag(), &[("class", class)]),
                    None => section.open_tag(format.tag(), &[]),
                }
                self.open.push(format);
            }
        }
        Ok(())
    }

    pub(crate) fn close_all(&mut self, section: &mut Section) -> Result<(), Error> {
        self.close_from(section, 0)
    }

    fn close_from(&mut self, section: &mut Section, pos: usize) -> Result<(), Error> {
        while self.open.len() > pos {
            if let Some(format) = self.open.pop() {
                section.close_tag(format.tag())?;
            }
        }
        Ok(())
    }

    #[cfg(test)]
    fn open(&self) -> &[Format] {
        &self.open
    }
}
