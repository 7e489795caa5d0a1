//! The conversion pass: WordprocessingML body in, XHTML sections, TOC,
//! notes section and images out.

use crate::error::{Error, ReferenceKind};
use crate::model::{ConvertOptions, EbookData, Format, FootnoteReference, Image, Target};
use crate::xhtml::{HeadingId, NOTES_SECTION_NAME, Section, citation_anchor_id, note_anchor_id};

use super::footnotes::FootnoteResolver;
use super::formatting::{FormatState, effective_formats};
use super::headings::{HeadingStack, TocBuilder};
use super::nodes::{Block, Paragraph, Run, RunContent, Table};
use super::package::{IMAGE_EXTENSIONS, Package, file_name};
use super::styles::{StyleDefinition, StyleResolver};

/// Where blocks are being written; decides which features apply.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Scope {
    Body,
    Cell,
    Footnote,
}

impl Scope {
    fn inside_cell(self) -> Scope {
        match self {
            Scope::Footnote => Scope::Footnote,
            _ => Scope::Cell,
        }
    }
}

/// Custom style shared by neighbouring paragraphs or runs: (style id, class).
type Group<'s> = Option<(&'s str, &'s str)>;

enum BlockKind<'s> {
    Heading(usize),
    ListItem(usize),
    Paragraph(Group<'s>),
    Table,
}

impl BlockKind<'_> {
    fn group(&self) -> Group<'_> {
        match self {
            BlockKind::Paragraph(group) => *group,
            _ => None,
        }
    }
}

pub struct Converter<'a> {
    package: &'a Package,
    styles: &'a StyleResolver,
    footnotes: Option<&'a FootnoteResolver<'a>>,
    options: ConvertOptions,
    data: EbookData,
    current: Section,
    headings: HeadingStack,
    toc: TocBuilder,
    references: Vec<FootnoteReference>,
    /// Consecutive empty paragraphs since the last paragraph with content.
    empty_paragraphs: usize,
}

impl<'a> Converter<'a> {
    pub fn new(
        package: &'a Package,
        styles: &'a StyleResolver,
        footnotes: Option<&'a FootnoteResolver<'a>>,
        options: ConvertOptions,
    ) -> Self {
        Converter {
            package,
            styles,
            footnotes,
            options,
            data: EbookData::default(),
            current: Section::text(1),
            headings: HeadingStack::new(),
            toc: TocBuilder::new(),
            references: Vec::new(),
            empty_paragraphs: 0,
        }
    }

    /// Converts the children of `w:body` and renders the collected notes.
    pub fn run(mut self, body: roxmltree::Node<'_, '_>) -> Result<EbookData, Error> {
        let blocks = Block::collect(body);
        self.write_blocks(&blocks, Scope::Body)?;

        let last = std::mem::replace(&mut self.current, Section::text(0));
        if !last.is_empty() {
            log::debug!("Sealed {}", last.name());
            self.data.sections.push(last);
        }

        if !self.references.is_empty() {
            self.write_notes()?;
        }

        if self.toc.is_empty() {
            log::warn!("No headings found; the table of contents only lists the frame pages");
        } else {
            log::debug!("Collected {} TOC entries", self.toc.len());
        }
        self.data.toc = self.toc.finish();
        log::info!(
            "Converted {} sections, {} footnotes, {} images",
            self.data.sections.len(),
            self.references.len(),
            self.data.images.len()
        );
        Ok(self.data)
    }

    fn write_blocks(&mut self, blocks: &[Block<'_>], scope: Scope) -> Result<(), Error> {
        let styles = self.styles;
        let kinds = blocks
            .iter()
            .map(|block| classify(styles, block, scope))
            .collect::<Result<Vec<_>, Error>>()?;
        let levels = list_levels(&kinds);

        for (i, block) in blocks.iter().enumerate() {
            let paragraph = match block {
                Block::Table(table) => {
                    self.table(table, scope)?;
                    continue;
                }
                Block::Paragraph(p) => p,
            };
            let breaks = if scope == Scope::Body {
                paragraph.page_breaks()
            } else {
                Default::default()
            };
            if breaks.before {
                self.split()?;
            }

            match kinds[i] {
                BlockKind::Heading(level) => self.heading(paragraph, level)?,
                BlockKind::ListItem(_) => {
                    let prev = i.checked_sub(1).and_then(|j| levels[j]);
                    let next = levels.get(i + 1).copied().flatten();
                    let level = levels[i].unwrap_or(1);
                    self.list_item(paragraph, scope, level, prev, next)?;
                }
                BlockKind::Paragraph(group) => {
                    let prev = i.checked_sub(1).and_then(|j| kinds[j].group());
                    let next = kinds.get(i + 1).and_then(BlockKind::group);
                    let class = group.map(|(_, class)| class);
                    if group.is_some() && group != prev && group == next {
                        if let Some(class) = class {
                            self.current.open_tag("div", &[("class", class)]);
                        }
                        self.paragraph(paragraph, scope, None)?;
                    } else if group.is_some() && group == prev {
                        self.paragraph(paragraph, scope, None)?;
                        if group != next {
                            self.current.close_tag("div")?;
                        }
                    } else {
                        // a lone styled paragraph carries its class itself
                        self.paragraph(paragraph, scope, class)?;
                    }
                }
                BlockKind::Table => {}
            }

            if breaks.after {
                self.split()?;
            }
        }
        Ok(())
    }

    /// Seals the current section and starts the next one, carrying the open
    /// container tags over. Never seals an empty section.
    fn split(&mut self) -> Result<(), Error> {
        if self.current.is_empty() {
            return Ok(());
        }
        let tags = self.current.close_all()?;
        let next = Section::text(self.data.sections.len() + 2);
        let sealed = std::mem::replace(&mut self.current, next);
        log::debug!("Sealed {} ({} tags carried over)", sealed.name(), tags.len());
        self.data.sections.push(sealed);
        self.current.reopen(&tags);
        Ok(())
    }

    fn spacing_class(&mut self) -> Option<&'static str> {
        let class = match self.empty_paragraphs {
            0 => None,
            1 => Some("salto10"),
            _ => Some("salto25"),
        };
        self.empty_paragraphs = 0;
        class
    }

    /// Counts an empty paragraph towards the next paragraph's spacing.
    /// Paragraphs that only carry a page break do not count.
    fn skip_empty(&mut self, p: &Paragraph<'_>) {
        if !self.options.ignore_empty_paragraphs && !p.breaks_page() {
            self.empty_paragraphs += 1;
        }
    }

    fn paragraph(
        &mut self,
        p: &Paragraph<'_>,
        scope: Scope,
        class: Option<&str>,
    ) -> Result<(), Error> {
        if !p.has_visible_content() {
            self.skip_empty(p);
            return Ok(());
        }
        let classes: Vec<&str> = class.into_iter().chain(self.spacing_class()).collect();
        if classes.is_empty() {
            self.current.open_tag("p", &[]);
        } else {
            self.current.open_tag("p", &[("class", &classes.join(" "))]);
        }
        self.runs(p, scope, false)?;
        self.current.close_tag("p")
    }

    fn heading(&mut self, p: &Paragraph<'_>, raw_level: usize) -> Result<(), Error> {
        if !p.has_visible_content() {
            self.skip_empty(p);
            return Ok(());
        }
        self.empty_paragraphs = 0;

        let placement = self.headings.enter(raw_level);
        let level = placement.level;
        let id = if self.current.is_empty() {
            HeadingId::Suppressed
        } else {
            HeadingId::Auto
        };
        let fragment = self.current.open_heading(level, id);
        self.runs(p, Scope::Body, true)?;
        self.current.close_heading(level)?;

        let target = Target {
            section: self.current.name().to_string(),
            fragment,
        };
        let node = self.toc.add(placement.parent, p.plain_text(), target);
        self.headings.push(placement, node);
        Ok(())
    }

    fn list_item(
        &mut self,
        p: &Paragraph<'_>,
        scope: Scope,
        level: usize,
        prev: Option<usize>,
        next: Option<usize>,
    ) -> Result<(), Error> {
        self.empty_paragraphs = 0;
        if level > prev.unwrap_or(0) {
            self.current.open_tag("ul", &[]);
        }
        self.current.open_tag("li", &[]);
        self.runs(p, scope, false)?;
        for tag in list_closing(level, next) {
            self.current.close_tag(tag)?;
        }
        Ok(())
    }

    fn table(&mut self, table: &Table<'_>, scope: Scope) -> Result<(), Error> {
        self.empty_paragraphs = 0;
        self.current.open_tag("table", &[]);
        for row in &table.rows {
            self.current.open_tag("tr", &[]);
            for cell in row.iter().filter(|c| !c.merged) {
                let col_span = cell.col_span.to_string();
                let row_span = cell.row_span.to_string();
                let mut attrs = Vec::new();
                if cell.col_span > 1 {
                    attrs.push(("colspan", col_span.as_str()));
                }
                if cell.row_span > 1 {
                    attrs.push(("rowspan", row_span.as_str()));
                }
                self.current.open_tag("td", &attrs);
                self.write_blocks(&cell.blocks, scope.inside_cell())?;
                self.empty_paragraphs = 0;
                self.current.close_tag("td")?;
            }
            self.current.close_tag("tr")?;
        }
        self.current.close_tag("table")
    }

    fn runs(&mut self, p: &Paragraph<'_>, scope: Scope, heading: bool) -> Result<(), Error> {
        let styles = self.styles;
        let paragraph_formats: &[Format] = match p.style_id {
            Some(id) if !heading => &styles.get(id)?.formats,
            _ => &[],
        };
        let runs: Vec<&Run<'_>> = p.runs.iter().filter(|r| r.has_content()).collect();
        let mut char_styles: Vec<Option<&StyleDefinition>> = Vec::with_capacity(runs.len());
        for run in &runs {
            char_styles.push(run.style_id.map(|id| styles.get(id)).transpose()?);
        }
        let groups: Vec<Group<'_>> = char_styles
            .iter()
            .map(|style| style.and_then(|s| s.class_name.as_deref().map(|c| (s.id.as_str(), c))))
            .collect();

        let mut formats = FormatState::default();
        for (i, run) in runs.iter().enumerate() {
            let group = groups[i];
            let prev = if i > 0 { groups[i - 1] } else { None };
            let next = groups.get(i + 1).copied().flatten();

            if let Some((_, class)) = group
                && group != prev
            {
                formats.close_all(&mut self.current)?;
                self.current.open_tag("span", &[("class", class)]);
            }

            let wanted = effective_formats(paragraph_formats, char_styles[i], &run.direct);
            for content in &run.content {
                self.run_content(*content, scope, &mut formats, &wanted)?;
            }

            if group.is_some() && group != next {
                formats.close_all(&mut self.current)?;
                self.current.close_tag("span")?;
            }
        }
        formats.close_all(&mut self.current)
    }

    fn run_content(
        &mut self,
        content: RunContent<'_>,
        scope: Scope,
        formats: &mut FormatState,
        wanted: &[Format],
    ) -> Result<(), Error> {
        match content {
            RunContent::Text(text) => {
                if !text.is_empty() {
                    formats.apply(&mut self.current, wanted)?;
                    self.current.append_text(text);
                }
            }
            RunContent::Tab => {
                formats.apply(&mut self.current, wanted)?;
                self.current.append_text(" ");
            }
            RunContent::Char(c) => {
                formats.apply(&mut self.current, wanted)?;
                self.current.append_text(c.encode_utf8(&mut [0; 4]));
            }
            RunContent::LineBreak => {
                formats.apply(&mut self.current, wanted)?;
                self.current.line_break();
            }
            RunContent::PageBreak => {}
            RunContent::FootnoteReference(id) => {
                if scope == Scope::Footnote {
                    log::debug!("Ignoring reference to footnote {} inside a footnote", id);
                } else {
                    formats.close_all(&mut self.current)?;
                    self.cite(id)?;
                }
            }
            RunContent::Drawing(rel_id) => {
                if let Some(name) = self.picture(rel_id, scope)? {
                    formats.apply(&mut self.current, wanted)?;
                    self.current.append_image(&name);
                }
            }
        }
        Ok(())
    }

    /// Numbers a footnote reference and writes its citation link.
    fn cite(&mut self, source_id: &str) -> Result<(), Error> {
        let resolver = self
            .footnotes
            .ok_or_else(|| Error::unresolved(ReferenceKind::Footnote, source_id))?;
        resolver.footnote(source_id)?;

        let number = self.references.len() as u32 + 1;
        self.references.push(FootnoteReference {
            source_id: source_id.to_string(),
            number,
            section: self.current.name().to_string(),
        });

        let href = format!("{}#{}", NOTES_SECTION_NAME, note_anchor_id(number));
        let id = citation_anchor_id(number);
        self.current
            .open_tag("a", &[("id", &id), ("class", "note-ref"), ("href", &href)]);
        self.current.open_tag("sup", &[]);
        self.current.append_text(&format!("[{}]", number));
        self.current.close_tag("sup")?;
        self.current.close_tag("a")
    }

    /// Resolves a picture relationship in the scope's own namespace and
    /// stores the image. Formats outside the media whitelist are skipped.
    fn picture(&mut self, rel_id: &str, scope: Scope) -> Result<Option<String>, Error> {
        let target = match (scope, self.footnotes) {
            (Scope::Footnote, Some(notes)) => notes.image_target(rel_id)?,
            (Scope::Footnote, None) => {
                return Err(Error::unresolved(ReferenceKind::Relationship, rel_id));
            }
            _ => self.package.document.rels.target(rel_id)?,
        };
        let name = file_name(target);
        let extension = name.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase());
        if !extension.is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str())) {
            log::warn!("Skipping picture {} with unsupported format", name);
            return Ok(None);
        }
        let data = self
            .package
            .media
            .get(name)
            .ok_or_else(|| Error::unresolved(ReferenceKind::Image, name))?;
        self.data.add_image(Image {
            name: name.to_string(),
            data: data.clone(),
        });
        Ok(Some(name.to_string()))
    }

    /// Renders every cited footnote, in citation order, into the notes section.
    fn write_notes(&mut self) -> Result<(), Error> {
        let Some(resolver) = self.footnotes else {
            return Ok(());
        };
        let text = std::mem::replace(&mut self.current, Section::notes());
        self.current.set_title("Notes");
        let references = std::mem::take(&mut self.references);

        for reference in &references {
            let node = resolver.footnote(&reference.source_id)?;
            let back_href = format!(
                "{}#{}",
                reference.section,
                citation_anchor_id(reference.number)
            );
            self.current.open_note(reference.number, &back_href)?;
            self.empty_paragraphs = 0;
            self.write_blocks(&Block::collect(node), Scope::Footnote)?;
            self.current.close_note()?;
        }
        log::debug!("Rendered {} notes", references.len());

        self.references = references;
        let notes = std::mem::replace(&mut self.current, text);
        self.data.notes = Some(notes);
        Ok(())
    }
}

fn classify<'s>(
    styles: &'s StyleResolver,
    block: &Block<'_>,
    scope: Scope,
) -> Result<BlockKind<'s>, Error> {
    let p = match block {
        Block::Table(_) => return Ok(BlockKind::Table),
        Block::Paragraph(p) => p,
    };
    let style = p.style_id.map(|id| styles.get(id)).transpose()?;
    if scope != Scope::Footnote
        && let Some(level) = style.and_then(StyleDefinition::heading_level)
    {
        return Ok(BlockKind::Heading(level));
    }
    if let Some(level) = p.list_level {
        return Ok(BlockKind::ListItem(level));
    }
    Ok(BlockKind::Paragraph(style.and_then(|s| {
        s.class_name.as_deref().map(|class| (s.id.as_str(), class))
    })))
}

/// Effective list level per block. A level may rise by at most one over the
/// previous list paragraph; anything that is not a list item ends the list.
fn list_levels(kinds: &[BlockKind<'_>]) -> Vec<Option<usize>> {
    let mut prev = 0;
    kinds
        .iter()
        .map(|kind| match kind {
            BlockKind::ListItem(raw) => {
                let level = (*raw).clamp(1, prev + 1);
                prev = level;
                Some(level)
            }
            _ => {
                prev = 0;
                None
            }
        })
        .collect()
}

/// Tags to close after a list item at `level`, given the next paragraph's
/// list level. A deeper next item keeps this `li` open to hold its `ul`.
fn list_closing(level: usize, next: Option<usize>) -> Vec<&'static str> {
    if next.is_some_and(|n| n > level) {
        return Vec::new();
    }
    let mut tags = vec!["li"];
    for _ in 0..level.saturating_sub(next.unwrap_or(1).max(1)) {
        tags.push("ul");
        tags.push("li");
    }
    if next.is_none() {
        tags.push("ul");
    }
    tags
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items(raw: &[Option<usize>]) -> Vec<BlockKind<'static>> {
        raw.iter()
            .map(|r| match r {
                Some(level) => BlockKind::ListItem(*level),
                None => BlockKind::Paragraph(None),
            })
            .collect()
    }

    #[test]
    fn list_levels_rise_one_step_at_a_time() {
        let kinds = items(&[Some(3), Some(3), Some(1), None, Some(2)]);
        assert_eq!(
            list_levels(&kinds),
            vec![Some(1), Some(2), Some(1), None, Some(1)]
        );
    }

    #[test]
    fn closing_tags_per_item() {
        assert!(list_closing(1, Some(2)).is_empty());
        assert_eq!(list_closing(1, Some(1)), vec!["li"]);
        assert_eq!(list_closing(1, None), vec!["li", "ul"]);
        assert_eq!(list_closing(3, Some(1)), vec!["li", "ul", "li", "ul", "li"]);
        assert_eq!(
            list_closing(2, None),
            vec!["li", "ul", "li", "ul"]
        );
    }

    #[test]
    fn nested_list_is_balanced() {
        let levels = list_levels(&items(&[Some(1), Some(2), Some(2), Some(1), None]));
        let mut section = Section::text(1);
        for i in 0..4 {
            let level = levels[i].unwrap();
            let prev = if i > 0 { levels[i - 1] } else { None };
            if level > prev.unwrap_or(0) {
                section.open_tag("ul", &[]);
            }
            section.open_tag("li", &[]);
            section.append_text(&format!("i{}", i));
            for tag in list_closing(level, levels[i + 1]) {
                section.close_tag(tag).unwrap();
            }
        }
        let xhtml = section.to_xhtml().unwrap();
        assert!(xhtml.contains(
            "<ul><li>i0<ul><li>i1</li>\n<li>i2</li>\n</ul></li>\n<li>i3</li>\n</ul>\n"
        ));
    }
}
