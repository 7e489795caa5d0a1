//! Typed view over the WordprocessingML elements the converter understands.

use super::{DML_NS, MC_NS, REL_NS, VML_NS, WML_NS, collect_block_nodes, is_wml, wml, wml_attr, wml_bool};

type XmlNode<'a> = roxmltree::Node<'a, 'a>;

pub(crate) enum Block<'a> {
    Paragraph(Paragraph<'a>),
    Table(Table<'a>),
}

impl<'a> Block<'a> {
    /// Paragraphs and tables directly below `parent`, SDT wrappers flattened.
    pub(crate) fn collect(parent: XmlNode<'a>) -> Vec<Block<'a>> {
        collect_block_nodes(parent)
            .into_iter()
            .filter_map(|node| {
                if is_wml(node, "p") {
                    Some(Block::Paragraph(Paragraph::parse(node)))
                } else if is_wml(node, "tbl") {
                    Some(Block::Table(Table::parse(node)))
                } else {
                    None
                }
            })
            .collect()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct PageBreaks {
    /// Break before the paragraph's first visible content.
    pub(crate) before: bool,
    /// Break after visible content, or a page-starting section break.
    pub(crate) after: bool,
}

pub(crate) struct Paragraph<'a> {
    pub(crate) style_id: Option<&'a str>,
    /// 1-based list nesting level for numbered/bulleted paragraphs.
    pub(crate) list_level: Option<usize>,
    page_break_before: bool,
    section_break: bool,
    pub(crate) runs: Vec<Run<'a>>,
}

impl<'a> Paragraph<'a> {
    pub(crate) fn parse(node: XmlNode<'a>) -> Self {
        let ppr = wml(node, "pPr");
        let style_id = ppr.and_then(|ppr| wml_attr(ppr, "pStyle"));
        let list_level = ppr.and_then(|ppr| wml(ppr, "numPr")).and_then(|num_pr| {
            if wml_attr(num_pr, "numId") == Some("0") {
                return None;
            }
            let ilvl = wml_attr(num_pr, "ilvl")
                .and_then(|v| v.parse::<usize>().ok())
                .unwrap_or(0);
            Some(ilvl + 1)
        });
        let page_break_before = ppr.and_then(|ppr| wml_bool(ppr, "pageBreakBefore")) == Some(true);
        let section_break = ppr
            .and_then(|ppr| wml(ppr, "sectPr"))
            .is_some_and(|sect| wml_attr(sect, "type") != Some("continuous"));

        let mut runs = Vec::new();
        collect_runs(node, &mut runs);

        Paragraph {
            style_id,
            list_level,
            page_break_before,
            section_break,
            runs,
        }
    }

    pub(crate) fn has_visible_content(&self) -> bool {
        self.runs
            .iter()
            .flat_map(|r| r.content.iter())
            .any(RunContent::is_visible)
    }

    pub(crate) fn page_breaks(&self) -> PageBreaks {
        let mut breaks = PageBreaks {
            before: self.page_break_before,
            after: self.section_break,
        };
        let mut seen_content = false;
        for content in self.runs.iter().flat_map(|r| r.content.iter()) {
            match content {
                RunContent::PageBreak if seen_content => breaks.after = true,
                RunContent::PageBreak => breaks.before = true,
                c if c.is_visible() => seen_content = true,
                _ => {}
            }
        }
        breaks
    }

    pub(crate) fn breaks_page(&self) -> bool {
        let breaks = self.page_breaks();
        breaks.before || breaks.after
    }

    /// Text with tags stripped and line breaks collapsed to single spaces.
    pub(crate) fn plain_text(&self) -> String {
        let mut text = String::new();
        for content in self.runs.iter().flat_map(|r| r.content.iter()) {
            match content {
                RunContent::Text(t) => text.push_str(t),
                RunContent::Char(c) if *c != '\u{00AD}' => text.push(*c),
                RunContent::Tab | RunContent::LineBreak => text.push(' '),
                _ => {}
            }
        }
        text.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum VertAlign {
    Baseline,
    Superscript,
    Subscript,
}

/// Formatting set directly on a run; `None` defers to the styles.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct DirectFormats {
    pub(crate) bold: Option<bool>,
    pub(crate) italic: Option<bool>,
    pub(crate) underline: Option<bool>,
    pub(crate) vert_align: Option<VertAlign>,
}

pub(crate) struct Run<'a> {
    pub(crate) style_id: Option<&'a str>,
    pub(crate) direct: DirectFormats,
    pub(crate) content: Vec<RunContent<'a>>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum RunContent<'a> {
    Text(&'a str),
    Tab,
    LineBreak,
    PageBreak,
    Char(char),
    FootnoteReference(&'a str),
    /// Picture, by relationship id in the enclosing part.
    Drawing(&'a str),
}

impl RunContent<'_> {
    pub(crate) fn is_visible(&self) -> bool {
        match self {
            RunContent::Text(t) => !t.trim().is_empty(),
            RunContent::Char(_) | RunContent::FootnoteReference(_) | RunContent::Drawing(_) => {
                true
            }
            RunContent::Tab | RunContent::LineBreak | RunContent::PageBreak => false,
        }
    }
}

impl<'a> Run<'a> {
    fn parse(node: XmlNode<'a>) -> Self {
        let rpr = wml(node, "rPr");
        let style_id = rpr.and_then(|rpr| wml_attr(rpr, "rStyle"));
        let direct = rpr
            .map(|rpr| DirectFormats {
                bold: wml_bool(rpr, "b"),
                italic: wml_bool(rpr, "i"),
                underline: super::styles::underline(rpr),
                vert_align: wml_attr(rpr, "vertAlign").map(|v| match v {
                    "superscript" => VertAlign::Superscript,
                    "subscript" => VertAlign::Subscript,
                    _ => VertAlign::Baseline,
                }),
            })
            .unwrap_or_default();
        let hidden = rpr.and_then(|rpr| wml_bool(rpr, "vanish")) == Some(true);

        let mut content = Vec::new();
        if !hidden {
            parse_run_children(node, &mut content);
        }
        Run {
            style_id,
            direct,
            content,
        }
    }

    pub(crate) fn has_content(&self) -> bool {
        !self.content.is_empty()
    }
}

/// Runs of a paragraph in document order, looking through wrappers that
/// only carry metadata (hyperlinks, smart tags, tracked insertions, SDTs).
fn collect_runs<'a>(parent: XmlNode<'a>, out: &mut Vec<Run<'a>>) {
    for child in parent.children() {
        if child.tag_name().namespace() != Some(WML_NS) {
            continue;
        }
        match child.tag_name().name() {
            "r" => out.push(Run::parse(child)),
            "hyperlink" | "smartTag" | "ins" | "moveTo" | "fldSimple" | "customXml" => {
                collect_runs(child, out)
            }
            "sdt" => {
                if let Some(content) = wml(child, "sdtContent") {
                    collect_runs(content, out);
                }
            }
            _ => {}
        }
    }
}

fn parse_run_children<'a>(parent: XmlNode<'a>, out: &mut Vec<RunContent<'a>>) {
    for child in parent.children().filter(|n| n.is_element()) {
        let ns = child.tag_name().namespace();
        let name = child.tag_name().name();
        if ns == Some(MC_NS) && name == "AlternateContent" {
            alternate_content(child, out);
            continue;
        }
        if ns != Some(WML_NS) {
            continue;
        }
        match name {
            "t" => out.push(RunContent::Text(child.text().unwrap_or(""))),
            "tab" | "ptab" => out.push(RunContent::Tab),
            "br" => match child.attribute((WML_NS, "type")) {
                Some("page") => out.push(RunContent::PageBreak),
                _ => out.push(RunContent::LineBreak),
            },
            "cr" => out.push(RunContent::LineBreak),
            "noBreakHyphen" => out.push(RunContent::Char('\u{2011}')),
            "softHyphen" => out.push(RunContent::Char('\u{00AD}')),
            "footnoteReference" => {
                if let Some(id) = child.attribute((WML_NS, "id")) {
                    out.push(RunContent::FootnoteReference(id));
                }
            }
            "drawing" => {
                if let Some(id) = blip_embed(child) {
                    out.push(RunContent::Drawing(id));
                }
            }
            "pict" | "object" => {
                if let Some(id) = vml_image(child) {
                    out.push(RunContent::Drawing(id));
                }
            }
            _ => {}
        }
    }
}

/// Picks the first `mc:Choice` that yields a picture, else the fallback.
fn alternate_content<'a>(node: XmlNode<'a>, out: &mut Vec<RunContent<'a>>) {
    for choice in node
        .children()
        .filter(|n| n.tag_name().namespace() == Some(MC_NS) && n.tag_name().name() == "Choice")
    {
        let mut parsed = Vec::new();
        parse_run_children(choice, &mut parsed);
        if parsed.iter().any(|c| matches!(c, RunContent::Drawing(_))) {
            out.extend(parsed);
            return;
        }
    }
    if let Some(fallback) = node
        .children()
        .find(|n| n.tag_name().namespace() == Some(MC_NS) && n.tag_name().name() == "Fallback")
    {
        parse_run_children(fallback, out);
    }
}

fn blip_embed<'a>(container: XmlNode<'a>) -> Option<&'a str> {
    container
        .descendants()
        .find(|n| n.tag_name().name() == "blip" && n.tag_name().namespace() == Some(DML_NS))
        .and_then(|n| n.attribute((REL_NS, "embed")))
}

fn vml_image<'a>(container: XmlNode<'a>) -> Option<&'a str> {
    container
        .descendants()
        .find(|n| n.tag_name().name() == "imagedata" && n.tag_name().namespace() == Some(VML_NS))
        .and_then(|n| n.attribute((REL_NS, "id")))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum VMerge {
    None,
    Restart,
    Continue,
}

pub(crate) struct Cell<'a> {
    pub(crate) blocks: Vec<Block<'a>>,
    pub(crate) col_span: usize,
    pub(crate) row_span: usize,
    /// Continuation of a vertically merged cell; not emitted.
    pub(crate) merged: bool,
    grid_col: usize,
    v_merge: VMerge,
}

pub(crate) struct Table<'a> {
    pub(crate) rows: Vec<Vec<Cell<'a>>>,
}

impl<'a> Table<'a> {
    pub(crate) fn parse(node: XmlNode<'a>) -> Self {
        let mut rows: Vec<Vec<Cell<'a>>> = collect_block_nodes(node)
            .into_iter()
            .filter(|n| is_wml(*n, "tr"))
            .map(|tr| {
                let mut grid_col = 0;
                collect_block_nodes(tr)
                    .into_iter()
                    .filter(|n| is_wml(*n, "tc"))
                    .map(|tc| {
                        let tc_pr = wml(tc, "tcPr");
                        let col_span = tc_pr
                            .and_then(|pr| wml_attr(pr, "gridSpan"))
                            .and_then(|v| v.parse::<usize>().ok())
                            .unwrap_or(1)
                            .max(1);
                        let v_merge = match tc_pr.and_then(|pr| wml(pr, "vMerge")) {
                            None => VMerge::None,
                            Some(vm) => match vm.attribute((WML_NS, "val")) {
                                Some("restart") => VMerge::Restart,
                                _ => VMerge::Continue,
                            },
                        };
                        let cell = Cell {
                            blocks: Block::collect(tc),
                            col_span,
                            row_span: 1,
                            merged: v_merge == VMerge::Continue,
                            grid_col,
                            v_merge,
                        };
                        grid_col += col_span;
                        cell
                    })
                    .collect()
            })
            .collect();

        for r in 0..rows.len() {
            for c in 0..rows[r].len() {
                if rows[r][c].v_merge != VMerge::Restart {
                    continue;
                }
                let col = rows[r][c].grid_col;
                let span = 1 + rows[r + 1..]
                    .iter()
                    .take_while(|row| {
                        row.iter()
                            .any(|cell| cell.grid_col == col && cell.v_merge == VMerge::Continue)
                    })
                    .count();
                rows[r][c].row_span = span;
            }
        }

        Table { rows }
    }
}
