//! # Paginator
//!
//! Flows measured blocks onto fixed-size pages in a single forward pass.
//!
//! The paginator is a small state machine. Each page starts `AtPageTop`,
//! becomes `InPage(remaining)` once something is placed on it, and the run
//! ends in `Done`. Blocks are consumed in document order and every
//! placement is final: nothing already placed is ever revisited.
//!
//! Policy, in order of precedence:
//! - an explicit page break closes the current page, even an empty one;
//! - a block that fits (exact fits included) is placed whole;
//! - paragraphs and lists split between lines, tables between rows, with
//!   table headers repeated on every continuation page;
//! - a split never leaves a single line of a paragraph or list item alone
//!   at the bottom of a page that already holds other content;
//! - a style with `keep_with_next` drags its block to the next page when
//!   the following block could not start right after it;
//! - spacers at the top of a page opened by a break are dropped;
//! - something that still doesn't fit on an empty page is placed anyway
//!   and reported as an [`Overflow`](DiagnosticKind::Overflow).

pub mod page_break;

use serde::Serialize;

use crate::error::{Diagnostic, DiagnosticKind, Result};
use crate::font::TextMetrics;
use crate::measure::{MeasuredContent, Measurement, Measurer};
use crate::model::{Block, Document};
use crate::style::StyleRegistry;

use self::page_break::{avoid_orphans, decide_break, fits, BreakDecision};

/// Fewest lines a paragraph or list item may leave on a page that holds
/// other content when it's split.
const MIN_ORPHAN_LINES: usize = 2;

/// Where the paginator is on the current page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PageState {
    /// Nothing placed on the current page yet.
    AtPageTop,
    /// Some content placed; this much height is left.
    InPage(f64),
    /// Every block has been consumed.
    Done,
}

/// Which part of a block a placement covers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Fragment {
    /// The whole block.
    Whole,
    /// Lines `[start, end)` of a paragraph or list.
    Lines { start: usize, end: usize },
    /// Table rows `[start, end)`, drawn after the header rows when
    /// `repeated_header` is set.
    #[serde(rename_all = "camelCase")]
    Rows {
        start: usize,
        end: usize,
        repeated_header: bool,
    },
}

/// A block (or a fragment of one) assigned to a page position.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Placement {
    pub block_index: usize,
    pub page_index: usize,
    /// Distance from the top edge of the page to the top of the fragment.
    pub origin_y: f64,
    pub consumed_height: f64,
    pub fragment: Fragment,
    /// Placed on an empty page without fitting.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub overflow: bool,
}

/// The result of paginating one document.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Layout {
    pub page_count: usize,
    pub placements: Vec<Placement>,
    pub diagnostics: Vec<Diagnostic>,
    /// Measurement of every block, indexed like the document's blocks.
    #[serde(skip)]
    pub measurements: Vec<Measurement>,
}

impl Layout {
    /// Placements on page `page`, in flow order.
    pub fn page_placements(&self, page: usize) -> impl Iterator<Item = &Placement> {
        self.placements.iter().filter(move |p| p.page_index == page)
    }

    /// Placements derived from block `block`, in flow order.
    pub fn block_placements(&self, block: usize) -> impl Iterator<Item = &Placement> {
        self.placements.iter().filter(move |p| p.block_index == block)
    }
}

/// Measure and paginate a document.
///
/// Style references are checked first, so an unknown style fails before any
/// measuring happens.
pub fn layout_document(
    document: &Document,
    registry: &StyleRegistry,
    metrics: &dyn TextMetrics,
) -> Result<Layout> {
    document.check_styles(registry)?;

    let width = document.page.usable_width();
    let measurer = Measurer::new(metrics, registry);
    let measurements = document
        .blocks
        .iter()
        .enumerate()
        .map(|(i, block)| measurer.measure(i, block, width))
        .collect::<Result<Vec<_>>>()?;

    Ok(Paginator::new(document, registry).run(measurements))
}

/// Consumes measured blocks and emits placements.
pub struct Paginator<'a> {
    document: &'a Document,
    registry: &'a StyleRegistry,
    usable_height: f64,
    state: PageState,
    page_index: usize,
    placements: Vec<Placement>,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> Paginator<'a> {
    pub fn new(document: &'a Document, registry: &'a StyleRegistry) -> Self {
        Self {
            document,
            registry,
            usable_height: document.page.usable_height(),
            state: PageState::AtPageTop,
            page_index: 0,
            placements: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    /// Paginate every block. `measurements` is indexed like the blocks.
    pub fn run(mut self, measurements: Vec<Measurement>) -> Layout {
        let document = self.document;
        let blocks = &document.blocks;
        for (index, (block, m)) in blocks.iter().zip(&measurements).enumerate() {
            let next_start = measurements
                .get(index + 1)
                .and_then(|n| n.min_start_height(MIN_ORPHAN_LINES));
            self.keep_with_next(block, m, next_start);

            match &m.content {
                MeasuredContent::PageBreak => {
                    log::debug!("explicit page break at block {}", index);
                    self.open_next_page();
                }
                MeasuredContent::Space => self.place_spacer(index, block, m),
                MeasuredContent::Lines(_) => self.place_lines(index, block, m),
                MeasuredContent::Rows { .. } => self.place_table(index, block, m),
            }
        }

        let page_count = match self.state {
            // A break with nothing after it doesn't leave an empty last page.
            PageState::AtPageTop if self.page_index > 0 => self.page_index,
            _ => self.page_index + 1,
        };
        self.state = PageState::Done;
        log::debug!(
            "paginated {} blocks into {} pages ({} placements)",
            blocks.len(),
            page_count,
            self.placements.len()
        );

        Layout {
            page_count,
            placements: self.placements,
            diagnostics: self.diagnostics,
            measurements,
        }
    }

    fn remaining(&self) -> f64 {
        match self.state {
            PageState::AtPageTop => self.usable_height,
            PageState::InPage(remaining) => remaining,
            PageState::Done => 0.0,
        }
    }

    fn is_page_empty(&self) -> bool {
        self.state == PageState::AtPageTop
    }

    fn cursor_y(&self) -> f64 {
        self.document.page.margins.top + self.usable_height - self.remaining()
    }

    fn open_next_page(&mut self) {
        self.page_index += 1;
        self.state = PageState::AtPageTop;
    }

    fn emit(&mut self, block_index: usize, fragment: Fragment, height: f64, overflow: bool) {
        self.placements.push(Placement {
            block_index,
            page_index: self.page_index,
            origin_y: self.cursor_y(),
            consumed_height: height,
            fragment,
            overflow,
        });
        self.state = PageState::InPage((self.remaining() - height).max(0.0));
    }

    fn report_overflow(&mut self, block_index: usize, block: &Block, height: f64) {
        let message = format!(
            "{} at block {} needs {:.1}pt but an empty page holds {:.1}pt",
            block.kind_name(),
            block_index,
            height,
            self.usable_height
        );
        log::warn!("{}", message);
        self.diagnostics.push(Diagnostic {
            kind: DiagnosticKind::Overflow,
            block_index,
            page_index: self.page_index,
            message,
        });
    }

    /// Move a `keep_with_next` block to a fresh page when its successor
    /// couldn't start on this one.
    fn keep_with_next(&mut self, block: &Block, m: &Measurement, next_start: Option<f64>) {
        let keep = block
            .primary_style()
            .and_then(|name| self.registry.resolve(name).ok())
            .map(|s| s.keep_with_next)
            .unwrap_or(false);
        let Some(next_start) = next_start else {
            return;
        };
        if !keep || self.is_page_empty() {
            return;
        }
        let remaining = self.remaining();
        if fits(m.height, remaining) && !fits(m.height + next_start, remaining) {
            log::debug!(
                "{} kept with next block: moving to page {}",
                block.kind_name(),
                self.page_index + 1
            );
            self.open_next_page();
        }
    }

    fn place_spacer(&mut self, index: usize, block: &Block, m: &Measurement) {
        if self.page_index > 0 && self.is_page_empty() {
            log::debug!("spacer at block {} dropped at top of page {}", index, self.page_index);
            return;
        }
        if fits(m.height, self.remaining()) {
            self.emit(index, Fragment::Whole, m.height, false);
        } else if self.is_page_empty() {
            self.report_overflow(index, block, m.height);
            self.emit(index, Fragment::Whole, m.height, true);
        } else {
            // The spacer would land at the top of the next page, where it's dropped.
            self.open_next_page();
        }
    }

    fn place_lines(&mut self, index: usize, block: &Block, m: &Measurement) {
        let items: Vec<usize> = match &m.content {
            MeasuredContent::Lines(lines) => lines.iter().map(|l| l.item).collect(),
            _ => return,
        };
        let units = m.unit_heights();
        let count = units.len();
        let fragment = |start: usize, end: usize| {
            if start == 0 && end == count {
                Fragment::Whole
            } else {
                Fragment::Lines { start, end }
            }
        };

        let mut start = 0;
        loop {
            let rest = &units[start..];
            let empty = self.is_page_empty();

            match decide_break(self.remaining(), rest) {
                BreakDecision::Place => {
                    self.emit(index, fragment(start, count), rest.iter().sum(), false);
                    return;
                }
                BreakDecision::Split {
                    units_on_current_page: k,
                } => {
                    let end = if empty {
                        start + k
                    } else {
                        avoid_orphans(&items, start, start + k, MIN_ORPHAN_LINES)
                    };
                    if end == start {
                        self.open_next_page();
                        continue;
                    }
                    log::debug!(
                        "{} at block {} split after line {} on page {}",
                        block.kind_name(),
                        index,
                        end,
                        self.page_index
                    );
                    self.emit(index, fragment(start, end), units[start..end].iter().sum(), false);
                    start = end;
                    self.open_next_page();
                }
                BreakDecision::MoveToNextPage if empty => {
                    // Not even one line fits on an empty page.
                    self.report_overflow(index, block, rest[0]);
                    self.emit(index, fragment(start, start + 1), rest[0], true);
                    start += 1;
                    if start == count {
                        return;
                    }
                    self.open_next_page();
                }
                BreakDecision::MoveToNextPage => self.open_next_page(),
            }
        }
    }

    fn place_table(&mut self, index: usize, block: &Block, m: &Measurement) {
        let (header_rows, space_before) = match &m.content {
            MeasuredContent::Rows {
                header_rows,
                space_before,
                ..
            } => (*header_rows, *space_before),
            _ => return,
        };
        let header_height = m.header_height();
        let body = m.unit_heights();
        let count = body.len();
        let fragment = |start: usize, end: usize| {
            if start == 0 && end == count {
                Fragment::Whole
            } else {
                Fragment::Rows {
                    start: if start == 0 { 0 } else { header_rows + start },
                    end: header_rows + end,
                    repeated_header: start > 0 && header_rows > 0,
                }
            }
        };

        let mut clip_reported = !m.columns_clipped;
        let mut start = 0;
        loop {
            let rest = &body[start..];
            let empty = self.is_page_empty();
            let prefix = header_height + if start == 0 { space_before } else { 0.0 };
            let available = self.remaining() - prefix;

            let decision = if count == 0 {
                if fits(m.height, self.remaining()) {
                    BreakDecision::Place
                } else {
                    BreakDecision::MoveToNextPage
                }
            } else if available < 0.0 {
                BreakDecision::MoveToNextPage
            } else {
                decide_break(available, rest)
            };

            match decision {
                BreakDecision::Place => {
                    let height = if count == 0 {
                        m.height
                    } else {
                        prefix + rest.iter().sum::<f64>()
                    };
                    self.emit(index, fragment(start, count), height, false);
                    self.report_clipped(index, &mut clip_reported);
                    return;
                }
                BreakDecision::Split {
                    units_on_current_page: k,
                } => {
                    log::debug!(
                        "table at block {} split after body row {} on page {}",
                        index,
                        start + k,
                        self.page_index
                    );
                    self.emit(
                        index,
                        fragment(start, start + k),
                        prefix + rest[..k].iter().sum::<f64>(),
                        false,
                    );
                    self.report_clipped(index, &mut clip_reported);
                    start += k;
                    self.open_next_page();
                }
                BreakDecision::MoveToNextPage if empty => {
                    // Headers plus one row don't fit on an empty page.
                    let take = count.min(start + 1);
                    let height = if count == 0 {
                        m.height
                    } else {
                        prefix + rest[0]
                    };
                    self.report_overflow(index, block, height);
                    self.emit(index, fragment(start, take), height, true);
                    self.report_clipped(index, &mut clip_reported);
                    start = take;
                    if start >= count {
                        return;
                    }
                    self.open_next_page();
                }
                BreakDecision::MoveToNextPage => self.open_next_page(),
            }
        }
    }

    fn report_clipped(&mut self, index: usize, reported: &mut bool) {
        if *reported {
            return;
        }
        *reported = true;
        self.diagnostics.push(Diagnostic {
            kind: DiagnosticKind::ColumnsClipped,
            block_index: index,
            page_index: self.page_index,
            message: format!(
                "table at block {} has explicit column widths wider than the page; scaled to fit",
                index
            ),
        });
    }
}
