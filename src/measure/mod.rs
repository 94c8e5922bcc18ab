//! # Flow Measurer
//!
//! Computes how tall a block is at a given width, and for tables how wide
//! every column is, without touching any pagination state. Measuring is a
//! pure function of the block, the style registry, the text metrics and the
//! available width, so the paginator can measure every block once up front.
//!
//! Paragraph and list text is reduced to a flat sequence of [`MeasuredLine`]s
//! and tables to a sequence of [`MeasuredRow`]s. Those are the units the
//! paginator is allowed to split between.

use serde::Serialize;

use crate::error::{QuireError, Result};
use crate::font::{FontKey, TextMetrics};
use crate::model::{Block, ColumnWidth, Table};
use crate::style::{ResolvedStyle, StyleRegistry};
use crate::text::{parse_markup, Line, TextLayout};

/// The measured size and content of one block.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Measurement {
    /// Total height including space before and after.
    pub height: f64,
    /// Resolved column widths, for tables only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column_widths: Option<Vec<f64>>,
    /// Explicit column widths had to be scaled down to fit.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub columns_clipped: bool,
    #[serde(skip)]
    pub content: MeasuredContent,
}

/// The splittable units of a measured block.
#[derive(Debug, Clone, Default)]
pub enum MeasuredContent {
    /// Paragraph or list lines, in order.
    Lines(Vec<MeasuredLine>),
    /// Table rows. The first `header_rows` rows are headers.
    Rows {
        rows: Vec<MeasuredRow>,
        header_rows: usize,
        /// Table style space before the first row.
        space_before: f64,
        /// Table style space after the last row.
        space_after: f64,
    },
    /// A spacer: fixed height, no content.
    #[default]
    Space,
    /// An explicit page break.
    PageBreak,
}

/// One wrapped line of a paragraph or list item.
#[derive(Debug, Clone)]
pub struct MeasuredLine {
    pub line: Line,
    /// Index of the list item this line belongs to (0 for paragraphs).
    pub item: usize,
    /// First line of its item. List bullets are drawn on it.
    pub first_in_item: bool,
    pub leading: f64,
    /// Item space before, carried by the item's first line.
    pub space_before: f64,
    /// Item space after, carried by the item's last line.
    pub space_after: f64,
}

impl MeasuredLine {
    /// Vertical space this line consumes, item spacing included.
    pub fn height(&self) -> f64 {
        self.space_before + self.leading + self.space_after
    }
}

/// One measured table row.
#[derive(Debug, Clone)]
pub struct MeasuredRow {
    /// Tallest cell plus vertical cell padding.
    pub height: f64,
    /// Wrapped lines of every cell, by column.
    pub cells: Vec<Vec<Line>>,
    pub leading: f64,
}

impl Measurement {
    fn space(height: f64) -> Self {
        Self {
            height,
            column_widths: None,
            columns_clipped: false,
            content: MeasuredContent::Space,
        }
    }

    /// Heights of the units the paginator may split between.
    ///
    /// For tables these are the body rows only, with the table's space after
    /// folded into the last one; headers are accounted for separately.
    pub fn unit_heights(&self) -> Vec<f64> {
        match &self.content {
            MeasuredContent::Lines(lines) => lines.iter().map(MeasuredLine::height).collect(),
            MeasuredContent::Rows {
                rows,
                header_rows,
                space_after,
                ..
            } => {
                let mut units: Vec<f64> = rows[*header_rows..].iter().map(|r| r.height).collect();
                if let Some(last) = units.last_mut() {
                    *last += space_after;
                }
                units
            }
            MeasuredContent::Space | MeasuredContent::PageBreak => vec![self.height],
        }
    }

    /// Combined height of the header rows (zero for non-tables).
    pub fn header_height(&self) -> f64 {
        match &self.content {
            MeasuredContent::Rows {
                rows, header_rows, ..
            } => rows[..*header_rows].iter().map(|r| r.height).sum(),
            _ => 0.0,
        }
    }

    /// Height of the smallest piece of this block the paginator would leave
    /// at the bottom of a page holding other content: up to `min_lines`
    /// opening lines of the first item, or space before plus headers plus
    /// the first body row. `None` for page breaks.
    pub fn min_start_height(&self, min_lines: usize) -> Option<f64> {
        match &self.content {
            MeasuredContent::PageBreak => None,
            MeasuredContent::Rows { space_before, .. } => {
                let first_body = self.unit_heights().first().copied().unwrap_or(0.0);
                Some(space_before + self.header_height() + first_body)
            }
            MeasuredContent::Lines(lines) => {
                let first_item = lines.first().map(|l| l.item);
                Some(
                    lines
                        .iter()
                        .take_while(|l| Some(l.item) == first_item)
                        .take(min_lines)
                        .map(MeasuredLine::height)
                        .sum(),
                )
            }
            MeasuredContent::Space => Some(self.height),
        }
    }
}

/// Measures blocks against a style registry and a text-metrics backend.
pub struct Measurer<'a> {
    metrics: &'a dyn TextMetrics,
    registry: &'a StyleRegistry,
    text_layout: TextLayout,
}

impl<'a> Measurer<'a> {
    pub fn new(metrics: &'a dyn TextMetrics, registry: &'a StyleRegistry) -> Self {
        Self {
            metrics,
            registry,
            text_layout: TextLayout::new(),
        }
    }

    /// Measure block number `index` at `available_width`.
    pub fn measure(&self, index: usize, block: &Block, available_width: f64) -> Result<Measurement> {
        if available_width <= 0.0 || available_width.is_nan() {
            return Err(invalid(
                index,
                format!("available width must be positive, got {}", available_width),
            ));
        }

        match block {
            Block::Paragraph { text, style } => {
                let style = self.style(index, style)?;
                let lines = self.measure_item(index, 0, text, style, available_width)?;
                Ok(lines_measurement(lines))
            }
            Block::List { items, .. } => {
                let mut lines = Vec::new();
                for (i, item) in items.iter().enumerate() {
                    let style = self.style(index, &item.style)?;
                    lines.extend(self.measure_item(index, i, &item.text, style, available_width)?);
                }
                Ok(lines_measurement(lines))
            }
            Block::Table(table) => self.measure_table(index, table, available_width),
            Block::Spacer { height } => {
                if *height < 0.0 || !height.is_finite() {
                    return Err(invalid(index, format!("spacer height {} is invalid", height)));
                }
                Ok(Measurement::space(*height))
            }
            Block::PageBreak => Ok(Measurement {
                content: MeasuredContent::PageBreak,
                ..Measurement::space(0.0)
            }),
        }
    }

    fn style(&self, index: usize, name: &str) -> Result<&'a ResolvedStyle> {
        self.registry.resolve(name).map_err(|e| e.at_block(index))
    }

    /// Wrap one paragraph (or list item) inside its indents.
    fn measure_item(
        &self,
        index: usize,
        item: usize,
        text: &str,
        style: &ResolvedStyle,
        available_width: f64,
    ) -> Result<Vec<MeasuredLine>> {
        check_style(index, style)?;
        let text_width = available_width - style.indent - style.right_indent;
        if text_width <= 0.0 {
            return Err(invalid(
                index,
                format!(
                    "style '{}' leaves no room for text ({}pt indents in {}pt)",
                    style.name,
                    style.indent + style.right_indent,
                    available_width
                ),
            ));
        }

        let font = FontKey::from_name(&style.font_family);
        let lines = self.text_layout.break_into_lines(
            self.metrics,
            &parse_markup(text),
            &font,
            style.font_size,
            text_width,
        )?;

        let count = lines.len();
        Ok(lines
            .into_iter()
            .enumerate()
            .map(|(i, line)| MeasuredLine {
                line,
                item,
                first_in_item: i == 0,
                leading: style.leading,
                space_before: if i == 0 { style.space_before } else { 0.0 },
                space_after: if i + 1 == count { style.space_after } else { 0.0 },
            })
            .collect())
    }

    fn measure_table(&self, index: usize, table: &Table, available_width: f64) -> Result<Measurement> {
        let table_style = self.style(index, &table.style)?;
        check_style(index, table_style)?;
        let columns = table.column_count();

        for (r, row) in table.rows.iter().enumerate() {
            if row.len() != columns {
                return Err(invalid(
                    index,
                    format!("row {} has {} cells, expected {}", r, row.len(), columns),
                ));
            }
        }
        if table.header_rows > table.rows.len() {
            return Err(invalid(
                index,
                format!(
                    "{} header rows declared but the table has {} rows",
                    table.header_rows,
                    table.rows.len()
                ),
            ));
        }
        if !table.column_widths.is_empty() && table.column_widths.len() != columns {
            return Err(invalid(
                index,
                format!(
                    "{} column widths given for {} columns",
                    table.column_widths.len(),
                    columns
                ),
            ));
        }

        let padding = &table.cell_padding;
        let sides = [padding.top, padding.right, padding.bottom, padding.left];
        if sides.iter().any(|v| *v < 0.0 || !v.is_finite()) {
            return Err(invalid(
                index,
                format!("cell padding {:?} must be non-negative", sides),
            ));
        }
        for r in 0..table.rows.len() {
            check_style(index, self.style(index, table.row_style(r))?)?;
        }

        // Pass one: natural (unwrapped) width of every column.
        let mut natural = vec![0.0_f64; columns];
        for (r, row) in table.rows.iter().enumerate() {
            let style = self.style(index, table.row_style(r))?;
            let font = FontKey::from_name(&style.font_family);
            for (c, cell) in row.iter().enumerate() {
                let w = self.text_layout.natural_width(
                    self.metrics,
                    &parse_markup(cell),
                    &font,
                    style.font_size,
                )?;
                natural[c] = natural[c].max(w + padding.horizontal());
            }
        }

        // Pass two: distribute and clip.
        let defs: Vec<ColumnWidth> = if table.column_widths.is_empty() {
            vec![ColumnWidth::Auto; columns]
        } else {
            table.column_widths.clone()
        };
        let (widths, clipped) = resolve_column_widths(&defs, available_width, &natural);
        if clipped {
            log::warn!(
                "table at block {}: explicit column widths exceed {:.1}pt, scaled to fit",
                index,
                available_width
            );
        }

        let mut rows = Vec::with_capacity(table.rows.len());
        for (r, row) in table.rows.iter().enumerate() {
            let style = self.style(index, table.row_style(r))?;
            let font = FontKey::from_name(&style.font_family);
            let mut cells = Vec::with_capacity(columns);
            let mut tallest: f64 = 0.0;
            for (c, cell) in row.iter().enumerate() {
                let inner = (widths[c] - padding.horizontal()).max(0.0);
                let lines = self.text_layout.break_into_lines(
                    self.metrics,
                    &parse_markup(cell),
                    &font,
                    style.font_size,
                    inner,
                )?;
                tallest = tallest.max(lines.len() as f64 * style.leading);
                cells.push(lines);
            }
            rows.push(MeasuredRow {
                height: tallest + padding.vertical(),
                cells,
                leading: style.leading,
            });
        }

        let body: f64 = rows.iter().map(|r| r.height).sum();
        Ok(Measurement {
            height: table_style.space_before + body + table_style.space_after,
            column_widths: Some(widths),
            columns_clipped: clipped,
            content: MeasuredContent::Rows {
                rows,
                header_rows: table.header_rows,
                space_before: table_style.space_before,
                space_after: table_style.space_after,
            },
        })
    }
}

fn lines_measurement(lines: Vec<MeasuredLine>) -> Measurement {
    Measurement {
        height: lines.iter().map(MeasuredLine::height).sum(),
        column_widths: None,
        columns_clipped: false,
        content: MeasuredContent::Lines(lines),
    }
}

/// Reject metrics that would give lines no height or run the cursor backwards.
fn check_style(index: usize, style: &ResolvedStyle) -> Result<()> {
    let positive = [("font size", style.font_size), ("leading", style.leading)];
    for (what, v) in positive {
        if v <= 0.0 || !v.is_finite() {
            return Err(invalid(
                index,
                format!("style '{}' has {} {}, must be positive", style.name, what, v),
            ));
        }
    }
    let spacing = [
        ("space before", style.space_before),
        ("space after", style.space_after),
    ];
    for (what, v) in spacing {
        if v < 0.0 || !v.is_finite() {
            return Err(invalid(
                index,
                format!("style '{}' has {} {}, must not be negative", style.name, what, v),
            ));
        }
    }
    Ok(())
}

fn invalid(block: usize, reason: String) -> QuireError {
    QuireError::InvalidBlock { block, reason }
}

/// Resolve column widths in two passes.
///
/// Fixed and fractional columns keep their width. What's left is shared by
/// `Auto` columns in proportion to their natural width (evenly when they
/// are all empty). If the explicit columns alone exceed `available_width`
/// they are scaled down to fit, auto columns get nothing, and the second
/// return value is `true`.
pub fn resolve_column_widths(
    defs: &[ColumnWidth],
    available_width: f64,
    natural: &[f64],
) -> (Vec<f64>, bool) {
    let mut widths = Vec::with_capacity(defs.len());
    let mut explicit = 0.0;
    let mut auto_natural = 0.0;
    let mut auto_count = 0;

    for (i, def) in defs.iter().enumerate() {
        match *def {
            ColumnWidth::Fixed(w) => {
                let w = w.max(0.0);
                widths.push(w);
                explicit += w;
            }
            ColumnWidth::Fraction(f) => {
                let w = (available_width * f).max(0.0);
                widths.push(w);
                explicit += w;
            }
            ColumnWidth::Auto => {
                widths.push(0.0);
                auto_natural += natural.get(i).copied().unwrap_or(0.0);
                auto_count += 1;
            }
        }
    }

    if explicit > available_width + 1e-9 {
        let scale = available_width / explicit;
        for w in &mut widths {
            *w *= scale;
        }
        return (widths, true);
    }

    if auto_count > 0 {
        let remaining = available_width - explicit;
        for (i, def) in defs.iter().enumerate() {
            if matches!(def, ColumnWidth::Auto) {
                widths[i] = if auto_natural > 0.0 {
                    remaining * natural.get(i).copied().unwrap_or(0.0) / auto_natural
                } else {
                    remaining / auto_count as f64
                };
            }
        }
    }

    (widths, false)
}
