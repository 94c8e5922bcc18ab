//! # Document Model
//!
//! The input representation for the layout engine: an ordered, flat
//! sequence of blocks plus the page geometry they flow into. Blocks refer to
//! styles by name; the styles themselves live in a separate
//! [`StyleRegistry`](crate::style::StyleRegistry), so content and
//! presentation can be authored independently.
//!
//! A document is immutable once built. The paginator never mutates it; it
//! only produces placements that point back into `blocks` by index.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{QuireError, Result};
use crate::style::{Color, Style, StyleRegistry};

/// A complete document ready for layout.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// Document metadata (title, author, etc.)
    #[serde(default)]
    pub metadata: Metadata,

    /// Page size and margins, shared by every page.
    #[serde(default)]
    pub page: PageGeometry,

    /// The content, in reading order.
    #[serde(default)]
    pub blocks: Vec<Block>,
}

impl Document {
    pub fn new(page: PageGeometry, blocks: Vec<Block>) -> Self {
        Self {
            metadata: Metadata::default(),
            page,
            blocks,
        }
    }

    /// Verify every style reference resolves before any measurement runs.
    pub fn check_styles(&self, registry: &StyleRegistry) -> Result<()> {
        for (index, block) in self.blocks.iter().enumerate() {
            for style in block.style_refs() {
                registry.resolve(style).map_err(|e| e.at_block(index))?;
            }
        }
        Ok(())
    }
}

/// JSON input: a document plus the style sheet and fonts it needs.
///
/// ```json
/// {
///   "page": { "size": "Letter", "margins": { "top": 57.6, ... } },
///   "styles": { "Body": { "fontSize": 11, "leading": 15 } },
///   "blocks": [ { "type": "Paragraph", "text": "Hello", "style": "Body" } ]
/// }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    #[serde(flatten)]
    pub document: Document,

    /// Named styles. An empty table falls back to the sample style sheet.
    #[serde(default)]
    pub styles: BTreeMap<String, Style>,

    /// TrueType fonts to register before layout.
    #[serde(default)]
    pub fonts: Vec<FontEntry>,
}

impl Source {
    /// Build the style registry this source describes.
    pub fn registry(&self) -> Result<StyleRegistry> {
        if self.styles.is_empty() {
            Ok(StyleRegistry::sample())
        } else {
            StyleRegistry::from_styles(self.styles.clone())
        }
    }
}

/// A custom font to register with the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FontEntry {
    /// Font family name used in styles (e.g. "Inter").
    pub family: String,
    /// Path to a .ttf file.
    pub path: String,
    /// Whether this file is the bold variant.
    #[serde(default)]
    pub bold: bool,
    /// Whether this file is the italic variant.
    #[serde(default)]
    pub italic: bool,
}

/// Document metadata embedded in the PDF.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Metadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub creator: Option<String>,
}

/// Page size and margins. Fixed for the whole document.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PageGeometry {
    #[serde(default)]
    pub size: PageSize,
    #[serde(default = "default_margins")]
    pub margins: Edges,
}

fn default_margins() -> Edges {
    Edges::uniform(72.0)
}

impl Default for PageGeometry {
    fn default() -> Self {
        Self {
            size: PageSize::default(),
            margins: default_margins(),
        }
    }
}

impl PageGeometry {
    pub fn new(size: PageSize, margins: Edges) -> Self {
        Self { size, margins }
    }

    /// Page width in points.
    pub fn width(&self) -> f64 {
        self.size.dimensions().0
    }

    /// Page height in points.
    pub fn height(&self) -> f64 {
        self.size.dimensions().1
    }

    /// Width between the left and right margins.
    pub fn usable_width(&self) -> f64 {
        self.width() - self.margins.horizontal()
    }

    /// Height between the top and bottom margins.
    pub fn usable_height(&self) -> f64 {
        self.height() - self.margins.vertical()
    }
}

/// Standard page sizes in points.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub enum PageSize {
    #[default]
    A4,
    A3,
    A5,
    Letter,
    Legal,
    Custom {
        width: f64,
        height: f64,
    },
}

impl PageSize {
    /// Returns (width, height) in points.
    pub fn dimensions(&self) -> (f64, f64) {
        match self {
            PageSize::A4 => (595.28, 841.89),
            PageSize::A3 => (841.89, 1190.55),
            PageSize::A5 => (419.53, 595.28),
            PageSize::Letter => (612.0, 792.0),
            PageSize::Legal => (612.0, 1008.0),
            PageSize::Custom { width, height } => (*width, *height),
        }
    }
}

/// Edge values (top, right, bottom, left) used for margins and cell padding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Edges {
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
}

impl Edges {
    pub fn uniform(v: f64) -> Self {
        Self {
            top: v,
            right: v,
            bottom: v,
            left: v,
        }
    }

    pub fn symmetric(vertical: f64, horizontal: f64) -> Self {
        Self {
            top: vertical,
            right: horizontal,
            bottom: vertical,
            left: horizontal,
        }
    }

    pub fn horizontal(&self) -> f64 {
        self.left + self.right
    }

    pub fn vertical(&self) -> f64 {
        self.top + self.bottom
    }
}

/// One structural unit of document content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Block {
    /// A wrapped paragraph. `text` may use `<b>`, `<i>` and `<br/>`.
    Paragraph { text: String, style: String },

    /// A bulleted list. Every item wraps like a paragraph of its own style.
    List {
        items: Vec<ListItem>,
        #[serde(default = "default_bullet")]
        bullet: String,
    },

    /// A grid of text cells with optional repeating header rows.
    Table(Table),

    /// Fixed vertical space.
    Spacer { height: f64 },

    /// Close the current page.
    PageBreak,
}

fn default_bullet() -> String {
    "\u{2022}".to_string()
}

/// An entry of a [`Block::List`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListItem {
    pub text: String,
    pub style: String,
}

/// A table of plain text cells.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Table {
    /// Cell text, row by row. Every row must have the same number of cells.
    pub rows: Vec<Vec<String>>,

    /// One entry per column. Empty means every column is `Auto`.
    #[serde(default)]
    pub column_widths: Vec<ColumnWidth>,

    /// Style for body cells; its space before/after applies to the table.
    pub style: String,

    /// How many leading rows are headers. Headers repeat after a page break.
    #[serde(default)]
    pub header_rows: usize,

    /// Style for header cells. Defaults to `style`.
    #[serde(default)]
    pub header_style: Option<String>,

    /// Padding inside every cell.
    #[serde(default = "default_cell_padding")]
    pub cell_padding: Edges,

    /// Grid lines drawn around every cell.
    #[serde(default)]
    pub grid: Option<GridLine>,
}

fn default_cell_padding() -> Edges {
    Edges::symmetric(3.0, 6.0)
}

impl Table {
    pub fn new(rows: Vec<Vec<String>>, style: &str) -> Self {
        Self {
            rows,
            column_widths: Vec::new(),
            style: style.to_string(),
            header_rows: 0,
            header_style: None,
            cell_padding: default_cell_padding(),
            grid: None,
        }
    }

    /// Style used for cells of row `row`.
    pub fn row_style(&self, row: usize) -> &str {
        if row < self.header_rows {
            self.header_style.as_deref().unwrap_or(&self.style)
        } else {
            &self.style
        }
    }

    pub fn column_count(&self) -> usize {
        self.rows
            .first()
            .map(|r| r.len())
            .unwrap_or(self.column_widths.len())
    }
}

/// Width definition for one table column.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ColumnWidth {
    /// Fixed width in points.
    Fixed(f64),
    /// Fraction (0.0-1.0) of the available table width.
    Fraction(f64),
    /// Share of the remaining width, proportional to the column's content.
    Auto,
}

/// A stroked grid around table cells.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridLine {
    pub width: f64,
    pub color: Color,
}

impl Block {
    /// Create a Paragraph block.
    pub fn paragraph(text: &str, style: &str) -> Self {
        Block::Paragraph {
            text: text.to_string(),
            style: style.to_string(),
        }
    }

    /// Create a List block with the default bullet, all items in one style.
    pub fn list(items: &[&str], style: &str) -> Self {
        Block::List {
            items: items
                .iter()
                .map(|text| ListItem {
                    text: text.to_string(),
                    style: style.to_string(),
                })
                .collect(),
            bullet: default_bullet(),
        }
    }

    pub fn spacer(height: f64) -> Self {
        Block::Spacer { height }
    }

    /// Every style name this block depends on.
    pub fn style_refs(&self) -> Vec<&str> {
        match self {
            Block::Paragraph { style, .. } => vec![style.as_str()],
            Block::List { items, .. } => items.iter().map(|i| i.style.as_str()).collect(),
            Block::Table(table) => {
                let mut refs = vec![table.style.as_str()];
                if let Some(header) = &table.header_style {
                    refs.push(header.as_str());
                }
                refs
            }
            Block::Spacer { .. } | Block::PageBreak => vec![],
        }
    }

    /// The style that governs spacing and page behavior of the whole block.
    pub fn primary_style(&self) -> Option<&str> {
        match self {
            Block::Paragraph { style, .. } => Some(style.as_str()),
            Block::List { items, .. } => items.first().map(|i| i.style.as_str()),
            Block::Table(table) => Some(table.style.as_str()),
            Block::Spacer { .. } | Block::PageBreak => None,
        }
    }

    /// Short name for logs and diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Block::Paragraph { .. } => "Paragraph",
            Block::List { .. } => "List",
            Block::Table(_) => "Table",
            Block::Spacer { .. } => "Spacer",
            Block::PageBreak => "PageBreak",
        }
    }
}
