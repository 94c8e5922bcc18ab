//! # Quire
//!
//! A document flow and pagination engine.
//!
//! A document is a flat sequence of styled blocks: paragraphs, bulleted
//! lists, tables, spacers and explicit page breaks. Quire measures every
//! block at the page's usable width, flows the blocks onto fixed-size pages
//! (splitting paragraphs between lines and tables between rows, repeating
//! table headers, avoiding orphans) and hands the resulting placements to an
//! output writer. The bundled writer produces PDF.
//!
//! ## Architecture
//!
//! ```text
//! Input (JSON/API)
//!       ↓
//!   [model]    Document: page geometry + ordered blocks
//!   [style]    Named styles, inheritance resolved up front
//!       ↓
//!   [measure]  Block heights, table column widths (uses [text], [font])
//!       ↓
//!   [layout]   Paginator: placements + diagnostics
//!       ↓
//!   [pdf]      Output writer: placements → PDF bytes
//! ```
//!
//! Every stage is a pure function of its inputs. Independent documents can
//! be rendered in parallel with [`render_batch`].

pub mod error;
pub mod font;
pub mod layout;
pub mod measure;
pub mod model;
pub mod pdf;
pub mod style;
pub mod text;

use rayon::prelude::*;

pub use error::{Diagnostic, DiagnosticKind, QuireError, Result};
pub use font::{FontContext, FontKey, TextMetrics};
pub use layout::{Fragment, Layout, Placement};
pub use model::{Block, Document, FontEntry, PageGeometry, Source};
pub use pdf::{OutputWriter, PdfWriter};
pub use style::{Style, StyleRegistry};

/// A rendered document: the output bytes and the layout they came from.
///
/// Non-fatal problems (blocks too tall for a page, clipped table columns)
/// are in `layout.diagnostics`.
#[derive(Debug, Clone)]
pub struct Rendered {
    pub pdf: Vec<u8>,
    pub layout: Layout,
}

/// Measure and paginate a document without producing output.
pub fn layout(
    document: &Document,
    registry: &StyleRegistry,
    metrics: &dyn TextMetrics,
) -> Result<Layout> {
    layout::layout_document(document, registry, metrics)
}

/// Lay out a document and serialize it with `writer`.
pub fn render_with(
    writer: &dyn OutputWriter,
    document: &Document,
    registry: &StyleRegistry,
    fonts: &FontContext,
) -> Result<Rendered> {
    let layout = layout::layout_document(document, registry, fonts)?;
    let pdf = writer.write(document, &layout, registry, fonts)?;
    Ok(Rendered { pdf, layout })
}

/// Render a document to PDF bytes.
///
/// This is the primary entry point. Takes a document, the style sheet its
/// blocks refer to and the fonts to measure and embed.
pub fn render(
    document: &Document,
    registry: &StyleRegistry,
    fonts: &FontContext,
) -> Result<Rendered> {
    render_with(&PdfWriter::new(), document, registry, fonts)
}

/// Render many independent documents in parallel.
///
/// Results come back in input order. A failing document doesn't affect its
/// siblings.
pub fn render_batch(
    documents: &[Document],
    registry: &StyleRegistry,
    fonts: &FontContext,
) -> Vec<Result<Rendered>> {
    documents
        .par_iter()
        .enumerate()
        .map(|(i, document)| {
            let result = render(document, registry, fonts);
            if let Err(e) = &result {
                log::warn!("document {} of batch failed: {}", i, e);
            }
            result
        })
        .collect()
}

/// Read and register custom fonts listed in a source.
pub fn register_fonts(fonts: &mut FontContext, entries: &[FontEntry]) -> Result<()> {
    for entry in entries {
        let data = std::fs::read(&entry.path)?;
        fonts
            .registry_mut()
            .register(&entry.family, entry.bold, entry.italic, data)?;
    }
    Ok(())
}

/// Build the style registry and font context a source describes.
fn prepare(source: &Source) -> Result<(StyleRegistry, FontContext)> {
    let registry = source.registry()?;
    let mut fonts = FontContext::new();
    register_fonts(&mut fonts, &source.fonts)?;
    Ok((registry, fonts))
}

/// Lay out a parsed JSON source.
pub fn layout_source(source: &Source) -> Result<Layout> {
    let (registry, fonts) = prepare(source)?;
    layout(&source.document, &registry, &fonts)
}

/// Render a parsed JSON source to PDF.
pub fn render_source(source: &Source) -> Result<Rendered> {
    let (registry, fonts) = prepare(source)?;
    render(&source.document, &registry, &fonts)
}

/// Render a document described as JSON to PDF.
pub fn render_json(json: &str) -> Result<Rendered> {
    let source: Source = serde_json::from_str(json)?;
    render_source(&source)
}
