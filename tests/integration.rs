//! Integration tests for the Quire pipeline.
//!
//! These tests exercise the full path from a document (built in code or
//! parsed from JSON) through measuring and pagination to PDF output.
//! They verify:
//! - JSON deserialization and the sample style sheet work together
//! - Pages break where they should, explicitly and automatically
//! - Tables repeat their headers and split on row boundaries
//! - Paragraph splits never leave an orphan line behind
//! - Fatal errors name the offending block, diagnostics don't abort
//! - PDF output is structurally valid

use quire::error::{DiagnosticKind, QuireError};
use quire::font::FontContext;
use quire::layout::{Fragment, Layout};
use quire::model::*;
use quire::style::*;

// ─── Helpers ────────────────────────────────────────────────────

fn make_doc(blocks: Vec<Block>) -> Document {
    Document::new(
        PageGeometry::new(PageSize::Letter, Edges::symmetric(57.6, 64.8)),
        blocks,
    )
}

fn make_table(header: &[&str], rows: &[Vec<String>]) -> Block {
    let mut all = vec![header.iter().map(|c| c.to_string()).collect::<Vec<_>>()];
    all.extend(rows.iter().cloned());
    let mut table = Table::new(all, "TableCell");
    table.header_rows = 1;
    table.header_style = Some("TableHeader".to_string());
    Block::Table(table)
}

fn numbered_rows(n: usize) -> Vec<Vec<String>> {
    (0..n)
        .map(|i| vec![format!("Item {}", i), format!("{}", i * 7)])
        .collect()
}

fn long_paragraph(sentences: usize) -> String {
    vec!["Resources spawn during the day phase and must be carried back before dark."; sentences]
        .join(" ")
}

fn layout_doc(doc: &Document) -> Layout {
    quire::layout(doc, &StyleRegistry::sample(), &FontContext::new()).unwrap()
}

fn render_to_pdf(doc: &Document) -> Vec<u8> {
    quire::render(doc, &StyleRegistry::sample(), &FontContext::new())
        .unwrap()
        .pdf
}

fn assert_valid_pdf(bytes: &[u8]) {
    assert!(bytes.len() > 50, "PDF too small to be valid");
    assert!(bytes.starts_with(b"%PDF-1.7"), "Missing PDF header");
    assert!(
        bytes.windows(5).any(|w| w == b"%%EOF"),
        "Missing %%EOF marker"
    );
    assert!(
        bytes.windows(4).any(|w| w == b"xref"),
        "Missing xref table"
    );
    assert!(
        bytes.windows(7).any(|w| w == b"trailer"),
        "Missing trailer"
    );
}

fn page_tree_count(bytes: &[u8]) -> usize {
    let text = String::from_utf8_lossy(bytes);
    let start = text.find("/Count ").expect("page tree has a count") + "/Count ".len();
    text[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect::<String>()
        .parse()
        .unwrap()
}

// ─── Basic Pipeline Tests ───────────────────────────────────────

#[test]
fn test_empty_document() {
    let doc = make_doc(vec![]);
    let layout = layout_doc(&doc);
    assert_eq!(layout.page_count, 1);
    assert!(layout.placements.is_empty());
    assert_valid_pdf(&render_to_pdf(&doc));
}

#[test]
fn test_single_paragraph() {
    let doc = make_doc(vec![Block::paragraph("Hello, Quire", "Body")]);
    let layout = layout_doc(&doc);
    assert_eq!(layout.page_count, 1);
    assert_eq!(layout.placements.len(), 1);
    assert_eq!(layout.placements[0].fragment, Fragment::Whole);
    // First placement starts at the top margin.
    assert!((layout.placements[0].origin_y - 57.6).abs() < 1e-9);
}

#[test]
fn test_explicit_page_break() {
    let doc = make_doc(vec![
        Block::paragraph("Page one", "Body"),
        Block::PageBreak,
        Block::paragraph("Page two", "Body"),
    ]);
    let layout = layout_doc(&doc);
    assert_eq!(layout.page_count, 2);
    assert_eq!(layout.placements[1].page_index, 1);
    assert_eq!(page_tree_count(&render_to_pdf(&doc)), 2);
}

#[test]
fn test_consecutive_page_breaks_leave_one_blank_page() {
    let doc = make_doc(vec![
        Block::paragraph("Before", "Body"),
        Block::PageBreak,
        Block::PageBreak,
        Block::paragraph("After", "Body"),
    ]);
    let layout = layout_doc(&doc);
    assert_eq!(layout.page_count, 3);
    assert_eq!(layout.page_placements(1).count(), 0);
    assert_eq!(layout.placements[1].page_index, 2);
}

#[test]
fn test_content_overflow_creates_new_page() {
    let blocks: Vec<Block> = (0..60)
        .map(|i| Block::paragraph(&format!("Paragraph number {}", i), "Body"))
        .collect();
    let doc = make_doc(blocks);
    let layout = layout_doc(&doc);
    assert!(layout.page_count >= 2, "60 paragraphs should span pages");

    let bottom = doc.page.margins.top + doc.page.usable_height();
    for p in &layout.placements {
        assert!(
            p.origin_y + p.consumed_height <= bottom + 1e-6,
            "placement runs past the bottom margin: {:?}",
            p
        );
    }
    assert_eq!(page_tree_count(&render_to_pdf(&doc)), layout.page_count);
}

#[test]
fn test_placements_are_in_document_order() {
    let doc = make_doc(vec![
        Block::paragraph("Title", "Title"),
        Block::paragraph(&long_paragraph(80), "Body"),
        Block::list(&["one", "two", "three"], "Bullet"),
        make_table(&["Item", "Value"], &numbered_rows(60)),
    ]);
    let layout = layout_doc(&doc);
    for pair in layout.placements.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        assert!(b.block_index >= a.block_index);
        assert!(b.page_index >= a.page_index);
        if a.page_index == b.page_index {
            assert!(b.origin_y >= a.origin_y + a.consumed_height - 1e-6);
        }
    }
}

// ─── Table Tests ────────────────────────────────────────────────

#[test]
fn test_simple_table() {
    let doc = make_doc(vec![make_table(&["Name", "Age"], &numbered_rows(2))]);
    let layout = layout_doc(&doc);
    assert_eq!(layout.page_count, 1);
    assert_eq!(layout.placements.len(), 1);
    let widths = layout.measurements[0].column_widths.as_ref().unwrap();
    let total: f64 = widths.iter().sum();
    assert!((total - doc.page.usable_width()).abs() < 1e-6);
}

#[test]
fn test_table_header_repeats_on_every_page() {
    let doc = make_doc(vec![make_table(&["Name", "Value"], &numbered_rows(150))]);
    let layout = layout_doc(&doc);
    assert!(layout.page_count >= 3, "150 rows should span several pages");

    let fragments: Vec<Fragment> = layout.block_placements(0).map(|p| p.fragment).collect();
    assert_eq!(fragments.len(), layout.page_count);

    let mut next_row = 0;
    for (i, fragment) in fragments.iter().enumerate() {
        match *fragment {
            Fragment::Rows {
                start,
                end,
                repeated_header,
            } => {
                assert_eq!(repeated_header, i > 0, "fragment {}", i);
                assert_eq!(start, next_row);
                assert!(end > start, "every fragment carries body rows");
                next_row = end;
            }
            other => panic!("expected row fragment, got {:?}", other),
        }
    }
    assert_eq!(next_row, 151);
}

#[test]
fn test_table_split_needs_a_body_row() {
    // Fill the page so that only the header would fit.
    let filler = Block::Spacer {
        height: make_doc(vec![]).page.usable_height() - 25.0,
    };
    let doc = make_doc(vec![filler, make_table(&["Name", "Value"], &numbered_rows(3))]);
    let layout = layout_doc(&doc);
    let table: Vec<_> = layout.block_placements(1).collect();
    assert_eq!(table.len(), 1);
    assert_eq!(table[0].page_index, 1);
    assert_eq!(table[0].fragment, Fragment::Whole);
}

// ─── Paragraph Splitting ────────────────────────────────────────

#[test]
fn test_long_paragraph_splits_and_conserves_height() {
    let doc = make_doc(vec![
        Block::paragraph("Heading", "Heading1"),
        Block::paragraph(&long_paragraph(120), "Body"),
    ]);
    let layout = layout_doc(&doc);
    let parts: Vec<_> = layout.block_placements(1).collect();
    assert!(parts.len() >= 2, "paragraph should split across pages");

    let consumed: f64 = parts.iter().map(|p| p.consumed_height).sum();
    assert!((consumed - layout.measurements[1].height).abs() < 1e-6);
}

#[test]
fn test_no_orphan_lines() {
    // Different lead-in heights move the first split point around.
    for lead in [600.0, 610.0, 620.0, 630.0, 640.0, 650.0] {
        let doc = make_doc(vec![
            Block::spacer(lead),
            Block::paragraph(&long_paragraph(30), "Body"),
        ]);
        let layout = layout_doc(&doc);
        let parts: Vec<_> = layout.block_placements(1).collect();
        for part in &parts[..parts.len() - 1] {
            let first_on_page = layout
                .page_placements(part.page_index)
                .next()
                .map(|p| p.block_index == 1)
                .unwrap_or(false);
            if let Fragment::Lines { start, end } = part.fragment {
                assert!(
                    first_on_page || end - start >= 2,
                    "orphan line after {}pt lead-in: {:?}",
                    lead,
                    part
                );
            }
        }
    }
}

#[test]
fn test_heading_moves_with_following_paragraph() {
    let usable = make_doc(vec![]).page.usable_height();
    // Leave room for the heading (18 + 19 + 8) but not for a body line after it.
    let doc = make_doc(vec![
        Block::spacer(usable - 50.0),
        Block::paragraph("Section", "Heading1"),
        Block::paragraph(&long_paragraph(3), "Body"),
    ]);
    let layout = layout_doc(&doc);
    assert_eq!(layout.block_placements(1).next().unwrap().page_index, 1);
    assert_eq!(layout.block_placements(2).next().unwrap().page_index, 1);
}

// ─── Diagnostics and Errors ─────────────────────────────────────

#[test]
fn test_oversized_spacer_is_reported_not_fatal() {
    let doc = make_doc(vec![
        Block::spacer(5000.0),
        Block::paragraph("After the giant spacer", "Body"),
    ]);
    let rendered = quire::render(&doc, &StyleRegistry::sample(), &FontContext::new()).unwrap();
    assert_valid_pdf(&rendered.pdf);
    let diagnostics = &rendered.layout.diagnostics;
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].kind, DiagnosticKind::Overflow);
    assert_eq!(diagnostics[0].block_index, 0);
    assert_eq!(rendered.layout.page_count, 2);
}

#[test]
fn test_unknown_style_names_block() {
    let doc = make_doc(vec![
        Block::paragraph("ok", "Body"),
        Block::list(&["a", "b"], "Bulet"),
    ]);
    let err = quire::layout(&doc, &StyleRegistry::sample(), &FontContext::new()).unwrap_err();
    assert_eq!(err.to_string(), "Unknown style 'Bulet' (block 1)");
}

#[test]
fn test_render_batch_isolates_failures() {
    let docs = vec![
        make_doc(vec![Block::paragraph("first", "Body")]),
        make_doc(vec![Block::paragraph("broken", "Missing")]),
        make_doc(vec![
            Block::paragraph("third", "Body"),
            Block::PageBreak,
            Block::paragraph("third, page two", "Body"),
        ]),
    ];
    let results = quire::render_batch(&docs, &StyleRegistry::sample(), &FontContext::new());
    assert_eq!(results.len(), 3);
    assert_eq!(results[0].as_ref().unwrap().layout.page_count, 1);
    assert!(matches!(
        results[1],
        Err(QuireError::UnknownStyle { block: Some(0), .. })
    ));
    assert_eq!(results[2].as_ref().unwrap().layout.page_count, 2);
}

#[test]
fn test_rendering_is_deterministic() {
    let doc = make_doc(vec![
        Block::paragraph("Report", "Title"),
        Block::paragraph(&long_paragraph(40), "Body"),
        make_table(&["Item", "Value"], &numbered_rows(40)),
    ]);
    let a = render_to_pdf(&doc);
    let b = render_to_pdf(&doc);
    assert_eq!(a, b);
    assert_eq!(layout_doc(&doc).placements, layout_doc(&doc).placements);
}

#[test]
fn test_invalid_font_data_is_backend_error() {
    let mut fonts = FontContext::new();
    let err = fonts
        .registry_mut()
        .register("Broken", false, false, vec![0, 1, 2, 3])
        .unwrap_err();
    assert!(matches!(err, QuireError::Backend(_)));
}

// ─── JSON Tests ─────────────────────────────────────────────────

#[test]
fn test_minimal_json_uses_sample_styles() {
    let json = r#"{
        "blocks": [
            { "type": "Paragraph", "text": "Hello from JSON", "style": "Body" }
        ]
    }"#;
    let rendered = quire::render_json(json).expect("Should parse minimal JSON");
    assert_valid_pdf(&rendered.pdf);
    assert_eq!(rendered.layout.page_count, 1);
}

#[test]
fn test_json_style_inheritance() {
    let json = r##"{
        "page": { "size": "A5" },
        "styles": {
            "Base": { "fontFamily": "Times-Roman", "fontSize": 10, "leading": 14 },
            "Lead": { "parent": "Base", "fontSize": 12, "alignment": "justified" },
            "Quote": { "parent": "Lead", "indent": 24, "textColor": "#555555" }
        },
        "blocks": [
            { "type": "Paragraph", "text": "Inherited", "style": "Quote" }
        ]
    }"##;
    let source: Source = serde_json::from_str(json).unwrap();
    let registry = source.registry().unwrap();
    let quote = registry.resolve("Quote").unwrap();
    assert_eq!(quote.font_family, "Times-Roman");
    assert_eq!(quote.font_size, 12.0);
    assert_eq!(quote.leading, 14.0);
    assert_eq!(quote.alignment, TextAlign::Justify);
    assert_eq!(quote.indent, 24.0);

    let rendered = quire::render_source(&source).unwrap();
    let text = String::from_utf8_lossy(&rendered.pdf);
    assert!(text.contains("/BaseFont /Times-Roman"));
}

#[test]
fn test_json_unknown_parent_fails() {
    let json = r#"{
        "styles": { "Body": { "parent": "Nowhere" } },
        "blocks": []
    }"#;
    match quire::render_json(json) {
        Err(QuireError::UnknownStyle { style, .. }) => assert_eq!(style, "Nowhere"),
        other => panic!("expected UnknownStyle, got {:?}", other.map(|r| r.layout)),
    }
}

#[test]
fn test_json_ragged_table_is_invalid_block() {
    let json = r#"{
        "blocks": [
            { "type": "Paragraph", "text": "Intro", "style": "Body" },
            { "type": "Table", "style": "TableCell", "rows": [["a", "b"], ["c"]] }
        ]
    }"#;
    match quire::render_json(json) {
        Err(QuireError::InvalidBlock { block, reason }) => {
            assert_eq!(block, 1);
            assert!(reason.contains("row 1"));
        }
        other => panic!("expected InvalidBlock, got {:?}", other.map(|r| r.layout)),
    }
}

#[test]
fn test_json_syntax_error_has_hint() {
    let err = quire::render_json(r#"{ "blocks": [ }"#).unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("Failed to parse document"));
    assert!(msg.contains("Hint"));
}

#[test]
fn test_json_missing_font_file_is_io_error() {
    let json = r#"{
        "fonts": [{ "family": "Inter", "path": "/nonexistent/Inter.ttf" }],
        "blocks": []
    }"#;
    assert!(matches!(quire::render_json(json), Err(QuireError::Io(_))));
}

#[test]
fn test_layout_serializes_to_json() {
    let doc = make_doc(vec![
        Block::paragraph("a", "Body"),
        Block::PageBreak,
        Block::paragraph("b", "Body"),
    ]);
    let value = serde_json::to_value(layout_doc(&doc)).unwrap();
    assert_eq!(value["pageCount"], 2);
    assert_eq!(value["placements"][1]["blockIndex"], 2);
    assert_eq!(value["placements"][1]["pageIndex"], 1);
    assert_eq!(value["placements"][0]["fragment"]["kind"], "whole");
}
