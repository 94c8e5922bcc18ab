//! # PDF Output
//!
//! The output-writer backend: turns a [`Layout`] back into drawing
//! operations and serializes them as a PDF file.
//!
//! This is a small from-scratch PDF 1.7 writer. Text is set in simple
//! (single-byte) fonts with WinAnsiEncoding: the standard Type1 faces need
//! no embedding, registered TrueType faces are embedded whole.
//!
//! ## PDF Structure (simplified)
//!
//! ```text
//! %PDF-1.7            <- header
//! 1 0 obj ... endobj  <- catalog
//! 2 0 obj ... endobj  <- page tree
//! ...                 <- fonts, content streams, pages, info
//! xref                <- cross-reference table (byte offsets of each object)
//! trailer             <- points to the root object
//! %%EOF
//! ```

use std::fmt::Write as FmtWrite;
use std::io::Write as IoWrite;

use miniz_oxide::deflate::compress_to_vec_zlib;

use crate::error::{QuireError, Result};
use crate::font::{
    unicode_to_winansi, winansi_to_unicode, CustomFontMetrics, FontContext, FontData, FontKey,
};
use crate::layout::{Fragment, Layout, Placement};
use crate::measure::{MeasuredContent, MeasuredLine, MeasuredRow, Measurement};
use crate::model::{Block, Document, Metadata, Table};
use crate::style::{Color, ResolvedStyle, StyleRegistry, TextAlign};
use crate::text::Line;

/// Serializes a finished layout into a binary document.
pub trait OutputWriter {
    fn write(
        &self,
        document: &Document,
        layout: &Layout,
        styles: &StyleRegistry,
        fonts: &FontContext,
    ) -> Result<Vec<u8>>;
}

pub struct PdfWriter;

impl Default for PdfWriter {
    fn default() -> Self {
        Self::new()
    }
}

/// Tracks allocated PDF objects during writing.
struct PdfBuilder {
    objects: Vec<PdfObject>,
    /// Resolved font key -> object id. Index in this vec is the /F number.
    font_objects: Vec<(FontKey, usize)>,
}

struct PdfObject {
    data: Vec<u8>,
}

impl PdfBuilder {
    fn new() -> Self {
        // 0 = placeholder (PDF objects are 1-indexed), 1 = Catalog, 2 = Pages
        Self {
            objects: (0..3).map(|_| PdfObject { data: vec![] }).collect(),
            font_objects: Vec::new(),
        }
    }

    fn push(&mut self, data: Vec<u8>) -> usize {
        self.objects.push(PdfObject { data });
        self.objects.len() - 1
    }

    fn push_stream(&mut self, dict_extra: &str, raw: &[u8]) -> usize {
        let compressed = compress_to_vec_zlib(raw, 6);
        let mut data: Vec<u8> = Vec::new();
        let _ = write!(
            data,
            "<< /Length {} /Filter /FlateDecode{} >>\nstream\n",
            compressed.len(),
            dict_extra
        );
        data.extend_from_slice(&compressed);
        data.extend_from_slice(b"\nendstream");
        self.push(data)
    }

    fn font_resource(&self, key: &FontKey) -> usize {
        self.font_objects
            .iter()
            .position(|(k, _)| k == key)
            .unwrap_or(0)
    }
}

/// What a content stream needs to know while drawing one page.
struct PageContext<'a> {
    document: &'a Document,
    styles: &'a StyleRegistry,
    fonts: &'a FontContext,
    builder: &'a PdfBuilder,
    page_height: f64,
}

impl<'a> PageContext<'a> {
    fn font_name(&self, key: &FontKey) -> String {
        let resolved = self.fonts.registry().resolved_key(key);
        format!("F{}", self.builder.font_resource(&resolved))
    }

    /// PDF y coordinate (bottom-up) of a top-down offset.
    fn flip(&self, y: f64) -> f64 {
        self.page_height - y
    }
}

impl PdfWriter {
    pub fn new() -> Self {
        Self
    }

    fn register_fonts(
        &self,
        builder: &mut PdfBuilder,
        document: &Document,
        layout: &Layout,
        styles: &StyleRegistry,
        fonts: &FontContext,
    ) -> Result<()> {
        let mut keys: Vec<FontKey> = Vec::new();
        for (index, m) in layout.measurements.iter().enumerate() {
            collect_font_keys(&document.blocks[index], m, styles, &mut keys)?;
        }
        let mut keys: Vec<FontKey> = keys
            .iter()
            .map(|k| fonts.registry().resolved_key(k))
            .collect();
        keys.sort();
        keys.dedup();

        // Always have at least Helvetica
        if keys.is_empty() {
            keys.push(FontKey::new("Helvetica", 400, false));
        }

        for key in keys {
            let obj_id = match fonts.resolve(&key) {
                FontData::Standard(std_font) => builder.push(
                    format!(
                        "<< /Type /Font /Subtype /Type1 /BaseFont /{} \
                         /Encoding /WinAnsiEncoding >>",
                        std_font.pdf_name()
                    )
                    .into_bytes(),
                ),
                FontData::Custom { data, metrics } => {
                    self.embed_truetype(builder, &key, data, metrics)
                }
            };
            builder.font_objects.push((key, obj_id));
        }
        Ok(())
    }

    /// Embed a TrueType font as a simple font with WinAnsiEncoding.
    fn embed_truetype(
        &self,
        builder: &mut PdfBuilder,
        key: &FontKey,
        data: &[u8],
        metrics: &CustomFontMetrics,
    ) -> usize {
        let name = pdf_font_name(key);
        let file_id = builder.push_stream(&format!(" /Length1 {}", data.len()), data);

        let mut flags = 32; // nonsymbolic
        if key.italic {
            flags |= 64;
        }
        let bbox = metrics.bbox;
        let descriptor = format!(
            "<< /Type /FontDescriptor /FontName /{} /Flags {} \
             /FontBBox [{} {} {} {}] /ItalicAngle {} /Ascent {} /Descent {} \
             /CapHeight {} /StemV {} /FontFile2 {} 0 R >>",
            name,
            flags,
            metrics.to_pdf_units(bbox[0] as i32),
            metrics.to_pdf_units(bbox[1] as i32),
            metrics.to_pdf_units(bbox[2] as i32),
            metrics.to_pdf_units(bbox[3] as i32),
            if key.italic { -12 } else { 0 },
            metrics.to_pdf_units(metrics.ascender as i32),
            metrics.to_pdf_units(metrics.descender as i32),
            metrics.to_pdf_units(metrics.cap_height as i32),
            if key.is_bold() { 140 } else { 80 },
            file_id
        );
        let descriptor_id = builder.push(descriptor.into_bytes());

        let widths: Vec<String> = (32u8..=255)
            .map(|b| match winansi_to_unicode(b) {
                Some(ch) => format!("{}", metrics.char_width(ch, 1000.0).round() as i64),
                None => "0".to_string(),
            })
            .collect();

        builder.push(
            format!(
                "<< /Type /Font /Subtype /TrueType /BaseFont /{} /FirstChar 32 \
                 /LastChar 255 /Widths [{}] /FontDescriptor {} 0 R \
                 /Encoding /WinAnsiEncoding >>",
                name,
                widths.join(" "),
                descriptor_id
            )
            .into_bytes(),
        )
    }

    fn build_font_resource_dict(&self, font_objects: &[(FontKey, usize)]) -> String {
        font_objects
            .iter()
            .enumerate()
            .map(|(i, (_, obj_id))| format!("/F{} {} 0 R", i, obj_id))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Build the PDF content stream for one page.
    fn build_content_stream(&self, ctx: &PageContext, layout: &Layout, page: usize) -> Result<String> {
        let mut stream = String::new();
        for placement in layout.page_placements(page) {
            let block = &ctx.document.blocks[placement.block_index];
            let m = &layout.measurements[placement.block_index];
            match (&m.content, block) {
                (MeasuredContent::Lines(lines), _) => {
                    self.write_lines(&mut stream, ctx, block, placement, lines)?
                }
                (MeasuredContent::Rows { .. }, Block::Table(table)) => {
                    self.write_table(&mut stream, ctx, table, placement, m)?
                }
                _ => {}
            }
        }
        Ok(stream)
    }

    fn write_lines(
        &self,
        stream: &mut String,
        ctx: &PageContext,
        block: &Block,
        placement: &Placement,
        lines: &[MeasuredLine],
    ) -> Result<()> {
        let range = match placement.fragment {
            Fragment::Lines { start, end } => start..end,
            _ => 0..lines.len(),
        };
        let margins = &ctx.document.page.margins;
        let usable_width = ctx.document.page.usable_width();
        let mut y = placement.origin_y;

        for ml in &lines[range] {
            let (style_name, bullet) = match block {
                Block::Paragraph { style, .. } => (style.as_str(), None),
                Block::List { items, bullet } => (items[ml.item].style.as_str(), Some(bullet)),
                _ => return Ok(()),
            };
            let style = ctx.styles.resolve(style_name)?;
            y += ml.space_before;

            let x = margins.left + style.indent;
            let width = usable_width - style.indent - style.right_indent;

            if let Some(bg) = style.background_color {
                write_fill(stream, bg, x, ctx.flip(y + ml.leading), width, ml.leading);
            }

            self.write_line(stream, ctx, &ml.line, style, x, y, width, ml.leading)?;

            if let Some(bullet) = bullet.filter(|_| ml.first_in_item) {
                let font = FontKey::from_name(&style.font_family);
                let baseline = ctx.flip(y + baseline_offset(ctx.fonts, &font, style, ml.leading));
                let _ = write!(
                    stream,
                    "BT\n{:.3} {:.3} {:.3} rg\n/{} {:.1} Tf\n{:.2} {:.2} Td\n({}) Tj\nET\n",
                    style.text_color.r,
                    style.text_color.g,
                    style.text_color.b,
                    ctx.font_name(&font),
                    style.font_size,
                    margins.left + style.bullet_indent,
                    baseline,
                    encode_pdf_string(bullet)?
                );
            }

            y += ml.leading + ml.space_after;
        }
        Ok(())
    }

    /// Set one line of text whose box starts at `top`.
    #[allow(clippy::too_many_arguments)]
    fn write_line(
        &self,
        stream: &mut String,
        ctx: &PageContext,
        line: &Line,
        style: &ResolvedStyle,
        x: f64,
        top: f64,
        width: f64,
        leading: f64,
    ) -> Result<()> {
        if line.fragments.is_empty() {
            return Ok(());
        }

        let (x, word_spacing) = match style.alignment {
            TextAlign::Left => (x, 0.0),
            TextAlign::Center => (x + (width - line.width) / 2.0, 0.0),
            TextAlign::Right => (x + width - line.width, 0.0),
            TextAlign::Justify => (x, line.justify_spacing(width)),
        };

        let base = FontKey::from_name(&style.font_family);
        let baseline = ctx.flip(top + baseline_offset(ctx.fonts, &base, style, leading));
        let color = style.text_color;

        let _ = write!(
            stream,
            "BT\n{:.3} {:.3} {:.3} rg\n{:.3} Tw\n{:.2} {:.2} Td\n",
            color.r, color.g, color.b, word_spacing, x, baseline
        );
        for fragment in &line.fragments {
            let _ = write!(
                stream,
                "/{} {:.1} Tf\n({}) Tj\n",
                ctx.font_name(&fragment.font),
                style.font_size,
                encode_pdf_string(&fragment.text)?
            );
        }
        let _ = writeln!(stream, "ET");
        Ok(())
    }

    fn write_table(
        &self,
        stream: &mut String,
        ctx: &PageContext,
        table: &Table,
        placement: &Placement,
        m: &Measurement,
    ) -> Result<()> {
        let (rows, header_rows, space_before) = match &m.content {
            MeasuredContent::Rows {
                rows,
                header_rows,
                space_before,
                ..
            } => (rows, *header_rows, *space_before),
            _ => return Ok(()),
        };
        let widths = m.column_widths.as_deref().unwrap_or(&[]);

        let mut order: Vec<usize> = Vec::new();
        let mut y = placement.origin_y;
        match placement.fragment {
            Fragment::Rows {
                start,
                end,
                repeated_header,
            } => {
                if repeated_header {
                    order.extend(0..header_rows);
                }
                if start == 0 {
                    y += space_before;
                }
                order.extend(start..end);
            }
            _ => {
                y += space_before;
                order.extend(0..rows.len());
            }
        }

        for r in order {
            let style = ctx.styles.resolve(table.row_style(r))?;
            self.write_row(stream, ctx, table, &rows[r], style, widths, y)?;
            y += rows[r].height;
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn write_row(
        &self,
        stream: &mut String,
        ctx: &PageContext,
        table: &Table,
        row: &MeasuredRow,
        style: &ResolvedStyle,
        widths: &[f64],
        top: f64,
    ) -> Result<()> {
        let padding = &table.cell_padding;
        let mut x = ctx.document.page.margins.left;
        let y = ctx.flip(top + row.height);

        for (c, lines) in row.cells.iter().enumerate() {
            let w = widths.get(c).copied().unwrap_or(0.0);

            if let Some(bg) = style.background_color {
                write_fill(stream, bg, x, y, w, row.height);
            }
            if let Some(grid) = &table.grid {
                let _ = write!(
                    stream,
                    "q\n{:.3} {:.3} {:.3} RG\n{:.2} w\n{:.2} {:.2} {:.2} {:.2} re\nS\nQ\n",
                    grid.color.r, grid.color.g, grid.color.b, grid.width, x, y, w, row.height
                );
            }

            let inner = (w - padding.horizontal()).max(0.0);
            let mut line_top = top + padding.top;
            for line in lines {
                self.write_line(stream, ctx, line, style, x + padding.left, line_top, inner, row.leading)?;
                line_top += row.leading;
            }
            x += w;
        }
        Ok(())
    }

    fn write_info(&self, builder: &mut PdfBuilder, metadata: &Metadata) -> Result<Option<usize>> {
        let fields = [
            ("Title", &metadata.title),
            ("Author", &metadata.author),
            ("Subject", &metadata.subject),
            ("Creator", &metadata.creator),
        ];
        if fields.iter().all(|(_, v)| v.is_none()) {
            return Ok(None);
        }
        let mut info = String::from("<< ");
        for (name, value) in fields {
            if let Some(value) = value {
                let _ = write!(info, "/{} ({}) ", name, encode_pdf_string(value)?);
            }
        }
        info.push_str("/Producer (Quire) >>");
        Ok(Some(builder.push(info.into_bytes())))
    }

    /// Serialize all objects into the final PDF byte stream.
    fn serialize(&self, builder: &PdfBuilder, info_obj_id: Option<usize>) -> Vec<u8> {
        let mut output: Vec<u8> = Vec::new();
        let mut offsets: Vec<usize> = vec![0; builder.objects.len()];

        output.extend_from_slice(b"%PDF-1.7\n");
        output.extend_from_slice(b"%\xe2\xe3\xcf\xd3\n");

        for (i, obj) in builder.objects.iter().enumerate().skip(1) {
            offsets[i] = output.len();
            let _ = write!(output, "{} 0 obj\n", i);
            output.extend_from_slice(&obj.data);
            output.extend_from_slice(b"\nendobj\n\n");
        }

        let xref_offset = output.len();
        let _ = write!(output, "xref\n0 {}\n", builder.objects.len());
        let _ = write!(output, "0000000000 65535 f \n");
        for offset in offsets.iter().skip(1) {
            let _ = write!(output, "{:010} 00000 n \n", offset);
        }

        let _ = write!(output, "trailer\n<< /Size {} /Root 1 0 R", builder.objects.len());
        if let Some(info_id) = info_obj_id {
            let _ = write!(output, " /Info {} 0 R", info_id);
        }
        let _ = write!(output, " >>\nstartxref\n{}\n%%EOF\n", xref_offset);

        output
    }
}

impl OutputWriter for PdfWriter {
    fn write(
        &self,
        document: &Document,
        layout: &Layout,
        styles: &StyleRegistry,
        fonts: &FontContext,
    ) -> Result<Vec<u8>> {
        let mut builder = PdfBuilder::new();
        self.register_fonts(&mut builder, document, layout, styles, fonts)?;

        let geometry = &document.page;
        let mut contents: Vec<String> = Vec::with_capacity(layout.page_count);
        {
            let ctx = PageContext {
                document,
                styles,
                fonts,
                builder: &builder,
                page_height: geometry.height(),
            };
            for page in 0..layout.page_count {
                contents.push(self.build_content_stream(&ctx, layout, page)?);
            }
        }

        let font_resources = self.build_font_resource_dict(&builder.font_objects);
        let mut page_obj_ids: Vec<usize> = Vec::with_capacity(contents.len());
        for content in contents {
            let content_obj_id = builder.push_stream("", content.as_bytes());
            let page_dict = format!(
                "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {:.2} {:.2}] \
                 /Contents {} 0 R /Resources << /Font << {} >> >> >>",
                geometry.width(),
                geometry.height(),
                content_obj_id,
                font_resources
            );
            page_obj_ids.push(builder.push(page_dict.into_bytes()));
        }

        builder.objects[1].data = b"<< /Type /Catalog /Pages 2 0 R >>".to_vec();

        let kids: String = page_obj_ids
            .iter()
            .map(|id| format!("{} 0 R", id))
            .collect::<Vec<_>>()
            .join(" ");
        builder.objects[2].data = format!(
            "<< /Type /Pages /Kids [{}] /Count {} >>",
            kids,
            page_obj_ids.len()
        )
        .into_bytes();

        let info_obj_id = self.write_info(&mut builder, &document.metadata)?;
        let bytes = self.serialize(&builder, info_obj_id);
        log::debug!(
            "wrote {} pages, {} fonts, {} bytes",
            page_obj_ids.len(),
            builder.font_objects.len(),
            bytes.len()
        );
        Ok(bytes)
    }
}

/// Every font a block's measured content will be drawn with.
fn collect_font_keys(
    block: &Block,
    m: &Measurement,
    styles: &StyleRegistry,
    keys: &mut Vec<FontKey>,
) -> Result<()> {
    match &m.content {
        MeasuredContent::Lines(lines) => {
            for ml in lines {
                keys.extend(ml.line.fragments.iter().map(|f| f.font.clone()));
            }
            if let Block::List { items, .. } = block {
                // Bullets use the item's base font, which may not appear in any fragment.
                for item in items {
                    let style = styles.resolve(&item.style)?;
                    keys.push(FontKey::from_name(&style.font_family));
                }
            }
        }
        MeasuredContent::Rows { rows, .. } => {
            for row in rows {
                for cell in &row.cells {
                    for line in cell {
                        keys.extend(line.fragments.iter().map(|f| f.font.clone()));
                    }
                }
            }
        }
        MeasuredContent::Space | MeasuredContent::PageBreak => {}
    }
    Ok(())
}

/// Offset from a line box's top to its baseline: the glyphs are centered
/// in the leading, then dropped by the ascent.
fn baseline_offset(fonts: &FontContext, font: &FontKey, style: &ResolvedStyle, leading: f64) -> f64 {
    (leading - style.font_size) / 2.0 + fonts.ascent(font, style.font_size)
}

fn write_fill(stream: &mut String, color: Color, x: f64, y: f64, w: f64, h: f64) {
    let _ = write!(
        stream,
        "q\n{:.3} {:.3} {:.3} rg\n{:.2} {:.2} {:.2} {:.2} re\nf\nQ\n",
        color.r, color.g, color.b, x, y, w, h
    );
}

/// A PDF name for an embedded font: family without spaces plus the variant.
fn pdf_font_name(key: &FontKey) -> String {
    let family: String = key
        .family
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
        .collect();
    let variant = match (key.is_bold(), key.italic) {
        (true, true) => "-BoldItalic",
        (true, false) => "-Bold",
        (false, true) => "-Italic",
        (false, false) => "",
    };
    format!("{}{}", family, variant)
}

/// Encode text as the body of a PDF literal string in WinAnsiEncoding.
///
/// Delimiters are backslash-escaped and bytes outside ASCII are written as
/// octal escapes so the content stream stays 7-bit. Characters WinAnsi
/// can't represent are a backend error.
fn encode_pdf_string(s: &str) -> Result<String> {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        let ch = if ch == '\t' { ' ' } else { ch };
        let byte = unicode_to_winansi(ch).ok_or_else(|| {
            QuireError::Backend(format!(
                "unsupported glyph '{}' (U+{:04X}) for WinAnsiEncoding",
                ch, ch as u32
            ))
        })?;
        match byte {
            b'\\' => out.push_str("\\\\"),
            b'(' => out.push_str("\\("),
            b')' => out.push_str("\\)"),
            0x20..=0x7E => out.push(byte as char),
            _ => {
                let _ = write!(out, "\\{:03o}", byte);
            }
        }
    }
    Ok(out)
}
