//! # Text Layout
//!
//! Inline markup, line breaking and line measurement.
//!
//! Paragraph text may carry a tiny subset of inline markup (`<b>`, `<i>`,
//! `<br/>` and the XML entities). It is parsed into [`Span`]s, then wrapped
//! greedily: break opportunities come from UAX#14, widths come from the
//! [`TextMetrics`] backend one style run at a time.

use serde::Serialize;
use unicode_linebreak::{linebreaks, BreakOpportunity};

use crate::error::Result;
use crate::font::{FontKey, TextMetrics};

/// A run of text sharing one emphasis.
#[derive(Debug, Clone, PartialEq)]
pub struct Span {
    pub text: String,
    pub bold: bool,
    pub italic: bool,
}

/// A piece of a line set in a single font.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LineFragment {
    pub text: String,
    #[serde(skip)]
    pub font: FontKey,
    pub width: f64,
}

/// A line of text after line-breaking.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Line {
    pub fragments: Vec<LineFragment>,
    /// Total width of the line, trailing spaces excluded.
    pub width: f64,
    /// Number of U+0020 spaces inside the line, for justification.
    pub space_count: usize,
    /// Last line of a paragraph or a line ended by `<br/>`. Never stretched.
    pub ends_paragraph: bool,
}

impl Line {
    /// The line's text with fonts stripped.
    pub fn text(&self) -> String {
        self.fragments.iter().map(|f| f.text.as_str()).collect()
    }

    /// Extra space per word gap that stretches this line to `target_width`.
    pub fn justify_spacing(&self, target_width: f64) -> f64 {
        if self.ends_paragraph || self.space_count == 0 || self.width >= target_width {
            return 0.0;
        }
        (target_width - self.width) / self.space_count as f64
    }
}

/// Parse inline markup into spans.
///
/// Supports `<b>`/`<strong>`, `<i>`/`<em>`, `<br/>`, and `&amp; &lt; &gt;
/// &quot; &apos; &nbsp;`. Unknown tags are kept as literal text.
pub fn parse_markup(text: &str) -> Vec<Span> {
    let mut spans: Vec<Span> = Vec::new();
    let mut current = String::new();
    let mut bold = 0u32;
    let mut italic = 0u32;
    let mut rest = text;

    let flush = |spans: &mut Vec<Span>, current: &mut String, bold: u32, italic: u32| {
        if !current.is_empty() {
            spans.push(Span {
                text: std::mem::take(current),
                bold: bold > 0,
                italic: italic > 0,
            });
        }
    };

    while let Some(ch) = rest.chars().next() {
        if ch == '<' {
            if let Some(close) = rest.find('>') {
                let tag = rest[1..close].trim().to_ascii_lowercase();
                let tag = tag.trim_end_matches('/').trim();
                let handled = match tag {
                    "b" | "strong" => {
                        flush(&mut spans, &mut current, bold, italic);
                        bold += 1;
                        true
                    }
                    "/b" | "/strong" => {
                        flush(&mut spans, &mut current, bold, italic);
                        bold = bold.saturating_sub(1);
                        true
                    }
                    "i" | "em" => {
                        flush(&mut spans, &mut current, bold, italic);
                        italic += 1;
                        true
                    }
                    "/i" | "/em" => {
                        flush(&mut spans, &mut current, bold, italic);
                        italic = italic.saturating_sub(1);
                        true
                    }
                    "br" => {
                        current.push('\n');
                        true
                    }
                    _ => false,
                };
                if handled {
                    rest = &rest[close + 1..];
                    continue;
                }
            }
        } else if ch == '&' {
            // Entity names are short; only look a few chars ahead for the ';'.
            let semi = rest
                .char_indices()
                .take(8)
                .find(|(_, c)| *c == ';')
                .map(|(i, _)| i);
            if let Some(semi) = semi {
                let decoded = match &rest[1..semi] {
                    "amp" => Some('&'),
                    "lt" => Some('<'),
                    "gt" => Some('>'),
                    "quot" => Some('"'),
                    "apos" | "#39" => Some('\''),
                    "nbsp" => Some('\u{00A0}'),
                    _ => None,
                };
                if let Some(c) = decoded {
                    current.push(c);
                    rest = &rest[semi + 1..];
                    continue;
                }
            }
        }
        current.push(ch);
        rest = &rest[ch.len_utf8()..];
    }
    flush(&mut spans, &mut current, bold, italic);
    spans
}

/// Compute UAX#14 break opportunities indexed by char position.
///
/// Returns a vec of length `text.chars().count()`. Each entry is the break
/// opportunity *before* that character position. Index 0 is always `None`.
fn compute_break_opportunities(text: &str) -> Vec<Option<BreakOpportunity>> {
    let char_count = text.chars().count();
    let mut result = vec![None; char_count];

    // linebreaks() yields (byte_offset, opportunity) where byte_offset is the
    // start of the next segment. Convert byte offsets to char indices.
    let byte_to_char: Vec<usize> = {
        let mut map = vec![0usize; text.len() + 1];
        let mut char_idx = 0;
        for (byte_idx, _) in text.char_indices() {
            map[byte_idx] = char_idx;
            char_idx += 1;
        }
        map[text.len()] = char_idx;
        map
    };

    for (byte_offset, opp) in linebreaks(text) {
        let char_idx = byte_to_char[byte_offset];
        if char_idx > 0 && char_idx < char_count {
            result[char_idx] = Some(opp);
        }
    }

    result
}

fn is_newline(ch: char) -> bool {
    matches!(ch, '\n' | '\r' | '\u{2028}' | '\u{2029}')
}

/// A breakable unit: chars `[start, end)`, trailing whitespace included.
#[derive(Debug, Clone, Copy)]
struct Segment {
    start: usize,
    end: usize,
    /// End of the segment with trailing whitespace removed.
    content_end: usize,
    mandatory_after: bool,
}

/// Flattened span text with the owning span of every char.
struct Flattened<'a> {
    chars: Vec<char>,
    owners: Vec<usize>,
    spans: &'a [Span],
    base: &'a FontKey,
    font_size: f64,
}

impl<'a> Flattened<'a> {
    fn new(spans: &'a [Span], base: &'a FontKey, font_size: f64) -> Self {
        let mut chars = Vec::new();
        let mut owners = Vec::new();
        for (i, span) in spans.iter().enumerate() {
            for ch in span.text.chars() {
                chars.push(ch);
                owners.push(i);
            }
        }
        Self {
            chars,
            owners,
            spans,
            base,
            font_size,
        }
    }

    fn font_for(&self, owner: usize) -> FontKey {
        let span = &self.spans[owner];
        self.base.with_emphasis(span.bold, span.italic)
    }

    /// Same-font runs inside `[start, end)`, newlines dropped.
    fn runs(&self, start: usize, end: usize) -> Vec<(usize, String)> {
        let mut runs: Vec<(usize, String)> = Vec::new();
        for i in start..end {
            let ch = self.chars[i];
            if is_newline(ch) {
                continue;
            }
            let owner = self.owners[i];
            let same_font = runs
                .last()
                .map(|(o, _)| self.font_for(*o) == self.font_for(owner))
                .unwrap_or(false);
            if same_font {
                if let Some((_, text)) = runs.last_mut() {
                    text.push(ch);
                }
            } else {
                runs.push((owner, ch.to_string()));
            }
        }
        runs
    }

    fn measure(&self, metrics: &dyn TextMetrics, start: usize, end: usize) -> Result<f64> {
        let mut width = 0.0;
        for (owner, text) in self.runs(start, end) {
            width += metrics.measure_text_width(&text, &self.font_for(owner), self.font_size)?;
        }
        Ok(width)
    }

    fn segments(&self, plain: &str) -> Vec<Segment> {
        let opps = compute_break_opportunities(plain);
        let mut segments = Vec::new();
        let mut start = 0;
        for (i, opp) in opps.iter().enumerate() {
            if let Some(opp) = opp {
                segments.push(self.segment(start, i, *opp == BreakOpportunity::Mandatory));
                start = i;
            }
        }
        if start < self.chars.len() {
            segments.push(self.segment(start, self.chars.len(), false));
        }
        segments
    }

    fn segment(&self, start: usize, end: usize, mandatory_after: bool) -> Segment {
        let mut content_end = end;
        while content_end > start && self.chars[content_end - 1].is_whitespace() {
            content_end -= 1;
        }
        Segment {
            start,
            end,
            content_end,
            mandatory_after,
        }
    }

    fn make_line(
        &self,
        metrics: &dyn TextMetrics,
        start: usize,
        end: usize,
        ends_paragraph: bool,
    ) -> Result<Line> {
        let mut trimmed = end;
        while trimmed > start && self.chars[trimmed - 1].is_whitespace() {
            trimmed -= 1;
        }
        let mut fragments = Vec::new();
        let mut width = 0.0;
        for (owner, text) in self.runs(start, trimmed) {
            let font = self.font_for(owner);
            let w = metrics.measure_text_width(&text, &font, self.font_size)?;
            width += w;
            fragments.push(LineFragment {
                text,
                font,
                width: w,
            });
        }
        let space_count = self.chars[start..trimmed]
            .iter()
            .filter(|c| **c == ' ')
            .count();
        Ok(Line {
            fragments,
            width,
            space_count,
            ends_paragraph,
        })
    }
}

pub struct TextLayout;

impl Default for TextLayout {
    fn default() -> Self {
        Self::new()
    }
}

impl TextLayout {
    pub fn new() -> Self {
        Self
    }

    /// Break styled spans into lines that fit within `max_width`.
    ///
    /// Greedy: each line takes as many whole segments (words plus their
    /// trailing spaces) as fit. A single word wider than `max_width` is
    /// broken between characters. Empty input yields one empty line.
    pub fn break_into_lines(
        &self,
        metrics: &dyn TextMetrics,
        spans: &[Span],
        base: &FontKey,
        font_size: f64,
        max_width: f64,
    ) -> Result<Vec<Line>> {
        let flat = Flattened::new(spans, base, font_size);
        let plain: String = flat.chars.iter().collect();
        let mut lines = Vec::new();

        if flat.chars.is_empty() {
            lines.push(flat.make_line(metrics, 0, 0, true)?);
            return Ok(lines);
        }

        let mut line_start = 0;
        let mut line_width = 0.0;

        for seg in flat.segments(&plain) {
            let content_width = flat.measure(metrics, seg.start, seg.content_end)?;

            if line_start < seg.start && line_width + content_width > max_width {
                lines.push(flat.make_line(metrics, line_start, seg.start, false)?);
                line_start = seg.start;
                line_width = 0.0;
            }

            if line_start == seg.start && content_width > max_width {
                // No break opportunity inside the word: split between chars.
                let mut pos = seg.start;
                let mut run = 0.0;
                for i in seg.start..seg.content_end {
                    let w = flat.measure(metrics, i, i + 1)?;
                    if run + w > max_width && i > pos {
                        lines.push(flat.make_line(metrics, pos, i, false)?);
                        pos = i;
                        run = 0.0;
                    }
                    run += w;
                }
                line_start = pos;
                line_width = flat.measure(metrics, pos, seg.end)?;
            } else {
                line_width += flat.measure(metrics, seg.start, seg.end)?;
            }

            if seg.mandatory_after {
                lines.push(flat.make_line(metrics, line_start, seg.end, true)?);
                line_start = seg.end;
                line_width = 0.0;
            }
        }

        if line_start < flat.chars.len() || lines.is_empty() {
            lines.push(flat.make_line(metrics, line_start, flat.chars.len(), true)?);
        } else if let Some(last) = lines.last_mut() {
            last.ends_paragraph = true;
        }

        Ok(lines)
    }

    /// Width of the widest line when nothing wraps except at `<br/>`.
    pub fn natural_width(
        &self,
        metrics: &dyn TextMetrics,
        spans: &[Span],
        base: &FontKey,
        font_size: f64,
    ) -> Result<f64> {
        Ok(self
            .break_into_lines(metrics, spans, base, font_size, f64::INFINITY)?
            .iter()
            .map(|l| l.width)
            .fold(0.0, f64::max))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::font::FontContext;

    fn helvetica() -> FontKey {
        FontKey::from_name("Helvetica")
    }

    fn plain(text: &str) -> Vec<Span> {
        parse_markup(text)
    }

    fn wrap(text: &str, max_width: f64) -> Vec<Line> {
        TextLayout::new()
            .break_into_lines(&FontContext::new(), &plain(text), &helvetica(), 12.0, max_width)
            .unwrap()
    }

    #[test]
    fn test_single_line() {
        let lines = wrap("Hello", 200.0);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].text(), "Hello");
        assert!(lines[0].ends_paragraph);
    }

    #[test]
    fn test_line_break_at_space() {
        let lines = wrap("Hello World", 40.0);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].text(), "Hello");
        assert_eq!(lines[1].text(), "World");
        assert!(!lines[0].ends_paragraph);
        assert!(lines[1].ends_paragraph);
    }

    #[test]
    fn test_explicit_break() {
        let lines = wrap("Hello<br/>World", 200.0);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].text(), "Hello");
        assert!(lines[0].ends_paragraph);
        assert_eq!(lines[1].text(), "World");
    }

    #[test]
    fn test_empty_string() {
        let lines = wrap("", 200.0);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].width, 0.0);
    }

    #[test]
    fn test_long_word_is_split() {
        let lines = wrap("Supercalifragilistic", 30.0);
        assert!(lines.len() > 1);
        for line in &lines {
            assert!(line.width <= 30.0 + 1e-9, "line too wide: {}", line.width);
        }
        let rejoined: String = lines.iter().map(|l| l.text()).collect();
        assert_eq!(rejoined, "Supercalifragilistic");
    }

    #[test]
    fn test_lines_never_exceed_width() {
        let text = "The town is divided into distinct zones, each with a different \
                    strategic purpose, and resources spawn during the day phase.";
        let lines = wrap(text, 150.0);
        assert!(lines.len() >= 3);
        for line in &lines {
            assert!(line.width <= 150.0 + 1e-9);
        }
    }

    #[test]
    fn test_bold_markup_widens_text() {
        let fc = FontContext::new();
        let tl = TextLayout::new();
        let regular = tl
            .natural_width(&fc, &plain("Central Safe Zone"), &helvetica(), 11.0)
            .unwrap();
        let bold = tl
            .natural_width(&fc, &plain("<b>Central Safe Zone</b>"), &helvetica(), 11.0)
            .unwrap();
        assert!(bold > regular);
    }

    #[test]
    fn test_markup_spans_and_entities() {
        let spans = parse_markup("<b>Label:</b> a &amp; b <i>x</i>");
        assert_eq!(spans.len(), 3);
        assert_eq!(spans[0].text, "Label:");
        assert!(spans[0].bold);
        assert_eq!(spans[1].text, " a & b ");
        assert!(!spans[1].bold);
        assert!(spans[2].italic);
    }

    #[test]
    fn test_ampersand_before_multibyte_text() {
        let spans = parse_markup("&éééé");
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].text, "&éééé");

        let spans = parse_markup("a &é; b &amp; ü&lt;");
        assert_eq!(spans[0].text, "a &é; b & ü<");
    }

    #[test]
    fn test_unknown_tag_is_literal() {
        let spans = parse_markup("a <font>b");
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].text, "a <font>b");
    }

    #[test]
    fn test_justify_spacing() {
        let lines = wrap("aa bb cc dd ee ff gg hh", 60.0);
        assert!(lines.len() > 1);
        let first = &lines[0];
        let extra = first.justify_spacing(60.0);
        assert!(extra >= 0.0);
        assert!((first.width + extra * first.space_count as f64 - 60.0).abs() < 1e-9);
        assert_eq!(lines.last().unwrap().justify_spacing(60.0), 0.0);
    }

    #[test]
    fn test_fragments_split_by_font() {
        let lines = TextLayout::new()
            .break_into_lines(
                &FontContext::new(),
                &plain("<b>Screen shake</b> on shooting"),
                &helvetica(),
                11.0,
                400.0,
            )
            .unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].fragments.len(), 2);
        assert!(lines[0].fragments[0].font.is_bold());
        assert!(!lines[0].fragments[1].font.is_bold());
    }
}
