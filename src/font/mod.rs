//! # Font Management
//!
//! The text-metrics backend. Layout only ever asks one question of fonts:
//! how wide is this run of text? [`TextMetrics`] is that seam, and
//! [`FontContext`] answers it for the standard PDF fonts (built-in width
//! tables) and for TrueType fonts registered at runtime (parsed with
//! ttf-parser).
//!
//! Text is encoded as WinAnsi by the PDF writer, so custom font metrics are
//! only collected for characters that encoding can represent.

pub mod metrics;

pub use metrics::StandardFontMetrics;
use std::collections::HashMap;

use crate::error::{QuireError, Result};

/// The text-metrics collaborator used by the measurer.
///
/// Implementations must be deterministic and free of side effects: the
/// same text, font and size always measure the same.
pub trait TextMetrics {
    /// Width of `text` set on one line in `font` at `font_size`, in points.
    fn measure_text_width(&self, text: &str, font: &FontKey, font_size: f64) -> Result<f64>;
}

/// A font family plus the weight/slant variant.
#[derive(Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct FontKey {
    pub family: String,
    pub weight: u32,
    pub italic: bool,
}

impl FontKey {
    pub fn new(family: &str, weight: u32, italic: bool) -> Self {
        Self {
            family: family.to_string(),
            weight: if weight >= 600 { 700 } else { 400 },
            italic,
        }
    }

    /// Parse a PostScript-style font name such as `Helvetica-BoldOblique`
    /// or `Times-Roman` into family and variant.
    pub fn from_name(name: &str) -> Self {
        const SUFFIXES: [(&str, u32, bool); 7] = [
            ("-BoldOblique", 700, true),
            ("-BoldItalic", 700, true),
            ("-Bold", 700, false),
            ("-Oblique", 400, true),
            ("-Italic", 400, true),
            ("-Roman", 400, false),
            ("-Regular", 400, false),
        ];
        for (suffix, weight, italic) in SUFFIXES {
            if let Some(family) = name.strip_suffix(suffix) {
                if !family.is_empty() {
                    return Self::new(family, weight, italic);
                }
            }
        }
        Self::new(name, 400, false)
    }

    /// The same family with bold and/or italic switched on.
    pub fn with_emphasis(&self, bold: bool, italic: bool) -> Self {
        Self {
            family: self.family.clone(),
            weight: if bold { 700 } else { self.weight },
            italic: self.italic || italic,
        }
    }

    pub fn is_bold(&self) -> bool {
        self.weight >= 700
    }
}

#[derive(Debug, Clone)]
pub enum FontData {
    /// One of the standard PDF fonts. No embedding needed.
    Standard(StandardFont),
    /// A TrueType font that gets embedded.
    Custom {
        data: Vec<u8>,
        metrics: CustomFontMetrics,
    },
}

/// Parsed metrics from a TrueType font via ttf-parser.
#[derive(Debug, Clone)]
pub struct CustomFontMetrics {
    pub units_per_em: u16,
    pub advance_widths: HashMap<char, u16>,
    pub default_advance: u16,
    pub ascender: i16,
    pub descender: i16,
    pub cap_height: i16,
    pub bbox: [i16; 4],
}

impl CustomFontMetrics {
    /// Get the advance width of a character in points.
    pub fn char_width(&self, ch: char, font_size: f64) -> f64 {
        let w = self
            .advance_widths
            .get(&ch)
            .copied()
            .unwrap_or(self.default_advance);
        (w as f64 / self.units_per_em as f64) * font_size
    }

    /// Parse metrics from font data using ttf-parser.
    pub fn from_font_data(data: &[u8]) -> Option<Self> {
        let face = ttf_parser::Face::parse(data, 0).ok()?;
        let units_per_em = face.units_per_em();
        let ascender = face.ascender();
        let descender = face.descender();
        let cap_height = face.capital_height().unwrap_or(ascender);
        let rect = face.global_bounding_box();

        let mut advance_widths = HashMap::new();
        let mut default_advance = 0u16;

        for ch in winansi_chars() {
            if let Some(glyph_id) = face.glyph_index(ch) {
                let advance = face.glyph_hor_advance(glyph_id).unwrap_or(0);
                advance_widths.insert(ch, advance);
                if ch == ' ' {
                    default_advance = advance;
                }
            }
        }

        if default_advance == 0 {
            default_advance = units_per_em / 2;
        }

        Some(CustomFontMetrics {
            units_per_em,
            advance_widths,
            default_advance,
            ascender,
            descender,
            cap_height,
            bbox: [rect.x_min, rect.y_min, rect.x_max, rect.y_max],
        })
    }

    /// Scale a font-unit value to 1/1000 em, the unit PDF font dictionaries use.
    pub fn to_pdf_units(&self, v: i32) -> i32 {
        (v as f64 * 1000.0 / self.units_per_em as f64).round() as i32
    }
}

/// The standard PDF fonts Quire knows metrics for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StandardFont {
    Helvetica,
    HelveticaBold,
    HelveticaOblique,
    HelveticaBoldOblique,
    TimesRoman,
    TimesBold,
    TimesItalic,
    TimesBoldItalic,
    Courier,
    CourierBold,
    CourierOblique,
    CourierBoldOblique,
}

impl StandardFont {
    /// The PDF name for this font.
    pub fn pdf_name(&self) -> &'static str {
        match self {
            Self::Helvetica => "Helvetica",
            Self::HelveticaBold => "Helvetica-Bold",
            Self::HelveticaOblique => "Helvetica-Oblique",
            Self::HelveticaBoldOblique => "Helvetica-BoldOblique",
            Self::TimesRoman => "Times-Roman",
            Self::TimesBold => "Times-Bold",
            Self::TimesItalic => "Times-Italic",
            Self::TimesBoldItalic => "Times-BoldItalic",
            Self::Courier => "Courier",
            Self::CourierBold => "Courier-Bold",
            Self::CourierOblique => "Courier-Oblique",
            Self::CourierBoldOblique => "Courier-BoldOblique",
        }
    }

    pub fn metrics(&self) -> &'static StandardFontMetrics {
        match self {
            Self::Helvetica | Self::HelveticaOblique => &metrics::HELVETICA,
            Self::HelveticaBold | Self::HelveticaBoldOblique => &metrics::HELVETICA_BOLD,
            Self::TimesRoman | Self::TimesItalic => &metrics::TIMES_ROMAN,
            Self::TimesBold | Self::TimesBoldItalic => &metrics::TIMES_BOLD,
            Self::Courier
            | Self::CourierBold
            | Self::CourierOblique
            | Self::CourierBoldOblique => &metrics::COURIER,
        }
    }
}

/// A font registry that maps font family + weight + style to font data.
pub struct FontRegistry {
    fonts: HashMap<FontKey, FontData>,
}

impl Default for FontRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl FontRegistry {
    pub fn new() -> Self {
        let mut fonts = HashMap::new();

        let standard_mappings = vec![
            (("Helvetica", 400, false), StandardFont::Helvetica),
            (("Helvetica", 700, false), StandardFont::HelveticaBold),
            (("Helvetica", 400, true), StandardFont::HelveticaOblique),
            (("Helvetica", 700, true), StandardFont::HelveticaBoldOblique),
            (("Times", 400, false), StandardFont::TimesRoman),
            (("Times", 700, false), StandardFont::TimesBold),
            (("Times", 400, true), StandardFont::TimesItalic),
            (("Times", 700, true), StandardFont::TimesBoldItalic),
            (("Courier", 400, false), StandardFont::Courier),
            (("Courier", 700, false), StandardFont::CourierBold),
            (("Courier", 400, true), StandardFont::CourierOblique),
            (("Courier", 700, true), StandardFont::CourierBoldOblique),
        ];

        for ((family, weight, italic), font) in standard_mappings {
            fonts.insert(FontKey::new(family, weight, italic), FontData::Standard(font));
        }

        Self { fonts }
    }

    /// Look up a font, falling back to the regular variant of the family
    /// and then to Helvetica.
    pub fn resolve(&self, key: &FontKey) -> &FontData {
        if let Some(font) = self.fonts.get(key) {
            return font;
        }

        let regular = FontKey::new(&key.family, 400, false);
        if let Some(font) = self.fonts.get(&regular) {
            return font;
        }

        let fallback = FontKey::new("Helvetica", key.weight, key.italic);
        self.fonts
            .get(&fallback)
            .or_else(|| self.fonts.get(&FontKey::new("Helvetica", 400, false)))
            .expect("Helvetica must be registered")
    }

    /// The key a lookup actually lands on after fallbacks.
    pub fn resolved_key(&self, key: &FontKey) -> FontKey {
        if self.fonts.contains_key(key) {
            return key.clone();
        }
        let regular = FontKey::new(&key.family, 400, false);
        if self.fonts.contains_key(&regular) {
            return regular;
        }
        FontKey::new("Helvetica", key.weight, key.italic)
    }

    /// Register a TrueType font for `family` in the given variant.
    pub fn register(&mut self, family: &str, bold: bool, italic: bool, data: Vec<u8>) -> Result<()> {
        let metrics = CustomFontMetrics::from_font_data(&data).ok_or_else(|| {
            QuireError::Backend(format!("font data for '{}' could not be parsed", family))
        })?;
        let key = FontKey::new(family, if bold { 700 } else { 400 }, italic);
        log::debug!("registered custom font {:?}", key);
        self.fonts.insert(key, FontData::Custom { data, metrics });
        Ok(())
    }

    /// Iterate over all registered fonts.
    pub fn iter(&self) -> impl Iterator<Item = (&FontKey, &FontData)> {
        self.fonts.iter()
    }
}

/// Shared font context used by measurement and PDF serialization.
pub struct FontContext {
    registry: FontRegistry,
}

impl Default for FontContext {
    fn default() -> Self {
        Self::new()
    }
}

impl FontContext {
    pub fn new() -> Self {
        Self {
            registry: FontRegistry::new(),
        }
    }

    /// Get the advance width of a single character in points.
    pub fn char_width(&self, ch: char, key: &FontKey, font_size: f64) -> f64 {
        match self.registry.resolve(key) {
            FontData::Standard(std_font) => std_font.metrics().char_width(ch, font_size),
            FontData::Custom { metrics, .. } => metrics.char_width(ch, font_size),
        }
    }

    /// Measure the width of a string in points.
    pub fn measure_string(&self, text: &str, key: &FontKey, font_size: f64) -> f64 {
        match self.registry.resolve(key) {
            FontData::Standard(std_font) => std_font.metrics().measure_string(text, font_size),
            FontData::Custom { metrics, .. } => {
                text.chars().map(|ch| metrics.char_width(ch, font_size)).sum()
            }
        }
    }

    /// Distance from the top of the em box to the baseline, in points.
    pub fn ascent(&self, key: &FontKey, font_size: f64) -> f64 {
        match self.registry.resolve(key) {
            FontData::Standard(std_font) => std_font.metrics().ascender as f64 * font_size / 1000.0,
            FontData::Custom { metrics, .. } => {
                metrics.ascender as f64 * font_size / metrics.units_per_em as f64
            }
        }
    }

    /// Resolve a font key to its font data.
    pub fn resolve(&self, key: &FontKey) -> &FontData {
        self.registry.resolve(key)
    }

    /// Access the underlying font registry.
    pub fn registry(&self) -> &FontRegistry {
        &self.registry
    }

    /// Access the underlying font registry mutably.
    pub fn registry_mut(&mut self) -> &mut FontRegistry {
        &mut self.registry
    }
}

impl TextMetrics for FontContext {
    fn measure_text_width(&self, text: &str, font: &FontKey, font_size: f64) -> Result<f64> {
        Ok(self.measure_string(text, font, font_size))
    }
}

const WINANSI_SPECIALS: [(char, u8); 27] = [
    ('\u{20AC}', 0x80),
    ('\u{201A}', 0x82),
    ('\u{0192}', 0x83),
    ('\u{201E}', 0x84),
    ('\u{2026}', 0x85),
    ('\u{2020}', 0x86),
    ('\u{2021}', 0x87),
    ('\u{02C6}', 0x88),
    ('\u{2030}', 0x89),
    ('\u{0160}', 0x8A),
    ('\u{2039}', 0x8B),
    ('\u{0152}', 0x8C),
    ('\u{017D}', 0x8E),
    ('\u{2018}', 0x91),
    ('\u{2019}', 0x92),
    ('\u{201C}', 0x93),
    ('\u{201D}', 0x94),
    ('\u{2022}', 0x95),
    ('\u{2013}', 0x96),
    ('\u{2014}', 0x97),
    ('\u{02DC}', 0x98),
    ('\u{2122}', 0x99),
    ('\u{0161}', 0x9A),
    ('\u{203A}', 0x9B),
    ('\u{0153}', 0x9C),
    ('\u{017E}', 0x9E),
    ('\u{0178}', 0x9F),
];

/// Map a Unicode codepoint to a WinAnsiEncoding byte value.
///
/// WinAnsiEncoding is based on Windows-1252. Codepoints in 0x20..=0x7E and
/// 0xA0..=0xFF map directly; 0x80..=0x9F hold smart quotes, bullets, dashes.
pub fn unicode_to_winansi(ch: char) -> Option<u8> {
    let cp = ch as u32;
    if (0x20..=0x7E).contains(&cp) || (0xA0..=0xFF).contains(&cp) {
        return Some(cp as u8);
    }
    WINANSI_SPECIALS
        .iter()
        .find(|(c, _)| *c == ch)
        .map(|(_, b)| *b)
}

/// Decode a WinAnsi byte back to its character.
pub fn winansi_to_unicode(byte: u8) -> Option<char> {
    match byte {
        0x20..=0x7E | 0xA0..=0xFF => Some(byte as char),
        _ => WINANSI_SPECIALS
            .iter()
            .find(|(_, b)| *b == byte)
            .map(|(c, _)| *c),
    }
}

/// Every character WinAnsi can encode.
fn winansi_chars() -> impl Iterator<Item = char> {
    (0x20u8..=0xFF).filter_map(winansi_to_unicode)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn helvetica() -> FontKey {
        FontKey::from_name("Helvetica")
    }

    #[test]
    fn test_font_context_helvetica() {
        let ctx = FontContext::new();
        let w = ctx.char_width(' ', &helvetica(), 12.0);
        assert!((w - 3.336).abs() < 0.001);
    }

    #[test]
    fn test_font_context_bold_wider() {
        let ctx = FontContext::new();
        let regular = ctx.char_width('b', &helvetica(), 12.0);
        let bold = ctx.char_width('b', &FontKey::from_name("Helvetica-Bold"), 12.0);
        assert!(bold > regular, "Bold b should be wider than regular b");
    }

    #[test]
    fn test_font_context_fallback() {
        let ctx = FontContext::new();
        let w1 = ctx.char_width('A', &helvetica(), 12.0);
        let w2 = ctx.char_width('A', &FontKey::from_name("UnknownFont"), 12.0);
        assert!((w1 - w2).abs() < 0.001);
    }

    #[test]
    fn test_font_name_parsing() {
        assert_eq!(
            FontKey::from_name("Helvetica-BoldOblique"),
            FontKey::new("Helvetica", 700, true)
        );
        assert_eq!(FontKey::from_name("Times-Roman"), FontKey::new("Times", 400, false));
        assert_eq!(FontKey::from_name("Inter"), FontKey::new("Inter", 400, false));
        assert_eq!(FontKey::from_name("-Bold"), FontKey::new("-Bold", 400, false));
    }

    #[test]
    fn test_emphasis_keeps_existing_bold() {
        let bold = FontKey::from_name("Helvetica-Bold");
        assert!(bold.with_emphasis(false, false).is_bold());
        let italic = helvetica().with_emphasis(false, true);
        assert!(italic.italic && !italic.is_bold());
    }

    #[test]
    fn test_text_metrics_trait() {
        let ctx = FontContext::new();
        let w = ctx
            .measure_text_width("Hello", &helvetica(), 10.0)
            .unwrap();
        // H e l l o = 722 + 556 + 222 + 222 + 556
        assert!((w - 22.78).abs() < 1e-9);
    }

    #[test]
    fn test_register_rejects_garbage() {
        let mut ctx = FontContext::new();
        let err = ctx
            .registry_mut()
            .register("Broken", false, false, vec![0, 1, 2, 3])
            .unwrap_err();
        assert!(matches!(err, QuireError::Backend(_)));
    }

    #[test]
    fn test_winansi_round_trip_specials() {
        assert_eq!(unicode_to_winansi('\u{2022}'), Some(0x95));
        assert_eq!(winansi_to_unicode(0x96), Some('\u{2013}'));
        assert_eq!(unicode_to_winansi('\u{4E2D}'), None);
        assert_eq!(winansi_chars().count(), 95 + 96 + 27);
    }
}
