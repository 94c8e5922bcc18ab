//! # Style System
//!
//! Named paragraph styles in the spirit of a print style sheet: font,
//! leading, color, alignment, indents and vertical spacing. A style may name
//! a parent and override only the attributes it sets; everything else is
//! inherited. Inheritance is an explicit attribute merge done once, when the
//! registry is built, so resolving a style during layout is a lookup.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::{QuireError, Result};

/// A style as written in the style sheet. Unset attributes inherit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Style {
    /// Name of the style this one inherits from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,

    // ── Typography ─────────────────────────────────────────────
    /// Font name, e.g. "Helvetica", "Helvetica-Bold", "Times-Roman", or a
    /// registered custom family.
    pub font_family: Option<String>,
    /// Font size in points.
    pub font_size: Option<f64>,
    /// Baseline-to-baseline distance in points.
    pub leading: Option<f64>,
    /// Horizontal alignment of lines within the text block.
    pub alignment: Option<TextAlign>,

    // ── Color ──────────────────────────────────────────────────
    pub text_color: Option<Color>,
    pub background_color: Option<Color>,

    // ── Spacing ────────────────────────────────────────────────
    /// Left indent of the text block.
    pub indent: Option<f64>,
    /// Right indent of the text block.
    pub right_indent: Option<f64>,
    /// Where list bullets are drawn, measured from the left edge.
    pub bullet_indent: Option<f64>,
    pub space_before: Option<f64>,
    pub space_after: Option<f64>,

    // ── Page Behavior ──────────────────────────────────────────
    /// Don't leave this block as the last thing on a page; move it to the
    /// next page together with the start of the following block.
    pub keep_with_next: Option<bool>,
}

impl Style {
    /// Merge `child` over `parent`: every attribute `child` sets wins, every
    /// attribute it leaves unset comes from `parent`.
    pub fn merge(parent: &Style, child: &Style) -> Style {
        Style {
            parent: child.parent.clone(),
            font_family: child.font_family.clone().or_else(|| parent.font_family.clone()),
            font_size: child.font_size.or(parent.font_size),
            leading: child.leading.or(parent.leading),
            alignment: child.alignment.or(parent.alignment),
            text_color: child.text_color.or(parent.text_color),
            background_color: child.background_color.or(parent.background_color),
            indent: child.indent.or(parent.indent),
            right_indent: child.right_indent.or(parent.right_indent),
            bullet_indent: child.bullet_indent.or(parent.bullet_indent),
            space_before: child.space_before.or(parent.space_before),
            space_after: child.space_after.or(parent.space_after),
            keep_with_next: child.keep_with_next.or(parent.keep_with_next),
        }
    }

    /// Fill every unset attribute with its default.
    ///
    /// Leading defaults to 1.2 × font size, computed after the font size
    /// is known, so a child that only changes the size gets matching leading.
    pub fn resolve(&self, name: &str) -> ResolvedStyle {
        let font_size = self.font_size.unwrap_or(DEFAULT_FONT_SIZE);
        ResolvedStyle {
            name: name.to_string(),
            font_family: self
                .font_family
                .clone()
                .unwrap_or_else(|| DEFAULT_FONT_FAMILY.to_string()),
            font_size,
            leading: self.leading.unwrap_or(font_size * 1.2),
            alignment: self.alignment.unwrap_or_default(),
            text_color: self.text_color.unwrap_or(Color::BLACK),
            background_color: self.background_color,
            indent: self.indent.unwrap_or(0.0),
            right_indent: self.right_indent.unwrap_or(0.0),
            bullet_indent: self.bullet_indent.unwrap_or(0.0),
            space_before: self.space_before.unwrap_or(0.0),
            space_after: self.space_after.unwrap_or(0.0),
            keep_with_next: self.keep_with_next.unwrap_or(false),
        }
    }
}

pub const DEFAULT_FONT_FAMILY: &str = "Helvetica";
pub const DEFAULT_FONT_SIZE: f64 = 10.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextAlign {
    #[default]
    Left,
    Center,
    Right,
    #[serde(alias = "justified")]
    Justify,
}

/// An RGB color with components in 0.0 - 1.0.
///
/// Deserializes from `"#1a1a2e"`, `"#fff"` or `{ "r": .., "g": .., "b": .. }`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ColorRepr")]
pub struct Color {
    pub r: f64,
    pub g: f64,
    pub b: f64,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ColorRepr {
    Hex(String),
    Rgb { r: f64, g: f64, b: f64 },
}

impl TryFrom<ColorRepr> for Color {
    type Error = String;

    fn try_from(repr: ColorRepr) -> std::result::Result<Self, Self::Error> {
        match repr {
            ColorRepr::Hex(s) => {
                Color::parse_hex(&s).ok_or_else(|| format!("invalid hex color '{}'", s))
            }
            ColorRepr::Rgb { r, g, b } => Ok(Color::rgb(r, g, b)),
        }
    }
}

impl Color {
    pub const BLACK: Color = Color {
        r: 0.0,
        g: 0.0,
        b: 0.0,
    };
    pub const WHITE: Color = Color {
        r: 1.0,
        g: 1.0,
        b: 1.0,
    };

    pub fn rgb(r: f64, g: f64, b: f64) -> Self {
        Self { r, g, b }
    }

    /// Parse `#rrggbb` or `#rgb`. Returns `None` for anything else.
    pub fn parse_hex(hex: &str) -> Option<Self> {
        let hex = hex.trim_start_matches('#');
        if !hex.is_ascii() {
            return None;
        }
        let (r, g, b) = match hex.len() {
            3 => (
                u8::from_str_radix(&hex[0..1].repeat(2), 16).ok()?,
                u8::from_str_radix(&hex[1..2].repeat(2), 16).ok()?,
                u8::from_str_radix(&hex[2..3].repeat(2), 16).ok()?,
            ),
            6 => (
                u8::from_str_radix(&hex[0..2], 16).ok()?,
                u8::from_str_radix(&hex[2..4], 16).ok()?,
                u8::from_str_radix(&hex[4..6], 16).ok()?,
            ),
            _ => return None,
        };
        Some(Self {
            r: r as f64 / 255.0,
            g: g as f64 / 255.0,
            b: b as f64 / 255.0,
        })
    }

    /// Like [`Color::parse_hex`], falling back to black.
    pub fn hex(hex: &str) -> Self {
        Self::parse_hex(hex).unwrap_or(Color::BLACK)
    }
}

impl Default for Color {
    fn default() -> Self {
        Color::BLACK
    }
}

/// Resolved style: every attribute concrete. This is what the measurer,
/// paginator and writer work with.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedStyle {
    pub name: String,
    pub font_family: String,
    pub font_size: f64,
    pub leading: f64,
    pub alignment: TextAlign,
    pub text_color: Color,
    pub background_color: Option<Color>,
    pub indent: f64,
    pub right_indent: f64,
    pub bullet_indent: f64,
    pub space_before: f64,
    pub space_after: f64,
    pub keep_with_next: bool,
}

impl Default for ResolvedStyle {
    fn default() -> Self {
        Style::default().resolve("")
    }
}

/// An immutable set of named styles with inheritance already applied.
#[derive(Debug, Clone, Default)]
pub struct StyleRegistry {
    resolved: HashMap<String, ResolvedStyle>,
}

/// Collects styles before the registry is frozen.
#[derive(Debug, Default)]
pub struct StyleRegistryBuilder {
    styles: BTreeMap<String, Style>,
}

impl StyleRegistryBuilder {
    /// Add (or replace) a named style.
    pub fn style(mut self, name: &str, style: Style) -> Self {
        self.styles.insert(name.to_string(), style);
        self
    }

    /// Resolve every inheritance chain and freeze the registry.
    ///
    /// Fails with `UnknownStyle` when a parent is missing and with
    /// `InvalidStyle` when the parent links form a cycle.
    pub fn build(self) -> Result<StyleRegistry> {
        let mut resolved = HashMap::with_capacity(self.styles.len());
        for name in self.styles.keys() {
            let merged = flatten_chain(&self.styles, name)?;
            resolved.insert(name.clone(), merged.resolve(name));
        }
        log::debug!("style registry built with {} styles", resolved.len());
        Ok(StyleRegistry { resolved })
    }
}

/// Walk `name`'s parent links and merge root-first.
fn flatten_chain(styles: &BTreeMap<String, Style>, name: &str) -> Result<Style> {
    let mut chain: Vec<&Style> = Vec::new();
    let mut seen: HashSet<&str> = HashSet::new();
    let mut current = name;

    loop {
        if !seen.insert(current) {
            return Err(QuireError::InvalidStyle(format!(
                "style '{}' inherits from itself through '{}'",
                name, current
            )));
        }
        let style = styles.get(current).ok_or_else(|| QuireError::UnknownStyle {
            style: current.to_string(),
            block: None,
        })?;
        chain.push(style);
        match style.parent.as_deref() {
            Some(parent) => current = parent,
            None => break,
        }
    }

    Ok(chain
        .into_iter()
        .rev()
        .fold(Style::default(), |acc, style| Style::merge(&acc, style)))
}

impl StyleRegistry {
    pub fn builder() -> StyleRegistryBuilder {
        StyleRegistryBuilder::default()
    }

    /// Build a registry from a name → style table (the JSON `styles` section).
    pub fn from_styles(styles: BTreeMap<String, Style>) -> Result<Self> {
        StyleRegistryBuilder { styles }.build()
    }

    /// Look up a resolved style by name.
    pub fn resolve(&self, name: &str) -> Result<&ResolvedStyle> {
        self.resolved.get(name).ok_or_else(|| QuireError::UnknownStyle {
            style: name.to_string(),
            block: None,
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.resolved.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.resolved.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolved.is_empty()
    }

    /// A small report style sheet: body text, title, two heading levels,
    /// bullets and table cells.
    pub fn sample() -> Self {
        let navy = Color::hex("#1a1a2e");
        let builder = StyleRegistry::builder()
            .style(
                "Normal",
                Style {
                    font_family: Some("Helvetica".to_string()),
                    font_size: Some(10.0),
                    leading: Some(12.0),
                    ..Default::default()
                },
            )
            .style(
                "Body",
                Style {
                    parent: Some("Normal".to_string()),
                    font_size: Some(11.0),
                    leading: Some(15.0),
                    space_after: Some(8.0),
                    alignment: Some(TextAlign::Justify),
                    ..Default::default()
                },
            )
            .style(
                "Title",
                Style {
                    parent: Some("Normal".to_string()),
                    font_family: Some("Helvetica-Bold".to_string()),
                    font_size: Some(22.0),
                    leading: Some(26.0),
                    alignment: Some(TextAlign::Center),
                    text_color: Some(navy),
                    space_after: Some(6.0),
                    ..Default::default()
                },
            )
            .style(
                "Heading1",
                Style {
                    parent: Some("Normal".to_string()),
                    font_family: Some("Helvetica-Bold".to_string()),
                    font_size: Some(16.0),
                    leading: Some(19.0),
                    text_color: Some(navy),
                    space_before: Some(18.0),
                    space_after: Some(8.0),
                    keep_with_next: Some(true),
                    ..Default::default()
                },
            )
            .style(
                "Heading2",
                Style {
                    parent: Some("Heading1".to_string()),
                    font_size: Some(13.0),
                    leading: Some(16.0),
                    text_color: Some(Color::hex("#2d3436")),
                    space_before: Some(12.0),
                    space_after: Some(6.0),
                    ..Default::default()
                },
            )
            .style(
                "Bullet",
                Style {
                    parent: Some("Body".to_string()),
                    indent: Some(20.0),
                    bullet_indent: Some(8.0),
                    space_after: Some(4.0),
                    ..Default::default()
                },
            )
            .style(
                "TableCell",
                Style {
                    parent: Some("Normal".to_string()),
                    alignment: Some(TextAlign::Left),
                    ..Default::default()
                },
            )
            .style(
                "TableHeader",
                Style {
                    parent: Some("TableCell".to_string()),
                    font_family: Some("Helvetica-Bold".to_string()),
                    text_color: Some(Color::WHITE),
                    background_color: Some(navy),
                    ..Default::default()
                },
            );

        builder
            .build()
            .expect("sample style sheet parents must all be registered")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn styled(parent: Option<&str>, font_size: Option<f64>) -> Style {
        Style {
            parent: parent.map(str::to_string),
            font_size,
            ..Default::default()
        }
    }

    #[test]
    fn merge_child_overrides_parent() {
        let parent = Style {
            font_size: Some(11.0),
            leading: Some(15.0),
            alignment: Some(TextAlign::Justify),
            ..Default::default()
        };
        let child = Style {
            font_size: Some(13.0),
            ..Default::default()
        };
        let merged = Style::merge(&parent, &child);
        assert_eq!(merged.font_size, Some(13.0));
        assert_eq!(merged.leading, Some(15.0));
        assert_eq!(merged.alignment, Some(TextAlign::Justify));
    }

    #[test]
    fn leading_defaults_from_font_size() {
        let resolved = styled(None, Some(20.0)).resolve("Big");
        assert!((resolved.leading - 24.0).abs() < 1e-9);
        assert_eq!(resolved.font_family, "Helvetica");
    }

    #[test]
    fn chain_inherits_through_two_levels() {
        let registry = StyleRegistry::builder()
            .style(
                "Base",
                Style {
                    font_family: Some("Times-Roman".to_string()),
                    text_color: Some(Color::hex("#555555")),
                    ..Default::default()
                },
            )
            .style("Mid", styled(Some("Base"), Some(12.0)))
            .style("Leaf", styled(Some("Mid"), None))
            .build()
            .unwrap();

        let leaf = registry.resolve("Leaf").unwrap();
        assert_eq!(leaf.font_family, "Times-Roman");
        assert_eq!(leaf.font_size, 12.0);
        assert_eq!(leaf.text_color, Color::hex("#555555"));
        assert_eq!(leaf.name, "Leaf");
    }

    #[test]
    fn missing_parent_is_unknown_style() {
        let err = StyleRegistry::builder()
            .style("Orphan", styled(Some("Nope"), None))
            .build()
            .unwrap_err();
        assert!(matches!(err, QuireError::UnknownStyle { ref style, .. } if style == "Nope"));
    }

    #[test]
    fn cycle_is_rejected() {
        let err = StyleRegistry::builder()
            .style("A", styled(Some("B"), None))
            .style("B", styled(Some("A"), None))
            .build()
            .unwrap_err();
        assert!(matches!(err, QuireError::InvalidStyle(_)));
    }

    #[test]
    fn resolve_unknown_fails() {
        let registry = StyleRegistry::sample();
        assert!(registry.resolve("Body").is_ok());
        assert!(matches!(
            registry.resolve("Missing"),
            Err(QuireError::UnknownStyle { .. })
        ));
    }

    #[test]
    fn sample_headings_keep_with_next() {
        let registry = StyleRegistry::sample();
        let h2 = registry.resolve("Heading2").unwrap();
        assert!(h2.keep_with_next);
        assert_eq!(h2.font_family, "Helvetica-Bold");
        assert_eq!(h2.font_size, 13.0);
    }

    #[test]
    fn color_from_json_hex_and_object() {
        let hex: Color = serde_json::from_str("\"#ffffff\"").unwrap();
        assert_eq!(hex, Color::WHITE);
        let short: Color = serde_json::from_str("\"#000\"").unwrap();
        assert_eq!(short, Color::BLACK);
        let obj: Color = serde_json::from_str(r#"{"r": 1, "g": 0, "b": 0}"#).unwrap();
        assert_eq!(obj, Color::rgb(1.0, 0.0, 0.0));
        assert!(serde_json::from_str::<Color>("\"#12\"").is_err());
    }

    #[test]
    fn alignment_accepts_justified() {
        let a: TextAlign = serde_json::from_str("\"justified\"").unwrap();
        assert_eq!(a, TextAlign::Justify);
    }
}
