//! Option classifier: maps a raw option dimension (name + observed values) to a
//! semantic [`VariantType`].
//!
//! This is the only classifier in the workspace. The sync pipeline uses it to
//! record detections and the resolver uses it (through [`OptionKind`]) to pick
//! the widget control for a dimension, so the two can never disagree.
//!
//! ## Rules, first match wins
//!
//! 1. name contains `color` / `colour` -> [`VariantType::Color`], confidence 1.0
//! 2. name contains `size`, or every value is a size token
//!    (`xs|s|m|l|xl|xxl` or a plain number) -> [`VariantType::Size`]
//! 3. name contains `material` / `fabric` -> [`VariantType::Material`]
//! 4. name contains `style` / `type` -> [`VariantType::Style`]
//! 5. any value is a hex color code or a name in [`NAMED_COLORS`] -> [`VariantType::Color`]
//! 6. otherwise [`VariantType::Custom`]
//!
//! Scores are flat heuristics, not calibrated probabilities.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::CoreError;

/// Confidence attached to every match except a color keyword in the name.
pub const DEFAULT_CONFIDENCE: f64 = 0.9;

/// Confidence for a color keyword in the option name.
pub const NAME_COLOR_CONFIDENCE: f64 = 1.0;

static SIZE_TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(xs|s|m|l|xl|xxl)$").expect("valid regex"));
static NUMERIC_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+(\.\d+)?$").expect("valid regex"));
static HEX_COLOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#?[0-9a-fA-F]{6}$").expect("valid regex"));

/// Named colors with their swatch hex. The value-based color rule and the
/// swatch widget both read this table.
pub const NAMED_COLORS: &[(&str, &str)] = &[
    ("red", "#ff0000"),
    ("blue", "#0000ff"),
    ("green", "#00ff00"),
    ("black", "#000000"),
    ("white", "#ffffff"),
    ("yellow", "#ffff00"),
    ("pink", "#ffc0cb"),
    ("purple", "#800080"),
    ("orange", "#ffa500"),
    ("gray", "#808080"),
    ("grey", "#808080"),
    ("brown", "#a52a2a"),
    ("navy", "#000080"),
    ("teal", "#008080"),
    ("lime", "#00ff00"),
    ("maroon", "#800000"),
    ("olive", "#808000"),
    ("silver", "#c0c0c0"),
];

/// Hex for a named color, case-insensitive.
#[must_use]
pub fn named_color_hex(value: &str) -> Option<&'static str> {
    let value = value.trim();
    NAMED_COLORS
        .iter()
        .find(|(name, _)| value.eq_ignore_ascii_case(name))
        .map(|(_, hex)| *hex)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariantType {
    Color,
    Size,
    Material,
    Style,
    Custom,
}

impl VariantType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            VariantType::Color => "color",
            VariantType::Size => "size",
            VariantType::Material => "material",
            VariantType::Style => "style",
            VariantType::Custom => "custom",
        }
    }
}

impl std::fmt::Display for VariantType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for VariantType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "color" => Ok(VariantType::Color),
            "size" => Ok(VariantType::Size),
            "material" => Ok(VariantType::Material),
            "style" => Ok(VariantType::Style),
            // The storefront widget historically called the no-match case "text".
            "custom" | "text" => Ok(VariantType::Custom),
            other => Err(CoreError::UnknownValue {
                kind: "variant type",
                value: other.to_owned(),
            }),
        }
    }
}

/// Result of classifying one option dimension.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Classification {
    pub variant_type: VariantType,
    pub confidence: f64,
}

impl Classification {
    fn new(variant_type: VariantType, confidence: f64) -> Self {
        Self {
            variant_type,
            confidence,
        }
    }
}

/// Classifies an option dimension from its name and observed values.
#[must_use]
pub fn classify<S: AsRef<str>>(name: &str, values: &[S]) -> Classification {
    let name = name.to_lowercase();

    if name.contains("color") || name.contains("colour") {
        return Classification::new(VariantType::Color, NAME_COLOR_CONFIDENCE);
    }

    if name.contains("size") || all_size_tokens(values) {
        return Classification::new(VariantType::Size, DEFAULT_CONFIDENCE);
    }

    if name.contains("material") || name.contains("fabric") {
        return Classification::new(VariantType::Material, DEFAULT_CONFIDENCE);
    }

    if name.contains("style") || name.contains("type") {
        return Classification::new(VariantType::Style, DEFAULT_CONFIDENCE);
    }

    if values.iter().any(|v| looks_like_color(v.as_ref())) {
        return Classification::new(VariantType::Color, DEFAULT_CONFIDENCE);
    }

    Classification::new(VariantType::Custom, DEFAULT_CONFIDENCE)
}

/// `true` when the set is non-empty and every value is a size token or number.
///
/// An empty set never qualifies; "all of nothing" is not evidence of a size axis.
fn all_size_tokens<S: AsRef<str>>(values: &[S]) -> bool {
    !values.is_empty()
        && values.iter().all(|v| {
            let v = v.as_ref().trim();
            SIZE_TOKEN_RE.is_match(v) || NUMERIC_RE.is_match(v)
        })
}

fn looks_like_color(value: &str) -> bool {
    let value = value.trim();
    HEX_COLOR_RE.is_match(value) || named_color_hex(value).is_some()
}

/// Returns `true` for values like `"10"` or `"9.5"`.
#[must_use]
pub fn is_numeric_size(value: &str) -> bool {
    NUMERIC_RE.is_match(value.trim())
}

/// Widget control used to render an option dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OptionKind {
    ColorSwatch,
    SizeSelector,
    TextButtons,
}

impl From<VariantType> for OptionKind {
    fn from(variant_type: VariantType) -> Self {
        match variant_type {
            VariantType::Color => OptionKind::ColorSwatch,
            VariantType::Size => OptionKind::SizeSelector,
            VariantType::Material | VariantType::Style | VariantType::Custom => {
                OptionKind::TextButtons
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NONE: &[&str] = &[];

    #[test]
    fn color_name_wins_regardless_of_values() {
        for name in ["Color", "COLOUR", "colour", "Strap color", "ColorWay"] {
            let c = classify(name, &["10", "XL"]);
            assert_eq!(c.variant_type, VariantType::Color, "name {name}");
            assert!((c.confidence - 1.0).abs() < f64::EPSILON);
        }
    }

    #[test]
    fn size_from_name() {
        let c = classify("Shoe Size", &["Narrow", "Wide"]);
        assert_eq!(c.variant_type, VariantType::Size);
        assert!((c.confidence - DEFAULT_CONFIDENCE).abs() < f64::EPSILON);
    }

    #[test]
    fn size_from_values_when_every_value_is_a_token() {
        assert_eq!(
            classify("Option1", &["S", "m", "XL"]).variant_type,
            VariantType::Size
        );
        assert_eq!(
            classify("Length", &["30", "32", "34.5"]).variant_type,
            VariantType::Size
        );
    }

    #[test]
    fn size_requires_every_value_to_match() {
        assert_eq!(
            classify("Option1", &["S", "Large-ish"]).variant_type,
            VariantType::Custom
        );
    }

    #[test]
    fn size_values_take_priority_over_material_name() {
        assert_eq!(
            classify("Material", &["10", "12"]).variant_type,
            VariantType::Size
        );
    }

    #[test]
    fn material_and_fabric() {
        assert_eq!(
            classify("Material", &["Cotton", "Linen"]).variant_type,
            VariantType::Material
        );
        assert_eq!(
            classify("Fabric", &["Wool"]).variant_type,
            VariantType::Material
        );
    }

    #[test]
    fn style_and_type() {
        assert_eq!(
            classify("Style", &["Classic", "Modern"]).variant_type,
            VariantType::Style
        );
        assert_eq!(
            classify("Bottle Type", &["Glass"]).variant_type,
            VariantType::Style
        );
    }

    #[test]
    fn color_from_named_values() {
        let c = classify("Finish", &["Matte", "Red"]);
        assert_eq!(c.variant_type, VariantType::Color);
        assert!((c.confidence - DEFAULT_CONFIDENCE).abs() < f64::EPSILON);
    }

    #[test]
    fn every_swatch_name_classifies_as_color() {
        assert_eq!(
            classify("Shade", &["Maroon", "Olive"]).variant_type,
            VariantType::Color
        );
        for (name, _) in NAMED_COLORS {
            assert_eq!(
                classify("Finish", &[*name]).variant_type,
                VariantType::Color,
                "{name}"
            );
            assert_ne!(crate::display::swatch_hex(name), crate::display::FALLBACK_SWATCH);
        }
    }

    #[test]
    fn color_from_hex_values() {
        assert_eq!(
            classify("Finish", &["#1a2b3c"]).variant_type,
            VariantType::Color
        );
        assert_eq!(
            classify("Finish", &["FFAA00"]).variant_type,
            VariantType::Color
        );
    }

    #[test]
    fn name_signal_beats_color_values() {
        assert_eq!(
            classify("Style", &["Red", "Blue"]).variant_type,
            VariantType::Style
        );
    }

    #[test]
    fn custom_when_nothing_matches() {
        assert_eq!(
            classify("Flavor", &["Blood Orange", "Ginger"]).variant_type,
            VariantType::Custom
        );
    }

    #[test]
    fn empty_values_fall_through_to_custom() {
        assert_eq!(classify("Title", NONE).variant_type, VariantType::Custom);
    }

    #[test]
    fn text_label_parses_as_custom() {
        assert_eq!("text".parse::<VariantType>().unwrap(), VariantType::Custom);
        assert_eq!("size".parse::<VariantType>().unwrap(), VariantType::Size);
        assert!("shape".parse::<VariantType>().is_err());
    }

    #[test]
    fn option_kind_mapping() {
        assert_eq!(OptionKind::from(VariantType::Color), OptionKind::ColorSwatch);
        assert_eq!(OptionKind::from(VariantType::Size), OptionKind::SizeSelector);
        assert_eq!(OptionKind::from(VariantType::Style), OptionKind::TextButtons);
        assert_eq!(OptionKind::from(VariantType::Custom), OptionKind::TextButtons);
    }
}
