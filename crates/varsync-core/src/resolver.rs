//! Exact-match variant resolution over a product's variant list.
//!
//! A variant matches a selection map when **every** one of its selected
//! options is present in the map with the same value. Partial selections that
//! leave one of a variant's dimensions unset never match that variant.

use std::cmp::Ordering;
use std::collections::HashMap;

use indexmap::IndexMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::classifier::{classify, is_numeric_size, OptionKind, VariantType};

/// Option name -> value chosen by the shopper.
pub type Selections = HashMap<String, String>;

/// Option name -> distinct values, both in first-seen order.
pub type OptionIndex = IndexMap<String, Vec<String>>;

/// Canonical order for named sizes. Matching is case-insensitive.
pub const SIZE_ORDER: &[&str] = &[
    "xxs", "xs", "s", "small", "m", "medium", "l", "large", "xl", "xxl", "xxxl",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectedOption {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantImage {
    pub id: Option<String>,
    pub url: String,
    pub alt_text: Option<String>,
}

/// A purchasable variant as delivered by the remote catalog. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variant {
    pub id: String,
    pub title: String,
    pub price: Decimal,
    pub compare_at_price: Option<Decimal>,
    pub sku: Option<String>,
    pub available_for_sale: Option<bool>,
    pub selected_options: Vec<SelectedOption>,
    pub image: Option<VariantImage>,
}

impl Variant {
    /// Whether every one of this variant's options is satisfied by `selections`.
    #[must_use]
    pub fn matches(&self, selections: &Selections) -> bool {
        self.selected_options
            .iter()
            .all(|o| selections.get(&o.name).is_some_and(|v| *v == o.value))
    }

    #[must_use]
    pub fn option_value(&self, name: &str) -> Option<&str> {
        self.selected_options
            .iter()
            .find(|o| o.name == name)
            .map(|o| o.value.as_str())
    }
}

/// Builds the option index for a variant list.
#[must_use]
pub fn index_options(variants: &[Variant]) -> OptionIndex {
    let mut index = OptionIndex::new();
    for option in variants.iter().flat_map(|v| &v.selected_options) {
        let values = index.entry(option.name.clone()).or_default();
        if !values.contains(&option.value) {
            values.push(option.value.clone());
        }
    }
    index
}

/// Returns the first variant, in list order, matched by `selections`.
#[must_use]
pub fn resolve<'a>(variants: &'a [Variant], selections: &Selections) -> Option<&'a Variant> {
    variants.iter().find(|v| v.matches(selections))
}

/// Selections seeded from the first variant. Empty for an empty list.
#[must_use]
pub fn initial_selections(variants: &[Variant]) -> Selections {
    variants
        .first()
        .map(|v| {
            v.selected_options
                .iter()
                .map(|o| (o.name.clone(), o.value.clone()))
                .collect()
        })
        .unwrap_or_default()
}

/// Stateful selection for one product: the shopper's choices plus the
/// variant those choices currently point at.
#[derive(Debug, Clone)]
pub struct VariantSelection<'a> {
    variants: &'a [Variant],
    selections: Selections,
    current: Option<&'a Variant>,
}

impl<'a> VariantSelection<'a> {
    #[must_use]
    pub fn new(variants: &'a [Variant]) -> Self {
        Self {
            variants,
            selections: initial_selections(variants),
            current: variants.first(),
        }
    }

    /// Records a choice. When the updated selections match a variant it
    /// becomes current; otherwise the previous variant stays current.
    pub fn select(&mut self, name: &str, value: &str) -> Option<&'a Variant> {
        self.selections.insert(name.to_owned(), value.to_owned());
        if let Some(found) = resolve(self.variants, &self.selections) {
            self.current = Some(found);
        }
        self.current
    }

    #[must_use]
    pub fn current(&self) -> Option<&'a Variant> {
        self.current
    }

    #[must_use]
    pub fn selections(&self) -> &Selections {
        &self.selections
    }

    /// Whether the current selection contradicts the current variant, i.e.
    /// the last choice had no matching variant.
    #[must_use]
    pub fn is_unmatched(&self) -> bool {
        self.current.is_some_and(|v| !v.matches(&self.selections))
    }
}

/// One option dimension ready for rendering.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptionDimension {
    pub name: String,
    pub variant_type: VariantType,
    pub kind: OptionKind,
    pub values: Vec<String>,
}

/// Indexes and classifies every dimension. Size dimensions come back in
/// [`order_sizes`] order; the rest keep first-seen order.
#[must_use]
pub fn option_dimensions(variants: &[Variant]) -> Vec<OptionDimension> {
    index_options(variants)
        .into_iter()
        .map(|(name, values)| {
            let variant_type = classify(&name, &values).variant_type;
            let values = if variant_type == VariantType::Size {
                order_sizes(&values)
            } else {
                values
            };
            OptionDimension {
                name,
                variant_type,
                kind: OptionKind::from(variant_type),
                values,
            }
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum SizeGroup {
    Named(usize),
    Unrecognized,
    Numeric,
}

/// Sorts size values: canonical named sizes first, then unrecognized names in
/// their original order, then purely numeric sizes ascending. The original
/// strings are returned untouched.
#[must_use]
pub fn order_sizes<S: AsRef<str>>(values: &[S]) -> Vec<String> {
    let mut keyed: Vec<(SizeGroup, &str)> = values
        .iter()
        .map(|v| {
            let v = v.as_ref();
            let group = if is_numeric_size(v) {
                SizeGroup::Numeric
            } else {
                let lower = v.trim().to_lowercase();
                SIZE_ORDER
                    .iter()
                    .position(|s| *s == lower)
                    .map_or(SizeGroup::Unrecognized, SizeGroup::Named)
            };
            (group, v)
        })
        .collect();

    // Stable sort keeps unrecognized names and numeric ties in input order.
    keyed.sort_by(|(ga, a), (gb, b)| match ga.cmp(gb) {
        Ordering::Equal if *ga == SizeGroup::Numeric => numeric(a).total_cmp(&numeric(b)),
        other => other,
    });

    keyed.into_iter().map(|(_, v)| v.to_owned()).collect()
}

fn numeric(value: &str) -> f64 {
    value.trim().parse().unwrap_or(f64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn variant(id: &str, options: &[(&str, &str)]) -> Variant {
        Variant {
            id: id.to_owned(),
            title: id.to_owned(),
            price: Decimal::new(1999, 2),
            compare_at_price: None,
            sku: None,
            available_for_sale: Some(true),
            selected_options: options
                .iter()
                .map(|(n, v)| SelectedOption {
                    name: (*n).to_owned(),
                    value: (*v).to_owned(),
                })
                .collect(),
            image: None,
        }
    }

    fn selections(pairs: &[(&str, &str)]) -> Selections {
        pairs
            .iter()
            .map(|(n, v)| ((*n).to_owned(), (*v).to_owned()))
            .collect()
    }

    fn shirt() -> Vec<Variant> {
        vec![
            variant("1", &[("Size", "S"), ("Color", "Red")]),
            variant("2", &[("Size", "M"), ("Color", "Blue")]),
            variant("3", &[("Size", "M"), ("Color", "Red")]),
        ]
    }

    #[test]
    fn index_options_preserves_first_seen_order() {
        let variants = vec![
            variant("1", &[("Size", "S"), ("Color", "Red")]),
            variant("2", &[("Size", "M"), ("Color", "Blue")]),
        ];
        let index = index_options(&variants);
        let names: Vec<&String> = index.keys().collect();
        assert_eq!(names, ["Size", "Color"]);
        assert_eq!(index["Size"], ["S", "M"]);
        assert_eq!(index["Color"], ["Red", "Blue"]);
    }

    #[test]
    fn index_options_dedupes_values() {
        let index = index_options(&shirt());
        assert_eq!(index["Size"], ["S", "M"]);
        assert_eq!(index["Color"], ["Red", "Blue"]);
    }

    #[test]
    fn resolve_unique_match() {
        let variants = shirt();
        let found = resolve(&variants, &selections(&[("Size", "M"), ("Color", "Red")]));
        assert_eq!(found.map(|v| v.id.as_str()), Some("3"));
    }

    #[test]
    fn resolve_none_when_nothing_matches() {
        let variants = shirt();
        assert!(resolve(&variants, &selections(&[("Size", "S"), ("Color", "Blue")])).is_none());
    }

    #[test]
    fn partial_selection_never_matches() {
        let variants = shirt();
        assert!(resolve(&variants, &selections(&[("Size", "M")])).is_none());
    }

    #[test]
    fn extra_selection_keys_are_ignored() {
        let variants = shirt();
        let found = resolve(
            &variants,
            &selections(&[("Size", "S"), ("Color", "Red"), ("Engraving", "Yes")]),
        );
        assert_eq!(found.map(|v| v.id.as_str()), Some("1"));
    }

    #[test]
    fn ties_return_first_in_list_order() {
        let variants = vec![
            variant("a", &[("Size", "S")]),
            variant("b", &[("Size", "S")]),
        ];
        let found = resolve(&variants, &selections(&[("Size", "S")]));
        assert_eq!(found.map(|v| v.id.as_str()), Some("a"));
    }

    #[test]
    fn initial_selections_come_from_first_variant() {
        let seeded = initial_selections(&shirt());
        assert_eq!(seeded, selections(&[("Size", "S"), ("Color", "Red")]));
        assert!(initial_selections(&[]).is_empty());
    }

    #[test]
    fn selection_keeps_previous_variant_on_miss() {
        let variants = shirt();
        let mut sel = VariantSelection::new(&variants);
        assert_eq!(sel.current().map(|v| v.id.as_str()), Some("1"));

        // S + Blue does not exist.
        let current = sel.select("Color", "Blue");
        assert_eq!(current.map(|v| v.id.as_str()), Some("1"));
        assert!(sel.is_unmatched());

        let current = sel.select("Size", "M");
        assert_eq!(current.map(|v| v.id.as_str()), Some("2"));
        assert!(!sel.is_unmatched());
        assert_eq!(sel.selections()["Color"], "Blue");
    }

    #[test]
    fn selection_on_empty_list() {
        let mut sel = VariantSelection::new(&[]);
        assert!(sel.current().is_none());
        assert!(sel.select("Size", "S").is_none());
    }

    #[test]
    fn order_sizes_named_then_numeric() {
        assert_eq!(
            order_sizes(&["L", "XS", "M", "10", "2"]),
            ["XS", "M", "L", "2", "10"]
        );
    }

    #[test]
    fn order_sizes_unrecognized_names_stay_stable_before_numbers() {
        assert_eq!(
            order_sizes(&["8", "One Size", "Large", "Petite", "small", "7.5"]),
            ["small", "Large", "One Size", "Petite", "7.5", "8"]
        );
    }

    #[test]
    fn order_sizes_keeps_original_spelling() {
        assert_eq!(order_sizes(&["10.0", "xl", "XXS"]), ["XXS", "xl", "10.0"]);
    }

    #[test]
    fn option_dimensions_classify_and_order_sizes() {
        let variants = vec![
            variant("1", &[("Size", "L"), ("Color", "Red")]),
            variant("2", &[("Size", "S"), ("Color", "Blue")]),
        ];
        let dims = option_dimensions(&variants);
        assert_eq!(dims.len(), 2);
        assert_eq!(dims[0].kind, OptionKind::SizeSelector);
        assert_eq!(dims[0].values, ["S", "L"]);
        assert_eq!(dims[1].kind, OptionKind::ColorSwatch);
        assert_eq!(dims[1].values, ["Red", "Blue"]);
    }
}
