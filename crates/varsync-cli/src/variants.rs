//! Storefront-side commands: `options` renders a product's option
//! dimensions and `resolve` walks a selection to a variant.

use std::path::Path;

use varsync_core::display::swatch_needs_outline;
use varsync_core::{
    format_usd, option_dimensions, swatch_hex, AppConfig, OptionKind, PriceSummary, Variant,
    VariantSelection,
};

use crate::remote::build_shopify_client;

/// Loads a product's variants from a JSON file (an array of variants) or,
/// without a file, from Shopify.
async fn load_variants(
    config: &AppConfig,
    product: &str,
    file: Option<&Path>,
) -> anyhow::Result<Vec<Variant>> {
    if let Some(path) = file {
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
        return parse_variants(&raw);
    }

    let client = build_shopify_client(config)?;
    let remote = client.product(product).await?;
    tracing::debug!(
        product = %remote.external_id,
        variants = remote.variants.len(),
        "fetched product"
    );
    Ok(remote.variants)
}

fn parse_variants(raw: &str) -> anyhow::Result<Vec<Variant>> {
    serde_json::from_str(raw).map_err(|e| anyhow::anyhow!("invalid variants JSON: {e}"))
}

/// Prints each option dimension with the control the widget would use.
///
/// # Errors
///
/// Returns an error if the variants cannot be loaded.
pub(crate) async fn run_options(
    config: &AppConfig,
    product: &str,
    file: Option<&Path>,
) -> anyhow::Result<()> {
    let variants = load_variants(config, product, file).await?;
    if variants.is_empty() {
        println!("product {product} has no variants");
        return Ok(());
    }

    for dimension in option_dimensions(&variants) {
        println!(
            "{} ({}, {})",
            dimension.name,
            dimension.variant_type,
            kind_label(dimension.kind)
        );
        for value in &dimension.values {
            if dimension.kind == OptionKind::ColorSwatch {
                println!("  {}", swatch_line(value));
            } else {
                println!("  {value}");
            }
        }
    }
    Ok(())
}

/// Applies each `Name=Value` choice in order, starting from the first
/// variant, and prints the variant the selection lands on.
///
/// # Errors
///
/// Returns an error if the variants cannot be loaded.
pub(crate) async fn run_resolve(
    config: &AppConfig,
    product: &str,
    choices: &[(String, String)],
    file: Option<&Path>,
) -> anyhow::Result<()> {
    let variants = load_variants(config, product, file).await?;
    let mut selection = VariantSelection::new(&variants);
    for (name, value) in choices {
        selection.select(name, value);
    }

    let Some(variant) = selection.current() else {
        println!("product {product} has no variants");
        return Ok(());
    };
    if selection.is_unmatched() {
        eprintln!("warning: no variant matches the selection; showing the last match");
    }
    print_variant(variant);
    Ok(())
}

/// `value` padded, then its swatch hex, flagged when the swatch needs an
/// outline to stay visible.
fn swatch_line(value: &str) -> String {
    let hex = swatch_hex(value);
    if swatch_needs_outline(hex) {
        format!("{value:<20}{hex} (outlined)")
    } else {
        format!("{value:<20}{hex}")
    }
}

fn print_variant(variant: &Variant) {
    println!("variant   {}", variant.id);
    println!("title     {}", variant.title);
    for option in &variant.selected_options {
        println!("  {:<10}{}", option.name, option.value);
    }
    if let Some(sku) = &variant.sku {
        println!("sku       {sku}");
    }

    let price = PriceSummary::for_variant(variant);
    match (price.compare_at_price, price.savings_percent) {
        (Some(compare_at), Some(percent)) if price.on_sale => println!(
            "price     {} (was {}, save {percent}%)",
            format_usd(price.price),
            format_usd(compare_at)
        ),
        _ => println!("price     {}", format_usd(price.price)),
    }

    let availability = match variant.available_for_sale {
        Some(true) => "in stock",
        Some(false) => "sold out",
        None => "unknown",
    };
    println!("available {availability}");
    if let Some(image) = &variant.image {
        println!("image     {}", image.url);
    }
}

fn kind_label(kind: OptionKind) -> &'static str {
    match kind {
        OptionKind::ColorSwatch => "swatches",
        OptionKind::SizeSelector => "size buttons",
        OptionKind::TextButtons => "buttons",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHIRT: &str = r#"[
        {
            "id": "v1",
            "title": "Red / S",
            "price": "20.00",
            "compare_at_price": null,
            "sku": null,
            "available_for_sale": true,
            "selected_options": [
                { "name": "Color", "value": "Red" },
                { "name": "Size", "value": "S" }
            ],
            "image": null
        },
        {
            "id": "v2",
            "title": "Blue / M",
            "price": "18.00",
            "compare_at_price": "24.00",
            "sku": "SH-BL-M",
            "available_for_sale": false,
            "selected_options": [
                { "name": "Color", "value": "Blue" },
                { "name": "Size", "value": "M" }
            ],
            "image": null
        }
    ]"#;

    #[test]
    fn parses_variant_file() {
        let variants = parse_variants(SHIRT).unwrap();
        assert_eq!(variants.len(), 2);
        assert_eq!(variants[1].option_value("Size"), Some("M"));
    }

    #[test]
    fn rejects_malformed_variant_file() {
        assert!(parse_variants(r#"{"id": "v1"}"#).is_err());
    }

    #[test]
    fn selection_walk_lands_on_matching_variant() {
        let variants = parse_variants(SHIRT).unwrap();
        let mut selection = VariantSelection::new(&variants);
        selection.select("Color", "Blue");
        selection.select("Size", "M");
        assert_eq!(selection.current().map(|v| v.id.as_str()), Some("v2"));
        assert!(!selection.is_unmatched());
    }

    #[test]
    fn white_swatch_is_outlined() {
        assert_eq!(swatch_line("White"), format!("{:<20}#ffffff (outlined)", "White"));
        assert_eq!(swatch_line("Navy"), format!("{:<20}#000080", "Navy"));
    }

    #[test]
    fn kind_labels() {
        assert_eq!(kind_label(OptionKind::ColorSwatch), "swatches");
        assert_eq!(kind_label(OptionKind::TextButtons), "buttons");
    }
}
