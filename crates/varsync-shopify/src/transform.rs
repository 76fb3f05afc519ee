//! Maps GraphQL products onto catalog fields and transient variants.

use varsync_core::{
    CollectionRef, ProductFields, SelectedOption, ShopifyData, ShopifyImage, SourceCollection,
    SourceProduct, Variant, VariantImage,
};

use crate::error::ShopifyError;
use crate::gid::strip_gid;
use crate::types::{RemoteCollection, RemoteImage, RemoteProduct};

/// Transforms one remote product.
///
/// # Errors
///
/// Returns [`ShopifyError::Transform`] when the product id is not a product
/// gid, the title is blank, or a variant carries a blank option name.
pub fn transform_product(remote: RemoteProduct) -> Result<SourceProduct, ShopifyError> {
    let external_id = strip_gid("Product", &remote.id)
        .ok_or_else(|| ShopifyError::Transform {
            external_id: remote.id.clone(),
            reason: "not a product id".to_owned(),
        })?
        .to_owned();

    if remote.title.trim().is_empty() {
        return Err(ShopifyError::Transform {
            external_id,
            reason: "blank title".to_owned(),
        });
    }

    let collections = remote
        .collections
        .into_nodes()
        .map(|c| CollectionRef {
            id: strip_gid("Collection", &c.id)
                .map_or_else(|| c.id.clone(), str::to_owned),
            title: c.title,
            handle: c.handle,
        })
        .collect();

    let images = remote
        .images
        .into_nodes()
        .map(|img| ShopifyImage {
            id: img.id.unwrap_or_default(),
            src: img.url,
            alt_text: img.alt_text,
        })
        .collect();

    let mut variants = Vec::new();
    for v in remote.variants.into_nodes() {
        let mut selected_options = Vec::with_capacity(v.selected_options.len());
        for o in v.selected_options {
            if o.name.trim().is_empty() {
                return Err(ShopifyError::Transform {
                    external_id,
                    reason: format!("variant {} has an option with a blank name", v.id),
                });
            }
            selected_options.push(SelectedOption {
                name: o.name,
                value: o.value,
            });
        }
        variants.push(Variant {
            id: v.id,
            title: v.title,
            price: v.price,
            compare_at_price: v.compare_at_price,
            sku: v.sku,
            available_for_sale: v.available_for_sale,
            selected_options,
            image: v.image.map(variant_image),
        });
    }

    let total_variants = remote
        .total_variants
        .unwrap_or_else(|| u32::try_from(variants.len()).unwrap_or(u32::MAX));

    Ok(SourceProduct {
        external_id,
        fields: ProductFields {
            title: remote.title,
            handle: remote.handle,
            description: remote.description.filter(|d| !d.is_empty()),
            vendor: remote.vendor.filter(|v| !v.is_empty()),
            product_type: remote.product_type.filter(|t| !t.is_empty()),
            tags: remote.tags,
            collections,
            shopify_data: ShopifyData {
                created_at: remote.created_at,
                updated_at: remote.updated_at,
                published_at: remote.published_at,
                status: remote.status,
                total_variants,
                images,
            },
        },
        variants,
    })
}

fn variant_image(img: RemoteImage) -> VariantImage {
    VariantImage {
        id: img.id,
        url: img.url,
        alt_text: img.alt_text,
    }
}

#[must_use]
pub fn transform_collection(remote: RemoteCollection) -> SourceCollection {
    SourceCollection {
        id: strip_gid("Collection", &remote.id).map_or_else(|| remote.id.clone(), str::to_owned),
        title: remote.title,
        handle: remote.handle,
        products_count: remote.products_count.map(|c| c.count),
    }
}
