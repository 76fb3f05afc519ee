//! Integration tests for `ShopifyClient` against a local wiremock server.

use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use varsync_core::CatalogSource;
use varsync_shopify::{ShopifyClient, ShopifyClientConfig, ShopifyError};

fn config(max_retries: u32) -> ShopifyClientConfig {
    ShopifyClientConfig {
        shop_domain: "test-shop.myshopify.com".to_owned(),
        access_token: "shpat_test".to_owned(),
        api_version: "2024-10".to_owned(),
        timeout_secs: 5,
        user_agent: "varsync-test/0.1".to_owned(),
        max_retries,
        backoff_base_ms: 0,
    }
}

/// Builds a client pointed at the mock server with no retries.
fn test_client(server: &MockServer) -> ShopifyClient {
    test_client_with_retries(server, 0)
}

fn test_client_with_retries(server: &MockServer, max_retries: u32) -> ShopifyClient {
    ShopifyClient::with_endpoint(
        &config(max_retries),
        &format!("{}/graphql.json", server.uri()),
    )
    .expect("failed to build test ShopifyClient")
}

fn product_node(id: u64, title: &str) -> serde_json::Value {
    json!({
        "id": format!("gid://shopify/Product/{id}"),
        "title": title,
        "handle": title.to_lowercase().replace(' ', "-"),
        "vendor": "Acme",
        "tags": [],
        "variants": { "edges": [
            { "node": {
                "id": format!("gid://shopify/ProductVariant/{id}1"),
                "title": "Small / Red",
                "price": "19.99",
                "compareAtPrice": null,
                "sku": null,
                "availableForSale": true,
                "selectedOptions": [
                    { "name": "Size", "value": "Small" },
                    { "name": "Color", "value": "Red" }
                ],
                "image": null
            } }
        ] }
    })
}

fn products_body(nodes: &[serde_json::Value], next: Option<&str>) -> serde_json::Value {
    let edges: Vec<_> = nodes.iter().map(|n| json!({ "node": n })).collect();
    json!({
        "data": {
            "products": {
                "edges": edges,
                "pageInfo": { "hasNextPage": next.is_some(), "endCursor": next }
            }
        }
    })
}

#[tokio::test]
async fn products_page_parses_nodes_and_sends_token() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/graphql.json"))
        .and(header("X-Shopify-Access-Token", "shpat_test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(products_body(
            &[product_node(1, "Linen Shirt"), product_node(2, "Wool Hat")],
            Some("cursor-2"),
        )))
        .expect(1)
        .mount(&server)
        .await;

    let page = test_client(&server)
        .products_page(None, 50)
        .await
        .expect("page should parse");

    assert_eq!(page.records.len(), 2);
    assert_eq!(page.records[0].title, "Linen Shirt");
    assert_eq!(page.next_cursor(), Some("cursor-2"));
}

#[tokio::test]
async fn products_page_sends_cursor_and_clamped_page_size() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/graphql.json"))
        .and(body_partial_json(
            json!({ "variables": { "first": 250, "after": "abc" } }),
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(products_body(&[], None)))
        .expect(1)
        .mount(&server)
        .await;

    let page = test_client(&server)
        .products_page(Some("abc"), 10_000)
        .await
        .expect("page should parse");
    assert!(page.records.is_empty());
    assert_eq!(page.next_cursor(), None);
}

#[tokio::test]
async fn retries_after_429_then_succeeds() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/graphql.json"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "2.0"))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/graphql.json"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(products_body(&[product_node(1, "Linen Shirt")], None)),
        )
        .mount(&server)
        .await;

    let page = test_client_with_retries(&server, 2)
        .products_page(None, 50)
        .await
        .expect("should succeed after one retry");
    assert_eq!(page.records.len(), 1);
}

#[tokio::test]
async fn returns_rate_limited_after_retries_exhausted() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/graphql.json"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "5"))
        .expect(3)
        .mount(&server)
        .await;

    let err = test_client_with_retries(&server, 2)
        .products_page(None, 50)
        .await
        .unwrap_err();

    assert!(
        matches!(
            err,
            ShopifyError::RateLimited {
                retry_after_secs: 5,
                ..
            }
        ),
        "expected RateLimited, got: {err:?}"
    );
}

#[tokio::test]
async fn throttled_graphql_error_is_retried() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/graphql.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "errors": [{ "message": "Throttled", "extensions": { "code": "THROTTLED" } }]
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/graphql.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(products_body(&[], None)))
        .mount(&server)
        .await;

    let page = test_client_with_retries(&server, 1)
        .products_page(None, 50)
        .await
        .expect("should succeed after throttle");
    assert!(page.records.is_empty());
}

#[tokio::test]
async fn graphql_errors_are_returned_without_retry() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/graphql.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": null,
            "errors": [
                { "message": "Field 'bogus' doesn't exist" },
                { "message": "Access denied" }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let err = test_client_with_retries(&server, 3)
        .products_page(None, 50)
        .await
        .unwrap_err();

    match err {
        ShopifyError::GraphQl { messages, .. } => {
            assert_eq!(messages, "Field 'bogus' doesn't exist; Access denied");
        }
        other => panic!("expected GraphQl, got: {other:?}"),
    }
}

#[tokio::test]
async fn server_error_is_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/graphql.json"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let err = test_client_with_retries(&server, 3)
        .products_page(None, 50)
        .await
        .unwrap_err();

    assert!(
        matches!(err, ShopifyError::UnexpectedStatus { status: 500, .. }),
        "expected UnexpectedStatus(500), got: {err:?}"
    );
}

#[tokio::test]
async fn malformed_body_is_a_deserialize_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/graphql.json"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let err = test_client(&server)
        .products_page(None, 50)
        .await
        .unwrap_err();
    assert!(
        matches!(err, ShopifyError::Deserialize { .. }),
        "expected Deserialize, got: {err:?}"
    );
}

#[tokio::test]
async fn missing_collection_is_collection_not_found() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/graphql.json"))
        .and(body_partial_json(
            json!({ "variables": { "id": "gid://shopify/Collection/404" } }),
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "collection": null }
        })))
        .mount(&server)
        .await;

    let err = test_client(&server)
        .collection_products_page("404", None, 50)
        .await
        .unwrap_err();

    match err {
        ShopifyError::CollectionNotFound { collection_id } => assert_eq!(collection_id, "404"),
        other => panic!("expected CollectionNotFound, got: {other:?}"),
    }
}

#[tokio::test]
async fn collection_products_page_returns_products() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/graphql.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "collection": {
                "products": {
                    "edges": [{ "node": product_node(7, "Beach Towel") }],
                    "pageInfo": { "hasNextPage": false, "endCursor": "c7" }
                }
            } }
        })))
        .mount(&server)
        .await;

    let page = test_client(&server)
        .collection_products_page("55", None, 50)
        .await
        .expect("collection page should parse");

    assert_eq!(page.records.len(), 1);
    // endCursor is ignored when hasNextPage is false.
    assert_eq!(page.next_cursor(), None);
}

#[tokio::test]
async fn fetch_collections_follows_every_page() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/graphql.json"))
        .and(body_partial_json(json!({ "variables": { "after": null } })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "collections": {
                "edges": [{ "node": {
                    "id": "gid://shopify/Collection/1",
                    "title": "Summer",
                    "handle": "summer",
                    "productsCount": { "count": 3 }
                } }],
                "pageInfo": { "hasNextPage": true, "endCursor": "c1" }
            } }
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/graphql.json"))
        .and(body_partial_json(json!({ "variables": { "after": "c1" } })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "collections": {
                "edges": [{ "node": {
                    "id": "gid://shopify/Collection/2",
                    "title": "Winter",
                    "handle": "winter",
                    "productsCount": null
                } }],
                "pageInfo": { "hasNextPage": false, "endCursor": null }
            } }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let collections = test_client(&server)
        .fetch_collections(50)
        .await
        .expect("collections should parse");

    assert_eq!(collections.len(), 2);
    assert_eq!(collections[0].id, "1");
    assert_eq!(collections[0].products_count, Some(3));
    assert_eq!(collections[1].handle, "winter");
    assert_eq!(collections[1].products_count, None);
}

#[tokio::test]
async fn transform_through_catalog_source() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/graphql.json"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(products_body(&[product_node(42, "Linen Shirt")], None)),
        )
        .mount(&server)
        .await;

    let client = test_client(&server);
    let page = client.fetch_product_page(None, 50).await.unwrap();
    let product = client
        .transform(page.records.into_iter().next().unwrap())
        .unwrap();

    assert_eq!(product.external_id, "42");
    assert_eq!(product.fields.vendor.as_deref(), Some("Acme"));
    assert_eq!(product.variants.len(), 1);
    assert_eq!(product.variants[0].option_value("Color"), Some("Red"));
}

#[tokio::test]
async fn product_lookup_uses_global_id() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/graphql.json"))
        .and(body_partial_json(
            json!({ "variables": { "id": "gid://shopify/Product/42" } }),
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "product": product_node(42, "Linen Shirt") }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let product = test_client(&server).product("42").await.unwrap();
    assert_eq!(product.external_id, "42");
    assert_eq!(product.variants[0].option_value("Size"), Some("Small"));
}

#[tokio::test]
async fn missing_product_is_product_not_found() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/graphql.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "product": null }
        })))
        .mount(&server)
        .await;

    let err = test_client(&server).product("404").await.unwrap_err();
    assert!(
        matches!(err, ShopifyError::ProductNotFound { ref external_id } if external_id == "404"),
        "expected ProductNotFound, got: {err:?}"
    );
}
