//! GraphQL documents sent to the Admin API.

const PRODUCT_FIELDS: &str = r"
    id
    title
    handle
    description
    vendor
    productType
    tags
    status
    createdAt
    updatedAt
    publishedAt
    totalVariants
    collections(first: 10) {
      edges { node { id title handle } }
    }
    images(first: 10) {
      edges { node { id url altText } }
    }
    variants(first: 100) {
      edges {
        node {
          id
          title
          price
          compareAtPrice
          sku
          availableForSale
          selectedOptions { name value }
          image { id url altText }
        }
      }
    }
";

pub(crate) fn products_query() -> String {
    format!(
        "query getProducts($first: Int!, $after: String) {{
  products(first: $first, after: $after) {{
    edges {{ node {{ {PRODUCT_FIELDS} }} }}
    pageInfo {{ hasNextPage endCursor }}
  }}
}}"
    )
}

pub(crate) fn collection_products_query() -> String {
    format!(
        "query getCollectionProducts($id: ID!, $first: Int!, $after: String) {{
  collection(id: $id) {{
    products(first: $first, after: $after) {{
      edges {{ node {{ {PRODUCT_FIELDS} }} }}
      pageInfo {{ hasNextPage endCursor }}
    }}
  }}
}}"
    )
}

pub(crate) fn product_query() -> String {
    format!(
        "query getProduct($id: ID!) {{
  product(id: $id) {{ {PRODUCT_FIELDS} }}
}}"
    )
}

pub(crate) const COLLECTIONS_QUERY: &str = r"
query getCollections($first: Int!, $after: String) {
  collections(first: $first, after: $after) {
    edges { node { id title handle productsCount { count } } }
    pageInfo { hasNextPage endCursor }
  }
}
";
