//! Product record and its transfer object.
//!
//! `Product` is owned by the record store. Everything that crosses a
//! boundary (cache entries, API bodies, event construction) uses
//! `ProductDto`, a plain serializable copy.

use serde::{Deserialize, Serialize};

use crate::identity::{Price, ProductId};

/// A persisted product record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub price: Price,
    pub category: String,
}

impl Product {
    /// Apply the mutable fields of an update request.
    ///
    /// Only `name` and `price` change; the category is left as stored.
    pub fn apply_update(&mut self, dto: &ProductDto) {
        self.name = dto.name.clone();
        self.price = dto.price;
    }

    pub fn to_dto(&self) -> ProductDto {
        ProductDto::from(self)
    }
}

/// A product that has not been assigned an identity yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub price: Price,
    pub category: String,
}

impl NewProduct {
    /// Attach the identity handed out by the store.
    pub fn with_id(self, id: ProductId) -> Product {
        Product {
            id,
            name: self.name,
            price: self.price,
            category: self.category,
        }
    }
}

/// Serializable projection of [`Product`].
///
/// `id` is absent on create requests; `category` may be omitted by update
/// requests, which never change it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductDto {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ProductId>,
    pub name: String,
    pub price: Price,
    #[serde(default)]
    pub category: String,
}

impl ProductDto {
    pub fn new(name: impl Into<String>, price: Price, category: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            price,
            category: category.into(),
        }
    }

    /// Drop any client-supplied id; the store assigns identities.
    pub fn into_new_product(self) -> NewProduct {
        NewProduct {
            name: self.name,
            price: self.price,
            category: self.category,
        }
    }
}

impl From<&Product> for ProductDto {
    fn from(product: &Product) -> Self {
        Self {
            id: Some(product.id),
            name: product.name.clone(),
            price: product.price,
            category: product.category.clone(),
        }
    }
}

impl From<Product> for ProductDto {
    fn from(product: Product) -> Self {
        Self {
            id: Some(product.id),
            name: product.name,
            price: product.price,
            category: product.category,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Product {
        Product {
            id: ProductId::new(1),
            name: "A".to_string(),
            price: Price::from_minor_units(10),
            category: "x".to_string(),
        }
    }

    #[test]
    fn test_apply_update_keeps_category() {
        let mut product = sample();
        let update = ProductDto::new("B", Price::from_minor_units(20), "");
        product.apply_update(&update);

        assert_eq!(product.id, ProductId::new(1));
        assert_eq!(product.name, "B");
        assert_eq!(product.price, Price::from_minor_units(20));
        assert_eq!(product.category, "x");
    }

    #[test]
    fn test_into_new_product_ignores_client_id() {
        let mut dto = ProductDto::new("A", Price::from_minor_units(10), "x");
        dto.id = Some(ProductId::new(99));
        let new = dto.into_new_product();
        let product = new.with_id(ProductId::new(3));
        assert_eq!(product.id, ProductId::new(3));
    }

    #[test]
    fn test_update_body_without_category_deserializes() {
        let dto: ProductDto = serde_json::from_str(r#"{"name":"B","price":20}"#).unwrap();
        assert_eq!(dto.id, None);
        assert_eq!(dto.category, "");
    }
}

#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// A DTO survives JSON value conversion unchanged, the same path
        /// cache entries take.
        #[test]
        fn prop_dto_json_value_roundtrip(
            id in proptest::option::of(any::<i64>()),
            name in ".{0,32}",
            price in any::<i64>(),
            category in "[a-z]{0,12}",
        ) {
            let dto = ProductDto {
                id: id.map(ProductId::new),
                name,
                price: Price::from_minor_units(price),
                category,
            };
            let value = serde_json::to_value(&dto).unwrap();
            let back: ProductDto = serde_json::from_value(value).unwrap();
            prop_assert_eq!(back, dto);
        }
    }
}
