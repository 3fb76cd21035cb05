//! Change events announced after every successful mutation.

use serde::{Deserialize, Serialize};

use crate::entities::Product;
use crate::identity::ProductId;

/// Kind of mutation a change event announces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeKind {
    Created,
    Updated,
    Deleted,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Created => "created",
            ChangeKind::Updated => "updated",
            ChangeKind::Deleted => "deleted",
        }
    }
}

/// A mutation notification.
///
/// Consumers only ever see `payload`; `kind` and `product_id` drive logging
/// and partition selection on the producing side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub product_id: ProductId,
    pub payload: String,
}

impl ChangeEvent {
    pub fn created(product: &Product) -> Self {
        Self {
            kind: ChangeKind::Created,
            product_id: product.id,
            payload: format!("Product created: {}", product.name),
        }
    }

    pub fn updated(product: &Product) -> Self {
        Self {
            kind: ChangeKind::Updated,
            product_id: product.id,
            payload: format!("Product updated: {}", product.name),
        }
    }

    pub fn deleted(id: ProductId) -> Self {
        Self {
            kind: ChangeKind::Deleted,
            product_id: id,
            payload: format!("Product deleted with ID: {}", id),
        }
    }

    /// Partitioning key: the product id.
    pub fn key(&self) -> String {
        self.product_id.to_string()
    }
}
