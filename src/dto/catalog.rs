use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateStoreRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateStoreItemRequest {
    pub product_name: String,
    pub product_description: Option<String>,
    pub price: i64,
    #[serde(default)]
    pub discount_price: i64,
    pub stock: i32,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateStoreItemRequest {
    pub price: Option<i64>,
    pub discount_price: Option<i64>,
    pub stock: Option<i32>,
    pub is_active: Option<bool>,
}

/// Public listing view: store item joined to its product.
#[derive(Debug, Serialize, FromRow, ToSchema)]
pub struct StoreItemView {
    pub id: Uuid,
    pub store_id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub product_description: Option<String>,
    pub price: i64,
    pub discount_price: i64,
    pub stock: i32,
    pub is_active: bool,
}

impl StoreItemView {
    pub fn effective_price(&self) -> i64 {
        crate::models::effective_price(self.price, self.discount_price)
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StoreItemList {
    pub items: Vec<StoreItemView>,
}
