use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Deserialize, ToSchema)]
pub struct AddToCartRequest {
    pub store_item_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateQuantityRequest {
    pub cart_item_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ApplyDiscountRequest {
    pub discount_value: i64,
}

/// Full cart snapshot as served to clients (and held in the cart cache).
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CartView {
    pub id: Uuid,
    pub items: Vec<CartItemView>,
    pub subtotal: i64,
    pub total_discount: i64,
    pub total_price: i64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CartItemView {
    pub id: Uuid,
    pub store_item_id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    /// Effective unit price at read time; not locked in until checkout.
    pub unit_price: i64,
    pub quantity: i32,
    pub total_price: i64,
}
