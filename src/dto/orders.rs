use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::{Address, OrderStatus, Payment};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CheckoutRequest {
    pub address_id: Uuid,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateOrderStatusRequest {
    pub status: OrderStatus,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderItemView {
    pub id: Uuid,
    pub store_item_id: Uuid,
    pub product_name: String,
    /// Unit price frozen at checkout.
    pub price: i64,
    pub quantity: i32,
    pub total_price: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderView {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub address: Address,
    pub status: OrderStatus,
    pub total_price: i64,
    pub total_discount: i64,
    pub items: Vec<OrderItemView>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CheckoutResponse {
    pub order: OrderView,
    pub payment: Payment,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderList {
    pub items: Vec<crate::models::Order>,
}
