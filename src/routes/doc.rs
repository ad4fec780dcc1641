use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        auth::AddressList,
        cart::{CartItemView, CartView},
        catalog::{StoreItemList, StoreItemView},
        orders::{CheckoutResponse, OrderItemView, OrderList, OrderView, UpdateOrderStatusRequest},
        payments::{StartPaymentResponse, VerifyResponse},
    },
    models::{Address, Cart, Order, OrderItem, Payment, Store, User},
    response::{ApiResponse, Meta},
    routes::{addresses, admin, auth, cart, catalog, health, orders, params, payments},
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        auth::register,
        auth::login,
        addresses::list_addresses,
        addresses::create_address,
        catalog::list_items,
        catalog::get_item,
        catalog::create_item,
        catalog::update_item,
        catalog::delete_item,
        catalog::create_store,
        catalog::get_my_store,
        cart::get_cart,
        cart::add_to_cart,
        cart::update_quantity,
        cart::remove_item,
        cart::clear_cart,
        cart::apply_discount,
        orders::list_orders,
        orders::checkout,
        orders::get_order,
        payments::start_payment,
        payments::verify_payment,
        admin::list_all_orders,
        admin::update_order_status
    ),
    components(
        schemas(
            User,
            Address,
            Store,
            Cart,
            Order,
            OrderItem,
            Payment,
            AddressList,
            StoreItemView,
            StoreItemList,
            CartView,
            CartItemView,
            OrderView,
            OrderItemView,
            OrderList,
            CheckoutResponse,
            UpdateOrderStatusRequest,
            StartPaymentResponse,
            VerifyResponse,
            params::Pagination,
            params::ItemQuery,
            params::OrderListQuery,
            Meta,
            ApiResponse<CartView>,
            ApiResponse<StoreItemList>,
            ApiResponse<CheckoutResponse>,
            ApiResponse<OrderList>,
            ApiResponse<StartPaymentResponse>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Auth", description = "Authentication endpoints"),
        (name = "Addresses", description = "Shipping address endpoints"),
        (name = "Catalog", description = "Listing endpoints"),
        (name = "Stores", description = "Seller store endpoints"),
        (name = "Cart", description = "Cart endpoints"),
        (name = "Orders", description = "Order and checkout endpoints"),
        (name = "Payments", description = "Payment gateway endpoints"),
        (name = "Admin", description = "Admin endpoints"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
