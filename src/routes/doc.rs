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
        display::{DisplaySnapshot, ShowOrderRequest},
        orders::{CreateOrderRequest, CreatedOrder, MarkPaidRequest, OrderItemInput, OrderList, OrderWithItems},
    },
    models::{DisplayPayload, Order, OrderItem, OrderStatus, Payment},
    response::{ApiResponse, Meta},
    routes::{display, health, orders, params, terminals},
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
        orders::create_order,
        orders::list_orders,
        orders::get_order,
        orders::pay_order,
        orders::cancel_order,
        terminals::show_order,
        terminals::clear_terminal,
        display::snapshot,
    ),
    components(
        schemas(
            Order,
            OrderItem,
            OrderStatus,
            Payment,
            DisplayPayload,
            CreateOrderRequest,
            OrderItemInput,
            CreatedOrder,
            MarkPaidRequest,
            OrderList,
            OrderWithItems,
            ShowOrderRequest,
            DisplaySnapshot,
            params::OrderListQuery,
            Meta,
            ApiResponse<CreatedOrder>,
            ApiResponse<OrderWithItems>,
            ApiResponse<OrderList>,
            ApiResponse<DisplaySnapshot>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Orders", description = "Order lifecycle endpoints"),
        (name = "Terminals", description = "Terminal display control endpoints"),
        (name = "Display", description = "Customer display snapshot endpoint"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
