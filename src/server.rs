//! # Server Configuration
//!
//! Router assembly, shared application state and the OpenAPI document.

use std::sync::Arc;

use axum::{
    Router, middleware,
    routing::{get, post, put},
};
use sea_orm::DatabaseConnection;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use utoipa::openapi::security::{ApiKey, ApiKeyValue, HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

use crate::auth::{API_KEY_HEADER, auth_middleware};
use crate::config::AppConfig;
use crate::handlers::{
    self, credit_grants, customers, entitlements, environments, features, invoices, meters,
    payments, plans, prices, secrets, subscriptions, tasks, wallets,
};
use crate::services::{
    EntitlementService, InvoiceService, PaymentService, SecretService, SubscriptionService,
    WalletService,
};
use crate::telemetry::trace_id_middleware;

/// Application state containing shared resources
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: Arc<DatabaseConnection>,
    pub invoices: InvoiceService,
    pub subscriptions: SubscriptionService,
    pub wallets: WalletService,
    pub payments: PaymentService,
    pub entitlements: EntitlementService,
    pub secrets: SecretService,
}

impl AppState {
    pub fn new(config: Arc<AppConfig>, db: DatabaseConnection) -> Self {
        let db = Arc::new(db);
        let invoices = InvoiceService::new(db.clone(), config.billing.clone());
        let wallets = WalletService::new(db.clone(), config.billing.wallet_credit_page_size);
        let subscriptions = SubscriptionService::new(db.clone(), invoices.clone(), wallets.clone());
        let payments = PaymentService::new(db.clone(), invoices.clone(), wallets.clone());
        let entitlements = EntitlementService::new(db.clone());
        let secrets = SecretService::new(db.clone(), config.api_key_secret());

        Self {
            config,
            db,
            invoices,
            subscriptions,
            wallets,
            payments,
            entitlements,
            secrets,
        }
    }
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/environments",
            post(environments::create_environment).get(environments::list_environments),
        )
        .route("/environments/{id}", get(environments::get_environment))
        .route(
            "/customers",
            post(customers::create_customer).get(customers::list_customers),
        )
        .route(
            "/customers/{id}",
            get(customers::get_customer)
                .put(customers::update_customer)
                .delete(customers::delete_customer),
        )
        .route(
            "/customers/lookup/{external_id}",
            get(customers::lookup_customer),
        )
        .route(
            "/customers/{id}/invoices/summary",
            get(customers::customer_invoice_summary),
        )
        .route(
            "/customers/{id}/entitlements",
            get(customers::customer_entitlements),
        )
        .route(
            "/customers/{id}/entitlements/{lookup_key}",
            get(customers::check_feature_access),
        )
        .route("/customers/{id}/wallets", get(customers::customer_wallets))
        .route("/meters", post(meters::create_meter).get(meters::list_meters))
        .route(
            "/meters/{id}",
            get(meters::get_meter)
                .put(meters::update_meter)
                .delete(meters::delete_meter),
        )
        .route(
            "/features",
            post(features::create_feature).get(features::list_features),
        )
        .route(
            "/features/{id}",
            get(features::get_feature)
                .put(features::update_feature)
                .delete(features::delete_feature),
        )
        .route("/plans", post(plans::create_plan).get(plans::list_plans))
        .route(
            "/plans/{id}",
            get(plans::get_plan)
                .put(plans::update_plan)
                .delete(plans::delete_plan),
        )
        .route("/plans/{id}/prices", get(plans::plan_prices))
        .route("/plans/{id}/entitlements", get(plans::plan_entitlements))
        .route("/prices", post(prices::create_price).get(prices::list_prices))
        .route(
            "/prices/{id}",
            get(prices::get_price)
                .put(prices::update_price)
                .delete(prices::delete_price),
        )
        .route("/prices/{id}/cost", get(prices::price_cost))
        .route(
            "/entitlements",
            post(entitlements::create_entitlement).get(entitlements::list_entitlements),
        )
        .route(
            "/entitlements/{id}",
            get(entitlements::get_entitlement)
                .put(entitlements::update_entitlement)
                .delete(entitlements::delete_entitlement),
        )
        .route(
            "/credit-grants",
            post(credit_grants::create_credit_grant).get(credit_grants::list_credit_grants),
        )
        .route(
            "/credit-grants/{id}",
            get(credit_grants::get_credit_grant).delete(credit_grants::delete_credit_grant),
        )
        .route(
            "/subscriptions",
            post(subscriptions::create_subscription).get(subscriptions::list_subscriptions),
        )
        .route("/subscriptions/{id}", get(subscriptions::get_subscription))
        .route(
            "/subscriptions/{id}/cancel",
            post(subscriptions::cancel_subscription),
        )
        .route(
            "/subscriptions/{id}/pause",
            post(subscriptions::pause_subscription),
        )
        .route(
            "/subscriptions/{id}/resume",
            post(subscriptions::resume_subscription),
        )
        .route(
            "/subscriptions/{id}/renew",
            post(subscriptions::renew_subscription),
        )
        .route(
            "/subscriptions/{id}/invoice",
            post(subscriptions::invoice_subscription),
        )
        .route(
            "/subscriptions/{id}/preview",
            post(subscriptions::preview_subscription_invoice),
        )
        .route(
            "/subscriptions/{id}/schedules",
            post(subscriptions::create_schedule).get(subscriptions::list_schedules),
        )
        .route(
            "/subscriptions/schedules/{schedule_id}",
            get(subscriptions::get_schedule),
        )
        .route(
            "/subscriptions/schedules/{schedule_id}/advance",
            post(subscriptions::advance_schedule),
        )
        .route(
            "/invoices",
            post(invoices::create_invoice).get(invoices::list_invoices),
        )
        .route("/invoices/{id}", get(invoices::get_invoice))
        .route("/invoices/{id}/finalize", post(invoices::finalize_invoice))
        .route("/invoices/{id}/void", post(invoices::void_invoice))
        .route(
            "/invoices/{id}/payment",
            put(invoices::update_invoice_payment),
        )
        .route("/wallets", post(wallets::create_wallet))
        .route("/wallets/{id}", get(wallets::get_wallet))
        .route("/wallets/{id}/top-up", post(wallets::top_up_wallet))
        .route("/wallets/{id}/debit", post(wallets::debit_wallet))
        .route("/wallets/{id}/balance", get(wallets::wallet_balance))
        .route(
            "/wallets/{id}/transactions",
            get(wallets::wallet_transactions),
        )
        .route("/wallets/{id}/terminate", post(wallets::terminate_wallet))
        .route(
            "/wallets/transactions/{id}/expire",
            post(wallets::expire_credits),
        )
        .route(
            "/payments",
            post(payments::create_payment).get(payments::list_payments),
        )
        .route("/payments/{id}", get(payments::get_payment))
        .route("/payments/{id}/process", post(payments::process_payment))
        .route("/payments/{id}/attempts", get(payments::payment_attempts))
        .route(
            "/secrets/api-keys",
            post(secrets::create_api_key).get(secrets::list_api_keys),
        )
        .route(
            "/secrets/api-keys/{id}",
            axum::routing::delete(secrets::delete_api_key),
        )
        .route("/tasks", post(tasks::create_task).get(tasks::list_tasks))
        .route("/tasks/{id}", get(tasks::get_task))
        .route("/tasks/{id}/start", post(tasks::start_task))
        .route("/tasks/{id}/progress", put(tasks::update_task_progress))
        .route("/tasks/{id}/complete", post(tasks::complete_task))
        .route("/tasks/{id}/fail", post(tasks::fail_task))
}

/// Creates and configures the Axum application router
pub fn create_app(state: AppState) -> Router {
    let v1 = api_routes().route_layer(middleware::from_fn_with_state(
        state.clone(),
        auth_middleware,
    ));

    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .nest("/v1", v1)
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/openapi.json", ApiDoc::openapi()))
        .layer(middleware::from_fn(trace_id_middleware))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Starts the server with the given configuration
pub async fn run_server(config: AppConfig, db: DatabaseConnection) -> anyhow::Result<()> {
    let addr = config.bind_addr()?;
    let profile = config.profile.clone();
    let app = create_app(AppState::new(Arc::new(config), db));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, %profile, "Server listening");

    axum::serve(listener, app).await?;

    Ok(())
}

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "api_key",
            SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new(API_KEY_HEADER))),
        );
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
        );
    }
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::root,
        crate::handlers::health,
        crate::handlers::environments::create_environment,
        crate::handlers::environments::list_environments,
        crate::handlers::environments::get_environment,
        crate::handlers::customers::create_customer,
        crate::handlers::customers::list_customers,
        crate::handlers::customers::get_customer,
        crate::handlers::customers::lookup_customer,
        crate::handlers::customers::update_customer,
        crate::handlers::customers::delete_customer,
        crate::handlers::customers::customer_invoice_summary,
        crate::handlers::customers::customer_entitlements,
        crate::handlers::customers::check_feature_access,
        crate::handlers::customers::customer_wallets,
        crate::handlers::meters::create_meter,
        crate::handlers::meters::list_meters,
        crate::handlers::meters::get_meter,
        crate::handlers::meters::update_meter,
        crate::handlers::meters::delete_meter,
        crate::handlers::features::create_feature,
        crate::handlers::features::list_features,
        crate::handlers::features::get_feature,
        crate::handlers::features::update_feature,
        crate::handlers::features::delete_feature,
        crate::handlers::plans::create_plan,
        crate::handlers::plans::list_plans,
        crate::handlers::plans::get_plan,
        crate::handlers::plans::update_plan,
        crate::handlers::plans::delete_plan,
        crate::handlers::plans::plan_prices,
        crate::handlers::plans::plan_entitlements,
        crate::handlers::prices::create_price,
        crate::handlers::prices::list_prices,
        crate::handlers::prices::get_price,
        crate::handlers::prices::update_price,
        crate::handlers::prices::delete_price,
        crate::handlers::prices::price_cost,
        crate::handlers::entitlements::create_entitlement,
        crate::handlers::entitlements::list_entitlements,
        crate::handlers::entitlements::get_entitlement,
        crate::handlers::entitlements::update_entitlement,
        crate::handlers::entitlements::delete_entitlement,
        crate::handlers::credit_grants::create_credit_grant,
        crate::handlers::credit_grants::list_credit_grants,
        crate::handlers::credit_grants::get_credit_grant,
        crate::handlers::credit_grants::delete_credit_grant,
        crate::handlers::subscriptions::create_subscription,
        crate::handlers::subscriptions::list_subscriptions,
        crate::handlers::subscriptions::get_subscription,
        crate::handlers::subscriptions::cancel_subscription,
        crate::handlers::subscriptions::pause_subscription,
        crate::handlers::subscriptions::resume_subscription,
        crate::handlers::subscriptions::renew_subscription,
        crate::handlers::subscriptions::invoice_subscription,
        crate::handlers::subscriptions::preview_subscription_invoice,
        crate::handlers::subscriptions::create_schedule,
        crate::handlers::subscriptions::list_schedules,
        crate::handlers::subscriptions::get_schedule,
        crate::handlers::subscriptions::advance_schedule,
        crate::handlers::invoices::create_invoice,
        crate::handlers::invoices::list_invoices,
        crate::handlers::invoices::get_invoice,
        crate::handlers::invoices::finalize_invoice,
        crate::handlers::invoices::void_invoice,
        crate::handlers::invoices::update_invoice_payment,
        crate::handlers::wallets::create_wallet,
        crate::handlers::wallets::get_wallet,
        crate::handlers::wallets::top_up_wallet,
        crate::handlers::wallets::debit_wallet,
        crate::handlers::wallets::wallet_balance,
        crate::handlers::wallets::wallet_transactions,
        crate::handlers::wallets::expire_credits,
        crate::handlers::wallets::terminate_wallet,
        crate::handlers::payments::create_payment,
        crate::handlers::payments::list_payments,
        crate::handlers::payments::get_payment,
        crate::handlers::payments::process_payment,
        crate::handlers::payments::payment_attempts,
        crate::handlers::secrets::create_api_key,
        crate::handlers::secrets::list_api_keys,
        crate::handlers::secrets::delete_api_key,
        crate::handlers::tasks::create_task,
        crate::handlers::tasks::list_tasks,
        crate::handlers::tasks::get_task,
        crate::handlers::tasks::start_task,
        crate::handlers::tasks::update_task_progress,
        crate::handlers::tasks::complete_task,
        crate::handlers::tasks::fail_task,
    ),
    components(
        schemas(
            crate::models::ServiceInfo,
            crate::handlers::HealthResponse,
            crate::error::ApiError,
            crate::types::PaginationInfo,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "root", description = "Service information and health"),
        (name = "environments", description = "Tenant environments"),
        (name = "customers", description = "Billable customers"),
        (name = "meters", description = "Usage meters"),
        (name = "features", description = "Feature catalog"),
        (name = "plans", description = "Plans"),
        (name = "prices", description = "Prices and cost calculation"),
        (name = "entitlements", description = "Plan feature entitlements"),
        (name = "credit-grants", description = "Recurring and one-time credit grants"),
        (name = "subscriptions", description = "Subscriptions and schedules"),
        (name = "invoices", description = "Invoices"),
        (name = "wallets", description = "Prepaid credit wallets"),
        (name = "payments", description = "Payments"),
        (name = "secrets", description = "API keys"),
        (name = "tasks", description = "Import and export tasks"),
    ),
    info(
        title = "Billing API",
        description = "Multi-tenant usage based billing: catalog, subscriptions, invoices, wallets and payments",
        version = env!("CARGO_PKG_VERSION"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_document_lists_billing_paths_and_security() {
        let doc = ApiDoc::openapi();

        assert!(doc.paths.paths.contains_key("/v1/invoices"));
        assert!(doc.paths.paths.contains_key("/v1/subscriptions/{id}/renew"));
        assert!(doc.paths.paths.contains_key("/health"));

        let schemes = &doc.components.as_ref().unwrap().security_schemes;
        assert!(schemes.contains_key("api_key"));
        assert!(schemes.contains_key("bearer_auth"));
    }
}
