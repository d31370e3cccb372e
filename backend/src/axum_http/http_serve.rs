use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Result;
use axum::{
    Router,
    http::{
        Method,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    routing::get,
};
use tokio::net::TcpListener;
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::info;

use application::usecases::checkout::CheckoutUseCase;
use application::usecases::disputes::DisputeUseCase;
use application::usecases::order_lifecycle::OrderLifecycleUseCase;
use application::usecases::webhook_reconciler::WebhookReconcilerUseCase;
use domain::repositories::disputes::DisputeRepository;
use domain::repositories::escrow_gateway::EscrowGateway;
use domain::repositories::escrow_holds::EscrowHoldRepository;
use domain::repositories::events::DomainEventPublisher;
use domain::repositories::orders::OrderRepository;
use domain::repositories::payout_profiles::PayoutProfileRepository;
use domain::repositories::settlements::SettlementRepository;
use domain::repositories::webhook_events::WebhookEventRepository;
use infra::events::tracing_publisher::TracingEventPublisher;
use infra::payments::provider_client::PaymentProviderClient;
use infra::postgres::postgres_connection::PgPoolSquad;
use infra::postgres::repositories::disputes::DisputePostgres;
use infra::postgres::repositories::escrow_holds::EscrowHoldPostgres;
use infra::postgres::repositories::orders::OrderPostgres;
use infra::postgres::repositories::payout_profiles::PayoutProfilePostgres;
use infra::postgres::repositories::settlements::SettlementPostgres;
use infra::postgres::repositories::webhook_events::WebhookEventPostgres;

use crate::axum_http::{default_routers, routers};
use crate::config::config_model::DotEnvyConfig;

pub async fn start(config: Arc<DotEnvyConfig>, db_pool: Arc<PgPoolSquad>) -> Result<()> {
    let orders: Arc<dyn OrderRepository + Send + Sync> =
        Arc::new(OrderPostgres::new(Arc::clone(&db_pool)));
    let escrow_holds: Arc<dyn EscrowHoldRepository + Send + Sync> =
        Arc::new(EscrowHoldPostgres::new(Arc::clone(&db_pool)));
    let settlements: Arc<dyn SettlementRepository + Send + Sync> =
        Arc::new(SettlementPostgres::new(Arc::clone(&db_pool)));
    let disputes: Arc<dyn DisputeRepository + Send + Sync> =
        Arc::new(DisputePostgres::new(Arc::clone(&db_pool)));
    let payout_profiles: Arc<dyn PayoutProfileRepository + Send + Sync> =
        Arc::new(PayoutProfilePostgres::new(Arc::clone(&db_pool)));
    let webhook_events: Arc<dyn WebhookEventRepository + Send + Sync> =
        Arc::new(WebhookEventPostgres::new(Arc::clone(&db_pool)));
    let gateway: Arc<dyn EscrowGateway + Send + Sync> =
        Arc::new(PaymentProviderClient::new(config.payment_provider.clone())?);
    let events: Arc<dyn DomainEventPublisher + Send + Sync> =
        Arc::new(TracingEventPublisher::new());

    let lifecycle_usecase = Arc::new(OrderLifecycleUseCase::new(
        Arc::clone(&orders),
        Arc::clone(&escrow_holds),
        Arc::clone(&settlements),
        Arc::clone(&disputes),
        Arc::clone(&payout_profiles),
        Arc::clone(&gateway),
        Arc::clone(&events),
        config.policy.fee_policy(),
        config.policy.lifecycle_policy(),
    ));
    let checkout_usecase = Arc::new(CheckoutUseCase::new(
        Arc::clone(&orders),
        Arc::clone(&gateway),
        config.policy.fee_policy(),
    ));
    let dispute_usecase = Arc::new(DisputeUseCase::new(
        Arc::clone(&orders),
        Arc::clone(&disputes),
        Arc::clone(&lifecycle_usecase),
        Arc::clone(&events),
    ));
    let webhook_usecase = Arc::new(WebhookReconcilerUseCase::new(
        Arc::clone(&gateway),
        Arc::clone(&webhook_events),
        Arc::clone(&lifecycle_usecase),
    ));

    let app = Router::new()
        .fallback(default_routers::not_found)
        .nest("/api/v1/checkout", routers::checkout::routes(checkout_usecase))
        .nest(
            "/api/v1/orders",
            routers::orders::routes(Arc::clone(&lifecycle_usecase)),
        )
        .nest("/api/v1/disputes", routers::disputes::routes(dispute_usecase))
        .nest(
            "/webhooks/payment",
            routers::payment_webhook::routes(webhook_usecase),
        )
        .route("/api/v1/health-check", get(default_routers::health_check))
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.backend_server.timeout,
        )))
        .layer(RequestBodyLimitLayer::new(
            (config.backend_server.body_limit * 1024 * 1024).try_into()?,
        ))
        .layer(
            CorsLayer::new()
                .allow_methods([
                    Method::GET,
                    Method::POST,
                    Method::PATCH,
                    Method::PUT,
                    Method::DELETE,
                ])
                .allow_headers([AUTHORIZATION, CONTENT_TYPE])
                .allow_origin(Any), // TODO Add the domain later
        )
        .layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.backend_server.port));
    let listener = TcpListener::bind(addr).await?;

    info!("Server is running on port {}", config.backend_server.port);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install CTRL+C signal handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        let mut sigterm =
            signal(SignalKind::terminate()).expect("Failed to install SIGTERM signal handler");
        sigterm.recv().await;
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received ctrl+C signal"),
        _ = terminate => info!("Received terminate signal"),
    }
}
