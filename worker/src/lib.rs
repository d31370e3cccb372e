pub mod axum_http;
pub mod config;
pub mod services;
pub mod usecases;

use std::sync::Arc;

use anyhow::Result;
use application::usecases::order_lifecycle::OrderLifecycleUseCase;
use domain::repositories::disputes::DisputeRepository;
use domain::repositories::escrow_gateway::EscrowGateway;
use domain::repositories::escrow_holds::EscrowHoldRepository;
use domain::repositories::events::DomainEventPublisher;
use domain::repositories::orders::OrderRepository;
use domain::repositories::payout_profiles::PayoutProfileRepository;
use domain::repositories::settlements::SettlementRepository;
use infra::events::tracing_publisher::TracingEventPublisher;
use infra::payments::provider_client::PaymentProviderClient;
use infra::postgres::postgres_connection;
use infra::postgres::repositories::disputes::DisputePostgres;
use infra::postgres::repositories::escrow_holds::EscrowHoldPostgres;
use infra::postgres::repositories::orders::OrderPostgres;
use infra::postgres::repositories::payout_profiles::PayoutProfilePostgres;
use infra::postgres::repositories::settlements::SettlementPostgres;
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::usecases::auto_accept_sweep::AutoAcceptSweepUseCase;
use crate::usecases::dispute_escalation_sweep::DisputeEscalationSweepUseCase;

pub async fn run() -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(env_filter)
        .try_init()?;

    let dotenvy_env = Arc::new(config::config_loader::load()?);
    info!("ENV has been loaded");

    let postgres_pool = postgres_connection::establish_connection(&dotenvy_env.database.url)?;
    info!("Postgres connection has been established");

    let db_pool_arc = Arc::new(postgres_pool);

    let orders: Arc<dyn OrderRepository + Send + Sync> =
        Arc::new(OrderPostgres::new(Arc::clone(&db_pool_arc)));
    let escrow_holds: Arc<dyn EscrowHoldRepository + Send + Sync> =
        Arc::new(EscrowHoldPostgres::new(Arc::clone(&db_pool_arc)));
    let settlements: Arc<dyn SettlementRepository + Send + Sync> =
        Arc::new(SettlementPostgres::new(Arc::clone(&db_pool_arc)));
    let disputes: Arc<dyn DisputeRepository + Send + Sync> =
        Arc::new(DisputePostgres::new(Arc::clone(&db_pool_arc)));
    let payout_profiles: Arc<dyn PayoutProfileRepository + Send + Sync> =
        Arc::new(PayoutProfilePostgres::new(Arc::clone(&db_pool_arc)));
    let gateway: Arc<dyn EscrowGateway + Send + Sync> = Arc::new(PaymentProviderClient::new(
        dotenvy_env.payment_provider.clone(),
    )?);
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
        dotenvy_env.policy.fee_policy(),
        dotenvy_env.policy.lifecycle_policy(),
    ));

    let auto_accept_usecase = Arc::new(AutoAcceptSweepUseCase::new(
        Arc::clone(&orders),
        Arc::clone(&lifecycle_usecase),
    ));
    let dispute_escalation_usecase = Arc::new(DisputeEscalationSweepUseCase::new(Arc::clone(
        &disputes,
    )));

    info!("Worker started");

    let loop_auto_accept = Arc::clone(&auto_accept_usecase);
    let loop_dispute_escalation = Arc::clone(&dispute_escalation_usecase);
    let sweep_loop = tokio::spawn(services::sweep_loop::run_sweep_loop(
        loop_auto_accept,
        loop_dispute_escalation,
        dotenvy_env.sweep.clone(),
        dotenvy_env.policy.dispute_escalate_days,
    ));

    let server_config = Arc::clone(&dotenvy_env);
    let http_server = tokio::spawn(async move {
        axum_http::http_serve::start(server_config, auto_accept_usecase, dispute_escalation_usecase)
            .await
    });

    tokio::select! {
        result = sweep_loop => result??,
        result = http_server => result??,
    };

    Ok(())
}
