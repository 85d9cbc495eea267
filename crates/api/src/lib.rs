//! HTTP surface and process wiring for the booking pipeline.
//!
//! Exposes the booking, inventory, and payment endpoints over axum with
//! structured logging (tracing) and Prometheus metrics, and wires the
//! store / lock / cache implementations selected by configuration at
//! startup: in-memory by default, PostgreSQL when `DATABASE_URL` is set,
//! Redis for the fast cache and distributed lock when `REDIS_URL` is set.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post, put};
use booking::{
    BookingOrchestrator, BookingService, BookingStore, InMemoryBookingStore,
    InMemoryEventPublisher, LocalInventoryApi, LocalPaymentApi, PostgresBookingStore,
    RecoveryWorker, RetryPolicy,
};
use idempotency::{FastCache, IdempotencyLayer, InMemoryFastCache, RedisFastCache};
use inventory::{
    HoldReaper, InMemoryInventoryStore, InMemoryLockProvider, InventoryService, InventoryStore,
    LockProvider, PostgresInventoryStore, RedisLockProvider,
};
use metrics_exporter_prometheus::PrometheusHandle;
use payment::{
    InMemoryPaymentStore, PaymentService, PaymentStore, PostgresPaymentStore, SimulatedGateway,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use config::Config;
pub use error::ApiError;

const RESERVE_CACHE_PREFIX: &str = "idempotency:reserve:";
const PAYMENT_CACHE_PREFIX: &str = "idempotency:payment:";

/// Shared application state accessible from all handlers.
pub struct AppState {
    pub bookings: BookingService,
    pub inventory: Arc<InventoryService>,
    pub payments: Arc<PaymentService>,
}

/// Everything `main` needs to run: the handler state plus the background
/// workers to spawn.
pub struct Runtime {
    pub state: Arc<AppState>,
    pub reaper: HoldReaper,
    pub recovery: RecoveryWorker,
    pub events: Arc<InMemoryEventPublisher>,
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/bookings", post(routes::bookings::create))
        .route("/bookings/{id}", get(routes::bookings::get))
        .route("/users/{user_id}/bookings", get(routes::bookings::list_for_user))
        .route("/inventory/reserve", post(routes::inventory::reserve))
        .route(
            "/inventory/confirm/{booking_id}",
            post(routes::inventory::confirm),
        )
        .route("/inventory/release", post(routes::inventory::release))
        .route("/inventory/availability", put(routes::inventory::seed))
        .route(
            "/inventory/availability/{room_id}/{date}",
            get(routes::inventory::availability),
        )
        .route("/payments", post(routes::payments::process))
        .route("/payments/{id}", get(routes::payments::get))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Wires the whole pipeline from configuration.
///
/// Store, lock, and cache variants are chosen here, once, at startup;
/// everything downstream sees only the trait objects.
pub async fn create_state(config: &Config) -> anyhow::Result<Runtime> {
    // Durable stores: PostgreSQL when configured, in-memory otherwise.
    let (inventory_store, payment_store, booking_store): (
        Arc<dyn InventoryStore>,
        Arc<dyn PaymentStore>,
        Arc<dyn BookingStore>,
    ) = match &config.database_url {
        Some(url) => {
            let pool = sqlx::postgres::PgPoolOptions::new()
                .max_connections(config.db_max_connections)
                .connect(url)
                .await?;
            let inventory_store = PostgresInventoryStore::new(pool.clone());
            inventory_store.run_migrations().await?;
            (
                Arc::new(inventory_store),
                Arc::new(PostgresPaymentStore::new(pool.clone())),
                Arc::new(PostgresBookingStore::new(pool)),
            )
        }
        None => (
            Arc::new(InMemoryInventoryStore::new()),
            Arc::new(InMemoryPaymentStore::new()),
            Arc::new(InMemoryBookingStore::new()),
        ),
    };

    // Fast cache and distributed lock: Redis when configured.
    let redis_conn = match &config.redis_url {
        Some(url) => Some(
            redis::Client::open(url.as_str())?
                .get_multiplexed_tokio_connection()
                .await?,
        ),
        None => None,
    };
    let cache: Option<Arc<dyn FastCache>> = if config.idempotency_fast_cache_enabled {
        match &redis_conn {
            Some(conn) => Some(Arc::new(RedisFastCache::new(conn.clone()))),
            None => Some(Arc::new(InMemoryFastCache::new())),
        }
    } else {
        None
    };
    let lock: Arc<dyn LockProvider> = match redis_conn {
        Some(conn) => Arc::new(RedisLockProvider::new(conn)),
        None => Arc::new(InMemoryLockProvider::new()),
    };

    let inventory = Arc::new(InventoryService::new(
        inventory_store.clone(),
        lock,
        IdempotencyLayer::new(cache.clone(), RESERVE_CACHE_PREFIX, config.fast_cache_ttl()),
        config.inventory_config(),
    ));
    let payments = Arc::new(PaymentService::new(
        payment_store,
        Arc::new(SimulatedGateway::default()),
        IdempotencyLayer::new(cache, PAYMENT_CACHE_PREFIX, config.fast_cache_ttl()),
    ));

    let events = Arc::new(InMemoryEventPublisher::new());
    let orchestrator = Arc::new(BookingOrchestrator::new(
        booking_store.clone(),
        Arc::new(LocalInventoryApi::new(inventory.clone())),
        Arc::new(LocalPaymentApi::new(payments.clone())),
        events.clone(),
        RetryPolicy::default(),
    ));

    let reaper = HoldReaper::new(inventory_store, config.reaper_interval());
    let recovery = RecoveryWorker::new(
        booking_store.clone(),
        orchestrator.clone(),
        config.recovery_config(),
    );

    let state = Arc::new(AppState {
        bookings: BookingService::new(booking_store, orchestrator),
        inventory,
        payments,
    });

    Ok(Runtime {
        state,
        reaper,
        recovery,
        events,
    })
}
