//! Booking saga orchestration.
//!
//! The orchestrator drives the reserve → charge → confirm pipeline against
//! the inventory and payment services, writing the intended saga step before
//! every remote effect and the completed step after it. Clear remote
//! failures compensate and fail the booking; unclear ones (timeouts, 503s)
//! surface as a first-class `PendingUnclear` outcome and are left to the
//! recovery worker, which retries with the same idempotency key. The
//! give-up policy is asymmetric: a booking stuck at PAYMENT_SENT is never
//! released automatically, because the charge may have succeeded.

pub mod clients;
pub mod error;
pub mod events;
pub mod memory;
pub mod model;
pub mod orchestrator;
pub mod postgres;
pub mod recovery;
pub mod retry;
pub mod service;
pub mod store;

pub use clients::{
    InventoryApi, LocalInventoryApi, LocalPaymentApi, PaymentApi, RemoteError, ScriptedFaults,
    codes,
};
pub use error::BookingError;
pub use events::{BookingConfirmed, BookingEventPublisher, InMemoryEventPublisher};
pub use memory::InMemoryBookingStore;
pub use model::{Booking, BookingStatus, NewBooking, SagaStep};
pub use orchestrator::{BookingOrchestrator, SagaOutcome};
pub use postgres::PostgresBookingStore;
pub use recovery::{RecoveryConfig, RecoveryStats, RecoveryWorker};
pub use retry::RetryPolicy;
pub use service::{BookingService, CreateBooking};
pub use store::BookingStore;
