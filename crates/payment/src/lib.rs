//! Payment core: idempotent charge processing over a replaceable gateway.
//!
//! The gateway decision is simulated; the contract that matters is that the
//! terminal decision is committed atomically with its idempotency memo, so
//! identical keys can never produce conflicting outcomes.

pub mod error;
pub mod gateway;
pub mod memory;
pub mod model;
pub mod postgres;
pub mod service;
pub mod store;

pub use error::PaymentError;
pub use gateway::{GatewayDecision, PaymentGateway, SimulatedGateway};
pub use memory::InMemoryPaymentStore;
pub use model::{ChargeRequest, ChargeResponse, ChargeStatus, NewPayment, Payment, PaymentStatus};
pub use postgres::PostgresPaymentStore;
pub use service::PaymentService;
pub use store::{FinalizeOutcome, PaymentStore};
