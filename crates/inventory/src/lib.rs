//! Inventory core: per-(room, date) stock, reservation holds, and the
//! oversell-safe reserve protocol.
//!
//! Stock is only ever taken through a guarded atomic decrement, so
//! `available_count` can never go negative regardless of interleaving. A
//! distributed lock in front of the decrement collapses contention spikes
//! but is not required for correctness. Reserves carrying a `booking-{id}`
//! idempotency key leave TTL-bounded holds behind; the hold reaper credits
//! stock back for holds that were never confirmed or released.

pub mod config;
pub mod error;
pub mod lock;
pub mod memory;
pub mod model;
pub mod postgres;
pub mod reaper;
pub mod service;
pub mod store;

pub use config::InventoryConfig;
pub use error::InventoryError;
pub use lock::{InMemoryLockProvider, LockError, LockLease, LockProvider, RedisLockProvider};
pub use memory::InMemoryInventoryStore;
pub use model::{
    HoldSpec, ReservationHold, ReservationStatus, ReserveRequest, ReserveResponse,
    RoomAvailability,
};
pub use postgres::PostgresInventoryStore;
pub use reaper::HoldReaper;
pub use service::InventoryService;
pub use store::InventoryStore;
