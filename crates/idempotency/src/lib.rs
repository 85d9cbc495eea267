//! Shared idempotency subsystem for the inventory and payment services.
//!
//! Each idempotent operation pairs a durable store (the service's own
//! transactional database, the source of truth) with an optional fast cache
//! that only accelerates reads. The read path is: fast cache first, falling
//! through on miss or transport error; then the durable store, whose errors
//! mean "cannot answer safely" and must fail the request rather than be
//! treated as "not yet processed". The memo write happens inside the same
//! transaction as the effect it memoizes and is owned by the service store;
//! cache warming is best-effort and happens outside the transaction.

pub mod cache;
pub mod key;
pub mod layer;
pub mod store;

pub use cache::{CacheError, FastCache, InMemoryFastCache, RedisFastCache};
pub use key::{booking_key, parse_booking_key};
pub use layer::IdempotencyLayer;
pub use store::{IdempotencyError, IdempotencyRecord, IdempotencyStore};
