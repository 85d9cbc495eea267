//! Shared vocabulary for the booking pipeline: typed identifiers, money,
//! and the half-open nightly date range.

pub mod money;
pub mod stay;
pub mod types;

pub use money::Money;
pub use stay::{StayRange, StayRangeError};
pub use types::{BookingId, PaymentId, RoomId, UserId};
