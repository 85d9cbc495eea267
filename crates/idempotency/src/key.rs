//! The `booking-{id}` key format assigned by the saga orchestrator.
//!
//! Inventory uses the parsed booking id to attach reservation holds to the
//! reserve; keys in any other shape still memoize but create no holds.

use common::BookingId;

const BOOKING_KEY_PREFIX: &str = "booking-";

/// Builds the idempotency key for a booking's remote effects.
pub fn booking_key(id: BookingId) -> String {
    format!("{BOOKING_KEY_PREFIX}{id}")
}

/// Parses a `booking-{id}` key back into its booking id.
pub fn parse_booking_key(key: &str) -> Option<BookingId> {
    key.strip_prefix(BOOKING_KEY_PREFIX)?
        .parse::<i64>()
        .ok()
        .map(BookingId::new)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_roundtrip() {
        let key = booking_key(BookingId::new(42));
        assert_eq!(key, "booking-42");
        assert_eq!(parse_booking_key(&key), Some(BookingId::new(42)));
    }

    #[test]
    fn foreign_keys_do_not_parse() {
        assert_eq!(parse_booking_key("order-42"), None);
        assert_eq!(parse_booking_key("booking-"), None);
        assert_eq!(parse_booking_key("booking-abc"), None);
    }
}
