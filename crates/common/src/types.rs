use serde::{Deserialize, Serialize};

macro_rules! id_type {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Creates an identifier from a raw value.
            pub fn new(id: i64) -> Self {
                Self(id)
            }

            /// Returns the underlying value.
            pub fn as_i64(&self) -> i64 {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

id_type! {
    /// Unique identifier for a booking.
    ///
    /// Numeric so it round-trips through the `booking-{id}` idempotency key
    /// format used by the orchestrator.
    BookingId
}

id_type! {
    /// Unique identifier for a room.
    RoomId
}

id_type! {
    /// Unique identifier for a user.
    UserId
}

id_type! {
    /// Unique identifier for a payment.
    PaymentId
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn booking_id_roundtrips_through_i64() {
        let id = BookingId::new(42);
        assert_eq!(id.as_i64(), 42);
        assert_eq!(BookingId::from(i64::from(id)), id);
    }

    #[test]
    fn ids_display_as_raw_value() {
        assert_eq!(BookingId::new(7).to_string(), "7");
        assert_eq!(RoomId::new(101).to_string(), "101");
    }

    #[test]
    fn id_serialization_is_transparent() {
        let id = UserId::new(5);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "5");
        let back: UserId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
