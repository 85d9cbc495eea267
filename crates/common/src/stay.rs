use chrono::{Days, NaiveDate};
use thiserror::Error;

/// Error produced when a stay range is not well-formed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StayRangeError {
    #[error("check-out {check_out} must be after check-in {check_in}")]
    CheckOutNotAfterCheckIn {
        check_in: NaiveDate,
        check_out: NaiveDate,
    },
}

/// A half-open nightly date range `[check_in, check_out)`.
///
/// The check-out date is exclusive: a two-night stay covers exactly two
/// availability dates. Nights are always yielded in ascending order, which
/// doubles as the canonical lock ordering for multi-date reservations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StayRange {
    check_in: NaiveDate,
    check_out: NaiveDate,
}

impl StayRange {
    /// Creates a stay range, rejecting empty or inverted ranges.
    pub fn new(check_in: NaiveDate, check_out: NaiveDate) -> Result<Self, StayRangeError> {
        if check_out <= check_in {
            return Err(StayRangeError::CheckOutNotAfterCheckIn {
                check_in,
                check_out,
            });
        }
        Ok(Self {
            check_in,
            check_out,
        })
    }

    pub fn check_in(&self) -> NaiveDate {
        self.check_in
    }

    pub fn check_out(&self) -> NaiveDate {
        self.check_out
    }

    /// Number of nights in the stay.
    pub fn num_nights(&self) -> u32 {
        (self.check_out - self.check_in).num_days() as u32
    }

    /// Iterates the nightly dates in ascending order, check-out excluded.
    pub fn nights(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        let check_out = self.check_out;
        std::iter::successors(Some(self.check_in), move |d| {
            d.checked_add_days(Days::new(1)).filter(|n| *n < check_out)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn nights_are_ascending_and_exclude_check_out() {
        let stay = StayRange::new(date("2026-02-01"), date("2026-02-03")).unwrap();
        let nights: Vec<_> = stay.nights().collect();
        assert_eq!(nights, vec![date("2026-02-01"), date("2026-02-02")]);
        assert_eq!(stay.num_nights(), 2);
    }

    #[test]
    fn single_night_stay() {
        let stay = StayRange::new(date("2026-02-01"), date("2026-02-02")).unwrap();
        assert_eq!(stay.nights().count(), 1);
    }

    #[test]
    fn rejects_empty_range() {
        let err = StayRange::new(date("2026-02-01"), date("2026-02-01"));
        assert!(matches!(
            err,
            Err(StayRangeError::CheckOutNotAfterCheckIn { .. })
        ));
    }

    #[test]
    fn rejects_inverted_range() {
        assert!(StayRange::new(date("2026-02-03"), date("2026-02-01")).is_err());
    }
}
