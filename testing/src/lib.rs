//! # Busline Testing
//!
//! Test support shared by the Busline crates:
//! - [`FixedClock`] and [`test_clock`] for deterministic timestamps
//! - [`ReducerTest`] for Given-When-Then reducer tests
//! - [`InMemoryEventStore`] as a journal double
//!
//! ## Example
//!
//! ```ignore
//! use busline_testing::{test_clock, InMemoryEventStore};
//!
//! #[tokio::test]
//! async fn booking_flow() {
//!     let journal = Arc::new(InMemoryEventStore::new());
//!     let env = FleetEnvironment::new(Arc::new(test_clock()), journal, hub);
//!     // ...
//! }
//! ```

use busline_core::environment::Clock;
use chrono::{DateTime, Duration, Utc};
use std::sync::{Arc, Mutex, PoisonError};

/// In-memory journal
pub mod event_store;


/// Mock implementations of Environment traits
pub mod mocks {
    use super::{Arc, Clock, DateTime, Duration, Mutex, PoisonError, Utc};

    /// Controllable clock for deterministic tests
    ///
    /// Returns the same instant until moved with [`FixedClock::advance`].
    /// Clones share the same instant.
    ///
    /// # Example
    ///
    /// ```
    /// use busline_testing::mocks::FixedClock;
    /// use busline_core::environment::Clock;
    /// use chrono::{Duration, Utc};
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// let before = clock.now();
    /// assert_eq!(before, clock.now());
    ///
    /// clock.advance(Duration::minutes(5));
    /// assert_eq!(clock.now() - before, Duration::minutes(5));
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: Arc<Mutex<DateTime<Utc>>>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub fn new(time: DateTime<Utc>) -> Self {
            Self {
                time: Arc::new(Mutex::new(time)),
            }
        }

        /// Move the clock forward
        pub fn advance(&self, by: Duration) {
            let mut time = self.time.lock().unwrap_or_else(PoisonError::into_inner);
            *time += by;
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            *self.time.lock().unwrap_or_else(PoisonError::into_inner)
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// Panics if the hardcoded timestamp fails to parse, which cannot happen.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }
}

pub use event_store::InMemoryEventStore;
pub use mocks::{FixedClock, test_clock};
pub use reducer_test::{ReducerTest, assertions};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_clock_is_stable_until_advanced() {
        let clock = test_clock();
        let shared = clock.clone();
        let start = clock.now();

        assert_eq!(start, clock.now());

        shared.advance(Duration::seconds(30));
        assert_eq!(clock.now(), start + Duration::seconds(30));
    }
}
