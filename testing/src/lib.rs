//! # Rx Dispatch Testing
//!
//! Testing utilities and helpers for Rx Dispatch workflows.
//!
//! This crate provides:
//! - Deterministic clocks and id generators for the workflow environment
//! - A Given-When-Then harness for reducers
//! - A one-call tracing setup for tests that want log output
//!
//! ## Example
//!
//! ```ignore
//! use rx_dispatch_testing::{ReducerTest, SequentialIds, test_clock};
//! use std::sync::Arc;
//!
//! let env = WorkflowEnvironment::new(Arc::new(test_clock()), Arc::new(SequentialIds::new("log")));
//!
//! ReducerTest::new(OrderReducer)
//!     .with_env(env)
//!     .given_state(order_in(OrderStatus::Packaging))
//!     .when_action(OrderAction::Update {
//!         actor: Actor::new("staff-1", Role::Pharmacist),
//!         update: OrderUpdate::transition(OrderStatus::Shipped),
//!     })
//!     .then_state(|order| assert!(order.shipped_at.is_some()))
//!     .run();
//! ```

use chrono::{DateTime, Duration, Utc};
use rx_dispatch_core::environment::{Clock, IdGenerator};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};


/// Mock implementations of Environment traits
pub mod mocks {
    use super::{AtomicU64, Clock, DateTime, Duration, IdGenerator, Mutex, Ordering, Utc};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use rx_dispatch_testing::mocks::FixedClock;
    /// use rx_dispatch_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// assert_eq!(clock.now(), clock.now());
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Clock that moves forward by a fixed step on every read.
    ///
    /// Useful where ordering by timestamp matters, e.g. status logs that are
    /// displayed newest first.
    #[derive(Debug)]
    pub struct SteppingClock {
        next: Mutex<DateTime<Utc>>,
        step: Duration,
    }

    impl SteppingClock {
        /// Start at `start`, advancing `step` after each call to `now`
        #[must_use]
        pub const fn new(start: DateTime<Utc>, step: Duration) -> Self {
            Self {
                next: Mutex::new(start),
                step,
            }
        }
    }

    impl Clock for SteppingClock {
        fn now(&self) -> DateTime<Utc> {
            let mut next = match self.next.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            let now = *next;
            *next = now + self.step;
            now
        }
    }

    /// Id generator yielding `{prefix}-1`, `{prefix}-2`, ...
    ///
    /// # Example
    ///
    /// ```
    /// use rx_dispatch_testing::mocks::SequentialIds;
    /// use rx_dispatch_core::environment::IdGenerator;
    ///
    /// let ids = SequentialIds::new("log");
    /// assert_eq!(ids.next_id(), "log-1");
    /// assert_eq!(ids.next_id(), "log-2");
    /// ```
    #[derive(Debug)]
    pub struct SequentialIds {
        prefix: &'static str,
        next: AtomicU64,
    }

    impl SequentialIds {
        /// Start counting at 1
        #[must_use]
        pub const fn new(prefix: &'static str) -> Self {
            Self {
                prefix,
                next: AtomicU64::new(1),
            }
        }
    }

    impl IdGenerator for SequentialIds {
        fn next_id(&self) -> String {
            let n = self.next.fetch_add(1, Ordering::Relaxed);
            format!("{}-{n}", self.prefix)
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    #[must_use]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(test_epoch())
    }

    /// The instant `test_clock` is frozen at.
    #[must_use]
    pub fn test_epoch() -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(1_735_689_600, 0).unwrap_or_default()
    }
}

/// Install a test-writer tracing subscriber; repeated calls are harmless.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

// Re-export commonly used items
pub use mocks::{FixedClock, SequentialIds, SteppingClock, test_clock, test_epoch};
pub use reducer_test::ReducerTest;
