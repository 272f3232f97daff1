//! # Rx Dispatch Core
//!
//! Core traits and types shared by every Rx Dispatch workflow.
//!
//! The pharmacy workflows are written as "Functional Core, Imperative Shell":
//! reducers decide, the shell persists.
//!
//! ## Core Concepts
//!
//! - **State**: The loaded entity a workflow acts on (an order, a prescription)
//! - **Action**: A request to change that entity
//! - **Reducer**: Pure function `(State, Action, Environment) → Result<(State, Effects)>`
//! - **Effect**: Description of a write (not execution)
//! - **Environment**: Injected dependencies via traits (clock, id allocation)
//! - **Guarded machine**: Static edge table with optional role guards
//!
//! ## Example
//!
//! ```ignore
//! use rx_dispatch_core::{effect::Effect, reducer::Reducer, SmallVec};
//!
//! impl Reducer for OrderReducer {
//!     type State = OrderRecord;
//!     type Action = OrderAction;
//!     type Environment = WorkflowEnvironment;
//!     type Write = Write;
//!     type Error = WorkflowError;
//!
//!     fn reduce(
//!         &self,
//!         order: &mut OrderRecord,
//!         action: OrderAction,
//!         env: &WorkflowEnvironment,
//!     ) -> Result<SmallVec<[Effect<Write>; 4]>, WorkflowError> {
//!         // Validate, mutate, describe the writes
//!         Ok(SmallVec::new())
//!     }
//! }
//! ```

// Re-export commonly used types
pub use chrono::{DateTime, Utc};
pub use serde::{Deserialize, Serialize};
pub use smallvec::{SmallVec, smallvec};

pub mod machine;

/// Reducer module - The core trait for business logic
///
/// Reducers are pure functions: `(State, Action, Environment) → Result<(State, Effects)>`.
/// A rejected action leaves the state untouched and produces no effects, so
/// every precondition failure is detected before anything is written.
pub mod reducer {
    use super::effect::Effect;
    use smallvec::SmallVec;

    /// The Reducer trait - core abstraction for business logic
    ///
    /// # Type Parameters
    ///
    /// - `State`: The domain state this reducer operates on
    /// - `Action`: The action type this reducer processes
    /// - `Environment`: The injected dependencies this reducer needs
    /// - `Write`: The persistence operation its effects describe
    /// - `Error`: Why an action was refused
    pub trait Reducer {
        /// The state type this reducer operates on
        type State;

        /// The action type this reducer processes
        type Action;

        /// The environment type with injected dependencies
        type Environment;

        /// The write type carried by [`Effect::Persist`]
        type Write;

        /// The rejection type
        type Error;

        /// Reduce an action into state changes and effects
        ///
        /// This is a pure function that:
        /// 1. Validates the action against the current state
        /// 2. Updates state in place
        /// 3. Returns descriptions of the writes that persist the change
        ///
        /// # Errors
        ///
        /// Returns `Self::Error` when the action is refused. The state must
        /// not have been modified in that case.
        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            env: &Self::Environment,
        ) -> Result<SmallVec<[Effect<Self::Write>; 4]>, Self::Error>;
    }
}

/// Effect module - Side effect descriptions
///
/// Effects describe writes to be performed by the shell.
/// They are values (not execution) and are committed together.
pub mod effect {
    /// Effect type - describes a write to be executed
    ///
    /// Effects are NOT executed immediately. They are returned from reducers
    /// and handed to the persistence layer, which commits all of them in a
    /// single transaction.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Effect<W> {
        /// No-op effect
        None,

        /// Persist one write
        Persist(W),

        /// Run effects sequentially
        Sequential(Vec<Effect<W>>),
    }

    impl<W> Effect<W> {
        /// Chain effects to run sequentially
        #[must_use]
        pub const fn chain(effects: Vec<Effect<W>>) -> Effect<W> {
            Effect::Sequential(effects)
        }

        /// Whether this effect performs no write at all
        #[must_use]
        pub fn is_none(&self) -> bool {
            match self {
                Effect::None => true,
                Effect::Persist(_) => false,
                Effect::Sequential(effects) => effects.iter().all(Effect::is_none),
            }
        }

        /// Flatten a batch of effects into the ordered list of writes they describe
        pub fn flatten<I>(effects: I) -> Vec<W>
        where
            I: IntoIterator<Item = Effect<W>>,
        {
            let mut writes = Vec::new();
            for effect in effects {
                effect.collect_into(&mut writes);
            }
            writes
        }

        fn collect_into(self, writes: &mut Vec<W>) {
            match self {
                Effect::None => {},
                Effect::Persist(write) => writes.push(write),
                Effect::Sequential(effects) => {
                    for effect in effects {
                        effect.collect_into(writes);
                    }
                },
            }
        }
    }
}

/// Environment module - Dependency injection traits
///
/// All external dependencies are abstracted behind traits and injected
/// via the Environment parameter.
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    ///
    /// # Examples
    ///
    /// ```
    /// use rx_dispatch_core::environment::{Clock, SystemClock};
    ///
    /// let clock = SystemClock;
    /// assert!(clock.now() <= chrono::Utc::now());
    /// ```
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Production clock backed by the system time
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }

    /// `IdGenerator` trait - abstracts identifier allocation for testability
    ///
    /// Reducers that create entities or audit rows draw ids from here, so a
    /// test environment can make them predictable.
    pub trait IdGenerator: Send + Sync {
        /// Allocate a fresh, unique identifier
        fn next_id(&self) -> String;
    }
}
