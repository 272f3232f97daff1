//! Guarded state machines.
//!
//! Every workflow in the system (order lifecycle, prescription verification,
//! the compounding slice) is a finite set of states plus a fixed edge table.
//! Some edges additionally name the roles allowed to take them. This module
//! implements that shape once; the domain crates only declare tables.
//!
//! Tables are `const`, so a machine is a plain `static` with no runtime setup:
//!
//! ```
//! use rx_dispatch_core::machine::{Edge, GuardedMachine, MachineError};
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq)]
//! enum Door { Open, Closed, Locked }
//!
//! impl std::fmt::Display for Door {
//!     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
//!         std::fmt::Debug::fmt(self, f)
//!     }
//! }
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq)]
//! enum Who { Guest, Janitor }
//!
//! static DOOR: GuardedMachine<Door, Who> = GuardedMachine::new(
//!     "door",
//!     &[
//!         Edge::open(Door::Open, Door::Closed),
//!         Edge::open(Door::Closed, Door::Open),
//!         Edge::guarded(Door::Closed, Door::Locked, &[Who::Janitor]),
//!     ],
//! );
//!
//! assert!(DOOR.is_allowed(Door::Closed, Door::Locked));
//! assert!(DOOR.is_terminal(Door::Locked));
//! assert!(matches!(
//!     DOOR.check(Door::Closed, Door::Locked, Who::Guest),
//!     Err(MachineError::Forbidden { .. })
//! ));
//! ```

use std::fmt;
use thiserror::Error;

/// A single permitted transition.
#[derive(Debug, Clone, Copy)]
pub struct Edge<S: 'static, R: 'static> {
    /// Source state
    pub from: S,
    /// Target state
    pub to: S,
    /// Roles allowed to take this edge; empty means anyone
    pub requires: &'static [R],
}

impl<S, R> Edge<S, R> {
    /// An edge any actor may take.
    #[must_use]
    pub const fn open(from: S, to: S) -> Self {
        Self {
            from,
            to,
            requires: &[],
        }
    }

    /// An edge restricted to the listed roles.
    #[must_use]
    pub const fn guarded(from: S, to: S, requires: &'static [R]) -> Self {
        Self { from, to, requires }
    }
}

/// Why a machine refused a transition.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MachineError<S: fmt::Display + fmt::Debug> {
    /// No edge from `from` to `to`.
    #[error("Cannot transition from {from} to {to}")]
    InvalidTransition {
        /// Machine that refused
        machine: &'static str,
        /// Current state
        from: S,
        /// Requested state
        to: S,
    },

    /// The edge exists but the actor's role is not among its guards.
    #[error("Role not permitted to transition from {from} to {to}")]
    Forbidden {
        /// Machine that refused
        machine: &'static str,
        /// Current state
        from: S,
        /// Requested state
        to: S,
    },
}

/// A fixed directed graph of states with optional role guards per edge.
#[derive(Debug)]
pub struct GuardedMachine<S: 'static, R: 'static> {
    name: &'static str,
    edges: &'static [Edge<S, R>],
}

impl<S, R> GuardedMachine<S, R>
where
    S: Copy + Eq + fmt::Display + fmt::Debug,
    R: Copy + Eq,
{
    /// Declare a machine over a static edge table.
    #[must_use]
    pub const fn new(name: &'static str, edges: &'static [Edge<S, R>]) -> Self {
        Self { name, edges }
    }

    /// Machine name, used in logs and errors.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// The full edge table.
    #[must_use]
    pub const fn edges(&self) -> &'static [Edge<S, R>] {
        self.edges
    }

    fn edge(&self, from: S, to: S) -> Option<&'static Edge<S, R>> {
        self.edges.iter().find(|e| e.from == from && e.to == to)
    }

    /// Whether the table has an edge from `from` to `to`, ignoring guards.
    #[must_use]
    pub fn is_allowed(&self, from: S, to: S) -> bool {
        self.edge(from, to).is_some()
    }

    /// States reachable in one step from `from`, in table order.
    pub fn successors(&self, from: S) -> impl Iterator<Item = S> + '_ {
        self.edges.iter().filter(move |e| e.from == from).map(|e| e.to)
    }

    /// Whether `state` has no outgoing edge.
    #[must_use]
    pub fn is_terminal(&self, state: S) -> bool {
        self.successors(state).next().is_none()
    }

    /// Validate a transition for an actor holding `role`.
    ///
    /// # Errors
    ///
    /// - [`MachineError::InvalidTransition`] when the table has no such edge
    /// - [`MachineError::Forbidden`] when the edge is guarded and `role` is not listed
    pub fn check(&self, from: S, to: S, role: R) -> Result<(), MachineError<S>> {
        let edge = self.edge(from, to).ok_or(MachineError::InvalidTransition {
            machine: self.name,
            from,
            to,
        })?;

        if edge.requires.is_empty() || edge.requires.contains(&role) {
            Ok(())
        } else {
            Err(MachineError::Forbidden {
                machine: self.name,
                from,
                to,
            })
        }
    }

    /// Validate a transition by table membership alone, ignoring guards.
    ///
    /// # Errors
    ///
    /// Returns [`MachineError::InvalidTransition`] when the table has no such edge.
    pub fn check_edge(&self, from: S, to: S) -> Result<(), MachineError<S>> {
        if self.is_allowed(from, to) {
            Ok(())
        } else {
            Err(MachineError::InvalidTransition {
                machine: self.name,
                from,
                to,
            })
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Light {
        Red,
        Green,
        Amber,
        Off,
    }

    impl fmt::Display for Light {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            let s = match self {
                Light::Red => "red",
                Light::Green => "green",
                Light::Amber => "amber",
                Light::Off => "off",
            };
            f.write_str(s)
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Operator {
        Timer,
        Engineer,
    }

    static LIGHTS: GuardedMachine<Light, Operator> = GuardedMachine::new(
        "lights",
        &[
            Edge::open(Light::Red, Light::Green),
            Edge::open(Light::Green, Light::Amber),
            Edge::open(Light::Amber, Light::Red),
            Edge::guarded(Light::Red, Light::Off, &[Operator::Engineer]),
        ],
    );

    const ALL: [Light; 4] = [Light::Red, Light::Green, Light::Amber, Light::Off];

    #[test]
    fn open_edge_accepts_any_role() {
        assert_eq!(LIGHTS.check(Light::Red, Light::Green, Operator::Timer), Ok(()));
        assert_eq!(LIGHTS.check(Light::Red, Light::Green, Operator::Engineer), Ok(()));
    }

    #[test]
    fn guarded_edge_rejects_unlisted_role() {
        assert_eq!(
            LIGHTS.check(Light::Red, Light::Off, Operator::Timer),
            Err(MachineError::Forbidden {
                machine: "lights",
                from: Light::Red,
                to: Light::Off,
            })
        );
        assert_eq!(LIGHTS.check(Light::Red, Light::Off, Operator::Engineer), Ok(()));
    }

    #[test]
    fn missing_edge_names_the_pair() {
        let err = LIGHTS
            .check(Light::Green, Light::Red, Operator::Engineer)
            .unwrap_err();
        assert_eq!(err.to_string(), "Cannot transition from green to red");
    }

    #[test]
    fn successors_follow_table_order() {
        let next: Vec<_> = LIGHTS.successors(Light::Red).collect();
        assert_eq!(next, vec![Light::Green, Light::Off]);
        assert!(LIGHTS.is_terminal(Light::Off));
        assert!(!LIGHTS.is_terminal(Light::Amber));
    }

    proptest! {
        #[test]
        fn check_edge_agrees_with_is_allowed(from in 0usize..4, to in 0usize..4) {
            let (from, to) = (ALL[from], ALL[to]);
            prop_assert_eq!(LIGHTS.check_edge(from, to).is_ok(), LIGHTS.is_allowed(from, to));
        }
    }
}
