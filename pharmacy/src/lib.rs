//! Rx Dispatch: order and prescription workflows for a compounding pharmacy.
//!
//! # Architecture
//!
//! ```text
//! HTTP (api, server) ──► PharmacyService ──► reducers (workflow)
//!                              │                    │
//!                              │              Vec<Write>
//!                              ▼                    ▼
//!                        PharmacyStore::commit (one transaction)
//! ```
//!
//! Reducers in [`workflow`] are pure: they validate an action against a
//! loaded record and either refuse it or return the writes that carry it
//! out. [`service::PharmacyService`] loads, reduces and commits; the
//! [`store`] backends apply a batch atomically.

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod api;
pub mod config;
pub mod error;
pub mod identity;
pub mod metrics;
pub mod role;
pub mod server;
pub mod service;
pub mod store;
pub mod types;
pub mod validate;
pub mod workflow;

pub use error::{StoreError, WorkflowError};
pub use identity::{Actor, ActorResolver, StaticResolver};
pub use role::Role;
pub use service::PharmacyService;
pub use store::{InMemoryStore, PharmacyStore, PostgresStore};
