//! tally - engagement ledger service
//!
//! Tracks a user's remaining free views, toggles likes and saves
//! between users and ideas while keeping denormalized counters in sync,
//! and awards reward points - all over a document store that offers
//! only independent single-document atomic operations.
//!
//! ## Components
//!
//! - **Auth**: JWT verification resolving the caller's subject identity
//! - **Store**: atomic primitives over the users/ideas collections
//!   (MongoDB in production, in-memory for dev and tests)
//! - **Ledger**: the core - provisioning, quota, like/save toggles,
//!   rewards, reconciliation
//! - **Projection**: expands relation sets into idea documents for display
//! - **Server/Routes**: thin hyper glue over the ledger

pub mod auth;
pub mod config;
pub mod db;
pub mod ledger;
pub mod projection;
pub mod routes;
pub mod server;
pub mod store;
pub mod types;

pub use config::Args;
pub use server::{run, AppState};
pub use types::{LedgerError, Result};
