//! Shared types for tally

mod error;

pub use error::{LedgerError, Result, WriteHalf};
