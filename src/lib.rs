//! Convergr - drives multi-round file generation against a planned manifest.
//!
//! A generator is invoked repeatedly with the paths still outstanding; its
//! reports are reconciled against the manifest despite inconsistent path
//! spellings, and the loop stops when everything is done, progress stalls,
//! a hard iteration cap is hit, or the caller cancels.

pub mod error;
pub mod generator;
pub mod id;
pub mod manifest;
pub mod reconcile;
pub mod runner;
pub mod storage;

pub use error::{ConvergrError, Result};
