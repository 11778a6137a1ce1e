//! # MedScan Station Library
//!
//! Diagnostic review station: upload a medical image, run it against an
//! external inference backend, capture correctness feedback, and persist
//! flagged cases as publicly visible training comments with live fan-out
//! to every connected viewer.
//!
//! **Architecture:** one live diagnostic session per station instance,
//! any number of viewers over HTTP/SSE.

pub mod api;
pub mod inference;
pub mod intake;
pub mod session;
pub mod state;
pub mod store;

pub use medscan_common::{Error, Result};
pub use state::AppState;
