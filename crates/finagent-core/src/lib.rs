//! Core abstractions for finagent
//!
//! Every agent in the pipeline (market data, scraping, retrieval, narrative,
//! voice, orchestration) is reachable through the [`Agent`] trait, which takes
//! a free-form query plus a [`Context`] and produces a text response.

pub mod agent;
pub mod context;
pub mod error;

pub use agent::Agent;
pub use context::{Context, InputMode};
pub use error::{Error, Result};
