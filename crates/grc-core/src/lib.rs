//! grc-core library.
//!
//! Parses flow notation into a directed graph of entities and steps, then
//! simplifies it for rendering.
//!
//! # Conventions
//!
//! - **Errors**: [`FlowError`] for document and graph failures, `anyhow` for
//!   config loading.
//! - **Logging**: `tracing` macros (`debug!`, `trace!`); callers install the
//!   subscriber.

#![forbid(unsafe_code)]

pub mod config;
pub mod document;
pub mod error;
pub mod export;
pub mod flow;
pub mod line;
pub mod term;

pub use document::{Compiled, Document, FlowLine, Metadata};
pub use error::{ErrorCode, FlowError, GrammarError, Result};
pub use line::{LineRecord, parse_line};
pub use term::{EntityTerm, StepTerm, parse_entity_term, parse_step_term};
