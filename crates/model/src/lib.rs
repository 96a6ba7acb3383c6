//! An abstraction layer for the language models behind the study agents.
//!
//! This crate establishes an unified protocol for the orchestrators to
//! talk to any supported completion backend, so that the coaching and
//! visualization pipelines can switch between them without modifying
//! the core codebase.
//!
//! Types in this crate don't define any behavior, instead they are the
//! constraints that the implementors should adhere to.

#![deny(missing_docs)]

mod content;
mod error;
mod provider;
mod request;
mod response;

pub use content::*;
pub use error::*;
pub use provider::*;
pub use request::*;
pub use response::*;
