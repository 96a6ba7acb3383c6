//! Orchestration of the study coach: agent prompts, the coaching and
//! visualization pipelines, and the event stream they report through.

#![deny(missing_docs)]
#![deny(clippy::missing_safety_doc)]

#[macro_use]
extern crate tracing;

pub mod advisor;
mod agent_output;
mod coach;
pub mod conversation;
pub mod emitter;
mod error;
pub mod event;
mod model_client;
pub mod prompts;
pub mod visualize;

pub use agent_output::AgentOutput;
pub use coach::{Coach, CoachPlan, CoachRequest, SOLUTION_REQUEST};
pub use error::{Error, ErrorKind};
pub use model_client::{ModelClient, ModelClientResponse};
