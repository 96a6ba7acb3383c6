//! The fixed instruction text of every agent role.

use std::fmt::{self, Display};
use std::str::FromStr;

/// A specialized agent, identified by its system prompt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AgentRole {
    /// Breaks a problem into reasoning steps, answers in JSON.
    Decomposer,
    /// Guides the student with questions and hints.
    Coach,
    /// Reviews a student's solution like a TA would.
    Critic,
    /// Builds a study schedule for an exam.
    Planner,
    /// Surfaces recurring misconceptions.
    Tracker,
    /// Writes animation code plus a narration script.
    Visualizer,
}

impl AgentRole {
    /// Every role, in a stable order.
    pub const ALL: [AgentRole; 6] = [
        AgentRole::Decomposer,
        AgentRole::Coach,
        AgentRole::Critic,
        AgentRole::Planner,
        AgentRole::Tracker,
        AgentRole::Visualizer,
    ];

    /// Returns the lowercase name of the role.
    pub fn name(self) -> &'static str {
        match self {
            AgentRole::Decomposer => "decomposer",
            AgentRole::Coach => "coach",
            AgentRole::Critic => "critic",
            AgentRole::Planner => "planner",
            AgentRole::Tracker => "tracker",
            AgentRole::Visualizer => "visualizer",
        }
    }

    /// Returns the system prompt of the role.
    pub fn prompt(self) -> &'static str {
        match self {
            AgentRole::Decomposer => include_str!("prompts/decomposer.md"),
            AgentRole::Coach => include_str!("prompts/coach.md"),
            AgentRole::Critic => include_str!("prompts/critic.md"),
            AgentRole::Planner => include_str!("prompts/planner.md"),
            AgentRole::Tracker => include_str!("prompts/tracker.md"),
            AgentRole::Visualizer => include_str!("prompts/visualizer.md"),
        }
    }
}

impl Display for AgentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned when parsing an unknown role name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnknownAgentRole(String);

impl Display for UnknownAgentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Unknown agent type: {}", self.0)
    }
}

impl std::error::Error for UnknownAgentRole {}

impl FromStr for AgentRole {
    type Err = UnknownAgentRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AgentRole::ALL
            .into_iter()
            .find(|role| role.name() == s)
            .ok_or_else(|| UnknownAgentRole(s.to_owned()))
    }
}
