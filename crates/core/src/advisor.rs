//! One-shot advisors: solution critique and study planning.
//!
//! Unlike the coaching and visualization pipelines these answer with a
//! single JSON document, there is nothing to stream.

use std::fmt::{self, Display};

use qed_model::{ModelMessage, ModelOptions};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::agent_output::AgentOutput;
use crate::error::Error;
use crate::model_client::ModelClient;
use crate::prompts::AgentRole;

/// A request to review a student's solution.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct CritiqueRequest {
    /// The problem statement.
    #[serde(default)]
    pub problem: String,
    /// The student's solution.
    #[serde(default)]
    pub solution: String,
}

/// The review of a solution.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CritiqueResponse {
    /// The critic's answer as written.
    pub critique: String,
    /// The answer as JSON, if it was.
    pub parsed: Option<Value>,
}

/// A request for a study plan.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannerRequest {
    /// The course being studied.
    #[serde(default)]
    pub course_name: String,
    /// The topics covered by the exam, free-form.
    #[serde(default)]
    pub topics: String,
    /// When the exam takes place, free-form.
    #[serde(default)]
    pub exam_date: String,
    /// Study hours available per week.
    #[serde(default)]
    pub weekly_hours: Option<f64>,
    /// A self-assessment of the student.
    #[serde(default)]
    pub current_level: Option<String>,
}

/// A study plan.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PlanResponse {
    /// The planner's answer as written.
    pub plan: String,
    /// The answer as JSON, if it was.
    pub parsed: Option<Value>,
}

/// Error type for the advisors.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AdvisorError {
    /// The request is missing required fields.
    InvalidRequest(&'static str),
    /// The model call failed.
    Model(Error),
}

impl Display for AdvisorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdvisorError::InvalidRequest(message) => f.write_str(message),
            AdvisorError::Model(err) => Display::fmt(err, f),
        }
    }
}

impl std::error::Error for AdvisorError {}

impl From<Error> for AdvisorError {
    fn from(err: Error) -> Self {
        AdvisorError::Model(err)
    }
}

/// Runs the critic and planner agents.
#[derive(Clone)]
pub struct Advisor {
    client: ModelClient,
    options: ModelOptions,
}

impl Advisor {
    /// Creates an advisor that calls the given client.
    #[inline]
    pub fn new(client: ModelClient) -> Self {
        Self {
            client,
            options: ModelOptions::default(),
        }
    }

    /// Reviews a solution.
    pub async fn critique(
        &self,
        req: CritiqueRequest,
    ) -> Result<CritiqueResponse, AdvisorError> {
        if req.problem.trim().is_empty() || req.solution.trim().is_empty() {
            return Err(AdvisorError::InvalidRequest(
                "Problem and solution are required",
            ));
        }
        let prompt = format!(
            "Problem:\n{}\n\nStudent's solution:\n{}\n\n\
             Please review this solution.",
            req.problem, req.solution
        );
        let critique = self.ask(AgentRole::Critic, prompt).await?;
        let parsed = AgentOutput::parse_lenient(&critique).parsed().cloned();
        Ok(CritiqueResponse { critique, parsed })
    }

    /// Builds a study plan.
    pub async fn plan(
        &self,
        req: PlannerRequest,
    ) -> Result<PlanResponse, AdvisorError> {
        let weekly_hours = req.weekly_hours.filter(|h| *h > 0.0);
        let (Some(weekly_hours), false, false, false) = (
            weekly_hours,
            req.course_name.trim().is_empty(),
            req.topics.trim().is_empty(),
            req.exam_date.trim().is_empty(),
        ) else {
            return Err(AdvisorError::InvalidRequest(
                "Course name, topics, exam date, and weekly hours are required",
            ));
        };
        let mut prompt = format!(
            "Create a study plan for the following:\n\n\
             Course: {}\nTopics: {}\nExam date: {}\n\
             Weekly study hours available: {}",
            req.course_name, req.topics, req.exam_date, weekly_hours
        );
        if let Some(level) =
            req.current_level.filter(|l| !l.trim().is_empty())
        {
            prompt.push_str("\nCurrent level: ");
            prompt.push_str(&level);
        }
        let plan = self.ask(AgentRole::Planner, prompt).await?;
        let parsed = AgentOutput::parse_lenient(&plan).parsed().cloned();
        Ok(PlanResponse { plan, parsed })
    }

    async fn ask(
        &self,
        role: AgentRole,
        prompt: String,
    ) -> Result<String, Error> {
        debug!("asking the {role} agent");
        self.client
            .complete(
                role.prompt(),
                vec![ModelMessage::user_text(prompt)],
                self.options.clone(),
            )
            .await
    }
}
