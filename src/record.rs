use crate::error::ReportError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const MIN_SCORE: i64 = 0;
pub const MAX_SCORE: i64 = 5;

// Folded into the summary upstream; never rendered as its own scorecard.
const JOB_FIT: &str = "job fit";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    #[serde(alias = "pass", alias = "PASS")]
    Pass,
    #[serde(alias = "fail", alias = "FAIL")]
    Fail,
}

impl Status {
    pub fn label(self) -> &'static str {
        match self {
            Status::Pass => "Pass",
            Status::Fail => "Fail",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CriterionResult {
    pub name: String,
    pub assessment: String,
    pub score: i64,
}

/// Structured outcome of one interview, as produced by the assessment flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssessmentRecord {
    pub candidate_name: String,
    pub role: String,
    pub interview_date: String,
    pub status: Status,
    #[serde(default)]
    pub criteria: Vec<CriterionResult>,
    #[serde(default)]
    pub summary: String,
}

impl AssessmentRecord {
    /// Criteria that get their own scorecard, in input order.
    pub fn rendered_criteria(&self) -> impl Iterator<Item = &CriterionResult> {
        self.criteria.iter().filter(|c| !is_job_fit(&c.name))
    }
}

pub fn is_job_fit(name: &str) -> bool {
    name.trim().eq_ignore_ascii_case(JOB_FIT)
}

/// What to do with a score outside `0..=5`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScorePolicy {
    #[default]
    Reject,
    Clamp,
    /// Prints the raw value; bar geometry and colour are still bounded.
    PassThrough,
}

impl ScorePolicy {
    /// Returns the score to print.
    pub fn apply(self, criterion: &str, score: i64) -> Result<i64, ReportError> {
        if (MIN_SCORE..=MAX_SCORE).contains(&score) {
            return Ok(score);
        }
        match self {
            ScorePolicy::Reject => Err(ReportError::InvalidScore {
                criterion: criterion.to_string(),
                score,
            }),
            ScorePolicy::Clamp => Ok(score.clamp(MIN_SCORE, MAX_SCORE)),
            ScorePolicy::PassThrough => Ok(score),
        }
    }
}

impl FromStr for ScorePolicy {
    type Err = ReportError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "reject" => Ok(ScorePolicy::Reject),
            "clamp" => Ok(ScorePolicy::Clamp),
            "pass-through" | "passthrough" | "pass_through" => Ok(ScorePolicy::PassThrough),
            other => Err(ReportError::InvalidConfiguration(format!(
                "unknown score policy '{}' (expected reject, clamp or pass-through)",
                other
            ))),
        }
    }
}
