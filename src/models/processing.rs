use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::weights::{WeightConfig, WeightFractions};
use crate::error::{ProcessingError, ProcessingResult};
use crate::state_machine::ProcessingStatus;
use crate::validation::{validate_cv_ids, validate_identifier};

/// A processing run as stored by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingJob {
    pub id: String,
    /// Target posting (DDC) the CVs are scored against
    pub ddc_id: String,
    pub name: String,
    pub status: ProcessingStatus,
    #[serde(default)]
    pub cv_count: usize,
    #[serde(default)]
    pub processed_count: usize,
    #[serde(default)]
    pub failed_count: usize,
    pub profession_weight: f64,
    pub experience_weight: f64,
    pub skills_weight: f64,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_by: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
}

impl ProcessingJob {
    pub fn weights(&self) -> WeightFractions {
        WeightFractions {
            profession: self.profession_weight,
            experience: self.experience_weight,
            skills: self.skills_weight,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }
}

/// What a caller asks for when starting a run
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessingRequest {
    pub posting_id: String,
    /// Defaults to `Processing <timestamp>` when absent or blank
    pub name: Option<String>,
    pub weights: WeightConfig,
    /// Restrict the run to these CVs; `None` scores every CV of the posting
    pub cv_ids: Option<Vec<String>>,
}

impl ProcessingRequest {
    pub fn new(posting_id: impl Into<String>, weights: WeightConfig) -> Self {
        Self {
            posting_id: posting_id.into(),
            name: None,
            weights,
            cv_ids: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_cv_ids(mut self, cv_ids: Vec<String>) -> Self {
        self.cv_ids = Some(cv_ids);
        self
    }

    /// Caller-supplied name, or a timestamped default
    pub fn run_name(&self, now: DateTime<Utc>) -> String {
        match self.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => format!("Processing {}", now.to_rfc3339()),
        }
    }

    /// Validate weights and build the wire request
    pub fn to_start_request(&self, now: DateTime<Utc>) -> ProcessingResult<StartProcessingRequest> {
        validate_identifier("ddc_id", &self.posting_id)?;
        let fractions = self.weights.to_fractions()?;

        if let Some(ids) = &self.cv_ids {
            if ids.is_empty() {
                return Err(ProcessingError::PlanningFailed {
                    posting_id: self.posting_id.clone(),
                    reason: "no CVs selected for processing".to_string(),
                });
            }
            validate_cv_ids(ids)?;
        }

        Ok(StartProcessingRequest {
            ddc_id: self.posting_id.clone(),
            name: self.run_name(now),
            profession_weight: fractions.profession,
            experience_weight: fractions.experience,
            skills_weight: fractions.skills,
            cv_ids: self.cv_ids.clone(),
        })
    }
}

/// Body of `POST /v1/processing/start`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartProcessingRequest {
    pub ddc_id: String,
    pub name: String,
    pub profession_weight: f64,
    pub experience_weight: f64,
    pub skills_weight: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cv_ids: Option<Vec<String>>,
}

/// Response of `POST /v1/processing/start`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartProcessingResponse {
    pub processing_id: String,
    pub ddc_id: String,
    pub status: ProcessingStatus,
    #[serde(default)]
    pub cv_count: usize,
    #[serde(default)]
    pub cv_ids: Vec<String>,
    pub weights: WeightFractions,
    #[serde(default)]
    pub message: Option<String>,
}
