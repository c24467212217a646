//! # Scored Results
//!
//! Per-CV scores the worker wrote for a run, as served back by the backend
//! for review and export.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::processing::ProcessingJob;

/// Scores of one CV within a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CvAnalysis {
    pub id: String,
    pub cv_id: String,
    pub processing_id: String,
    pub candidate_name: String,
    #[serde(default)]
    pub profession: String,
    #[serde(default)]
    pub years_experience: f64,
    pub profession_score: f64,
    pub experience_score: f64,
    pub skills_score: f64,
    pub total_score: f64,
    #[serde(default)]
    pub ai_reasoning: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// One page of a run's results, with the run itself
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingResults {
    pub results: Vec<CvAnalysis>,
    /// Matching results across every page
    pub total: usize,
    pub processing: ProcessingJob,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

/// Paging, search and ordering for `GET /v1/processing/{id}/results`
///
/// Unset fields are left to the backend's defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultsQuery {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
    pub search: Option<String>,
    pub sort_field: Option<String>,
    pub sort_direction: Option<SortDirection>,
}

impl ResultsQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, page: u32, page_size: u32) -> Self {
        self.page = Some(page);
        self.page_size = Some(page_size);
        self
    }

    pub fn search(mut self, term: impl Into<String>) -> Self {
        self.search = Some(term.into());
        self
    }

    pub fn sort_by(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.sort_field = Some(field.into());
        self.sort_direction = Some(direction);
        self
    }

    /// Query-string pairs, skipping unset, zero and blank values
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(page) = self.page.filter(|p| *p > 0) {
            pairs.push(("page", page.to_string()));
        }
        if let Some(size) = self.page_size.filter(|s| *s > 0) {
            pairs.push(("page_size", size.to_string()));
        }
        if let Some(search) = self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            pairs.push(("search", search.to_string()));
        }
        if let Some(field) = self.sort_field.as_deref().filter(|f| !f.is_empty()) {
            pairs.push(("sort_field", field.to_string()));
        }
        if let Some(direction) = self.sort_direction {
            pairs.push(("sort_direction", direction.as_str().to_string()));
        }
        pairs
    }
}

/// File formats offered by `GET /v1/export/processing/{id}/{format}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    Csv,
    Excel,
}

impl ExportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Excel => "excel",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
