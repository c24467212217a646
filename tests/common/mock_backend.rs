use async_trait::async_trait;
use parking_lot::Mutex;

use chrono::Utc;
use ddc_processing::models::{
    CvAnalysis, ExportFormat, ProcessingJob, ProcessingResults, ResultsQuery,
    StartProcessingRequest, StartProcessingResponse, WeightFractions,
};
use ddc_processing::{ProcessingBackend, ProcessingError, ProcessingResult, ProcessingStatus};

pub const JOB_ID: &str = "proc-1";

/// In-memory backend holding a single processing run
#[derive(Debug)]
pub struct MockBackend {
    cv_ids: Vec<String>,
    start_status: ProcessingStatus,
    conflict: bool,
    fail_finish: bool,
    fail_cancel: bool,
    status: Mutex<ProcessingStatus>,
    pub start_requests: Mutex<Vec<StartProcessingRequest>>,
    pub finish_calls: Mutex<Vec<String>>,
    pub cancel_calls: Mutex<Vec<String>>,
    pub results_queries: Mutex<Vec<ResultsQuery>>,
}

impl MockBackend {
    /// Starts runs over `cv_ids` in `processing` status
    pub fn new(cv_ids: Vec<String>) -> Self {
        Self {
            cv_ids,
            start_status: ProcessingStatus::Processing,
            conflict: false,
            fail_finish: false,
            fail_cancel: false,
            status: Mutex::new(ProcessingStatus::Pending),
            start_requests: Mutex::default(),
            finish_calls: Mutex::default(),
            cancel_calls: Mutex::default(),
            results_queries: Mutex::default(),
        }
    }

    /// Reject every start with a 409-style conflict
    pub fn with_active_run(mut self) -> Self {
        self.conflict = true;
        self
    }

    pub fn with_start_status(mut self, status: ProcessingStatus) -> Self {
        self.start_status = status;
        self
    }

    pub fn with_failing_finish(mut self) -> Self {
        self.fail_finish = true;
        self
    }

    /// Refuse every cancel with a 500, leaving the run as it was
    pub fn with_failing_cancel(mut self) -> Self {
        self.fail_cancel = true;
        self
    }

    pub fn status(&self) -> ProcessingStatus {
        *self.status.lock()
    }

    pub fn finish_count(&self) -> usize {
        self.finish_calls.lock().len()
    }

    fn job(&self, job_id: &str) -> ProcessingJob {
        let weights = WeightFractions::default();
        ProcessingJob {
            id: job_id.to_string(),
            ddc_id: "ddc-1".to_string(),
            name: "test run".to_string(),
            status: self.status(),
            cv_count: self.cv_ids.len(),
            processed_count: 0,
            failed_count: 0,
            profession_weight: weights.profession,
            experience_weight: weights.experience,
            skills_weight: weights.skills,
            started_at: None,
            completed_at: None,
            created_by: None,
            error_message: None,
        }
    }
}

#[async_trait]
impl ProcessingBackend for MockBackend {
    async fn start_processing(
        &self,
        request: &StartProcessingRequest,
    ) -> ProcessingResult<StartProcessingResponse> {
        self.start_requests.lock().push(request.clone());

        if self.conflict {
            return Err(ProcessingError::AlreadyActive {
                posting_id: request.ddc_id.clone(),
                message: "Ya existe un procesamiento activo para este DDC".to_string(),
            });
        }

        *self.status.lock() = self.start_status;
        let cv_ids = request.cv_ids.clone().unwrap_or_else(|| self.cv_ids.clone());

        Ok(StartProcessingResponse {
            processing_id: JOB_ID.to_string(),
            ddc_id: request.ddc_id.clone(),
            status: self.start_status,
            cv_count: cv_ids.len(),
            cv_ids,
            weights: WeightFractions {
                profession: request.profession_weight,
                experience: request.experience_weight,
                skills: request.skills_weight,
            },
            message: None,
        })
    }

    async fn finish_processing(&self, job_id: &str) -> ProcessingResult<()> {
        self.finish_calls.lock().push(job_id.to_string());

        if self.fail_finish {
            return Err(ProcessingError::api_error(500, "database unavailable"));
        }

        let mut status = self.status.lock();
        if *status != ProcessingStatus::Processing {
            return Err(ProcessingError::api_error(
                400,
                format!("processing is {}", *status),
            ));
        }
        *status = ProcessingStatus::Completed;
        Ok(())
    }

    async fn get_processing(&self, job_id: &str) -> ProcessingResult<ProcessingJob> {
        Ok(self.job(job_id))
    }

    async fn cancel_processing(&self, job_id: &str) -> ProcessingResult<()> {
        self.cancel_calls.lock().push(job_id.to_string());
        if self.fail_cancel {
            return Err(ProcessingError::api_error(500, "cancel unavailable"));
        }
        *self.status.lock() = ProcessingStatus::Cancelled;
        Ok(())
    }

    async fn list_processings(&self, _posting_id: &str) -> ProcessingResult<Vec<ProcessingJob>> {
        Ok(vec![self.job(JOB_ID)])
    }

    async fn get_processing_results(
        &self,
        job_id: &str,
        query: &ResultsQuery,
    ) -> ProcessingResult<ProcessingResults> {
        self.results_queries.lock().push(query.clone());
        let results: Vec<CvAnalysis> = self
            .cv_ids
            .iter()
            .enumerate()
            .map(|(i, cv_id)| CvAnalysis {
                id: format!("an-{i}"),
                cv_id: cv_id.clone(),
                processing_id: job_id.to_string(),
                candidate_name: format!("Candidate {i}"),
                profession: "Analyst".to_string(),
                years_experience: i as f64,
                profession_score: 50.0,
                experience_score: 50.0,
                skills_score: 50.0,
                total_score: 50.0,
                ai_reasoning: None,
                created_at: Utc::now(),
            })
            .collect();
        Ok(ProcessingResults {
            total: results.len(),
            results,
            processing: self.job(job_id),
        })
    }

    async fn export_processing_results(
        &self,
        job_id: &str,
        format: ExportFormat,
    ) -> ProcessingResult<Vec<u8>> {
        Ok(format!("{job_id}.{format}").into_bytes())
    }
}
