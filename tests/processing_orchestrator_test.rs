//! End-to-end runs of the orchestrator against in-memory backend and worker fakes.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::*;
use ddc_processing::models::{
    ExportFormat, ProcessingRequest, ResultsQuery, SortDirection, StartProcessingResponse,
    WeightConfig, WeightFractions, WeightPreset,
};
use ddc_processing::orchestration::{Finalization, ResultAggregator, RunEvent};
use ddc_processing::{ProcessingError, ProcessingStatus};

fn request() -> ProcessingRequest {
    ProcessingRequest::new("ddc-1", WeightPreset::Standard.into()).with_name("Ronda 1")
}

fn started(job_id: &str, cv_count: usize) -> StartProcessingResponse {
    StartProcessingResponse {
        processing_id: job_id.to_string(),
        ddc_id: "ddc-1".to_string(),
        status: ProcessingStatus::Processing,
        cv_count,
        cv_ids: cv_ids(cv_count),
        weights: WeightFractions::default(),
        message: None,
    }
}

#[tokio::test]
async fn thirty_seven_cvs_in_batches_of_three_all_succeed() {
    let backend = Arc::new(MockBackend::new(cv_ids(37)));
    let worker = Arc::new(ScriptedWorker::succeeding());
    let (orchestrator, sleeper) = orchestrator_with(backend.clone(), worker.clone(), &test_config(3));

    let report = orchestrator.start_processing(request()).await.unwrap();

    assert_eq!(report.summary.total_batches, 13);
    assert_eq!(report.summary.succeeded_batches, 13);
    assert_eq!(report.summary.failed_batches, 0);
    assert_eq!(report.summary.processed, 37);
    assert_eq!(report.summary.success_rate(), 1.0);
    assert_eq!(
        report.summary.to_string(),
        "13/13 batches succeeded (100.0%), 37 CVs processed, 0 failed"
    );
    assert_eq!(report.finalization, Finalization::Finished);
    assert_eq!(report.final_status, ProcessingStatus::Completed);
    assert!(!report.cancelled);
    assert!(report.ensure_finalized().is_ok());

    assert_eq!(worker.call_count(), 13);
    let mut sizes: Vec<usize> = worker.calls().iter().map(|c| c.cv_ids.len()).collect();
    sizes.sort_unstable();
    assert_eq!(sizes[0], 1);
    assert!(sizes[1..].iter().all(|size| *size == 3));
    assert!(sleeper.delays().is_empty());

    assert_eq!(backend.finish_count(), 1);
    assert_eq!(backend.status(), ProcessingStatus::Completed);

    let progress = orchestrator.progress(JOB_ID).unwrap();
    assert!(!progress.is_processing);
    assert_eq!(progress.completed_batches, 13);
    assert_eq!(progress.processed_cvs, 37);
    assert_eq!(progress.percent_complete(), 100.0);
}

#[tokio::test]
async fn batch_failing_twice_succeeds_on_third_attempt_with_linear_backoff() {
    let backend = Arc::new(MockBackend::new(cv_ids(6)));
    let worker = Arc::new(ScriptedWorker::succeeding().with_batch(1, Behaviour::FailTimes(2)));
    let (orchestrator, sleeper) = orchestrator_with(backend, worker.clone(), &test_config(3));

    let report = orchestrator.start_processing(request()).await.unwrap();

    assert_eq!(report.summary.succeeded_batches, 2);
    assert_eq!(report.summary.processed, 6);
    assert_eq!(worker.calls_for(1), 3);
    assert_eq!(worker.calls_for(0), 1);
    assert_eq!(
        sleeper.delays(),
        vec![
            Duration::from_millis(BASE_DELAY_MS),
            Duration::from_millis(2 * BASE_DELAY_MS)
        ]
    );
}

#[tokio::test]
async fn batch_failing_every_attempt_reports_last_error() {
    let backend = Arc::new(MockBackend::new(cv_ids(3)));
    let worker = Arc::new(ScriptedWorker::new(Behaviour::AlwaysFail));
    let (orchestrator, sleeper) = orchestrator_with(backend.clone(), worker.clone(), &test_config(3));
    let mut events = orchestrator.subscribe();

    let report = orchestrator.start_processing(request()).await.unwrap();

    assert_eq!(report.summary.failed_batches, 1);
    assert_eq!(report.summary.processed, 0);
    assert_eq!(worker.call_count(), 3);
    assert_eq!(sleeper.delays().len(), 2);
    // finish is still issued; every batch failing is seen as a failed run
    assert_eq!(backend.finish_count(), 1);
    assert_eq!(report.final_status, ProcessingStatus::Failed);

    let mut batch_error = None;
    while let Ok(published) = events.try_recv() {
        if let RunEvent::BatchFailed { error, .. } = published.event {
            batch_error = Some(error);
        }
    }
    assert_eq!(
        batch_error.as_deref(),
        Some("Network error: batch 0 connection reset (attempt 3)")
    );
}

#[tokio::test]
async fn failing_batches_never_block_the_others() {
    let backend = Arc::new(MockBackend::new(cv_ids(20)));
    let worker = Arc::new(
        ScriptedWorker::succeeding()
            .with_batch(1, Behaviour::AlwaysFail)
            .with_batch(3, Behaviour::AlwaysFail)
            .with_batch(5, Behaviour::AlwaysFail),
    );
    let (orchestrator, _sleeper) = orchestrator_with(backend, worker.clone(), &test_config(3));

    let report = orchestrator.start_processing(request()).await.unwrap();

    // 20 ids in batches of 3: six full batches and one of 2
    assert_eq!(report.summary.total_batches, 7);
    assert_eq!(report.summary.failed_batches, 3);
    assert_eq!(report.summary.succeeded_batches, 4);
    assert_eq!(report.summary.processed, 3 + 3 + 3 + 2);
    assert_eq!(worker.calls_for(1), 3);
    assert_eq!(worker.calls_for(6), 1);
    assert_eq!(report.finalization, Finalization::Finished);
    assert_eq!(report.final_status, ProcessingStatus::Completed);
}

#[tokio::test]
async fn conflict_is_surfaced_without_any_batch_call() {
    let backend = Arc::new(MockBackend::new(cv_ids(9)).with_active_run());
    let worker = Arc::new(ScriptedWorker::succeeding());
    let (orchestrator, _sleeper) = orchestrator_with(backend.clone(), worker.clone(), &test_config(3));

    let err = orchestrator.start_processing(request()).await.unwrap_err();

    assert!(err.is_conflict());
    assert!(!err.is_recoverable());
    assert!(matches!(err, ProcessingError::AlreadyActive { .. }));
    assert_eq!(worker.call_count(), 0);
    assert_eq!(backend.finish_count(), 0);
}

#[tokio::test]
async fn terminal_run_is_not_startable() {
    let backend =
        Arc::new(MockBackend::new(cv_ids(9)).with_start_status(ProcessingStatus::Cancelled));
    let worker = Arc::new(ScriptedWorker::succeeding());
    let (orchestrator, _sleeper) = orchestrator_with(backend.clone(), worker.clone(), &test_config(3));

    let err = orchestrator.start_processing(request()).await.unwrap_err();

    assert!(matches!(
        err,
        ProcessingError::NotStartable {
            status: ProcessingStatus::Cancelled,
            ..
        }
    ));
    assert_eq!(worker.call_count(), 0);
    assert_eq!(backend.finish_count(), 0);
}

#[tokio::test]
async fn invalid_weights_never_reach_the_backend() {
    let backend = Arc::new(MockBackend::new(cv_ids(9)));
    let worker = Arc::new(ScriptedWorker::succeeding());
    let (orchestrator, _sleeper) = orchestrator_with(backend.clone(), worker, &test_config(3));

    let request = ProcessingRequest::new("ddc-1", WeightConfig::new(40, 40, 40));
    let err = orchestrator.start_processing(request).await.unwrap_err();

    assert!(matches!(err, ProcessingError::InvalidWeights(_)));
    assert!(backend.start_requests.lock().is_empty());
}

#[tokio::test]
async fn empty_run_completes_immediately() {
    let backend = Arc::new(MockBackend::new(Vec::new()));
    let worker = Arc::new(ScriptedWorker::succeeding());
    let (orchestrator, _sleeper) = orchestrator_with(backend.clone(), worker.clone(), &test_config(3));

    let report = orchestrator.start_processing(request()).await.unwrap();

    assert_eq!(report.summary.total_batches, 0);
    assert_eq!(report.summary.processed, 0);
    assert_eq!(report.summary.success_rate(), 1.0);
    assert_eq!(report.finalization, Finalization::Finished);
    assert_eq!(report.final_status, ProcessingStatus::Completed);
    assert_eq!(worker.call_count(), 0);
    assert_eq!(backend.finish_count(), 1);
}

#[tokio::test]
async fn explicit_selection_is_sent_and_planned() {
    let backend = Arc::new(MockBackend::new(cv_ids(30)));
    let worker = Arc::new(ScriptedWorker::succeeding());
    let (orchestrator, _sleeper) = orchestrator_with(backend.clone(), worker.clone(), &test_config(3));

    let selection = vec!["cv-3".to_string(), "cv-9".to_string(), "cv-27".to_string(), "cv-28".to_string()];
    let report = orchestrator
        .start_processing(request().with_cv_ids(selection.clone()))
        .await
        .unwrap();

    assert_eq!(
        backend.start_requests.lock()[0].cv_ids.as_deref(),
        Some(selection.as_slice())
    );
    assert_eq!(report.summary.total_batches, 2);
    assert_eq!(report.summary.processed, 4);
}

#[tokio::test]
async fn finish_failure_is_reported_apart_from_batch_results() {
    let backend = Arc::new(MockBackend::new(cv_ids(9)).with_failing_finish());
    let worker = Arc::new(ScriptedWorker::succeeding());
    let (orchestrator, _sleeper) = orchestrator_with(backend.clone(), worker, &test_config(3));
    let mut events = orchestrator.subscribe();

    let report = orchestrator.start_processing(request()).await.unwrap();

    assert!(report.summary.all_succeeded());
    assert_eq!(report.summary.processed, 9);
    assert!(matches!(report.finalization, Finalization::Failed(_)));
    assert_eq!(report.final_status, ProcessingStatus::Processing);
    assert!(matches!(
        report.ensure_finalized(),
        Err(ProcessingError::FinalizationFailed { .. })
    ));

    let mut saw_finalization_failed = false;
    while let Ok(published) = events.try_recv() {
        if matches!(published.event, RunEvent::FinalizationFailed { .. }) {
            saw_finalization_failed = true;
        }
    }
    assert!(saw_finalization_failed);
}

#[tokio::test]
async fn second_finish_is_the_same_failure_kind() {
    let backend = Arc::new(MockBackend::new(cv_ids(3)));
    let worker = Arc::new(ScriptedWorker::succeeding());
    let (orchestrator, _sleeper) = orchestrator_with(backend.clone(), worker, &test_config(3));

    let mut report = orchestrator.start_processing(request()).await.unwrap();
    assert_eq!(report.finalization, Finalization::Finished);

    let aggregator = ResultAggregator::new(backend.clone());
    report.finalization = aggregator.finalize(&report.job_id).await;

    assert!(matches!(report.finalization, Finalization::Failed(_)));
    assert!(matches!(
        report.ensure_finalized(),
        Err(ProcessingError::FinalizationFailed { .. })
    ));
    assert_eq!(backend.finish_count(), 2);
}

#[tokio::test]
async fn bounded_fan_out_respects_limit() {
    let backend = Arc::new(MockBackend::new(cv_ids(24)));
    let worker = Arc::new(ScriptedWorker::succeeding().with_latency(Duration::from_millis(15)));
    let mut config = test_config(3);
    config.concurrency.max_in_flight = 2;
    let (orchestrator, _sleeper) = orchestrator_with(backend, worker.clone(), &config);

    let report = orchestrator.start_processing(request()).await.unwrap();

    assert_eq!(report.summary.succeeded_batches, 8);
    assert_eq!(worker.call_count(), 8);
    assert!(worker.peak_in_flight() <= 2);
}

#[tokio::test]
async fn events_follow_the_run() {
    let backend = Arc::new(MockBackend::new(cv_ids(7)));
    let worker = Arc::new(ScriptedWorker::succeeding().with_batch(2, Behaviour::AlwaysFail));
    let (orchestrator, _sleeper) = orchestrator_with(backend, worker, &test_config(3));
    let mut events = orchestrator.subscribe();

    orchestrator.start_processing(request()).await.unwrap();

    let mut types = Vec::new();
    while let Ok(published) = events.try_recv() {
        assert_eq!(published.event.job_id(), JOB_ID);
        types.push(published.event.event_type());
    }

    assert_eq!(types.first(), Some(&"run_started"));
    assert_eq!(types.last(), Some(&"run_completed"));
    assert_eq!(types.iter().filter(|t| **t == "batch_succeeded").count(), 2);
    assert_eq!(types.iter().filter(|t| **t == "batch_failed").count(), 1);
}

#[tokio::test]
async fn cancel_aborts_in_flight_batches_and_skips_finish() {
    let backend = Arc::new(MockBackend::new(cv_ids(6)));
    let worker = Arc::new(ScriptedWorker::new(Behaviour::Hang));
    let (orchestrator, _sleeper) = orchestrator_with(backend.clone(), worker.clone(), &test_config(3));
    let orchestrator = Arc::new(orchestrator);

    let runner = Arc::clone(&orchestrator);
    let run = tokio::spawn(async move { runner.start_processing(request()).await });

    worker.wait_for_call().await;
    assert!(orchestrator.is_running(JOB_ID));
    orchestrator.cancel(JOB_ID).await.unwrap();

    let report = tokio::time::timeout(Duration::from_secs(5), run)
        .await
        .expect("run did not stop after cancel")
        .unwrap()
        .unwrap();

    assert!(report.cancelled);
    assert_eq!(report.finalization, Finalization::Skipped);
    assert_eq!(report.final_status, ProcessingStatus::Cancelled);
    assert_eq!(report.summary.failed_batches, 2);
    assert!(report.ensure_finalized().is_ok());
    assert_eq!(backend.finish_count(), 0);
    assert_eq!(*backend.cancel_calls.lock(), vec![JOB_ID.to_string()]);
    assert!(!orchestrator.is_running(JOB_ID));
}

#[tokio::test]
async fn cancel_is_rejected_for_finished_runs() {
    let backend = Arc::new(MockBackend::new(cv_ids(3)));
    let worker = Arc::new(ScriptedWorker::succeeding());
    let (orchestrator, _sleeper) = orchestrator_with(backend.clone(), worker, &test_config(3));

    orchestrator.start_processing(request()).await.unwrap();
    let err = orchestrator.cancel(JOB_ID).await.unwrap_err();

    assert!(matches!(
        err,
        ProcessingError::NotCancellable {
            status: ProcessingStatus::Completed,
            ..
        }
    ));
    assert!(backend.cancel_calls.lock().is_empty());
}

#[tokio::test]
async fn refused_cancel_leaves_the_run_to_finish() {
    let backend = Arc::new(MockBackend::new(cv_ids(6)).with_failing_cancel());
    let worker = Arc::new(ScriptedWorker::succeeding().with_latency(Duration::from_millis(100)));
    let (orchestrator, _sleeper) = orchestrator_with(backend.clone(), worker.clone(), &test_config(3));
    let orchestrator = Arc::new(orchestrator);

    let runner = Arc::clone(&orchestrator);
    let run = tokio::spawn(async move { runner.start_processing(request()).await });

    worker.wait_for_call().await;
    let err = orchestrator.cancel(JOB_ID).await.unwrap_err();
    assert!(matches!(err, ProcessingError::Api { status: 500, .. }));
    assert!(orchestrator.is_running(JOB_ID));

    let report = tokio::time::timeout(Duration::from_secs(5), run)
        .await
        .expect("run did not finish")
        .unwrap()
        .unwrap();

    assert!(!report.cancelled);
    assert_eq!(report.summary.succeeded_batches, 2);
    assert_eq!(report.summary.processed, 6);
    assert_eq!(report.finalization, Finalization::Finished);
    assert_eq!(report.final_status, ProcessingStatus::Completed);
    assert_eq!(backend.finish_count(), 1);
    assert_eq!(backend.status(), ProcessingStatus::Completed);
    assert_eq!(backend.cancel_calls.lock().len(), 1);
}

#[tokio::test]
async fn overlapping_runs_keep_separate_progress() {
    let backend = Arc::new(MockBackend::new(Vec::new()));
    let worker = Arc::new(ScriptedWorker::succeeding().with_latency(Duration::from_millis(20)));
    let (orchestrator, _sleeper) = orchestrator_with(backend, worker.clone(), &test_config(3));

    let (a, b) = tokio::join!(
        orchestrator.run_processing(started("job-a", 6)),
        orchestrator.run_processing(started("job-b", 30)),
    );
    assert_eq!(a.unwrap().summary.total_batches, 2);
    assert_eq!(b.unwrap().summary.total_batches, 10);
    assert_eq!(worker.call_count(), 12);

    let a = orchestrator.progress("job-a").unwrap();
    assert!(!a.is_processing);
    assert_eq!(a.total_cvs, 6);
    assert_eq!(a.total_batches, 2);
    assert_eq!(a.completed_batches, 2);
    assert_eq!(a.processed_cvs, 6);

    let b = orchestrator.progress("job-b").unwrap();
    assert!(!b.is_processing);
    assert_eq!(b.total_cvs, 30);
    assert_eq!(b.total_batches, 10);
    assert_eq!(b.completed_batches, 10);
    assert_eq!(b.processed_cvs, 30);

    assert!(orchestrator.progress("job-c").is_none());
}

#[tokio::test]
async fn dropped_run_frees_its_job_for_the_next_attempt() {
    let backend = Arc::new(MockBackend::new(cv_ids(3)));
    let worker = Arc::new(ScriptedWorker::new(Behaviour::HangTimes(1)));
    let (orchestrator, _sleeper) = orchestrator_with(backend, worker.clone(), &test_config(3));

    let abandoned = tokio::time::timeout(
        Duration::from_millis(50),
        orchestrator.start_processing(request()),
    )
    .await;
    assert!(abandoned.is_err());
    assert!(!orchestrator.is_running(JOB_ID));

    let report = orchestrator.start_processing(request()).await.unwrap();
    assert_eq!(report.finalization, Finalization::Finished);
    assert_eq!(report.summary.processed, 3);
    assert_eq!(worker.call_count(), 2);
}

#[tokio::test]
async fn results_are_fetched_for_valid_run_ids_only() {
    let backend = Arc::new(MockBackend::new(cv_ids(4)));
    let worker = Arc::new(ScriptedWorker::succeeding());
    let (orchestrator, _sleeper) = orchestrator_with(backend.clone(), worker, &test_config(3));

    let query = ResultsQuery::new()
        .page(1, 20)
        .sort_by("total_score", SortDirection::Desc);
    let page = orchestrator.processing_results(JOB_ID, &query).await.unwrap();
    assert_eq!(page.total, 4);
    assert_eq!(page.results[0].cv_id, "cv-0");
    assert_eq!(page.processing.id, JOB_ID);
    assert_eq!(*backend.results_queries.lock(), vec![query]);

    let err = orchestrator
        .processing_results("../proc-1", &ResultsQuery::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ProcessingError::InvalidInput(_)));
    assert_eq!(backend.results_queries.lock().len(), 1);

    let file = orchestrator.export_results(JOB_ID, ExportFormat::Excel).await.unwrap();
    assert_eq!(file, b"proc-1.excel".to_vec());
}
