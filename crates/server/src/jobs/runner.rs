//! Analysis job runner.
//!
//! [`spawn_analysis_job`] is the entry point: it registers a [`JobRecord`]
//! and runs the pipeline in a background tokio task: decode, chunk,
//! document-level extraction, per-chunk risk analysis under a bounded
//! concurrency limit, report assembly, overlay rendering, and the report
//! write that flips the job to ready.
//!
//! Per-chunk failures never abort the job; they are recorded as outcomes
//! and surface as report issues. Only a failed report write leaves the job
//! unfinished, and then the client keeps seeing "processing".

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tracing::{error, info, warn};

use veridoc_analysis::analyzer::ChunkContext;
use veridoc_analysis::{extract_with_retry, ExtractionOutput, ExtractionRequest};
use veridoc_core::document::{Chunk, FieldMap, ImageRef, JobId};
use veridoc_core::report::{assemble, AssemblyInput, Report, ReportStatus};
use veridoc_core::verdict::{ChunkFailure, ChunkOutcome, FailureStage};
use veridoc_ingest::{chunk_document, decode_document};
use veridoc_storage::AnalysisStore;

use crate::state::AppState;

use super::types::{JobRecord, JobStatus};

/// Attempts for the final report write before the job is parked as failed.
const REPORT_WRITE_ATTEMPTS: u32 = 3;

// ── Public API ──────────────────────────────────────────────────────

/// Register a job and run the pipeline as a fire-and-forget background
/// task. Returns the record immediately.
pub fn spawn_analysis_job(state: Arc<AppState>, job_id: JobId, filename: String) -> Arc<JobRecord> {
    let job = Arc::new(JobRecord::new(job_id, filename));
    state.jobs.insert(job.clone());

    let state2 = state.clone();
    let job2 = job.clone();
    tokio::spawn(async move {
        run_analysis_job(state2, job2).await;
    });

    job
}

// ── Job execution ───────────────────────────────────────────────────

async fn run_analysis_job(state: Arc<AppState>, job: Arc<JobRecord>) {
    job.set_status(JobStatus::Running);
    let start = std::time::Instant::now();

    match execute_pipeline(&state, &job).await {
        Ok(status) => {
            job.finish(JobStatus::Completed, None);
            info!(
                job_id = %job.id,
                filename = %job.filename,
                report_status = ?status,
                chunks = job.chunks_total.load(Ordering::Relaxed),
                duration_ms = start.elapsed().as_millis() as u64,
                "analysis job completed"
            );
        }
        Err(e) => {
            // The report was never persisted: pollers keep seeing
            // "processing" rather than a falsely ready job.
            job.finish(JobStatus::Failed, Some(e.to_string()));
            error!(
                job_id = %job.id,
                filename = %job.filename,
                error = %e,
                "analysis job failed before its report could be persisted"
            );
        }
    }
}

/// Run the pipeline end-to-end. Returns the persisted report's status;
/// errors only for infrastructure failures that prevented persisting any
/// report at all.
async fn execute_pipeline(state: &AppState, job: &JobRecord) -> anyhow::Result<ReportStatus> {
    let bytes = state.store.get_document(&job.id, &job.filename).await?;

    // Decode. A format failure is fatal to analysis but still produces a
    // ready error-report.
    let doc = match decode_document(&bytes, &job.filename) {
        Ok(doc) => doc,
        Err(e) => {
            warn!(job_id = %job.id, error = %e, "document could not be decoded");
            let detail = e.to_string();
            let report = assemble(
                AssemblyInput {
                    form_id: &job.id,
                    fatal: Some(&detail),
                    ..Default::default()
                },
                &state.config.policy,
            );
            persist_report(&state.store, &job.id, &report).await?;
            return Ok(report.status);
        }
    };

    // Metadata is audit data only; losing it never fails the job.
    if let Err(e) = state.store.put_metadata(&job.id, &doc.metadata).await {
        warn!(job_id = %job.id, error = %e, "failed to persist document metadata");
    }

    let chunks = chunk_document(&doc, &state.config.chunking);
    job.chunks_total.store(chunks.len() as u64, Ordering::Relaxed);
    info!(job_id = %job.id, chunks = chunks.len(), "document chunked");

    if chunks.is_empty() {
        let report = assemble(
            AssemblyInput {
                form_id: &job.id,
                fatal: Some("document produced no analyzable chunks"),
                ..Default::default()
            },
            &state.config.policy,
        );
        persist_report(&state.store, &job.id, &report).await?;
        return Ok(report.status);
    }

    // Document-level extraction: structured fields plus an optional image
    // crop, persisted by reference.
    let (fields, image, extraction_failure) = run_extraction(state, job, &doc.full_text()).await;

    // Per-chunk risk analysis, bounded fan-out, outcomes in chunk order.
    let ac: std::pin::Pin<Box<dyn std::future::Future<Output = Vec<ChunkOutcome>> + Send>> =
        Box::pin(analyze_chunks(state, job, &chunks, fields.as_ref(), image.as_ref()));
    let outcomes = ac.await;

    let mut report = assemble(
        AssemblyInput {
            form_id: &job.id,
            outcomes: &outcomes,
            fields: fields.as_ref(),
            required_fields: &state.config.extraction.required_fields,
            fatal: None,
            extraction_failure: extraction_failure.as_deref(),
        },
        &state.config.policy,
    );

    // Overlay is a visualization artifact; losing it degrades the report
    // but never blocks it.
    let overlay = super::overlay::render_overlay(&chunks, &report.tampered_chunks);
    let overlay_key = AnalysisStore::overlay_key(&job.id);
    match state.store.put_image(&overlay_key, overlay.into_bytes()).await {
        Ok(url) => report.overlay_image_url = Some(url),
        Err(e) => warn!(job_id = %job.id, error = %e, "failed to persist overlay image"),
    }

    persist_report(&state.store, &job.id, &report).await?;
    Ok(report.status)
}

// ── Extraction step ─────────────────────────────────────────────────

/// Call the extraction service (when configured) and persist any returned
/// crop. Failures are folded into the report, never raised.
async fn run_extraction(
    state: &AppState,
    job: &JobRecord,
    content: &str,
) -> (Option<FieldMap>, Option<ImageRef>, Option<String>) {
    let Some(extractor) = state.extractor.as_ref() else {
        return (None, None, None);
    };

    let request = ExtractionRequest {
        model: &state.config.extraction.model,
        content,
        schema: &state.config.extraction.required_fields,
    };

    let output = match extract_with_retry(
        extractor.as_ref(),
        request,
        state.config.extraction.max_attempts,
    )
    .await
    {
        Ok(output) => output,
        Err(e) => {
            warn!(job_id = %job.id, error = %e, "extraction failed after retries");
            return (None, None, Some(e.to_string()));
        }
    };

    let ExtractionOutput { fields, crop } = output;

    let image = match crop {
        Some(crop) => {
            let key = AnalysisStore::crop_key(&job.id, &crop.label, &crop.media_type);
            match state.store.put_image(&key, crop.bytes).await {
                Ok(url) => Some(ImageRef {
                    label: crop.label,
                    url,
                    bounding_box: crop.bounding_box,
                }),
                Err(e) => {
                    warn!(job_id = %job.id, error = %e, "failed to persist image crop");
                    None
                }
            }
        }
        None => None,
    };

    (Some(fields), image, None)
}

// ── Risk analysis step ──────────────────────────────────────────────

/// Evaluate every chunk with at most `max_concurrent_chunks` calls in
/// flight. Chunks are independent, so failures are recorded per chunk and
/// the rest continue.
async fn analyze_chunks(
    state: &AppState,
    job: &JobRecord,
    chunks: &[Chunk],
    fields: Option<&FieldMap>,
    image: Option<&ImageRef>,
) -> Vec<ChunkOutcome> {
    let total = chunks.len();
    let concurrency = state.config.analysis.max_concurrent_chunks.max(1);

    futures::stream::iter(chunks.iter().map(|chunk| {
        let analyzer = state.analyzer.clone();
        let context = ChunkContext {
            fields,
            image,
            total_chunks: total,
        };
        async move {
            let outcome = match analyzer.judge_chunk(chunk, context).await {
                Ok(verdict) => ChunkOutcome::Verdict(verdict),
                Err(e) => {
                    warn!(
                        job_id = %job.id,
                        chunk = chunk.index,
                        error = %e,
                        "chunk analysis failed"
                    );
                    ChunkOutcome::Failed(ChunkFailure {
                        chunk: chunk.index,
                        stage: FailureStage::Analysis,
                        detail: e.to_string(),
                    })
                }
            };
            job.chunks_done.fetch_add(1, Ordering::Relaxed);
            outcome
        }
    }))
    .buffered(concurrency)
    .collect()
    .await
}

// ── Report persistence ──────────────────────────────────────────────

/// Write the report with bounded retries. On exhaustion the job stays
/// not-ready: a stuck "processing" is preferable to a ready flag with no
/// report behind it.
async fn persist_report(
    store: &AnalysisStore,
    job_id: &str,
    report: &Report,
) -> anyhow::Result<()> {
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match store.put_report(job_id, report).await {
            Ok(()) => return Ok(()),
            Err(e) if attempt < REPORT_WRITE_ATTEMPTS => {
                warn!(
                    job_id = %job_id,
                    attempt = attempt,
                    error = %e,
                    "report write failed, retrying"
                );
                tokio::time::sleep(Duration::from_millis(200 * 2u64.pow(attempt - 1))).await;
            }
            Err(e) => {
                return Err(anyhow::anyhow!(
                    "report write failed after {attempt} attempts: {e}"
                ))
            }
        }
    }
}
