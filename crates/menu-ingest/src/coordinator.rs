//! Batch entry point: picks uploads, runs them one at a time through the
//! worker and aggregates a [`RunSummary`].

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, info_span, warn, Instrument};

use crate::ai::TokenUsage;
use crate::error::{IngestError, Result};
use crate::model::MenuUpload;
use crate::store::{MenuStore, UploadFilter};
use crate::worker::{MenuUploadWorker, UploadOutcome};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Process exactly this upload, whatever its status.
    pub upload_id: Option<i64>,
    pub dry_run: bool,
    /// Upper bound on pending uploads fetched by a batch run.
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub upload_count: usize,
    pub processed_count: usize,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub total_tokens: u64,
    pub duration_ms: u64,
    pub failed_count: usize,
}

impl RunSummary {
    /// Folds one upload's outcome into the totals.
    pub fn record(&mut self, outcome: &UploadOutcome) {
        self.processed_count += outcome.processed_count;
        if outcome.failed {
            self.failed_count += 1;
        }
        if let Some(usage) = &outcome.usage {
            self.add_usage(usage);
        }
    }

    pub fn add_usage(&mut self, usage: &TokenUsage) {
        self.total_input_tokens = self.total_input_tokens.saturating_add(usage.input_tokens);
        self.total_output_tokens = self.total_output_tokens.saturating_add(usage.output_tokens);
        self.total_tokens = self.total_tokens.saturating_add(usage.total_tokens);
    }

    /// Adds a usage object in either naming convention
    /// (`inputTokens`/`input_tokens`, ...). Unrecognised shapes add nothing.
    pub fn add_usage_value(&mut self, value: &Value) {
        if let Some(usage) = TokenUsage::from_value(value) {
            self.add_usage(&usage);
        }
    }
}

pub struct RunCoordinator {
    store: Arc<dyn MenuStore>,
    worker: MenuUploadWorker,
}

impl RunCoordinator {
    pub fn new(store: Arc<dyn MenuStore>, worker: MenuUploadWorker) -> Self {
        Self { store, worker }
    }

    /// Runs one batch.
    ///
    /// Only a targeted run for a missing upload (or a failure to load the
    /// batch) is an error; per-upload failures are counted in the summary.
    pub async fn run(&self, options: RunOptions) -> Result<RunSummary> {
        let span = info_span!(
            "run",
            upload_id = ?options.upload_id,
            dry_run = options.dry_run,
            limit = ?options.limit,
        );
        self.run_inner(options).instrument(span).await
    }

    async fn run_inner(&self, options: RunOptions) -> Result<RunSummary> {
        let started = Instant::now();
        let uploads = self.select_uploads(&options).await?;

        let mut summary = RunSummary {
            upload_count: uploads.len(),
            ..Default::default()
        };

        if uploads.is_empty() {
            info!("No uploads to process");
            summary.duration_ms = started.elapsed().as_millis() as u64;
            return Ok(summary);
        }

        info!(count = uploads.len(), "Processing uploads");

        for upload in &uploads {
            match self.worker.process(upload, options.dry_run).await {
                Ok(outcome) => summary.record(&outcome),
                Err(e) => {
                    warn!(upload_id = upload.id, error = %e, "Upload run aborted by store error");
                    summary.failed_count += 1;
                }
            }
        }

        summary.duration_ms = started.elapsed().as_millis() as u64;
        info!(
            uploads = summary.upload_count,
            processed = summary.processed_count,
            failed = summary.failed_count,
            total_tokens = summary.total_tokens,
            duration_ms = summary.duration_ms,
            "Run finished"
        );
        Ok(summary)
    }

    async fn select_uploads(&self, options: &RunOptions) -> Result<Vec<MenuUpload>> {
        match options.upload_id {
            Some(id) => {
                let upload = self
                    .store
                    .get_menu_upload_by_id(id)
                    .await?
                    .ok_or(IngestError::UploadNotFound(id))?;
                Ok(vec![upload])
            }
            None => Ok(self
                .store
                .get_menu_uploads(&UploadFilter::pending(options.limit))
                .await?),
        }
    }
}
