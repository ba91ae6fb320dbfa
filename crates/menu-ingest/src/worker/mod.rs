//! The menu upload worker: one processing run for one upload.
//!
//! ```text
//! pending ──► processing ──► needs_review
//!                  │
//!                  └───────► failed
//! ```
//!
//! `needs_review` and `failed` uploads may re-enter `processing` on a later
//! run. The worker never assigns `completed`; that transition belongs to the
//! review flow outside this crate.
//!
//! Steps 3 to 7 share a single failure path. Any error there marks the
//! upload `failed` with a truncated reason instead of propagating, so one bad
//! upload never aborts a batch. Dry-run calls the extractor and the parser
//! for real and suppresses every write.

mod context;

pub use context::UploadContext;

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, info, info_span, warn, Instrument};

use crate::activity::{
    append_activity_event, record_item_action, ActivityEvent, ActivityEventType, AuditAction,
    AuditEntry,
};
use crate::ai::{
    MenuParser, ParseMenuInput, ParsedMenu, ParsedMenuItem, ParsedMenuTag, TokenUsage,
    MAX_MENU_ITEMS,
};
use crate::config::WorkerConfig;
use crate::error::{IngestError, Result};
use crate::model::metadata::{
    hint, resolve_restaurant_id, AiMetrics, KEY_AI_EXTRACTION_SOURCE, KEY_AI_ITEM_COUNT,
    KEY_AI_METRICS, KEY_AI_MODEL, KEY_AI_SUMMARY, KEY_AI_TOKEN_USAGE, KEY_AI_WARNINGS,
    KEY_LAST_PROCESSED_AT, KEY_LOCALE, KEY_MENU_NAME, KEY_PROCESSING_STARTED_AT,
    KEY_RESTAURANT_NAME,
};
use crate::model::{
    format_timestamp, IdentifiedTag, ItemStatus, MenuUpload, Metadata, NewMenuUploadItem,
    UploadStatus,
};
use crate::processor::TextExtractor;
use crate::sanitize::redact_url;
use crate::store::{ItemUpdate, MenuStore, UploadUpdate};
use crate::tags::{clamp_unit, map_ai_tags};

pub const NO_ITEMS_WARNING: &str = "AI did not identify any menu items";
pub const SUPERSEDED_REASON: &str = "superseded by reprocessing";
pub const ERROR_EXTRACTION_SOURCE: &str = "error";

/// Result of processing one upload.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadOutcome {
    pub upload_id: i64,
    /// Items created, or that would have been created in dry-run.
    pub processed_count: usize,
    pub failed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

impl UploadOutcome {
    fn failure(upload_id: i64, reason: String, duration_ms: u64) -> Self {
        Self {
            upload_id,
            processed_count: 0,
            failed: true,
            usage: None,
            duration_ms,
            failure_reason: Some(reason),
        }
    }
}

pub struct MenuUploadWorker {
    store: Arc<dyn MenuStore>,
    extractor: Arc<dyn TextExtractor>,
    parser: Arc<dyn MenuParser>,
    config: WorkerConfig,
}

impl MenuUploadWorker {
    pub fn new(
        store: Arc<dyn MenuStore>,
        extractor: Arc<dyn TextExtractor>,
        parser: Arc<dyn MenuParser>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            store,
            extractor,
            parser,
            config,
        }
    }

    /// Processes one upload.
    ///
    /// Per-upload failures come back as `Ok` with `failed: true`. `Err` is
    /// reserved for store writes that fail outside the failure path (the
    /// fail-fast write, the processing announcement, or the failure write
    /// itself).
    pub async fn process(&self, upload: &MenuUpload, dry_run: bool) -> Result<UploadOutcome> {
        let span = info_span!(
            "upload",
            upload_id = upload.id,
            file = %redact_url(&upload.file_url),
            dry_run,
        );
        self.run(upload, dry_run).instrument(span).await
    }

    async fn run(&self, upload: &MenuUpload, dry_run: bool) -> Result<UploadOutcome> {
        let started = Instant::now();

        // Step 1: restaurant context, before any external call
        let Some(restaurant_id) = resolve_restaurant_id(upload) else {
            return self.fail_fast(upload, dry_run, started).await;
        };

        let mut ctx = UploadContext::new(upload.clone(), restaurant_id, dry_run);

        // Step 2: announce processing
        self.announce(&mut ctx)
            .instrument(info_span!("announce_processing"))
            .await?;

        // Steps 3-7, with step 8 as the single failure handler
        match self.execute(&mut ctx, started).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                self.record_failure(&ctx, e, started)
                    .instrument(info_span!("record_failure"))
                    .await
            }
        }
    }

    async fn fail_fast(
        &self,
        upload: &MenuUpload,
        dry_run: bool,
        started: Instant,
    ) -> Result<UploadOutcome> {
        let reason = IngestError::MissingRestaurantContext.to_string();
        warn!("Upload has no restaurant context, not processing");

        if !dry_run {
            self.store
                .update_menu_upload(
                    upload.id,
                    UploadUpdate {
                        status: Some(UploadStatus::Failed),
                        failure_reason: Some(Some(reason.clone())),
                        ..Default::default()
                    },
                )
                .await?;
        }

        Ok(UploadOutcome::failure(upload.id, reason, elapsed_ms(started)))
    }

    async fn announce(&self, ctx: &mut UploadContext) -> Result<()> {
        ctx.metadata.insert(
            KEY_PROCESSING_STARTED_AT.to_string(),
            json!(format_timestamp(Utc::now())),
        );

        if ctx.dry_run {
            debug!("Dry run, not marking upload as processing");
            return Ok(());
        }

        self.store
            .update_menu_upload(
                ctx.upload.id,
                UploadUpdate {
                    status: Some(UploadStatus::Processing),
                    failure_reason: Some(None),
                    metadata: Some(ctx.metadata.clone()),
                    ..Default::default()
                },
            )
            .await?;
        Ok(())
    }

    async fn execute(&self, ctx: &mut UploadContext, started: Instant) -> Result<UploadOutcome> {
        // Step 3: extract text
        let extracted = self
            .extractor
            .extract(&ctx.upload)
            .instrument(info_span!("extract_text"))
            .await?;
        info!(
            source = %extracted.source,
            chars = extracted.text.chars().count(),
            pages = ?extracted.page_count,
            "Extracted text"
        );
        ctx.extraction_source = Some(extracted.source);

        // Step 4: AI parse
        let input = self.parse_input(&ctx.upload, extracted.text);
        let mut parsed = self
            .parser
            .parse(&input)
            .instrument(info_span!("ai_parse"))
            .await?;
        ctx.usage = parsed.usage;
        info!(model = %parsed.model, items = parsed.items.len(), "AI parse finished");

        // Step 5: reconcile previous candidates
        self.reconcile(ctx).instrument(info_span!("reconcile")).await?;

        // Step 6: persist new candidates
        let candidates = self.cap_candidates(std::mem::take(&mut parsed.items));
        let created = self
            .persist_items(ctx, &candidates)
            .instrument(info_span!("persist_items", candidates = candidates.len()))
            .await;

        // Step 7: finalize
        self.finalize(ctx, parsed, candidates.len(), created, started)
            .instrument(info_span!("finalize"))
            .await
    }

    fn parse_input(&self, upload: &MenuUpload, text: String) -> ParseMenuInput {
        let metadata = &upload.metadata;
        let locale = hint(metadata, KEY_LOCALE).unwrap_or(&self.config.default_locale);
        ParseMenuInput {
            text,
            restaurant_name: hint(metadata, KEY_RESTAURANT_NAME).map(str::to_string),
            menu_name: hint(metadata, KEY_MENU_NAME).map(str::to_string),
            upload_file_name: upload.file_name.clone(),
            locale: Some(locale.to_string()),
        }
    }

    /// Discards every still-reviewable item left by a previous run.
    /// `completed` and `discarded` items are never touched.
    async fn reconcile(&self, ctx: &mut UploadContext) -> Result<()> {
        let existing = self.store.get_menu_upload_items(ctx.upload.id).await?;
        let now = format_timestamp(Utc::now());

        for item in existing.iter().filter(|i| i.status.is_reviewable()) {
            ctx.discarded_count += 1;
            if ctx.dry_run {
                info!(item_id = item.id, "Dry run, would discard superseded item");
                continue;
            }

            let entry = AuditEntry {
                action: AuditAction::Discarded,
                at: now.clone(),
                actor_id: None,
                actor_email: None,
                reason: Some(SUPERSEDED_REASON.to_string()),
            };
            self.store
                .update_menu_upload_item(
                    item.id,
                    ItemUpdate {
                        status: Some(ItemStatus::Discarded),
                        metadata: Some(record_item_action(&item.metadata, &entry)),
                    },
                )
                .await?;
        }

        if ctx.discarded_count > 0 {
            info!(
                discarded = ctx.discarded_count,
                kept = existing.len() - ctx.discarded_count,
                "Superseded previous candidates"
            );
        }
        Ok(())
    }

    fn cap_candidates(&self, mut items: Vec<ParsedMenuItem>) -> Vec<ParsedMenuItem> {
        let limit = self.config.max_items.min(MAX_MENU_ITEMS);
        if items.len() > limit {
            warn!(
                returned = items.len(),
                limit, "Parser returned too many items, keeping the first ones"
            );
            items.truncate(limit);
        }
        items
    }

    /// Creates one pending item per candidate. A failed create is logged and
    /// skipped; the rest of the batch still goes in.
    async fn persist_items(&self, ctx: &UploadContext, candidates: &[ParsedMenuItem]) -> usize {
        let mut created = 0;

        for (index, candidate) in candidates.iter().enumerate() {
            let item = build_item(ctx, candidate);
            if ctx.dry_run {
                debug!(index, name = %candidate.name, "Dry run, would create item");
                created += 1;
                continue;
            }

            match self.store.create_menu_upload_item(item).await {
                Ok(item) => {
                    debug!(index, item_id = item.id, "Created item");
                    created += 1;
                }
                Err(e) => {
                    warn!(index, name = %candidate.name, error = %e, "Failed to create item, skipping");
                }
            }
        }

        created
    }

    async fn finalize(
        &self,
        ctx: &UploadContext,
        parsed: ParsedMenu,
        item_count: usize,
        created: usize,
        started: Instant,
    ) -> Result<UploadOutcome> {
        let now = Utc::now();
        let now_str = format_timestamp(now);
        let duration_ms = elapsed_ms(started);

        let mut warnings = parsed.warnings;
        if item_count == 0 {
            warn!("{}", NO_ITEMS_WARNING);
            warnings.push(NO_ITEMS_WARNING.to_string());
        }

        let metrics = AiMetrics {
            last_run_at: now_str.clone(),
            last_duration_ms: duration_ms,
            last_items_processed: created,
            last_token_usage: ctx.usage,
        };

        let mut metadata = ctx.metadata.clone();
        metadata.insert(
            KEY_AI_SUMMARY.to_string(),
            parsed.summary.map(Value::String).unwrap_or(Value::Null),
        );
        metadata.insert(KEY_AI_WARNINGS.to_string(), json!(warnings));
        metadata.insert(KEY_AI_MODEL.to_string(), json!(parsed.model));
        metadata.insert(KEY_AI_TOKEN_USAGE.to_string(), json!(ctx.usage));
        metadata.insert(
            KEY_AI_EXTRACTION_SOURCE.to_string(),
            json!(ctx.extraction_source.map(|s| s.as_str())),
        );
        metadata.insert(KEY_AI_ITEM_COUNT.to_string(), json!(item_count));
        metadata.insert(KEY_AI_METRICS.to_string(), json!(metrics));
        metadata.insert(KEY_LAST_PROCESSED_AT.to_string(), json!(now_str));

        let mut event = ActivityEvent::new(
            ActivityEventType::UploadReady,
            now_str,
            ctx.upload.id,
            ctx.restaurant_id,
        );
        event.menu_id = ctx.upload.menu_id;
        event.item_count = Some(created);
        event.payload = json!({ "model": parsed.model });
        let metadata = append_activity_event(&metadata, &event);

        if ctx.dry_run {
            info!(items = created, duration_ms, "Dry run complete, nothing written");
        } else {
            self.store
                .update_menu_upload(
                    ctx.upload.id,
                    UploadUpdate {
                        status: Some(UploadStatus::NeedsReview),
                        failure_reason: Some(None),
                        parser_version: Some(self.config.parser_version.clone()),
                        ai_model: Some(parsed.model),
                        processed_at: Some(now),
                        metadata: Some(metadata),
                    },
                )
                .await?;
            info!(items = created, duration_ms, "Upload ready for review");
        }

        Ok(UploadOutcome {
            upload_id: ctx.upload.id,
            processed_count: created,
            failed: false,
            usage: ctx.usage,
            duration_ms,
            failure_reason: None,
        })
    }

    async fn record_failure(
        &self,
        ctx: &UploadContext,
        error: IngestError,
        started: Instant,
    ) -> Result<UploadOutcome> {
        let duration_ms = elapsed_ms(started);
        let reason = truncate_reason(&error.to_string(), self.config.failure_reason_limit);
        warn!(error = %error, duration_ms, "Upload processing failed");

        let mut metadata = ctx.metadata.clone();
        metadata.insert(
            KEY_AI_EXTRACTION_SOURCE.to_string(),
            json!(ERROR_EXTRACTION_SOURCE),
        );
        metadata.insert(
            KEY_AI_METRICS.to_string(),
            json!(AiMetrics {
                last_run_at: format_timestamp(Utc::now()),
                last_duration_ms: duration_ms,
                last_items_processed: 0,
                last_token_usage: ctx.usage,
            }),
        );

        if !ctx.dry_run {
            self.store
                .update_menu_upload(
                    ctx.upload.id,
                    UploadUpdate {
                        status: Some(UploadStatus::Failed),
                        failure_reason: Some(Some(reason.clone())),
                        metadata: Some(metadata),
                        ..Default::default()
                    },
                )
                .await?;
        }

        let mut outcome = UploadOutcome::failure(ctx.upload.id, reason, duration_ms);
        outcome.usage = ctx.usage;
        Ok(outcome)
    }
}

fn build_item(ctx: &UploadContext, candidate: &ParsedMenuItem) -> NewMenuUploadItem {
    NewMenuUploadItem {
        upload_id: ctx.upload.id,
        restaurant_id: Some(ctx.restaurant_id),
        menu_id: ctx.upload.menu_id,
        name: Some(candidate.name.trim().to_string()),
        description: candidate.description.clone(),
        price: candidate
            .price
            .as_ref()
            .and_then(|p| p.amount)
            .filter(|a| a.is_finite()),
        raw_text: candidate.raw_text.clone(),
        suggested_category: candidate
            .category
            .clone()
            .or_else(|| candidate.section.clone()),
        suggested_allergens: map_labelled_tags(&candidate.allergens),
        suggested_dietary: map_labelled_tags(&candidate.dietary_tags),
        confidence: candidate
            .confidence
            .filter(|c| c.is_finite())
            .map(clamp_unit),
        ai_payload: candidate.ai_payload.clone(),
        status: ItemStatus::Pending,
        metadata: Metadata::new(),
    }
}

/// Tags with a blank label never reach the store.
fn map_labelled_tags(tags: &[ParsedMenuTag]) -> Vec<IdentifiedTag> {
    let labelled: Vec<ParsedMenuTag> = tags
        .iter()
        .filter(|t| !t.label.trim().is_empty())
        .cloned()
        .collect();
    map_ai_tags(&labelled)
}

/// Keeps at most `limit` characters.
pub fn truncate_reason(reason: &str, limit: usize) -> String {
    reason.chars().take(limit).collect()
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}
