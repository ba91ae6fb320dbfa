use crate::ai::TokenUsage;
use crate::model::{MenuUpload, Metadata};
use crate::processor::ExtractionSource;

/// State carried through one processing run.
pub struct UploadContext {
    // Input
    pub upload: MenuUpload,
    pub restaurant_id: i64,
    pub dry_run: bool,

    /// Working copy of the upload metadata. Holds `processingStartedAt`
    /// once processing has been announced.
    pub metadata: Metadata,

    // Step 3 result
    pub extraction_source: Option<ExtractionSource>,

    // Step 4 result
    pub usage: Option<TokenUsage>,

    // Step 5 result (would-be discards in dry-run)
    pub discarded_count: usize,
}

impl UploadContext {
    pub fn new(upload: MenuUpload, restaurant_id: i64, dry_run: bool) -> Self {
        let metadata = upload.metadata.clone();
        Self {
            upload,
            restaurant_id,
            dry_run,
            metadata,
            extraction_source: None,
            usage: None,
            discarded_count: 0,
        }
    }
}
