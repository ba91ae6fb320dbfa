pub mod activity;
pub mod ai;
pub mod config;
pub mod coordinator;
pub mod db;
pub mod error;
pub mod model;
pub mod processor;
pub mod review;
pub mod sanitize;
pub mod store;
pub mod tags;
pub mod telemetry;
pub mod worker;

pub use activity::{append_activity_event, ActivityEvent, ActivityEventType, ActivityLog};
pub use ai::{MenuParser, OpenAiMenuParser, ParseError, ParseMenuInput, ParsedMenu, TokenUsage};
pub use config::{load_config, load_config_or_default, IngestConfig};
pub use coordinator::{RunCoordinator, RunOptions, RunSummary};
pub use db::{Database, DatabaseError};
pub use error::{ConfigError, IngestError, Result};
pub use model::{ItemStatus, MenuUpload, MenuUploadItem, UploadStatus};
pub use processor::{DocumentExtractor, ExtractError, ExtractedText, TextExtractor};
pub use review::{discard_item, promote_item, Actor, ReviewError};
pub use store::{MenuStore, SqliteStore, StoreError};
pub use worker::{MenuUploadWorker, UploadOutcome};
