//! Shared test utilities for menu-ingest integration tests.
//!
//! This module provides:
//! - Scripted `TextExtractor` and `MenuParser` doubles that count their calls
//! - `RecordingStore`, an in-memory `SqliteStore` that counts writes and can
//!   be told to reject specific item creates
//! - `Fixture`, which wires the three into a `MenuUploadWorker`

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};

use menu_ingest::ai::{ParsedMenuItem, ParsedMenuTag, ParsedPrice};
use menu_ingest::config::WorkerConfig;
use menu_ingest::model::{
    ItemStatus, MenuUpload, MenuUploadItem, Metadata, NewMenuUpload, NewMenuUploadItem,
};
use menu_ingest::processor::ExtractionSource;
use menu_ingest::store::{ItemUpdate, UploadFilter, UploadUpdate};
use menu_ingest::{
    Database, ExtractError, ExtractedText, MenuParser, MenuStore, MenuUploadWorker, ParseError,
    ParseMenuInput, ParsedMenu, SqliteStore, StoreError, TextExtractor, TokenUsage,
};

// ─── Extractor ──────────────────────────────────────────────────────────────

/// Returns a fixed text, or fails with `Unsupported(message)`.
pub struct FakeExtractor {
    result: Result<ExtractedText, String>,
    calls: AtomicUsize,
}

impl FakeExtractor {
    pub fn text(text: &str) -> Self {
        Self {
            result: Ok(ExtractedText {
                text: text.to_string(),
                source: ExtractionSource::Pdf,
                page_count: Some(1),
            }),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            result: Err(message.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextExtractor for FakeExtractor {
    async fn extract(&self, _upload: &MenuUpload) -> Result<ExtractedText, ExtractError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result.clone().map_err(ExtractError::Unsupported)
    }
}

// ─── Parser ─────────────────────────────────────────────────────────────────

/// Returns a fixed `ParsedMenu` and remembers the last input it saw.
pub struct FakeParser {
    result: Result<ParsedMenu, String>,
    calls: AtomicUsize,
    last_input: Mutex<Option<ParseMenuInput>>,
}

impl FakeParser {
    pub fn returning(menu: ParsedMenu) -> Self {
        Self {
            result: Ok(menu),
            calls: AtomicUsize::new(0),
            last_input: Mutex::new(None),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            result: Err(message.to_string()),
            calls: AtomicUsize::new(0),
            last_input: Mutex::new(None),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_input(&self) -> Option<ParseMenuInput> {
        self.last_input.lock().unwrap().clone()
    }
}

#[async_trait]
impl MenuParser for FakeParser {
    async fn parse(&self, input: &ParseMenuInput) -> Result<ParsedMenu, ParseError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_input.lock().unwrap() = Some(input.clone());
        self.result.clone().map_err(ParseError::Request)
    }
}

// ─── Store ──────────────────────────────────────────────────────────────────

/// In-memory `SqliteStore` that counts writes made through the trait.
pub struct RecordingStore {
    inner: SqliteStore,
    writes: AtomicUsize,
    reject_item_names: Mutex<HashSet<String>>,
}

impl RecordingStore {
    pub fn new() -> Self {
        let db = Database::open_in_memory().expect("in-memory database");
        Self {
            inner: SqliteStore::new(db),
            writes: AtomicUsize::new(0),
            reject_item_names: Mutex::new(HashSet::new()),
        }
    }

    /// Number of insert/update/create calls since the last reset.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn reset_writes(&self) {
        self.writes.store(0, Ordering::SeqCst);
    }

    /// Makes `create_menu_upload_item` fail for items with this name.
    pub fn reject_item(&self, name: &str) {
        self.reject_item_names
            .lock()
            .unwrap()
            .insert(name.to_string());
    }

    fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl MenuStore for RecordingStore {
    async fn insert_menu_upload(&self, upload: NewMenuUpload) -> Result<MenuUpload, StoreError> {
        self.record_write();
        self.inner.insert_menu_upload(upload).await
    }

    async fn get_menu_upload_by_id(&self, id: i64) -> Result<Option<MenuUpload>, StoreError> {
        self.inner.get_menu_upload_by_id(id).await
    }

    async fn get_menu_uploads(&self, filter: &UploadFilter) -> Result<Vec<MenuUpload>, StoreError> {
        self.inner.get_menu_uploads(filter).await
    }

    async fn update_menu_upload(
        &self,
        id: i64,
        update: UploadUpdate,
    ) -> Result<MenuUpload, StoreError> {
        self.record_write();
        self.inner.update_menu_upload(id, update).await
    }

    async fn get_menu_upload_items(
        &self,
        upload_id: i64,
    ) -> Result<Vec<MenuUploadItem>, StoreError> {
        self.inner.get_menu_upload_items(upload_id).await
    }

    async fn create_menu_upload_item(
        &self,
        item: NewMenuUploadItem,
    ) -> Result<MenuUploadItem, StoreError> {
        self.record_write();
        let rejected = item
            .name
            .as_ref()
            .is_some_and(|n| self.reject_item_names.lock().unwrap().contains(n));
        if rejected {
            return Err(StoreError::Unavailable("injected create failure".to_string()));
        }
        self.inner.create_menu_upload_item(item).await
    }

    async fn update_menu_upload_item(
        &self,
        id: i64,
        update: ItemUpdate,
    ) -> Result<MenuUploadItem, StoreError> {
        self.record_write();
        self.inner.update_menu_upload_item(id, update).await
    }
}

// ─── Builders ───────────────────────────────────────────────────────────────

pub fn metadata(value: Value) -> Metadata {
    value.as_object().cloned().unwrap_or_default()
}

/// A pending upload for restaurant 44.
pub fn new_upload() -> NewMenuUpload {
    NewMenuUpload {
        restaurant_id: Some(44),
        menu_id: Some(7),
        file_url: "https://cdn.example.com/menus/dinner.pdf".to_string(),
        file_name: Some("dinner.pdf".to_string()),
        ..Default::default()
    }
}

pub fn new_item(upload: &MenuUpload, name: &str, status: ItemStatus) -> NewMenuUploadItem {
    NewMenuUploadItem {
        upload_id: upload.id,
        restaurant_id: upload.restaurant_id,
        menu_id: upload.menu_id,
        name: Some(name.to_string()),
        description: None,
        price: None,
        raw_text: None,
        suggested_category: None,
        suggested_allergens: Vec::new(),
        suggested_dietary: Vec::new(),
        confidence: None,
        ai_payload: Value::Null,
        status,
        metadata: Metadata::new(),
    }
}

pub fn menu(items: Vec<ParsedMenuItem>) -> ParsedMenu {
    ParsedMenu {
        model: "gpt-test".to_string(),
        items,
        summary: Some("Dinner menu".to_string()),
        warnings: Vec::new(),
        usage: Some(TokenUsage::new(1200, 300)),
    }
}

pub fn named_items(count: usize) -> Vec<ParsedMenuItem> {
    (1..=count)
        .map(|i| ParsedMenuItem::named(format!("Dish {}", i)))
        .collect()
}

pub fn truffle_fries() -> ParsedMenuItem {
    let mut item = ParsedMenuItem::named("Truffle Fries");
    item.section = Some("Sides".to_string());
    item.price = Some(ParsedPrice {
        amount: Some(6.5),
        currency: Some("GBP".to_string()),
        textual: None,
    });
    item.confidence = Some(0.87);
    item.allergens = vec![ParsedMenuTag {
        code: None,
        label: "Milk".to_string(),
        confidence: Some(0.9),
    }];
    item.ai_payload = json!({"name": "Truffle Fries", "price": 6.5});
    item
}

// ─── Fixture ────────────────────────────────────────────────────────────────

/// Worker plus handles on every collaborator.
pub struct Fixture {
    pub store: Arc<RecordingStore>,
    pub extractor: Arc<FakeExtractor>,
    pub parser: Arc<FakeParser>,
    pub worker: MenuUploadWorker,
}

impl Fixture {
    pub fn new(extractor: FakeExtractor, parser: FakeParser) -> Self {
        Self::with_store(Arc::new(RecordingStore::new()), extractor, parser)
    }

    pub fn with_store(
        store: Arc<RecordingStore>,
        extractor: FakeExtractor,
        parser: FakeParser,
    ) -> Self {
        let extractor = Arc::new(extractor);
        let parser = Arc::new(parser);
        let worker = MenuUploadWorker::new(
            store.clone(),
            extractor.clone(),
            parser.clone(),
            WorkerConfig::default(),
        );
        Self {
            store,
            extractor,
            parser,
            worker,
        }
    }

    /// Fixture whose parser returns `items`.
    pub fn parsing(items: Vec<ParsedMenuItem>) -> Self {
        Self::new(
            FakeExtractor::text("TRUFFLE FRIES 6.50\nFISH AND CHIPS 14.00"),
            FakeParser::returning(menu(items)),
        )
    }

    pub async fn insert(&self, upload: NewMenuUpload) -> MenuUpload {
        let upload = self.store.insert_menu_upload(upload).await.unwrap();
        self.store.reset_writes();
        upload
    }

    pub async fn add_item(
        &self,
        upload: &MenuUpload,
        name: &str,
        status: ItemStatus,
    ) -> MenuUploadItem {
        let item = self
            .store
            .create_menu_upload_item(new_item(upload, name, status))
            .await
            .unwrap();
        self.store.reset_writes();
        item
    }

    pub async fn reload(&self, id: i64) -> MenuUpload {
        self.store.get_menu_upload_by_id(id).await.unwrap().unwrap()
    }

    pub async fn items(&self, upload_id: i64) -> Vec<MenuUploadItem> {
        self.store.get_menu_upload_items(upload_id).await.unwrap()
    }
}
