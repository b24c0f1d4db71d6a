//! Cart builder - The draft order a student assembles before paying.
//!
//! A [`DraftOrder`] is an ordered list of [`FileItem`]s plus one set of
//! [`PrintSettings`] that applies to every document in it. Every mutation is
//! infallible: unknown ids are ignored, copies are clamped, and late page-count
//! results for removed files are dropped. The draft holds no server state.

use crate::{
    core::pricing::PriceSheet,
    errors::{Error, Result},
};
use serde::{Deserialize, Serialize};
use std::{path::Path, sync::Arc};
use tracing::{debug, warn};
use uuid::Uuid;

/// Literal `type` used on the wire for stationery lines
pub const STATIONERY_TYPE: &str = "stationery";

/// What a file item is
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemKind {
    /// An uploaded document to be printed
    Document {
        /// MIME type reported by the upload
        mime_type: String,
    },
    /// A counter item with a fixed price
    Stationery {
        /// Unit price in currency units
        price: i64,
    },
}

/// One line of a draft or placed order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "FileItemPayload", into = "FileItemPayload")]
pub struct FileItem {
    /// Client-generated unique token
    pub id: String,
    /// File or item name
    pub name: String,
    /// Size in bytes, 0 for stationery
    pub size: u64,
    /// Document or stationery
    pub kind: ItemKind,
    /// Pages in the document; 0 until resolved, always 0 for stationery
    pub page_count: u32,
    /// Reference to the stored upload, if any
    pub payload_ref: Option<String>,
}

impl FileItem {
    /// `true` for counter items.
    #[must_use]
    pub const fn is_stationery(&self) -> bool {
        matches!(self.kind, ItemKind::Stationery { .. })
    }

    /// Stationery price, `None` for documents.
    #[must_use]
    pub const fn price(&self) -> Option<i64> {
        match self.kind {
            ItemKind::Stationery { price } => Some(price),
            ItemKind::Document { .. } => None,
        }
    }

    /// MIME type of a document, or `"stationery"`.
    #[must_use]
    pub fn item_type(&self) -> &str {
        match &self.kind {
            ItemKind::Document { mime_type } => mime_type,
            ItemKind::Stationery { .. } => STATIONERY_TYPE,
        }
    }

    /// `true` while a document is waiting for its page count.
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        !self.is_stationery() && self.page_count == 0
    }
}

/// Wire shape of a [`FileItem`]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileItemPayload {
    /// Client token
    pub id: String,
    /// Display name
    pub name: String,
    /// Size in bytes
    #[serde(default)]
    pub size: u64,
    /// MIME type or `"stationery"`
    #[serde(rename = "type")]
    pub item_type: String,
    /// Resolved page count
    #[serde(default)]
    pub page_count: u32,
    /// Stationery unit price
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<i64>,
    /// Stored upload reference
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload_ref: Option<String>,
}

impl TryFrom<FileItemPayload> for FileItem {
    type Error = Error;

    fn try_from(payload: FileItemPayload) -> Result<Self> {
        if payload.id.trim().is_empty() {
            return Err(Error::validation("file item id cannot be empty"));
        }
        if payload.name.trim().is_empty() {
            return Err(Error::validation("file item name cannot be empty"));
        }

        let kind = if payload.item_type == STATIONERY_TYPE {
            match payload.price {
                Some(price) if price >= 0 => ItemKind::Stationery { price },
                Some(price) => {
                    return Err(Error::validation(format!(
                        "stationery '{}' has negative price {price}",
                        payload.name
                    )));
                }
                None => {
                    return Err(Error::validation(format!(
                        "stationery '{}' is missing a price",
                        payload.name
                    )));
                }
            }
        } else {
            if payload.item_type.trim().is_empty() {
                return Err(Error::validation(format!(
                    "document '{}' is missing a type",
                    payload.name
                )));
            }
            if payload.price.is_some() {
                return Err(Error::validation(format!(
                    "document '{}' cannot carry a price",
                    payload.name
                )));
            }
            ItemKind::Document {
                mime_type: payload.item_type,
            }
        };

        let page_count = if matches!(kind, ItemKind::Stationery { .. }) {
            0
        } else {
            payload.page_count
        };

        Ok(Self {
            id: payload.id,
            name: payload.name,
            size: payload.size,
            kind,
            page_count,
            payload_ref: payload.payload_ref,
        })
    }
}

impl From<FileItem> for FileItemPayload {
    fn from(item: FileItem) -> Self {
        let (item_type, price) = match item.kind {
            ItemKind::Document { mime_type } => (mime_type, None),
            ItemKind::Stationery { price } => (STATIONERY_TYPE.to_string(), Some(price)),
        };
        Self {
            id: item.id,
            name: item.name,
            size: item.size,
            item_type,
            page_count: item.page_count,
            price,
            payload_ref: item.payload_ref,
        }
    }
}

/// Settings applied to every document in a draft
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrintSettings {
    /// Color instead of black & white
    pub color: bool,
    /// Print on both sides
    pub double_sided: bool,
    /// Copies of each document, at least 1
    pub copies: u32,
}

impl Default for PrintSettings {
    fn default() -> Self {
        Self {
            color: false,
            double_sided: false,
            copies: 1,
        }
    }
}

impl PrintSettings {
    /// Rejects settings that a cart could never produce.
    pub fn validate(&self) -> Result<()> {
        if self.copies == 0 {
            return Err(Error::validation("copies must be at least 1"));
        }
        Ok(())
    }
}

/// A single settings change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingUpdate {
    /// Toggle color printing
    Color(bool),
    /// Toggle duplex printing
    DoubleSided(bool),
    /// Requested copies; anything below 1 is clamped to 1
    Copies(i64),
}

/// A file handed over by the upload widget
#[derive(Debug, Clone)]
pub struct Upload {
    /// Original file name
    pub name: String,
    /// MIME type reported by the browser or sniffed by the caller
    pub mime_type: String,
    /// File contents, shared with the page counter
    pub data: Arc<[u8]>,
    /// Storage key from the upload service, if it already stored the file
    pub payload_ref: Option<String>,
}

impl Upload {
    /// Wraps raw bytes.
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            data: data.into(),
            payload_ref: None,
        }
    }

    /// Attaches the storage reference returned by the upload service.
    #[must_use]
    pub fn with_payload_ref(mut self, payload_ref: impl Into<String>) -> Self {
        self.payload_ref = Some(payload_ref.into());
        self
    }
}

/// A stationery line picked from the catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StationeryDescriptor {
    /// Item name
    pub name: String,
    /// Unit price
    pub price: i64,
}

/// Anything that can be added to a draft
#[derive(Debug, Clone)]
pub enum NewItem {
    /// An uploaded document
    Upload(Upload),
    /// A catalog item
    Stationery(StationeryDescriptor),
}

impl From<Upload> for NewItem {
    fn from(upload: Upload) -> Self {
        Self::Upload(upload)
    }
}

impl From<StationeryDescriptor> for NewItem {
    fn from(descriptor: StationeryDescriptor) -> Self {
        Self::Stationery(descriptor)
    }
}

/// What kinds of items a draft holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftComposition {
    /// Nothing yet
    Empty,
    /// Only documents
    Documents,
    /// Only stationery
    Stationery,
    /// Both
    Mixed,
}

/// The client-local cart
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftOrder {
    files: Vec<FileItem>,
    settings: PrintSettings,
}

impl DraftOrder {
    /// An empty cart with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Items in print order.
    #[must_use]
    pub fn files(&self) -> &[FileItem] {
        &self.files
    }

    /// Current print settings.
    #[must_use]
    pub const fn settings(&self) -> &PrintSettings {
        &self.settings
    }

    /// `true` when there is nothing to submit.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Looks up an item by id.
    #[must_use]
    pub fn file(&self, id: &str) -> Option<&FileItem> {
        self.files.iter().find(|f| f.id == id)
    }

    /// Appends a document or stationery line and returns its new id.
    ///
    /// Documents start with `page_count = 0`; the caller is expected to schedule
    /// page counting for them.
    pub fn add_file(&mut self, item: impl Into<NewItem>) -> String {
        let id = Uuid::new_v4().to_string();
        let file = match item.into() {
            NewItem::Upload(upload) => FileItem {
                id: id.clone(),
                name: upload.name,
                size: upload.data.len() as u64,
                kind: ItemKind::Document {
                    mime_type: upload.mime_type,
                },
                page_count: 0,
                payload_ref: upload.payload_ref,
            },
            NewItem::Stationery(descriptor) => {
                if descriptor.price < 0 {
                    warn!(
                        name = %descriptor.name,
                        price = descriptor.price,
                        "Negative stationery price clamped to 0"
                    );
                }
                FileItem {
                    id: id.clone(),
                    name: descriptor.name,
                    size: 0,
                    kind: ItemKind::Stationery {
                        price: descriptor.price.max(0),
                    },
                    page_count: 0,
                    payload_ref: None,
                }
            }
        };
        debug!(id = %id, name = %file.name, kind = file.item_type(), "Added item to cart");
        self.files.push(file);
        id
    }

    /// Removes an item. Returns `false` (and changes nothing) when the id is unknown.
    pub fn remove_file(&mut self, id: &str) -> bool {
        let before = self.files.len();
        self.files.retain(|f| f.id != id);
        before != self.files.len()
    }

    /// Applies one settings change.
    pub fn update_settings(&mut self, update: SettingUpdate) {
        match update {
            SettingUpdate::Color(color) => self.settings.color = color,
            SettingUpdate::DoubleSided(double_sided) => self.settings.double_sided = double_sided,
            SettingUpdate::Copies(copies) => {
                self.settings.copies = u32::try_from(copies.max(1)).unwrap_or(u32::MAX);
            }
        }
    }

    /// Records a resolved page count.
    ///
    /// Returns `false` when the item is gone or is stationery; nothing changes in
    /// that case. Counts below 1 are stored as 1.
    pub fn update_file_page_count(&mut self, id: &str, count: u32) -> bool {
        match self.files.iter_mut().find(|f| f.id == id) {
            Some(file) if !file.is_stationery() => {
                file.page_count = count.max(1);
                true
            }
            _ => false,
        }
    }

    /// Live total under the given price sheet.
    #[must_use]
    pub fn calculate_total(&self, prices: &PriceSheet) -> i64 {
        prices.total_for(&self.files, &self.settings)
    }

    /// Sum of resolved document pages.
    #[must_use]
    pub fn total_pages(&self) -> u64 {
        self.files
            .iter()
            .filter(|f| !f.is_stationery())
            .map(|f| u64::from(f.page_count))
            .sum()
    }

    /// Documents still waiting for a page count.
    #[must_use]
    pub fn pending_page_counts(&self) -> usize {
        self.files.iter().filter(|f| f.is_pending()).count()
    }

    /// Classifies the cart contents.
    #[must_use]
    pub fn composition(&self) -> DraftComposition {
        let stationery = self.files.iter().filter(|f| f.is_stationery()).count();
        match (self.files.len(), stationery) {
            (0, _) => DraftComposition::Empty,
            (_, 0) => DraftComposition::Documents,
            (n, s) if n == s => DraftComposition::Stationery,
            _ => DraftComposition::Mixed,
        }
    }

    /// Empties the cart and resets settings.
    pub fn clear(&mut self) {
        self.files.clear();
        self.settings = PrintSettings::default();
    }

    /// Restores a cart saved with [`DraftOrder::save`]. A missing file yields an empty cart.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        match std::fs::read_to_string(path.as_ref()) {
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Writes the cart as JSON, replacing the file atomically.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(self)?)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    fn pdf(name: &str) -> Upload {
        Upload::new(name, "application/pdf", vec![0_u8; 2048])
    }

    fn notebook() -> StationeryDescriptor {
        StationeryDescriptor {
            name: "A4 Notebook".to_string(),
            price: 50,
        }
    }

    #[test]
    fn test_add_upload_starts_unresolved() {
        let mut draft = DraftOrder::new();
        let id = draft.add_file(pdf("notes.pdf"));

        let file = draft.file(&id).unwrap();
        assert_eq!(file.page_count, 0);
        assert_eq!(file.size, 2048);
        assert_eq!(file.item_type(), "application/pdf");
        assert!(file.is_pending());
        assert_eq!(draft.pending_page_counts(), 1);
    }

    #[test]
    fn test_add_stationery() {
        let mut draft = DraftOrder::new();
        let id = draft.add_file(notebook());

        let file = draft.file(&id).unwrap();
        assert_eq!(file.item_type(), STATIONERY_TYPE);
        assert_eq!(file.price(), Some(50));
        assert!(!file.is_pending());
        assert_eq!(draft.total_pages(), 0);
    }

    #[test]
    fn test_ids_are_unique_and_order_is_preserved() {
        let mut draft = DraftOrder::new();
        let a = draft.add_file(pdf("a.pdf"));
        let b = draft.add_file(notebook());
        let c = draft.add_file(pdf("c.pdf"));

        assert_ne!(a, b);
        assert_ne!(b, c);
        let names: Vec<&str> = draft.files().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["a.pdf", "A4 Notebook", "c.pdf"]);
    }

    #[test]
    fn test_remove_is_idempotent() {
        let mut draft = DraftOrder::new();
        let keep = draft.add_file(pdf("keep.pdf"));
        let gone = draft.add_file(pdf("gone.pdf"));

        assert!(draft.remove_file(&gone));
        let after_once = draft.clone();
        assert!(!draft.remove_file(&gone));
        assert_eq!(draft, after_once);
        assert!(draft.file(&keep).is_some());
        assert!(!draft.remove_file("never-existed"));
    }

    #[test]
    fn test_copies_clamped_to_one() {
        let mut draft = DraftOrder::new();
        draft.update_settings(SettingUpdate::Copies(0));
        assert_eq!(draft.settings().copies, 1);
        draft.update_settings(SettingUpdate::Copies(-4));
        assert_eq!(draft.settings().copies, 1);
        draft.update_settings(SettingUpdate::Copies(3));
        assert_eq!(draft.settings().copies, 3);
        draft.update_settings(SettingUpdate::Color(true));
        draft.update_settings(SettingUpdate::DoubleSided(true));
        assert!(draft.settings().color);
        assert!(draft.settings().double_sided);
    }

    #[test]
    fn test_page_count_for_removed_file_is_dropped() {
        let mut draft = DraftOrder::new();
        let id = draft.add_file(pdf("late.pdf"));
        draft.remove_file(&id);

        assert!(!draft.update_file_page_count(&id, 12));
        assert!(draft.is_empty());
    }

    #[test]
    fn test_page_count_ignored_for_stationery() {
        let mut draft = DraftOrder::new();
        let id = draft.add_file(notebook());
        assert!(!draft.update_file_page_count(&id, 4));
        assert_eq!(draft.file(&id).unwrap().page_count, 0);
    }

    #[test]
    fn test_pending_document_prices_after_resolution() {
        let prices = PriceSheet::default();
        let mut draft = DraftOrder::new();
        let id = draft.add_file(pdf("thesis.pdf"));
        draft.add_file(notebook());
        draft.update_settings(SettingUpdate::Copies(2));

        assert_eq!(draft.calculate_total(&prices), 50);

        draft.update_file_page_count(&id, 3);
        assert_eq!(draft.calculate_total(&prices), 62);
        assert_eq!(draft.total_pages(), 3);
    }

    #[test]
    fn test_two_color_documents() {
        let prices = PriceSheet::default();
        let mut draft = DraftOrder::new();
        let a = draft.add_file(pdf("a.pdf"));
        let b = draft.add_file(pdf("b.pdf"));
        draft.update_settings(SettingUpdate::Color(true));
        draft.update_file_page_count(&a, 2);
        draft.update_file_page_count(&b, 5);

        assert_eq!(draft.calculate_total(&prices), 70);
    }

    #[test]
    fn test_composition() {
        let mut draft = DraftOrder::new();
        assert_eq!(draft.composition(), DraftComposition::Empty);
        let s = draft.add_file(notebook());
        assert_eq!(draft.composition(), DraftComposition::Stationery);
        draft.add_file(pdf("a.pdf"));
        assert_eq!(draft.composition(), DraftComposition::Mixed);
        draft.remove_file(&s);
        assert_eq!(draft.composition(), DraftComposition::Documents);
    }

    #[test]
    fn test_clear_resets_settings() {
        let mut draft = DraftOrder::new();
        draft.add_file(pdf("a.pdf"));
        draft.update_settings(SettingUpdate::Copies(4));
        draft.clear();
        assert!(draft.is_empty());
        assert_eq!(*draft.settings(), PrintSettings::default());
    }

    #[test]
    fn test_wire_round_trip_keeps_type_literal() {
        let mut draft = DraftOrder::new();
        draft.add_file(notebook());
        let json = serde_json::to_value(&draft.files()[0]).unwrap();
        assert_eq!(json["type"], "stationery");
        assert_eq!(json["price"], 50);
        assert_eq!(json["pageCount"], 0);
    }

    #[test]
    fn test_wire_rejects_stationery_without_price() {
        let json = r#"{"id":"x","name":"Pen","size":0,"type":"stationery","pageCount":0}"#;
        let parsed: std::result::Result<FileItem, _> = serde_json::from_str(json);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_wire_rejects_priced_document() {
        let json = r#"{"id":"x","name":"a.pdf","size":10,"type":"application/pdf","pageCount":1,"price":5}"#;
        let parsed: std::result::Result<FileItem, _> = serde_json::from_str(json);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_save_and_load() {
        let dir = std::env::temp_dir().join(format!("jprint-draft-{}", Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("draft.json");

        assert_eq!(DraftOrder::load(&path).unwrap(), DraftOrder::new());

        let mut draft = DraftOrder::new();
        let id = draft.add_file(pdf("saved.pdf"));
        draft.update_file_page_count(&id, 9);
        draft.update_settings(SettingUpdate::Color(true));
        draft.save(&path).unwrap();

        let restored = DraftOrder::load(&path).unwrap();
        assert_eq!(restored, draft);

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
