//! Persisted document format and the save/restore codec.
//!
//! ```text
//! {
//!   "gridItems":    [ { "id": 1, "x": 0, "y": 0, "cols": 1, "rows": 1, "type": "text", "content": "..." } ],
//!   "imageUrls":    { "2": "data:image/png;base64,..." },
//!   "imageLinks":   { "2": "https://..." },
//!   "textContents": { "1": "<b>hi</b>" },
//!   "textStyles":   { "1": { "fontWeight": "bold", ... } }
//! }
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::image::is_data_uri;
use crate::storage::KeyValueStorage;
use crate::{
    normalize_link, Block, BlockId, BlockKind, EditorError, EditorResult, ImageRegistry,
    ItemStore, LeafData, StyleState, StyleStateStore, MAX_BLOCK_ID,
};

/// Complete serialisable document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentSnapshot {
    /// Blocks in insertion order.
    pub grid_items: Vec<Block>,
    /// Image data by block id.
    #[serde(default)]
    pub image_urls: BTreeMap<BlockId, String>,
    /// Image hyperlinks by block id.
    #[serde(default)]
    pub image_links: BTreeMap<BlockId, String>,
    /// Rich-text content of text blocks by id.
    #[serde(default)]
    pub text_contents: BTreeMap<BlockId, String>,
    /// Style records by block id.
    #[serde(default)]
    pub text_styles: BTreeMap<BlockId, StyleState>,
}

impl DocumentSnapshot {
    /// Capture the current state of the stores.
    #[must_use]
    pub fn capture(items: &ItemStore, styles: &StyleStateStore, images: &ImageRegistry) -> Self {
        let text_contents = items
            .blocks()
            .iter()
            .filter(|block| block.kind == BlockKind::Text)
            .filter_map(|block| block.content.clone().map(|content| (block.id, content)))
            .collect();
        Self {
            grid_items: items.blocks().to_vec(),
            image_urls: images.data_uris(),
            image_links: images.links(),
            text_contents,
            text_styles: styles.states().clone(),
        }
    }

    /// Lay leaf-reported content, styles and links over the snapshot.
    ///
    /// Entries for ids that are not in the snapshot, or that do not fit the
    /// block's type, are dropped.
    #[must_use]
    pub fn overlay(mut self, leaf: &LeafData) -> Self {
        for (id, content) in &leaf.content_by_id {
            match self.grid_items.iter_mut().find(|block| block.id == *id) {
                Some(block) if block.kind == BlockKind::Text => {
                    block.content = Some(content.clone());
                    self.text_contents.insert(*id, content.clone());
                }
                _ => tracing::debug!(id = %id, "Dropped leaf content without a text block"),
            }
        }
        for (id, style) in &leaf.style_by_id {
            if self.grid_items.iter().any(|block| block.id == *id) {
                self.text_styles.insert(*id, style.clone());
            } else {
                tracing::debug!(id = %id, "Dropped leaf style without a block");
            }
        }
        for (id, link) in &leaf.link_by_id {
            if !self.image_urls.contains_key(id) {
                tracing::debug!(id = %id, "Dropped leaf link without an image");
            } else if link.trim().is_empty() {
                self.image_links.remove(id);
            } else {
                self.image_links.insert(*id, normalize_link(link));
            }
        }
        self
    }

    /// Check the snapshot is internally consistent.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::Corrupt`] describing the first problem found.
    pub fn validate(&self) -> EditorResult<()> {
        let mut kinds = BTreeMap::new();
        for block in &self.grid_items {
            if block.id.get() > MAX_BLOCK_ID {
                return Err(corrupt(format!("block id {} is out of range", block.id)));
            }
            if kinds.insert(block.id, block.kind).is_some() {
                return Err(corrupt(format!("duplicate block id {}", block.id)));
            }
            if block.cols == 0 || block.rows == 0 {
                return Err(corrupt(format!("block {} has an empty footprint", block.id)));
            }
        }

        for (id, uri) in &self.image_urls {
            expect_kind(&kinds, *id, BlockKind::Image, "imageUrls")?;
            if !is_data_uri(uri) {
                return Err(corrupt(format!("image {id} is not a data URI")));
            }
        }
        for id in self.image_links.keys() {
            expect_kind(&kinds, *id, BlockKind::Image, "imageLinks")?;
            if !self.image_urls.contains_key(id) {
                return Err(corrupt(format!("imageLinks entry {id} has no image")));
            }
        }
        for id in self.text_contents.keys() {
            expect_kind(&kinds, *id, BlockKind::Text, "textContents")?;
        }
        for id in self.text_styles.keys() {
            if !kinds.contains_key(id) {
                return Err(corrupt(format!("textStyles entry {id} has no block")));
            }
        }
        Ok(())
    }

    /// Ids of every block, in insertion order.
    #[must_use]
    pub fn block_ids(&self) -> Vec<BlockId> {
        self.grid_items.iter().map(|block| block.id).collect()
    }

    /// Serialize to JSON.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::Serialization`] if encoding fails.
    pub fn to_json(&self) -> EditorResult<String> {
        serde_json::to_string(self).map_err(|e| EditorError::Serialization(e.to_string()))
    }

    /// Parse and validate JSON.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::Corrupt`] if the payload does not parse or
    /// fails validation.
    pub fn from_json(json: &str) -> EditorResult<Self> {
        let snapshot: Self = serde_json::from_str(json).map_err(|e| corrupt(e.to_string()))?;
        snapshot.validate()?;
        Ok(snapshot)
    }
}

fn corrupt(reason: String) -> EditorError {
    EditorError::Corrupt(reason)
}

fn expect_kind(
    kinds: &BTreeMap<BlockId, BlockKind>,
    id: BlockId,
    want: BlockKind,
    map: &str,
) -> EditorResult<()> {
    match kinds.get(&id) {
        Some(kind) if *kind == want => Ok(()),
        Some(kind) => Err(corrupt(format!("{map} entry {id} points at a {kind} block"))),
        None => Err(corrupt(format!("{map} entry {id} has no block"))),
    }
}

/// Writes and reads the document under one fixed storage key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistenceCodec {
    key: String,
}

impl PersistenceCodec {
    /// Create a codec for `key`.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }

    /// Storage key in use.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Assemble a snapshot from the stores and leaf data and write it,
    /// replacing any previous record.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding or the storage write fails.
    pub fn save<S: KeyValueStorage + ?Sized>(
        &self,
        storage: &S,
        items: &ItemStore,
        styles: &StyleStateStore,
        images: &ImageRegistry,
        leaf: &LeafData,
    ) -> EditorResult<DocumentSnapshot> {
        let snapshot = DocumentSnapshot::capture(items, styles, images).overlay(leaf);
        self.write(storage, &snapshot)?;
        Ok(snapshot)
    }

    /// Write an assembled snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding or the storage write fails.
    pub fn write<S: KeyValueStorage + ?Sized>(
        &self,
        storage: &S,
        snapshot: &DocumentSnapshot,
    ) -> EditorResult<()> {
        let json = snapshot.to_json()?;
        storage.set(&self.key, &json)?;
        tracing::info!(
            key = %self.key,
            blocks = snapshot.grid_items.len(),
            bytes = json.len(),
            "Saved document"
        );
        Ok(())
    }

    /// Read and validate the stored snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::SnapshotNotFound`] when nothing is stored and
    /// [`EditorError::Corrupt`] when the record is malformed.
    pub fn restore<S: KeyValueStorage + ?Sized>(
        &self,
        storage: &S,
    ) -> EditorResult<DocumentSnapshot> {
        let json = storage
            .get(&self.key)?
            .ok_or_else(|| EditorError::SnapshotNotFound(self.key.clone()))?;
        let snapshot = DocumentSnapshot::from_json(&json).inspect_err(|e| {
            tracing::warn!(key = %self.key, "Rejected stored document: {e}");
        })?;
        tracing::info!(
            key = %self.key,
            blocks = snapshot.grid_items.len(),
            "Read stored document"
        );
        Ok(snapshot)
    }

    /// Remove the stored record.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage removal fails.
    pub fn discard<S: KeyValueStorage + ?Sized>(&self, storage: &S) -> EditorResult<()> {
        storage.remove(&self.key)?;
        tracing::info!(key = %self.key, "Discarded stored document");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FontWeight, ImageFormat, ImagePayload, MemoryStorage};

    fn sample() -> (ItemStore, StyleStateStore, ImageRegistry) {
        let mut items = ItemStore::default();
        let mut styles = StyleStateStore::new();
        let mut images = ImageRegistry::new();
        let text = items.add_text();
        items
            .sync_content(text.id, "<b>hi</b>".to_string())
            .expect("content");
        styles.on_style_changed(
            text.id,
            StyleState {
                font_weight: FontWeight::Bold,
                ..StyleState::default()
            },
        );
        let image = items
            .add_image(
                &mut images,
                &ImagePayload::new(ImageFormat::Png, b"png".to_vec()),
            )
            .expect("image");
        images.set_link(image.id, "example.com").expect("link");
        (items, styles, images)
    }

    #[test]
    fn test_capture_shape() {
        let (items, styles, images) = sample();
        let snapshot = DocumentSnapshot::capture(&items, &styles, &images);
        let json: serde_json::Value =
            serde_json::from_str(&snapshot.to_json().expect("json")).expect("parse");
        for field in ["gridItems", "imageUrls", "imageLinks", "textContents", "textStyles"] {
            assert!(json.get(field).is_some(), "missing {field}");
        }
        let text_id = items.blocks()[0].id.to_string();
        assert_eq!(json["textContents"][&text_id], "<b>hi</b>");
        assert_eq!(json["textStyles"][&text_id]["fontWeight"], "bold");
    }

    #[test]
    fn test_save_then_restore() {
        let (items, styles, images) = sample();
        let storage = MemoryStorage::new();
        let codec = PersistenceCodec::new("doc");
        let saved = codec
            .save(&storage, &items, &styles, &images, &LeafData::default())
            .expect("save");
        let restored = codec.restore(&storage).expect("restore");
        assert_eq!(restored, saved);
    }

    #[test]
    fn test_restore_missing_key() {
        let codec = PersistenceCodec::new("doc");
        assert!(matches!(
            codec.restore(&MemoryStorage::new()),
            Err(EditorError::SnapshotNotFound(key)) if key == "doc"
        ));
    }

    #[test]
    fn test_restore_garbage_is_corrupt() {
        let storage = MemoryStorage::new();
        storage.set("doc", "{not json").expect("set");
        let codec = PersistenceCodec::new("doc");
        assert!(matches!(codec.restore(&storage), Err(EditorError::Corrupt(_))));

        storage.set("doc", r#"{"imageUrls":{}}"#).expect("set");
        assert!(matches!(codec.restore(&storage), Err(EditorError::Corrupt(_))));
    }

    #[test]
    fn test_missing_satellite_maps_default_to_empty() {
        let json = r#"{"gridItems":[{"id":5,"x":0,"y":0,"cols":1,"rows":1,"type":"text"}]}"#;
        let snapshot = DocumentSnapshot::from_json(json).expect("parse");
        assert_eq!(snapshot.grid_items.len(), 1);
        assert!(snapshot.text_styles.is_empty());
    }

    #[test]
    fn test_validation_failures() {
        let cases = [
            r#"{"gridItems":[{"id":1,"x":0,"y":0,"cols":1,"rows":1,"type":"text"},{"id":1,"x":1,"y":0,"cols":1,"rows":1,"type":"text"}]}"#,
            r#"{"gridItems":[{"id":1,"x":0,"y":0,"cols":0,"rows":1,"type":"text"}]}"#,
            r#"{"gridItems":[{"id":1,"x":0,"y":0,"cols":1,"rows":1,"type":"text"}],"imageUrls":{"1":"data:image/png;base64,AA=="}}"#,
            r#"{"gridItems":[{"id":1,"x":0,"y":0,"cols":2,"rows":2,"type":"image"}],"imageUrls":{"1":"http://x/a.png"}}"#,
            r#"{"gridItems":[{"id":1,"x":0,"y":0,"cols":2,"rows":2,"type":"image"}],"imageLinks":{"1":"https://x"}}"#,
            r#"{"gridItems":[],"textStyles":{"3":{}}}"#,
            r#"{"gridItems":[],"textContents":{"3":"orphan"}}"#,
            r#"{"gridItems":[{"id":1,"x":0,"y":0,"cols":1,"rows":1,"type":"video"}]}"#,
            r#"{"gridItems":[{"id":-1,"x":0,"y":0,"cols":1,"rows":1,"type":"text"}]}"#,
            r#"{"gridItems":[{"id":9007199254740992,"x":0,"y":0,"cols":1,"rows":1,"type":"text"}]}"#,
            r#"{"gridItems":[{"id":18446744073709551615,"x":0,"y":0,"cols":1,"rows":1,"type":"text"}]}"#,
        ];
        for json in cases {
            assert!(
                matches!(DocumentSnapshot::from_json(json), Err(EditorError::Corrupt(_))),
                "accepted: {json}"
            );
        }
    }

    #[test]
    fn test_overlay_prefers_leaf_data() {
        let (items, styles, images) = sample();
        let text_id = items.blocks()[0].id;
        let image_id = items.blocks()[1].id;

        let mut leaf = LeafData::default();
        leaf.content_by_id.insert(text_id, "<i>edited</i>".to_string());
        leaf.content_by_id.insert(image_id, "ignored".to_string());
        leaf.link_by_id.insert(image_id, "other.org".to_string());
        leaf.style_by_id.insert(BlockId::from_raw(1), StyleState::default());

        let snapshot = DocumentSnapshot::capture(&items, &styles, &images).overlay(&leaf);
        assert_eq!(
            snapshot.text_contents.get(&text_id).map(String::as_str),
            Some("<i>edited</i>")
        );
        assert_eq!(
            snapshot.grid_items[0].content.as_deref(),
            Some("<i>edited</i>")
        );
        assert!(!snapshot.text_contents.contains_key(&image_id));
        assert_eq!(
            snapshot.image_links.get(&image_id).map(String::as_str),
            Some("https://other.org")
        );
        assert!(!snapshot.text_styles.contains_key(&BlockId::from_raw(1)));
        assert!(snapshot.validate().is_ok());
    }

    #[test]
    fn test_discard_removes_record() {
        let (items, styles, images) = sample();
        let storage = MemoryStorage::new();
        let codec = PersistenceCodec::new("doc");
        codec
            .save(&storage, &items, &styles, &images, &LeafData::default())
            .expect("save");
        codec.discard(&storage).expect("discard");
        assert!(matches!(
            codec.restore(&storage),
            Err(EditorError::SnapshotNotFound(_))
        ));
    }
}
