//! # Document
//!
//! Single owner of the editor state. Wraps the item store and its satellite
//! maps, routes every mutation through one `&mut self` entry point, and
//! broadcasts a [`DocumentEvent`] for each observable change.
//!
//! ## Save
//!
//! Mounted surfaces are authoritative for rendered content, styles and
//! links. Saving first folds the collected [`LeafData`] into the stores, then
//! snapshots the stores.
//!
//! ## Restore
//!
//! 1. [`Document::restore`] validates the stored record and replaces every
//!    store at once. Nothing is applied if validation fails.
//! 2. The returned [`RestorePlan`] is handed to
//!    [`SyncBus::complete_restore`], which waits until the rebuilt surfaces
//!    are mounted before pushing content, styles and links into them.

use tokio::sync::broadcast;

use crate::storage::KeyValueStorage;
use crate::{
    Block, BlockId, BlockKind, DocumentSnapshot, EditorConfig, EditorError, EditorResult,
    ImagePayload, ImageRegistry, ItemStore, LeafData, PersistenceCodec, RestorePlan,
    StyleState, StyleStateStore, SyncBus,
};

/// Buffered events per subscriber.
const EVENT_CAPACITY: usize = 100;

/// Observable document changes, for pass/fail notices in a UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentEvent {
    /// A block was appended.
    BlockAdded(Block),
    /// A block and its satellite records were removed.
    BlockRemoved(BlockId),
    /// An image block's data was swapped.
    ImageReplaced(BlockId),
    /// The document was written to storage.
    Saved {
        /// Blocks written.
        blocks: usize,
    },
    /// A save failed; storage is unchanged.
    SaveFailed {
        /// Error message.
        reason: String,
    },
    /// A stored document replaced the live one.
    Restored {
        /// Blocks restored.
        blocks: usize,
    },
    /// A restore failed; the live document is unchanged.
    RestoreFailed {
        /// Error message.
        reason: String,
    },
    /// The stored record and the live document were cleared.
    Discarded,
}

/// The live document.
#[derive(Debug)]
pub struct Document {
    config: EditorConfig,
    items: ItemStore,
    styles: StyleStateStore,
    images: ImageRegistry,
    codec: PersistenceCodec,
    events: broadcast::Sender<DocumentEvent>,
}

impl Document {
    /// Create an empty document.
    #[must_use]
    pub fn new(config: EditorConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            items: ItemStore::new(&config),
            styles: StyleStateStore::new(),
            images: ImageRegistry::new(),
            codec: PersistenceCodec::new(config.storage_key.clone()),
            events,
            config,
        }
    }

    /// Configuration in use.
    #[must_use]
    pub const fn config(&self) -> &EditorConfig {
        &self.config
    }

    /// Blocks and their layout.
    #[must_use]
    pub const fn items(&self) -> &ItemStore {
        &self.items
    }

    /// Per-block style records.
    #[must_use]
    pub const fn styles(&self) -> &StyleStateStore {
        &self.styles
    }

    /// Image data and links.
    #[must_use]
    pub const fn images(&self) -> &ImageRegistry {
        &self.images
    }

    /// Subscribe to document events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<DocumentEvent> {
        self.events.subscribe()
    }

    /// Append an empty text block.
    pub fn add_text(&mut self) -> Block {
        let block = self.items.add_text();
        self.emit(DocumentEvent::BlockAdded(block.clone()));
        block
    }

    /// Append an image block.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::FileTooLarge`] if the payload is over the
    /// ceiling; the document is unchanged.
    pub fn add_image(&mut self, payload: &ImagePayload) -> EditorResult<Block> {
        let block = self
            .items
            .add_image(&mut self.images, payload)
            .inspect_err(|e| tracing::warn!("Image rejected: {e}"))?;
        self.emit(DocumentEvent::BlockAdded(block.clone()));
        Ok(block)
    }

    /// Swap the image shown by an image block.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::FileTooLarge`] or
    /// [`EditorError::BlockNotFound`]; the document is unchanged.
    pub fn replace_image(&mut self, id: BlockId, payload: &ImagePayload) -> EditorResult<Block> {
        let block = self
            .items
            .replace_image(&mut self.images, id, payload)
            .inspect_err(|e| tracing::warn!(id = %id, "Image replacement rejected: {e}"))?;
        self.emit(DocumentEvent::ImageReplaced(id));
        Ok(block)
    }

    /// Remove a block with its style and image records. Unknown ids are a no-op.
    pub fn delete_item(&mut self, id: BlockId) -> Option<Block> {
        let block = self
            .items
            .delete_item(id, &mut self.styles, &mut self.images)?;
        self.emit(DocumentEvent::BlockRemoved(id));
        Some(block)
    }

    /// Set or clear the hyperlink of an image block.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::BlockNotFound`] if `id` has no image.
    pub fn set_image_link(&mut self, id: BlockId, url: &str) -> EditorResult<()> {
        self.images.set_link(id, url)
    }

    /// Replace the content of a text block.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::BlockNotFound`] if `id` is not a text block.
    pub fn set_content(&mut self, id: BlockId, html: impl Into<String>) -> EditorResult<()> {
        self.items.sync_content(id, html.into())
    }

    /// Apply a layout change from the grid widget.
    ///
    /// # Errors
    ///
    /// See [`ItemStore::update_layout`].
    pub fn update_layout(
        &mut self,
        id: BlockId,
        x: u32,
        y: u32,
        cols: u32,
        rows: u32,
    ) -> EditorResult<()> {
        self.items.update_layout(id, x, y, cols, rows)
    }

    /// A block's surface gained focus.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::BlockNotFound`] for unknown ids.
    pub fn on_focus(&mut self, id: BlockId) -> EditorResult<()> {
        self.require(id)?;
        self.styles.on_focus(id);
        Ok(())
    }

    /// A block's surface lost focus.
    pub fn on_blur(&mut self, id: BlockId) {
        self.styles.on_blur(id);
    }

    /// Replace the style record of a block.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::BlockNotFound`] for unknown ids.
    pub fn on_style_changed(&mut self, id: BlockId, state: StyleState) -> EditorResult<()> {
        self.require(id)?;
        self.styles.on_style_changed(id, state);
        Ok(())
    }

    /// Fold state collected from surfaces into the stores.
    ///
    /// Entries for unknown ids, or that do not fit the block's type, are
    /// dropped.
    pub fn absorb_leaf_data(&mut self, leaf: &LeafData) {
        for (id, content) in &leaf.content_by_id {
            if let Err(e) = self.items.sync_content(*id, content.clone()) {
                tracing::debug!(id = %id, "Dropped leaf content: {e}");
            }
        }
        for (id, style) in &leaf.style_by_id {
            if self.items.contains(*id) {
                self.styles.on_style_changed(*id, style.clone());
            } else {
                tracing::debug!(id = %id, "Dropped leaf style without a block");
            }
        }
        for (id, link) in &leaf.link_by_id {
            if let Err(e) = self.images.set_link(*id, link) {
                tracing::debug!(id = %id, "Dropped leaf link: {e}");
            }
        }
    }

    /// Current document as a snapshot.
    #[must_use]
    pub fn snapshot(&self) -> DocumentSnapshot {
        DocumentSnapshot::capture(&self.items, &self.styles, &self.images)
    }

    /// Fold `leaf` into the stores and write the document.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding or the storage write fails.
    pub fn save<S: KeyValueStorage + ?Sized>(
        &mut self,
        storage: &S,
        leaf: &LeafData,
    ) -> EditorResult<DocumentSnapshot> {
        self.absorb_leaf_data(leaf);
        match self
            .codec
            .save(storage, &self.items, &self.styles, &self.images, leaf)
        {
            Ok(snapshot) => {
                self.emit(DocumentEvent::Saved {
                    blocks: snapshot.grid_items.len(),
                });
                Ok(snapshot)
            }
            Err(e) => {
                tracing::warn!("Save failed: {e}");
                self.emit(DocumentEvent::SaveFailed {
                    reason: e.to_string(),
                });
                Err(e)
            }
        }
    }

    /// Collect leaf data from every mounted surface, then save.
    ///
    /// # Errors
    ///
    /// See [`Document::save`].
    pub async fn save_collected<S: KeyValueStorage + ?Sized>(
        &mut self,
        storage: &S,
        bus: &SyncBus,
    ) -> EditorResult<DocumentSnapshot> {
        let ids: Vec<BlockId> = self.items.blocks().iter().map(|block| block.id).collect();
        let leaf = bus.request_leaf_data(&ids).await;
        self.save(storage, &leaf)
    }

    /// Replace the live document with the stored one.
    ///
    /// This is phase 1; pass the returned plan to
    /// [`SyncBus::complete_restore`] once surfaces for the restored blocks
    /// are being mounted.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::SnapshotNotFound`] or [`EditorError::Corrupt`];
    /// the live document is unchanged in both cases.
    pub fn restore<S: KeyValueStorage + ?Sized>(
        &mut self,
        storage: &S,
    ) -> EditorResult<RestorePlan> {
        match self.codec.restore(storage) {
            Ok(snapshot) => Ok(self.apply_snapshot(snapshot)),
            Err(e) => {
                self.emit(DocumentEvent::RestoreFailed {
                    reason: e.to_string(),
                });
                Err(e)
            }
        }
    }

    /// Replace every store with a validated snapshot.
    pub fn apply_snapshot(&mut self, snapshot: DocumentSnapshot) -> RestorePlan {
        let DocumentSnapshot {
            mut grid_items,
            image_urls,
            image_links,
            text_contents,
            text_styles,
        } = snapshot;

        let mut leaf = LeafData::default();
        for block in &mut grid_items {
            if block.kind != BlockKind::Text {
                continue;
            }
            if let Some(content) = text_contents.get(&block.id) {
                block.content = Some(content.clone());
            }
            if let Some(content) = &block.content {
                leaf.content_by_id.insert(block.id, content.clone());
            }
        }
        leaf.style_by_id.clone_from(&text_styles);
        leaf.link_by_id.clone_from(&image_links);

        let ids: Vec<BlockId> = grid_items.iter().map(|block| block.id).collect();
        self.items.replace_all(grid_items);
        self.styles.replace_all(text_styles);
        self.images.clear();
        for (id, uri) in image_urls {
            self.images.set(id, uri);
        }
        for (id, link) in &image_links {
            if let Err(e) = self.images.set_link(*id, link) {
                tracing::debug!(id = %id, "Dropped restored link: {e}");
            }
        }

        tracing::info!(blocks = ids.len(), "Restored document");
        self.emit(DocumentEvent::Restored { blocks: ids.len() });
        RestorePlan { ids, leaf }
    }

    /// Remove the stored record and clear the live document.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage removal fails; the live document is
    /// then left as it was.
    pub fn discard<S: KeyValueStorage + ?Sized>(&mut self, storage: &S) -> EditorResult<()> {
        self.codec.discard(storage)?;
        self.items.clear();
        self.styles.replace_all(std::collections::BTreeMap::new());
        self.images.clear();
        self.emit(DocumentEvent::Discarded);
        Ok(())
    }

    fn require(&self, id: BlockId) -> EditorResult<()> {
        if self.items.contains(id) {
            Ok(())
        } else {
            Err(EditorError::BlockNotFound(id))
        }
    }

    fn emit(&self, event: DocumentEvent) {
        if let Err(e) = self.events.send(event) {
            tracing::trace!("Event skipped: no receivers ({e})");
        }
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new(EditorConfig::default())
    }
}
