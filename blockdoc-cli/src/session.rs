//! One editing session against a data directory.
//!
//! A session restores the stored document, mounts a headless surface for
//! every block and completes the restore through the bus, exactly as a
//! rendering host would. Commands then edit the surfaces or the document,
//! and [`Session::save`] collects the surfaces before writing.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{bail, Context};
use blockdoc_core::ingest::read_image;
use blockdoc_core::{
    Block, BlockId, BlockKind, Document, DocumentSnapshot, EditorConfig, EditorError,
    FileStorage, FontStyle, FontWeight, ImageSurface, KeyValueStorage, LeafSurface, SyncBus,
    TextSurface,
};
use tokio::task::JoinHandle;

use crate::cli::StyleArgs;

/// Mounted surface and the task serving it.
struct Mounted<S> {
    surface: Arc<Mutex<S>>,
    task: JoinHandle<()>,
}

impl<S> Drop for Mounted<S> {
    fn drop(&mut self) {
        // Dropping the task drops its handle, which unmounts the surface.
        self.task.abort();
    }
}

/// A restored document with live surfaces.
pub struct Session {
    document: Document,
    storage: FileStorage,
    bus: SyncBus,
    texts: BTreeMap<BlockId, Mounted<TextSurface>>,
    images: BTreeMap<BlockId, Mounted<ImageSurface>>,
}

impl Session {
    /// Open the document stored in `data_dir`, or start an empty one.
    ///
    /// # Errors
    ///
    /// Fails if the directory cannot be opened or the stored record is
    /// corrupt.
    pub async fn open(data_dir: &Path, config: EditorConfig) -> anyhow::Result<Self> {
        let storage = FileStorage::open(data_dir)
            .with_context(|| format!("Failed to open data directory {}", data_dir.display()))?;
        let bus = SyncBus::from_config(&config);
        let mut session = Self {
            document: Document::new(config),
            storage,
            bus,
            texts: BTreeMap::new(),
            images: BTreeMap::new(),
        };

        match session.document.restore(&session.storage) {
            Ok(plan) => {
                let blocks = session.document.items().blocks().to_vec();
                for block in &blocks {
                    session.mount(block);
                }
                let report = session.bus.complete_restore(&plan).await;
                if !report.skipped.is_empty() {
                    tracing::warn!(skipped = ?report.skipped, "Some surfaces missed the restore");
                }
                // Surfaces answer in order, so a collection round-trip means
                // every push has been applied before commands run.
                session.bus.request_leaf_data(&plan.ids).await;
            }
            Err(EditorError::SnapshotNotFound(key)) => {
                tracing::info!(key = %key, "No saved document, starting empty");
            }
            Err(e) => return Err(e).context("Failed to restore saved document"),
        }
        Ok(session)
    }

    /// The live document.
    #[must_use]
    pub const fn document(&self) -> &Document {
        &self.document
    }

    /// Current HTML of a text block's surface.
    #[must_use]
    pub fn surface_html(&self, id: BlockId) -> Option<String> {
        self.texts.get(&id).map(|mounted| lock(&mounted.surface).html().to_string())
    }

    /// Current link on an image block's surface.
    #[must_use]
    pub fn surface_link(&self, id: BlockId) -> Option<String> {
        self.images
            .get(&id)
            .and_then(|mounted| lock(&mounted.surface).link().map(str::to_string))
    }

    /// Append a text block, optionally with content.
    pub fn add_text(&mut self, content: Option<&str>) -> Block {
        let block = self.document.add_text();
        self.mount(&block);
        if let Some(html) = content {
            self.edit_surface(block.id, html);
        }
        block
    }

    /// Append an image block from a file.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read or is too large.
    pub async fn add_image(&mut self, path: &Path) -> anyhow::Result<Block> {
        let payload = read_image(path, self.document.config().max_image_bytes)
            .await
            .with_context(|| format!("Failed to load image {}", path.display()))?;
        let block = self.document.add_image(&payload)?;
        self.mount(&block);
        Ok(block)
    }

    /// Replace the image of an image block.
    ///
    /// # Errors
    ///
    /// Fails if the file is unusable or `id` is not an image block.
    pub async fn replace_image(&mut self, id: BlockId, path: &Path) -> anyhow::Result<()> {
        let payload = read_image(path, self.document.config().max_image_bytes)
            .await
            .with_context(|| format!("Failed to load image {}", path.display()))?;
        self.document.replace_image(id, &payload)?;
        if let (Some(mounted), Some(record)) = (self.images.get(&id), self.document.images().get(id))
        {
            lock(&mounted.surface).set_data_uri(record.data_uri.clone());
        }
        Ok(())
    }

    /// Set or clear the link of an image block.
    ///
    /// # Errors
    ///
    /// Fails if `id` is not an image block.
    pub fn link(&mut self, id: BlockId, url: &str) -> anyhow::Result<()> {
        self.document.set_image_link(id, url)?;
        let link = self
            .document
            .images()
            .get(id)
            .and_then(|record| record.link.clone())
            .unwrap_or_default();
        if let Some(mounted) = self.images.get(&id) {
            lock(&mounted.surface).set_link(&link);
        }
        Ok(())
    }

    /// Apply style changes to a block.
    ///
    /// # Errors
    ///
    /// Fails if the block does not exist.
    pub fn style(&mut self, args: &StyleArgs) -> anyhow::Result<()> {
        let id = args.id;
        let applied = self
            .texts
            .get(&id)
            .and_then(|mounted| lock(&mounted.surface).style().cloned());
        let mut style = applied.unwrap_or_else(|| self.document.styles().effective(id));
        if args.plain {
            style.font_weight = FontWeight::Normal;
            style.font_style = FontStyle::Normal;
        }
        if args.bold {
            style.font_weight = FontWeight::Bold;
        }
        if args.italic {
            style.font_style = FontStyle::Italic;
        }
        if let Some(size) = args.size {
            style.font_size = size;
        }
        if let Some(align) = args.align {
            style.text_align = align;
        }
        if let Some(valign) = args.valign {
            style.vertical_align = valign;
        }
        if let Some(color) = &args.color {
            style.color = color.clone();
        }
        if let Some(background) = &args.background {
            style.background_color = background.clone();
        }
        if let Some(border) = &args.border {
            style.border_color = border.clone();
        }

        self.document.on_focus(id)?;
        self.document.on_style_changed(id, style.clone())?;
        if let Some(mounted) = self.texts.get(&id) {
            lock(&mounted.surface).set_style(style);
        }
        self.document.on_blur(id);
        Ok(())
    }

    /// Replace the content of a text block.
    ///
    /// # Errors
    ///
    /// Fails if `id` is not a text block.
    pub fn edit(&mut self, id: BlockId, html: &str) -> anyhow::Result<()> {
        if !self.texts.contains_key(&id) {
            bail!(EditorError::BlockNotFound(id));
        }
        self.edit_surface(id, html);
        Ok(())
    }

    /// Move or resize a block; unset sizes keep the current ones.
    ///
    /// # Errors
    ///
    /// Fails if the block does not exist or a size is zero.
    pub fn move_block(
        &mut self,
        id: BlockId,
        x: u32,
        y: u32,
        cols: Option<u32>,
        rows: Option<u32>,
    ) -> anyhow::Result<()> {
        let block = self
            .document
            .items()
            .get(id)
            .ok_or(EditorError::BlockNotFound(id))?;
        let cols = cols.unwrap_or(block.cols);
        let rows = rows.unwrap_or(block.rows);
        self.document.update_layout(id, x, y, cols, rows)?;
        Ok(())
    }

    /// Delete a block and unmount its surface. Returns whether it existed.
    pub fn delete(&mut self, id: BlockId) -> bool {
        self.texts.remove(&id);
        self.images.remove(&id);
        self.document.delete_item(id).is_some()
    }

    /// Remove the stored document and every surface.
    ///
    /// # Errors
    ///
    /// Fails if the stored record cannot be removed.
    pub fn discard(&mut self) -> anyhow::Result<()> {
        self.document
            .discard(&self.storage)
            .context("Failed to discard saved document")?;
        self.texts.clear();
        self.images.clear();
        Ok(())
    }

    /// Collect surface state and write the document.
    ///
    /// # Errors
    ///
    /// Fails if the write fails.
    pub async fn save(&mut self) -> anyhow::Result<DocumentSnapshot> {
        self.document
            .save_collected(&self.storage, &self.bus)
            .await
            .context("Failed to save document")
    }

    /// Raw stored record, if any.
    ///
    /// # Errors
    ///
    /// Fails if storage cannot be read.
    pub fn stored_record(&self) -> anyhow::Result<Option<String>> {
        let key = &self.document.config().storage_key;
        Ok(self.storage.get(key)?)
    }

    fn edit_surface(&self, id: BlockId, html: &str) {
        if let Some(mounted) = self.texts.get(&id) {
            let mut surface = lock(&mounted.surface);
            surface.set_html(html);
            surface.blur();
        }
    }

    fn mount(&mut self, block: &Block) {
        match block.kind {
            BlockKind::Text => {
                let mounted = self.spawn_surface(block.id, TextSurface::new());
                self.texts.insert(block.id, mounted);
            }
            BlockKind::Image => {
                let data_uri = self
                    .document
                    .images()
                    .get(block.id)
                    .map(|record| record.data_uri.clone())
                    .unwrap_or_default();
                let mounted = self.spawn_surface(block.id, ImageSurface::new(data_uri));
                self.images.insert(block.id, mounted);
            }
        }
    }

    fn spawn_surface<S>(&self, id: BlockId, surface: S) -> Mounted<S>
    where
        S: LeafSurface + Send + 'static,
    {
        let surface = Arc::new(Mutex::new(surface));
        let task = tokio::spawn(self.bus.mount(id).run(Arc::clone(&surface)));
        Mounted { surface, task }
    }
}

fn lock<S>(surface: &Mutex<S>) -> std::sync::MutexGuard<'_, S> {
    surface
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}
