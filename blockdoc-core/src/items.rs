//! Ordered block collection with id issuing and cascading deletion.

use crate::{
    Block, BlockId, BlockKind, EditorConfig, EditorError, EditorResult, IdGenerator,
    ImagePayload, ImageRegistry, PlacementEngine, StyleStateStore,
};

/// Owns block identity and insertion order.
///
/// Style and image records live in satellite maps; [`ItemStore::delete_item`]
/// cascades into them explicitly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemStore {
    blocks: Vec<Block>,
    ids: IdGenerator,
    placement: PlacementEngine,
    text_size: (u32, u32),
    image_size: (u32, u32),
    max_image_bytes: usize,
}

impl ItemStore {
    /// Create an empty store using the block sizes and limits in `config`.
    #[must_use]
    pub fn new(config: &EditorConfig) -> Self {
        Self {
            blocks: Vec::new(),
            ids: IdGenerator::new(),
            placement: PlacementEngine::new(config.active_row),
            text_size: config.text_block_size,
            image_size: config.image_block_size,
            max_image_bytes: config.max_image_bytes,
        }
    }

    /// Append a new empty text block.
    pub fn add_text(&mut self) -> Block {
        let (cols, rows) = self.text_size;
        self.insert(BlockKind::Text, cols, rows)
    }

    /// Append a new image block and register its data.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::FileTooLarge`] before any mutation if the
    /// payload exceeds the ceiling.
    pub fn add_image(
        &mut self,
        images: &mut ImageRegistry,
        payload: &ImagePayload,
    ) -> EditorResult<Block> {
        payload.check_size(self.max_image_bytes)?;
        let (cols, rows) = self.image_size;
        let block = self.insert(BlockKind::Image, cols, rows);
        images.set(block.id, payload.to_data_uri());
        Ok(block)
    }

    /// Swap the image data of an existing image block. Layout is unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::FileTooLarge`] for oversized payloads and
    /// [`EditorError::BlockNotFound`] if `id` is not an image block.
    pub fn replace_image(
        &self,
        images: &mut ImageRegistry,
        id: BlockId,
        payload: &ImagePayload,
    ) -> EditorResult<Block> {
        payload.check_size(self.max_image_bytes)?;
        let block = self
            .get(id)
            .filter(|block| block.kind == BlockKind::Image)
            .ok_or(EditorError::BlockNotFound(id))?;
        images.set(id, payload.to_data_uri());
        tracing::debug!(id = %id, bytes = payload.len(), "Replaced image");
        Ok(block.clone())
    }

    /// Remove a block and its style and image records.
    ///
    /// Deleting an unknown id is a no-op.
    pub fn delete_item(
        &mut self,
        id: BlockId,
        styles: &mut StyleStateStore,
        images: &mut ImageRegistry,
    ) -> Option<Block> {
        let index = self.blocks.iter().position(|block| block.id == id)?;
        let block = self.blocks.remove(index);
        styles.clean_up(id);
        images.delete(id);
        tracing::debug!(id = %id, kind = %block.kind, "Deleted block");
        Some(block)
    }

    /// Apply a layout change reported by the grid widget.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::BlockNotFound`] for unknown ids and
    /// [`EditorError::InvalidOperation`] for zero-sized blocks.
    pub fn update_layout(
        &mut self,
        id: BlockId,
        x: u32,
        y: u32,
        cols: u32,
        rows: u32,
    ) -> EditorResult<()> {
        if cols == 0 || rows == 0 {
            return Err(EditorError::InvalidOperation(format!(
                "block {id} must span at least one cell"
            )));
        }
        let block = self.get_mut(id).ok_or(EditorError::BlockNotFound(id))?;
        block.x = x;
        block.y = y;
        block.cols = cols;
        block.rows = rows;
        Ok(())
    }

    /// Record the authoritative content of a text block.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::BlockNotFound`] if `id` is not a text block.
    pub fn sync_content(&mut self, id: BlockId, content: String) -> EditorResult<()> {
        let block = self
            .get_mut(id)
            .filter(|block| block.kind == BlockKind::Text)
            .ok_or(EditorError::BlockNotFound(id))?;
        block.content = Some(content);
        Ok(())
    }

    /// Replace every block, e.g. from a restored snapshot.
    ///
    /// Future ids stay above every id in `blocks`.
    pub fn replace_all(&mut self, blocks: Vec<Block>) {
        for block in &blocks {
            self.ids.observe(block.id);
        }
        self.blocks = blocks;
    }

    /// Remove every block. Issued ids are not reused.
    pub fn clear(&mut self) {
        self.blocks.clear();
    }

    /// Block by id.
    #[must_use]
    pub fn get(&self, id: BlockId) -> Option<&Block> {
        self.blocks.iter().find(|block| block.id == id)
    }

    fn get_mut(&mut self, id: BlockId) -> Option<&mut Block> {
        self.blocks.iter_mut().find(|block| block.id == id)
    }

    /// Whether `id` is in the store.
    #[must_use]
    pub fn contains(&self, id: BlockId) -> bool {
        self.get(id).is_some()
    }

    /// All blocks in insertion order.
    #[must_use]
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Number of blocks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Whether the store has no blocks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    fn insert(&mut self, kind: BlockKind, cols: u32, rows: u32) -> Block {
        let blocks = &self.blocks;
        let id = self
            .ids
            .next_id(|candidate| blocks.iter().any(|block| block.id == candidate));
        let at = self.placement.place(&self.blocks, cols);
        let block = Block::new(id, kind, at, cols, rows);
        tracing::debug!(id = %id, %kind, x = at.x, y = at.y, "Added block");
        self.blocks.push(block.clone());
        block
    }
}

impl Default for ItemStore {
    fn default() -> Self {
        Self::new(&EditorConfig::default())
    }
}
