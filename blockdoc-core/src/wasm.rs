//! WebAssembly bindings for blockdoc-core.
//!
//! The browser host renders surfaces itself, so leaf data arrives as JSON
//! (`{ contentById, styleById, linkById }`) and restores hand back a plan
//! for the host to push into its surfaces once they exist.

use wasm_bindgen::prelude::*;

use crate::storage::KeyValueStorage;
use crate::{
    BlockId, Document, EditorConfig, EditorError, EditorResult, ImagePayload, LeafData,
    StyleState,
};

/// Initialize the WASM module.
#[wasm_bindgen(start)]
pub fn init() {
    // Set up panic hook for better error messages
    console_error_panic_hook::set_once();
}

/// Storage backed by the browser's `window.localStorage`.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    inner: web_sys::Storage,
}

impl LocalStorage {
    /// Open the window's local storage.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::Storage`] outside a browser window or when
    /// storage is disabled.
    pub fn open() -> EditorResult<Self> {
        let window =
            web_sys::window().ok_or_else(|| EditorError::Storage("no window".to_string()))?;
        let inner = window
            .local_storage()
            .map_err(js_error)?
            .ok_or_else(|| EditorError::Storage("localStorage unavailable".to_string()))?;
        Ok(Self { inner })
    }
}

impl KeyValueStorage for LocalStorage {
    fn get(&self, key: &str) -> EditorResult<Option<String>> {
        self.inner.get_item(key).map_err(js_error)
    }

    fn set(&self, key: &str, value: &str) -> EditorResult<()> {
        // Throws QuotaExceededError when the document does not fit.
        self.inner.set_item(key, value).map_err(js_error)
    }

    fn remove(&self, key: &str) -> EditorResult<()> {
        self.inner.remove_item(key).map_err(js_error)
    }
}

fn js_error(value: JsValue) -> EditorError {
    EditorError::Storage(
        value
            .as_string()
            .unwrap_or_else(|| format!("{value:?}")),
    )
}

/// Editor instance for WASM.
#[wasm_bindgen]
pub struct WasmEditor {
    document: Document,
    storage: Box<dyn KeyValueStorage>,
}

#[wasm_bindgen]
impl WasmEditor {
    /// Create an editor saving to `localStorage`.
    ///
    /// # Errors
    ///
    /// Returns an error string if local storage is unavailable.
    #[wasm_bindgen(constructor)]
    pub fn new() -> Result<WasmEditor, String> {
        let storage = LocalStorage::open().map_err(|e| e.to_string())?;
        Ok(Self::with_storage(EditorConfig::default(), Box::new(storage)))
    }

    /// Append a text block and return it as JSON.
    #[wasm_bindgen(js_name = addText)]
    pub fn add_text(&mut self) -> String {
        let block = self.document.add_text();
        serde_json::to_string(&block).unwrap_or_default()
    }

    /// Append an image block from a file reader's data URI.
    ///
    /// # Errors
    ///
    /// Returns an error string if the data URI is unusable or too large.
    #[wasm_bindgen(js_name = addImage)]
    pub fn add_image(&mut self, data_uri: &str) -> Result<String, String> {
        let payload = ImagePayload::from_data_uri(data_uri).map_err(|e| e.to_string())?;
        let block = self
            .document
            .add_image(&payload)
            .map_err(|e| e.to_string())?;
        serde_json::to_string(&block).map_err(|e| e.to_string())
    }

    /// Swap the image of an image block.
    ///
    /// # Errors
    ///
    /// Returns an error string if the block is unknown or the image unusable.
    #[wasm_bindgen(js_name = replaceImage)]
    pub fn replace_image(&mut self, id: &str, data_uri: &str) -> Result<(), String> {
        let id = parse_id(id)?;
        let payload = ImagePayload::from_data_uri(data_uri).map_err(|e| e.to_string())?;
        self.document
            .replace_image(id, &payload)
            .map(|_| ())
            .map_err(|e| e.to_string())
    }

    /// Delete a block. Returns whether it existed.
    ///
    /// # Errors
    ///
    /// Returns an error string if `id` is not a block id.
    #[wasm_bindgen(js_name = deleteItem)]
    pub fn delete_item(&mut self, id: &str) -> Result<bool, String> {
        Ok(self.document.delete_item(parse_id(id)?).is_some())
    }

    /// Record focus on a block.
    ///
    /// # Errors
    ///
    /// Returns an error string if the block is unknown.
    #[wasm_bindgen(js_name = onFocus)]
    pub fn on_focus(&mut self, id: &str) -> Result<(), String> {
        self.document
            .on_focus(parse_id(id)?)
            .map_err(|e| e.to_string())
    }

    /// Replace a block's style from a JSON `StyleState`.
    ///
    /// # Errors
    ///
    /// Returns an error string if the JSON or the block is invalid.
    #[wasm_bindgen(js_name = setStyle)]
    pub fn set_style(&mut self, id: &str, style_json: &str) -> Result<(), String> {
        let id = parse_id(id)?;
        let style: StyleState = serde_json::from_str(style_json).map_err(|e| e.to_string())?;
        self.document
            .on_style_changed(id, style)
            .map_err(|e| e.to_string())
    }

    /// Apply a layout change from the grid widget.
    ///
    /// # Errors
    ///
    /// Returns an error string if the block is unknown or the size is zero.
    #[wasm_bindgen(js_name = updateLayout)]
    pub fn update_layout(
        &mut self,
        id: &str,
        x: u32,
        y: u32,
        cols: u32,
        rows: u32,
    ) -> Result<(), String> {
        self.document
            .update_layout(parse_id(id)?, x, y, cols, rows)
            .map_err(|e| e.to_string())
    }

    /// Current document as snapshot JSON.
    #[wasm_bindgen(js_name = getSnapshotJson)]
    #[must_use]
    pub fn get_snapshot_json(&self) -> String {
        self.document.snapshot().to_json().unwrap_or_default()
    }

    /// Save with leaf data collected by the host.
    ///
    /// # Errors
    ///
    /// Returns an error string if the leaf JSON is invalid or storage fails.
    pub fn save(&mut self, leaf_json: &str) -> Result<(), String> {
        let leaf: LeafData = if leaf_json.trim().is_empty() {
            LeafData::default()
        } else {
            serde_json::from_str(leaf_json).map_err(|e| e.to_string())?
        };
        self.document
            .save(self.storage.as_ref(), &leaf)
            .map(|_| ())
            .map_err(|e| e.to_string())
    }

    /// Restore the saved document and return the push plan as JSON.
    ///
    /// # Errors
    ///
    /// Returns an error string if nothing is saved or the record is corrupt.
    pub fn restore(&mut self) -> Result<String, String> {
        let plan = self
            .document
            .restore(self.storage.as_ref())
            .map_err(|e| e.to_string())?;
        serde_json::to_string(&plan).map_err(|e| e.to_string())
    }

    /// Remove the saved document and clear the editor.
    ///
    /// # Errors
    ///
    /// Returns an error string if storage fails.
    pub fn discard(&mut self) -> Result<(), String> {
        self.document
            .discard(self.storage.as_ref())
            .map_err(|e| e.to_string())
    }
}

impl WasmEditor {
    /// Create an editor over any storage backend.
    #[must_use]
    pub fn with_storage(config: EditorConfig, storage: Box<dyn KeyValueStorage>) -> Self {
        Self {
            document: Document::new(config),
            storage,
        }
    }
}

fn parse_id(raw: &str) -> Result<BlockId, String> {
    raw.trim()
        .parse()
        .map_err(|_| format!("invalid block id: {raw}"))
}
