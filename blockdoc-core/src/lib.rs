//! # Blockdoc Core
//!
//! State engine for a block-based document editor: text and image blocks on
//! a packed grid, per-block styles, and a save/restore codec that reconciles
//! the engine with display surfaces holding rendered state.
//! Compiles to WASM for the browser host.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │                  Document                   │
//! ├─────────────────────────────────────────────┤
//! │  ItemStore       │  Satellite maps          │
//! │  - Block ids     │  - StyleStateStore       │
//! │  - Placement     │  - ImageRegistry         │
//! ├─────────────────────────────────────────────┤
//! │  PersistenceCodec│  SyncBus                 │
//! │  - Snapshot JSON │  - Leaf data requests    │
//! │  - Validation    │  - Two-phase restore     │
//! └─────────────────────────────────────────────┘
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod block;
pub mod codec;
pub mod config;
pub mod document;
pub mod error;
pub mod image;
#[cfg(not(target_arch = "wasm32"))]
pub mod ingest;
pub mod items;
pub mod placement;
pub mod storage;
pub mod style;
pub mod surface;
pub mod sync_bus;

#[cfg(feature = "wasm")]
pub mod wasm;

pub use block::{Block, BlockId, BlockKind, GridPosition, IdGenerator, MAX_BLOCK_ID};
pub use codec::{DocumentSnapshot, PersistenceCodec};
pub use config::{EditorConfig, DEFAULT_STORAGE_KEY};
pub use document::{Document, DocumentEvent};
pub use error::{EditorError, EditorResult};
pub use image::{
    normalize_link, ImageFormat, ImagePayload, ImageRecord, ImageRegistry, MAX_IMAGE_BYTES,
};
pub use items::ItemStore;
pub use placement::{PlacementEngine, DEFAULT_ACTIVE_ROW};
pub use storage::{FileStorage, KeyValueStorage, MemoryStorage};
pub use style::{
    Color, FontSize, FontStyle, FontWeight, StyleState, StyleStateStore, TextAlign,
    VerticalAlign,
};
pub use surface::{strip_empty_spans, ImageSurface, TextSurface};
pub use sync_bus::{
    BusMessage, LeafData, LeafReport, LeafState, LeafSurface, PushReport, RestorePlan,
    SurfaceHandle, SyncBus,
};

/// Blockdoc core version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
