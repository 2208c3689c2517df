//! Blocks - the placed units of a document.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Width of the random perturbation added to the time seed.
const ID_JITTER: u64 = 1000;

/// Largest id a browser host can hold exactly in a JS number (2^53 - 1).
pub const MAX_BLOCK_ID: u64 = (1 << 53) - 1;

/// Unique identifier for a block.
///
/// Serialised as a bare integer, and as a string key inside JSON objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockId(u64);

impl BlockId {
    /// Wrap a raw id.
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw integer value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for BlockId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.0, f)
    }
}

impl std::str::FromStr for BlockId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}

/// The type of content a block holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockKind {
    /// Rich-text block.
    Text,
    /// Image block.
    Image,
}

impl std::fmt::Display for BlockKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => f.pad("text"),
            Self::Image => f.pad("image"),
        }
    }
}

/// Grid coordinates of a block's top-left cell.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct GridPosition {
    /// Column index.
    pub x: u32,
    /// Row index.
    pub y: u32,
}

/// A block placed on the grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Unique identifier.
    pub id: BlockId,
    /// Column of the left edge.
    pub x: u32,
    /// Row of the top edge.
    pub y: u32,
    /// Width in grid columns.
    pub cols: u32,
    /// Height in grid rows.
    pub rows: u32,
    /// Content type.
    #[serde(rename = "type")]
    pub kind: BlockKind,
    /// Rich-text payload (text blocks only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl Block {
    /// Create a block at the given position.
    ///
    /// Text blocks start with empty content, image blocks with none.
    #[must_use]
    pub fn new(id: BlockId, kind: BlockKind, at: GridPosition, cols: u32, rows: u32) -> Self {
        let content = match kind {
            BlockKind::Text => Some(String::new()),
            BlockKind::Image => None,
        };
        Self {
            id,
            x: at.x,
            y: at.y,
            cols,
            rows,
            kind,
            content,
        }
    }

    /// Column just past the right edge.
    #[must_use]
    pub fn right_edge(&self) -> u32 {
        self.x.saturating_add(self.cols)
    }

    /// Whether any cell of this block lies in `row`.
    #[must_use]
    pub fn occupies_row(&self, row: u32) -> bool {
        self.y <= row && row < self.y.saturating_add(self.rows)
    }

    /// Top-left position.
    #[must_use]
    pub const fn position(&self) -> GridPosition {
        GridPosition {
            x: self.x,
            y: self.y,
        }
    }
}

/// Issues block ids from a millisecond time seed plus random jitter.
///
/// Ids are strictly increasing for one generator, so rapid successive calls
/// within the same millisecond never collide. Ids never exceed
/// [`MAX_BLOCK_ID`]; once the ceiling is reached the search wraps to the
/// lowest free id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdGenerator {
    last: u64,
}

impl IdGenerator {
    /// Create a generator with no issued ids.
    #[must_use]
    pub const fn new() -> Self {
        Self { last: 0 }
    }

    /// Make sure future ids are greater than `id`.
    pub fn observe(&mut self, id: BlockId) {
        self.last = self.last.max(id.get());
    }

    /// Issue a fresh id that `taken` does not report as in use.
    pub fn next_id(&mut self, taken: impl Fn(BlockId) -> bool) -> BlockId {
        let seed = current_timestamp_ms().saturating_mul(ID_JITTER);
        let jitter = u64::try_from(Uuid::new_v4().as_u128() % u128::from(ID_JITTER)).unwrap_or(0);
        let start = seed.saturating_add(jitter).max(self.last.saturating_add(1));
        let mut candidate = if start > MAX_BLOCK_ID { 1 } else { start };
        while taken(BlockId(candidate)) {
            candidate = match candidate.checked_add(1) {
                Some(next) if next <= MAX_BLOCK_ID => next,
                _ => 1,
            };
        }
        self.last = candidate;
        BlockId(candidate)
    }
}

/// Get the current Unix timestamp in milliseconds.
#[cfg(all(feature = "wasm", target_arch = "wasm32"))]
pub(crate) fn current_timestamp_ms() -> u64 {
    // SystemTime is unavailable on wasm32-unknown-unknown.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    {
        js_sys::Date::now() as u64
    }
}

/// Get the current Unix timestamp in milliseconds.
#[cfg(not(all(feature = "wasm", target_arch = "wasm32")))]
pub(crate) fn current_timestamp_ms() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};

    SystemTime::now().duration_since(UNIX_EPOCH).map_or(0, |d| {
        // Timestamp will not exceed u64 max for millennia
        #[allow(clippy::cast_possible_truncation)]
        {
            d.as_millis() as u64
        }
    })
}
