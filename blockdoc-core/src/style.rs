//! Per-block style state.
//!
//! A [`StyleState`] is the serialisable visual record for a block. The
//! [`StyleStateStore`] creates one lazily the first time a block is focused,
//! replaces it wholesale on every style change and drops it when the block
//! is deleted. Blocks without a record render with [`StyleState::default`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{BlockId, EditorError};

/// Font weight.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontWeight {
    /// Regular weight.
    #[default]
    Normal,
    /// Bold weight.
    Bold,
}

/// Font style.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontStyle {
    /// Upright.
    #[default]
    Normal,
    /// Italic.
    Italic,
}

/// Named font size.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontSize {
    /// 12px.
    Small,
    /// 16px.
    #[default]
    Medium,
    /// 24px.
    Large,
    /// 32px.
    Xlarge,
}

impl FontSize {
    /// All sizes, smallest first.
    pub const ALL: [Self; 4] = [Self::Small, Self::Medium, Self::Large, Self::Xlarge];

    /// CSS pixel value.
    #[must_use]
    pub const fn css_px(self) -> &'static str {
        match self {
            Self::Small => "12px",
            Self::Medium => "16px",
            Self::Large => "24px",
            Self::Xlarge => "32px",
        }
    }

    /// Map a pixel string back to a named size. Unknown sizes read as medium.
    #[must_use]
    pub fn from_css_px(px: &str) -> Self {
        let px = px.trim();
        Self::ALL
            .into_iter()
            .find(|size| size.css_px() == px)
            .unwrap_or_default()
    }
}

impl std::str::FromStr for FontSize {
    type Err = EditorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "small" => Ok(Self::Small),
            "medium" => Ok(Self::Medium),
            "large" => Ok(Self::Large),
            "xlarge" => Ok(Self::Xlarge),
            other => Err(EditorError::InvalidOperation(format!(
                "unknown font size: {other}"
            ))),
        }
    }
}

/// Horizontal text alignment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextAlign {
    /// Left aligned.
    #[default]
    Left,
    /// Centered.
    Center,
    /// Right aligned.
    Right,
}

impl TextAlign {
    /// CSS `text-align` value.
    #[must_use]
    pub const fn css(self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Center => "center",
            Self::Right => "right",
        }
    }
}

impl std::str::FromStr for TextAlign {
    type Err = EditorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "left" => Ok(Self::Left),
            "center" => Ok(Self::Center),
            "right" => Ok(Self::Right),
            other => Err(EditorError::InvalidOperation(format!(
                "unknown text alignment: {other}"
            ))),
        }
    }
}

/// Vertical alignment of content inside the block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerticalAlign {
    /// Content at the top.
    #[default]
    Top,
    /// Content centered.
    Middle,
    /// Content at the bottom.
    Bottom,
}

impl VerticalAlign {
    /// Flexbox `justify-content` value for a column layout.
    #[must_use]
    pub const fn flex_justify(self) -> &'static str {
        match self {
            Self::Top => "flex-start",
            Self::Middle => "center",
            Self::Bottom => "flex-end",
        }
    }
}

impl std::str::FromStr for VerticalAlign {
    type Err = EditorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "top" => Ok(Self::Top),
            "middle" => Ok(Self::Middle),
            "bottom" => Ok(Self::Bottom),
            other => Err(EditorError::InvalidOperation(format!(
                "unknown vertical alignment: {other}"
            ))),
        }
    }
}

/// An RGB colour, stored as lower-case `#rrggbb`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color(String);

impl Color {
    /// Parse `#rrggbb`, `#rgb`, `rgb(r, g, b)` or `rgba(r, g, b, a)`.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::InvalidColor`] for anything else.
    pub fn parse(raw: &str) -> Result<Self, EditorError> {
        let value = raw.trim().to_ascii_lowercase();
        if let Some(hex) = value.strip_prefix('#') {
            if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(EditorError::InvalidColor(raw.to_string()));
            }
            return match hex.len() {
                6 => Ok(Self(value)),
                3 => Ok(Self(hex.chars().fold(String::from("#"), |mut out, c| {
                    out.push(c);
                    out.push(c);
                    out
                }))),
                _ => Err(EditorError::InvalidColor(raw.to_string())),
            };
        }
        let inner = value
            .strip_prefix("rgba(")
            .or_else(|| value.strip_prefix("rgb("))
            .and_then(|rest| rest.strip_suffix(')'))
            .ok_or_else(|| EditorError::InvalidColor(raw.to_string()))?;
        let parts: Vec<&str> = inner.split(',').map(str::trim).collect();
        if !(3..=4).contains(&parts.len()) {
            return Err(EditorError::InvalidColor(raw.to_string()));
        }
        let mut hex = String::from("#");
        for part in &parts[..3] {
            let channel: u8 = part
                .parse()
                .map_err(|_| EditorError::InvalidColor(raw.to_string()))?;
            hex.push_str(&format!("{channel:02x}"));
        }
        Ok(Self(hex))
    }

    /// The `#rrggbb` form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn fixed(hex: &str) -> Self {
        Self(hex.to_string())
    }
}

impl TryFrom<String> for Color {
    type Error = EditorError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.0
    }
}

impl std::fmt::Display for Color {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The visual style record of one block.
///
/// Missing fields in stored records fall back to the defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StyleState {
    /// Font weight.
    pub font_weight: FontWeight,
    /// Font style.
    pub font_style: FontStyle,
    /// Font size.
    pub font_size: FontSize,
    /// Horizontal alignment.
    pub text_align: TextAlign,
    /// Vertical alignment.
    pub vertical_align: VerticalAlign,
    /// Text colour.
    pub color: Color,
    /// Fill colour of the block.
    pub background_color: Color,
    /// Border colour of the block.
    pub border_color: Color,
    /// Hyperlink target for the block, empty when unlinked.
    pub link: String,
    /// Set when the block has been marked for deletion.
    pub deleted: bool,
}

impl Default for StyleState {
    fn default() -> Self {
        Self {
            font_weight: FontWeight::Normal,
            font_style: FontStyle::Normal,
            font_size: FontSize::Medium,
            text_align: TextAlign::Left,
            vertical_align: VerticalAlign::Top,
            color: Color::fixed("#000000"),
            background_color: Color::fixed("#ffffff"),
            border_color: Color::fixed("#cccccc"),
            link: String::new(),
            deleted: false,
        }
    }
}

impl StyleState {
    /// Inline CSS for the block container.
    ///
    /// Weight, style, size and colour of the text itself live in the
    /// surface's inline markup, not on the container.
    #[must_use]
    pub fn container_css(&self) -> String {
        format!(
            "text-align: {}; background-color: {}; border: 1px solid {}; \
             display: flex; flex-direction: column; justify-content: {};",
            self.text_align.css(),
            self.background_color,
            self.border_color,
            self.vertical_align.flex_justify(),
        )
    }
}

/// Style records keyed by block id, plus the focused block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StyleStateStore {
    states: BTreeMap<BlockId, StyleState>,
    focused: Option<BlockId>,
}

impl StyleStateStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A block's surface gained focus.
    ///
    /// Focus moves to `id`; a default record is created if none exists.
    pub fn on_focus(&mut self, id: BlockId) {
        self.focused = Some(id);
        self.states.entry(id).or_insert_with(|| {
            tracing::debug!(id = %id, "Initialised default style state");
            StyleState::default()
        });
    }

    /// A block's surface lost focus.
    ///
    /// Only clears focus if it still points at `id`, so a late blur from the
    /// previous block does not undo a newer focus.
    pub fn on_blur(&mut self, id: BlockId) {
        if self.focused == Some(id) {
            self.focused = None;
        }
    }

    /// Replace the full record for `id`.
    pub fn on_style_changed(&mut self, id: BlockId, state: StyleState) {
        self.states.insert(id, state);
    }

    /// Drop the record for `id` and release focus if it held it.
    pub fn clean_up(&mut self, id: BlockId) -> Option<StyleState> {
        if self.focused == Some(id) {
            self.focused = None;
        }
        self.states.remove(&id)
    }

    /// Stored record for `id`, if any.
    #[must_use]
    pub fn get(&self, id: BlockId) -> Option<&StyleState> {
        self.states.get(&id)
    }

    /// Record for `id`, or the defaults when none is stored.
    #[must_use]
    pub fn effective(&self, id: BlockId) -> StyleState {
        self.states.get(&id).cloned().unwrap_or_default()
    }

    /// Currently focused block.
    #[must_use]
    pub const fn focused(&self) -> Option<BlockId> {
        self.focused
    }

    /// All stored records.
    #[must_use]
    pub fn states(&self) -> &BTreeMap<BlockId, StyleState> {
        &self.states
    }

    /// Replace every record and clear focus.
    pub fn replace_all(&mut self, states: BTreeMap<BlockId, StyleState>) {
        self.states = states;
        self.focused = None;
    }

    /// Number of stored records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Whether no records are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}
