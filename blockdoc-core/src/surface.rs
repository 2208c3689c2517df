//! Headless display surfaces.
//!
//! A surface owns what the user sees for one block: editable HTML for text,
//! the hyperlink annotation for images. Hosts embed these (or their own
//! [`LeafSurface`] implementations) and mount them on the [`crate::SyncBus`].

use crate::{LeafState, LeafSurface, StyleState};

const ZERO_WIDTH_SPACE: &str = "\u{200B}";
const SPAN_OPEN: &str = "<span";
const SPAN_CLOSE: &str = "</span>";

/// Editable rich-text surface.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextSurface {
    html: String,
    style: Option<StyleState>,
}

impl TextSurface {
    /// Create an empty, unstyled surface.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a surface showing `html`.
    #[must_use]
    pub fn with_html(html: impl Into<String>) -> Self {
        Self {
            html: html.into(),
            style: None,
        }
    }

    /// Current markup.
    #[must_use]
    pub fn html(&self) -> &str {
        &self.html
    }

    /// Replace the markup, as typing would.
    pub fn set_html(&mut self, html: impl Into<String>) {
        self.html = html.into();
    }

    /// Applied style, if the toolbar or a restore has set one.
    #[must_use]
    pub const fn style(&self) -> Option<&StyleState> {
        self.style.as_ref()
    }

    /// Apply a style from the toolbar.
    pub fn set_style(&mut self, style: StyleState) {
        self.style = Some(style);
    }

    /// The surface lost focus: drop spans left empty by formatting toggles.
    pub fn blur(&mut self) {
        let cleaned = strip_empty_spans(&self.html);
        if cleaned.len() != self.html.len() {
            tracing::trace!(
                removed = self.html.len() - cleaned.len(),
                "Stripped empty spans"
            );
            self.html = cleaned;
        }
    }

    /// Inline CSS for the surface container.
    #[must_use]
    pub fn container_css(&self) -> String {
        self.style
            .as_ref()
            .map_or_else(|| StyleState::default().container_css(), StyleState::container_css)
    }
}

impl LeafSurface for TextSurface {
    fn leaf_state(&self) -> LeafState {
        LeafState {
            content: Some(self.html.clone()),
            style: self.style.clone(),
            link: None,
        }
    }

    fn restore_state(&mut self, content: Option<&str>, style: Option<&StyleState>) {
        if let Some(content) = content {
            self.html = content.to_string();
        }
        if let Some(style) = style {
            self.style = Some(style.clone());
        }
    }
}

/// Image surface: renders the data URI and carries the hyperlink.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageSurface {
    data_uri: String,
    link: Option<String>,
}

impl ImageSurface {
    /// Create a surface showing `data_uri`.
    #[must_use]
    pub fn new(data_uri: impl Into<String>) -> Self {
        Self {
            data_uri: data_uri.into(),
            link: None,
        }
    }

    /// Image being shown.
    #[must_use]
    pub fn data_uri(&self) -> &str {
        &self.data_uri
    }

    /// Swap the image being shown.
    pub fn set_data_uri(&mut self, data_uri: impl Into<String>) {
        self.data_uri = data_uri.into();
    }

    /// Hyperlink annotation.
    #[must_use]
    pub fn link(&self) -> Option<&str> {
        self.link.as_deref()
    }

    /// Set or clear (with an empty string) the hyperlink.
    pub fn set_link(&mut self, link: &str) {
        let link = link.trim();
        self.link = (!link.is_empty()).then(|| link.to_string());
    }
}

impl LeafSurface for ImageSurface {
    fn leaf_state(&self) -> LeafState {
        LeafState {
            content: None,
            style: None,
            // An empty link tells the save path the annotation was cleared.
            link: Some(self.link.clone().unwrap_or_default()),
        }
    }

    fn restore_state(&mut self, _content: Option<&str>, _style: Option<&StyleState>) {}

    fn restore_link(&mut self, link: &str) {
        self.set_link(link);
    }
}

/// Remove `<span>` elements whose text is blank or a lone zero-width space.
///
/// Text is read through nested tags, so `<span><b>\u{200B}</b></span>` is
/// empty too. The scan repeats until nothing changes.
#[must_use]
pub fn strip_empty_spans(html: &str) -> String {
    let mut out = html.to_string();
    while let Some(range) = find_empty_span(&out) {
        out.replace_range(range, "");
    }
    out
}

fn find_empty_span(html: &str) -> Option<std::ops::Range<usize>> {
    let mut from = 0;
    while let Some(start) = next_span_open(html, from) {
        from = start + SPAN_OPEN.len();
        let inner_start = from + html[from..].find('>')? + 1;
        let inner_end = matching_close(html, inner_start)?;
        let text = text_content(&html[inner_start..inner_end]);
        if text.trim().is_empty() || text == ZERO_WIDTH_SPACE {
            return Some(start..inner_end + SPAN_CLOSE.len());
        }
    }
    None
}

/// Offset of the next `<span>` or `<span ...>` tag at or after `from`.
fn next_span_open(html: &str, mut from: usize) -> Option<usize> {
    while let Some(offset) = html[from..].find(SPAN_OPEN) {
        let start = from + offset;
        from = start + SPAN_OPEN.len();
        if html[from..].starts_with(|c: char| c == '>' || c.is_ascii_whitespace()) {
            return Some(start);
        }
    }
    None
}

/// Offset of the `</span>` closing the span whose content starts at `from`.
fn matching_close(html: &str, from: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut at = from;
    loop {
        let close = at + html[at..].find(SPAN_CLOSE)?;
        match next_span_open(html, at) {
            Some(open) if open < close => {
                depth += 1;
                at = open + SPAN_OPEN.len();
            }
            _ if depth == 0 => return Some(close),
            _ => {
                depth -= 1;
                at = close + SPAN_CLOSE.len();
            }
        }
    }
}

/// Markup with every tag removed.
fn text_content(markup: &str) -> String {
    let mut text = String::with_capacity(markup.len());
    let mut in_tag = false;
    for c in markup.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            c if !in_tag => text.push(c),
            _ => {}
        }
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FontStyle;

    #[test]
    fn test_strip_empty_spans() {
        assert_eq!(strip_empty_spans("a<span></span>b"), "ab");
        assert_eq!(
            strip_empty_spans("a<span style=\"font-weight: bold\">  </span>b"),
            "ab"
        );
        assert_eq!(strip_empty_spans("<span>\u{200B}</span>x"), "x");
        assert_eq!(
            strip_empty_spans("<span><span> </span></span>done"),
            "done"
        );
        assert_eq!(
            strip_empty_spans("<span>keep</span><spanner></spanner>"),
            "<span>keep</span><spanner></spanner>"
        );
        assert_eq!(
            strip_empty_spans("<span>\u{200B}x</span>"),
            "<span>\u{200B}x</span>"
        );
    }

    #[test]
    fn test_strip_spans_reads_through_nested_tags() {
        assert_eq!(strip_empty_spans("<span><b>\u{200B}</b></span>x"), "x");
        assert_eq!(
            strip_empty_spans("a<span style=\"color: red\"><i> </i><span></span></span>b"),
            "ab"
        );
        assert_eq!(
            strip_empty_spans("<span><b>hi</b></span>"),
            "<span><b>hi</b></span>"
        );
        assert_eq!(
            strip_empty_spans("<span><span>a</span>\u{200B}</span>"),
            "<span><span>a</span>\u{200B}</span>"
        );
    }

    #[test]
    fn test_blur_cleans_markup() {
        let mut surface = TextSurface::with_html("<b>hi</b><span> </span>");
        surface.blur();
        assert_eq!(surface.html(), "<b>hi</b>");
    }

    #[test]
    fn test_text_restore_is_partial() {
        let mut surface = TextSurface::with_html("old");
        let style = StyleState {
            font_style: FontStyle::Italic,
            ..StyleState::default()
        };
        surface.restore_state(None, Some(&style));
        assert_eq!(surface.html(), "old");
        assert_eq!(surface.style().map(|s| s.font_style), Some(FontStyle::Italic));

        surface.restore_state(Some("new"), None);
        assert_eq!(surface.html(), "new");
        assert_eq!(surface.style().map(|s| s.font_style), Some(FontStyle::Italic));
    }

    #[test]
    fn test_unstyled_surface_reports_no_style() {
        let mut surface = TextSurface::with_html("plain");
        assert!(surface.leaf_state().style.is_none());
        assert_eq!(surface.container_css(), StyleState::default().container_css());

        surface.set_style(StyleState::default());
        assert_eq!(surface.leaf_state().style, Some(StyleState::default()));
    }

    #[test]
    fn test_image_link() {
        let mut surface = ImageSurface::new("data:image/png;base64,YQ==");
        assert_eq!(surface.leaf_state().link.as_deref(), Some(""));
        surface.restore_link("https://example.com");
        assert_eq!(surface.link(), Some("https://example.com"));
        assert_eq!(
            surface.leaf_state().link.as_deref(),
            Some("https://example.com")
        );
        surface.set_link("  ");
        assert!(surface.link().is_none());
        assert_eq!(surface.leaf_state().link.as_deref(), Some(""));
    }
}
