//! Image payloads and the per-block image registry.

use std::collections::BTreeMap;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{BlockId, EditorError, EditorResult};

/// Largest accepted source image, in bytes (5 MiB).
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

/// Supported image formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    /// PNG image.
    Png,
    /// JPEG image.
    Jpeg,
    /// GIF image.
    Gif,
    /// SVG vector image.
    Svg,
    /// WebP image.
    WebP,
}

impl ImageFormat {
    /// MIME type used in the data URI.
    #[must_use]
    pub const fn mime(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Gif => "image/gif",
            Self::Svg => "image/svg+xml",
            Self::WebP => "image/webp",
        }
    }

    /// Guess the format from a file extension.
    #[must_use]
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "png" => Some(Self::Png),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "gif" => Some(Self::Gif),
            "svg" => Some(Self::Svg),
            "webp" => Some(Self::WebP),
            _ => None,
        }
    }
}

/// Raw image bytes waiting to be registered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload {
    /// Source format.
    pub format: ImageFormat,
    /// File contents.
    pub bytes: Vec<u8>,
}

impl ImagePayload {
    /// Create a payload.
    #[must_use]
    pub fn new(format: ImageFormat, bytes: Vec<u8>) -> Self {
        Self { format, bytes }
    }

    /// Source size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the payload has no bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Reject payloads over `limit` bytes. Exactly `limit` is accepted.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::FileTooLarge`] when the payload is too big.
    pub fn check_size(&self, limit: usize) -> EditorResult<()> {
        if self.len() > limit {
            return Err(EditorError::FileTooLarge {
                size: self.len(),
                limit,
            });
        }
        Ok(())
    }

    /// Encode as a `data:` URI.
    #[must_use]
    pub fn to_data_uri(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.format.mime(),
            STANDARD.encode(&self.bytes)
        )
    }

    /// Decode a base64 `data:` URI produced by a file reader.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::InvalidOperation`] if the URI is not base64
    /// image data in a supported format.
    pub fn from_data_uri(uri: &str) -> EditorResult<Self> {
        let invalid = |reason: &str| EditorError::InvalidOperation(format!("{reason}: {uri:.40}"));
        let (header, body) = uri
            .strip_prefix("data:")
            .and_then(|rest| rest.split_once(','))
            .ok_or_else(|| invalid("not a data URI"))?;
        let mime = header
            .strip_suffix(";base64")
            .ok_or_else(|| invalid("data URI is not base64"))?;
        let format = mime
            .strip_prefix("image/")
            .map(|subtype| subtype.trim_end_matches("+xml"))
            .and_then(ImageFormat::from_extension)
            .ok_or_else(|| invalid("unsupported image type"))?;
        let bytes = STANDARD
            .decode(body.trim())
            .map_err(|e| EditorError::InvalidOperation(format!("bad base64 image data: {e}")))?;
        Ok(Self::new(format, bytes))
    }
}

/// Whether `value` looks like a data URI.
#[must_use]
pub fn is_data_uri(value: &str) -> bool {
    value.starts_with("data:") && value.contains(',')
}

/// Prefix `https://` unless the link already carries an http(s) scheme.
#[must_use]
pub fn normalize_link(raw: &str) -> String {
    let raw = raw.trim();
    let has_scheme = Url::parse(raw)
        .map(|url| matches!(url.scheme(), "http" | "https"))
        .unwrap_or(false);
    if has_scheme {
        raw.to_string()
    } else {
        format!("https://{raw}")
    }
}

/// Image data and hyperlink for one block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRecord {
    /// Encoded image.
    pub data_uri: String,
    /// Hyperlink annotation.
    pub link: Option<String>,
}

/// Image records keyed by block id.
///
/// Holds back-references only: removing a block does not touch this map,
/// the caller must cascade.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageRegistry {
    records: BTreeMap<BlockId, ImageRecord>,
}

impl ImageRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store image data for `id`, keeping any existing link.
    pub fn set(&mut self, id: BlockId, data_uri: String) {
        match self.records.get_mut(&id) {
            Some(record) => record.data_uri = data_uri,
            None => {
                self.records.insert(
                    id,
                    ImageRecord {
                        data_uri,
                        link: None,
                    },
                );
            }
        }
    }

    /// Attach a hyperlink to `id`, normalising the scheme.
    ///
    /// An empty link removes the annotation.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::BlockNotFound`] if `id` has no image.
    pub fn set_link(&mut self, id: BlockId, url: &str) -> EditorResult<()> {
        let record = self
            .records
            .get_mut(&id)
            .ok_or(EditorError::BlockNotFound(id))?;
        record.link = if url.trim().is_empty() {
            None
        } else {
            Some(normalize_link(url))
        };
        Ok(())
    }

    /// Remove the record for `id`.
    pub fn delete(&mut self, id: BlockId) -> Option<ImageRecord> {
        self.records.remove(&id)
    }

    /// Record for `id`.
    #[must_use]
    pub fn get(&self, id: BlockId) -> Option<&ImageRecord> {
        self.records.get(&id)
    }

    /// Iterate over all records in id order.
    pub fn iter(&self) -> impl Iterator<Item = (BlockId, &ImageRecord)> {
        self.records.iter().map(|(id, record)| (*id, record))
    }

    /// Data URI of each image, keyed by id.
    #[must_use]
    pub fn data_uris(&self) -> BTreeMap<BlockId, String> {
        self.iter()
            .map(|(id, record)| (id, record.data_uri.clone()))
            .collect()
    }

    /// Links keyed by id, for records that have one.
    #[must_use]
    pub fn links(&self) -> BTreeMap<BlockId, String> {
        self.iter()
            .filter_map(|(id, record)| record.link.clone().map(|link| (id, link)))
            .collect()
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Remove every record.
    pub fn clear(&mut self) {
        self.records.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: u64) -> BlockId {
        BlockId::from_raw(raw)
    }

    #[test]
    fn test_size_ceiling_is_inclusive() {
        let exact = ImagePayload::new(ImageFormat::Png, vec![0; MAX_IMAGE_BYTES]);
        assert!(exact.check_size(MAX_IMAGE_BYTES).is_ok());

        let over = ImagePayload::new(ImageFormat::Png, vec![0; MAX_IMAGE_BYTES + 1]);
        assert!(matches!(
            over.check_size(MAX_IMAGE_BYTES),
            Err(EditorError::FileTooLarge { size, limit })
                if size == MAX_IMAGE_BYTES + 1 && limit == MAX_IMAGE_BYTES
        ));
    }

    #[test]
    fn test_data_uri_encoding() {
        let payload = ImagePayload::new(ImageFormat::Png, b"abc".to_vec());
        assert_eq!(payload.to_data_uri(), "data:image/png;base64,YWJj");
        assert!(is_data_uri(&payload.to_data_uri()));
        assert!(!is_data_uri("https://example.com/a.png"));
    }

    #[test]
    fn test_from_data_uri() {
        let payload = ImagePayload::from_data_uri("data:image/svg+xml;base64,YWJj").expect("svg");
        assert_eq!(payload.format, ImageFormat::Svg);
        assert_eq!(payload.bytes, b"abc");

        for bad in [
            "https://example.com/a.png",
            "data:text/plain;base64,YWJj",
            "data:image/png,abc",
            "data:image/png;base64,!!!",
        ] {
            assert!(
                matches!(
                    ImagePayload::from_data_uri(bad),
                    Err(EditorError::InvalidOperation(_))
                ),
                "accepted {bad}"
            );
        }
    }

    #[test]
    fn test_normalize_link() {
        assert_eq!(normalize_link("example.com/a"), "https://example.com/a");
        assert_eq!(normalize_link("http://example.com"), "http://example.com");
        assert_eq!(normalize_link(" https://x.io/p "), "https://x.io/p");
        assert_eq!(normalize_link("example.com:8080"), "https://example.com:8080");
    }

    #[test]
    fn test_set_keeps_link() {
        let mut registry = ImageRegistry::new();
        registry.set(id(1), "data:image/png;base64,AA==".to_string());
        registry.set_link(id(1), "example.com").expect("link");
        registry.set(id(1), "data:image/png;base64,AQ==".to_string());

        let record = registry.get(id(1)).expect("record");
        assert_eq!(record.data_uri, "data:image/png;base64,AQ==");
        assert_eq!(record.link.as_deref(), Some("https://example.com"));
    }

    #[test]
    fn test_set_link_unknown_block() {
        let mut registry = ImageRegistry::new();
        assert!(matches!(
            registry.set_link(id(4), "example.com"),
            Err(EditorError::BlockNotFound(_))
        ));
    }

    #[test]
    fn test_empty_link_clears_annotation() {
        let mut registry = ImageRegistry::new();
        registry.set(id(1), "data:image/gif;base64,AA==".to_string());
        registry.set_link(id(1), "example.com").expect("link");
        registry.set_link(id(1), "  ").expect("clear");
        assert!(registry.links().is_empty());
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(ImageFormat::from_extension("JPG"), Some(ImageFormat::Jpeg));
        assert_eq!(ImageFormat::from_extension("svg"), Some(ImageFormat::Svg));
        assert_eq!(ImageFormat::from_extension("bmp"), None);
    }
}
