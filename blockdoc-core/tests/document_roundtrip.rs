//! Document Persistence Integration Tests
//!
//! Tests save and restore through the public API:
//! - Round-trip fidelity of blocks, styles and images
//! - Cascading deletes
//! - Corrupt and missing records
//! - The image size ceiling
//! - File-backed storage

use std::collections::BTreeMap;

use blockdoc_core::{
    Block, BlockId, BlockKind, Document, DocumentSnapshot, EditorConfig, EditorError,
    FileStorage, FontWeight, GridPosition, ImageFormat, ImagePayload, KeyValueStorage, LeafData,
    MemoryStorage, StyleState, DEFAULT_STORAGE_KEY, MAX_IMAGE_BYTES,
};

/// Two-block document: bold text with id 1 and an image with id 2.
fn sample_snapshot() -> DocumentSnapshot {
    let mut text = Block::new(
        BlockId::from_raw(1),
        BlockKind::Text,
        GridPosition { x: 0, y: 0 },
        1,
        1,
    );
    text.content = Some("<b>hi</b>".to_string());
    let image = Block::new(
        BlockId::from_raw(2),
        BlockKind::Image,
        GridPosition { x: 1, y: 0 },
        2,
        2,
    );
    let payload = ImagePayload::new(ImageFormat::Png, b"\x89PNG".to_vec());

    DocumentSnapshot {
        grid_items: vec![text, image],
        image_urls: BTreeMap::from([(BlockId::from_raw(2), payload.to_data_uri())]),
        image_links: BTreeMap::new(),
        text_contents: BTreeMap::from([(BlockId::from_raw(1), "<b>hi</b>".to_string())]),
        text_styles: BTreeMap::from([(
            BlockId::from_raw(1),
            StyleState {
                font_weight: FontWeight::Bold,
                ..StyleState::default()
            },
        )]),
    }
}

fn sample_document() -> Document {
    let mut doc = Document::default();
    doc.apply_snapshot(sample_snapshot());
    doc
}

// ============================================================================
// Round Trip Tests
// ============================================================================

#[test]
fn test_restore_reproduces_saved_document() {
    let storage = MemoryStorage::new();
    let mut doc = sample_document();
    doc.save(&storage, &LeafData::default()).expect("save");

    let mut restored = Document::default();
    restored.restore(&storage).expect("restore");

    assert_eq!(restored.items().blocks(), doc.items().blocks());
    assert_eq!(restored.styles().states(), doc.styles().states());
    assert_eq!(restored.images(), doc.images());
    assert_eq!(restored.snapshot(), sample_snapshot());
}

#[test]
fn test_stored_payload_shape() {
    let storage = MemoryStorage::new();
    let mut doc = sample_document();
    doc.save(&storage, &LeafData::default()).expect("save");

    let raw = storage
        .get(DEFAULT_STORAGE_KEY)
        .expect("get")
        .expect("stored record");
    let json: serde_json::Value = serde_json::from_str(&raw).expect("json");
    assert_eq!(json["gridItems"][0]["type"], "text");
    assert_eq!(json["gridItems"][1]["type"], "image");
    assert_eq!(json["gridItems"][1]["cols"], 2);
    assert_eq!(json["textContents"]["1"], "<b>hi</b>");
    assert_eq!(json["textStyles"]["1"]["fontWeight"], "bold");
    assert_eq!(json["textStyles"]["1"]["fontSize"], "medium");
    assert!(json["imageUrls"]["2"]
        .as_str()
        .is_some_and(|uri| uri.starts_with("data:image/png;base64,")));
}

#[test]
fn test_save_overwrites_previous_record() {
    let storage = MemoryStorage::new();
    let mut doc = sample_document();
    doc.save(&storage, &LeafData::default()).expect("first save");
    doc.add_text();
    doc.save(&storage, &LeafData::default()).expect("second save");

    let mut restored = Document::default();
    let plan = restored.restore(&storage).expect("restore");
    assert_eq!(plan.ids.len(), 3);
}

#[test]
fn test_new_blocks_after_restore_get_fresh_ids() {
    let storage = MemoryStorage::new();
    sample_document()
        .save(&storage, &LeafData::default())
        .expect("save");

    let mut doc = Document::default();
    doc.restore(&storage).expect("restore");
    let added = doc.add_text();
    assert!(added.id > BlockId::from_raw(2));
    assert_eq!(added.position(), GridPosition { x: 3, y: 0 });
}

// ============================================================================
// Cascade Delete Tests
// ============================================================================

#[test]
fn test_delete_cascades_through_save() {
    let storage = MemoryStorage::new();
    let mut doc = sample_document();
    let image_id = BlockId::from_raw(2);
    doc.on_style_changed(image_id, StyleState::default())
        .expect("style");

    doc.delete_item(image_id).expect("deleted");
    assert!(doc.styles().get(image_id).is_none());
    assert!(doc.images().get(image_id).is_none());

    doc.save(&storage, &LeafData::default()).expect("save");
    let mut restored = Document::default();
    restored.restore(&storage).expect("restore");
    assert!(!restored.items().contains(image_id));
    assert!(restored.images().get(image_id).is_none());
    assert!(restored.styles().get(image_id).is_none());
}

// ============================================================================
// Failure Tests
// ============================================================================

#[test]
fn test_corrupt_restore_leaves_document_untouched() {
    let storage = MemoryStorage::new();
    let mut doc = sample_document();
    let before = doc.snapshot();

    for payload in [
        "not json",
        r#"{"gridItems": 5}"#,
        r#"{"gridItems":[{"id":1,"x":0,"y":0,"cols":1,"rows":1,"type":"text"},{"id":1,"x":1,"y":0,"cols":1,"rows":1,"type":"text"}]}"#,
        r#"{"gridItems":[],"textStyles":{"9":{}}}"#,
    ] {
        storage.set(DEFAULT_STORAGE_KEY, payload).expect("set");
        assert!(
            matches!(doc.restore(&storage), Err(EditorError::Corrupt(_))),
            "accepted {payload}"
        );
        assert_eq!(doc.snapshot(), before);
    }
}

#[test]
fn test_missing_record_is_not_found() {
    let storage = MemoryStorage::new();
    let mut doc = sample_document();
    let before = doc.snapshot();
    assert!(matches!(
        doc.restore(&storage),
        Err(EditorError::SnapshotNotFound(_))
    ));
    assert_eq!(doc.snapshot(), before);
}

#[test]
fn test_image_size_ceiling() {
    let mut doc = Document::default();
    let exact = ImagePayload::new(ImageFormat::Jpeg, vec![0; MAX_IMAGE_BYTES]);
    assert!(doc.add_image(&exact).is_ok());

    let before = doc.items().clone();
    let over = ImagePayload::new(ImageFormat::Jpeg, vec![0; MAX_IMAGE_BYTES + 1]);
    assert!(matches!(
        doc.add_image(&over),
        Err(EditorError::FileTooLarge { .. })
    ));
    assert_eq!(doc.items(), &before);
}

// ============================================================================
// Storage Backend Tests
// ============================================================================

#[test]
fn test_file_storage_round_trip_with_custom_key() {
    let dir = tempfile::tempdir().expect("tempdir");
    let storage = FileStorage::open(dir.path()).expect("open");
    let config = EditorConfig::default().with_storage_key("notes/today");

    let mut doc = Document::new(config.clone());
    doc.apply_snapshot(sample_snapshot());
    doc.save(&storage, &LeafData::default()).expect("save");
    assert!(storage.path_for("notes/today").exists());

    let mut restored = Document::new(config);
    restored.restore(&storage).expect("restore");
    assert_eq!(restored.snapshot(), sample_snapshot());

    // Other keys see nothing.
    let mut other = Document::default();
    assert!(matches!(
        other.restore(&storage),
        Err(EditorError::SnapshotNotFound(_))
    ));
}
