//! # Surface Synchronisation Bus
//!
//! Typed request/broadcast protocol between the document engine and the
//! display surfaces that hold rendered state (editable HTML, inline styles,
//! image hyperlinks).
//!
//! ## Messages
//!
//! - `RequestLeafData`: every mounted surface answers on the reply channel
//!   with its content, style and link.
//! - `RestoreStyles`: surfaces reapply saved content and style to themselves.
//! - `RestoreLinks`: image surfaces re-render their hyperlink annotations.
//!
//! ## Readiness
//!
//! A surface is mounted from the moment [`SyncBus::mount`] returns its
//! [`SurfaceHandle`] until the handle is dropped. Restores wait on that set
//! instead of a fixed delay, so phase 2 never runs before phase 1's surfaces
//! exist.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc, watch};

use crate::{BlockId, EditorConfig, EditorError, StyleState};

/// Buffered bus messages per surface before it starts lagging.
const BUS_CAPACITY: usize = 64;

/// State a surface holds for its block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LeafState {
    /// Rendered rich-text content.
    pub content: Option<String>,
    /// Style as currently applied to the surface.
    pub style: Option<StyleState>,
    /// Hyperlink annotation.
    pub link: Option<String>,
}

/// A surface's answer to a leaf-data request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafReport {
    /// Block the surface renders.
    pub id: BlockId,
    /// What it holds.
    pub state: LeafState,
}

/// Leaf state gathered from surfaces, keyed by block id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LeafData {
    /// Rich-text content by id.
    pub content_by_id: BTreeMap<BlockId, String>,
    /// Style records by id.
    pub style_by_id: BTreeMap<BlockId, StyleState>,
    /// Hyperlinks by id.
    pub link_by_id: BTreeMap<BlockId, String>,
}

impl LeafData {
    /// Fold one surface report in. Later reports for the same id win.
    pub fn absorb(&mut self, report: LeafReport) {
        let LeafReport { id, state } = report;
        if let Some(content) = state.content {
            self.content_by_id.insert(id, content);
        }
        if let Some(style) = state.style {
            self.style_by_id.insert(id, style);
        }
        if let Some(link) = state.link {
            self.link_by_id.insert(id, link);
        }
    }

    /// Whether nothing was collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.content_by_id.is_empty() && self.style_by_id.is_empty() && self.link_by_id.is_empty()
    }

    /// Keep only entries for `ids`.
    #[must_use]
    pub fn restricted_to(&self, ids: &BTreeSet<BlockId>) -> Self {
        Self {
            content_by_id: filter_keys(&self.content_by_id, ids),
            style_by_id: filter_keys(&self.style_by_id, ids),
            link_by_id: filter_keys(&self.link_by_id, ids),
        }
    }
}

fn filter_keys<V: Clone>(
    map: &BTreeMap<BlockId, V>,
    ids: &BTreeSet<BlockId>,
) -> BTreeMap<BlockId, V> {
    map.iter()
        .filter(|(id, _)| ids.contains(id))
        .map(|(id, value)| (*id, value.clone()))
        .collect()
}

/// Messages broadcast to every mounted surface.
#[derive(Debug, Clone)]
pub enum BusMessage {
    /// Report current state on `reply`.
    RequestLeafData {
        /// Where to send the [`LeafReport`].
        reply: mpsc::UnboundedSender<LeafReport>,
    },
    /// Reapply saved content and style.
    RestoreStyles {
        /// Saved content and styles.
        data: Arc<LeafData>,
        /// Blocks addressed by this push.
        ids: Arc<BTreeSet<BlockId>>,
    },
    /// Re-render saved hyperlinks.
    RestoreLinks {
        /// Links by id.
        links: Arc<BTreeMap<BlockId, String>>,
    },
}

/// A display surface that holds state the engine does not mirror.
pub trait LeafSurface {
    /// Current content, style and link.
    fn leaf_state(&self) -> LeafState;

    /// Reapply saved content and style.
    fn restore_state(&mut self, content: Option<&str>, style: Option<&StyleState>);

    /// Re-render a saved hyperlink.
    fn restore_link(&mut self, _link: &str) {}
}

/// Phase-2 restore work: what to push once surfaces are mounted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestorePlan {
    /// Blocks rebuilt in phase 1.
    pub ids: Vec<BlockId>,
    /// Saved content, styles and links.
    pub leaf: LeafData,
}

/// Outcome of a push.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PushReport {
    /// Ids with a mounted surface.
    pub delivered: Vec<BlockId>,
    /// Ids skipped because no surface was mounted.
    pub skipped: Vec<BlockId>,
}

impl PushReport {
    fn merge(&mut self, other: Self) {
        for id in other.delivered {
            if !self.delivered.contains(&id) {
                self.delivered.push(id);
            }
        }
        for id in other.skipped {
            if !self.skipped.contains(&id) {
                self.skipped.push(id);
            }
        }
    }
}

type MountTable = watch::Sender<BTreeMap<BlockId, usize>>;

/// Broadcast hub connecting the engine to mounted surfaces.
#[derive(Debug, Clone)]
pub struct SyncBus {
    tx: broadcast::Sender<BusMessage>,
    mounted: Arc<MountTable>,
    timeout: std::time::Duration,
}

impl SyncBus {
    /// Create a bus that waits at most `timeout` for surfaces.
    #[must_use]
    pub fn new(timeout: std::time::Duration) -> Self {
        let (tx, _) = broadcast::channel(BUS_CAPACITY);
        let (mounted, _) = watch::channel(BTreeMap::new());
        Self {
            tx,
            mounted: Arc::new(mounted),
            timeout,
        }
    }

    /// Create a bus using the configured sync timeout.
    #[must_use]
    pub fn from_config(config: &EditorConfig) -> Self {
        Self::new(config.sync_timeout)
    }

    /// Mount a surface for `id`.
    ///
    /// The returned handle subscribes before announcing readiness, so it
    /// sees every message sent after this call returns.
    #[must_use]
    pub fn mount(&self, id: BlockId) -> SurfaceHandle {
        let rx = self.tx.subscribe();
        self.mounted.send_modify(|table| {
            *table.entry(id).or_insert(0) += 1;
        });
        tracing::debug!(id = %id, "Surface mounted");
        SurfaceHandle {
            id,
            rx,
            mounted: Arc::clone(&self.mounted),
        }
    }

    /// Whether a surface for `id` is mounted.
    #[must_use]
    pub fn is_mounted(&self, id: BlockId) -> bool {
        self.mounted.borrow().contains_key(&id)
    }

    /// Ids with a mounted surface.
    #[must_use]
    pub fn mounted_ids(&self) -> BTreeSet<BlockId> {
        self.mounted.borrow().keys().copied().collect()
    }

    /// Wait until every id in `ids` has a mounted surface or the timeout
    /// elapses. Returns the ids still missing.
    pub async fn wait_until_mounted(&self, ids: &[BlockId]) -> Vec<BlockId> {
        let wanted: BTreeSet<BlockId> = ids.iter().copied().collect();
        let mut rx = self.mounted.subscribe();
        let ready = tokio::time::timeout(
            self.timeout,
            rx.wait_for(|table| wanted.iter().all(|id| table.contains_key(id))),
        )
        .await
        .is_ok_and(|result| result.is_ok());
        if ready {
            return Vec::new();
        }
        let mounted = self.mounted_ids();
        let missing: Vec<BlockId> = wanted.difference(&mounted).copied().collect();
        tracing::warn!(
            missing = missing.len(),
            "Surfaces not mounted within {:?}",
            self.timeout
        );
        missing
    }

    /// Ask every mounted surface for its state.
    ///
    /// Waits until each mounted id in `expected` has answered or the
    /// timeout elapses; answers from other surfaces are kept too.
    pub async fn request_leaf_data(&self, expected: &[BlockId]) -> LeafData {
        // Every id read here subscribed before the request goes out.
        let mounted = self.mounted_ids();
        let (reply, mut replies) = mpsc::unbounded_channel();
        if self.tx.send(BusMessage::RequestLeafData { reply }).is_err() {
            tracing::debug!("Leaf data request skipped: no surfaces mounted");
            return LeafData::default();
        }

        let mut pending: BTreeSet<BlockId> = expected
            .iter()
            .copied()
            .filter(|id| mounted.contains(id))
            .collect();
        let mut data = LeafData::default();

        let collected = tokio::time::timeout(self.timeout, async {
            while !pending.is_empty() {
                let Some(report) = replies.recv().await else {
                    break;
                };
                pending.remove(&report.id);
                data.absorb(report);
            }
        })
        .await;

        if collected.is_err() {
            tracing::warn!(
                missing = pending.len(),
                "Leaf data request timed out after {:?}",
                self.timeout
            );
        }
        while let Ok(report) = replies.try_recv() {
            data.absorb(report);
        }
        data
    }

    /// Tell surfaces for `ids` to reapply saved content and style.
    ///
    /// Ids without a mounted surface are skipped.
    #[must_use]
    pub fn push_restored_styles(&self, data: &LeafData, ids: &[BlockId]) -> PushReport {
        let (targets, report) = self.split_targets(ids.iter().copied());
        if targets.is_empty() {
            return report;
        }
        let message = BusMessage::RestoreStyles {
            data: Arc::new(data.restricted_to(&targets)),
            ids: Arc::new(targets),
        };
        self.send(message, report)
    }

    /// Tell image surfaces to re-render saved hyperlinks.
    #[must_use]
    pub fn push_restored_links(&self, links: &BTreeMap<BlockId, String>) -> PushReport {
        let (targets, report) = self.split_targets(links.keys().copied());
        if targets.is_empty() {
            return report;
        }
        let message = BusMessage::RestoreLinks {
            links: Arc::new(filter_keys(links, &targets)),
        };
        self.send(message, report)
    }

    /// Run phase 2 of a restore: wait for surfaces, then push styles and links.
    pub async fn complete_restore(&self, plan: &RestorePlan) -> PushReport {
        let missing = self.wait_until_mounted(&plan.ids).await;
        if !missing.is_empty() {
            tracing::debug!(?missing, "Pushing restore without every surface mounted");
        }
        let mut report = self.push_restored_styles(&plan.leaf, &plan.ids);
        report.merge(self.push_restored_links(&plan.leaf.link_by_id));
        tracing::info!(
            delivered = report.delivered.len(),
            skipped = report.skipped.len(),
            "Restored surface state"
        );
        report
    }

    fn split_targets(
        &self,
        ids: impl Iterator<Item = BlockId>,
    ) -> (BTreeSet<BlockId>, PushReport) {
        let mounted = self.mounted_ids();
        let mut targets = BTreeSet::new();
        let mut report = PushReport::default();
        for id in ids {
            if mounted.contains(&id) {
                targets.insert(id);
                report.delivered.push(id);
            } else {
                tracing::debug!(error = %EditorError::MissingTarget(id), "Skipped push");
                report.skipped.push(id);
            }
        }
        (targets, report)
    }

    fn send(&self, message: BusMessage, mut report: PushReport) -> PushReport {
        if let Err(e) = self.tx.send(message) {
            // Every surface unmounted between the check and the send.
            tracing::debug!("Push skipped: no receivers ({e})");
            report.skipped.append(&mut report.delivered);
        }
        report
    }
}

impl Default for SyncBus {
    fn default() -> Self {
        Self::from_config(&EditorConfig::default())
    }
}

/// A mounted surface's end of the bus. Dropping it unmounts the surface.
#[derive(Debug)]
pub struct SurfaceHandle {
    id: BlockId,
    rx: broadcast::Receiver<BusMessage>,
    mounted: Arc<MountTable>,
}

impl SurfaceHandle {
    /// Block this surface renders.
    #[must_use]
    pub const fn id(&self) -> BlockId {
        self.id
    }

    /// Handle every message already queued, without waiting.
    ///
    /// Returns the number of messages handled.
    pub fn pump<S: LeafSurface + ?Sized>(&mut self, surface: &mut S) -> usize {
        let mut handled = 0;
        loop {
            match self.rx.try_recv() {
                Ok(message) => {
                    dispatch(self.id, &message, surface);
                    handled += 1;
                }
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    tracing::warn!(id = %self.id, "Surface lagged by {n} messages");
                }
                Err(
                    broadcast::error::TryRecvError::Empty | broadcast::error::TryRecvError::Closed,
                ) => return handled,
            }
        }
    }

    /// Serve messages until the bus is dropped.
    ///
    /// The lock is only held while a message is handled, so the owner can
    /// keep editing the surface between messages.
    pub async fn run<S: LeafSurface + Send>(mut self, surface: Arc<Mutex<S>>) {
        loop {
            match self.rx.recv().await {
                Ok(message) => {
                    let mut guard = surface
                        .lock()
                        .unwrap_or_else(std::sync::PoisonError::into_inner);
                    dispatch(self.id, &message, &mut *guard);
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(id = %self.id, "Surface lagged by {n} messages");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::debug!(id = %self.id, "Bus closed, surface stopping");
                    return;
                }
            }
        }
    }
}

impl Drop for SurfaceHandle {
    fn drop(&mut self) {
        let id = self.id;
        self.mounted.send_modify(|table| {
            if let Some(count) = table.get_mut(&id) {
                *count -= 1;
                if *count == 0 {
                    table.remove(&id);
                }
            }
        });
        tracing::debug!(id = %id, "Surface unmounted");
    }
}

fn dispatch<S: LeafSurface + ?Sized>(id: BlockId, message: &BusMessage, surface: &mut S) {
    match message {
        BusMessage::RequestLeafData { reply } => {
            let report = LeafReport {
                id,
                state: surface.leaf_state(),
            };
            if reply.send(report).is_err() {
                tracing::debug!(id = %id, "Leaf data reply dropped: requester gone");
            }
        }
        BusMessage::RestoreStyles { data, ids } => {
            if ids.contains(&id) {
                surface.restore_state(
                    data.content_by_id.get(&id).map(String::as_str),
                    data.style_by_id.get(&id),
                );
            }
        }
        BusMessage::RestoreLinks { links } => {
            if let Some(link) = links.get(&id) {
                surface.restore_link(link);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FontWeight, TextSurface};
    use std::time::Duration;

    fn id(raw: u64) -> BlockId {
        BlockId::from_raw(raw)
    }

    #[test]
    fn test_mount_and_unmount() {
        let bus = SyncBus::default();
        let first = bus.mount(id(1));
        let second = bus.mount(id(1));
        assert!(bus.is_mounted(id(1)));
        drop(first);
        assert!(bus.is_mounted(id(1)));
        drop(second);
        assert!(!bus.is_mounted(id(1)));
    }

    #[test]
    fn test_push_skips_unmounted_surfaces() {
        let bus = SyncBus::default();
        let mut handle = bus.mount(id(1));
        let mut surface = TextSurface::new();

        let mut data = LeafData::default();
        data.content_by_id.insert(id(1), "<p>one</p>".to_string());
        data.content_by_id.insert(id(2), "<p>two</p>".to_string());

        let report = bus.push_restored_styles(&data, &[id(1), id(2)]);
        assert_eq!(report.delivered, vec![id(1)]);
        assert_eq!(report.skipped, vec![id(2)]);

        assert_eq!(handle.pump(&mut surface), 1);
        assert_eq!(surface.html(), "<p>one</p>");
    }

    #[test]
    fn test_push_with_no_surfaces() {
        let bus = SyncBus::default();
        let report = bus.push_restored_links(&BTreeMap::from([(id(4), "https://x".to_string())]));
        assert!(report.delivered.is_empty());
        assert_eq!(report.skipped, vec![id(4)]);
    }

    #[tokio::test]
    async fn test_request_collects_from_running_surfaces() {
        let bus = SyncBus::new(Duration::from_secs(5));
        let surface = Arc::new(Mutex::new(TextSurface::with_html("<b>hi</b>")));
        tokio::spawn(bus.mount(id(1)).run(Arc::clone(&surface)));

        let data = bus.request_leaf_data(&[id(1)]).await;
        assert_eq!(
            data.content_by_id.get(&id(1)).map(String::as_str),
            Some("<b>hi</b>")
        );
        assert!(!data.style_by_id.contains_key(&id(1)));
    }

    #[tokio::test]
    async fn test_request_ignores_surfaces_mounted_after_sending() {
        let bus = SyncBus::new(Duration::from_secs(5));
        let first = Arc::new(Mutex::new(TextSurface::with_html("one")));
        let runner = tokio::spawn(bus.mount(id(1)).run(Arc::clone(&first)));

        let late_bus = bus.clone();
        let late = tokio::spawn(async move {
            let surface = Arc::new(Mutex::new(TextSurface::with_html("two")));
            late_bus.mount(id(2)).run(surface).await;
        });

        let started = tokio::time::Instant::now();
        let data = bus.request_leaf_data(&[id(1), id(2)]).await;
        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(
            data.content_by_id.get(&id(1)).map(String::as_str),
            Some("one")
        );
        runner.abort();
        late.abort();
    }

    #[tokio::test]
    async fn test_request_times_out_on_silent_surface() {
        let bus = SyncBus::new(Duration::from_millis(20));
        // Mounted but never pumped.
        let _silent = bus.mount(id(1));
        let data = bus.request_leaf_data(&[id(1)]).await;
        assert!(data.is_empty());
    }

    #[tokio::test]
    async fn test_request_without_surfaces_returns_immediately() {
        let bus = SyncBus::new(Duration::from_secs(60));
        let data = bus.request_leaf_data(&[id(1)]).await;
        assert!(data.is_empty());
    }

    #[tokio::test]
    async fn test_complete_restore_waits_for_late_mount() {
        let bus = SyncBus::new(Duration::from_secs(5));
        let surface = Arc::new(Mutex::new(TextSurface::new()));

        let mut leaf = LeafData::default();
        leaf.content_by_id.insert(id(7), "restored".to_string());
        leaf.style_by_id.insert(
            id(7),
            StyleState {
                font_weight: FontWeight::Bold,
                ..StyleState::default()
            },
        );
        let plan = RestorePlan {
            ids: vec![id(7)],
            leaf,
        };

        let late_bus = bus.clone();
        let late_surface = Arc::clone(&surface);
        let mounter = tokio::spawn(async move {
            tokio::task::yield_now().await;
            let handle = late_bus.mount(id(7));
            handle.run(late_surface).await;
        });

        let report = bus.complete_restore(&plan).await;
        assert_eq!(report.delivered, vec![id(7)]);

        // Round-trip through the surface proves the push was handled.
        let data = bus.request_leaf_data(&[id(7)]).await;
        assert_eq!(
            data.content_by_id.get(&id(7)).map(String::as_str),
            Some("restored")
        );
        let guard = surface.lock().expect("lock");
        assert_eq!(guard.style().map(|s| s.font_weight), Some(FontWeight::Bold));
        drop(guard);
        mounter.abort();
    }

    #[tokio::test]
    async fn test_wait_until_mounted_reports_missing() {
        let bus = SyncBus::new(Duration::from_millis(20));
        let _one = bus.mount(id(1));
        let missing = bus.wait_until_mounted(&[id(1), id(2)]).await;
        assert_eq!(missing, vec![id(2)]);
    }

    #[test]
    fn test_leaf_data_json_shape() {
        let mut data = LeafData::default();
        data.link_by_id.insert(id(2), "https://x".to_string());
        let json = serde_json::to_value(&data).expect("serialize");
        assert_eq!(json["linkById"]["2"], "https://x");
        assert!(json["contentById"].as_object().is_some_and(serde_json::Map::is_empty));
    }
}
