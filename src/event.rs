use crate::engine::RawTranscript;
use crate::error::{ProjectFailure, TranscriptionFailure};
use crate::managers::project::ProjectMeta;
use crate::managers::video::VideoInfo;
use crate::style::Style;
use crate::subtitles::Subtitles;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Application notification with its payload. Payloads are immutable
/// snapshots; subscribers never observe later mutation through them.
#[derive(Debug, Clone)]
pub enum AppEvent {
    VideoChanged(Arc<VideoInfo>),
    EngineReady,
    TranscriptionReady(Arc<RawTranscript>),
    TranscriptionFailed(TranscriptionFailure),
    TranscriptionCancelled,
    SubtitlesChanged(Arc<Subtitles>),
    StyleChanged(Arc<Style>),
    StyleLoaded(Arc<Style>),
    ProjectOpened(ProjectMeta),
    ProjectSaved(PathBuf),
    ProjectClosed,
    ProjectLoadFailed(ProjectFailure),
    ProjectSaveFailed(ProjectFailure),
}

/// Subscription key; one handler list per kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    VideoChanged,
    EngineReady,
    TranscriptionReady,
    TranscriptionFailed,
    TranscriptionCancelled,
    SubtitlesChanged,
    StyleChanged,
    StyleLoaded,
    ProjectOpened,
    ProjectSaved,
    ProjectClosed,
    ProjectLoadFailed,
    ProjectSaveFailed,
}

impl AppEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            AppEvent::VideoChanged(_) => EventKind::VideoChanged,
            AppEvent::EngineReady => EventKind::EngineReady,
            AppEvent::TranscriptionReady(_) => EventKind::TranscriptionReady,
            AppEvent::TranscriptionFailed(_) => EventKind::TranscriptionFailed,
            AppEvent::TranscriptionCancelled => EventKind::TranscriptionCancelled,
            AppEvent::SubtitlesChanged(_) => EventKind::SubtitlesChanged,
            AppEvent::StyleChanged(_) => EventKind::StyleChanged,
            AppEvent::StyleLoaded(_) => EventKind::StyleLoaded,
            AppEvent::ProjectOpened(_) => EventKind::ProjectOpened,
            AppEvent::ProjectSaved(_) => EventKind::ProjectSaved,
            AppEvent::ProjectClosed => EventKind::ProjectClosed,
            AppEvent::ProjectLoadFailed(_) => EventKind::ProjectLoadFailed,
            AppEvent::ProjectSaveFailed(_) => EventKind::ProjectSaveFailed,
        }
    }
}

pub type SubscriptionId = u64;

type Handler = Arc<dyn Fn(&AppEvent) + Send + Sync + 'static>;

struct Registration {
    id: SubscriptionId,
    handler: Handler,
}

/// Typed publish/subscribe registry. Handlers for a kind run synchronously in
/// registration order on the publishing thread. Handlers may publish further
/// events (resolved depth-first) and may subscribe or unsubscribe; a handler
/// removed mid-publish is not invoked again in that pass.
///
/// Handlers must not block on long work; they hand off to background tasks.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

#[derive(Default)]
struct BusInner {
    next_id: AtomicU64,
    registry: Mutex<HashMap<EventKind, Vec<Registration>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, kind: EventKind, handler: F) -> SubscriptionId
    where
        F: Fn(&AppEvent) + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.inner
            .registry
            .lock()
            .entry(kind)
            .or_default()
            .push(Registration {
                id,
                handler: Arc::new(handler),
            });
        id
    }

    /// Returns true when the subscription existed. Safe to call from inside a
    /// handler, including for the handler itself.
    pub fn unsubscribe(&self, kind: EventKind, id: SubscriptionId) -> bool {
        let mut registry = self.inner.registry.lock();
        match registry.get_mut(&kind) {
            Some(entries) => {
                let before = entries.len();
                entries.retain(|r| r.id != id);
                entries.len() != before
            }
            None => false,
        }
    }

    pub fn publish(&self, event: AppEvent) {
        let kind = event.kind();
        // Snapshot outside the handler calls so handlers can re-enter the
        // registry. Each entry is re-checked against the live list right
        // before invocation to honor unsubscription during this pass.
        let snapshot: Vec<(SubscriptionId, Handler)> = {
            let registry = self.inner.registry.lock();
            registry
                .get(&kind)
                .map(|entries| {
                    entries
                        .iter()
                        .map(|r| (r.id, Arc::clone(&r.handler)))
                        .collect()
                })
                .unwrap_or_default()
        };

        for (id, handler) in snapshot {
            let live = {
                let registry = self.inner.registry.lock();
                registry
                    .get(&kind)
                    .is_some_and(|entries| entries.iter().any(|r| r.id == id))
            };
            if live {
                handler(&event);
            }
        }
    }
}
