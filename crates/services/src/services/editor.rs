//! Editor sessions: one operator editing one page, with a preview/edit state
//! machine, draft handling, and invalidation from the change-event hub.

use std::{sync::Arc, time::Duration};

use dashmap::DashMap;
use db::models::content_block::{ContentBlock, CreateContentBlock};
use serde::{Deserialize, Serialize};
use strum_macros::Display;
use thiserror::Error;
use tokio::{sync::broadcast::error::RecvError, task::JoinHandle, time::Instant};
use tracing::{debug, info, warn};
use ts_rs::TS;
use url::Url;
use utils::path::normalize_page_path;
use uuid::Uuid;

use super::{
    block_store::{BlockStore, BlockStoreError},
    events::{BlockChange, PageEvents},
};

/// Successive draft-change notifications within this window are ignored;
/// the first of a burst wins. Draft content itself is never dropped.
const CHANGE_DEBOUNCE: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
pub enum EditorError {
    #[error("editor session not found: {0}")]
    SessionNotFound(Uuid),
    #[error("cannot {action} while session is {state}")]
    InvalidTransition {
        action: &'static str,
        state: EditorState,
    },
    #[error(transparent)]
    Store(#[from] BlockStoreError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum EditorState {
    Loading,
    Preview,
    Editing,
}

/// Whether a draft update's change notification was propagated or debounced.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, TS)]
pub struct DraftAck {
    pub accepted: bool,
}

/// Snapshot of a session handed to the admin UI.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct SessionView {
    pub id: Uuid,
    pub page_path: String,
    pub state: EditorState,
    /// Page version the session's blocks were loaded from.
    pub version: i64,
    /// Bumped once per edit/save/cancel; the admin UI keys the preview
    /// iframe on it so each bump forces a full remount.
    pub preview_nonce: u64,
    pub preview_url: String,
    /// Set when the page changed underneath an editing session.
    pub stale: bool,
    pub blocks: Vec<ContentBlock>,
    pub draft: Option<Vec<CreateContentBlock>>,
}

struct Session {
    id: Uuid,
    page_path: String,
    state: EditorState,
    blocks: Vec<ContentBlock>,
    base_version: i64,
    draft: Option<Vec<CreateContentBlock>>,
    preview_nonce: u64,
    stale: bool,
    last_change_at: Option<Instant>,
}

#[derive(Clone)]
pub struct EditorSessionService {
    inner: Arc<Inner>,
}

struct Inner {
    store: BlockStore,
    site_origin: Url,
    sessions: DashMap<Uuid, Session>,
}

impl EditorSessionService {
    pub fn new(store: BlockStore, site_origin: Url) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                site_origin,
                sessions: DashMap::new(),
            }),
        }
    }

    /// Subscribe to the event hub and keep open sessions in sync with
    /// writes from other sessions and from extraction runs.
    pub fn spawn_watcher(&self, events: &PageEvents) -> JoinHandle<()> {
        let service = self.clone();
        let mut rx = events.subscribe();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(change) => service.apply_change(&change).await,
                    Err(RecvError::Lagged(missed)) => {
                        warn!(missed, "editor watcher lagged behind change events, resyncing");
                        service.resync_all().await;
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }

    /// Open a session on a page: enters `Loading`, fetches the persisted
    /// blocks, and settles in `Preview`.
    pub async fn open(&self, page_path: &str) -> Result<SessionView, EditorError> {
        let page_path = normalize_page_path(page_path);
        let id = Uuid::new_v4();

        self.inner.sessions.insert(
            id,
            Session {
                id,
                page_path: page_path.clone(),
                state: EditorState::Loading,
                blocks: Vec::new(),
                base_version: 0,
                draft: None,
                preview_nonce: 0,
                stale: false,
                last_change_at: None,
            },
        );

        let page = match self.inner.store.fetch_page(&page_path).await {
            Ok(page) => page,
            Err(err) => {
                self.inner.sessions.remove(&id);
                return Err(err.into());
            }
        };

        let view = self.with_session(id, |session| {
            session.blocks = page.blocks;
            session.base_version = page.version;
            session.state = EditorState::Preview;
            self.view_of(session)
        })?;

        info!(session_id = %id, page_path = %view.page_path, version = view.version, "editor session opened");
        Ok(view)
    }

    pub fn view(&self, id: Uuid) -> Result<SessionView, EditorError> {
        let session = self
            .inner
            .sessions
            .get(&id)
            .ok_or(EditorError::SessionNotFound(id))?;
        Ok(self.view_of(&session))
    }

    /// `Preview -> Editing`: the persisted blocks seed the draft.
    pub fn begin_edit(&self, id: Uuid) -> Result<SessionView, EditorError> {
        self.with_session(id, |session| {
            if session.state != EditorState::Preview {
                return Err(EditorError::InvalidTransition {
                    action: "edit",
                    state: session.state,
                });
            }
            session.draft = Some(
                session
                    .blocks
                    .iter()
                    .map(|block| CreateContentBlock {
                        id: Some(block.id),
                        block_type: block.block_type,
                        properties: block.properties.clone(),
                    })
                    .collect(),
            );
            session.state = EditorState::Editing;
            session.preview_nonce += 1;
            session.last_change_at = None;
            Ok(self.view_of(session))
        })?
    }

    /// Store the latest draft. The returned ack says whether the change
    /// notification was propagated or swallowed by the debounce window.
    pub fn update_draft(
        &self,
        id: Uuid,
        blocks: Vec<CreateContentBlock>,
    ) -> Result<DraftAck, EditorError> {
        self.with_session(id, |session| {
            if session.state != EditorState::Editing {
                return Err(EditorError::InvalidTransition {
                    action: "update the draft",
                    state: session.state,
                });
            }
            session.draft = Some(blocks);

            let now = Instant::now();
            let accepted = match session.last_change_at {
                Some(previous) if now.duration_since(previous) < CHANGE_DEBOUNCE => false,
                _ => {
                    session.last_change_at = Some(now);
                    true
                }
            };
            Ok(DraftAck { accepted })
        })?
    }

    /// `Editing -> Preview` on success. A save based on a stale version is
    /// rejected; the session stays in `Editing`, flagged stale, with its
    /// draft intact.
    pub async fn save(&self, id: Uuid) -> Result<SessionView, EditorError> {
        let (page_path, draft, base_version) = self.with_session(id, |session| {
            if session.state != EditorState::Editing {
                return Err(EditorError::InvalidTransition {
                    action: "save",
                    state: session.state,
                });
            }
            let draft = session.draft.clone().unwrap_or_default();
            Ok((session.page_path.clone(), draft, session.base_version))
        })??;

        let saved = match self
            .inner
            .store
            .replace_page(&page_path, draft, Some(base_version))
            .await
        {
            Ok(saved) => saved,
            Err(err) => {
                if matches!(err, BlockStoreError::StaleVersion { .. }) {
                    let _ = self.with_session(id, |session| session.stale = true);
                }
                return Err(err.into());
            }
        };

        let view = self.with_session(id, |session| {
            session.blocks = saved.blocks;
            session.base_version = saved.version;
            session.draft = None;
            session.state = EditorState::Preview;
            session.stale = false;
            session.preview_nonce += 1;
            self.view_of(session)
        })?;

        info!(session_id = %id, page_path = %view.page_path, version = view.version, "editor session saved");
        Ok(view)
    }

    /// `Editing -> Preview`, discarding the draft and refetching whatever is
    /// persisted.
    pub async fn cancel(&self, id: Uuid) -> Result<SessionView, EditorError> {
        let page_path = self.with_session(id, |session| {
            if session.state != EditorState::Editing {
                return Err(EditorError::InvalidTransition {
                    action: "cancel",
                    state: session.state,
                });
            }
            Ok(session.page_path.clone())
        })??;

        let page = self.inner.store.fetch_page(&page_path).await?;

        self.with_session(id, |session| {
            session.blocks = page.blocks;
            session.base_version = page.version;
            session.draft = None;
            session.state = EditorState::Preview;
            session.stale = false;
            session.preview_nonce += 1;
            self.view_of(session)
        })
    }

    pub fn close(&self, id: Uuid) -> Result<(), EditorError> {
        self.inner
            .sessions
            .remove(&id)
            .map(|_| ())
            .ok_or(EditorError::SessionNotFound(id))
    }

    /// Applied by the watcher for every published change: sessions on the
    /// changed page refetch (previewing) or are flagged stale (editing).
    /// A session whose base version already covers the event (its own save)
    /// is left alone.
    pub async fn apply_change(&self, change: &BlockChange) {
        let affected: Vec<Uuid> = self
            .inner
            .sessions
            .iter()
            .filter(|entry| {
                entry.page_path == change.page_path && entry.base_version < change.version
            })
            .map(|entry| entry.id)
            .collect();

        for id in affected {
            if let Err(err) = self.refresh_session(id).await {
                debug!(session_id = %id, error = %err, "session refresh after change failed");
            }
        }
    }

    async fn resync_all(&self) {
        let ids: Vec<Uuid> = self.inner.sessions.iter().map(|entry| entry.id).collect();
        for id in ids {
            if let Err(err) = self.refresh_session(id).await {
                debug!(session_id = %id, error = %err, "session resync failed");
            }
        }
    }

    async fn refresh_session(&self, id: Uuid) -> Result<(), EditorError> {
        let page_path = self.with_session(id, |session| session.page_path.clone())?;
        let page = self.inner.store.fetch_page(&page_path).await?;

        self.with_session(id, |session| {
            if page.version == session.base_version {
                return;
            }
            match session.state {
                // Never clobber an operator's draft; surface the conflict.
                EditorState::Editing => session.stale = true,
                _ => {
                    session.blocks = page.blocks.clone();
                    session.base_version = page.version;
                    session.state = EditorState::Preview;
                    session.preview_nonce += 1;
                }
            }
        })
    }

    fn with_session<R>(
        &self,
        id: Uuid,
        f: impl FnOnce(&mut Session) -> R,
    ) -> Result<R, EditorError> {
        let mut session = self
            .inner
            .sessions
            .get_mut(&id)
            .ok_or(EditorError::SessionNotFound(id))?;
        Ok(f(&mut session))
    }

    fn view_of(&self, session: &Session) -> SessionView {
        SessionView {
            id: session.id,
            page_path: session.page_path.clone(),
            state: session.state,
            version: session.base_version,
            preview_nonce: session.preview_nonce,
            preview_url: self.preview_url(&session.page_path, session.preview_nonce),
            stale: session.stale,
            blocks: session.blocks.clone(),
            draft: session.draft.clone(),
        }
    }

    /// Preview URL with the nonce as a cache-busting parameter, so every
    /// bump recreates the iframe instead of re-navigating a stale one.
    fn preview_url(&self, page_path: &str, nonce: u64) -> String {
        match self.inner.site_origin.join(page_path) {
            Ok(mut url) => {
                url.set_query(Some(&format!("v={nonce}")));
                url.to_string()
            }
            Err(_) => format!("{page_path}?v={nonce}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use db::DBService;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::services::events::PageEvents;

    async fn service() -> (EditorSessionService, BlockStore, PageEvents) {
        let db = DBService::new_in_memory().await.unwrap();
        let events = PageEvents::new();
        let store = BlockStore::new(db, events.clone());
        let service = EditorSessionService::new(
            store.clone(),
            Url::parse("http://localhost:3000").unwrap(),
        );
        (service, store, events)
    }

    async fn seed(store: &BlockStore) {
        store
            .replace_page(
                "/eyecare",
                vec![
                    CreateContentBlock::heading("Eye Care", 1),
                    CreateContentBlock::paragraph("Welcome to the clinic."),
                ],
                None,
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn open_settles_in_preview_with_persisted_blocks() {
        let (service, store, _) = service().await;
        seed(&store).await;

        let view = service.open("/eyecare").await.unwrap();
        assert_eq!(view.state, EditorState::Preview);
        assert_eq!(view.version, 1);
        assert_eq!(view.blocks.len(), 2);
        assert_eq!(view.preview_url, "http://localhost:3000/eyecare?v=0");
        assert!(view.draft.is_none());
    }

    #[tokio::test]
    async fn edit_save_cancel_each_bump_the_nonce_once() {
        let (service, store, _) = service().await;
        seed(&store).await;

        let opened = service.open("/eyecare").await.unwrap();
        assert_eq!(opened.preview_nonce, 0);

        let editing = service.begin_edit(opened.id).unwrap();
        assert_eq!(editing.state, EditorState::Editing);
        assert_eq!(editing.preview_nonce, 1);

        service
            .update_draft(opened.id, vec![CreateContentBlock::heading("Eye Care Center", 1)])
            .unwrap();
        let saved = service.save(opened.id).await.unwrap();
        assert_eq!(saved.state, EditorState::Preview);
        assert_eq!(saved.preview_nonce, 2);
        assert_eq!(saved.blocks.len(), 1);
        assert_eq!(saved.version, 2);

        let editing = service.begin_edit(opened.id).unwrap();
        assert_eq!(editing.preview_nonce, 3);
        let cancelled = service.cancel(opened.id).await.unwrap();
        assert_eq!(cancelled.state, EditorState::Preview);
        assert_eq!(cancelled.preview_nonce, 4);
        // Cancel discarded the draft and kept the persisted list.
        assert!(cancelled.draft.is_none());
        assert_eq!(cancelled.blocks.len(), 1);
    }

    #[tokio::test]
    async fn edit_requires_preview_state() {
        let (service, store, _) = service().await;
        seed(&store).await;

        let opened = service.open("/eyecare").await.unwrap();
        service.begin_edit(opened.id).unwrap();

        let err = service.begin_edit(opened.id).unwrap_err();
        assert!(matches!(err, EditorError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn draft_change_notifications_are_debounced() {
        let (service, store, _) = service().await;
        seed(&store).await;

        let opened = service.open("/eyecare").await.unwrap();
        service.begin_edit(opened.id).unwrap();

        // Pause the clock only after the DB setup above: under a paused tokio
        // clock sqlx's blocking sqlite connect races the pool acquire-timeout
        // (the virtual clock auto-advances while the blocking connect is
        // parked). The debounce assertions below need the deterministic clock.
        tokio::time::pause();

        let draft = vec![CreateContentBlock::paragraph("draft")];
        let mut accepted = 0;
        for _ in 0..5 {
            if service.update_draft(opened.id, draft.clone()).unwrap().accepted {
                accepted += 1;
            }
        }
        assert_eq!(accepted, 1);

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(service.update_draft(opened.id, draft).unwrap().accepted);
    }

    #[tokio::test]
    async fn debounced_updates_still_reach_the_draft() {
        let (service, store, _) = service().await;
        seed(&store).await;

        let opened = service.open("/eyecare").await.unwrap();
        service.begin_edit(opened.id).unwrap();

        for text in ["one", "two", "three"] {
            service
                .update_draft(opened.id, vec![CreateContentBlock::paragraph(text)])
                .unwrap();
        }

        let saved = service.save(opened.id).await.unwrap();
        assert_eq!(saved.blocks[0].properties["text"], "three");
    }

    #[tokio::test]
    async fn stale_save_keeps_session_editing() {
        let (service, store, _) = service().await;
        seed(&store).await;

        let a = service.open("/eyecare").await.unwrap();
        let b = service.open("/eyecare").await.unwrap();

        service.begin_edit(a.id).unwrap();
        service
            .update_draft(a.id, vec![CreateContentBlock::paragraph("from A")])
            .unwrap();
        service.save(a.id).await.unwrap();

        service.begin_edit(b.id).unwrap();
        service
            .update_draft(b.id, vec![CreateContentBlock::paragraph("from B")])
            .unwrap();
        let err = service.save(b.id).await.unwrap_err();
        assert!(matches!(
            err,
            EditorError::Store(BlockStoreError::StaleVersion { .. })
        ));

        let view = service.view(b.id).unwrap();
        assert_eq!(view.state, EditorState::Editing);
        assert!(view.stale);
        assert_eq!(
            view.draft.unwrap()[0].properties,
            json!({ "text": "from B" })
        );

        // Persisted content is A's save, untouched by B's rejected one.
        let page = store.fetch_page("/eyecare").await.unwrap();
        assert_eq!(page.blocks[0].properties["text"], "from A");
    }

    #[tokio::test]
    async fn watcher_refreshes_previewing_sessions() {
        let (service, store, events) = service().await;
        seed(&store).await;

        let watcher = service.spawn_watcher(&events);
        let previewing = service.open("/eyecare").await.unwrap();

        store
            .replace_page(
                "/eyecare",
                vec![CreateContentBlock::paragraph("changed elsewhere")],
                None,
            )
            .await
            .unwrap();

        let mut refreshed = None;
        for _ in 0..100 {
            let view = service.view(previewing.id).unwrap();
            if view.version == 2 {
                refreshed = Some(view);
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let view = refreshed.expect("session never saw the external change");
        assert_eq!(view.state, EditorState::Preview);
        assert_eq!(view.preview_nonce, previewing.preview_nonce + 1);
        assert_eq!(view.blocks[0].properties["text"], "changed elsewhere");

        watcher.abort();
    }

    #[tokio::test]
    async fn watcher_flags_editing_sessions_stale() {
        let (service, store, events) = service().await;
        seed(&store).await;

        let watcher = service.spawn_watcher(&events);
        let editing = service.open("/eyecare").await.unwrap();
        service.begin_edit(editing.id).unwrap();
        service
            .update_draft(editing.id, vec![CreateContentBlock::paragraph("my draft")])
            .unwrap();

        store
            .replace_page(
                "/eyecare",
                vec![CreateContentBlock::paragraph("changed elsewhere")],
                None,
            )
            .await
            .unwrap();

        let mut flagged = None;
        for _ in 0..100 {
            let view = service.view(editing.id).unwrap();
            if view.stale {
                flagged = Some(view);
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let view = flagged.expect("session was never flagged stale");
        assert_eq!(view.state, EditorState::Editing);
        assert_eq!(
            view.draft.unwrap()[0].properties["text"],
            "my draft"
        );

        watcher.abort();
    }

    #[tokio::test]
    async fn close_removes_the_session() {
        let (service, store, _) = service().await;
        seed(&store).await;

        let opened = service.open("/eyecare").await.unwrap();
        service.close(opened.id).unwrap();

        assert!(matches!(
            service.view(opened.id),
            Err(EditorError::SessionNotFound(_))
        ));
    }
}
