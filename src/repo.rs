use std::time::Duration;

use async_trait::async_trait;

use crate::models::*;
use crate::request::ItemUpdate;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RepoError {
    /// `success: false`; the message is the backend's, verbatim.
    #[error("{0}")] Rejected(String),
    #[error("item {0} not found")] NotFound(Id),
    #[error("transport: {0}")] Transport(String),
    #[error("timed out after {0:?}")] Timeout(Duration),
    #[error("decode: {0}")] Decode(String),
}

pub type RepoResult<T> = Result<T, RepoError>;

#[async_trait]
pub trait ItemRepo: Send + Sync {
    async fn list_items(&self) -> RepoResult<Vec<Item>>;
    async fn item_history(&self, id: Id) -> RepoResult<Vec<HistoryRecord>>;
    async fn create_item(&self, report: NewItemReport) -> RepoResult<Item>;
}

#[async_trait]
pub trait LifecycleRepo: Send + Sync {
    async fn update_item(&self, id: Id, update: ItemUpdate) -> RepoResult<Item>;
    /// Archiving an archived item returns it unchanged.
    async fn archive_item(&self, id: Id) -> RepoResult<Item>;
    async fn restore_item(&self, id: Id) -> RepoResult<Item>;
    async fn delete_item(&self, id: Id) -> RepoResult<()>;
    /// Archives every item idle for `older_than_days`; returns their ids.
    async fn run_archive_sweep(&self, older_than_days: i64) -> RepoResult<Vec<Id>>;
}

pub trait Repo: ItemRepo + LifecycleRepo {}

impl<T> Repo for T where T: ItemRepo + LifecycleRepo {}

/// Offline stand-in for the backend. It enforces the same lifecycle rules
/// and reference uniqueness the real backend is expected to.
#[cfg(feature = "inmem-store")]
pub mod inmem {
    use super::*;
    use std::collections::HashMap;
    use std::path::{Path, PathBuf};
    use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

    use chrono::Utc;
    use serde::{Deserialize, Serialize};
    use tracing::{info, warn};

    use crate::lifecycle::{self, apply_transition, Applied, Transition};

    const SNAPSHOT_FILE: &str = "items.json";

    #[derive(Default, Serialize, Deserialize)]
    struct State {
        items: HashMap<Id, Item>,
        history: HashMap<Id, Vec<HistoryRecord>>,
        next_id: Id,
    }

    #[derive(Clone, Default)]
    pub struct InMemRepo {
        state: Arc<RwLock<State>>,
        snapshot_path: Option<Arc<PathBuf>>,
    }

    impl InMemRepo {
        pub fn new() -> Self {
            Self::default()
        }

        /// Seeds the store, e.g. with items old enough for the sweep.
        pub fn with_items(items: impl IntoIterator<Item = Item>) -> Self {
            let repo = Self::new();
            {
                let mut s = repo.write();
                for item in items {
                    s.next_id = s.next_id.max(item.id);
                    s.items.insert(item.id, item);
                }
            }
            repo
        }

        /// Loads `<dir>/items.json` if present and rewrites it after every change.
        pub fn with_snapshot(dir: &Path) -> Self {
            let path = dir.join(SNAPSHOT_FILE);
            let state = Self::load_state_from(&path);
            Self { state: Arc::new(RwLock::new(state)), snapshot_path: Some(Arc::new(path)) }
        }

        fn load_state_from(path: &Path) -> State {
            match std::fs::read(path) {
                Ok(bytes) => match serde_json::from_slice::<State>(&bytes) {
                    Ok(s) => {
                        info!(path = %path.display(), items = s.items.len(), "loaded item snapshot");
                        s
                    }
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "unreadable item snapshot, starting empty");
                        State::default()
                    }
                },
                Err(e) => {
                    info!(path = %path.display(), error = %e, "no item snapshot, starting empty");
                    State::default()
                }
            }
        }

        fn persist(&self) {
            let Some(path) = self.snapshot_path.as_deref() else {
                return;
            };
            let bytes = match serde_json::to_vec_pretty(&*self.read()) {
                Ok(b) => b,
                Err(e) => {
                    warn!(error = %e, "failed to serialise item snapshot");
                    return;
                }
            };
            if let Some(dir) = path.parent() {
                if let Err(e) = std::fs::create_dir_all(dir) {
                    warn!(dir = %dir.display(), error = %e, "failed to create snapshot directory");
                }
            }
            if let Err(e) = std::fs::write(path, bytes) {
                warn!(path = %path.display(), error = %e, "failed to write item snapshot");
            }
        }

        fn read(&self) -> RwLockReadGuard<'_, State> {
            self.state.read().unwrap_or_else(PoisonError::into_inner)
        }

        fn write(&self) -> RwLockWriteGuard<'_, State> {
            self.state.write().unwrap_or_else(PoisonError::into_inner)
        }

        fn transition(&self, id: Id, transition: Transition) -> RepoResult<Item> {
            let mut s = self.write();
            let current = s.items.get(&id).ok_or(RepoError::NotFound(id))?;

            if let Transition::Claim { reference_number, .. } = &transition {
                let taken = s.items.values().any(|i| i.id != id && i.reference_number.as_ref() == Some(reference_number));
                if taken {
                    return Err(RepoError::Rejected("Duplicate reference number".into()));
                }
            }

            let applied = apply_transition(current, &transition, Utc::now()).map_err(|e| RepoError::Rejected(e.to_string()))?;
            let item = match applied {
                Applied::Unchanged(item) => return Ok(item),
                Applied::Removed => return Err(RepoError::Rejected("use delete to remove items".into())),
                Applied::Updated { item, record } => {
                    s.history.entry(id).or_default().push(record);
                    s.items.insert(id, item.clone());
                    item
                }
            };
            drop(s); // release lock before persisting
            self.persist();
            Ok(item)
        }
    }

    #[async_trait]
    impl ItemRepo for InMemRepo {
        async fn list_items(&self) -> RepoResult<Vec<Item>> {
            let s = self.read();
            let mut v: Vec<_> = s.items.values().cloned().collect();
            v.sort_by_key(|i| i.id);
            Ok(v)
        }

        async fn item_history(&self, id: Id) -> RepoResult<Vec<HistoryRecord>> {
            let s = self.read();
            if !s.items.contains_key(&id) {
                return Err(RepoError::NotFound(id));
            }
            Ok(s.history.get(&id).cloned().unwrap_or_default())
        }

        async fn create_item(&self, report: NewItemReport) -> RepoResult<Item> {
            let now = Utc::now();
            // lost reports are live immediately, found reports await staff review
            let status = match report.item_type {
                ItemType::Lost => ItemStatus::Lost,
                _ => ItemStatus::Pending,
            };
            let mut s = self.write();
            s.next_id += 1;
            let id = s.next_id;
            let item = Item {
                id,
                item_type: report.item_type,
                status,
                item_name: report.item_name,
                description: report.description,
                location: report.location,
                category: report.category,
                image: report.image,
                reporter_name: report.reporter_name,
                student_id: report.student_id,
                contact_info: report.contact_info,
                finder_name: None,
                finder_student_id: None,
                finder_contact: None,
                found_date: None,
                found_time: None,
                claimant_name: None,
                claimant_student_id: None,
                claimant_contact: None,
                reference_number: None,
                claimed_at: None,
                date_reported: now,
                updated_at: None,
                archived_at: None,
                status_before_archive: None,
            };
            s.history.entry(id).or_default().push(HistoryRecord {
                item_id: id,
                previous_status: None,
                new_status: status,
                change_reason: "reported".into(),
                timestamp: now,
                finder: None,
                claimant: None,
                reference_number: None,
            });
            s.items.insert(id, item.clone());
            drop(s);
            self.persist();
            Ok(item)
        }
    }

    #[async_trait]
    impl LifecycleRepo for InMemRepo {
        async fn update_item(&self, id: Id, update: ItemUpdate) -> RepoResult<Item> {
            self.transition(id, update.into_transition()?)
        }

        async fn archive_item(&self, id: Id) -> RepoResult<Item> {
            self.transition(id, Transition::Archive)
        }

        async fn restore_item(&self, id: Id) -> RepoResult<Item> {
            self.transition(id, Transition::Restore)
        }

        async fn delete_item(&self, id: Id) -> RepoResult<()> {
            let mut s = self.write();
            s.items.remove(&id).ok_or(RepoError::NotFound(id))?;
            s.history.remove(&id);
            drop(s);
            self.persist();
            Ok(())
        }

        async fn run_archive_sweep(&self, older_than_days: i64) -> RepoResult<Vec<Id>> {
            let ids = {
                let s = self.read();
                lifecycle::archive_candidates(s.items.values(), chrono::Duration::days(older_than_days), Utc::now())
            };
            for id in &ids {
                self.transition(*id, Transition::Archive)?;
            }
            Ok(ids)
        }
    }
}

/// The real backend, spoken to over JSON/HTTP.
pub mod http {
    use super::*;
    use tracing::debug;

    use crate::request::{interpret, Envelope, Method, RequestSpec, TransitionRequest};

    #[derive(Clone)]
    pub struct HttpRepo {
        client: reqwest::Client,
        base: String,
        timeout: Duration,
    }

    impl HttpRepo {
        pub fn new(base: impl Into<String>, timeout: Duration) -> RepoResult<Self> {
            let client = reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .map_err(|e| RepoError::Transport(format!("failed to build client: {e}")))?;
            let base = base.into().trim_end_matches('/').to_string();
            Ok(Self { client, base, timeout })
        }

        async fn send(&self, spec: RequestSpec) -> RepoResult<Envelope> {
            let url = format!("{}{}", self.base, spec.path);
            debug!(method = ?spec.method, %url, "backend request");
            let mut req = match spec.method {
                Method::Get => self.client.get(&url),
                Method::Post => self.client.post(&url),
                Method::Put => self.client.put(&url),
                Method::Delete => self.client.delete(&url),
            };
            if let Some(body) = &spec.body {
                req = req.json(body);
            }
            let resp = req.send().await.map_err(|e| self.transport(e))?;
            let status = resp.status().as_u16();
            let bytes = resp.bytes().await.map_err(|e| self.transport(e))?;
            interpret(status, &bytes)
        }

        fn transport(&self, e: reqwest::Error) -> RepoError {
            if e.is_timeout() {
                RepoError::Timeout(self.timeout)
            } else {
                RepoError::Transport(e.to_string())
            }
        }

        async fn transition(&self, id: Id, req: TransitionRequest) -> RepoResult<Item> {
            self.send(req.spec(id)?).await?.take("item")
        }
    }

    #[async_trait]
    impl ItemRepo for HttpRepo {
        async fn list_items(&self) -> RepoResult<Vec<Item>> {
            self.send(RequestSpec::list_items()).await?.take("items")
        }

        async fn item_history(&self, id: Id) -> RepoResult<Vec<HistoryRecord>> {
            self.send(RequestSpec::history(id)).await?.take("history")
        }

        async fn create_item(&self, report: NewItemReport) -> RepoResult<Item> {
            self.send(RequestSpec::create(&report)?).await?.take("item")
        }
    }

    #[async_trait]
    impl LifecycleRepo for HttpRepo {
        async fn update_item(&self, id: Id, update: ItemUpdate) -> RepoResult<Item> {
            self.transition(id, TransitionRequest::Update(update)).await
        }

        async fn archive_item(&self, id: Id) -> RepoResult<Item> {
            self.transition(id, TransitionRequest::Archive).await
        }

        async fn restore_item(&self, id: Id) -> RepoResult<Item> {
            self.transition(id, TransitionRequest::Restore).await
        }

        async fn delete_item(&self, id: Id) -> RepoResult<()> {
            self.send(TransitionRequest::Delete.spec(id)?).await.map(|_| ())
        }

        async fn run_archive_sweep(&self, older_than_days: i64) -> RepoResult<Vec<Id>> {
            self.send(RequestSpec::archive_sweep(older_than_days)?).await?.take("archived")
        }
    }
}
