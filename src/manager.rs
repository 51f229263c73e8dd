//! Entry point for every lifecycle action.
//!
//! The manager holds the last collection the backend confirmed. It changes
//! that copy only after the backend answers `success: true`, allows one
//! outstanding request per item, and bounds every call with a timeout.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::{DashMap, DashSet};
use tracing::{debug, info, warn};

use crate::actor::Role;
use crate::config::Config;
use crate::error::LifecycleError;
use crate::lifecycle::{self, ItemViews, Transition, TransitionKind};
use crate::models::{ClaimantInfo, FinderInfo, HistoryRecord, Id, Item, NewItemReport};
use crate::reference;
use crate::repo::{Repo, RepoResult};
use crate::request::TransitionRequest;
use crate::validate::{self, GibberishHeuristic, TextCheck};

pub type LifecycleResult<T> = Result<T, LifecycleError>;

pub struct LifecycleManager {
    repo: Arc<dyn Repo>,
    role: Role,
    text_check: Arc<dyn TextCheck>,
    timeout: Duration,
    archive_after_days: i64,
    items: DashMap<Id, Item>,
    in_flight: DashSet<Id>,
}

/// Marks an item busy until dropped.
struct InFlight<'a> {
    set: &'a DashSet<Id>,
    id: Id,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.set.remove(&self.id);
    }
}

impl LifecycleManager {
    pub fn new(repo: Arc<dyn Repo>, role: Role) -> Self {
        Self::with_config(repo, role, &Config::default())
    }

    pub fn with_config(repo: Arc<dyn Repo>, role: Role, cfg: &Config) -> Self {
        Self {
            repo,
            role,
            text_check: Arc::new(GibberishHeuristic::new(cfg.text_rules)),
            timeout: cfg.timeout,
            archive_after_days: cfg.archive_after_days,
            items: DashMap::new(),
            in_flight: DashSet::new(),
        }
    }

    /// Swaps the free-text quality gate.
    pub fn with_text_check(mut self, check: Arc<dyn TextCheck>) -> Self {
        self.text_check = check;
        self
    }

    async fn call<T>(&self, fut: impl Future<Output = RepoResult<T>>) -> LifecycleResult<T> {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(res) => res.map_err(LifecycleError::from),
            Err(_) => Err(LifecycleError::Timeout(self.timeout)),
        }
    }

    fn permit(&self, action: TransitionKind) -> LifecycleResult<()> {
        if self.role.permits(action) {
            Ok(())
        } else {
            Err(LifecycleError::Forbidden { role: self.role, action })
        }
    }

    fn begin(&self, id: Id) -> LifecycleResult<InFlight<'_>> {
        if !self.in_flight.insert(id) {
            return Err(LifecycleError::Busy(id));
        }
        Ok(InFlight { set: &self.in_flight, id })
    }

    fn record<T>(kind: TransitionKind, id: Option<Id>, result: &LifecycleResult<T>) {
        let outcome = match result {
            Ok(_) => {
                info!(transition = kind.as_str(), item = ?id, "transition confirmed");
                "confirmed"
            }
            Err(e @ (LifecycleError::Validation(_) | LifecycleError::InvalidTransition { .. })) => {
                debug!(transition = kind.as_str(), item = ?id, error = %e, "transition blocked");
                e.outcome()
            }
            Err(e) => {
                warn!(transition = kind.as_str(), item = ?id, error = %e, "transition failed");
                e.outcome()
            }
        };
        metrics::increment_counter!("lostfound_transitions_total", "transition" => kind.as_str(), "outcome" => outcome);
    }

    // ---------------- reads ----------------

    /// Fetches the whole collection and replaces the confirmed copy. Never
    /// archives anything.
    pub async fn refresh(&self) -> LifecycleResult<ItemViews> {
        let items = self.call(self.repo.list_items()).await?;
        self.items.clear();
        for item in items {
            self.items.insert(item.id, item);
        }
        Ok(self.views())
    }

    pub fn views(&self) -> ItemViews {
        let items: Vec<Item> = self.items.iter().map(|e| e.value().clone()).collect();
        ItemViews::from_items(&items)
    }

    pub fn item(&self, id: Id) -> Option<Item> {
        self.items.get(&id).map(|e| e.value().clone())
    }

    pub async fn history(&self, id: Id) -> LifecycleResult<Vec<HistoryRecord>> {
        self.call(self.repo.item_history(id)).await
    }

    // ---------------- writes ----------------

    pub async fn submit_report(&self, report: NewItemReport) -> LifecycleResult<Item> {
        let result = self.submit_report_inner(report).await;
        Self::record(TransitionKind::Report, result.as_ref().ok().map(|i| i.id), &result);
        result
    }

    async fn submit_report_inner(&self, report: NewItemReport) -> LifecycleResult<Item> {
        self.permit(TransitionKind::Report)?;
        validate::report(&report, &*self.text_check)?;
        let item = self.call(self.repo.create_item(report)).await?;
        self.items.insert(item.id, item.clone());
        Ok(item)
    }

    /// Runs one transition. Returns the confirmed item, or `None` once an
    /// item has been deleted.
    pub async fn transition(&self, id: Id, transition: Transition) -> LifecycleResult<Option<Item>> {
        let kind = transition.kind();
        let result = self.transition_inner(id, transition).await;
        Self::record(kind, Some(id), &result);
        result
    }

    async fn transition_inner(&self, id: Id, transition: Transition) -> LifecycleResult<Option<Item>> {
        self.permit(transition.kind())?;
        let _busy = self.begin(id)?;
        let current = self.item(id).ok_or(LifecycleError::UnknownItem(id))?;
        lifecycle::check_transition(&current, &transition, Utc::now().date_naive())?;
        if matches!(transition, Transition::Archive) && lifecycle::is_archived(&current) {
            return Ok(Some(current));
        }

        let confirmed = match TransitionRequest::for_transition(&current, &transition) {
            TransitionRequest::Update(update) => Some(self.call(self.repo.update_item(id, update)).await?),
            TransitionRequest::Archive => Some(self.call(self.repo.archive_item(id)).await?),
            TransitionRequest::Restore => Some(self.call(self.repo.restore_item(id)).await?),
            TransitionRequest::Delete => {
                self.call(self.repo.delete_item(id)).await?;
                None
            }
        };

        match &confirmed {
            Some(item) => {
                if let Transition::Claim { reference_number, .. } = &transition {
                    if item.reference_number.as_ref() != Some(reference_number) {
                        debug!(item = id, proposed = %reference_number, kept = ?item.reference_number, "backend assigned its own reference number");
                    }
                }
                self.items.insert(id, item.clone());
            }
            None => {
                self.items.remove(&id);
            }
        }
        Ok(confirmed)
    }

    pub async fn mark_found(&self, id: Id, finder: FinderInfo) -> LifecycleResult<Option<Item>> {
        self.transition(id, Transition::MarkFound(finder)).await
    }

    pub async fn approve(&self, id: Id) -> LifecycleResult<Option<Item>> {
        self.transition(id, Transition::Approve).await
    }

    pub async fn reject(&self, id: Id) -> LifecycleResult<Option<Item>> {
        self.transition(id, Transition::Reject).await
    }

    /// Proposes a fresh reference number; the confirmed item carries the one
    /// the backend kept.
    pub async fn claim(&self, id: Id, claimant: ClaimantInfo) -> LifecycleResult<Option<Item>> {
        let reference_number = reference::generate(Utc::now());
        self.transition(id, Transition::Claim { claimant, reference_number }).await
    }

    pub async fn archive(&self, id: Id) -> LifecycleResult<Option<Item>> {
        self.transition(id, Transition::Archive).await
    }

    pub async fn restore(&self, id: Id) -> LifecycleResult<Option<Item>> {
        self.transition(id, Transition::Restore).await
    }

    pub async fn delete(&self, id: Id) -> LifecycleResult<()> {
        self.transition(id, Transition::Delete).await.map(|_| ())
    }

    /// On-demand age-based archive sweep. Reloads the collection afterwards;
    /// if that reload fails the previous confirmed copy stays in place.
    pub async fn run_archive_sweep(&self) -> LifecycleResult<Vec<Id>> {
        let result = self.sweep_inner().await;
        Self::record(TransitionKind::Sweep, None, &result);
        let archived = result?;
        info!(count = archived.len(), older_than_days = self.archive_after_days, "archive sweep finished");
        if let Err(e) = self.refresh().await {
            warn!(error = %e, "reload after archive sweep failed");
        }
        Ok(archived)
    }

    async fn sweep_inner(&self) -> LifecycleResult<Vec<Id>> {
        self.permit(TransitionKind::Sweep)?;
        self.call(self.repo.run_archive_sweep(self.archive_after_days)).await
    }
}
