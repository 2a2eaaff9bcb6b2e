use crate::backend::{LeadSource, RandomOutcome, SimulatedBackend};
use crate::config::StoreConfig;
use crate::errors::{AppError, AppResult};
use crate::filters::{filter_leads, unique_sources, unique_statuses};
use crate::models::{
    DashboardView, Lead, LeadFilters, LeadPatch, LoadState, Opportunity, StoreEvent,
};
use crate::preferences::PreferenceStore;
use crate::validation::validate_amount;
use std::collections::HashSet;
use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::{broadcast, oneshot};

const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Default)]
struct StoreState {
    load_state: LoadState,
    leads: Vec<Lead>,
    opportunities: Vec<Opportunity>,
    filters: LeadFilters,
}

/// Sole owner of the dashboard's leads, opportunities and filter criteria.
///
/// Cloning the store clones a handle; every clone sees the same state. The state
/// lock is never held across an await, so readers always observe either the
/// pre- or post-mutation value of a lead.
#[derive(Clone)]
pub struct LeadStore {
    state: Arc<RwLock<StoreState>>,
    backend: Arc<SimulatedBackend>,
    preferences: Option<Arc<PreferenceStore>>,
    events: broadcast::Sender<StoreEvent>,
}

/// Handle on an in-flight update confirmation. Dropping it does not cancel the confirmation.
#[derive(Debug)]
pub struct UpdateTicket {
    lead_id: i64,
    receiver: oneshot::Receiver<AppResult<Lead>>,
}

impl UpdateTicket {
    pub fn lead_id(&self) -> i64 {
        self.lead_id
    }

    /// Resolves once the backend confirms (the updated lead) or rejects (after rollback).
    pub async fn outcome(self) -> AppResult<Lead> {
        let lead_id = self.lead_id;
        self.receiver.await.map_err(|_| {
            AppError::Internal(format!("update confirmation for lead {} was dropped", lead_id))
        })?
    }
}

impl LeadStore {
    pub fn new(backend: SimulatedBackend, preferences: Option<PreferenceStore>) -> Self {
        let preferences = preferences.map(Arc::new);
        let filters = match preferences.as_deref().map(PreferenceStore::load_filters) {
            Some(Ok(filters)) => filters,
            Some(Err(error)) => {
                tracing::warn!(error = %error, "failed to read saved filters, using defaults");
                LeadFilters::default()
            }
            None => LeadFilters::default(),
        };
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Self {
            state: Arc::new(RwLock::new(StoreState {
                filters,
                ..StoreState::default()
            })),
            backend: Arc::new(backend),
            preferences,
            events,
        }
    }

    pub fn from_config(config: &StoreConfig) -> AppResult<Self> {
        let backend = SimulatedBackend::new(
            LeadSource::Fixture(config.fixture_path.clone()),
            config.latency(),
            Arc::new(RandomOutcome::new(config.failure_rate)),
        );
        let preferences = match &config.preferences_path {
            Some(path) => PreferenceStore::open(path)?,
            None => PreferenceStore::in_memory()?,
        };
        Ok(Self::new(backend, Some(preferences)))
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    /// Fetches the lead collection. Only the first call reaches the backend; a failed
    /// load stays failed for the lifetime of the store.
    pub async fn load(&self) -> AppResult<()> {
        {
            let mut state = self.write();
            tracing::debug!(state = state.load_state.as_str(), "lead load requested");
            match state.load_state.clone() {
                LoadState::Uninitialized => state.load_state = LoadState::Loading,
                LoadState::Loading => {
                    return Err(AppError::InvalidState("Leads are already loading".to_string()))
                }
                LoadState::Ready => return Ok(()),
                LoadState::Failed(message) => return Err(AppError::Load(message)),
            }
        }

        tracing::info!("loading leads");
        let store = self.clone();
        detached(async move { store.finish_load().await }).await
    }

    async fn finish_load(&self) -> AppResult<()> {
        match self.backend.fetch_leads().await.and_then(ensure_unique_ids) {
            Ok(leads) => {
                let count = leads.len();
                {
                    let mut state = self.write();
                    state.leads = leads;
                    state.load_state = LoadState::Ready;
                }
                tracing::info!(count, "leads loaded");
                self.emit(StoreEvent::LeadsLoaded { count });
                Ok(())
            }
            Err(error) => {
                let message = error.message().to_string();
                self.write().load_state = LoadState::Failed(message.clone());
                tracing::warn!(error = %error, "lead load failed");
                self.emit(StoreEvent::LoadFailed {
                    message: message.clone(),
                });
                Err(AppError::Load(message))
            }
        }
    }

    /// Applies `patch` to the lead immediately and confirms it in the background.
    ///
    /// A rejected confirmation restores this lead to its value at call time. Other
    /// leads are never touched by the rollback. Overlapping updates of the same lead
    /// each restore their own snapshot, so a late failure can undo a later edit.
    pub fn update_lead(&self, id: i64, patch: LeadPatch) -> AppResult<UpdateTicket> {
        patch.validate()?;
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| {
            AppError::InvalidState("Lead updates require a running tokio runtime".to_string())
        })?;

        let snapshot = {
            let mut state = self.write();
            let Some(lead) = state.leads.iter_mut().find(|lead| lead.id == id) else {
                return Err(AppError::NotFound(format!("No lead with id {}", id)));
            };
            let snapshot = lead.clone();
            patch.apply_to(lead);
            snapshot
        };
        self.emit(StoreEvent::LeadUpdated { lead_id: id });

        let (sender, receiver) = oneshot::channel();
        let store = self.clone();
        runtime.spawn(async move {
            let outcome = store.confirm_update(snapshot, patch).await;
            let _ = sender.send(outcome);
        });

        Ok(UpdateTicket {
            lead_id: id,
            receiver,
        })
    }

    pub async fn update_lead_and_confirm(&self, id: i64, patch: LeadPatch) -> AppResult<Lead> {
        self.update_lead(id, patch)?.outcome().await
    }

    async fn confirm_update(&self, snapshot: Lead, patch: LeadPatch) -> AppResult<Lead> {
        let lead_id = snapshot.id;
        match self.backend.confirm_update(lead_id, &patch).await {
            Ok(()) => self
                .lead(lead_id)
                .ok_or_else(|| AppError::NotFound(format!("No lead with id {}", lead_id))),
            Err(error) => {
                self.rollback(snapshot);
                tracing::warn!(lead_id, error = %error, "lead update rejected, rolled back");
                Err(error)
            }
        }
    }

    fn rollback(&self, snapshot: Lead) {
        let lead_id = snapshot.id;
        {
            let mut state = self.write();
            if let Some(lead) = state.leads.iter_mut().find(|lead| lead.id == lead_id) {
                *lead = snapshot;
            }
        }
        self.emit(StoreEvent::LeadRolledBack { lead_id });
    }

    /// Creates an opportunity from `lead`. The lead itself is left as is and may be
    /// converted again. Runs to completion even if the returned future is dropped.
    pub async fn convert_to_opportunity(
        &self,
        lead: &Lead,
        amount: Option<f64>,
    ) -> AppResult<Opportunity> {
        let amount = amount.map(validate_amount).transpose()?;

        let store = self.clone();
        let lead = lead.clone();
        detached(async move { store.finish_conversion(lead, amount).await }).await
    }

    async fn finish_conversion(&self, lead: Lead, amount: Option<f64>) -> AppResult<Opportunity> {
        match self.backend.convert(&lead, amount).await {
            Ok(opportunity) => {
                self.write().opportunities.insert(0, opportunity.clone());
                tracing::info!(
                    lead_id = lead.id,
                    opportunity_id = opportunity.id,
                    "lead converted to opportunity"
                );
                self.emit(StoreEvent::OpportunityCreated {
                    opportunity_id: opportunity.id,
                    lead_id: lead.id,
                });
                Ok(opportunity)
            }
            Err(error) => {
                tracing::warn!(lead_id = lead.id, error = %error, "lead conversion failed");
                Err(error)
            }
        }
    }

    pub fn load_state(&self) -> LoadState {
        self.read().load_state.clone()
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.read().load_state, LoadState::Uninitialized | LoadState::Loading)
    }

    pub fn error(&self) -> Option<String> {
        match &self.read().load_state {
            LoadState::Failed(message) => Some(message.clone()),
            _ => None,
        }
    }

    pub fn all_leads(&self) -> Vec<Lead> {
        self.read().leads.clone()
    }

    pub fn lead(&self, id: i64) -> Option<Lead> {
        self.read().leads.iter().find(|lead| lead.id == id).cloned()
    }

    pub fn visible_leads(&self) -> Vec<Lead> {
        let state = self.read();
        filter_leads(&state.leads, &state.filters)
    }

    pub fn opportunities(&self) -> Vec<Opportunity> {
        self.read().opportunities.clone()
    }

    pub fn unique_statuses(&self) -> Vec<String> {
        unique_statuses(&self.read().leads)
    }

    pub fn unique_sources(&self) -> Vec<String> {
        unique_sources(&self.read().leads)
    }

    pub fn filters(&self) -> LeadFilters {
        self.read().filters.clone()
    }

    pub fn set_filters(&self, filters: LeadFilters) {
        self.write().filters = filters.clone();
        self.persist_filters(&filters);
        self.emit(StoreEvent::FiltersChanged);
    }

    /// Edits the filters in place under the state lock, then persists the result.
    pub fn update_filters(&self, edit: impl FnOnce(&mut LeadFilters)) -> LeadFilters {
        let filters = {
            let mut state = self.write();
            edit(&mut state.filters);
            state.filters.clone()
        };
        self.persist_filters(&filters);
        self.emit(StoreEvent::FiltersChanged);
        filters
    }

    pub fn view(&self) -> DashboardView {
        let state = self.read();
        DashboardView {
            leads: filter_leads(&state.leads, &state.filters),
            total_leads: state.leads.len(),
            opportunities: state.opportunities.clone(),
            loading: matches!(state.load_state, LoadState::Uninitialized | LoadState::Loading),
            error: match &state.load_state {
                LoadState::Failed(message) => Some(message.clone()),
                _ => None,
            },
            filters: state.filters.clone(),
            status_options: unique_statuses(&state.leads),
            source_options: unique_sources(&state.leads),
        }
    }

    fn persist_filters(&self, filters: &LeadFilters) {
        let Some(preferences) = &self.preferences else {
            return;
        };
        if let Err(error) = preferences.save_filters(filters) {
            tracing::warn!(error = %error, "failed to persist lead filters");
        }
    }

    fn emit(&self, event: StoreEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn read(&self) -> RwLockReadGuard<'_, StoreState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoreState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

async fn detached<T, F>(future: F) -> AppResult<T>
where
    T: Send + 'static,
    F: Future<Output = AppResult<T>> + Send + 'static,
{
    tokio::spawn(future)
        .await
        .map_err(|error| AppError::Internal(format!("store task failed: {}", error)))?
}

fn ensure_unique_ids(leads: Vec<Lead>) -> AppResult<Vec<Lead>> {
    let mut seen = HashSet::with_capacity(leads.len());
    for lead in &leads {
        if !seen.insert(lead.id) {
            return Err(AppError::Load(format!("Duplicate lead id {} in fixture", lead.id)));
        }
    }
    Ok(leads)
}
