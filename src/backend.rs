use crate::errors::{AppError, AppResult};
use crate::models::{Lead, LeadPatch, Opportunity, OpportunityStage};
use chrono::Utc;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::time::Duration;

pub const DEFAULT_FAILURE_RATE: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    UpdateLead,
    ConvertLead,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::UpdateLead => "update-lead",
            Self::ConvertLead => "convert-lead",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure,
}

/// Decides whether a simulated remote call succeeds.
pub trait OutcomeStrategy: Send + Sync {
    fn attempt(&self, operation: Operation) -> Outcome;
}

#[derive(Debug, Clone)]
pub struct RandomOutcome {
    failure_rate: f64,
}

impl RandomOutcome {
    pub fn new(failure_rate: f64) -> Self {
        Self {
            failure_rate: failure_rate.clamp(0.0, 1.0),
        }
    }
}

impl Default for RandomOutcome {
    fn default() -> Self {
        Self::new(DEFAULT_FAILURE_RATE)
    }
}

impl OutcomeStrategy for RandomOutcome {
    fn attempt(&self, operation: Operation) -> Outcome {
        if rand::random::<f64>() < self.failure_rate {
            tracing::debug!(operation = operation.as_str(), "injected backend failure");
            Outcome::Failure
        } else {
            Outcome::Success
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysSucceed;

impl OutcomeStrategy for AlwaysSucceed {
    fn attempt(&self, _operation: Operation) -> Outcome {
        Outcome::Success
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysFail;

impl OutcomeStrategy for AlwaysFail {
    fn attempt(&self, _operation: Operation) -> Outcome {
        Outcome::Failure
    }
}

/// Replays a fixed sequence of outcomes, then falls back to `exhausted`.
#[derive(Debug)]
pub struct ScriptedOutcome {
    script: Mutex<VecDeque<Outcome>>,
    exhausted: Outcome,
}

impl ScriptedOutcome {
    pub fn new(script: impl IntoIterator<Item = Outcome>, exhausted: Outcome) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            exhausted,
        }
    }
}

impl OutcomeStrategy for ScriptedOutcome {
    fn attempt(&self, _operation: Operation) -> Outcome {
        match self.script.lock() {
            Ok(mut script) => script.pop_front().unwrap_or(self.exhausted),
            Err(_) => self.exhausted,
        }
    }
}

#[derive(Debug, Clone)]
pub enum LeadSource {
    Fixture(PathBuf),
    Inline(Vec<Lead>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Latency {
    pub load: Duration,
    pub update: Duration,
    pub convert: Duration,
}

impl Default for Latency {
    fn default() -> Self {
        Self {
            load: Duration::from_millis(800),
            update: Duration::from_millis(1_000),
            convert: Duration::from_millis(1_000),
        }
    }
}

impl Latency {
    pub fn none() -> Self {
        Self {
            load: Duration::ZERO,
            update: Duration::ZERO,
            convert: Duration::ZERO,
        }
    }
}

/// Stand-in for the leads API: a JSON fixture for reads, delayed coin flips for writes.
pub struct SimulatedBackend {
    source: LeadSource,
    latency: Latency,
    outcomes: Arc<dyn OutcomeStrategy>,
    last_opportunity_id: AtomicI64,
}

impl SimulatedBackend {
    pub fn new(source: LeadSource, latency: Latency, outcomes: Arc<dyn OutcomeStrategy>) -> Self {
        Self {
            source,
            latency,
            outcomes,
            last_opportunity_id: AtomicI64::new(0),
        }
    }

    pub async fn fetch_leads(&self) -> AppResult<Vec<Lead>> {
        tokio::time::sleep(self.latency.load).await;

        match &self.source {
            LeadSource::Inline(leads) => Ok(leads.clone()),
            LeadSource::Fixture(path) => {
                let raw = tokio::fs::read_to_string(path).await.map_err(|error| {
                    AppError::Load(format!(
                        "Failed to fetch leads from {}: {}",
                        path.display(),
                        error
                    ))
                })?;
                serde_json::from_str::<Vec<Lead>>(&raw).map_err(|error| {
                    AppError::Load(format!("Failed to parse leads fixture: {}", error))
                })
            }
        }
    }

    pub async fn confirm_update(&self, lead_id: i64, patch: &LeadPatch) -> AppResult<()> {
        tokio::time::sleep(self.latency.update).await;

        match self.outcomes.attempt(Operation::UpdateLead) {
            Outcome::Success => {
                if patch.is_empty() {
                    tracing::debug!(lead_id, "empty lead update confirmed");
                } else {
                    tracing::debug!(lead_id, fields = ?patch, "lead update confirmed");
                }
                Ok(())
            }
            Outcome::Failure => Err(AppError::Update("Failed to update lead".to_string())),
        }
    }

    pub async fn convert(&self, lead: &Lead, amount: Option<f64>) -> AppResult<Opportunity> {
        tokio::time::sleep(self.latency.convert).await;

        if self.outcomes.attempt(Operation::ConvertLead) == Outcome::Failure {
            return Err(AppError::Conversion(
                "Failed to convert lead to opportunity".to_string(),
            ));
        }

        Ok(Opportunity {
            id: self.next_opportunity_id(),
            name: lead.name.clone(),
            stage: OpportunityStage::INITIAL,
            amount,
            account_name: lead.company.clone(),
            lead_id: lead.id,
            created_at: Utc::now(),
        })
    }

    /// Millisecond timestamp, bumped past the previous id when two conversions share a tick.
    fn next_opportunity_id(&self) -> i64 {
        let now = Utc::now().timestamp_millis();
        let previous = self
            .last_opportunity_id
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(now.max(last + 1))
            })
            .unwrap_or_else(|last| last);
        now.max(previous + 1)
    }
}
