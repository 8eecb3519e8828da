//! Journey state machine engine.
//!
//! A journey tracks one multi-step business process for one resource, such
//! as a transfer moving from creation to settlement or a customer working
//! through identity verification. Definitions are seed data; instances are created
//! and advanced by matching webhook events and swept for inactivity by a
//! background task.
//!
//! Status transitions are monotonic: `active` can become `completed`,
//! `failed`, `abandoned`, or `stuck`; `stuck` is reversible back to
//! `active` only by a fresh matching event; terminal states never re-open.

use crate::{topic::EventTopic, ProviderEventId, ResourceId, ResourceType, Timestamp, Ulid};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;
use tracing::{debug, info};

// ============================================================================
// Core Types
// ============================================================================

/// Status of a journey instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JourneyStatus {
    Active,
    Completed,
    Failed,
    Abandoned,
    Stuck,
}

impl JourneyStatus {
    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Abandoned => "abandoned",
            Self::Stuck => "stuck",
        }
    }

    /// True for states that never change again
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Abandoned)
    }
}

/// Static definition of a journey: an ordered happy path plus the topics
/// that fail it. Seed data, not mutated at runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JourneyDefinition {
    pub name: String,
    /// Ordered steps of the happy path; the last one completes the journey
    pub steps: Vec<EventTopic>,
    /// Topics that terminate the journey as failed
    pub failure_steps: Vec<EventTopic>,
    pub resource_type: ResourceType,
    pub active: bool,
}

impl JourneyDefinition {
    /// True when this definition routes the given topic
    pub fn matches(&self, topic: &EventTopic) -> bool {
        self.active && (self.steps.contains(topic) || self.failure_steps.contains(topic))
    }

    /// The step that completes the journey
    pub fn terminal_step(&self) -> Option<&EventTopic> {
        self.steps.last()
    }
}

/// One entry in an instance's append-only step history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JourneyStep {
    pub sequence: u32,
    pub step: EventTopic,
    pub timestamp: Timestamp,
    pub event_id: ProviderEventId,
}

/// A running (or finished) journey for one resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JourneyInstance {
    pub id: Ulid,
    pub definition: String,
    pub resource_type: ResourceType,
    pub resource_id: ResourceId,
    pub status: JourneyStatus,
    pub started_at: Timestamp,
    pub ended_at: Option<Timestamp>,
    pub last_event_at: Timestamp,
    /// Distinct happy-path steps seen so far, in first-seen order
    pub completed_steps: Vec<EventTopic>,
    /// `completed_steps / definition steps`, 0–100
    pub progress_percentage: f64,
    pub total_duration: Option<Duration>,
    /// 0–100 operator-facing attention score
    pub risk_score: u8,
    /// Append-only audit trail, ordered by sequence
    pub steps: Vec<JourneyStep>,
}

/// Result of a stuck/abandonment sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepOutcome {
    pub marked_stuck: usize,
    pub marked_abandoned: usize,
}

// ============================================================================
// Engine
// ============================================================================

/// Per-resource journey tracking.
///
/// The instance map is the serialization point for find-or-create: all
/// mutation happens under one write lock, so concurrent events for the same
/// resource cannot create duplicate instances.
pub struct JourneyEngine {
    definitions: Vec<JourneyDefinition>,
    instances: RwLock<HashMap<(String, ResourceId), JourneyInstance>>,
}

impl JourneyEngine {
    pub fn new(definitions: Vec<JourneyDefinition>) -> Self {
        Self {
            definitions,
            instances: RwLock::new(HashMap::new()),
        }
    }

    /// Engine preloaded with the standard journey definitions.
    pub fn with_seed_definitions() -> Self {
        Self::new(seed_definitions())
    }

    /// Definitions this engine routes
    pub fn definitions(&self) -> &[JourneyDefinition] {
        &self.definitions
    }

    /// Advance journeys for a resource on a matching event.
    ///
    /// Finds or creates the instance for each matching definition, appends
    /// a step, recomputes progress, and applies terminal transitions.
    /// Topics with no matching definition are ignored; journeys are
    /// opt-in per topic, so this is not an error.
    ///
    /// Returns the instances that were updated.
    pub fn on_event(
        &self,
        resource_type: ResourceType,
        resource_id: &ResourceId,
        topic: &EventTopic,
        timestamp: Timestamp,
        event_id: &ProviderEventId,
    ) -> Vec<JourneyInstance> {
        let matching: Vec<&JourneyDefinition> = self
            .definitions
            .iter()
            .filter(|d| d.resource_type == resource_type && d.matches(topic))
            .collect();

        if matching.is_empty() {
            debug!(topic = %topic, "No journey definition matches topic");
            return Vec::new();
        }

        let mut instances = self
            .instances
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let mut updated = Vec::new();
        for definition in matching {
            let key = (definition.name.clone(), resource_id.clone());
            let instance = instances.entry(key).or_insert_with(|| {
                info!(
                    journey = %definition.name,
                    resource_id = %resource_id,
                    "Starting journey instance"
                );
                JourneyInstance {
                    id: Ulid::new(),
                    definition: definition.name.clone(),
                    resource_type,
                    resource_id: resource_id.clone(),
                    status: JourneyStatus::Active,
                    started_at: timestamp,
                    ended_at: None,
                    last_event_at: timestamp,
                    completed_steps: Vec::new(),
                    progress_percentage: 0.0,
                    total_duration: None,
                    risk_score: 0,
                    steps: Vec::new(),
                }
            });

            // Terminal states never re-open
            if instance.status.is_terminal() {
                continue;
            }

            // A fresh matching event is the only thing that revives a
            // stuck journey
            if instance.status == JourneyStatus::Stuck {
                instance.status = JourneyStatus::Active;
            }

            instance.steps.push(JourneyStep {
                sequence: instance.steps.len() as u32 + 1,
                step: topic.clone(),
                timestamp,
                event_id: event_id.clone(),
            });
            instance.last_event_at = timestamp;

            if definition.steps.contains(topic) && !instance.completed_steps.contains(topic) {
                instance.completed_steps.push(topic.clone());
            }
            instance.progress_percentage = if definition.steps.is_empty() {
                0.0
            } else {
                instance.completed_steps.len() as f64 / definition.steps.len() as f64 * 100.0
            };

            if definition.terminal_step() == Some(topic) {
                instance.status = JourneyStatus::Completed;
            } else if definition.failure_steps.contains(topic) {
                instance.status = JourneyStatus::Failed;
            }

            if instance.status.is_terminal() {
                instance.ended_at = Some(timestamp);
                instance.total_duration = Some(timestamp.duration_since(instance.started_at));
            }

            instance.risk_score = risk_score(instance, Timestamp::now());
            updated.push(instance.clone());
        }

        updated
    }

    /// Mark inactive journeys.
    ///
    /// Instances still `active` whose last event is older than
    /// `stuck_after` become `stuck`; instances (`active` or `stuck`) idle
    /// past `abandon_after` are closed as `abandoned`. Step history is not
    /// touched.
    pub fn sweep_stuck(&self, stuck_after: Duration, abandon_after: Duration) -> SweepOutcome {
        let now = Timestamp::now();
        let mut instances = self
            .instances
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let mut outcome = SweepOutcome::default();
        for instance in instances.values_mut() {
            if instance.status.is_terminal() {
                continue;
            }

            let idle = now.duration_since(instance.last_event_at);
            if idle > abandon_after {
                instance.status = JourneyStatus::Abandoned;
                instance.ended_at = Some(now);
                instance.total_duration = Some(now.duration_since(instance.started_at));
                instance.risk_score = risk_score(instance, now);
                outcome.marked_abandoned += 1;
            } else if instance.status == JourneyStatus::Active && idle > stuck_after {
                instance.status = JourneyStatus::Stuck;
                instance.risk_score = risk_score(instance, now);
                outcome.marked_stuck += 1;
            }
        }

        if outcome.marked_stuck > 0 || outcome.marked_abandoned > 0 {
            info!(
                stuck = outcome.marked_stuck,
                abandoned = outcome.marked_abandoned,
                "Journey sweep applied inactivity transitions"
            );
        }
        outcome
    }

    /// Fetch one instance by (definition, resource).
    pub fn get_instance(&self, definition: &str, resource_id: &ResourceId) -> Option<JourneyInstance> {
        let instances = self
            .instances
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        instances
            .get(&(definition.to_string(), resource_id.clone()))
            .cloned()
    }

    /// Snapshot instances, optionally filtered by resource.
    pub fn list_instances(
        &self,
        resource_type: Option<ResourceType>,
        resource_id: Option<&ResourceId>,
    ) -> Vec<JourneyInstance> {
        let instances = self
            .instances
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let mut result: Vec<_> = instances
            .values()
            .filter(|i| resource_type.map_or(true, |rt| i.resource_type == rt))
            .filter(|i| resource_id.map_or(true, |rid| &i.resource_id == rid))
            .cloned()
            .collect();
        result.sort_by_key(|i| i.started_at);
        result
    }

    /// Operator-facing remediation suggestion for an instance.
    ///
    /// Pure keyword mapping on the journey name; no state effect.
    pub fn recommend_action(instance: &JourneyInstance) -> String {
        let name = instance.definition.as_str();
        if name.contains("Micro-deposit") {
            "Confirm the micro-deposit amounts with the customer, or re-initiate \
             the deposits if they never arrived."
                .to_string()
        } else if name.contains("Verification") {
            "Ask the customer to re-submit identity verification documents and \
             confirm their details match the bank record."
                .to_string()
        } else if name.contains("Transfer") {
            "Check the transfer status with the payment provider and confirm the \
             funding source is still valid."
                .to_string()
        } else {
            "Review the journey's event history and contact the customer if the \
             process has stalled."
                .to_string()
        }
    }
}

/// Attention score for operator dashboards, 0 (fine) to 100 (act now).
///
/// Terminal failures dominate; in-flight journeys score by inactivity and
/// how little of the happy path they have covered.
fn risk_score(instance: &JourneyInstance, now: Timestamp) -> u8 {
    match instance.status {
        JourneyStatus::Completed => 0,
        JourneyStatus::Failed => 90,
        JourneyStatus::Abandoned => 80,
        JourneyStatus::Stuck => {
            let idle_hours = now.duration_since(instance.last_event_at).as_secs() / 3600;
            (70 + idle_hours.min(30) as u8).min(100)
        }
        JourneyStatus::Active => {
            let idle_hours = now.duration_since(instance.last_event_at).as_secs() / 3600;
            let inactivity = (idle_hours * 10).min(40) as u8;
            let remaining = ((100.0 - instance.progress_percentage) / 5.0) as u8;
            (inactivity + remaining).min(60)
        }
    }
}

/// The standard journey definitions shipped as seed data.
pub fn seed_definitions() -> Vec<JourneyDefinition> {
    vec![
        JourneyDefinition {
            name: "Customer Verification".to_string(),
            steps: vec![
                EventTopic::CustomerCreated,
                EventTopic::CustomerVerificationDocumentNeeded,
                EventTopic::CustomerVerificationDocumentUploaded,
                EventTopic::CustomerVerified,
            ],
            failure_steps: vec![EventTopic::CustomerSuspended],
            resource_type: ResourceType::Customer,
            active: true,
        },
        JourneyDefinition {
            name: "Micro-deposit Verification".to_string(),
            steps: vec![
                EventTopic::MicrodepositsAdded,
                EventTopic::MicrodepositsCompleted,
            ],
            failure_steps: vec![EventTopic::MicrodepositsFailed],
            resource_type: ResourceType::Customer,
            active: true,
        },
        JourneyDefinition {
            name: "Transfer Lifecycle".to_string(),
            steps: vec![
                EventTopic::TransferCreated,
                EventTopic::TransferPending,
                EventTopic::TransferCompleted,
            ],
            failure_steps: vec![
                EventTopic::TransferFailed,
                EventTopic::TransferCancelled,
                EventTopic::TransferReturned,
                EventTopic::TransferReclaimed,
            ],
            resource_type: ResourceType::Transfer,
            active: true,
        },
    ]
}

#[cfg(test)]
#[path = "journey_tests.rs"]
mod tests;
