//! Status conditions for managed resources
//!
//! A managed resource carries at most one condition per [`ConditionType`].
//! Conditions are kept in a map keyed by type so that setting a condition
//! replaces the previous one of the same type. On the wire they are a list,
//! which is what `kubectl` and the CRD schema expect.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Condition types reported by managed resources
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ConditionType {
    /// Whether the external resource is ready for use
    Ready,
    /// Whether the last reconcile cycle succeeded
    Synced,
}

/// Condition status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

/// Machine-readable reason for a condition
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub enum ConditionReason {
    /// External resource is available for use
    Available,
    /// External resource exists but is not usable
    Unavailable,
    /// External resource is being created
    Creating,
    /// External resource is being deleted
    Deleting,
    /// Last reconcile cycle completed without error
    ReconcileSuccess,
    /// Last reconcile cycle failed
    ReconcileError,
    /// Create was rejected because the external name is already taken
    ExternalNameConflict,
}

/// A single status condition
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Condition type
    #[serde(rename = "type")]
    pub type_: ConditionType,

    /// Condition status
    pub status: ConditionStatus,

    /// Reason for the current status
    pub reason: ConditionReason,

    /// Human-readable detail
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Time of the last transition of this condition
    pub last_transition_time: DateTime<Utc>,
}

impl Condition {
    fn new(type_: ConditionType, status: ConditionStatus, reason: ConditionReason) -> Self {
        Self {
            type_,
            status,
            reason,
            message: None,
            last_transition_time: Utc::now(),
        }
    }

    /// Ready=True, external resource is usable
    pub fn available() -> Self {
        Self::new(ConditionType::Ready, ConditionStatus::True, ConditionReason::Available)
    }

    /// Ready=False, external resource exists but is not usable
    pub fn unavailable() -> Self {
        Self::new(ConditionType::Ready, ConditionStatus::False, ConditionReason::Unavailable)
    }

    /// Ready=False, external resource is being created
    pub fn creating() -> Self {
        Self::new(ConditionType::Ready, ConditionStatus::False, ConditionReason::Creating)
    }

    /// Ready=False, external resource is being deleted
    pub fn deleting() -> Self {
        Self::new(ConditionType::Ready, ConditionStatus::False, ConditionReason::Deleting)
    }

    /// Synced=True
    pub fn reconcile_success() -> Self {
        Self::new(ConditionType::Synced, ConditionStatus::True, ConditionReason::ReconcileSuccess)
    }

    /// Synced=False with the error that stopped the cycle
    pub fn reconcile_error(message: impl Into<String>) -> Self {
        Self::new(ConditionType::Synced, ConditionStatus::False, ConditionReason::ReconcileError)
            .with_message(message)
    }

    /// Synced=False because the external name is held by another resource
    pub fn external_name_conflict(message: impl Into<String>) -> Self {
        Self::new(ConditionType::Synced, ConditionStatus::False, ConditionReason::ExternalNameConflict)
            .with_message(message)
    }

    /// Attach a message
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Equal in everything but the transition time
    pub fn equal(&self, other: &Self) -> bool {
        self.type_ == other.type_
            && self.status == other.status
            && self.reason == other.reason
            && self.message == other.message
    }
}

/// Conditions of a managed resource, at most one per type
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<Condition>", into = "Vec<Condition>")]
pub struct ConditionedStatus {
    conditions: BTreeMap<ConditionType, Condition>,
}

impl ConditionedStatus {
    /// Set a condition, replacing any condition of the same type.
    ///
    /// A condition equal to the current one keeps the current transition time.
    pub fn set(&mut self, condition: Condition) {
        if let Some(existing) = self.conditions.get(&condition.type_) {
            if existing.equal(&condition) {
                return;
            }
        }
        self.conditions.insert(condition.type_, condition);
    }

    /// Get the condition of the given type
    pub fn get(&self, type_: ConditionType) -> Option<&Condition> {
        self.conditions.get(&type_)
    }

    /// Iterate over all conditions ordered by type
    pub fn iter(&self) -> impl Iterator<Item = &Condition> {
        self.conditions.values()
    }

    /// Number of conditions
    pub fn len(&self) -> usize {
        self.conditions.len()
    }

    /// True when no condition is set
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }
}

impl From<Vec<Condition>> for ConditionedStatus {
    fn from(list: Vec<Condition>) -> Self {
        // Later entries win, matching the replace-by-type rule
        let conditions = list.into_iter().map(|c| (c.type_, c)).collect();
        Self { conditions }
    }
}

impl From<ConditionedStatus> for Vec<Condition> {
    fn from(status: ConditionedStatus) -> Self {
        status.conditions.into_values().collect()
    }
}
