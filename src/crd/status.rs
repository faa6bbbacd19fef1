//! # Managed Resource Status
//!
//! Status types shared by every SQL server kind: conditions, binding phase
//! and the last observed provider-side state.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Condition type reporting whether the external resource is usable
pub const CONDITION_TYPE_READY: &str = "Ready";
/// Condition type reporting whether the last reconcile pass succeeded
pub const CONDITION_TYPE_SYNCED: &str = "Synced";

pub const REASON_CREATING: &str = "Creating";
pub const REASON_DELETING: &str = "Deleting";
pub const REASON_AVAILABLE: &str = "Available";
pub const REASON_UNAVAILABLE: &str = "Unavailable";
pub const REASON_RECONCILE_SUCCESS: &str = "ReconcileSuccess";
pub const REASON_RECONCILE_ERROR: &str = "ReconcileError";

/// Status of a MySQLServer or PostgreSQLServer resource
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SqlServerStatus {
    /// Conditions represent the latest available observations
    #[serde(default)]
    pub conditions: Vec<Condition>,
    /// Whether the server may be bound by consumers
    #[serde(default)]
    pub binding_phase: Option<BindingPhase>,
    /// Last state reported by Azure
    #[serde(default)]
    pub at_provider: Option<SqlServerObservation>,
}

impl SqlServerStatus {
    /// Set the supplied conditions, replacing any existing condition of the same type
    pub fn set_conditions(&mut self, conditions: impl IntoIterator<Item = Condition>) {
        for condition in conditions {
            set_condition(&mut self.conditions, condition);
        }
    }

    /// Get the condition of the given type, if any
    pub fn condition(&self, condition_type: &str) -> Option<&Condition> {
        self.conditions.iter().find(|c| c.r#type == condition_type)
    }

    /// Mark the resource as ready to be bound. A resource that is already
    /// bound stays bound.
    pub fn set_bindable(&mut self) {
        if self.binding_phase == Some(BindingPhase::Bound) {
            return;
        }
        self.binding_phase = Some(BindingPhase::Unbound);
    }

    /// Mark the resource as not ready to be bound. A bound resource keeps
    /// its claim while the server is temporarily unavailable.
    pub fn set_unbindable(&mut self) {
        if self.binding_phase == Some(BindingPhase::Bound) {
            return;
        }
        self.binding_phase = Some(BindingPhase::Unbindable);
    }

    pub fn is_bindable(&self) -> bool {
        matches!(
            self.binding_phase,
            Some(BindingPhase::Unbound | BindingPhase::Bound)
        )
    }
}

/// Observed state of an Azure SQL server
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SqlServerObservation {
    /// Azure resource ID
    #[serde(default)]
    pub id: Option<String>,
    /// Server name as known to Azure
    #[serde(default)]
    pub name: Option<String>,
    /// Azure resource type (e.g., Microsoft.DBforMySQL/servers)
    #[serde(default)]
    pub r#type: Option<String>,
    /// State shown to users: Ready, Dropping, Disabled
    #[serde(default)]
    pub user_visible_state: Option<String>,
    /// Fully qualified domain name of the server endpoint
    #[serde(default)]
    pub fully_qualified_domain_name: Option<String>,
    /// Server engine version
    #[serde(default)]
    pub version: Option<String>,
}

/// Binding phase of a managed resource
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, JsonSchema)]
pub enum BindingPhase {
    /// The resource cannot be bound, usually because it is not ready
    Unbindable,
    /// The resource is ready and waiting to be bound
    Unbound,
    /// The resource is bound by a consumer
    Bound,
    /// The resource was bound and its consumer has gone away
    Released,
}

/// Condition represents a condition of a resource
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition
    pub r#type: String,
    /// Status of the condition (True, False, Unknown)
    pub status: String,
    /// Last transition time
    #[serde(default)]
    pub last_transition_time: Option<String>,
    /// Reason for the condition
    #[serde(default)]
    pub reason: Option<String>,
    /// Message describing the condition
    #[serde(default)]
    pub message: Option<String>,
}

impl Condition {
    fn new(condition_type: &str, status: bool, reason: &str, message: Option<String>) -> Self {
        Self {
            r#type: condition_type.to_string(),
            status: if status { "True" } else { "False" }.to_string(),
            last_transition_time: Some(chrono::Utc::now().to_rfc3339()),
            reason: Some(reason.to_string()),
            message,
        }
    }

    /// The external resource is being created
    pub fn creating() -> Self {
        Self::new(CONDITION_TYPE_READY, false, REASON_CREATING, None)
    }

    /// The external resource is being deleted
    pub fn deleting() -> Self {
        Self::new(CONDITION_TYPE_READY, false, REASON_DELETING, None)
    }

    /// The external resource is ready for use
    pub fn available() -> Self {
        Self::new(CONDITION_TYPE_READY, true, REASON_AVAILABLE, None)
    }

    /// The external resource exists but is not ready for use
    pub fn unavailable() -> Self {
        Self::new(CONDITION_TYPE_READY, false, REASON_UNAVAILABLE, None)
    }

    pub fn reconcile_success() -> Self {
        Self::new(CONDITION_TYPE_SYNCED, true, REASON_RECONCILE_SUCCESS, None)
    }

    pub fn reconcile_error(message: impl Into<String>) -> Self {
        Self::new(
            CONDITION_TYPE_SYNCED,
            false,
            REASON_RECONCILE_ERROR,
            Some(message.into()),
        )
    }

    /// Whether two conditions are equal ignoring their transition time
    pub fn equal(&self, other: &Condition) -> bool {
        self.r#type == other.r#type
            && self.status == other.status
            && self.reason == other.reason
            && self.message == other.message
    }

    pub fn is_true(&self) -> bool {
        self.status == "True"
    }
}

fn set_condition(conditions: &mut Vec<Condition>, condition: Condition) {
    match conditions.iter_mut().find(|c| c.r#type == condition.r#type) {
        // Unchanged conditions keep their original transition time
        Some(existing) if existing.equal(&condition) => {}
        Some(existing) => *existing = condition,
        None => conditions.push(condition),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_conditions_replaces_same_type() {
        let mut status = SqlServerStatus::default();
        status.set_conditions([Condition::creating()]);
        status.set_conditions([Condition::available()]);

        assert_eq!(status.conditions.len(), 1);
        let ready = status.condition(CONDITION_TYPE_READY).unwrap();
        assert!(ready.is_true());
        assert_eq!(ready.reason.as_deref(), Some(REASON_AVAILABLE));
    }

    #[test]
    fn test_set_conditions_keeps_distinct_types() {
        let mut status = SqlServerStatus::default();
        status.set_conditions([Condition::unavailable(), Condition::reconcile_success()]);

        assert_eq!(status.conditions.len(), 2);
        assert!(!status.condition(CONDITION_TYPE_READY).unwrap().is_true());
        assert!(status.condition(CONDITION_TYPE_SYNCED).unwrap().is_true());
    }

    #[test]
    fn test_set_conditions_preserves_transition_time_when_equal() {
        let mut status = SqlServerStatus::default();
        let mut first = Condition::available();
        first.last_transition_time = Some("2020-01-01T00:00:00+00:00".to_string());
        status.set_conditions([first]);
        status.set_conditions([Condition::available()]);

        assert_eq!(
            status.conditions[0].last_transition_time.as_deref(),
            Some("2020-01-01T00:00:00+00:00")
        );
    }

    #[test]
    fn test_reconcile_error_carries_message() {
        let condition = Condition::reconcile_error("cannot get SQL server: boom");
        assert_eq!(condition.r#type, CONDITION_TYPE_SYNCED);
        assert_eq!(condition.status, "False");
        assert_eq!(
            condition.message.as_deref(),
            Some("cannot get SQL server: boom")
        );
    }

    #[test]
    fn test_set_bindable() {
        let mut status = SqlServerStatus::default();
        assert!(!status.is_bindable());

        status.set_bindable();
        assert_eq!(status.binding_phase, Some(BindingPhase::Unbound));
        assert!(status.is_bindable());

        status.binding_phase = Some(BindingPhase::Bound);
        status.set_bindable();
        assert_eq!(status.binding_phase, Some(BindingPhase::Bound));

        status.binding_phase = Some(BindingPhase::Released);
        status.set_bindable();
        assert_eq!(status.binding_phase, Some(BindingPhase::Unbound));

        status.set_unbindable();
        assert!(!status.is_bindable());
    }

    #[test]
    fn test_set_unbindable_keeps_bound_claim() {
        let mut status = SqlServerStatus {
            binding_phase: Some(BindingPhase::Unbound),
            ..Default::default()
        };
        status.set_unbindable();
        assert_eq!(status.binding_phase, Some(BindingPhase::Unbindable));

        status.binding_phase = Some(BindingPhase::Bound);
        status.set_unbindable();
        assert_eq!(status.binding_phase, Some(BindingPhase::Bound));
    }
}
