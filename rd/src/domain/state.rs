//! Detected ticket state
//!
//! The upstream detector analyzes a ticket plus its CRM record and emits one
//! DetectedState describing where the customer's file stands. The engine
//! reads it, and writes back into `context_data` when a matched template
//! config carries context flags.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Priority assigned by the detector
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
    Critical,
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Normal => write!(f, "normal"),
            Self::High => write!(f, "high"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

/// How serious the detected situation is for the customer's file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Info,
    Warning,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

/// An operational alert the reply must carry (late payment, missing
/// documents, ...). `params` fills the `{placeholder}` slots of the
/// fragment registered for the type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    /// Fragment table key
    #[serde(rename = "type")]
    pub alert_type: String,

    /// Values for the fragment's placeholders
    #[serde(default)]
    pub params: Map<String, Value>,
}

impl Alert {
    /// Create an alert with no params
    pub fn new(alert_type: impl Into<String>) -> Self {
        Self {
            alert_type: alert_type.into(),
            params: Map::new(),
        }
    }

    /// Add a placeholder value
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }
}

/// One detected situation on a ticket, as produced by the upstream detector
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectedState {
    /// Stable identifier of the detection
    pub id: String,

    /// State name, e.g. "READY_TO_PAY" or "VALIDE_CMA_WAITING_CONVOC"
    pub name: String,

    /// Scheduling priority for the human review queue
    #[serde(default)]
    pub priority: Priority,

    /// Business category, e.g. "paiement" or "examen"
    #[serde(default)]
    pub category: Option<String>,

    /// Free-form description of what was detected
    #[serde(default)]
    pub description: Option<String>,

    /// Workflow step the downstream automation should take
    #[serde(default)]
    pub workflow_action: Option<String>,

    /// Opaque response tuning passed through to delivery
    #[serde(default)]
    pub response_config: Option<Value>,

    /// Opaque CRM update instructions passed through to the CRM step
    #[serde(default)]
    pub crm_updates_config: Option<Value>,

    /// Why the detector chose this state
    #[serde(default)]
    pub detection_reason: Option<String>,

    /// Severity of the situation
    #[serde(default)]
    pub severity: Severity,

    /// Working data for rendering: CRM fields, flags, sub-objects.
    /// The engine merges matched context flags into it.
    #[serde(default)]
    pub context_data: Map<String, Value>,

    /// Alerts to inject into the drafted reply
    #[serde(default)]
    pub alerts: Vec<Alert>,
}

impl DetectedState {
    /// Create a minimal state; everything else at defaults
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            priority: Priority::default(),
            category: None,
            description: None,
            workflow_action: None,
            response_config: None,
            crm_updates_config: None,
            detection_reason: None,
            severity: Severity::default(),
            context_data: Map::new(),
            alerts: Vec::new(),
        }
    }

    /// Add one context value
    pub fn with_context_value(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.context_data.insert(key.into(), value.into());
        self
    }

    /// Add an alert
    pub fn with_alert(mut self, alert: Alert) -> Self {
        self.alerts.push(alert);
        self
    }
}
