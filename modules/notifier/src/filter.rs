use cvewatch_entity::event::EventKind;
use serde::{Deserialize, Serialize};

/// The per-integration alert predicate, decoded from the integration's
/// `alert_filters` column. Missing fields fall back to the defaults, which
/// match nothing (explicit opt-in model).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertFilters {
    pub cvss: f64,
    pub event_types: Vec<EventKind>,
}

impl AlertFilters {
    pub fn from_value(value: &serde_json::Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value.clone())
    }

    /// Score gate first: a CVE without a CVSSv3 score is never excluded by
    /// score. Then the change's event kinds must intersect the configured set.
    pub fn matches(&self, cvss3: Option<f64>, kinds: &[EventKind]) -> bool {
        if let Some(score) = cvss3 {
            if score < self.cvss {
                return false;
            }
        }

        kinds.iter().any(|kind| self.event_types.contains(kind))
    }
}
