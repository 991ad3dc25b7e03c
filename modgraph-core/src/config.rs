//! Graph Options
//!
//! Two diagnostic toggles the driver can flip. Both are off by default so a
//! normal build pays nothing for them.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Behavior the graph runs after each integration step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphOptions {
    /// Run the full invariant check after every integration.
    pub verify_after_integration: bool,

    /// Hand a snapshot to the installed exporter after every integration.
    pub export_after_integration: bool,
}

impl GraphOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_verification(mut self, enabled: bool) -> Self {
        self.verify_after_integration = enabled;
        self
    }

    pub fn with_export(mut self, enabled: bool) -> Self {
        self.export_after_integration = enabled;
        self
    }

    /// Parse options from JSON. Missing fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
