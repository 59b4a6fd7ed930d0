//! Operation status for mutating operations
//!
//! Execution-time faults are caught at the boundary and turned into status
//! objects the caller can inspect without exception handling.

use serde::{Deserialize, Serialize};

/// Result status of a mutating operation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpStatus {
    pub is_positive: bool,
    pub message: String,
    pub code: i32,
    /// Original driver/exception text, for diagnostics only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug_message: Option<String>,
}

impl OpStatus {
    pub fn ok() -> Self {
        Self {
            is_positive: true,
            message: String::new(),
            code: 0,
            debug_message: None,
        }
    }

    pub fn ok_with(message: &str) -> Self {
        Self {
            is_positive: true,
            message: message.to_string(),
            code: 0,
            debug_message: None,
        }
    }

    pub fn failed(message: &str, code: i32) -> Self {
        Self {
            is_positive: false,
            message: message.to_string(),
            code,
            debug_message: None,
        }
    }

    pub fn with_debug(mut self, debug: &str) -> Self {
        self.debug_message = Some(debug.to_string());
        self
    }
}
