//! Driver identity carried by an active session.

use serde::{Deserialize, Serialize};

/// The logged-in delivery driver.
///
/// Uses `#[serde(default)]` for forward compatibility with older persisted
/// session files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DriverInfo {
    /// Stable identifier assigned by the delivery backend.
    #[serde(default)]
    pub delivery_id: String,
    /// Display name shown in the home header.
    #[serde(default)]
    pub name: String,
}

impl DriverInfo {
    pub fn new(delivery_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            delivery_id: delivery_id.into(),
            name: name.into(),
        }
    }
}
