//! Configuration types for racewatch.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Configuration for the racewatch facade.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RacewatchConfig {
    /// Guard-table tracking configuration.
    pub tracking: TrackingConfig,

    /// Diagnostic behavior on conflict.
    pub diagnostics: DiagnosticsConfig,
}

impl RacewatchConfig {
    /// Parses a configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| CoreError::Config(e.to_string()))
    }
}

/// Guard-table tracking configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingConfig {
    /// Capture holder/requester call stacks for violation attribution.
    ///
    /// Capture is the expensive part of tracking; turn it off for large
    /// stress runs where context identities are attribution enough.
    pub capture_stacks: bool,

    /// Guard-table size at which entries for collected objects are swept
    /// opportunistically. Zero disables the opportunistic sweep.
    pub sweep_threshold: usize,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            capture_stacks: true,
            sweep_threshold: 1024,
        }
    }
}

/// Diagnostic behavior on conflict.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticsConfig {
    /// Report violations through the log and continue, instead of raising
    /// them to the caller. For non-fatal observation in long test runs.
    pub report_only: bool,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self { report_only: false }
    }
}
