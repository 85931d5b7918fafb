//! Delivery Statistics

use serde::Serialize;

/// Counters describing what a bus has done since it was created
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DeliveryStats {
    /// Total `emit` calls
    pub emissions: u64,

    /// Callbacks that returned normally (including bypassed ones). A
    /// callback that panics is not counted.
    pub delivered: u64,

    /// Delivered callbacks that ran without taking the session lock because
    /// their session was the active one
    pub bypassed: u64,

    /// Subscribers skipped because their session lock was unavailable
    pub skipped: u64,
}

impl DeliveryStats {
    /// Fraction of attempted deliveries that reached a callback
    pub fn delivery_ratio(&self) -> f64 {
        let attempted = self.delivered + self.skipped;
        if attempted == 0 {
            1.0
        } else {
            self.delivered as f64 / attempted as f64
        }
    }
}
