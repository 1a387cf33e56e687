//! # Geofence
//!
//! Axis-aligned trigger zones checked against the TCP position. A zone fires
//! once when the TCP moves from outside to inside it; staying inside or
//! leaving is silent.

use crate::config::ZoneConfig;

/// Axis-aligned box in base coordinates (metres)
#[derive(Debug, Clone, PartialEq)]
pub struct TriggerZone {
    pub name: String,
    pub min: [f64; 3],
    pub max: [f64; 3],
}

impl TriggerZone {
    #[must_use]
    pub fn new(name: impl Into<String>, min: [f64; 3], max: [f64; 3]) -> Self {
        Self {
            name: name.into(),
            min,
            max,
        }
    }

    /// Inclusive on every face.
    #[must_use]
    pub fn contains(&self, point: [f64; 3]) -> bool {
        (0..3).all(|i| point[i] >= self.min[i] && point[i] <= self.max[i])
    }
}

impl From<&ZoneConfig> for TriggerZone {
    fn from(zone: &ZoneConfig) -> Self {
        Self::new(zone.name.clone(), zone.min, zone.max)
    }
}

/// Zone transition reported to the application
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ZoneEvent {
    Entered(String),
}

/// Tracks which zones the TCP is in
#[derive(Debug, Clone, Default)]
pub struct ZoneMonitor {
    zones: Vec<TriggerZone>,
    inside: Vec<bool>,
}

impl ZoneMonitor {
    #[must_use]
    pub fn new(zones: Vec<TriggerZone>) -> Self {
        let inside = vec![false; zones.len()];
        Self { zones, inside }
    }

    #[must_use]
    pub fn from_config(zones: &[ZoneConfig]) -> Self {
        Self::new(zones.iter().map(TriggerZone::from).collect())
    }

    #[must_use]
    pub fn zones(&self) -> &[TriggerZone] {
        &self.zones
    }

    /// Updates membership for `position` and returns the zones just entered.
    ///
    /// # Examples
    ///
    /// ```
    /// use arm_teleop::mirror::geofence::{TriggerZone, ZoneEvent, ZoneMonitor};
    ///
    /// let mut monitor = ZoneMonitor::new(vec![TriggerZone::new("A", [0.0; 3], [1.0; 3])]);
    /// assert_eq!(monitor.update([0.5, 0.5, 0.5]), vec![ZoneEvent::Entered("A".into())]);
    /// assert!(monitor.update([0.6, 0.5, 0.5]).is_empty());
    /// ```
    pub fn update(&mut self, position: [f64; 3]) -> Vec<ZoneEvent> {
        let mut events = Vec::new();
        for (zone, was_inside) in self.zones.iter().zip(self.inside.iter_mut()) {
            let now_inside = zone.contains(position);
            if now_inside && !*was_inside {
                events.push(ZoneEvent::Entered(zone.name.clone()));
            }
            *was_inside = now_inside;
        }
        events
    }
}
