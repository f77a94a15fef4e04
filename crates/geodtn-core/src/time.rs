//! Simulated clock value
//!
//! There is no process-wide clock. Whoever drives the simulation owns the
//! current [`SimTime`] and passes it into every call that needs it.

use std::ops::{Add, Sub};

use serde::{Deserialize, Serialize};

/// Seconds since the start of the simulation
#[derive(
    Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize, derive_more::Display,
)]
#[display("{_0:.1}s")]
pub struct SimTime(f64);

impl SimTime {
    pub const ZERO: SimTime = SimTime(0.0);

    pub const fn from_secs(secs: f64) -> Self {
        Self(secs)
    }

    pub fn from_minutes(minutes: f64) -> Self {
        Self(minutes * 60.0)
    }

    pub fn as_secs(&self) -> f64 {
        self.0
    }

    /// Whole seconds, truncated; the seed for reproducible random ordering
    pub fn whole_secs(&self) -> u64 {
        if self.0 <= 0.0 { 0 } else { self.0 as u64 }
    }

    /// Seconds elapsed since `earlier`
    pub fn since(&self, earlier: SimTime) -> f64 {
        self.0 - earlier.0
    }
}

impl Add<f64> for SimTime {
    type Output = SimTime;

    fn add(self, secs: f64) -> SimTime {
        SimTime(self.0 + secs)
    }
}

impl Sub for SimTime {
    type Output = f64;

    fn sub(self, rhs: SimTime) -> f64 {
        self.0 - rhs.0
    }
}
