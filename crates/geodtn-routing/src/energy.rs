//! Battery model

use geodtn_core::{EnergyConfig, SimTime};

/// Remaining charge of one host
#[derive(Debug, Clone)]
pub struct EnergyModel {
    config: EnergyConfig,
    level: f64,
    last_update: SimTime,
    last_scan: SimTime,
}

impl EnergyModel {
    pub fn new(config: EnergyConfig, now: SimTime) -> Self {
        Self {
            level: config.initial,
            config,
            last_update: now,
            last_scan: now,
        }
    }

    pub fn level(&self) -> f64 {
        self.level
    }

    pub fn is_depleted(&self) -> bool {
        self.level <= 0.0
    }

    /// Charge for answering a peer's discovery scan
    pub fn reduce_discovery(&mut self) {
        self.reduce(self.config.scan_response);
    }

    /// Charge for time spent since the last update
    pub fn update(&mut self, now: SimTime, transferring: bool) {
        let elapsed = now.since(self.last_update).max(0.0);
        if transferring {
            self.reduce(self.config.transmit * elapsed);
        }
        if now.since(self.last_scan) >= self.config.scan_interval {
            self.reduce(self.config.scan);
            self.last_scan = now;
        }
        self.last_update = now;
    }

    fn reduce(&mut self, amount: f64) {
        self.level = (self.level - amount).max(0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_model(initial: f64) -> EnergyModel {
        EnergyModel::new(
            EnergyConfig {
                initial,
                scan: 1.0,
                scan_response: 2.0,
                transmit: 0.5,
                scan_interval: 10.0,
            },
            SimTime::ZERO,
        )
    }

    #[test]
    fn test_discovery_cost() {
        let mut model = make_model(10.0);
        model.reduce_discovery();
        assert_eq!(model.level(), 8.0);
    }

    #[test]
    fn test_transmit_and_scan_costs() {
        let mut model = make_model(100.0);
        model.update(SimTime::from_secs(4.0), true);
        assert_eq!(model.level(), 98.0);

        model.update(SimTime::from_secs(10.0), false);
        assert_eq!(model.level(), 97.0);
    }

    #[test]
    fn test_depletion_floors_at_zero() {
        let mut model = make_model(1.0);
        model.reduce_discovery();
        assert_eq!(model.level(), 0.0);
        assert!(model.is_depleted());
    }
}
