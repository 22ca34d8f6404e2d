use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{info, warn};

/// Commands the pod's control systems understand.
pub const AVAILABLE_ACTIONS: &[&str] = &[
    "trigger_alarm",
    "notify_team",
    "activate_water_dispenser",
    "deactivate_water_dispenser",
    "log_status",
    "run_metagenomics_analysis",
    "increase_fan_speed",
    "decrease_fan_speed",
    "activate_electrical_heaters",
    "deactivate_electrical_heaters",
    "activate_cooling_system",
    "deactivate_cooling_system",
    "open_air_exchange",
    "close_air_exchange",
    "activate_CO2_scrubber",
    "deactivate_CO2_scrubber",
    "adjust_photoperiod",
    "increase_light_intensity",
    "decrease_light_intensity",
    "increase_nitrogen_level",
    "decrease_nitrogen_level",
    "flush_nutrient_line",
    "dispense_ph_up",
    "run_rnaseq_analysis",
    "schedule_retest",
];

/// Executes control commands. The returned text is informational only.
pub trait Actuator: Send + Sync {
    fn execute(&self, command: &str) -> String;
}

/// Logs commands instead of driving hardware.
#[derive(Debug, Default)]
pub struct SimulatedActuator {
    executed: AtomicU64,
}

impl SimulatedActuator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of recognized commands executed so far.
    pub fn executed(&self) -> u64 {
        self.executed.load(Ordering::Relaxed)
    }
}

impl Actuator for SimulatedActuator {
    fn execute(&self, command: &str) -> String {
        if !AVAILABLE_ACTIONS.contains(&command) {
            warn!(%command, "Unknown actuator command");
            return format!("Unknown action: {command}");
        }
        self.executed.fetch_add(1, Ordering::Relaxed);
        info!(%command, "Simulated actuator executed command");
        format!("Executed {command}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_command() {
        let actuator = SimulatedActuator::new();
        assert_eq!(actuator.execute("trigger_alarm"), "Executed trigger_alarm");
        assert_eq!(actuator.executed(), 1);
    }

    #[test]
    fn test_unknown_command() {
        let actuator = SimulatedActuator::new();
        assert_eq!(actuator.execute("launch_rocket"), "Unknown action: launch_rocket");
        assert_eq!(actuator.executed(), 0);
    }
}
