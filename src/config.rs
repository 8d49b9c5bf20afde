use crate::kinematics::{LinkLengths, ReachPolicy};
use crate::types::CartesianPosition;
use std::time::Duration;

/// Default serial port of the arm controller board.
pub const DEFAULT_PORT: &str = "COM3";
/// Default serial baud rate.
pub const DEFAULT_BAUD_RATE: u32 = 9600;
/// Read timeout applied when opening the serial link.
pub const SERIAL_TIMEOUT: Duration = Duration::from_secs(1);
/// Pause between acquisition iterations.
pub const FRAME_DELAY: Duration = Duration::from_millis(10);
/// UI cadence for pulling the latest preview frame (~30 Hz).
pub const RENDER_INTERVAL: Duration = Duration::from_millis(33);
/// Tracked angle triples buffered between UI pumps. Newer triples are
/// dropped while the queue is full.
pub const ANGLE_QUEUE_CAPACITY: usize = 8;

/// Session configuration for the arm controller.
///
/// `from_env()` starts from the defaults and applies `ARMTRACK_*` overrides:
/// - `ARMTRACK_PORT`: serial port name
/// - `ARMTRACK_BAUD`: baud rate
/// - `ARMTRACK_CAMERA`: camera index for the next tracking session
/// - `ARMTRACK_INVERT_ELBOW`: send `180 - elbow` in vision drive
/// - `ARMTRACK_HOLD_REACH`: revert Cartesian moves that leave the workspace
#[derive(Debug, Clone)]
pub struct ArmConfig {
    pub port: String,
    pub baud_rate: u32,
    pub camera_index: u32,
    pub links: LinkLengths,
    pub start_position: CartesianPosition,
    pub reach_policy: ReachPolicy,
    /// The elbow motor is mounted reversed relative to the tracked elbow.
    pub invert_elbow: bool,
    pub frame_delay: Duration,
}

impl Default for ArmConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT.to_string(),
            baud_rate: DEFAULT_BAUD_RATE,
            camera_index: 0,
            links: LinkLengths::default(),
            start_position: CartesianPosition::default(),
            reach_policy: ReachPolicy::Accumulate,
            invert_elbow: true,
            frame_delay: FRAME_DELAY,
        }
    }
}

impl ArmConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let hold_reach = read_env_bool("ARMTRACK_HOLD_REACH", false);
        let config = Self {
            port: read_env_string("ARMTRACK_PORT", &defaults.port),
            baud_rate: read_env_u32("ARMTRACK_BAUD", defaults.baud_rate),
            camera_index: read_env_u32("ARMTRACK_CAMERA", defaults.camera_index),
            invert_elbow: read_env_bool("ARMTRACK_INVERT_ELBOW", defaults.invert_elbow),
            reach_policy: if hold_reach {
                ReachPolicy::HoldLastReachable
            } else {
                ReachPolicy::Accumulate
            },
            ..defaults
        };
        log::debug!("Loaded config: {:?}", config);
        config
    }
}

fn read_env_bool(name: &str, default: bool) -> bool {
    std::env::var(name)
        .ok()
        .and_then(|v| {
            let v = v.trim().to_ascii_lowercase();
            match v.as_str() {
                "1" | "true" | "yes" | "on" => Some(true),
                "0" | "false" | "no" | "off" => Some(false),
                _ => None,
            }
        })
        .unwrap_or(default)
}

fn read_env_u32(name: &str, default: u32) -> u32 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<u32>().ok())
        .unwrap_or(default)
}

// Port names are case sensitive on Linux, so no lowercasing here.
fn read_env_string(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}
