/// Errors raised by the arm controller, its kinematics and its collaborators.
#[derive(Debug, thiserror::Error)]
pub enum ArmError {
    #[error("Target ({x:.1}, {y:.1}) out of reach (max {reach:.1} cm)")]
    OutOfReach { x: f64, y: f64, reach: f64 },

    #[error("Failed to connect to {port}: {reason}")]
    Connect { port: String, reason: String },

    #[error("Serial link not connected")]
    NotConnected,

    #[error("Serial write failed: {0}")]
    Write(#[from] std::io::Error),

    #[error("Camera error: {0}")]
    Camera(String),

    #[error("Detector error: {0}")]
    Detector(String),

    #[error("Failed to spawn worker thread: {0}")]
    ThreadSpawn(String),

    #[error("Motion rejected while {0} is driving the arm")]
    ModeConflict(&'static str),

    #[error("Invalid joint id {0}")]
    InvalidJoint(u8),

    #[error("Invalid servo command: {0:?}")]
    InvalidCommand(String),
}
