//! # armtrack - teleoperation core for a 4-servo desktop arm
//!
//! Drives a base, shoulder, elbow and wrist servo over a serial line from:
//! - joint-step and base-rotation buttons
//! - Cartesian moves resolved by a planar 3-link IK solver
//! - camera pose tracking: body and hand landmarks become smoothed,
//!   calibrated shoulder, elbow and wrist targets
//!
//! Camera, landmark detector and serial port are supplied by the caller
//! through [`VisionBackend`] and [`SerialConnector`]. Enable the `serial`
//! feature for [`serial::SystemSerial`].
//!
//! ## Quick Start
//! ```no_run
//! use armtrack::{ArmConfig, CaptureConnector, CaptureLink, Controller, InputEvent};
//! # fn backend() -> std::sync::Arc<dyn armtrack::VisionBackend> { unimplemented!() }
//!
//! let link = CaptureLink::new();
//! let mut arm = Controller::new(
//!     ArmConfig::from_env(),
//!     Box::new(CaptureConnector::new(link.clone())),
//!     backend(),
//! );
//! arm.handle(InputEvent::Connect { port: "COM3".into(), baud_rate: 9600 }).unwrap();
//! arm.handle(InputEvent::MoveCartesian { dx: -5.0, dy: 0.0 }).unwrap();
//! println!("{}", link.contents());
//! ```

pub mod error;
pub mod types;
pub mod config;
pub mod geometry;
pub mod smoothing;
pub mod calibration;
pub mod landmarks;
pub mod servo;
pub mod kinematics;
pub mod pipeline;
pub mod render;
pub mod camera;
pub mod acquisition;
pub mod protocol;
pub mod transport;
#[cfg(feature = "serial")]
pub mod serial;
pub mod arbiter;

pub use error::ArmError;
pub use types::*;
pub use config::ArmConfig;
pub use acquisition::{AcquisitionLoop, Outputs};
pub use arbiter::{Controller, InputEvent, Mode};
pub use camera::{frame_from_rgb, Frame, FrameCapture, FrameSlot, VisionBackend};
pub use kinematics::{solve_ik, IkSolution, LinkLengths};
pub use landmarks::{Detection, LandmarkDetector};
pub use transport::{CaptureConnector, CaptureLink, SerialConnector, SerialLink, ServoTransport};

/// Result type alias for armtrack operations.
pub type Result<T> = std::result::Result<T, ArmError>;
