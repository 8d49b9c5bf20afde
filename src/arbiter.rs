//! Routes operator input to the arm.
//!
//! [`Controller`] owns the robot state and the serial transport and is the
//! only writer to either. Manual input (joint steps, Cartesian moves) and the
//! vision session's angle stream both pass through it, and only one of them
//! drives the positional joints at a time.

use crate::acquisition::{AcquisitionLoop, Outputs, Sinks};
use crate::calibration::Calibration;
use crate::camera::{FrameSlot, VisionBackend};
use crate::config::{ArmConfig, ANGLE_QUEUE_CAPACITY};
use crate::kinematics::update_position;
use crate::render::AnnotatedFrame;
use crate::servo::{RobotState, BASE_FORWARD, BASE_REVERSE};
use crate::transport::{SerialConnector, ServoTransport};
use crate::types::{JointId, JointState, ServoAngles};
use crate::{ArmError, Result};
use crossbeam_channel::Receiver;
use std::sync::Arc;

/// Operator input from the control surface.
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    /// Change a positional joint's step size.
    SetStep { joint: JointId, value: i32 },
    /// Move a positional joint one step; `direction` is +1 or -1.
    StepJoint { joint: JointId, direction: i32 },
    /// Base hold button pressed; positive is forward.
    BaseHold { direction: i32 },
    /// Base hold button released.
    BaseRelease,
    StopBase,
    /// Move the Cartesian target by (dx, dy) centimetres.
    MoveCartesian { dx: f64, dy: f64 },
    /// Nudge the base speed from the Cartesian panel.
    RotateBase { direction: i32 },
    ResetAll,
    CaptureInner,
    CaptureOuter,
    ResetCalibration,
    /// Start camera tracking that drives the arm.
    StartTracking,
    /// Start camera tracking for display only.
    StartPreview,
    StopTracking,
    /// Camera for the next tracking start.
    SelectCamera(u32),
    Connect { port: String, baud_rate: u32 },
    Disconnect,
}

/// Which source currently drives the positional joints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Joint steps and Cartesian moves.
    Manual,
    /// Tracked pose drives shoulder, elbow and wrist.
    Vision,
    /// Tracking runs for display; manual control stays active.
    Preview,
}

struct Session {
    acquisition: AcquisitionLoop,
    angles: Receiver<ServoAngles>,
}

/// Arm controller: state, transport and the tracking session.
pub struct Controller {
    config: ArmConfig,
    state: RobotState,
    transport: ServoTransport,
    vision: Arc<dyn VisionBackend>,
    session: Option<Session>,
    frames: FrameSlot,
    camera_index: u32,
}

impl Controller {
    pub fn new(
        config: ArmConfig,
        connector: Box<dyn SerialConnector>,
        vision: Arc<dyn VisionBackend>,
    ) -> Self {
        Self {
            state: RobotState::new(config.start_position),
            camera_index: config.camera_index,
            config,
            transport: ServoTransport::new(connector),
            vision,
            session: None,
            frames: FrameSlot::new(),
        }
    }

    pub fn mode(&self) -> Mode {
        match &self.session {
            Some(s) if s.acquisition.outputs().contains(Outputs::ANGLES) => Mode::Vision,
            Some(_) => Mode::Preview,
            None => Mode::Manual,
        }
    }

    pub fn state(&self) -> &RobotState {
        &self.state
    }

    pub fn joints(&self) -> JointState {
        self.state.joints
    }

    pub fn config(&self) -> &ArmConfig {
        &self.config
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    /// Serial port of the current link.
    pub fn port(&self) -> Option<&str> {
        self.transport.port()
    }

    pub fn camera_index(&self) -> u32 {
        self.camera_index
    }

    /// Calibration of the running tracking session.
    pub fn calibration(&self) -> Option<Calibration> {
        self.session
            .as_ref()
            .map(|s| s.acquisition.calibration().calibration())
    }

    /// Most recent annotated camera frame, for the UI's render timer.
    pub fn latest_frame(&self) -> Option<Arc<AnnotatedFrame>> {
        self.frames.latest()
    }

    /// Shared handle to the preview frame slot.
    pub fn frame_slot(&self) -> FrameSlot {
        self.frames.clone()
    }

    /// Apply one input event.
    pub fn handle(&mut self, event: InputEvent) -> Result<()> {
        log::trace!("Input: {:?}", event);
        match event {
            InputEvent::SetStep { joint, value } => {
                self.state.set_step(joint, value)?;
            }
            InputEvent::StepJoint { joint, direction } => {
                self.ensure_manual()?;
                let angle = self.state.adjust_servo(joint, direction)?;
                self.send(joint, angle);
            }
            InputEvent::BaseHold { direction } => {
                let speed = if direction >= 0 { BASE_FORWARD } else { BASE_REVERSE };
                let speed = self.state.set_base_speed(speed);
                self.send(JointId::Base, speed);
            }
            InputEvent::BaseRelease | InputEvent::StopBase => {
                let speed = self.state.stop_base();
                self.send(JointId::Base, speed);
            }
            InputEvent::MoveCartesian { dx, dy } => {
                self.ensure_manual()?;
                let targets = update_position(
                    &mut self.state,
                    &self.config.links,
                    dx,
                    dy,
                    self.config.reach_policy,
                )?;
                for (joint, angle) in JointId::POSITIONAL.iter().zip(targets) {
                    self.send(*joint, angle);
                }
            }
            InputEvent::RotateBase { direction } => {
                let speed = self.state.rotate_base(direction);
                self.send(JointId::Base, speed);
            }
            InputEvent::ResetAll => {
                self.ensure_manual()?;
                self.state.reset();
                for (id, angle) in self.state.joints.as_array().into_iter().enumerate() {
                    self.send_raw(id as u8, angle);
                }
            }
            InputEvent::CaptureInner => {
                if let Some(session) = &self.session {
                    session.acquisition.calibration().set_inner_ref();
                }
            }
            InputEvent::CaptureOuter => {
                if let Some(session) = &self.session {
                    session.acquisition.calibration().set_outer_ref();
                }
            }
            InputEvent::ResetCalibration => {
                if let Some(session) = &self.session {
                    session.acquisition.calibration().reset();
                }
            }
            InputEvent::StartTracking => self.start_session(Outputs::FRAMES | Outputs::ANGLES)?,
            InputEvent::StartPreview => self.start_session(Outputs::FRAMES)?,
            InputEvent::StopTracking => self.stop_session(),
            InputEvent::SelectCamera(index) => {
                log::info!("Camera {} selected for next tracking start", index);
                self.camera_index = index;
            }
            InputEvent::Connect { port, baud_rate } => {
                self.transport.connect(&port, baud_rate)?;
            }
            InputEvent::Disconnect => self.transport.disconnect(),
        }
        Ok(())
    }

    /// Apply pending tracked angles to the arm. Call from the UI loop.
    ///
    /// Returns how many angle triples were applied. Also reaps a session
    /// whose camera stream ended.
    pub fn pump(&mut self) -> usize {
        let Some(session) = &self.session else {
            return 0;
        };
        // Checked before draining so triples sent just before the stream
        // ended are still applied.
        let finished = !session.acquisition.is_running();
        let pending: Vec<ServoAngles> = session.angles.try_iter().collect();

        if self.mode() == Mode::Vision {
            for angles in &pending {
                self.apply_tracked(*angles);
            }
        }
        if finished {
            log::info!("Tracking session ended");
            self.stop_session();
        }
        pending.len()
    }

    fn apply_tracked(&mut self, angles: ServoAngles) {
        let elbow = if self.config.invert_elbow {
            180 - angles.elbow
        } else {
            angles.elbow
        };
        let shoulder = self.state.joints.set(JointId::Shoulder, angles.shoulder as f64);
        let elbow = self.state.joints.set(JointId::Elbow, elbow as f64);
        let wrist = self.state.joints.set(JointId::Wrist, angles.wrist as f64);
        if let Err(err) = self.transport.send_angles(shoulder, elbow, wrist) {
            log::debug!("Tracked angles not sent: {}", err);
        }
    }

    fn ensure_manual(&self) -> Result<()> {
        if self.mode() == Mode::Vision {
            log::warn!("Manual motion ignored while tracking drives the arm");
            return Err(ArmError::ModeConflict("vision tracking"));
        }
        Ok(())
    }

    fn start_session(&mut self, outputs: Outputs) -> Result<()> {
        // One capture device and one writer at a time.
        self.stop_session();
        let (tx, rx) = crossbeam_channel::bounded(ANGLE_QUEUE_CAPACITY);
        let sinks = Sinks {
            frames: self.frames.clone(),
            angles: tx,
        };
        let acquisition = AcquisitionLoop::start(
            self.vision.as_ref(),
            self.camera_index,
            outputs,
            sinks,
            self.config.frame_delay,
        )?;
        self.session = Some(Session {
            acquisition,
            angles: rx,
        });
        Ok(())
    }

    fn stop_session(&mut self) {
        if let Some(session) = self.session.take() {
            session.acquisition.stop();
            self.frames.clear();
        }
    }

    fn send(&mut self, joint: JointId, angle: f64) {
        self.send_raw(joint.id(), angle);
    }

    // Write failures are logged by the transport and never escalated.
    fn send_raw(&mut self, servo_id: u8, angle: f64) {
        match self.transport.send_servo(servo_id, angle) {
            Ok(()) | Err(ArmError::NotConnected) => {}
            Err(e) => log::warn!("Servo {} write failed: {}", servo_id, e),
        }
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        self.stop_session();
    }
}
