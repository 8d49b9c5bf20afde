use crate::ArmError;

/// Lower servo limit in degrees.
pub const ANGLE_MIN: f64 = 0.0;
/// Upper servo limit in degrees.
pub const ANGLE_MAX: f64 = 180.0;

/// Clamp an angle into the servo range.
pub fn clamp_angle(angle: f64) -> f64 {
    angle.clamp(ANGLE_MIN, ANGLE_MAX)
}

/// Servo channel on the arm controller board.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JointId {
    /// Continuous-rotation base servo, driven by speed (90 = stop).
    Base = 0,
    Shoulder = 1,
    Elbow = 2,
    Wrist = 3,
}

impl JointId {
    /// Joints driven by absolute position.
    pub const POSITIONAL: [JointId; 3] = [JointId::Shoulder, JointId::Elbow, JointId::Wrist];

    /// Servo id used on the wire.
    pub fn id(self) -> u8 {
        self as u8
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn is_positional(self) -> bool {
        self != JointId::Base
    }
}

impl TryFrom<u8> for JointId {
    type Error = ArmError;

    fn try_from(id: u8) -> Result<Self, Self::Error> {
        match id {
            0 => Ok(JointId::Base),
            1 => Ok(JointId::Shoulder),
            2 => Ok(JointId::Elbow),
            3 => Ok(JointId::Wrist),
            other => Err(ArmError::InvalidJoint(other)),
        }
    }
}

/// Commanded angles of the four servos, in degrees.
///
/// Every write is clamped to [0, 180], so a stored value is always a valid
/// servo command.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JointState {
    angles: [f64; 4],
}

impl JointState {
    /// Power-on pose: base stopped, positional joints at zero.
    pub const HOME: [f64; 4] = [90.0, 0.0, 0.0, 0.0];

    pub fn new(angles: [f64; 4]) -> Self {
        let mut state = Self { angles: [0.0; 4] };
        for (slot, angle) in state.angles.iter_mut().zip(angles) {
            *slot = clamp_angle(angle);
        }
        state
    }

    pub fn get(&self, joint: JointId) -> f64 {
        self.angles[joint.index()]
    }

    /// Store an angle, clamped into range. Returns the stored value.
    pub fn set(&mut self, joint: JointId, angle: f64) -> f64 {
        let angle = if angle.is_finite() {
            clamp_angle(angle)
        } else {
            log::warn!("Ignoring non-finite angle for {:?}", joint);
            self.get(joint)
        };
        self.angles[joint.index()] = angle;
        angle
    }

    pub fn as_array(&self) -> [f64; 4] {
        self.angles
    }
}

impl Default for JointState {
    fn default() -> Self {
        Self::new(Self::HOME)
    }
}

/// Per-joint increment used by joint-mode step buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepConfig {
    steps: [u32; 3],
}

impl StepConfig {
    pub const DEFAULT_STEP: u32 = 20;

    /// Step for a positional joint. The base has no step and reports 0.
    pub fn get(&self, joint: JointId) -> u32 {
        match joint {
            JointId::Base => 0,
            other => self.steps[other.index() - 1],
        }
    }

    /// Set the step for a positional joint. Values below 1 are raised to 1.
    pub fn set(&mut self, joint: JointId, value: i32) -> crate::Result<u32> {
        if !joint.is_positional() {
            return Err(ArmError::InvalidJoint(joint.id()));
        }
        let step = value.max(1) as u32;
        self.steps[joint.index() - 1] = step;
        Ok(step)
    }
}

impl Default for StepConfig {
    fn default() -> Self {
        Self {
            steps: [Self::DEFAULT_STEP; 3],
        }
    }
}

/// End effector target in the arm plane, centimetres.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CartesianPosition {
    pub x: f64,
    pub y: f64,
}

impl CartesianPosition {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl Default for CartesianPosition {
    fn default() -> Self {
        Self { x: 20.0, y: 0.0 }
    }
}

/// Shoulder, elbow and wrist targets produced by one tracked frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServoAngles {
    pub shoulder: i32,
    pub elbow: i32,
    pub wrist: i32,
}

/// A 2D point or vector.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point2 {
    pub x: f64,
    pub y: f64,
}

impl Point2 {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn sub(self, other: Point2) -> Point2 {
        Point2::new(self.x - other.x, self.y - other.y)
    }

    pub fn norm(self) -> f64 {
        self.x.hypot(self.y)
    }

    pub fn dot(self, other: Point2) -> f64 {
        self.x * other.x + self.y * other.y
    }

    /// Z component of the 2D cross product.
    pub fn cross(self, other: Point2) -> f64 {
        self.x * other.y - self.y * other.x
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    /// Scale normalized [0, 1] coordinates to whole pixels, truncating.
    pub fn to_pixels(self, width: u32, height: u32) -> Point2 {
        Point2::new(
            (self.x * width as f64).trunc(),
            (self.y * height as f64).trunc(),
        )
    }
}
