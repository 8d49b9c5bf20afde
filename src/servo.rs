use crate::types::{clamp_angle, CartesianPosition, JointId, JointState, StepConfig};
use crate::{ArmError, Result};

/// Base speed that stops the continuous-rotation servo.
pub const BASE_STOP: f64 = 90.0;
/// Base speed while the forward hold button is pressed.
pub const BASE_FORWARD: f64 = 100.0;
/// Base speed while the reverse hold button is pressed.
pub const BASE_REVERSE: f64 = 80.0;
/// Base speed change per Cartesian-mode rotate click.
pub const BASE_ROTATE_STEP: f64 = 10.0;

/// Arm state owned by the controller: commanded joints, step sizes and the
/// Cartesian target accumulator.
#[derive(Debug, Clone, Default)]
pub struct RobotState {
    pub joints: JointState,
    pub steps: StepConfig,
    pub position: CartesianPosition,
}

impl RobotState {
    pub fn new(start: CartesianPosition) -> Self {
        Self {
            position: start,
            ..Self::default()
        }
    }

    pub fn set_step(&mut self, joint: JointId, value: i32) -> Result<u32> {
        let step = self.steps.set(joint, value)?;
        log::info!("Step for M{} set to {}", joint.id(), step);
        Ok(step)
    }

    /// Move a positional joint by one step in `direction` (sign only).
    pub fn adjust_servo(&mut self, joint: JointId, direction: i32) -> Result<f64> {
        if !joint.is_positional() {
            return Err(ArmError::InvalidJoint(joint.id()));
        }
        let delta = self.steps.get(joint) as f64 * direction.signum() as f64;
        Ok(self.joints.set(joint, self.joints.get(joint) + delta))
    }

    /// Set the base rotation speed directly (90 = stop).
    pub fn set_base_speed(&mut self, speed: f64) -> f64 {
        self.joints.set(JointId::Base, speed)
    }

    pub fn stop_base(&mut self) -> f64 {
        self.joints.set(JointId::Base, BASE_STOP)
    }

    /// Nudge the base speed from Cartesian mode.
    pub fn rotate_base(&mut self, direction: i32) -> f64 {
        let next = self.joints.get(JointId::Base) + BASE_ROTATE_STEP * direction.signum() as f64;
        self.joints.set(JointId::Base, clamp_angle(next))
    }

    /// Return all joints to the power-on pose. Steps and the Cartesian target are kept.
    pub fn reset(&mut self) {
        self.joints = JointState::default();
        log::info!("All motors reset to default");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adjust_servo_stays_in_range() {
        let mut state = RobotState::default();
        state.set_step(JointId::Shoulder, 70).unwrap();
        for _ in 0..10 {
            let angle = state.adjust_servo(JointId::Shoulder, 1).unwrap();
            assert!((0.0..=180.0).contains(&angle));
        }
        assert_eq!(state.joints.get(JointId::Shoulder), 180.0);
        for _ in 0..10 {
            state.adjust_servo(JointId::Shoulder, -1).unwrap();
        }
        assert_eq!(state.joints.get(JointId::Shoulder), 0.0);
    }

    #[test]
    fn test_adjust_servo_uses_direction_sign_only() {
        let mut state = RobotState::default();
        assert_eq!(state.adjust_servo(JointId::Elbow, 5).unwrap(), 20.0);
    }

    #[test]
    fn test_base_is_not_stepped() {
        let mut state = RobotState::default();
        assert!(state.adjust_servo(JointId::Base, 1).is_err());
    }

    #[test]
    fn test_base_speed_and_rotation() {
        let mut state = RobotState::default();
        assert_eq!(state.set_base_speed(BASE_FORWARD), 100.0);
        assert_eq!(state.stop_base(), 90.0);
        assert_eq!(state.rotate_base(-1), 80.0);
        for _ in 0..20 {
            state.rotate_base(1);
        }
        assert_eq!(state.joints.get(JointId::Base), 180.0);
    }

    #[test]
    fn test_reset_keeps_steps() {
        let mut state = RobotState::default();
        state.set_step(JointId::Wrist, 3).unwrap();
        state.adjust_servo(JointId::Wrist, 1).unwrap();
        state.reset();
        assert_eq!(state.joints.as_array(), JointState::HOME);
        assert_eq!(state.steps.get(JointId::Wrist), 3);
    }
}
