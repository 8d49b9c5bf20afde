//! Planar 3-link inverse kinematics for the shoulder, elbow and wrist joints.
//!
//! The solver places the wrist joint L3 back from the target along the
//! target direction, solves the remaining 2-link problem with the law of
//! cosines, then orients the last link toward the target.

use crate::servo::RobotState;
use crate::types::{clamp_angle, JointId};
use crate::{ArmError, Result};

/// Link lengths in centimetres: upper arm, forearm, hand.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinkLengths {
    pub l1: f64,
    pub l2: f64,
    pub l3: f64,
}

impl LinkLengths {
    pub const fn new(l1: f64, l2: f64, l3: f64) -> Self {
        Self { l1, l2, l3 }
    }

    /// Maximum distance from the shoulder the end effector can reach.
    pub fn reach(&self) -> f64 {
        self.l1 + self.l2 + self.l3
    }
}

impl Default for LinkLengths {
    fn default() -> Self {
        Self::new(10.0, 7.0, 9.0)
    }
}

/// What happens to the Cartesian accumulator when a move leaves the workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReachPolicy {
    /// Keep the unreachable target; the operator has to move back.
    #[default]
    Accumulate,
    /// Undo the move that left the workspace.
    HoldLastReachable,
}

/// Mounting offsets added to the solved angles: joint 1, joint 2, joint 3.
pub const MOUNT_OFFSETS: [f64; 3] = [90.0, 0.0, 90.0];

/// Joint angles solved for a Cartesian target, in degrees, before mounting offsets.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IkSolution {
    pub angle1: f64,
    pub angle2: f64,
    pub angle3: f64,
}

impl IkSolution {
    /// Servo targets for shoulder, elbow and wrist with mounting offsets applied.
    pub fn servo_targets(&self) -> [f64; 3] {
        [
            clamp_angle(self.angle1 + MOUNT_OFFSETS[0]),
            clamp_angle(self.angle2 + MOUNT_OFFSETS[1]),
            clamp_angle(self.angle3 + MOUNT_OFFSETS[2]),
        ]
    }
}

/// Solve joint angles that put the end effector at (x, y).
///
/// Fails with [`ArmError::OutOfReach`] when the target is farther than
/// L1 + L2 + L3 from the base.
pub fn solve_ik(links: &LinkLengths, target_x: f64, target_y: f64) -> Result<IkSolution> {
    let LinkLengths { l1, l2, l3 } = *links;
    let dist = target_x.hypot(target_y);
    if !dist.is_finite() || dist > links.reach() {
        return Err(ArmError::OutOfReach {
            x: target_x,
            y: target_y,
            reach: links.reach(),
        });
    }

    // Direction is undefined at the origin; fall back to +x.
    let (ux, uy) = if dist < 1e-9 {
        (1.0, 0.0)
    } else {
        (target_x / dist, target_y / dist)
    };
    let wrist_x = target_x - l3 * ux;
    let wrist_y = target_y - l3 * uy;
    let wrist_dist = wrist_x.hypot(wrist_y);

    let cos_angle2 =
        ((wrist_dist * wrist_dist - l1 * l1 - l2 * l2) / (2.0 * l1 * l2)).clamp(-1.0, 1.0);
    let angle2 = cos_angle2.acos();

    let angle1 = wrist_y.atan2(wrist_x) - (l2 * angle2.sin()).atan2(l1 + l2 * angle2.cos());
    let angle3 = (target_y - wrist_y).atan2(target_x - wrist_x) - (angle1 + angle2);

    Ok(IkSolution {
        angle1: angle1.to_degrees(),
        angle2: angle2.to_degrees(),
        angle3: angle3.to_degrees(),
    })
}

/// Move the Cartesian target by (dx, dy) and update the positional joints.
///
/// Returns the shoulder, elbow and wrist angles written to the joint state.
/// On failure the joint state is untouched; the accumulator follows `policy`.
pub fn update_position(
    state: &mut RobotState,
    links: &LinkLengths,
    dx: f64,
    dy: f64,
    policy: ReachPolicy,
) -> Result<[f64; 3]> {
    let previous = state.position;
    state.position.x += dx;
    state.position.y += dy;

    match solve_ik(links, state.position.x, state.position.y) {
        Ok(solution) => {
            let targets = solution.servo_targets();
            for (joint, angle) in JointId::POSITIONAL.iter().zip(targets) {
                state.joints.set(*joint, angle);
            }
            log::debug!(
                "IK ({:.1}, {:.1}) -> {:.1} {:.1} {:.1}",
                state.position.x,
                state.position.y,
                targets[0],
                targets[1],
                targets[2]
            );
            Ok(targets)
        }
        Err(e) => {
            log::warn!("{}", e);
            if policy == ReachPolicy::HoldLastReachable {
                state.position = previous;
            }
            Err(e)
        }
    }
}
