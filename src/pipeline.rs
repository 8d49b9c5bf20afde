//! Per-frame pose pipeline: landmarks -> joint and wrist angles -> smoothed
//! servo targets.

use crate::calibration::{Calibration, SharedCalibration};
use crate::geometry::{joint_angle, signed_angle};
use crate::landmarks::{Detection, HAND_WRIST};
use crate::smoothing::AngleSmoother;
use crate::types::{clamp_angle, Point2, ServoAngles};

/// Result of one successfully tracked frame.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedPose {
    /// Smoothed targets, truncated for the servo stream.
    pub angles: ServoAngles,
    /// Smoothed shoulder, elbow and wrist servo angles.
    pub smoothed: [f64; 3],
    /// Signed forearm-to-palm angle before calibration.
    pub raw_wrist: f64,
    /// Calibration in effect for this frame.
    pub calibration: Calibration,
    /// Hip, shoulder, elbow and hand wrist in pixel coordinates.
    pub skeleton: [Point2; 4],
}

/// Stateful pipeline for one tracking session.
///
/// Owns the smoothing windows; shares calibration with the controller.
pub struct PoseTracker {
    calibration: SharedCalibration,
    smoother: AngleSmoother,
}

impl PoseTracker {
    pub fn new(calibration: SharedCalibration) -> Self {
        Self {
            calibration,
            smoother: AngleSmoother::new(),
        }
    }

    /// Process one frame's detections.
    ///
    /// Returns `None` when the arm or the hand was not fully detected; the
    /// smoothing windows are left untouched in that case.
    pub fn process(
        &mut self,
        detection: &Detection,
        width: u32,
        height: u32,
    ) -> Option<TrackedPose> {
        let arm = detection.pose.as_ref()?.right_arm()?;
        let hand = detection.select_hand()?;
        let hand_wrist = hand.get(HAND_WRIST)?;
        let palm = hand.palm_center()?;

        let points = [arm.hip, arm.shoulder, arm.elbow, arm.wrist, hand_wrist, palm];
        if !points.iter().all(|p| p.is_finite()) {
            log::debug!("Discarding frame with non-finite landmarks");
            return None;
        }

        let shoulder_angle = joint_angle(arm.hip, arm.shoulder, arm.elbow);
        let elbow_angle = joint_angle(arm.shoulder, arm.elbow, arm.wrist);

        // Wrist rotation is measured on the image grid, as the camera sees it.
        let elbow_px = arm.elbow.to_pixels(width, height);
        let wrist_px = arm.wrist.to_pixels(width, height);
        let hand_wrist_px = hand_wrist.to_pixels(width, height);
        let palm_px = palm.to_pixels(width, height);
        let forearm = wrist_px.sub(elbow_px);
        let palm_dir = palm_px.sub(hand_wrist_px);
        let raw_wrist = signed_angle(forearm, palm_dir);

        let (wrist_servo, calibration) = self.calibration.record(raw_wrist);

        let smoothed = self.smoother.smooth([
            clamp_angle(shoulder_angle),
            clamp_angle(elbow_angle),
            clamp_angle(wrist_servo),
        ]);
        let angles = ServoAngles {
            shoulder: smoothed[0] as i32,
            elbow: smoothed[1] as i32,
            wrist: smoothed[2] as i32,
        };
        log::trace!(
            "Tracked S={} E={} W={} raw_wrist={:.1}",
            angles.shoulder,
            angles.elbow,
            angles.wrist,
            raw_wrist
        );

        Some(TrackedPose {
            angles,
            smoothed,
            raw_wrist,
            calibration,
            skeleton: [
                arm.hip.to_pixels(width, height),
                arm.shoulder.to_pixels(width, height),
                elbow_px,
                hand_wrist_px,
            ],
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::landmarks::{
        HandDetection, Handedness, PoseLandmarks, HAND_LANDMARK_COUNT, PALM_BASE,
        POSE_LANDMARK_COUNT, RIGHT_ELBOW, RIGHT_HIP, RIGHT_SHOULDER, RIGHT_WRIST,
    };

    /// Arm hanging straight down with the elbow bent 90 degrees forward and
    /// the palm rotated `palm_deg` from the forearm direction.
    pub(crate) fn arm_detection(palm_deg: f64) -> Detection {
        let mut pose = vec![Point2::new(0.5, 0.5); POSE_LANDMARK_COUNT];
        pose[RIGHT_HIP] = Point2::new(0.4, 0.8);
        pose[RIGHT_SHOULDER] = Point2::new(0.4, 0.4);
        pose[RIGHT_ELBOW] = Point2::new(0.4, 0.6);
        pose[RIGHT_WRIST] = Point2::new(0.6, 0.6);

        let wrist = Point2::new(0.6, 0.6);
        let rad = palm_deg.to_radians();
        let palm = Point2::new(wrist.x + 0.1 * rad.cos(), wrist.y + 0.1 * rad.sin());
        let mut hand = vec![wrist; HAND_LANDMARK_COUNT];
        for &i in PALM_BASE.iter() {
            hand[i] = palm;
        }

        Detection {
            pose: Some(PoseLandmarks::new(pose)),
            hands: vec![HandDetection::new(Handedness::Right, hand)],
        }
    }

    #[test]
    fn test_tracks_arm_angles() {
        let mut tracker = PoseTracker::new(SharedCalibration::new());
        let pose = tracker.process(&arm_detection(0.0), 1000, 1000).unwrap();
        // Upper arm along the torso, forearm at a right angle.
        assert_eq!(pose.angles.shoulder, 0);
        assert_eq!(pose.angles.elbow, 90);
        // Palm in line with the forearm maps to the middle of the default range.
        assert!(pose.raw_wrist.abs() < 1e-9);
        assert_eq!(pose.angles.wrist, 90);
    }

    #[test]
    fn test_wrist_rotation_sign() {
        let mut tracker = PoseTracker::new(SharedCalibration::new());
        let pose = tracker.process(&arm_detection(45.0), 1000, 1000).unwrap();
        assert!((pose.raw_wrist - 45.0).abs() < 1.0, "raw = {}", pose.raw_wrist);
        assert_eq!(pose.angles.wrist, 135);

        let mut tracker = PoseTracker::new(SharedCalibration::new());
        let pose = tracker.process(&arm_detection(-45.0), 1000, 1000).unwrap();
        assert!((pose.raw_wrist + 45.0).abs() < 1.0, "raw = {}", pose.raw_wrist);
    }

    #[test]
    fn test_records_raw_for_calibration() {
        let calibration = SharedCalibration::new();
        let mut tracker = PoseTracker::new(calibration.clone());
        tracker.process(&arm_detection(30.0), 1000, 1000).unwrap();
        assert_eq!(calibration.set_outer_ref().map(|r| r.round()), Some(30.0));
        let pose = tracker.process(&arm_detection(30.0), 1000, 1000).unwrap();
        assert_eq!(pose.calibration.outer_ref.round(), 30.0);
    }

    #[test]
    fn test_missing_hand_skips_frame() {
        let mut tracker = PoseTracker::new(SharedCalibration::new());
        let mut detection = arm_detection(0.0);
        detection.hands.clear();
        assert!(tracker.process(&detection, 640, 480).is_none());
    }

    #[test]
    fn test_missing_pose_skips_frame() {
        let mut tracker = PoseTracker::new(SharedCalibration::new());
        let mut detection = arm_detection(0.0);
        detection.pose = None;
        assert!(tracker.process(&detection, 640, 480).is_none());

        let mut detection = arm_detection(0.0);
        detection.pose = Some(PoseLandmarks::new(vec![Point2::default(); 15]));
        assert!(tracker.process(&detection, 640, 480).is_none());
    }

    #[test]
    fn test_miss_does_not_advance_smoothing() {
        let mut tracker = PoseTracker::new(SharedCalibration::new());
        tracker.process(&arm_detection(0.0), 1000, 1000).unwrap();
        let mut miss = arm_detection(90.0);
        miss.hands.clear();
        tracker.process(&miss, 1000, 1000);
        let pose = tracker.process(&arm_detection(0.0), 1000, 1000).unwrap();
        assert_eq!(pose.smoothed[2], 90.0);
    }

    #[test]
    fn test_non_finite_landmarks_skip_frame() {
        let mut tracker = PoseTracker::new(SharedCalibration::new());
        let mut detection = arm_detection(0.0);
        if let Some(pose) = detection.pose.as_mut() {
            pose.points[RIGHT_ELBOW] = Point2::new(f64::NAN, 0.5);
        }
        assert!(tracker.process(&detection, 640, 480).is_none());
    }

    #[test]
    fn test_smoothing_damps_jump() {
        let mut tracker = PoseTracker::new(SharedCalibration::new());
        for _ in 0..7 {
            tracker.process(&arm_detection(0.0), 1000, 1000).unwrap();
        }
        let pose = tracker.process(&arm_detection(90.0), 1000, 1000).unwrap();
        // Wrist servo jumps 90 -> 180; one sample moves the mean by 90 / 7.
        assert!((pose.smoothed[2] - (90.0 + 90.0 / 7.0)).abs() < 1e-6);
    }
}
