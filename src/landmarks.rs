//! Landmark types produced by the pose and hand detector.
//!
//! Coordinates are normalized to [0, 1] across the frame, y pointing down,
//! following the 33-point body and 21-point hand layouts.

use crate::camera::Frame;
use crate::types::Point2;
use crate::Result;

// Body pose indices (right side of the body).
pub const RIGHT_SHOULDER: usize = 12;
pub const RIGHT_ELBOW: usize = 14;
pub const RIGHT_WRIST: usize = 16;
pub const RIGHT_HIP: usize = 24;
pub const POSE_LANDMARK_COUNT: usize = 33;

// Hand indices.
pub const HAND_WRIST: usize = 0;
pub const INDEX_MCP: usize = 5;
pub const MIDDLE_MCP: usize = 9;
pub const RING_MCP: usize = 13;
pub const PINKY_MCP: usize = 17;
pub const HAND_LANDMARK_COUNT: usize = 21;

/// Knuckles whose mean is used as the palm center.
pub const PALM_BASE: [usize; 4] = [INDEX_MCP, MIDDLE_MCP, RING_MCP, PINKY_MCP];

/// Body pose landmarks for one person.
#[derive(Debug, Clone, Default)]
pub struct PoseLandmarks {
    pub points: Vec<Point2>,
}

impl PoseLandmarks {
    pub fn new(points: Vec<Point2>) -> Self {
        Self { points }
    }

    pub fn get(&self, index: usize) -> Option<Point2> {
        self.points.get(index).copied()
    }

    /// Right hip, shoulder, elbow and wrist, if all were detected.
    pub fn right_arm(&self) -> Option<ArmLandmarks> {
        Some(ArmLandmarks {
            hip: self.get(RIGHT_HIP)?,
            shoulder: self.get(RIGHT_SHOULDER)?,
            elbow: self.get(RIGHT_ELBOW)?,
            wrist: self.get(RIGHT_WRIST)?,
        })
    }
}

/// The four body landmarks that drive the arm.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArmLandmarks {
    pub hip: Point2,
    pub shoulder: Point2,
    pub elbow: Point2,
    pub wrist: Point2,
}

/// Which hand the detector believes it saw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handedness {
    Left,
    Right,
    Unknown,
}

impl Handedness {
    pub fn from_label(label: &str) -> Self {
        match label.trim() {
            "Right" => Handedness::Right,
            "Left" => Handedness::Left,
            _ => Handedness::Unknown,
        }
    }
}

/// One detected hand.
#[derive(Debug, Clone)]
pub struct HandDetection {
    pub handedness: Handedness,
    pub points: Vec<Point2>,
}

impl HandDetection {
    pub fn new(handedness: Handedness, points: Vec<Point2>) -> Self {
        Self { handedness, points }
    }

    pub fn get(&self, index: usize) -> Option<Point2> {
        self.points.get(index).copied()
    }

    /// Mean of the four palm-base knuckles.
    pub fn palm_center(&self) -> Option<Point2> {
        let knuckles = PALM_BASE
            .iter()
            .map(|&i| self.get(i))
            .collect::<Option<Vec<_>>>()?;
        crate::geometry::centroid(&knuckles)
    }
}

/// Detector output for one frame.
#[derive(Debug, Clone, Default)]
pub struct Detection {
    pub pose: Option<PoseLandmarks>,
    pub hands: Vec<HandDetection>,
}

impl Detection {
    /// The first hand labelled right, otherwise the first hand detected.
    pub fn select_hand(&self) -> Option<&HandDetection> {
        self.hands
            .iter()
            .find(|h| h.handedness == Handedness::Right)
            .or_else(|| self.hands.first())
    }
}

/// Pose and hand landmark model.
///
/// Implementations wrap an external detector; one instance serves one
/// tracking session and runs on the acquisition thread.
pub trait LandmarkDetector: Send {
    fn detect(&mut self, frame: &Frame) -> Result<Detection>;
}
