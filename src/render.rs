//! Preview annotation: skeleton lines drawn into the frame plus an overlay
//! of text labels for the UI to draw with its own font.

use crate::camera::Frame;
use crate::pipeline::TrackedPose;
use crate::types::Point2;
use image::Rgb;
use imageproc::drawing::draw_line_segment_mut;

/// Skeleton line color.
pub const SKELETON_COLOR: Rgb<u8> = Rgb([0, 0, 255]);
/// Half-width of skeleton lines in pixels.
const LINE_RADIUS: i64 = 1;

/// A text label anchored at a pixel position.
#[derive(Debug, Clone, PartialEq)]
pub struct Label {
    pub text: String,
    pub position: Point2,
}

/// Text drawn over a tracked frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Overlay {
    /// Shoulder, elbow and wrist angle readouts next to their joints.
    pub labels: Vec<Label>,
    /// Calibration status line.
    pub hud: Label,
}

impl Overlay {
    pub fn for_pose(pose: &TrackedPose) -> Self {
        let [_, shoulder, elbow, wrist] = pose.skeleton;
        let labels = vec![
            Label {
                text: pose.angles.shoulder.to_string(),
                position: Point2::new(shoulder.x + 20.0, shoulder.y - 20.0),
            },
            Label {
                text: pose.angles.elbow.to_string(),
                position: Point2::new(elbow.x + 20.0, elbow.y + 20.0),
            },
            Label {
                text: pose.angles.wrist.to_string(),
                position: Point2::new(wrist.x - 40.0, wrist.y - 20.0),
            },
        ];
        let hud = Label {
            text: format!(
                "Calib inner: {:.1}  outer: {:.1}  raw_wrist: {:.1}",
                pose.calibration.inner_ref, pose.calibration.outer_ref, pose.raw_wrist
            ),
            position: Point2::new(10.0, 30.0),
        };
        Self { labels, hud }
    }
}

/// A camera frame ready for display.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotatedFrame {
    pub frame: Frame,
    /// Present only when the arm was tracked in this frame.
    pub overlay: Option<Overlay>,
}

/// Draw the tracked skeleton into `frame` and attach the text overlay.
pub fn annotate(mut frame: Frame, pose: Option<&TrackedPose>) -> AnnotatedFrame {
    let overlay = pose.map(|pose| {
        draw_polyline(&mut frame, &pose.skeleton, SKELETON_COLOR);
        Overlay::for_pose(pose)
    });
    AnnotatedFrame { frame, overlay }
}

pub fn draw_polyline(frame: &mut Frame, points: &[Point2], color: Rgb<u8>) {
    for pair in points.windows(2) {
        draw_line(frame, pair[0], pair[1], color);
    }
}

/// Draw a line `2 * LINE_RADIUS + 1` pixels wide. Non-finite endpoints draw
/// nothing; endpoints far outside the frame are pulled in to bound the work.
pub fn draw_line(frame: &mut Frame, from: Point2, to: Point2, color: Rgb<u8>) {
    if !from.is_finite() || !to.is_finite() {
        return;
    }
    let (w, h) = (frame.width() as i64, frame.height() as i64);
    let bound = |v: f64, size: i64| (v as i64).clamp(-size, 2 * size);
    let (x0, y0) = (bound(from.x, w), bound(from.y, h));
    let (x1, y1) = (bound(to.x, w), bound(to.y, h));

    for oy in -LINE_RADIUS..=LINE_RADIUS {
        for ox in -LINE_RADIUS..=LINE_RADIUS {
            draw_line_segment_mut(
                frame,
                ((x0 + ox) as f32, (y0 + oy) as f32),
                ((x1 + ox) as f32, (y1 + oy) as f32),
                color,
            );
        }
    }
}
