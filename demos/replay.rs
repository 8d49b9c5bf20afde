//! Run the full tracking path on a synthetic arm: a virtual camera streams
//! landmarks of a forearm with a slowly rotating hand, and the controller
//! turns them into servo commands on a dry-run link.
//!
//! Usage: cargo run --example replay

use armtrack::camera::Frame;
use armtrack::landmarks::{
    Detection, HandDetection, Handedness, PoseLandmarks, HAND_LANDMARK_COUNT, PALM_BASE,
    POSE_LANDMARK_COUNT, RIGHT_ELBOW, RIGHT_HIP, RIGHT_SHOULDER, RIGHT_WRIST,
};
use armtrack::{ArmConfig, CaptureConnector, CaptureLink, Controller, InputEvent, Point2};
use std::sync::Arc;
use std::time::{Duration, Instant};

const WIDTH: u32 = 640;
const HEIGHT: u32 = 480;
const FRAMES: usize = 300;

struct SyntheticCamera {
    remaining: usize,
}

impl armtrack::FrameCapture for SyntheticCamera {
    fn read(&mut self) -> armtrack::Result<Option<Frame>> {
        if self.remaining == 0 {
            return Ok(None);
        }
        self.remaining -= 1;
        Ok(Some(Frame::new(WIDTH, HEIGHT)))
    }
}

struct SyntheticDetector {
    frame: usize,
}

impl armtrack::LandmarkDetector for SyntheticDetector {
    fn detect(&mut self, _frame: &Frame) -> armtrack::Result<Detection> {
        self.frame += 1;
        let t = self.frame as f64 / 30.0;

        // Every 40th frame the detector loses the hand.
        if self.frame % 40 == 0 {
            return Ok(Detection::default());
        }

        let mut pose = vec![Point2::new(0.5, 0.5); POSE_LANDMARK_COUNT];
        let shoulder = Point2::new(0.45, 0.35);
        let elbow_angle = 0.6 + 0.4 * t.sin();
        let elbow = Point2::new(0.45 + 0.15 * elbow_angle.sin(), 0.35 + 0.15 * elbow_angle.cos());
        let wrist = Point2::new(elbow.x + 0.15, elbow.y);
        pose[RIGHT_HIP] = Point2::new(0.45, 0.75);
        pose[RIGHT_SHOULDER] = shoulder;
        pose[RIGHT_ELBOW] = elbow;
        pose[RIGHT_WRIST] = wrist;

        let twist = (60.0 * (0.5 * t).sin()).to_radians();
        let palm = Point2::new(wrist.x + 0.08 * twist.cos(), wrist.y + 0.08 * twist.sin());
        let mut hand = vec![wrist; HAND_LANDMARK_COUNT];
        for &i in PALM_BASE.iter() {
            hand[i] = palm;
        }

        Ok(Detection {
            pose: Some(PoseLandmarks::new(pose)),
            hands: vec![HandDetection::new(Handedness::Right, hand)],
        })
    }
}

struct Synthetic;

impl armtrack::VisionBackend for Synthetic {
    fn open_camera(&self, _index: u32) -> armtrack::Result<Box<dyn armtrack::FrameCapture>> {
        Ok(Box::new(SyntheticCamera { remaining: FRAMES }))
    }

    fn create_detector(&self) -> armtrack::Result<Box<dyn armtrack::LandmarkDetector>> {
        Ok(Box::new(SyntheticDetector { frame: 0 }))
    }
}

fn main() {
    env_logger::init();

    let link = CaptureLink::new();
    let mut arm = Controller::new(
        ArmConfig::from_env(),
        Box::new(CaptureConnector::new(link.clone())),
        Arc::new(Synthetic),
    );

    let steps = [
        InputEvent::Connect {
            port: "dry-run".into(),
            baud_rate: 9600,
        },
        InputEvent::StartTracking,
    ];
    for event in steps {
        if let Err(e) = arm.handle(event) {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }

    let start = Instant::now();
    let mut applied = 0;
    let mut calibrated = false;
    while arm.mode() == armtrack::Mode::Vision {
        applied += arm.pump();

        if !calibrated && start.elapsed() > Duration::from_millis(500) {
            // Capture the current wrist pose as the inner end of the range.
            let _ = arm.handle(InputEvent::CaptureInner);
            calibrated = true;
            println!("Calibration: {:?}", arm.calibration());
        }

        if let Some(frame) = arm.frame_slot().take_new() {
            if let Some(overlay) = &frame.overlay {
                if applied % 25 == 1 {
                    println!("{}", overlay.hud.text);
                }
            }
        }
        std::thread::sleep(armtrack::config::RENDER_INTERVAL);
    }

    let lines = link.lines();
    println!(
        "\n{} angle triples applied, {} commands written in {:.1}s",
        applied,
        lines.len(),
        start.elapsed().as_secs_f64()
    );
    for line in lines.iter().rev().take(3).rev() {
        println!("  {}", line);
    }
}
