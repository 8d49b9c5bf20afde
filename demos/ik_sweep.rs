//! Sweep the Cartesian target across the arm's workspace and print the
//! servo commands it would send.
//!
//! Usage: cargo run --example ik_sweep

use armtrack::{ArmConfig, CaptureConnector, CaptureLink, InputEvent};
use std::sync::Arc;

/// Tracking is not used here.
struct NoCamera;

impl armtrack::VisionBackend for NoCamera {
    fn open_camera(&self, index: u32) -> armtrack::Result<Box<dyn armtrack::FrameCapture>> {
        Err(armtrack::ArmError::Camera(format!("no camera {}", index)))
    }

    fn create_detector(&self) -> armtrack::Result<Box<dyn armtrack::LandmarkDetector>> {
        Err(armtrack::ArmError::Detector("no detector".into()))
    }
}

fn main() {
    env_logger::init();

    let config = ArmConfig::from_env();
    let links = config.links;
    println!(
        "Links: L1={} L2={} L3={} (reach {:.1} cm)",
        links.l1,
        links.l2,
        links.l3,
        links.reach()
    );

    for (x, y) in [(15.0, 0.0), (10.0, 10.0), (0.0, 20.0), (26.0, 0.0), (30.0, 0.0)] {
        match armtrack::solve_ik(&links, x, y) {
            Ok(solution) => {
                let [s, e, w] = solution.servo_targets();
                print!(
                    "({:>5.1}, {:>5.1}) -> a1={:+7.2} a2={:+7.2} a3={:+7.2}",
                    x, y, solution.angle1, solution.angle2, solution.angle3
                );
                println!("  servos=[{:.0}, {:.0}, {:.0}]", s, e, w);
            }
            Err(e) => println!("({:>5.1}, {:>5.1}) -> {}", x, y, e),
        }
    }

    // Drive the controller along a path with a dry-run link.
    let link = CaptureLink::new();
    let mut arm = armtrack::Controller::new(
        config,
        Box::new(CaptureConnector::new(link.clone())),
        Arc::new(NoCamera),
    );
    if let Err(e) = arm.handle(InputEvent::Connect {
        port: "dry-run".into(),
        baud_rate: armtrack::config::DEFAULT_BAUD_RATE,
    }) {
        eprintln!("Failed to connect: {}", e);
        std::process::exit(1);
    }

    println!();
    for step in 0..12 {
        let (dx, dy) = if step < 8 { (-1.0, 1.0) } else { (1.0, 0.0) };
        link.clear();
        match arm.handle(InputEvent::MoveCartesian { dx, dy }) {
            Ok(()) => {
                let p = arm.state().position;
                println!("target=({:>5.1}, {:>5.1})  {}", p.x, p.y, link.lines().join(" | "));
            }
            Err(e) => println!("{}", e),
        }
    }
}
