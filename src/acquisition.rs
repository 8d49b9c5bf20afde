use crate::calibration::SharedCalibration;
use crate::camera::{FrameCapture, FrameSlot, VisionBackend};
use crate::landmarks::LandmarkDetector;
use crate::pipeline::PoseTracker;
use crate::render;
use crate::types::ServoAngles;
use crate::{ArmError, Result};
use crossbeam_channel::{Sender, TrySendError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

bitflags::bitflags! {
    /// Which results a tracking session publishes.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Outputs: u8 {
        /// Annotated frames to the frame slot.
        const FRAMES = 1 << 0;
        /// Servo angle triples to the angle channel.
        const ANGLES = 1 << 1;
    }
}

/// Where a session delivers its results.
#[derive(Clone)]
pub struct Sinks {
    pub frames: FrameSlot,
    pub angles: Sender<ServoAngles>,
}

/// Handle to a running camera tracking session.
///
/// A dedicated thread owns the capture device and detector, runs the pose
/// pipeline on every frame and publishes results to the [`Sinks`].
pub struct AcquisitionLoop {
    stop_flag: Arc<AtomicBool>,
    thread: Option<std::thread::JoinHandle<()>>,
    calibration: SharedCalibration,
    camera_index: u32,
    outputs: Outputs,
}

impl AcquisitionLoop {
    /// Open camera `camera_index` and a detector, then start the worker thread.
    ///
    /// The device is opened before the thread starts, so open failures are
    /// returned here rather than logged from the worker.
    pub fn start(
        backend: &dyn VisionBackend,
        camera_index: u32,
        outputs: Outputs,
        sinks: Sinks,
        frame_delay: Duration,
    ) -> Result<AcquisitionLoop> {
        let capture = backend.open_camera(camera_index)?;
        let detector = backend.create_detector()?;
        let calibration = SharedCalibration::new();
        let tracker = PoseTracker::new(calibration.clone());
        let stop_flag = Arc::new(AtomicBool::new(false));
        let stop_clone = stop_flag.clone();

        let thread = std::thread::Builder::new()
            .name("armtrack-vision".into())
            .spawn(move || {
                acquisition_loop(
                    capture,
                    detector,
                    tracker,
                    outputs,
                    sinks,
                    frame_delay,
                    stop_clone,
                );
            })
            .map_err(|e| ArmError::ThreadSpawn(e.to_string()))?;

        log::info!("Tracking started on camera {} ({:?})", camera_index, outputs);

        Ok(AcquisitionLoop {
            stop_flag,
            thread: Some(thread),
            calibration,
            camera_index,
            outputs,
        })
    }

    /// Calibration shared with this session's pipeline.
    pub fn calibration(&self) -> &SharedCalibration {
        &self.calibration
    }

    pub fn camera_index(&self) -> u32 {
        self.camera_index
    }

    pub fn outputs(&self) -> Outputs {
        self.outputs
    }

    /// Whether the worker thread is still processing frames.
    pub fn is_running(&self) -> bool {
        !self.stop_flag.load(Ordering::Relaxed)
            && self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Stop the worker and wait for it to release the camera.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop_flag.store(true, Ordering::Relaxed);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::error!("Tracking thread panicked");
            }
            log::info!("Tracking stopped on camera {}", self.camera_index);
        }
    }
}

impl Drop for AcquisitionLoop {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Per-frame loop run on the tracking thread.
///
/// Capture and detector errors skip the frame. A full angle queue drops the
/// new triple. The loop ends on the stop flag, the end of the camera stream
/// or a dropped angle receiver.
fn acquisition_loop(
    mut capture: Box<dyn FrameCapture>,
    mut detector: Box<dyn LandmarkDetector>,
    mut tracker: PoseTracker,
    outputs: Outputs,
    sinks: Sinks,
    frame_delay: Duration,
    stop_flag: Arc<AtomicBool>,
) {
    let mut frames: u64 = 0;
    let mut tracked: u64 = 0;
    let mut dropped: u64 = 0;

    loop {
        if stop_flag.load(Ordering::Relaxed) {
            log::debug!("Tracking thread stopping (stop flag set)");
            break;
        }

        let frame = match capture.read() {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                log::info!("Camera stream ended");
                break;
            }
            Err(e) => {
                log::warn!("Frame capture failed: {}", e);
                std::thread::sleep(frame_delay);
                continue;
            }
        };
        frames += 1;

        let pose = match detector.detect(&frame) {
            Ok(detection) => tracker.process(&detection, frame.width(), frame.height()),
            Err(e) => {
                log::warn!("Landmark detection failed: {}", e);
                None
            }
        };

        let angles = pose.as_ref().map(|p| p.angles);
        if outputs.contains(Outputs::FRAMES) {
            sinks.frames.store(render::annotate(frame, pose.as_ref()));
        }

        if let Some(angles) = angles {
            tracked += 1;
            if outputs.contains(Outputs::ANGLES) {
                match sinks.angles.try_send(angles) {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) => {
                        dropped += 1;
                        log::trace!("Angle queue full, dropping tracked angles");
                    }
                    Err(TrySendError::Disconnected(_)) => {
                        log::info!("Angle receiver dropped, stopping tracking thread");
                        break;
                    }
                }
            }
        }

        std::thread::sleep(frame_delay);
    }

    // Release the device before the thread can be joined.
    drop(capture);
    log::info!(
        "Tracking thread exiting: {} frames, {} tracked, {} dropped",
        frames,
        tracked,
        dropped
    );
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::camera::Frame;
    use crate::config::ANGLE_QUEUE_CAPACITY;
    use crate::landmarks::Detection;
    use crate::pipeline::tests::arm_detection;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    /// Camera backend that serves blank frames and a fixed detection.
    ///
    /// Tracks how many captures are open so tests can check device release.
    #[derive(Clone)]
    pub(crate) struct FakeVision {
        pub open: Arc<AtomicUsize>,
        pub opened: Arc<Mutex<Vec<u32>>>,
        /// Frames per capture before the stream ends; `None` = endless.
        pub frame_limit: Option<usize>,
        pub palm_deg: Option<f64>,
        pub max_open: Arc<AtomicUsize>,
        /// Every n-th camera read fails.
        pub capture_fail_every: Option<u64>,
        /// Every n-th detection fails.
        pub detect_fail_every: Option<u64>,
        /// Injected read and detection failures so far.
        pub failures: Arc<AtomicUsize>,
    }

    impl FakeVision {
        pub fn new(palm_deg: Option<f64>) -> Self {
            Self {
                open: Arc::new(AtomicUsize::new(0)),
                opened: Arc::new(Mutex::new(Vec::new())),
                frame_limit: None,
                palm_deg,
                max_open: Arc::new(AtomicUsize::new(0)),
                capture_fail_every: None,
                detect_fail_every: None,
                failures: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    fn fails_now(calls: &mut u64, every: Option<u64>, failures: &AtomicUsize) -> bool {
        *calls += 1;
        let fail = every.is_some_and(|n| *calls % n == 0);
        if fail {
            failures.fetch_add(1, Ordering::SeqCst);
        }
        fail
    }

    struct FakeCapture {
        open: Arc<AtomicUsize>,
        remaining: Option<usize>,
        reads: u64,
        fail_every: Option<u64>,
        failures: Arc<AtomicUsize>,
    }

    impl FrameCapture for FakeCapture {
        fn read(&mut self) -> Result<Option<Frame>> {
            if fails_now(&mut self.reads, self.fail_every, &self.failures) {
                return Err(ArmError::Camera("read timed out".into()));
            }
            match self.remaining {
                Some(0) => return Ok(None),
                Some(ref mut n) => *n -= 1,
                None => {}
            }
            Ok(Some(Frame::new(64, 48)))
        }
    }

    impl Drop for FakeCapture {
        fn drop(&mut self) {
            self.open.fetch_sub(1, Ordering::SeqCst);
        }
    }

    struct FakeDetector {
        palm_deg: Option<f64>,
        calls: u64,
        fail_every: Option<u64>,
        failures: Arc<AtomicUsize>,
    }

    impl LandmarkDetector for FakeDetector {
        fn detect(&mut self, _frame: &Frame) -> Result<Detection> {
            if fails_now(&mut self.calls, self.fail_every, &self.failures) {
                return Err(ArmError::Detector("inference failed".into()));
            }
            Ok(self.palm_deg.map(arm_detection).unwrap_or_default())
        }
    }

    impl VisionBackend for FakeVision {
        fn open_camera(&self, index: u32) -> Result<Box<dyn FrameCapture>> {
            if self.open.load(Ordering::SeqCst) > 0 {
                return Err(ArmError::Camera("device busy".into()));
            }
            let now_open = self.open.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_open.fetch_max(now_open, Ordering::SeqCst);
            self.opened.lock().unwrap().push(index);
            Ok(Box::new(FakeCapture {
                open: self.open.clone(),
                remaining: self.frame_limit,
                reads: 0,
                fail_every: self.capture_fail_every,
                failures: self.failures.clone(),
            }))
        }

        fn create_detector(&self) -> Result<Box<dyn LandmarkDetector>> {
            Ok(Box::new(FakeDetector {
                palm_deg: self.palm_deg,
                calls: 0,
                fail_every: self.detect_fail_every,
                failures: self.failures.clone(),
            }))
        }
    }

    fn sinks() -> (Sinks, crossbeam_channel::Receiver<ServoAngles>) {
        let (tx, rx) = crossbeam_channel::bounded(ANGLE_QUEUE_CAPACITY);
        (
            Sinks {
                frames: FrameSlot::new(),
                angles: tx,
            },
            rx,
        )
    }

    #[test]
    fn test_emits_angles_and_frames() {
        let vision = FakeVision::new(Some(0.0));
        let (sinks, rx) = sinks();
        let frames = sinks.frames.clone();
        let session = AcquisitionLoop::start(
            &vision,
            0,
            Outputs::FRAMES | Outputs::ANGLES,
            sinks,
            Duration::from_millis(1),
        )
        .unwrap();

        let angles = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(angles.elbow, 90);
        assert_eq!(angles.wrist, 90);
        session.stop();
        let frame = frames.latest().unwrap();
        assert!(frame.overlay.is_some());
        assert_eq!(vision.open.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_preview_sends_no_angles() {
        let vision = FakeVision::new(Some(0.0));
        let (sinks, rx) = sinks();
        let frames = sinks.frames.clone();
        let session =
            AcquisitionLoop::start(&vision, 0, Outputs::FRAMES, sinks, Duration::from_millis(1))
                .unwrap();
        while frames.sequence() < 3 {
            std::thread::sleep(Duration::from_millis(1));
        }
        session.stop();
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_detection_miss_publishes_plain_frames() {
        let vision = FakeVision::new(None);
        let (sinks, rx) = sinks();
        let frames = sinks.frames.clone();
        let session = AcquisitionLoop::start(
            &vision,
            0,
            Outputs::FRAMES | Outputs::ANGLES,
            sinks,
            Duration::from_millis(1),
        )
        .unwrap();
        while frames.sequence() < 3 {
            std::thread::sleep(Duration::from_millis(1));
        }
        session.stop();
        assert!(rx.try_recv().is_err());
        assert!(frames.latest().unwrap().overlay.is_none());
    }

    #[test]
    fn test_stream_end_stops_thread() {
        let mut vision = FakeVision::new(Some(0.0));
        vision.frame_limit = Some(2);
        let (sinks, rx) = sinks();
        let session = AcquisitionLoop::start(
            &vision,
            1,
            Outputs::FRAMES | Outputs::ANGLES,
            sinks,
            Duration::from_millis(1),
        )
        .unwrap();
        assert!(rx.recv_timeout(Duration::from_secs(5)).is_ok());
        assert!(rx.recv_timeout(Duration::from_secs(5)).is_ok());
        while session.is_running() {
            std::thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(vision.open.load(Ordering::SeqCst), 0);
        session.stop();
    }

    #[test]
    fn test_restart_releases_camera() {
        let vision = FakeVision::new(Some(0.0));
        for index in [0, 1, 0] {
            let (sinks, _rx) = sinks();
            let session = AcquisitionLoop::start(
                &vision,
                index,
                Outputs::FRAMES | Outputs::ANGLES,
                sinks,
                Duration::from_millis(1),
            )
            .unwrap();
            assert_eq!(session.camera_index(), index);
            session.stop();
        }
        assert_eq!(*vision.opened.lock().unwrap(), vec![0, 1, 0]);
        assert_eq!(vision.max_open.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_calibration_capture_during_session() {
        let vision = FakeVision::new(Some(30.0));
        let (sinks, rx) = sinks();
        let session = AcquisitionLoop::start(
            &vision,
            0,
            Outputs::FRAMES | Outputs::ANGLES,
            sinks,
            Duration::from_millis(1),
        )
        .unwrap();
        rx.recv_timeout(Duration::from_secs(5)).unwrap();
        let captured = session.calibration().set_inner_ref().unwrap();
        assert!((captured - 30.0).abs() < 1.0);
        session.stop();
    }

    #[test]
    fn test_survives_capture_and_detector_errors() {
        let mut vision = FakeVision::new(Some(0.0));
        vision.capture_fail_every = Some(2);
        vision.detect_fail_every = Some(3);
        let (sinks, rx) = sinks();
        let session = AcquisitionLoop::start(
            &vision,
            0,
            Outputs::FRAMES | Outputs::ANGLES,
            sinks,
            Duration::from_millis(1),
        )
        .unwrap();
        for _ in 0..5 {
            let angles = rx.recv_timeout(Duration::from_secs(5)).unwrap();
            assert_eq!(angles.elbow, 90);
        }
        assert!(vision.failures.load(Ordering::SeqCst) >= 2);
        assert!(session.is_running());
        session.stop();
        assert_eq!(vision.open.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_stalled_receiver_keeps_queue_bounded() {
        let vision = FakeVision::new(Some(0.0));
        let (sinks, rx) = sinks();
        let frames = sinks.frames.clone();
        let session = AcquisitionLoop::start(
            &vision,
            0,
            Outputs::FRAMES | Outputs::ANGLES,
            sinks,
            Duration::from_millis(1),
        )
        .unwrap();

        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while rx.len() < ANGLE_QUEUE_CAPACITY && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(1));
        }
        let seen = frames.sequence();
        while frames.sequence() < seen + 20 && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(rx.len(), ANGLE_QUEUE_CAPACITY);
        assert!(session.is_running());

        // Draining makes room for fresh triples.
        let drained = rx.try_iter().count();
        assert!(drained >= ANGLE_QUEUE_CAPACITY);
        assert!(rx.recv_timeout(Duration::from_secs(5)).is_ok());
        session.stop();
    }
}
