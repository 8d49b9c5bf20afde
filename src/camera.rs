use crate::landmarks::LandmarkDetector;
use crate::render::AnnotatedFrame;
use crate::{ArmError, Result};
use image::RgbImage;
use std::sync::{Arc, Mutex};

/// An RGB8 camera frame.
pub type Frame = RgbImage;

/// Wrap a row-major RGB8 buffer, checking its length.
pub fn frame_from_rgb(width: u32, height: u32, data: Vec<u8>) -> Result<Frame> {
    let expected = width as usize * height as usize * 3;
    if data.len() != expected {
        return Err(ArmError::Camera(format!(
            "frame buffer is {} bytes, expected {} for {}x{}",
            data.len(),
            expected,
            width,
            height
        )));
    }
    RgbImage::from_raw(width, height, data)
        .ok_or_else(|| ArmError::Camera(format!("{}x{} frame does not fit", width, height)))
}

/// An open camera. Dropping it releases the device.
pub trait FrameCapture: Send {
    /// Read the next frame. `Ok(None)` means the stream has ended.
    fn read(&mut self) -> Result<Option<Frame>>;
}

/// Opens cameras and landmark detectors for tracking sessions.
pub trait VisionBackend: Send + Sync {
    fn open_camera(&self, index: u32) -> Result<Box<dyn FrameCapture>>;

    fn create_detector(&self) -> Result<Box<dyn LandmarkDetector>>;
}

/// Single-slot mailbox holding the most recent annotated frame.
///
/// The acquisition thread overwrites it every frame; the UI reads it at its
/// own render cadence. Frames nobody read are dropped.
#[derive(Debug, Clone, Default)]
pub struct FrameSlot {
    inner: Arc<Mutex<SlotState>>,
}

#[derive(Debug, Default)]
struct SlotState {
    latest: Option<Arc<AnnotatedFrame>>,
    sequence: u64,
    taken: u64,
}

impl FrameSlot {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SlotState> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn store(&self, frame: AnnotatedFrame) {
        let mut state = self.lock();
        state.latest = Some(Arc::new(frame));
        state.sequence += 1;
    }

    /// The latest frame, whether or not it was seen before.
    pub fn latest(&self) -> Option<Arc<AnnotatedFrame>> {
        self.lock().latest.clone()
    }

    /// The latest frame if it arrived after the previous `take_new`.
    pub fn take_new(&self) -> Option<Arc<AnnotatedFrame>> {
        let mut state = self.lock();
        if state.sequence == state.taken {
            return None;
        }
        state.taken = state.sequence;
        state.latest.clone()
    }

    /// Number of frames stored since creation.
    pub fn sequence(&self) -> u64 {
        self.lock().sequence
    }

    pub fn clear(&self) {
        self.lock().latest = None;
    }
}
