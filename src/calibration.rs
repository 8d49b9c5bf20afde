use crate::geometry::calibrated_map;
use std::sync::{Arc, Mutex, MutexGuard};

/// Raw wrist angles (signed degrees) that map to servo 0 and servo 180.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Calibration {
    pub inner_ref: f64,
    pub outer_ref: f64,
}

impl Calibration {
    pub const DEFAULT_INNER: f64 = -90.0;
    pub const DEFAULT_OUTER: f64 = 90.0;

    /// Wrist servo angle for a raw signed wrist angle.
    pub fn map(&self, raw: f64) -> f64 {
        calibrated_map(raw, self.inner_ref, self.outer_ref)
    }
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            inner_ref: Self::DEFAULT_INNER,
            outer_ref: Self::DEFAULT_OUTER,
        }
    }
}

#[derive(Debug, Default)]
struct CalibrationCell {
    calibration: Calibration,
    last_raw: Option<f64>,
}

/// Calibration and last raw wrist angle shared between the acquisition
/// thread and the controller.
///
/// Every accessor takes the lock once, copies what it needs and releases it
/// before returning.
#[derive(Debug, Clone, Default)]
pub struct SharedCalibration {
    cell: Arc<Mutex<CalibrationCell>>,
}

impl SharedCalibration {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, CalibrationCell> {
        // The cell holds plain values; a panic mid-update cannot leave it torn.
        self.cell.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Store the latest raw wrist angle and map it with the current calibration.
    ///
    /// Returns the servo angle and the calibration used.
    pub fn record(&self, raw: f64) -> (f64, Calibration) {
        let mut cell = self.lock();
        cell.last_raw = Some(raw);
        let calibration = cell.calibration;
        (calibration.map(raw), calibration)
    }

    /// Capture the last raw wrist angle as the inner reference.
    ///
    /// No-op returning `None` until a raw angle has been observed.
    pub fn set_inner_ref(&self) -> Option<f64> {
        let mut cell = self.lock();
        let raw = cell.last_raw?;
        cell.calibration.inner_ref = raw;
        log::info!("Wrist inner reference set to {:.1}", raw);
        Some(raw)
    }

    /// Capture the last raw wrist angle as the outer reference.
    pub fn set_outer_ref(&self) -> Option<f64> {
        let mut cell = self.lock();
        let raw = cell.last_raw?;
        cell.calibration.outer_ref = raw;
        log::info!("Wrist outer reference set to {:.1}", raw);
        Some(raw)
    }

    pub fn reset(&self) {
        self.lock().calibration = Calibration::default();
        log::info!("Wrist calibration reset");
    }

    pub fn calibration(&self) -> Calibration {
        self.lock().calibration
    }

    pub fn last_raw(&self) -> Option<f64> {
        self.lock().last_raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_requires_observation() {
        let shared = SharedCalibration::new();
        assert!(shared.set_inner_ref().is_none());
        assert!(shared.set_outer_ref().is_none());
        assert_eq!(shared.calibration(), Calibration::default());
    }

    #[test]
    fn test_capture_and_reset() {
        let shared = SharedCalibration::new();
        shared.record(-30.0);
        assert_eq!(shared.set_inner_ref(), Some(-30.0));
        shared.record(60.0);
        assert_eq!(shared.set_outer_ref(), Some(60.0));

        let (servo, calibration) = shared.record(15.0);
        assert_eq!(calibration.inner_ref, -30.0);
        assert_eq!(calibration.outer_ref, 60.0);
        assert!((servo - 90.0).abs() < 1e-9);

        shared.reset();
        assert_eq!(shared.calibration(), Calibration::default());
        assert_eq!(shared.last_raw(), Some(15.0));
    }

    #[test]
    fn test_same_references_map_to_center() {
        let shared = SharedCalibration::new();
        shared.record(25.0);
        shared.set_inner_ref();
        shared.set_outer_ref();
        assert_eq!(shared.record(-100.0).0, 90.0);
    }

    #[test]
    fn test_shared_across_threads() {
        let shared = SharedCalibration::new();
        let worker = shared.clone();
        std::thread::spawn(move || {
            for i in 0..100 {
                worker.record(i as f64);
            }
        })
        .join()
        .unwrap();
        assert_eq!(shared.last_raw(), Some(99.0));
    }
}
