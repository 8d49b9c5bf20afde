//! Line protocol spoken by the arm's microcontroller.
//!
//! Each command is one ASCII line: `M <servo_id> <angle>\n`.
//! - servo 0: continuous-rotation base, value is a speed (90 = stop)
//! - servo 1..3: shoulder, elbow, wrist absolute position in degrees
//!
//! The board sends no acknowledgement.

use crate::types::{JointId, ANGLE_MAX, ANGLE_MIN};
use crate::{ArmError, Result};

pub const COMMAND_PREFIX: &str = "M";
pub const SERVO_BASE: u8 = 0;
pub const SERVO_SHOULDER: u8 = 1;
pub const SERVO_ELBOW: u8 = 2;
pub const SERVO_WRIST: u8 = 3;

/// Value sent in place of a non-finite angle (base stopped, joints centred).
pub const FALLBACK_VALUE: i32 = 90;

/// Convert an angle to the integer sent on the wire: clamped to [0, 180],
/// truncated toward zero.
pub fn wire_value(angle: f64) -> i32 {
    if !angle.is_finite() {
        log::warn!("Non-finite servo angle {}, sending {}", angle, FALLBACK_VALUE);
        return FALLBACK_VALUE;
    }
    angle.clamp(ANGLE_MIN, ANGLE_MAX) as i32
}

/// Build the command line for one servo.
pub fn encode_command(servo_id: u8, angle: f64) -> String {
    format!("{} {} {}\n", COMMAND_PREFIX, servo_id, wire_value(angle))
}

/// Parse a command line back into its servo and value.
pub fn parse_command(line: &str) -> Result<(JointId, i32)> {
    let invalid = || ArmError::InvalidCommand(line.to_string());
    let mut fields = line.trim_end_matches(&['\r', '\n'][..]).split(' ');

    if fields.next() != Some(COMMAND_PREFIX) {
        return Err(invalid());
    }
    let id = fields
        .next()
        .and_then(|f| f.parse::<u8>().ok())
        .ok_or_else(invalid)?;
    let value = fields
        .next()
        .and_then(|f| f.parse::<i32>().ok())
        .ok_or_else(invalid)?;
    if fields.next().is_some() || !(0..=180).contains(&value) {
        return Err(invalid());
    }
    Ok((JointId::try_from(id)?, value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_command() {
        assert_eq!(encode_command(SERVO_ELBOW, 45.0), "M 2 45\n");
        assert_eq!(encode_command(SERVO_BASE, 90.0), "M 0 90\n");
    }

    #[test]
    fn test_encode_clamps_and_truncates() {
        assert_eq!(encode_command(SERVO_SHOULDER, 200.0), "M 1 180\n");
        assert_eq!(encode_command(SERVO_SHOULDER, -3.0), "M 1 0\n");
        assert_eq!(encode_command(SERVO_WRIST, 99.9), "M 3 99\n");
    }

    #[test]
    fn test_encode_never_sends_nan() {
        assert_eq!(encode_command(SERVO_WRIST, f64::NAN), "M 3 90\n");
        assert_eq!(encode_command(SERVO_WRIST, f64::INFINITY), "M 3 90\n");
    }

    #[test]
    fn test_parse_command() {
        assert_eq!(parse_command("M 3 120\n").unwrap(), (JointId::Wrist, 120));
        assert_eq!(parse_command("M 0 90\r\n").unwrap(), (JointId::Base, 90));
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for line in ["", "M", "M 1", "X 1 20\n", "M 1 abc\n", "M 1 200\n", "M 1 20 5\n"] {
            assert!(parse_command(line).is_err(), "accepted {:?}", line);
        }
        assert!(matches!(parse_command("M 7 20\n"), Err(ArmError::InvalidJoint(7))));
    }
}
