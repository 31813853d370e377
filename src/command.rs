//! Turns a control request into a concrete outbound frame.
//!
//! Two strategies: a canned-frame lookup for the coil patterns the pump
//! controller has precomputed write-single-register frames for, and the
//! generic codec path for everything else. Valves have no canned table and
//! always take the generic path. Pure construction, no I/O; publishing is the
//! orchestrator's job.

use crate::error::{Error, Result};
use crate::profile::Device;
use crate::protocol;

/// Builds the command frame for an external control request.
///
/// `status` is the optional secondary flag carried by pump requests; it
/// selects between the two prebuilt frames of a canned entry and is ignored
/// on the generic path. A pump request with both coils released has no
/// applicable encoding and fails with [`Error::Unsupported`].
pub fn build_command(device: Device, coils: &[u8], status: u16) -> Result<Vec<u8>> {
    let profile = device.profile();
    if coils.len() != profile.coil_count {
        return Err(Error::InvalidShape {
            expected: profile.coil_count,
            got: coils.len(),
        });
    }

    if let Some(frame) = profile.canned_command(coils, status) {
        return Ok(frame.to_vec());
    }

    if device == Device::Pump && coils.iter().all(|&coil| coil == 0) {
        return Err(Error::Unsupported);
    }

    protocol::build_write(coils, profile)
}

/// Builds the remote-override frame that mirrors the device's current coil
/// state back to it, converting it out of local mode without changing any
/// coil. Always takes the generic path.
pub fn build_override(device: Device, coils: &[u8]) -> Result<Vec<u8>> {
    protocol::build_write(coils, device.profile())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crc::crc16;
    use assert_matches::assert_matches;

    fn hex(s: &str) -> Vec<u8> {
        (0..s.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&s[i..i + 2], 16).unwrap())
            .collect()
    }

    #[test]
    fn pump_single_coil_uses_canned_frame() {
        assert_eq!(
            build_command(Device::Pump, &[1, 0], 0).unwrap(),
            hex("01060000000089CA")
        );
        assert_eq!(
            build_command(Device::Pump, &[0, 1], 1).unwrap(),
            hex("01060001000119CA")
        );
    }

    #[test]
    fn pump_both_coils_take_generic_path() {
        assert_eq!(
            build_command(Device::Pump, &[1, 1], 1).unwrap(),
            hex("011000000002040001000163AF")
        );
    }

    #[test]
    fn pump_no_coils_is_unsupported() {
        assert_matches!(
            build_command(Device::Pump, &[0, 0], 0),
            Err(Error::Unsupported)
        );
    }

    #[test]
    fn wrong_shape_never_produces_a_frame() {
        assert_matches!(
            build_command(Device::Pump, &[1], 0),
            Err(Error::InvalidShape { expected: 2, got: 1 })
        );
        assert_matches!(
            build_command(Device::Sv1, &[1, 0], 0),
            Err(Error::InvalidShape { expected: 27, got: 2 })
        );
        assert_matches!(
            build_override(Device::Pump, &[1, 0, 0]),
            Err(Error::InvalidShape { expected: 2, got: 3 })
        );
    }

    #[test]
    fn valve_command_is_generic_with_valid_checksum() {
        let mut coils = vec![0u8; 27];
        coils[3] = 1;
        let frame = build_command(Device::Sv2, &coils, 0).unwrap();
        assert_eq!(&frame[..7], &hex("01100000000204")[..]);
        let (body, tail) = frame.split_at(frame.len() - 2);
        assert_eq!(crc16(body).to_le_bytes(), tail);
    }

    #[test]
    fn override_mirrors_coils() {
        let frame = build_override(Device::Pump, &[1, 0]).unwrap();
        assert_eq!(&frame[7..11], &[0x00, 0x01, 0x00, 0x00]);
        let (body, tail) = frame.split_at(frame.len() - 2);
        assert_eq!(crc16(body).to_le_bytes(), tail);
    }
}
