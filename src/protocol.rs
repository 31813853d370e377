//! Frame codec and coil bit mapping.
//!
//! Frames are RTU-style byte sequences: `[address][function code][payload...]
//! [checksum lo][checksum hi]`. Status responses are decoded into a
//! [`Reading`]; desired coil states are encoded into write-multiple-registers
//! command frames. The inbound checksum is not re-validated: the devices are
//! trusted on that path, and a frame failing the length or function-code check
//! is discarded anyway.

use crate::crc::crc16;
use crate::error::{Error, Result};
use crate::profile::{CoilLayout, ModeRule, Profile};

/// Control-source mode reported by a device. `Local` means a physical
/// override at the panel is active and remote commands are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Mode {
    Local,
    Remote,
}

/// A decoded status response: the reported mode plus one value per coil,
/// in coil order (`0` released, non-zero engaged).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Reading {
    pub mode: Mode,
    pub coils: Vec<u8>,
}

/// Coil window that is wired in reverse order on devices with the
/// reversed-bank quirk.
const REVERSED_BANK: std::ops::Range<usize> = 9..18;

/// Common header of every generic write command: write 2 registers (4 bytes)
/// starting at register 0 of slave 1.
const WRITE_HEADER: [u8; 7] = [0x01, 0x10, 0x00, 0x00, 0x00, 0x02, 0x04];

/// Extracts `count` ordered coil bits from a packed register value.
///
/// Bit `i` of `value` becomes coil `i`. With `reversed_bank` the 9..18 window
/// is reversed in place afterwards; the swap is involutive, so
/// [`pack_coils`] applies the same transform before packing.
fn unpack_coils(value: u32, count: usize, reversed_bank: bool) -> Vec<u8> {
    let mut coils: Vec<u8> = (0..count).map(|i| ((value >> i) & 1) as u8).collect();
    if reversed_bank {
        coils[REVERSED_BANK].reverse();
    }
    coils
}

/// Packs ordered coil bits back into a register value; exact inverse of
/// [`unpack_coils`].
fn pack_coils(coils: &[u8], reversed_bank: bool) -> u32 {
    let mut ordered = coils.to_vec();
    if reversed_bank {
        ordered[REVERSED_BANK].reverse();
    }
    ordered
        .iter()
        .enumerate()
        .fold(0u32, |value, (i, &coil)| {
            if coil != 0 {
                value | (1 << i)
            } else {
                value
            }
        })
}

/// Parses a raw status response into a [`Reading`].
///
/// Rejects any buffer whose length or function-code byte deviates from the
/// profile; such frames must never reach the cache.
pub fn parse(raw: &[u8], profile: &Profile) -> Result<Reading> {
    if raw.len() != profile.response_len {
        return Err(Error::InvalidLength {
            expected: profile.response_len,
            got: raw.len(),
        });
    }
    if raw[1] != profile.function_code {
        return Err(Error::InvalidFunction {
            expected: profile.function_code,
            got: raw[1],
        });
    }

    let coils = match profile.layout {
        CoilLayout::Packed { reversed_bank } => {
            let mut packed = [0u8; 4];
            packed.copy_from_slice(&raw[3..7]);
            unpack_coils(u32::from_le_bytes(packed), profile.coil_count, reversed_bank)
        }
        // Registers arrive big-endian; the coil value sits in the low byte.
        CoilLayout::Registers => vec![raw[4], raw[6]],
    };

    let discriminator = raw[profile.mode_offset];
    let mode = match profile.mode_rule {
        ModeRule::RemoteIfEquals(sentinel) if discriminator == sentinel => Mode::Remote,
        ModeRule::RemoteIfEquals(_) => Mode::Local,
        ModeRule::LocalIfNonZero if discriminator != 0 => Mode::Local,
        ModeRule::LocalIfNonZero => Mode::Remote,
    };

    Ok(Reading { mode, coils })
}

/// Builds a write-multiple-registers command frame carrying the desired coil
/// state, checksum appended little-endian.
pub fn build_write(coils: &[u8], profile: &Profile) -> Result<Vec<u8>> {
    if coils.len() != profile.coil_count {
        return Err(Error::InvalidShape {
            expected: profile.coil_count,
            got: coils.len(),
        });
    }

    let mut frame = Vec::with_capacity(WRITE_HEADER.len() + 6);
    frame.extend_from_slice(&WRITE_HEADER);
    match profile.layout {
        CoilLayout::Packed { reversed_bank } => {
            frame.extend_from_slice(&pack_coils(coils, reversed_bank).to_le_bytes());
        }
        CoilLayout::Registers => {
            for &coil in coils {
                frame.extend_from_slice(&u16::from(coil).to_be_bytes());
            }
        }
    }
    let crc = crc16(&frame);
    frame.extend_from_slice(&crc.to_le_bytes());
    Ok(frame)
}

/// Returns the profile's constant poll request frame.
pub fn poll_request(profile: &Profile) -> &'static [u8] {
    profile.poll_frame
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::Device;
    use assert_matches::assert_matches;

    fn valve_response(payload: u32, mode_byte: u8) -> Vec<u8> {
        let mut raw = vec![0x01, 0x03, 0x06];
        raw.extend_from_slice(&payload.to_le_bytes());
        raw.push(mode_byte);
        raw.extend_from_slice(&[0x00, 0x00, 0x00]); // 2 payload bytes + stale crc
        raw
    }

    #[test]
    fn coil_round_trip_all_layout_variants() {
        let patterns: [u32; 4] = [0, 0x07FF_FFFF, 0x0155_AA55, 1 << 13];
        for reversed in [false, true] {
            for &value in &patterns {
                let coils = unpack_coils(value, 27, reversed);
                assert_eq!(coils.len(), 27);
                assert_eq!(pack_coils(&coils, reversed), value & 0x07FF_FFFF);
            }
        }
    }

    #[test]
    fn reversed_bank_swap_is_involutive() {
        let coils: Vec<u8> = (0..27).map(|i| (i % 3 == 0) as u8).collect();
        let once = unpack_coils(pack_coils(&coils, true), 27, false);
        let twice = unpack_coils(pack_coils(&once, false), 27, true);
        assert_ne!(once, coils); // the swap really moves bits
        assert_eq!(twice, coils);
    }

    #[test]
    fn reversed_bank_only_touches_middle_window() {
        let mut coils = vec![0u8; 27];
        coils[9] = 1;
        let decoded = unpack_coils(pack_coils(&coils, true), 27, false);
        assert_eq!(decoded[17], 1);
        assert_eq!(decoded.iter().filter(|&&c| c != 0).count(), 1);

        let mut edge = vec![0u8; 27];
        edge[8] = 1;
        edge[18] = 1;
        assert_eq!(unpack_coils(pack_coils(&edge, true), 27, false), edge);
    }

    #[test]
    fn parse_rejects_wrong_length() {
        let profile = Device::Sv1.profile();
        assert_matches!(
            parse(&[0x01, 0x03], profile),
            Err(Error::InvalidLength { expected: 11, got: 2 })
        );
        assert_matches!(
            parse(&[0u8; 13], profile),
            Err(Error::InvalidLength { expected: 11, got: 13 })
        );
    }

    #[test]
    fn parse_rejects_wrong_function_code() {
        let mut raw = valve_response(0, 4);
        raw[1] = 0x04;
        assert_matches!(
            parse(&raw, Device::Sv2.profile()),
            Err(Error::InvalidFunction { expected: 0x03, got: 0x04 })
        );
    }

    #[test]
    fn parse_valve_modes() {
        let remote = parse(&valve_response(0, 4), Device::Sv2.profile()).unwrap();
        assert_eq!(remote.mode, Mode::Remote);
        let local = parse(&valve_response(0, 0), Device::Sv2.profile()).unwrap();
        assert_eq!(local.mode, Mode::Local);
    }

    #[test]
    fn parse_valve_extracts_bits_in_register_order() {
        let reading = parse(&valve_response(0b101, 4), Device::Sv2.profile()).unwrap();
        assert_eq!(&reading.coils[..4], &[1, 0, 1, 0]);
        assert_eq!(reading.coils.len(), 27);
    }

    #[test]
    fn parse_valve_applies_reversed_bank() {
        // Bit 9 set: on sv1 it surfaces as coil 17, on sv2 as coil 9.
        let raw = valve_response(1 << 9, 4);
        let sv1 = parse(&raw, Device::Sv1.profile()).unwrap();
        let sv2 = parse(&raw, Device::Sv2.profile()).unwrap();
        assert_eq!(sv1.coils[17], 1);
        assert_eq!(sv1.coils[9], 0);
        assert_eq!(sv2.coils[9], 1);
    }

    #[test]
    fn parse_pump_reading() {
        let mut raw = vec![0x01, 0x04, 0x08, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00];
        let reading = parse(&raw, Device::Pump.profile()).unwrap();
        assert_eq!(reading.mode, Mode::Remote);
        assert_eq!(reading.coils, vec![1, 0]);

        raw[10] = 0x01;
        let reading = parse(&raw, Device::Pump.profile()).unwrap();
        assert_eq!(reading.mode, Mode::Local);
    }

    #[test]
    fn build_valve_all_zero_frame() {
        let frame = build_write(&[0u8; 27], Device::Sv2.profile()).unwrap();
        assert_eq!(
            frame,
            [0x01, 0x10, 0x00, 0x00, 0x00, 0x02, 0x04, 0x00, 0x00, 0x00, 0x00, 0xF3, 0xAF]
        );
    }

    #[test]
    fn build_valve_checksum_validates() {
        let mut coils = vec![0u8; 27];
        coils[0] = 1;
        coils[12] = 1;
        coils[26] = 1;
        let frame = build_write(&coils, Device::Sv1.profile()).unwrap();
        let (body, tail) = frame.split_at(frame.len() - 2);
        assert_eq!(crc16(body).to_le_bytes(), tail);
    }

    #[test]
    fn build_write_round_trips_through_parse() {
        for device in [Device::Sv1, Device::Sv2] {
            let profile = device.profile();
            let coils: Vec<u8> = (0..27).map(|i| (i % 2) as u8).collect();
            let frame = build_write(&coils, profile).unwrap();
            // Re-read the payload the way the device would report it back.
            let mut response = vec![0x01, 0x03, 0x06];
            response.extend_from_slice(&frame[7..11]);
            response.extend_from_slice(&[0x04, 0x00, 0x00, 0x00]);
            assert_eq!(parse(&response, profile).unwrap().coils, coils);
        }
    }

    #[test]
    fn build_rejects_wrong_shape() {
        assert_matches!(
            build_write(&[1, 0, 1], Device::Sv1.profile()),
            Err(Error::InvalidShape { expected: 27, got: 3 })
        );
        assert_matches!(
            build_write(&[1], Device::Pump.profile()),
            Err(Error::InvalidShape { expected: 2, got: 1 })
        );
    }

    #[test]
    fn poll_request_is_the_profile_constant() {
        assert_eq!(
            poll_request(Device::Sv1.profile()),
            &[0x01, 0x03, 0x00, 0x0A, 0x00, 0x03, 0x25, 0xC9]
        );
        assert_eq!(
            poll_request(Device::Pump.profile()),
            &[0x01, 0x04, 0x00, 0x00, 0x00, 0x04, 0xF1, 0xC9]
        );
    }
}
