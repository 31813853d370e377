//! CRC-16/MODBUS checksum.
//!
//! Every frame exchanged with the devices carries this checksum over all
//! preceding bytes, appended little-endian. The devices validate it
//! bit-for-bit, so the reflected algorithm (init `0xFFFF`, polynomial
//! `0xA001`) must be reproduced exactly.

/// Computes the CRC-16/MODBUS checksum of `data`.
pub fn crc16(data: &[u8]) -> u16 {
    let mut crc = 0xFFFFu16;
    for &byte in data {
        crc ^= byte as u16;
        for _ in 0..8 {
            let odd = crc & 1;
            crc >>= 1;
            if odd != 0 {
                crc ^= 0xA001;
            }
        }
    }
    crc
}
