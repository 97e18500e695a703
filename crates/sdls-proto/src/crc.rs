//! CRC tables and frame error control computation.
//!
//! Two checksums appear on the link: the 16-bit CRC-CCITT (polynomial
//! 0x1021, seed 0xFFFF, not reflected, no final XOR) used for the Frame
//! Error Control Field and the space-packet checksum, and the reflected
//! CRC-32 (polynomial 0xEDB88320) kept for ground tooling compatibility.
//!
//! Both tables are derived from their polynomial at first use and are
//! immutable afterwards.

use std::sync::LazyLock;

static CRC16_TABLE: LazyLock<[u16; 256]> = LazyLock::new(build_crc16_table);

static CRC32_TABLE: LazyLock<[u32; 256]> = LazyLock::new(build_crc32_table);

/// Each index bit contributes a pre-shifted image of polynomial 0x1021.
fn build_crc16_table() -> [u16; 256] {
    const IMAGES: [u16; 8] = [
        0x1021, 0x2042, 0x4084, 0x8108, 0x1231, 0x2462, 0x48C4, 0x9188,
    ];

    let mut table = [0u16; 256];
    for (i, entry) in table.iter_mut().enumerate() {
        let mut val = 0u16;
        for (bit, image) in IMAGES.iter().enumerate() {
            if i & (1 << bit) != 0 {
                val ^= image;
            }
        }
        *entry = val;
    }
    table
}

fn build_crc32_table() -> [u32; 256] {
    const POLY: u32 = 0xEDB8_8320;

    let mut table = [0u32; 256];
    for (i, entry) in table.iter_mut().enumerate() {
        let mut crc = i as u32;
        for _ in 0..8 {
            crc = if crc & 1 == 1 { (crc >> 1) ^ POLY } else { crc >> 1 };
        }
        *entry = crc;
    }
    table
}

/// CRC-16-CCITT over `data`: seed 0xFFFF, polynomial 0x1021.
///
/// This is the checksum written into the FECF and appended to space
/// packets before telemetry framing.
#[must_use]
pub fn crc16(data: &[u8]) -> u16 {
    let table = &*CRC16_TABLE;
    let mut crc: u16 = 0xFFFF;
    for byte in data {
        let idx = ((crc >> 8) ^ u16::from(*byte)) & 0xFF;
        crc = (crc << 8) ^ table[idx as usize];
    }
    crc
}

/// Reflected CRC-32 over `data`: seed `0xFFFF_FFFF`, final complement.
#[must_use]
pub fn crc32(data: &[u8]) -> u32 {
    let table = &*CRC32_TABLE;
    let mut crc: u32 = 0xFFFF_FFFF;
    for byte in data {
        let idx = (crc ^ u32::from(*byte)) & 0xFF;
        crc = (crc >> 8) ^ table[idx as usize];
    }
    !crc
}

/// Frame Error Control Field for a frame.
///
/// `frame` must exclude the two trailing FECF octets; the result is what
/// belongs in them, big-endian.
#[must_use]
pub fn fecf(frame: &[u8]) -> u16 {
    crc16(frame)
}
