//! CRC16-CCITT as used on the wire.
//!
//! Polynomial `0x1021`, initial register `0xFFFF`, MSB first, no reflection
//! and no final XOR (the "CCITT-FALSE" parameter set, catalogued as CRC-16/IBM-3740).

const CRC16: crc::Crc<u16> = crc::Crc::<u16>::new(&crc::CRC_16_IBM_3740);

/// Compute the CRC16 of `data`.
pub fn crc16_ccitt(data: &[u8]) -> u16 {
    CRC16.checksum(data)
}
