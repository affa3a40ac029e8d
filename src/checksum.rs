//! Frame checksum and EPC CRC

const CRC16_GENIBUS_POLY: u16 = 0x1021;
const CRC16_GENIBUS_INIT: u16 = 0xFFFF;
const CRC16_GENIBUS_XOROUT: u16 = 0xFFFF;

/// Sum of all bytes modulo 256.
///
/// Frames carry this over everything between the start marker and the
/// checksum slot, i.e. `frame[1..len - 2]`.
pub fn checksum8(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, &b| acc.wrapping_add(b))
}

/// CRC-16/GENIBUS (poly 0x1021, init 0xFFFF, MSB first, output inverted).
///
/// Tags store this over their PC word and EPC. An empty input yields the
/// bare init value 0xFFFF rather than the inverted one.
pub fn crc16_genibus(bytes: &[u8]) -> u16 {
    if bytes.is_empty() {
        return CRC16_GENIBUS_INIT;
    }

    let mut crc = CRC16_GENIBUS_INIT;
    for &byte in bytes {
        crc ^= (byte as u16) << 8;
        for _ in 0..8 {
            if crc & 0x8000 != 0 {
                crc = (crc << 1) ^ CRC16_GENIBUS_POLY;
            } else {
                crc <<= 1;
            }
        }
    }
    crc ^ CRC16_GENIBUS_XOROUT
}
