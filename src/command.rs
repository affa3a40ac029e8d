//! Typed requests and their encoding onto catalog templates

use crate::catalog::{self, CommandTemplate};
use crate::checksum::checksum8;
use crate::frame::{Response, END, HEADER_LEN, KIND_COMMAND, MIN_FRAME_LEN};
use crate::types::{MemoryBank, SelectMode, UhfError, WorkingArea};

/// Select pointer that skips the CRC and PC words of the EPC bank.
pub const EPC_SELECT_POINTER_BITS: u32 = 0x20;

/// The mask length field is one byte of bits.
pub const MAX_MASK_BYTES: usize = 31;

const SELECT_PARAM_EPC: u8 = MemoryBank::Epc as u8;

/// One command to the module, with its variable fields
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    HardwareVersion,
    SoftwareVersion,
    Manufacturer,
    SinglePoll,
    /// Select tags whose EPC bank matches `mask` at `pointer_bits`
    SetSelect { pointer_bits: u32, mask: Vec<u8> },
    SetSelectMode(SelectMode),
    ReadBank {
        access_password: u32,
        bank: MemoryBank,
        word_address: u16,
        word_count: u16,
    },
    /// `data` must hold whole words
    WriteBank {
        access_password: u32,
        bank: MemoryBank,
        word_address: u16,
        data: Vec<u8>,
    },
    /// `payload` is the 20-bit mask/action lock field
    Lock { access_password: u32, payload: u32 },
    Kill { kill_password: u32 },
    SetBaudRate(u32),
    SetWorkingArea(WorkingArea),
    SetWorkingChannel(u8),
    SetFrequencyHopping(bool),
    GetTransmitPower,
    /// Power in dBm
    SetTransmitPower(u16),
}

impl Request {
    pub fn template(&self) -> CommandTemplate {
        match self {
            Request::HardwareVersion => catalog::HARDWARE_VERSION,
            Request::SoftwareVersion => catalog::SOFTWARE_VERSION,
            Request::Manufacturer => catalog::MANUFACTURER,
            Request::SinglePoll => catalog::SINGLE_POLL,
            Request::SetSelect { .. } => catalog::SET_SELECT,
            Request::SetSelectMode(_) => catalog::SET_SELECT_MODE,
            Request::ReadBank { .. } => catalog::READ_BANK,
            Request::WriteBank { .. } => catalog::WRITE_BANK,
            Request::Lock { .. } => catalog::LOCK,
            Request::Kill { .. } => catalog::KILL,
            Request::SetBaudRate(_) => catalog::SET_BAUD_RATE,
            Request::SetWorkingArea(_) => catalog::SET_WORKING_AREA,
            Request::SetWorkingChannel(_) => catalog::SET_WORKING_CHANNEL,
            Request::SetFrequencyHopping(_) => catalog::SET_FREQUENCY_HOPPING,
            Request::GetTransmitPower => catalog::GET_TRANSMIT_POWER,
            Request::SetTransmitPower(_) => catalog::SET_TRANSMIT_POWER,
        }
    }

    pub fn opcode(&self) -> u8 {
        self.template().opcode()
    }

    /// Build the wire frame: copy the template, patch fields, fix up the
    /// length and checksum.
    pub fn encode(&self) -> Vec<u8> {
        let mut frame = self.template().to_frame();

        match self {
            Request::HardwareVersion
            | Request::SoftwareVersion
            | Request::Manufacturer
            | Request::SinglePoll
            | Request::GetTransmitPower => {}
            Request::SetSelect { pointer_bits, mask } => {
                let mask = &mask[..mask.len().min(MAX_MASK_BYTES)];
                resize_payload(&mut frame, 7 + mask.len());
                frame[catalog::SELECT_PARAM_OFFSET] = SELECT_PARAM_EPC;
                put(&mut frame, catalog::SELECT_POINTER_OFFSET, &pointer_bits.to_be_bytes());
                frame[catalog::SELECT_MASK_BITS_OFFSET] = (mask.len() * 8) as u8;
                frame[catalog::SELECT_TRUNCATE_OFFSET] = 0x00;
                put(&mut frame, catalog::SELECT_MASK_OFFSET, mask);
            }
            Request::SetSelectMode(mode) => frame[catalog::PAYLOAD_OFFSET] = *mode as u8,
            Request::ReadBank {
                access_password,
                bank,
                word_address,
                word_count,
            } => {
                put(&mut frame, catalog::ACCESS_PASSWORD_OFFSET, &access_password.to_be_bytes());
                frame[catalog::BANK_OFFSET] = *bank as u8;
                put(&mut frame, catalog::WORD_ADDRESS_OFFSET, &word_address.to_be_bytes());
                put(&mut frame, catalog::WORD_COUNT_OFFSET, &word_count.to_be_bytes());
            }
            Request::WriteBank {
                access_password,
                bank,
                word_address,
                data,
            } => {
                let word_count = (data.len() / 2) as u16;
                resize_payload(&mut frame, 9 + data.len());
                put(&mut frame, catalog::ACCESS_PASSWORD_OFFSET, &access_password.to_be_bytes());
                frame[catalog::BANK_OFFSET] = *bank as u8;
                put(&mut frame, catalog::WORD_ADDRESS_OFFSET, &word_address.to_be_bytes());
                put(&mut frame, catalog::WORD_COUNT_OFFSET, &word_count.to_be_bytes());
                put(&mut frame, catalog::WRITE_DATA_OFFSET, data);
            }
            Request::Lock {
                access_password,
                payload,
            } => {
                put(&mut frame, catalog::ACCESS_PASSWORD_OFFSET, &access_password.to_be_bytes());
                put(&mut frame, catalog::LOCK_PAYLOAD_OFFSET, &payload.to_be_bytes()[1..]);
            }
            Request::Kill { kill_password } => {
                put(&mut frame, catalog::ACCESS_PASSWORD_OFFSET, &kill_password.to_be_bytes());
            }
            Request::SetBaudRate(rate) => {
                let code = (rate / 100) as u16;
                put(&mut frame, catalog::PAYLOAD_OFFSET, &code.to_be_bytes());
            }
            Request::SetWorkingArea(area) => frame[catalog::PAYLOAD_OFFSET] = *area as u8,
            Request::SetWorkingChannel(channel) => frame[catalog::PAYLOAD_OFFSET] = *channel,
            Request::SetFrequencyHopping(enabled) => {
                frame[catalog::PAYLOAD_OFFSET] = if *enabled { 0xFF } else { 0x00 };
            }
            Request::SetTransmitPower(dbm) => {
                let power = dbm.saturating_mul(100);
                put(&mut frame, catalog::PAYLOAD_OFFSET, &power.to_be_bytes());
            }
        }

        finish(&mut frame);
        frame
    }

    /// Recover the request carried by a decoded command frame.
    pub fn parse(frame: &Response) -> Result<Request, UhfError> {
        if frame.kind != KIND_COMMAND {
            return Err(UhfError::InvalidResponse(format!(
                "Not a command frame: kind 0x{:02X}",
                frame.kind
            )));
        }

        let p = frame.payload.as_slice();
        let bad = || {
            UhfError::InvalidResponse(format!(
                "Unexpected payload for opcode 0x{:02X}: {:02X?}",
                frame.opcode, p
            ))
        };
        let u16_at = |i: usize| u16::from_be_bytes([p[i], p[i + 1]]);
        let u32_at = |i: usize| u32::from_be_bytes([p[i], p[i + 1], p[i + 2], p[i + 3]]);

        let request = match (frame.opcode, p.len()) {
            (catalog::OP_GET_INFO, 1) => match p[0] {
                catalog::INFO_HARDWARE => Request::HardwareVersion,
                catalog::INFO_SOFTWARE => Request::SoftwareVersion,
                catalog::INFO_MANUFACTURER => Request::Manufacturer,
                _ => return Err(bad()),
            },
            (catalog::OP_SINGLE_POLL, 0) => Request::SinglePoll,
            (catalog::OP_SET_SELECT, n) if n >= 7 => {
                let mask_len = (p[5] as usize).div_ceil(8);
                if p[0] != SELECT_PARAM_EPC || n != 7 + mask_len {
                    return Err(bad());
                }
                Request::SetSelect {
                    pointer_bits: u32_at(1),
                    mask: p[7..].to_vec(),
                }
            }
            (catalog::OP_SET_SELECT_MODE, 1) => {
                Request::SetSelectMode(SelectMode::try_from(p[0]).map_err(|_| bad())?)
            }
            (catalog::OP_READ_BANK, 9) => Request::ReadBank {
                access_password: u32_at(0),
                bank: MemoryBank::try_from(p[4]).map_err(|_| bad())?,
                word_address: u16_at(5),
                word_count: u16_at(7),
            },
            (catalog::OP_WRITE_BANK, n) if n >= 9 => {
                let word_count = u16_at(7) as usize;
                if n != 9 + word_count * 2 {
                    return Err(bad());
                }
                Request::WriteBank {
                    access_password: u32_at(0),
                    bank: MemoryBank::try_from(p[4]).map_err(|_| bad())?,
                    word_address: u16_at(5),
                    data: p[9..].to_vec(),
                }
            }
            (catalog::OP_LOCK, 7) => Request::Lock {
                access_password: u32_at(0),
                payload: u32::from_be_bytes([0, p[4], p[5], p[6]]),
            },
            (catalog::OP_KILL, 4) => Request::Kill {
                kill_password: u32_at(0),
            },
            (catalog::OP_SET_BAUD_RATE, 2) => Request::SetBaudRate(u16_at(0) as u32 * 100),
            (catalog::OP_SET_WORKING_AREA, 1) => {
                Request::SetWorkingArea(WorkingArea::try_from(p[0]).map_err(|_| bad())?)
            }
            (catalog::OP_SET_WORKING_CHANNEL, 1) => Request::SetWorkingChannel(p[0]),
            (catalog::OP_SET_FREQUENCY_HOPPING, 1) => Request::SetFrequencyHopping(p[0] == 0xFF),
            (catalog::OP_GET_TRANSMIT_POWER, 0) => Request::GetTransmitPower,
            (catalog::OP_SET_TRANSMIT_POWER, 2) => Request::SetTransmitPower(u16_at(0) / 100),
            _ => return Err(bad()),
        };
        Ok(request)
    }
}

fn put(frame: &mut [u8], offset: usize, bytes: &[u8]) {
    frame[offset..offset + bytes.len()].copy_from_slice(bytes);
}

/// Grow or shrink the payload region, keeping checksum and end slots.
fn resize_payload(frame: &mut Vec<u8>, payload_len: usize) {
    frame.truncate(frame.len() - 2);
    frame.resize(HEADER_LEN + payload_len, 0);
    frame.extend_from_slice(&[0, END]);
}

fn finish(frame: &mut [u8]) {
    let payload_len = (frame.len() - MIN_FRAME_LEN) as u16;
    put(frame, catalog::PAYLOAD_LEN_OFFSET, &payload_len.to_be_bytes());
    let checksum_at = frame.len() - 2;
    frame[checksum_at] = checksum8(&frame[1..checksum_at]);
}
