//! In-memory image of one tag's memory banks

use crate::types::{MemoryBank, UhfError};

/// Capacity of each variable-length bank, in bytes.
pub const MAX_BANK_SIZE: usize = 256;

/// Longest EPC a PC word can announce (31 words).
pub const MAX_EPC_LEN: usize = 62;

/// Labels used when handing a tag to a key/value format writer.
pub const LABEL_EPC_LENGTH: &str = "EPC_LENGTH";
pub const LABEL_EPC_PC: &str = "EPC_PC";
pub const LABEL_EPC: &str = "EPC";
pub const LABEL_TID_LENGTH: &str = "TID_LENGTH";
pub const LABEL_TID: &str = "TID";
pub const LABEL_USER_LENGTH: &str = "USER_LENGTH";
pub const LABEL_USER: &str = "USER";

/// EPC length in bytes encoded in a PC word.
///
/// Bits 15..11 of the PC hold the EPC length in 16-bit words, so the
/// length is the top five bits of the high byte, times two.
pub fn epc_len_from_pc(pc: u16) -> usize {
    let pc_high = (pc >> 8) as u8;
    (pc_high >> 3) as usize * 2
}

/// PC word announcing `epc_len` bytes of EPC, other PC bits kept from `pc`.
///
/// `epc_len` must be even and at most [`MAX_EPC_LEN`].
pub fn pc_with_epc_len(pc: u16, epc_len: usize) -> u16 {
    let words = (epc_len / 2).min(0x1F) as u16;
    (pc & 0x07FF) | (words << 11)
}

fn check_epc_len(len: usize) -> Result<(), UhfError> {
    if len % 2 != 0 || len > MAX_EPC_LEN {
        return Err(UhfError::InvalidParameter(format!(
            "EPC of {} bytes cannot be announced by a PC word",
            len
        )));
    }
    Ok(())
}

/// Kill and access passwords, two words each
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReservedBank {
    pub kill_password: [u8; 4],
    pub access_password: [u8; 4],
}

impl ReservedBank {
    pub fn to_bytes(&self) -> [u8; 8] {
        let mut bytes = [0u8; 8];
        bytes[..4].copy_from_slice(&self.kill_password);
        bytes[4..].copy_from_slice(&self.access_password);
        bytes
    }

    pub fn access_password_u32(&self) -> u32 {
        u32::from_be_bytes(self.access_password)
    }
}

/// Memory banks of one tag.
///
/// Created by a poll, filled in by bank reads, then handed to the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagRecord {
    reserved: ReservedBank,
    pc: u16,
    crc: u16,
    epc: Vec<u8>,
    tid: Vec<u8>,
    user: Vec<u8>,
    rssi: Option<u8>,
}

impl TagRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tag as reported by a poll. The EPC length must agree with the PC.
    pub fn from_poll(pc: u16, epc: &[u8], crc: u16, rssi: Option<u8>) -> Result<Self, UhfError> {
        if epc_len_from_pc(pc) != epc.len() {
            return Err(UhfError::InvalidResponse(format!(
                "PC 0x{:04X} announces {} EPC bytes, got {}",
                pc,
                epc_len_from_pc(pc),
                epc.len()
            )));
        }
        let mut tag = Self::new();
        tag.pc = pc;
        tag.crc = crc;
        tag.rssi = rssi;
        tag.set_bank(MemoryBank::Epc, epc)?;
        Ok(tag)
    }

    pub fn reserved(&self) -> &ReservedBank {
        &self.reserved
    }

    pub fn set_reserved(&mut self, reserved: ReservedBank) {
        self.reserved = reserved;
    }

    pub fn pc(&self) -> u16 {
        self.pc
    }

    pub fn crc(&self) -> u16 {
        self.crc
    }

    pub fn epc(&self) -> &[u8] {
        &self.epc
    }

    /// EPC length as announced by the PC word.
    pub fn epc_len(&self) -> usize {
        epc_len_from_pc(self.pc)
    }

    pub fn tid(&self) -> &[u8] {
        &self.tid
    }

    pub fn user(&self) -> &[u8] {
        &self.user
    }

    pub fn rssi(&self) -> Option<u8> {
        self.rssi
    }

    pub fn epc_hex(&self) -> String {
        hex::encode_upper(&self.epc)
    }

    pub fn tid_hex(&self) -> String {
        hex::encode_upper(&self.tid)
    }

    pub fn user_hex(&self) -> String {
        hex::encode_upper(&self.user)
    }

    /// Replace the EPC and keep the PC length bits in step with it.
    pub fn set_epc(&mut self, epc: &[u8]) -> Result<(), UhfError> {
        check_epc_len(epc.len())?;
        self.set_bank(MemoryBank::Epc, epc)?;
        self.pc = pc_with_epc_len(self.pc, epc.len());
        Ok(())
    }

    pub fn set_pc(&mut self, pc: u16) {
        self.pc = pc;
    }

    pub fn set_crc(&mut self, crc: u16) {
        self.crc = crc;
    }

    /// Store raw bank content, refusing data beyond the bank capacity.
    ///
    /// Reserved content is split into kill and access passwords; missing
    /// trailing bytes stay zero.
    pub fn set_bank(&mut self, bank: MemoryBank, data: &[u8]) -> Result<(), UhfError> {
        let capacity = match bank {
            MemoryBank::Reserved => 8,
            _ => MAX_BANK_SIZE,
        };
        if data.len() > capacity {
            return Err(UhfError::BankOverflow {
                bank,
                len: data.len(),
            });
        }

        match bank {
            MemoryBank::Reserved => {
                let mut bytes = [0u8; 8];
                bytes[..data.len()].copy_from_slice(data);
                self.reserved.kill_password.copy_from_slice(&bytes[..4]);
                self.reserved.access_password.copy_from_slice(&bytes[4..]);
            }
            MemoryBank::Epc => self.epc = data.to_vec(),
            MemoryBank::Tid => self.tid = data.to_vec(),
            MemoryBank::User => self.user = data.to_vec(),
        }
        Ok(())
    }

    /// Content of a bank as it would be written to a tag.
    ///
    /// The EPC bank yields the PC word followed by the EPC, i.e. what lives
    /// from word 1 onwards.
    pub fn bank_data(&self, bank: MemoryBank) -> Vec<u8> {
        match bank {
            MemoryBank::Reserved => self.reserved.to_bytes().to_vec(),
            MemoryBank::Epc => {
                let mut data = self.pc.to_be_bytes().to_vec();
                data.extend_from_slice(&self.epc);
                data
            }
            MemoryBank::Tid => self.tid.clone(),
            MemoryBank::User => self.user.clone(),
        }
    }

    /// True when both records name the same tag identity.
    pub fn same_epc(&self, other: &TagRecord) -> bool {
        self.pc == other.pc && self.epc == other.epc
    }

    /// Label/value pairs for a key/value format writer.
    pub fn to_fields(&self) -> Vec<(&'static str, String)> {
        vec![
            (LABEL_EPC_LENGTH, self.epc.len().to_string()),
            (LABEL_EPC_PC, format!("{:04X}", self.pc)),
            (LABEL_EPC, self.epc_hex()),
            (LABEL_TID_LENGTH, self.tid.len().to_string()),
            (LABEL_TID, self.tid_hex()),
            (LABEL_USER_LENGTH, self.user.len().to_string()),
            (LABEL_USER, self.user_hex()),
        ]
    }

    /// Rebuild a record from label/value pairs written by `to_fields`.
    ///
    /// A missing `EPC_PC` is derived from the EPC length. Length labels,
    /// when present, must agree with the decoded data.
    pub fn from_fields<'a, I>(fields: I) -> Result<Self, UhfError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut tag = Self::new();
        let mut pc = None;
        let mut lengths: Vec<(MemoryBank, usize)> = Vec::new();

        for (label, value) in fields {
            match label {
                LABEL_EPC => tag.set_bank(MemoryBank::Epc, &parse_hex(label, value)?)?,
                LABEL_TID => tag.set_bank(MemoryBank::Tid, &parse_hex(label, value)?)?,
                LABEL_USER => tag.set_bank(MemoryBank::User, &parse_hex(label, value)?)?,
                LABEL_EPC_PC => {
                    pc = Some(u16::from_str_radix(value, 16).map_err(|_| {
                        UhfError::InvalidParameter(format!("{}: not a PC word: {}", label, value))
                    })?)
                }
                LABEL_EPC_LENGTH | LABEL_TID_LENGTH | LABEL_USER_LENGTH => {
                    let bank = match label {
                        LABEL_EPC_LENGTH => MemoryBank::Epc,
                        LABEL_TID_LENGTH => MemoryBank::Tid,
                        _ => MemoryBank::User,
                    };
                    let len = value.parse::<usize>().map_err(|_| {
                        UhfError::InvalidParameter(format!("{}: not a length: {}", label, value))
                    })?;
                    lengths.push((bank, len));
                }
                _ => {}
            }
        }

        for (bank, len) in lengths {
            let actual = match bank {
                MemoryBank::Epc => tag.epc.len(),
                MemoryBank::Tid => tag.tid.len(),
                _ => tag.user.len(),
            };
            if actual != len {
                return Err(UhfError::InvalidParameter(format!(
                    "{:?} length {} does not match {} data bytes",
                    bank, len, actual
                )));
            }
        }

        check_epc_len(tag.epc.len())?;
        tag.pc = match pc {
            Some(pc) if epc_len_from_pc(pc) != tag.epc.len() => {
                return Err(UhfError::InvalidParameter(format!(
                    "PC 0x{:04X} announces {} EPC bytes, got {}",
                    pc,
                    epc_len_from_pc(pc),
                    tag.epc.len()
                )));
            }
            Some(pc) => pc,
            None => pc_with_epc_len(0, tag.epc.len()),
        };
        Ok(tag)
    }
}

fn parse_hex(label: &str, value: &str) -> Result<Vec<u8>, UhfError> {
    let compact: String = value.chars().filter(|c| !c.is_whitespace()).collect();
    hex::decode(&compact)
        .map_err(|e| UhfError::InvalidParameter(format!("{}: invalid hex: {}", label, e)))
}
