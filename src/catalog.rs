//! Command templates, byte for byte as the module expects them
//!
//! Each template is a complete, valid frame with default field values.
//! Encoding copies a template and patches the variable fields at the
//! offsets below before recomputing the checksum.

/// A catalogued command frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandTemplate {
    pub name: &'static str,
    pub bytes: &'static [u8],
}

impl CommandTemplate {
    pub fn opcode(&self) -> u8 {
        self.bytes[2]
    }

    /// Fresh mutable copy of the template frame.
    pub fn to_frame(&self) -> Vec<u8> {
        self.bytes.to_vec()
    }
}

// Opcodes
pub const OP_GET_INFO: u8 = 0x03;
pub const OP_SET_WORKING_AREA: u8 = 0x07;
pub const OP_SET_SELECT: u8 = 0x0C;
pub const OP_SET_BAUD_RATE: u8 = 0x11;
pub const OP_SET_SELECT_MODE: u8 = 0x12;
pub const OP_SINGLE_POLL: u8 = 0x22;
pub const OP_READ_BANK: u8 = 0x39;
pub const OP_WRITE_BANK: u8 = 0x49;
pub const OP_KILL: u8 = 0x65;
pub const OP_LOCK: u8 = 0x82;
pub const OP_SET_WORKING_CHANNEL: u8 = 0xAB;
pub const OP_SET_FREQUENCY_HOPPING: u8 = 0xAD;
pub const OP_SET_TRANSMIT_POWER: u8 = 0xB6;
pub const OP_GET_TRANSMIT_POWER: u8 = 0xB7;

// Info selectors for OP_GET_INFO
pub const INFO_HARDWARE: u8 = 0x00;
pub const INFO_SOFTWARE: u8 = 0x01;
pub const INFO_MANUFACTURER: u8 = 0x02;

// Field offsets inside command frames
pub const PAYLOAD_LEN_OFFSET: usize = 3;
pub const PAYLOAD_OFFSET: usize = 5;
pub const ACCESS_PASSWORD_OFFSET: usize = 5;
pub const BANK_OFFSET: usize = 9;
pub const WORD_ADDRESS_OFFSET: usize = 10;
pub const WORD_COUNT_OFFSET: usize = 12;
pub const WRITE_DATA_OFFSET: usize = 14;
pub const SELECT_PARAM_OFFSET: usize = 5;
pub const SELECT_POINTER_OFFSET: usize = 6;
pub const SELECT_MASK_BITS_OFFSET: usize = 10;
pub const SELECT_TRUNCATE_OFFSET: usize = 11;
pub const SELECT_MASK_OFFSET: usize = 12;
pub const LOCK_PAYLOAD_OFFSET: usize = 9;

pub const HARDWARE_VERSION: CommandTemplate = CommandTemplate {
    name: "hardware version",
    bytes: &[0xBB, 0x00, 0x03, 0x00, 0x01, 0x00, 0x04, 0x7E],
};

pub const SOFTWARE_VERSION: CommandTemplate = CommandTemplate {
    name: "software version",
    bytes: &[0xBB, 0x00, 0x03, 0x00, 0x01, 0x01, 0x05, 0x7E],
};

pub const MANUFACTURER: CommandTemplate = CommandTemplate {
    name: "manufacturer",
    bytes: &[0xBB, 0x00, 0x03, 0x00, 0x01, 0x02, 0x06, 0x7E],
};

pub const SINGLE_POLL: CommandTemplate = CommandTemplate {
    name: "single poll",
    bytes: &[0xBB, 0x00, 0x22, 0x00, 0x00, 0x22, 0x7E],
};

/// Select on the EPC bank, pointer 0x20 bits (past CRC and PC), 96-bit mask.
pub const SET_SELECT: CommandTemplate = CommandTemplate {
    name: "set select",
    bytes: &[
        0xBB, 0x00, 0x0C, 0x00, 0x13, 0x01, 0x00, 0x00, 0x00, 0x20, 0x60, 0x00, 0x30, 0x75,
        0x1F, 0xEB, 0x70, 0x5C, 0x59, 0x04, 0xE3, 0xD5, 0x0D, 0x70, 0xAD, 0x7E,
    ],
};

pub const SET_SELECT_MODE: CommandTemplate = CommandTemplate {
    name: "set select mode",
    bytes: &[0xBB, 0x00, 0x12, 0x00, 0x01, 0x01, 0x14, 0x7E],
};

/// Access password, bank, word address, word count.
pub const READ_BANK: CommandTemplate = CommandTemplate {
    name: "read bank",
    bytes: &[
        0xBB, 0x00, 0x39, 0x00, 0x09, 0x00, 0x00, 0xFF, 0xFF, 0x03, 0x00, 0x00, 0x00, 0x02,
        0x45, 0x7E,
    ],
};

/// Access password, bank, word address, word count, data.
pub const WRITE_BANK: CommandTemplate = CommandTemplate {
    name: "write bank",
    bytes: &[
        0xBB, 0x00, 0x49, 0x00, 0x0D, 0x00, 0x00, 0xFF, 0xFF, 0x03, 0x00, 0x00, 0x00, 0x02,
        0x12, 0x34, 0x56, 0x78, 0x6D, 0x7E,
    ],
};

pub const LOCK: CommandTemplate = CommandTemplate {
    name: "lock",
    bytes: &[
        0xBB, 0x00, 0x82, 0x00, 0x07, 0x00, 0x00, 0xFF, 0xFF, 0x02, 0x00, 0x80, 0x09, 0x7E,
    ],
};

pub const KILL: CommandTemplate = CommandTemplate {
    name: "kill",
    bytes: &[0xBB, 0x00, 0x65, 0x00, 0x04, 0x00, 0x00, 0xFF, 0xFF, 0x67, 0x7E],
};

/// Baud rate divided by 100, big-endian.
pub const SET_BAUD_RATE: CommandTemplate = CommandTemplate {
    name: "set baud rate",
    bytes: &[0xBB, 0x00, 0x11, 0x00, 0x02, 0x04, 0x80, 0x97, 0x7E],
};

pub const SET_WORKING_AREA: CommandTemplate = CommandTemplate {
    name: "set working area",
    bytes: &[0xBB, 0x00, 0x07, 0x00, 0x01, 0x01, 0x09, 0x7E],
};

pub const SET_WORKING_CHANNEL: CommandTemplate = CommandTemplate {
    name: "set working channel",
    bytes: &[0xBB, 0x00, 0xAB, 0x00, 0x01, 0x01, 0xAD, 0x7E],
};

pub const SET_FREQUENCY_HOPPING: CommandTemplate = CommandTemplate {
    name: "set frequency hopping",
    bytes: &[0xBB, 0x00, 0xAD, 0x00, 0x01, 0xFF, 0xAD, 0x7E],
};

pub const GET_TRANSMIT_POWER: CommandTemplate = CommandTemplate {
    name: "get transmit power",
    bytes: &[0xBB, 0x00, 0xB7, 0x00, 0x00, 0xB7, 0x7E],
};

/// Power in hundredths of a dBm, big-endian.
pub const SET_TRANSMIT_POWER: CommandTemplate = CommandTemplate {
    name: "set transmit power",
    bytes: &[0xBB, 0x00, 0xB6, 0x00, 0x02, 0x07, 0xD0, 0x8F, 0x7E],
};

pub const CATALOG: [CommandTemplate; 16] = [
    HARDWARE_VERSION,
    SOFTWARE_VERSION,
    MANUFACTURER,
    SINGLE_POLL,
    SET_SELECT,
    SET_SELECT_MODE,
    READ_BANK,
    WRITE_BANK,
    LOCK,
    KILL,
    SET_BAUD_RATE,
    SET_WORKING_AREA,
    SET_WORKING_CHANNEL,
    SET_FREQUENCY_HOPPING,
    GET_TRANSMIT_POWER,
    SET_TRANSMIT_POWER,
];
