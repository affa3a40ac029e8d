use log::{debug, error, info, warn};
use std::time::Instant;

use crate::buffer::ByteAccumulator;
use crate::catalog;
use crate::checksum::crc16_genibus;
use crate::command::{Request, EPC_SELECT_POINTER_BITS};
use crate::config::ModuleConfig;
use crate::frame::{self, Response};
use crate::tag::{epc_len_from_pc, TagRecord};
use crate::transport::RfidTransport;
use crate::types::{
    FrameError, MemoryBank, ModuleStatus, ReadOutcome, SelectMode, UhfError, WorkingArea,
    BAUD_RATES, POWER_LEVELS_DBM,
};

/// Poll responses this short carry no tag (the module's "no tag" notice).
const NO_TAG_PAYLOAD_LEN: usize = 1;

/// Largest number of words the module accepts in one write command.
pub const MAX_WRITE_WORDS: usize = 32;

/// Word address of the PC word in the EPC bank.
pub const EPC_PC_WORD_ADDRESS: u16 = 1;

/// Status byte the module appends to successful acknowledgements.
const STATUS_OK: u8 = 0x00;

/// Operation-level driver for an M100-family UHF RFID module.
///
/// One request is outstanding at a time: every operation sends one frame
/// and blocks until the response frame closes or the response timeout
/// elapses.
pub struct UhfModule<T: RfidTransport> {
    transport: T,
    config: ModuleConfig,
    acc: ByteAccumulator,
    baud_rate: u32,
    working_area: Option<WorkingArea>,
}

impl<T: RfidTransport> UhfModule<T> {
    /// Create a new driver instance with the given transport
    pub fn new(transport: T) -> Self {
        Self::with_config(transport, ModuleConfig::default())
    }

    pub fn with_config(transport: T, config: ModuleConfig) -> Self {
        Self {
            transport,
            baud_rate: config.initial_baud_rate,
            config,
            acc: ByteAccumulator::new(),
            working_area: None,
        }
    }

    pub fn config(&self) -> &ModuleConfig {
        &self.config
    }

    /// Baud rate the link currently runs at
    pub fn baud_rate(&self) -> u32 {
        self.baud_rate
    }

    /// Last working area set through this driver
    pub fn working_area(&self) -> Option<WorkingArea> {
        self.working_area
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    pub fn get_hardware_version(&mut self) -> Result<String, UhfError> {
        self.get_info(Request::HardwareVersion)
    }

    pub fn get_software_version(&mut self) -> Result<String, UhfError> {
        self.get_info(Request::SoftwareVersion)
    }

    pub fn get_manufacturer(&mut self) -> Result<String, UhfError> {
        self.get_info(Request::Manufacturer)
    }

    /// Poll once for a tag in the field.
    ///
    /// Returns `Ok(None)` when no tag answered. A returned tag has passed
    /// both the frame checksum and the CRC over its PC and EPC.
    pub fn single_poll(&mut self) -> Result<Option<TagRecord>, UhfError> {
        let response = self.exec(&Request::SinglePoll)?;
        Self::parse_poll(&response)
    }

    /// Restrict later tag operations to the tag carrying `tag`'s EPC
    pub fn set_select(&mut self, tag: &TagRecord) -> Result<(), UhfError> {
        if tag.epc().is_empty() {
            return Err(UhfError::InvalidParameter("Cannot select a tag without EPC".into()));
        }

        let response = self.exec(&Request::SetSelect {
            pointer_bits: EPC_SELECT_POINTER_BITS,
            mask: tag.epc().to_vec(),
        })?;
        Self::expect_ack(&response, catalog::OP_SET_SELECT)
    }

    /// Choose when the module sends its select command
    ///
    /// - `Always`: before every tag operation
    /// - `Disabled`: never
    /// - `NonPolling`: before read, write, lock and kill only
    pub fn set_select_mode(&mut self, mode: SelectMode) -> Result<(), UhfError> {
        let response = self.exec(&Request::SetSelectMode(mode))?;
        Self::expect_ack(&response, catalog::OP_SET_SELECT_MODE)
    }

    /// Read `word_count` words from the start of `bank` into `tag`.
    ///
    /// Overrun and missing tag are ordinary outcomes, not errors; `tag` is
    /// only modified on `ReadOutcome::Success`.
    pub fn read_bank(
        &mut self,
        tag: &mut TagRecord,
        bank: MemoryBank,
        access_password: u32,
        word_count: u16,
    ) -> Result<ReadOutcome, UhfError> {
        if word_count == 0 {
            return Err(UhfError::InvalidParameter(
                "Word count must be at least 1".into(),
            ));
        }

        let response = self.exec(&Request::ReadBank {
            access_password,
            bank,
            word_address: 0,
            word_count,
        })?;

        match response.status() {
            Some(ModuleStatus::ReadOverrun) => return Ok(ReadOutcome::MemoryOverrun),
            Some(ModuleStatus::ReadFail) => return Ok(ReadOutcome::NoTagResponse),
            Some(status) => return Err(UhfError::Module(status)),
            None => {}
        }

        if response.opcode != catalog::OP_READ_BANK {
            return Err(UhfError::InvalidResponse(format!(
                "Unexpected opcode 0x{:02X} in read response",
                response.opcode
            )));
        }

        // Payload: [UL, PC, EPC (UL bytes together), data...]
        let payload = &response.payload;
        let data = payload
            .first()
            .map(|&ul| 1 + ul as usize)
            .filter(|&start| start <= payload.len())
            .map(|start| &payload[start..])
            .ok_or_else(|| {
                UhfError::InvalidResponse(format!("Malformed read payload: {:02X?}", payload))
            })?;

        if data.len() != word_count as usize * 2 {
            warn!(
                "Asked for {} words of {:?}, got {} bytes",
                word_count,
                bank,
                data.len()
            );
        }

        Self::store_bank(tag, bank, data)?;
        debug!("Read {} bytes from {:?} bank", data.len(), bank);
        Ok(ReadOutcome::Success)
    }

    /// Copy `from`'s `bank` content onto the tag `to`.
    ///
    /// Selects `to` first, then writes in chunks of at most
    /// [`MAX_WRITE_WORDS`] words starting at `word_address`. For the EPC bank
    /// the written content is the PC word followed by the EPC, so pass
    /// [`EPC_PC_WORD_ADDRESS`].
    pub fn write_bank(
        &mut self,
        from: &TagRecord,
        to: &TagRecord,
        bank: MemoryBank,
        word_address: u16,
        access_password: u32,
    ) -> Result<(), UhfError> {
        let data = from.bank_data(bank);
        if data.is_empty() {
            return Err(UhfError::InvalidParameter(format!(
                "{:?} bank of source tag is empty",
                bank
            )));
        }
        if data.len() % 2 != 0 {
            return Err(UhfError::InvalidParameter(
                "Data length must be even (word-aligned)".into(),
            ));
        }

        self.set_select(to)?;

        let mut address = word_address;
        for chunk in data.chunks(MAX_WRITE_WORDS * 2) {
            let response = self.exec(&Request::WriteBank {
                access_password,
                bank,
                word_address: address,
                data: chunk.to_vec(),
            })?;
            Self::expect_ack(&response, catalog::OP_WRITE_BANK)?;
            address += (chunk.len() / 2) as u16;
        }

        info!("Wrote {} bytes to {:?} bank of {}", data.len(), bank, to.epc_hex());
        Ok(())
    }

    /// Lock or unlock banks of the selected tag
    ///
    /// `payload` is the 20-bit mask/action field of the Gen2 lock command.
    pub fn lock_tag(&mut self, access_password: u32, payload: u32) -> Result<(), UhfError> {
        if payload > 0x000F_FFFF {
            return Err(UhfError::InvalidParameter(format!(
                "Lock payload 0x{:X} exceeds 20 bits",
                payload
            )));
        }

        let response = self.exec(&Request::Lock {
            access_password,
            payload,
        })?;
        Self::expect_ack(&response, catalog::OP_LOCK)
    }

    /// Permanently disable the selected tag
    pub fn kill_tag(&mut self, kill_password: u32) -> Result<(), UhfError> {
        if kill_password == 0 {
            return Err(UhfError::InvalidParameter(
                "Tags cannot be killed with a zero password".into(),
            ));
        }

        let response = self.exec(&Request::Kill { kill_password })?;
        Self::expect_ack(&response, catalog::OP_KILL)
    }

    /// Switch module and local link to a new baud rate.
    ///
    /// The module changes rate right after receiving the command and sends
    /// no reply, so none is awaited.
    pub fn set_baud_rate(&mut self, baud_rate: u32) -> Result<(), UhfError> {
        if !BAUD_RATES.contains(&baud_rate) {
            return Err(UhfError::InvalidParameter(format!(
                "Unsupported baud rate {} (supported: {:?})",
                baud_rate, BAUD_RATES
            )));
        }

        let frame = Request::SetBaudRate(baud_rate).encode();
        debug!("Sending command: {:02X?}", frame);
        self.transport.write(&frame).map_err(Self::transport_error)?;
        self.transport
            .set_baud_rate(baud_rate)
            .map_err(Self::transport_error)?;

        info!("Baud rate changed from {} to {}", self.baud_rate, baud_rate);
        self.baud_rate = baud_rate;
        Ok(())
    }

    /// Set the regulatory region the module transmits in
    pub fn set_working_area(&mut self, area: WorkingArea) -> Result<(), UhfError> {
        let response = self.exec(&Request::SetWorkingArea(area))?;
        Self::expect_ack(&response, catalog::OP_SET_WORKING_AREA)?;
        self.working_area = Some(area);
        Ok(())
    }

    pub fn set_working_channel(&mut self, channel: u8) -> Result<(), UhfError> {
        let response = self.exec(&Request::SetWorkingChannel(channel))?;
        Self::expect_ack(&response, catalog::OP_SET_WORKING_CHANNEL)
    }

    pub fn set_frequency_hopping(&mut self, enabled: bool) -> Result<(), UhfError> {
        let response = self.exec(&Request::SetFrequencyHopping(enabled))?;
        Self::expect_ack(&response, catalog::OP_SET_FREQUENCY_HOPPING)
    }

    /// Get current transmit power in dBm
    pub fn get_transmitting_power(&mut self) -> Result<u16, UhfError> {
        let response = self.exec(&Request::GetTransmitPower)?;
        if let Some(status) = response.status() {
            return Err(UhfError::Module(status));
        }

        match (response.opcode, response.payload.as_slice()) {
            (catalog::OP_GET_TRANSMIT_POWER, &[msb, lsb]) => {
                Ok(u16::from_be_bytes([msb, lsb]) / 100)
            }
            _ => Err(UhfError::InvalidResponse("Failed to get transmit power".into())),
        }
    }

    /// Set transmit power; only the levels in `POWER_LEVELS_DBM` are accepted
    pub fn set_transmitting_power(&mut self, power_dbm: u16) -> Result<(), UhfError> {
        if !POWER_LEVELS_DBM.contains(&power_dbm) {
            return Err(UhfError::InvalidParameter(format!(
                "Unsupported transmit power {} dBm (supported: {:?})",
                power_dbm, POWER_LEVELS_DBM
            )));
        }

        let response = self.exec(&Request::SetTransmitPower(power_dbm))?;
        Self::expect_ack(&response, catalog::OP_SET_TRANSMIT_POWER)
    }

    fn get_info(&mut self, request: Request) -> Result<String, UhfError> {
        let response = self.exec(&request)?;
        if let Some(status) = response.status() {
            return Err(UhfError::Module(status));
        }
        if response.opcode != catalog::OP_GET_INFO || response.payload.is_empty() {
            return Err(UhfError::InvalidResponse("Invalid info response".into()));
        }

        // First payload byte echoes the info selector
        let text = String::from_utf8_lossy(&response.payload[1..]);
        Ok(text.trim_end_matches(['\0', ' ']).to_string())
    }

    fn parse_poll(response: &Response) -> Result<Option<TagRecord>, UhfError> {
        match response.status() {
            Some(ModuleStatus::InventoryFail) => {
                debug!("No tag in field");
                return Ok(None);
            }
            Some(status) => return Err(UhfError::Module(status)),
            None => {}
        }
        let payload = response.payload.as_slice();
        if payload.len() <= NO_TAG_PAYLOAD_LEN {
            debug!("No tag in field");
            return Ok(None);
        }
        if response.opcode != catalog::OP_SINGLE_POLL {
            return Err(UhfError::InvalidResponse(format!(
                "Unexpected opcode 0x{:02X} in poll response",
                response.opcode
            )));
        }

        let epc_len_at = |i: usize| {
            payload
                .get(i..i + 2)
                .map(|pc| epc_len_from_pc(u16::from_be_bytes([pc[0], pc[1]])))
        };

        // [PC, EPC, CRC], or with a leading RSSI byte
        let (rssi, body) = match (epc_len_at(0), epc_len_at(1)) {
            (Some(len), _) if len + 4 == payload.len() => (None, payload),
            (_, Some(len)) if len + 5 == payload.len() => (Some(payload[0]), &payload[1..]),
            (declared, _) => {
                return Err(UhfError::Frame(FrameError::LengthMismatch {
                    declared: declared.unwrap_or(0) + 4,
                    actual: payload.len(),
                }));
            }
        };

        let crc_at = body.len() - 2;
        let found = u16::from_be_bytes([body[crc_at], body[crc_at + 1]]);
        let computed = crc16_genibus(&body[..crc_at]);
        if found != computed {
            warn!("Dropping tag with bad CRC: {:02X?}", body);
            return Err(FrameError::CrcMismatch { found, computed }.into());
        }

        let pc = u16::from_be_bytes([body[0], body[1]]);
        let tag = TagRecord::from_poll(pc, &body[2..crc_at], found, rssi)?;
        debug!("Tag in field: {}", tag.epc_hex());
        Ok(Some(tag))
    }

    /// Reading the EPC bank from word 0 yields CRC, PC, then EPC.
    fn store_bank(tag: &mut TagRecord, bank: MemoryBank, data: &[u8]) -> Result<(), UhfError> {
        match bank {
            MemoryBank::Epc => {
                if data.len() < 4 {
                    return Err(UhfError::InvalidResponse(format!(
                        "EPC bank read too short: {} bytes",
                        data.len()
                    )));
                }
                tag.set_crc(u16::from_be_bytes([data[0], data[1]]));
                tag.set_pc(u16::from_be_bytes([data[2], data[3]]));
                tag.set_bank(MemoryBank::Epc, &data[4..])
            }
            _ => tag.set_bank(bank, data),
        }
    }

    fn expect_ack(response: &Response, opcode: u8) -> Result<(), UhfError> {
        if let Some(status) = response.status() {
            return Err(UhfError::Module(status));
        }
        if response.opcode == opcode && response.payload.last() == Some(&STATUS_OK) {
            Ok(())
        } else {
            Err(UhfError::InvalidResponse(format!(
                "Unexpected acknowledgement for opcode 0x{:02X}: {:02X?}",
                opcode, response
            )))
        }
    }

    fn exec(&mut self, request: &Request) -> Result<Response, UhfError> {
        let frame = request.encode();
        self.acc.reset();
        self.transport
            .clear_input()
            .map_err(Self::transport_error)?;
        debug!("Sending command: {:02X?}", frame);
        self.transport.write(&frame).map_err(Self::transport_error)?;
        self.receive()
    }

    fn receive(&mut self) -> Result<Response, UhfError> {
        let deadline = Instant::now() + self.config.response_timeout;
        let mut chunk = vec![0u8; self.config.read_chunk.max(1)];

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                warn!("No complete response, have {:02X?}", self.acc.data());
                return Err(UhfError::Timeout);
            }

            let timeout_ms = remaining.as_millis().clamp(1, u32::MAX as u128) as u32;
            let n = self
                .transport
                .read(&mut chunk, timeout_ms)
                .map_err(Self::transport_error)?;

            for (i, &byte) in chunk[..n].iter().enumerate() {
                self.acc.append(byte);
                if !self.acc.is_closed() {
                    continue;
                }
                if frame::expects_more(self.acc.data()) {
                    // 0x7E inside the payload
                    self.acc.reopen();
                    continue;
                }
                if i + 1 < n {
                    debug!("Ignoring {} bytes after end marker", n - i - 1);
                }
                debug!("Received {} bytes: {:02X?}", self.acc.len(), self.acc.data());
                return frame::decode(&self.acc).map_err(|e| {
                    warn!("Bad response frame: {}", e);
                    UhfError::from(e)
                });
            }
        }
    }

    fn transport_error(e: T::Error) -> UhfError {
        error!("Transport error: {:?}", e);
        UhfError::Transport(format!("{:?}", e))
    }
}
