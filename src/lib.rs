//! Driver for M100-family UHF RFID modules with support for multiple
//! transport backends.
//!
//! The driver speaks the module's framed UART protocol: single polls,
//! select, bank reads and writes, and module configuration. On top of it,
//! [`UhfWorker`] runs the read and copy use cases on a background thread,
//! and [`BankLengthProber`] discovers how long a tag's TID and User banks
//! are.
//!
//! # Features
//!
//! - `uart-esp32` - UART transport for ESP32 using esp-idf-svc
//! - `serial` - Serial port transport for desktop using serialport crate
//!
//! Without either feature, any [`RfidTransport`] can be plugged in, e.g.
//! a [`ChannelTransport`] fed from an RX interrupt.
//!
//! # Example
//!
//! ```ignore
//! use uhf_m100::{MemoryBank, ModuleConfig, ReadOutcome, SerialTransport, UhfModule};
//!
//! let config = ModuleConfig::default();
//! let transport = SerialTransport::new("/dev/ttyUSB0", &config)?;
//! let mut module = UhfModule::with_config(transport, config);
//!
//! if let Some(mut tag) = module.single_poll()? {
//!     println!("Found tag: {}", tag.epc_hex());
//!     module.set_select(&tag)?;
//!     if module.read_bank(&mut tag, MemoryBank::Tid, 0, 6)? == ReadOutcome::Success {
//!         println!("TID: {}", tag.tid_hex());
//!     }
//! }
//! ```

mod buffer;
pub mod catalog;
pub mod checksum;
mod command;
mod config;
pub mod frame;
mod probe;
mod reader;
mod tag;
mod transport;
mod types;
mod worker;

#[cfg(feature = "uart-esp32")]
mod uart;

#[cfg(feature = "serial")]
mod serial;

// Re-exports
pub use buffer::ByteAccumulator;
pub use command::{Request, EPC_SELECT_POINTER_BITS, MAX_MASK_BYTES};
pub use config::{ModuleConfig, ProbeConfig, WorkerConfig, WriteMask};
pub use frame::Response;
pub use probe::{BankLengthProber, BankReader, ProbeOutcome, ProbeReport};
pub use reader::{UhfModule, EPC_PC_WORD_ADDRESS, MAX_WRITE_WORDS};
pub use tag::{
    epc_len_from_pc, pc_with_epc_len, ReservedBank, TagRecord, LABEL_EPC, LABEL_EPC_LENGTH,
    LABEL_EPC_PC, LABEL_TID, LABEL_TID_LENGTH, LABEL_USER, LABEL_USER_LENGTH, MAX_BANK_SIZE,
    MAX_EPC_LEN,
};
pub use transport::{ByteSink, ChannelTransport, RfidTransport};
pub use types::{
    FrameError, MemoryBank, ModuleStatus, ReadOutcome, SelectMode, UhfError, WorkingArea,
    BAUD_RATES, POWER_LEVELS_DBM,
};
pub use worker::{UhfWorker, WorkerEvent, WorkerState, WorkerTask};

#[cfg(feature = "uart-esp32")]
pub use uart::UartTransport;

#[cfg(feature = "serial")]
pub use serial::SerialTransport;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::decode_bytes;
    use std::collections::VecDeque;
    use std::io;
    use std::time::Duration;

    /// Dummy transport for testing protocol logic without hardware
    struct DummyTransport;

    impl RfidTransport for DummyTransport {
        type Error = io::Error;

        fn write(&mut self, data: &[u8]) -> Result<usize, Self::Error> {
            Ok(data.len())
        }

        fn read(&mut self, _buf: &mut [u8], _timeout_ms: u32) -> Result<usize, Self::Error> {
            Ok(0)
        }

        fn clear_input(&mut self) -> Result<(), Self::Error> {
            Ok(())
        }

        fn set_baud_rate(&mut self, _baud_rate: u32) -> Result<(), Self::Error> {
            Ok(())
        }
    }

    /// Mock transport that returns a predefined response on every read
    struct MockTransport {
        response: Vec<u8>,
    }

    impl MockTransport {
        fn new(response: Vec<u8>) -> Self {
            Self { response }
        }
    }

    impl RfidTransport for MockTransport {
        type Error = io::Error;

        fn write(&mut self, data: &[u8]) -> Result<usize, Self::Error> {
            Ok(data.len())
        }

        fn read(&mut self, buf: &mut [u8], _timeout_ms: u32) -> Result<usize, Self::Error> {
            let len = self.response.len().min(buf.len());
            buf[..len].copy_from_slice(&self.response[..len]);
            Ok(len)
        }

        fn clear_input(&mut self) -> Result<(), Self::Error> {
            Ok(())
        }

        fn set_baud_rate(&mut self, _baud_rate: u32) -> Result<(), Self::Error> {
            Ok(())
        }
    }

    /// Mock transport that answers each written frame with the next scripted
    /// response and records what was sent
    struct ScriptedTransport {
        responses: VecDeque<Vec<u8>>,
        pending: Vec<u8>,
        written: Vec<Vec<u8>>,
        baud_rate: Option<u32>,
    }

    impl ScriptedTransport {
        fn new(responses: Vec<Vec<u8>>) -> Self {
            Self {
                responses: responses.into(),
                pending: Vec::new(),
                written: Vec::new(),
                baud_rate: None,
            }
        }

        fn requests(&self) -> Vec<Request> {
            self.written
                .iter()
                .map(|frame| Request::parse(&decode_bytes(frame).unwrap()).unwrap())
                .collect()
        }
    }

    impl RfidTransport for ScriptedTransport {
        type Error = io::Error;

        fn write(&mut self, data: &[u8]) -> Result<usize, Self::Error> {
            self.written.push(data.to_vec());
            if let Some(response) = self.responses.pop_front() {
                self.pending = response;
            }
            Ok(data.len())
        }

        fn read(&mut self, buf: &mut [u8], _timeout_ms: u32) -> Result<usize, Self::Error> {
            let len = self.pending.len().min(buf.len());
            buf[..len].copy_from_slice(&self.pending[..len]);
            self.pending.drain(..len);
            Ok(len)
        }

        fn clear_input(&mut self) -> Result<(), Self::Error> {
            self.pending.clear();
            Ok(())
        }

        fn set_baud_rate(&mut self, baud_rate: u32) -> Result<(), Self::Error> {
            self.baud_rate = Some(baud_rate);
            Ok(())
        }
    }

    /// Transport whose every operation fails
    struct FailingTransport;

    impl RfidTransport for FailingTransport {
        type Error = io::Error;

        fn write(&mut self, _data: &[u8]) -> Result<usize, Self::Error> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "unplugged"))
        }

        fn read(&mut self, _buf: &mut [u8], _timeout_ms: u32) -> Result<usize, Self::Error> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "unplugged"))
        }

        fn clear_input(&mut self) -> Result<(), Self::Error> {
            Ok(())
        }

        fn set_baud_rate(&mut self, _baud_rate: u32) -> Result<(), Self::Error> {
            Ok(())
        }
    }

    fn quick_timeout() -> ModuleConfig {
        ModuleConfig::default().with_response_timeout(Duration::from_millis(20))
    }

    /// Tag with PC 0x1800 (3 EPC words) and EPC 00 00 11 22 33 44
    fn sample_tag() -> TagRecord {
        TagRecord::from_poll(0x1800, &[0x00, 0x00, 0x11, 0x22, 0x33, 0x44], 0x309C, None).unwrap()
    }

    // ===================
    // version tests
    // ===================

    #[test]
    fn test_get_hardware_version_valid() {
        // BB 01 03 00 0A 00 "M100 V1.0" checksum 7E
        let response = vec![
            0xBB, 0x01, 0x03, 0x00, 0x0A, 0x00, 0x4D, 0x31, 0x30, 0x30, 0x20, 0x56, 0x31, 0x2E,
            0x30, 0xF1, 0x7E,
        ];
        let mut module = UhfModule::new(MockTransport::new(response));

        assert_eq!(module.get_hardware_version().unwrap(), "M100 V1.0");
    }

    #[test]
    fn test_get_software_version_and_manufacturer() {
        let transport = ScriptedTransport::new(vec![
            vec![0xBB, 0x01, 0x03, 0x00, 0x07, 0x01, 0x56, 0x32, 0x2E, 0x33, 0x2E, 0x35, 0x58, 0x7E],
            vec![
                0xBB, 0x01, 0x03, 0x00, 0x08, 0x02, 0x4D, 0x61, 0x67, 0x69, 0x63, 0x52, 0x46, 0x87,
                0x7E,
            ],
        ]);
        let mut module = UhfModule::new(transport);

        assert_eq!(module.get_software_version().unwrap(), "V2.3.5");
        assert_eq!(module.get_manufacturer().unwrap(), "MagicRF");
        assert_eq!(
            module.transport().requests(),
            vec![Request::SoftwareVersion, Request::Manufacturer]
        );
    }

    #[test]
    fn test_get_version_module_error() {
        let response = vec![0xBB, 0x01, 0xFF, 0x00, 0x01, 0x17, 0x18, 0x7E];
        let mut module = UhfModule::new(MockTransport::new(response));

        assert!(matches!(
            module.get_hardware_version(),
            Err(UhfError::Module(ModuleStatus::InvalidCommand))
        ));
    }

    #[test]
    fn test_get_version_timeout() {
        let mut module = UhfModule::with_config(DummyTransport, quick_timeout());
        assert!(matches!(module.get_hardware_version(), Err(UhfError::Timeout)));
    }

    #[test]
    fn test_transport_failure_is_reported() {
        let mut module = UhfModule::new(FailingTransport);
        assert!(matches!(module.get_hardware_version(), Err(UhfError::Transport(_))));
    }

    // ===================
    // single_poll tests
    // ===================

    #[test]
    fn test_single_poll_tag_found() {
        let response = vec![
            0xBB, 0x02, 0x22, 0x00, 0x0A, // header, type, cmd, length 10
            0x18, 0x00, // PC: 3 EPC words
            0x00, 0x00, 0x11, 0x22, 0x33, 0x44, // EPC
            0x30, 0x9C, // CRC-16/GENIBUS over PC+EPC
            0xBC, 0x7E, // checksum, end
        ];
        let mut module = UhfModule::new(MockTransport::new(response));

        let tag = module.single_poll().unwrap().unwrap();
        assert_eq!(tag.epc(), &[0x00, 0x00, 0x11, 0x22, 0x33, 0x44]);
        assert_eq!(tag.pc(), 0x1800);
        assert_eq!(tag.crc(), 0x309C);
        assert_eq!(tag.rssi(), None);
    }

    #[test]
    fn test_single_poll_with_rssi() {
        // Tag response with 12-byte EPC and leading RSSI
        let response = vec![
            0xBB, 0x02, 0x22, 0x00, 0x11, // header, type, cmd, length 17
            0xC8, // RSSI
            0x30, 0x00, // PC: 6 EPC words
            0xE2, 0x00, 0x68, 0x16, 0x00, 0x00, 0x00, 0x60, 0x12, 0x34, 0x56, 0x78, // EPC
            0xB7, 0xDC, // CRC
            0x94, 0x7E, // checksum, end
        ];
        let mut module = UhfModule::new(MockTransport::new(response));

        let tag = module.single_poll().unwrap().unwrap();
        assert_eq!(tag.rssi(), Some(0xC8));
        assert_eq!(tag.epc_hex(), "E20068160000006012345678");
    }

    #[test]
    fn test_single_poll_no_tag() {
        // Error notification 0x15: inventory found nothing
        let response = vec![0xBB, 0x01, 0xFF, 0x00, 0x01, 0x15, 0x16, 0x7E];
        let mut module = UhfModule::new(MockTransport::new(response));

        assert!(module.single_poll().unwrap().is_none());
    }

    #[test]
    fn test_single_poll_invalid_command_is_an_error() {
        let response = vec![0xBB, 0x01, 0xFF, 0x00, 0x01, 0x17, 0x18, 0x7E];
        let mut module = UhfModule::new(MockTransport::new(response));

        assert!(matches!(
            module.single_poll(),
            Err(UhfError::Module(ModuleStatus::InvalidCommand))
        ));
    }

    #[test]
    fn test_single_poll_other_statuses_are_errors() {
        for status in [ModuleStatus::AccessDenied, ModuleStatus::Unknown(0x42)] {
            let response = Response::error(status).to_bytes();
            let mut module = UhfModule::new(MockTransport::new(response));

            match module.single_poll() {
                Err(UhfError::Module(reported)) => assert_eq!(reported, status),
                other => panic!("{:?} should be an error, got {:?}", status, other),
            }
        }
    }

    #[test]
    fn test_single_poll_corrupted_epc_fails_crc() {
        let pc_epc = [0x18, 0x00, 0x00, 0x00, 0x11, 0x22, 0x33, 0x44];

        for position in 2..pc_epc.len() {
            let mut corrupted = pc_epc.to_vec();
            corrupted[position] ^= 0x01;
            let mut payload = corrupted.clone();
            payload.extend_from_slice(&[0x30, 0x9C]);
            // Frame checksum recomputed, only the CRC can catch it
            let response = Response::new(frame::KIND_TAG, catalog::OP_SINGLE_POLL, payload);
            let mut module = UhfModule::new(MockTransport::new(response.to_bytes()));

            match module.single_poll() {
                Err(UhfError::Integrity(FrameError::CrcMismatch { found, computed })) => {
                    assert_eq!(found, 0x309C);
                    assert_eq!(computed, checksum::crc16_genibus(&corrupted));
                }
                other => panic!("EPC byte {} corrupted, got {:?}", position - 2, other),
            }
        }
    }

    #[test]
    fn test_single_poll_last_epc_byte_changed() {
        // Last EPC byte 0x44 -> 0x45, frame checksum recomputed
        let response = vec![
            0xBB, 0x02, 0x22, 0x00, 0x0A, 0x18, 0x00, 0x00, 0x00, 0x11, 0x22, 0x33, 0x45, 0x30,
            0x9C, 0xBD, 0x7E,
        ];
        let mut module = UhfModule::new(MockTransport::new(response));

        assert!(matches!(
            module.single_poll(),
            Err(UhfError::Integrity(FrameError::CrcMismatch {
                found: 0x309C,
                computed: 0x20BD
            }))
        ));
    }

    #[test]
    fn test_single_poll_bad_checksum() {
        let response = vec![
            0xBB, 0x02, 0x22, 0x00, 0x0A, 0x18, 0x00, 0x00, 0x00, 0x11, 0x22, 0x33, 0x44, 0x30,
            0x9C, 0xBD, 0x7E,
        ];
        let mut module = UhfModule::new(MockTransport::new(response));

        assert!(matches!(
            module.single_poll(),
            Err(UhfError::Integrity(FrameError::ChecksumMismatch { .. }))
        ));
    }

    #[test]
    fn test_single_poll_inconsistent_length_is_rejected() {
        // Declares 8 payload bytes but carries 10; PC 0xAB would announce 42 EPC bytes
        let response = vec![
            0xBB, 0x00, 0x22, 0x00, 0x08, 0xAB, 0xCD, 0x00, 0x00, 0x11, 0x22, 0x33, 0x44, 0x99,
            0x88, 0x6D, 0x7E,
        ];
        let mut module = UhfModule::new(MockTransport::new(response));

        assert!(matches!(
            module.single_poll(),
            Err(UhfError::Frame(FrameError::LengthMismatch {
                declared: 8,
                actual: 10
            }))
        ));
    }

    #[test]
    fn test_single_poll_pc_disagrees_with_payload() {
        // PC announces 4 EPC words, payload carries 3
        let response = Response::new(
            frame::KIND_TAG,
            catalog::OP_SINGLE_POLL,
            vec![0x20, 0x00, 0x00, 0x00, 0x11, 0x22, 0x33, 0x44, 0x30, 0x9C],
        )
        .to_bytes();
        let mut module = UhfModule::new(MockTransport::new(response));

        assert!(matches!(
            module.single_poll(),
            Err(UhfError::Frame(FrameError::LengthMismatch { .. }))
        ));
    }

    #[test]
    fn test_single_poll_end_marker_inside_epc() {
        // EPC 7E 01 02 7E 03 04 contains the end marker twice
        let response = vec![
            0xBB, 0x02, 0x22, 0x00, 0x0A, 0x18, 0x00, 0x7E, 0x01, 0x02, 0x7E, 0x03, 0x04, 0xB9,
            0x77, 0x7C, 0x7E,
        ];
        let mut module = UhfModule::new(MockTransport::new(response));

        let tag = module.single_poll().unwrap().unwrap();
        assert_eq!(tag.epc(), &[0x7E, 0x01, 0x02, 0x7E, 0x03, 0x04]);
    }

    #[test]
    fn test_single_poll_skips_noise_before_frame() {
        let mut response = vec![0x00, 0x55, 0x7E];
        response.extend_from_slice(&[
            0xBB, 0x02, 0x22, 0x00, 0x0A, 0x18, 0x00, 0x00, 0x00, 0x11, 0x22, 0x33, 0x44, 0x30,
            0x9C, 0xBC, 0x7E,
        ]);
        let mut module = UhfModule::new(MockTransport::new(response));

        assert_eq!(module.single_poll().unwrap().unwrap(), sample_tag());
    }

    #[test]
    fn test_single_poll_truncated_frame_times_out() {
        let response = vec![0xBB, 0x02, 0x22, 0x00];
        let mut module = UhfModule::with_config(MockTransport::new(response), quick_timeout());

        assert!(matches!(module.single_poll(), Err(UhfError::Timeout)));
    }

    #[test]
    fn test_single_poll_through_channel_transport() {
        /// Writer standing in for the module: answers every frame at once
        struct Loopback {
            sink: Option<ByteSink>,
            response: Vec<u8>,
        }

        impl io::Write for Loopback {
            fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
                if let Some(sink) = &self.sink {
                    sink.on_bytes(&self.response);
                }
                Ok(buf.len())
            }

            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        let loopback = Loopback {
            sink: None,
            response: sample_tag_poll_frame(),
        };
        let (mut transport, sink) = ChannelTransport::new(loopback, 115200);
        transport.writer_mut().sink = Some(sink);

        let mut module = UhfModule::with_config(transport, quick_timeout());
        assert_eq!(module.single_poll().unwrap().unwrap(), sample_tag());
    }

    fn sample_tag_poll_frame() -> Vec<u8> {
        vec![
            0xBB, 0x02, 0x22, 0x00, 0x0A, 0x18, 0x00, 0x00, 0x00, 0x11, 0x22, 0x33, 0x44, 0x30,
            0x9C, 0xBC, 0x7E,
        ]
    }

    // ===================
    // select tests
    // ===================

    #[test]
    fn test_set_select_sends_epc_mask() {
        let ack = vec![0xBB, 0x01, 0x0C, 0x00, 0x01, 0x00, 0x0E, 0x7E];
        let mut module = UhfModule::new(ScriptedTransport::new(vec![ack]));

        module.set_select(&sample_tag()).unwrap();
        assert_eq!(
            module.transport().written[0],
            [
                0xBB, 0x00, 0x0C, 0x00, 0x0D, 0x01, 0x00, 0x00, 0x00, 0x20, 0x30, 0x00, 0x00, 0x00,
                0x11, 0x22, 0x33, 0x44, 0x14, 0x7E
            ]
        );
    }

    #[test]
    fn test_set_select_without_epc() {
        let mut module = UhfModule::new(ScriptedTransport::new(vec![]));

        assert!(matches!(
            module.set_select(&TagRecord::new()),
            Err(UhfError::InvalidParameter(_))
        ));
        assert!(module.transport().written.is_empty());
    }

    #[test]
    fn test_set_select_rejected() {
        let response = vec![0xBB, 0x01, 0x0C, 0x00, 0x01, 0x01, 0x0F, 0x7E];
        let mut module = UhfModule::new(MockTransport::new(response));

        assert!(matches!(
            module.set_select(&sample_tag()),
            Err(UhfError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_set_select_mode_valid() {
        let response = vec![0xBB, 0x01, 0x12, 0x00, 0x01, 0x00, 0x14, 0x7E];
        let mut module = UhfModule::new(ScriptedTransport::new(vec![response]));

        module.set_select_mode(SelectMode::NonPolling).unwrap();
        assert_eq!(
            module.transport().requests(),
            vec![Request::SetSelectMode(SelectMode::NonPolling)]
        );
    }

    // ===================
    // read_bank tests
    // ===================

    #[test]
    fn test_read_bank_tid() {
        // [UL=8, PC, EPC, data E2 00 34 12]
        let response = vec![
            0xBB, 0x01, 0x39, 0x00, 0x0D, 0x08, 0x18, 0x00, 0x00, 0x00, 0x11, 0x22, 0x33, 0x44,
            0xE2, 0x00, 0x34, 0x12, 0x39, 0x7E,
        ];
        let mut module = UhfModule::new(ScriptedTransport::new(vec![response]));
        let mut tag = sample_tag();

        let outcome = module.read_bank(&mut tag, MemoryBank::Tid, 0, 2).unwrap();
        assert_eq!(outcome, ReadOutcome::Success);
        assert_eq!(tag.tid(), &[0xE2, 0x00, 0x34, 0x12]);
        assert_eq!(
            module.transport().requests(),
            vec![Request::ReadBank {
                access_password: 0,
                bank: MemoryBank::Tid,
                word_address: 0,
                word_count: 2
            }]
        );
    }

    #[test]
    fn test_read_bank_epc_splits_crc_and_pc() {
        let response = vec![
            0xBB, 0x01, 0x39, 0x00, 0x13, 0x08, 0x18, 0x00, 0x00, 0x00, 0x11, 0x22, 0x33, 0x44,
            0x30, 0x9C, 0x18, 0x00, 0x00, 0x00, 0x11, 0x22, 0x33, 0x44, 0xA5, 0x7E,
        ];
        let mut module = UhfModule::new(MockTransport::new(response));
        let mut tag = TagRecord::new();

        let outcome = module.read_bank(&mut tag, MemoryBank::Epc, 0, 5).unwrap();
        assert_eq!(outcome, ReadOutcome::Success);
        assert_eq!(tag, sample_tag());
    }

    #[test]
    fn test_read_bank_overrun() {
        let response = vec![0xBB, 0x01, 0xFF, 0x00, 0x01, 0xA3, 0xA4, 0x7E];
        let mut module = UhfModule::new(MockTransport::new(response));
        let mut tag = sample_tag();

        let outcome = module.read_bank(&mut tag, MemoryBank::User, 0, 40).unwrap();
        assert_eq!(outcome, ReadOutcome::MemoryOverrun);
        assert_eq!(tag, sample_tag());
    }

    #[test]
    fn test_read_bank_no_tag_response() {
        let response = vec![0xBB, 0x01, 0xFF, 0x00, 0x01, 0x09, 0x0A, 0x7E];
        let mut module = UhfModule::new(MockTransport::new(response));

        let outcome = module
            .read_bank(&mut sample_tag(), MemoryBank::User, 0, 8)
            .unwrap();
        assert_eq!(outcome, ReadOutcome::NoTagResponse);
    }

    #[test]
    fn test_read_bank_access_denied() {
        let response = vec![0xBB, 0x01, 0xFF, 0x00, 0x01, 0x16, 0x17, 0x7E];
        let mut module = UhfModule::new(MockTransport::new(response));

        assert!(matches!(
            module.read_bank(&mut sample_tag(), MemoryBank::Reserved, 0, 4),
            Err(UhfError::Module(ModuleStatus::AccessDenied))
        ));
    }

    #[test]
    fn test_read_bank_zero_words() {
        let mut module = UhfModule::new(DummyTransport);

        assert!(matches!(
            module.read_bank(&mut sample_tag(), MemoryBank::User, 0, 0),
            Err(UhfError::InvalidParameter(_))
        ));
    }

    // ===================
    // write_bank tests
    // ===================

    const SELECT_ACK: [u8; 8] = [0xBB, 0x01, 0x0C, 0x00, 0x01, 0x00, 0x0E, 0x7E];
    const WRITE_ACK: [u8; 17] = [
        0xBB, 0x01, 0x49, 0x00, 0x0A, 0x08, 0x18, 0x00, 0x00, 0x00, 0x11, 0x22, 0x33, 0x44, 0x00,
        0x1E, 0x7E,
    ];

    #[test]
    fn test_write_bank_user() {
        let mut source = TagRecord::new();
        source.set_bank(MemoryBank::User, &[0xCA, 0xFE, 0xBA, 0xBE]).unwrap();
        let mut module = UhfModule::new(ScriptedTransport::new(vec![
            SELECT_ACK.to_vec(),
            WRITE_ACK.to_vec(),
        ]));

        module
            .write_bank(&source, &sample_tag(), MemoryBank::User, 0, 0)
            .unwrap();

        let requests = module.transport().requests();
        assert!(matches!(requests[0], Request::SetSelect { .. }));
        assert_eq!(
            requests[1],
            Request::WriteBank {
                access_password: 0,
                bank: MemoryBank::User,
                word_address: 0,
                data: vec![0xCA, 0xFE, 0xBA, 0xBE],
            }
        );
    }

    #[test]
    fn test_write_bank_epc_writes_pc_first() {
        let mut source = TagRecord::new();
        source.set_epc(&[0xE2, 0x00, 0x00, 0x01]).unwrap();
        let mut module = UhfModule::new(ScriptedTransport::new(vec![
            SELECT_ACK.to_vec(),
            WRITE_ACK.to_vec(),
        ]));

        module
            .write_bank(&source, &sample_tag(), MemoryBank::Epc, EPC_PC_WORD_ADDRESS, 0)
            .unwrap();

        assert_eq!(
            module.transport().requests()[1],
            Request::WriteBank {
                access_password: 0,
                bank: MemoryBank::Epc,
                word_address: 1,
                data: vec![0x10, 0x00, 0xE2, 0x00, 0x00, 0x01],
            }
        );
    }

    #[test]
    fn test_write_bank_in_chunks() {
        let mut source = TagRecord::new();
        let user: Vec<u8> = (0..80).collect();
        source.set_bank(MemoryBank::User, &user).unwrap();
        let mut module = UhfModule::new(ScriptedTransport::new(vec![
            SELECT_ACK.to_vec(),
            WRITE_ACK.to_vec(),
            WRITE_ACK.to_vec(),
        ]));

        module
            .write_bank(&source, &sample_tag(), MemoryBank::User, 0, 0)
            .unwrap();

        let writes: Vec<(u16, usize)> = module
            .transport()
            .requests()
            .into_iter()
            .filter_map(|r| match r {
                Request::WriteBank {
                    word_address, data, ..
                } => Some((word_address, data.len())),
                _ => None,
            })
            .collect();
        assert_eq!(writes, vec![(0, 64), (32, 16)]);
    }

    #[test]
    fn test_write_bank_module_error() {
        let mut source = TagRecord::new();
        source.set_bank(MemoryBank::User, &[0x01, 0x02]).unwrap();
        let mut module = UhfModule::new(ScriptedTransport::new(vec![
            SELECT_ACK.to_vec(),
            vec![0xBB, 0x01, 0xFF, 0x00, 0x01, 0x10, 0x11, 0x7E],
        ]));

        assert!(matches!(
            module.write_bank(&source, &sample_tag(), MemoryBank::User, 0, 0),
            Err(UhfError::Module(ModuleStatus::WriteFail))
        ));
    }

    #[test]
    fn test_write_bank_empty_source() {
        let mut module = UhfModule::new(ScriptedTransport::new(vec![]));

        assert!(matches!(
            module.write_bank(&TagRecord::new(), &sample_tag(), MemoryBank::User, 0, 0),
            Err(UhfError::InvalidParameter(_))
        ));
        assert!(module.transport().written.is_empty());
    }

    // ===================
    // lock / kill tests
    // ===================

    #[test]
    fn test_lock_tag_valid() {
        let response = vec![
            0xBB, 0x01, 0x82, 0x00, 0x0A, 0x08, 0x18, 0x00, 0x00, 0x00, 0x11, 0x22, 0x33, 0x44,
            0x00, 0x57, 0x7E,
        ];
        let mut module = UhfModule::new(ScriptedTransport::new(vec![response]));

        module.lock_tag(0x1234_5678, 0x0_0802).unwrap();
        assert_eq!(
            module.transport().requests(),
            vec![Request::Lock {
                access_password: 0x1234_5678,
                payload: 0x0_0802
            }]
        );
    }

    #[test]
    fn test_lock_tag_payload_too_wide() {
        let mut module = UhfModule::new(DummyTransport);
        assert!(matches!(
            module.lock_tag(0, 0x10_0000),
            Err(UhfError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_kill_tag() {
        let response = vec![
            0xBB, 0x01, 0x65, 0x00, 0x0A, 0x08, 0x18, 0x00, 0x00, 0x00, 0x11, 0x22, 0x33, 0x44,
            0x00, 0x3A, 0x7E,
        ];
        let mut module = UhfModule::new(MockTransport::new(response));

        module.kill_tag(0xDEAD_BEEF).unwrap();
        assert!(matches!(module.kill_tag(0), Err(UhfError::InvalidParameter(_))));
    }

    // ===================
    // configuration tests
    // ===================

    #[test]
    fn test_set_baud_rate_reconfigures_transport() {
        let mut module = UhfModule::new(ScriptedTransport::new(vec![]));

        module.set_baud_rate(9600).unwrap();
        assert_eq!(
            module.transport().written,
            vec![vec![0xBB, 0x00, 0x11, 0x00, 0x02, 0x00, 0x60, 0x73, 0x7E]]
        );
        assert_eq!(module.transport().baud_rate, Some(9600));
        assert_eq!(module.baud_rate(), 9600);
    }

    #[test]
    fn test_set_baud_rate_unsupported() {
        let mut module = UhfModule::new(ScriptedTransport::new(vec![]));

        assert!(matches!(
            module.set_baud_rate(14400),
            Err(UhfError::InvalidParameter(_))
        ));
        assert!(module.transport().written.is_empty());
        assert_eq!(module.baud_rate(), 115200);
    }

    #[test]
    fn test_set_working_area() {
        let response = vec![0xBB, 0x01, 0x07, 0x00, 0x01, 0x00, 0x09, 0x7E];
        let mut module = UhfModule::new(MockTransport::new(response));

        assert_eq!(module.working_area(), None);
        module.set_working_area(WorkingArea::Europe).unwrap();
        assert_eq!(module.working_area(), Some(WorkingArea::Europe));
    }

    #[test]
    fn test_set_working_area_rejected() {
        let response = vec![0xBB, 0x01, 0x07, 0x00, 0x01, 0x01, 0x0A, 0x7E];
        let mut module = UhfModule::new(MockTransport::new(response));

        assert!(matches!(
            module.set_working_area(WorkingArea::Us),
            Err(UhfError::InvalidResponse(_))
        ));
        assert_eq!(module.working_area(), None);
    }

    #[test]
    fn test_set_working_channel_and_hopping() {
        let mut module = UhfModule::new(ScriptedTransport::new(vec![
            vec![0xBB, 0x01, 0xAB, 0x00, 0x01, 0x00, 0xAD, 0x7E],
            vec![0xBB, 0x01, 0xAD, 0x00, 0x01, 0x00, 0xAF, 0x7E],
        ]));

        module.set_working_channel(5).unwrap();
        module.set_frequency_hopping(true).unwrap();
        assert_eq!(
            module.transport().requests(),
            vec![
                Request::SetWorkingChannel(5),
                Request::SetFrequencyHopping(true)
            ]
        );
    }

    #[test]
    fn test_get_transmitting_power() {
        // 20 dBm (2000 = 0x07D0)
        let response = vec![0xBB, 0x01, 0xB7, 0x00, 0x02, 0x07, 0xD0, 0x91, 0x7E];
        let mut module = UhfModule::new(MockTransport::new(response));

        assert_eq!(module.get_transmitting_power().unwrap(), 20);
    }

    #[test]
    fn test_set_transmitting_power() {
        let response = vec![0xBB, 0x01, 0xB6, 0x00, 0x01, 0x00, 0xB8, 0x7E];
        let mut module = UhfModule::new(ScriptedTransport::new(vec![response]));

        module.set_transmitting_power(26).unwrap();
        assert_eq!(
            module.transport().requests(),
            vec![Request::SetTransmitPower(26)]
        );
    }

    #[test]
    fn test_set_transmitting_power_not_in_catalog() {
        let mut module = UhfModule::new(DummyTransport);

        assert!(matches!(
            module.set_transmitting_power(25),
            Err(UhfError::InvalidParameter(_))
        ));
        assert!(matches!(
            module.set_transmitting_power(30),
            Err(UhfError::InvalidParameter(_))
        ));
    }
}
