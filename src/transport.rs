use std::io;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::time::Duration;

/// Trait for RFID reader communication backends.
/// Implement this trait for different transports (UART, serial port, etc.)
pub trait RfidTransport {
    /// Error type for transport operations
    type Error: std::fmt::Debug;

    /// Write data to the transport
    fn write(&mut self, data: &[u8]) -> Result<usize, Self::Error>;

    /// Read data from the transport with a timeout in milliseconds
    fn read(&mut self, buf: &mut [u8], timeout_ms: u32) -> Result<usize, Self::Error>;

    /// Clear the input buffer
    fn clear_input(&mut self) -> Result<(), Self::Error>;

    /// Switch the local side of the link to a new baud rate
    fn set_baud_rate(&mut self, baud_rate: u32) -> Result<(), Self::Error>;
}

/// Byte-received callback side of a [`ChannelTransport`].
///
/// Hand this to whatever delivers bytes asynchronously (an RX interrupt
/// handler, a reader thread) and call [`ByteSink::on_byte`] per byte.
#[derive(Debug, Clone)]
pub struct ByteSink {
    tx: Sender<u8>,
}

impl ByteSink {
    /// Returns `false` once the transport has been dropped.
    pub fn on_byte(&self, byte: u8) -> bool {
        self.tx.send(byte).is_ok()
    }

    pub fn on_bytes(&self, bytes: &[u8]) -> bool {
        bytes.iter().all(|&b| self.on_byte(b))
    }
}

/// Transport fed by a byte callback instead of a blocking read.
///
/// Outgoing frames go to `writer`; incoming bytes arrive through the paired
/// [`ByteSink`].
pub struct ChannelTransport<W> {
    writer: W,
    rx: Receiver<u8>,
    baud_rate: u32,
}

impl<W: io::Write> ChannelTransport<W> {
    pub fn new(writer: W, baud_rate: u32) -> (Self, ByteSink) {
        let (tx, rx) = mpsc::channel();
        (
            Self {
                writer,
                rx,
                baud_rate,
            },
            ByteSink { tx },
        )
    }

    pub fn baud_rate(&self) -> u32 {
        self.baud_rate
    }

    pub fn writer(&self) -> &W {
        &self.writer
    }

    pub fn writer_mut(&mut self) -> &mut W {
        &mut self.writer
    }
}

impl<W: io::Write> RfidTransport for ChannelTransport<W> {
    type Error = io::Error;

    fn write(&mut self, data: &[u8]) -> Result<usize, Self::Error> {
        self.writer.write_all(data)?;
        self.writer.flush()?;
        Ok(data.len())
    }

    fn read(&mut self, buf: &mut [u8], timeout_ms: u32) -> Result<usize, Self::Error> {
        if buf.is_empty() {
            return Ok(0);
        }

        match self.rx.recv_timeout(Duration::from_millis(timeout_ms as u64)) {
            Ok(byte) => buf[0] = byte,
            Err(RecvTimeoutError::Timeout) => return Ok(0),
            Err(RecvTimeoutError::Disconnected) => {
                return Err(io::Error::new(
                    io::ErrorKind::BrokenPipe,
                    "byte sink dropped",
                ));
            }
        }

        let mut count = 1;
        while count < buf.len() {
            match self.rx.try_recv() {
                Ok(byte) => {
                    buf[count] = byte;
                    count += 1;
                }
                Err(_) => break,
            }
        }
        Ok(count)
    }

    fn clear_input(&mut self) -> Result<(), Self::Error> {
        loop {
            match self.rx.try_recv() {
                Ok(_) => continue,
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => return Ok(()),
            }
        }
    }

    fn set_baud_rate(&mut self, baud_rate: u32) -> Result<(), Self::Error> {
        self.baud_rate = baud_rate;
        Ok(())
    }
}
