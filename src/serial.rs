//! Serial port transport for desktop using serialport crate

use crate::config::ModuleConfig;
use crate::transport::RfidTransport;
use log::{debug, info};
use std::io::{self, Read, Write};
use std::time::Duration;

/// Delay after opening the port before the module answers reliably
const SETTLE_TIME: Duration = Duration::from_millis(500);

/// M100 module behind a USB-serial adapter
pub struct SerialTransport {
    port: Box<dyn serialport::SerialPort>,
}

impl SerialTransport {
    pub fn new(port_name: &str, config: &ModuleConfig) -> Result<Self, serialport::Error> {
        let port = serialport::new(port_name, config.initial_baud_rate)
            .timeout(config.response_timeout)
            .open()?;
        std::thread::sleep(SETTLE_TIME);
        port.clear(serialport::ClearBuffer::Input)?;
        info!("Opened {} at {} baud", port_name, config.initial_baud_rate);

        Ok(Self { port })
    }

    pub fn port_name(&self) -> Option<String> {
        self.port.name()
    }
}

impl RfidTransport for SerialTransport {
    type Error = io::Error;

    fn write(&mut self, data: &[u8]) -> Result<usize, Self::Error> {
        self.port.write_all(data)?;
        self.port.flush()?;
        Ok(data.len())
    }

    /// A read timeout is not an error here, just no bytes.
    fn read(&mut self, buf: &mut [u8], timeout_ms: u32) -> Result<usize, Self::Error> {
        self.port
            .set_timeout(Duration::from_millis(timeout_ms as u64))
            .map_err(io::Error::other)?;
        match self.port.read(buf) {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == io::ErrorKind::TimedOut => Ok(0),
            Err(e) => Err(e),
        }
    }

    fn clear_input(&mut self) -> Result<(), Self::Error> {
        self.port
            .clear(serialport::ClearBuffer::Input)
            .map_err(io::Error::other)
    }

    fn set_baud_rate(&mut self, baud_rate: u32) -> Result<(), Self::Error> {
        self.port.flush()?;
        self.port.set_baud_rate(baud_rate).map_err(io::Error::other)?;
        debug!("Serial port now at {} baud", baud_rate);
        Ok(())
    }
}
