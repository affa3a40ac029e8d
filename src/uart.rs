//! UART transport for ESP32 using esp-idf-svc

use crate::config::ModuleConfig;
use crate::transport::RfidTransport;
use esp_idf_svc::hal::delay::TickType;
use esp_idf_svc::hal::gpio::{self, InputPin, OutputPin};
use esp_idf_svc::hal::peripheral::Peripheral;
use esp_idf_svc::hal::uart::{self, UartDriver};
use esp_idf_svc::sys::EspError;
use log::{debug, info};
use std::time::Duration;

/// Time the module needs after power-up before it accepts commands
const POWER_UP_DELAY: Duration = Duration::from_millis(500);

/// M100 module wired to one of the ESP32 UARTs, no flow control
pub struct UartTransport<'a> {
    uart: UartDriver<'a>,
    baud_rate: u32,
}

impl<'a> UartTransport<'a> {
    /// Open the UART at the configured initial baud rate and wait for the
    /// module to come up.
    pub fn new(
        uart: impl Peripheral<P = impl uart::Uart> + 'a,
        tx: impl Peripheral<P = impl OutputPin> + 'a,
        rx: impl Peripheral<P = impl InputPin> + 'a,
        config: &ModuleConfig,
    ) -> Result<Self, EspError> {
        let baud_rate = config.initial_baud_rate;
        let uart_config = uart::config::Config::default().baudrate(baud_rate.into());
        let uart = UartDriver::new(
            uart,
            tx,
            rx,
            Option::<gpio::Gpio0>::None,
            Option::<gpio::Gpio0>::None,
            &uart_config,
        )?;

        std::thread::sleep(POWER_UP_DELAY);
        uart.clear_rx()?;
        info!("UART open at {} baud", baud_rate);

        Ok(Self { uart, baud_rate })
    }

    pub fn baud_rate(&self) -> u32 {
        self.baud_rate
    }
}

impl RfidTransport for UartTransport<'_> {
    type Error = EspError;

    fn write(&mut self, data: &[u8]) -> Result<usize, Self::Error> {
        let mut sent = 0;
        while sent < data.len() {
            sent += self.uart.write(&data[sent..])?;
        }
        Ok(sent)
    }

    /// Returns 0 when nothing arrived within `timeout_ms`.
    fn read(&mut self, buf: &mut [u8], timeout_ms: u32) -> Result<usize, Self::Error> {
        self.uart
            .read(buf, TickType::new_millis(timeout_ms as u64).ticks())
    }

    fn clear_input(&mut self) -> Result<(), Self::Error> {
        self.uart.clear_rx()
    }

    fn set_baud_rate(&mut self, baud_rate: u32) -> Result<(), Self::Error> {
        // Let the command leave the TX FIFO at the old rate first
        self.uart
            .wait_tx_done(TickType::new_millis(POWER_UP_DELAY.as_millis() as u64).ticks())?;
        let actual = self.uart.change_baudrate(baud_rate)?;
        debug!("UART baud rate {} requested, {:?} set", baud_rate, actual);
        self.baud_rate = baud_rate;
        Ok(())
    }
}
