//! MCP23017 port expanders carrying the remote half of the matrix.
//!
//! Both chips sit on the same I2C bus and are used as 16 pulled-up inputs
//! each. Registers are addressed in the power-on `IOCON.BANK = 0` layout, so
//! a write starting at a port A register auto-increments into the matching
//! port B register.

use embassy_time::{with_timeout, Timer};
use embedded_hal_async::i2c::{I2c, SevenBitAddress};

use crate::conf::Config;
use crate::err::{BusError, ExpanderFault, FaultStage, LinkHealth};

/// MCP23017 register addresses (`IOCON.BANK = 0`).
pub mod reg {
    /// I/O direction, port A. A set bit makes the pin an input.
    pub const IODIRA: u8 = 0x00;
    /// I/O direction, port B.
    pub const IODIRB: u8 = 0x01;
    /// Pull-up enable, port A.
    pub const GPPUA: u8 = 0x0C;
    /// Pull-up enable, port B.
    pub const GPPUB: u8 = 0x0D;
    /// Port A pin levels (writing modifies `OLATA`).
    pub const GPIOA: u8 = 0x12;
    /// Port B pin levels (writing modifies `OLATB`).
    pub const GPIOB: u8 = 0x13;
    /// Output latch, port A.
    pub const OLATA: u8 = 0x14;
    /// Output latch, port B.
    pub const OLATB: u8 = 0x15;
}

/// Every pin an input.
const ALL_INPUTS: u8 = 0b1111_1111;
/// Every pull-up enabled.
const ALL_PULL_UPS: u8 = 0b1111_1111;

/// One of the two expander chips.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpanderId {
    /// The chip with all address straps low.
    A,
    /// The chip with A2 strapped high.
    B,
}

impl ExpanderId {
    /// Both chips, in initialization order.
    pub const ALL: [ExpanderId; 2] = [ExpanderId::A, ExpanderId::B];

    #[inline]
    pub(crate) const fn index(self) -> usize {
        match self {
            ExpanderId::A => 0,
            ExpanderId::B => 1,
        }
    }
}

/// One of the two 8-bit GPIO ports of a chip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Port {
    A,
    B,
}

impl Port {
    /// The GPIO register holding this port's pin levels.
    #[inline]
    pub const fn gpio_register(self) -> u8 {
        match self {
            Port::A => reg::GPIOA,
            Port::B => reg::GPIOB,
        }
    }
}

/// Outcome of configuring both expanders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InitReport {
    results: [Result<(), ExpanderFault>; 2],
}

impl InitReport {
    /// Result for a single chip.
    pub fn result(&self, expander: ExpanderId) -> Result<(), ExpanderFault> {
        self.results[expander.index()]
    }

    /// `true` only if both chips were configured.
    pub fn is_ok(&self) -> bool {
        self.results.iter().all(Result::is_ok)
    }

    /// Combined link health. Reports the first failing chip.
    pub fn health(&self) -> LinkHealth {
        self.results
            .iter()
            .find_map(|result| result.err())
            .map_or(LinkHealth::Healthy, LinkHealth::Faulted)
    }
}

/// The pair of MCP23017 expanders on the shared bus.
pub struct Expanders<I2cType>
where
    I2cType: I2c<SevenBitAddress>,
{
    i2c: I2cType,
    config: Config,
    bus_ready: bool,
}

impl<I2cType> Expanders<I2cType>
where
    I2cType: I2c<SevenBitAddress>,
{
    /// Creates the expander pair. No bus traffic happens until [`Self::init`].
    ///
    /// # Arguments
    ///
    /// * `i2c` - The I2C bus both chips are attached to.
    /// * `config` - Addresses and timing of the bus.
    pub fn new(i2c: I2cType, config: Config) -> Self {
        Self {
            i2c,
            config,
            bus_ready: false,
        }
    }

    /// Configures both chips as 16 pulled-up inputs.
    ///
    /// The first call waits for the bus to settle. A failure on one chip does
    /// not stop the other from being configured; the report holds both
    /// results. Nothing is retried here.
    pub async fn init(&mut self) -> InitReport {
        log::debug!("init mcp23017");

        if !self.bus_ready {
            self.bus_ready = true;
            Timer::after(self.config.settle_delay).await;
        }

        let mut results = [Ok(()); 2];
        for expander in ExpanderId::ALL {
            results[expander.index()] = self.configure(expander).await;
        }
        InitReport { results }
    }

    async fn configure(&mut self, expander: ExpanderId) -> Result<(), ExpanderFault> {
        self.write(expander, &[reg::IODIRA, ALL_INPUTS, ALL_INPUTS])
            .await
            .map_err(|error| {
                log::warn!("mcp23017 {expander:?}: pin direction write failed: {error:?}");
                ExpanderFault {
                    expander,
                    stage: FaultStage::Direction,
                    error,
                }
            })?;
        log::trace!("mcp23017 {expander:?}: pin direction set");

        self.write(expander, &[reg::GPPUA, ALL_PULL_UPS, ALL_PULL_UPS])
            .await
            .map_err(|error| {
                log::warn!("mcp23017 {expander:?}: pull-up write failed: {error:?}");
                ExpanderFault {
                    expander,
                    stage: FaultStage::PullUp,
                    error,
                }
            })?;
        log::trace!("mcp23017 {expander:?}: pull-ups enabled");

        Ok(())
    }

    /// Reads the raw pin levels of one port.
    ///
    /// Selects the GPIO register with a write, then reads one byte back in a
    /// separate transaction. Each transaction is bounded by the bus timeout.
    pub async fn read_port(
        &mut self,
        expander: ExpanderId,
        port: Port,
    ) -> Result<u8, ExpanderFault> {
        self.write(expander, &[port.gpio_register()])
            .await
            .map_err(|error| ExpanderFault {
                expander,
                stage: FaultStage::SelectRegister,
                error,
            })?;

        let mut data = [0u8; 1];
        self.read(expander, &mut data)
            .await
            .map_err(|error| ExpanderFault {
                expander,
                stage: FaultStage::ReadPort,
                error,
            })?;

        Ok(data[0])
    }

    async fn write(&mut self, expander: ExpanderId, bytes: &[u8]) -> Result<(), BusError> {
        let address = self.config.addresses[expander.index()];
        with_timeout(self.config.bus_timeout, self.i2c.write(address, bytes))
            .await?
            .map_err(BusError::from_i2c)
    }

    async fn read(&mut self, expander: ExpanderId, buffer: &mut [u8]) -> Result<(), BusError> {
        let address = self.config.addresses[expander.index()];
        with_timeout(self.config.bus_timeout, self.i2c.read(address, buffer))
            .await?
            .map_err(BusError::from_i2c)
    }
}
