//! Driver configuration.

use embassy_time::Duration;

/// I2C address of expander A: all address straps tied to ground.
pub const EXPANDER_A_ADDRESS: u8 = 0b010_0000;
/// I2C address of expander B: A2 strapped to 3.3V, A1 and A0 to ground.
pub const EXPANDER_B_ADDRESS: u8 = 0b010_0100;

/// Timing and addressing parameters of the expander bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Time the bus is left to settle before the very first transaction.
    pub settle_delay: Duration,
    /// Upper bound for a single addressed write or read.
    pub bus_timeout: Duration,
    /// 7-bit addresses of expander A and expander B.
    pub addresses: [u8; 2],
}

impl Default for Config {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_millis(1000),
            bus_timeout: Duration::from_millis(1000),
            addresses: [EXPANDER_A_ADDRESS, EXPANDER_B_ADDRESS],
        }
    }
}
