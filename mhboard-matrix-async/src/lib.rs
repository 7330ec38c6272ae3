//! An asynchronous, `no_std` key matrix scanner for the mhboard split keyboard.
//!
//! The left half of the 10x6 matrix is wired straight to microcontroller
//! pins. The right half is read over I2C from two MCP23017 port expanders.
//! This crate provides a `MatrixScanner` that fills a `KeyMatrix` one row at a
//! time, and keeps working when the right half is unplugged: a bus failure
//! reports the remote keys as released and a re-initialization is attempted
//! every 256 scan cycles until the expanders answer again.
//!
//! # Usage
//!
//! To use this driver, you need an I2C peripheral implementing
//! `embedded-hal-async::i2c::I2c` and local pins implementing
//! `embedded-hal::digital::InputPin`, configured with pull-ups.
//!
//! ```ignore
//! # #![no_std]
//! # #![no_main]
//! # use esp_hal::i2c::master::I2c;
//! # use esp_hal::gpio::{Input, InputConfig, Pull};
//! # use esp_hal::Config;
//! # use esp_hal::clock::CpuClock;
//! # use esp_hal::time::Rate;
//! # use embassy_executor::Spawner;
//! # use embassy_time::{Duration, Ticker};
//! use mhboard_matrix_async::conf::Config as MatrixConfig;
//! use mhboard_matrix_async::matrix::{KeyMatrix, MatrixScanner};
//!
//! #[esp_hal_embassy::main]
//! async fn main(_spawner: Spawner) {
//!     let peripherals = esp_hal::init(Config::default().with_cpu_clock(CpuClock::max()));
//!     let config = esp_hal::i2c::master::Config::default().with_frequency(Rate::from_khz(400));
//!     let i2c = I2c::new(peripherals.I2C0, config)
//!         .unwrap()
//!         .with_sda(peripherals.GPIO43)
//!         .with_scl(peripherals.GPIO44)
//!         .into_async();
//!     let pull_up = InputConfig::default().with_pull(Pull::Up);
//!     let pins = [
//!         [Some(Input::new(peripherals.GPIO1, pull_up)), None, None, None, None, None],
//!         [None, None, None, None, None, None],
//!         [None, None, None, None, None, None],
//!         [None, None, None, None, None, None],
//!         [None, None, None, None, None, None],
//!     ];
//!
//!     let mut scanner = MatrixScanner::new(i2c, pins, MatrixConfig::default());
//!     scanner.init().await;
//!
//!     let mut matrix = KeyMatrix::new();
//!     let mut ticker = Ticker::every(Duration::from_millis(1));
//!     loop {
//!         scanner.scan(&mut matrix).await;
//!         // hand `matrix` to the debounce / keymap layer
//!         ticker.next().await;
//!     }
//! }
//! ```

#![cfg_attr(not(test), no_std)]

pub mod conf;
pub mod err;
pub mod expander;
pub mod matrix;

pub use err::{BusError, ExpanderFault, FaultStage, LinkHealth};
pub use matrix::{KeyChange, KeyMatrix, MatrixScanner};
