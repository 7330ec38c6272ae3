//! Test doubles for the expander bus and the local pins.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use embassy_time::Duration;
use embedded_hal::digital::{self, InputPin};
use embedded_hal_async::i2c::{ErrorKind, ErrorType, I2c, NoAcknowledgeSource, Operation};
use mhboard_matrix_async::conf::Config;
use mhboard_matrix_async::matrix::{PinMap, COLS, LOCAL_ROWS};

pub const ADDR_A: u8 = 0x20;
pub const ADDR_B: u8 = 0x24;

pub const GPIOA: u8 = 0x12;
pub const GPIOB: u8 = 0x13;

/// A transaction seen on the bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transfer {
    Write { address: u8, bytes: Vec<u8> },
    Read { address: u8, len: usize },
}

/// Register file of one MCP23017.
#[derive(Debug, Clone)]
pub struct Chip {
    pub registers: [u8; 0x16],
    pub pointer: u8,
}

impl Default for Chip {
    fn default() -> Self {
        let mut registers = [0u8; 0x16];
        // Nothing pressed: every pin pulled high.
        registers[GPIOA as usize] = 0xFF;
        registers[GPIOB as usize] = 0xFF;
        Self {
            registers,
            pointer: 0,
        }
    }
}

#[derive(Debug, Default)]
pub struct BusState {
    pub chips: HashMap<u8, Chip>,
    pub log: Vec<Transfer>,
    /// Addresses that do not acknowledge.
    pub offline: Vec<u8>,
    /// `(address, register)` pairs whose writes are not acknowledged.
    pub rejected_writes: Vec<(u8, u8)>,
    /// Fail this many upcoming reads with a bus error.
    pub failing_reads: usize,
    /// Never complete any transaction.
    pub stalled: bool,
}

/// An in-memory bus with two MCP23017s attached.
#[derive(Clone)]
pub struct MockBus {
    pub state: Rc<RefCell<BusState>>,
}

impl MockBus {
    pub fn new() -> Self {
        let mut state = BusState::default();
        state.chips.insert(ADDR_A, Chip::default());
        state.chips.insert(ADDR_B, Chip::default());
        Self {
            state: Rc::new(RefCell::new(state)),
        }
    }

    pub fn set_port(&self, address: u8, register: u8, levels: u8) {
        let mut state = self.state.borrow_mut();
        let chip = state.chips.get_mut(&address).unwrap();
        chip.registers[register as usize] = levels;
    }

    pub fn register(&self, address: u8, register: u8) -> u8 {
        self.state.borrow().chips[&address].registers[register as usize]
    }

    pub fn set_offline(&self, address: u8, offline: bool) {
        let mut state = self.state.borrow_mut();
        state.offline.retain(|a| *a != address);
        if offline {
            state.offline.push(address);
        }
    }

    pub fn reject_writes(&self, address: u8, register: u8) {
        self.state.borrow_mut().rejected_writes.push((address, register));
    }

    pub fn fail_next_reads(&self, count: usize) {
        self.state.borrow_mut().failing_reads = count;
    }

    pub fn stall(&self) {
        self.state.borrow_mut().stalled = true;
    }

    pub fn take_log(&self) -> Vec<Transfer> {
        std::mem::take(&mut self.state.borrow_mut().log)
    }

    fn execute(&self, address: u8, operations: &mut [Operation<'_>]) -> Result<(), ErrorKind> {
        let mut state = self.state.borrow_mut();
        for operation in operations {
            match operation {
                Operation::Write(bytes) => {
                    state.log.push(Transfer::Write {
                        address,
                        bytes: bytes.to_vec(),
                    });
                    if state.offline.contains(&address) {
                        return Err(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address));
                    }
                    if let Some(register) = bytes.first() {
                        if state.rejected_writes.contains(&(address, *register)) {
                            return Err(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Data));
                        }
                    }
                    let chip = state
                        .chips
                        .get_mut(&address)
                        .ok_or(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address))?;
                    if let Some((register, data)) = bytes.split_first() {
                        chip.pointer = *register;
                        for (offset, byte) in data.iter().enumerate() {
                            chip.registers[*register as usize + offset] = *byte;
                        }
                    }
                }
                Operation::Read(buffer) => {
                    state.log.push(Transfer::Read {
                        address,
                        len: buffer.len(),
                    });
                    if state.offline.contains(&address) {
                        return Err(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address));
                    }
                    if state.failing_reads > 0 {
                        state.failing_reads -= 1;
                        return Err(ErrorKind::Bus);
                    }
                    let chip = state
                        .chips
                        .get(&address)
                        .ok_or(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address))?;
                    for (offset, byte) in buffer.iter_mut().enumerate() {
                        *byte = chip.registers[chip.pointer as usize + offset];
                    }
                }
            }
        }
        Ok(())
    }
}

impl ErrorType for MockBus {
    type Error = ErrorKind;
}

impl I2c for MockBus {
    async fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        if self.state.borrow().stalled {
            core::future::pending::<()>().await;
        }
        self.execute(address, operations)
    }
}

/// A pulled-up input whose level the test controls.
#[derive(Clone, Default)]
pub struct MockPin {
    low: Rc<Cell<bool>>,
    broken: Rc<Cell<bool>>,
}

impl MockPin {
    pub fn press(&self, pressed: bool) {
        self.low.set(pressed);
    }

    pub fn break_pin(&self) {
        self.broken.set(true);
    }
}

impl digital::ErrorType for MockPin {
    type Error = digital::ErrorKind;
}

impl InputPin for MockPin {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        self.is_low().map(|low| !low)
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        if self.broken.get() {
            return Err(digital::ErrorKind::Other);
        }
        Ok(self.low.get())
    }
}

/// Pins for every local position, plus handles to drive them.
pub fn pin_map() -> (PinMap<MockPin>, [[MockPin; COLS]; LOCAL_ROWS]) {
    let handles: [[MockPin; COLS]; LOCAL_ROWS] =
        core::array::from_fn(|_| core::array::from_fn(|_| MockPin::default()));
    let pins = core::array::from_fn(|row| core::array::from_fn(|col| Some(handles[row][col].clone())));
    (pins, handles)
}

/// Default addressing with no settle delay.
pub fn fast_config() -> Config {
    Config {
        settle_delay: Duration::from_millis(0),
        bus_timeout: Duration::from_millis(20),
        ..Config::default()
    }
}
