//! Key matrix scanning.
//!
//! The matrix has [`ROWS`] rows of [`COLS`] columns. Rows `0..LOCAL_ROWS` are
//! wired straight to microcontroller pins, rows 5 to 8 live on the two
//! expanders, and row 9 has no pins of its own: its two keys are carried as
//! bit 6 of the row 7 and row 8 reads.

use core::fmt;

use embedded_hal::digital::InputPin;
use embedded_hal_async::i2c::{I2c, SevenBitAddress};

use crate::conf::Config;
use crate::err::LinkHealth;
use crate::expander::{ExpanderId, Expanders, InitReport, Port};

/// Number of rows in the logical matrix.
pub const ROWS: usize = 10;
/// Number of columns in the logical matrix.
pub const COLS: usize = 6;
/// Rows wired to local pins. The remaining rows belong to the expander half.
pub const LOCAL_ROWS: usize = ROWS / 2;
/// Total number of key positions.
pub const KEYS: usize = ROWS * COLS;

/// Pressed state of one row, bit `c` set when column `c` is pressed.
pub type MatrixRow = u8;

/// Local pins indexed by `[row][col]`. `None` marks a position with no pin.
pub type PinMap<P> = [[Option<P>; COLS]; LOCAL_ROWS];

/// Columns carried by an expander port.
const EXPANDER_ROW_MASK: u8 = 0b0011_1111;
/// Auxiliary key piggybacked on an expander port.
const AUX_BIT: u8 = 0b0100_0000;
const AUX_SHIFT: u8 = 6;

/// Auxiliary key latched from an expander row and replayed on row 9.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuxLatch {
    /// Captured from row 7, reported as column 0 of row 9.
    First,
    /// Captured from row 8, reported as column 1 of row 9.
    Second,
}

impl AuxLatch {
    #[inline]
    const fn index(self) -> usize {
        match self {
            AuxLatch::First => 0,
            AuxLatch::Second => 1,
        }
    }
}

/// Where the value of a row comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowSource {
    /// A row of the local pin map.
    Local(usize),
    /// One GPIO port of an expander, optionally carrying an auxiliary key.
    Expander {
        expander: ExpanderId,
        port: Port,
        aux: Option<AuxLatch>,
    },
    /// The row assembled from the auxiliary latches.
    Auxiliary,
}

/// Row sources in scan order.
///
/// The auxiliary row must come after both rows that fill its latches.
pub const ROW_SOURCES: [RowSource; ROWS] = [
    RowSource::Local(0),
    RowSource::Local(1),
    RowSource::Local(2),
    RowSource::Local(3),
    RowSource::Local(4),
    RowSource::Expander {
        expander: ExpanderId::A,
        port: Port::B,
        aux: None,
    },
    RowSource::Expander {
        expander: ExpanderId::A,
        port: Port::A,
        aux: None,
    },
    RowSource::Expander {
        expander: ExpanderId::B,
        port: Port::B,
        aux: Some(AuxLatch::First),
    },
    RowSource::Expander {
        expander: ExpanderId::B,
        port: Port::A,
        aux: Some(AuxLatch::Second),
    },
    RowSource::Auxiliary,
];

/// A change of one key between two snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyChange {
    pub row: u8,
    pub col: u8,
    pub pressed: bool,
}

/// Snapshot of every key in the matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KeyMatrix {
    rows: [MatrixRow; ROWS],
}

impl KeyMatrix {
    /// A matrix with no key pressed.
    pub const fn new() -> Self {
        Self { rows: [0; ROWS] }
    }

    /// The raw bitmask of a row. Out-of-range rows read as empty.
    #[inline]
    pub fn row(&self, row: usize) -> MatrixRow {
        self.rows.get(row).copied().unwrap_or(0)
    }

    #[inline]
    pub fn set_row(&mut self, row: usize, value: MatrixRow) {
        if let Some(slot) = self.rows.get_mut(row) {
            *slot = value;
        }
    }

    #[inline]
    pub fn is_pressed(&self, row: usize, col: usize) -> bool {
        col < COLS && self.row(row) & (1 << col) != 0
    }

    pub fn clear(&mut self) {
        self.rows = [0; ROWS];
    }

    pub fn pressed_count(&self) -> usize {
        self.rows.iter().map(|row| row.count_ones() as usize).sum()
    }

    /// Lists every key whose state differs from `previous`, in row-major order.
    pub fn changes(&self, previous: &KeyMatrix) -> heapless::Vec<KeyChange, KEYS> {
        let mut changes = heapless::Vec::new();
        for (row, (now, before)) in self.rows.iter().zip(previous.rows.iter()).enumerate() {
            let diff = now ^ before;
            for col in 0..COLS {
                if diff & (1 << col) != 0 {
                    // Capacity covers every key, the push can't fail.
                    let _ = changes.push(KeyChange {
                        row: row as u8,
                        col: col as u8,
                        pressed: now & (1 << col) != 0,
                    });
                }
            }
        }
        changes
    }
}

impl fmt::Display for KeyMatrix {
    /// One line per row, column 0 first, `1` for a pressed key.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, row) in self.rows.iter().enumerate() {
            if index != 0 {
                f.write_str("\n")?;
            }
            for col in 0..COLS {
                f.write_str(if row & (1 << col) != 0 { "1" } else { "0" })?;
            }
        }
        Ok(())
    }
}

/// Scans the hybrid matrix and keeps the expander link alive.
///
/// Owns the local pins, the expander bus, and all state carried between
/// scans: the link health, the recovery counter and the two auxiliary
/// latches.
pub struct MatrixScanner<I2cType, P>
where
    I2cType: I2c<SevenBitAddress>,
    P: InputPin,
{
    expanders: Expanders<I2cType>,
    pins: PinMap<P>,
    health: LinkHealth,
    recovery_counter: u8,
    aux: [bool; 2],
}

impl<I2cType, P> MatrixScanner<I2cType, P>
where
    I2cType: I2c<SevenBitAddress>,
    P: InputPin,
{
    /// Creates a new `MatrixScanner`.
    ///
    /// # Arguments
    ///
    /// * `i2c` - The bus both expanders are attached to.
    /// * `pins` - Local pins, already configured as pulled-up inputs.
    /// * `config` - Expander addressing and bus timing.
    pub fn new(i2c: I2cType, pins: PinMap<P>, config: Config) -> Self {
        Self {
            expanders: Expanders::new(i2c, config),
            pins,
            health: LinkHealth::Healthy,
            recovery_counter: 0,
            aux: [false; 2],
        }
    }

    /// Configures the expanders. Call once before the first scan.
    ///
    /// The result also becomes the scanner's link health, so a failed start
    /// enters the same throttled recovery as a fault during scanning. The
    /// recovery period restarts from zero.
    pub async fn init(&mut self) -> InitReport {
        let report = self.expanders.init().await;
        self.health = report.health();
        self.recovery_counter = 0;
        if report.is_ok() {
            log::info!("right side attached");
        } else {
            log::warn!("right side not responding: {:?}", self.health);
        }
        report
    }

    pub fn link_health(&self) -> LinkHealth {
        self.health
    }

    pub fn is_remote_attached(&self) -> bool {
        self.health.is_healthy()
    }

    /// Current values of the two auxiliary latches.
    pub fn aux_latches(&self) -> [bool; 2] {
        self.aux
    }

    /// Scans a full cycle, rows in ascending order.
    pub async fn scan(&mut self, matrix: &mut KeyMatrix) {
        for row in 0..ROWS {
            self.scan_row(matrix, row).await;
        }
    }

    /// Scans one row into `matrix`.
    ///
    /// Rows of a cycle must be scanned in ascending order: row 0 runs the
    /// recovery check ahead of any expander read, and row 9 replays latches
    /// filled by rows 7 and 8. [`Self::scan`] does this for you.
    ///
    /// While the link is faulted every expander row reads as empty and no
    /// bus traffic happens. A recovery attempt is made once every 256 scans
    /// of row 0, which assumes a roughly constant scan rate.
    pub async fn scan_row(&mut self, matrix: &mut KeyMatrix, row: usize) {
        let Some(source) = ROW_SOURCES.get(row).copied() else {
            log::warn!("scan of row {row} ignored, matrix has {ROWS} rows");
            return;
        };

        if row == 0 {
            self.check_recovery().await;
        }

        let value = match source {
            RowSource::Local(local) => self.read_local(local),
            RowSource::Expander {
                expander,
                port,
                aux,
            } => self.read_expander(expander, port, aux).await,
            RowSource::Auxiliary => self.read_aux(),
        };

        matrix.set_row(row, value);
    }

    async fn check_recovery(&mut self) {
        if self.health.is_healthy() {
            return;
        }

        self.recovery_counter = self.recovery_counter.wrapping_add(1);
        if self.recovery_counter != 0 {
            return;
        }

        log::debug!("trying to reset mcp23017");
        self.init().await;
    }

    fn read_local(&mut self, row: usize) -> MatrixRow {
        let Some(pins) = self.pins.get_mut(row) else {
            return 0;
        };

        let mut value = 0;
        for (col, pin) in pins.iter_mut().enumerate() {
            let Some(pin) = pin else {
                continue;
            };
            // Pulled up: a pressed key drags the pin low.
            if matches!(pin.is_low(), Ok(true)) {
                value |= 1 << col;
            }
        }
        value
    }

    async fn read_expander(
        &mut self,
        expander: ExpanderId,
        port: Port,
        aux: Option<AuxLatch>,
    ) -> MatrixRow {
        if !self.health.is_healthy() {
            return 0;
        }

        match self.expanders.read_port(expander, port).await {
            Ok(levels) => {
                let pressed = !levels;
                if let Some(latch) = aux {
                    self.aux[latch.index()] = (pressed & AUX_BIT) >> AUX_SHIFT != 0;
                }
                pressed & EXPANDER_ROW_MASK
            }
            Err(fault) => {
                log::warn!("mcp23017 read failed: {fault:?}");
                if let Some(latch) = aux {
                    self.aux[latch.index()] = false;
                }
                self.health = LinkHealth::Faulted(fault);
                0
            }
        }
    }

    fn read_aux(&self) -> MatrixRow {
        if !self.health.is_healthy() {
            return 0;
        }

        self.aux
            .iter()
            .enumerate()
            .fold(0, |value, (bit, &pressed)| value | (u8::from(pressed) << bit))
    }
}
