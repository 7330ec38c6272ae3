#![no_std]
#![no_main]
#![deny(
    clippy::mem_forget,
    reason = "mem::forget is generally not safe to do with esp_hal types, especially those holding buffers for the duration of a data transfer."
)]

use embassy_executor::Spawner;
use embassy_time::{Duration, Ticker};
use esp_hal::i2c::master::I2c;
use esp_hal::{
    clock::CpuClock,
    gpio::{Input, InputConfig, Pull},
    time::Rate,
    timer::systimer::SystemTimer,
};
use esp_println::println;
use log::{debug, info, warn};
use mhboard_matrix_async::conf::Config as MatrixConfig;
use mhboard_matrix_async::matrix::{KeyMatrix, MatrixScanner, PinMap};

#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    println!("{}", info);
    loop {}
}

// This creates a default app-descriptor required by the esp-idf bootloader.
// For more information see: <https://docs.espressif.com/projects/esp-idf/en/stable/esp32/api-reference/system/app_image_format.html#application-description>
esp_bootloader_esp_idf::esp_app_desc!();

type Scanner = MatrixScanner<I2c<'static, esp_hal::Async>, Input<'static>>;

/// Matrix scan period.
const SCAN_PERIOD: Duration = Duration::from_millis(1);

#[esp_hal_embassy::main]
async fn main(spawner: Spawner) {
    esp_println::logger::init_logger(log::LevelFilter::Debug);

    let config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let peripherals = esp_hal::init(config);

    let timer0 = SystemTimer::new(peripherals.SYSTIMER);
    esp_hal_embassy::init(timer0.alarm0);

    info!("Peripherals initialized");

    // Expander bus on the UART0 pins; logs go out over USB-Serial-JTAG.
    let i2c_config = esp_hal::i2c::master::Config::default().with_frequency(Rate::from_khz(400));
    let i2c = I2c::new(peripherals.I2C0, i2c_config)
        .unwrap()
        .with_sda(peripherals.GPIO43)
        .with_scl(peripherals.GPIO44)
        .into_async();

    let pull_up = InputConfig::default().with_pull(Pull::Up);
    macro_rules! key {
        ($pin:ident) => {
            Some(Input::new(peripherals.$pin, pull_up))
        };
    }

    // Left half. Row 4 only has the two thumb keys wired.
    let pins: PinMap<Input<'static>> = [
        [key!(GPIO1), key!(GPIO2), key!(GPIO3), key!(GPIO4), key!(GPIO5), key!(GPIO6)],
        [key!(GPIO7), key!(GPIO8), key!(GPIO9), key!(GPIO10), key!(GPIO11), key!(GPIO12)],
        [key!(GPIO13), key!(GPIO14), key!(GPIO15), key!(GPIO16), key!(GPIO17), key!(GPIO18)],
        [key!(GPIO21), key!(GPIO38), key!(GPIO39), key!(GPIO40), key!(GPIO41), key!(GPIO42)],
        [None, None, None, None, key!(GPIO47), key!(GPIO48)],
    ];

    let mut scanner = MatrixScanner::new(i2c, pins, MatrixConfig::default());
    if scanner.init().await.is_ok() {
        debug!("Expanders initialized.");
    } else {
        warn!("Expanders not initialized, scanning the left half only.");
    }

    spawner.spawn(scan_matrix(scanner)).unwrap();
}

/// Scans the matrix forever and logs every key change.
#[embassy_executor::task]
async fn scan_matrix(mut scanner: Scanner) {
    let mut matrix = KeyMatrix::new();
    let mut previous = KeyMatrix::new();
    let mut attached = scanner.is_remote_attached();
    let mut ticker = Ticker::every(SCAN_PERIOD);

    loop {
        scanner.scan(&mut matrix).await;

        if attached != scanner.is_remote_attached() {
            attached = scanner.is_remote_attached();
            info!("Right half attached: {attached}");
        }

        let changes = matrix.changes(&previous);
        if !changes.is_empty() {
            info!("Key events detected {changes:?}");
            debug!("Matrix:\n{matrix}");
            previous = matrix;
        }

        ticker.next().await;
    }
}
