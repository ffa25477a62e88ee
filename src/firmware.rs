use core::cell::RefCell;

use bsp::entry;
use defmt::*;
use defmt_rtt as _;
use embedded_hal_0_2::adc::OneShot;
use embedded_hal_bus::i2c::RefCellDevice;
use panic_probe as _;

// Provide an alias for our BSP so we can switch targets quickly.
// Uncomment the BSP you included in Cargo.toml, the rest of the code does not need to change.
use rp_pico as bsp;

use bsp::hal::{
    self,
    clocks::{init_clocks_and_plls, Clock},
    fugit::RateExtU32,
    gpio::{FunctionI2C, FunctionUart, Pin, PullUp},
    pac,
    uart::{DataBits, StopBits, UartConfig, UartPeripheral},
    watchdog::Watchdog,
    Timer,
};
use ssd1306::mode::{TerminalMode, TerminalModeError};
use ssd1306::prelude::*;
use ssd1306::Ssd1306;

use thermocheck::aht20::Aht20;
use thermocheck::config::{
    ADC_FULL_SCALE, I2C_FREQ_KHZ, OLED_ADDRESS, SEGMENT_BRIGHTNESS, SERIAL_BAUD,
};
use thermocheck::pipeline;
use thermocheck::rendering::{OledSink, SegmentSink, SerialSink, TextDisplay};
use thermocheck::sensors::{AnalogInput, SensorError, Thermistor};
use thermocheck::tm1638::Tm1638;

/// SSD1306 control byte announcing display data
const OLED_DATA_BYTE: u8 = 0x40;

/// One ADC channel, scaled to the 0..=1 fraction of the reference
struct AdcInput<PIN> {
    adc: hal::Adc,
    pin: PIN,
}

impl<PIN> AnalogInput for AdcInput<PIN>
where
    PIN: embedded_hal_0_2::adc::Channel<hal::Adc>,
    hal::Adc: OneShot<hal::Adc, u16, PIN>,
{
    fn read_fraction(&mut self) -> Result<f32, SensorError> {
        let raw: u16 = self
            .adc
            .read(&mut self.pin)
            .map_err(|_| SensorError::Bus)?;
        Ok(raw as f32 / ADC_FULL_SCALE as f32)
    }
}

/// SSD1306 in terminal mode as a line display
struct Oled<I>(Ssd1306<I2CInterface<I>, DisplaySize128x64, TerminalMode>);

impl<I: embedded_hal::i2c::I2c> TextDisplay for Oled<I> {
    type Error = TerminalModeError;

    fn clear(&mut self) -> Result<(), Self::Error> {
        self.0.clear()
    }

    fn write_line(&mut self, row: u8, text: &str) -> Result<(), Self::Error> {
        self.0.set_position(0, row)?;
        for c in text.chars() {
            self.0.print_char(c)?;
        }
        Ok(())
    }
}

#[entry]
fn main() -> ! {
    info!("thermocheck starting");
    // Grab our singleton objects
    let mut pac = pac::Peripherals::take().unwrap();

    // Set up the watchdog driver - needed by the clock setup code
    let mut watchdog = Watchdog::new(pac.WATCHDOG);

    // Configure the clocks
    //
    // The default is to generate a 125 MHz system clock
    let clocks = init_clocks_and_plls(
        bsp::XOSC_CRYSTAL_FREQ,
        pac.XOSC,
        pac.CLOCKS,
        pac.PLL_SYS,
        pac.PLL_USB,
        &mut pac.RESETS,
        &mut watchdog,
    )
    .ok()
    .unwrap();

    // The single-cycle I/O block controls our GPIO pins
    let sio = hal::Sio::new(pac.SIO);

    // Set the pins up according to their function on this particular board
    let pins = bsp::Pins::new(
        pac.IO_BANK0,
        pac.PADS_BANK0,
        sio.gpio_bank0,
        &mut pac.RESETS,
    );

    let mut delay = Timer::new(pac.TIMER, &mut pac.RESETS, &clocks);

    // Set up UART0 for the text report
    let uart_pins = (
        pins.gpio0.into_function::<FunctionUart>(),
        pins.gpio1.into_function::<FunctionUart>(),
    );
    let uart = UartPeripheral::new(pac.UART0, uart_pins, &mut pac.RESETS)
        .enable(
            UartConfig::new(SERIAL_BAUD.Hz(), DataBits::Eight, None, StopBits::One),
            clocks.peripheral_clock.freq(),
        )
        .ok()
        .unwrap();

    // Set up the I2C bus shared by the AHT20 and the OLED
    let sda_pin: Pin<_, FunctionI2C, PullUp> = pins.gpio4.reconfigure();
    let scl_pin: Pin<_, FunctionI2C, PullUp> = pins.gpio5.reconfigure();
    let i2c = hal::I2C::i2c0(
        pac.I2C0,
        sda_pin,
        scl_pin,
        I2C_FREQ_KHZ.kHz(),
        &mut pac.RESETS,
        &clocks.system_clock,
    );
    let i2c_bus = RefCell::new(i2c);

    // Set up AHT20
    let mut aht20 = match Aht20::new(RefCellDevice::new(&i2c_bus), delay) {
        Ok(sensor) => sensor,
        Err(e) => {
            error!("AHT20 init failed: {}", e);
            halt();
        }
    };

    // Set up thermistor on ADC0
    let adc = hal::Adc::new(pac.ADC, &mut pac.RESETS);
    let ntc_pin = hal::adc::AdcPin::new(pins.gpio26.into_floating_input())
        .ok()
        .unwrap();
    let mut thermistor = Thermistor::new(AdcInput { adc, pin: ntc_pin });

    // Set up TM1638
    let tm1638 = Tm1638::new(
        pins.gpio12.into_push_pull_output(),
        pins.gpio11.into_push_pull_output(),
        pins.gpio10.into_push_pull_output(),
        delay,
        SEGMENT_BRIGHTNESS,
    )
    .unwrap();
    let mut segment = SegmentSink::new(tm1638);

    // Set up SSD1306
    let interface = I2CInterface::new(RefCellDevice::new(&i2c_bus), OLED_ADDRESS, OLED_DATA_BYTE);
    let mut display = Ssd1306::new(interface, DisplaySize128x64, DisplayRotation::Rotate0)
        .into_terminal_mode();
    display.init().unwrap();
    let mut oled = OledSink::new(Oled(display));

    let mut serial = SerialSink::new(uart);

    info!("thermocheck ready");

    match pipeline::run(
        &mut aht20,
        &mut thermistor,
        &mut delay,
        &mut segment,
        &mut oled,
        &mut serial,
    ) {
        Ok(summary) => info!("run complete: {}", summary),
        Err(e) => error!("run failed: {}", e),
    }

    halt()
}

fn halt() -> ! {
    loop {
        cortex_m::asm::wfi();
    }
}
