//! Compile-time configuration for the board and the measurement run.

/// Readings taken from each sensor before averaging
pub const SAMPLE_COUNT: usize = 10;
/// Pause after every acquisition round
pub const SAMPLE_DELAY_MS: u32 = 500;

pub const SERIAL_BAUD: u32 = 9600;
pub const I2C_FREQ_KHZ: u32 = 400;

/// 7-bit address; the datasheet lists it as 0x70/0x71 in 8-bit form
pub const AHT20_ADDRESS: u8 = 0x38;
pub const OLED_ADDRESS: u8 = 0x3C;

/// Full scale of the RP2040's 12-bit ADC
pub const ADC_FULL_SCALE: u16 = 4095;

/// TM1638 brightness, 0 (dim) to 7 (bright)
pub const SEGMENT_BRIGHTNESS: u8 = 7;

/// Offset between Kelvin and Celsius
pub const KELVIN_OFFSET: f32 = 273.15;

/// Divider and Beta-model parameters of the thermistor bridge.
///
/// The thermistor sits on the high side of the divider, so the ADC sees
/// `Vout = r_fixed / (R + r_fixed)`.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub struct ThermistorParams {
    /// Fixed divider resistor in ohms
    pub r_fixed: f32,
    /// Thermistor resistance at `t0_kelvin`
    pub r0: f32,
    /// Reference temperature in Kelvin
    pub t0_kelvin: f32,
    /// Beta constant in Kelvin
    pub beta: f32,
}

impl ThermistorParams {
    /// 10k NTC, B = 3950, against a 10k fixed resistor
    pub const NTC_10K_B3950: Self = Self {
        r_fixed: 10_000.0,
        r0: 10_000.0,
        t0_kelvin: 298.15,
        beta: 3950.0,
    };
}
