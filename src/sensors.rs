use crate::config::{ThermistorParams, KELVIN_OFFSET};

/// Error type for sensor reads
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub enum SensorError {
    /// The bus or ADC transfer failed
    Bus,
    /// Sensor still busy after the measurement window
    Busy,
    /// CRC of the returned frame did not match
    Checksum,
    /// Sensor reports it has no calibration loaded
    NotCalibrated,
    /// Reading falls outside the range the conversion is defined for
    OutOfRange,
}

/// Which sensor a sample came from
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub enum Source {
    Aht20,
    Thermistor,
}

impl Source {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Source::Aht20 => "aht20",
            Source::Thermistor => "thermistor",
        }
    }
}

/// Anything that can produce a temperature in Celsius
pub trait TemperatureSensor {
    fn read_celsius(&mut self) -> Result<f32, SensorError>;
}

/// Analog input normalized to the 0..=1 range of the reference voltage
pub trait AnalogInput {
    fn read_fraction(&mut self) -> Result<f32, SensorError>;
}

/// Converts a divider output fraction to Celsius using the Beta model.
/// param vout: divider output as a fraction of the reference voltage
/// param params: divider and Beta-model constants
/// returns the temperature in Celsius
///
/// Fractions of exactly 0 or 1 put the thermistor at infinite or zero
/// resistance; those, NaN, and any non-finite result are reported as
/// `OutOfRange`.
pub fn thermistor_celsius(vout: f32, params: &ThermistorParams) -> Result<f32, SensorError> {
    if !(vout > 0.0 && vout < 1.0) {
        return Err(SensorError::OutOfRange);
    }

    let resistance = params.r_fixed * (1.0 / vout - 1.0);
    let inv_kelvin = 1.0 / params.t0_kelvin + libm::logf(resistance / params.r0) / params.beta;
    let celsius = 1.0 / inv_kelvin - KELVIN_OFFSET;

    if celsius.is_finite() {
        Ok(celsius)
    } else {
        Err(SensorError::OutOfRange)
    }
}

/// NTC thermistor read through a resistor divider on an analog input
pub struct Thermistor<A> {
    input: A,
    params: ThermistorParams,
    last_vout: Option<f32>,
}

impl<A: AnalogInput> Thermistor<A> {
    pub fn new(input: A) -> Self {
        Self::with_params(input, ThermistorParams::NTC_10K_B3950)
    }

    pub fn with_params(input: A, params: ThermistorParams) -> Self {
        Self {
            input,
            params,
            last_vout: None,
        }
    }

    /// Last divider fraction seen, for diagnostics
    pub fn last_vout(&self) -> Option<f32> {
        self.last_vout
    }
}

impl<A: AnalogInput> TemperatureSensor for Thermistor<A> {
    fn read_celsius(&mut self) -> Result<f32, SensorError> {
        let vout = self.input.read_fraction()?;
        self.last_vout = Some(vout);

        thermistor_celsius(vout, &self.params).map_err(|e| {
            warn!("thermistor vout {} outside conversion range", vout);
            e
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedInput(f32);

    impl AnalogInput for FixedInput {
        fn read_fraction(&mut self) -> Result<f32, SensorError> {
            Ok(self.0)
        }
    }

    struct BrokenInput;

    impl AnalogInput for BrokenInput {
        fn read_fraction(&mut self) -> Result<f32, SensorError> {
            Err(SensorError::Bus)
        }
    }

    #[test]
    fn test_midpoint_is_reference_temperature() {
        let temp = thermistor_celsius(0.5, &ThermistorParams::NTC_10K_B3950).unwrap();
        assert!((temp - 25.0).abs() < 1e-3, "got {}", temp);
    }

    #[test]
    fn test_higher_vout_is_warmer() {
        // Less thermistor resistance pushes Vout up, NTC means hotter
        let params = ThermistorParams::NTC_10K_B3950;
        let cool = thermistor_celsius(0.4, &params).unwrap();
        let warm = thermistor_celsius(0.6, &params).unwrap();
        assert!(cool < 25.0);
        assert!(warm > 25.0);
    }

    #[test]
    fn test_known_point() {
        // R = 10k * (1/0.25 - 1) = 30k, ln(3)/3950 + 1/298.15 -> ~2.17 C
        let temp = thermistor_celsius(0.25, &ThermistorParams::NTC_10K_B3950).unwrap();
        assert!((temp - 2.17).abs() < 0.05, "got {}", temp);
    }

    #[test]
    fn test_zero_vout_rejected() {
        let params = ThermistorParams::NTC_10K_B3950;
        assert_eq!(thermistor_celsius(0.0, &params), Err(SensorError::OutOfRange));
        assert_eq!(thermistor_celsius(1.0, &params), Err(SensorError::OutOfRange));
        assert_eq!(thermistor_celsius(f32::NAN, &params), Err(SensorError::OutOfRange));
        assert_eq!(thermistor_celsius(-0.1, &params), Err(SensorError::OutOfRange));
    }

    #[test]
    fn test_thermistor_reader() {
        let mut thermistor = Thermistor::new(FixedInput(0.5));
        assert_eq!(thermistor.last_vout(), None);

        let temp = thermistor.read_celsius().unwrap();
        assert!((temp - 25.0).abs() < 1e-3);
        assert_eq!(thermistor.last_vout(), Some(0.5));
    }

    #[test]
    fn test_thermistor_reader_zero_input() {
        let mut thermistor = Thermistor::new(FixedInput(0.0));
        assert_eq!(thermistor.read_celsius(), Err(SensorError::OutOfRange));
        assert_eq!(thermistor.last_vout(), Some(0.0));
    }

    #[test]
    fn test_thermistor_reader_custom_params() {
        // 100k part against a 100k resistor reads the same at the midpoint
        let params = ThermistorParams {
            r_fixed: 100_000.0,
            r0: 100_000.0,
            ..ThermistorParams::NTC_10K_B3950
        };
        let mut thermistor = Thermistor::with_params(FixedInput(0.5), params);
        let temp = thermistor.read_celsius().unwrap();
        assert!((temp - 25.0).abs() < 1e-3, "got {}", temp);

        // a 10k fixed resistor makes the same fraction a hotter reading
        let mut mismatched = Thermistor::with_params(
            FixedInput(0.5),
            ThermistorParams {
                r_fixed: 10_000.0,
                ..params
            },
        );
        assert!(mismatched.read_celsius().unwrap() > 25.0);
    }

    #[test]
    fn test_thermistor_reader_passes_input_errors() {
        let mut thermistor = Thermistor::new(BrokenInput);
        assert_eq!(thermistor.read_celsius(), Err(SensorError::Bus));
    }
}
