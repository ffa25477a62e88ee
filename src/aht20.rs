//! Blocking AHT20 humidity/temperature driver over an embedded-hal I2C bus.
//!
//! Measurement sequence from the datasheet:
//! - read the status byte, load calibration (`0xBE`) if bit 3 is clear
//! - trigger with `0xAC 0x33 0x00` and wait at least 80 ms
//! - read 7 bytes: status, 20 bits humidity, 20 bits temperature, CRC

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;

use crate::config::AHT20_ADDRESS;
use crate::sensors::{SensorError, TemperatureSensor};

const CMD_INIT: [u8; 3] = [0xBE, 0x08, 0x00];
const CMD_TRIGGER: [u8; 3] = [0xAC, 0x33, 0x00];

const STATUS_BUSY: u8 = 0x80;
const STATUS_CALIBRATED: u8 = 0x08;

const POWER_ON_DELAY_MS: u32 = 40;
const INIT_DELAY_MS: u32 = 10;
const MEASURE_DELAY_MS: u32 = 80;
const BUSY_POLL_MS: u32 = 10;
const BUSY_POLLS: u8 = 3;

/// 2^20, the full scale of both raw channels
const RAW_SCALE: f32 = 1_048_576.0;

/// One decoded measurement
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub struct Aht20Reading {
    pub humidity_percent: f32,
    pub temperature_celsius: f32,
}

pub struct Aht20<I, D> {
    i2c: I,
    delay: D,
    address: u8,
}

impl<I: I2c, D: DelayNs> Aht20<I, D> {
    /// Waits out the power-on time and makes sure calibration is loaded
    pub fn new(i2c: I, delay: D) -> Result<Self, SensorError> {
        let mut sensor = Self {
            i2c,
            delay,
            address: AHT20_ADDRESS,
        };
        sensor.init()?;
        Ok(sensor)
    }

    fn init(&mut self) -> Result<(), SensorError> {
        self.delay.delay_ms(POWER_ON_DELAY_MS);

        if self.status()? & STATUS_CALIBRATED == 0 {
            debug!("aht20 uncalibrated, loading calibration");
            self.i2c
                .write(self.address, &CMD_INIT)
                .map_err(|_| SensorError::Bus)?;
            self.delay.delay_ms(INIT_DELAY_MS);

            if self.status()? & STATUS_CALIBRATED == 0 {
                return Err(SensorError::NotCalibrated);
            }
        }
        Ok(())
    }

    fn status(&mut self) -> Result<u8, SensorError> {
        let mut buf = [0u8; 1];
        self.i2c
            .read(self.address, &mut buf)
            .map_err(|_| SensorError::Bus)?;
        Ok(buf[0])
    }

    /// Triggers a measurement and returns both channels
    pub fn read(&mut self) -> Result<Aht20Reading, SensorError> {
        self.i2c
            .write(self.address, &CMD_TRIGGER)
            .map_err(|_| SensorError::Bus)?;
        self.delay.delay_ms(MEASURE_DELAY_MS);

        let mut frame = [0u8; 7];
        let mut polls = 0;
        loop {
            self.i2c
                .read(self.address, &mut frame)
                .map_err(|_| SensorError::Bus)?;
            if frame[0] & STATUS_BUSY == 0 {
                break;
            }
            if polls == BUSY_POLLS {
                return Err(SensorError::Busy);
            }
            polls += 1;
            self.delay.delay_ms(BUSY_POLL_MS);
        }

        decode(&frame)
    }

    pub fn release(self) -> (I, D) {
        (self.i2c, self.delay)
    }
}

impl<I: I2c, D: DelayNs> TemperatureSensor for Aht20<I, D> {
    fn read_celsius(&mut self) -> Result<f32, SensorError> {
        let reading = self.read()?;
        debug!(
            "aht20 {} C, {} %RH",
            reading.temperature_celsius,
            reading.humidity_percent
        );
        Ok(reading.temperature_celsius)
    }
}

/// Decodes a full 7-byte measurement frame
/// param frame: status byte, 20-bit humidity, 20-bit temperature, CRC
/// returns humidity and temperature, or `Checksum` if the CRC is wrong
pub fn decode(frame: &[u8; 7]) -> Result<Aht20Reading, SensorError> {
    if crc8(&frame[..6]) != frame[6] {
        return Err(SensorError::Checksum);
    }

    let raw_humidity =
        ((frame[1] as u32) << 12) | ((frame[2] as u32) << 4) | ((frame[3] as u32) >> 4);
    let raw_temperature =
        (((frame[3] & 0x0F) as u32) << 16) | ((frame[4] as u32) << 8) | frame[5] as u32;

    Ok(Aht20Reading {
        humidity_percent: raw_humidity as f32 * 100.0 / RAW_SCALE,
        temperature_celsius: raw_temperature as f32 * 200.0 / RAW_SCALE - 50.0,
    })
}

/// CRC-8, polynomial 0x31, initial value 0xFF
pub fn crc8(data: &[u8]) -> u8 {
    let mut crc: u8 = 0xFF;
    for byte in data {
        crc ^= byte;
        for _ in 0..8 {
            crc = if crc & 0x80 != 0 {
                (crc << 1) ^ 0x31
            } else {
                crc << 1
            };
        }
    }
    crc
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal::i2c::{ErrorKind, ErrorType, Operation};
    use std::collections::VecDeque;

    /// Serves queued read responses and records every write
    #[derive(Default)]
    struct FakeBus {
        reads: VecDeque<Vec<u8>>,
        writes: Vec<(u8, Vec<u8>)>,
        fail: bool,
    }

    impl FakeBus {
        fn respond(mut self, bytes: &[u8]) -> Self {
            self.reads.push_back(bytes.to_vec());
            self
        }
    }

    impl ErrorType for FakeBus {
        type Error = ErrorKind;
    }

    impl I2c for FakeBus {
        fn transaction(
            &mut self,
            address: u8,
            operations: &mut [Operation<'_>],
        ) -> Result<(), Self::Error> {
            if self.fail {
                return Err(ErrorKind::Other);
            }
            for op in operations {
                match op {
                    Operation::Write(bytes) => self.writes.push((address, bytes.to_vec())),
                    Operation::Read(buf) => {
                        let data = self.reads.pop_front().ok_or(ErrorKind::Other)?;
                        buf.copy_from_slice(&data[..buf.len()]);
                    }
                }
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeDelay {
        total_ns: u64,
    }

    impl DelayNs for FakeDelay {
        fn delay_ns(&mut self, ns: u32) {
            self.total_ns += ns as u64;
        }
    }

    /// Frame for 50 %RH and 25 C
    fn frame(status: u8) -> [u8; 7] {
        // humidity raw 0x80000, temperature raw 0x60000
        let mut frame = [status, 0x80, 0x00, 0x06, 0x00, 0x00, 0x00];
        frame[6] = crc8(&frame[..6]);
        frame
    }

    #[test]
    fn test_crc8_reference_vector() {
        assert_eq!(crc8(&[0xBE, 0xEF]), 0x92);
    }

    #[test]
    fn test_decode() {
        let reading = decode(&frame(0x1C)).unwrap();
        assert!((reading.temperature_celsius - 25.0).abs() < 1e-4);
        assert!((reading.humidity_percent - 50.0).abs() < 1e-4);
    }

    #[test]
    fn test_decode_bad_crc() {
        let mut bad = frame(0x1C);
        bad[6] ^= 0xFF;
        assert_eq!(decode(&bad), Err(SensorError::Checksum));
    }

    #[test]
    fn test_init_skips_calibration_when_loaded() {
        let bus = FakeBus::default().respond(&[0x18]);
        let sensor = Aht20::new(bus, FakeDelay::default()).unwrap();
        let (bus, delay) = sensor.release();
        assert!(bus.writes.is_empty());
        assert_eq!(delay.total_ns, 40_000_000);
    }

    #[test]
    fn test_init_loads_calibration() {
        let bus = FakeBus::default().respond(&[0x10]).respond(&[0x18]);
        let sensor = Aht20::new(bus, FakeDelay::default()).unwrap();
        let (bus, _) = sensor.release();
        assert_eq!(bus.writes, vec![(AHT20_ADDRESS, CMD_INIT.to_vec())]);
    }

    #[test]
    fn test_init_fails_without_calibration() {
        let bus = FakeBus::default().respond(&[0x10]).respond(&[0x10]);
        assert!(matches!(
            Aht20::new(bus, FakeDelay::default()),
            Err(SensorError::NotCalibrated)
        ));
    }

    #[test]
    fn test_read_celsius() {
        let bus = FakeBus::default().respond(&[0x18]).respond(&frame(0x1C));
        let mut sensor = Aht20::new(bus, FakeDelay::default()).unwrap();

        let temp = sensor.read_celsius().unwrap();
        assert!((temp - 25.0).abs() < 1e-4);

        let (bus, delay) = sensor.release();
        assert_eq!(bus.writes, vec![(AHT20_ADDRESS, CMD_TRIGGER.to_vec())]);
        assert_eq!(delay.total_ns, 120_000_000);
    }

    #[test]
    fn test_read_waits_for_busy() {
        let bus = FakeBus::default()
            .respond(&[0x18])
            .respond(&frame(0x9C))
            .respond(&frame(0x1C));
        let mut sensor = Aht20::new(bus, FakeDelay::default()).unwrap();
        assert!(sensor.read().is_ok());
    }

    #[test]
    fn test_read_gives_up_when_busy() {
        let mut bus = FakeBus::default().respond(&[0x18]);
        for _ in 0..=BUSY_POLLS {
            bus = bus.respond(&frame(0x9C));
        }
        let mut sensor = Aht20::new(bus, FakeDelay::default()).unwrap();
        assert_eq!(sensor.read(), Err(SensorError::Busy));
    }

    #[test]
    fn test_bus_error() {
        let bus = FakeBus {
            fail: true,
            ..Default::default()
        };
        assert!(matches!(
            Aht20::new(bus, FakeDelay::default()),
            Err(SensorError::Bus)
        ));
    }
}
