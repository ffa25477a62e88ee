//! Bit-banged driver for TM1638 LED & key modules (8 digits, 8 LEDs).
//!
//! Wire protocol:
//! - STB low starts a frame, STB high ends it
//! - data goes out LSB first, latched on the rising edge of CLK
//! - display RAM is 16 bytes; even addresses hold digits, odd addresses LEDs

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;

pub const DIGITS: usize = 8;

const CMD_DATA_AUTO_INCREMENT: u8 = 0x40;
const CMD_ADDRESS: u8 = 0xC0;
const CMD_DISPLAY_ON: u8 = 0x88;

const HALF_PERIOD_US: u32 = 1;

/// Segment patterns for 0-9
const DIGIT_SEGMENTS: [u8; 10] = [0x3F, 0x06, 0x5B, 0x4F, 0x66, 0x6D, 0x7D, 0x07, 0x7F, 0x6F];
const MINUS: u8 = 0x40;
const BLANK: u8 = 0x00;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub enum Tm1638Error {
    Pin,
    /// Value needs more than eight digits
    Overflow,
}

pub struct Tm1638<STB, CLK, DIO, D> {
    stb: STB,
    clk: CLK,
    dio: DIO,
    delay: D,
    brightness: u8,
}

impl<STB, CLK, DIO, D> Tm1638<STB, CLK, DIO, D>
where
    STB: OutputPin,
    CLK: OutputPin,
    DIO: OutputPin,
    D: DelayNs,
{
    /// Idles the bus and blanks the module
    pub fn new(
        mut stb: STB,
        mut clk: CLK,
        dio: DIO,
        delay: D,
        brightness: u8,
    ) -> Result<Self, Tm1638Error> {
        stb.set_high().map_err(|_| Tm1638Error::Pin)?;
        clk.set_high().map_err(|_| Tm1638Error::Pin)?;
        let mut tm = Self {
            stb,
            clk,
            dio,
            delay,
            brightness: brightness.min(7),
        };
        tm.clear()?;
        Ok(tm)
    }

    pub fn clear(&mut self) -> Result<(), Tm1638Error> {
        self.write_digits(&[BLANK; DIGITS])
    }

    /// Shows a signed integer right-aligned across the eight digits
    pub fn display_int(&mut self, value: i32) -> Result<(), Tm1638Error> {
        let digits = encode_int(value).ok_or(Tm1638Error::Overflow)?;
        self.write_digits(&digits)
    }

    /// Writes raw segment patterns, leftmost digit first, and clears the LEDs
    pub fn write_digits(&mut self, segments: &[u8; DIGITS]) -> Result<(), Tm1638Error> {
        self.command(CMD_DATA_AUTO_INCREMENT)?;

        self.start()?;
        self.write_byte(CMD_ADDRESS)?;
        for &segment in segments {
            self.write_byte(segment)?;
            self.write_byte(0x00)?;
        }
        self.stop()?;

        self.command(CMD_DISPLAY_ON | self.brightness)
    }

    fn command(&mut self, cmd: u8) -> Result<(), Tm1638Error> {
        self.start()?;
        self.write_byte(cmd)?;
        self.stop()
    }

    fn start(&mut self) -> Result<(), Tm1638Error> {
        self.stb.set_low().map_err(|_| Tm1638Error::Pin)?;
        self.delay.delay_us(HALF_PERIOD_US);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), Tm1638Error> {
        self.stb.set_high().map_err(|_| Tm1638Error::Pin)?;
        self.delay.delay_us(HALF_PERIOD_US);
        Ok(())
    }

    fn write_byte(&mut self, byte: u8) -> Result<(), Tm1638Error> {
        for bit in 0..8 {
            self.clk.set_low().map_err(|_| Tm1638Error::Pin)?;
            if byte & (1 << bit) != 0 {
                self.dio.set_high().map_err(|_| Tm1638Error::Pin)?;
            } else {
                self.dio.set_low().map_err(|_| Tm1638Error::Pin)?;
            }
            self.delay.delay_us(HALF_PERIOD_US);
            self.clk.set_high().map_err(|_| Tm1638Error::Pin)?;
            self.delay.delay_us(HALF_PERIOD_US);
        }
        Ok(())
    }
}

/// Segment patterns for a right-aligned integer
/// param value: number to show, a leading minus takes one digit
/// returns None if it needs more than eight digits
pub fn encode_int(value: i32) -> Option<[u8; DIGITS]> {
    let mut out = [BLANK; DIGITS];
    let negative = value < 0;
    let mut rest = value.unsigned_abs();
    let mut pos = DIGITS;

    loop {
        if pos == 0 {
            return None;
        }
        pos -= 1;
        out[pos] = DIGIT_SEGMENTS[(rest % 10) as usize];
        rest /= 10;
        if rest == 0 {
            break;
        }
    }

    if negative {
        if pos == 0 {
            return None;
        }
        out[pos - 1] = MINUS;
    }
    Some(out)
}
