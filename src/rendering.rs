use core::fmt::Write as _;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use heapless::String;
use ufmt::{uDisplay, uWrite, uwrite, Formatter};

use crate::stats::Summary;
use crate::tm1638::{Tm1638, Tm1638Error};

/// Longest line any sink renders
pub const LINE_CAPACITY: usize = 48;

pub type Line = String<LINE_CAPACITY>;

/// Error from a sink
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub enum RenderError<E> {
    /// Formatted text did not fit in a line buffer
    Overflow,
    /// The device itself failed
    Device(E),
}

/// Consumer of a finished summary
pub trait Sink {
    type Error;

    fn show(&mut self, summary: &Summary) -> Result<(), Self::Error>;
}

/// Line-oriented text display
pub trait TextDisplay {
    type Error;

    fn clear(&mut self) -> Result<(), Self::Error>;

    /// Writes `text` at the start of `row`
    fn write_line(&mut self, row: u8, text: &str) -> Result<(), Self::Error>;
}

/// Hundredths at and above this no longer fit an f64 mantissa exactly
const EXACT_CENTI_LIMIT: f64 = 9_007_199_254_740_992.0;

/// Fixed-point rendering with two decimals, the same digits as `%.2f`.
///
/// The value is widened to f64 first. A 24-bit mantissa times 100 stays
/// exact there, so the single rounding step (ties to even) is the only one.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TwoDecimals(pub f32);

impl uDisplay for TwoDecimals {
    fn fmt<W>(&self, f: &mut Formatter<'_, W>) -> Result<(), W::Error>
    where
        W: uWrite + ?Sized,
    {
        if self.0.is_nan() {
            return f.write_str("nan");
        }
        if self.0.is_infinite() {
            return f.write_str(if self.0 < 0.0 { "-inf" } else { "inf" });
        }

        // sign survives rounding to zero, as in "-0.00"
        if self.0.is_sign_negative() {
            f.write_str("-")?;
        }
        let magnitude = libm::fabs(self.0 as f64);
        let centi = libm::rint(magnitude * 100.0);
        if centi >= EXACT_CENTI_LIMIT {
            return write_large(f, magnitude);
        }

        let centi = centi as u64;
        let whole = centi / 100;
        let frac = (centi % 100) as u8;

        uwrite!(f, "{}.", whole)?;
        if frac < 10 {
            f.write_str("0")?;
        }
        uwrite!(f, "{}", frac)
    }
}

/// Writes a magnitude too large for the integer path through `core::fmt`.
/// Such values are whole numbers, so only the digits change with rounding.
/// param f: ufmt formatter to write into
/// param magnitude: absolute value, at least 2^53 / 100
fn write_large<W>(f: &mut Formatter<'_, W>, magnitude: f64) -> Result<(), W::Error>
where
    W: uWrite + ?Sized,
{
    let mut bridge = FmtBridge { f, error: None };
    match write!(bridge, "{:.2}", magnitude) {
        Ok(()) => Ok(()),
        Err(_) => bridge.error.take().map_or(Ok(()), Err),
    }
}

/// `core::fmt::Write` over a ufmt formatter, keeping the writer's own error
struct FmtBridge<'a, 'w, W: uWrite + ?Sized> {
    f: &'a mut Formatter<'w, W>,
    error: Option<W::Error>,
}

impl<W: uWrite + ?Sized> core::fmt::Write for FmtBridge<'_, '_, W> {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        self.f.write_str(s).map_err(|e| {
            self.error = Some(e);
            core::fmt::Error
        })
    }
}

/// Relative error with its unit, or `--` when undefined
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Percent(pub Option<f32>);

impl uDisplay for Percent {
    fn fmt<W>(&self, f: &mut Formatter<'_, W>) -> Result<(), W::Error>
    where
        W: uWrite + ?Sized,
    {
        match self.0 {
            Some(value) => uwrite!(f, "{} %", TwoDecimals(value)),
            None => f.write_str("--"),
        }
    }
}

/// Serial report, one value per line, newline terminated
pub fn serial_lines(summary: &Summary) -> Result<[Line; 3], RenderError<()>> {
    let mut lines: [Line; 3] = Default::default();
    uwrite!(&mut lines[0], "Promedio: {}\n", TwoDecimals(summary.aht20_mean))
        .map_err(|_| RenderError::Overflow)?;
    uwrite!(&mut lines[1], "Error Absoluto: {}\n", TwoDecimals(summary.absolute_error))
        .map_err(|_| RenderError::Overflow)?;
    uwrite!(&mut lines[2], "Error Relativo: {}\n", Percent(summary.relative_error))
        .map_err(|_| RenderError::Overflow)?;
    Ok(lines)
}

/// Three OLED rows, short enough for a 128 px wide terminal
pub fn oled_lines(summary: &Summary) -> Result<[Line; 3], RenderError<()>> {
    let mut lines: [Line; 3] = Default::default();
    uwrite!(&mut lines[0], "Prom: {} C", TwoDecimals(summary.aht20_mean))
        .map_err(|_| RenderError::Overflow)?;
    uwrite!(&mut lines[1], "Error Abs: {}", TwoDecimals(summary.absolute_error))
        .map_err(|_| RenderError::Overflow)?;
    uwrite!(&mut lines[2], "Error Rel: {}", Percent(summary.relative_error))
        .map_err(|_| RenderError::Overflow)?;
    Ok(lines)
}

/// Integer part of the AHT20 mean on the segment module
pub struct SegmentSink<STB, CLK, DIO, D> {
    display: Tm1638<STB, CLK, DIO, D>,
}

impl<STB, CLK, DIO, D> SegmentSink<STB, CLK, DIO, D> {
    pub fn new(display: Tm1638<STB, CLK, DIO, D>) -> Self {
        Self { display }
    }
}

impl<STB, CLK, DIO, D> Sink for SegmentSink<STB, CLK, DIO, D>
where
    STB: OutputPin,
    CLK: OutputPin,
    DIO: OutputPin,
    D: DelayNs,
{
    type Error = RenderError<Tm1638Error>;

    fn show(&mut self, summary: &Summary) -> Result<(), Self::Error> {
        // `as` truncates toward zero and saturates out-of-range values
        self.display
            .display_int(summary.aht20_mean as i32)
            .map_err(RenderError::Device)
    }
}

/// Clears the OLED and writes the three summary rows
pub struct OledSink<T> {
    display: T,
}

impl<T: TextDisplay> OledSink<T> {
    pub fn new(display: T) -> Self {
        Self { display }
    }

    pub fn release(self) -> T {
        self.display
    }
}

impl<T: TextDisplay> Sink for OledSink<T> {
    type Error = RenderError<T::Error>;

    fn show(&mut self, summary: &Summary) -> Result<(), Self::Error> {
        let lines = oled_lines(summary).map_err(|_| RenderError::Overflow)?;

        self.display.clear().map_err(RenderError::Device)?;
        for (row, line) in (0u8..).zip(lines.iter()) {
            self.display
                .write_line(row, line)
                .map_err(RenderError::Device)?;
        }
        Ok(())
    }
}

/// Text report on any `core::fmt::Write` port, usually the UART
pub struct SerialSink<W> {
    port: W,
}

impl<W: core::fmt::Write> SerialSink<W> {
    pub fn new(port: W) -> Self {
        Self { port }
    }

    pub fn release(self) -> W {
        self.port
    }
}

impl<W: core::fmt::Write> Sink for SerialSink<W> {
    type Error = RenderError<core::fmt::Error>;

    fn show(&mut self, summary: &Summary) -> Result<(), Self::Error> {
        let lines = serial_lines(summary).map_err(|_| RenderError::Overflow)?;
        for line in lines.iter() {
            self.port.write_str(line).map_err(RenderError::Device)?;
        }
        Ok(())
    }
}
