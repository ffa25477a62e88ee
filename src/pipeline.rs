//! One measurement run: acquire both reading sets, summarize, fan out.

use embedded_hal::delay::DelayNs;

use crate::config::{SAMPLE_COUNT, SAMPLE_DELAY_MS};
use crate::rendering::Sink;
use crate::sensors::{SensorError, Source, TemperatureSensor};
use crate::stats::{ReadingSet, Summary};

/// Which output failed
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub enum SinkKind {
    Segment,
    Oled,
    Serial,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub enum Error {
    Sensor { source: Source, error: SensorError },
    Output(SinkKind),
}

/// Both reading sets from one acquisition pass
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Acquisition<const N: usize = SAMPLE_COUNT> {
    pub aht20: ReadingSet<N>,
    pub thermistor: ReadingSet<N>,
}

/// Reads one sample from each sensor per round, pausing after every round
/// param aht20: reference sensor
/// param thermistor: sensor under test
/// param delay: timer used for the pause
/// param delay_ms: pause length in milliseconds
/// returns both sets, or the first sensor error
pub fn acquire<A, T, D, const N: usize>(
    aht20: &mut A,
    thermistor: &mut T,
    delay: &mut D,
    delay_ms: u32,
) -> Result<Acquisition<N>, Error>
where
    A: TemperatureSensor,
    T: TemperatureSensor,
    D: DelayNs,
{
    let mut aht20_samples = [0.0f32; N];
    let mut thermistor_samples = [0.0f32; N];

    let rounds = aht20_samples.iter_mut().zip(thermistor_samples.iter_mut());
    for (i, (aht20_sample, thermistor_sample)) in rounds.enumerate() {
        *aht20_sample = read(aht20, Source::Aht20)?;
        *thermistor_sample = read(thermistor, Source::Thermistor)?;
        debug!(
            "sample {}: aht20 {} C, thermistor {} C",
            i,
            *aht20_sample,
            *thermistor_sample
        );
        delay.delay_ms(delay_ms);
    }

    Ok(Acquisition {
        aht20: ReadingSet::new(aht20_samples),
        thermistor: ReadingSet::new(thermistor_samples),
    })
}

fn read<S: TemperatureSensor>(sensor: &mut S, source: Source) -> Result<f32, Error> {
    sensor.read_celsius().map_err(|error| {
        error!("{} read failed: {}", source.as_str(), error);
        Error::Sensor { source, error }
    })
}

/// Ten rounds with the configured delay, then the comparison
pub fn acquire_and_summarize<A, T, D>(
    aht20: &mut A,
    thermistor: &mut T,
    delay: &mut D,
) -> Result<Summary, Error>
where
    A: TemperatureSensor,
    T: TemperatureSensor,
    D: DelayNs,
{
    let acquisition: Acquisition<SAMPLE_COUNT> =
        acquire(aht20, thermistor, delay, SAMPLE_DELAY_MS)?;

    let aht20_spread = acquisition.aht20.spread();
    let thermistor_spread = acquisition.thermistor.spread();
    debug!("aht20 spread {}", aht20_spread);
    debug!("thermistor spread {}", thermistor_spread);

    let summary = Summary::from_sets(&acquisition.aht20, &acquisition.thermistor);
    info!("summary {}", summary);
    if summary.relative_error.is_none() {
        warn!("thermistor mean is zero, relative error undefined");
    }
    Ok(summary)
}

/// Hands the summary to each sink in turn, stopping at the first failure
/// param summary: finished comparison
/// param segment: TM1638 sink
/// param oled: SSD1306 sink
/// param serial: UART sink
pub fn publish<S, O, R>(
    summary: &Summary,
    segment: &mut S,
    oled: &mut O,
    serial: &mut R,
) -> Result<(), Error>
where
    S: Sink,
    O: Sink,
    R: Sink,
{
    segment
        .show(summary)
        .map_err(|_| output_failed(SinkKind::Segment))?;
    oled.show(summary)
        .map_err(|_| output_failed(SinkKind::Oled))?;
    serial
        .show(summary)
        .map_err(|_| output_failed(SinkKind::Serial))?;
    Ok(())
}

fn output_failed(kind: SinkKind) -> Error {
    error!("{} output failed", kind);
    Error::Output(kind)
}

/// Full run: acquire, summarize, publish
pub fn run<A, T, D, S, O, R>(
    aht20: &mut A,
    thermistor: &mut T,
    delay: &mut D,
    segment: &mut S,
    oled: &mut O,
    serial: &mut R,
) -> Result<Summary, Error>
where
    A: TemperatureSensor,
    T: TemperatureSensor,
    D: DelayNs,
    S: Sink,
    O: Sink,
    R: Sink,
{
    let summary = acquire_and_summarize(aht20, thermistor, delay)?;
    publish(&summary, segment, oled, serial)?;
    Ok(summary)
}
