//! Averaging and error metrics between the two sensor sources.

use crate::config::SAMPLE_COUNT;

/// Fixed-size set of samples from one sensor, in acquisition order
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ReadingSet<const N: usize = SAMPLE_COUNT> {
    samples: [f32; N],
}

impl<const N: usize> ReadingSet<N> {
    pub const fn new(samples: [f32; N]) -> Self {
        Self { samples }
    }

    pub fn samples(&self) -> &[f32; N] {
        &self.samples
    }

    /// Arithmetic mean, sum divided by count
    pub fn mean(&self) -> f32 {
        mean(&self.samples)
    }

    /// Lowest, middle and highest sample of a sorted copy.
    ///
    /// Diagnostic only; the summary never reads it.
    pub fn spread(&self) -> Spread {
        let mut sorted = self.samples;
        bubble_sort(&mut sorted);
        Spread {
            min: sorted.first().copied().unwrap_or(f32::NAN),
            median: sorted.get(N / 2).copied().unwrap_or(f32::NAN),
            max: sorted.last().copied().unwrap_or(f32::NAN),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub struct Spread {
    pub min: f32,
    /// Upper median for even-sized sets
    pub median: f32,
    pub max: f32,
}

/// Result of comparing the two averaged sources
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub struct Summary {
    pub aht20_mean: f32,
    pub thermistor_mean: f32,
    pub absolute_error: f32,
    /// Percent of the thermistor mean; `None` when that mean is zero
    pub relative_error: Option<f32>,
}

impl Summary {
    /// Compares the AHT20 mean against the thermistor mean as reference
    pub fn new(aht20_mean: f32, thermistor_mean: f32) -> Self {
        Self {
            aht20_mean,
            thermistor_mean,
            absolute_error: absolute_error(aht20_mean, thermistor_mean),
            relative_error: relative_error(aht20_mean, thermistor_mean),
        }
    }

    pub fn from_sets<const N: usize>(aht20: &ReadingSet<N>, thermistor: &ReadingSet<N>) -> Self {
        Self::new(aht20.mean(), thermistor.mean())
    }
}

pub fn mean(values: &[f32]) -> f32 {
    let sum: f32 = values.iter().sum();
    sum / values.len() as f32
}

pub fn absolute_error(a: f32, b: f32) -> f32 {
    libm::fabsf(a - b)
}

/// `|measured - reference| / reference * 100`, undefined for a zero reference
pub fn relative_error(measured: f32, reference: f32) -> Option<f32> {
    if reference == 0.0 {
        return None;
    }
    Some(absolute_error(measured, reference) / reference * 100.0)
}

/// In-place ascending sort by adjacent swaps
pub fn bubble_sort(values: &mut [f32]) {
    let n = values.len();
    for i in 0..n.saturating_sub(1) {
        let mut swapped = false;
        for j in 0..n - i - 1 {
            if values[j] > values[j + 1] {
                values.swap(j, j + 1);
                swapped = true;
            }
        }
        if !swapped {
            break;
        }
    }
}
