//! Moving Average Filter with Outlier Clamping

use crate::error::FilterError;
use tracing::debug;

/// Default number of samples averaged
pub const DEFAULT_WINDOW_SIZE: usize = 10;

/// Default outlier threshold, in standard deviations of the window
pub const DEFAULT_OUTLIER_THRESHOLD: f64 = 5.0;

/// Sliding window mean over raw integer samples
///
/// Once at least two samples are in the window, a new sample further than
/// `threshold * max(stddev, 1.0)` from the window mean is clamped to that
/// band before it is admitted. A lone spike therefore moves the output by at
/// most one band width over N, while a genuine step change widens the band
/// as it enters the window and is tracked within a couple of window lengths.
pub struct MovingAverageFilter {
    window: Vec<f64>,
    position: usize,
    len: usize,
    threshold: Option<f64>,
    rejected: u64,
}

impl MovingAverageFilter {
    /// Create a filter holding `size` samples
    ///
    /// `threshold` of `None` disables outlier clamping.
    pub fn new(size: usize, threshold: Option<f64>) -> Result<Self, FilterError> {
        if size == 0 {
            return Err(FilterError::InvalidWindow);
        }
        if let Some(t) = threshold {
            if !t.is_finite() || t <= 0.0 {
                return Err(FilterError::InvalidThreshold(t));
            }
        }

        Ok(Self {
            window: vec![0.0; size],
            position: 0,
            len: 0,
            threshold,
            rejected: 0,
        })
    }

    /// Add a sample and get the filtered output
    pub fn filter(&mut self, sample: i32) -> f64 {
        let admitted = self.screen(f64::from(sample));

        self.window[self.position] = admitted;
        self.position = (self.position + 1) % self.window.len();
        self.len = (self.len + 1).min(self.window.len());

        self.mean()
    }

    /// Clamp `sample` into the acceptance band around the current mean
    fn screen(&mut self, sample: f64) -> f64 {
        let Some(threshold) = self.threshold else {
            return sample;
        };
        if self.len < 2 {
            return sample;
        }

        let mean = self.mean();
        let band = threshold * self.std_dev().max(1.0);
        if (sample - mean).abs() <= band {
            return sample;
        }

        self.rejected += 1;
        let clamped = sample.clamp(mean - band, mean + band);
        debug!(
            "Outlier {} outside {:.2} +/- {:.2}, admitted as {:.2}",
            sample, mean, band, clamped
        );
        clamped
    }

    /// Mean of the samples currently in the window (0.0 when empty)
    pub fn mean(&self) -> f64 {
        if self.len == 0 {
            return 0.0;
        }
        self.samples().iter().sum::<f64>() / self.len as f64
    }

    /// Population standard deviation of the window
    pub fn std_dev(&self) -> f64 {
        if self.len == 0 {
            return 0.0;
        }
        let mean = self.mean();
        let var = self
            .samples()
            .iter()
            .map(|x| (x - mean) * (x - mean))
            .sum::<f64>()
            / self.len as f64;
        var.sqrt()
    }

    // Slots fill from index 0, so the occupied prefix is always [..len]
    fn samples(&self) -> &[f64] {
        &self.window[..self.len]
    }

    /// Number of samples in the window
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if no sample has been admitted yet
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Window capacity
    pub fn capacity(&self) -> usize {
        self.window.len()
    }

    /// Check if the window is full
    pub fn is_full(&self) -> bool {
        self.len == self.window.len()
    }

    /// Number of samples clamped as outliers so far
    pub fn rejected_count(&self) -> u64 {
        self.rejected
    }

    /// Reset the filter
    pub fn reset(&mut self) {
        self.window.fill(0.0);
        self.position = 0;
        self.len = 0;
        self.rejected = 0;
    }
}
