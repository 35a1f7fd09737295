use crate::types::ADC_MAX_VALUE;
use log::trace;

/// Default minimum raw deviation before a reading counts as a change.
pub const DEFAULT_HYSTERESIS: u16 = 16;

/// Default length of the moving-average window when smoothing is enabled.
pub const DEFAULT_SMOOTH_STEPS: u16 = 40;

/// Output value before the first poll. Outside every configured range.
const START_VALUE: f32 = -100.0;

/// One potentiometer or CV input.
///
/// Turns raw ADC codes into a range-mapped output value. A new output is
/// only computed when the input has moved more than `hysteresis_band` codes
/// away from the reading that produced the last change, so single-LSB jitter
/// never reaches the consumers while slow sweeps are still tracked.
///
/// # Quantised channels
///
/// With `quantise` set the mapped value is floored, which lets the same
/// primitive drive continuous controls (start position) and discrete ones
/// (channel index, note index). The raw hysteresis gate is the same for both:
/// a quantised channel may report a change whose floored output is identical
/// to the previous one, and consumers compare integers themselves.
#[derive(Debug, Clone)]
pub struct AnalogChannel {
    name: &'static str,
    raw_value: i32,
    smoothed_value: f32,
    output_value: f32,
    /// Reading that produced the last change. None until the first poll
    /// after construction or reconfiguration.
    last_change_raw: Option<i32>,
    hysteresis_band: u16,
    output_low: f32,
    output_high: f32,
    in_to_out_ratio: f32,
    quantise: bool,
    smoothing: bool,
    smooth_steps: u16,
    /// Whether the moving average has been seeded with a first sample
    primed: bool,
}

impl AnalogChannel {
    pub fn new(name: &'static str) -> Self {
        let mut channel = Self {
            name,
            raw_value: 0,
            smoothed_value: 0.0,
            output_value: START_VALUE,
            last_change_raw: None,
            hysteresis_band: DEFAULT_HYSTERESIS,
            output_low: 0.0,
            output_high: 1.0,
            in_to_out_ratio: 0.0,
            quantise: false,
            smoothing: false,
            smooth_steps: DEFAULT_SMOOTH_STEPS,
            primed: false,
        };
        channel.configure_range(0.0, 1.0, false);
        channel
    }

    /// Map the full ADC scale onto `[low, high]`, flooring results when
    /// `quantise` is set.
    ///
    /// Forgets the hysteresis anchor: the next `poll` always reports a change
    /// so consumers pick up the value in its new range.
    pub fn configure_range(&mut self, low: f32, high: f32, quantise: bool) {
        self.output_low = low;
        self.output_high = high;
        self.quantise = quantise;
        self.in_to_out_ratio = if high == low {
            0.0
        } else {
            (high - low) / (ADC_MAX_VALUE - 1) as f32
        };
        self.last_change_raw = None;
        self.output_value = START_VALUE;
    }

    /// Enable or disable an exponential moving average over roughly the last
    /// `steps` samples.
    pub fn configure_smoothing(&mut self, enabled: bool, steps: u16) {
        self.smoothing = enabled;
        self.smooth_steps = steps.max(1);
        self.primed = false;
    }

    pub fn set_hysteresis(&mut self, band: u16) {
        self.hysteresis_band = band;
    }

    /// Ingest one ADC reading. Returns true when the output value changed.
    pub fn poll(&mut self, raw: i32) -> bool {
        self.raw_value = raw;

        let value = if self.smoothing {
            if self.primed {
                self.smoothed_value += (raw as f32 - self.smoothed_value) / self.smooth_steps as f32;
            } else {
                self.smoothed_value = raw as f32;
                self.primed = true;
            }
            self.smoothed_value.round() as i32
        } else {
            self.smoothed_value = raw as f32;
            raw
        };

        if let Some(anchor) = self.last_change_raw {
            if (value - anchor).abs() <= self.hysteresis_band as i32 {
                return false;
            }
        }

        self.last_change_raw = Some(value);
        self.output_value = self.map(value);

        trace!(
            "{}: raw={} value={} out={:.3}",
            self.name, raw, value, self.output_value
        );
        true
    }

    fn map(&self, value: i32) -> f32 {
        if self.in_to_out_ratio == 0.0 {
            return self.output_low;
        }
        let clamped = value.clamp(0, ADC_MAX_VALUE - 1) as f32;
        let span = self.output_high - self.output_low;
        // Scale before dividing so full scale lands exactly on `output_high`
        let out = self.output_low + span * clamped / (ADC_MAX_VALUE - 1) as f32;
        if self.quantise {
            out.floor()
        } else {
            out
        }
    }

    /// Last computed output. Stable between change-producing polls.
    pub fn current_output(&self) -> f32 {
        self.output_value
    }

    /// Last raw reading, before smoothing.
    pub fn raw_value(&self) -> i32 {
        self.raw_value
    }

    /// Smoothed reading (equal to the raw reading when smoothing is off).
    pub fn smoothed_value(&self) -> f32 {
        self.smoothed_value
    }

    /// Output units per ADC code.
    pub fn ratio(&self) -> f32 {
        self.in_to_out_ratio
    }
}
