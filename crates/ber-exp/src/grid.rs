use ber_core::errors::{BerError, ErrorInfo};
use serde::{Deserialize, Serialize};

/// Tolerance used when deciding whether a range end point is reached.
const RANGE_EPSILON: f64 = 1e-9;

fn grid_error(code: &str, axis: &str, message: impl Into<String>) -> BerError {
    BerError::Config(ErrorInfo::new(code, message).with_context("axis", axis))
}

/// Description of one sweep axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AxisSpec {
    /// Explicit list of values.
    Values {
        /// Values in ascending order.
        values: Vec<f64>,
    },
    /// Arithmetic progression `start + i * step`.
    Range {
        /// First value.
        start: f64,
        /// End point.
        stop: f64,
        /// Positive increment.
        step: f64,
        /// Whether `stop` itself is included when reached.
        #[serde(default)]
        inclusive: bool,
    },
}

impl AxisSpec {
    /// Reference noise axis: 0.0 to 4.0 volts in 0.5 steps (9 values).
    pub fn default_noise() -> Self {
        AxisSpec::Range {
            start: 0.0,
            stop: 4.0,
            step: 0.5,
            inclusive: true,
        }
    }

    /// Reference loop bandwidth axis: 0.0 up to 0.25 in 0.0025 steps (100 values).
    pub fn default_bandwidth() -> Self {
        AxisSpec::Range {
            start: 0.0,
            stop: 0.25,
            step: 0.0025,
            inclusive: false,
        }
    }

    /// Expands the axis into concrete values.
    pub fn expand(&self, axis: &str) -> Result<Vec<f64>, BerError> {
        match self {
            AxisSpec::Values { values } => Ok(values.clone()),
            AxisSpec::Range {
                start,
                stop,
                step,
                inclusive,
            } => {
                if !(start.is_finite() && stop.is_finite() && step.is_finite()) {
                    return Err(grid_error("axis-range", axis, "range bounds must be finite"));
                }
                if *step <= 0.0 {
                    return Err(grid_error("axis-step", axis, "range step must be positive"));
                }
                if stop < start {
                    return Err(grid_error("axis-range", axis, "range stop precedes start"));
                }
                let span = (stop - start) / step;
                let count = if *inclusive {
                    (span + RANGE_EPSILON).floor() as usize + 1
                } else {
                    (span - RANGE_EPSILON).ceil().max(0.0) as usize
                };
                Ok((0..count)
                    .map(|idx| tidy(start + idx as f64 * step))
                    .collect())
            }
        }
    }
}

/// Rounds away binary noise such as `0.30000000000000004`.
fn tidy(value: f64) -> f64 {
    (value * 1e12).round() / 1e12
}

/// Two ordered sweep axes. Rows follow bandwidth, columns follow noise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterGrid {
    noise_levels: Vec<f64>,
    loop_bandwidths: Vec<f64>,
}

impl ParameterGrid {
    /// Builds a grid, checking that both axes are non-empty, finite and strictly ascending.
    pub fn new(noise_levels: Vec<f64>, loop_bandwidths: Vec<f64>) -> Result<Self, BerError> {
        validate_axis("noise", &noise_levels)?;
        validate_axis("bandwidth", &loop_bandwidths)?;
        Ok(Self {
            noise_levels,
            loop_bandwidths,
        })
    }

    /// Expands both axis descriptions into a grid.
    pub fn from_axes(noise: &AxisSpec, bandwidth: &AxisSpec) -> Result<Self, BerError> {
        Self::new(noise.expand("noise")?, bandwidth.expand("bandwidth")?)
    }

    /// Column axis.
    pub fn noise_levels(&self) -> &[f64] {
        &self.noise_levels
    }

    /// Row axis.
    pub fn loop_bandwidths(&self) -> &[f64] {
        &self.loop_bandwidths
    }

    /// Number of rows (bandwidths).
    pub fn rows(&self) -> usize {
        self.loop_bandwidths.len()
    }

    /// Number of columns (noise levels).
    pub fn columns(&self) -> usize {
        self.noise_levels.len()
    }

    /// Total number of trials in a full sweep.
    pub fn cell_count(&self) -> usize {
        self.rows() * self.columns()
    }
}

impl Default for ParameterGrid {
    fn default() -> Self {
        let noise = AxisSpec::default_noise()
            .expand("noise")
            .unwrap_or_default();
        let bandwidth = AxisSpec::default_bandwidth()
            .expand("bandwidth")
            .unwrap_or_default();
        Self {
            noise_levels: noise,
            loop_bandwidths: bandwidth,
        }
    }
}

fn validate_axis(axis: &str, values: &[f64]) -> Result<(), BerError> {
    if values.is_empty() {
        return Err(grid_error("axis-empty", axis, "axis has no values"));
    }
    if let Some(bad) = values.iter().find(|value| !value.is_finite()) {
        return Err(BerError::Config(
            ErrorInfo::new("axis-value", "axis values must be finite")
                .with_context("axis", axis)
                .with_context("value", bad.to_string()),
        ));
    }
    if let Some(idx) = values.windows(2).position(|pair| pair[1] <= pair[0]) {
        return Err(BerError::Config(
            ErrorInfo::new("axis-order", "axis values must be strictly ascending")
                .with_context("axis", axis)
                .with_context("value", format!("{} then {}", values[idx], values[idx + 1])),
        ));
    }
    Ok(())
}
