//! User-tunable parameters for fit operations

pub const RANGE_MIN: u32 = 1;
pub const RANGE_MAX: u32 = 100;
pub const DEFAULT_RANGE: u32 = 50;

pub const ITERATIONS_MIN: u32 = 2;
pub const ITERATIONS_MAX: u32 = 15;
pub const DEFAULT_ITERATIONS: u32 = 5;

/// Range and iteration count for "fit" operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CutoutParameters {
    range: u32,
    iterations: u32,
}

impl Default for CutoutParameters {
    fn default() -> Self {
        Self {
            range: DEFAULT_RANGE,
            iterations: DEFAULT_ITERATIONS,
        }
    }
}

impl CutoutParameters {
    /// Parameters starting from the given values, clamped into their domains
    #[must_use]
    pub fn new(range: i64, iterations: i64) -> Self {
        let mut params = Self::default();
        params.set_range(range);
        params.set_iterations(iterations);
        params
    }

    #[must_use]
    pub fn range(&self) -> u32 {
        self.range
    }

    #[must_use]
    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    /// Set the range, clamped to 1-100; returns the stored value
    pub fn set_range(&mut self, range: i64) -> u32 {
        self.range = clamp_into(range, RANGE_MIN, RANGE_MAX);
        self.range
    }

    /// Set the iterations, clamped to 2-15; returns the stored value
    pub fn set_iterations(&mut self, iterations: i64) -> u32 {
        self.iterations = clamp_into(iterations, ITERATIONS_MIN, ITERATIONS_MAX);
        self.iterations
    }
}

fn clamp_into(value: i64, min: u32, max: u32) -> u32 {
    value.clamp(i64::from(min), i64::from(max)) as u32
}
