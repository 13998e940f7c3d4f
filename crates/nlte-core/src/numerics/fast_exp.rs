//! Table-driven `exp(-x)` for the ray walk.
//!
//! The argument is split into a multiple of the table step plus a remainder
//! below one step; the tabulated factor is corrected by a short Taylor series
//! in the remainder. Negative arguments (masing) and arguments past the table
//! fall through to `f64::exp`.

use crate::common::constants::{FAST_EXP_MAX_TAYLOR, FAST_EXP_NUM_BITS};

const FAST_EXP_TABLE_RANGE: f64 = 64.0;

#[derive(Debug, Clone)]
pub struct FastExp {
    step: f64,
    inverse_step: f64,
    table: Vec<f64>,
    taylor_coefficients: [f64; FAST_EXP_MAX_TAYLOR + 1],
}

impl FastExp {
    pub fn new() -> Self {
        let inverse_step = f64::from(1_u32 << FAST_EXP_NUM_BITS);
        let step = 1.0 / inverse_step;
        let entries = (FAST_EXP_TABLE_RANGE * inverse_step) as usize + 1;
        let table = (0..entries)
            .map(|index| (-(index as f64) * step).exp())
            .collect();

        let mut taylor_coefficients = [0.0; FAST_EXP_MAX_TAYLOR + 1];
        let mut factorial = 1.0;
        for (order, coefficient) in taylor_coefficients.iter_mut().enumerate() {
            if order > 0 {
                factorial *= order as f64;
            }
            let sign = if order % 2 == 0 { 1.0 } else { -1.0 };
            *coefficient = sign / factorial;
        }

        Self {
            step,
            inverse_step,
            table,
            taylor_coefficients,
        }
    }

    /// `exp(-x)`.
    pub fn exp_neg(&self, x: f64) -> f64 {
        if x.is_nan() || x < 0.0 || x >= FAST_EXP_TABLE_RANGE {
            return (-x).exp();
        }

        let index = (x * self.inverse_step) as usize;
        let remainder = x - index as f64 * self.step;

        let mut correction = 0.0;
        for coefficient in self.taylor_coefficients.iter().rev() {
            correction = correction * remainder + coefficient;
        }

        self.table[index] * correction
    }
}

impl Default for FastExp {
    fn default() -> Self {
        Self::new()
    }
}
