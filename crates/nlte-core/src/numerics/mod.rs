pub mod fast_exp;
pub mod interpolation;
pub mod linalg;

pub use fast_exp::FastExp;
pub use interpolation::{interpolate_log_linear, interpolate_log_log};
pub use linalg::{DenseMatrix, LuError, lu_solve};

fn kahan_add(sum: &mut f64, correction: &mut f64, value: f64) {
    let corrected = value - *correction;
    let next = *sum + corrected;
    *correction = (next - *sum) - corrected;
    *sum = next;
}

pub fn stable_sum(values: &[f64]) -> f64 {
    let mut sum = 0.0;
    let mut correction = 0.0;

    for &value in values {
        kahan_add(&mut sum, &mut correction, value);
    }

    sum
}

pub fn dot3(lhs: [f64; 3], rhs: [f64; 3]) -> f64 {
    lhs[0] * rhs[0] + lhs[1] * rhs[1] + lhs[2] * rhs[2]
}

pub fn sub3(lhs: [f64; 3], rhs: [f64; 3]) -> [f64; 3] {
    [lhs[0] - rhs[0], lhs[1] - rhs[1], lhs[2] - rhs[2]]
}

pub fn lerp3(from: [f64; 3], to: [f64; 3], fraction: f64) -> [f64; 3] {
    [
        from[0] + (to[0] - from[0]) * fraction,
        from[1] + (to[1] - from[1]) * fraction,
        from[2] + (to[2] - from[2]) * fraction,
    ]
}

pub fn squared_distance3(lhs: [f64; 3], rhs: [f64; 3]) -> f64 {
    let delta = sub3(lhs, rhs);
    dot3(delta, delta)
}

pub fn distance3(lhs: [f64; 3], rhs: [f64; 3]) -> f64 {
    squared_distance3(lhs, rhs).sqrt()
}

/// Unit vector, or `None` for a zero-length input.
pub fn normalize3(vector: [f64; 3]) -> Option<[f64; 3]> {
    let norm = dot3(vector, vector).sqrt();
    if norm > 0.0 && norm.is_finite() {
        Some([vector[0] / norm, vector[1] / norm, vector[2] / norm])
    } else {
        None
    }
}

/// Rescales `values` to unit sum and returns the sum found before scaling.
pub fn normalize_in_place(values: &mut [f64]) -> f64 {
    let total = stable_sum(values);
    if total > 0.0 && total.is_finite() {
        for value in values.iter_mut() {
            *value /= total;
        }
    }
    total
}
