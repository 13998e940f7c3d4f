/// Interpolates `ln(values)` linearly in `grid` at `x`, clamping outside the
/// grid. Falls back to plain linear interpolation when either bracketing value
/// is not strictly positive. `grid` must be strictly increasing and the same
/// length as `values`.
pub fn interpolate_log_linear(grid: &[f64], values: &[f64], x: f64) -> f64 {
    let Some((lower, upper, fraction)) = bracket(grid, x) else {
        return values.first().copied().unwrap_or(0.0);
    };

    let lo = values[lower];
    let hi = values[upper];
    if fraction <= 0.0 {
        lo
    } else if fraction >= 1.0 {
        hi
    } else if lo > 0.0 && hi > 0.0 {
        (lo.ln() + (hi.ln() - lo.ln()) * fraction).exp()
    } else {
        lo + (hi - lo) * fraction
    }
}

/// Interpolates in log-log space, clamping outside the grid. Non-positive
/// inputs are not meaningful here and yield `0.0`.
pub fn interpolate_log_log(grid: &[f64], values: &[f64], x: f64) -> f64 {
    if x <= 0.0 {
        return 0.0;
    }
    let log_grid: Vec<f64> = grid.iter().map(|value| value.ln()).collect();
    let Some((lower, upper, fraction)) = bracket(&log_grid, x.ln()) else {
        return values.first().copied().unwrap_or(0.0);
    };

    let lo = values[lower];
    let hi = values[upper];
    if fraction <= 0.0 {
        lo
    } else if fraction >= 1.0 {
        hi
    } else if lo > 0.0 && hi > 0.0 {
        (lo.ln() + (hi.ln() - lo.ln()) * fraction).exp()
    } else {
        0.0
    }
}

/// Returns the bracketing indices and the fractional position of `x`; `None`
/// when the grid has fewer than two nodes.
fn bracket(grid: &[f64], x: f64) -> Option<(usize, usize, f64)> {
    if grid.len() < 2 {
        return None;
    }
    let last = grid.len() - 1;
    if x <= grid[0] {
        return Some((0, 1, 0.0));
    }
    if x >= grid[last] {
        return Some((last - 1, last, 1.0));
    }

    let upper = grid.partition_point(|node| *node <= x).min(last);
    let lower = upper - 1;
    let span = grid[upper] - grid[lower];
    Some((lower, upper, (x - grid[lower]) / span))
}

#[cfg(test)]
mod tests {
    use super::{interpolate_log_linear, interpolate_log_log};

    #[test]
    fn log_linear_is_exact_at_nodes_and_clamps_outside() {
        let grid = [10.0, 20.0, 40.0];
        let values = [1.0e-11, 2.0e-11, 8.0e-11];

        for (node, value) in grid.iter().zip(values) {
            let actual = interpolate_log_linear(&grid, &values, *node);
            assert!(((actual - value) / value).abs() <= 1.0e-12);
        }
        assert_eq!(interpolate_log_linear(&grid, &values, 1.0), values[0]);
        assert!(
            ((interpolate_log_linear(&grid, &values, 100.0) - values[2]) / values[2]).abs()
                <= 1.0e-12
        );

        let midpoint = interpolate_log_linear(&grid, &values, 30.0);
        assert!(((midpoint - 4.0e-11) / 4.0e-11).abs() <= 1.0e-12);
    }

    #[test]
    fn log_linear_falls_back_to_linear_around_zero_rates() {
        let grid = [10.0, 20.0];
        let values = [0.0, 2.0];
        assert_eq!(interpolate_log_linear(&grid, &values, 15.0), 1.0);
        assert_eq!(interpolate_log_linear(&[10.0], &[3.0], 50.0), 3.0);
    }

    #[test]
    fn log_log_follows_power_laws() {
        let grid = [1.0, 10.0, 100.0];
        let values = [1.0, 0.01, 1.0e-4];
        let actual = interpolate_log_log(&grid, &values, 3.0);
        assert!(((actual - 1.0 / 9.0) / (1.0 / 9.0)).abs() <= 1.0e-12);
        assert_eq!(interpolate_log_log(&grid, &values, 0.0), 0.0);
    }
}
