//! Assertion utilities for testing.
//!
//! Floating-point comparisons and checks on categorical layers.

use ndarray::Array2;

/// Default epsilon for floating-point comparisons
pub const DEFAULT_EPSILON: f32 = 1e-6;

/// Assert that two floating-point values are approximately equal.
///
/// # Panics
///
/// Panics if the absolute difference between `actual` and `expected` is greater than `epsilon`.
pub fn assert_approx_eq(actual: f32, expected: f32, epsilon: Option<f32>) {
    let epsilon = epsilon.unwrap_or(DEFAULT_EPSILON);
    let diff = (actual - expected).abs();

    assert!(
        diff <= epsilon,
        "Values not approximately equal: actual = {}, expected = {}, diff = {}, epsilon = {}",
        actual,
        expected,
        diff,
        epsilon
    );
}

/// Assert that every value of a layer belongs to `classes`.
pub fn assert_only_classes(data: &Array2<f32>, classes: &[f32]) {
    for ((r, c), v) in data.indexed_iter() {
        assert!(
            classes.contains(v),
            "Unexpected class {} at ({}, {}); allowed: {:?}",
            v,
            r,
            c,
            classes
        );
    }
}

/// Assert that an axis is strictly increasing or strictly decreasing.
pub fn assert_strictly_monotonic(axis: &[f64]) {
    assert!(axis.len() >= 2, "Axis too short to be monotonic: {:?}", axis);
    let increasing = axis[1] > axis[0];
    for pair in axis.windows(2) {
        let ok = if increasing {
            pair[1] > pair[0]
        } else {
            pair[1] < pair[0]
        };
        assert!(ok, "Axis not strictly monotonic at {:?}", pair);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_assert_approx_eq() {
        assert_approx_eq(1.0, 1.0, None);
        assert_approx_eq(1.0, 1.0000001, None);
        assert_approx_eq(1.0, 1.001, Some(0.01));
    }

    #[test]
    fn test_assert_only_classes() {
        assert_only_classes(&array![[0.0, 1.0], [1.0, 0.0]], &[0.0, 1.0]);
    }

    #[test]
    fn test_assert_strictly_monotonic() {
        assert_strictly_monotonic(&[1.0, 0.5, 0.0]);
        assert_strictly_monotonic(&[-67.0, -66.5, -66.0]);
    }
}
