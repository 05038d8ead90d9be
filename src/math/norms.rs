//! Norm and distance computations.
//!
//! Accumulation is done in `f64` so that distances between large models
//! stay stable even though parameters are stored as `f32`.

/// Compute the L2 (Euclidean) norm of a sequence of values.
pub fn l2_norm<'a>(v: impl IntoIterator<Item = &'a f32>) -> f64 {
    l2_norm_sq(v).sqrt()
}

/// Compute the squared L2 norm of a sequence of values (avoids sqrt).
pub fn l2_norm_sq<'a>(v: impl IntoIterator<Item = &'a f32>) -> f64 {
    v.into_iter()
        .map(|&x| {
            let x = x as f64;
            x * x
        })
        .sum()
}

/// Compute the L2 distance between two equally long sequences.
///
/// Extra trailing values in the longer sequence are ignored; callers
/// check shapes beforehand.
pub fn l2_distance<'a, 'b>(
    a: impl IntoIterator<Item = &'a f32>,
    b: impl IntoIterator<Item = &'b f32>,
) -> f64 {
    a.into_iter()
        .zip(b)
        .map(|(&x, &y)| {
            let d = x as f64 - y as f64;
            d * d
        })
        .sum::<f64>()
        .sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_l2_norm_3_4_5() {
        let v = vec![3.0f32, 4.0];
        assert!((l2_norm(&v) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_l2_norm_sq_3_4() {
        let v = vec![3.0f32, 4.0];
        assert!((l2_norm_sq(&v) - 25.0).abs() < 1e-12);
    }

    #[test]
    fn test_l2_norm_empty() {
        let empty: [f32; 0] = [];
        assert_eq!(l2_norm(&empty), 0.0);
        assert_eq!(l2_norm_sq(&empty), 0.0);
    }

    #[test]
    fn test_l2_distance() {
        let a = vec![1.0f32, 1.0];
        let b = vec![4.0f32, 5.0];
        assert!((l2_distance(&a, &b) - 5.0).abs() < 1e-12);
        assert_eq!(l2_distance(&a, &a), 0.0);
    }

    #[test]
    fn test_l2_distance_symmetric() {
        let a = vec![0.3f32, -1.2, 7.5];
        let b = vec![-2.0f32, 0.1, 1.0];
        assert_eq!(l2_distance(&a, &b), l2_distance(&b, &a));
    }
}
