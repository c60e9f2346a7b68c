//! Math utility functions

/// Compute Euclidean distance between two vectors
///
/// Returns `None` when the lengths differ.
pub fn euclidean_distance(a: &[f32], b: &[f32]) -> Option<f32> {
    if a.len() != b.len() {
        return None;
    }

    let sum: f32 = a
        .iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).powi(2))
        .sum();
    Some(sum.sqrt())
}

/// Index and value of the smallest element; the first one wins on ties
pub fn argmin(x: &[f32]) -> Option<(usize, f32)> {
    let mut best: Option<(usize, f32)> = None;
    for (idx, &value) in x.iter().enumerate() {
        match best {
            _ if value.is_nan() => {}
            Some((_, current)) if value >= current => {}
            _ => best = Some((idx, value)),
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_euclidean_distance() {
        let a = vec![0.0, 0.0];
        let b = vec![3.0, 4.0];
        assert!((euclidean_distance(&a, &b).unwrap() - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_euclidean_distance_length_mismatch() {
        assert!(euclidean_distance(&[1.0, 2.0], &[1.0]).is_none());
    }

    #[test]
    fn test_argmin() {
        let x = vec![4.0, 1.0, 3.0, 2.0];
        assert_eq!(argmin(&x), Some((1, 1.0)));
    }

    #[test]
    fn test_argmin_first_tie_wins() {
        let x = vec![2.0, 1.0, 1.0];
        assert_eq!(argmin(&x), Some((1, 1.0)));
        assert_eq!(argmin(&[]), None);
    }
}
