//! Clipping extended rows back to the caller's grid

use std::ops::Range;

/// Split `flat` into `bins`-wide rows and keep `window` of each
pub fn clip_rows<T: Clone>(flat: &[T], bins: usize, window: &Range<usize>) -> Vec<Vec<T>> {
    if bins == 0 {
        return Vec::new();
    }
    flat.chunks(bins)
        .map(|row| row[window.clone()].to_vec())
        .collect()
}

/// Transpose `[period][wealth]` rows into `[wealth][period]`
pub fn transpose<T: Clone>(rows: &[Vec<T>]) -> Vec<Vec<T>> {
    let width = rows.first().map_or(0, |r| r.len());
    (0..width)
        .map(|j| rows.iter().map(|row| row[j].clone()).collect())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clip_keeps_window_of_each_row() {
        let flat: Vec<usize> = (0..12).collect();
        let rows = clip_rows(&flat, 4, &(1..3));
        assert_eq!(rows, vec![vec![1, 2], vec![5, 6], vec![9, 10]]);
    }

    #[test]
    fn test_transpose() {
        let rows = vec![vec![1, 2, 3], vec![4, 5, 6]];
        assert_eq!(transpose(&rows), vec![vec![1, 4], vec![2, 5], vec![3, 6]]);
        assert!(transpose::<u8>(&[]).is_empty());
    }
}
