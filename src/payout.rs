//! Multiplier tables and bucket selection
//!
//! A ball falling through `n` rows lands in bucket `k` with binomial
//! probability `C(n, k) / 2^n`. Fair tables give every bucket the same share
//! of the return, so rare edge buckets pay the most.

use crate::sim::board::Board;

/// Landing probability of each of the `rows + 1` buckets
pub fn bucket_probabilities(rows: u32) -> Vec<f64> {
    let n = rows as usize;
    let total = 2f64.powi(rows as i32);
    let mut coefficient = 1.0f64;
    let mut probabilities = Vec::with_capacity(n + 1);
    for k in 0..=n {
        probabilities.push(coefficient / total);
        coefficient = coefficient * (n - k) as f64 / (k + 1) as f64;
    }
    probabilities
}

/// Multiplier table whose expected return is `rtp`, rounded to cents
pub fn fair_multipliers(rows: u32, rtp: f64) -> Vec<f64> {
    let probabilities = bucket_probabilities(rows);
    let share = rtp / probabilities.len() as f64;
    probabilities
        .iter()
        .map(|p| (share / p * 100.0).round() / 100.0)
        .collect()
}

/// Expected multiplier of a table under binomial landing odds
pub fn expected_return(multipliers: &[f64]) -> f64 {
    let Some(rows) = multipliers.len().checked_sub(1) else {
        return 0.0;
    };
    bucket_probabilities(rows as u32)
        .iter()
        .zip(multipliers)
        .map(|(p, m)| p * m)
        .sum()
}

/// Buckets paying `multiplier` (to within a cent)
pub fn buckets_with_multiplier(board: &Board, multiplier: f64) -> Vec<usize> {
    (0..board.bucket_count())
        .filter(|&i| {
            board
                .multiplier(i)
                .is_some_and(|m| (m - multiplier).abs() < 0.005)
        })
        .collect()
}

/// Amount won for `wager` landing in `bucket`
pub fn payout(board: &Board, wager: f64, bucket: usize) -> Option<f64> {
    board.multiplier(bucket).map(|m| wager * m)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BoardSettings;
    use crate::sim::board::{BucketLayout, layout_board};

    #[test]
    fn test_probabilities_sum_to_one() {
        for rows in [1, 8, 14, 16] {
            let p = bucket_probabilities(rows);
            assert_eq!(p.len(), rows as usize + 1);
            assert!((p.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        }
        let p = bucket_probabilities(2);
        assert_eq!(p, vec![0.25, 0.5, 0.25]);
    }

    #[test]
    fn test_fair_multipliers() {
        let table = fair_multipliers(14, 0.95);
        assert_eq!(table.len(), 15);
        // Symmetric, edges pay most
        for i in 0..table.len() {
            assert_eq!(table[i], table[table.len() - 1 - i]);
        }
        assert!(table[0] > table[7]);
        assert!((expected_return(&table) - 0.95).abs() < 0.01);
    }

    #[test]
    fn test_bucket_lookup_and_payout() {
        let board = layout_board(
            &BoardSettings {
                rows: 9,
                ..Default::default()
            },
            &BucketLayout::Direct(vec![29.0, 4.0, 1.5, 0.3, 0.2, 0.3, 1.5, 4.0, 29.0]),
        )
        .unwrap();
        assert_eq!(buckets_with_multiplier(&board, 4.0), vec![1, 7]);
        assert!(buckets_with_multiplier(&board, 7.0).is_empty());
        assert_eq!(payout(&board, 10.0, 0), Some(290.0));
        assert_eq!(payout(&board, 10.0, 42), None);
    }
}
