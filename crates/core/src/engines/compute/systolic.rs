//! The systolic array grid: PE mesh, edge injection, and wavefront
//! propagation.
//!
//! The array itself knows nothing about matrices, addresses, or memory; it
//! only knows how to receive edge-injected operands and propagate them one
//! step per tick. [`ComputeFabric`](super::fabric::ComputeFabric) is
//! responsible for fetching A/B elements from L1 and feeding them in at the
//! right tick.

use super::pe::ProcessingElement;

/// Default systolic array row count, matching the reference hardware.
pub const DEFAULT_ROWS: usize = 16;
/// Default systolic array column count, matching the reference hardware.
pub const DEFAULT_COLS: usize = 16;

/// A fixed `rows x cols` grid of Processing Elements.
#[derive(Clone, Debug)]
pub struct SystolicArray {
    rows: usize,
    cols: usize,
    pes: Vec<Vec<ProcessingElement>>,
}

impl SystolicArray {
    /// Creates a new array of the given dimensions, all PEs zeroed.
    #[must_use]
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            pes: vec![vec![ProcessingElement::new(); cols]; rows],
        }
    }

    /// Row count of the grid.
    #[must_use]
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Column count of the grid.
    #[must_use]
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Total number of PEs in the grid.
    #[must_use]
    pub fn total_pes(&self) -> usize {
        self.rows * self.cols
    }

    /// Zeroes every PE, ready for a new matmul.
    pub fn reset(&mut self) {
        for row in &mut self.pes {
            for pe in row {
                pe.reset();
            }
        }
    }

    /// Injects a new `A` operand at the left edge of `row` (`PE(row, 0)`).
    ///
    /// No-op if `row` is out of bounds, so callers don't need to bounds-check
    /// against partial-tile `m < rows`.
    pub fn inject_a(&mut self, row: usize, value: f64) {
        if let Some(pe) = self.pes.get_mut(row).and_then(|r| r.get_mut(0)) {
            pe.set_a_input(value);
        }
    }

    /// Injects a new `B` operand at the top edge of `col` (`PE(0, col)`).
    ///
    /// No-op if `col` is out of bounds, so callers don't need to bounds-check
    /// against partial-tile `n < cols`.
    pub fn inject_b(&mut self, col: usize, value: f64) {
        if let Some(pe) = self.pes[0].get_mut(col) {
            pe.set_b_input(value);
        }
    }

    /// Advances the grid by one tick: propagates last tick's outputs to
    /// interior neighbors, then fires every PE's multiply-accumulate.
    ///
    /// Must be called after this tick's edge injections (`inject_a`/
    /// `inject_b`) and before reading any PE's accumulator for this tick.
    pub fn advance(&mut self) {
        for row in &mut self.pes {
            for j in (1..self.cols).rev() {
                let a = row[j - 1].a_output();
                row[j].set_a_input(a);
            }
        }
        for j in 0..self.cols {
            for i in (1..self.rows).rev() {
                let b = self.pes[i - 1][j].b_output();
                self.pes[i][j].set_b_input(b);
            }
        }
        for row in &mut self.pes {
            for pe in row {
                pe.cycle();
            }
        }
    }

    /// Reads the accumulator at `(row, col)`.
    #[must_use]
    pub fn accumulator(&self, row: usize, col: usize) -> f64 {
        self.pes[row][col].accumulator()
    }
}

/// Number of ticks an `m x n x k` output-stationary matmul occupies the
/// array: the wavefront reaches `PE(m-1, n-1)` carrying the last `k`
/// reduction term at tick `m + n + k - 3` (0-indexed), for a total span of
/// `m + n + k - 2` ticks.
#[must_use]
pub fn total_cycles(m: u32, n: u32, k: u32) -> u64 {
    u64::from(m) + u64::from(n) + u64::from(k) - 2
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_element_matmul_completes_in_one_tick() {
        assert_eq!(total_cycles(1, 1, 1), 1);
        let mut array = SystolicArray::new(1, 1);
        array.inject_a(0, 3.0);
        array.inject_b(0, 4.0);
        array.advance();
        assert_eq!(array.accumulator(0, 0), 12.0);
    }

    #[test]
    fn full_array_single_reduction_step_hits_every_pe_once() {
        let rows = 4;
        let cols = 3;
        assert_eq!(total_cycles(rows as u32, cols as u32, 1), (rows + cols - 1) as u64);
        let mut array = SystolicArray::new(rows, cols);
        let ticks = total_cycles(rows as u32, cols as u32, 1);
        for t in 0..ticks {
            for i in 0..rows {
                if t == i as u64 {
                    array.inject_a(i, 1.0);
                }
            }
            for j in 0..cols {
                if t == j as u64 {
                    array.inject_b(j, 2.0);
                }
            }
            array.advance();
        }
        for i in 0..rows {
            for j in 0..cols {
                assert_eq!(array.accumulator(i, j), 2.0, "PE({i},{j}) should have exactly one multiply");
            }
        }
    }

    #[test]
    fn two_by_two_matmul_matches_reference() {
        // A = [[1,2],[3,4]], B = [[5,6],[7,8]] -> C = [[19,22],[43,50]]
        let a = [[1.0, 2.0], [3.0, 4.0]];
        let b = [[5.0, 6.0], [7.0, 8.0]];
        let (m, n, k) = (2usize, 2usize, 2usize);
        let mut array = SystolicArray::new(m, n);
        let ticks = total_cycles(m as u32, n as u32, k as u32);
        for t in 0..ticks {
            for i in 0..m {
                let kk = t as i64 - i as i64;
                if kk >= 0 && (kk as usize) < k {
                    array.inject_a(i, a[i][kk as usize]);
                }
            }
            for j in 0..n {
                let kk = t as i64 - j as i64;
                if kk >= 0 && (kk as usize) < k {
                    array.inject_b(j, b[kk as usize][j]);
                }
            }
            array.advance();
        }
        assert_eq!(array.accumulator(0, 0), 19.0);
        assert_eq!(array.accumulator(0, 1), 22.0);
        assert_eq!(array.accumulator(1, 0), 43.0);
        assert_eq!(array.accumulator(1, 1), 50.0);
    }
}
