//! Read-by-site methylation matrices assembled from range queries.
//!
//! A matrix has one row per selected read and one column per CpG site observed
//! in the requested ranges.
//! The underlying engine has a practical limit on how many predicates can be
//! combined into a single statement, so the queries are issued in windows of at
//! most [`MatrixBuilder::MAX_PREDICATES`] predicates, with the partial results
//! merged in memory.
//! The final result does not depend on the window size.
//!
//! See [`MatrixBuilder`] for assembly and [`MethylationMatrix`] for the
//! resulting matrix and its pruning operations.

use crate::db::ChromosomeCalls;
use crate::ranges::SiteRange;

use std::collections::{BTreeSet, HashMap};
use std::fmt::Display;


//-----------------------------------------------------------------------------

/// Methylation state of one read at one CpG site.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CallState {
    /// The read has no call at the site.
    NoCall,
    /// The read is unmethylated at the site.
    Unmethylated,
    /// The read is methylated at the site.
    Methylated,
}

impl CallState {
    /// Creates a call state from the methylation flag of a call.
    #[inline]
    pub fn from_flag(is_methylated: bool) -> Self {
        if is_methylated { CallState::Methylated } else { CallState::Unmethylated }
    }

    /// Returns `true` if the state is an actual call.
    #[inline]
    pub fn is_call(&self) -> bool {
        *self != CallState::NoCall
    }

    /// Returns the symbol used for the state in the text alignment.
    #[inline]
    pub fn symbol(&self) -> char {
        match self {
            CallState::NoCall => ' ',
            CallState::Unmethylated => '0',
            CallState::Methylated => '1',
        }
    }
}

impl Display for CallState {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            CallState::NoCall => write!(f, "no call"),
            CallState::Unmethylated => write!(f, "unmethylated"),
            CallState::Methylated => write!(f, "methylated"),
        }
    }
}

//-----------------------------------------------------------------------------

/// A read-by-site matrix of methylation states for one chromosome.
///
/// Rows correspond to reads, ordered by the position of each read's first
/// in-range call, with ties broken by read name.
/// Columns correspond to the distinct in-range CpG positions, in ascending
/// order.
/// A cell is an actual call only if the read has a call at that position.
///
/// The matrix is created by [`MatrixBuilder`] and discarded after rendering;
/// it is never persisted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MethylationMatrix {
    reads: Vec<String>,
    positions: Vec<u64>,
    cells: Vec<Vec<CallState>>,
}

impl MethylationMatrix {
    /// Creates a matrix from the raw parts.
    ///
    /// This is primarily for testing.
    ///
    /// # Panics
    ///
    /// Panics if the dimensions of `cells` do not match the labels.
    #[doc(hidden)]
    pub fn from_parts(reads: Vec<String>, positions: Vec<u64>, cells: Vec<Vec<CallState>>) -> Self {
        assert_eq!(cells.len(), reads.len(), "Matrix has {} rows for {} reads", cells.len(), reads.len());
        for row in cells.iter() {
            assert_eq!(
                row.len(), positions.len(),
                "Matrix row has {} cells for {} positions", row.len(), positions.len()
            );
        }
        MethylationMatrix { reads, positions, cells }
    }

    /// Returns the read names labeling the rows.
    #[inline]
    pub fn reads(&self) -> &[String] {
        &self.reads
    }

    /// Returns the CpG positions labeling the columns.
    #[inline]
    pub fn positions(&self) -> &[u64] {
        &self.positions
    }

    /// Returns the state of the cell in row `i`, column `j`.
    #[inline]
    pub fn cell(&self, i: usize, j: usize) -> CallState {
        self.cells[i][j]
    }

    /// Returns row `i` of the matrix.
    #[inline]
    pub fn row(&self, i: usize) -> &[CallState] {
        &self.cells[i]
    }

    /// Returns `true` if the matrix has no rows or no columns.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.reads.is_empty() || self.positions.is_empty()
    }

    /// Returns `true` if any cell of the matrix is an actual call.
    pub fn has_information(&self) -> bool {
        self.cells.iter().any(|row| row.iter().any(|cell| cell.is_call()))
    }

    // A row is degenerate if its calls consist of exactly one methylated cell
    // or exactly one unmethylated cell.
    fn is_degenerate(row: &[CallState]) -> bool {
        let methylated = row.iter().filter(|cell| **cell == CallState::Methylated).count();
        let unmethylated = row.iter().filter(|cell| **cell == CallState::Unmethylated).count();
        (methylated == 1 && unmethylated == 0) || (unmethylated == 1 && methylated == 0)
    }

    /// Removes the rows that carry no adjacency information.
    ///
    /// A row with a single call does not relate any two sites, so it is
    /// removed together with its read label.
    /// The operation is idempotent.
    pub fn prune_degenerate_rows(&mut self) {
        let mut i = 0;
        while i < self.cells.len() {
            if Self::is_degenerate(&self.cells[i]) {
                self.cells.remove(i);
                self.reads.remove(i);
            } else {
                i += 1;
            }
        }
    }

    /// Removes the trailing columns in which no remaining row has a call.
    ///
    /// Columns are scanned from right to left, and the scan stops permanently
    /// at the first column with a call.
    /// Interior columns are never removed, even if they are empty.
    pub fn trim_trailing_columns(&mut self) {
        while let Some(last) = self.positions.len().checked_sub(1) {
            if self.cells.iter().any(|row| row[last].is_call()) {
                break;
            }
            self.positions.pop();
            for row in self.cells.iter_mut() {
                row.pop();
            }
        }
    }
}

//-----------------------------------------------------------------------------

/// Assembles a [`MethylationMatrix`] from the calls of one chromosome.
///
/// The builder resolves the read set and the position set with queries
/// windowed to at most [`MatrixBuilder::MAX_PREDICATES`] predicates each,
/// accumulates the partial results, and fills the matrix with one monotonic
/// merge per read.
/// The resolved sets are the same as an unbounded single query would produce,
/// regardless of the window size.
///
/// # Examples
///
/// ```
/// use mrv_base::{CallBase, CallCache, Fingerprint, MatrixBuilder, SiteRange};
/// use mrv_base::utils;
///
/// let data_file = utils::get_test_data("example.tsv");
/// let fingerprint = Fingerprint::of_file(&data_file).unwrap();
/// let output_dir = utils::temp_dir_name("matrix-builder");
/// let cache = CallCache::new(&output_dir, fingerprint);
/// let call_base = CallBase::create(&data_file, cache).unwrap();
///
/// // Reads read_a and read_b share sites 10 and 20; read_c has a single call
/// // and is pruned as degenerate.
/// let calls = call_base.calls("Y").unwrap();
/// let ranges = vec![SiteRange::new(10, 30)];
/// let builder = MatrixBuilder::new(&calls, &ranges);
/// let matrix = builder.build().unwrap().unwrap();
/// assert_eq!(matrix.reads(), &["read_a".to_string(), "read_b".to_string()]);
/// assert_eq!(matrix.positions(), &[10, 20, 30]);
///
/// std::fs::remove_dir_all(&output_dir).unwrap();
/// ```
#[derive(Debug)]
pub struct MatrixBuilder<'a> {
    calls: &'a ChromosomeCalls,
    ranges: &'a [SiteRange],
    window_size: usize,
}

impl<'a> MatrixBuilder<'a> {
    /// Maximum number of predicates combined into a single query.
    pub const MAX_PREDICATES: usize = 300;

    /// Creates a builder for the given chromosome and normalized ranges.
    pub fn new(calls: &'a ChromosomeCalls, ranges: &'a [SiteRange]) -> Self {
        MatrixBuilder { calls, ranges, window_size: Self::MAX_PREDICATES }
    }

    /// Returns an updated builder with the given query window size.
    ///
    /// The result of a build does not depend on the window size.
    /// This is primarily for testing.
    ///
    /// # Panics
    ///
    /// Panics if `window_size` is zero.
    #[doc(hidden)]
    pub fn with_window_size(self, window_size: usize) -> Self {
        assert!(window_size > 0, "The query window size must be nonzero");
        MatrixBuilder { window_size, ..self }
    }

    /// Resolves the reads with at least one call in the ranges.
    ///
    /// Returns `(read name, first in-range call position)` pairs, ordered by
    /// the first position with ties broken by read name.
    pub fn resolve_reads(&self) -> Result<Vec<(String, u64)>, String> {
        // The scratch accumulator keeps the smallest first position seen for
        // each read across the windows.
        let mut first_positions: HashMap<String, u64> = HashMap::new();
        for window in self.ranges.chunks(self.window_size) {
            for (read_name, first) in self.calls.reads_in_ranges(window)? {
                let entry = first_positions.entry(read_name).or_insert(first);
                if first < *entry {
                    *entry = first;
                }
            }
        }

        let mut result: Vec<(String, u64)> = first_positions.into_iter().collect();
        result.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
        Ok(result)
    }

    /// Resolves the distinct in-range call positions among the given reads,
    /// in ascending order.
    pub fn resolve_positions(&self, reads: &[(String, u64)]) -> Result<Vec<u64>, String> {
        let mut positions: BTreeSet<u64> = BTreeSet::new();
        for window in reads.chunks(self.window_size) {
            let names: Vec<&str> = window.iter().map(|(name, _)| name.as_str()).collect();
            for position in self.calls.positions_for_reads(&names, self.ranges)? {
                positions.insert(position);
            }
        }
        Ok(positions.into_iter().collect())
    }

    /// Assembles the full matrix, without pruning.
    ///
    /// Each row is filled with a monotonic merge of the read's call stream
    /// against the column positions, starting at the column of the read's
    /// first in-range call.
    /// A call at a position the cursor has already passed is skipped silently,
    /// so the result matches cell-by-cell lookup semantics.
    pub fn assemble(&self) -> Result<MethylationMatrix, String> {
        let reads = self.resolve_reads()?;
        let positions = self.resolve_positions(&reads)?;

        let mut cells = vec![vec![CallState::NoCall; positions.len()]; reads.len()];
        for (i, (read_name, first)) in reads.iter().enumerate() {
            let mut j = match positions.binary_search(first) {
                Ok(index) => index,
                Err(index) => index,
            };
            for (position, is_methylated) in self.calls.calls_for_read(read_name, self.ranges)? {
                while j < positions.len() && positions[j] < position {
                    j += 1;
                }
                if j < positions.len() && positions[j] == position {
                    cells[i][j] = CallState::from_flag(is_methylated);
                    j += 1;
                }
            }
        }

        let reads = reads.into_iter().map(|(name, _)| name).collect();
        Ok(MethylationMatrix { reads, positions, cells })
    }

    /// Assembles and prunes the matrix.
    ///
    /// Returns [`None`] if no read has a call in the ranges or if nothing
    /// informative remains after pruning.
    pub fn build(&self) -> Result<Option<MethylationMatrix>, String> {
        let mut matrix = self.assemble()?;
        if matrix.is_empty() {
            return Ok(None);
        }
        matrix.prune_degenerate_rows();
        matrix.trim_trailing_columns();
        if !matrix.has_information() {
            return Ok(None);
        }
        Ok(Some(matrix))
    }
}

//-----------------------------------------------------------------------------
