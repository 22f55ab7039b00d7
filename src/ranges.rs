//! Closed intervals of CpG coordinates and their normalization.
//!
//! Requested ranges may overlap, touch, or duplicate each other.
//! Before querying, the ranges for each chromosome are normalized into the
//! minimal sorted list of disjoint closed intervals covering the same set of
//! integer coordinates.
//! The normalization is a direct sort-and-sweep union; see [`merge_ranges`].

use crate::cache::CallCache;

use std::fmt::Display;


//-----------------------------------------------------------------------------

/// A closed interval `[start, end]` of CpG site coordinates.
///
/// The endpoints are integer genomic coordinates with `start < end`, which is
/// enforced by input validation before a range reaches this module.
///
/// # Examples
///
/// ```
/// use mrv_base::SiteRange;
///
/// let range = SiteRange::new(100, 200);
/// assert!(range.contains(100));
/// assert!(range.contains(200));
/// assert!(!range.contains(201));
/// assert_eq!(range.to_string(), "[100, 200]");
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SiteRange {
    /// First coordinate in the interval.
    pub start: u64,
    /// Last coordinate in the interval.
    pub end: u64,
}

impl SiteRange {
    /// Creates a new closed interval `[start, end]`.
    pub fn new(start: u64, end: u64) -> Self {
        SiteRange { start, end }
    }

    /// Returns `true` if the interval contains the given coordinate.
    #[inline]
    pub fn contains(&self, position: u64) -> bool {
        self.start <= position && position <= self.end
    }
}

impl Display for SiteRange {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "[{}, {}]", self.start, self.end)
    }
}

//-----------------------------------------------------------------------------

/// Merges the given closed intervals into the minimal sorted list of disjoint
/// intervals covering the same integer coordinates.
///
/// Overlapping, touching, and adjacent intervals merge; `[1, 5]` and `[6, 9]`
/// cover the contiguous coordinates `1..=9` and become `[1, 9]`.
/// The operation is idempotent.
///
/// # Examples
///
/// ```
/// use mrv_base::SiteRange;
/// use mrv_base::ranges::merge_ranges;
///
/// let ranges = vec![SiteRange::new(150, 250), SiteRange::new(100, 200)];
/// assert_eq!(merge_ranges(&ranges), vec![SiteRange::new(100, 250)]);
/// ```
pub fn merge_ranges(ranges: &[SiteRange]) -> Vec<SiteRange> {
    let mut sorted = ranges.to_vec();
    sorted.sort();

    let mut result: Vec<SiteRange> = Vec::new();
    for range in sorted {
        match result.last_mut() {
            // Closed integer intervals also merge when they are adjacent.
            Some(last) if range.start <= last.end.saturating_add(1) => {
                if range.end > last.end {
                    last.end = range.end;
                }
            },
            _ => result.push(range),
        }
    }
    result
}

/// Normalizes the requested ranges for each chromosome against the cache.
///
/// Returns `(chromosome, merged ranges)` pairs in the order of the requests.
/// A chromosome with an empty range list is skipped silently.
/// A chromosome without a database in the cache is skipped with a diagnostic
/// message; it does not abort the run.
pub fn normalize_requests(
    cache: &CallCache,
    requests: &[(String, Vec<SiteRange>)]
) -> Vec<(String, Vec<SiteRange>)> {
    let mut result: Vec<(String, Vec<SiteRange>)> = Vec::new();
    for (chromosome, ranges) in requests.iter() {
        if ranges.is_empty() {
            continue;
        }
        if !cache.has_chromosome(chromosome) {
            eprintln!("The data of chromosome {} does not exist in the data file", chromosome);
            continue;
        }
        result.push((chromosome.clone(), merge_ranges(ranges)));
    }
    result
}

//-----------------------------------------------------------------------------
