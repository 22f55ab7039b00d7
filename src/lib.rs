//! # mrv-base: long-read methylation calls in SQLite.
//!
//! This is a storage and query layer for visualizing CpG methylation at the level
//! of individual sequencing reads.
//! The input is a large tab-separated table of methylation calls from long-read
//! sequencing, with one call per row.
//! Scanning such a table for every query is too slow for interactive use.
//! mrv-base therefore preprocesses the table once into a set of per-chromosome
//! SQLite databases and caches them on disk, keyed by the content digest of the
//! input file.
//! As long as the queries touch only a fraction of the table (e.g. a handful of
//! regions on one chromosome), using the databases is much faster than rescanning
//! the input.
//!
//! ### Basic concepts
//!
//! Each chromosome corresponds to one database file in the cache directory.
//! A database stores the calls for that chromosome in table `Calls`, indexed by
//! CpG position and by read name.
//! The indexes are built in bulk after the full load, and the databases are
//! read-only afterwards.
//! Cache validity is decided by comparing the persisted row count of the input
//! file against a freshly computed one; the content digest only names the cache
//! directory.
//!
//! A query takes a set of closed CpG coordinate ranges for a chromosome.
//! The ranges are first normalized into a minimal sorted list of disjoint
//! intervals.
//! The query engine then resolves the reads and the CpG sites covered by the
//! ranges and assembles a read-by-site matrix of methylation states, batching
//! its range predicates so that no single SQL statement combines more than 300
//! of them.
//! Rows and trailing columns that carry no information are pruned before the
//! matrix is handed to the renderers.
//!
//! See [`CallBase`] and [`ChromosomeCalls`] for the database interface and
//! [`MatrixBuilder`] and [`MethylationMatrix`] for the query engine.
//! See [`CallCache`] and [`Fingerprint`] for cache handling.

pub mod cache;
pub mod db;
pub mod formats;
pub mod matrix;
pub mod plot;
pub mod ranges;
pub mod utils;

pub use cache::{CallCache, Fingerprint};
pub use db::{CallBase, ChromosomeCalls, MethylationCall};
pub use matrix::{CallState, MatrixBuilder, MethylationMatrix};
pub use ranges::SiteRange;
