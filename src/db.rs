//! Per-chromosome SQLite databases storing long-read methylation calls.
//!
//! The call table is preprocessed in a single streaming pass.
//! Each chromosome gets its own database file in the cache data directory, with
//! the calls in table `Calls` and indexes on CpG position and read name.
//! The indexes are created in bulk after the full pass, which is much faster
//! than maintaining them per insert.
//! After construction the databases are opened read-only.
//!
//! See [`CallBase`] for building and opening a preprocessed store and
//! [`ChromosomeCalls`] for querying the calls of one chromosome.

use crate::cache::CallCache;
use crate::ranges::SiteRange;
use crate::utils;

use std::collections::HashMap;
use std::fs;
use std::io::BufRead;
use std::path::Path;

use rusqlite::types::Value;
use rusqlite::{Connection, OpenFlags};

#[cfg(test)]
mod tests;

//-----------------------------------------------------------------------------

/// One methylation call parsed from a row of the input table.
///
/// A row must contain at least [`MethylationCall::MIN_FIELDS`] tab-separated
/// fields.
/// The chromosome is in field 0, the CpG position in field 2, the read name in
/// field 4, and the methylation marker in field 5.
/// The call is methylated if the marker does not start with `-`.
///
/// # Examples
///
/// ```
/// use mrv_base::MethylationCall;
///
/// let row = "Y\t+\t10802025\t10802025\tread-1\t2.85\t1";
/// let call = MethylationCall::parse(row).unwrap();
/// assert_eq!(call.chromosome, "Y");
/// assert_eq!(call.position, 10802025);
/// assert_eq!(call.read_name, "read-1");
/// assert!(call.is_methylated);
///
/// let row = "Y\t-\t10802030\t10802030\tread-1\t-1.40\t1";
/// let call = MethylationCall::parse(row).unwrap();
/// assert!(!call.is_methylated);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MethylationCall {
    /// Name of the chromosome the call is on.
    pub chromosome: String,
    /// CpG site coordinate.
    pub position: u64,
    /// Identifier of the sequencing read.
    pub read_name: String,
    /// Is the site methylated on this read?
    pub is_methylated: bool,
}

impl MethylationCall {
    /// Minimum number of tab-separated fields in a data row.
    pub const MIN_FIELDS: usize = 6;

    /// Parses a call from a data row.
    ///
    /// Returns an error if the row has too few fields or the position is not
    /// an unsigned integer.
    pub fn parse(row: &str) -> Result<Self, String> {
        let fields: Vec<&str> = row.split('\t').collect();
        if fields.len() < Self::MIN_FIELDS {
            return Err(format!(
                "Data format error: at least {} tab-separated columns are required", Self::MIN_FIELDS
            ));
        }
        let position = fields[2].parse::<u64>().map_err(
            |x| format!("Invalid CpG position {}: {}", fields[2], x)
        )?;
        Ok(MethylationCall {
            chromosome: fields[0].to_string(),
            position,
            read_name: fields[4].to_string(),
            is_methylated: !fields[5].starts_with('-'),
        })
    }
}

//-----------------------------------------------------------------------------

/// A preprocessed store of methylation calls, one database per chromosome.
///
/// The store is built from the call table with [`CallBase::create`], which
/// replaces any previous cache entry for the same fingerprint.
/// A valid cache entry can be reopened with [`CallBase::open`] without
/// rescanning the call table.
/// Queries go through [`ChromosomeCalls`], created with [`CallBase::calls`].
///
/// # Examples
///
/// ```
/// use mrv_base::{CallBase, CallCache, Fingerprint};
/// use mrv_base::utils;
///
/// let data_file = utils::get_test_data("example.tsv");
/// let fingerprint = Fingerprint::of_file(&data_file).unwrap();
/// let output_dir = utils::temp_dir_name("call-base");
///
/// // Build the store.
/// let cache = CallCache::new(&output_dir, fingerprint.clone());
/// let call_base = CallBase::create(&data_file, cache).unwrap();
/// assert_eq!(call_base.chromosomes().len(), 2);
/// assert_eq!(call_base.rows(), 11);
///
/// // The cache entry is now valid and can be reopened.
/// let cache = CallCache::new(&output_dir, fingerprint);
/// assert!(cache.is_valid());
/// let reopened = CallBase::open(cache).unwrap();
/// assert_eq!(reopened.rows(), call_base.rows());
///
/// std::fs::remove_dir_all(&output_dir).unwrap();
/// ```
#[derive(Debug)]
pub struct CallBase {
    cache: CallCache,
    chromosomes: Vec<String>,
    rows: usize,
}

/// Using the store.
impl CallBase {
    /// Returns the cache entry backing this store.
    #[inline]
    pub fn cache(&self) -> &CallCache {
        &self.cache
    }

    /// Returns the names of the chromosomes in the store.
    #[inline]
    pub fn chromosomes(&self) -> &[String] {
        &self.chromosomes
    }

    /// Returns the number of rows in the ingested call table, including the header.
    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Returns a query interface for the given chromosome.
    ///
    /// Returns an error if the store has no data for the chromosome.
    pub fn calls(&self, chromosome: &str) -> Result<ChromosomeCalls, String> {
        ChromosomeCalls::open(&self.cache, chromosome)
    }

    /// Opens a valid cache entry without rescanning the call table.
    ///
    /// Returns an error if the metadata record is missing or does not match
    /// the fingerprint.
    pub fn open(cache: CallCache) -> Result<Self, String> {
        let rows = cache.read_metadata()?.ok_or_else(
            || format!("Missing metadata record in {}", cache.root().display())
        )?;
        if rows != cache.fingerprint().row_count() {
            return Err(format!(
                "Cached row count {} does not match the data file with {} rows",
                rows, cache.fingerprint().row_count()
            ));
        }

        let mut chromosomes: Vec<String> = Vec::new();
        let entries = fs::read_dir(cache.data_dir()).map_err(|x| x.to_string())?;
        for entry in entries {
            let entry = entry.map_err(|x| x.to_string())?;
            let path = entry.path();
            if path.extension().map_or(false, |x| x == CallCache::DB_EXTENSION) {
                if let Some(stem) = path.file_stem().and_then(|x| x.to_str()) {
                    chromosomes.push(stem.to_string());
                }
            }
        }
        chromosomes.sort();

        Ok(CallBase { cache, chromosomes, rows })
    }
}

/// Building the store.
impl CallBase {
    /// Builds the store from the given call table.
    ///
    /// Replaces any previous cache entry for the fingerprint in `cache`.
    /// The first line of the table is a header and is skipped.
    /// Each remaining line must parse as a [`MethylationCall`].
    ///
    /// # Errors
    ///
    /// Returns an error if a data row is malformed or a database operation
    /// fails.
    /// No usable partial store is left behind: the metadata record is only
    /// written after the full pass, so an interrupted build is a cache miss on
    /// the next run.
    pub fn create<P: AsRef<Path>>(input_file: P, cache: CallCache) -> Result<Self, String> {
        eprintln!("Preprocessing {}", input_file.as_ref().display());
        cache.reset()?;

        let mut reader = utils::open_file(&input_file)?;
        let mut connections: HashMap<String, Connection> = HashMap::new();
        let mut chromosomes: Vec<String> = Vec::new();
        let mut line_num = 0;
        let mut inserted = 0;

        let mut buf = String::new();
        loop {
            buf.clear();
            let len = reader.read_line(&mut buf).map_err(|x| x.to_string())?;
            if len == 0 {
                break;
            }
            line_num += 1;
            if line_num == 1 {
                // Header line.
                continue;
            }
            let call = MethylationCall::parse(buf.trim_end_matches(&['\n', '\r'][..])).map_err(
                |x| format!("Line {}: {}", line_num, x)
            )?;

            if !connections.contains_key(&call.chromosome) {
                let db_file = cache.db_file(&call.chromosome);
                let connection = Self::create_chromosome_db(&db_file)?;
                connections.insert(call.chromosome.clone(), connection);
                chromosomes.push(call.chromosome.clone());
            }
            let connection = connections.get(&call.chromosome).unwrap();
            let mut insert = connection.prepare_cached(
                "INSERT INTO Calls(position, read_name, is_methylated) VALUES (?1, ?2, ?3)"
            ).map_err(|x| x.to_string())?;
            insert.execute((call.position, &call.read_name, call.is_methylated))
                .map_err(|x| x.to_string())?;
            inserted += 1;
        }

        // Commit each chromosome and build the indexes in bulk.
        for chromosome in chromosomes.iter() {
            let connection = connections.get(chromosome).unwrap();
            Self::finish_chromosome_db(connection).map_err(
                |x| format!("Chromosome {}: {}", chromosome, x)
            )?;
            if let Some(size) = utils::file_size(cache.db_file(chromosome)) {
                eprintln!("Database {}: {}", chromosome, size);
            }
        }
        eprintln!("Inserted {} call records for {} chromosomes", inserted, chromosomes.len());

        cache.write_metadata()?;
        let rows = cache.fingerprint().row_count();
        Ok(CallBase { cache, chromosomes, rows })
    }

    // Creates the database for one chromosome and leaves a transaction open
    // for the inserts.
    fn create_chromosome_db(filename: &Path) -> Result<Connection, String> {
        let connection = Connection::open(filename).map_err(|x| x.to_string())?;
        connection.execute(
            "CREATE TABLE Calls (
                position INTEGER NOT NULL,
                read_name TEXT NOT NULL,
                is_methylated INTEGER NOT NULL
            ) STRICT",
            (),
        ).map_err(|x| x.to_string())?;
        connection.execute_batch("BEGIN").map_err(|x| x.to_string())?;
        Ok(connection)
    }

    // Commits the insert transaction and builds the indexes.
    fn finish_chromosome_db(connection: &Connection) -> Result<(), String> {
        connection.execute_batch("COMMIT").map_err(|x| x.to_string())?;
        connection.execute(
            "CREATE INDEX position_index ON Calls(position)", ()
        ).map_err(|x| x.to_string())?;
        connection.execute(
            "CREATE INDEX read_name_index ON Calls(read_name)", ()
        ).map_err(|x| x.to_string())?;
        Ok(())
    }
}

//-----------------------------------------------------------------------------

/// A read-only query interface to the calls of one chromosome.
///
/// The query methods take closed coordinate intervals and combine them into
/// `BETWEEN` predicates of a single SQL statement.
/// Callers are responsible for keeping the number of predicates per statement
/// within the engine limit; see [`crate::MatrixBuilder`], which windows its
/// predicate lists accordingly.
///
/// # Examples
///
/// ```
/// use mrv_base::{CallBase, CallCache, ChromosomeCalls, Fingerprint, SiteRange};
/// use mrv_base::utils;
///
/// let data_file = utils::get_test_data("example.tsv");
/// let fingerprint = Fingerprint::of_file(&data_file).unwrap();
/// let output_dir = utils::temp_dir_name("chromosome-calls");
/// let cache = CallCache::new(&output_dir, fingerprint);
/// let call_base = CallBase::create(&data_file, cache).unwrap();
///
/// let calls = call_base.calls("Y").unwrap();
/// let ranges = vec![SiteRange::new(10, 30)];
/// let reads = calls.reads_in_ranges(&ranges).unwrap();
/// assert_eq!(reads.len(), 3);
///
/// std::fs::remove_dir_all(&output_dir).unwrap();
/// ```
#[derive(Debug)]
pub struct ChromosomeCalls {
    connection: Connection,
    chromosome: String,
}

impl ChromosomeCalls {
    /// Opens a read-only connection to the calls of the given chromosome.
    ///
    /// Returns an error if the cache has no database for the chromosome.
    pub fn open(cache: &CallCache, chromosome: &str) -> Result<Self, String> {
        let db_file = cache.db_file(chromosome);
        if !utils::file_exists(&db_file) {
            return Err(format!("No call data for chromosome {}", chromosome));
        }
        let flags = OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let connection = Connection::open_with_flags(&db_file, flags).map_err(|x| x.to_string())?;
        Ok(ChromosomeCalls { connection, chromosome: chromosome.to_string() })
    }

    /// Returns the name of the chromosome.
    #[inline]
    pub fn chromosome(&self) -> &str {
        &self.chromosome
    }

    // `position BETWEEN ? AND ?` for each range, joined with OR.
    fn range_predicates(ranges: &[SiteRange]) -> String {
        let mut clause = String::new();
        for i in 0..ranges.len() {
            if i > 0 {
                clause.push_str(" OR ");
            }
            clause.push_str("position BETWEEN ? AND ?");
        }
        clause
    }

    fn push_range_params(params: &mut Vec<Value>, ranges: &[SiteRange]) {
        for range in ranges.iter() {
            params.push(Value::Integer(range.start as i64));
            params.push(Value::Integer(range.end as i64));
        }
    }

    /// Returns the distinct reads with at least one call in the given ranges,
    /// with the smallest in-range call position of each read.
    ///
    /// The result is in an unspecified order.
    /// This executes a single statement; the caller must keep the number of
    /// ranges within the engine limit.
    pub fn reads_in_ranges(&self, ranges: &[SiteRange]) -> Result<Vec<(String, u64)>, String> {
        if ranges.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT read_name, MIN(position) FROM Calls WHERE {} GROUP BY read_name",
            Self::range_predicates(ranges)
        );
        let mut params: Vec<Value> = Vec::new();
        Self::push_range_params(&mut params, ranges);

        let mut statement = self.connection.prepare(&sql).map_err(|x| x.to_string())?;
        let mut rows = statement.query(rusqlite::params_from_iter(params)).map_err(|x| x.to_string())?;
        let mut result: Vec<(String, u64)> = Vec::new();
        while let Some(row) = rows.next().map_err(|x| x.to_string())? {
            let read_name: String = row.get(0).map_err(|x| x.to_string())?;
            let first: u64 = row.get(1).map_err(|x| x.to_string())?;
            result.push((read_name, first));
        }
        Ok(result)
    }

    /// Returns the distinct in-range call positions among the given reads.
    ///
    /// The result is in an unspecified order.
    /// This executes a single statement; the caller must keep the number of
    /// reads within the engine limit.
    pub fn positions_for_reads(&self, reads: &[&str], ranges: &[SiteRange]) -> Result<Vec<u64>, String> {
        if reads.is_empty() || ranges.is_empty() {
            return Ok(Vec::new());
        }
        let mut name_predicates = String::new();
        for i in 0..reads.len() {
            if i > 0 {
                name_predicates.push_str(", ");
            }
            name_predicates.push('?');
        }
        let sql = format!(
            "SELECT DISTINCT position FROM Calls WHERE read_name IN ({}) AND ({})",
            name_predicates, Self::range_predicates(ranges)
        );
        let mut params: Vec<Value> = Vec::new();
        for read_name in reads.iter() {
            params.push(Value::Text(read_name.to_string()));
        }
        Self::push_range_params(&mut params, ranges);

        let mut statement = self.connection.prepare(&sql).map_err(|x| x.to_string())?;
        let mut rows = statement.query(rusqlite::params_from_iter(params)).map_err(|x| x.to_string())?;
        let mut result: Vec<u64> = Vec::new();
        while let Some(row) = rows.next().map_err(|x| x.to_string())? {
            let position: u64 = row.get(0).map_err(|x| x.to_string())?;
            result.push(position);
        }
        Ok(result)
    }

    /// Returns the distinct `(position, is_methylated)` pairs for one read
    /// within the given ranges, in ascending position order.
    pub fn calls_for_read(&self, read_name: &str, ranges: &[SiteRange]) -> Result<Vec<(u64, bool)>, String> {
        if ranges.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT DISTINCT position, is_methylated FROM Calls
            WHERE read_name = ? AND ({})
            ORDER BY position",
            Self::range_predicates(ranges)
        );
        let mut params: Vec<Value> = vec![Value::Text(read_name.to_string())];
        Self::push_range_params(&mut params, ranges);

        let mut statement = self.connection.prepare(&sql).map_err(|x| x.to_string())?;
        let mut rows = statement.query(rusqlite::params_from_iter(params)).map_err(|x| x.to_string())?;
        let mut result: Vec<(u64, bool)> = Vec::new();
        while let Some(row) = rows.next().map_err(|x| x.to_string())? {
            let position: u64 = row.get(0).map_err(|x| x.to_string())?;
            let is_methylated: bool = row.get(1).map_err(|x| x.to_string())?;
            result.push((position, is_methylated));
        }
        Ok(result)
    }
}

//-----------------------------------------------------------------------------
