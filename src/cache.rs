//! Content-addressed caching for preprocessed call tables.
//!
//! Preprocessing a large call table is expensive, so the per-chromosome
//! databases are cached on disk and reused across runs.
//! The cache entry for an input file is named by the SHA-256 digest of the file
//! contents, and the entry is considered valid if the persisted row count
//! matches a freshly computed one.
//! The digest itself is not re-checked at validation time.
//! This under-detects content changes that preserve the line count; the
//! behavior is intentional and documented, and it should not be changed
//! without revising the cache format.

use crate::utils;

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

#[cfg(test)]
mod tests;

//-----------------------------------------------------------------------------

/// An identifying key for one ingested call table.
///
/// The key consists of the number of lines in the file and the SHA-256 digest
/// of the file bytes.
/// Both are computed in a single streaming pass.
/// A final line without a trailing newline counts as a row.
///
/// # Examples
///
/// ```
/// use mrv_base::Fingerprint;
/// use mrv_base::utils;
///
/// let data_file = utils::get_test_data("example.tsv");
/// let fingerprint = Fingerprint::of_file(&data_file).unwrap();
/// assert_eq!(fingerprint.row_count(), 11);
/// assert_eq!(fingerprint.digest().len(), 64);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Fingerprint {
    row_count: usize,
    digest: String,
}

impl Fingerprint {
    // Read the file in chunks of this size.
    const CHUNK_SIZE: usize = 64 * 1024;

    /// Computes the fingerprint of the given file.
    ///
    /// Passes through any I/O errors.
    pub fn of_file<P: AsRef<Path>>(filename: P) -> Result<Self, String> {
        let mut file = fs::File::open(&filename).map_err(|x| x.to_string())?;
        let mut hasher = Sha256::new();
        let mut buffer = vec![0; Self::CHUNK_SIZE];
        let mut row_count = 0;
        let mut last_byte = b'\n';
        loop {
            let len = file.read(&mut buffer).map_err(|x| x.to_string())?;
            if len == 0 {
                break;
            }
            hasher.update(&buffer[..len]);
            row_count += buffer[..len].iter().filter(|&&byte| byte == b'\n').count();
            last_byte = buffer[len - 1];
        }
        if last_byte != b'\n' {
            row_count += 1;
        }
        let digest = format!("{:x}", hasher.finalize());
        Ok(Fingerprint { row_count, digest })
    }

    /// Creates a fingerprint from the raw parts.
    ///
    /// This is primarily for testing.
    #[doc(hidden)]
    pub fn from_parts(row_count: usize, digest: String) -> Self {
        Fingerprint { row_count, digest }
    }

    /// Returns the number of lines in the file, including the header line.
    #[inline]
    pub fn row_count(&self) -> usize {
        self.row_count
    }

    /// Returns the SHA-256 digest of the file as a hex string.
    #[inline]
    pub fn digest(&self) -> &str {
        &self.digest
    }
}

//-----------------------------------------------------------------------------

/// The cache directory for one ingested call table.
///
/// The cache lives at `<output_dir>/mrv_output/<digest>/` and contains two
/// subdirectories: `data/` with one database per chromosome and a metadata
/// record holding the ingested row count, and `visualization/` with the
/// generated artifacts.
/// A `CallCache` is constructed once per run and passed through the ingestion
/// and query calls; it owns no open file handles.
///
/// Note that nothing locks the cache directory.
/// Concurrent runs against the same fingerprint are unsafe.
///
/// # Examples
///
/// ```
/// use mrv_base::{CallCache, Fingerprint};
/// use mrv_base::utils;
///
/// let data_file = utils::get_test_data("example.tsv");
/// let fingerprint = Fingerprint::of_file(&data_file).unwrap();
/// let output_dir = utils::temp_dir_name("call-cache");
///
/// // A fresh cache entry is not valid until the store has been built.
/// let cache = CallCache::new(&output_dir, fingerprint);
/// assert!(!cache.is_valid());
///
/// cache.reset().unwrap();
/// cache.write_metadata().unwrap();
/// assert!(cache.is_valid());
///
/// std::fs::remove_dir_all(&output_dir).unwrap();
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallCache {
    root: PathBuf,
    fingerprint: Fingerprint,
}

impl CallCache {
    /// Name of the top-level output directory.
    pub const OUTPUT_DIR: &'static str = "mrv_output";

    /// Name of the subdirectory storing the chromosome databases.
    pub const DATA_DIR: &'static str = "data";

    /// Name of the subdirectory storing the generated artifacts.
    pub const VISUALIZATION_DIR: &'static str = "visualization";

    /// Name of the metadata record in the data directory.
    pub const METADATA_FILE: &'static str = "meta_data";

    /// File extension for the chromosome databases.
    pub const DB_EXTENSION: &'static str = "db";

    /// Creates a cache handle for the given output directory and fingerprint.
    ///
    /// This does not touch the filesystem.
    pub fn new<P: AsRef<Path>>(output_dir: P, fingerprint: Fingerprint) -> Self {
        let mut root = output_dir.as_ref().to_path_buf();
        root.push(Self::OUTPUT_DIR);
        root.push(fingerprint.digest());
        CallCache { root, fingerprint }
    }

    /// Returns the fingerprint of the ingested file.
    #[inline]
    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    /// Returns the root directory of the cache entry.
    #[inline]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the directory storing the chromosome databases.
    pub fn data_dir(&self) -> PathBuf {
        self.root.join(Self::DATA_DIR)
    }

    /// Returns the directory storing the generated artifacts.
    pub fn visualization_dir(&self) -> PathBuf {
        self.root.join(Self::VISUALIZATION_DIR)
    }

    /// Returns the name of the metadata record.
    pub fn metadata_file(&self) -> PathBuf {
        self.data_dir().join(Self::METADATA_FILE)
    }

    /// Returns the name of the database file for the given chromosome.
    pub fn db_file(&self, chromosome: &str) -> PathBuf {
        self.data_dir().join(format!("{}.{}", chromosome, Self::DB_EXTENSION))
    }

    /// Returns `true` if the cache contains a database for the given chromosome.
    pub fn has_chromosome(&self, chromosome: &str) -> bool {
        utils::file_exists(self.db_file(chromosome))
    }

    /// Returns the name of a visualization artifact for the given chromosome
    /// and displayed position interval.
    pub fn visualization_file(&self, chromosome: &str, first: u64, last: u64, extension: &str) -> PathBuf {
        self.visualization_dir().join(
            format!("{}_{}_{}_visualization.{}", chromosome, first, last, extension)
        )
    }

    /// Returns `true` if the cache entry can be reused for the fingerprinted file.
    ///
    /// The entry is valid if the metadata record exists and the persisted row
    /// count equals the row count in the fingerprint.
    /// The content digest is not re-checked; it only names the directory.
    pub fn is_valid(&self) -> bool {
        match self.read_metadata() {
            Ok(Some(row_count)) => row_count == self.fingerprint.row_count(),
            _ => false,
        }
    }

    /// Reads the persisted row count, or [`None`] if there is no metadata record.
    ///
    /// Returns an error if the record exists but cannot be parsed.
    pub fn read_metadata(&self) -> Result<Option<usize>, String> {
        let filename = self.metadata_file();
        if !utils::file_exists(&filename) {
            return Ok(None);
        }
        let contents = fs::read_to_string(&filename).map_err(|x| x.to_string())?;
        let row_count = contents.trim().parse::<usize>().map_err(
            |x| format!("Invalid metadata record {}: {}", filename.display(), x)
        )?;
        Ok(Some(row_count))
    }

    /// Persists the row count from the fingerprint as the metadata record.
    pub fn write_metadata(&self) -> Result<(), String> {
        fs::write(self.metadata_file(), format!("{}\n", self.fingerprint.row_count())).map_err(
            |x| format!("Cannot write metadata record {}: {}", self.metadata_file().display(), x)
        )
    }

    /// Replaces any previous cache entry with an empty one.
    ///
    /// Deletes the directory tree for this fingerprint if it exists, then
    /// recreates it with empty `data/` and `visualization/` subdirectories.
    ///
    /// # Errors
    ///
    /// Returns an error if a directory cannot be removed or created.
    /// The caller should treat such errors as fatal.
    pub fn reset(&self) -> Result<(), String> {
        if utils::file_exists(&self.root) {
            fs::remove_dir_all(&self.root).map_err(
                |x| format!("Cannot remove directory {}: {}", self.root.display(), x)
            )?;
        }
        for directory in [self.data_dir(), self.visualization_dir()] {
            fs::create_dir_all(&directory).map_err(
                |x| format!("Cannot create directory {}: {}", directory.display(), x)
            )?;
        }
        Ok(())
    }
}

//-----------------------------------------------------------------------------
