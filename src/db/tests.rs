use super::*;

use crate::cache::Fingerprint;

use std::path::PathBuf;

//-----------------------------------------------------------------------------

const HEADER: &str = "chromosome\tstrand\tstart\tend\tread_name\tlog_lik_ratio\tnum_motifs";

fn write_call_table(name_part: &str, rows: &[&str]) -> (PathBuf, PathBuf) {
    let dir = utils::temp_dir_name(name_part);
    fs::create_dir_all(&dir).unwrap();
    let input = dir.join("calls.tsv");
    let mut contents = String::from(HEADER);
    contents.push('\n');
    for row in rows.iter() {
        contents.push_str(row);
        contents.push('\n');
    }
    fs::write(&input, contents).unwrap();
    (dir, input)
}

fn create_call_base(dir: &Path, input: &Path) -> CallBase {
    let fingerprint = Fingerprint::of_file(input);
    assert!(fingerprint.is_ok(), "Failed to fingerprint the input: {}", fingerprint.unwrap_err());
    let cache = CallCache::new(dir, fingerprint.unwrap());
    let call_base = CallBase::create(input, cache);
    assert!(call_base.is_ok(), "Failed to create the store: {}", call_base.unwrap_err());
    call_base.unwrap()
}

fn open_calls(call_base: &CallBase, chromosome: &str) -> ChromosomeCalls {
    let calls = call_base.calls(chromosome);
    assert!(
        calls.is_ok(),
        "Failed to open the calls for chromosome {}: {}", chromosome, calls.unwrap_err()
    );
    calls.unwrap()
}

fn test_rows() -> Vec<&'static str> {
    vec![
        "Y\t+\t10\t10\tread_a\t2.85\t1",
        "Y\t+\t20\t20\tread_a\t1.12\t1",
        "Y\t+\t30\t30\tread_a\t-0.45\t1",
        "Y\t+\t10\t10\tread_b\t1.77\t1",
        "Y\t+\t45\t45\tread_b\t0.91\t1",
        "KI270580.1\t+\t1154\t1154\tread_c\t2.05\t1",
    ]
}

//-----------------------------------------------------------------------------

#[test]
fn parse_call() {
    let call = MethylationCall::parse("Y\t+\t10802025\t10802025\tread-1\t2.85\t1");
    assert!(call.is_ok(), "Failed to parse a valid row: {}", call.unwrap_err());
    let call = call.unwrap();
    assert_eq!(call.chromosome, "Y", "Wrong chromosome");
    assert_eq!(call.position, 10802025, "Wrong position");
    assert_eq!(call.read_name, "read-1", "Wrong read name");
    assert!(call.is_methylated, "A positive marker did not give a methylated call");

    // Methylated iff the marker does not start with a minus sign.
    let call = MethylationCall::parse("Y\t+\t10\t10\tread-1\t-1.40\t1").unwrap();
    assert!(!call.is_methylated, "A negative marker gave a methylated call");

    // Exactly six fields are enough.
    let call = MethylationCall::parse("Y\t+\t10\t10\tread-1\t2.85");
    assert!(call.is_ok(), "Failed to parse a six-field row: {}", call.unwrap_err());
}

#[test]
fn parse_invalid_call() {
    let call = MethylationCall::parse("Y\t+\t10\t10\tread-1");
    assert!(call.is_err(), "Parsed a row with too few fields");

    let call = MethylationCall::parse("Y\t+\tten\t10\tread-1\t2.85\t1");
    assert!(call.is_err(), "Parsed a row with a non-integer position");
}

//-----------------------------------------------------------------------------

#[test]
fn create_store() {
    let (dir, input) = write_call_table("create-store", &test_rows());
    let call_base = create_call_base(&dir, &input);

    assert_eq!(call_base.rows(), 7, "Wrong number of ingested rows");
    assert_eq!(
        call_base.chromosomes(), &["Y".to_string(), "KI270580.1".to_string()],
        "Wrong chromosomes in discovery order"
    );
    assert!(call_base.cache().is_valid(), "The cache entry is not valid after the build");
    assert!(call_base.cache().has_chromosome("Y"), "Missing database for chromosome Y");
    assert!(!call_base.cache().has_chromosome("X"), "Found a database for an absent chromosome");

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn reopen_store() {
    let (dir, input) = write_call_table("reopen-store", &test_rows());
    let call_base = create_call_base(&dir, &input);
    drop(call_base);

    let cache = CallCache::new(&dir, Fingerprint::of_file(&input).unwrap());
    assert!(cache.is_valid(), "The cache entry is not valid on the second run");
    let reopened = CallBase::open(cache);
    assert!(reopened.is_ok(), "Failed to reopen the store: {}", reopened.unwrap_err());
    let reopened = reopened.unwrap();
    assert_eq!(reopened.rows(), 7, "Wrong row count after reopening");
    assert_eq!(
        reopened.chromosomes(), &["KI270580.1".to_string(), "Y".to_string()],
        "Wrong chromosomes after reopening"
    );

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn rebuild_on_changed_row_count() {
    let (dir, input) = write_call_table("rebuild-store", &test_rows());
    let call_base = create_call_base(&dir, &input);
    drop(call_base);

    // Appending a line changes the fingerprint, so the old entry is not reused.
    let mut contents = fs::read_to_string(&input).unwrap();
    contents.push_str("Y\t+\t50\t50\tread_d\t1.00\t1\n");
    fs::write(&input, contents).unwrap();
    let cache = CallCache::new(&dir, Fingerprint::of_file(&input).unwrap());
    assert!(!cache.is_valid(), "A stale cache entry is valid after the input changed");

    let rebuilt = CallBase::create(&input, cache);
    assert!(rebuilt.is_ok(), "Failed to rebuild the store: {}", rebuilt.unwrap_err());
    assert_eq!(rebuilt.unwrap().rows(), 8, "Wrong row count after the rebuild");

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn malformed_row_is_fatal() {
    let (dir, input) = write_call_table("malformed-store", &[
        "Y\t+\t10\t10\tread_a\t2.85\t1",
        "Y\t+\t20\t20",
    ]);
    let fingerprint = Fingerprint::of_file(&input).unwrap();
    let cache = CallCache::new(&dir, fingerprint.clone());
    let result = CallBase::create(&input, cache);
    assert!(result.is_err(), "Built a store from a malformed call table");

    // No usable partial store is left behind.
    let cache = CallCache::new(&dir, fingerprint);
    assert!(!cache.is_valid(), "A failed build left a valid cache entry");

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn header_is_skipped() {
    // The header line is not validated as a data row.
    let dir = utils::temp_dir_name("header-store");
    fs::create_dir_all(&dir).unwrap();
    let input = dir.join("calls.tsv");
    fs::write(&input, "header\nY\t+\t10\t10\tread_a\t2.85\t1\n").unwrap();

    let call_base = create_call_base(&dir, &input);
    assert_eq!(call_base.rows(), 2, "Wrong number of ingested rows");
    assert_eq!(call_base.chromosomes(), &["Y".to_string()], "Wrong chromosomes");

    let _ = fs::remove_dir_all(&dir);
}

//-----------------------------------------------------------------------------

#[test]
fn reads_in_ranges() {
    let (dir, input) = write_call_table("query-reads", &test_rows());
    let call_base = create_call_base(&dir, &input);
    let calls = open_calls(&call_base, "Y");

    let ranges = vec![SiteRange::new(10, 30)];
    let mut reads = calls.reads_in_ranges(&ranges).unwrap();
    reads.sort();
    assert_eq!(
        reads,
        vec![(String::from("read_a"), 10), (String::from("read_b"), 10)],
        "Wrong reads for a single range"
    );

    // Each read reports its smallest position within the queried ranges.
    let ranges = vec![SiteRange::new(20, 30), SiteRange::new(40, 50)];
    let mut reads = calls.reads_in_ranges(&ranges).unwrap();
    reads.sort();
    assert_eq!(
        reads,
        vec![(String::from("read_a"), 20), (String::from("read_b"), 45)],
        "Wrong reads for multiple ranges"
    );

    let ranges = vec![SiteRange::new(1000, 2000)];
    assert!(calls.reads_in_ranges(&ranges).unwrap().is_empty(), "Found reads outside the data");
    assert!(calls.reads_in_ranges(&[]).unwrap().is_empty(), "Found reads without ranges");

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn positions_for_reads() {
    let (dir, input) = write_call_table("query-positions", &test_rows());
    let call_base = create_call_base(&dir, &input);
    let calls = open_calls(&call_base, "Y");

    let ranges = vec![SiteRange::new(10, 45)];
    let mut positions = calls.positions_for_reads(&["read_a", "read_b"], &ranges).unwrap();
    positions.sort();
    assert_eq!(positions, vec![10, 20, 30, 45], "Wrong positions for both reads");

    let mut positions = calls.positions_for_reads(&["read_b"], &ranges).unwrap();
    positions.sort();
    assert_eq!(positions, vec![10, 45], "Wrong positions for one read");

    assert!(
        calls.positions_for_reads(&[], &ranges).unwrap().is_empty(),
        "Found positions without reads"
    );

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn calls_for_read() {
    let (dir, input) = write_call_table("query-calls", &test_rows());
    let call_base = create_call_base(&dir, &input);
    let calls = open_calls(&call_base, "Y");

    let ranges = vec![SiteRange::new(10, 45)];
    let result = calls.calls_for_read("read_a", &ranges).unwrap();
    assert_eq!(
        result,
        vec![(10, true), (20, true), (30, false)],
        "Wrong calls for read_a"
    );

    let ranges = vec![SiteRange::new(15, 25), SiteRange::new(40, 50)];
    let result = calls.calls_for_read("read_b", &ranges).unwrap();
    assert_eq!(result, vec![(45, true)], "Wrong calls for read_b with multiple ranges");

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn missing_chromosome() {
    let (dir, input) = write_call_table("missing-chromosome", &test_rows());
    let call_base = create_call_base(&dir, &input);

    let calls = call_base.calls("X");
    assert!(calls.is_err(), "Opened a query interface for an absent chromosome");

    let _ = fs::remove_dir_all(&dir);
}

//-----------------------------------------------------------------------------
