use super::*;

use crate::matrix::CallState;

//-----------------------------------------------------------------------------

fn parse_str(contents: &str) -> Result<Vec<(String, Vec<SiteRange>)>, String> {
    parse_range_file(&mut contents.as_bytes())
}

fn parsed(contents: &str) -> Vec<(String, Vec<SiteRange>)> {
    let result = parse_str(contents);
    assert!(result.is_ok(), "Failed to parse the range list: {}", result.unwrap_err());
    result.unwrap()
}

//-----------------------------------------------------------------------------

#[test]
fn parse_range_list() {
    let contents = "[Y]\n5431,9587\n15680,17506\n12003,12210\n80,3327\n\n[KI270580.1]\n1154,1669\n756,1321\n800,1154\n";
    let requests = parsed(contents);
    assert_eq!(requests.len(), 2, "Wrong number of chromosomes");
    assert_eq!(requests[0].0, "Y", "Wrong first chromosome");
    assert_eq!(
        requests[0].1,
        vec![
            SiteRange::new(5431, 9587),
            SiteRange::new(15680, 17506),
            SiteRange::new(12003, 12210),
            SiteRange::new(80, 3327),
        ],
        "Wrong ranges for the first chromosome"
    );
    assert_eq!(requests[1].0, "KI270580.1", "Wrong second chromosome");
    assert_eq!(requests[1].1.len(), 3, "Wrong number of ranges for the second chromosome");
}

#[test]
fn parse_details() {
    // Comments and surrounding whitespace are ignored.
    let requests = parsed("# comment\n[Y]\n  10,20  \n; another comment\n");
    assert_eq!(requests, vec![(String::from("Y"), vec![SiteRange::new(10, 20)])]);

    // Reversed endpoints are swapped.
    let requests = parsed("[Y]\n20,10\n");
    assert_eq!(requests[0].1, vec![SiteRange::new(10, 20)], "Reversed endpoints were not swapped");

    // Empty sections are dropped.
    let requests = parsed("[Y]\n[KI270580.1]\n10,20\n");
    assert_eq!(requests.len(), 1, "An empty section was not dropped");
    assert_eq!(requests[0].0, "KI270580.1", "Wrong remaining chromosome");
}

#[test]
fn parse_errors() {
    assert!(parse_str("").is_err(), "Parsed an empty range list");
    assert!(parse_str("# only a comment\n").is_err(), "Parsed a range list without sections");
    assert!(parse_str("10,20\n[Y]\n").is_err(), "Parsed a range before the first section");
    assert!(parse_str("[Y]\n10,20\n[Y]\n30,40\n").is_err(), "Parsed a duplicate section");
    assert!(parse_str("[Y\n10,20\n").is_err(), "Parsed an unterminated section header");
    assert!(parse_str("[]\n10,20\n").is_err(), "Parsed an empty chromosome name");
    assert!(parse_str("[Y]\n10\n").is_err(), "Parsed a range without a comma");
    assert!(parse_str("[Y]\nten,20\n").is_err(), "Parsed a non-integer endpoint");
    assert!(parse_str("[Y]\n10,10\n").is_err(), "Parsed an interval with equal endpoints");
}

//-----------------------------------------------------------------------------

#[test]
fn alignment_output() {
    let matrix = MethylationMatrix::from_parts(
        vec![String::from("read_a"), String::from("b")],
        vec![10, 200],
        vec![
            vec![CallState::Methylated, CallState::Unmethylated],
            vec![CallState::NoCall, CallState::Methylated],
        ],
    );

    let mut buffer: Vec<u8> = Vec::new();
    write_alignment(&matrix, &mut buffer).unwrap();
    let text = String::from_utf8(buffer).unwrap();

    // The blank lead-in is as wide as the longest read label, and each cell is
    // left-padded to the width of its position label.
    let expected = "      \t10\t200\t\n\
        read_a\t 1\t  0\t\n\
        b\t  \t  1\t\n";
    assert_eq!(text, expected, "Wrong alignment output");
}

#[test]
fn alignment_output_is_deterministic() {
    let matrix = MethylationMatrix::from_parts(
        vec![String::from("x")],
        vec![5],
        vec![vec![CallState::Unmethylated]],
    );
    let mut first: Vec<u8> = Vec::new();
    write_alignment(&matrix, &mut first).unwrap();
    let mut second: Vec<u8> = Vec::new();
    write_alignment(&matrix, &mut second).unwrap();
    assert_eq!(first, second, "The alignment output is not deterministic");
}

//-----------------------------------------------------------------------------
