//! Support for reading and writing the text formats used by the tool.
//!
//! ### Range lists (reading)
//!
//! A range list names the chromosomes to visualize and their CpG ranges:
//!
//! ```text
//! [Y]
//! 5431,9587
//! 15680,17506
//!
//! [KI270580.1]
//! 1154,1669
//! 756,1321
//! ```
//!
//! A section header names a chromosome, and each following line gives the two
//! endpoints of a closed interval.
//! Reversed endpoints are swapped; equal endpoints are an error.
//! Blank lines and lines starting with `#` or `;` are ignored.
//! A section with no ranges is skipped.
//! See [`parse_range_file`].
//!
//! ### Text alignments (writing)
//!
//! The text alignment is a deterministic tab-separated rendering of a
//! methylation matrix: a header row with the CpG positions and one row per
//! read with `0` for unmethylated calls, `1` for methylated calls, and a
//! blank for sites without a call.
//! See [`write_alignment`].

use crate::matrix::MethylationMatrix;
use crate::ranges::SiteRange;

use std::io::{self, BufRead, Write};

#[cfg(test)]
mod tests;

//-----------------------------------------------------------------------------

/// Parses a range list from the given reader.
///
/// Returns `(chromosome, ranges)` pairs in file order, with empty sections
/// dropped.
/// The ranges are returned as given, without normalization.
///
/// # Errors
///
/// Returns an error if the file contains no sections, a range appears before
/// the first section, a section is duplicated, an endpoint is not an unsigned
/// integer, or the endpoints of an interval are equal.
///
/// # Examples
///
/// ```
/// use mrv_base::formats::parse_range_file;
/// use mrv_base::SiteRange;
///
/// let file = "[Y]\n5431,9587\n80,3327\n";
/// let requests = parse_range_file(&mut file.as_bytes()).unwrap();
/// assert_eq!(requests.len(), 1);
/// assert_eq!(requests[0].0, "Y");
/// assert_eq!(requests[0].1, vec![SiteRange::new(5431, 9587), SiteRange::new(80, 3327)]);
/// ```
pub fn parse_range_file(reader: &mut impl BufRead) -> Result<Vec<(String, Vec<SiteRange>)>, String> {
    let mut result: Vec<(String, Vec<SiteRange>)> = Vec::new();
    let mut seen_sections = false;
    let mut line_num = 0;

    let mut buf = String::new();
    loop {
        buf.clear();
        let len = reader.read_line(&mut buf).map_err(|x| x.to_string())?;
        if len == 0 {
            break;
        }
        line_num += 1;
        let line = buf.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }

        if line.starts_with('[') {
            if !line.ends_with(']') {
                return Err(format!("Line {}: invalid section header {}", line_num, line));
            }
            let chromosome = line[1..line.len() - 1].trim();
            if chromosome.is_empty() {
                return Err(format!("Line {}: empty chromosome name", line_num));
            }
            if result.iter().any(|(name, _)| name == chromosome) {
                return Err(format!("Line {}: duplicate section {}", line_num, chromosome));
            }
            seen_sections = true;
            result.push((chromosome.to_string(), Vec::new()));
        } else {
            let section = result.last_mut().ok_or_else(
                || format!("Line {}: range {} appears before any chromosome section", line_num, line)
            )?;
            let (left, right) = line.split_once(',').ok_or_else(
                || format!("Line {}: expected two interval endpoints separated by a comma", line_num)
            )?;
            let left = left.trim().parse::<u64>().map_err(
                |x| format!("Line {}: invalid interval endpoint {}: {}", line_num, left.trim(), x)
            )?;
            let right = right.trim().parse::<u64>().map_err(
                |x| format!("Line {}: invalid interval endpoint {}: {}", line_num, right.trim(), x)
            )?;
            if left == right {
                return Err(format!(
                    "Line {}: the endpoints of an interval must not be equal", line_num
                ));
            }
            let range = if left < right {
                SiteRange::new(left, right)
            } else {
                SiteRange::new(right, left)
            };
            section.1.push(range);
        }
    }

    if !seen_sections {
        return Err("The range list does not contain any chromosome sections".to_string());
    }
    result.retain(|(_, ranges)| !ranges.is_empty());
    Ok(result)
}

//-----------------------------------------------------------------------------

/// Writes the text alignment for the given matrix.
///
/// The header row consists of a blank field padded to the width of the longest
/// read label, followed by the CpG positions, all tab-separated.
/// Each data row consists of the read label followed by the cell symbols, each
/// left-padded with one space less than the width of its position label so that
/// the symbols line up under the position digits.
pub fn write_alignment<W: Write>(matrix: &MethylationMatrix, output: &mut W) -> io::Result<()> {
    let label_width = matrix.reads().iter().map(|read| read.len()).max().unwrap_or(0);

    // Header row.
    write!(output, "{:1$}", "", label_width)?;
    output.write_all(b"\t")?;
    for position in matrix.positions().iter() {
        write!(output, "{}", position)?;
        output.write_all(b"\t")?;
    }
    output.write_all(b"\n")?;

    // One row per read.
    for (i, read) in matrix.reads().iter().enumerate() {
        output.write_all(read.as_bytes())?;
        output.write_all(b"\t")?;
        for (j, position) in matrix.positions().iter().enumerate() {
            let width = position.to_string().len();
            write!(output, "{:1$}", "", width - 1)?;
            write!(output, "{}", matrix.cell(i, j).symbol())?;
            output.write_all(b"\t")?;
        }
        output.write_all(b"\n")?;
    }

    Ok(())
}

//-----------------------------------------------------------------------------
