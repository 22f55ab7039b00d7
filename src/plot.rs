//! SVG rendering of methylation matrices.
//!
//! Each read is drawn as one horizontal track spanning the columns from its
//! first to its last call.
//! An unmethylated call is an open circle and a methylated call a filled
//! circle; sites without a call leave a gap in the markers.
//! The renderer only consumes the pruned matrix; it never changes its
//! contents.

use crate::matrix::{CallState, MethylationMatrix};

use std::path::Path;

use plotters::coord::cartesian::Cartesian2d;
use plotters::coord::types::RangedCoordf64;
use plotters::prelude::*;

//-----------------------------------------------------------------------------

// Pixels per site column and per read track.
const COLUMN_WIDTH: u32 = 90;
const TRACK_HEIGHT: u32 = 36;

// Pixel sizes for the fixed parts of the drawing.
const MARGIN: u32 = 10;
const X_LABEL_AREA: u32 = 60;
const Y_LABEL_AREA: u32 = 160;
const CAPTION_HEIGHT: u32 = 30;
const MARKER_RADIUS: i32 = 6;

//-----------------------------------------------------------------------------

/// Writes the given matrix as an SVG image.
///
/// The matrix must have at least one row and one column.
///
/// # Errors
///
/// Returns an error if the matrix is empty or the image cannot be written.
pub fn write_svg<P: AsRef<Path>>(
    matrix: &MethylationMatrix, chromosome: &str, filename: P
) -> Result<(), String> {
    let rows = matrix.reads().len();
    let columns = matrix.positions().len();
    if rows == 0 || columns == 0 {
        return Err(format!("Nothing to draw for chromosome {}", chromosome));
    }

    let width = (columns as u32 + 2) * COLUMN_WIDTH + Y_LABEL_AREA + 2 * MARGIN;
    let height = (rows as u32 + 2) * TRACK_HEIGHT + X_LABEL_AREA + CAPTION_HEIGHT + 2 * MARGIN;
    let root = SVGBackend::new(filename.as_ref(), (width, height)).into_drawing_area();
    root.fill(&WHITE).map_err(|x| x.to_string())?;

    let first = matrix.positions()[0];
    let last = matrix.positions()[columns - 1];
    let caption = format!("CpG ranges [{}, {}] of {} Chromosome", first, last, chromosome);

    let positions = matrix.positions().to_vec();
    let reads = matrix.reads().to_vec();
    let mut chart = ChartBuilder::on(&root)
        .caption(caption, ("sans-serif", 20))
        .margin(MARGIN)
        .x_label_area_size(X_LABEL_AREA)
        .y_label_area_size(Y_LABEL_AREA)
        .build_cartesian_2d(0f64..(columns as f64 + 1.0), 0f64..(rows as f64 + 1.0))
        .map_err(|x| x.to_string())?;

    // Column i + 1 is the site positions[i] and row i + 1 the read reads[i];
    // other coordinates get no label.
    chart.configure_mesh()
        .disable_mesh()
        .x_desc("CpG sites")
        .y_desc("reads")
        .x_labels(columns + 2)
        .y_labels(rows + 2)
        .x_label_formatter(&|x| label_for(&positions, *x, |position| position.to_string()))
        .y_label_formatter(&|y| label_for(&reads, *y, |read| read.clone()))
        .draw()
        .map_err(|x| x.to_string())?;

    for i in 0..rows {
        draw_read(&mut chart, matrix, i)?;
    }

    root.present().map_err(|x| x.to_string())?;
    Ok(())
}

// Returns the label for axis value `value`, which is the labels[i - 1] for
// integral values i in 1..=len and empty otherwise.
fn label_for<T, F: Fn(&T) -> String>(labels: &[T], value: f64, format: F) -> String {
    let index = value.round();
    if (value - index).abs() > 1.0e-6 {
        return String::new();
    }
    let index = index as i64;
    if index < 1 || index > labels.len() as i64 {
        return String::new();
    }
    format(&labels[(index - 1) as usize])
}

// Draws the track and the markers for read `i`.
fn draw_read<DB: DrawingBackend>(
    chart: &mut ChartContext<'_, DB, Cartesian2d<RangedCoordf64, RangedCoordf64>>,
    matrix: &MethylationMatrix,
    i: usize
) -> Result<(), String> {
    let row = matrix.row(i);
    let y = (i + 1) as f64;

    let calls: Vec<(usize, CallState)> = row.iter().enumerate()
        .filter(|(_, cell)| cell.is_call())
        .map(|(j, cell)| (j, *cell))
        .collect();
    if calls.is_empty() {
        return Ok(());
    }

    // The track spans the read's first to last call.
    let track_start = (calls[0].0 + 1) as f64;
    let track_end = (calls[calls.len() - 1].0 + 1) as f64;
    chart.draw_series(LineSeries::new(
        vec![(track_start, y), (track_end, y)],
        BLACK.stroke_width(2),
    )).map_err(|x| x.to_string())?;

    // Filled circles for methylated calls, open circles for unmethylated ones.
    chart.draw_series(calls.iter().map(|(j, cell)| {
        let style = match cell {
            CallState::Methylated => BLACK.filled(),
            _ => WHITE.filled(),
        };
        Circle::new(((j + 1) as f64, y), MARKER_RADIUS, style)
    })).map_err(|x| x.to_string())?;
    chart.draw_series(calls.iter().map(|(j, _)| {
        Circle::new(((j + 1) as f64, y), MARKER_RADIUS, BLACK.stroke_width(1))
    })).map_err(|x| x.to_string())?;

    Ok(())
}

//-----------------------------------------------------------------------------
