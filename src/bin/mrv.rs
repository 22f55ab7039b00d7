use std::io::{BufWriter, Write};
use std::time::Instant;
use std::{env, fs, process};

use getopts::Options;

use mrv_base::{CallBase, CallCache, Fingerprint, MatrixBuilder, SiteRange};
use mrv_base::ranges::normalize_requests;
use mrv_base::{formats, plot, utils};

//-----------------------------------------------------------------------------

fn main() -> Result<(), String> {
    let start_time = Instant::now();

    // Parse arguments.
    let config = Config::new()?;

    // Fingerprint the call table and decide whether the cache can be reused.
    eprintln!("Fingerprinting {}", config.data_file);
    let fingerprint = Fingerprint::of_file(&config.data_file)?;
    let cache = CallCache::new(&config.output_dir, fingerprint);

    let call_base = if cache.is_valid() {
        eprintln!("Reusing preprocessed data in {}", cache.root().display());
        CallBase::open(cache)?
    } else {
        CallBase::create(&config.data_file, cache)?
    };

    // Normalize the requested ranges and visualize each chromosome.
    let requests = normalize_requests(call_base.cache(), &config.requests);
    for (chromosome, ranges) in requests.iter() {
        visualize(&call_base, chromosome, ranges)?;
    }

    let end_time = Instant::now();
    let seconds = end_time.duration_since(start_time).as_secs_f64();
    eprintln!("Used {:.3} seconds", seconds);

    Ok(())
}

//-----------------------------------------------------------------------------

// Builds, prunes, and renders the matrix for one chromosome. A request with
// nothing informative in the ranges is reported and skipped without failing
// the run.
fn visualize(call_base: &CallBase, chromosome: &str, ranges: &[SiteRange]) -> Result<(), String> {
    eprintln!("For chromosome {} and the given ranges:", chromosome);

    let calls = call_base.calls(chromosome)?;
    let builder = MatrixBuilder::new(&calls, ranges);
    let matrix = match builder.build()? {
        Some(matrix) => matrix,
        None => {
            eprintln!("There is no CpG information for chromosome {} in the given ranges", chromosome);
            return Ok(());
        },
    };

    let first = matrix.positions()[0];
    let last = matrix.positions()[matrix.positions().len() - 1];

    let txt_file = call_base.cache().visualization_file(chromosome, first, last, "txt");
    let output = fs::File::create(&txt_file).map_err(|x| x.to_string())?;
    let mut output = BufWriter::new(output);
    formats::write_alignment(&matrix, &mut output).map_err(|x| x.to_string())?;
    output.flush().map_err(|x| x.to_string())?;
    eprintln!("The visualization text file is at {}", txt_file.display());

    let svg_file = call_base.cache().visualization_file(chromosome, first, last, "svg");
    plot::write_svg(&matrix, chromosome, &svg_file)?;
    eprintln!("The visualization SVG file is at {}", svg_file.display());

    Ok(())
}

//-----------------------------------------------------------------------------

struct Config {
    pub data_file: String,
    pub output_dir: String,
    pub requests: Vec<(String, Vec<SiteRange>)>,
}

impl Config {
    pub fn new() -> Result<Config, String> {
        let args: Vec<String> = env::args().collect();
        let program = args[0].clone();

        let mut opts = Options::new();
        opts.optflag("h", "help", "print this help");
        opts.optflag("V", "version", "show the mrv version");
        opts.optopt("", "data-file", "text file containing long-read methylation calls (required)", "FILE");
        opts.optopt("", "chromosome", "chromosome name", "STR");
        opts.optmulti("", "cpg-range", "range of CpG sites formatted as [start,end]; may be repeated", "RANGE");
        opts.optopt("", "to-visualize-file", "file listing chromosomes and their CpG ranges", "FILE");
        opts.optopt("", "output-dir", "output directory (default: current directory)", "DIR");
        let matches = match opts.parse(&args[1..]) {
            Ok(m) => m,
            Err(f) => {
                eprintln!("{}", f);
                process::exit(1);
            }
        };

        if matches.opt_present("h") {
            let header = format!("Usage: {} --data-file FILE [options]", program);
            eprint!("{}", opts.usage(&header));
            process::exit(0);
        }
        if matches.opt_present("V") {
            eprintln!("mrv {}", env!("CARGO_PKG_VERSION"));
            process::exit(0);
        }

        let data_file = matches.opt_str("data-file").ok_or(
            "The call table must be provided with --data-file".to_string()
        )?;
        if !utils::file_exists(&data_file) {
            return Err(format!("Data file {} does not exist", data_file));
        }
        let output_dir = matches.opt_str("output-dir").unwrap_or(String::from("."));

        let range_args = matches.opt_strs("cpg-range");
        let range_file = matches.opt_str("to-visualize-file");
        if !range_args.is_empty() && range_file.is_some() {
            return Err("Options --cpg-range and --to-visualize-file are mutually exclusive".to_string());
        }

        let requests = if let Some(filename) = range_file {
            let mut reader = utils::open_file(&filename)?;
            formats::parse_range_file(&mut reader).map_err(
                |x| format!("Invalid range list {}: {}", filename, x)
            )?
        } else {
            let chromosome = matches.opt_str("chromosome").ok_or(
                "The chromosome must be provided with --chromosome".to_string()
            )?;
            if range_args.is_empty() {
                return Err("The CpG ranges must be provided with --cpg-range".to_string());
            }
            let mut ranges: Vec<SiteRange> = Vec::new();
            for arg in range_args.iter() {
                ranges.push(Self::parse_range(arg)?);
            }
            vec![(chromosome, ranges)]
        };

        Ok(Config {
            data_file,
            output_dir,
            requests,
        })
    }

    // Parses a [start,end] argument with integer endpoints and start < end.
    fn parse_range(arg: &str) -> Result<SiteRange, String> {
        let inner = arg.strip_prefix('[').and_then(|x| x.strip_suffix(']')).ok_or_else(
            || format!("{} is not a valid RANGE; the correct format is [start,end]", arg)
        )?;
        let (left, right) = inner.split_once(',').ok_or_else(
            || format!("{} is not a valid RANGE; the correct format is [start,end]", arg)
        )?;
        let start = left.parse::<u64>().map_err(
            |_| format!("{} is not a valid RANGE; the endpoints must be integers", arg)
        )?;
        let end = right.parse::<u64>().map_err(
            |_| format!("{} is not a valid RANGE; the endpoints must be integers", arg)
        )?;
        if start == end {
            return Err(format!(
                "{} is not a valid RANGE; the endpoints of an interval must not be equal", arg
            ));
        }
        if start > end {
            return Err(format!(
                "{} is not a valid RANGE; the left endpoint must be less than the right endpoint", arg
            ));
        }
        Ok(SiteRange::new(start, end))
    }
}

//-----------------------------------------------------------------------------
