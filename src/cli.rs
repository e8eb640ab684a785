// Command-line filter for snapkit.
//
// Compresses or decompresses one stream, stdin to stdout by default, using
// the framed stream format.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::PathBuf;
use std::process;

use clap::{ArgAction, ArgGroup, Parser, ValueHint};

use crate::io::{StreamStats, compress_stream, decompress_stream};

const BUF_SIZE: usize = 64 * 1024;

// ---------------------------------------------------------------------------
// Clap CLI definition
// ---------------------------------------------------------------------------

/// Snappy-framed stream compressor.
#[derive(Parser, Debug)]
#[command(
    name = "snapkit",
    version,
    about = "Fast framed stream compressor",
    group(ArgGroup::new("mode").required(true).args(["encode", "decode"]))
)]
struct Cli {
    /// Compress the input into a framed stream.
    #[arg(short = 'e', long)]
    encode: bool,

    /// Decompress a framed stream.
    #[arg(short = 'd', long)]
    decode: bool,

    /// Input file (default: stdin).
    #[arg(long, value_hint = ValueHint::FilePath)]
    input: Option<PathBuf>,

    /// Output file (default: stdout).
    #[arg(long, value_hint = ValueHint::FilePath)]
    output: Option<PathBuf>,

    /// Force overwrite of an existing output file.
    #[arg(short = 'f', long)]
    force: bool,

    /// Quiet mode (suppress non-error output).
    #[arg(short = 'q', long, conflicts_with = "verbose")]
    quiet: bool,

    /// Verbose mode (use twice for digests).
    #[arg(short = 'v', long, action = ArgAction::Count)]
    verbose: u8,

    /// Output stats as JSON to stderr.
    #[arg(long = "json")]
    json_output: bool,
}

// ---------------------------------------------------------------------------
// Resolved options
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Encode,
    Decode,
}

impl Mode {
    fn name(self) -> &'static str {
        match self {
            Self::Encode => "encode",
            Self::Decode => "decode",
        }
    }
}

#[derive(Debug)]
struct Options {
    mode: Mode,
    input_file: Option<PathBuf>,
    output_file: Option<PathBuf>,
    force: bool,
    quiet: bool,
    verbose: u8,
    json_output: bool,
}

fn resolve_options(cli: Cli) -> Options {
    let mode = if cli.decode { Mode::Decode } else { Mode::Encode };
    Options {
        mode,
        input_file: cli.input,
        output_file: cli.output,
        force: cli.force,
        quiet: cli.quiet,
        verbose: cli.verbose.min(2),
        json_output: cli.json_output,
    }
}

// ---------------------------------------------------------------------------
// Command
// ---------------------------------------------------------------------------

fn cmd_filter(opts: &Options) -> i32 {
    let mode = opts.mode.name();

    let reader: Box<dyn Read> = match &opts.input_file {
        Some(path) => match File::open(path) {
            Ok(f) => Box::new(BufReader::with_capacity(BUF_SIZE, f)),
            Err(e) => {
                eprintln!("snapkit: input file: {}: {e}", path.display());
                return 1;
            }
        },
        None => Box::new(BufReader::with_capacity(BUF_SIZE, io::stdin())),
    };

    let writer: Box<dyn Write> = match &opts.output_file {
        None => Box::new(BufWriter::with_capacity(BUF_SIZE, io::stdout().lock())),
        Some(path) => {
            if path.exists() && !opts.force {
                eprintln!(
                    "snapkit: output file exists, use -f to overwrite: {}",
                    path.display()
                );
                return 1;
            }
            match File::create(path) {
                Ok(f) => Box::new(BufWriter::with_capacity(BUF_SIZE, f)),
                Err(e) => {
                    eprintln!("snapkit: output file: {}: {e}", path.display());
                    return 1;
                }
            }
        }
    };

    let result = match opts.mode {
        Mode::Encode => compress_stream(reader, writer),
        Mode::Decode => decompress_stream(reader, writer),
    };

    match result {
        Ok(stats) => {
            report(opts, &stats);
            0
        }
        Err(e) => {
            eprintln!("snapkit: {mode} error: {e}");
            1
        }
    }
}

fn report(opts: &Options, stats: &StreamStats) {
    if opts.json_output {
        match serde_json::to_string(stats) {
            Ok(json) => eprintln!("{json}"),
            Err(e) => eprintln!("snapkit: json: {e}"),
        }
    }

    if opts.verbose > 0 && !opts.quiet {
        eprintln!(
            "snapkit: {}: {} bytes in, {} bytes out, {} frames ({} compressed)",
            opts.mode.name(),
            stats.bytes_in,
            stats.bytes_out,
            stats.frames,
            stats.compressed_frames
        );
        if opts.verbose > 1
            && let Some(hex) = stats.sha256_hex()
        {
            eprintln!("snapkit: sha256: {hex}");
        }
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Main CLI entry point. Parses arguments via clap and runs the filter.
pub fn run() -> ! {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .format_timestamp(None)
        .format_target(false)
        .init();

    let opts = resolve_options(Cli::parse());
    process::exit(cmd_filter(&opts));
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
