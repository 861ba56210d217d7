//! webpage-complete CLI - save a local HTML file as a Web Page, Complete

use clap::error::ErrorKind;
use clap::Parser;
use std::error::Error;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use webpage_complete::{ConversionJob, ConversionReport, FetchOptions, HttpFetcher};

const USAGE_NO_FILE: &str =
    "Please specify a file to convert to a Web Page, Complete on the commandline.";
const USAGE_TOO_MANY: &str = "Please specify just one file to convert to a Web Page, Complete.";

/// Save a local HTML page with all its images, scripts and stylesheets
#[derive(Parser, Debug)]
#[command(name = "webpage-complete")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// HTML file to convert
    #[arg(allow_hyphen_values = true)]
    files: Vec<PathBuf>,
}

/// Why the command line could not be turned into an input file
#[derive(Debug, PartialEq, Eq)]
enum UsageError {
    NoFile,
    TooManyFiles,
    NotFound(PathBuf),
}

impl std::fmt::Display for UsageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UsageError::NoFile => f.write_str(USAGE_NO_FILE),
            UsageError::TooManyFiles => f.write_str(USAGE_TOO_MANY),
            UsageError::NotFound(path) => {
                write!(f, "The file '{}' does not exist.", path.display())
            }
        }
    }
}

/// Pick the single input file out of the positional arguments
fn input_from_args(files: &[PathBuf]) -> Result<PathBuf, UsageError> {
    match files {
        [] => Err(UsageError::NoFile),
        [file] if !file.exists() => Err(UsageError::NotFound(file.clone())),
        [file] => Ok(std::path::absolute(file).unwrap_or_else(|_| file.clone())),
        _ => Err(UsageError::TooManyFiles),
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    init_logging();
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            e.exit()
        }
        Err(e) => {
            print!("{}", e);
            std::process::exit(1);
        }
    };

    let input = match input_from_args(&cli.files) {
        Ok(input) => input,
        Err(e) => {
            println!("{}", e);
            std::process::exit(1);
        }
    };

    // Outputs land in the directory the command was started from
    let output_dir = match std::env::current_dir() {
        Ok(dir) => dir,
        Err(e) => {
            eprintln!("Error: cannot determine current directory: {}", e);
            std::process::exit(1);
        }
    };

    match run(&input, &output_dir).await {
        Ok(report) => println!("{}", summary(&report)),
        Err(e) => {
            eprintln!("{}", error_chain(e.as_ref()));
            std::process::exit(1);
        }
    }
}

async fn run(input: &Path, output_dir: &Path) -> Result<ConversionReport, Box<dyn Error>> {
    let fetcher = HttpFetcher::new(FetchOptions::default())?;
    let mut job = ConversionJob::new(input, output_dir);
    Ok(job.run(&fetcher).await?)
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Format an error with its causes, one per line
fn error_chain(err: &dyn Error) -> String {
    let mut output = format!("Error: {}", err);
    let mut cause = err.source();
    while let Some(inner) = cause {
        output.push_str(&format!("\n  caused by: {}", inner));
        cause = inner.source();
    }
    output
}

fn summary(report: &ConversionReport) -> String {
    format!(
        "Saved '{}' with {} resource(s), {} bytes, in '{}'",
        report.html_path.display(),
        report.assets.len(),
        report.total_bytes(),
        report.assets_dir.display()
    )
}
