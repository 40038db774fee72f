use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use zipstream_config::ConflictStrategy;

#[derive(Parser, Debug)]
#[command(name = "zipstream", version)]
#[command(about = "Assemble ZIP archives from local, S3, HTTP, FTP and inline sources", long_about = None)]
#[command(after_help = "Sources are locators, optionally followed by `::PATH` to choose the path inside the archive:\n  \
  zipstream create out.zip ./report.pdf s3://bucket/data.csv::data/latest.csv\n  \
  zipstream predict https://example.com/logo.png \"inline text::notes.txt\"")]
pub struct Cli {
    /// Configuration file (TOML, YAML or JSON)
    #[arg(long, global = true, env = "ZIPSTREAM_CONFIG", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// How to resolve two sources claiming the same path
    #[arg(long, global = true, value_name = "STRATEGY", value_parser = parse_strategy)]
    pub strategy: Option<ConflictStrategy>,

    /// Compress entries (deflate unless METHOD is given); disables size prediction
    #[arg(long, global = true, visible_alias = "method", value_name = "METHOD", num_args = 0..=1, require_equals = true)]
    pub compress: Option<Option<String>>,

    /// Always write Zip64 records
    #[arg(long, global = true)]
    pub zip64: bool,

    /// More log output (-vv for trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Write an archive
    Create {
        /// Destination file, or a writable locator such as `s3://bucket/key.zip`
        #[arg(value_name = "OUTPUT")]
        output: String,
        /// Also mirror the archive to this writable locator
        #[arg(long, value_name = "LOCATOR")]
        cache: Option<String>,
        #[command(flatten)]
        plan: Plan,
    },
    /// Print the exact archive size, or `unavailable`
    Predict {
        #[command(flatten)]
        plan: Plan,
    },
    /// Print a fingerprint that changes whenever the archive bytes would
    Fingerprint {
        #[command(flatten)]
        plan: Plan,
    },
}

#[derive(Args, Debug)]
pub struct Plan {
    /// Download name (`.zip` is appended when missing)
    #[arg(long)]
    pub name: Option<String>,

    /// Archive comment
    #[arg(long)]
    pub comment: Option<String>,

    /// Metadata folded into the fingerprint
    #[arg(long, value_name = "KEY=VALUE", value_parser = parse_meta)]
    pub meta: Vec<(String, String)>,

    #[arg(value_name = "SOURCE[::PATH]", required = true, value_parser = parse_source)]
    pub sources: Vec<SourceArg>,
}

/// A locator and an optional in-archive path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceArg {
    pub locator: String,
    pub path: Option<String>,
}

fn parse_source(raw: &str) -> Result<SourceArg, String> {
    let (locator, path) = match raw.rsplit_once("::") {
        Some((locator, path)) => (locator, Some(path).filter(|p| !p.is_empty())),
        None => (raw, None),
    };
    if locator.is_empty() {
        return Err("source locator is empty".to_string());
    }
    Ok(SourceArg {
        locator: locator.to_string(),
        path: path.map(str::to_string),
    })
}

fn parse_meta(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got `{raw}`")),
    }
}

fn parse_strategy(raw: &str) -> Result<ConflictStrategy, String> {
    raw.parse()
        .map_err(|_| format!("unknown strategy `{raw}` (expected skip, replace or rename)"))
}
