//! Command-line front end for the zipstream archive engine.

mod cli;
mod error;

use crate::cli::{Cli, Command, Plan};
use crate::error::{ErrorKind, Result};
use clap::Parser;
use exn::ResultExt;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;
use zipstream_archive::{Archive, ZipStream};
use zipstream_codec::cli::Preference;
use zipstream_config::Config;
use zipstream_storage::basename;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:?}");
            ExitCode::FAILURE
        },
    }
}

fn init_logging(verbose: u8) {
    let fallback = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Load the configuration and apply command-line overrides on top.
fn configure(cli: &Cli) -> Result<Config> {
    let mut config = Config::load(cli.config.as_deref()).or_raise(|| ErrorKind::Config)?;
    if let Some(strategy) = cli.strategy {
        config.conflict_strategy = strategy;
    }
    let preference = Preference::try_from(cli.compress.clone())
        .or_raise(|| ErrorKind::InvalidArgument("unsupported compression method".to_string()))?;
    config.compression_method = preference.resolve(config.compression_method);
    config.zip64 |= cli.zip64;
    Ok(config)
}

async fn run(cli: Cli) -> Result<()> {
    let config = configure(&cli)?;
    let zipstream = ZipStream::new(config).or_raise(|| ErrorKind::Archive)?;
    match cli.command {
        Command::Create { output, cache, plan } => {
            let name = plan.name.clone().or_else(|| basename(&output).map(str::to_string));
            let mut archive = build(&zipstream, &plan, name.as_deref())?;
            if let Some(cache) = cache {
                archive.cache_to_locator(&cache).await.or_raise(|| ErrorKind::Archive)?;
            }
            let origin = zipstream.origins().make_writable(&output).or_raise(|| ErrorKind::Archive)?;
            let sink = origin
                .writer()
                .await
                .or_raise(|| ErrorKind::InvalidArgument(format!("cannot write to {output}")))?;
            let streamed = archive.write_to(sink).await.or_raise(|| ErrorKind::Archive)?;
            println!("{} bytes written to {output}", streamed.size);
        },
        Command::Predict { plan } => {
            let mut archive = build(&zipstream, &plan, plan.name.as_deref())?;
            match archive.predict_size().await {
                Some(size) => println!("{size}"),
                None => println!("unavailable"),
            }
        },
        Command::Fingerprint { plan } => {
            let archive = build(&zipstream, &plan, plan.name.as_deref())?;
            println!("{}", archive.fingerprint().await);
        },
    }
    Ok(())
}

fn build(zipstream: &ZipStream, plan: &Plan, name: Option<&str>) -> Result<Archive> {
    let mut archive = zipstream.create(name);
    if let Some(comment) = &plan.comment {
        archive.set_comment(comment.clone());
    }
    archive.set_meta(plan.meta.iter().cloned().collect());
    for source in &plan.sources {
        let insertion = archive
            .add_locator(&source.locator, source.path.as_deref())
            .or_raise(|| ErrorKind::InvalidArgument(format!("cannot add {}", source.locator)))?;
        tracing::info!(locator = %source.locator, %insertion, "source queued");
    }
    Ok(archive)
}
