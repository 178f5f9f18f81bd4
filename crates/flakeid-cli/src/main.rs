#![doc = include_str!("../README.md")]

mod config;
mod generate;
mod telemetry;

use std::io::{BufWriter, Write};

use clap::Parser;
use config::{CliArgs, Config};
use telemetry::init_tracing;

// Using mimalloc for better performance when many threads allocate ID
// batches at once.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = Config::try_from(args)?;

    init_tracing()?;

    let stdout = std::io::stdout();
    let mut out = BufWriter::new(stdout.lock());

    match config {
        Config::Generate(config) => {
            let generator = generate::build_generator(&config);
            log_startup_info(&generator, &config);
            generate::generate(&generator, &config, &mut out)?;
            if config.describe {
                eprintln!("{generator}");
            }
        }
        Config::Decode { epoch, ids } => generate::decode(&ids, epoch, &mut out)?,
    }

    out.flush()?;
    Ok(())
}

fn log_startup_info(generator: &flakeid::SnowflakeGenerator, config: &config::GenerateConfig) {
    if cfg!(debug_assertions) {
        tracing::debug!("Generating with full config: {:#?}", config);
    }
    tracing::info!(
        "Generating {} ids on {} threads as node {} (epoch {} ms)",
        config.count,
        config.threads,
        generator.node(),
        generator.epoch().as_millis(),
    );
}
