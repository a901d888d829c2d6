//! `ljpc` — the command-line entry point for the preprocessor. Transforms each given file in
//! order and prints the path of its transformed output.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use log::debug;

use ljp::{config::TransformConfig, driver::Driver};

/// Preprocess one or more Lua-family source files.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Source files to transform.
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Only report whether each file would be transformed; don't write cache files.
    #[arg(long)]
    check: bool,

    /// Directory to write cache slots into (defaults to `./.luajit_pro`).
    #[arg(long)]
    cache_dir: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Cli::parse();

    simple_logger::SimpleLogger::new().with_colors(true).init()?;

    let mut config = TransformConfig::from_env();
    if let Some(dir) = args.cache_dir {
        config = config.with_cache_dir(dir);
    }

    let mut driver = Driver::new(config)?;

    for file in &args.files {
        debug!("processing {}", file.display());
        let path = driver.transform(file)?;
        if args.check {
            println!("{}: would produce {}", file.display(), path.display());
        } else {
            println!("{}", path.display());
        }
    }

    Ok(())
}
