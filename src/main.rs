use clap::{Parser, Subcommand};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};
use variant_forge::config::{self, AppConfig};
use variant_forge::output;
use variant_forge::process::{self, CancelFlag, Mode};
use variant_forge::report::MISSING_IMAGES_FILE;

#[derive(Parser)]
#[command(name = "variant-forge")]
#[command(about = "Responsive WebP variants and markup rewriting from document tables")]
#[command(long_about = "\
Responsive WebP variants and markup rewriting from document tables

Each source document is a JSON table export. Image identifiers found in its
cells are matched to source rasters, resized into one WebP per size its code
requires, and every reference in the companion markup file is rewritten to
the variant that tag actually needs.

Directory layout (all configurable under [directories]):

  documents/doc1.json          # {\"tables\": [[[\"COMFRPTC09 ...\", \"<画像>hero-01\"]]]}
  images/hero-01.jpg           # source rasters, probed by extension order
  html/doc1.html               # companion markup, rewritten in place
  output/doc1/hero-011800.webp # {identifier}{width}.webp
  .logs/missing_images.txt     # document: identifier, one line per miss

Codes listed under [breakpoints] resolve widths from each tag's media query.
Codes listed under [replace_order] hand out widths to references in order.

Run 'variant-forge gen-config' to generate a documented config.toml.")]
#[command(version)]
struct Cli {
    /// Config file (missing file means stock defaults)
    #[arg(long, default_value = "config.toml", global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Rewrite markup, then generate variants
    Run,
    /// Generate variants only
    Variants,
    /// Rewrite markup only
    Rewrite,
    /// Scan documents and show what a run would do, without writing
    Check,
    /// Print a stock config.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mode = match cli.command {
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
            return Ok(());
        }
        Command::Check => {
            let config = config::load_config(&cli.config)?;
            init_console_logging(&config);
            let checked = process::check(&config)?;
            for line in output::format_check_output(&checked) {
                println!("{}", line);
            }
            println!("==> Config and documents are valid");
            return Ok(());
        }
        Command::Run => Mode::Run,
        Command::Variants => Mode::Variants,
        Command::Rewrite => Mode::Rewrite,
    };

    let config = config::load_config(&cli.config)?;
    init_logging(&config)?;
    init_thread_pool(&config.processing);

    println!(
        "==> Processing {} ({:?})",
        config.directories.documents.display(),
        mode
    );
    let (tx, rx) = mpsc::channel();
    let printer = std::thread::spawn(move || {
        for event in rx {
            for line in output::format_process_event(&event) {
                println!("{}", line);
            }
        }
    });
    let result = process::process(&config, mode, &CancelFlag::new(), Some(tx));
    printer.join().ok();
    let report = result?;

    let missing_log = config.directories.logs.join(MISSING_IMAGES_FILE);
    for line in output::format_batch_report(&report, Some(&missing_log)) {
        println!("{}", line);
    }
    println!("==> Done: {}", config.directories.output.display());
    Ok(())
}

fn env_filter(config: &AppConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level))
}

/// Stderr only; `check` writes nothing to disk.
fn init_console_logging(config: &AppConfig) {
    tracing_subscriber::registry()
        .with(env_filter(config))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Stderr plus a plain-text run log under the logs directory.
fn init_logging(config: &AppConfig) -> std::io::Result<()> {
    let log_file = config.log_file();
    create_parent(&log_file)?;
    let file = OpenOptions::new().create(true).append(true).open(&log_file)?;

    tracing_subscriber::registry()
        .with(env_filter(config))
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_writer(std::sync::Mutex::new(file)),
        )
        .init();
    Ok(())
}

fn create_parent(path: &Path) -> std::io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => std::fs::create_dir_all(parent),
        _ => Ok(()),
    }
}

/// Size the global rayon pool from `[processing]`.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
