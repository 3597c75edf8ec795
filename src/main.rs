//! bengali-ocr - Printed Bengali/English document OCR
//!
//! Binarizes one document image, reads its text and corrects the transcript
//! against a Bengali word list. Only the transcript goes to standard output;
//! all diagnostics go to standard error.

mod config;
mod correction;
mod error;
mod lexicon;
mod pipeline;
mod storage;
mod vision;

use clap::Parser;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::config::{load_config, save_config, AppConfig};
use crate::error::PipelineError;
use crate::lexicon::Lexicon;
use crate::pipeline::Pipeline;
use crate::vision::{LazyOcrEngine, ModelStore};

/// bengali-ocr - Extract text from a Bengali/English document image
#[derive(Parser, Debug)]
#[command(name = "bengali-ocr", version)]
#[command(about = "Extract Bengali/English text from a document image")]
struct Args {
    /// Image file to read
    image: PathBuf,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Word list for correction [default: bn_words.txt beside the executable]
    #[arg(long)]
    lexicon: Option<PathBuf>,

    /// Directory holding det.onnx, rec.onnx and dict.txt
    #[arg(long)]
    models: Option<PathBuf>,

    /// Write the binarized raster to this image file
    #[arg(long)]
    dump_raster: Option<PathBuf>,

    /// Write the effective configuration to this TOML file
    #[arg(long)]
    save_config: Option<PathBuf>,

    /// Increase log output on stderr (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Disable log output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            // --help and --version are not failures
            let code = if e.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
            let _ = e.print();
            return code;
        }
    };

    init_logging(args.verbose, args.quiet);

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let code = e.exit_code();
            error!("{:#}", anyhow::Error::new(e));
            ExitCode::from(code)
        }
    }
}

/// Install the stderr log subscriber
fn init_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("off")
    } else {
        let level = match verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        };
        EnvFilter::new(format!("{level},ort=warn"))
    };

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to install log subscriber: {}", e);
    }
}

fn run(args: &Args) -> Result<(), PipelineError> {
    if !args.image.exists() {
        return Err(PipelineError::NotFound(args.image.clone()));
    }

    let mut config = match &args.config {
        Some(path) => load_config(path)
            .map_err(|e| PipelineError::Config(e.context(format!("while loading {:?}", path))))?,
        None => AppConfig::default(),
    };
    if let Some(path) = &args.lexicon {
        config.lexicon.path = Some(path.clone());
    }
    if let Some(dir) = &args.models {
        config.models.dir = Some(dir.clone());
    }
    if let Some(path) = &args.save_config {
        save_config(&config, path).map_err(PipelineError::Config)?;
        info!("Saved configuration to {:?}", path);
    }

    let lexicon = Arc::new(load_lexicon(&config)?);

    let store = match &config.models.dir {
        Some(dir) => ModelStore::with_dir(dir.clone()),
        None => ModelStore::new().map_err(PipelineError::Recognition)?,
    };
    // Models load after the image decodes, so a bad image is reported as such
    let engine = LazyOcrEngine::new(store, config.models.clone());

    let pipeline = Pipeline::new(&config, lexicon, engine).with_dump_raster(args.dump_raster.clone());
    let transcript = pipeline.process(&args.image)?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    writeln!(out, "{}", transcript)
        .and_then(|()| out.flush())
        .map_err(PipelineError::Output)?;

    info!("Done");
    Ok(())
}

/// Configured word list, or the one beside the executable
fn load_lexicon(config: &AppConfig) -> Result<Lexicon, PipelineError> {
    let path = match &config.lexicon.path {
        Some(path) => path.clone(),
        None => match storage::default_lexicon_path() {
            Ok(path) => path,
            Err(e) => {
                warn!("No default lexicon location ({:#}); correction disabled", e);
                return Ok(Lexicon::empty());
            }
        },
    };

    Ok(Lexicon::load(&path)?)
}
