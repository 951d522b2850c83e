mod console;
mod source;

use anyhow::{Context, Result};
use breed_core::config::CONFIG_FILE_NAME;
use breed_core::{
    AppConfig, Classifier, EvaluationLog, ImageBlob, LogIdentity, NavigationController,
    SavePolicy, ScanOptions, SessionStatus, Timestamp, construct_session,
};
use clap::Parser;
use console::Console;
use directories_next::ProjectDirs;
use source::InputSource;
use std::io;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

const APP_VERSION: &str = env!("IDENTIBREED_VERSION");

/// Predict dog breeds in your photos and browse the results.
#[derive(Debug, Parser)]
#[command(name = "IdentiBreed", version = APP_VERSION)]
struct Args {
    /// Folder of images, a single image file, or an http(s) image URL.
    input: String,
    /// Save method: all, none or manual. Asked interactively when omitted.
    #[arg(long)]
    policy: Option<SavePolicy>,
    /// Judge each prediction and build an evaluation log.
    #[arg(long)]
    evaluate: bool,
    /// Include images in subfolders.
    #[arg(long)]
    recursive: bool,
    /// Use this config file instead of the per-user one.
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    if let Err(e) = run(Args::parse()) {
        eprintln!("IdentiBreed stopped with an error: {e:#}");
        std::process::exit(1);
    }
}

fn config_path(args: &Args) -> Result<PathBuf> {
    if let Some(path) = &args.config {
        return Ok(path.clone());
    }
    let dirs = ProjectDirs::from("", "", "IdentiBreed")
        .context("no home directory to keep the configuration in")?;
    Ok(dirs.config_dir().join(CONFIG_FILE_NAME))
}

#[cfg(feature = "ort")]
fn load_classifier(config: &AppConfig) -> Result<Box<dyn Classifier>> {
    let classifier = breed_core::OnnxClassifier::new(&config.model)
        .with_context(|| format!("loading model {}", config.model.model_path.display()))?;
    Ok(Box::new(classifier))
}

#[cfg(not(feature = "ort"))]
fn load_classifier(_config: &AppConfig) -> Result<Box<dyn Classifier>> {
    anyhow::bail!("this build has no classifier backend; rebuild with `--features ort`")
}

fn run(args: Args) -> Result<()> {
    let path = config_path(&args)?;
    let cwd = std::env::current_dir().context("current directory unavailable")?;
    let config = AppConfig::load_or_create(&path)?.rooted_at(&cwd);
    tracing::info!("IdentiBreed v{APP_VERSION}, config {}", path.display());

    let source = InputSource::parse(&args.input);
    let opts = ScanOptions {
        recursive: args.recursive,
    };
    let files = match source.resolve(&config.download_dir, opts) {
        Ok(files) => files,
        Err(e) => {
            println!("{e:#}");
            return Ok(());
        }
    };

    let classifier = load_classifier(&config)?;
    println!("Predicting dog breeds from {source}. This could take a moment...");
    let build = construct_session(ImageBlob::read_all(&files), &*classifier, config.top_k);
    if build.status == SessionStatus::Empty {
        println!("No usable images found in {source}.");
        return Ok(());
    }
    println!(
        "Predicting completed: {} image(s), {} skipped.",
        build.session.len(),
        build.skipped.len()
    );

    let stdin = io::stdin();
    let mut console = Console::new(stdin.lock(), io::stdout(), classifier.labels().to_vec())
        .with_correction_attempts(config.correction_attempts)
        .with_submission_url(config.submission_url.clone())
        .with_output_dir(&config.output_dir)
        .with_opener(console::open_with_system);

    let policy = match args.policy.or(config.default_policy) {
        Some(policy) => policy,
        None => match console.choose_policy()? {
            Some(policy) => policy,
            None => return Ok(()),
        },
    };
    let mut session = build.session;
    session.select_policy(policy)?;

    let evaluation = (args.evaluate || config.evaluate)
        .then(|| EvaluationLog::new(LogIdentity::for_user(&config.user_id, Timestamp::now())));
    let mut nav = NavigationController::new(config.store());
    if let Some(first) = nav.activate(session, evaluation)? {
        console.run(&mut nav, first)?;
    }
    if let Some(gate) = nav.gate()
        && !gate.log().is_flushed()
        && !gate.log().entries().is_empty()
    {
        println!("Evaluation log was not submitted; it is discarded.");
    }
    nav.deactivate();
    Ok(())
}
