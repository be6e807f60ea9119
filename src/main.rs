use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::Level;
use traversal_context::{traversal, ContextBuilder, ContextError, SceneDocument, TraversalConfig};

/// Build a traversal context over a JSON scene document and print one JSON
/// record per expanded location.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Scene document (JSON)
    scene: PathBuf,
    /// Traversal arguments (JSON, camelCase keys)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Override the root location
    #[arg(long)]
    root_location: Option<String>,
    /// Override the isolate path
    #[arg(long)]
    isolate: Option<String>,
    /// Override the current time
    #[arg(long)]
    time: Option<f64>,
    /// Extra worker threads for expansion
    #[arg(long, default_value_t = 4)]
    threads: usize,
    /// Debug logging, and verbose context output
    #[arg(long)]
    verbose: bool,
}

fn run(args: Args) -> Result<(), ContextError> {
    let mut cfg = match &args.config {
        Some(path) => TraversalConfig::load(path)?,
        None => TraversalConfig::default(),
    };
    if let Some(root) = args.root_location {
        cfg.root_location = root;
    }
    if cfg.root_location.is_empty() {
        cfg.root_location = "/root".into();
    }
    if let Some(isolate) = args.isolate {
        cfg.isolate_path = isolate;
    }
    if let Some(time) = args.time {
        cfg.current_time = time;
    }
    cfg.verbose |= args.verbose;

    // A stage that fails to open still goes through the builder, which
    // reports it as an initialization error.
    let builder = match SceneDocument::open(&args.scene) {
        Ok(doc) => cfg.into_builder(Arc::new(doc)),
        Err(err) => ContextBuilder {
            error_message: Some(format!("cannot open {}: {err}", args.scene.display())),
            ..ContextBuilder::new()
        },
    };
    let ctx = builder.try_build()?;

    let mut stdout = std::io::stdout().lock();
    for record in traversal::collect(&ctx, args.threads) {
        serde_json::to_writer(&mut stdout, &record)?;
        std::io::Write::write_all(&mut stdout, b"\n")?;
    }
    Ok(())
}

fn main() {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(if args.verbose { Level::DEBUG } else { Level::WARN })
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run(args) {
        eprintln!("{err}");
        std::process::exit(1);
    }
}
