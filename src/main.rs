//! olaf: Declarative routing for Caddy
//!
//! Compiles services, routes and plugins described in YAML (or served as
//! JSON over HTTP) into Caddy's native routing configuration.

use anyhow::{Context, Result};
use builder::{compile, CompileOptions, Expander};
use clap::{Parser, Subcommand};
use config::{DefaultLoader, Model, ReloadManager, Source, SourceLoader};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "olaf")]
#[command(author, version, about = "Declarative routing compiler for Caddy")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Model file path or URL
    #[arg(short, long, default_value = "olaf.yaml")]
    config: String,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Write the output to a file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Watch the model file and recompile on changes
    #[arg(short, long)]
    watch: bool,

    /// Reject plugins that are neither ordered nor depended upon
    #[arg(long)]
    strict_order: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile the model and print the Caddy routes
    Adapt {
        #[arg(short, long, default_value = "olaf.yaml")]
        config: String,
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Watch the model file and recompile on changes
        #[arg(short, long)]
        watch: bool,
    },
    /// Validate the model
    Validate {
        #[arg(short, long, default_value = "olaf.yaml")]
        config: String,
    },
    /// Expand the olaf handlers of a Caddy JSON config
    Expand {
        /// Caddy JSON config
        #[arg(short, long)]
        input: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    let options = CompileOptions {
        strict_plugin_order: cli.strict_order,
    };

    match cli.command {
        Some(Commands::Adapt {
            config,
            output,
            watch,
        }) => adapt(&config, output, watch, options),
        Some(Commands::Validate { config }) => validate(&config, &options),
        Some(Commands::Expand { input, output }) => expand(&input, output.as_deref(), options),
        None => adapt(&cli.config, cli.output, cli.watch, options),
    }
}

fn source_of(arg: &str) -> Result<Source> {
    let cwd = std::env::current_dir().context("Failed to get current directory")?;
    Ok(Source::from_arg(arg, &cwd))
}

fn load(rt: &tokio::runtime::Runtime, loader: &DefaultLoader, source: &Source) -> Result<Model> {
    rt.block_on(loader.load(source))
        .with_context(|| format!("Failed to load model from {}", source))
}

fn write_json<T: serde::Serialize>(value: &T, output: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to encode output")?;
    match output {
        Some(path) => std::fs::write(path, json + "\n")
            .with_context(|| format!("Failed to write output to {:?}", path))?,
        None => println!("{}", json),
    }
    Ok(())
}

fn adapt(config: &str, output: Option<PathBuf>, watch: bool, options: CompileOptions) -> Result<()> {
    let source = source_of(config)?;
    let rt = tokio::runtime::Runtime::new()?;
    let loader = DefaultLoader::new();

    info!(source = %source, "Compiling model");
    let model = load(&rt, &loader, &source)?;
    let routes = compile(&model, &options).context("Failed to compile model")?;
    write_json(&routes, output.as_deref())?;

    if !watch {
        return Ok(());
    }

    let manager = ReloadManager::new(source, Arc::new(loader))
        .context("Failed to start model watcher")?;

    info!("Model watcher enabled - changes will trigger recompilation");
    let handle = rt.block_on(async move {
        manager.start(move |result| {
            let model = match result {
                Ok(model) => model,
                Err(e) => {
                    error!(error = %e, "Failed to load model, keeping previous output");
                    return;
                }
            };
            let written = compile(&model, &options)
                .map_err(anyhow::Error::from)
                .and_then(|routes| write_json(&routes, output.as_deref()));
            match written {
                Ok(()) => info!(routes = model.routes.len(), "Model recompiled"),
                Err(e) => error!(error = %e, "Failed to recompile model, keeping previous output"),
            }
        })
    });

    rt.block_on(handle).context("Model watcher stopped")?;
    Ok(())
}

fn validate(config: &str, options: &CompileOptions) -> Result<()> {
    let source = source_of(config)?;
    let rt = tokio::runtime::Runtime::new()?;
    let model = load(&rt, &DefaultLoader::new(), &source)?;
    let routes = compile(&model, options).context("Failed to compile model")?;

    println!("Model is valid!");
    println!("  Services: {}", model.services.len());
    for name in model.services.keys() {
        let backends = model.upstream_of(name).map_or(0, |u| u.backends.len());
        println!(
            "  - {}: {} routes, {} backends, {} plugins",
            name,
            model.routes_of(name).count(),
            backends,
            model.plugins_of(Some(name.as_str()), None).count()
        );
    }
    println!("  Routes: {}", model.routes.len());
    println!(
        "  Plugins: {} ({} global)",
        model.plugins.len(),
        model.plugins_of(None, None).count()
    );
    println!("  Compiled rules: {}", routes.len());

    Ok(())
}

fn expand(input: &Path, output: Option<&Path>, options: CompileOptions) -> Result<()> {
    let content = std::fs::read_to_string(input)
        .with_context(|| format!("Failed to read {:?}", input))?;
    let mut caddy: serde_json::Value = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse {:?} as JSON", input))?;

    let rt = tokio::runtime::Runtime::new()?;
    let expander = Expander::new(Arc::new(DefaultLoader::new())).with_options(options);
    rt.block_on(expander.expand(&mut caddy))
        .context("Failed to expand olaf handlers")?;

    write_json(&caddy, output)
}
