// src/main.rs
use anyhow::Context;
use clap::Parser;
use lark_kit::config::{Command, CommandLineInput};
use lark_kit::model::filter_map;
use lark_kit::{LarkApp, LarkConfig};
use log::LevelFilter;
use log4rs::{
    append::console::{ConsoleAppender, Target},
    append::file::FileAppender,
    config::{Appender, Root},
    encode::pattern::PatternEncoder,
    filter::threshold::ThresholdFilter,
    Config,
};
use serde::Serialize;
use std::fs;

/// Sets up logging configuration.
///
/// Console output goes to stderr so stdout stays valid JSON.
fn setup_logging(verbose: bool) -> anyhow::Result<()> {
    let log_level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };

    let log_file_path = std::env::temp_dir().join("lark-kit.log");
    if let Some(parent) = log_file_path.parent() {
        fs::create_dir_all(parent)?;
    }

    let pattern = if verbose {
        "{d(%Y-%m-%d %H:%M:%S)} [{l}] - {m}{n}"
    } else {
        "[{l}] {m}{n}"
    };

    let stderr_appender = ConsoleAppender::builder()
        .target(Target::Stderr)
        .encoder(Box::new(PatternEncoder::new(pattern)))
        .build();

    let file_appender = FileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(
            "{d(%Y-%m-%d %H:%M:%S)} [{l}] {t} - {m}{n}",
        )))
        .build(&log_file_path)?;

    let config = Config::builder()
        .appender(Appender::builder().build("stderr", Box::new(stderr_appender)))
        .appender(
            Appender::builder()
                .filter(Box::new(ThresholdFilter::new(LevelFilter::Debug)))
                .build("file", Box::new(file_appender)),
        )
        .build(
            Root::builder()
                .appender("stderr")
                .appender("file")
                .build(log_level),
        )?;

    log4rs::init_config(config)?;
    log::info!("Logging initialized. Log file: {}", log_file_path.display());
    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run(app: &LarkApp, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Document { id, tree } => {
            let resolver = app.block_resolver(None);
            let document = app
                .document(&id)
                .get_renderable(&resolver)
                .await
                .with_context(|| format!("Failed to read document {}", id))?;
            log::info!(
                "Document {} resolved into {} blocks ({} files)",
                id,
                document.blocks.len(),
                document.files.len()
            );
            if tree {
                print_json(&document.tree())
            } else {
                print_json(&document.blocks)
            }
        }
        Command::Tables { app: app_id } => {
            let mut tables = app.tables(&app_id);
            let items = tables
                .get_all(&())
                .await
                .with_context(|| format!("Failed to list tables of {}", app_id))?;
            print_json(items)
        }
        Command::Records {
            app: app_id,
            table,
            filters,
            view,
        } => {
            let mut records = app.records(&app_id, &table);
            let items = match view {
                Some(view_id) => records.get_view_all(&view_id).await?,
                None => records.get_all(&filter_map(filters)).await?.to_vec(),
            };
            log::info!("Loaded {} records from {}", items.len(), table);
            print_json(&items)
        }
        Command::Wiki { space } => {
            let nodes = app
                .wiki_nodes(&space)
                .adapter()
                .traverse_tree(app.transport(), None)
                .await
                .with_context(|| format!("Failed to walk wiki space {}", space))?;
            print_json(&nodes)
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CommandLineInput::parse();

    setup_logging(cli.verbose).context("Failed to initialize logging")?;

    let config = LarkConfig::resolve(&cli)?;
    log::debug!("Resolved configuration: {:?}", config);

    let app = LarkApp::new(config)?;
    run(&app, cli.command).await
}
