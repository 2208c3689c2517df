//! # Blockdoc
//!
//! Edit a block document saved on disk.

use blockdoc_cli::{CliArgs, Command, Session};
use blockdoc_core::{BlockKind, Document, EditorConfig};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize structured tracing with optional JSON format.
///
/// Set `RUST_LOG` to control log levels (default: info).
fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_writer(std::io::stderr);

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer.json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();
    init_tracing(args.json);

    let config = EditorConfig::from_env();
    tracing::debug!(
        data_dir = %args.data_dir.display(),
        key = %config.storage_key,
        "Opening document"
    );
    let mut session = Session::open(&args.data_dir, config).await?;

    match args.command {
        Command::Show { raw } => {
            if raw {
                match session.stored_record()? {
                    Some(record) => {
                        let value: serde_json::Value = serde_json::from_str(&record)?;
                        println!("{}", serde_json::to_string_pretty(&value)?);
                    }
                    None => println!("(nothing saved)"),
                }
            } else {
                print_summary(session.document());
            }
            return Ok(());
        }
        Command::AddText { content } => {
            let block = session.add_text(content.as_deref());
            println!("{}", block.id);
        }
        Command::AddImage { path } => {
            let block = session.add_image(&path).await?;
            println!("{}", block.id);
        }
        Command::ReplaceImage { id, path } => session.replace_image(id, &path).await?,
        Command::Link { id, url } => session.link(id, &url)?,
        Command::Style(style) => session.style(&style)?,
        Command::Edit { id, html } => session.edit(id, &html)?,
        Command::Move {
            id,
            x,
            y,
            cols,
            rows,
        } => session.move_block(id, x, y, cols, rows)?,
        Command::Delete { id } => {
            if !session.delete(id) {
                tracing::info!(id = %id, "Nothing to delete");
            }
        }
        Command::Discard => {
            session.discard()?;
            println!("Discarded saved document");
            return Ok(());
        }
    }

    let snapshot = session.save().await?;
    tracing::info!(blocks = snapshot.grid_items.len(), "Document saved");
    Ok(())
}

/// Print one line per block.
fn print_summary(document: &Document) {
    let blocks = document.items().blocks();
    if blocks.is_empty() {
        println!("(empty document)");
        return;
    }
    for block in blocks {
        let detail = match block.kind {
            BlockKind::Text => block.content.clone().unwrap_or_default(),
            BlockKind::Image => document
                .images()
                .get(block.id)
                .map(|record| {
                    let size = record.data_uri.len();
                    match &record.link {
                        Some(link) => format!("{size} byte data URI -> {link}"),
                        None => format!("{size} byte data URI"),
                    }
                })
                .unwrap_or_default(),
        };
        println!(
            "{:>16}  {:<5}  at ({}, {}) {}x{}  {}",
            block.id, block.kind, block.x, block.y, block.cols, block.rows, detail
        );
    }
}
