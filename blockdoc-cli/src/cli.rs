//! Command-line arguments.

use std::path::PathBuf;

use blockdoc_core::{BlockId, Color, FontSize, TextAlign, VerticalAlign};
use clap::{Parser, Subcommand};

/// Command-line arguments for blockdoc.
#[derive(Debug, Clone, Parser)]
#[command(name = "blockdoc")]
#[command(about = "Edit block documents saved on disk")]
#[command(version)]
pub struct CliArgs {
    /// Directory holding saved documents
    #[arg(long, env = "BLOCKDOC_DATA_DIR", default_value = ".blockdoc")]
    pub data_dir: PathBuf,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Command to run
    #[command(subcommand)]
    pub command: Command,
}

/// Document commands. Every command except `show` saves afterwards.
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Print the saved document
    Show {
        /// Print the stored JSON record instead of a summary
        #[arg(long)]
        raw: bool,
    },

    /// Append a text block
    AddText {
        /// Initial HTML content
        #[arg(long)]
        content: Option<String>,
    },

    /// Append an image block from a file
    AddImage {
        /// Image file (png, jpg, gif, svg, webp)
        path: PathBuf,
    },

    /// Replace the image of an image block
    ReplaceImage {
        /// Block id
        id: BlockId,
        /// Image file
        path: PathBuf,
    },

    /// Set the hyperlink of an image block (empty to clear)
    Link {
        /// Block id
        id: BlockId,
        /// Link target; a missing scheme becomes https
        url: String,
    },

    /// Change the style of a block
    Style(StyleArgs),

    /// Replace the HTML content of a text block
    Edit {
        /// Block id
        id: BlockId,
        /// New content
        html: String,
    },

    /// Move or resize a block
    Move {
        /// Block id
        id: BlockId,
        /// Column
        x: u32,
        /// Row
        y: u32,
        /// Width in cells
        #[arg(long)]
        cols: Option<u32>,
        /// Height in cells
        #[arg(long)]
        rows: Option<u32>,
    },

    /// Delete a block
    Delete {
        /// Block id
        id: BlockId,
    },

    /// Remove the saved document
    Discard,
}

/// Style changes; unset options keep the current value.
#[derive(Debug, Clone, clap::Args)]
pub struct StyleArgs {
    /// Block id
    pub id: BlockId,

    /// Bold text
    #[arg(long, conflicts_with = "plain")]
    pub bold: bool,

    /// Italic text
    #[arg(long, conflicts_with = "plain")]
    pub italic: bool,

    /// Reset weight and style to normal
    #[arg(long)]
    pub plain: bool,

    /// Font size: small, medium, large or xlarge
    #[arg(long)]
    pub size: Option<FontSize>,

    /// Horizontal alignment: left, center or right
    #[arg(long)]
    pub align: Option<TextAlign>,

    /// Vertical alignment: top, middle or bottom
    #[arg(long)]
    pub valign: Option<VerticalAlign>,

    /// Text colour (#rrggbb, #rgb or rgb())
    #[arg(long, value_parser = Color::parse)]
    pub color: Option<Color>,

    /// Background colour
    #[arg(long, value_parser = Color::parse)]
    pub background: Option<Color>,

    /// Border colour
    #[arg(long, value_parser = Color::parse)]
    pub border: Option<Color>,
}
