//! Markdown <-> rich-text editor tree conversion.
//!
//! [`parse`] turns Markdown text into a tree of [`Block`]s and
//! [`to_markdown`] turns a tree back into text. Both are pure and never
//! fail: unrecognized input degrades to paragraphs, unrecognized nodes
//! serialize as their children. [`plate`] maps the tree to and from the
//! editor's JSON node shape.

mod block;
mod config;
mod error;
mod parser;
pub mod plate;
mod serializer;

pub use block::{Block, Inline, List, ListItem, ListKind, TableCell, TableRow, Text};
pub use config::{Config, DateConfig, ListsConfig, Timezone};
pub use error::{Error, Result};
pub use serializer::styled_text;

use chrono::NaiveDate;

/// Parse markdown text into a vector of blocks.
pub fn parse(markdown: &str) -> Vec<Block> {
    parser::parse(markdown)
}

/// Parse a single run of inline markdown.
pub fn parse_inline(text: &str) -> Vec<Inline> {
    parser::parse_inline(text)
}

/// Convert blocks to markdown using the default config.
pub fn to_markdown(blocks: &[Block]) -> String {
    to_markdown_with_config(blocks, Config::shared_default())
}

/// Convert blocks to markdown with custom config. Relative dates are
/// resolved against the current date in the configured zone.
pub fn to_markdown_with_config(blocks: &[Block], config: &Config) -> String {
    let today = serializer::today(config.date.timezone);
    serializer::blocks_to_markdown(blocks, config, today)
}

/// Convert blocks to markdown as if it were `today`.
pub fn to_markdown_as_of(blocks: &[Block], config: &Config, today: NaiveDate) -> String {
    serializer::blocks_to_markdown(blocks, config, today)
}
