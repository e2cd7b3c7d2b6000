use std::fmt::Write;

use chrono::{DateTime, Local, NaiveDate, Utc};
use tracing::{debug, trace};

use crate::block::{Block, Inline, List, ListKind, TableRow, Text};
use crate::config::{Config, Timezone};

/// Delimiter wrapped around a text run when `applies` holds.
/// Rules run in order, innermost wrap first; `last` stops further wrapping.
struct StyleRule {
    applies: fn(&Text) -> bool,
    delimiter: &'static str,
    last: bool,
}

const STYLE_RULES: &[StyleRule] = &[
    StyleRule {
        applies: |text| text.code,
        delimiter: "`",
        last: true,
    },
    StyleRule {
        applies: |text| text.strikethrough,
        delimiter: "~~",
        last: false,
    },
    StyleRule {
        applies: |text| text.bold && text.italic,
        delimiter: "***",
        last: true,
    },
    StyleRule {
        applies: |text| text.bold,
        delimiter: "**",
        last: false,
    },
    StyleRule {
        applies: |text| text.italic,
        delimiter: "*",
        last: false,
    },
];

struct Context<'a> {
    config: &'a Config,
    today: NaiveDate,
}

/// The current calendar date in the given zone.
pub fn today(timezone: Timezone) -> NaiveDate {
    match timezone {
        Timezone::Local => Local::now().date_naive(),
        Timezone::Utc => Utc::now().date_naive(),
    }
}

/// Convert blocks to Markdown, resolving relative dates against `today`.
pub fn blocks_to_markdown(blocks: &[Block], config: &Config, today: NaiveDate) -> String {
    let cx = Context { config, today };
    let mut out = String::new();
    for block in blocks {
        emit_block(block, &cx, &mut out);
    }
    debug!(blocks = blocks.len(), bytes = out.len(), "serialized markdown");
    out
}

fn emit_block(block: &Block, cx: &Context, out: &mut String) {
    match block {
        Block::Paragraph { children } => {
            inlines_to_markdown(children, cx, out);
            out.push_str("\n\n");
        }
        Block::Heading { level, children } => {
            for _ in 0..(*level).clamp(1, 6) {
                out.push('#');
            }
            out.push(' ');
            inlines_to_markdown(children, cx, out);
            out.push_str("\n\n");
        }
        Block::Blockquote { children } => {
            let mut text = String::new();
            inlines_to_markdown(children, cx, &mut text);
            let quoted: Vec<String> = text.split('\n').map(|line| format!("> {line}")).collect();
            out.push_str(&quoted.join("\n"));
            out.push_str("\n\n");
        }
        Block::CodeBlock { language, lines } => {
            out.push_str("```");
            if let Some(lang) = language {
                out.push_str(lang);
            }
            out.push('\n');
            if !lines.is_empty() {
                out.push_str(&lines.join("\n"));
                out.push('\n');
            }
            out.push_str("```\n\n");
        }
        Block::HorizontalRule => {
            out.push_str("---\n\n");
        }
        Block::Image { url, alt_text } => {
            let _ = write!(out, "![{alt_text}]({url})");
            out.push_str("\n\n");
        }
        Block::Date { timestamp } => {
            out.push_str(&date_text(*timestamp, cx));
            out.push_str("\n\n");
        }
        Block::List(list) => {
            list_to_markdown(list, 0, cx, out);
            out.push('\n');
        }
        Block::Table { rows } => {
            table_to_markdown(rows, cx, out);
        }
        Block::Unknown { kind, children } => {
            trace!(kind = %kind, "passing through unknown block");
            for child in children {
                emit_block(child, cx, out);
            }
        }
    }
}

fn inlines_to_markdown(inlines: &[Inline], cx: &Context, out: &mut String) {
    for inline in inlines {
        inline_to_markdown(inline, cx, out);
    }
}

fn inline_to_markdown(inline: &Inline, cx: &Context, out: &mut String) {
    match inline {
        Inline::Text(text) => out.push_str(&styled_text(text)),
        Inline::Link { url, children } => {
            out.push('[');
            inlines_to_markdown(children, cx, out);
            let _ = write!(out, "]({url})");
        }
        Inline::Image { url, caption } => {
            let caption = caption.first().map(Inline::plain_text).unwrap_or_default();
            let _ = write!(out, "![{caption}]({url})");
        }
        Inline::Date { timestamp } => out.push_str(&date_text(*timestamp, cx)),
        Inline::Unknown { kind, children } => {
            trace!(kind = %kind, "passing through unknown inline");
            inlines_to_markdown(children, cx, out);
        }
    }
}

/// Wrap a text run in its style delimiters according to [`STYLE_RULES`].
pub fn styled_text(text: &Text) -> String {
    if text.value.is_empty() {
        return String::new();
    }

    let mut styled = text.value.clone();
    for rule in STYLE_RULES {
        if (rule.applies)(text) {
            styled = format!("{0}{styled}{0}", rule.delimiter);
            if rule.last {
                break;
            }
        }
    }
    styled
}

fn list_to_markdown(list: &List, depth: usize, cx: &Context, out: &mut String) {
    let marker = match list.kind {
        ListKind::Ordered => "1.",
        ListKind::Unordered => cx.config.lists.bullet_marker(),
    };
    let indent_str = " ".repeat(cx.config.lists.indent_width() * depth);

    for item in &list.items {
        out.push_str(&indent_str);
        out.push_str(marker);
        out.push(' ');
        inlines_to_markdown(&item.content, cx, out);
        out.push('\n');

        if let Some(ref sublist) = item.sublist {
            list_to_markdown(sublist, depth + 1, cx, out);
        }
    }
}

fn table_to_markdown(rows: &[TableRow], cx: &Context, out: &mut String) {
    let Some((header, body)) = rows.split_first() else {
        return;
    };

    row_to_markdown(header, cx, out);
    let separator = vec!["---"; header.cells.len().max(1)];
    let _ = writeln!(out, "| {} |", separator.join(" | "));
    for row in body {
        row_to_markdown(row, cx, out);
    }
    out.push('\n');
}

fn row_to_markdown(row: &TableRow, cx: &Context, out: &mut String) {
    let cells: Vec<String> = row
        .cells
        .iter()
        .map(|cell| {
            let mut text = String::new();
            inlines_to_markdown(&cell.content, cx, &mut text);
            text
        })
        .collect();
    let _ = writeln!(out, "| {} |", cells.join(" | "));
}

fn date_text(timestamp: Option<i64>, cx: &Context) -> String {
    let date_config = &cx.config.date;
    let Some(date) = timestamp.and_then(|ms| calendar_date(ms, date_config.timezone)) else {
        return date_config.placeholder.clone();
    };

    if date == cx.today {
        date_config.today.clone()
    } else if Some(date) == cx.today.pred_opt() {
        date_config.yesterday.clone()
    } else if Some(date) == cx.today.succ_opt() {
        date_config.tomorrow.clone()
    } else {
        long_date(date, &date_config.format)
    }
}

fn calendar_date(millis: i64, timezone: Timezone) -> Option<NaiveDate> {
    let instant = DateTime::from_timestamp_millis(millis)?;
    Some(match timezone {
        Timezone::Local => instant.with_timezone(&Local).date_naive(),
        Timezone::Utc => instant.date_naive(),
    })
}

/// Falls back to ISO form when the configured pattern is invalid.
fn long_date(date: NaiveDate, pattern: &str) -> String {
    let mut text = String::new();
    if write!(text, "{}", date.format(pattern)).is_err() {
        return date.format("%Y-%m-%d").to_string();
    }
    text
}
