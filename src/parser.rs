use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use tracing::{debug, trace};

use crate::block::{Block, Inline, List, ListItem, ListKind, TableCell, TableRow, Text, non_empty};

const FENCE: &str = "```";

static HEADING: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(#{1,6})\s+(.+)$").unwrap());

static HORIZONTAL_RULE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:\*{3,}|-{3,}|_{3,})$").unwrap());

static LIST_ITEM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\s*)([-*+]|\d+\.)\s+(.*)$").unwrap());

static TABLE_SEPARATOR: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\|[\s\-:|]+\|$").unwrap());

/// Anything up to the next character that could open an inline construct.
static LITERAL_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[^*_`\[!~]+").unwrap());

/// Builds the inline node for a matched rule.
type InlineBuilder = fn(&Captures) -> Inline;

/// Where a rule's match has to end, used to decide in constant time
/// whether the pattern can match at the cursor before running it.
enum Shape {
    /// `open`, at least one character, then `close`.
    Delimited {
        open: &'static str,
        close: &'static str,
    },
    /// `open`, then a non-empty run up to the first `close`.
    Unbroken {
        open: &'static str,
        close: &'static str,
    },
    /// `open`, a label up to the first `]`, then `(url)` with a non-empty url.
    Bracketed {
        open: &'static str,
        empty_label: bool,
    },
}

struct InlineRule {
    shape: Shape,
    pattern: Regex,
    build: InlineBuilder,
}

impl InlineRule {
    fn new(shape: Shape, pattern: &str, build: InlineBuilder) -> Self {
        Self {
            shape,
            pattern: Regex::new(pattern).unwrap(),
            build,
        }
    }
}

fn delimited(open: &'static str, close: &'static str) -> Shape {
    Shape::Delimited { open, close }
}

/// Inline constructs in priority order. The first rule matching at the
/// cursor wins; every quantifier is lazy so adjacent runs don't merge.
static INLINE_RULES: Lazy<Vec<InlineRule>> = Lazy::new(|| {
    vec![
        InlineRule::new(
            Shape::Bracketed {
                open: "![",
                empty_label: true,
            },
            r"^!\[([^\]]*)\]\(([^)]+)\)",
            |caps| Inline::Image {
                url: group(caps, 2).to_string(),
                caption: vec![Inline::text(group(caps, 1))],
            },
        ),
        InlineRule::new(
            Shape::Bracketed {
                open: "[",
                empty_label: false,
            },
            r"^\[([^\]]+)\]\(([^)]+)\)",
            |caps| Inline::Link {
                url: group(caps, 2).to_string(),
                children: vec![Inline::text(group(caps, 1))],
            },
        ),
        InlineRule::new(delimited("***", "***"), r"(?s)^\*\*\*(.+?)\*\*\*", |caps| {
            Text::plain(group(caps, 1)).bold().italic().into()
        }),
        InlineRule::new(delimited("___", "___"), r"(?s)^___(.+?)___", |caps| {
            Text::plain(group(caps, 1)).bold().italic().into()
        }),
        InlineRule::new(delimited("**~~", "~~**"), r"(?s)^\*\*~~(.+?)~~\*\*", |caps| {
            Text::plain(group(caps, 1)).bold().strikethrough().into()
        }),
        InlineRule::new(delimited("*~~", "~~*"), r"(?s)^\*~~(.+?)~~\*", |caps| {
            Text::plain(group(caps, 1)).italic().strikethrough().into()
        }),
        InlineRule::new(delimited("**", "**"), r"(?s)^\*\*(.+?)\*\*", |caps| {
            Text::plain(group(caps, 1)).bold().into()
        }),
        InlineRule::new(delimited("__", "__"), r"(?s)^__(.+?)__", |caps| {
            Text::plain(group(caps, 1)).bold().into()
        }),
        InlineRule::new(delimited("*", "*"), r"(?s)^\*(.+?)\*", |caps| {
            Text::plain(group(caps, 1)).italic().into()
        }),
        InlineRule::new(delimited("_", "_"), r"(?s)^_(.+?)_", |caps| {
            Text::plain(group(caps, 1)).italic().into()
        }),
        InlineRule::new(delimited("~~", "~~"), r"(?s)^~~(.+?)~~", |caps| {
            Text::plain(group(caps, 1)).strikethrough().into()
        }),
        InlineRule::new(
            Shape::Unbroken {
                open: "`",
                close: "`",
            },
            r"^`([^`]+)`",
            |caps| Text::plain(group(caps, 1)).code().into(),
        ),
    ]
});

fn group<'t>(caps: &Captures<'t>, n: usize) -> &'t str {
    caps.get(n).map_or("", |m| m.as_str())
}

/// Closing delimiter positions of one inline run, collected up front so a
/// rule that cannot match is skipped without rescanning the rest of the line.
struct Closers<'t> {
    text: &'t str,
    /// Last offset of each closing delimiter.
    last: Vec<(&'static str, Option<usize>)>,
    brackets: Vec<usize>,
    parens: Vec<usize>,
}

impl<'t> Closers<'t> {
    fn new(text: &'t str) -> Self {
        let mut last: Vec<(&'static str, Option<usize>)> = Vec::new();
        for rule in INLINE_RULES.iter() {
            if let Shape::Delimited { close, .. } | Shape::Unbroken { close, .. } = rule.shape {
                if !last.iter().any(|(known, _)| *known == close) {
                    last.push((close, text.rfind(close)));
                }
            }
        }
        let offsets = |byte: u8| -> Vec<usize> {
            text.bytes()
                .enumerate()
                .filter_map(|(i, b)| (b == byte).then_some(i))
                .collect()
        };
        Self {
            text,
            last,
            brackets: offsets(b']'),
            parens: offsets(b')'),
        }
    }

    /// Whether `close` occurs anywhere at or after `from`.
    fn closes_after(&self, close: &str, from: usize) -> bool {
        self.last
            .iter()
            .find(|(known, _)| *known == close)
            .and_then(|(_, at)| *at)
            .is_some_and(|at| at >= from)
    }

    fn next_in(offsets: &[usize], from: usize) -> Option<usize> {
        offsets.get(offsets.partition_point(|&at| at < from)).copied()
    }

    /// Whether `shape` can match at byte offset `pos`. Exact for every
    /// shape, so a viable rule's regex always succeeds.
    fn viable(&self, shape: &Shape, pos: usize) -> bool {
        let rest = &self.text[pos..];
        match *shape {
            Shape::Delimited { open, close } => {
                rest.starts_with(open) && self.closes_after(close, pos + open.len() + 1)
            }
            Shape::Unbroken { open, close } => {
                let body = pos + open.len();
                rest.starts_with(open)
                    && !self.text[body..].starts_with(close)
                    && self.closes_after(close, body + 1)
            }
            Shape::Bracketed { open, empty_label } => {
                if !rest.starts_with(open) {
                    return false;
                }
                let label = pos + open.len();
                let Some(bracket) = Self::next_in(&self.brackets, label) else {
                    return false;
                };
                if bracket == label && !empty_label {
                    return false;
                }
                if self.text.as_bytes().get(bracket + 1) != Some(&b'(') {
                    return false;
                }
                Self::next_in(&self.parens, bracket + 2).is_some_and(|paren| paren > bracket + 2)
            }
        }
    }
}

/// Parse markdown text into a list of blocks.
///
/// Never fails: lines that match no construct become paragraphs, and blank
/// input yields a single empty paragraph.
pub fn parse(markdown: &str) -> Vec<Block> {
    let lines: Vec<&str> = markdown.lines().collect();
    let mut blocks = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i];
        let trimmed = line.trim();

        if trimmed.is_empty() {
            i += 1;
            continue;
        }

        if let Some(info) = trimmed.strip_prefix(FENCE) {
            let (block, next) = parse_code_block(&lines, i + 1, info);
            blocks.push(block);
            i = next;
            continue;
        }

        if let Some(caps) = HEADING.captures(trimmed) {
            let level = caps[1].len() as u8;
            blocks.push(Block::heading(level, parse_inline(caps[2].trim())));
            i += 1;
            continue;
        }

        if HORIZONTAL_RULE.is_match(trimmed) {
            blocks.push(Block::HorizontalRule);
            i += 1;
            continue;
        }

        if trimmed.starts_with('>') {
            let (block, next) = parse_blockquote(&lines, i);
            blocks.push(block);
            i = next;
            continue;
        }

        if LIST_ITEM.is_match(line) {
            let (lists, next) = parse_lists(&lines, i);
            blocks.extend(lists.into_iter().map(Block::List));
            i = next;
            continue;
        }

        if is_table_line(trimmed) {
            if let Some((block, next)) = parse_table(&lines, i) {
                blocks.push(block);
                i = next;
                continue;
            }
            trace!(line = i, "pipe lines do not form a table");
        }

        blocks.push(Block::paragraph(parse_inline(trimmed)));
        i += 1;
    }

    if blocks.is_empty() {
        blocks.push(Block::empty_paragraph());
    }

    debug!(lines = lines.len(), blocks = blocks.len(), "parsed markdown");
    blocks
}

/// Collect lines after an opening fence until the closing one.
/// Returns the block and the index following the closing fence.
fn parse_code_block(lines: &[&str], start: usize, info: &str) -> (Block, usize) {
    let language = Some(info.trim())
        .filter(|lang| !lang.is_empty())
        .map(str::to_string);

    let mut code = Vec::new();
    let mut i = start;
    while i < lines.len() {
        if lines[i].trim().starts_with(FENCE) {
            return (
                Block::CodeBlock {
                    language,
                    lines: code,
                },
                i + 1,
            );
        }
        code.push(lines[i].to_string());
        i += 1;
    }

    trace!(start, "unterminated code fence runs to end of input");
    (
        Block::CodeBlock {
            language,
            lines: code,
        },
        i,
    )
}

/// Consecutive `>` lines fold into one quote, joined with spaces.
fn parse_blockquote(lines: &[&str], start: usize) -> (Block, usize) {
    let mut parts = Vec::new();
    let mut i = start;
    while i < lines.len() {
        let Some(rest) = lines[i].trim().strip_prefix('>') else {
            break;
        };
        parts.push(rest.strip_prefix(' ').unwrap_or(rest));
        i += 1;
    }

    let text = parts.join(" ");
    (
        Block::Blockquote {
            children: parse_inline(text.trim()),
        },
        i,
    )
}

struct RawItem<'a> {
    indent: usize,
    kind: ListKind,
    text: &'a str,
}

fn raw_item(line: &str) -> Option<RawItem<'_>> {
    let caps = LIST_ITEM.captures(line)?;
    let kind = if caps[2].ends_with('.') {
        ListKind::Ordered
    } else {
        ListKind::Unordered
    };
    Some(RawItem {
        indent: caps[1].chars().count(),
        kind,
        text: caps.get(3).map_or("", |m| m.as_str().trim()),
    })
}

/// Gather the contiguous run of list lines starting at `start` and rebuild
/// its nesting. A run that dedents below its first line yields several lists.
fn parse_lists(lines: &[&str], start: usize) -> (Vec<List>, usize) {
    let mut raw = Vec::new();
    let mut i = start;
    while i < lines.len() {
        match raw_item(lines[i]) {
            Some(item) => raw.push(item),
            None => break,
        }
        i += 1;
    }

    let mut lists = Vec::new();
    let mut cursor = 0;
    while cursor < raw.len() {
        let (list, next) = build_list(&raw, cursor);
        lists.push(list);
        cursor = next;
    }
    (lists, i)
}

/// Build one list from `raw[start..]`, where `raw[start].indent` is the
/// sibling level. Deeper items become the preceding item's sublist.
/// Returns the list and the index of the first item that belongs above it.
fn build_list(raw: &[RawItem], start: usize) -> (List, usize) {
    let base = raw[start].indent;
    let kind = raw[start].kind;
    let mut items: Vec<ListItem> = Vec::new();
    let mut i = start;

    while i < raw.len() {
        let item = &raw[i];
        if item.indent < base {
            break;
        }
        if item.indent > base {
            let (sublist, next) = build_list(raw, i);
            if let Some(parent) = items.last_mut() {
                match parent.sublist.as_deref_mut() {
                    Some(existing) => existing.items.extend(sublist.items),
                    None => parent.sublist = Some(Box::new(sublist)),
                }
            }
            i = next;
            continue;
        }
        items.push(ListItem::new(parse_inline(item.text)));
        i += 1;
    }

    (List::new(kind, items), i)
}

fn is_table_line(trimmed: &str) -> bool {
    trimmed.len() >= 2 && trimmed.starts_with('|') && trimmed.ends_with('|')
}

/// Returns `None` when fewer than two pipe lines are present or every
/// line is a separator.
fn parse_table(lines: &[&str], start: usize) -> Option<(Block, usize)> {
    let mut table_lines = Vec::new();
    let mut i = start;
    while i < lines.len() && is_table_line(lines[i].trim()) {
        table_lines.push(lines[i].trim());
        i += 1;
    }

    if table_lines.len() < 2 {
        return None;
    }

    let has_separator = table_lines.iter().any(|line| TABLE_SEPARATOR.is_match(line));
    let mut seen_separator = false;
    let mut rows = Vec::new();

    for line in table_lines {
        if TABLE_SEPARATOR.is_match(line) {
            seen_separator = true;
            continue;
        }
        let is_header = has_separator && !seen_separator && rows.is_empty();
        rows.push(TableRow {
            cells: split_cells(line)
                .map(|cell| TableCell {
                    is_header,
                    content: parse_inline(cell),
                })
                .collect(),
        });
    }

    if rows.is_empty() {
        return None;
    }
    Some((Block::Table { rows }, i))
}

fn split_cells(line: &str) -> impl Iterator<Item = &str> {
    let line = line.strip_prefix('|').unwrap_or(line);
    let line = line.strip_suffix('|').unwrap_or(line);
    line.split('|').map(str::trim)
}

/// Parse a run of inline markdown into styled spans.
///
/// Always returns at least one node; adjacent literal runs are merged into
/// a single plain text node. Runs in time linear in the input: a rule is
/// only tried once its closing delimiter is known to exist.
pub fn parse_inline(text: &str) -> Vec<Inline> {
    let closers = Closers::new(text);
    let mut spans: Vec<Inline> = Vec::new();
    let mut pos = 0;

    'scan: while pos < text.len() {
        let rest = &text[pos..];
        for rule in INLINE_RULES.iter() {
            if !closers.viable(&rule.shape, pos) {
                continue;
            }
            if let Some(caps) = rule.pattern.captures(rest) {
                pos += caps.get(0).map_or(0, |m| m.end());
                spans.push((rule.build)(&caps));
                continue 'scan;
            }
        }

        let literal_len = match LITERAL_RUN.find(rest) {
            Some(m) => m.end(),
            None => rest.chars().next().map_or(rest.len(), char::len_utf8),
        };
        push_literal(&mut spans, &rest[..literal_len]);
        pos += literal_len;
    }

    non_empty(spans)
}

fn push_literal(spans: &mut Vec<Inline>, literal: &str) {
    if let Some(Inline::Text(last)) = spans.last_mut() {
        if last.is_plain() {
            last.value.push_str(literal);
            return;
        }
    }
    spans.push(Inline::text(literal));
}
