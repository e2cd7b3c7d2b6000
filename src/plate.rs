//! Editor node JSON
//!
//! The rich-text editor exchanges documents as arrays of element objects:
//!
//! | Tree                 | Editor node                                         |
//! |----------------------|-----------------------------------------------------|
//! | `Text`               | `{"text", "bold"?, "italic"?, "strikethrough"?, "code"?}` |
//! | `Paragraph`          | `{"type": "p", "children"}`                         |
//! | `Heading`            | `{"type": "h1".."h6", "children"}`                  |
//! | `Blockquote`         | `{"type": "blockquote", "children"}`                |
//! | `CodeBlock`          | `{"type": "code_block", "lang"?, "children": [code_line]}` |
//! | `HorizontalRule`     | `{"type": "hr"}`                                    |
//! | `Image`              | `{"type": "img", "url", "caption"}`                 |
//! | `Date`               | `{"type": "date", "date"}`                          |
//! | `List`               | `{"type": "ul" / "ol", "children": [li]}`           |
//! | `ListItem`           | `{"type": "li", "children": [lic, ul/ol?]}`         |
//! | `Table`              | `{"type": "table", "children": [tr]}`               |
//! | `TableCell`          | `{"type": "th" / "td", "children": [p]}`            |
//! | `Link`               | `{"type": "a", "url", "children"}`                  |
//!
//! Void elements (`hr`, `img`, `date`) still carry one empty text child.
//! Unrecognized `type`s are kept as `Unknown` and written back unchanged.
//!
//! Reading is lenient: missing children become a single empty text leaf and
//! entries that are not objects are skipped.

use serde_json::{Map, Value, json};

use crate::block::{Block, Inline, List, ListItem, ListKind, TableCell, TableRow, Text, non_empty};
use crate::error::Result;

/// Convert blocks to the editor's node array.
pub fn to_value(blocks: &[Block]) -> Value {
    Value::Array(blocks.iter().map(block_to_value).collect())
}

/// Serialize blocks to editor JSON text.
pub fn to_json_string(blocks: &[Block], pretty: bool) -> String {
    let value = to_value(blocks);
    if pretty {
        serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string())
    } else {
        value.to_string()
    }
}

/// Parse editor JSON text. Only malformed JSON is an error.
pub fn from_json_str(json: &str) -> Result<Vec<Block>> {
    let value: Value = serde_json::from_str(json)?;
    Ok(from_value(&value))
}

/// Read blocks from an editor node array, a single element, or a
/// `{"children": [...]}` document root.
pub fn from_value(value: &Value) -> Vec<Block> {
    let blocks: Vec<Block> = match value {
        Value::Array(nodes) => nodes.iter().filter_map(block_from_value).collect(),
        Value::Object(node) if node.contains_key("type") || node.contains_key("text") => {
            block_from_value(value).into_iter().collect()
        }
        Value::Object(node) => children_of(node)
            .iter()
            .filter_map(block_from_value)
            .collect(),
        _ => Vec::new(),
    };

    if blocks.is_empty() {
        vec![Block::empty_paragraph()]
    } else {
        blocks
    }
}

fn element(kind: &str, children: Vec<Value>) -> Value {
    json!({ "type": kind, "children": children })
}

fn empty_leaf() -> Value {
    json!({ "text": "" })
}

fn block_to_value(block: &Block) -> Value {
    match block {
        Block::Paragraph { children } => element("p", inlines_to_values(children)),
        Block::Heading { level, children } => {
            element(&format!("h{}", (*level).clamp(1, 6)), inlines_to_values(children))
        }
        Block::Blockquote { children } => element("blockquote", inlines_to_values(children)),
        Block::CodeBlock { language, lines } => {
            let code_lines: Vec<Value> = if lines.is_empty() {
                vec![empty_leaf()]
            } else {
                lines
                    .iter()
                    .map(|line| element("code_line", vec![json!({ "text": line })]))
                    .collect()
            };
            let mut node = element("code_block", code_lines);
            if let Some(lang) = language {
                node["lang"] = json!(lang);
            }
            node
        }
        Block::HorizontalRule => element("hr", vec![empty_leaf()]),
        Block::Image { url, alt_text } => json!({
            "type": "img",
            "url": url,
            "caption": [{ "text": alt_text }],
            "children": [empty_leaf()],
        }),
        Block::Date { timestamp } => date_to_value(*timestamp),
        Block::List(list) => list_to_value(list),
        Block::Table { rows } => element("table", rows.iter().map(row_to_value).collect()),
        Block::Unknown { kind, children } => {
            element(kind, children.iter().map(block_to_value).collect())
        }
    }
}

fn date_to_value(timestamp: Option<i64>) -> Value {
    json!({ "type": "date", "date": timestamp, "children": [empty_leaf()] })
}

fn list_to_value(list: &List) -> Value {
    let kind = match list.kind {
        ListKind::Ordered => "ol",
        ListKind::Unordered => "ul",
    };
    let items = list
        .items
        .iter()
        .map(|item| {
            let mut children = vec![element("lic", inlines_to_values(&item.content))];
            if let Some(ref sublist) = item.sublist {
                children.push(list_to_value(sublist));
            }
            element("li", children)
        })
        .collect();
    element(kind, items)
}

fn row_to_value(row: &TableRow) -> Value {
    let cells = row
        .cells
        .iter()
        .map(|cell| {
            let kind = if cell.is_header { "th" } else { "td" };
            element(kind, vec![element("p", inlines_to_values(&cell.content))])
        })
        .collect();
    element("tr", cells)
}

fn inlines_to_values(inlines: &[Inline]) -> Vec<Value> {
    inlines.iter().map(inline_to_value).collect()
}

fn inline_to_value(inline: &Inline) -> Value {
    match inline {
        Inline::Text(text) => text_to_value(text),
        Inline::Link { url, children } => {
            let mut node = element("a", inlines_to_values(children));
            node["url"] = json!(url);
            node
        }
        Inline::Image { url, caption } => json!({
            "type": "img",
            "url": url,
            "caption": inlines_to_values(caption),
            "children": [empty_leaf()],
        }),
        Inline::Date { timestamp } => date_to_value(*timestamp),
        Inline::Unknown { kind, children } => element(kind, inlines_to_values(children)),
    }
}

fn text_to_value(text: &Text) -> Value {
    let mut leaf = Map::new();
    leaf.insert("text".into(), json!(text.value));
    for (flag, set) in [
        ("bold", text.bold),
        ("italic", text.italic),
        ("strikethrough", text.strikethrough),
        ("code", text.code),
    ] {
        if set {
            leaf.insert(flag.into(), Value::Bool(true));
        }
    }
    Value::Object(leaf)
}

fn children_of(node: &Map<String, Value>) -> &[Value] {
    node.get("children")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

fn kind_of(node: &Map<String, Value>) -> Option<&str> {
    node.get("type").and_then(Value::as_str)
}

fn string_field(node: &Map<String, Value>, key: &str) -> String {
    node.get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn timestamp_field(node: &Map<String, Value>) -> Option<i64> {
    let date = node.get("date")?;
    date.as_i64().or_else(|| date.as_f64().map(|ms| ms as i64))
}

fn is_leaf(node: &Value) -> bool {
    node.get("text").is_some_and(Value::is_string)
}

fn block_from_value(value: &Value) -> Option<Block> {
    let node = value.as_object()?;
    if is_leaf(value) {
        return Some(Block::paragraph(inline_from_value(value).into_iter().collect()));
    }

    let kind = kind_of(node)?;
    let block = match kind {
        "p" | "paragraph" => Block::paragraph(inlines_from_values(children_of(node))),
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
            let level = kind[1..].parse().unwrap_or(1);
            Block::heading(level, inlines_from_values(children_of(node)))
        }
        "blockquote" => Block::Blockquote {
            children: inlines_from_values(children_of(node)),
        },
        "code_block" => Block::CodeBlock {
            language: node
                .get("lang")
                .and_then(Value::as_str)
                .filter(|lang| !lang.is_empty())
                .map(str::to_string),
            lines: children_of(node)
                .iter()
                .filter_map(Value::as_object)
                .filter(|line| kind_of(line) == Some("code_line"))
                .map(|line| plain_text_of(children_of(line)))
                .collect(),
        },
        "hr" => Block::HorizontalRule,
        "img" => Block::Image {
            url: string_field(node, "url"),
            alt_text: node
                .get("caption")
                .and_then(Value::as_array)
                .map(|caption| plain_text_of(caption))
                .unwrap_or_default(),
        },
        "date" => Block::Date {
            timestamp: timestamp_field(node),
        },
        "ul" | "ol" => Block::List(list_from_value(node)),
        "table" => Block::Table {
            rows: children_of(node)
                .iter()
                .filter_map(Value::as_object)
                .filter(|row| kind_of(row) == Some("tr"))
                .map(row_from_value)
                .collect(),
        },
        other => Block::Unknown {
            kind: other.to_string(),
            children: unknown_block_children(children_of(node)),
        },
    };
    Some(block)
}

/// Children of an unrecognized element: inline runs are wrapped in a
/// paragraph, anything else is read as blocks.
fn unknown_block_children(children: &[Value]) -> Vec<Block> {
    if children.iter().any(is_leaf) {
        return vec![Block::paragraph(inlines_from_values(children))];
    }
    children.iter().filter_map(block_from_value).collect()
}

fn list_from_value(node: &Map<String, Value>) -> List {
    let kind = if kind_of(node) == Some("ol") {
        ListKind::Ordered
    } else {
        ListKind::Unordered
    };

    let items: Vec<ListItem> = children_of(node)
        .iter()
        .filter_map(Value::as_object)
        .filter(|item| kind_of(item) == Some("li"))
        .map(item_from_value)
        .collect();

    if items.is_empty() {
        return List::new(kind, vec![ListItem::new(vec![Inline::empty()])]);
    }
    List::new(kind, items)
}

fn item_from_value(node: &Map<String, Value>) -> ListItem {
    let children = children_of(node);
    let mut content = Vec::new();
    let mut sublist = None;

    for child in children {
        let Some(child_node) = child.as_object() else {
            continue;
        };
        match kind_of(child_node) {
            Some("lic") => content.extend(inlines_from_values(children_of(child_node))),
            Some("ul" | "ol") if sublist.is_none() => {
                sublist = Some(Box::new(list_from_value(child_node)));
            }
            _ => content.extend(inline_from_value(child)),
        }
    }

    ListItem {
        content: non_empty(content),
        sublist,
    }
}

fn row_from_value(node: &Map<String, Value>) -> TableRow {
    let cells = children_of(node)
        .iter()
        .filter_map(Value::as_object)
        .filter(|cell| matches!(kind_of(cell), Some("th" | "td")))
        .map(|cell| TableCell {
            is_header: kind_of(cell) == Some("th"),
            content: non_empty(cell_inlines(children_of(cell))),
        })
        .collect();
    TableRow { cells }
}

/// Cells hold paragraphs; their inline runs are concatenated.
fn cell_inlines(children: &[Value]) -> Vec<Inline> {
    let mut inlines = Vec::new();
    for child in children {
        match child.as_object() {
            Some(node) if matches!(kind_of(node), Some("p" | "paragraph")) => {
                inlines.extend(cell_inlines(children_of(node)));
            }
            _ => inlines.extend(inline_from_value(child)),
        }
    }
    inlines
}

fn inlines_from_values(values: &[Value]) -> Vec<Inline> {
    non_empty(values.iter().filter_map(inline_from_value).collect())
}

fn inline_from_value(value: &Value) -> Option<Inline> {
    let node = value.as_object()?;
    if let Some(text) = node.get("text").and_then(Value::as_str) {
        let flag = |key: &str| node.get(key).and_then(Value::as_bool).unwrap_or(false);
        return Some(Inline::Text(Text {
            value: text.to_string(),
            bold: flag("bold"),
            italic: flag("italic"),
            strikethrough: flag("strikethrough"),
            code: flag("code"),
        }));
    }

    let inline = match kind_of(node)? {
        "a" => Inline::Link {
            url: string_field(node, "url"),
            children: inlines_from_values(children_of(node)),
        },
        "img" => Inline::Image {
            url: string_field(node, "url"),
            caption: inlines_from_values(
                node.get("caption")
                    .and_then(Value::as_array)
                    .map(Vec::as_slice)
                    .unwrap_or_default(),
            ),
        },
        "date" => Inline::Date {
            timestamp: timestamp_field(node),
        },
        other => Inline::Unknown {
            kind: other.to_string(),
            children: inlines_from_values(children_of(node)),
        },
    };
    Some(inline)
}

fn plain_text_of(values: &[Value]) -> String {
    values
        .iter()
        .filter_map(inline_from_value)
        .map(|inline| inline.plain_text())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    #[test]
    fn text_leaf_only_carries_set_flags() {
        let blocks = vec![Block::paragraph(vec![Text::plain("hi").bold().into()])];
        assert_eq!(
            to_value(&blocks),
            json!([{ "type": "p", "children": [{ "text": "hi", "bold": true }] }])
        );
    }

    #[test]
    fn nested_list_shape() {
        let value = to_value(&parse("1. a\n  - b"));
        assert_eq!(
            value,
            json!([{
                "type": "ol",
                "children": [{
                    "type": "li",
                    "children": [
                        { "type": "lic", "children": [{ "text": "a" }] },
                        {
                            "type": "ul",
                            "children": [{
                                "type": "li",
                                "children": [{ "type": "lic", "children": [{ "text": "b" }] }],
                            }],
                        },
                    ],
                }],
            }])
        );
    }

    #[test]
    fn editor_tree_round_trips() {
        let markdown = "# Title\n\n> quoted **bold**\n\n```rust\nfn main() {}\n```\n\n---\n\n| A | B |\n| --- | --- |\n| 1 | [x](u) |\n\n- a\n  1. b\n\ntext ![cap](/c.png)";
        let blocks = parse(markdown);
        assert_eq!(from_value(&to_value(&blocks)), blocks);
    }

    #[test]
    fn date_and_image_blocks_round_trip() {
        let blocks = vec![
            Block::Date {
                timestamp: Some(1_700_000_000_000),
            },
            Block::Date { timestamp: None },
            Block::Image {
                url: "/a.png".into(),
                alt_text: "alt".into(),
            },
        ];
        assert_eq!(from_value(&to_value(&blocks)), blocks);
    }

    #[test]
    fn unknown_types_are_preserved() {
        let value = json!([{
            "type": "callout",
            "children": [{ "text": "note " }, { "type": "mention", "children": [{ "text": "@sam" }] }],
        }]);
        let blocks = from_value(&value);
        assert_eq!(
            blocks,
            vec![Block::Unknown {
                kind: "callout".into(),
                children: vec![Block::paragraph(vec![
                    Inline::text("note "),
                    Inline::Unknown {
                        kind: "mention".into(),
                        children: vec![Inline::text("@sam")],
                    },
                ])],
            }]
        );
    }

    #[test]
    fn missing_children_get_an_empty_leaf() {
        let blocks = from_value(&json!([{ "type": "h2" }, { "type": "ul" }]));
        assert_eq!(blocks[0], Block::heading(2, vec![]));
        assert_eq!(
            blocks[1],
            Block::List(List::new(
                ListKind::Unordered,
                vec![ListItem::new(vec![Inline::empty()])]
            ))
        );
    }

    #[test]
    fn document_root_and_garbage() {
        let root = json!({ "children": [{ "type": "p", "children": [{ "text": "x" }] }, 42, "str"] });
        assert_eq!(from_value(&root), vec![Block::paragraph(vec![Inline::text("x")])]);
        assert_eq!(from_value(&json!(null)), vec![Block::empty_paragraph()]);
        assert_eq!(from_value(&json!([])), vec![Block::empty_paragraph()]);
    }

    #[test]
    fn float_timestamps_are_accepted() {
        let blocks = from_value(&json!([{ "type": "date", "date": 1.5e12 }]));
        assert_eq!(
            blocks,
            vec![Block::Date {
                timestamp: Some(1_500_000_000_000)
            }]
        );
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(from_json_str("[{").is_err());
        assert_eq!(
            from_json_str(r#"[{"type":"p","children":[{"text":"ok"}]}]"#).expect("valid json"),
            vec![Block::paragraph(vec![Inline::text("ok")])]
        );
    }
}
