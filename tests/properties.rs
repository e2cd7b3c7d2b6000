//! Round-trip properties of the Markdown converter.
//!
//! Generated trees stay within what the inline parser can express: plain
//! runs are merged, style combinations are limited to the delimiter forms
//! the parser recognizes, and no date nodes appear (their text depends on
//! the clock).

use chrono::NaiveDate;
use plate_markdown::{
    Block, Config, Inline, List, ListItem, ListKind, TableCell, TableRow, Text, parse,
    to_markdown_as_of,
};
use proptest::option;
use proptest::prelude::*;

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, 15).expect("valid date")
}

fn render(blocks: &[Block]) -> String {
    to_markdown_as_of(blocks, &Config::compiled_default(), today())
}

fn words_strategy() -> impl Strategy<Value = String> {
    "[a-z]{1,6}( [a-z]{1,6}){0,2}"
}

fn text_strategy() -> impl Strategy<Value = Text> {
    (words_strategy(), 0..8u8).prop_map(|(value, style)| {
        let text = Text::plain(value);
        match style {
            0 => text,
            1 => text.bold(),
            2 => text.italic(),
            3 => text.bold().italic(),
            4 => text.strikethrough(),
            5 => text.bold().strikethrough(),
            6 => text.italic().strikethrough(),
            _ => text.code(),
        }
    })
}

fn inline_strategy() -> impl Strategy<Value = Inline> {
    prop_oneof![
        4 => text_strategy().prop_map(Inline::Text),
        1 => ("[a-z]{1,6}", "[a-z]{1,8}").prop_map(|(label, url)| Inline::Link {
            url: format!("https://{url}.dev"),
            children: vec![Inline::text(label)],
        }),
        1 => ("[a-z]{0,6}", "[a-z]{1,8}").prop_map(|(caption, url)| Inline::Image {
            url: format!("/{url}.png"),
            caption: vec![Inline::text(caption)],
        }),
    ]
}

/// Merge adjacent plain runs, as the parser does.
fn merge_plain(inlines: Vec<Inline>) -> Vec<Inline> {
    let mut merged: Vec<Inline> = Vec::new();
    for inline in inlines {
        if let (Some(Inline::Text(last)), Inline::Text(next)) = (merged.last_mut(), &inline) {
            if last.is_plain() && next.is_plain() {
                last.value.push_str(&next.value);
                continue;
            }
        }
        merged.push(inline);
    }
    merged
}

fn inlines_strategy() -> impl Strategy<Value = Vec<Inline>> {
    prop::collection::vec(inline_strategy(), 1..5).prop_map(merge_plain)
}

fn kind_strategy() -> impl Strategy<Value = ListKind> {
    prop_oneof![Just(ListKind::Ordered), Just(ListKind::Unordered)]
}

fn list_strategy() -> impl Strategy<Value = List> {
    let leaf = (kind_strategy(), prop::collection::vec(inlines_strategy(), 1..4)).prop_map(
        |(kind, contents)| List::new(kind, contents.into_iter().map(ListItem::new).collect()),
    );
    leaf.prop_recursive(3, 24, 4, |inner| {
        (
            kind_strategy(),
            prop::collection::vec((inlines_strategy(), option::of(inner)), 1..4),
        )
            .prop_map(|(kind, items)| {
                let items = items
                    .into_iter()
                    .map(|(content, sublist)| ListItem {
                        content,
                        sublist: sublist.map(Box::new),
                    })
                    .collect();
                List::new(kind, items)
            })
    })
}

fn table_strategy() -> impl Strategy<Value = Block> {
    (1..4usize, 0..3usize)
        .prop_flat_map(|(columns, body_rows)| {
            let row = move || prop::collection::vec(inlines_strategy(), columns);
            (row(), prop::collection::vec(row(), body_rows))
        })
        .prop_map(|(header, body)| {
            let make_row = |cells: Vec<Vec<Inline>>, is_header: bool| TableRow {
                cells: cells
                    .into_iter()
                    .map(|content| TableCell { is_header, content })
                    .collect(),
            };
            let mut rows = vec![make_row(header, true)];
            rows.extend(body.into_iter().map(|cells| make_row(cells, false)));
            Block::Table { rows }
        })
}

fn block_strategy() -> impl Strategy<Value = Block> {
    prop_oneof![
        4 => inlines_strategy().prop_map(|children| Block::Paragraph { children }),
        2 => (1..=6u8, inlines_strategy())
            .prop_map(|(level, children)| Block::Heading { level, children }),
        1 => inlines_strategy().prop_map(|children| Block::Blockquote { children }),
        1 => (
            option::of("[a-z]{1,5}"),
            prop::collection::vec("[a-z ;=(){}*#|]{0,12}", 0..4)
        )
            .prop_map(|(language, lines)| Block::CodeBlock { language, lines }),
        1 => Just(Block::HorizontalRule),
        2 => list_strategy().prop_map(Block::List),
        1 => table_strategy(),
    ]
}

proptest! {
    #[test]
    fn parse_inverts_serialize(blocks in prop::collection::vec(block_strategy(), 1..6)) {
        let markdown = render(&blocks);
        prop_assert_eq!(parse(&markdown), blocks, "markdown was:\n{}", markdown);
    }

    #[test]
    fn serialize_is_stable_after_one_pass(blocks in prop::collection::vec(block_strategy(), 1..6)) {
        let once = render(&blocks);
        let twice = render(&parse(&once));
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn parse_never_returns_empty(input in "(?s).{0,200}") {
        let blocks = parse(&input);
        prop_assert!(!blocks.is_empty());
    }

    #[test]
    fn arbitrary_markdown_serializes(input in "[-#*_`~>|\\[\\]()!a-z0-9 \n.]{0,200}") {
        // Every parsed tree has a textual form ending in a block break.
        let markdown = render(&parse(&input));
        prop_assert!(markdown.ends_with("\n\n"), "rendered {:?}", markdown);
    }
}

#[test]
fn heading_levels_round_trip() {
    for level in 1..=6 {
        let markdown = format!("{} Title", "#".repeat(level));
        let expected = format!("{markdown}\n\n");
        assert_eq!(render(&parse(&markdown)), expected);
    }
}

#[test]
fn nested_list_round_trip() {
    let markdown = "- a\n  - b\n  - c\n- d\n";
    let blocks = parse(markdown);
    let Block::List(list) = &blocks[0] else {
        panic!("expected a list, got {blocks:?}");
    };
    assert_eq!(list.items.len(), 2);
    assert_eq!(list.depth(), 2);
    assert_eq!(parse(&render(&blocks)), blocks);
}

#[test]
fn table_round_trip() {
    let markdown = "| Name | Age |\n| --- | --- |\n| Alice | 30 |";
    let blocks = parse(markdown);
    let serialized = render(&blocks);
    assert!(serialized.contains("| --- | --- |"));
    assert_eq!(parse(&serialized), blocks);
}

#[test]
fn code_block_content_survives() {
    let markdown = "```\n**bold** # heading | pipe\n```";
    let blocks = parse(markdown);
    assert_eq!(
        blocks,
        vec![Block::CodeBlock {
            language: None,
            lines: vec!["**bold** # heading | pipe".into()],
        }]
    );
    assert_eq!(render(&blocks), format!("{markdown}\n\n"));
}

// Date nodes are the one deliberate exception to idempotence: the same tree
// renders differently depending on the day it is serialized.
#[test]
fn date_text_depends_on_today() {
    let mut config = Config::compiled_default();
    config.date.timezone = plate_markdown::Timezone::Utc;
    let noon = today()
        .and_hms_opt(12, 0, 0)
        .expect("valid time")
        .and_utc()
        .timestamp_millis();
    let blocks = vec![Block::Date {
        timestamp: Some(noon),
    }];

    let on_the_day = to_markdown_as_of(&blocks, &config, today());
    let day_after = to_markdown_as_of(&blocks, &config, today().succ_opt().expect("next day"));
    let week_later = to_markdown_as_of(
        &blocks,
        &config,
        NaiveDate::from_ymd_opt(2024, 3, 22).expect("valid date"),
    );

    assert_eq!(on_the_day, "Today\n\n");
    assert_eq!(day_after, "Yesterday\n\n");
    assert_eq!(week_later, "March 15, 2024\n\n");
}
