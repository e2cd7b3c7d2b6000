/// A run of text with independently combinable style flags
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Text {
    pub value: String,
    pub bold: bool,
    pub italic: bool,
    pub strikethrough: bool,
    pub code: bool,
}

impl Text {
    pub fn plain(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            ..Self::default()
        }
    }

    /// The placeholder child used wherever an element would otherwise be empty.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn bold(mut self) -> Self {
        self.bold = true;
        self
    }

    pub fn italic(mut self) -> Self {
        self.italic = true;
        self
    }

    pub fn strikethrough(mut self) -> Self {
        self.strikethrough = true;
        self
    }

    pub fn code(mut self) -> Self {
        self.code = true;
        self
    }

    pub fn is_plain(&self) -> bool {
        !(self.bold || self.italic || self.strikethrough || self.code)
    }
}

/// Inline content living inside a block
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inline {
    Text(Text),
    Link {
        url: String,
        children: Vec<Inline>,
    },
    Image {
        url: String,
        caption: Vec<Inline>,
    },
    /// Milliseconds since the Unix epoch; `None` renders the placeholder.
    Date {
        timestamp: Option<i64>,
    },
    /// An element type we don't recognize. Serialized as its children.
    Unknown {
        kind: String,
        children: Vec<Inline>,
    },
}

impl Inline {
    pub fn text(value: impl Into<String>) -> Self {
        Inline::Text(Text::plain(value))
    }

    pub fn empty() -> Self {
        Inline::Text(Text::empty())
    }

    /// Concatenated text of this node without any styling.
    pub fn plain_text(&self) -> String {
        match self {
            Inline::Text(text) => text.value.clone(),
            Inline::Link { children, .. } | Inline::Unknown { children, .. } => {
                children.iter().map(Inline::plain_text).collect()
            }
            Inline::Image { caption, .. } => caption.iter().map(Inline::plain_text).collect(),
            Inline::Date { .. } => String::new(),
        }
    }
}

impl From<Text> for Inline {
    fn from(text: Text) -> Self {
        Inline::Text(text)
    }
}

/// Ordered (numbered) or unordered (bulleted)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListKind {
    Ordered,
    Unordered,
}

/// A single list item, optionally owning a nested list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListItem {
    pub content: Vec<Inline>,
    pub sublist: Option<Box<List>>,
}

impl ListItem {
    pub fn new(content: Vec<Inline>) -> Self {
        Self {
            content,
            sublist: None,
        }
    }

    pub fn with_sublist(mut self, list: List) -> Self {
        self.sublist = Some(Box::new(list));
        self
    }
}

/// A list (ordered or unordered)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct List {
    pub kind: ListKind,
    pub items: Vec<ListItem>,
}

impl List {
    pub fn new(kind: ListKind, items: Vec<ListItem>) -> Self {
        Self { kind, items }
    }

    pub fn is_ordered(&self) -> bool {
        self.kind == ListKind::Ordered
    }

    /// Number of levels including this one.
    pub fn depth(&self) -> usize {
        1 + self
            .items
            .iter()
            .filter_map(|item| item.sublist.as_deref())
            .map(List::depth)
            .max()
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableCell {
    pub is_header: bool,
    pub content: Vec<Inline>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRow {
    pub cells: Vec<TableCell>,
}

impl TableRow {
    pub fn is_header(&self) -> bool {
        !self.cells.is_empty() && self.cells.iter().all(|cell| cell.is_header)
    }
}

/// Block-level elements of a document
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Paragraph {
        children: Vec<Inline>,
    },
    Heading {
        level: u8,
        children: Vec<Inline>,
    },
    List(List),
    Table {
        rows: Vec<TableRow>,
    },
    CodeBlock {
        language: Option<String>,
        lines: Vec<String>,
    },
    Blockquote {
        children: Vec<Inline>,
    },
    HorizontalRule,
    Image {
        url: String,
        alt_text: String,
    },
    Date {
        timestamp: Option<i64>,
    },
    Unknown {
        kind: String,
        children: Vec<Block>,
    },
}

impl Block {
    /// A paragraph holding a single empty text run.
    pub fn empty_paragraph() -> Self {
        Block::Paragraph {
            children: vec![Inline::empty()],
        }
    }

    pub fn paragraph(children: Vec<Inline>) -> Self {
        Block::Paragraph {
            children: non_empty(children),
        }
    }

    pub fn heading(level: u8, children: Vec<Inline>) -> Self {
        Block::Heading {
            level: level.clamp(1, 6),
            children: non_empty(children),
        }
    }
}

/// Substitute a single empty text run for an empty child list.
pub fn non_empty(children: Vec<Inline>) -> Vec<Inline> {
    if children.is_empty() {
        vec![Inline::empty()]
    } else {
        children
    }
}
