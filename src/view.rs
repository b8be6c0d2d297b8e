//! Turns a store snapshot into the grid shown to the user.

use serde::Serialize;

use crate::records::SheetSnapshot;

pub const NO_DATA: &str = "No data found.";
pub const URL_HEADER: &str = "URL";
/// Display width of a link cell before it is cut with an ellipsis.
pub const LINK_MAX_WIDTH: u32 = 100;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Cell {
    Text {
        text: String,
    },
    Link {
        text: String,
        href: String,
        single_line: bool,
        ellipsis: bool,
        max_width: u32,
    },
}

impl Cell {
    fn text(value: &str) -> Self {
        Cell::Text {
            text: value.to_string(),
        }
    }

    fn link(value: &str) -> Self {
        Cell::Link {
            text: value.to_string(),
            href: value.to_string(),
            single_line: true,
            ellipsis: true,
            max_width: LINK_MAX_WIDTH,
        }
    }

    pub fn is_link(&self) -> bool {
        matches!(self, Cell::Link { .. })
    }

    pub fn as_text(&self) -> &str {
        match self {
            Cell::Text { text } | Cell::Link { text, .. } => text,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TableView {
    Placeholder {
        message: String,
    },
    Grid {
        header: Vec<String>,
        rows: Vec<Vec<Cell>>,
    },
}

impl TableView {
    pub fn is_placeholder(&self) -> bool {
        matches!(self, TableView::Placeholder { .. })
    }
}

/// Newest application first; cells under the "URL" header become links.
pub fn build_view(snapshot: &SheetSnapshot) -> TableView {
    if snapshot.raw_len() < 2 {
        return TableView::Placeholder {
            message: NO_DATA.to_string(),
        };
    }

    let url_index = snapshot.header.iter().position(|col| col == URL_HEADER);

    let rows = snapshot
        .rows
        .iter()
        .rev()
        .map(|row| {
            row.iter()
                .enumerate()
                .map(|(idx, value)| {
                    if Some(idx) == url_index {
                        Cell::link(value)
                    } else {
                        Cell::text(value)
                    }
                })
                .collect()
        })
        .collect();

    TableView::Grid {
        header: snapshot.header.clone(),
        rows,
    }
}
