use super::fen::PositionComponents;
use std::borrow::Cow;

pub const ECO_HEADER: &str = "ECO";
pub const NAME_HEADER: &str = "Name";
pub const PGN_HEADER: &str = "PGN";
pub const KEY_HEADER: &str = "Key";

pub const DERIVED_COLUMN_COUNT: usize = 15;

/// Columns written by the backfill, in sheet order.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DerivedColumn {
    Fen = 0,
    Board = 1,
    Active = 2,
    Castle = 3,
    EnPassant = 4,
    Halfmove = 5,
    Fullmove = 6,
    Rank8 = 7,
    Rank7 = 8,
    Rank6 = 9,
    Rank5 = 10,
    Rank4 = 11,
    Rank3 = 12,
    Rank2 = 13,
    Rank1 = 14,
}

pub const DERIVED_HEADERS: [&str; DERIVED_COLUMN_COUNT] = [
    "FEN",
    "FEN_board",
    "FEN_active",
    "FEN_castle",
    "FEN_ep",
    "FEN_halfmove",
    "FEN_fullmove",
    "FEN_r8",
    "FEN_r7",
    "FEN_r6",
    "FEN_r5",
    "FEN_r4",
    "FEN_r3",
    "FEN_r2",
    "FEN_r1",
];

impl DerivedColumn {
    pub const fn index(self) -> usize {
        self as usize
    }

    pub fn header(self) -> &'static str {
        DERIVED_HEADERS[self.index()]
    }
}

/// Cells for every derived column except `FEN` itself, in `DERIVED_HEADERS` order.
pub fn component_cells(components: &PositionComponents) -> Vec<Cell> {
    let mut cells = Vec::with_capacity(DERIVED_COLUMN_COUNT - 1);
    cells.push(Cell::text(components.board.as_str()));
    cells.push(Cell::text(components.active.as_str()));
    cells.push(Cell::text(components.castling.as_str()));
    cells.push(Cell::text(components.en_passant.as_str()));
    cells.push(number_cell(&components.halfmove));
    cells.push(number_cell(&components.fullmove));
    cells.extend(components.ranks.iter().map(|r| Cell::text(r.as_str())));
    cells
}

fn number_cell(raw: &str) -> Cell {
    raw.parse::<i64>()
        .map(Cell::Int)
        .unwrap_or_else(|_| Cell::text(raw))
}

/// One game's raw text as produced by the splitter.
///
/// `starting_position_active` mirrors the `SetUp` tag: `None` when the tag is
/// absent, `Some(true)` for `"1"`/`"true"`, `Some(false)` for anything else.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GameRecord {
    pub text: String,
    pub starting_position: Option<String>,
    pub starting_position_active: Option<bool>,
}

impl GameRecord {
    /// The declared start position, if it is authoritative for this game.
    pub fn effective_start(&self) -> Option<&str> {
        match self.starting_position_active {
            None | Some(true) => self.starting_position.as_deref(),
            Some(false) => None,
        }
    }
}

/// A single value in the row store.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Cell {
    #[default]
    Empty,
    Text(String),
    Int(i64),
    Bool(bool),
}

impl Cell {
    pub fn text(value: impl Into<String>) -> Self {
        let value = value.into();
        if value.is_empty() {
            Self::Empty
        } else {
            Self::Text(value)
        }
    }

    pub fn as_text(&self) -> Cow<'_, str> {
        match self {
            Self::Empty => Cow::Borrowed(""),
            Self::Text(s) => Cow::Borrowed(s.as_str()),
            Self::Int(n) => Cow::Owned(n.to_string()),
            Self::Bool(b) => Cow::Owned(b.to_string()),
        }
    }

    /// True for empty cells and whitespace-only text.
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Text(s) => s.trim().is_empty(),
            Self::Int(_) | Self::Bool(_) => false,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Empty => serde_json::Value::String(String::new()),
            Self::Text(s) => serde_json::Value::String(s.clone()),
            Self::Int(n) => serde_json::Value::from(*n),
            Self::Bool(b) => serde_json::Value::Bool(*b),
        }
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Self::text(value)
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Self::text(value)
    }
}

impl From<i64> for Cell {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}
