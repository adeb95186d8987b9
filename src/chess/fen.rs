//! Position codec.
//!
//! Splits a FEN string into its six fields and eight rank strings. Decoding
//! never fails: missing trailing fields and ranks come back empty, so rows that
//! have not been computed yet decode to an all-empty value.

pub const FEN_FIELD_COUNT: usize = 6;
pub const RANK_COUNT: usize = 8;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PositionComponents {
    pub board: String,
    pub active: String,
    pub castling: String,
    pub en_passant: String,
    pub halfmove: String,
    pub fullmove: String,
    /// Rank 8 first, rank 1 last.
    pub ranks: [String; RANK_COUNT],
}

impl PositionComponents {
    pub fn is_empty(&self) -> bool {
        self.fields().iter().all(|f| f.is_empty())
    }

    pub fn fields(&self) -> [&str; FEN_FIELD_COUNT] {
        [
            &self.board,
            &self.active,
            &self.castling,
            &self.en_passant,
            &self.halfmove,
            &self.fullmove,
        ]
    }

    pub fn halfmove_clock(&self) -> Option<u32> {
        self.halfmove.parse().ok()
    }

    pub fn fullmove_number(&self) -> Option<u32> {
        self.fullmove.parse().ok().filter(|n| *n > 0)
    }
}

pub fn decode(position: &str) -> PositionComponents {
    let mut tokens = position.split_whitespace();
    let mut next = || tokens.next().unwrap_or_default().to_string();

    let board = next();
    let active = next();
    let castling = next();
    let en_passant = next();
    let halfmove = next();
    let fullmove = next();

    let mut ranks: [String; RANK_COUNT] = Default::default();
    if !board.is_empty() {
        for (slot, rank) in ranks.iter_mut().zip(board.split('/')) {
            *slot = rank.to_string();
        }
    }

    PositionComponents {
        board,
        active,
        castling,
        en_passant,
        halfmove,
        fullmove,
        ranks,
    }
}

/// Rejoins the six fields; trailing empty fields are dropped.
pub fn encode(components: &PositionComponents) -> String {
    components.fields().join(" ").trim_end().to_string()
}
