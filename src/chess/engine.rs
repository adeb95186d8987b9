use super::error::{ChessError, ChessResult};
use pgn_reader::{Nag, RawComment, Reader, SanPlus, Skip, Visitor};
use shakmaty::fen::Fen;
use shakmaty::{CastlingMode, Chess, EnPassantMode, Position};
use smallvec::SmallVec;
use std::io;
use std::ops::ControlFlow;

pub type MoveList<M> = SmallVec<[M; 128]>;

macro_rules! pgn_visitor_skip_variations {
    () => {
        fn nag(&mut self, _: &mut Self::Movetext, _: Nag) -> ControlFlow<Self::Output> {
            ControlFlow::Continue(())
        }

        fn comment(
            &mut self,
            _: &mut Self::Movetext,
            _: RawComment<'_>,
        ) -> ControlFlow<Self::Output> {
            ControlFlow::Continue(())
        }

        fn partial_comment(
            &mut self,
            _: &mut Self::Movetext,
            _: RawComment<'_>,
        ) -> ControlFlow<Self::Output> {
            ControlFlow::Continue(())
        }

        fn begin_variation(&mut self, _: &mut Self::Movetext) -> ControlFlow<Self::Output, Skip> {
            ControlFlow::Continue(Skip(true))
        }
    };
}

/// Chess rules capability used by the trajectory builder.
///
/// Implementations are trusted: the builder never re-checks legality of a
/// move the engine accepted.
pub trait RulesEngine {
    type Position: Clone;
    type Move;

    /// The standard initial position for `None`, otherwise the decoded FEN.
    fn starting_position(&self, fen: Option<&str>) -> ChessResult<Self::Position>;

    /// Leniently parse the mainline moves of one game record.
    fn parse_mainline(&self, text: &str) -> ChessResult<MoveList<Self::Move>>;

    fn apply_move(&self, position: &Self::Position, mv: &Self::Move)
    -> ChessResult<Self::Position>;

    fn encode(&self, position: &Self::Position) -> String;
}

/// `RulesEngine` backed by pgn-reader for parsing and shakmaty for move
/// generation.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShakmatyEngine;

impl RulesEngine for ShakmatyEngine {
    type Position = Chess;
    type Move = SanPlus;

    fn starting_position(&self, fen: Option<&str>) -> ChessResult<Chess> {
        let Some(raw) = fen else {
            return Ok(Chess::default());
        };

        let parsed: Fen = raw
            .trim()
            .parse()
            .map_err(|e| ChessError::InvalidRecord(format!("invalid FEN '{raw}': {e}")))?;

        match parsed.clone().into_position(CastlingMode::Standard) {
            Ok(pos) => Ok(pos),
            Err(_) => parsed
                .into_position(CastlingMode::Chess960)
                .map_err(|e| ChessError::InvalidRecord(format!("illegal FEN '{raw}': {e}"))),
        }
    }

    fn parse_mainline(&self, text: &str) -> ChessResult<MoveList<SanPlus>> {
        if text.trim().is_empty() {
            return Ok(MoveList::new());
        }

        let mut reader = Reader::new(io::Cursor::new(text.as_bytes()));
        let mut visitor = MainlineVisitor::default();

        match reader.read_game(&mut visitor) {
            Ok(Some(())) => Ok(visitor.sans),
            Ok(None) => Err(ChessError::InvalidRecord(
                "no game found in record".to_string(),
            )),
            Err(e) => Err(ChessError::InvalidRecord(format!("PGN parse error: {e}"))),
        }
    }

    fn apply_move(&self, position: &Chess, mv: &SanPlus) -> ChessResult<Chess> {
        let m = mv
            .san
            .to_move(position)
            .map_err(|e| ChessError::InvalidRecord(format!("cannot play '{mv}': {e}")))?;

        let mut next = position.clone();
        next.play_unchecked(m);
        Ok(next)
    }

    fn encode(&self, position: &Chess) -> String {
        Fen::from_position(position, EnPassantMode::Legal).to_string()
    }
}

/// Collects mainline SAN moves, skipping variations, comments and NAGs.
#[derive(Default)]
struct MainlineVisitor {
    sans: MoveList<SanPlus>,
}

impl Visitor for MainlineVisitor {
    type Tags = ();
    type Movetext = ();
    type Output = ();

    fn begin_tags(&mut self) -> ControlFlow<Self::Output, Self::Tags> {
        self.sans.clear();
        ControlFlow::Continue(())
    }

    fn begin_movetext(&mut self, _tags: Self::Tags) -> ControlFlow<Self::Output, Self::Movetext> {
        ControlFlow::Continue(())
    }

    fn san(
        &mut self,
        _movetext: &mut Self::Movetext,
        san_plus: SanPlus,
    ) -> ControlFlow<Self::Output> {
        self.sans.push(san_plus);
        ControlFlow::Continue(())
    }

    pgn_visitor_skip_variations!();

    fn end_game(&mut self, _movetext: Self::Movetext) -> Self::Output {}
}

#[cfg(test)]
mod tests {
    use super::*;

    const START: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

    #[test]
    fn test_parse_mainline_without_game_is_invalid() {
        let engine = ShakmatyEngine;
        for text in ["% exported by a database tool", "\u{feff}"] {
            match engine.parse_mainline(text) {
                Err(ChessError::InvalidRecord(msg)) => assert_eq!(msg, "no game found in record"),
                other => panic!("unexpected result for {text:?}: {other:?}"),
            }
        }
    }

    #[test]
    fn test_parse_mainline_skips_annotations_and_variations() {
        let engine = ShakmatyEngine;
        let moves = engine
            .parse_mainline("1. e4! {Best by test} (1. d4 d5) e5?? $1 2. Nf3 1-0")
            .unwrap();
        let sans: Vec<String> = moves.iter().map(ToString::to_string).collect();
        assert_eq!(sans, vec!["e4", "e5", "Nf3"]);
    }

    #[test]
    fn test_parse_mainline_accepts_compact_numbering() {
        let engine = ShakmatyEngine;
        let moves = engine.parse_mainline("1.e4 e5 2.Nf3 Nc6").unwrap();
        assert_eq!(moves.len(), 4);
    }

    #[test]
    fn test_parse_mainline_with_headers() {
        let engine = ShakmatyEngine;
        let pgn = "[Event \"Test\"]\n[Result \"1-0\"]\n\n1. e4 e5 2. Nf3 1-0";
        assert_eq!(engine.parse_mainline(pgn).unwrap().len(), 3);
    }

    #[test]
    fn test_parse_mainline_empty_text() {
        let engine = ShakmatyEngine;
        assert!(engine.parse_mainline("  \n").unwrap().is_empty());
    }

    #[test]
    fn test_default_starting_position_encodes_to_standard_fen() {
        let engine = ShakmatyEngine;
        let pos = engine.starting_position(None).unwrap();
        assert_eq!(engine.encode(&pos), START);
    }

    #[test]
    fn test_starting_position_from_fen() {
        let engine = ShakmatyEngine;
        let fen = "4k3/8/8/8/8/8/8/4K2R w K - 0 1";
        let pos = engine.starting_position(Some(fen)).unwrap();
        assert_eq!(engine.encode(&pos), fen);
    }

    #[test]
    fn test_starting_position_rejects_garbage() {
        let engine = ShakmatyEngine;
        assert!(matches!(
            engine.starting_position(Some("not a fen")),
            Err(ChessError::InvalidRecord(_))
        ));
    }

    #[test]
    fn test_apply_move_plays_san() {
        let engine = ShakmatyEngine;
        let start = engine.starting_position(None).unwrap();
        let moves = engine.parse_mainline("1. e4").unwrap();
        let next = engine.apply_move(&start, &moves[0]).unwrap();
        assert_eq!(
            engine.encode(&next),
            "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1"
        );
    }

    #[test]
    fn test_apply_move_rejects_unplayable_san() {
        let engine = ShakmatyEngine;
        let start = engine.starting_position(None).unwrap();
        let moves = engine.parse_mainline("1. Qxh7").unwrap();
        let err = engine.apply_move(&start, &moves[0]).unwrap_err();
        assert!(err.to_string().contains("Qxh7"));
    }
}
