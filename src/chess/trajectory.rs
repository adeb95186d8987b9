use super::engine::{RulesEngine, ShakmatyEngine};
use super::error::{ChessError, ChessResult};
use super::types::GameRecord;

/// Replays a game's mainline and records the FEN after every ply.
#[derive(Debug, Clone, Default)]
pub struct TrajectoryBuilder<E = ShakmatyEngine> {
    engine: E,
}

impl<E: RulesEngine> TrajectoryBuilder<E> {
    pub const fn new(engine: E) -> Self {
        Self { engine }
    }

    /// Positions after each mainline move, optionally preceded by the start
    /// position. Any parse or replay failure rejects the whole record.
    pub fn build(&self, record: &GameRecord, include_initial: bool) -> ChessResult<Vec<String>> {
        let moves = self.engine.parse_mainline(&record.text)?;
        let mut position = self.engine.starting_position(record.effective_start())?;

        let mut snapshots = Vec::with_capacity(moves.len() + usize::from(include_initial));
        if include_initial {
            snapshots.push(self.engine.encode(&position));
        }

        for (ply, mv) in moves.iter().enumerate() {
            position = self
                .engine
                .apply_move(&position, mv)
                .map_err(|e| match e {
                    ChessError::InvalidRecord(msg) => {
                        ChessError::InvalidRecord(format!("ply {}: {}", ply + 1, msg))
                    }
                    other => other,
                })?;
            snapshots.push(self.engine.encode(&position));
        }

        Ok(snapshots)
    }

    /// The position after the last mainline move, or `None` for a game
    /// without moves.
    pub fn final_position(&self, record: &GameRecord) -> ChessResult<Option<String>> {
        Ok(self.build(record, false)?.pop())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chess::fen;
    use crate::chess::splitter::parse_game_record;

    const START: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

    fn record(text: &str) -> GameRecord {
        parse_game_record(text.to_string())
    }

    #[test]
    fn test_four_ply_trajectory() {
        let builder = TrajectoryBuilder::new(ShakmatyEngine);
        let fens = builder.build(&record("1.e4 e5 2.Nf3 Nc6"), false).unwrap();

        assert_eq!(fens.len(), 4);
        let last = fen::decode(&fens[3]);
        assert_eq!(last.active, "w");
        assert_eq!(last.fullmove, "3");
        assert_eq!(
            fens[3],
            "r1bqkbnr/pppp1ppp/2n5/4p3/4P3/5N2/PPPP1PPP/RNBQKB1R w KQkq - 2 3"
        );
    }

    #[test]
    fn test_include_initial_prepends_start_position() {
        let builder = TrajectoryBuilder::new(ShakmatyEngine);
        let fens = builder.build(&record("1. e4 e5 *"), true).unwrap();

        assert_eq!(fens.len(), 3);
        assert_eq!(fens[0], START);
    }

    #[test]
    fn test_empty_move_list() {
        let builder = TrajectoryBuilder::new(ShakmatyEngine);
        assert!(builder.build(&record("*"), false).unwrap().is_empty());
        assert_eq!(builder.build(&record(""), true).unwrap(), vec![START]);
    }

    #[test]
    fn test_setup_start_position_is_used() {
        let builder = TrajectoryBuilder::new(ShakmatyEngine);
        let pgn = "[SetUp \"1\"]\n[FEN \"4k3/8/8/8/8/8/8/4K2R w K - 0 1\"]\n\n1. O-O *";
        let fens = builder.build(&record(pgn), true).unwrap();

        assert_eq!(fens[0], "4k3/8/8/8/8/8/8/4K2R w K - 0 1");
        assert_eq!(fens[1], "4k3/8/8/8/8/8/8/5RK1 b - - 1 1");
    }

    #[test]
    fn test_fen_without_setup_tag_is_used() {
        let builder = TrajectoryBuilder::new(ShakmatyEngine);
        let pgn = "[FEN \"4k3/8/8/8/8/8/8/4K3 w - - 0 1\"]\n\n1. Kd2 *";
        let fens = builder.build(&record(pgn), true).unwrap();
        assert_eq!(fens[0], "4k3/8/8/8/8/8/8/4K3 w - - 0 1");
    }

    #[test]
    fn test_false_setup_flag_starts_from_standard_position() {
        let builder = TrajectoryBuilder::new(ShakmatyEngine);
        let pgn = "[SetUp \"0\"]\n[FEN \"4k3/8/8/8/8/8/8/4K3 w - - 0 1\"]\n\n1. e4 *";
        let fens = builder.build(&record(pgn), true).unwrap();

        assert_eq!(fens[0], START);
        assert_eq!(fens.len(), 2);
    }

    #[test]
    fn test_unplayable_move_rejects_whole_record() {
        let builder = TrajectoryBuilder::new(ShakmatyEngine);
        let err = builder.build(&record("1. e4 e5 2. Qxh7"), false).unwrap_err();
        match err {
            ChessError::InvalidRecord(msg) => assert!(msg.starts_with("ply 3:")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_length_law_holds_for_several_games() {
        let builder = TrajectoryBuilder::new(ShakmatyEngine);
        for (pgn, moves) in [
            ("1. d4", 1),
            ("1. d4 d5 2. c4 e6 3. Nc3 Nf6", 6),
            ("1. e4 c5 2. Nf3 d6 3. d4 cxd4 4. Nxd4 Nf6 5. Nc3 a6 1/2-1/2", 10),
        ] {
            let r = record(pgn);
            assert_eq!(builder.build(&r, false).unwrap().len(), moves);
            assert_eq!(builder.build(&r, true).unwrap().len(), moves + 1);
        }
    }

    #[test]
    fn test_final_position() {
        let builder = TrajectoryBuilder::new(ShakmatyEngine);
        let last = builder.final_position(&record("1. e4 *")).unwrap();
        assert_eq!(
            last.as_deref(),
            Some("rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1")
        );
        assert_eq!(builder.final_position(&record("*")).unwrap(), None);
    }
}
