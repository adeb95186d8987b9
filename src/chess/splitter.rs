//! Splits raw multi-game PGN text into per-game records.
//!
//! Games are cut in front of every `[Event ` tag line. Text without those
//! markers (bare concatenated movetext) is cut after each result token
//! instead.

use super::types::GameRecord;
use regex::Regex;
use std::sync::LazyLock;

static EVENT_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[ \t]*\[Event\s").expect("valid event tag regex"));

static RESULT_TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"1/2-1/2|1-0|0-1|\*").expect("valid result token regex"));

static FEN_TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)^[ \t]*\[FEN\s+"([^"]*)"\s*\]"#).expect("valid FEN tag regex")
});

static SETUP_TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)^[ \t]*\[SetUp\s+"([^"]*)"\s*\]"#).expect("valid SetUp tag regex")
});

/// Split `text` into trimmed game segments, in input order.
pub fn split_segments(text: &str) -> Vec<String> {
    let normalized = text.replace("\r\n", "\n").replace('\r', "\n");
    let trimmed = normalized.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }

    let by_header = split_at_event_tags(trimmed);
    if by_header.len() > 1 {
        return by_header;
    }

    split_at_result_tokens(trimmed)
}

/// Split `text` into games, extracting each game's starting-position headers.
pub fn split(text: &str) -> Vec<GameRecord> {
    split_segments(text)
        .into_iter()
        .map(parse_game_record)
        .collect()
}

pub fn parse_game_record(text: String) -> GameRecord {
    let starting_position = FEN_TAG_RE
        .captures(&text)
        .map(|caps| caps[1].trim().to_string())
        .filter(|fen| !fen.is_empty());
    let starting_position_active = SETUP_TAG_RE
        .captures(&text)
        .map(|caps| is_setup_enabled(&caps[1]));

    GameRecord {
        text,
        starting_position,
        starting_position_active,
    }
}

fn is_setup_enabled(raw: &str) -> bool {
    let raw = raw.trim();
    raw == "1" || raw.eq_ignore_ascii_case("true")
}

fn split_at_event_tags(text: &str) -> Vec<String> {
    let mut cuts: Vec<usize> = EVENT_TAG_RE.find_iter(text).map(|m| m.start()).collect();
    if cuts.first() != Some(&0) {
        cuts.insert(0, 0);
    }
    cuts.push(text.len());

    cuts.windows(2)
        .map(|w| text[w[0]..w[1]].trim())
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
        .collect()
}

fn split_at_result_tokens(text: &str) -> Vec<String> {
    let mut segments = Vec::new();
    let mut start = 0;

    for m in RESULT_TOKEN_RE.find_iter(text) {
        if !is_standalone_token(text, m.start(), m.end()) {
            continue;
        }
        let segment = text[start..m.end()].trim();
        if !segment.is_empty() {
            segments.push(segment.to_string());
        }
        start = m.end();
    }

    let remainder = text[start..].trim();
    if !remainder.is_empty() {
        segments.push(remainder.to_string());
    }

    segments
}

/// A result token counts only when followed by whitespace or end of text and
/// not glued onto a preceding move or tag value.
fn is_standalone_token(text: &str, start: usize, end: usize) -> bool {
    let followed_ok = text[end..]
        .chars()
        .next()
        .is_none_or(char::is_whitespace);
    let preceded_ok = text[..start]
        .chars()
        .next_back()
        .is_none_or(|c| c.is_whitespace() || c == '.' || c == '}' || c == ')');
    followed_ok && preceded_ok
}
