//! PGN read/write for game records.
//!
//! Reading keeps the tag pairs and the main-line SAN tokens; comments, NAGs,
//! move numbers and nested variations are skipped. Writing emits tag pairs
//! followed by the movetext.

use std::collections::BTreeMap;

use crate::error::GameError;

/// A parsed game record
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PgnGame {
    pub headers: BTreeMap<String, String>,
    /// Main-line moves in SAN, as written
    pub moves: Vec<String>,
    pub result: Option<String>,
}

impl PgnGame {
    /// Starting position FEN, when the record declares one
    pub fn start_fen(&self) -> Option<&str> {
        let set_up = self.headers.get("SetUp").map(String::as_str);
        match (set_up, self.headers.get("FEN")) {
            (Some("0"), _) => None,
            (_, Some(fen)) => Some(fen.as_str()),
            _ => None,
        }
    }
}

const RESULTS: [&str; 4] = ["1-0", "0-1", "1/2-1/2", "*"];

/// Parse the first game of a PGN document
pub fn parse_pgn(text: &str) -> Result<PgnGame, GameError> {
    let mut game = PgnGame::default();
    let mut movetext = String::new();

    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with('%') {
            continue;
        }
        if trimmed.starts_with('[') {
            // tags after movetext open the next game
            if !movetext.trim().is_empty() {
                break;
            }
            let (key, value) = parse_tag(trimmed)?;
            game.headers.insert(key, value);
        } else {
            movetext.push_str(line);
            movetext.push('\n');
        }
    }

    let mut chars = movetext.chars();
    let mut depth = 0usize;
    let mut token = String::new();

    while let Some(c) = chars.next() {
        match c {
            '{' => {
                flush_token(&mut token, depth, &mut game)?;
                if !chars.by_ref().any(|c| c == '}') {
                    return Err(GameError::Pgn("unterminated comment".to_string()));
                }
            }
            ';' => {
                flush_token(&mut token, depth, &mut game)?;
                for c in chars.by_ref() {
                    if c == '\n' {
                        break;
                    }
                }
            }
            '(' => {
                flush_token(&mut token, depth, &mut game)?;
                depth += 1;
            }
            ')' => {
                flush_token(&mut token, depth, &mut game)?;
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| GameError::Pgn("unbalanced ')'".to_string()))?;
            }
            c if c.is_whitespace() => flush_token(&mut token, depth, &mut game)?,
            c => token.push(c),
        }
    }
    flush_token(&mut token, depth, &mut game)?;

    if depth != 0 {
        return Err(GameError::Pgn("unterminated variation".to_string()));
    }
    Ok(game)
}

/// Classify one whitespace-delimited word of movetext. Words inside a
/// variation are dropped.
fn flush_token(token: &mut String, depth: usize, game: &mut PgnGame) -> Result<(), GameError> {
    if token.is_empty() {
        return Ok(());
    }
    let word = std::mem::take(token);
    if depth > 0 || word.starts_with('$') {
        return Ok(());
    }
    if RESULTS.contains(&word.as_str()) {
        game.result = Some(word);
        return Ok(());
    }
    let san = strip_move_number(&word).trim_end_matches(['!', '?']);
    if san.is_empty() {
        return Ok(());
    }
    if game.result.is_some() {
        return Err(GameError::Pgn(format!("move {san} after result")));
    }
    game.moves.push(san.to_string());
    Ok(())
}

/// `[Key "Value"]`
fn parse_tag(line: &str) -> Result<(String, String), GameError> {
    let inner = line
        .strip_prefix('[')
        .and_then(|l| l.strip_suffix(']'))
        .ok_or_else(|| GameError::Pgn(format!("malformed tag: {line}")))?;
    let (key, rest) = inner
        .split_once(char::is_whitespace)
        .ok_or_else(|| GameError::Pgn(format!("malformed tag: {line}")))?;
    let value = rest
        .trim()
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .ok_or_else(|| GameError::Pgn(format!("malformed tag value: {line}")))?;
    Ok((key.to_string(), value.replace("\\\"", "\"").replace("\\\\", "\\")))
}

/// `12.e4` -> `e4`, `12...` -> ``, `e4` -> `e4`
fn strip_move_number(word: &str) -> &str {
    let digits = word.len() - word.trim_start_matches(|c: char| c.is_ascii_digit()).len();
    if digits == 0 {
        return word;
    }
    let rest = &word[digits..];
    if rest.starts_with('.') {
        rest.trim_start_matches('.')
    } else {
        word
    }
}

fn escape_tag_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Write a PGN document: tag pairs, a blank line, movetext and result
pub fn write_pgn(headers: &BTreeMap<String, String>, movetext: &str, result: &str) -> String {
    let mut out = String::new();
    for (key, value) in headers {
        out.push_str(&format!("[{} \"{}\"]\n", key, escape_tag_value(value)));
    }
    out.push('\n');
    if !movetext.is_empty() {
        out.push_str(movetext);
        out.push(' ');
    }
    out.push_str(result);
    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"[Event "Casual game"]
[White "Alice"]
[Black "Bob \"The Rook\""]
[Result "1-0"]

1. e4 {best by test} e5 2. Nf3 (2. f4 exf4) Nc6 $1 3.Bb5 a6?!
; a line comment
4. Ba4 1-0
"#;

    #[test]
    fn test_parse_headers_and_moves() {
        let game = parse_pgn(SAMPLE).unwrap();
        assert_eq!(game.headers.get("White").map(String::as_str), Some("Alice"));
        assert_eq!(
            game.headers.get("Black").map(String::as_str),
            Some("Bob \"The Rook\"")
        );
        assert_eq!(game.moves, vec!["e4", "e5", "Nf3", "Nc6", "Bb5", "a6", "Ba4"]);
        assert_eq!(game.result.as_deref(), Some("1-0"));
        assert_eq!(game.start_fen(), None);
    }

    #[test]
    fn test_parse_black_move_numbers() {
        let game = parse_pgn("12... Qxd4 13. Rd1 *").unwrap();
        assert_eq!(game.moves, vec!["Qxd4", "Rd1"]);
        assert_eq!(game.result.as_deref(), Some("*"));
    }

    #[test]
    fn test_parse_first_of_several_games() {
        let text = "[Event \"A\"]\n\n1. e4 e5 1-0\n\n[Event \"B\"]\n\n1. d4 d5 0-1\n";
        let game = parse_pgn(text).unwrap();
        assert_eq!(game.headers.get("Event").map(String::as_str), Some("A"));
        assert_eq!(game.moves, vec!["e4", "e5"]);
        assert_eq!(game.result.as_deref(), Some("1-0"));
    }

    #[test]
    fn test_move_after_result_is_rejected() {
        assert!(parse_pgn("1. e4 e5 1-0 2. Nf3").is_err());
    }

    #[test]
    fn test_start_fen() {
        let game = parse_pgn(
            "[SetUp \"1\"]\n[FEN \"4k3/8/8/8/8/8/8/4K2R w K - 0 1\"]\n\n1. O-O *",
        )
        .unwrap();
        assert_eq!(game.start_fen(), Some("4k3/8/8/8/8/8/8/4K2R w K - 0 1"));
        assert_eq!(game.moves, vec!["O-O"]);
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_pgn("1. e4 (e5").is_err());
        assert!(parse_pgn("1. e4 {open").is_err());
        assert!(parse_pgn("1. e4 ) e5").is_err());
        assert!(parse_pgn("[Event broken]\n1. e4").is_err());
    }

    #[test]
    fn test_write_pgn() {
        let mut headers = BTreeMap::new();
        headers.insert("Event".to_string(), "Study".to_string());
        headers.insert("White".to_string(), "A \"B\"".to_string());
        let text = write_pgn(&headers, "1. e4 (1. d4) e5", "*");
        assert_eq!(
            text,
            "[Event \"Study\"]\n[White \"A \\\"B\\\"\"]\n\n1. e4 (1. d4) e5 *\n"
        );
        assert_eq!(parse_pgn(&text).unwrap().moves, vec!["e4", "e5"]);
    }
}
