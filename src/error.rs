use std::fmt;

use serde::Serialize;

pub type Result<T> = std::result::Result<T, Error>;

/// 1-based location in the source text. Columns count chars, not bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Side {
    Left,
    Right,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Left => f.write_str("left"),
            Side::Right => f.write_str("right"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("lex error at {position}: {message}")]
    Lex { message: String, position: Position },

    #[error("syntax error{}: {message}", at(.position))]
    Syntax {
        message: String,
        position: Option<Position>,
    },

    #[error("unresolved cardinality glyph `{glyph}` on the {side} side at {position}")]
    UnresolvedGlyph {
        glyph: String,
        side: Side,
        position: Position,
    },
}

impl Error {
    pub(crate) fn syntax(message: impl Into<String>, position: Option<Position>) -> Self {
        Error::Syntax {
            message: message.into(),
            position,
        }
    }

    pub fn position(&self) -> Option<Position> {
        match self {
            Error::Lex { position, .. } | Error::UnresolvedGlyph { position, .. } => {
                Some(*position)
            }
            Error::Syntax { position, .. } => *position,
        }
    }
}

fn at(position: &Option<Position>) -> String {
    match position {
        Some(p) => format!(" at {p}"),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn syntax_error_without_position() {
        let err = Error::syntax("missing `erDiagram` header", None);
        assert_eq!(err.to_string(), "syntax error: missing `erDiagram` header");
        assert_eq!(err.position(), None);
    }

    #[test]
    fn syntax_error_with_position() {
        let err = Error::syntax("expected newline", Some(Position::new(3, 7)));
        assert_eq!(
            err.to_string(),
            "syntax error at line 3, column 7: expected newline"
        );
    }

    #[test]
    fn unresolved_glyph_message_names_side() {
        let err = Error::UnresolvedGlyph {
            glyph: "{{".into(),
            side: Side::Left,
            position: Position::new(2, 5),
        };
        assert_eq!(
            err.to_string(),
            "unresolved cardinality glyph `{{` on the left side at line 2, column 5"
        );
    }
}
