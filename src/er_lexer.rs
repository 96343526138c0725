use std::fmt;

use winnow::ascii::till_line_ending;
use winnow::combinator::{alt, delimited, preceded};
use winnow::prelude::*;
use winnow::token::{take_till, take_while};

use crate::error::{Error, Position, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Newline,
    Word(String),
    Quoted(String),
    /// Unquoted relationship label, trailing whitespace removed.
    Label(String),
    BlockOpen,
    BlockClose,
    AliasOpen,
    AliasClose,
    Colon,
    Comma,
    Glyph(String),
    Connector(String),
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Newline => f.write_str("end of line"),
            TokenKind::Word(w) => write!(f, "`{w}`"),
            TokenKind::Quoted(s) => write!(f, "\"{s}\""),
            TokenKind::Label(s) => write!(f, "label `{s}`"),
            TokenKind::BlockOpen => f.write_str("`{`"),
            TokenKind::BlockClose => f.write_str("`}`"),
            TokenKind::AliasOpen => f.write_str("`[`"),
            TokenKind::AliasClose => f.write_str("`]`"),
            TokenKind::Colon => f.write_str("`:`"),
            TokenKind::Comma => f.write_str("`,`"),
            TokenKind::Glyph(g) => write!(f, "cardinality `{g}`"),
            TokenKind::Connector(c) => write!(f, "connector `{c}`"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub position: Position,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Mode {
    Default,
    /// Inside `{ ... }`: newlines are insignificant and words may carry
    /// type punctuation.
    Block,
    /// Right after `:`, the rest of the line is the label.
    Label,
}

pub fn tokenize(source: &str) -> Result<Vec<Token>> {
    let mut lexer = Lexer {
        source,
        input: source,
        mode: Mode::Default,
        line_starts: line_starts(source),
        tokens: Vec::new(),
    };
    lexer.run()?;
    tracing::trace!(tokens = lexer.tokens.len(), "tokenized ER source");
    Ok(lexer.tokens)
}

fn line_starts(source: &str) -> Vec<usize> {
    std::iter::once(0)
        .chain(source.match_indices('\n').map(|(i, _)| i + 1))
        .collect()
}

struct Lexer<'s> {
    source: &'s str,
    input: &'s str,
    mode: Mode,
    line_starts: Vec<usize>,
    tokens: Vec<Token>,
}

impl<'s> Lexer<'s> {
    fn run(&mut self) -> Result<()> {
        loop {
            self.skip_trivia();
            let Some(next) = self.input.chars().next() else {
                break;
            };
            let start = self.offset();
            match self.mode {
                Mode::Default => self.default_token(next, start)?,
                Mode::Block => self.block_token(next, start)?,
                Mode::Label => self.label_token(next, start)?,
            }
        }
        Ok(())
    }

    fn offset(&self) -> usize {
        self.source.len() - self.input.len()
    }

    fn position(&self, offset: usize) -> Position {
        let line = self.line_starts.partition_point(|&start| start <= offset);
        let line_start = self.line_starts[line - 1];
        Position::new(line, self.source[line_start..offset].chars().count() + 1)
    }

    fn push(&mut self, kind: TokenKind, offset: usize) {
        let position = self.position(offset);
        self.tokens.push(Token { kind, position });
    }

    fn bump(&mut self, ch: char) {
        self.input = &self.input[ch.len_utf8()..];
    }

    fn skip_trivia(&mut self) {
        match self.mode {
            Mode::Label => {
                let _ = inline_space.parse_next(&mut self.input);
            }
            Mode::Default => loop {
                let _ = inline_space.parse_next(&mut self.input);
                if comment.parse_next(&mut self.input).is_err() {
                    break;
                }
            },
            Mode::Block => loop {
                let _ = any_space.parse_next(&mut self.input);
                if comment.parse_next(&mut self.input).is_err() {
                    break;
                }
            },
        }
    }

    fn default_token(&mut self, next: char, start: usize) -> Result<()> {
        if is_glyph_char(next) {
            let mut probe = self.input;
            if let Ok((left, connector, right)) = relationship_operator.parse_next(&mut probe) {
                self.input = probe;
                self.push(TokenKind::Glyph(left.to_string()), start);
                self.push(TokenKind::Connector(connector.to_string()), start + left.len());
                self.push(
                    TokenKind::Glyph(right.to_string()),
                    start + left.len() + connector.len(),
                );
                return Ok(());
            }
        }

        match next {
            '\n' => {
                self.bump(next);
                self.push(TokenKind::Newline, start);
            }
            '{' => {
                self.bump(next);
                self.push(TokenKind::BlockOpen, start);
                self.mode = Mode::Block;
            }
            '[' => {
                self.bump(next);
                self.push(TokenKind::AliasOpen, start);
            }
            ']' => {
                self.bump(next);
                self.push(TokenKind::AliasClose, start);
            }
            ':' => {
                self.bump(next);
                self.push(TokenKind::Colon, start);
                self.mode = Mode::Label;
            }
            '"' => self.quoted_token(start)?,
            '|' | '}' | '-' | '.' => {
                let shape: String = self
                    .input
                    .chars()
                    .take_while(|&c| is_glyph_char(c) || c == '-' || c == '.')
                    .take(8)
                    .collect();
                return Err(Error::syntax(
                    format!("malformed relationship operator `{shape}`"),
                    Some(self.position(start)),
                ));
            }
            c if is_name_start(c) => {
                let word = name.parse_next(&mut self.input).map_err(|_| self.unexpected(next, start))?;
                self.push(TokenKind::Word(word.to_string()), start);
            }
            other => return Err(self.unexpected(other, start)),
        }
        Ok(())
    }

    fn block_token(&mut self, next: char, start: usize) -> Result<()> {
        match next {
            '}' => {
                self.bump(next);
                self.push(TokenKind::BlockClose, start);
                self.mode = Mode::Default;
            }
            ',' => {
                self.bump(next);
                self.push(TokenKind::Comma, start);
            }
            '"' => self.quoted_token(start)?,
            c if is_attribute_char(c) => {
                let word = attribute_word
                    .parse_next(&mut self.input)
                    .map_err(|_| self.unexpected(next, start))?;
                self.push(TokenKind::Word(word.to_string()), start);
            }
            other => return Err(self.unexpected(other, start)),
        }
        Ok(())
    }

    fn label_token(&mut self, next: char, start: usize) -> Result<()> {
        self.mode = Mode::Default;
        match next {
            '"' => self.quoted_token(start)?,
            '\n' => {}
            _ => {
                let text = label_text
                    .parse_next(&mut self.input)
                    .map_err(|_| self.unexpected(next, start))?;
                let text = text.split_once("%%").map_or(text, |(before, _)| before);
                self.push(TokenKind::Label(text.trim_end().to_string()), start);
            }
        }
        Ok(())
    }

    fn quoted_token(&mut self, start: usize) -> Result<()> {
        let text = quoted
            .parse_next(&mut self.input)
            .map_err(|_| Error::syntax("unterminated quoted string", Some(self.position(start))))?;
        self.push(TokenKind::Quoted(text.to_string()), start);
        Ok(())
    }

    fn unexpected(&self, ch: char, offset: usize) -> Error {
        Error::Lex {
            message: format!("unexpected character `{}`", ch.escape_default()),
            position: self.position(offset),
        }
    }
}

fn is_glyph_char(c: char) -> bool {
    matches!(c, '|' | 'o' | '{' | '}')
}

fn is_name_start(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn is_attribute_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | '[' | ']' | '(' | ')' | '~' | '*')
}

fn inline_space<'s>(input: &mut &'s str) -> winnow::Result<&'s str> {
    take_while(0.., |c: char| c == ' ' || c == '\t' || c == '\r').parse_next(input)
}

fn any_space<'s>(input: &mut &'s str) -> winnow::Result<&'s str> {
    take_while(0.., |c: char| c.is_whitespace()).parse_next(input)
}

fn comment<'s>(input: &mut &'s str) -> winnow::Result<&'s str> {
    preceded("%%", till_line_ending).parse_next(input)
}

fn label_text<'s>(input: &mut &'s str) -> winnow::Result<&'s str> {
    till_line_ending.parse_next(input)
}

fn name<'s>(input: &mut &'s str) -> winnow::Result<&'s str> {
    take_while(1.., |c: char| c.is_alphanumeric() || c == '_' || c == '-').parse_next(input)
}

fn attribute_word<'s>(input: &mut &'s str) -> winnow::Result<&'s str> {
    take_while(1.., is_attribute_char).parse_next(input)
}

fn quoted<'s>(input: &mut &'s str) -> winnow::Result<&'s str> {
    delimited('"', take_till(0.., |c: char| c == '"' || c == '\n'), '"').parse_next(input)
}

fn crow_glyph<'s>(input: &mut &'s str) -> winnow::Result<&'s str> {
    take_while(2, is_glyph_char).parse_next(input)
}

fn connector<'s>(input: &mut &'s str) -> winnow::Result<&'s str> {
    alt(("--", "..")).parse_next(input)
}

fn relationship_operator<'s>(input: &mut &'s str) -> winnow::Result<(&'s str, &'s str, &'s str)> {
    (crow_glyph, connector, crow_glyph).parse_next(input)
}
