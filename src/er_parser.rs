use crate::config::Direction;
use crate::er_ast::*;
use crate::er_lexer::{self, Token, TokenKind};
use crate::error::{Error, Position, Result};

const HEADER: &str = "erDiagram";

pub fn parse_er(input: &str) -> Result<Vec<Statement>> {
    let tokens = er_lexer::tokenize(input)?;
    let mut parser = Parser {
        tokens: &tokens,
        pos: 0,
    };
    let statements = parser.diagram()?;
    tracing::debug!(statements = statements.len(), "parsed ER diagram");
    Ok(statements)
}

struct Parser<'t> {
    tokens: &'t [Token],
    pos: usize,
}

impl<'t> Parser<'t> {
    fn peek(&self) -> Option<&'t Token> {
        self.tokens.get(self.pos)
    }

    fn peek_kind(&self) -> Option<&'t TokenKind> {
        self.peek().map(|t| &t.kind)
    }

    fn next(&mut self) -> Option<&'t Token> {
        let token = self.tokens.get(self.pos)?;
        self.pos += 1;
        Some(token)
    }

    fn last_position(&self) -> Option<Position> {
        self.tokens.last().map(|t| t.position)
    }

    fn skip_newlines(&mut self) {
        while matches!(self.peek_kind(), Some(TokenKind::Newline)) {
            self.pos += 1;
        }
    }

    fn unexpected(&self, expected: &str, found: Option<&Token>) -> Error {
        match found {
            Some(token) => Error::syntax(
                format!("expected {expected}, found {}", token.kind),
                Some(token.position),
            ),
            None => Error::syntax(
                format!("expected {expected}, found end of input"),
                self.last_position(),
            ),
        }
    }

    fn end_of_statement(&mut self) -> Result<()> {
        match self.peek() {
            None => Ok(()),
            Some(Token {
                kind: TokenKind::Newline,
                ..
            }) => {
                self.pos += 1;
                Ok(())
            }
            found => Err(self.unexpected("end of line", found)),
        }
    }

    fn diagram(&mut self) -> Result<Vec<Statement>> {
        self.skip_newlines();
        match self.next() {
            Some(Token {
                kind: TokenKind::Word(w),
                ..
            }) if w == HEADER => {}
            Some(token) => {
                return Err(Error::syntax(
                    format!("unknown diagram type: expected `{HEADER}`, found {}", token.kind),
                    Some(token.position),
                ));
            }
            None => return Err(Error::syntax(format!("missing `{HEADER}` header"), None)),
        }
        self.end_of_statement()?;

        let mut statements = Vec::new();
        loop {
            self.skip_newlines();
            if self.peek().is_none() {
                break;
            }
            statements.push(self.statement()?);
            self.end_of_statement()?;
        }
        Ok(statements)
    }

    fn statement(&mut self) -> Result<Statement> {
        if let Some(direction) = self.direction() {
            return Ok(Statement::Direction(direction));
        }

        let (name, alias, position) = self.entity_ref()?;
        match self.peek_kind() {
            Some(TokenKind::BlockOpen) => {
                self.pos += 1;
                let attributes = self.attributes(position)?;
                Ok(Statement::AttributeBlock {
                    entity: name,
                    alias,
                    attributes,
                    position,
                })
            }
            Some(TokenKind::Glyph(_)) => {
                if alias.is_some() {
                    return Err(Error::syntax(
                        "an entity alias is only allowed in a declaration",
                        Some(position),
                    ));
                }
                self.relationship(name).map(Statement::RelationshipDeclaration)
            }
            _ => Ok(Statement::EntityDeclaration {
                name,
                alias,
                position,
            }),
        }
    }

    fn direction(&mut self) -> Option<Direction> {
        let Some(TokenKind::Word(keyword)) = self.peek_kind() else {
            return None;
        };
        if keyword != "direction" {
            return None;
        }
        let Some(TokenKind::Word(value)) = self.tokens.get(self.pos + 1).map(|t| &t.kind) else {
            return None;
        };
        let direction = Direction::from_keyword(value)?;
        self.pos += 2;
        Some(direction)
    }

    fn entity_ref(&mut self) -> Result<(String, Option<String>, Position)> {
        let (name, position) = match self.next() {
            Some(Token {
                kind: TokenKind::Word(w),
                position,
            }) => (w.clone(), *position),
            Some(Token {
                kind: TokenKind::Quoted(s),
                position,
            }) => {
                if s.trim().is_empty() {
                    return Err(Error::syntax("entity name must not be empty", Some(*position)));
                }
                (s.clone(), *position)
            }
            found => return Err(self.unexpected("entity name", found)),
        };

        let alias = if matches!(self.peek_kind(), Some(TokenKind::AliasOpen)) {
            self.pos += 1;
            Some(self.alias()?)
        } else {
            None
        };
        Ok((name, alias, position))
    }

    fn alias(&mut self) -> Result<String> {
        let mut words: Vec<&str> = Vec::new();
        loop {
            match self.next() {
                Some(Token {
                    kind: TokenKind::AliasClose,
                    ..
                }) => break,
                Some(Token {
                    kind: TokenKind::Word(w) | TokenKind::Quoted(w),
                    ..
                }) => words.push(w),
                found => return Err(self.unexpected("alias text or `]`", found)),
            }
        }
        Ok(words.join(" "))
    }

    fn attributes(&mut self, block_position: Position) -> Result<Vec<Attribute>> {
        let unterminated = || Error::syntax("unterminated attribute block", Some(block_position));
        let mut attributes = Vec::new();
        loop {
            let attr_type = match self.next() {
                None => return Err(unterminated()),
                Some(Token {
                    kind: TokenKind::BlockClose,
                    ..
                }) => break,
                Some(Token {
                    kind: TokenKind::Word(w),
                    ..
                }) => w.clone(),
                found => return Err(self.unexpected("attribute type or `}`", found)),
            };
            let name = match self.next() {
                None => return Err(unterminated()),
                Some(Token {
                    kind: TokenKind::Word(w),
                    ..
                }) => w.clone(),
                found => return Err(self.unexpected("attribute name", found)),
            };
            let keys = self.attribute_keys()?;
            let comment = match self.peek_kind() {
                Some(TokenKind::Quoted(s)) => {
                    self.pos += 1;
                    s.clone()
                }
                _ => String::new(),
            };
            attributes.push(Attribute {
                attr_type,
                name,
                keys,
                comment,
            });
        }
        Ok(attributes)
    }

    fn attribute_keys(&mut self) -> Result<Vec<AttributeKey>> {
        let mut keys = Vec::new();
        while let Some(TokenKind::Word(w)) = self.peek_kind() {
            let Some(key) = AttributeKey::from_word(w) else {
                break;
            };
            self.pos += 1;
            keys.push(key);
            if matches!(self.peek_kind(), Some(TokenKind::Comma)) {
                self.pos += 1;
                let found = self.peek();
                let next_is_key = matches!(
                    found.map(|t| &t.kind),
                    Some(TokenKind::Word(w)) if AttributeKey::from_word(w).is_some()
                );
                if !next_is_key {
                    return Err(self.unexpected("attribute key after `,`", found));
                }
            }
        }
        Ok(keys)
    }

    fn relationship(&mut self, left: String) -> Result<RelationshipDecl> {
        let left_glyph = self.glyph()?;
        let connector = match self.next() {
            Some(Token {
                kind: TokenKind::Connector(c),
                position,
            }) => Glyph {
                text: c.clone(),
                position: *position,
            },
            found => return Err(self.unexpected("relationship connector", found)),
        };
        let right_glyph = self.glyph()?;

        let (right, alias, position) = self.entity_ref()?;
        if alias.is_some() {
            return Err(Error::syntax(
                "an entity alias is only allowed in a declaration",
                Some(position),
            ));
        }

        let label = if matches!(self.peek_kind(), Some(TokenKind::Colon)) {
            self.pos += 1;
            match self.peek_kind() {
                Some(TokenKind::Quoted(s) | TokenKind::Label(s)) => {
                    self.pos += 1;
                    s.clone()
                }
                _ => String::new(),
            }
        } else {
            String::new()
        };

        Ok(RelationshipDecl {
            left,
            right,
            left_glyph,
            connector,
            right_glyph,
            label,
        })
    }

    fn glyph(&mut self) -> Result<Glyph> {
        match self.next() {
            Some(Token {
                kind: TokenKind::Glyph(g),
                position,
            }) => Ok(Glyph {
                text: g.clone(),
                position: *position,
            }),
            found => Err(self.unexpected("cardinality glyph", found)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn relationships(statements: &[Statement]) -> Vec<&RelationshipDecl> {
        statements
            .iter()
            .filter_map(|s| match s {
                Statement::RelationshipDeclaration(r) => Some(r),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn parse_relationship_basic() {
        let statements = parse_er("erDiagram\n    CUSTOMER ||--o{ ORDER : places\n").unwrap();
        let rels = relationships(&statements);
        assert_eq!(rels.len(), 1);
        assert_eq!(rels[0].left, "CUSTOMER");
        assert_eq!(rels[0].right, "ORDER");
        assert_eq!(rels[0].left_glyph.text, "||");
        assert_eq!(rels[0].connector.text, "--");
        assert_eq!(rels[0].right_glyph.text, "o{");
        assert_eq!(rels[0].label, "places");
    }

    #[test]
    fn parse_relationship_label_with_spaces() {
        let statements = parse_er("erDiagram\n    CUSTOMER }o--|| ADDRESS : billing address\n").unwrap();
        assert_eq!(relationships(&statements)[0].label, "billing address");
    }

    #[test]
    fn parse_relationship_without_label() {
        let statements = parse_er("erDiagram\n    A ||--|| B\n").unwrap();
        assert_eq!(relationships(&statements)[0].label, "");
    }

    #[test]
    fn parse_blank_labels_verbatim() {
        let input = "erDiagram\n  BOOK }|..|{ AUTHOR : \"\"\n  BOOK }|..|{ GENRE : \" \"\n  AUTHOR }|..|{ GENRE : \"  \"\n";
        let statements = parse_er(input).unwrap();
        let labels: Vec<&str> = relationships(&statements)
            .iter()
            .map(|r| r.label.as_str())
            .collect();
        assert_eq!(labels, vec!["", " ", "  "]);
    }

    #[test]
    fn parse_bare_entities() {
        let statements = parse_er("erDiagram\n  DEAD_PARROT\n  HERMIT\n").unwrap();
        assert_eq!(
            statements,
            vec![
                Statement::EntityDeclaration {
                    name: "DEAD_PARROT".into(),
                    alias: None,
                    position: Position::new(2, 3),
                },
                Statement::EntityDeclaration {
                    name: "HERMIT".into(),
                    alias: None,
                    position: Position::new(3, 3),
                },
            ]
        );
    }

    #[test]
    fn parse_single_line_attribute_block() {
        let statements = parse_er("erDiagram\n  BOOK { string title PK \"comment\"}\n").unwrap();
        match &statements[0] {
            Statement::AttributeBlock {
                entity, attributes, ..
            } => {
                assert_eq!(entity, "BOOK");
                assert_eq!(
                    attributes,
                    &vec![Attribute {
                        attr_type: "string".into(),
                        name: "title".into(),
                        keys: vec![AttributeKey::PK],
                        comment: "comment".into(),
                    }]
                );
            }
            other => panic!("expected attribute block, got {other:?}"),
        }
    }

    #[test]
    fn parse_multi_line_attribute_block() {
        let input = "erDiagram\n  PRIVATE_FINANCIAL_INSTITUTION {\n    string name\n    int    turnover\n    int id PK, FK\n  }\n";
        let statements = parse_er(input).unwrap();
        let Statement::AttributeBlock { attributes, .. } = &statements[0] else {
            panic!("expected attribute block");
        };
        let names: Vec<&str> = attributes.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["name", "turnover", "id"]);
        assert_eq!(attributes[2].keys, vec![AttributeKey::PK, AttributeKey::FK]);
        assert!(attributes[0].comment.is_empty());
    }

    #[test]
    fn parse_empty_block() {
        let statements = parse_er("erDiagram\n  BOOK {}\n").unwrap();
        assert!(matches!(
            &statements[0],
            Statement::AttributeBlock { attributes, .. } if attributes.is_empty()
        ));
    }

    #[test]
    fn parse_alias() {
        let statements = parse_er("erDiagram\n  p[\"Person\"] {\n    string name\n  }\n").unwrap();
        assert!(matches!(
            &statements[0],
            Statement::AttributeBlock { entity, alias: Some(a), .. } if entity == "p" && a == "Person"
        ));
    }

    #[test]
    fn parse_quoted_entity_name() {
        let statements = parse_er("erDiagram\n  \"Line Item\" ||--|| ORDER : in\n").unwrap();
        assert_eq!(relationships(&statements)[0].left, "Line Item");
    }

    #[test]
    fn parse_direction() {
        let statements = parse_er("erDiagram\n  direction LR\n  A\n").unwrap();
        assert_eq!(statements[0], Statement::Direction(Direction::LeftRight));
    }

    #[test]
    fn parse_header_only() {
        assert!(parse_er("erDiagram").unwrap().is_empty());
        assert!(parse_er("\n   erDiagram\n\n").unwrap().is_empty());
    }

    #[test]
    fn parse_wrong_header() {
        let err = parse_er("classDiagram\n  Foo\n").unwrap_err();
        assert!(err.to_string().contains("unknown diagram type"), "got {err}");
        assert!(err.to_string().contains("classDiagram"), "got {err}");
    }

    #[test]
    fn parse_empty_input() {
        let err = parse_er("").unwrap_err();
        assert!(err.to_string().contains("missing `erDiagram` header"), "got {err}");
    }

    #[test]
    fn parse_unterminated_block() {
        let err = parse_er("erDiagram\n  BOOK {\n    string title\n").unwrap_err();
        assert_eq!(
            err,
            Error::syntax("unterminated attribute block", Some(Position::new(2, 3)))
        );
    }

    #[test]
    fn parse_trailing_tokens_rejected() {
        let err = parse_er("erDiagram\n  A ||--|| B : \"x\" extra\n").unwrap_err();
        assert!(matches!(err, Error::Syntax { .. }), "got {err:?}");
        assert!(err.to_string().contains("expected end of line"), "got {err}");
    }

    #[test]
    fn parse_missing_right_entity() {
        let err = parse_er("erDiagram\n  A ||--|| : x\n").unwrap_err();
        assert!(err.to_string().contains("expected entity name"), "got {err}");
    }

    #[test]
    fn parse_dangling_key_comma() {
        let err = parse_er("erDiagram\n  A { int id PK, }\n").unwrap_err();
        assert!(err.to_string().contains("attribute key after `,`"), "got {err}");
    }
}
