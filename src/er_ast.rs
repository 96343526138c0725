use serde::Serialize;

use crate::config::Direction;
use crate::error::{Error, Position, Result, Side};

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    EntityDeclaration {
        name: String,
        alias: Option<String>,
        position: Position,
    },
    AttributeBlock {
        entity: String,
        alias: Option<String>,
        attributes: Vec<Attribute>,
        position: Position,
    },
    RelationshipDeclaration(RelationshipDecl),
    Direction(Direction),
}

/// A relationship as written. Glyphs stay raw until the model builder
/// decodes them.
#[derive(Debug, Clone, PartialEq)]
pub struct RelationshipDecl {
    pub left: String,
    pub right: String,
    pub left_glyph: Glyph,
    pub connector: Glyph,
    pub right_glyph: Glyph,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Glyph {
    pub text: String,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Attribute {
    #[serde(rename = "type")]
    pub attr_type: String,
    pub name: String,
    pub keys: Vec<AttributeKey>,
    /// Empty when the comment was omitted or written as `""`.
    pub comment: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AttributeKey {
    PK,
    FK,
    UK,
}

impl AttributeKey {
    pub fn from_word(s: &str) -> Option<Self> {
        match s {
            "PK" => Some(AttributeKey::PK),
            "FK" => Some(AttributeKey::FK),
            "UK" => Some(AttributeKey::UK),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AttributeKey::PK => "PK",
            AttributeKey::FK => "FK",
            AttributeKey::UK => "UK",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Cardinality {
    ZeroOrOne,
    ExactlyOne,
    ZeroOrMore,
    OneOrMore,
}

impl Cardinality {
    pub const ALL: [Cardinality; 4] = [
        Cardinality::ZeroOrOne,
        Cardinality::ExactlyOne,
        Cardinality::ZeroOrMore,
        Cardinality::OneOrMore,
    ];

    /// Crow's feet open away from the line, so `}` only appears on the left
    /// and `{` only on the right.
    pub fn decode(glyph: &str, side: Side) -> Option<Self> {
        match (side, glyph) {
            (_, "||") => Some(Cardinality::ExactlyOne),
            (_, "|o" | "o|") => Some(Cardinality::ZeroOrOne),
            (Side::Left, "}o") | (Side::Right, "o{") => Some(Cardinality::ZeroOrMore),
            (Side::Left, "}|") | (Side::Right, "|{") => Some(Cardinality::OneOrMore),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Cardinality::ZeroOrOne => "ZERO_OR_ONE",
            Cardinality::ExactlyOne => "EXACTLY_ONE",
            Cardinality::ZeroOrMore => "ZERO_OR_MORE",
            Cardinality::OneOrMore => "ONE_OR_MORE",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Identification {
    Identifying,
    NonIdentifying,
}

impl Identification {
    pub fn decode(connector: &str) -> Option<Self> {
        match connector {
            "--" => Some(Identification::Identifying),
            ".." => Some(Identification::NonIdentifying),
            _ => None,
        }
    }
}

pub(crate) fn decode_cardinality(glyph: &Glyph, side: Side) -> Result<Cardinality> {
    Cardinality::decode(&glyph.text, side).ok_or_else(|| Error::UnresolvedGlyph {
        glyph: glyph.text.clone(),
        side,
        position: glyph.position,
    })
}

pub(crate) fn decode_identification(connector: &Glyph) -> Result<Identification> {
    Identification::decode(&connector.text).ok_or_else(|| {
        Error::syntax(
            format!("unknown connector `{}`", connector.text),
            Some(connector.position),
        )
    })
}
