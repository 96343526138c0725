use indexmap::IndexMap;
use serde::Serialize;

use crate::config::Direction;
use crate::er_ast::*;
use crate::error::{Result, Side};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Entity {
    pub id: String,
    pub name: String,
    pub alias: Option<String>,
    pub attributes: Vec<Attribute>,
}

impl Entity {
    /// Text shown in the box title.
    pub fn label(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Relationship {
    pub left: String,
    pub right: String,
    pub left_cardinality: Cardinality,
    pub right_cardinality: Cardinality,
    pub identification: Identification,
    pub label: String,
}

impl Relationship {
    pub fn is_self_loop(&self) -> bool {
        self.left == self.right
    }
}

/// One compiled diagram. Entities keep first-mention order; the id counter
/// belongs to this instance so separate diagrams never share numbering.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Diagram {
    pub entities: IndexMap<String, Entity>,
    pub relationships: Vec<Relationship>,
    pub direction: Option<Direction>,
    #[serde(skip)]
    entity_counter: usize,
}

impl Diagram {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entity(&self, name: &str) -> Option<&Entity> {
        self.entities.get(name)
    }

    pub fn entity_index(&self, name: &str) -> Option<usize> {
        self.entities.get_index_of(name)
    }

    pub fn add_entity(&mut self, name: &str, alias: Option<&str>) -> &mut Entity {
        let counter = &mut self.entity_counter;
        let entity = self.entities.entry(name.to_string()).or_insert_with(|| {
            let id = format!("entity-{}-{}", id_fragment(name), counter);
            *counter += 1;
            Entity {
                id,
                name: name.to_string(),
                alias: None,
                attributes: Vec::new(),
            }
        });
        if entity.alias.is_none() {
            if let Some(alias) = alias.filter(|a| !a.trim().is_empty()) {
                entity.alias = Some(alias.to_string());
            }
        }
        entity
    }

    pub fn add_attributes(&mut self, name: &str, alias: Option<&str>, attributes: Vec<Attribute>) {
        self.add_entity(name, alias).attributes.extend(attributes);
    }

    pub fn add_relationship(&mut self, decl: RelationshipDecl) -> Result<()> {
        let left_cardinality = decode_cardinality(&decl.left_glyph, Side::Left)?;
        let right_cardinality = decode_cardinality(&decl.right_glyph, Side::Right)?;
        let identification = decode_identification(&decl.connector)?;

        self.add_entity(&decl.left, None);
        self.add_entity(&decl.right, None);
        self.relationships.push(Relationship {
            left: decl.left,
            right: decl.right,
            left_cardinality,
            right_cardinality,
            identification,
            label: decl.label,
        });
        Ok(())
    }
}

fn id_fragment(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

pub fn build(statements: Vec<Statement>) -> Result<Diagram> {
    let mut diagram = Diagram::new();
    for statement in statements {
        match statement {
            Statement::EntityDeclaration { name, alias, .. } => {
                diagram.add_entity(&name, alias.as_deref());
            }
            Statement::AttributeBlock {
                entity,
                alias,
                attributes,
                ..
            } => diagram.add_attributes(&entity, alias.as_deref(), attributes),
            Statement::RelationshipDeclaration(decl) => diagram.add_relationship(decl)?,
            Statement::Direction(direction) => diagram.direction = Some(direction),
        }
    }
    tracing::debug!(
        entities = diagram.entities.len(),
        relationships = diagram.relationships.len(),
        "built ER model"
    );
    Ok(diagram)
}
