use serde::Serialize;

use crate::config::ErConfig;
use crate::er_ast::{Attribute, Cardinality, Identification};
use crate::er_layout::*;

/// Drawing-primitives document for one compiled diagram.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Drawing {
    pub id: String,
    pub canvas: Canvas,
    pub style: DrawingStyle,
    pub markers: Vec<MarkerDef>,
    pub entities: Vec<EntityBox>,
    pub relationships: Vec<RelationshipEdge>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalingMode {
    Fixed,
    Proportional,
}

/// Root canvas attributes. `width`/`height` are emitted as written, either
/// pixel counts or `100%`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Canvas {
    pub width: String,
    pub height: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    pub view_box: String,
    pub scaling: ScalingMode,
    pub natural_width: f64,
    pub natural_height: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DrawingStyle {
    pub stroke: String,
    pub fill: String,
    pub font_size: f64,
    pub attribute_font_size: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkerEnd {
    Start,
    End,
}

impl MarkerEnd {
    fn as_str(self) -> &'static str {
        match self {
            MarkerEnd::Start => "START",
            MarkerEnd::End => "END",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkerDef {
    pub id: String,
    pub cardinality: Cardinality,
    pub end: MarkerEnd,
    pub ref_x: f64,
    pub ref_y: f64,
    pub width: f64,
    pub height: f64,
    pub shapes: Vec<MarkerShape>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum MarkerShape {
    Path { d: String },
    Circle { cx: f64, cy: f64, r: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Line {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityBox {
    pub id: String,
    pub name: String,
    pub label: String,
    pub rect: Rect,
    pub label_position: Point,
    pub dividers: Vec<Line>,
    pub rows: Vec<AttributeRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttributeRow {
    #[serde(flatten)]
    pub attribute: Attribute,
    pub rect: Rect,
    pub cells: Vec<TextCell>,
}

/// Left-aligned text, vertically centred on `y`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextCell {
    pub column: ColumnKind,
    pub text: String,
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationshipEdge {
    pub id: String,
    pub from: String,
    pub to: String,
    pub kind: EdgeKind,
    pub path: String,
    pub dashed: bool,
    pub start_marker: MarkerRef,
    pub end_marker: MarkerRef,
    /// Kept verbatim, including empty and all-blank labels.
    pub label: String,
    pub label_position: Point,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label_box: Option<Rect>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkerRef {
    pub id: String,
    pub cardinality: Cardinality,
    pub point: Point,
    pub angle: f64,
}

pub fn render(layout: &ErLayout, config: &ErConfig, id: &str) -> Drawing {
    let canvas = canvas(layout, config.use_max_width);
    let cell_padding = config.entity_padding / 3.0;

    let entity_ids: Vec<(&str, &str)> = layout
        .nodes
        .iter()
        .map(|n| (n.name.as_str(), n.id.as_str()))
        .collect();
    let entity_id = |name: &str| {
        entity_ids
            .iter()
            .find(|(n, _)| *n == name)
            .map_or_else(|| name.to_string(), |(_, id)| id.to_string())
    };

    let entities: Vec<EntityBox> = layout
        .nodes
        .iter()
        .map(|node| entity_box(node, cell_padding))
        .collect();

    let relationships: Vec<RelationshipEdge> = layout
        .edges
        .iter()
        .enumerate()
        .map(|(k, edge)| RelationshipEdge {
            id: format!("{id}-rel-{k}"),
            from: entity_id(&edge.from),
            to: entity_id(&edge.to),
            kind: edge.kind,
            path: edge_path(edge),
            dashed: edge.identification == Identification::NonIdentifying,
            start_marker: marker_ref(id, &edge.start, MarkerEnd::Start),
            end_marker: marker_ref(id, &edge.end, MarkerEnd::End),
            label: edge.label.clone(),
            label_position: edge.label_position,
            label_box: (!edge.label.trim().is_empty()).then(|| Rect {
                x: edge.label_position.x - edge.label_size.width / 2.0,
                y: edge.label_position.y - edge.label_size.height / 2.0,
                width: edge.label_size.width,
                height: edge.label_size.height,
            }),
        })
        .collect();

    tracing::debug!(
        id,
        entities = entities.len(),
        relationships = relationships.len(),
        width = %canvas.width,
        "rendered drawing"
    );

    Drawing {
        id: id.to_string(),
        markers: marker_defs(layout, id),
        canvas,
        style: DrawingStyle {
            stroke: config.stroke.clone(),
            fill: config.fill.clone(),
            font_size: config.font_size,
            attribute_font_size: (config.font_size * 0.85).max(1.0),
        },
        entities,
        relationships,
    }
}

fn canvas(layout: &ErLayout, use_max_width: bool) -> Canvas {
    let (w, h) = (fmt_num(layout.width), fmt_num(layout.height));
    let view_box = format!("0 0 {w} {h}");
    if use_max_width {
        Canvas {
            width: "100%".to_string(),
            height: "100%".to_string(),
            style: Some(format!("max-width: {w}px;")),
            view_box,
            scaling: ScalingMode::Proportional,
            natural_width: layout.width,
            natural_height: layout.height,
        }
    } else {
        Canvas {
            width: w,
            height: h,
            style: None,
            view_box,
            scaling: ScalingMode::Fixed,
            natural_width: layout.width,
            natural_height: layout.height,
        }
    }
}

fn entity_box(node: &ErNodeLayout, cell_padding: f64) -> EntityBox {
    let left = node.x;
    let right = node.x + node.width;
    let bottom = node.y + node.height;
    let mut dividers = Vec::new();

    if !node.rows.is_empty() {
        let header = node.y + node.header_height;
        dividers.push(Line {
            x1: left,
            y1: header,
            x2: right,
            y2: header,
        });
        for column in node.columns.iter().skip(1) {
            let x = left + column.x;
            dividers.push(Line {
                x1: x,
                y1: header,
                x2: x,
                y2: bottom,
            });
        }
        for row in node.rows.iter().skip(1) {
            let y = node.y + row.y;
            dividers.push(Line {
                x1: left,
                y1: y,
                x2: right,
                y2: y,
            });
        }
    }

    let rows = node
        .rows
        .iter()
        .map(|row| {
            let top = node.y + row.y;
            let cells = node
                .columns
                .iter()
                .map(|column| TextCell {
                    column: column.kind,
                    text: cell_text(&row.attribute, column.kind),
                    x: left + column.x + cell_padding,
                    y: top + row.height / 2.0,
                })
                .filter(|cell| !cell.text.is_empty())
                .collect();
            AttributeRow {
                attribute: row.attribute.clone(),
                rect: Rect {
                    x: left,
                    y: top,
                    width: node.width,
                    height: row.height,
                },
                cells,
            }
        })
        .collect();

    EntityBox {
        id: node.id.clone(),
        name: node.name.clone(),
        label: node.label.clone(),
        rect: Rect {
            x: node.x,
            y: node.y,
            width: node.width,
            height: node.height,
        },
        label_position: Point::new(node.x + node.width / 2.0, node.y + node.header_height / 2.0),
        dividers,
        rows,
    }
}

fn edge_path(edge: &ErEdgeLayout) -> String {
    let p = &edge.points;
    match edge.kind {
        EdgeKind::SelfLoop if p.len() == 4 => format!(
            "M{},{} C{},{} {},{} {},{}",
            fmt_num(p[0].x),
            fmt_num(p[0].y),
            fmt_num(p[1].x),
            fmt_num(p[1].y),
            fmt_num(p[2].x),
            fmt_num(p[2].y),
            fmt_num(p[3].x),
            fmt_num(p[3].y),
        ),
        _ => p
            .iter()
            .enumerate()
            .map(|(i, pt)| {
                let cmd = if i == 0 { 'M' } else { 'L' };
                format!("{cmd}{},{}", fmt_num(pt.x), fmt_num(pt.y))
            })
            .collect::<Vec<_>>()
            .join(" "),
    }
}

pub fn marker_id(diagram_id: &str, cardinality: Cardinality, end: MarkerEnd) -> String {
    format!("{diagram_id}_{}_{}", cardinality.as_str(), end.as_str())
}

fn marker_ref(diagram_id: &str, marker: &MarkerLayout, end: MarkerEnd) -> MarkerRef {
    MarkerRef {
        id: marker_id(diagram_id, marker.cardinality, end),
        cardinality: marker.cardinality,
        point: marker.point,
        angle: marker.angle,
    }
}

/// One definition per (cardinality, end) pair actually used, in a fixed order.
fn marker_defs(layout: &ErLayout, diagram_id: &str) -> Vec<MarkerDef> {
    let mut defs = Vec::new();
    for cardinality in Cardinality::ALL {
        for end in [MarkerEnd::Start, MarkerEnd::End] {
            let used = layout.edges.iter().any(|e| match end {
                MarkerEnd::Start => e.start.cardinality == cardinality,
                MarkerEnd::End => e.end.cardinality == cardinality,
            });
            if used {
                defs.push(marker_def(diagram_id, cardinality, end));
            }
        }
    }
    defs
}

fn marker_def(diagram_id: &str, cardinality: Cardinality, end: MarkerEnd) -> MarkerDef {
    let path = |d: &str| MarkerShape::Path { d: d.to_string() };
    let circle = |cx: f64, cy: f64| MarkerShape::Circle { cx, cy, r: 6.0 };
    let (ref_x, ref_y, width, height, shapes) = match (cardinality, end) {
        (Cardinality::ExactlyOne, MarkerEnd::Start) => {
            (0.0, 9.0, 18.0, 18.0, vec![path("M9,0 L9,18 M15,0 L15,18")])
        }
        (Cardinality::ExactlyOne, MarkerEnd::End) => {
            (18.0, 9.0, 18.0, 18.0, vec![path("M3,0 L3,18 M9,0 L9,18")])
        }
        (Cardinality::ZeroOrOne, MarkerEnd::Start) => (
            0.0,
            9.0,
            30.0,
            18.0,
            vec![circle(21.0, 9.0), path("M9,0 L9,18")],
        ),
        (Cardinality::ZeroOrOne, MarkerEnd::End) => (
            30.0,
            9.0,
            30.0,
            18.0,
            vec![circle(9.0, 9.0), path("M21,0 L21,18")],
        ),
        (Cardinality::OneOrMore, MarkerEnd::Start) => (
            18.0,
            18.0,
            45.0,
            36.0,
            vec![path("M0,18 Q18,0 36,18 Q18,36 0,18 M42,9 L42,27")],
        ),
        (Cardinality::OneOrMore, MarkerEnd::End) => (
            27.0,
            18.0,
            45.0,
            36.0,
            vec![path("M3,9 L3,27 M9,18 Q27,0 45,18 Q27,36 9,18")],
        ),
        (Cardinality::ZeroOrMore, MarkerEnd::Start) => (
            18.0,
            18.0,
            57.0,
            36.0,
            vec![circle(48.0, 18.0), path("M0,18 Q18,0 36,18 Q18,36 0,18")],
        ),
        (Cardinality::ZeroOrMore, MarkerEnd::End) => (
            39.0,
            18.0,
            57.0,
            36.0,
            vec![circle(9.0, 18.0), path("M21,18 Q39,0 57,18 Q39,36 21,18")],
        ),
    };
    MarkerDef {
        id: marker_id(diagram_id, cardinality, end),
        cardinality,
        end,
        ref_x,
        ref_y,
        width,
        height,
        shapes,
    }
}

/// Two decimals at most, trailing zeros dropped: `465.0` prints as `465`.
pub fn fmt_num(value: f64) -> String {
    if value.abs() < 0.005 {
        return "0".to_string();
    }
    let s = format!("{value:.2}");
    let s = s.trim_end_matches('0').trim_end_matches('.');
    s.to_string()
}
