use serde::Serialize;

use crate::config::{Direction, ErConfig};
use crate::er_ast::{Attribute, Cardinality, Identification};
use crate::er_model::{Diagram, Entity, Relationship};
use crate::text_metrics::{self, TextSize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ErLayout {
    pub nodes: Vec<ErNodeLayout>,
    pub edges: Vec<ErEdgeLayout>,
    pub width: f64,
    pub height: f64,
    pub direction: Direction,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ErNodeLayout {
    pub id: String,
    pub name: String,
    pub label: String,
    /// Top-left corner.
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub header_height: f64,
    pub columns: Vec<ColumnLayout>,
    pub rows: Vec<AttributeRowLayout>,
}

impl ErNodeLayout {
    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    Type,
    Name,
    Keys,
    Comment,
}

/// Column offsets are relative to the node's left edge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColumnLayout {
    pub kind: ColumnKind,
    pub x: f64,
    pub width: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttributeRowLayout {
    pub attribute: Attribute,
    /// Offset from the node's top edge.
    pub y: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    Straight,
    Polyline,
    /// Control points of one cubic curve leaving and re-entering the same box.
    SelfLoop,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ErEdgeLayout {
    pub from: String,
    pub to: String,
    pub kind: EdgeKind,
    pub points: Vec<Point>,
    pub identification: Identification,
    pub start: MarkerLayout,
    pub end: MarkerLayout,
    pub label: String,
    pub label_position: Point,
    pub label_size: TextSize,
}

/// `angle` is the direction, in degrees, from the endpoint along the edge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarkerLayout {
    pub cardinality: Cardinality,
    pub point: Point,
    pub angle: f64,
}

const MAX_ORDER_PASSES: usize = 24;
const ALIGN_PASSES: usize = 4;
const PARALLEL_SPACING: f64 = 30.0;
const LOOP_STEP: f64 = 40.0;
const LOOP_LABEL_GAP: f64 = 6.0;

pub fn compute(diagram: &Diagram, config: &ErConfig) -> ErLayout {
    let direction = diagram.direction.unwrap_or(config.layout_direction);
    let entities: Vec<&Entity> = diagram.entities.values().collect();
    let boxes: Vec<EntityBox> = entities.iter().map(|e| size_entity(e, config)).collect();

    let rels: Vec<RelRef> = diagram
        .relationships
        .iter()
        .filter_map(|r| {
            Some(RelRef {
                rel: r,
                left: diagram.entity_index(&r.left)?,
                right: diagram.entity_index(&r.right)?,
            })
        })
        .collect();

    let label_sizes: Vec<TextSize> = rels
        .iter()
        .map(|r| text_metrics::measure(&r.rel.label, config.font_size))
        .collect();

    let graph = RankGraph::build(entities.len(), &rels);
    let layers = order_layers(&graph);
    let frame = AxisFrame { direction };
    let loop_reserve = loop_reserve(entities.len(), &rels, &label_sizes, &frame);

    let cross_sizes: Vec<f64> = graph
        .nodes
        .iter()
        .map(|n| n.entity.map_or(0.0, |i| frame.cross_size(&boxes[i])))
        .collect();
    let cross = assign_cross(&graph, &layers, &cross_sizes, &loop_reserve, config);
    let main = assign_main(&graph, &boxes, &frame, config);

    let centers: Vec<Point> = (0..entities.len())
        .map(|i| frame.to_real(cross[i], main[graph.nodes[i].rank]))
        .collect();

    let mut edges = route_edges(&graph, &rels, &boxes, &centers, &cross, &main, &frame, &label_sizes);

    let mut nodes: Vec<ErNodeLayout> = entities
        .iter()
        .zip(boxes)
        .zip(&centers)
        .map(|((entity, b), c)| ErNodeLayout {
            id: entity.id.clone(),
            name: entity.name.clone(),
            label: entity.label().to_string(),
            x: c.x - b.width / 2.0,
            y: c.y - b.height / 2.0,
            width: b.width,
            height: b.height,
            header_height: b.header_height,
            columns: b.columns,
            rows: b.rows,
        })
        .collect();

    let bounds = content_bounds(&nodes, &edges);
    let dx = config.diagram_padding - bounds.min_x;
    let dy = config.diagram_padding - bounds.min_y;
    for node in &mut nodes {
        node.x += dx;
        node.y += dy;
    }
    for edge in &mut edges {
        edge.translate(dx, dy);
    }

    let width = bounds.width() + config.diagram_padding * 2.0;
    let height = bounds.height() + config.diagram_padding * 2.0;
    tracing::debug!(
        nodes = nodes.len(),
        edges = edges.len(),
        ranks = layers.len(),
        width,
        height,
        "computed ER layout"
    );

    ErLayout {
        nodes,
        edges,
        width,
        height,
        direction,
    }
}


struct EntityBox {
    width: f64,
    height: f64,
    header_height: f64,
    columns: Vec<ColumnLayout>,
    rows: Vec<AttributeRowLayout>,
}

fn size_entity(entity: &Entity, config: &ErConfig) -> EntityBox {
    let padding = config.entity_padding;
    let cell_padding = padding / 3.0;
    let attr_font = (config.font_size * 0.85).max(1.0);
    let label = text_metrics::measure(entity.label(), config.font_size);

    if entity.attributes.is_empty() {
        let width = config
            .min_entity_width
            .max(label.width + padding * 2.0);
        let height = config
            .min_entity_height
            .max(label.height + padding * 2.0);
        tracing::trace!(entity = %entity.name, width, height, "sized entity");
        return EntityBox {
            width,
            height,
            header_height: height,
            columns: Vec::new(),
            rows: Vec::new(),
        };
    }

    let has_keys = entity.attributes.iter().any(|a| !a.keys.is_empty());
    let has_comment = entity.attributes.iter().any(|a| !a.comment.is_empty());
    let mut kinds = vec![ColumnKind::Type, ColumnKind::Name];
    if has_keys {
        kinds.push(ColumnKind::Keys);
    }
    if has_comment {
        kinds.push(ColumnKind::Comment);
    }

    let mut widths = vec![0.0_f64; kinds.len()];
    let mut row_heights = Vec::with_capacity(entity.attributes.len());
    for attribute in &entity.attributes {
        let mut row_height: f64 = 0.0;
        for (slot, kind) in kinds.iter().enumerate() {
            let size = text_metrics::measure(&cell_text(attribute, *kind), attr_font);
            widths[slot] = widths[slot].max(size.width + cell_padding * 2.0);
            row_height = row_height.max(size.height);
        }
        row_heights.push(row_height + cell_padding * 2.0);
    }

    let content_width: f64 = widths.iter().sum();
    let width = config
        .min_entity_width
        .max(label.width + padding * 2.0)
        .max(content_width);
    let spare = (width - content_width) / kinds.len() as f64;

    let mut x = 0.0;
    let columns: Vec<ColumnLayout> = kinds
        .iter()
        .zip(&widths)
        .map(|(kind, w)| {
            let column = ColumnLayout {
                kind: *kind,
                x,
                width: w + spare,
            };
            x += column.width;
            column
        })
        .collect();

    let header_height = label.height + cell_padding * 2.0;
    let mut y = header_height;
    let rows: Vec<AttributeRowLayout> = entity
        .attributes
        .iter()
        .zip(row_heights)
        .map(|(attribute, height)| {
            let row = AttributeRowLayout {
                attribute: attribute.clone(),
                y,
                height,
            };
            y += height;
            row
        })
        .collect();

    tracing::trace!(entity = %entity.name, width, height = y, "sized entity");
    EntityBox {
        width,
        height: y,
        header_height,
        columns,
        rows,
    }
}

pub fn cell_text(attribute: &Attribute, kind: ColumnKind) -> String {
    match kind {
        ColumnKind::Type => text_metrics::display_type(&attribute.attr_type),
        ColumnKind::Name => attribute.name.clone(),
        ColumnKind::Keys => attribute
            .keys
            .iter()
            .map(|k| k.as_str())
            .collect::<Vec<_>>()
            .join(","),
        ColumnKind::Comment => attribute.comment.clone(),
    }
}


struct RelRef<'d> {
    rel: &'d Relationship,
    left: usize,
    right: usize,
}

impl RelRef<'_> {
    fn is_self_loop(&self) -> bool {
        self.left == self.right
    }
}

struct GraphNode {
    // None for dummy nodes.
    entity: Option<usize>,
    rank: usize,
}

struct RankGraph {
    nodes: Vec<GraphNode>,
    rank_count: usize,
    up: Vec<Vec<usize>>,
    down: Vec<Vec<usize>>,
    // Left entity to right entity; empty for self-loops.
    chains: Vec<Vec<usize>>,
}

impl RankGraph {
    fn build(entity_count: usize, rels: &[RelRef]) -> Self {
        let edges: Vec<(usize, usize)> = rels
            .iter()
            .filter(|r| !r.is_self_loop())
            .map(|r| (r.left, r.right))
            .collect();
        let reversed = break_cycles(entity_count, &edges);
        let dag: Vec<(usize, usize)> = edges
            .iter()
            .zip(&reversed)
            .map(|(&(u, v), &rev)| if rev { (v, u) } else { (u, v) })
            .collect();
        let ranks = assign_ranks(entity_count, &dag);
        let rank_count = ranks.iter().max().map_or(1, |r| r + 1);

        let mut nodes: Vec<GraphNode> = ranks
            .iter()
            .enumerate()
            .map(|(i, &rank)| GraphNode {
                entity: Some(i),
                rank,
            })
            .collect();
        let mut segments: Vec<(usize, usize)> = Vec::new();
        let mut chains = Vec::with_capacity(rels.len());
        let mut dag_iter = dag.iter().zip(&reversed);

        for rel in rels {
            if rel.is_self_loop() {
                chains.push(Vec::new());
                continue;
            }
            let Some((&(u, v), &rev)) = dag_iter.next() else {
                chains.push(Vec::new());
                continue;
            };
            let mut chain = vec![u];
            let mut prev = u;
            for rank in ranks[u] + 1..ranks[v] {
                let dummy = nodes.len();
                nodes.push(GraphNode { entity: None, rank });
                segments.push((prev, dummy));
                chain.push(dummy);
                prev = dummy;
            }
            segments.push((prev, v));
            chain.push(v);
            if rev {
                chain.reverse();
            }
            chains.push(chain);
        }

        let mut up = vec![Vec::new(); nodes.len()];
        let mut down = vec![Vec::new(); nodes.len()];
        for &(u, v) in &segments {
            down[u].push(v);
            up[v].push(u);
        }

        RankGraph {
            nodes,
            rank_count,
            up,
            down,
            chains,
        }
    }
}

fn break_cycles(n: usize, edges: &[(usize, usize)]) -> Vec<bool> {
    let mut succ = vec![Vec::new(); n];
    let mut pred = vec![Vec::new(); n];
    for &(u, v) in edges {
        succ[u].push(v);
        pred[v].push(u);
    }
    let mut out_deg: Vec<i64> = succ.iter().map(|s| s.len() as i64).collect();
    let mut in_deg: Vec<i64> = pred.iter().map(|p| p.len() as i64).collect();
    let mut active = vec![true; n];
    let mut remaining = n;
    let mut head: Vec<usize> = Vec::new();
    let mut tail: Vec<usize> = Vec::new();

    let remove = |v: usize, active: &mut Vec<bool>, out_deg: &mut Vec<i64>, in_deg: &mut Vec<i64>| {
        active[v] = false;
        for &u in &pred[v] {
            if active[u] {
                out_deg[u] -= 1;
            }
        }
        for &w in &succ[v] {
            if active[w] {
                in_deg[w] -= 1;
            }
        }
    };

    while remaining > 0 {
        loop {
            let sinks: Vec<usize> = (0..n).filter(|&v| active[v] && out_deg[v] == 0).collect();
            if sinks.is_empty() {
                break;
            }
            for v in sinks {
                remove(v, &mut active, &mut out_deg, &mut in_deg);
                tail.push(v);
                remaining -= 1;
            }
        }
        loop {
            let sources: Vec<usize> = (0..n).filter(|&v| active[v] && in_deg[v] == 0).collect();
            if sources.is_empty() {
                break;
            }
            for v in sources {
                remove(v, &mut active, &mut out_deg, &mut in_deg);
                head.push(v);
                remaining -= 1;
            }
        }
        let mut best: Option<(usize, i64)> = None;
        for v in (0..n).filter(|&v| active[v]) {
            let delta = out_deg[v] - in_deg[v];
            if best.is_none_or(|(_, d)| delta > d) {
                best = Some((v, delta));
            }
        }
        if let Some((v, _)) = best {
            remove(v, &mut active, &mut out_deg, &mut in_deg);
            head.push(v);
            remaining -= 1;
        }
    }

    tail.reverse();
    head.extend(tail);
    let mut order = vec![0; n];
    for (i, &v) in head.iter().enumerate() {
        order[v] = i;
    }
    edges.iter().map(|&(u, v)| order[u] > order[v]).collect()
}

fn assign_ranks(n: usize, dag: &[(usize, usize)]) -> Vec<usize> {
    let mut rank = vec![0usize; n];
    for _ in 0..n {
        let mut changed = false;
        for &(u, v) in dag {
            if rank[v] < rank[u] + 1 {
                rank[v] = rank[u] + 1;
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }

    let mut has_pred = vec![false; n];
    for &(_, v) in dag {
        has_pred[v] = true;
    }
    for u in 0..n {
        if has_pred[u] {
            continue;
        }
        if let Some(nearest) = dag.iter().filter(|(a, _)| *a == u).map(|&(_, v)| rank[v]).min() {
            rank[u] = nearest - 1;
        }
    }

    let mut used: Vec<usize> = rank.clone();
    used.sort_unstable();
    used.dedup();
    rank.iter()
        .map(|r| used.binary_search(r).unwrap_or(0))
        .collect()
}


fn order_layers(graph: &RankGraph) -> Vec<Vec<usize>> {
    let mut layers: Vec<Vec<usize>> = vec![Vec::new(); graph.rank_count];
    for (i, node) in graph.nodes.iter().enumerate() {
        layers[node.rank].push(i);
    }

    let mut best = layers.clone();
    let mut best_crossings = count_crossings(&layers, graph);
    for pass in 0..MAX_ORDER_PASSES {
        if best_crossings == 0 {
            break;
        }
        if pass % 2 == 0 {
            for r in 1..graph.rank_count {
                reorder(&mut layers, r, r - 1, &graph.up, graph.nodes.len());
            }
        } else {
            for r in (0..graph.rank_count.saturating_sub(1)).rev() {
                reorder(&mut layers, r, r + 1, &graph.down, graph.nodes.len());
            }
        }
        let crossings = count_crossings(&layers, graph);
        if crossings < best_crossings {
            best = layers.clone();
            best_crossings = crossings;
        }
    }
    best
}

fn positions(layers: &[Vec<usize>], node_count: usize) -> Vec<usize> {
    let mut pos = vec![0; node_count];
    for layer in layers {
        for (i, &node) in layer.iter().enumerate() {
            pos[node] = i;
        }
    }
    pos
}

fn reorder(
    layers: &mut [Vec<usize>],
    layer: usize,
    fixed: usize,
    neighbors: &[Vec<usize>],
    node_count: usize,
) {
    let pos = positions(layers, node_count);
    let mut keyed: Vec<(f64, usize)> = layers[layer]
        .iter()
        .enumerate()
        .map(|(i, &node)| {
            let adjacent: Vec<f64> = neighbors[node]
                .iter()
                .filter(|&&nb| layers[fixed].contains(&nb))
                .map(|&nb| pos[nb] as f64)
                .collect();
            let key = if adjacent.is_empty() {
                i as f64
            } else {
                adjacent.iter().sum::<f64>() / adjacent.len() as f64
            };
            (key, node)
        })
        .collect();
    keyed.sort_by(|a, b| a.0.total_cmp(&b.0));
    layers[layer] = keyed.into_iter().map(|(_, node)| node).collect();
}

fn count_crossings(layers: &[Vec<usize>], graph: &RankGraph) -> usize {
    let pos = positions(layers, graph.nodes.len());
    let mut total = 0;
    for layer in layers {
        let segments: Vec<(usize, usize)> = layer
            .iter()
            .flat_map(|&u| graph.down[u].iter().map(move |&v| (u, v)))
            .map(|(u, v)| (pos[u], pos[v]))
            .collect();
        for (i, a) in segments.iter().enumerate() {
            for b in &segments[i + 1..] {
                if (a.0 < b.0 && a.1 > b.1) || (a.0 > b.0 && a.1 < b.1) {
                    total += 1;
                }
            }
        }
    }
    total
}


// Maps (cross, main) layout space onto screen axes. Main follows the ranks.
struct AxisFrame {
    direction: Direction,
}

impl AxisFrame {
    fn cross_size(&self, b: &EntityBox) -> f64 {
        if self.direction.is_horizontal() {
            b.height
        } else {
            b.width
        }
    }

    fn main_size(&self, b: &EntityBox) -> f64 {
        if self.direction.is_horizontal() {
            b.width
        } else {
            b.height
        }
    }

    fn text_extents(&self, size: TextSize) -> (f64, f64) {
        if self.direction.is_horizontal() {
            (size.height, size.width)
        } else {
            (size.width, size.height)
        }
    }

    fn to_real(&self, cross: f64, main: f64) -> Point {
        let main = if self.direction.is_reversed() { -main } else { main };
        if self.direction.is_horizontal() {
            Point::new(main, cross)
        } else {
            Point::new(cross, main)
        }
    }
}

fn loop_reserve(
    entity_count: usize,
    rels: &[RelRef],
    label_sizes: &[TextSize],
    frame: &AxisFrame,
) -> Vec<f64> {
    let mut count = vec![0usize; entity_count];
    let mut label_extent = vec![0.0_f64; entity_count];
    for (rel, size) in rels.iter().zip(label_sizes) {
        if !rel.is_self_loop() {
            continue;
        }
        count[rel.left] += 1;
        if !rel.rel.label.trim().is_empty() {
            let (extent, _) = frame.text_extents(*size);
            label_extent[rel.left] = label_extent[rel.left].max(extent);
        }
    }
    count
        .iter()
        .zip(&label_extent)
        .map(|(&c, &l)| {
            if c == 0 {
                0.0
            } else {
                c as f64 * LOOP_STEP + LOOP_LABEL_GAP + l
            }
        })
        .collect()
}

fn assign_cross(
    graph: &RankGraph,
    layers: &[Vec<usize>],
    sizes: &[f64],
    reserve: &[f64],
    config: &ErConfig,
) -> Vec<f64> {
    let reserve_of = |node: usize| graph.nodes[node].entity.map_or(0.0, |e| reserve[e]);
    let separations: Vec<Vec<f64>> = layers
        .iter()
        .map(|layer| {
            layer
                .windows(2)
                .map(|pair| {
                    let (a, b) = (pair[0], pair[1]);
                    let both_entities =
                        graph.nodes[a].entity.is_some() && graph.nodes[b].entity.is_some();
                    let gap = if both_entities {
                        config.node_spacing
                    } else {
                        config.node_spacing / 2.0
                    };
                    sizes[a] / 2.0 + reserve_of(a) + gap + sizes[b] / 2.0
                })
                .collect()
        })
        .collect();

    let mut cross = vec![0.0; graph.nodes.len()];
    for (layer, seps) in layers.iter().zip(&separations) {
        let mut at = 0.0;
        for (i, &node) in layer.iter().enumerate() {
            if i > 0 {
                at += seps[i - 1];
            }
            cross[node] = at;
        }
    }

    // Centre each rank on the widest one before pulling nodes together.
    let extents: Vec<f64> = layers
        .iter()
        .map(|layer| match (layer.first(), layer.last()) {
            (Some(&f), Some(&l)) => cross[l] - cross[f],
            _ => 0.0,
        })
        .collect();
    let widest = extents.iter().copied().fold(0.0, f64::max);
    for (layer, extent) in layers.iter().zip(&extents) {
        let shift = (widest - extent) / 2.0;
        for &node in layer {
            cross[node] += shift;
        }
    }

    for _ in 0..ALIGN_PASSES {
        for r in 1..layers.len() {
            align_layer(&mut cross, &layers[r], &separations[r], &graph.up);
        }
        for r in (0..layers.len().saturating_sub(1)).rev() {
            align_layer(&mut cross, &layers[r], &separations[r], &graph.down);
        }
    }
    cross
}

fn align_layer(cross: &mut [f64], layer: &[usize], seps: &[f64], neighbors: &[Vec<usize>]) {
    if layer.is_empty() {
        return;
    }
    let desired: Vec<f64> = layer
        .iter()
        .map(|&node| {
            let adjacent = &neighbors[node];
            if adjacent.is_empty() {
                cross[node]
            } else {
                adjacent.iter().map(|&nb| cross[nb]).sum::<f64>() / adjacent.len() as f64
            }
        })
        .collect();

    let mut forward = desired.clone();
    for i in 1..forward.len() {
        forward[i] = forward[i].max(forward[i - 1] + seps[i - 1]);
    }
    let mut backward = desired;
    for i in (0..backward.len() - 1).rev() {
        backward[i] = backward[i].min(backward[i + 1] - seps[i]);
    }
    for (i, &node) in layer.iter().enumerate() {
        cross[node] = (forward[i] + backward[i]) / 2.0;
    }
}

fn assign_main(graph: &RankGraph, boxes: &[EntityBox], frame: &AxisFrame, config: &ErConfig) -> Vec<f64> {
    let mut band = vec![0.0_f64; graph.rank_count];
    for node in &graph.nodes {
        if let Some(e) = node.entity {
            band[node.rank] = band[node.rank].max(frame.main_size(&boxes[e]));
        }
    }
    let mut main = Vec::with_capacity(graph.rank_count);
    let mut at = 0.0;
    for size in band {
        main.push(at + size / 2.0);
        at += size + config.rank_spacing;
    }
    main
}


#[allow(clippy::too_many_arguments)]
fn route_edges(
    graph: &RankGraph,
    rels: &[RelRef],
    boxes: &[EntityBox],
    centers: &[Point],
    cross: &[f64],
    main: &[f64],
    frame: &AxisFrame,
    label_sizes: &[TextSize],
) -> Vec<ErEdgeLayout> {
    let groups = parallel_groups(rels);
    let loop_labels = loop_label_positions(graph, rels, boxes, cross, main, frame, label_sizes);
    let mut loops_seen = vec![0usize; boxes.len()];

    rels.iter()
        .enumerate()
        .map(|(k, rel)| {
            let (group_index, group_size) = groups[k];
            let (kind, points, label_position) = if rel.is_self_loop() {
                let nth = loops_seen[rel.left];
                loops_seen[rel.left] += 1;
                let entity = &boxes[rel.left];
                let c = cross[rel.left];
                let m = main[graph.nodes[rel.left].rank];
                let abstract_points = self_loop(c, m, frame.cross_size(entity), frame.main_size(entity), nth);
                let points: Vec<Point> =
                    abstract_points.iter().map(|&(c, m)| frame.to_real(c, m)).collect();
                let label_position = loop_labels[k].unwrap_or(points[1]);
                (EdgeKind::SelfLoop, points, label_position)
            } else {
                let offset = parallel_offset(
                    group_index,
                    group_size,
                    frame.cross_size(&boxes[rel.left]).min(frame.cross_size(&boxes[rel.right])),
                );
                let mut points: Vec<Point> = graph.chains[k]
                    .iter()
                    .map(|&node| frame.to_real(cross[node] + offset, main[graph.nodes[node].rank]))
                    .collect();
                let from = Rect::around(centers[rel.left], &boxes[rel.left]);
                let to = Rect::around(centers[rel.right], &boxes[rel.right]);
                clip_edge_endpoints(&mut points, from, to);
                let fraction = (group_index + 1) as f64 / (group_size + 1) as f64;
                let label_position = point_along(&points, fraction);
                let kind = if points.len() > 2 {
                    EdgeKind::Polyline
                } else {
                    EdgeKind::Straight
                };
                (kind, points, label_position)
            };

            ErEdgeLayout {
                from: rel.rel.left.clone(),
                to: rel.rel.right.clone(),
                kind,
                start: marker_at(rel.rel.left_cardinality, &points, false),
                end: marker_at(rel.rel.right_cardinality, &points, true),
                points,
                identification: rel.rel.identification,
                label: rel.rel.label.clone(),
                label_position,
                label_size: label_sizes[k],
            }
        })
        .collect()
}

fn parallel_groups(rels: &[RelRef]) -> Vec<(usize, usize)> {
    let key = |r: &RelRef| (r.left.min(r.right), r.left.max(r.right));
    rels.iter()
        .enumerate()
        .map(|(k, rel)| {
            if rel.is_self_loop() {
                return (0, 1);
            }
            let same: Vec<usize> = rels
                .iter()
                .enumerate()
                .filter(|(_, other)| !other.is_self_loop() && key(other) == key(rel))
                .map(|(i, _)| i)
                .collect();
            let index = same.iter().position(|&i| i == k).unwrap_or(0);
            (index, same.len())
        })
        .collect()
}

fn parallel_offset(index: usize, count: usize, narrowest: f64) -> f64 {
    if count < 2 {
        return 0.0;
    }
    let spacing = PARALLEL_SPACING.min(narrowest * 0.8 / (count - 1) as f64);
    (index as f64 - (count - 1) as f64 / 2.0) * spacing
}

fn self_loop(c: f64, m: f64, cross_size: f64, main_size: f64, nth: usize) -> [(f64, f64); 4] {
    let face = c + cross_size / 2.0;
    let reach = face + LOOP_STEP * (nth + 1) as f64;
    let half_span = (main_size / 4.0 + nth as f64 * main_size / 8.0).min(main_size * 0.45);
    [
        (face, m - half_span),
        (reach, m - half_span),
        (reach, m + half_span),
        (face, m + half_span),
    ]
}

// Loop labels sit past the outermost loop of their entity, stacked along
// the main axis so they never cover the box or each other.
fn loop_label_positions(
    graph: &RankGraph,
    rels: &[RelRef],
    boxes: &[EntityBox],
    cross: &[f64],
    main: &[f64],
    frame: &AxisFrame,
    label_sizes: &[TextSize],
) -> Vec<Option<Point>> {
    let mut positions = vec![None; rels.len()];
    for (entity, b) in boxes.iter().enumerate() {
        let loops: Vec<usize> = rels
            .iter()
            .enumerate()
            .filter(|(_, r)| r.is_self_loop() && r.left == entity)
            .map(|(k, _)| k)
            .collect();
        if loops.is_empty() {
            continue;
        }
        let m = main[graph.nodes[entity].rank];
        let outer = cross[entity] + frame.cross_size(b) / 2.0 + LOOP_STEP * loops.len() as f64 + LOOP_LABEL_GAP;
        let visible: Vec<usize> = loops
            .iter()
            .copied()
            .filter(|&k| !rels[k].rel.label.trim().is_empty())
            .collect();
        let stacked: f64 = visible
            .iter()
            .map(|&k| frame.text_extents(label_sizes[k]).1)
            .sum::<f64>()
            + LOOP_LABEL_GAP * visible.len().saturating_sub(1) as f64;

        for &k in &loops {
            positions[k] = Some(frame.to_real(outer, m));
        }
        let mut at = m - stacked / 2.0;
        for k in visible {
            let (extent_cross, extent_main) = frame.text_extents(label_sizes[k]);
            positions[k] = Some(frame.to_real(outer + extent_cross / 2.0, at + extent_main / 2.0));
            at += extent_main + LOOP_LABEL_GAP;
        }
    }
    positions
}

fn marker_at(cardinality: Cardinality, points: &[Point], at_end: bool) -> MarkerLayout {
    let (point, toward) = if at_end {
        (points[points.len() - 1], points[points.len() - 2])
    } else {
        (points[0], points[1])
    };
    MarkerLayout {
        cardinality,
        point,
        angle: (toward.y - point.y).atan2(toward.x - point.x).to_degrees(),
    }
}

#[derive(Debug, Clone, Copy)]
struct Rect {
    min_x: f64,
    min_y: f64,
    max_x: f64,
    max_y: f64,
}

impl Rect {
    fn around(center: Point, b: &EntityBox) -> Self {
        Self {
            min_x: center.x - b.width / 2.0,
            min_y: center.y - b.height / 2.0,
            max_x: center.x + b.width / 2.0,
            max_y: center.y + b.height / 2.0,
        }
    }

    fn contains(&self, p: Point) -> bool {
        p.x >= self.min_x && p.x <= self.max_x && p.y >= self.min_y && p.y <= self.max_y
    }
}

fn intersect_segment_with_rect(inside: Point, outside: Point, rect: Rect) -> Option<Point> {
    let dx = outside.x - inside.x;
    let dy = outside.y - inside.y;
    let eps = 1e-9;
    let mut best: Option<(f64, Point)> = None;
    let mut consider = |t: f64, p: Point| {
        if (-eps..=1.0 + eps).contains(&t) && best.is_none_or(|(bt, _)| t < bt) {
            best = Some((t, p));
        }
    };

    if dx.abs() > eps {
        for edge_x in [rect.min_x, rect.max_x] {
            let t = (edge_x - inside.x) / dx;
            let y = inside.y + t * dy;
            if t > eps && y + eps >= rect.min_y && y <= rect.max_y + eps {
                consider(t, Point::new(edge_x, y));
            }
        }
    }
    if dy.abs() > eps {
        for edge_y in [rect.min_y, rect.max_y] {
            let t = (edge_y - inside.y) / dy;
            let x = inside.x + t * dx;
            if t > eps && x + eps >= rect.min_x && x <= rect.max_x + eps {
                consider(t, Point::new(x, edge_y));
            }
        }
    }
    best.map(|(_, p)| p)
}

fn clip_edge_endpoints(points: &mut [Point], from: Rect, to: Rect) {
    if points.len() < 2 {
        return;
    }
    if from.contains(points[0]) {
        if let Some(p) = intersect_segment_with_rect(points[0], points[1], from) {
            points[0] = p;
        }
    }
    let last = points.len() - 1;
    if to.contains(points[last]) {
        if let Some(p) = intersect_segment_with_rect(points[last], points[last - 1], to) {
            points[last] = p;
        }
    }
}

fn point_along(points: &[Point], fraction: f64) -> Point {
    let lengths: Vec<f64> = points
        .windows(2)
        .map(|w| (w[1].x - w[0].x).hypot(w[1].y - w[0].y))
        .collect();
    let mut remaining = lengths.iter().sum::<f64>() * fraction;
    for (w, len) in points.windows(2).zip(lengths) {
        if len == 0.0 {
            continue;
        }
        if len < remaining {
            remaining -= len;
            continue;
        }
        let t = (remaining / len).clamp(0.0, 1.0);
        return Point::new(w[0].x + t * (w[1].x - w[0].x), w[0].y + t * (w[1].y - w[0].y));
    }
    points.last().copied().unwrap_or(Point::new(0.0, 0.0))
}

impl ErEdgeLayout {
    fn translate(&mut self, dx: f64, dy: f64) {
        for p in &mut self.points {
            p.x += dx;
            p.y += dy;
        }
        for m in [&mut self.start, &mut self.end] {
            m.point.x += dx;
            m.point.y += dy;
        }
        self.label_position.x += dx;
        self.label_position.y += dy;
    }
}


struct Bounds {
    min_x: f64,
    min_y: f64,
    max_x: f64,
    max_y: f64,
}

impl Bounds {
    fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    fn height(&self) -> f64 {
        self.max_y - self.min_y
    }
}

fn content_bounds(nodes: &[ErNodeLayout], edges: &[ErEdgeLayout]) -> Bounds {
    let mut points: Vec<Point> = Vec::new();
    for n in nodes {
        points.push(Point::new(n.x, n.y));
        points.push(Point::new(n.x + n.width, n.y + n.height));
    }
    for e in edges {
        points.extend(&e.points);
        if !e.label.trim().is_empty() {
            let (hw, hh) = (e.label_size.width / 2.0, e.label_size.height / 2.0);
            points.push(Point::new(e.label_position.x - hw, e.label_position.y - hh));
            points.push(Point::new(e.label_position.x + hw, e.label_position.y + hh));
        }
    }
    if points.is_empty() {
        return Bounds {
            min_x: 0.0,
            min_y: 0.0,
            max_x: 0.0,
            max_y: 0.0,
        };
    }
    points.iter().fold(
        Bounds {
            min_x: f64::INFINITY,
            min_y: f64::INFINITY,
            max_x: f64::NEG_INFINITY,
            max_y: f64::NEG_INFINITY,
        },
        |b, p| Bounds {
            min_x: b.min_x.min(p.x),
            min_y: b.min_y.min(p.y),
            max_x: b.max_x.max(p.x),
            max_y: b.max_y.max(p.y),
        },
    )
}
