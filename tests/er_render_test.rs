use erdraw::er_renderer::{Drawing, Rect};
use erdraw::{Config, Error, ScalingMode};
use pretty_assertions::assert_eq;

const SIMPLE: &str = "
    erDiagram
        CUSTOMER ||--o{ ORDER : places
        ORDER ||--|{ LINE-ITEM : contains
      ";

fn compile(input: &str) -> Drawing {
    erdraw::compile(input, &Config::default()).unwrap()
}

fn entity_names(drawing: &Drawing) -> Vec<&str> {
    drawing.entities.iter().map(|e| e.name.as_str()).collect()
}

fn overlaps(a: &Rect, b: &Rect) -> bool {
    a.x < b.x + b.width && b.x < a.x + a.width && a.y < b.y + b.height && b.y < a.y + a.height
}

fn assert_no_overlap(drawing: &Drawing) {
    for (i, a) in drawing.entities.iter().enumerate() {
        for b in &drawing.entities[i + 1..] {
            assert!(!overlaps(&a.rect, &b.rect), "{} overlaps {}", a.name, b.name);
        }
    }
}

fn assert_inside_canvas(drawing: &Drawing) {
    let (w, h) = (drawing.canvas.natural_width, drawing.canvas.natural_height);
    for e in &drawing.entities {
        assert!(e.rect.x >= 0.0 && e.rect.y >= 0.0, "{} starts inside", e.name);
        assert!(e.rect.x + e.rect.width <= w && e.rect.y + e.rect.height <= h, "{} ends inside", e.name);
    }
}

// =============================================================================
// Rendering fixtures
// =============================================================================

#[test]
fn er_simple() {
    let d = compile(SIMPLE);
    assert_eq!(entity_names(&d), vec!["CUSTOMER", "ORDER", "LINE-ITEM"]);
    assert_eq!(d.relationships.len(), 2);
    assert_eq!(d.relationships[0].label, "places");
    assert_eq!(d.relationships[1].label, "contains");
    assert_no_overlap(&d);
    assert_inside_canvas(&d);
}

#[test]
fn er_recursive_relationship() {
    let d = compile(
        "
    erDiagram
        CUSTOMER ||..o{ CUSTOMER : refers
        CUSTOMER ||--o{ ORDER : places
        ORDER ||--|{ LINE-ITEM : contains
      ",
    );
    assert_eq!(entity_names(&d), vec!["CUSTOMER", "ORDER", "LINE-ITEM"]);
    let refers = &d.relationships[0];
    assert_eq!(refers.from, refers.to);
    assert!(refers.dashed);
    assert_ne!(refers.start_marker.point, refers.end_marker.point);
    assert!(refers.path.contains('C'), "self-loop is a curve: {}", refers.path);
    assert_no_overlap(&d);
    assert_inside_canvas(&d);
}

#[test]
fn er_multiple_relationships_same_pair() {
    let d = compile(
        "
    erDiagram
        CUSTOMER ||--|{ ADDRESS : \"invoiced at\"
        CUSTOMER ||--|{ ADDRESS : \"receives goods at\"
      ",
    );
    assert_eq!(entity_names(&d), vec!["CUSTOMER", "ADDRESS"]);
    let (a, b) = (&d.relationships[0], &d.relationships[1]);
    assert_eq!(a.label, "invoiced at");
    assert_eq!(b.label, "receives goods at");
    assert_ne!(a.path, b.path);
    assert_ne!(a.label_position, b.label_position);
    assert_eq!(a.end_marker.id, "er-0_ONE_OR_MORE_END");
    assert_eq!(b.end_marker.id, "er-0_ONE_OR_MORE_END");
}

#[test]
fn er_cyclical() {
    let d = compile(
        "
    erDiagram
        A ||--|{ B : likes
        B ||--|{ C : likes
        C ||--|{ A : likes
      ",
    );
    assert_eq!(entity_names(&d), vec!["A", "B", "C"]);
    assert_eq!(d.relationships.len(), 3);
    assert_no_overlap(&d);
    assert_inside_canvas(&d);
}

#[test]
fn er_not_so_simple() {
    let d = compile(
        "
    erDiagram
        CUSTOMER }|..|{ DELIVERY-ADDRESS : has
        CUSTOMER ||--o{ ORDER : places
        CUSTOMER ||--o{ INVOICE : \"liable for\"
        DELIVERY-ADDRESS ||--o{ ORDER : receives
        INVOICE ||--|{ ORDER : covers
        ORDER ||--|{ ORDER-ITEM : includes
        PRODUCT-CATEGORY ||--|{ PRODUCT : contains
        PRODUCT ||--o{ ORDER-ITEM : \"ordered in\"
      ",
    );
    assert_eq!(
        entity_names(&d),
        vec![
            "CUSTOMER",
            "DELIVERY-ADDRESS",
            "ORDER",
            "INVOICE",
            "ORDER-ITEM",
            "PRODUCT-CATEGORY",
            "PRODUCT"
        ]
    );
    assert_eq!(d.relationships.len(), 8);
    assert_no_overlap(&d);
    assert_inside_canvas(&d);
}

#[test]
fn er_multiple_diagrams() {
    let results = erdraw::compile_batch(&[SIMPLE, SIMPLE], &Config::default());
    let drawings: Vec<Drawing> = results.into_iter().map(Result::unwrap).collect();
    assert_eq!(drawings[0].id, "er-0");
    assert_eq!(drawings[1].id, "er-1");
    assert_eq!(drawings[0].entities, drawings[1].entities);
    assert_eq!(drawings[0].canvas, drawings[1].canvas);
    assert_eq!(drawings[1].markers[0].id, "er-1_EXACTLY_ONE_START");
}

#[test]
fn er_blank_and_empty_labels() {
    let d = compile(
        "
    erDiagram
        BOOK }|..|{ AUTHOR : \"\"
        BOOK }|..|{ GENRE : \" \"
        AUTHOR }|..|{ GENRE : \"  \"
      ",
    );
    let labels: Vec<&str> = d.relationships.iter().map(|r| r.label.as_str()).collect();
    assert_eq!(labels, vec!["", " ", "  "]);
    assert!(d.relationships.iter().all(|r| r.label_box.is_none()));
}

#[test]
fn er_use_max_width_true() {
    let d = erdraw::compile(SIMPLE, &Config::default().with_max_width(true)).unwrap();
    assert_eq!(d.canvas.scaling, ScalingMode::Proportional);
    assert_eq!(d.canvas.width, "100%");
    assert_eq!(d.canvas.height, "100%");
    let style = d.canvas.style.as_deref().unwrap();
    let value: f64 = style
        .strip_prefix("max-width: ")
        .and_then(|s| s.strip_suffix("px;"))
        .unwrap()
        .parse()
        .unwrap();
    assert!((140.0 * 0.95..=140.0 * 1.05).contains(&value), "max-width {value}");
}

#[test]
fn er_use_max_width_false() {
    let config = Config::from_json(r#"{ "er": { "useMaxWidth": false } }"#).unwrap();
    let d = erdraw::compile(SIMPLE, &config).unwrap();
    assert_eq!(d.canvas.scaling, ScalingMode::Fixed);
    let width: f64 = d.canvas.width.parse().unwrap();
    assert!((140.0 * 0.95..=140.0 * 1.05).contains(&width), "width {width}");
    assert_eq!(d.canvas.height, "465");
    assert_eq!(d.canvas.style, None);

    let svg = erdraw::render_svg(SIMPLE, &config).unwrap();
    assert!(!svg.contains("style="));
    assert!(svg.contains(r#"height="465""#));
}

#[test]
fn er_entities_without_relationships() {
    let d = compile(
        "
    erDiagram
        DEAD_PARROT
        HERMIT
        RECLUSE
        SOCIALITE }o--o{ SOCIALITE : \"interacts with\"
        RECLUSE }o--o{ SOCIALITE : avoids
      ",
    );
    assert_eq!(entity_names(&d), vec!["DEAD_PARROT", "HERMIT", "RECLUSE", "SOCIALITE"]);
    assert_no_overlap(&d);
    assert_inside_canvas(&d);
}

#[test]
fn er_entities_with_and_without_attributes() {
    let d = compile(
        "
    erDiagram
        BOOK { string title }
        AUTHOR }|..|{ BOOK : writes
        BOOK { float price }
      ",
    );
    assert_eq!(entity_names(&d), vec!["BOOK", "AUTHOR"]);
    let book = &d.entities[0];
    let rows: Vec<(&str, &str)> = book
        .rows
        .iter()
        .map(|r| (r.attribute.attr_type.as_str(), r.attribute.name.as_str()))
        .collect();
    assert_eq!(rows, vec![("string", "title"), ("float", "price")]);
    assert!(d.entities[1].rows.is_empty());
}

#[test]
fn er_big_and_small_entity_names() {
    let d = compile(
        "
    erDiagram
        PRIVATE_FINANCIAL_INSTITUTION {
          string name
          int    turnover
        }
        PRIVATE_FINANCIAL_INSTITUTION ||..|{ EMPLOYEE : employs
        EMPLOYEE { bool officer_of_firm }
      ",
    );
    let (big, small) = (&d.entities[0], &d.entities[1]);
    assert_eq!(big.rows.len(), 2);
    assert_eq!(small.rows.len(), 1);
    assert!(big.rect.width > small.rect.width);
    assert_no_overlap(&d);
}

#[test]
fn er_keys_and_comments() {
    let d = compile("\n    erDiagram\n        BOOK { string title PK \"comment\"}\n      ");
    let json = serde_json::to_value(&d.entities[0].rows[0]).unwrap();
    assert_eq!(json["type"], "string");
    assert_eq!(json["name"], "title");
    assert_eq!(json["keys"], serde_json::json!(["PK"]));
    assert_eq!(json["comment"], "comment");
}

// =============================================================================
// Grammar and model
// =============================================================================

#[test]
fn er_all_cardinality_symbols() {
    let d = compile("erDiagram\n  A |o--o| B : x\n  C }o..o{ D : y\n  E }|--|{ F : z\n  G ||--|| H : w\n");
    let cards: Vec<(&str, &str)> = d
        .relationships
        .iter()
        .map(|r| (r.start_marker.id.as_str(), r.end_marker.id.as_str()))
        .collect();
    assert_eq!(
        cards,
        vec![
            ("er-0_ZERO_OR_ONE_START", "er-0_ZERO_OR_ONE_END"),
            ("er-0_ZERO_OR_MORE_START", "er-0_ZERO_OR_MORE_END"),
            ("er-0_ONE_OR_MORE_START", "er-0_ONE_OR_MORE_END"),
            ("er-0_EXACTLY_ONE_START", "er-0_EXACTLY_ONE_END"),
        ]
    );
    assert_eq!(d.markers.len(), 8);
    assert!(d.relationships[1].dashed);
    assert!(!d.relationships[0].dashed);
}

#[test]
fn er_entity_merge_across_statements() {
    let diagram = erdraw::parse(
        "erDiagram\n  A ||--|| B : one\n  A { int id PK }\n  B ||--o{ A : two\n  A\n  A { string name }\n",
    )
    .unwrap();
    let names: Vec<&str> = diagram.entities.keys().map(String::as_str).collect();
    assert_eq!(names, vec!["A", "B"]);
    assert_eq!(diagram.entities["A"].attributes.len(), 2);
    assert_eq!(diagram.relationships.len(), 2);
}

#[test]
fn er_label_is_optional() {
    let d = compile("erDiagram\n  A ||--o{ B\n");
    assert_eq!(d.relationships[0].label, "");
}

#[test]
fn er_unquoted_label_with_spaces() {
    let d = compile("erDiagram\n    CUSTOMER }o--|| ADDRESS : billing address\n");
    assert_eq!(d.relationships[0].label, "billing address");
}

#[test]
fn er_alias_and_direction() {
    let d = compile("erDiagram\n  direction LR\n  p[\"Person\"]\n  p ||--o{ car : drives\n");
    assert_eq!(d.entities[0].label, "Person");
    assert_eq!(d.entities[0].id, "entity-p-0");
    let (p, car) = (&d.entities[0].rect, &d.entities[1].rect);
    assert!(p.x + p.width < car.x, "left to right");
}

#[test]
fn er_comments_ignored() {
    let d = compile("erDiagram\n  %% the customer\n  CUSTOMER ||--o{ ORDER : places %% trailing\n");
    assert_eq!(entity_names(&d), vec!["CUSTOMER", "ORDER"]);
}

#[test]
fn er_empty_diagram_is_valid() {
    let d = compile("erDiagram\n");
    assert!(d.entities.is_empty());
    assert_eq!(d.canvas.natural_width, 40.0);
}

// =============================================================================
// Errors
// =============================================================================

#[test]
fn er_wrong_facing_glyph_is_unresolved() {
    let err = erdraw::compile("erDiagram\n  A o{--|| B : x\n", &Config::default()).unwrap_err();
    match err {
        Error::UnresolvedGlyph { glyph, position, .. } => {
            assert_eq!(glyph, "o{");
            assert_eq!((position.line, position.column), (2, 5));
        }
        other => panic!("expected unresolved glyph, got {other:?}"),
    }
}

#[test]
fn er_malformed_operator_is_syntax_error() {
    let err = erdraw::compile("erDiagram\n  A |-o{ B : x\n", &Config::default()).unwrap_err();
    assert!(matches!(err, Error::Syntax { .. }), "got {err:?}");
    assert!(err.to_string().contains("line 2"), "got {err}");
}

#[test]
fn er_missing_header() {
    let err = erdraw::compile("  A ||--o{ B : x\n", &Config::default()).unwrap_err();
    assert!(err.to_string().contains("unknown diagram type"), "got {err}");
}

#[test]
fn er_unterminated_block() {
    let err = erdraw::compile("erDiagram\n  A {\n    string name\n", &Config::default()).unwrap_err();
    assert!(matches!(err, Error::Syntax { .. }), "got {err:?}");
}
