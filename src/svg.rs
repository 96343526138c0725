use std::fmt::Write;

use crate::er_layout::ColumnKind;
use crate::er_renderer::*;

/// SVG markup for a drawing. The output always has a single `<svg>` root.
pub fn to_svg(drawing: &Drawing) -> String {
    let mut out = String::new();
    let canvas = &drawing.canvas;
    let style = &drawing.style;

    let _ = write!(
        out,
        r#"<svg id="{}" xmlns="http://www.w3.org/2000/svg" width="{}" height="{}""#,
        escape_xml(&drawing.id),
        canvas.width,
        canvas.height
    );
    if let Some(s) = &canvas.style {
        let _ = write!(out, r#" style="{}""#, escape_xml(s));
    }
    let _ = writeln!(out, r#" viewBox="{}" role="graphics-document document" aria-roledescription="er">"#, canvas.view_box);

    write_markers(&mut out, drawing);

    out.push_str("<g class=\"relationships\">\n");
    for rel in &drawing.relationships {
        let _ = write!(
            out,
            r#"<path id="{}" class="relationshipLine" d="{}" fill="none" stroke="{}""#,
            escape_xml(&rel.id),
            rel.path,
            escape_xml(&style.stroke)
        );
        if rel.dashed {
            out.push_str(r#" stroke-dasharray="8,8""#);
        }
        let _ = writeln!(
            out,
            r#" marker-start="url(#{})" marker-end="url(#{})"/>"#,
            escape_xml(&rel.start_marker.id),
            escape_xml(&rel.end_marker.id)
        );
    }
    out.push_str("</g>\n");

    out.push_str("<g class=\"entities\">\n");
    for entity in &drawing.entities {
        write_entity(&mut out, entity, style);
    }
    out.push_str("</g>\n");

    out.push_str("<g class=\"relationshipLabels\">\n");
    for rel in &drawing.relationships {
        if let Some(b) = &rel.label_box {
            let _ = writeln!(
                out,
                r#"<rect class="relationshipLabelBox" x="{}" y="{}" width="{}" height="{}" fill="white" fill-opacity="0.85"/>"#,
                fmt_num(b.x),
                fmt_num(b.y),
                fmt_num(b.width),
                fmt_num(b.height)
            );
        }
        let _ = writeln!(
            out,
            r#"<text class="relationshipLabel" x="{}" y="{}" text-anchor="middle" dominant-baseline="middle" font-size="{}" xml:space="preserve">{}</text>"#,
            fmt_num(rel.label_position.x),
            fmt_num(rel.label_position.y),
            fmt_num(style.font_size),
            escape_xml(&rel.label)
        );
    }
    out.push_str("</g>\n");

    out.push_str("</svg>\n");
    out
}

fn write_markers(out: &mut String, drawing: &Drawing) {
    if drawing.markers.is_empty() {
        return;
    }
    out.push_str("<defs>\n");
    for marker in &drawing.markers {
        let _ = writeln!(
            out,
            r#"<marker id="{}" refX="{}" refY="{}" markerWidth="{}" markerHeight="{}" orient="auto">"#,
            escape_xml(&marker.id),
            fmt_num(marker.ref_x),
            fmt_num(marker.ref_y),
            fmt_num(marker.width),
            fmt_num(marker.height)
        );
        for shape in &marker.shapes {
            match shape {
                MarkerShape::Path { d } => {
                    let _ = writeln!(
                        out,
                        r#"<path d="{}" fill="none" stroke="{}"/>"#,
                        d,
                        escape_xml(&drawing.style.stroke)
                    );
                }
                MarkerShape::Circle { cx, cy, r } => {
                    let _ = writeln!(
                        out,
                        r#"<circle cx="{}" cy="{}" r="{}" fill="white" stroke="{}"/>"#,
                        fmt_num(*cx),
                        fmt_num(*cy),
                        fmt_num(*r),
                        escape_xml(&drawing.style.stroke)
                    );
                }
            }
        }
        out.push_str("</marker>\n");
    }
    out.push_str("</defs>\n");
}

fn write_entity(out: &mut String, entity: &EntityBox, style: &DrawingStyle) {
    let _ = writeln!(out, r#"<g id="{}" class="entity">"#, escape_xml(&entity.id));
    let _ = writeln!(
        out,
        r#"<rect class="entityBox" x="{}" y="{}" width="{}" height="{}" fill="{}" stroke="{}"/>"#,
        fmt_num(entity.rect.x),
        fmt_num(entity.rect.y),
        fmt_num(entity.rect.width),
        fmt_num(entity.rect.height),
        escape_xml(&style.fill),
        escape_xml(&style.stroke)
    );
    for line in &entity.dividers {
        let _ = writeln!(
            out,
            r#"<line x1="{}" y1="{}" x2="{}" y2="{}" stroke="{}"/>"#,
            fmt_num(line.x1),
            fmt_num(line.y1),
            fmt_num(line.x2),
            fmt_num(line.y2),
            escape_xml(&style.stroke)
        );
    }
    let _ = writeln!(
        out,
        r#"<text class="entityLabel" x="{}" y="{}" text-anchor="middle" dominant-baseline="middle" font-size="{}">{}</text>"#,
        fmt_num(entity.label_position.x),
        fmt_num(entity.label_position.y),
        fmt_num(style.font_size),
        escape_xml(&entity.label)
    );
    for row in &entity.rows {
        for cell in &row.cells {
            let _ = writeln!(
                out,
                r#"<text class="er attribute-{}" x="{}" y="{}" dominant-baseline="middle" font-size="{}">{}</text>"#,
                column_class(cell.column),
                fmt_num(cell.x),
                fmt_num(cell.y),
                fmt_num(style.attribute_font_size),
                escape_xml(&cell.text)
            );
        }
    }
    out.push_str("</g>\n");
}

fn column_class(kind: ColumnKind) -> &'static str {
    match kind {
        ColumnKind::Type => "type",
        ColumnKind::Name => "name",
        ColumnKind::Keys => "keys",
        ColumnKind::Comment => "comment",
    }
}

fn escape_xml(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
