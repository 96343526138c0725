pub mod config;
pub mod er_ast;
pub mod er_layout;
pub mod er_lexer;
pub mod er_model;
pub mod er_parser;
pub mod er_renderer;
pub mod error;
pub mod svg;
pub mod text_metrics;

pub use config::{Config, Direction, ErConfig};
pub use er_model::Diagram;
pub use er_renderer::{Drawing, ScalingMode};
pub use error::{Error, Position, Result};

/// Parses source text and builds the diagram model.
pub fn parse(input: &str) -> Result<Diagram> {
    let statements = er_parser::parse_er(input)?;
    er_model::build(statements)
}

pub fn compile(input: &str, config: &Config) -> Result<Drawing> {
    compile_with_id(input, config, "er-0")
}

/// `id` scopes generated marker and edge ids so several drawings can share
/// one page.
pub fn compile_with_id(input: &str, config: &Config, id: &str) -> Result<Drawing> {
    let diagram = parse(input)?;
    let layout = er_layout::compute(&diagram, &config.er);
    Ok(er_renderer::render(&layout, &config.er, id))
}

/// Compiles each source on its own. A failure in one source does not
/// affect the others.
pub fn compile_batch<S: AsRef<str>>(inputs: &[S], config: &Config) -> Vec<Result<Drawing>> {
    inputs
        .iter()
        .enumerate()
        .map(|(i, input)| {
            let result = compile_with_id(input.as_ref(), config, &format!("er-{i}"));
            if let Err(e) = &result {
                tracing::warn!(index = i, error = %e, "diagram failed to compile");
            }
            result
        })
        .collect()
}

pub fn render_svg(input: &str, config: &Config) -> Result<String> {
    compile(input, config).map(|drawing| svg::to_svg(&drawing))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_unknown_diagram_type_returns_error() {
        let err = render_svg("classDiagram\n  Foo\n", &Config::default()).unwrap_err();
        assert!(matches!(err, Error::Syntax { .. }), "got: {err:?}");
        let msg = err.to_string();
        assert!(msg.contains("expected `erDiagram`"), "missing header hint: {msg}");
        assert!(msg.contains("found `classDiagram`"), "missing offending word: {msg}");
    }

    #[test]
    fn render_empty_input_returns_error() {
        let err = render_svg("", &Config::default()).unwrap_err();
        assert!(matches!(err, Error::Syntax { .. }), "got: {err:?}");
    }

    #[test]
    fn render_er_diagram_works() {
        let output = render_svg("erDiagram\n    A ||--o{ B : has\n", &Config::default()).unwrap();
        assert!(output.starts_with("<svg"));
        assert!(output.contains(">A</text>"));
    }

    #[test]
    fn batch_isolates_failures() {
        let results = compile_batch(
            &["erDiagram\n  A\n", "erDiagram\n  A }}--|| B\n", "erDiagram\n  B\n"],
            &Config::default(),
        );
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_ref().unwrap().id, "er-0");
        assert!(results[1].is_err());
        assert_eq!(results[2].as_ref().unwrap().id, "er-2");
        assert_eq!(results[2].as_ref().unwrap().entities[0].id, "entity-B-0");
    }
}
