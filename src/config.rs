use serde::{Deserialize, Serialize};
use tracing::level_filters::LevelFilter;

/// Top-level options, shaped like the Mermaid site config: global keys
/// at the root and ER-specific keys under `er`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    pub log_level: u8,
    pub er: ErConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: 3,
            er: ErConfig::default(),
        }
    }
}

impl Config {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn with_max_width(mut self, use_max_width: bool) -> Self {
        self.er.use_max_width = use_max_width;
        self
    }

    /// Diagnostic verbosity. Mermaid numbers levels from 0 (trace) to 5 (fatal).
    pub fn log_filter(&self) -> LevelFilter {
        match self.log_level {
            0 => LevelFilter::TRACE,
            1 => LevelFilter::DEBUG,
            2 => LevelFilter::INFO,
            3 => LevelFilter::WARN,
            _ => LevelFilter::ERROR,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ErConfig {
    pub use_max_width: bool,
    pub diagram_padding: f64,
    pub layout_direction: Direction,
    pub min_entity_width: f64,
    pub min_entity_height: f64,
    pub entity_padding: f64,
    pub node_spacing: f64,
    pub rank_spacing: f64,
    pub font_size: f64,
    pub stroke: String,
    pub fill: String,
}

impl Default for ErConfig {
    fn default() -> Self {
        Self {
            use_max_width: true,
            diagram_padding: 20.0,
            layout_direction: Direction::TopBottom,
            min_entity_width: 100.0,
            min_entity_height: 75.0,
            entity_padding: 15.0,
            node_spacing: 100.0,
            rank_spacing: 100.0,
            font_size: 12.0,
            stroke: "gray".to_string(),
            fill: "honeydew".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Direction {
    #[default]
    #[serde(rename = "TB", alias = "TD")]
    TopBottom,
    #[serde(rename = "BT")]
    BottomTop,
    #[serde(rename = "LR")]
    LeftRight,
    #[serde(rename = "RL")]
    RightLeft,
}

impl Direction {
    pub fn from_keyword(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "TB" | "TD" => Some(Direction::TopBottom),
            "BT" => Some(Direction::BottomTop),
            "LR" => Some(Direction::LeftRight),
            "RL" => Some(Direction::RightLeft),
            _ => None,
        }
    }

    pub fn is_horizontal(self) -> bool {
        matches!(self, Direction::LeftRight | Direction::RightLeft)
    }

    pub fn is_reversed(self) -> bool {
        matches!(self, Direction::BottomTop | Direction::RightLeft)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_uses_max_width() {
        let config = Config::default();
        assert!(config.er.use_max_width);
        assert_eq!(config.er.layout_direction, Direction::TopBottom);
    }

    #[test]
    fn parses_partial_json() {
        let config = Config::from_json(r#"{ "er": { "useMaxWidth": false } }"#).unwrap();
        assert!(!config.er.use_max_width);
        assert_eq!(config.er.min_entity_width, 100.0);
        assert_eq!(config.log_level, 3);
    }

    #[test]
    fn parses_log_level_and_direction() {
        let config =
            Config::from_json(r#"{ "logLevel": 1, "er": { "layoutDirection": "LR" } }"#).unwrap();
        assert_eq!(config.log_filter(), LevelFilter::DEBUG);
        assert_eq!(config.er.layout_direction, Direction::LeftRight);
    }

    #[test]
    fn direction_keywords() {
        assert_eq!(Direction::from_keyword("td"), Some(Direction::TopBottom));
        assert_eq!(Direction::from_keyword("RL"), Some(Direction::RightLeft));
        assert_eq!(Direction::from_keyword("up"), None);
    }
}
