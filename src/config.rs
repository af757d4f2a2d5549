use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid JSON config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid JSON5 config: {0}")]
    Json5(#[from] json5::Error),
}

/// Card geometry and spacing, in pixel-equivalent units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutConfig {
    pub card_width: f32,
    pub card_height: f32,
    pub partner_gap: f32,
    pub horizontal_gap: f32,
    pub vertical_gap: f32,
    pub padding: f32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            card_width: 130.0,
            card_height: 70.0,
            partner_gap: 12.0,
            horizontal_gap: 15.0,
            vertical_gap: 60.0,
            padding: 20.0,
        }
    }
}

impl LayoutConfig {
    /// Replaces non-finite or negative values with defaults; card sizes must be positive.
    pub fn sanitized(&self) -> Self {
        let defaults = Self::default();
        let positive = |value: f32, fallback: f32| {
            if value.is_finite() && value > 0.0 {
                value
            } else {
                fallback
            }
        };
        let non_negative = |value: f32, fallback: f32| {
            if value.is_finite() && value >= 0.0 {
                value
            } else {
                fallback
            }
        };
        Self {
            card_width: positive(self.card_width, defaults.card_width),
            card_height: positive(self.card_height, defaults.card_height),
            partner_gap: non_negative(self.partner_gap, defaults.partner_gap),
            horizontal_gap: non_negative(self.horizontal_gap, defaults.horizontal_gap),
            vertical_gap: non_negative(self.vertical_gap, defaults.vertical_gap),
            padding: non_negative(self.padding, defaults.padding),
        }
    }

    pub fn couple_width(&self) -> f32 {
        self.card_width * 2.0 + self.partner_gap
    }

    pub fn row_pitch(&self) -> f32 {
        self.card_height + self.vertical_gap
    }
}

/// How far the subgraph selector walks from the focus person.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SelectionOptions {
    pub ancestor_depth: u32,
    pub descendant_depth: u32,
    pub include_spouse_ancestors: bool,
    pub include_parent_siblings: bool,
    pub include_parent_sibling_descendants: bool,
}

impl Default for SelectionOptions {
    fn default() -> Self {
        Self {
            ancestor_depth: 2,
            descendant_depth: 2,
            include_spouse_ancestors: false,
            include_parent_siblings: false,
            include_parent_sibling_descendants: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SolverPhase {
    /// Intra-family centering.
    A,
    /// Inter-branch spacing.
    B,
}

impl SolverPhase {
    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim() {
            "A" | "a" => Some(Self::A),
            "B" | "b" => Some(Self::B),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SolverConfig {
    pub max_iterations: usize,
    pub tolerance: f32,
    pub stop_after: Option<SolverPhase>,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            max_iterations: 200,
            tolerance: 0.5,
            stop_after: None,
        }
    }
}

/// Invocation parameters for one layout run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutRequest {
    pub focus: String,
    #[serde(default)]
    pub selection: SelectionOptions,
    #[serde(default)]
    pub solver: SolverConfig,
}

impl LayoutRequest {
    pub fn new(focus: impl Into<String>) -> Self {
        Self {
            focus: focus.into(),
            selection: SelectionOptions::default(),
            solver: SolverConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
    pub layout: LayoutConfig,
    pub selection: SelectionOptions,
    pub solver: SolverConfig,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LayoutConfigFile {
    card_width: Option<f32>,
    card_height: Option<f32>,
    partner_gap: Option<f32>,
    horizontal_gap: Option<f32>,
    vertical_gap: Option<f32>,
    padding: Option<f32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SelectionConfigFile {
    ancestor_depth: Option<u32>,
    descendant_depth: Option<u32>,
    include_spouse_ancestors: Option<bool>,
    include_parent_siblings: Option<bool>,
    include_parent_sibling_descendants: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SolverConfigFile {
    max_iterations: Option<usize>,
    tolerance: Option<f32>,
    stop_after: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    layout: Option<LayoutConfigFile>,
    selection: Option<SelectionConfigFile>,
    solver: Option<SolverConfigFile>,
}

pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let mut config = Config::default();
    let Some(path) = path else {
        return Ok(config);
    };

    let contents = std::fs::read_to_string(path)?;
    let is_json5 = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("json5"))
        .unwrap_or(false);
    let parsed = parse_config_file(&contents, is_json5)?;
    apply_config_file(&mut config, parsed);
    Ok(config)
}

fn parse_config_file(contents: &str, is_json5: bool) -> Result<ConfigFile, ConfigError> {
    if is_json5 {
        Ok(json5::from_str(contents)?)
    } else {
        Ok(serde_json::from_str(contents)?)
    }
}

fn apply_config_file(config: &mut Config, parsed: ConfigFile) {
    if let Some(layout) = parsed.layout {
        if let Some(v) = layout.card_width {
            config.layout.card_width = v;
        }
        if let Some(v) = layout.card_height {
            config.layout.card_height = v;
        }
        if let Some(v) = layout.partner_gap {
            config.layout.partner_gap = v;
        }
        if let Some(v) = layout.horizontal_gap {
            config.layout.horizontal_gap = v;
        }
        if let Some(v) = layout.vertical_gap {
            config.layout.vertical_gap = v;
        }
        if let Some(v) = layout.padding {
            config.layout.padding = v;
        }
        config.layout = config.layout.sanitized();
    }

    if let Some(selection) = parsed.selection {
        if let Some(v) = selection.ancestor_depth {
            config.selection.ancestor_depth = v;
        }
        if let Some(v) = selection.descendant_depth {
            config.selection.descendant_depth = v;
        }
        if let Some(v) = selection.include_spouse_ancestors {
            config.selection.include_spouse_ancestors = v;
        }
        if let Some(v) = selection.include_parent_siblings {
            config.selection.include_parent_siblings = v;
        }
        if let Some(v) = selection.include_parent_sibling_descendants {
            config.selection.include_parent_sibling_descendants = v;
        }
    }

    if let Some(solver) = parsed.solver {
        if let Some(v) = solver.max_iterations {
            config.solver.max_iterations = v;
        }
        if let Some(v) = solver.tolerance
            && v.is_finite()
            && v >= 0.0
        {
            config.solver.tolerance = v;
        }
        if let Some(v) = solver.stop_after.as_deref() {
            config.solver.stop_after = SolverPhase::from_token(v);
        }
    }
}
