use crate::GridError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_ROW_HEIGHT: f32 = 35.0;
pub const DEFAULT_RENDER_AHEAD: usize = 20;
pub const DEFAULT_COLUMN_WIDTH: f32 = 150.0;
pub const MIN_COLUMN_WIDTH: f32 = 50.0;
pub const MAX_DISPLAY_LEN: usize = 200;

/// Tunables for rendering and editing a grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    /// Height of each data row in pixels.
    pub row_height: f32,

    /// Extra rows rendered above and below the visible band.
    pub render_ahead: usize,

    pub default_column_width: f32,

    /// Floor applied when resizing columns.
    pub min_column_width: f32,

    /// Characters of a cell shown before the display text is truncated.
    pub max_display_len: usize,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            row_height: DEFAULT_ROW_HEIGHT,
            render_ahead: DEFAULT_RENDER_AHEAD,
            default_column_width: DEFAULT_COLUMN_WIDTH,
            min_column_width: MIN_COLUMN_WIDTH,
            max_display_len: MAX_DISPLAY_LEN,
        }
    }
}

impl GridConfig {
    /// Clamp values that would break layout math.
    pub fn normalized(mut self) -> Self {
        if !(self.row_height.is_finite() && self.row_height > 0.0) {
            self.row_height = DEFAULT_ROW_HEIGHT;
        }
        if !(self.min_column_width.is_finite() && self.min_column_width >= 1.0) {
            self.min_column_width = MIN_COLUMN_WIDTH;
        }
        if !self.default_column_width.is_finite() {
            self.default_column_width = DEFAULT_COLUMN_WIDTH;
        }
        self.default_column_width = self.default_column_width.max(self.min_column_width);
        self.max_display_len = self.max_display_len.max(1);
        self
    }

    pub fn from_json(content: &str) -> Result<Self, GridError> {
        let config: GridConfig =
            serde_json::from_str(content).map_err(|e| GridError::Config(e.to_string()))?;
        Ok(config.normalized())
    }
}

/// Loads and saves [`GridConfig`] as JSON.
pub struct GridConfigStore {
    path: PathBuf,
}

impl GridConfigStore {
    /// Store at `<config_dir>/studio/grid.json`.
    pub fn new() -> Result<Self, GridError> {
        let config_dir = dirs::config_dir().ok_or_else(|| {
            GridError::Io(std::io::Error::other("Could not find config directory"))
        })?;

        Ok(Self {
            path: config_dir.join("studio").join("grid.json"),
        })
    }

    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn load(&self) -> Result<GridConfig, GridError> {
        if !self.path.exists() {
            log::debug!(
                "[CONFIG] {} not found, using defaults",
                self.path.display()
            );
            return Ok(GridConfig::default());
        }

        let content = fs::read_to_string(&self.path)?;
        GridConfig::from_json(&content)
    }

    pub fn save(&self, config: &GridConfig) -> Result<(), GridError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content =
            serde_json::to_string_pretty(config).map_err(|e| GridError::Config(e.to_string()))?;
        fs::write(&self.path, content)?;

        log::debug!("[CONFIG] Saved grid config to {}", self.path.display());
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
