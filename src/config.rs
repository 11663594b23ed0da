//! Configuration for snapping, vertex picking and overlay styling

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Which buffers a snap is attempted against, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SnapMode {
    /// Snap to existing vertices
    #[default]
    Vertex,
    /// Snap to the nearest point of existing edges
    Segment,
    /// Vertices first, then edges
    VertexSegment,
}

impl SnapMode {
    /// Get the next snap mode in the cycle
    pub fn next(self) -> Self {
        match self {
            SnapMode::Vertex => SnapMode::Segment,
            SnapMode::Segment => SnapMode::VertexSegment,
            SnapMode::VertexSegment => SnapMode::Vertex,
        }
    }

    pub fn uses_vertices(self) -> bool {
        matches!(self, SnapMode::Vertex | SnapMode::VertexSegment)
    }

    pub fn uses_segments(self) -> bool {
        matches!(self, SnapMode::Segment | SnapMode::VertexSegment)
    }
}

/// Unit the snap tolerance is expressed in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ToleranceUnit {
    /// Layer map units
    Map,
    /// Display pixels, converted through the viewport pixel size
    #[default]
    Pixel,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SnapConfig {
    #[serde(default)]
    pub mode: SnapMode,
    #[serde(default = "default_snap_tolerance")]
    pub tolerance: f64,
    #[serde(default)]
    pub unit: ToleranceUnit,
}

impl Default for SnapConfig {
    fn default() -> Self {
        Self {
            mode: SnapMode::Vertex,
            tolerance: default_snap_tolerance(),
            unit: ToleranceUnit::Pixel,
        }
    }
}

/// Style strings handed to the renderer for each overlay
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverlayStyle {
    pub deleted: String,
    pub modified: String,
    pub selected: String,
    pub in_progress: String,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            deleted: "stroke:#d01c1c;fill:none;dash:4,4".into(),
            modified: "stroke:#1c6fd0;fill:#1c6fd040".into(),
            selected: "stroke:#f0c000;fill:#f0c00040".into(),
            in_progress: "stroke:#20a040;fill:#20a04040;vertex:#20a040".into(),
        }
    }
}

/// Engine configuration, passed to the task and snap tool at construction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditConfig {
    #[serde(default)]
    pub snap: SnapConfig,
    /// Margin added around a single click when picking vertices
    #[serde(default = "default_search_margin")]
    pub search_margin_px: f64,
    #[serde(default)]
    pub style: OverlayStyle,
}

fn default_snap_tolerance() -> f64 {
    8.0 // pixels
}

fn default_search_margin() -> f64 {
    7.0 // pixels
}

impl Default for EditConfig {
    fn default() -> Self {
        Self {
            snap: SnapConfig::default(),
            search_margin_px: default_search_margin(),
            style: OverlayStyle::default(),
        }
    }
}

impl EditConfig {
    const FILE_NAME: &'static str = "vedit.json";

    /// Per-user configuration file location
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("vedit").join(Self::FILE_NAME))
    }

    /// Load configuration from `path`, or return defaults if unavailable
    pub fn load(path: &Path) -> Self {
        match Self::try_load(path) {
            Ok(config) => config,
            Err(err) => {
                log::warn!("Error loading config, using defaults: {:?}", err);
                Self::default()
            }
        }
    }

    fn try_load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config = serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Save configuration to `path`, creating parent directories
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config dir: {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }
}
