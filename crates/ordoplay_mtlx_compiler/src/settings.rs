// SPDX-License-Identifier: MIT OR Apache-2.0
//! Compiler settings.
//!
//! Settings are stored as RON and carry a format version. Files written by a
//! newer version are rejected rather than silently misread.

use crate::compound::MAX_UNROLL_ITERATIONS;
use crate::resolver::MAX_REDIRECT_DEPTH;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Current settings format version
pub const SETTINGS_FORMAT_VERSION: u32 = 1;

/// Lighting model of the material
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShadingMode {
    /// Physically based
    #[default]
    Lit,
    /// Color only; base color drives emission
    Unlit,
}

/// Whether the surface lets light through
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SurfaceType {
    /// Fully opaque
    #[default]
    Opaque,
    /// Blended with what is behind it
    Transparent,
}

/// Blend equation for transparent surfaces
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlendMode {
    /// Standard alpha blending
    #[default]
    Alpha,
    /// Color already multiplied by alpha
    Premultiply,
    /// Added on top of the background
    Additive,
    /// Multiplied with the background
    Multiply,
}

/// Settings that shape how a graph is compiled
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerSettings {
    /// Settings format version
    pub version: u32,
    /// Lit or unlit shading
    pub shading: ShadingMode,
    /// Opaque or transparent surface
    pub surface: SurfaceType,
    /// Blend equation when transparent
    pub blend: BlendMode,
    /// Discard fragments below the alpha clip threshold
    pub alpha_clip: bool,
    /// Preview output: no displacement root
    pub preview: bool,
    /// Directories searched for snippet resources
    pub snippet_paths: Vec<PathBuf>,
    /// Iteration budget for the loops of one snippet
    pub max_unroll_iterations: usize,
    /// Bound on pass-through chains between nodes
    pub max_redirect_depth: usize,
}

impl Default for CompilerSettings {
    fn default() -> Self {
        Self {
            version: SETTINGS_FORMAT_VERSION,
            shading: ShadingMode::Lit,
            surface: SurfaceType::Opaque,
            blend: BlendMode::Alpha,
            alpha_clip: false,
            preview: false,
            snippet_paths: Vec::new(),
            max_unroll_iterations: MAX_UNROLL_ITERATIONS,
            max_redirect_depth: MAX_REDIRECT_DEPTH,
        }
    }
}

impl CompilerSettings {
    /// Whether the material is unlit
    pub fn is_unlit(&self) -> bool {
        self.shading == ShadingMode::Unlit
    }

    /// Whether the surface is blended
    pub fn is_transparent(&self) -> bool {
        self.surface == SurfaceType::Transparent
    }

    /// Load settings from a RON file
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let content = std::fs::read_to_string(path)?;
        let settings: CompilerSettings = ron::from_str(&content)?;

        if settings.version > SETTINGS_FORMAT_VERSION {
            return Err(SettingsError::UnsupportedVersion {
                found: settings.version,
                supported: SETTINGS_FORMAT_VERSION,
            });
        }

        tracing::info!("Loaded compiler settings from {:?}", path);
        Ok(settings)
    }

    /// Save settings to a RON file
    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        let config = ron::ser::PrettyConfig::default()
            .depth_limit(4)
            .separate_tuple_members(true);
        let content = ron::ser::to_string_pretty(self, config)?;
        std::fs::write(path, content)?;
        tracing::info!("Saved compiler settings to {:?}", path);
        Ok(())
    }
}

/// Error reading or writing a settings file
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    /// Filesystem failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed RON
    #[error("Invalid settings file: {0}")]
    Parse(#[from] ron::error::SpannedError),

    /// Serialization failure
    #[error("Could not serialize settings: {0}")]
    Serialize(#[from] ron::Error),

    /// Written by a newer format version
    #[error("Settings version {found} is newer than supported version {supported}")]
    UnsupportedVersion {
        /// Version in the file
        found: u32,
        /// Newest version this build reads
        supported: u32,
    },
}
