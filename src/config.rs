//! Scene configuration.
//!
//! [`SceneConfig`] can be built fluently in code or read from a TOML file:
//!
//! ```toml
//! title = "freeCodeCamp"
//! width = 1280
//! height = 720
//! seed = 7
//!
//! [assets]
//! bundle = "assets/freecode_objects2.glb"
//! environment = "assets/environment.png"
//! sprite = "assets/flare.png"
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::SceneError;

/// Locations of the three opaque assets the scene needs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetPaths {
    /// glTF binary containing the nine named meshes.
    pub bundle: PathBuf,
    /// Equirectangular environment image used as the reflection source.
    pub environment: PathBuf,
    /// Particle sprite image.
    pub sprite: PathBuf,
}

impl Default for AssetPaths {
    fn default() -> Self {
        Self::in_dir("assets")
    }
}

impl AssetPaths {
    /// Default file names resolved against `dir`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            bundle: dir.join("freecode_objects2.glb"),
            environment: dir.join("environment.png"),
            sprite: dir.join("flare.png"),
        }
    }
}

/// Configuration for the host window and the scene.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub assets: AssetPaths,
    /// Fixed RNG seed. `None` seeds from entropy.
    pub seed: Option<u64>,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            title: "letterfall".to_string(),
            width: 1280,
            height: 720,
            assets: AssetPaths::default(),
            seed: None,
        }
    }
}

impl SceneConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Look for the default asset file names in `dir`.
    pub fn assets_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.assets = AssetPaths::in_dir(dir);
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Parse a configuration from TOML text. Missing keys take defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, SceneError> {
        Ok(toml::from_str(text)?)
    }

    /// Read a configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SceneError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }
}
