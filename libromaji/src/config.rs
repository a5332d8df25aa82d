//! Romaji-specific configuration that extends the base `Config` from core.
//!
//! This configuration includes:
//! - All generic options from `libtyping_core::Config` (flattened via serde)
//! - Which shortcut spellings the kana converter offers for っ and ん
//!
//! # Example
//!
//! ```rust
//! use libromaji::RomajiConfig;
//!
//! let config = RomajiConfig::default();
//! assert!(config.final_nasal_short_form);
//! let base_config = config.into_base();
//! assert!(!base_config.offload_enabled);
//! ```

use serde::{Deserialize, Serialize};

use libtyping_core::Result;

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RomajiConfig {
    /// Base configuration fields (offload, time limit, rank table, etc.)
    #[serde(flatten)]
    pub base: libtyping_core::Config,

    /// Accept a single "n" for ん at the very end of a phrase
    pub final_nasal_short_form: bool,

    /// Accept a doubled consonant for っ (った = "tta")
    pub geminate_single_consonant: bool,
}

impl Default for RomajiConfig {
    fn default() -> Self {
        Self {
            base: libtyping_core::Config::default(),
            final_nasal_short_form: true,
            geminate_single_consonant: true,
        }
    }
}

impl RomajiConfig {
    /// Convert this romaji config into the base config for `TypingEngine::new()`
    pub fn into_base(self) -> libtyping_core::Config {
        self.base
    }

    /// Get a reference to the base config
    pub fn base(&self) -> &libtyping_core::Config {
        &self.base
    }

    /// Get a mutable reference to the base config
    pub fn base_mut(&mut self) -> &mut libtyping_core::Config {
        &mut self.base
    }

    /// Load configuration from a TOML file. Missing keys take defaults.
    pub fn load_toml<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(Self::from_toml_str(&content)?)
    }

    /// Load configuration from TOML string.
    pub fn from_toml_str(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }
}
