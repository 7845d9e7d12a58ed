//! Project module - credence project configuration
//!
//! Manages `.credence/config.toml`: retrieval models and index location,
//! PRF, the knowledge-graph endpoint and context constants, fusion weights
//! and label thresholds, and benchmark settings.
//!
//! # Example
//!
//! ```no_run
//! use credence::project;
//! use std::path::Path;
//!
//! let path = Path::new(".");
//! let mut config = project::load(path)?;
//! println!("Model: {}", config.retrieval.model);
//!
//! config.prf.enabled = false;
//! project::save(path, &config)?;
//! # Ok::<(), anyhow::Error>(())
//! ```

mod internal;

use anyhow::Result;
use std::path::{Path, PathBuf};

pub use internal::{
    BenchSection, FusionSection, GraphSection, PrfSection, ProjectConfig, RetrievalSection,
};

/// Load project config from `.credence/config.toml`
///
/// Returns default config if file doesn't exist.
pub fn load(project_path: &Path) -> Result<ProjectConfig> {
    internal::load(project_path)
}

/// Save project config to `.credence/config.toml`
///
/// Creates `.credence/` directory if it doesn't exist.
pub fn save(project_path: &Path, config: &ProjectConfig) -> Result<()> {
    internal::save(project_path, config)
}

/// Get the .credence directory path for a project
pub fn credence_dir(project_path: &Path) -> PathBuf {
    internal::credence_dir(project_path)
}

/// Get the config file path for a project
pub fn config_path(project_path: &Path) -> PathBuf {
    internal::config_path(project_path)
}

/// FTS5 index location (`retrieval.index_path` or `.credence/index.db`)
pub fn index_path(project_path: &Path, config: &ProjectConfig) -> PathBuf {
    internal::index_path(project_path, config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credence_dir() {
        let path = credence_dir(Path::new("/some/project"));
        assert!(path.ends_with(".credence"));
    }

    #[test]
    fn test_default_index_path() {
        let path = index_path(Path::new("/p"), &ProjectConfig::default());
        assert_eq!(path, Path::new("/p/.credence/index.db"));
    }
}
