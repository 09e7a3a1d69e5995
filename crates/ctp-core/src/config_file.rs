use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("failed to write config: {0}")]
    Write(String),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// On-disk TOML configuration structure.
/// All fields are optional so partial configs work (merge with defaults).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    pub output: Option<OutputConfig>,
    pub cleaning: Option<CleaningConfig>,
    pub pdf: Option<PdfConfig>,
    pub concurrency: Option<ConcurrencyConfig>,
    pub input: Option<InputConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    pub dir: Option<String>,
    pub overwrite: Option<bool>,
    pub extension: Option<String>,
    pub preserve_tree: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CleaningConfig {
    pub enabled: Option<bool>,
    pub ascii_only: Option<bool>,
    pub join_lines: Option<bool>,
    pub min_line_words: Option<usize>,
    pub fix_hyphenation: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PdfConfig {
    pub backend: Option<String>,
    pub header_ratio: Option<f32>,
    pub footer_ratio: Option<f32>,
    pub min_chars_per_page: Option<usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConcurrencyConfig {
    pub num_workers: Option<usize>,
    pub max_archive_size_mb: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InputConfig {
    pub recursive: Option<bool>,
    pub include_hidden: Option<bool>,
}

/// Platform config directory path: `<config_dir>/ctp/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("ctp").join("config.toml"))
}

/// Load config by cascading CWD `.ctp.toml` over platform config.
/// CWD values override platform values.
pub fn load_config() -> ConfigFile {
    let platform = config_path().and_then(|p| load_from_path(&p));
    let cwd = load_from_path(Path::new(".ctp.toml"));

    match (platform, cwd) {
        (None, None) => ConfigFile::default(),
        (Some(p), None) => p,
        (None, Some(c)) => c,
        (Some(p), Some(c)) => merge(p, c),
    }
}

/// Load a config from a specific path. Returns `None` if the file doesn't
/// exist or can't be parsed.
pub fn load_from_path(path: &Path) -> Option<ConfigFile> {
    match try_load_from_path(path) {
        Ok(config) => Some(config),
        Err(ConfigError::Read { .. }) => None,
        Err(e) => {
            tracing::warn!(error = %e, "ignoring unparsable config file");
            None
        }
    }
}

/// Strict variant of [`load_from_path`] for explicitly requested files.
pub fn try_load_from_path(path: &Path) -> Result<ConfigFile, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Take a field from `overlay` if set, otherwise from `base`.
fn pick<S, T>(overlay: &Option<S>, base: &Option<S>, field: impl Fn(&S) -> Option<T>) -> Option<T> {
    overlay
        .as_ref()
        .and_then(&field)
        .or_else(|| base.as_ref().and_then(&field))
}

/// Merge two configs: `overlay` values take precedence over `base`.
pub fn merge(base: ConfigFile, overlay: ConfigFile) -> ConfigFile {
    ConfigFile {
        output: Some(OutputConfig {
            dir: pick(&overlay.output, &base.output, |o| o.dir.clone()),
            overwrite: pick(&overlay.output, &base.output, |o| o.overwrite),
            extension: pick(&overlay.output, &base.output, |o| o.extension.clone()),
            preserve_tree: pick(&overlay.output, &base.output, |o| o.preserve_tree),
        }),
        cleaning: Some(CleaningConfig {
            enabled: pick(&overlay.cleaning, &base.cleaning, |c| c.enabled),
            ascii_only: pick(&overlay.cleaning, &base.cleaning, |c| c.ascii_only),
            join_lines: pick(&overlay.cleaning, &base.cleaning, |c| c.join_lines),
            min_line_words: pick(&overlay.cleaning, &base.cleaning, |c| c.min_line_words),
            fix_hyphenation: pick(&overlay.cleaning, &base.cleaning, |c| c.fix_hyphenation),
        }),
        pdf: Some(PdfConfig {
            backend: pick(&overlay.pdf, &base.pdf, |p| p.backend.clone()),
            header_ratio: pick(&overlay.pdf, &base.pdf, |p| p.header_ratio),
            footer_ratio: pick(&overlay.pdf, &base.pdf, |p| p.footer_ratio),
            min_chars_per_page: pick(&overlay.pdf, &base.pdf, |p| p.min_chars_per_page),
        }),
        concurrency: Some(ConcurrencyConfig {
            num_workers: pick(&overlay.concurrency, &base.concurrency, |c| c.num_workers),
            max_archive_size_mb: pick(&overlay.concurrency, &base.concurrency, |c| {
                c.max_archive_size_mb
            }),
        }),
        input: Some(InputConfig {
            recursive: pick(&overlay.input, &base.input, |i| i.recursive),
            include_hidden: pick(&overlay.input, &base.input, |i| i.include_hidden),
        }),
    }
}

/// Render a config as TOML. Unset fields are omitted.
pub fn to_toml(config: &ConfigFile) -> Result<String, ConfigError> {
    toml::to_string_pretty(config)
        .map_err(|e| ConfigError::Write(format!("failed to serialize config: {}", e)))
}

/// Save the current config to the platform config directory.
pub fn save_config(config: &ConfigFile) -> Result<PathBuf, ConfigError> {
    let path = config_path()
        .ok_or_else(|| ConfigError::Write("could not determine config directory".into()))?;
    save_to_path(config, &path)?;
    Ok(path)
}

pub fn save_to_path(config: &ConfigFile, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| ConfigError::Write(format!("failed to create config directory: {}", e)))?;
    }
    let content = to_toml(config)?;
    std::fs::write(path, content)
        .map_err(|e| ConfigError::Write(format!("failed to write {}: {}", path.display(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_partial_config() {
        let toml_str = r#"
[output]
overwrite = true

[pdf]
backend = "lopdf"
footer_ratio = 0.05
"#;
        let config: ConfigFile = toml::from_str(toml_str).unwrap();
        assert_eq!(config.output.as_ref().unwrap().overwrite, Some(true));
        assert!(config.output.as_ref().unwrap().extension.is_none());
        assert_eq!(config.pdf.as_ref().unwrap().backend.as_deref(), Some("lopdf"));
        assert!(config.cleaning.is_none());
    }

    #[test]
    fn test_merge_overlay_wins() {
        let base: ConfigFile = toml::from_str(
            r#"
[output]
extension = "txt"
overwrite = false

[concurrency]
num_workers = 2
"#,
        )
        .unwrap();
        let overlay: ConfigFile = toml::from_str(
            r#"
[output]
overwrite = true

[cleaning]
ascii_only = true
"#,
        )
        .unwrap();

        let merged = merge(base, overlay);
        let output = merged.output.unwrap();
        assert_eq!(output.extension.as_deref(), Some("txt"));
        assert_eq!(output.overwrite, Some(true));
        assert_eq!(merged.concurrency.unwrap().num_workers, Some(2));
        assert_eq!(merged.cleaning.unwrap().ascii_only, Some(true));
    }

    #[test]
    fn test_load_missing_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_from_path(&dir.path().join("nope.toml")).is_none());
    }

    #[test]
    fn test_try_load_reports_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[output\noverwrite = ").unwrap();
        assert!(matches!(
            try_load_from_path(&path),
            Err(ConfigError::Parse { .. })
        ));
        assert!(load_from_path(&path).is_none());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let config = ConfigFile {
            input: Some(InputConfig {
                recursive: Some(false),
                include_hidden: None,
            }),
            ..Default::default()
        };
        save_to_path(&config, &path).unwrap();
        let loaded = load_from_path(&path).unwrap();
        assert_eq!(loaded.input.unwrap().recursive, Some(false));
    }

    #[test]
    fn test_to_toml_omits_unset_fields() {
        assert_eq!(to_toml(&ConfigFile::default()).unwrap().trim(), "");

        let config = ConfigFile {
            output: Some(OutputConfig {
                overwrite: Some(true),
                ..Default::default()
            }),
            ..Default::default()
        };
        let text = to_toml(&config).unwrap();
        assert!(text.contains("[output]"));
        assert!(text.contains("overwrite = true"));
        assert!(!text.contains("extension"));
    }
}
