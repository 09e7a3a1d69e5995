use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use ctp_core::{Config, Format};

use crate::archive::{archive_stem, extract_archive, is_archive_path};

#[derive(Debug, Clone)]
pub struct DiscoverOptions {
    /// Descend into subdirectories of directory arguments.
    pub recursive: bool,
    /// Keep dot-files and dot-directories.
    pub include_hidden: bool,
    /// Unpack `.zip`, `.tar.gz` and `.tgz` inputs.
    pub expand_archives: bool,
    /// Total extracted bytes allowed per archive (0 = unlimited).
    pub max_archive_size: u64,
    /// Where archives are unpacked. A temporary directory, removed when the
    /// [`Discovery`] is dropped, if unset.
    pub scratch_dir: Option<PathBuf>,
    /// Directories never descended into while walking, such as the output
    /// directory of the run.
    pub exclude: Vec<PathBuf>,
}

impl Default for DiscoverOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl DiscoverOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            recursive: config.recursive,
            include_hidden: config.include_hidden,
            expand_archives: true,
            max_archive_size: config.max_archive_size_mb.saturating_mul(1024 * 1024),
            scratch_dir: None,
            exclude: Vec::new(),
        }
    }

    /// Skip `dir` and everything below it while walking.
    pub fn excluding(mut self, dir: impl Into<PathBuf>) -> Self {
        self.exclude.push(dir.into());
        self
    }
}

/// One document to convert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputFile {
    /// Where the bytes are read from.
    pub path: PathBuf,
    /// The directory argument this file was found under (or the directory
    /// an archive was unpacked into).
    pub root: PathBuf,
    /// Path used to lay out the output tree.
    pub relative: PathBuf,
    /// What to show the user: the path as given, or `archive/entry` for
    /// archive members.
    pub source: PathBuf,
}

impl InputFile {
    /// A file named directly on the command line.
    pub fn standalone(path: &Path) -> Self {
        let root = path.parent().map(Path::to_path_buf).unwrap_or_default();
        let relative = path
            .file_name()
            .map(PathBuf::from)
            .unwrap_or_else(|| path.to_path_buf());
        Self {
            path: path.to_path_buf(),
            root,
            relative,
            source: path.to_path_buf(),
        }
    }

    pub fn format(&self) -> Option<Format> {
        Format::from_path(&self.path)
    }
}

/// The inputs found for a run.
///
/// Archive members live in a scratch directory owned by this value, so it
/// must outlive the conversion.
#[derive(Debug, Default)]
pub struct Discovery {
    pub files: Vec<InputFile>,
    pub warnings: Vec<String>,
    scratch: Option<TempDir>,
}

impl Discovery {
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// The scratch directory archives were unpacked into, if one was created.
    pub fn scratch_path(&self) -> Option<&Path> {
        self.scratch.as_ref().map(TempDir::path)
    }
}

/// Resolve command-line paths into the list of documents to convert.
///
/// Files are taken as given. Directories are walked (recursively unless
/// disabled), keeping only files with a known document extension. Archives
/// are unpacked and their members listed as `<archive stem>/<entry>`.
/// The result is sorted by source path with duplicates removed.
pub fn discover_inputs(paths: &[PathBuf], options: &DiscoverOptions) -> Discovery {
    let mut discovery = Discovery::default();
    // Only directories that already exist can hold stale outputs
    let excluded: Vec<PathBuf> = options
        .exclude
        .iter()
        .filter_map(|dir| fs::canonicalize(dir).ok())
        .collect();
    // (archive path, relative directory it was found in)
    let mut archives: Vec<(PathBuf, PathBuf)> = Vec::new();

    for path in paths {
        match fs::metadata(path) {
            Err(e) => discovery
                .warnings
                .push(format!("{}: {}", path.display(), e)),
            Ok(meta) if meta.is_dir() => {
                walk(path, path, options, &excluded, &mut discovery, &mut archives);
            }
            Ok(_) => {
                if options.expand_archives && is_archive_path(path) {
                    archives.push((path.clone(), PathBuf::new()));
                } else {
                    discovery.files.push(InputFile::standalone(path));
                }
            }
        }
    }

    archives.sort();
    archives.dedup();
    for (index, (archive, prefix)) in archives.iter().enumerate() {
        expand(archive, prefix, index, options, &mut discovery);
    }

    discovery.files.sort_by(|a, b| a.source.cmp(&b.source));
    discovery.files.dedup_by(|a, b| a.source == b.source);

    tracing::debug!(
        files = discovery.files.len(),
        warnings = discovery.warnings.len(),
        "discovered inputs"
    );
    discovery
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .is_some_and(|n| n.to_string_lossy().starts_with('.'))
}

fn walk(
    root: &Path,
    dir: &Path,
    options: &DiscoverOptions,
    excluded: &[PathBuf],
    discovery: &mut Discovery,
    archives: &mut Vec<(PathBuf, PathBuf)>,
) {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            discovery
                .warnings
                .push(format!("cannot read directory {}: {}", dir.display(), e));
            return;
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if !options.include_hidden && is_hidden(&path) {
            continue;
        }
        let Ok(file_type) = entry.file_type() else {
            continue;
        };
        // Follow symlinks to files, but not to directories (cycles)
        let is_dir = if file_type.is_symlink() {
            if fs::metadata(&path).is_ok_and(|m| m.is_dir()) {
                continue;
            }
            false
        } else {
            file_type.is_dir()
        };

        if is_dir {
            let pruned = !excluded.is_empty()
                && fs::canonicalize(&path).is_ok_and(|p| excluded.contains(&p));
            if pruned {
                tracing::debug!(dir = %path.display(), "skipping excluded directory");
            } else if options.recursive {
                walk(root, &path, options, excluded, discovery, archives);
            }
            continue;
        }

        let relative = path.strip_prefix(root).unwrap_or(&path).to_path_buf();
        if options.expand_archives && is_archive_path(&path) {
            let parent = relative.parent().map(Path::to_path_buf).unwrap_or_default();
            archives.push((path, parent));
        } else if Format::from_path(&path).is_some() {
            discovery.files.push(InputFile {
                source: path.clone(),
                path,
                root: root.to_path_buf(),
                relative,
            });
        }
    }
}

fn scratch_root(options: &DiscoverOptions, discovery: &mut Discovery) -> std::io::Result<PathBuf> {
    if let Some(ref dir) = options.scratch_dir {
        fs::create_dir_all(dir)?;
        return Ok(dir.clone());
    }
    if discovery.scratch.is_none() {
        discovery.scratch = Some(tempfile::Builder::new().prefix("ctp-archives-").tempdir()?);
    }
    match discovery.scratch {
        Some(ref dir) => Ok(dir.path().to_path_buf()),
        None => Err(std::io::Error::other("scratch directory unavailable")),
    }
}

fn expand(
    archive: &Path,
    prefix: &Path,
    index: usize,
    options: &DiscoverOptions,
    discovery: &mut Discovery,
) {
    let scratch = match scratch_root(options, discovery) {
        Ok(dir) => dir,
        Err(e) => {
            discovery.warnings.push(format!(
                "skipping archive {}: cannot create scratch directory: {}",
                archive.display(),
                e
            ));
            return;
        }
    };

    let stem = archive_stem(archive);
    let dir = scratch.join(format!("{}_{}", index, stem));
    let extraction = match extract_archive(archive, &dir, options.max_archive_size) {
        Ok(extraction) => extraction,
        Err(e) => {
            tracing::debug!(archive = %archive.display(), error = %e, "archive skipped");
            discovery
                .warnings
                .push(format!("skipping archive {}: {}", archive.display(), e));
            return;
        }
    };

    for warning in extraction.warnings {
        discovery
            .warnings
            .push(format!("{}: {}", archive.display(), warning));
    }
    for document in extraction.documents {
        let relative = prefix.join(&stem).join(&document.entry);
        discovery.files.push(InputFile {
            source: archive.join(&document.entry),
            path: document.path,
            root: dir.clone(),
            relative,
        });
    }
}
