use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::discover::InputFile;

/// Where the text for `input` goes.
///
/// With `preserve_tree` the input's relative directory is recreated under
/// `output_dir`; otherwise every output lands directly in `output_dir`.
pub fn output_path_for(
    input: &InputFile,
    output_dir: &Path,
    extension: &str,
    preserve_tree: bool,
) -> PathBuf {
    let file_name = format!("{}.{}", stem_of(&input.relative), extension);
    match input.relative.parent() {
        Some(parent) if preserve_tree => output_dir.join(parent).join(file_name),
        _ => output_dir.join(file_name),
    }
}

fn stem_of(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "output".to_string())
}

/// Assigns output paths for one run so that no two inputs share an output.
///
/// The first input to claim a path keeps it. A later `report.docx` that
/// collides with `report.pdf` becomes `report.docx.txt`, then
/// `report.docx.2.txt` and so on.
#[derive(Debug)]
pub struct OutputPlanner {
    output_dir: PathBuf,
    extension: String,
    preserve_tree: bool,
    taken: HashSet<PathBuf>,
}

impl OutputPlanner {
    pub fn new(output_dir: &Path, extension: &str, preserve_tree: bool) -> Self {
        Self {
            output_dir: output_dir.to_path_buf(),
            extension: extension.trim_start_matches('.').to_string(),
            preserve_tree,
            taken: HashSet::new(),
        }
    }

    pub fn plan(&mut self, input: &InputFile) -> PathBuf {
        let preferred = output_path_for(input, &self.output_dir, &self.extension, self.preserve_tree);
        if self.taken.insert(preferred.clone()) {
            return preferred;
        }

        let dir = preferred
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.output_dir.clone());
        let stem = stem_of(&input.relative);
        let source_ext = input
            .relative
            .extension()
            .map(|e| e.to_string_lossy().to_string())
            .unwrap_or_else(|| "noext".to_string());

        let mut candidate = dir.join(format!("{}.{}.{}", stem, source_ext, self.extension));
        let mut n = 2;
        while !self.taken.insert(candidate.clone()) {
            candidate = dir.join(format!("{}.{}.{}.{}", stem, source_ext, n, self.extension));
            n += 1;
        }
        tracing::debug!(
            input = %input.source.display(),
            output = %candidate.display(),
            "output name collision resolved"
        );
        candidate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(relative: &str) -> InputFile {
        InputFile {
            path: PathBuf::from("/in").join(relative),
            root: PathBuf::from("/in"),
            relative: PathBuf::from(relative),
            source: PathBuf::from("/in").join(relative),
        }
    }

    #[test]
    fn test_output_path_for() {
        let out = Path::new("/out");
        assert_eq!(
            output_path_for(&input("a/b/report.pdf"), out, "txt", true),
            PathBuf::from("/out/a/b/report.txt")
        );
        assert_eq!(
            output_path_for(&input("a/b/report.pdf"), out, "txt", false),
            PathBuf::from("/out/report.txt")
        );
        assert_eq!(
            output_path_for(&input("notes.tar.txt"), out, "text", true),
            PathBuf::from("/out/notes.tar.text")
        );
    }

    #[test]
    fn test_planner_resolves_collisions() {
        let mut planner = OutputPlanner::new(Path::new("/out"), ".txt", false);
        assert_eq!(planner.plan(&input("x/report.pdf")), PathBuf::from("/out/report.txt"));
        assert_eq!(planner.plan(&input("report.docx")), PathBuf::from("/out/report.docx.txt"));
        assert_eq!(planner.plan(&input("y/report.docx")), PathBuf::from("/out/report.docx.2.txt"));
        assert_eq!(planner.plan(&input("other.rtf")), PathBuf::from("/out/other.txt"));
    }

    #[test]
    fn test_planner_tree_mode_keeps_directories_apart() {
        let mut planner = OutputPlanner::new(Path::new("/out"), "txt", true);
        assert_eq!(planner.plan(&input("x/report.pdf")), PathBuf::from("/out/x/report.txt"));
        assert_eq!(planner.plan(&input("y/report.pdf")), PathBuf::from("/out/y/report.txt"));
    }
}
