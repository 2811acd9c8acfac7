//! Where generated files live under the upload root, and how they are named.

use std::fs;
use std::path::{Component, Path, PathBuf};

use super::model::SubmissionDocument;

/// Filesystem-safe version of `name`; `fallback` when nothing usable is left.
pub fn safe_filename(name: &str, fallback: &str) -> String {
    let cleaned = sanitize_filename::sanitize(name.trim());
    let cleaned = cleaned.trim().trim_matches('.');
    if cleaned.is_empty() {
        fallback.to_string()
    } else {
        cleaned.to_string()
    }
}

/// `desired` if free in `dir`, else `stem_1.ext`, `stem_2.ext`, ...
pub fn unique_filename(dir: &Path, desired: &str) -> String {
    let desired = safe_filename(desired, "file");
    if !dir.join(&desired).exists() {
        return desired;
    }

    let path = Path::new(&desired);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| desired.clone());
    let extension = path.extension().map(|e| e.to_string_lossy().into_owned());

    let mut counter = 1u32;
    loop {
        let candidate = match &extension {
            Some(ext) => format!("{}_{}.{}", stem, counter, ext),
            None => format!("{}_{}", stem, counter),
        };
        if !dir.join(&candidate).exists() {
            return candidate;
        }
        counter += 1;
    }
}

/// `{upload}/users/{user_id}/{type}_{id}_{number}`
pub fn submission_folder(
    upload_root: &Path,
    user_id: i32,
    submission_type: &str,
    submission_id: i32,
    submission_number: &str,
) -> PathBuf {
    let mut name = format!("{}_{}", submission_type.trim(), submission_id);
    if !submission_number.trim().is_empty() {
        name.push('_');
        name.push_str(submission_number.trim());
    }
    upload_root
        .join("users")
        .join(user_id.to_string())
        .join(safe_filename(&name, &format!("submission_{}", submission_id)))
}

/// `{upload}/merge_submissions/{be_year}`
pub fn merge_folder(upload_root: &Path, be_year: &str) -> PathBuf {
    upload_root.join("merge_submissions").join(be_year)
}

/// Locate a stored file on disk.
///
/// The stored path is tried as-is and with `\` normalized to `/`; relative paths are
/// also tried under `upload_root`. Returns the first candidate that exists.
pub fn resolve_stored_file_path(stored_path: &str, upload_root: &Path) -> Option<PathBuf> {
    let trimmed = stored_path.trim();
    if trimmed.is_empty() {
        return None;
    }
    let normalized = trimmed.replace('\\', "/");

    let mut candidates: Vec<PathBuf> = Vec::with_capacity(4);
    let mut push = |candidate: PathBuf| {
        let cleaned = clean_path(&candidate);
        if cleaned.as_os_str().is_empty() || cleaned == Path::new(".") {
            return;
        }
        if !candidates.contains(&cleaned) {
            candidates.push(cleaned);
        }
    };

    push(PathBuf::from(trimmed));
    push(PathBuf::from(&normalized));

    let normalized_path = Path::new(&normalized);
    if !normalized_path.is_absolute() && !upload_root.as_os_str().is_empty() {
        push(clean_path(upload_root).join(normalized_path));
    }

    candidates.into_iter().find(|candidate| candidate.exists())
}

/// Lexically drop `.` components and resolve `..` where possible.
fn clean_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Path of `path` relative to the parent of `upload_root`, `/`-separated, for API
/// responses (`uploads/merge_submissions/...`).
pub fn relative_to_upload_root(path: &Path, upload_root: &Path) -> String {
    let root = clean_path(upload_root);
    let cleaned = clean_path(path);
    match (cleaned.strip_prefix(&root), root.file_name()) {
        (Ok(rest), Some(root_name)) => Path::new(root_name)
            .join(rest)
            .to_string_lossy()
            .replace('\\', "/"),
        _ => cleaned.to_string_lossy().replace('\\', "/"),
    }
}

/// Display order for a document appended after `existing`.
pub fn next_display_order(existing: &[SubmissionDocument]) -> i32 {
    let max = existing.iter().map(|d| d.display_order).max().unwrap_or(0);
    if max <= 0 {
        existing.len() as i32 + 1
    } else {
        max + 1
    }
}

/// Files written during a transaction; removed on drop unless [`GeneratedFiles::keep`]
/// was called after commit.
#[derive(Debug, Default)]
pub struct GeneratedFiles {
    paths: Vec<PathBuf>,
    kept: bool,
}

impl GeneratedFiles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn track(&mut self, path: impl Into<PathBuf>) {
        self.paths.push(path.into());
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    pub fn keep(mut self) -> Vec<PathBuf> {
        self.kept = true;
        std::mem::take(&mut self.paths)
    }
}

impl Drop for GeneratedFiles {
    fn drop(&mut self) {
        if self.kept {
            return;
        }
        for path in &self.paths {
            match fs::remove_file(path) {
                Ok(()) => log::info!("removed uncommitted file {}", path.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => log::warn!("failed to remove uncommitted file {}: {}", path.display(), e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_filename() {
        assert_eq!(safe_filename("a/b:c.pdf", "x"), "abc.pdf");
        assert_eq!(safe_filename("  ", "fallback"), "fallback");
    }

    #[test]
    fn test_unique_filename_appends_counter() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(unique_filename(dir.path(), "form.docx"), "form.docx");
        fs::write(dir.path().join("form.docx"), b"").unwrap();
        assert_eq!(unique_filename(dir.path(), "form.docx"), "form_1.docx");
        fs::write(dir.path().join("form_1.docx"), b"").unwrap();
        assert_eq!(unique_filename(dir.path(), "form.docx"), "form_2.docx");
    }

    #[test]
    fn test_submission_folder_layout() {
        let folder = submission_folder(Path::new("/data/uploads"), 7, "publication_reward", 42, "PR-2568-0001");
        assert_eq!(
            folder,
            PathBuf::from("/data/uploads/users/7/publication_reward_42_PR-2568-0001")
        );
    }

    #[test]
    fn test_resolve_relative_to_upload_root() {
        let root = tempfile::tempdir().unwrap();
        let nested = root.path().join("users/7");
        fs::create_dir_all(&nested).unwrap();
        fs::write(nested.join("a.pdf"), b"%PDF").unwrap();

        assert_eq!(
            resolve_stored_file_path("users\\7\\a.pdf", root.path()),
            Some(nested.join("a.pdf"))
        );
        let absolute = nested.join("a.pdf");
        assert_eq!(
            resolve_stored_file_path(&absolute.to_string_lossy(), Path::new("/elsewhere")),
            Some(absolute)
        );
        assert_eq!(resolve_stored_file_path("users/7/missing.pdf", root.path()), None);
        assert_eq!(resolve_stored_file_path("   ", root.path()), None);
    }

    #[test]
    fn test_relative_path_for_response() {
        assert_eq!(
            relative_to_upload_root(
                Path::new("./uploads/merge_submissions/2568/x.pdf"),
                Path::new("./uploads")
            ),
            "uploads/merge_submissions/2568/x.pdf"
        );
    }

    #[test]
    fn test_next_display_order() {
        let doc = |order| SubmissionDocument {
            display_order: order,
            ..SubmissionDocument::default()
        };
        assert_eq!(next_display_order(&[]), 1);
        assert_eq!(next_display_order(&[doc(0), doc(0)]), 3);
        assert_eq!(next_display_order(&[doc(2), doc(5)]), 6);
    }

    #[test]
    fn test_generated_files_removed_unless_kept() {
        let dir = tempfile::tempdir().unwrap();
        let dropped = dir.path().join("dropped.pdf");
        let kept = dir.path().join("kept.pdf");
        fs::write(&dropped, b"x").unwrap();
        fs::write(&kept, b"x").unwrap();

        {
            let mut files = GeneratedFiles::new();
            files.track(&dropped);
        }
        assert!(!dropped.exists());

        let mut files = GeneratedFiles::new();
        files.track(&kept);
        assert_eq!(files.keep(), vec![kept.clone()]);
        assert!(kept.exists());
    }
}
