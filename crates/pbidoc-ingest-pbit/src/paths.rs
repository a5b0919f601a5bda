//! Collision-safe path naming.
//!
//! Both the archive rename (`report_v02.zip`) and the output document
//! (`report_doc_version_02.docx`) pick the first unused sibling name. Computing
//! a name never touches the filesystem beyond existence checks.

use std::path::{Path, PathBuf};

/// Infix used for alternate container names (`_v02`, `_v03`, ...).
pub const CONTAINER_INFIX: &str = "_v";

/// Infix used for versioned output documents (`_version_02`, ...).
pub const OUTPUT_VERSION_INFIX: &str = "_version_";

/// First version number tried when the plain path is taken.
pub const FIRST_VERSION: u32 = 2;

/// Return `path` if it is free, otherwise the first free `{stem}{infix}{NN}{ext}` sibling.
pub fn first_free_path(path: &Path, infix: &str) -> PathBuf {
    first_free_path_with(path, infix, |p| p.exists())
}

/// Output naming for a document save target.
pub fn versioned_output_path(path: &Path) -> PathBuf {
    first_free_path(path, OUTPUT_VERSION_INFIX)
}

/// Same as [`first_free_path`] with an injectable existence check.
pub fn first_free_path_with<F>(path: &Path, infix: &str, exists: F) -> PathBuf
where
    F: Fn(&Path) -> bool,
{
    if !exists(path) {
        return path.to_path_buf();
    }
    let mut version = FIRST_VERSION;
    loop {
        let candidate = numbered_sibling(path, infix, version);
        if !exists(&candidate) {
            return candidate;
        }
        version += 1;
    }
}

/// `{stem}{infix}{version:02}{ext}` next to `path`.
///
/// The extension is everything from the last dot of the file name, except a
/// leading dot (`.env` has no extension).
pub fn numbered_sibling(path: &Path, infix: &str, version: u32) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let (stem, ext) = split_extension(&file_name);
    path.with_file_name(format!("{stem}{infix}{version:02}{ext}"))
}

fn split_extension(file_name: &str) -> (&str, &str) {
    match file_name.rfind('.') {
        Some(idx) if idx > 0 => file_name.split_at(idx),
        _ => (file_name, ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn free_path_is_returned_unchanged() {
        let p = Path::new("/out/report_doc.docx");
        assert_eq!(first_free_path_with(p, OUTPUT_VERSION_INFIX, |_| false), p);
    }

    #[test]
    fn versions_skip_taken_names() {
        let taken: HashSet<PathBuf> = [
            PathBuf::from("/out/report_doc.docx"),
            PathBuf::from("/out/report_doc_version_02.docx"),
        ]
        .into_iter()
        .collect();
        let got = first_free_path_with(
            Path::new("/out/report_doc.docx"),
            OUTPUT_VERSION_INFIX,
            |p| taken.contains(p),
        );
        assert_eq!(got, PathBuf::from("/out/report_doc_version_03.docx"));
    }

    #[test]
    fn container_alternates_use_two_digit_suffix() {
        assert_eq!(
            numbered_sibling(Path::new("bi/Sales.zip"), CONTAINER_INFIX, 2),
            PathBuf::from("bi/Sales_v02.zip")
        );
        assert_eq!(
            numbered_sibling(Path::new("bi/Sales.zip"), CONTAINER_INFIX, 11),
            PathBuf::from("bi/Sales_v11.zip")
        );
    }

    #[test]
    fn names_without_extension() {
        assert_eq!(
            numbered_sibling(Path::new("notes"), OUTPUT_VERSION_INFIX, 2),
            PathBuf::from("notes_version_02")
        );
        assert_eq!(
            numbered_sibling(Path::new(".env"), OUTPUT_VERSION_INFIX, 2),
            PathBuf::from(".env_version_02")
        );
        assert_eq!(
            numbered_sibling(Path::new("a.tar.gz"), OUTPUT_VERSION_INFIX, 4),
            PathBuf::from("a.tar_version_04.gz")
        );
    }
}
