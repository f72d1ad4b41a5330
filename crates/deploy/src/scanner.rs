//! Collects a directory tree into an upload file map.

use std::collections::BTreeMap;
use std::path::Path;

use crate::error::DeployError;

/// Reads every file under `root` into a map keyed by relative path.
///
/// Relative paths use `/` as separator (even on Windows), since they
/// become deploy subpaths.
pub fn collect_files(root: &Path) -> Result<BTreeMap<String, Vec<u8>>, DeployError> {
    let mut files = BTreeMap::new();
    walk_dir(root, root, &mut files)?;
    Ok(files)
}

fn walk_dir(
    root: &Path,
    current: &Path,
    files: &mut BTreeMap<String, Vec<u8>>,
) -> Result<(), DeployError> {
    for entry in std::fs::read_dir(current)? {
        let entry = entry?;
        let path = entry.path();
        let metadata = entry.metadata()?;

        if metadata.is_dir() {
            walk_dir(root, &path, files)?;
        } else if metadata.is_file() {
            let rel_path = path.strip_prefix(root).map_err(std::io::Error::other)?;
            let rel_str = rel_path.to_string_lossy().replace('\\', "/");
            files.insert(rel_str, std::fs::read(&path)?);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn create_test_tree() -> TempDir {
        let dir = TempDir::new().unwrap();
        let root = dir.path();

        fs::write(root.join("index.html"), b"<html>").unwrap();
        fs::write(root.join("logo.png"), [0x89u8, b'P', b'N', b'G']).unwrap();
        fs::create_dir_all(root.join("static").join("js")).unwrap();
        fs::write(root.join("static").join("app.css"), b"body{}").unwrap();
        fs::write(root.join("static").join("js").join("main.js"), b"").unwrap();

        dir
    }

    #[test]
    fn collects_nested_files_with_forward_slashes() {
        let dir = create_test_tree();
        let files = collect_files(dir.path()).unwrap();

        let keys: Vec<&str> = files.keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            vec!["index.html", "logo.png", "static/app.css", "static/js/main.js"]
        );
        assert_eq!(files["static/app.css"], b"body{}");
        // Empty files stay in the map as the "no content" marker.
        assert!(files["static/js/main.js"].is_empty());
    }

    #[test]
    fn empty_dir_yields_empty_map() {
        let dir = TempDir::new().unwrap();
        assert!(collect_files(dir.path()).unwrap().is_empty());
    }

    #[test]
    fn nonexistent_dir_fails() {
        let result = collect_files(Path::new("/nonexistent/path/that/does/not/exist"));
        assert!(matches!(result, Err(DeployError::Io(_))));
    }
}
