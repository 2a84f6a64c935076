use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// List photos directly inside `directory`, sorted by file name.
///
/// Subdirectories (including the output trees) are not descended into.
/// Suffix assignment follows this order, so it must not depend on how the
/// filesystem happens to list entries.
pub fn discover_photos(directory: &Path, extensions: &[String]) -> Result<Vec<PathBuf>> {
    if !directory.is_dir() {
        anyhow::bail!("Input directory {} does not exist", directory.display());
    }

    let mut photos = Vec::new();

    for entry in WalkDir::new(directory)
        .min_depth(1)
        .max_depth(1)
        .follow_links(false)
    {
        let entry = entry.with_context(|| format!("Failed to list {}", directory.display()))?;
        let path = entry.path();

        if !entry.file_type().is_file() {
            continue;
        }

        if let Some(ext) = path.extension() {
            let ext_lower = ext.to_string_lossy().to_lowercase();
            if extensions.iter().any(|e| e.to_lowercase() == ext_lower) {
                photos.push(path.to_path_buf());
            }
        }
    }

    photos.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

    Ok(photos)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, File};
    use tempfile::tempdir;

    #[test]
    fn test_discover_photos() {
        let dir = tempdir().unwrap();

        File::create(dir.path().join("b.JPG")).unwrap();
        File::create(dir.path().join("a.jpeg")).unwrap();
        File::create(dir.path().join("c.jpg")).unwrap();
        File::create(dir.path().join("notes.txt")).unwrap();
        File::create(dir.path().join("scan.png")).unwrap();

        fs::create_dir(dir.path().join("successes")).unwrap();
        File::create(dir.path().join("successes/old.jpg")).unwrap();

        let extensions = vec!["jpg".to_string(), "jpeg".to_string()];
        let photos = discover_photos(dir.path(), &extensions).unwrap();

        let names: Vec<_> = photos
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.jpeg", "b.JPG", "c.jpg"]);
    }

    #[test]
    fn test_missing_directory_is_an_error() {
        let dir = tempdir().unwrap();
        let extensions = vec!["jpg".to_string()];
        assert!(discover_photos(&dir.path().join("absent"), &extensions).is_err());
    }
}
