use crate::error::Result;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Extensions accepted for upload and picked up during evaluation.
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp"];

pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Reduce a client-supplied file name to `[A-Za-z0-9._-]`, without leading dots.
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(|c: char| c == '/' || c == '\\').next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '.' | '-' | '_' => c,
            _ => '_',
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.').to_string();
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned
    }
}

/// Image files directly inside `dir`, sorted case-insensitively by name.
pub fn list_image_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut images = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(std::io::Error::from)?;
        if entry.file_type().is_file() && is_image_file(entry.path()) {
            images.push(entry.into_path());
        }
    }
    images.sort_by_key(|p| file_name_lower(p));
    Ok(images)
}

/// Non-hidden subdirectories of `dir`, sorted by name.
pub fn list_subdirectories(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut dirs = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(std::io::Error::from)?;
        if entry.file_type().is_dir() && !entry.file_name().to_string_lossy().starts_with('.') {
            dirs.push(entry.into_path());
        }
    }
    dirs.sort();
    Ok(dirs)
}

fn file_name_lower(path: &Path) -> String {
    path.file_name()
        .unwrap_or_default()
        .to_string_lossy()
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognises_allowed_extensions_case_insensitively() {
        assert!(is_image_file(Path::new("leaf.JPG")));
        assert!(is_image_file(Path::new("dir/leaf.bmp")));
        assert!(!is_image_file(Path::new("leaf.tiff")));
        assert!(!is_image_file(Path::new("leaf")));
    }

    #[test]
    fn sanitize_strips_paths_and_odd_characters() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("C:\\photos\\my leaf (1).jpg"), "my_leaf__1_.jpg");
        assert_eq!(sanitize_filename(".hidden.png"), "hidden.png");
        assert_eq!(sanitize_filename(""), "upload");
    }

    #[test]
    fn lists_images_and_directories() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.png"), b"x").unwrap();
        std::fs::write(dir.path().join("A.jpg"), b"x").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"x").unwrap();
        std::fs::create_dir(dir.path().join("Tomato___healthy")).unwrap();
        std::fs::create_dir(dir.path().join(".cache")).unwrap();

        let images = list_image_files(dir.path()).unwrap();
        let names: Vec<String> = images.iter().map(|p| file_name_lower(p)).collect();
        assert_eq!(names, vec!["a.jpg", "b.png"]);

        let dirs = list_subdirectories(dir.path()).unwrap();
        assert_eq!(dirs.len(), 1);
        assert!(dirs[0].ends_with("Tomato___healthy"));
    }
}
