use crate::util::stem_lossy;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// An exported image and the stem used to find its RAW original.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceImage {
    pub path: PathBuf,
    pub stem: String,
}

impl SourceImage {
    pub fn new(path: PathBuf) -> Self {
        let stem = stem_lossy(&path);
        Self { path, stem }
    }

    pub fn name(&self) -> String {
        crate::util::file_name_lossy(&self.path)
    }
}

/// Regular files directly inside `dir` whose suffix matches one of
/// `extensions` ignoring case, sorted by file name.
pub fn discover_images(dir: &Path, extensions: &[String]) -> io::Result<Vec<SourceImage>> {
    let wanted: Vec<String> = extensions
        .iter()
        .map(|ext| ext.trim_start_matches('.').to_lowercase())
        .collect();
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(ext) = path.extension() else {
            continue;
        };
        let ext = ext.to_string_lossy().to_lowercase();
        if wanted.iter().any(|candidate| *candidate == ext) {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths.into_iter().map(SourceImage::new).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jpeg_extensions() -> Vec<String> {
        vec![".jpg".to_string(), ".jpeg".to_string()]
    }

    #[test]
    fn matches_suffixes_case_insensitively() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let eligible = ["b.JPG", "a.jpg", "c.jpeg", "d.JPEG"];
        let others = ["e.png", "f.ARW", "notes.txt", "jpg"];
        for name in eligible.iter().chain(&others) {
            fs::write(dir.path().join(name), b"x").expect("write file");
        }

        let images = discover_images(dir.path(), &jpeg_extensions()).expect("discover");
        let names: Vec<String> = images.iter().map(SourceImage::name).collect();
        assert_eq!(names, vec!["a.jpg", "b.JPG", "c.jpeg", "d.JPEG"]);
        assert_eq!(images[1].stem, "b");
    }

    #[test]
    fn ignores_subdirectories() {
        let dir = tempfile::tempdir().expect("create temp dir");
        fs::create_dir_all(dir.path().join("nested.jpg")).expect("create dir");
        fs::create_dir_all(dir.path().join("sub")).expect("create dir");
        fs::write(dir.path().join("sub/deep.jpg"), b"x").expect("write file");

        let images = discover_images(dir.path(), &jpeg_extensions()).expect("discover");
        assert!(images.is_empty());
    }

    #[test]
    fn count_matches_number_of_eligible_files() {
        let dir = tempfile::tempdir().expect("create temp dir");
        for idx in 0..7 {
            fs::write(dir.path().join(format!("IMG_{idx:04}.jpg")), b"x").expect("write file");
            fs::write(dir.path().join(format!("IMG_{idx:04}.xmp")), b"x").expect("write file");
        }

        let images = discover_images(dir.path(), &jpeg_extensions()).expect("discover");
        assert_eq!(images.len(), 7);
    }
}
