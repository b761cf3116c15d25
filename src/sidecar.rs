use std::path::{Path, PathBuf};

pub const SIDECAR_EXTENSION: &str = "xmp";

/// Expected XMP sidecar for a RAW file: same directory, same stem, `.xmp`.
pub fn sidecar_path(raw: &Path) -> PathBuf {
    let stem = raw.file_stem().unwrap_or_default();
    let mut name = stem.to_os_string();
    name.push(".");
    name.push(SIDECAR_EXTENSION);
    raw.with_file_name(name)
}

/// Existence check for a RAW file's sidecar.
pub trait SidecarChecker {
    fn exists(&self, raw: &Path) -> bool;

    fn sidecar_path(&self, raw: &Path) -> PathBuf {
        sidecar_path(raw)
    }
}

/// Checks sidecars on the local filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsSidecarChecker;

impl SidecarChecker for FsSidecarChecker {
    fn exists(&self, raw: &Path) -> bool {
        self.sidecar_path(raw).is_file()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sidecar_path_replaces_any_raw_suffix() {
        let cases = [
            ("/photos/2024/DSC00089.ARW", "/photos/2024/DSC00089.xmp"),
            ("/photos/DSC00089.arw", "/photos/DSC00089.xmp"),
            ("/photos/IMG_1234.DNG", "/photos/IMG_1234.xmp"),
            ("/photos/IMG_1234.dng", "/photos/IMG_1234.xmp"),
        ];
        for (raw, expected) in cases {
            assert_eq!(sidecar_path(Path::new(raw)), PathBuf::from(expected));
        }
    }

    #[test]
    fn fs_checker_requires_a_file() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let raw = dir.path().join("DSC00089.ARW");
        std::fs::write(&raw, b"raw").expect("write raw");
        assert!(!FsSidecarChecker.exists(&raw));

        std::fs::create_dir(dir.path().join("DSC00089.xmp")).expect("create dir");
        assert!(!FsSidecarChecker.exists(&raw));

        let other = dir.path().join("DSC00090.ARW");
        std::fs::write(dir.path().join("DSC00090.xmp"), b"<x:xmpmeta/>").expect("write xmp");
        assert!(FsSidecarChecker.exists(&other));
    }
}
