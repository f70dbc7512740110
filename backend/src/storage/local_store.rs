use chrono::NaiveDateTime;
use std::fs;
use std::path::{Path, PathBuf};

use crate::pipeline::ValidationError;

use super::artifact_namer::{ArtifactPaths, NamingMode, derive_paths};

pub const ALLOWED_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "bmp"];
pub const UPLOADS_SUBDIR: &str = "uploads";
pub const OUTPUTS_SUBDIR: &str = "outputs";
pub const STATIC_URL_PREFIX: &str = "/static";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("IO error on '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Flat-file storage for staged uploads and labeled outputs under the static directory.
#[derive(Clone, Debug)]
pub struct LocalStore {
    static_dir: PathBuf,
    upload_dir: PathBuf,
    output_dir: PathBuf,
    max_upload_bytes: usize,
}

impl LocalStore {
    pub fn new(static_dir: impl Into<PathBuf>, max_upload_bytes: usize) -> Self {
        let static_dir = static_dir.into();
        Self {
            upload_dir: static_dir.join(UPLOADS_SUBDIR),
            output_dir: static_dir.join(OUTPUTS_SUBDIR),
            static_dir,
            max_upload_bytes,
        }
    }

    pub fn static_dir(&self) -> &Path {
        &self.static_dir
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_bytes
    }

    pub fn ensure_dirs(&self) -> Result<(), StoreError> {
        for dir in [&self.upload_dir, &self.output_dir] {
            fs::create_dir_all(dir).map_err(|source| StoreError::Io {
                path: dir.clone(),
                source,
            })?;
        }
        Ok(())
    }

    /// True when the text after the last `.` is an allowed image extension.
    pub fn allowed_file(filename: &str) -> bool {
        filename
            .rsplit_once('.')
            .map(|(_, ext)| {
                let ext = ext.to_ascii_lowercase();
                ALLOWED_EXTENSIONS.contains(&ext.as_str())
            })
            .unwrap_or(false)
    }

    pub fn validate_upload_name(filename: &str) -> Result<(), ValidationError> {
        if filename.is_empty() {
            return Err(ValidationError::EmptyFilename);
        }
        if !Self::allowed_file(filename) {
            return Err(ValidationError::UnsupportedType);
        }
        Ok(())
    }

    pub fn validate_image_size(&self, len: usize) -> Result<(), ValidationError> {
        if len > self.max_upload_bytes {
            return Err(ValidationError::TooLarge);
        }
        Ok(())
    }

    pub fn plan_upload(&self, original_name: &str, at: NaiveDateTime) -> ArtifactPaths {
        derive_paths(
            original_name,
            &self.upload_dir,
            &self.output_dir,
            &NamingMode::Managed,
            at,
        )
    }

    pub fn stage_upload(&self, paths: &ArtifactPaths, image_data: &[u8]) -> Result<(), StoreError> {
        fs::write(&paths.input_path, image_data).map_err(|source| StoreError::Io {
            path: paths.input_path.clone(),
            source,
        })?;
        log::debug!(
            "Staged {} bytes at {}",
            image_data.len(),
            paths.input_path.display()
        );
        Ok(())
    }

    pub fn input_url(path: &Path) -> String {
        Self::url_in(UPLOADS_SUBDIR, path)
    }

    pub fn output_url(path: &Path) -> String {
        Self::url_in(OUTPUTS_SUBDIR, path)
    }

    fn url_in(subdir: &str, path: &Path) -> String {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        format!("{}/{}/{}", STATIC_URL_PREFIX, subdir, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 12, 31)
            .unwrap()
            .and_hms_opt(23, 59, 58)
            .unwrap()
    }

    #[test]
    fn allowed_extensions_are_case_insensitive() {
        assert!(LocalStore::allowed_file("apple.jpg"));
        assert!(LocalStore::allowed_file("apple.JPEG"));
        assert!(LocalStore::allowed_file("scan.v2.Png"));
        assert!(LocalStore::allowed_file("old.bmp"));
        assert!(!LocalStore::allowed_file("payload.exe"));
        assert!(!LocalStore::allowed_file("jpg"));
        assert!(!LocalStore::allowed_file("photo.jpg.exe"));
    }

    #[test]
    fn validate_upload_name_reports_reason() {
        assert_eq!(
            LocalStore::validate_upload_name(""),
            Err(ValidationError::EmptyFilename)
        );
        assert_eq!(
            LocalStore::validate_upload_name("payload.exe"),
            Err(ValidationError::UnsupportedType)
        );
        assert_eq!(LocalStore::validate_upload_name("apple.jpg"), Ok(()));
    }

    #[test]
    fn validate_image_size_uses_limit() {
        let store = LocalStore::new("static", 10);
        assert!(store.validate_image_size(10).is_ok());
        assert_eq!(
            store.validate_image_size(11),
            Err(ValidationError::TooLarge)
        );
    }

    #[test]
    fn stages_upload_under_upload_dir() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path().join("static"), 1024);
        store.ensure_dirs().unwrap();

        let paths = store.plan_upload("../evil/apple.jpg", at());
        store.stage_upload(&paths, b"bytes").unwrap();

        assert_eq!(paths.input_path.parent(), Some(store.upload_dir()));
        assert_eq!(paths.output_path.parent(), Some(store.output_dir()));
        assert_eq!(fs::read(&paths.input_path).unwrap(), b"bytes");
    }

    #[test]
    fn stage_without_directories_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path().join("static"), 1024);
        let paths = store.plan_upload("apple.jpg", at());

        assert!(matches!(
            store.stage_upload(&paths, b"bytes"),
            Err(StoreError::Io { .. })
        ));
    }

    #[test]
    fn urls_point_under_static() {
        let store = LocalStore::new("/srv/static", 1024);
        let paths = store.plan_upload("apple.jpg", at());
        assert_eq!(
            LocalStore::input_url(&paths.input_path),
            "/static/uploads/20241231-235958_apple.jpg"
        );
        assert_eq!(
            LocalStore::output_url(&paths.output_path),
            "/static/outputs/20241231-235958_apple_labeled.jpg"
        );
    }
}
