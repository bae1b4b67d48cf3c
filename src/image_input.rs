//! 解析対象の画像ファイル

use crate::error::{DeviceVerifyError, Result};
use device_verify_common::FileRef;
use std::path::{Path, PathBuf};

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "heic"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageInput {
    pub path: PathBuf,
    pub file_name: String,
}

impl ImageInput {
    /// 存在と拡張子を確認して ImageInput を作る
    pub fn open(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(DeviceVerifyError::FileNotFound(path.display().to_string()));
        }

        let supported = path
            .extension()
            .map(|ext| is_image_extension(&ext.to_string_lossy()))
            .unwrap_or(false);
        if !supported {
            return Err(DeviceVerifyError::UnsupportedImage(path.display().to_string()));
        }

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        Ok(Self {
            path: path.to_path_buf(),
            file_name,
        })
    }

    pub fn file_ref(&self) -> FileRef {
        FileRef::new(self.path.display().to_string())
    }

    /// MIMEタイプ（拡張子から判定）
    pub fn mime_type(&self) -> &'static str {
        mime_type_for(&self.path)
    }
}

pub fn is_image_extension(ext: &str) -> bool {
    IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str())
}

pub fn mime_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "webp" => "image/webp",
        "heic" => "image/heic",
        _ => "image/jpeg",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use tempfile::tempdir;

    #[test]
    fn test_is_image_extension() {
        assert!(is_image_extension("jpg"));
        assert!(is_image_extension("JPG"));
        assert!(is_image_extension("heic"));
        assert!(!is_image_extension("txt"));
        assert!(!is_image_extension("pdf"));
    }

    #[test]
    fn test_open_image() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("screen.PNG");
        File::create(&path).unwrap();

        let image = ImageInput::open(&path).unwrap();
        assert_eq!(image.file_name, "screen.PNG");
        assert_eq!(image.mime_type(), "image/png");
    }

    #[test]
    fn test_open_missing_file() {
        let result = ImageInput::open(Path::new("/nonexistent/screen.jpg"));
        assert!(matches!(result, Err(DeviceVerifyError::FileNotFound(_))));
    }

    #[test]
    fn test_open_unsupported() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        File::create(&path).unwrap();

        let result = ImageInput::open(&path);
        assert!(matches!(result, Err(DeviceVerifyError::UnsupportedImage(_))));
    }
}
