//! Random image selection for daily deliveries.

use std::path::{Path, PathBuf};

use rand::Rng;

use crate::error::{EmailError, EmailResult};
use crate::ATTACHMENT_BASE_NAME;

/// Picks a uniformly random image file from a configured directory.
pub struct ImagePicker {
    directory: PathBuf,
}

impl ImagePicker {
    /// Create a picker; fails when the path is not a directory.
    pub fn new(directory: impl Into<PathBuf>) -> EmailResult<Self> {
        let directory = directory.into();
        if !directory.is_dir() {
            return Err(EmailError::Config(format!(
                "{} is not a directory",
                directory.display()
            )));
        }
        Ok(Self { directory })
    }

    /// Choose one file uniformly among the non-directory entries.
    ///
    /// A directory holding only sub-directories is an error, not an
    /// endless re-roll.
    pub fn pick(&self) -> EmailResult<PathBuf> {
        let entries: Vec<PathBuf> = std::fs::read_dir(&self.directory)
            .map_err(|e| EmailError::Image(e.to_string()))?
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().map(|t| !t.is_dir()).unwrap_or(false))
            .map(|entry| entry.path())
            .collect();

        if entries.is_empty() {
            return Err(EmailError::Image(format!(
                "no image files in {}",
                self.directory.display()
            )));
        }

        let index = rand::rng().random_range(0..entries.len());
        Ok(entries[index].clone())
    }
}

/// The filename the image travels under: `"watermelon"` plus the chosen
/// file's extension. The daily template references it by content id.
pub fn attachment_name(image_path: &Path) -> String {
    match image_path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) => format!("{}.{}", ATTACHMENT_BASE_NAME, ext),
        None => ATTACHMENT_BASE_NAME.to_string(),
    }
}

/// MIME type for the attachment, from the file extension.
pub fn content_type_for(image_path: &Path) -> &'static str {
    match image_path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .as_deref()
    {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_picker_rejects_non_directory() {
        let file = tempfile::NamedTempFile::new().unwrap();
        assert!(ImagePicker::new(file.path()).is_err());
    }

    #[test]
    fn test_pick_returns_a_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.jpg"), b"jpegbytes").unwrap();
        fs::write(dir.path().join("b.png"), b"pngbytes").unwrap();

        let picker = ImagePicker::new(dir.path()).unwrap();
        for _ in 0..10 {
            let picked = picker.pick().unwrap();
            assert!(picked.is_file());
        }
    }

    #[test]
    fn test_pick_skips_subdirectories() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("only.gif"), b"gifbytes").unwrap();

        let picker = ImagePicker::new(dir.path()).unwrap();
        for _ in 0..10 {
            assert!(picker.pick().unwrap().ends_with("only.gif"));
        }
    }

    #[test]
    fn test_pick_errors_when_only_subdirectories() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();

        let picker = ImagePicker::new(dir.path()).unwrap();
        assert!(picker.pick().is_err());
    }

    #[test]
    fn test_attachment_name_follows_extension() {
        assert_eq!(attachment_name(Path::new("/img/photo.jpg")), "watermelon.jpg");
        assert_eq!(attachment_name(Path::new("/img/photo.png")), "watermelon.png");
        assert_eq!(attachment_name(Path::new("/img/noext")), "watermelon");
    }

    #[test]
    fn test_content_type_for_known_extensions() {
        assert_eq!(content_type_for(Path::new("a.JPG")), "image/jpeg");
        assert_eq!(content_type_for(Path::new("a.png")), "image/png");
        assert_eq!(content_type_for(Path::new("a.bin")), "application/octet-stream");
    }
}
