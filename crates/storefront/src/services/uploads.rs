//! Product image uploads.
//!
//! Uploaded filenames are untrusted input: they are sanitized before
//! touching the filesystem and restricted to a small extension allow-list.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Allowed image file extensions (lowercase).
const ALLOWED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp"];

/// Errors from image upload handling.
#[derive(Debug, Error)]
pub enum UploadError {
    /// The multipart field carried no usable filename.
    #[error("image upload is missing a filename")]
    MissingFilename,

    /// The file extension is not in the allow-list.
    #[error("unsupported image extension: {0}")]
    UnsupportedExtension(String),

    /// Writing the file failed.
    #[error("failed to store image: {0}")]
    Io(#[from] std::io::Error),
}

/// Strip a client filename down to a safe basename.
///
/// Keeps ASCII alphanumerics, `-`, `_`, and `.`; everything else becomes
/// `_`. Path separators never survive, so the result cannot escape the
/// upload directory.
#[must_use]
pub fn sanitize_filename(name: &str) -> String {
    // Drop any client-supplied directory components first
    let base = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(name);

    base.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Check the extension against the allow-list.
///
/// # Errors
///
/// Returns `UploadError::UnsupportedExtension` for anything not in the list
/// and `UploadError::MissingFilename` for a name with no extension.
pub fn validate_extension(filename: &str) -> Result<(), UploadError> {
    let extension = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .ok_or(UploadError::MissingFilename)?;

    if ALLOWED_EXTENSIONS.contains(&extension.to_ascii_lowercase().as_str()) {
        Ok(())
    } else {
        Err(UploadError::UnsupportedExtension(extension.to_owned()))
    }
}

/// Store an uploaded image under the upload directory.
///
/// Returns the path to reference from product records, relative to the
/// static file root. A name that is already taken gets a numeric suffix so
/// one product's image never overwrites another's.
///
/// # Errors
///
/// Returns `UploadError` if the filename is unusable or the write fails.
pub async fn store_image(
    upload_dir: &Path,
    client_filename: &str,
    bytes: &[u8],
) -> Result<String, UploadError> {
    let wanted = sanitize_filename(client_filename);
    if wanted.is_empty() || wanted.chars().all(|c| c == '.' || c == '_') {
        return Err(UploadError::MissingFilename);
    }
    validate_extension(&wanted)?;

    tokio::fs::create_dir_all(upload_dir).await?;

    let filename = available_filename(upload_dir, &wanted).await?;
    let path: PathBuf = upload_dir.join(&filename);
    tokio::fs::write(&path, bytes).await?;

    tracing::debug!(path = %path.display(), size = bytes.len(), "stored product image");

    Ok(format!("images/products/{filename}"))
}

/// Pick a filename that does not collide with an existing file.
///
/// `cat.png` becomes `cat-1.png`, `cat-2.png`, ... while taken.
async fn available_filename(dir: &Path, wanted: &str) -> Result<String, UploadError> {
    if !tokio::fs::try_exists(dir.join(wanted)).await? {
        return Ok(wanted.to_owned());
    }

    for n in 1..u32::MAX {
        let candidate = numbered_variant(wanted, n);
        if !tokio::fs::try_exists(dir.join(&candidate)).await? {
            return Ok(candidate);
        }
    }

    Err(UploadError::Io(std::io::Error::other(
        "no free filename in upload directory",
    )))
}

/// Insert a numeric suffix before the extension.
fn numbered_variant(name: &str, n: u32) -> String {
    match name.rsplit_once('.') {
        Some((stem, ext)) => format!("{stem}-{n}.{ext}"),
        None => format!("{name}-{n}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_keeps_safe_characters() {
        assert_eq!(sanitize_filename("photo-1_final.jpg"), "photo-1_final.jpg");
    }

    #[test]
    fn test_sanitize_replaces_unsafe_characters() {
        assert_eq!(sanitize_filename("my photo (1).jpg"), "my_photo__1_.jpg");
    }

    #[test]
    fn test_sanitize_strips_path_components() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename(r"C:\Users\x\cat.png"), "cat.png");
    }

    #[test]
    fn test_validate_extension_allow_list() {
        assert!(validate_extension("a.jpg").is_ok());
        assert!(validate_extension("a.JPEG").is_ok());
        assert!(validate_extension("a.png").is_ok());
        assert!(matches!(
            validate_extension("a.svg"),
            Err(UploadError::UnsupportedExtension(_))
        ));
        assert!(matches!(
            validate_extension("a.exe"),
            Err(UploadError::UnsupportedExtension(_))
        ));
    }

    #[test]
    fn test_validate_extension_missing() {
        assert!(matches!(
            validate_extension("noextension"),
            Err(UploadError::MissingFilename)
        ));
    }

    #[test]
    fn test_numbered_variant_keeps_extension() {
        assert_eq!(numbered_variant("cat.png", 1), "cat-1.png");
        assert_eq!(numbered_variant("fruit.basket.jpg", 3), "fruit.basket-3.jpg");
    }

    #[tokio::test]
    #[allow(clippy::unwrap_used)]
    async fn test_store_image_suffixes_duplicate_names() {
        let dir = std::env::temp_dir().join(format!(
            "orchard-upload-test-{}",
            std::process::id()
        ));
        let _ = tokio::fs::remove_dir_all(&dir).await;

        let first = store_image(&dir, "cat.png", b"first").await.unwrap();
        let second = store_image(&dir, "cat.png", b"second").await.unwrap();

        assert_eq!(first, "images/products/cat.png");
        assert_eq!(second, "images/products/cat-1.png");

        // Both files exist with their own contents
        let original = tokio::fs::read(dir.join("cat.png")).await.unwrap();
        assert_eq!(original, b"first");
        let suffixed = tokio::fs::read(dir.join("cat-1.png")).await.unwrap();
        assert_eq!(suffixed, b"second");

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }
}
