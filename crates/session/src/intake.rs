use std::path::Path;

use crate::attachment::{ImageKind, IncomingImage};

/// Reads dropped or picked files, keeping only readable images.
///
/// Non-image and unreadable files are skipped; intake never fails.
pub fn load_images<P: AsRef<Path>>(paths: impl IntoIterator<Item = P>) -> Vec<IncomingImage> {
    paths
        .into_iter()
        .filter_map(|path| load_image(path.as_ref()))
        .collect()
}

fn load_image(path: &Path) -> Option<IncomingImage> {
    let Some(kind) = ImageKind::from_path(path) else {
        tracing::debug!(path = %path.display(), "skipping non-image file");
        return None;
    };

    match std::fs::read(path) {
        Ok(bytes) => Some(IncomingImage::new(display_name(path), kind, bytes)),
        Err(error) => {
            tracing::warn!(path = %path.display(), "failed to read dropped image: {error}");
            None
        }
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
