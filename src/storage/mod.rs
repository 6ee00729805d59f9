//! On-disk artifact handling: filename allocation before a transfer and
//! artifact reconciliation after an aborted one.

pub mod allocator;
pub mod reconciler;

/// Suffix the engine gives an in-progress media file.
pub const PART_SUFFIX: &str = ".part";

/// Transient lock/index file owned by the engine while a download runs.
pub const LOCK_SUFFIX: &str = ".ytdl";

/// Byproduct files that accompany a download but are not the media
/// payload. Classification is by final extension, case-insensitive.
const SIDECAR_SUFFIXES: &[&str] = &[
    ".webp",
    ".jpg",
    ".png",
    ".description",
    ".info.json",
    ".txt",
];

/// True for thumbnails, descriptions and metadata files. These never
/// count as filename collisions and are preserved by stop-and-save.
pub fn is_sidecar(file_name: &str) -> bool {
    let lower = file_name.to_lowercase();
    SIDECAR_SUFFIXES.iter().any(|s| lower.ends_with(s))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sidecar_classification() {
        assert!(is_sidecar("clip.jpg"));
        assert!(is_sidecar("clip.INFO.JSON"));
        assert!(is_sidecar("clip.description"));
        assert!(!is_sidecar("clip.mp4"));
        assert!(!is_sidecar("clip.mp4.part"));
        assert!(!is_sidecar("clip.ytdl"));
    }
}
