//! Collision-avoiding filename allocation.
//!
//! A slot counts as taken only when a *media* file occupies it. Leftover
//! thumbnails or metadata from a crashed run do not block the name, so a
//! retry lands on the same slot instead of "title (1)".

use std::fs;
use std::path::Path;

use super::is_sidecar;

/// Determine the final base name for a transfer.
///
/// Resume trusts the saved name and performs no directory access at all.
/// A fresh start probes `base_name`, then `"base_name (1)"`,
/// `"base_name (2)"`, ... until a free slot is found.
pub fn resolve(directory: &Path, base_name: &str, is_resume: bool) -> String {
    if is_resume {
        return base_name.to_string();
    }

    if !is_taken(directory, base_name) {
        return base_name.to_string();
    }

    let mut counter: u64 = 1;
    loop {
        let candidate = format!("{} ({})", base_name, counter);
        if !is_taken(directory, &candidate) {
            return candidate;
        }
        counter += 1;
    }
}

/// A candidate is taken iff some file named `candidate.<anything>` exists
/// whose extension is not in the sidecar set.
fn is_taken(directory: &Path, candidate: &str) -> bool {
    let needle = format!("{}.", candidate);
    let Ok(entries) = fs::read_dir(directory) else {
        return false;
    };
    entries.flatten().any(|entry| {
        let name = entry.file_name().to_string_lossy().into_owned();
        name.starts_with(&needle) && !is_sidecar(&name)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use tempfile::TempDir;

    fn touch(dir: &TempDir, name: &str) {
        File::create(dir.path().join(name)).unwrap();
    }

    #[test]
    fn test_empty_directory_keeps_base_name() {
        let dir = TempDir::new().unwrap();
        assert_eq!(resolve(dir.path(), "clip", false), "clip");
    }

    #[test]
    fn test_media_collision_probes_upward() {
        let dir = TempDir::new().unwrap();
        touch(&dir, "clip.mp4");
        assert_eq!(resolve(dir.path(), "clip", false), "clip (1)");

        touch(&dir, "clip (1).mkv");
        assert_eq!(resolve(dir.path(), "clip", false), "clip (2)");
    }

    #[test]
    fn test_partial_media_counts_as_taken() {
        let dir = TempDir::new().unwrap();
        touch(&dir, "clip.mp4.part");
        assert_eq!(resolve(dir.path(), "clip", false), "clip (1)");
    }

    #[test]
    fn test_sidecar_only_slot_is_free() {
        let dir = TempDir::new().unwrap();
        touch(&dir, "clip.jpg");
        touch(&dir, "clip.info.json");
        assert_eq!(resolve(dir.path(), "clip", false), "clip");
    }

    #[test]
    fn test_resume_returns_input_unchanged() {
        let dir = TempDir::new().unwrap();
        touch(&dir, "clip.mp4");
        touch(&dir, "clip.mp4.part");
        assert_eq!(resolve(dir.path(), "clip", true), "clip");
    }

    #[test]
    fn test_prefix_sharing_names_do_not_collide() {
        // "clip extended.mp4" starts with "clip" but not with "clip.",
        // so it must not block the "clip" slot.
        let dir = TempDir::new().unwrap();
        touch(&dir, "clip extended.mp4");
        assert_eq!(resolve(dir.path(), "clip", false), "clip");
    }

    #[test]
    fn test_missing_directory_is_treated_as_free() {
        let dir = TempDir::new().unwrap();
        let gone = dir.path().join("nope");
        assert_eq!(resolve(&gone, "clip", false), "clip");
    }
}
