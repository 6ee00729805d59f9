//! Post-abort reconciliation of on-disk artifacts.
//!
//! Runs after the engine process has been terminated. Cancel wipes every
//! artifact of the transfer; stop-and-save promotes the partial media
//! file to its final name, preserves sidecars and removes the engine's
//! transient lock files. The whole pass retries a bounded number of
//! times while the engine still holds file handles.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

use super::{is_sidecar, LOCK_SUFFIX, PART_SUFFIX};
use crate::domain::AbortAction;

/// Pause before the first pass, letting the engine close its handles.
const GRACE_PERIOD: Duration = Duration::from_millis(500);

const LOCK_RETRY_ATTEMPTS: u32 = 6;
const LOCK_RETRY_DELAY: Duration = Duration::from_millis(500);

/// Reconcile every artifact sharing `prefix` with the requested abort
/// action. Blocking (sleeps between retry passes); callers on an async
/// executor should wrap it in `spawn_blocking`.
///
/// Files still locked after the last pass are left as-is.
pub fn cleanup(directory: &Path, prefix: &str, action: AbortAction) -> String {
    thread::sleep(GRACE_PERIOD);

    for attempt in 0..LOCK_RETRY_ATTEMPTS {
        let mut locked = false;

        for path in matching_artifacts(directory, prefix) {
            let result = match action {
                AbortAction::Cancel => remove_artifact(&path),
                AbortAction::StopAndSave => save_partial(&path),
            };
            match result {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
                    debug!(path = %path.display(), attempt, "artifact still locked");
                    locked = true;
                }
                Err(e) => {
                    // Best effort: a file that vanished mid-pass or a
                    // failed rename is not worth surfacing to the user.
                    debug!(path = %path.display(), error = %e, "cleanup step failed");
                }
            }
        }

        if !locked {
            break;
        }
        thread::sleep(LOCK_RETRY_DELAY);
    }

    match action {
        AbortAction::Cancel => "Cancelled.".to_string(),
        AbortAction::StopAndSave => "Stopped. Saved partials.".to_string(),
    }
}

/// Re-tag bare media files with the partial suffix so the engine's own
/// resume detection picks them up. Idempotent: files that already have a
/// `.part` sibling (or are themselves partial/sidecar/lock files) are
/// left untouched.
pub fn restore_partials(directory: &Path, prefix: &str) {
    for path in matching_artifacts(directory, prefix) {
        let name = match path.file_name() {
            Some(n) => n.to_string_lossy().into_owned(),
            None => continue,
        };
        if name.ends_with(PART_SUFFIX) || name.ends_with(LOCK_SUFFIX) || is_sidecar(&name) {
            continue;
        }

        let part_path = directory.join(format!("{}{}", name, PART_SUFFIX));
        if part_path.exists() {
            continue;
        }
        if let Err(e) = fs::rename(&path, &part_path) {
            warn!(path = %path.display(), error = %e, "failed to re-tag partial");
        }
    }
}

/// Every file in `directory` whose name begins with `prefix`.
fn matching_artifacts(directory: &Path, prefix: &str) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(directory) else {
        return Vec::new();
    };
    entries
        .flatten()
        .filter(|entry| entry.file_name().to_string_lossy().starts_with(prefix))
        .map(|entry| entry.path())
        .collect()
}

fn remove_artifact(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

/// Stop-and-save policy for a single artifact: promote partial media,
/// keep sidecars, drop the engine's lock files, ignore the rest.
fn save_partial(path: &Path) -> io::Result<()> {
    let name = match path.file_name() {
        Some(n) => n.to_string_lossy().into_owned(),
        None => return Ok(()),
    };

    if let Some(stripped) = name.strip_suffix(PART_SUFFIX) {
        let target = path.with_file_name(stripped);
        if target.exists() {
            fs::remove_file(&target)?;
        }
        fs::rename(path, &target)?;
    } else if is_sidecar(&name) {
        // Thumbnails, descriptions and metadata stay.
    } else if name.ends_with(LOCK_SUFFIX) {
        fs::remove_file(path)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::TempDir;

    fn touch(dir: &TempDir, name: &str) {
        File::create(dir.path().join(name)).unwrap();
    }

    fn write(dir: &TempDir, name: &str, contents: &str) {
        let mut f = File::create(dir.path().join(name)).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
    }

    fn listing(dir: &TempDir) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .flatten()
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_cancel_removes_everything() {
        let dir = TempDir::new().unwrap();
        touch(&dir, "clip.mp4.part");
        touch(&dir, "clip.jpg");
        touch(&dir, "clip.info.json");

        let msg = cleanup(dir.path(), "clip", AbortAction::Cancel);
        assert_eq!(msg, "Cancelled.");
        assert!(listing(&dir).is_empty());
    }

    #[test]
    fn test_cancel_leaves_unrelated_files_alone() {
        let dir = TempDir::new().unwrap();
        touch(&dir, "clip.mp4.part");
        touch(&dir, "other.mp4");

        cleanup(dir.path(), "clip", AbortAction::Cancel);
        assert_eq!(listing(&dir), vec!["other.mp4"]);
    }

    #[test]
    fn test_stop_and_save_promotes_partial_and_keeps_sidecar() {
        let dir = TempDir::new().unwrap();
        touch(&dir, "clip.mp4.part");
        touch(&dir, "clip.jpg");

        let msg = cleanup(dir.path(), "clip", AbortAction::StopAndSave);
        assert_eq!(msg, "Stopped. Saved partials.");
        assert_eq!(listing(&dir), vec!["clip.jpg", "clip.mp4"]);
    }

    #[test]
    fn test_stop_and_save_overwrites_stale_target() {
        let dir = TempDir::new().unwrap();
        write(&dir, "clip.mp4", "stale");
        write(&dir, "clip.mp4.part", "fresh");

        cleanup(dir.path(), "clip", AbortAction::StopAndSave);
        assert_eq!(listing(&dir), vec!["clip.mp4"]);
        assert_eq!(
            fs::read_to_string(dir.path().join("clip.mp4")).unwrap(),
            "fresh"
        );
    }

    #[test]
    fn test_stop_and_save_deletes_lock_file() {
        let dir = TempDir::new().unwrap();
        touch(&dir, "clip.mp4.ytdl");
        touch(&dir, "clip.mp4.part");

        cleanup(dir.path(), "clip", AbortAction::StopAndSave);
        assert_eq!(listing(&dir), vec!["clip.mp4"]);
    }

    #[test]
    fn test_stop_and_save_ignores_completed_media() {
        let dir = TempDir::new().unwrap();
        touch(&dir, "clip.mp4");

        cleanup(dir.path(), "clip", AbortAction::StopAndSave);
        assert_eq!(listing(&dir), vec!["clip.mp4"]);
    }

    #[test]
    fn test_restore_partials_retags_bare_media() {
        let dir = TempDir::new().unwrap();
        touch(&dir, "clip.mp4");
        touch(&dir, "clip.jpg");

        restore_partials(dir.path(), "clip");
        assert_eq!(listing(&dir), vec!["clip.jpg", "clip.mp4.part"]);
    }

    #[test]
    fn test_restore_partials_is_idempotent() {
        let dir = TempDir::new().unwrap();
        touch(&dir, "clip.mp4");
        touch(&dir, "clip.webp");

        restore_partials(dir.path(), "clip");
        let first = listing(&dir);
        restore_partials(dir.path(), "clip");
        assert_eq!(first, listing(&dir));
        assert_eq!(first, vec!["clip.mp4.part", "clip.webp"]);
    }

    #[test]
    fn test_restore_partials_skips_existing_part_sibling() {
        let dir = TempDir::new().unwrap();
        write(&dir, "clip.mp4", "done");
        write(&dir, "clip.mp4.part", "partial");

        restore_partials(dir.path(), "clip");
        // The bare file must not clobber the existing partial.
        assert_eq!(listing(&dir), vec!["clip.mp4", "clip.mp4.part"]);
        assert_eq!(
            fs::read_to_string(dir.path().join("clip.mp4.part")).unwrap(),
            "partial"
        );
    }
}
