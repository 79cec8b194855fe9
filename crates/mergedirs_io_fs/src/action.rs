//! Deferred filesystem operations produced by the planner.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use filetime::{FileTime, set_file_times, set_symlink_file_times};

use crate::util::move_path;

/// One planned operation. Holds only the paths it needs, never open handles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnumMergeAction {
    /// Move an origin entry that is missing in destination.
    Move {
        /// Origin path.
        path_src: PathBuf,
        /// Mirrored destination path.
        path_dst: PathBuf,
    },
    /// Delete a verified duplicate from origin.
    Remove {
        /// Origin path.
        path: PathBuf,
    },
    /// Set both copies to the oldest atime/mtime, then delete the origin copy.
    RemoveAndEqualizeTimes {
        /// Origin path.
        path: PathBuf,
        /// Destination copy that survives.
        path_counterpart: PathBuf,
    },
}

impl EnumMergeAction {
    /// Apply the operation to the filesystem.
    pub fn apply(&self) -> io::Result<()> {
        match self {
            Self::Move { path_src, path_dst } => move_path(path_src, path_dst),
            Self::Remove { path } => fs::remove_file(path),
            Self::RemoveAndEqualizeTimes {
                path,
                path_counterpart,
            } => {
                set_oldest(path, path_counterpart)?;
                fs::remove_file(path)
            }
        }
    }

    /// Origin-side path this action consumes.
    pub fn path_origin(&self) -> &Path {
        match self {
            Self::Move { path_src, .. } => path_src,
            Self::Remove { path } | Self::RemoveAndEqualizeTimes { path, .. } => path,
        }
    }

    /// Destination-side path the action refers to, if any.
    pub fn path_counterpart(&self) -> Option<&Path> {
        match self {
            Self::Move { path_dst, .. } => Some(path_dst),
            Self::Remove { .. } => None,
            Self::RemoveAndEqualizeTimes {
                path_counterpart, ..
            } => Some(path_counterpart),
        }
    }

    pub fn is_removal(&self) -> bool {
        !matches!(self, Self::Move { .. })
    }
}

impl fmt::Display for EnumMergeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Move { path_src, path_dst } => {
                write!(f, "mv {} {}", path_src.display(), path_dst.display())
            }
            Self::Remove { path } => write!(f, "rm {}", path.display()),
            Self::RemoveAndEqualizeTimes {
                path,
                path_counterpart,
            } => write!(
                f,
                "rm {} (times set to oldest with {})",
                path.display(),
                path_counterpart.display()
            ),
        }
    }
}

/// Set atime and mtime of both paths to the older of each pair.
///
/// Symlinks are stamped themselves rather than their targets.
pub fn set_oldest(path_a: &Path, path_b: &Path) -> io::Result<()> {
    let stat_a = fs::symlink_metadata(path_a)?;
    let stat_b = fs::symlink_metadata(path_b)?;

    let atime_a = FileTime::from_last_access_time(&stat_a);
    let atime_b = FileTime::from_last_access_time(&stat_b);
    let mtime_a = FileTime::from_last_modification_time(&stat_a);
    let mtime_b = FileTime::from_last_modification_time(&stat_b);
    if atime_a == atime_b && mtime_a == mtime_b {
        return Ok(());
    }

    let atime = atime_a.min(atime_b);
    let mtime = mtime_a.min(mtime_b);
    for (path, stat) in [(path_a, &stat_a), (path_b, &stat_b)] {
        if stat.file_type().is_symlink() {
            set_symlink_file_times(path, atime, mtime)?;
        } else {
            set_file_times(path, atime, mtime)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use filetime::{FileTime, set_file_times};
    use tempfile::TempDir;

    use super::{EnumMergeAction, set_oldest};

    fn write_text(path: &Path, txt: &str) {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create parent");
        }
        std::fs::write(path, txt).expect("write text");
    }

    fn times_of(path: &Path) -> (FileTime, FileTime) {
        let stat = std::fs::metadata(path).expect("stat");
        (
            FileTime::from_last_access_time(&stat),
            FileTime::from_last_modification_time(&stat),
        )
    }

    #[test]
    fn set_oldest_takes_minimum_of_each_time() {
        let tmp = TempDir::new().expect("tempdir");
        let path_a = tmp.path().join("a");
        let path_b = tmp.path().join("b");
        write_text(&path_a, "x");
        write_text(&path_b, "x");
        set_file_times(
            &path_a,
            FileTime::from_unix_time(1_000, 0),
            FileTime::from_unix_time(5_000, 0),
        )
        .expect("times");
        set_file_times(
            &path_b,
            FileTime::from_unix_time(3_000, 0),
            FileTime::from_unix_time(2_000, 0),
        )
        .expect("times");

        set_oldest(&path_a, &path_b).expect("set oldest");
        let expected = (
            FileTime::from_unix_time(1_000, 0),
            FileTime::from_unix_time(2_000, 0),
        );
        assert_eq!(times_of(&path_a), expected);
        assert_eq!(times_of(&path_b), expected);
    }

    #[test]
    fn remove_and_equalize_keeps_counterpart_with_oldest_mtime() {
        let tmp = TempDir::new().expect("tempdir");
        let path_origin = tmp.path().join("origin/f");
        let path_dest = tmp.path().join("dest/f");
        write_text(&path_origin, "same");
        write_text(&path_dest, "same");
        let mtime_old = FileTime::from_unix_time(1_500_000_000, 0);
        set_file_times(&path_origin, mtime_old, mtime_old).expect("times");

        let action = EnumMergeAction::RemoveAndEqualizeTimes {
            path: path_origin.clone(),
            path_counterpart: path_dest.clone(),
        };
        action.apply().expect("apply");

        assert!(!path_origin.exists());
        assert_eq!(times_of(&path_dest).1, mtime_old);
    }

    #[test]
    fn move_and_remove_apply_and_describe() {
        let tmp = TempDir::new().expect("tempdir");
        let path_src = tmp.path().join("origin/a.txt");
        let path_dst = tmp.path().join("dest/a.txt");
        write_text(&path_src, "a");
        std::fs::create_dir_all(tmp.path().join("dest")).expect("mkdir");

        let action_move = EnumMergeAction::Move {
            path_src: path_src.clone(),
            path_dst: path_dst.clone(),
        };
        assert!(action_move.to_string().starts_with("mv "));
        assert!(!action_move.is_removal());
        action_move.apply().expect("move");
        assert!(!path_src.exists());
        assert!(path_dst.exists());

        let action_remove = EnumMergeAction::Remove {
            path: path_dst.clone(),
        };
        assert_eq!(action_remove.path_origin(), path_dst.as_path());
        action_remove.apply().expect("remove");
        assert!(!path_dst.exists());

        let err = action_remove.apply().expect_err("second remove fails");
        assert_eq!(err.kind(), std::io::ErrorKind::NotFound);
    }
}
