use std::fs;
use std::io;
use std::path::{Path, PathBuf};

////////////////////////////////////////////////////////////////////////////////
// #region PathUtilities

fn _normalize_path(path: &Path) -> PathBuf {
    if let Ok(resolved) = fs::canonicalize(path) {
        return resolved;
    }
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join(path)
}

pub(crate) fn is_same_directory(path_a: &Path, path_b: &Path) -> bool {
    _normalize_path(path_a) == _normalize_path(path_b)
}

pub(crate) fn is_overlap(path_a: &Path, path_b: &Path) -> bool {
    let path_a_resolved = _normalize_path(path_a);
    let path_b_resolved = _normalize_path(path_b);
    path_b_resolved.starts_with(&path_a_resolved) || path_a_resolved.starts_with(&path_b_resolved)
}

/// `lstat`-based existence: a dangling symlink exists.
pub(crate) fn path_lexists(path: &Path) -> io::Result<bool> {
    match fs::symlink_metadata(path) {
        Ok(_) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Whether both paths resolve to the same filesystem object. Symlinks are
/// followed only when `if_follow` is set.
pub(crate) fn is_same_file(path_a: &Path, path_b: &Path, if_follow: bool) -> io::Result<bool> {
    let (stat_a, stat_b) = if if_follow {
        (fs::metadata(path_a)?, fs::metadata(path_b)?)
    } else {
        (fs::symlink_metadata(path_a)?, fs::symlink_metadata(path_b)?)
    };

    #[cfg(unix)]
    {
        use std::os::unix::fs::MetadataExt;
        Ok(stat_a.dev() == stat_b.dev() && stat_a.ino() == stat_b.ino())
    }
    #[cfg(not(unix))]
    {
        let _ = (stat_a, stat_b);
        if !if_follow {
            return Ok(_normalize_path(path_a) == _normalize_path(path_b));
        }
        Ok(fs::canonicalize(path_a)? == fs::canonicalize(path_b)?)
    }
}

pub(crate) fn calculate_worker_limit(num_workers_max: Option<usize>) -> usize {
    let n_cpu = std::thread::available_parallelism()
        .map(|v| v.get())
        .unwrap_or(1);

    match num_workers_max {
        Some(n) => n.clamp(1, n_cpu),
        None => n_cpu.clamp(1, 8),
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region MoveUtilities

/// Rename `path_src` to `path_dst`, copying then deleting when the two live on
/// different filesystems. Refuses to replace an existing destination.
pub(crate) fn move_path(path_src: &Path, path_dst: &Path) -> io::Result<()> {
    if path_lexists(path_dst)? {
        return Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("Destination exists: {}", path_dst.display()),
        ));
    }

    match fs::rename(path_src, path_dst) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            tracing::debug!(
                src = %path_src.display(),
                dst = %path_dst.display(),
                "rename crosses devices; copying"
            );
            _copy_then_remove(path_src, path_dst)
        }
        Err(e) => Err(e),
    }
}

fn _copy_then_remove(path_src: &Path, path_dst: &Path) -> io::Result<()> {
    let file_type = fs::symlink_metadata(path_src)?.file_type();
    if file_type.is_symlink() {
        create_symbolic_link(path_src, path_dst)?;
        fs::remove_file(path_src)
    } else if file_type.is_dir() {
        copy_dir_with_metadata(path_src, path_dst)?;
        fs::remove_dir_all(path_src)
    } else if file_type.is_file() {
        copy_file_with_metadata(path_src, path_dst)?;
        fs::remove_file(path_src)
    } else {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            format!("Cannot move special file: {}", path_src.display()),
        ))
    }
}

/// Copy a directory tree with an explicit work-list. Directory permissions and
/// times are applied after their children, deepest first.
fn copy_dir_with_metadata(path_dir_src: &Path, path_dir_dst: &Path) -> io::Result<()> {
    let mut l_queue = vec![(path_dir_src.to_path_buf(), path_dir_dst.to_path_buf())];
    let mut l_dirs_done: Vec<(PathBuf, PathBuf)> = Vec::new();

    while let Some((path_src, path_dst)) = l_queue.pop() {
        fs::create_dir(&path_dst)?;
        for entry_res in fs::read_dir(&path_src)? {
            let entry = entry_res?;
            let path_child_src = entry.path();
            let path_child_dst = path_dst.join(entry.file_name());
            let file_type = entry.file_type()?;
            if file_type.is_symlink() {
                create_symbolic_link(&path_child_src, &path_child_dst)?;
            } else if file_type.is_dir() {
                l_queue.push((path_child_src, path_child_dst));
            } else if file_type.is_file() {
                copy_file_with_metadata(&path_child_src, &path_child_dst)?;
            } else {
                return Err(io::Error::new(
                    io::ErrorKind::Unsupported,
                    format!("Cannot move special file: {}", path_child_src.display()),
                ));
            }
        }
        l_dirs_done.push((path_src, path_dst));
    }

    for (path_src, path_dst) in l_dirs_done.iter().rev() {
        apply_metadata(path_src, path_dst)?;
    }
    Ok(())
}

pub(crate) fn create_symbolic_link(path_src: &Path, path_dst: &Path) -> io::Result<()> {
    let target = fs::read_link(path_src)?;

    #[cfg(unix)]
    {
        std::os::unix::fs::symlink(&target, path_dst)
    }
    #[cfg(windows)]
    {
        use std::os::windows::fs::{symlink_dir, symlink_file};
        if path_src.is_dir() {
            symlink_dir(&target, path_dst)
        } else {
            symlink_file(&target, path_dst)
        }
    }
    #[cfg(not(any(unix, windows)))]
    {
        let _ = (target, path_dst);
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "Symbolic links are unsupported on this platform",
        ))
    }
}

pub(crate) fn copy_file_with_metadata(
    path_file_src: &Path,
    path_file_dst: &Path,
) -> Result<(), io::Error> {
    fs::copy(path_file_src, path_file_dst)?;
    apply_metadata(path_file_src, path_file_dst)
}

fn apply_metadata(path_src: &Path, path_dst: &Path) -> Result<(), io::Error> {
    use filetime::{FileTime, set_file_times};

    let stat_src = fs::metadata(path_src)?;
    fs::set_permissions(path_dst, stat_src.permissions())?;

    let file_time_access = FileTime::from_last_access_time(&stat_src);
    let file_time_modify = FileTime::from_last_modification_time(&stat_src);
    set_file_times(path_dst, file_time_access, file_time_modify)?;

    #[cfg(target_os = "linux")]
    {
        copy_xattrs_linux(path_src, path_dst);
    }
    Ok(())
}

#[cfg(target_os = "linux")]
fn copy_xattrs_linux(path_src: &Path, path_dst: &Path) {
    let iter_xattr_names = match xattr::list(path_src) {
        Ok(v) => v,
        Err(_) => return,
    };

    for name in iter_xattr_names {
        let Some(raw_value) = xattr::get(path_src, &name).ok().flatten() else {
            continue;
        };
        if let Err(e) = xattr::set(path_dst, &name, &raw_value) {
            tracing::debug!(
                path = %path_dst.display(),
                name = ?name,
                error = %e,
                "failed to copy extended attribute"
            );
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use std::path::Path;

    use tempfile::TempDir;

    use super::{
        _copy_then_remove, calculate_worker_limit, is_overlap, is_same_directory, is_same_file,
        move_path, path_lexists,
    };

    fn write_text(path: &Path, txt: &str) {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create parent");
        }
        std::fs::write(path, txt).expect("write text");
    }

    #[test]
    fn overlap_and_same_directory_detection() {
        let tmp = TempDir::new().expect("tempdir");
        let path_a = tmp.path().join("a");
        let path_b = tmp.path().join("b");
        std::fs::create_dir_all(path_a.join("nested")).expect("mkdir");
        std::fs::create_dir_all(&path_b).expect("mkdir");

        assert!(is_same_directory(&path_a, &tmp.path().join("a/nested/..")));
        assert!(is_overlap(&path_a, &path_a.join("nested")));
        assert!(is_overlap(&path_a.join("nested"), &path_a));
        assert!(!is_overlap(&path_a, &path_b));
    }

    #[test]
    fn worker_limit_is_at_least_one() {
        assert_eq!(calculate_worker_limit(Some(0)), 1);
        assert!(calculate_worker_limit(None) >= 1);
    }

    #[test]
    fn move_path_refuses_existing_destination() {
        let tmp = TempDir::new().expect("tempdir");
        let path_src = tmp.path().join("src.txt");
        let path_dst = tmp.path().join("dst.txt");
        write_text(&path_src, "src");
        write_text(&path_dst, "dst");

        let err = move_path(&path_src, &path_dst).expect_err("must refuse");
        assert_eq!(err.kind(), std::io::ErrorKind::AlreadyExists);
        assert_eq!(std::fs::read_to_string(&path_dst).expect("read"), "dst");
        assert!(path_src.exists());
    }

    #[test]
    fn copy_then_remove_moves_whole_tree() {
        let tmp = TempDir::new().expect("tempdir");
        let path_src = tmp.path().join("src");
        let path_dst = tmp.path().join("dst");
        write_text(&path_src.join("a.txt"), "a");
        write_text(&path_src.join("sub/deeper/b.txt"), "b");

        _copy_then_remove(&path_src, &path_dst).expect("copy then remove");
        assert!(!path_lexists(&path_src).expect("lstat"));
        assert_eq!(
            std::fs::read_to_string(path_dst.join("sub/deeper/b.txt")).expect("read"),
            "b"
        );
        assert_eq!(std::fs::read_to_string(path_dst.join("a.txt")).expect("read"), "a");
    }

    #[cfg(unix)]
    #[test]
    fn copy_then_remove_preserves_symlinks_and_times() {
        use filetime::{FileTime, set_file_mtime};
        use std::os::unix::fs::symlink;

        let tmp = TempDir::new().expect("tempdir");
        let path_src = tmp.path().join("src");
        let path_dst = tmp.path().join("dst");
        write_text(&path_src.join("a.txt"), "a");
        symlink("a.txt", path_src.join("link")).expect("symlink");
        let mtime = FileTime::from_unix_time(1_600_000_000, 0);
        set_file_mtime(path_src.join("a.txt"), mtime).expect("mtime");

        _copy_then_remove(&path_src, &path_dst).expect("copy then remove");
        assert_eq!(
            std::fs::read_link(path_dst.join("link")).expect("readlink"),
            Path::new("a.txt")
        );
        let stat_dst = std::fs::metadata(path_dst.join("a.txt")).expect("stat");
        assert_eq!(FileTime::from_last_modification_time(&stat_dst), mtime);
    }

    #[cfg(unix)]
    #[test]
    fn lexists_sees_dangling_symlink() {
        let tmp = TempDir::new().expect("tempdir");
        let path_link = tmp.path().join("dangling");
        std::os::unix::fs::symlink("missing", &path_link).expect("symlink");
        assert!(path_lexists(&path_link).expect("lstat"));
        assert!(!path_lexists(&tmp.path().join("missing")).expect("lstat"));
    }

    #[cfg(unix)]
    #[test]
    fn same_file_detection_follows_links_on_request() {
        let tmp = TempDir::new().expect("tempdir");
        let path_file = tmp.path().join("real.txt");
        let path_link = tmp.path().join("link.txt");
        let path_other = tmp.path().join("other.txt");
        write_text(&path_file, "x");
        write_text(&path_other, "x");
        std::os::unix::fs::symlink(&path_file, &path_link).expect("symlink");

        assert!(is_same_file(&path_file, &path_link, true).expect("stat"));
        assert!(!is_same_file(&path_file, &path_link, false).expect("lstat"));
        assert!(!is_same_file(&path_file, &path_other, true).expect("stat"));
    }
}
