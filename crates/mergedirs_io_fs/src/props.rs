//! File property snapshots used by the flags check.

use std::fmt;
use std::fs;
use std::io;
use std::path::Path;

use filetime::FileTime;

/// Immutable `{mode, uid, gid, mtime}` snapshot of one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SpecFileProps {
    /// Full `st_mode` (type + permission bits).
    pub mode: u32,
    /// Owner uid.
    pub uid: u32,
    /// Owner gid.
    pub gid: u32,
    /// Modification time, possibly truncated to whole seconds.
    pub mtime: FileTime,
}

impl SpecFileProps {
    /// Build a snapshot from already-fetched metadata.
    pub fn from_metadata(meta: &fs::Metadata, if_ignore_subsecond: bool) -> Self {
        let mut mtime = FileTime::from_last_modification_time(meta);
        if if_ignore_subsecond {
            mtime = FileTime::from_unix_time(mtime.unix_seconds(), 0);
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::MetadataExt;
            Self {
                mode: meta.mode(),
                uid: meta.uid(),
                gid: meta.gid(),
                mtime,
            }
        }
        #[cfg(not(unix))]
        {
            Self {
                mode: if meta.permissions().readonly() { 0o444 } else { 0o666 },
                uid: 0,
                gid: 0,
                mtime,
            }
        }
    }
}

impl fmt::Display for SpecFileProps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "mode={:o} uid={} gid={} mtime={}.{:09}",
            self.mode,
            self.uid,
            self.gid,
            self.mtime.unix_seconds(),
            self.mtime.nanoseconds()
        )
    }
}

/// Stat `path` (following symlinks) and snapshot its props.
pub fn props_for(path: &Path, if_ignore_subsecond: bool) -> io::Result<SpecFileProps> {
    let meta = fs::metadata(path)?;
    Ok(SpecFileProps::from_metadata(&meta, if_ignore_subsecond))
}
