//! Content-equality oracle: file digests, the per-run hash cache and
//! direct byte-stream comparison.

use std::collections::HashMap;
use std::ffi::OsString;
use std::fmt;
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use md5::{Digest, Md5};
use rayon::ThreadPoolBuilder;
use rayon::prelude::*;

use crate::util::calculate_worker_limit;

/// Read size for streaming a file through the digest.
const N_HASH_CHUNK_SIZE: usize = 4096;
/// Read size for each side of a direct comparison.
const N_COMPARE_CHUNK_SIZE: usize = 8192 * 1024;

////////////////////////////////////////////////////////////////////////////////
// #region Digest

/// 128-bit content digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DigestFile([u8; 16]);

impl DigestFile {
    /// Lowercase hex rendering.
    pub fn to_hex(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for DigestFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

fn _finalize(hasher: Md5) -> DigestFile {
    let mut bytes = [0_u8; 16];
    bytes.copy_from_slice(&hasher.finalize());
    DigestFile(bytes)
}

/// Digest the content of `path` by streaming fixed-size reads.
pub fn hash_file(path: &Path) -> io::Result<DigestFile> {
    let mut file = File::open(path)?;
    let mut hasher = Md5::new();
    let mut buf = [0_u8; N_HASH_CHUNK_SIZE];
    loop {
        match file.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => hasher.update(&buf[..n]),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(_finalize(hasher))
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region HashCache

/// Path -> digest map scoped to one merge run.
///
/// Entries are never invalidated; a cached file must not change before its
/// planned action runs.
#[derive(Debug, Default)]
pub struct HashCache {
    dict_digests: HashMap<PathBuf, DigestFile>,
}

impl HashCache {
    /// Empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached digest for `path`, hashing it on first access.
    pub fn get_or_hash(&mut self, path: &Path) -> io::Result<DigestFile> {
        if let Some(digest) = self.dict_digests.get(path) {
            return Ok(*digest);
        }
        let digest = hash_file(path)?;
        self.dict_digests.insert(path.to_path_buf(), digest);
        Ok(digest)
    }

    /// Whether `path` has already been hashed.
    pub fn contains(&self, path: &Path) -> bool {
        self.dict_digests.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.dict_digests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dict_digests.is_empty()
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Equality

/// Decide whether two regular files hold identical bytes.
///
/// With a cache, both digests are looked up (or computed) and compared.
/// Without one, both files are streamed side by side and compared chunk for
/// chunk, stopping at the first difference.
pub fn is_same_content(
    path_file_a: &Path,
    path_file_b: &Path,
    hash_cache: Option<&mut HashCache>,
) -> io::Result<bool> {
    if let Some(hash_cache) = hash_cache {
        let digest_a = hash_cache.get_or_hash(path_file_a)?;
        let digest_b = hash_cache.get_or_hash(path_file_b)?;
        return Ok(digest_a == digest_b);
    }
    compare_bytes(path_file_a, path_file_b)
}

fn compare_bytes(path_file_a: &Path, path_file_b: &Path) -> io::Result<bool> {
    let mut file_a = File::open(path_file_a)?;
    let mut file_b = File::open(path_file_b)?;
    if file_a.metadata()?.len() != file_b.metadata()?.len() {
        return Ok(false);
    }

    let mut buf_a = vec![0_u8; N_COMPARE_CHUNK_SIZE];
    let mut buf_b = vec![0_u8; N_COMPARE_CHUNK_SIZE];
    loop {
        let n_a = _read_full(&mut file_a, &mut buf_a)?;
        let n_b = _read_full(&mut file_b, &mut buf_b)?;
        if buf_a[..n_a] != buf_b[..n_b] {
            return Ok(false);
        }
        if n_a == 0 {
            return Ok(true);
        }
    }
}

/// Fill `buf` until it is full or the reader is exhausted.
fn _read_full(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut n_filled = 0;
    while n_filled < buf.len() {
        match reader.read(&mut buf[n_filled..]) {
            Ok(0) => break,
            Ok(n) => n_filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(n_filled)
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region TreeDigest

#[derive(Debug)]
enum EnumTreeChild {
    Link(PathBuf),
    Dir,
    File,
}

/// Stable fingerprint of a whole directory tree.
///
/// Children are folded in name order: directories by their recursive digest,
/// files by their content digest, symlinks as `link` followed by the target.
/// Entry names themselves are not part of the digest. File digests inside one
/// directory are computed on a bounded rayon pool.
pub fn hash_tree(path_dir: &Path, num_workers_max: Option<usize>) -> io::Result<DigestFile> {
    let n_workers_max = calculate_worker_limit(num_workers_max);
    if n_workers_max <= 1 {
        return _hash_dir(path_dir, false);
    }

    match ThreadPoolBuilder::new().num_threads(n_workers_max).build() {
        Ok(thread_pool) => thread_pool.install(|| _hash_dir(path_dir, true)),
        Err(e) => {
            tracing::warn!(
                workers = n_workers_max,
                error = %e,
                "failed to initialize thread pool; hashing serially"
            );
            _hash_dir(path_dir, false)
        }
    }
}

fn _hash_dir(path_dir: &Path, if_parallel: bool) -> io::Result<DigestFile> {
    let mut l_children: Vec<(OsString, PathBuf, EnumTreeChild)> = Vec::new();
    for entry_res in fs::read_dir(path_dir)? {
        let entry = entry_res?;
        let path_entry = entry.path();
        let file_type = entry.file_type()?;
        let kind = if file_type.is_symlink() {
            EnumTreeChild::Link(fs::read_link(&path_entry)?)
        } else if file_type.is_dir() {
            EnumTreeChild::Dir
        } else if file_type.is_file() {
            EnumTreeChild::File
        } else {
            return Err(io::Error::other(format!(
                "Cannot handle files such as `{}`",
                path_entry.display()
            )));
        };
        l_children.push((entry.file_name(), path_entry, kind));
    }
    l_children.sort_by(|a, b| a.0.cmp(&b.0));

    let hash_child_file = |(_, path_child, kind): &(OsString, PathBuf, EnumTreeChild)| match kind
    {
        EnumTreeChild::File => Some(hash_file(path_child)),
        _ => None,
    };
    let l_file_digests: Vec<Option<io::Result<DigestFile>>> = if if_parallel {
        l_children.par_iter().map(hash_child_file).collect()
    } else {
        l_children.iter().map(hash_child_file).collect()
    };

    let mut hasher = Md5::new();
    for ((_, path_child, kind), digest_file) in l_children.iter().zip(l_file_digests) {
        match kind {
            EnumTreeChild::Link(target) => {
                hasher.update(b"link");
                hasher.update(_os_bytes(target.as_os_str()));
            }
            EnumTreeChild::Dir => {
                let digest_dir = _hash_dir(path_child, if_parallel)?;
                hasher.update(digest_dir.to_hex().as_bytes());
            }
            EnumTreeChild::File => {
                if let Some(digest_file) = digest_file {
                    hasher.update(digest_file?.to_hex().as_bytes());
                }
            }
        }
    }
    Ok(_finalize(hasher))
}

#[cfg(unix)]
fn _os_bytes(value: &std::ffi::OsStr) -> Vec<u8> {
    use std::os::unix::ffi::OsStrExt;
    value.as_bytes().to_vec()
}

#[cfg(not(unix))]
fn _os_bytes(value: &std::ffi::OsStr) -> Vec<u8> {
    value.to_string_lossy().into_owned().into_bytes()
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
