//! Merge planning: traversal of `origin` and per-entry classification.
//!
//! [`plan_merge`] returns a [`MergePlan`], a pull-based iterator. Each call to
//! `next` pops entries off an explicit work-list until one of them produces an
//! item. Nothing here mutates the filesystem; the only side effect is filling
//! the run's [`HashCache`] when pre-hashing is enabled.

use std::ffi::{OsStr, OsString};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::action::EnumMergeAction;
use crate::hash::{HashCache, is_same_content};
use crate::props::props_for;
use crate::spec::{
    EnumDiagnosticKind, EnumFollowLinksRule, EnumPlanItem, MergeTreeError, SpecMergeDiagnostic,
    SpecMergeError, SpecMergeOptions,
};
use crate::util::{is_overlap, is_same_directory, is_same_file, path_lexists};

const C_GIT_DIR_NAME: &str = ".git";

#[derive(Debug)]
struct SpecQueueEntry {
    path_rel: PathBuf,
    path_origin: PathBuf,
    name: OsString,
    file_type: fs::FileType,
}

impl SpecQueueEntry {
    fn from_dir_entry(entry: &fs::DirEntry, path_rel_parent: &Path) -> io::Result<Self> {
        let name = entry.file_name();
        Ok(Self {
            path_rel: path_rel_parent.join(&name),
            path_origin: entry.path(),
            file_type: entry.file_type()?,
            name,
        })
    }
}

/// Lazy sequence of planned actions and diagnostics for one merge.
///
/// Not rewindable: re-plan by calling [`plan_merge`] again.
#[derive(Debug)]
pub struct MergePlan {
    path_dir_dest: PathBuf,
    spec_merge_options: SpecMergeOptions,
    l_queue: Vec<SpecQueueEntry>,
    hash_cache: Option<HashCache>,
    n_scanned: u64,
    if_aborted: bool,
}

/// Start planning the merge of `dir_origin` into `dir_dest`.
///
/// Validates options and roots, then lists the top level of `dir_origin`.
/// Everything below the top level is inspected lazily while iterating.
pub fn plan_merge<P, Q>(
    dir_origin: P,
    dir_dest: Q,
    spec_merge_options: SpecMergeOptions,
) -> Result<MergePlan, MergeTreeError>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    spec_merge_options.validate()?;

    let path_dir_origin = dir_origin.as_ref().to_path_buf();
    let path_dir_dest = dir_dest.as_ref().to_path_buf();
    if !path_dir_origin.is_dir() {
        return Err(MergeTreeError::OriginNotDirectory(path_dir_origin));
    }
    if !path_dir_dest.is_dir() {
        return Err(MergeTreeError::DestinationNotDirectory(path_dir_dest));
    }
    if is_same_directory(&path_dir_origin, &path_dir_dest) {
        return Err(MergeTreeError::SameDirectory(path_dir_origin));
    }
    if is_overlap(&path_dir_origin, &path_dir_dest) {
        return Err(MergeTreeError::OriginDestinationOverlap {
            origin: path_dir_origin,
            destination: path_dir_dest,
        });
    }

    let l_queue = _list_children(&path_dir_origin, Path::new("")).map_err(|source| {
        MergeTreeError::ReadOrigin {
            path: path_dir_origin.clone(),
            source,
        }
    })?;
    let hash_cache = spec_merge_options.if_use_pre_hash.then(HashCache::new);

    Ok(MergePlan {
        path_dir_dest,
        spec_merge_options,
        l_queue,
        hash_cache,
        n_scanned: 0,
        if_aborted: false,
    })
}

/// Children of `path_dir`, sorted by name descending so that popping yields
/// them in ascending order.
fn _list_children(path_dir: &Path, path_rel: &Path) -> io::Result<Vec<SpecQueueEntry>> {
    let mut l_children = Vec::new();
    for entry_res in fs::read_dir(path_dir)? {
        l_children.push(SpecQueueEntry::from_dir_entry(&entry_res?, path_rel)?);
    }
    l_children.sort_by(|a, b| b.name.cmp(&a.name));
    Ok(l_children)
}

impl MergePlan {
    /// Number of origin entries popped so far.
    pub fn n_scanned(&self) -> u64 {
        self.n_scanned
    }

    /// Whether planning stopped early on an access failure.
    pub fn is_aborted(&self) -> bool {
        self.if_aborted
    }

    /// The run's digest cache, present when pre-hashing is enabled.
    pub fn hash_cache(&self) -> Option<&HashCache> {
        self.hash_cache.as_ref()
    }

    pub fn options(&self) -> &SpecMergeOptions {
        &self.spec_merge_options
    }

    fn _diagnostic(path_rel: &Path, kind: EnumDiagnosticKind) -> Option<EnumPlanItem> {
        Some(EnumPlanItem::Diagnostic(SpecMergeDiagnostic {
            path_rel: path_rel.to_path_buf(),
            kind,
        }))
    }

    fn _removal(&self, path_origin: &Path, path_dest: &Path) -> Option<EnumPlanItem> {
        let action = if self.spec_merge_options.if_set_oldest {
            EnumMergeAction::RemoveAndEqualizeTimes {
                path: path_origin.to_path_buf(),
                path_counterpart: path_dest.to_path_buf(),
            }
        } else {
            EnumMergeAction::Remove {
                path: path_origin.to_path_buf(),
            }
        };
        tracing::debug!(action = %action, "planned");
        Some(EnumPlanItem::Action(action))
    }

    fn _classify(
        &mut self,
        spec_entry: &SpecQueueEntry,
        path_dest: &Path,
    ) -> io::Result<Option<EnumPlanItem>> {
        let path_rel = spec_entry.path_rel.as_path();
        let path_origin = spec_entry.path_origin.as_path();

        if !path_lexists(path_dest)? {
            if self.spec_merge_options.if_remove_only {
                return Ok(Self::_diagnostic(
                    path_rel,
                    EnumDiagnosticKind::MoveSuppressed,
                ));
            }
            let action = EnumMergeAction::Move {
                path_src: path_origin.to_path_buf(),
                path_dst: path_dest.to_path_buf(),
            };
            tracing::debug!(action = %action, "planned");
            return Ok(Some(EnumPlanItem::Action(action)));
        }

        let file_type = spec_entry.file_type;
        if file_type.is_symlink() {
            let meta_dest = fs::symlink_metadata(path_dest)?;
            if !meta_dest.file_type().is_symlink() {
                return Ok(Self::_diagnostic(
                    path_rel,
                    EnumDiagnosticKind::FileTypesDiffer,
                ));
            }
            if is_same_file(path_origin, path_dest, false)? {
                return Ok(Self::_diagnostic(path_rel, EnumDiagnosticKind::SameFile));
            }
            if fs::read_link(path_origin)? == fs::read_link(path_dest)? {
                return Ok(self._removal(path_origin, path_dest));
            }
            return Ok(Self::_diagnostic(
                path_rel,
                EnumDiagnosticKind::MismatchedLink,
            ));
        }

        if file_type.is_dir() {
            return self._expand_directory(spec_entry, path_dest);
        }

        if !file_type.is_file() {
            return Ok(Self::_diagnostic(path_rel, EnumDiagnosticKind::NonFile));
        }

        let if_ignore_subsecond = self.spec_merge_options.if_mtime_ignore_subsecond;
        if !self.spec_merge_options.if_ignore_flags {
            let props_origin = props_for(path_origin, if_ignore_subsecond)?;
            let props_dest = props_for(path_dest, if_ignore_subsecond)?;
            if props_origin != props_dest {
                let props = self
                    .spec_merge_options
                    .if_verbose
                    .then_some((props_origin, props_dest));
                return Ok(Self::_diagnostic(
                    path_rel,
                    EnumDiagnosticKind::FlagsDiffer { props },
                ));
            }
        }

        let meta_dest = fs::symlink_metadata(path_dest)?;
        let file_type_dest = meta_dest.file_type();
        let if_dest_link = file_type_dest.is_symlink();
        let if_dest_dir = file_type_dest.is_dir()
            || (if_dest_link && fs::metadata(path_dest).is_ok_and(|m| m.is_dir()));
        if if_dest_dir {
            return Ok(Self::_diagnostic(
                path_rel,
                EnumDiagnosticKind::FileMatchesDirectory,
            ));
        }

        let if_dest_acceptable = file_type_dest.is_file()
            || (if_dest_link
                && self.spec_merge_options.if_follow_links
                && match self.spec_merge_options.rule_follow_links {
                    EnumFollowLinksRule::Exists => match fs::metadata(path_dest) {
                        Ok(meta_target) => meta_target.is_file(),
                        Err(_) => true,
                    },
                    EnumFollowLinksRule::ResolvesToFile => {
                        fs::metadata(path_dest).is_ok_and(|m| m.is_file())
                    }
                });
        if !if_dest_acceptable {
            return Ok(Self::_diagnostic(
                path_rel,
                EnumDiagnosticKind::FileMatchesNonFile,
            ));
        }

        if is_same_file(path_origin, path_dest, true)? {
            return Ok(Self::_diagnostic(path_rel, EnumDiagnosticKind::SameFile));
        }
        if !is_same_content(path_origin, path_dest, self.hash_cache.as_mut())? {
            return Ok(Self::_diagnostic(
                path_rel,
                EnumDiagnosticKind::ContentDiffers,
            ));
        }
        Ok(self._removal(path_origin, path_dest))
    }

    fn _expand_directory(
        &mut self,
        spec_entry: &SpecQueueEntry,
        path_dest: &Path,
    ) -> io::Result<Option<EnumPlanItem>> {
        let path_rel = spec_entry.path_rel.as_path();
        if self.spec_merge_options.if_ignore_git && spec_entry.name == OsStr::new(C_GIT_DIR_NAME)
        {
            return Ok(Self::_diagnostic(path_rel, EnumDiagnosticKind::GitDirectory));
        }
        if !fs::metadata(path_dest)?.is_dir() {
            return Ok(Self::_diagnostic(
                path_rel,
                EnumDiagnosticKind::DirectoryMatchesNonDirectory,
            ));
        }
        if is_same_file(&spec_entry.path_origin, path_dest, true)? {
            return Ok(Self::_diagnostic(path_rel, EnumDiagnosticKind::SameFile));
        }

        let l_children = _list_children(&spec_entry.path_origin, path_rel)?;
        if self.spec_merge_options.if_ignore_git_worktrees
            && l_children
                .iter()
                .any(|c| c.name == OsStr::new(C_GIT_DIR_NAME))
        {
            return Ok(Self::_diagnostic(path_rel, EnumDiagnosticKind::GitWorktree));
        }

        if let Some(hash_cache) = self.hash_cache.as_mut() {
            // warm in processing order so reads stay sequential on disk
            for spec_child in l_children.iter().rev() {
                if !spec_child.file_type.is_file() {
                    continue;
                }
                if let Err(e) = hash_cache.get_or_hash(&spec_child.path_origin) {
                    tracing::debug!(
                        path = %spec_child.path_origin.display(),
                        error = %e,
                        "pre-hash failed; deferring to content check"
                    );
                }
            }
        }

        tracing::debug!(
            path = %path_rel.display(),
            children = l_children.len(),
            "expanding directory"
        );
        self.l_queue.extend(l_children);
        Ok(None)
    }
}

impl Iterator for MergePlan {
    type Item = EnumPlanItem;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(spec_entry) = self.l_queue.pop() {
            self.n_scanned += 1;
            let path_dest = self.path_dir_dest.join(&spec_entry.path_rel);
            match self._classify(&spec_entry, &path_dest) {
                Ok(Some(item)) => return Some(item),
                Ok(None) => continue,
                Err(e) => {
                    if !self.spec_merge_options.if_continue_on_error {
                        self.l_queue.clear();
                        self.if_aborted = true;
                    }
                    return Some(EnumPlanItem::Failure(SpecMergeError {
                        path_origin: spec_entry.path_origin,
                        path_dest,
                        exception: e.to_string(),
                    }));
                }
            }
        }
        None
    }
}
