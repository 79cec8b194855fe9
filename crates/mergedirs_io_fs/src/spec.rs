//! Merge option models, diagnostics and top-level error types.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::action::EnumMergeAction;
use crate::props::SpecFileProps;

////////////////////////////////////////////////////////////////////////////////
// #region EnumsInit

/// How a destination symlink may stand in for a regular origin file when
/// `if_follow_links` is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnumFollowLinksRule {
    /// The link must resolve to a regular file.
    #[default]
    ResolvesToFile,
    /// Any symlink is accepted unless its target resolves to something other
    /// than a regular file. A dangling target fails at content comparison.
    Exists,
}

/// Reason an origin entry was left untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnumDiagnosticKind {
    /// Entry is missing in destination but `if_remove_only` suppresses the move.
    MoveSuppressed,
    /// Origin is a symlink, destination is not (or vice versa for directories).
    FileTypesDiffer,
    /// Both are symlinks with different targets.
    MismatchedLink,
    /// A `.git` directory skipped by `if_ignore_git`.
    GitDirectory,
    /// A directory holding a `.git` child skipped by `if_ignore_git_worktrees`.
    GitWorktree,
    /// Origin directory matches a destination that is not a directory.
    DirectoryMatchesNonDirectory,
    /// Origin is neither file, directory nor symlink.
    NonFile,
    /// Mode, owner or mtime differ. Props are attached in verbose mode only.
    FlagsDiffer {
        /// `(origin, dest)` snapshots when verbose.
        props: Option<(SpecFileProps, SpecFileProps)>,
    },
    /// Origin file matches a destination directory.
    FileMatchesDirectory,
    /// Origin file matches a destination that is not an acceptable file.
    FileMatchesNonFile,
    /// Both are regular files with different content.
    ContentDiffers,
    /// Destination resolves to the origin entry itself.
    SameFile,
}

impl fmt::Display for EnumDiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MoveSuppressed => write!(f, "Move suppressed (remove-only)"),
            Self::FileTypesDiffer => write!(f, "File types differ"),
            Self::MismatchedLink => write!(f, "Mismatched link"),
            Self::GitDirectory => write!(f, "Skipping .git directory"),
            Self::GitWorktree => write!(f, "Ignoring .git worktree"),
            Self::DirectoryMatchesNonDirectory => write!(f, "Directory matches non-directory"),
            Self::NonFile => write!(f, "Ignoring non-file non-directory"),
            Self::FlagsDiffer { props: None } => write!(f, "Flags differ"),
            Self::FlagsDiffer {
                props: Some((props_origin, props_dest)),
            } => write!(f, "Flags differ ({props_dest} != {props_origin})"),
            Self::FileMatchesDirectory => write!(f, "File matches directory"),
            Self::FileMatchesNonFile => write!(f, "File matches non-file"),
            Self::ContentDiffers => write!(f, "Content differs"),
            Self::SameFile => write!(f, "Destination is the origin entry itself"),
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region StructsAndErrors

/// Input options for `plan_merge` / `merge_tree`.
#[derive(Debug, Clone, Default)]
pub struct SpecMergeOptions {
    /// Skip the mode/uid/gid/mtime comparison.
    pub if_ignore_flags: bool,
    /// Truncate mtime to whole seconds before comparing.
    pub if_mtime_ignore_subsecond: bool,
    /// Skip directories named `.git`.
    pub if_ignore_git: bool,
    /// Skip directories that directly contain a `.git` entry.
    pub if_ignore_git_worktrees: bool,
    /// Never plan moves; only verified removals.
    pub if_remove_only: bool,
    /// Attach extra detail to diagnostics.
    pub if_verbose: bool,
    /// Keep going after access or execution failures.
    pub if_continue_on_error: bool,
    /// Accept a destination symlink as matching a regular origin file.
    pub if_follow_links: bool,
    /// Resolution rule for `if_follow_links`.
    pub rule_follow_links: EnumFollowLinksRule,
    /// Equalize atime/mtime to the oldest of the pair before removing.
    pub if_set_oldest: bool,
    /// Compare through cached digests and warm the cache per directory.
    pub if_use_pre_hash: bool,
    /// Consume the plan without touching the filesystem.
    pub if_dry_run: bool,
}

impl SpecMergeOptions {
    /// Reject option combinations that cannot be honoured.
    pub fn validate(&self) -> Result<(), MergeTreeError> {
        if self.if_set_oldest && !self.if_ignore_flags {
            return Err(MergeTreeError::ConflictingOptions(
                "`set_oldest` does not make sense without `ignore_flags`".to_string(),
            ));
        }
        Ok(())
    }
}

/// One non-fatal reason for leaving an entry untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecMergeDiagnostic {
    /// Path relative to the merge roots.
    pub path_rel: PathBuf,
    /// Why the entry was skipped.
    pub kind: EnumDiagnosticKind,
}

impl fmt::Display for SpecMergeDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.path_rel.display())
    }
}

/// One access or execution failure with both paths and error text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecMergeError {
    /// Origin-side path.
    pub path_origin: PathBuf,
    /// Destination-side path (equal to `path_origin` when there is none).
    pub path_dest: PathBuf,
    /// User-facing error text.
    pub exception: String,
}

impl fmt::Display for SpecMergeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Error accessing `{}`/`{}`: {}",
            self.path_origin.display(),
            self.path_dest.display(),
            self.exception
        )
    }
}

/// One element of the lazy plan sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnumPlanItem {
    /// Deferred filesystem operation.
    Action(EnumMergeAction),
    /// Entry deliberately left alone.
    Diagnostic(SpecMergeDiagnostic),
    /// Entry could not be inspected.
    Failure(SpecMergeError),
}

/// "Top-level call failed" errors (input validation / setup stage).
#[derive(Debug, Error)]
pub enum MergeTreeError {
    /// Options that contradict each other.
    #[error("{0}")]
    ConflictingOptions(String),
    /// Origin path is not a directory.
    #[error("Origin is not a directory: {}", .0.display())]
    OriginNotDirectory(PathBuf),
    /// Destination path is not a directory.
    #[error("Destination is not a directory: {}", .0.display())]
    DestinationNotDirectory(PathBuf),
    /// Origin and destination resolve to the same directory.
    #[error("Origin and destination are the same: {}", .0.display())]
    SameDirectory(PathBuf),
    /// One root is nested inside the other.
    #[error(
        "Origin and destination directories overlap: {} <-> {}",
        .origin.display(),
        .destination.display()
    )]
    OriginDestinationOverlap {
        /// Normalized origin directory.
        origin: PathBuf,
        /// Normalized destination directory.
        destination: PathBuf,
    },
    /// Listing the origin root failed.
    #[error("Failed to read origin {}: {source}", .path.display())]
    ReadOrigin {
        /// Origin root.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
