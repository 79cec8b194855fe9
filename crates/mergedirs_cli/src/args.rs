//! Command-line arguments.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use mergedirs_io_fs::{EnumFollowLinksRule, SpecMergeOptions};

use crate::logging::EnumLogFormat;

/// What to do with the positional paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EnumMode {
    /// Merge `<origin>` into `<dest>`.
    Merge,
    /// Print a recursive digest for each directory.
    Hash,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EnumFollowLinksArg {
    ResolvesToFile,
    Exists,
}

impl From<EnumFollowLinksArg> for EnumFollowLinksRule {
    fn from(value: EnumFollowLinksArg) -> Self {
        match value {
            EnumFollowLinksArg::ResolvesToFile => Self::ResolvesToFile,
            EnumFollowLinksArg::Exists => Self::Exists,
        }
    }
}

/// Merge directories without losing files.
///
/// `mergedirs <origin> <dest>` moves what is missing from dest and removes
/// verified duplicates from origin. `mergedirs --mode=hash <dir>...` hashes
/// directories recursively.
#[derive(Debug, Parser)]
#[command(name = "mergedirs", version)]
pub struct Args {
    #[arg(long, value_enum, default_value_t = EnumMode::Merge)]
    pub mode: EnumMode,

    /// Do not compare mode, owner and mtime.
    #[arg(long)]
    pub ignore_flags: bool,

    /// Ignore sub-second differences in mtime.
    #[arg(long = "mtime-ignore-subsecond")]
    pub mtime_ignore_subsecond: bool,

    /// Ignore .git directories.
    #[arg(long)]
    pub ignore_git: bool,

    /// Ignore directories containing a .git entry.
    #[arg(long)]
    pub ignore_git_worktrees: bool,

    /// Only remove files.
    #[arg(long)]
    pub remove_only: bool,

    #[arg(long, short)]
    pub verbose: bool,

    /// Continue on error(s).
    #[arg(long, visible_alias = "keep-going")]
    pub continue_on_error: bool,

    /// Follow links to content (destination).
    #[arg(long)]
    pub follow_links: bool,

    /// What a followed destination link must resolve to.
    #[arg(long, value_enum, default_value_t = EnumFollowLinksArg::ResolvesToFile)]
    pub follow_links_rule: EnumFollowLinksArg,

    /// Set mtime & atime to oldest of origin/destination.
    #[arg(long)]
    pub set_oldest: bool,

    /// Use pre-hashing. Often useful for large files on magnetic disks as it
    /// reads the data in a nicer pattern, at the cost of reading every input
    /// file.
    #[arg(long)]
    pub use_pre_hash: bool,

    /// Report what would be done without touching anything.
    #[arg(long, short = 'n')]
    pub dry_run: bool,

    /// Maximum worker threads for hash mode.
    #[arg(long)]
    pub num_workers_max: Option<usize>,

    #[arg(long, value_enum, default_value_t = EnumLogFormat::Text)]
    pub log_format: EnumLogFormat,

    #[arg(required = true)]
    pub paths: Vec<PathBuf>,
}

impl Args {
    pub fn to_merge_options(&self) -> SpecMergeOptions {
        SpecMergeOptions {
            if_ignore_flags: self.ignore_flags,
            if_mtime_ignore_subsecond: self.mtime_ignore_subsecond,
            if_ignore_git: self.ignore_git,
            if_ignore_git_worktrees: self.ignore_git_worktrees,
            if_remove_only: self.remove_only,
            if_verbose: self.verbose,
            if_continue_on_error: self.continue_on_error,
            if_follow_links: self.follow_links,
            rule_follow_links: self.follow_links_rule.into(),
            if_set_oldest: self.set_oldest,
            if_use_pre_hash: self.use_pre_hash,
            if_dry_run: self.dry_run,
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use mergedirs_io_fs::EnumFollowLinksRule;

    use super::{Args, EnumMode};

    #[test]
    fn defaults_to_merge_mode() {
        let args = Args::try_parse_from(["mergedirs", "a", "b"]).expect("parse");
        assert_eq!(args.mode, EnumMode::Merge);
        assert_eq!(args.paths.len(), 2);
        let spec_merge_options = args.to_merge_options();
        assert!(!spec_merge_options.if_ignore_flags);
        assert_eq!(
            spec_merge_options.rule_follow_links,
            EnumFollowLinksRule::ResolvesToFile
        );
    }

    #[test]
    fn keep_going_is_an_alias() {
        let args = Args::try_parse_from(["mergedirs", "--keep-going", "a", "b"]).expect("parse");
        assert!(args.to_merge_options().if_continue_on_error);
    }

    #[test]
    fn flags_map_onto_options() {
        let args = Args::try_parse_from([
            "mergedirs",
            "--ignore-flags",
            "--set-oldest",
            "--use-pre-hash",
            "--follow-links",
            "--follow-links-rule",
            "exists",
            "--mtime-ignore-subsecond",
            "a",
            "b",
        ])
        .expect("parse");
        let spec_merge_options = args.to_merge_options();
        assert!(spec_merge_options.if_ignore_flags);
        assert!(spec_merge_options.if_set_oldest);
        assert!(spec_merge_options.if_use_pre_hash);
        assert!(spec_merge_options.if_follow_links);
        assert!(spec_merge_options.if_mtime_ignore_subsecond);
        assert_eq!(
            spec_merge_options.rule_follow_links,
            EnumFollowLinksRule::Exists
        );
    }

    #[test]
    fn hash_mode_parses() {
        let args =
            Args::try_parse_from(["mergedirs", "--mode=hash", "x", "y", "z"]).expect("parse");
        assert_eq!(args.mode, EnumMode::Hash);
        assert_eq!(args.paths.len(), 3);
    }
}
