//! `mergedirs_io_fs` v1:
//! Rust-side directory merge engine.
//!
//! Moves entries that exist only in `origin` into `dest` and removes origin
//! files whose content is verified identical in `dest`. Anything ambiguous is
//! reported and left in place.
//!
//! - `plan`    : lazy traversal and per-entry classification
//! - `hash`    : content-equality oracle, digest cache, tree digest
//! - `action`  : planned operations and how to apply them
//! - `execute` : plan consumption and `merge_tree`
//! - `props`   : file property snapshots
//! - `spec`    : options/diagnostics/errors
//! - `report`  : run-time report model
//! - `util`    : shared helper functions

pub mod action;
pub mod execute;
pub mod hash;
pub mod plan;
pub mod props;
pub mod report;
pub mod spec;
mod util;

pub use action::{EnumMergeAction, set_oldest};
pub use execute::{execute_plan, merge_tree};
pub use hash::{DigestFile, HashCache, hash_file, hash_tree, is_same_content};
pub use plan::{MergePlan, plan_merge};
pub use props::{SpecFileProps, props_for};
pub use report::{ReportMerge, ReportMergeBuilder};
pub use spec::{
    EnumDiagnosticKind, EnumFollowLinksRule, EnumPlanItem, MergeTreeError, SpecMergeDiagnostic,
    SpecMergeError, SpecMergeOptions,
};
