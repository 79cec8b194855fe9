//! Plan execution: pulls items one at a time and applies actions.

use std::path::Path;

use crate::plan::plan_merge;
use crate::report::{ReportMerge, ReportMergeBuilder};
use crate::spec::{EnumPlanItem, MergeTreeError, SpecMergeError, SpecMergeOptions};

/// Consume plan items, applying each action as it arrives.
///
/// A failed action is recorded with its description; the run then continues
/// or stops per `if_continue_on_error`. Diagnostics and planner failures are
/// recorded as they stream by. With `if_dry_run` nothing is applied and every
/// action counts as skipped.
pub fn execute_plan<I>(iter_items: I, spec_merge_options: &SpecMergeOptions) -> ReportMerge
where
    I: IntoIterator<Item = EnumPlanItem>,
{
    let mut builder_merge_report = ReportMergeBuilder::default();
    _apply_items(iter_items, spec_merge_options, &mut builder_merge_report);
    builder_merge_report.build()
}

fn _apply_items<I>(
    iter_items: I,
    spec_merge_options: &SpecMergeOptions,
    builder_merge_report: &mut ReportMergeBuilder,
) where
    I: IntoIterator<Item = EnumPlanItem>,
{
    for item in iter_items {
        match item {
            EnumPlanItem::Action(action) => {
                if spec_merge_options.if_dry_run {
                    tracing::info!(action = %action, "dry-run");
                    builder_merge_report.add_skipped();
                    continue;
                }
                match action.apply() {
                    Ok(()) => {
                        tracing::info!(action = %action, "applied");
                        if action.is_removal() {
                            builder_merge_report.add_removed();
                        } else {
                            builder_merge_report.add_moved();
                        }
                    }
                    Err(e) => {
                        tracing::error!(action = %action, error = %e, "action failed");
                        let path_origin = action.path_origin();
                        builder_merge_report.add_error(SpecMergeError {
                            path_origin: path_origin.to_path_buf(),
                            path_dest: action
                                .path_counterpart()
                                .unwrap_or(path_origin)
                                .to_path_buf(),
                            exception: format!("Error executing {action}: {e}"),
                        });
                        if !spec_merge_options.if_continue_on_error {
                            builder_merge_report.mark_aborted();
                            break;
                        }
                    }
                }
            }
            EnumPlanItem::Diagnostic(diagnostic) => {
                tracing::warn!(
                    path = %diagnostic.path_rel.display(),
                    reason = %diagnostic.kind,
                    "left untouched"
                );
                builder_merge_report.add_diagnostic(diagnostic);
            }
            EnumPlanItem::Failure(failure) => {
                tracing::error!(
                    origin = %failure.path_origin.display(),
                    dest = %failure.path_dest.display(),
                    error = %failure.exception,
                    "access failed"
                );
                builder_merge_report.add_error(failure);
                if !spec_merge_options.if_continue_on_error {
                    builder_merge_report.mark_aborted();
                    break;
                }
            }
        }
    }
}

/// Plan and execute the merge of `dir_origin` into `dir_dest`.
///
/// Returns [`ReportMerge`] when the run completes (possibly with per-entry
/// errors in the report). Returns [`MergeTreeError`] only for option and
/// root validation failures.
pub fn merge_tree<P, Q>(
    dir_origin: P,
    dir_dest: Q,
    spec_merge_options: SpecMergeOptions,
) -> Result<ReportMerge, MergeTreeError>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    let mut merge_plan = plan_merge(dir_origin, dir_dest, spec_merge_options)?;
    let spec_merge_options = merge_plan.options().clone();

    let mut builder_merge_report = ReportMergeBuilder::default();
    _apply_items(&mut merge_plan, &spec_merge_options, &mut builder_merge_report);
    builder_merge_report.set_scanned(merge_plan.n_scanned());
    if merge_plan.is_aborted() {
        builder_merge_report.mark_aborted();
    }
    Ok(builder_merge_report.build())
}

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};

    use filetime::{FileTime, set_file_mtime};
    use tempfile::TempDir;

    use super::{execute_plan, merge_tree};
    use crate::plan::plan_merge;
    use crate::spec::{EnumDiagnosticKind, EnumPlanItem, SpecMergeOptions};

    const N_MTIME_FIXED: i64 = 1_700_000_000;

    fn setup() -> (TempDir, PathBuf, PathBuf) {
        let tmp = TempDir::new().expect("tempdir");
        let origin = tmp.path().join("origin");
        let dest = tmp.path().join("dest");
        std::fs::create_dir_all(&origin).expect("mkdir origin");
        std::fs::create_dir_all(&dest).expect("mkdir dest");
        (tmp, origin, dest)
    }

    fn write_text(path: &Path, txt: &str) {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create parent");
        }
        std::fs::write(path, txt).expect("write text");
        set_file_mtime(path, FileTime::from_unix_time(N_MTIME_FIXED, 0)).expect("set mtime");
    }

    #[test]
    fn disjoint_move_lands_in_dest() {
        let (_tmp, origin, dest) = setup();
        write_text(&origin.join("a.txt"), "a");

        let report = merge_tree(&origin, &dest, SpecMergeOptions::default()).expect("merge");
        assert_eq!(report.cnt_scanned, 1);
        assert_eq!(report.cnt_moved, 1);
        assert_eq!(report.error_count(), 0);
        assert!(!origin.join("a.txt").exists());
        assert_eq!(std::fs::read_to_string(dest.join("a.txt")).expect("read"), "a");
    }

    #[test]
    fn verified_duplicate_leaves_only_dest_copy() {
        let (_tmp, origin, dest) = setup();
        write_text(&origin.join("b.txt"), "same");
        write_text(&dest.join("b.txt"), "same");

        let report = merge_tree(&origin, &dest, SpecMergeOptions::default()).expect("merge");
        assert_eq!(report.cnt_removed, 1);
        assert!(!origin.join("b.txt").exists());
        assert!(dest.join("b.txt").exists());
    }

    #[test]
    fn content_conflict_touches_nothing() {
        let (_tmp, origin, dest) = setup();
        write_text(&origin.join("c.txt"), "left");
        write_text(&dest.join("c.txt"), "rght");

        let report = merge_tree(&origin, &dest, SpecMergeOptions::default()).expect("merge");
        assert_eq!(report.cnt_moved + report.cnt_removed, 0);
        assert_eq!(report.diagnostics.len(), 1);
        assert_eq!(report.diagnostics[0].kind, EnumDiagnosticKind::ContentDiffers);
        assert_eq!(std::fs::read_to_string(origin.join("c.txt")).expect("read"), "left");
        assert_eq!(std::fs::read_to_string(dest.join("c.txt")).expect("read"), "rght");
    }

    #[test]
    fn set_oldest_leaves_dest_with_earlier_mtime() {
        let (_tmp, origin, dest) = setup();
        write_text(&origin.join("d.txt"), "same");
        write_text(&dest.join("d.txt"), "same");
        let mtime_old = FileTime::from_unix_time(N_MTIME_FIXED - 3_600, 0);
        set_file_mtime(origin.join("d.txt"), mtime_old).expect("mtime");

        let spec_merge_options = SpecMergeOptions {
            if_ignore_flags: true,
            if_set_oldest: true,
            ..SpecMergeOptions::default()
        };
        let report = merge_tree(&origin, &dest, spec_merge_options).expect("merge");
        assert_eq!(report.cnt_removed, 1);
        assert!(!origin.join("d.txt").exists());
        let stat_dest = std::fs::metadata(dest.join("d.txt")).expect("stat");
        assert_eq!(FileTime::from_last_modification_time(&stat_dest), mtime_old);
    }

    #[test]
    fn completed_merge_is_idempotent() {
        let (_tmp, origin, dest) = setup();
        write_text(&origin.join("new/a.txt"), "a");
        write_text(&origin.join("shared/dup.txt"), "dup");
        write_text(&dest.join("shared/dup.txt"), "dup");
        write_text(&origin.join("shared/fresh.txt"), "fresh");
        write_text(&origin.join("top.txt"), "top");

        let report = merge_tree(&origin, &dest, SpecMergeOptions::default()).expect("merge");
        assert_eq!(report.error_count(), 0);
        assert_eq!(report.diagnostic_count(), 0);
        assert_eq!(report.cnt_moved, 3);
        assert_eq!(report.cnt_removed, 1);

        let l_items: Vec<EnumPlanItem> = plan_merge(&origin, &dest, SpecMergeOptions::default())
            .expect("plan")
            .collect();
        assert!(l_items.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn destination_link_into_origin_keeps_only_copy() {
        let (_tmp, origin, dest) = setup();
        write_text(&origin.join("d/only_copy.txt"), "precious");
        std::os::unix::fs::symlink(origin.join("d"), dest.join("d")).expect("symlink");

        let report = merge_tree(&origin, &dest, SpecMergeOptions::default()).expect("merge");
        assert_eq!(report.cnt_removed, 0);
        assert_eq!(report.diagnostics[0].kind, EnumDiagnosticKind::SameFile);
        assert_eq!(
            std::fs::read_to_string(origin.join("d/only_copy.txt")).expect("read"),
            "precious"
        );
    }

    #[test]
    fn dry_run_applies_nothing() {
        let (_tmp, origin, dest) = setup();
        write_text(&origin.join("a.txt"), "a");
        write_text(&origin.join("b.txt"), "same");
        write_text(&dest.join("b.txt"), "same");

        let spec_merge_options = SpecMergeOptions {
            if_dry_run: true,
            ..SpecMergeOptions::default()
        };
        let report = merge_tree(&origin, &dest, spec_merge_options).expect("merge");
        assert_eq!(report.cnt_skipped, 2);
        assert_eq!(report.cnt_moved + report.cnt_removed, 0);
        assert!(origin.join("a.txt").exists());
        assert!(origin.join("b.txt").exists());
    }

    #[test]
    fn execution_failure_stops_or_continues() {
        for if_continue_on_error in [false, true] {
            let (_tmp, origin, dest) = setup();
            write_text(&origin.join("1.txt"), "one");
            write_text(&dest.join("1.txt"), "one");
            write_text(&origin.join("2.txt"), "two");
            write_text(&dest.join("2.txt"), "two");

            let spec_merge_options = SpecMergeOptions {
                if_continue_on_error,
                ..SpecMergeOptions::default()
            };
            let l_items: Vec<EnumPlanItem> =
                plan_merge(&origin, &dest, spec_merge_options.clone())
                    .expect("plan")
                    .collect();
            assert_eq!(l_items.len(), 2);

            // vanishes between planning and execution
            std::fs::remove_file(origin.join("1.txt")).expect("remove");

            let report = execute_plan(l_items, &spec_merge_options);
            assert_eq!(report.error_count(), 1);
            assert!(report.errors[0].exception.contains("Error executing rm"));
            assert_eq!(report.if_aborted, !if_continue_on_error);
            assert_eq!(report.cnt_removed, u64::from(if_continue_on_error));
            assert_eq!(origin.join("2.txt").exists(), !if_continue_on_error);
        }
    }
}
