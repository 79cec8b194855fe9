//! Merge report models and mutable report builder.

use std::collections::BTreeMap;
use std::fmt;

use crate::spec::{SpecMergeDiagnostic, SpecMergeError};

/// Aggregate counters and diagnostics for one merge run.
#[derive(Debug, Default, Clone)]
pub struct ReportMerge {
    /// Origin entries inspected by the planner.
    pub cnt_scanned: u64,
    /// Entries moved into destination.
    pub cnt_moved: u64,
    /// Verified duplicates removed from origin.
    pub cnt_removed: u64,
    /// Entries left untouched (diagnostics or dry-run).
    pub cnt_skipped: u64,
    /// Non-fatal reasons entries were left alone.
    pub diagnostics: Vec<SpecMergeDiagnostic>,
    /// Access and execution failures.
    pub errors: Vec<SpecMergeError>,
    /// Run stopped before the plan was exhausted.
    pub if_aborted: bool,
}

impl ReportMerge {
    /// Number of collected hard errors.
    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    /// Number of collected diagnostics.
    pub fn diagnostic_count(&self) -> usize {
        self.diagnostics.len()
    }

    /// Machine-readable counters.
    pub fn to_dict(&self) -> BTreeMap<String, u64> {
        let mut dict_counts = BTreeMap::new();
        dict_counts.insert("cnt_scanned".to_string(), self.cnt_scanned);
        dict_counts.insert("cnt_moved".to_string(), self.cnt_moved);
        dict_counts.insert("cnt_removed".to_string(), self.cnt_removed);
        dict_counts.insert("cnt_skipped".to_string(), self.cnt_skipped);
        dict_counts.insert("cnt_errors".to_string(), self.error_count() as u64);
        dict_counts.insert(
            "cnt_diagnostics".to_string(),
            self.diagnostic_count() as u64,
        );
        dict_counts
    }

    /// Human-readable one-line summary.
    pub fn format(&self, prefix: &str) -> String {
        format!(
            "{prefix} scanned={} moved={} removed={} skipped={} errors={} diagnostics={}",
            self.cnt_scanned,
            self.cnt_moved,
            self.cnt_removed,
            self.cnt_skipped,
            self.error_count(),
            self.diagnostic_count()
        )
    }
}

impl fmt::Display for ReportMerge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format("[MERGE]"))
    }
}

/// Mutable accumulator for merge statistics.
#[derive(Debug, Default, Clone)]
pub struct ReportMergeBuilder {
    /// See [`ReportMerge::cnt_scanned`].
    pub cnt_scanned: u64,
    /// See [`ReportMerge::cnt_moved`].
    pub cnt_moved: u64,
    /// See [`ReportMerge::cnt_removed`].
    pub cnt_removed: u64,
    /// See [`ReportMerge::cnt_skipped`].
    pub cnt_skipped: u64,
    /// See [`ReportMerge::diagnostics`].
    pub diagnostics: Vec<SpecMergeDiagnostic>,
    /// See [`ReportMerge::errors`].
    pub errors: Vec<SpecMergeError>,
    /// See [`ReportMerge::if_aborted`].
    pub if_aborted: bool,
}

impl ReportMergeBuilder {
    pub fn set_scanned(&mut self, cnt_scanned: u64) {
        self.cnt_scanned = cnt_scanned;
    }

    pub fn add_moved(&mut self) {
        self.cnt_moved += 1;
    }

    pub fn add_removed(&mut self) {
        self.cnt_removed += 1;
    }

    pub fn add_skipped(&mut self) {
        self.cnt_skipped += 1;
    }

    /// Record a diagnostic; the entry counts as skipped.
    pub fn add_diagnostic(&mut self, diagnostic: SpecMergeDiagnostic) {
        self.cnt_skipped += 1;
        self.diagnostics.push(diagnostic);
    }

    pub fn add_error(&mut self, error: SpecMergeError) {
        self.errors.push(error);
    }

    pub fn mark_aborted(&mut self) {
        self.if_aborted = true;
    }

    /// Finalize builder into immutable report.
    pub fn build(self) -> ReportMerge {
        ReportMerge {
            cnt_scanned: self.cnt_scanned,
            cnt_moved: self.cnt_moved,
            cnt_removed: self.cnt_removed,
            cnt_skipped: self.cnt_skipped,
            diagnostics: self.diagnostics,
            errors: self.errors,
            if_aborted: self.if_aborted,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ReportMerge, ReportMergeBuilder};
    use crate::spec::{EnumDiagnosticKind, SpecMergeDiagnostic};

    #[test]
    fn report_merge_to_dict_and_format() {
        let report = ReportMerge {
            cnt_scanned: 8,
            cnt_moved: 3,
            cnt_removed: 2,
            cnt_skipped: 1,
            diagnostics: vec![SpecMergeDiagnostic {
                path_rel: "c.txt".into(),
                kind: EnumDiagnosticKind::ContentDiffers,
            }],
            errors: vec![],
            if_aborted: false,
        };

        let dict_counts = report.to_dict();
        assert_eq!(dict_counts["cnt_scanned"], 8);
        assert_eq!(dict_counts["cnt_moved"], 3);
        assert_eq!(dict_counts["cnt_removed"], 2);
        assert_eq!(dict_counts["cnt_skipped"], 1);
        assert_eq!(dict_counts["cnt_errors"], 0);
        assert_eq!(dict_counts["cnt_diagnostics"], 1);

        let txt = report.format("[MERGE]");
        assert_eq!(
            txt,
            "[MERGE] scanned=8 moved=3 removed=2 skipped=1 errors=0 diagnostics=1"
        );
        assert_eq!(report.to_string(), txt);
    }

    #[test]
    fn builder_counts_diagnostics_as_skipped() {
        let mut builder = ReportMergeBuilder::default();
        builder.add_diagnostic(SpecMergeDiagnostic {
            path_rel: "x".into(),
            kind: EnumDiagnosticKind::NonFile,
        });
        builder.add_skipped();
        builder.add_moved();
        builder.set_scanned(4);
        let report = builder.build();
        assert_eq!(report.cnt_scanned, 4);
        assert_eq!(report.cnt_skipped, 2);
        assert_eq!(report.cnt_moved, 1);
        assert_eq!(report.diagnostic_count(), 1);
        assert!(!report.if_aborted);
    }
}
