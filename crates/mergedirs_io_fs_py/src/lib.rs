use std::collections::BTreeMap;
use std::path::Path;

use mergedirs_io_fs::{
    EnumFollowLinksRule, EnumPlanItem, MergeTreeError, ReportMerge, SpecMergeDiagnostic,
    SpecMergeError, SpecMergeOptions, hash_file, hash_tree, merge_tree, plan_merge,
};
use pyo3::exceptions::{PyNotADirectoryError, PyOSError, PyValueError};
use pyo3::prelude::*;

const N_BRIDGE_ABI_VERSION: u64 = 1;
const C_BRIDGE_CONTRACT_VERSION: &str = "mergedirs.fs.merge_tree.v1";
const C_BRIDGE_TRANSPORT: &str = "rust_native";

#[pyclass(name = "SpecMergeError")]
#[derive(Debug, Clone)]
struct PySpecMergeError {
    #[pyo3(get)]
    path_origin: String,
    #[pyo3(get)]
    path_dest: String,
    #[pyo3(get)]
    exception: String,
}

impl From<SpecMergeError> for PySpecMergeError {
    fn from(spec_error: SpecMergeError) -> Self {
        Self {
            path_origin: spec_error.path_origin.to_string_lossy().to_string(),
            path_dest: spec_error.path_dest.to_string_lossy().to_string(),
            exception: spec_error.exception,
        }
    }
}

#[pyclass(name = "SpecMergeDiagnostic")]
#[derive(Debug, Clone)]
struct PySpecMergeDiagnostic {
    #[pyo3(get)]
    path_rel: String,
    #[pyo3(get)]
    kind: String,
}

impl From<SpecMergeDiagnostic> for PySpecMergeDiagnostic {
    fn from(diagnostic: SpecMergeDiagnostic) -> Self {
        Self {
            path_rel: diagnostic.path_rel.to_string_lossy().to_string(),
            kind: diagnostic.kind.to_string(),
        }
    }
}

#[pymethods]
impl PySpecMergeDiagnostic {
    fn __str__(&self) -> String {
        format!("{}: {}", self.kind, self.path_rel)
    }
}

#[pyclass(name = "ReportMerge")]
#[derive(Debug, Clone)]
struct PyReportMerge {
    #[pyo3(get)]
    cnt_scanned: u64,
    #[pyo3(get)]
    cnt_moved: u64,
    #[pyo3(get)]
    cnt_removed: u64,
    #[pyo3(get)]
    cnt_skipped: u64,
    #[pyo3(get)]
    if_aborted: bool,
    #[pyo3(get)]
    diagnostics: Vec<PySpecMergeDiagnostic>,
    #[pyo3(get)]
    errors: Vec<PySpecMergeError>,
    report: ReportMerge,
}

impl From<ReportMerge> for PyReportMerge {
    fn from(report_merge: ReportMerge) -> Self {
        Self {
            cnt_scanned: report_merge.cnt_scanned,
            cnt_moved: report_merge.cnt_moved,
            cnt_removed: report_merge.cnt_removed,
            cnt_skipped: report_merge.cnt_skipped,
            if_aborted: report_merge.if_aborted,
            diagnostics: report_merge
                .diagnostics
                .iter()
                .cloned()
                .map(PySpecMergeDiagnostic::from)
                .collect(),
            errors: report_merge
                .errors
                .iter()
                .cloned()
                .map(PySpecMergeError::from)
                .collect(),
            report: report_merge,
        }
    }
}

#[pymethods]
impl PyReportMerge {
    #[getter]
    fn error_count(&self) -> usize {
        self.report.error_count()
    }

    #[getter]
    fn diagnostic_count(&self) -> usize {
        self.report.diagnostic_count()
    }

    fn to_dict(&self) -> BTreeMap<String, u64> {
        self.report.to_dict()
    }

    #[pyo3(signature = (prefix = "[MERGE]"))]
    fn format(&self, prefix: &str) -> String {
        self.report.format(prefix)
    }

    fn __str__(&self) -> String {
        self.report.to_string()
    }
}

fn parse_rule_follow_links(value: &str) -> PyResult<EnumFollowLinksRule> {
    match value {
        "resolves_to_file" => Ok(EnumFollowLinksRule::ResolvesToFile),
        "exists" => Ok(EnumFollowLinksRule::Exists),
        _ => Err(PyValueError::new_err(format!(
            "Invalid follow-links rule: `{value}`. Expected one of: ['resolves_to_file', 'exists']"
        ))),
    }
}

fn map_merge_tree_error(exception: MergeTreeError) -> PyErr {
    match exception {
        MergeTreeError::OriginNotDirectory(_) | MergeTreeError::DestinationNotDirectory(_) => {
            PyNotADirectoryError::new_err(exception.to_string())
        }
        MergeTreeError::ReadOrigin { .. } => PyOSError::new_err(exception.to_string()),
        MergeTreeError::ConflictingOptions(_)
        | MergeTreeError::SameDirectory(_)
        | MergeTreeError::OriginDestinationOverlap { .. } => {
            PyValueError::new_err(exception.to_string())
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn build_options(
    if_ignore_flags: bool,
    if_mtime_ignore_subsecond: bool,
    if_ignore_git: bool,
    if_ignore_git_worktrees: bool,
    if_remove_only: bool,
    if_verbose: bool,
    if_continue_on_error: bool,
    if_follow_links: bool,
    rule_follow_links: &str,
    if_set_oldest: bool,
    if_use_pre_hash: bool,
    if_dry_run: bool,
) -> PyResult<SpecMergeOptions> {
    Ok(SpecMergeOptions {
        if_ignore_flags,
        if_mtime_ignore_subsecond,
        if_ignore_git,
        if_ignore_git_worktrees,
        if_remove_only,
        if_verbose,
        if_continue_on_error,
        if_follow_links,
        rule_follow_links: parse_rule_follow_links(rule_follow_links)?,
        if_set_oldest,
        if_use_pre_hash,
        if_dry_run,
    })
}

#[pyfunction(name = "merge_tree")]
#[pyo3(signature = (
    dir_origin,
    dir_destination,
    if_ignore_flags = false,
    if_mtime_ignore_subsecond = false,
    if_ignore_git = false,
    if_ignore_git_worktrees = false,
    if_remove_only = false,
    if_verbose = false,
    if_continue_on_error = false,
    if_follow_links = false,
    rule_follow_links = "resolves_to_file",
    if_set_oldest = false,
    if_use_pre_hash = false,
    if_dry_run = false
))]
#[allow(clippy::too_many_arguments)]
fn merge_tree_py(
    py: Python<'_>,
    dir_origin: String,
    dir_destination: String,
    if_ignore_flags: bool,
    if_mtime_ignore_subsecond: bool,
    if_ignore_git: bool,
    if_ignore_git_worktrees: bool,
    if_remove_only: bool,
    if_verbose: bool,
    if_continue_on_error: bool,
    if_follow_links: bool,
    rule_follow_links: &str,
    if_set_oldest: bool,
    if_use_pre_hash: bool,
    if_dry_run: bool,
) -> PyResult<PyReportMerge> {
    let spec_merge_options = build_options(
        if_ignore_flags,
        if_mtime_ignore_subsecond,
        if_ignore_git,
        if_ignore_git_worktrees,
        if_remove_only,
        if_verbose,
        if_continue_on_error,
        if_follow_links,
        rule_follow_links,
        if_set_oldest,
        if_use_pre_hash,
        if_dry_run,
    )?;

    let report_merge =
        py.allow_threads(|| merge_tree(dir_origin, dir_destination, spec_merge_options));
    let report_merge = report_merge.map_err(map_merge_tree_error)?;
    Ok(PyReportMerge::from(report_merge))
}

/// Plan a merge and return the rendered plan lines without executing them.
#[pyfunction(name = "plan_merge")]
#[pyo3(signature = (
    dir_origin,
    dir_destination,
    if_ignore_flags = false,
    if_mtime_ignore_subsecond = false,
    if_ignore_git = false,
    if_ignore_git_worktrees = false,
    if_remove_only = false,
    if_verbose = false,
    if_continue_on_error = false,
    if_follow_links = false,
    rule_follow_links = "resolves_to_file",
    if_set_oldest = false,
    if_use_pre_hash = false
))]
#[allow(clippy::too_many_arguments)]
fn plan_merge_py(
    py: Python<'_>,
    dir_origin: String,
    dir_destination: String,
    if_ignore_flags: bool,
    if_mtime_ignore_subsecond: bool,
    if_ignore_git: bool,
    if_ignore_git_worktrees: bool,
    if_remove_only: bool,
    if_verbose: bool,
    if_continue_on_error: bool,
    if_follow_links: bool,
    rule_follow_links: &str,
    if_set_oldest: bool,
    if_use_pre_hash: bool,
) -> PyResult<Vec<String>> {
    let spec_merge_options = build_options(
        if_ignore_flags,
        if_mtime_ignore_subsecond,
        if_ignore_git,
        if_ignore_git_worktrees,
        if_remove_only,
        if_verbose,
        if_continue_on_error,
        if_follow_links,
        rule_follow_links,
        if_set_oldest,
        if_use_pre_hash,
        false,
    )?;

    let l_lines = py.allow_threads(|| {
        plan_merge(dir_origin, dir_destination, spec_merge_options).map(|merge_plan| {
            merge_plan
                .map(|item| match item {
                    EnumPlanItem::Action(action) => action.to_string(),
                    EnumPlanItem::Diagnostic(diagnostic) => diagnostic.to_string(),
                    EnumPlanItem::Failure(error) => error.to_string(),
                })
                .collect::<Vec<_>>()
        })
    });
    l_lines.map_err(map_merge_tree_error)
}

#[pyfunction(name = "hash_file")]
fn hash_file_py(py: Python<'_>, path: String) -> PyResult<String> {
    let digest = py.allow_threads(|| hash_file(Path::new(&path)))?;
    Ok(digest.to_hex())
}

#[pyfunction(name = "hash_tree")]
#[pyo3(signature = (dir_root, num_workers_max = None))]
fn hash_tree_py(
    py: Python<'_>,
    dir_root: String,
    num_workers_max: Option<usize>,
) -> PyResult<String> {
    let digest = py.allow_threads(|| hash_tree(Path::new(&dir_root), num_workers_max))?;
    Ok(digest.to_hex())
}

#[pymodule]
fn _mergedirs_io_fs_rs(module: &Bound<'_, PyModule>) -> PyResult<()> {
    module.add_class::<PySpecMergeError>()?;
    module.add_class::<PySpecMergeDiagnostic>()?;
    module.add_class::<PyReportMerge>()?;
    module.add_function(wrap_pyfunction!(merge_tree_py, module)?)?;
    module.add_function(wrap_pyfunction!(plan_merge_py, module)?)?;
    module.add_function(wrap_pyfunction!(hash_file_py, module)?)?;
    module.add_function(wrap_pyfunction!(hash_tree_py, module)?)?;
    module.add("__bridge_abi__", N_BRIDGE_ABI_VERSION)?;
    module.add("__bridge_contract__", C_BRIDGE_CONTRACT_VERSION)?;
    module.add("__bridge_transport__", C_BRIDGE_TRANSPORT)?;
    Ok(())
}
