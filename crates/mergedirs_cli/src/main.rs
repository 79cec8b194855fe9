mod args;
mod logging;

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use mergedirs_io_fs::{MergeTreeError, hash_tree, merge_tree};

use crate::args::{Args, EnumMode};
use crate::logging::init_logging;

const N_EXIT_FAILURE: u8 = 1;
const N_EXIT_SAME_DIRECTORY: u8 = 2;

fn run_merge(args: &Args) -> Result<ExitCode> {
    let [path_origin, path_dest] = args.paths.as_slice() else {
        anyhow::bail!("merge mode needs exactly <origin> <dest>");
    };

    let spec_merge_options = args.to_merge_options();
    tracing::debug!(
        origin = %path_origin.display(),
        dest = %path_dest.display(),
        options = ?spec_merge_options,
        "starting merge"
    );

    match merge_tree(path_origin, path_dest, spec_merge_options) {
        Ok(report_merge) => {
            println!("{report_merge}");
            if report_merge.error_count() > 0 {
                return Ok(ExitCode::from(N_EXIT_FAILURE));
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(e @ MergeTreeError::SameDirectory(_)) => {
            eprintln!("{e}");
            Ok(ExitCode::from(N_EXIT_SAME_DIRECTORY))
        }
        Err(e) => Err(e.into()),
    }
}

fn run_hash(args: &Args) -> Result<ExitCode> {
    for path in &args.paths {
        let digest = hash_tree(path, args.num_workers_max)
            .with_context(|| format!("failed to hash {}", path.display()))?;
        println!("{digest} {}", path.display());
    }
    Ok(ExitCode::SUCCESS)
}

fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            if e.use_stderr() {
                return ExitCode::from(N_EXIT_FAILURE);
            }
            return ExitCode::SUCCESS;
        }
    };
    init_logging(args.verbose, args.log_format);

    let res = match args.mode {
        EnumMode::Merge => run_merge(&args),
        EnumMode::Hash => run_hash(&args),
    };
    match res {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(N_EXIT_FAILURE)
        }
    }
}
