// Availability preflight: binary on the search path and executable

use scanhive_core::domain::ScanTool;
use scanhive_core::port::ScanFailure;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub(crate) fn install_hint(tool: ScanTool) -> String {
    format!(
        "{} is not installed or not in PATH. Please install it with: sudo apt install {}",
        tool,
        tool.binary()
    )
}

/// Resolve a tool's executable before anything is spawned
///
/// `search_path` overrides `PATH` (same syntax), mostly for tests and
/// sandboxed deployments.
pub fn preflight(tool: ScanTool, search_path: Option<&OsStr>) -> Result<PathBuf, ScanFailure> {
    let binary = tool.binary();
    let found = match search_path {
        Some(paths) => which::which_in(binary, Some(paths), "."),
        None => which::which(binary),
    };

    match found {
        Ok(path) => {
            debug!(tool = %tool, path = %path.display(), "Scanner binary resolved");
            Ok(path)
        }
        Err(_) => {
            let paths = search_path
                .map(OsStr::to_os_string)
                .or_else(|| std::env::var_os("PATH"))
                .unwrap_or_default();

            // `which` skips files it cannot execute; tell that apart from "missing"
            match std::env::split_paths(&paths)
                .map(|dir| dir.join(binary))
                .find(|candidate| candidate.is_file())
            {
                Some(candidate) => {
                    warn!(tool = %tool, path = %candidate.display(), "Scanner binary is not executable");
                    Err(ScanFailure::ToolUnavailable {
                        tool,
                        reason: not_executable(tool, &candidate),
                    })
                }
                None => {
                    warn!(tool = %tool, "Scanner binary not found");
                    Err(ScanFailure::ToolUnavailable {
                        tool,
                        reason: install_hint(tool),
                    })
                }
            }
        }
    }
}

fn not_executable(tool: ScanTool, path: &Path) -> String {
    format!(
        "{} is not executable. Please check permissions for {}",
        tool,
        path.display()
    )
}
