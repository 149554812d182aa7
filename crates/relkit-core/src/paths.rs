use std::path::{Path, PathBuf};

/// Resolve the build workspace.
///
/// An explicit override wins, then `RELKIT_WORKSPACE`, then the current
/// working directory.
pub fn workspace_root(explicit: Option<&Path>) -> std::io::Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    if let Ok(val) = std::env::var("RELKIT_WORKSPACE") {
        return Ok(PathBuf::from(val));
    }
    std::env::current_dir()
}

/// Local mirror of all repositories: `<workspace>/repo`
pub fn repo_root(workspace: &Path) -> PathBuf {
    workspace.join("repo")
}

/// Local mirror of one remote repository path: `<workspace>/repo/<remote>`
pub fn local_repo_path(workspace: &Path, remote: &str) -> PathBuf {
    remote
        .split('/')
        .filter(|segment| !segment.is_empty())
        .fold(repo_root(workspace), |acc, segment| acc.join(segment))
}
