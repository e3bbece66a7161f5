//! Temporary workspaces for file-backed sync tests

use assert_fs::TempDir;
use std::fs;
use std::path::Path;

/// Empty temp directory, removed on drop
pub fn temp_dir() -> TempDir {
    TempDir::new().expect("Failed to create temp directory")
}

/// Temp directory with a `.leafsync/` folder and optional `config.toml`
pub fn init_workspace(config_toml: Option<&str>) -> TempDir {
    let temp = temp_dir();
    let leaf_dir = temp.path().join(".leafsync");
    fs::create_dir_all(&leaf_dir).expect("Failed to create .leafsync directory");
    if let Some(config) = config_toml {
        fs::write(leaf_dir.join("config.toml"), config).expect("Failed to write config.toml");
    }
    temp
}

/// Workspace pre-populated with `(relative path, content)` documents
///
/// # Example
///
/// ```rust
/// use leaf_test_helpers::workspace::{read_document, workspace_with_documents};
///
/// let workspace = workspace_with_documents(&[("chapters/intro.tex", "\\section{Intro}")]);
/// assert_eq!(read_document(workspace.path(), "chapters/intro.tex"), "\\section{Intro}");
/// ```
pub fn workspace_with_documents(documents: &[(&str, &str)]) -> TempDir {
    let workspace = init_workspace(None);

    for (name, content) in documents {
        let path = workspace.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent directory");
        }
        fs::write(&path, content).expect("Failed to write document");
    }

    workspace
}

/// Read a document back from a workspace
pub fn read_document(root: &Path, name: &str) -> String {
    fs::read_to_string(root.join(name))
        .unwrap_or_else(|e| panic!("Failed to read {}: {}", name, e))
}
