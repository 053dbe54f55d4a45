//! Agent Context
//!
//! Mutable per-session state shared between the executor and tool handlers.
//! Handlers receive it by `&mut` during dispatch; nothing here is global.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Process-lifetime state owned by a single executor
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentContext {
    /// Directory relative paths are resolved against
    pub working_directory: PathBuf,

    /// Project file currently loaded, if any
    #[serde(default)]
    pub project_path: Option<PathBuf>,
}

impl AgentContext {
    pub fn new(working_directory: impl Into<PathBuf>) -> Self {
        Self {
            working_directory: working_directory.into(),
            project_path: None,
        }
    }

    /// Record the project a handler just opened or created
    pub fn set_project(&mut self, path: impl Into<PathBuf>) {
        self.project_path = Some(path.into());
    }

    /// Forget the loaded project
    pub fn clear_project(&mut self) {
        self.project_path = None;
    }

    pub fn project(&self) -> Option<&Path> {
        self.project_path.as_deref()
    }

    /// Resolve a possibly-relative path against the working directory
    pub fn resolve(&self, path: impl AsRef<Path>) -> PathBuf {
        let path = path.as_ref();
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.working_directory.join(path)
        }
    }

    /// Short description appended to the system prompt
    pub fn describe(&self) -> String {
        let project = self
            .project_path
            .as_ref()
            .map_or_else(|| "none".to_string(), |p| p.display().to_string());
        format!(
            "Working directory: {}\nCurrent project: {}",
            self.working_directory.display(),
            project
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_relative_and_absolute() {
        let ctx = AgentContext::new("/work");
        assert_eq!(ctx.resolve("clips/a.mp4"), PathBuf::from("/work/clips/a.mp4"));
        assert_eq!(ctx.resolve("/tmp/b.mp4"), PathBuf::from("/tmp/b.mp4"));
    }

    #[test]
    fn test_project_lifecycle() {
        let mut ctx = AgentContext::new("/work");
        assert!(ctx.project().is_none());
        assert!(ctx.describe().contains("Current project: none"));

        ctx.set_project("/work/demo.json");
        assert_eq!(ctx.project(), Some(Path::new("/work/demo.json")));
        assert!(ctx.describe().contains("/work/demo.json"));

        ctx.clear_project();
        assert!(ctx.project().is_none());
    }
}
