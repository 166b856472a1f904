/// Per-project server pool
///
/// Each open file belongs to the project of its nearest config file; the
/// pool keys one overlay per resolved config path and routes every request
/// to the owning project. Files with no config of their own fall back to
/// the deepest already-loaded scope, then to defaults rooted at their
/// directory.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, warn};
use veneer_core::{ConfigLoader, ConfigScope, OverlayManager, RealFileSystem};

pub struct Project {
    pub overlay: OverlayManager<RealFileSystem>,
}

impl Project {
    fn new(scope: Arc<ConfigScope>) -> Self {
        let root = scope.root.clone();
        let mut overlay = OverlayManager::new(scope, RealFileSystem);
        overlay.watch_directory(root);
        Project { overlay }
    }
}

#[derive(Default)]
pub struct ProjectPool {
    loader: ConfigLoader,
    projects: HashMap<PathBuf, Project>,
}

impl ProjectPool {
    pub fn new() -> Self {
        ProjectPool::default()
    }

    pub fn project_for_file(&mut self, file: &Path) -> &mut Project {
        let scope = self.scope_for_file(file);
        let key = scope.config_path.clone();
        self.projects.entry(key).or_insert_with(|| {
            debug!(
                config = %scope.config_path.display(),
                "starting project instance"
            );
            Project::new(scope)
        })
    }

    pub fn project_count(&self) -> usize {
        self.projects.len()
    }

    fn scope_for_file(&mut self, file: &Path) -> Arc<ConfigScope> {
        match self.loader.config_for_file(file) {
            Ok(Some(scope)) => scope,
            Ok(None) => self.fallback_scope(file),
            Err(error) => {
                warn!(file = %file.display(), %error, "failed to load config");
                self.fallback_scope(file)
            }
        }
    }

    fn fallback_scope(&mut self, file: &Path) -> Arc<ConfigScope> {
        self.loader.nearest_loaded(file).unwrap_or_else(|| {
            let root = file.parent().unwrap_or_else(|| Path::new("."));
            Arc::new(ConfigScope::defaults_at(root))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use veneer_core::CONFIG_FILE_NAME;

    #[test]
    fn files_under_one_config_share_a_project() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILE_NAME), "{}").unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();

        let mut pool = ProjectPool::new();
        pool.project_for_file(&dir.path().join("src/a.ts"));
        pool.project_for_file(&dir.path().join("src/b.ts"));
        assert_eq!(pool.project_count(), 1);
    }

    #[test]
    fn separate_configs_get_separate_projects() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["one", "two"] {
            let package = dir.path().join(name);
            fs::create_dir_all(&package).unwrap();
            fs::write(package.join(CONFIG_FILE_NAME), "{}").unwrap();
        }

        let mut pool = ProjectPool::new();
        pool.project_for_file(&dir.path().join("one/app.ts"));
        pool.project_for_file(&dir.path().join("two/app.ts"));
        assert_eq!(pool.project_count(), 2);
    }

    #[test]
    fn unsaved_files_under_a_root_share_its_project() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILE_NAME), "{}").unwrap();

        let mut pool = ProjectPool::new();
        pool.project_for_file(&dir.path().join("app.ts"));

        // A buffer that never touched disk, under the same root.
        let loose = dir.path().join("untitled.ts");
        pool.project_for_file(&loose);
        assert_eq!(pool.project_count(), 1);
    }
}
