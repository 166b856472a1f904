/// Project configuration
///
/// A project is rooted wherever a `veneer.config.json` lives. The loader
/// walks up from a file to find its governing config, memoizing each loaded
/// scope by config path; when several loaded scopes could claim a file, the
/// one rooted deepest wins.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use glob::Pattern;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;
use veneer_transform::{EmitOptions, ModuleOptions};

pub const CONFIG_FILE_NAME: &str = "veneer.config.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config at {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid glob pattern '{pattern}' in {path}")]
    Pattern {
        path: PathBuf,
        pattern: String,
        #[source]
        source: glob::PatternError,
    },
}

/// Which rendition wins when a script has both an inline template and a
/// companion template file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TemplatePrecedence {
    #[default]
    PreferInline,
    PreferCompanion,
}

/// The raw shape of `veneer.config.json`. Every field is optional; defaults
/// are applied when the scope is built.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ConfigInput {
    pub types_module: Option<String>,
    pub globals: Option<Vec<String>>,
    pub inline_tag: Option<String>,
    pub check_standalone_templates: Option<bool>,
    pub include: Option<Vec<String>>,
    pub exclude: Option<Vec<String>>,
    pub directives: Option<bool>,
    pub template_precedence: Option<TemplatePrecedence>,
}

/// A fully resolved configuration scope for one project.
#[derive(Debug, Clone)]
pub struct ConfigScope {
    pub config_path: PathBuf,
    pub root: PathBuf,
    pub types_module: String,
    pub globals: Option<Vec<String>>,
    pub inline_tag: String,
    pub check_standalone_templates: bool,
    pub directives: bool,
    pub template_precedence: TemplatePrecedence,
    include: Vec<Pattern>,
    exclude: Vec<Pattern>,
}

impl ConfigScope {
    pub fn from_input(config_path: PathBuf, input: ConfigInput) -> Result<Self, ConfigError> {
        let root = config_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        let compile = |patterns: Vec<String>| -> Result<Vec<Pattern>, ConfigError> {
            patterns
                .into_iter()
                .map(|p| {
                    Pattern::new(&p).map_err(|source| ConfigError::Pattern {
                        path: config_path.clone(),
                        pattern: p,
                        source,
                    })
                })
                .collect()
        };

        Ok(ConfigScope {
            root,
            types_module: input
                .types_module
                .unwrap_or_else(|| "@veneer/dsl".to_string()),
            globals: input.globals,
            inline_tag: input.inline_tag.unwrap_or_else(|| "hbs".to_string()),
            check_standalone_templates: input.check_standalone_templates.unwrap_or(true),
            directives: input.directives.unwrap_or(true),
            template_precedence: input.template_precedence.unwrap_or_default(),
            include: compile(
                input
                    .include
                    .unwrap_or_else(|| vec!["**/*.ts".to_string(), "**/*.hbs".to_string()]),
            )?,
            exclude: compile(
                input
                    .exclude
                    .unwrap_or_else(|| vec!["**/node_modules/**".to_string()]),
            )?,
            config_path,
        })
    }

    /// A scope with default settings rooted at the given directory, for
    /// projects with no config file.
    pub fn defaults_at(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let config_path = root.join(CONFIG_FILE_NAME);
        match ConfigScope::from_input(config_path, ConfigInput::default()) {
            Ok(scope) => scope,
            // Default patterns are statically valid
            Err(_) => unreachable!("default config patterns compile"),
        }
    }

    /// Transform options for modules in this scope.
    pub fn module_options(&self) -> ModuleOptions {
        ModuleOptions {
            inline_tag: self.inline_tag.clone(),
            emit: EmitOptions {
                types_module: self.types_module.clone(),
                globals: self.globals.clone(),
                ignore_form: self
                    .directives
                    .then(|| "@veneer-ignore".to_string()),
                expect_error_form: self
                    .directives
                    .then(|| "@veneer-expect-error".to_string()),
                ..EmitOptions::default()
            },
        }
    }

    pub fn is_script(&self, path: &Path) -> bool {
        match path.extension().and_then(|e| e.to_str()) {
            Some("ts") => !path
                .file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.ends_with(".d.ts"))
                .unwrap_or(false),
            _ => false,
        }
    }

    pub fn is_template(&self, path: &Path) -> bool {
        path.extension().and_then(|e| e.to_str()) == Some("hbs")
    }

    /// Whether the file is part of this project: under the root and matched
    /// by the include patterns but not the excludes.
    pub fn includes(&self, path: &Path) -> bool {
        let relative = match path.strip_prefix(&self.root) {
            Ok(relative) => relative,
            Err(_) => return false,
        };
        self.include.iter().any(|p| p.matches_path(relative))
            && !self.exclude.iter().any(|p| p.matches_path(relative))
    }

    /// The companion template path for a script: `foo.ts` -> `foo.hbs`.
    pub fn template_path_for(&self, script: &Path) -> PathBuf {
        script.with_extension("hbs")
    }

    /// The script path a companion template attaches to.
    pub fn script_path_for(&self, template: &Path) -> PathBuf {
        template.with_extension("ts")
    }
}

/// Loads and memoizes configuration scopes by config path.
#[derive(Debug, Default)]
pub struct ConfigLoader {
    cache: HashMap<PathBuf, Arc<ConfigScope>>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        ConfigLoader::default()
    }

    /// Load (or return the memoized) scope for an exact config path.
    pub fn load(&mut self, config_path: &Path) -> Result<Arc<ConfigScope>, ConfigError> {
        if let Some(scope) = self.cache.get(config_path) {
            return Ok(Arc::clone(scope));
        }

        let text = fs::read_to_string(config_path).map_err(|source| ConfigError::Io {
            path: config_path.to_path_buf(),
            source,
        })?;
        let input: ConfigInput =
            serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
                path: config_path.to_path_buf(),
                source,
            })?;
        let scope = Arc::new(ConfigScope::from_input(config_path.to_path_buf(), input)?);
        debug!(path = %config_path.display(), "loaded config");
        self.cache
            .insert(config_path.to_path_buf(), Arc::clone(&scope));
        Ok(scope)
    }

    /// Find the governing config for a file by walking up its ancestors.
    pub fn config_for_file(&mut self, file: &Path) -> Result<Option<Arc<ConfigScope>>, ConfigError> {
        for dir in file.ancestors().skip(1) {
            let candidate = dir.join(CONFIG_FILE_NAME);
            if candidate.is_file() {
                return self.load(&candidate).map(Some);
            }
        }
        Ok(None)
    }

    /// Among already-loaded scopes, the one rooted deepest that contains the
    /// file. Used for files with no config of their own, such as unsaved
    /// editor buffers.
    pub fn nearest_loaded(&self, file: &Path) -> Option<Arc<ConfigScope>> {
        self.cache
            .values()
            .filter(|scope| file.starts_with(&scope.root))
            .max_by_key(|scope| scope.root.as_os_str().len())
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn applies_defaults_for_missing_fields() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&config_path, "{}").unwrap();

        let mut loader = ConfigLoader::new();
        let scope = loader.load(&config_path).unwrap();

        assert_eq!(scope.types_module, "@veneer/dsl");
        assert_eq!(scope.inline_tag, "hbs");
        assert!(scope.directives);
        assert_eq!(scope.template_precedence, TemplatePrecedence::PreferInline);
        assert!(scope.includes(&dir.path().join("src/app.ts")));
        assert!(!scope.includes(&dir.path().join("node_modules/dep/index.ts")));
    }

    #[test]
    fn parses_camel_case_fields() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(
            &config_path,
            r#"{
                "typesModule": "my-dsl",
                "globals": ["if", "each"],
                "inlineTag": "tpl",
                "directives": false,
                "templatePrecedence": "preferCompanion",
                "exclude": ["vendor/**"]
            }"#,
        )
        .unwrap();

        let mut loader = ConfigLoader::new();
        let scope = loader.load(&config_path).unwrap();

        assert_eq!(scope.types_module, "my-dsl");
        assert_eq!(
            scope.globals,
            Some(vec!["if".to_string(), "each".to_string()])
        );
        assert_eq!(scope.inline_tag, "tpl");
        assert_eq!(scope.template_precedence, TemplatePrecedence::PreferCompanion);
        assert!(!scope.includes(&dir.path().join("vendor/x.ts")));

        // Disabled directives turn off both comment forms.
        let options = scope.module_options();
        assert_eq!(options.emit.ignore_form, None);
        assert_eq!(options.emit.expect_error_form, None);
    }

    #[test]
    fn walks_up_to_the_nearest_config() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&config_path, "{}").unwrap();
        fs::create_dir_all(dir.path().join("src/components")).unwrap();

        let mut loader = ConfigLoader::new();
        let scope = loader
            .config_for_file(&dir.path().join("src/components/banner.ts"))
            .unwrap()
            .unwrap();
        assert_eq!(scope.config_path, config_path);
    }

    #[test]
    fn memoizes_by_config_path() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&config_path, "{}").unwrap();

        let mut loader = ConfigLoader::new();
        let first = loader.load(&config_path).unwrap();
        let second = loader.load(&config_path).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn deepest_loaded_scope_wins() {
        let dir = tempfile::tempdir().unwrap();
        let outer = dir.path().join(CONFIG_FILE_NAME);
        let inner_dir = dir.path().join("packages/app");
        fs::create_dir_all(&inner_dir).unwrap();
        let inner = inner_dir.join(CONFIG_FILE_NAME);
        fs::write(&outer, "{}").unwrap();
        fs::write(&inner, "{}").unwrap();

        let mut loader = ConfigLoader::new();
        loader.load(&outer).unwrap();
        loader.load(&inner).unwrap();

        let found = loader
            .nearest_loaded(&inner_dir.join("src/app.ts"))
            .unwrap();
        assert_eq!(found.config_path, inner);
    }

    #[test]
    fn rejects_unknown_fields() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&config_path, r#"{ "typoField": true }"#).unwrap();

        let mut loader = ConfigLoader::new();
        assert!(matches!(
            loader.load(&config_path),
            Err(ConfigError::Parse { .. })
        ));
    }
}
