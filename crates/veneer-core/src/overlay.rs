/// Virtual file overlay
///
/// Presents the filesystem to the host compiler with one substitution:
/// reading an eligible script returns its transformed rendition instead of
/// what is on disk. Existence checks and directory listings always reflect
/// the real filesystem, so the host compiler's module resolution is
/// untouched.
///
/// Transformed modules are cached per script, keyed by a fingerprint of the
/// contributing file versions. A companion module depends on two files;
/// invalidating either evicts the merged entry.

use std::collections::{BTreeSet, HashMap};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::debug;
use veneer_transform::{rewrite_module, scan_script, SourceFile, TransformedModule};

use crate::config::{ConfigScope, TemplatePrecedence};
use crate::document::DocumentCache;

/// The filesystem operations the overlay needs. Production uses
/// `RealFileSystem`; tests use `MemoryFileSystem`.
pub trait FileSystem {
    fn file_exists(&self, path: &Path) -> bool;
    fn is_directory(&self, path: &Path) -> bool;
    fn read_file(&self, path: &Path) -> io::Result<String>;
    fn read_directory(&self, path: &Path) -> io::Result<Vec<PathBuf>>;
}

#[derive(Debug, Default)]
pub struct RealFileSystem;

impl FileSystem for RealFileSystem {
    fn file_exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn is_directory(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn read_file(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }

    fn read_directory(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        let mut entries = Vec::new();
        for entry in std::fs::read_dir(path)? {
            entries.push(entry?.path());
        }
        entries.sort();
        Ok(entries)
    }
}

/// An in-memory filesystem that counts reads, so tests can observe cache
/// behavior.
#[derive(Debug, Default)]
pub struct MemoryFileSystem {
    inner: Mutex<MemoryFs>,
}

#[derive(Debug, Default)]
struct MemoryFs {
    files: HashMap<PathBuf, String>,
    reads: HashMap<PathBuf, usize>,
}

impl MemoryFileSystem {
    pub fn new() -> Self {
        MemoryFileSystem::default()
    }

    pub fn set_file(&self, path: impl Into<PathBuf>, contents: impl Into<String>) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.files.insert(path.into(), contents.into());
    }

    pub fn remove_file(&self, path: &Path) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.files.remove(path);
    }

    /// How many times the overlay has read this path from "disk".
    pub fn read_count(&self, path: &Path) -> usize {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.reads.get(path).copied().unwrap_or(0)
    }
}

impl FileSystem for MemoryFileSystem {
    fn file_exists(&self, path: &Path) -> bool {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.files.contains_key(path)
    }

    fn is_directory(&self, path: &Path) -> bool {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner
            .files
            .keys()
            .any(|file| file != path && file.starts_with(path))
    }

    fn read_file(&self, path: &Path) -> io::Result<String> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        *inner.reads.entry(path.to_path_buf()).or_insert(0) += 1;
        inner
            .files
            .get(path)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, path.display().to_string()))
    }

    fn read_directory(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let mut children = BTreeSet::new();
        for file in inner.files.keys() {
            if let Ok(rest) = file.strip_prefix(path) {
                if let Some(first) = rest.components().next() {
                    children.insert(path.join(first));
                }
            }
        }
        Ok(children.into_iter().collect())
    }
}

/// Versions of the files a cached module was built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Fingerprint {
    script: u64,
    template: Option<u64>,
}

struct VirtualFileEntry {
    fingerprint: Fingerprint,
    module: Arc<TransformedModule>,
    dependencies: Vec<PathBuf>,
}

/// The overlay itself: document state, transformed-module cache, and the
/// substituting read path.
pub struct OverlayManager<F: FileSystem> {
    config: Arc<ConfigScope>,
    fs: F,
    documents: DocumentCache,
    entries: HashMap<PathBuf, VirtualFileEntry>,
    watched_files: Vec<PathBuf>,
    watched_directories: Vec<PathBuf>,
}

impl<F: FileSystem> OverlayManager<F> {
    pub fn new(config: Arc<ConfigScope>, fs: F) -> Self {
        OverlayManager {
            config,
            fs,
            documents: DocumentCache::new(),
            entries: HashMap::new(),
            watched_files: Vec::new(),
            watched_directories: Vec::new(),
        }
    }

    pub fn config(&self) -> &Arc<ConfigScope> {
        &self.config
    }

    pub fn fs(&self) -> &F {
        &self.fs
    }

    /// Existence always reflects the real filesystem.
    pub fn file_exists(&self, path: &Path) -> bool {
        self.fs.file_exists(path)
    }

    pub fn read_directory(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        self.fs.read_directory(path)
    }

    pub fn watch_file(&mut self, path: impl Into<PathBuf>) {
        self.watched_files.push(path.into());
    }

    pub fn watch_directory(&mut self, path: impl Into<PathBuf>) {
        self.watched_directories.push(path.into());
    }

    pub fn watched_files(&self) -> &[PathBuf] {
        &self.watched_files
    }

    pub fn watched_directories(&self) -> &[PathBuf] {
        &self.watched_directories
    }

    /// Read a file as the host compiler should see it: eligible scripts get
    /// their transformed rendition, everything else passes through.
    pub fn read_file(&mut self, path: &Path) -> io::Result<String> {
        if self.config.is_script(path) && self.config.includes(path) {
            let module = self.module_for(path)?;
            return Ok(module.transformed_contents.clone());
        }
        let (contents, _) = self.document_contents(path)?;
        Ok(contents.as_str().to_string())
    }

    /// The transformed module for a script, rebuilding only when a
    /// contributing file has changed since the cached build.
    pub fn module_for(&mut self, script: &Path) -> io::Result<Arc<TransformedModule>> {
        let (script_contents, script_version) = self.document_contents(script)?;

        let template_path = self.config.template_path_for(script);
        let mut companion = None;
        if self.fs.file_exists(&template_path) {
            let attach = match self.config.template_precedence {
                TemplatePrecedence::PreferCompanion => true,
                TemplatePrecedence::PreferInline => {
                    scan_script(&script_contents, &self.config.inline_tag)
                        .inline_templates
                        .is_empty()
                }
            };
            if attach {
                companion = Some(self.document_contents(&template_path)?);
            }
        }

        let fingerprint = Fingerprint {
            script: script_version,
            template: companion.as_ref().map(|(_, version)| *version),
        };
        if let Some(entry) = self.entries.get(script) {
            if entry.fingerprint == fingerprint {
                return Ok(Arc::clone(&entry.module));
            }
        }

        let template_file = companion
            .map(|(contents, _)| SourceFile::template(&template_path, contents.as_str()));
        let mut dependencies = vec![script.to_path_buf()];
        if template_file.is_some() {
            dependencies.push(template_path.clone());
        }

        let module = Arc::new(rewrite_module(
            SourceFile::script(script, script_contents.as_str()),
            template_file,
            &self.config.module_options(),
        ));
        debug!(
            path = %script.display(),
            reverted = module.is_reverted(),
            errors = module.errors.len(),
            "rebuilt transformed module"
        );
        self.entries.insert(
            script.to_path_buf(),
            VirtualFileEntry {
                fingerprint,
                module: Arc::clone(&module),
                dependencies,
            },
        );
        Ok(module)
    }

    /// The cached module for a script, if the cache holds one.
    pub fn cached_module(&self, script: &Path) -> Option<Arc<TransformedModule>> {
        self.entries.get(script).map(|entry| Arc::clone(&entry.module))
    }

    /// Replace an open buffer's contents, superseding whatever is on disk.
    pub fn buffer_updated(&mut self, path: &Path, contents: impl Into<String>) {
        self.documents.update(path, contents);
        self.evict_dependents(path);
    }

    pub fn file_added(&mut self, path: &Path) {
        self.documents.invalidate(path);
        self.evict_dependents(path);
    }

    pub fn file_changed(&mut self, path: &Path) {
        self.documents.invalidate(path);
        self.evict_dependents(path);
    }

    pub fn file_removed(&mut self, path: &Path) {
        self.documents.remove(path);
        self.evict_dependents(path);
    }

    fn evict_dependents(&mut self, path: &Path) {
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| !entry.dependencies.iter().any(|dep| dep == path));
        if self.entries.len() != before {
            debug!(path = %path.display(), "evicted transformed modules");
        }
    }

    fn document_contents(&mut self, path: &Path) -> io::Result<(Arc<String>, u64)> {
        if let Some(contents) = self.documents.contents(path) {
            let version = self.documents.version(path).unwrap_or(0);
            return Ok((contents, version));
        }
        let contents = Arc::new(self.fs.read_file(path)?);
        let version = self.documents.update_shared(path, Arc::clone(&contents));
        Ok((contents, version))
    }
}
