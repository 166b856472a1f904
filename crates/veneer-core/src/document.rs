/// Document cache
///
/// Tracks the authoritative contents of every file the overlay has seen,
/// whether from disk or from an open editor buffer. Each path carries a
/// monotonic version; updating contents bumps it, invalidation drops the
/// contents while keeping the counter so a later re-read still reads as
/// newer. Parsing is lazy and cached until the next update.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use veneer_syntax::{ast::Template, parse, SyntaxError};

#[derive(Debug, Default)]
struct DocumentState {
    version: u64,
    contents: Option<Arc<String>>,
    template: Option<Arc<Result<Template, SyntaxError>>>,
}

#[derive(Debug, Default)]
pub struct DocumentCache {
    documents: HashMap<PathBuf, DocumentState>,
}

impl DocumentCache {
    pub fn new() -> Self {
        DocumentCache::default()
    }

    /// Replace a document's contents and bump its version.
    pub fn update(&mut self, path: impl Into<PathBuf>, contents: impl Into<String>) -> u64 {
        self.update_shared(path, Arc::new(contents.into()))
    }

    /// Like `update`, for contents the caller already holds shared.
    pub fn update_shared(&mut self, path: impl Into<PathBuf>, contents: Arc<String>) -> u64 {
        let state = self.documents.entry(path.into()).or_default();
        state.version += 1;
        state.contents = Some(contents);
        state.template = None;
        state.version
    }

    /// Drop cached contents without forgetting the version counter. The next
    /// `update` still produces a strictly newer version.
    pub fn invalidate(&mut self, path: &Path) {
        if let Some(state) = self.documents.get_mut(path) {
            state.contents = None;
            state.template = None;
        }
    }

    pub fn remove(&mut self, path: &Path) {
        self.documents.remove(path);
    }

    pub fn contents(&self, path: &Path) -> Option<Arc<String>> {
        self.documents.get(path)?.contents.clone()
    }

    pub fn version(&self, path: &Path) -> Option<u64> {
        self.documents.get(path).map(|state| state.version)
    }

    /// The parsed template for a document, parsing on first use.
    pub fn template(&mut self, path: &Path) -> Option<Arc<Result<Template, SyntaxError>>> {
        let state = self.documents.get_mut(path)?;
        let contents = state.contents.as_ref()?;
        if state.template.is_none() {
            state.template = Some(Arc::new(parse(contents)));
        }
        state.template.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn versions_are_monotonic_across_invalidation() {
        let mut cache = DocumentCache::new();
        let path = Path::new("app.ts");

        let v1 = cache.update(path, "one");
        cache.invalidate(path);
        assert_eq!(cache.contents(path), None);
        assert_eq!(cache.version(path), Some(v1));

        let v2 = cache.update(path, "two");
        assert!(v2 > v1);
        assert_eq!(cache.contents(path).unwrap().as_str(), "two");
    }

    #[test]
    fn parse_is_cached_until_update() {
        let mut cache = DocumentCache::new();
        let path = Path::new("banner.hbs");
        cache.update(path, "{{@title}}");

        let first = cache.template(path).unwrap();
        let second = cache.template(path).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(first.is_ok());

        cache.update(path, "{{#if");
        let third = cache.template(path).unwrap();
        assert!(third.is_err());
    }

    #[test]
    fn removal_forgets_the_document() {
        let mut cache = DocumentCache::new();
        let path = Path::new("app.ts");
        cache.update(path, "x");
        cache.remove(path);
        assert_eq!(cache.version(path), None);
        // Removing again is a no-op.
        cache.remove(path);
    }
}
