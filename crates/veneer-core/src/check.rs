/// One-shot project checking
///
/// Walks a project's included files, transforms every script, feeds the
/// result to the host analyzer, reconciles directives, and collects the
/// surviving diagnostics in original coordinates.

use std::io;
use std::path::PathBuf;

use tracing::debug;
use veneer_transform::{reconcile_diagnostics, DiagnosticKind, MappedDiagnostic};

use crate::analyzer::HostAnalyzer;
use crate::overlay::{FileSystem, OverlayManager};

pub struct CheckReport {
    pub diagnostics: Vec<MappedDiagnostic>,
    pub files_checked: usize,
}

impl CheckReport {
    pub fn has_errors(&self) -> bool {
        !self.diagnostics.is_empty()
    }
}

pub struct Checker<F: FileSystem, A: HostAnalyzer> {
    overlay: OverlayManager<F>,
    analyzer: A,
}

impl<F: FileSystem, A: HostAnalyzer> Checker<F, A> {
    pub fn new(overlay: OverlayManager<F>, analyzer: A) -> Self {
        Checker { overlay, analyzer }
    }

    pub fn overlay(&self) -> &OverlayManager<F> {
        &self.overlay
    }

    /// Check every included file under the project root.
    pub fn run(&mut self) -> io::Result<CheckReport> {
        let root = self.overlay.config().root.clone();
        let mut files = Vec::new();
        self.collect_files(&root, &mut files)?;
        files.sort();

        let mut diagnostics = Vec::new();
        let mut files_checked = 0;

        for path in &files {
            let config = std::sync::Arc::clone(self.overlay.config());
            if config.is_script(path) {
                files_checked += 1;
                let module = self.overlay.module_for(path)?;
                let host = self.analyzer.diagnose(&module);
                diagnostics.extend(reconcile_diagnostics(&module, &host));
            } else if config.is_template(path) && config.check_standalone_templates {
                // A template whose script the overlay already covers is
                // checked as part of that module.
                let script = config.script_path_for(path);
                if self.overlay.file_exists(&script) {
                    continue;
                }
                files_checked += 1;
                diagnostics.extend(self.check_standalone_template(path)?);
            }
        }

        debug!(files = files_checked, diagnostics = diagnostics.len(), "check finished");
        Ok(CheckReport {
            diagnostics,
            files_checked,
        })
    }

    /// A template with no script only gets a syntax pass; there is no
    /// containing type to check it against.
    fn check_standalone_template(&mut self, path: &PathBuf) -> io::Result<Vec<MappedDiagnostic>> {
        let contents = self.overlay.read_file(path)?;
        Ok(match veneer_syntax::parse(&contents) {
            Ok(_) => Vec::new(),
            Err(error) => vec![MappedDiagnostic {
                kind: DiagnosticKind::TemplateSyntax,
                path: path.clone(),
                range: error.range(),
                message: error.to_string(),
                code: None,
            }],
        })
    }

    fn collect_files(&self, dir: &PathBuf, out: &mut Vec<PathBuf>) -> io::Result<()> {
        for entry in self.overlay.read_directory(dir)? {
            if self.overlay.fs().is_directory(&entry) {
                self.collect_files(&entry, out)?;
            } else if self.overlay.config().includes(&entry) {
                out.push(entry);
            }
        }
        Ok(())
    }
}
