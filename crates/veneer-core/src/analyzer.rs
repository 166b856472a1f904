/// Host analyzer seam
///
/// The host compiler is consumed through this trait: given a transformed
/// module, produce diagnostics against its transformed text. Production
/// wires in a real host compiler; tests script one.

use std::collections::HashMap;
use std::path::PathBuf;

use veneer_syntax::Range;
use veneer_transform::{HostDiagnostic, TransformedModule};

pub trait HostAnalyzer {
    fn diagnose(&mut self, module: &TransformedModule) -> Vec<HostDiagnostic>;
}

/// An analyzer that reports nothing. Useful when only transform-level
/// diagnostics (syntax errors, structural errors, unused directives) are
/// wanted.
#[derive(Debug, Default)]
pub struct NullAnalyzer;

impl HostAnalyzer for NullAnalyzer {
    fn diagnose(&mut self, _module: &TransformedModule) -> Vec<HostDiagnostic> {
        Vec::new()
    }
}

/// A scripted analyzer: whenever a module's transformed text contains a
/// registered needle, it reports the given message at the needle's range.
/// Stands in for the host compiler's type errors in tests.
#[derive(Debug, Default)]
pub struct ScriptedAnalyzer {
    expectations: Vec<(String, String)>,
    /// Diagnoses per script path, for asserting how often the analyzer ran
    pub invocations: HashMap<PathBuf, usize>,
}

impl ScriptedAnalyzer {
    pub fn new() -> Self {
        ScriptedAnalyzer::default()
    }

    pub fn report_when(&mut self, needle: impl Into<String>, message: impl Into<String>) {
        self.expectations.push((needle.into(), message.into()));
    }
}

impl HostAnalyzer for ScriptedAnalyzer {
    fn diagnose(&mut self, module: &TransformedModule) -> Vec<HostDiagnostic> {
        *self
            .invocations
            .entry(module.script.path.clone())
            .or_insert(0) += 1;

        let text = &module.transformed_contents;
        let mut diagnostics = Vec::new();
        for (needle, message) in &self.expectations {
            let mut from = 0;
            while let Some(at) = text[from..].find(needle.as_str()) {
                let start = from + at;
                diagnostics.push(HostDiagnostic::new(
                    message.clone(),
                    Range::new(start, start + needle.len()),
                ));
                from = start + needle.len();
            }
        }
        diagnostics
    }
}
