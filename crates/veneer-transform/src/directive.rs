/// Directive reconciliation
///
/// After the host compiler has produced diagnostics against the transformed
/// text, this module reconciles them with the directives the templates
/// declared: ignored diagnostics are dropped, expected errors consume the
/// diagnostics that satisfy them, and any directive that matched nothing
/// becomes an error of its own. Surviving diagnostics are mapped back to
/// their original files and ranges.

use std::path::PathBuf;

use tracing::trace;
use veneer_syntax::Range;

use crate::emit::DirectiveKind;
use crate::error::TransformErrorKind;
use crate::module::TransformedModule;

/// A directive in module coordinates. `location` is the comment's range in
/// its source file; `area_of_effect` is the span of transformed text whose
/// diagnostics it governs.
#[derive(Debug, Clone, PartialEq)]
pub struct Directive {
    pub kind: DirectiveKind,
    /// The comment text that declared the directive, e.g. `@veneer-ignore`
    pub form: String,
    pub path: PathBuf,
    pub location: Range,
    pub area_of_effect: Range,
}

/// A diagnostic reported by the host compiler, in transformed coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct HostDiagnostic {
    pub message: String,
    pub range: Range,
    pub code: Option<String>,
}

impl HostDiagnostic {
    pub fn new(message: impl Into<String>, range: Range) -> Self {
        HostDiagnostic {
            message: message.into(),
            range,
            code: None,
        }
    }
}

/// Where a reconciled diagnostic came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    /// Reported by the host compiler and mapped back to source
    Host,
    /// A template failed to parse
    TemplateSyntax,
    /// A template was attached to an unusable construct
    Structural,
    /// A directive governed no diagnostics
    UnusedDirective,
}

/// A diagnostic in original coordinates, ready to present to the user.
#[derive(Debug, Clone, PartialEq)]
pub struct MappedDiagnostic {
    pub kind: DiagnosticKind,
    pub path: PathBuf,
    pub range: Range,
    pub message: String,
    pub code: Option<String>,
}

/// Reconcile host diagnostics against a module's directives and transform
/// errors, producing the final diagnostics in original coordinates.
pub fn reconcile_diagnostics(
    module: &TransformedModule,
    host: &[HostDiagnostic],
) -> Vec<MappedDiagnostic> {
    let mut out = Vec::new();

    for error in &module.errors {
        out.push(MappedDiagnostic {
            kind: match error.kind {
                TransformErrorKind::TemplateSyntax => DiagnosticKind::TemplateSyntax,
                TransformErrorKind::Structural => DiagnosticKind::Structural,
            },
            path: error.path.clone(),
            range: error.location,
            message: error.message.clone(),
            code: None,
        });
    }

    let directives = module.directives();
    let mut used = vec![false; directives.len()];

    for diagnostic in host {
        let governing = directives
            .iter()
            .position(|d| d.area_of_effect.intersects(diagnostic.range));
        if let Some(index) = governing {
            used[index] = true;
            trace!(
                directive = %directives[index].form,
                message = %diagnostic.message,
                "diagnostic consumed by directive"
            );
            continue;
        }

        let (file, range) = module.original_range(diagnostic.range);
        out.push(MappedDiagnostic {
            kind: DiagnosticKind::Host,
            path: file.path.clone(),
            range,
            message: diagnostic.message.clone(),
            code: diagnostic.code.clone(),
        });
    }

    for (directive, used) in directives.iter().zip(used) {
        if !used {
            out.push(MappedDiagnostic {
                kind: DiagnosticKind::UnusedDirective,
                path: directive.path.clone(),
                range: directive.location,
                message: format!("unused '{}' directive", directive.form),
                code: None,
            });
        }
    }

    out
}
