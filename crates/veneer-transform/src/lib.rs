//! Lowers template markup embedded in host-language scripts into plain
//! host-language code, keeping a bidirectional mapping between every
//! original construct and the text generated for it. The transformed output
//! is valid input for an unmodified host compiler; diagnostics it reports
//! are mapped back through the same structures and reconciled with any
//! suppression directives the templates declared.

pub mod directive;
pub mod emit;
pub mod error;
pub mod map;
pub mod module;
pub mod scan;

pub use directive::{
    reconcile_diagnostics, DiagnosticKind, Directive, HostDiagnostic, MappedDiagnostic,
};
pub use emit::{emit_template, DirectiveKind, EmitOptions, EmitResult};
pub use error::{TransformError, TransformErrorKind};
pub use map::{MappingKind, MappingNode, MappingTree};
pub use module::{
    rewrite_module, CorrelatedSpan, FileKind, ModuleOptions, Origin, SourceFile, TransformedModule,
};
pub use scan::{scan_script, ScriptShape};
