/// Module rewriting
///
/// Takes a host-language script (and, optionally, a companion template
/// file), lowers every embedded template, and splices the generated code
/// into a transformed rendition of the script. The result carries enough
/// mapping information to translate any offset in either direction.
///
/// Failure stays local: if any template fails to parse, the whole module
/// reverts to its input text byte for byte, with one error per malformed
/// template, so the host compiler still sees something well-formed.

use std::path::{Path, PathBuf};

use tracing::debug;
use veneer_syntax::{parse, Range, SyntaxError};

use crate::directive::Directive;
use crate::emit::{emit_template, EmitOptions, EmitResult};
use crate::error::TransformError;
use crate::map::MappingTree;
use crate::scan::{scan_script, ClassInfo, ScriptShape};

/// One input file of a module.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceFile {
    pub path: PathBuf,
    pub contents: String,
    pub kind: FileKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Script,
    Template,
}

impl SourceFile {
    pub fn script(path: impl Into<PathBuf>, contents: impl Into<String>) -> Self {
        SourceFile {
            path: path.into(),
            contents: contents.into(),
            kind: FileKind::Script,
        }
    }

    pub fn template(path: impl Into<PathBuf>, contents: impl Into<String>) -> Self {
        SourceFile {
            path: path.into(),
            contents: contents.into(),
            kind: FileKind::Template,
        }
    }
}

/// Which input file a correlated span's original side points into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Script,
    Template,
}

/// One region of generated output correlated with a region of input.
///
/// `script_range` is the stretch of script text the generated code replaced;
/// for a companion template it is empty at the insertion point, since the
/// generated code is inserted rather than substituted. `original` is the
/// corresponding range in the origin file, which for inline templates is the
/// same as `script_range`.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrelatedSpan {
    pub origin: Origin,
    pub original: Range,
    pub script_range: Range,
    pub transformed: Range,
    pub tree: MappingTree,
}

/// Options for rewriting one module.
#[derive(Debug, Clone)]
pub struct ModuleOptions {
    /// Tag identifier marking inline template literals, e.g. `hbs`
    pub inline_tag: String,
    pub emit: EmitOptions,
}

impl Default for ModuleOptions {
    fn default() -> Self {
        ModuleOptions {
            inline_tag: "hbs".to_string(),
            emit: EmitOptions::default(),
        }
    }
}

/// A fully rewritten module with bidirectional offset translation.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformedModule {
    pub script: SourceFile,
    pub template: Option<SourceFile>,
    pub transformed_contents: String,
    spans: Vec<CorrelatedSpan>,
    directives: Vec<Directive>,
    pub errors: Vec<TransformError>,
    /// Fallback script offset for template-file queries when the module has
    /// been reverted and no spans exist.
    template_anchor: Option<usize>,
}

/// Rewrite a script and its optional companion template into host-language
/// text the host compiler can check unmodified.
pub fn rewrite_module(
    script: SourceFile,
    template: Option<SourceFile>,
    opts: &ModuleOptions,
) -> TransformedModule {
    Rewriter {
        script,
        template,
        opts,
    }
    .run()
}

struct Rewriter<'a> {
    script: SourceFile,
    template: Option<SourceFile>,
    opts: &'a ModuleOptions,
}

/// A pending edit to the script text, in script coordinates.
struct Edit {
    /// The script range being replaced (empty for an insertion)
    script_range: Range,
    /// For an inline template, the range the root span should claim as
    /// original; for a companion, the template's full extent
    original: Range,
    origin: Origin,
    /// Offset of the template's text within its origin file; emission ranges
    /// are template-local and get shifted by this
    original_delta: usize,
    /// Text inserted before the generated code
    prefix: String,
    /// Text inserted after the generated code
    suffix: String,
    emitted: EmitResult,
    template_path: PathBuf,
}

impl<'a> Rewriter<'a> {
    fn run(self) -> TransformedModule {
        let shape = scan_script(&self.script.contents, &self.opts.inline_tag);
        let template_anchor = shape
            .default_export_class()
            .map(|c| c.body_end)
            .or(self.template.as_ref().map(|_| self.script.contents.len()));

        match self.collect_edits(&shape) {
            Ok((edits, mut errors)) => {
                let mut module = self.assemble(edits);
                module.errors.append(&mut errors);
                module.template_anchor = template_anchor;
                module
            }
            Err(errors) => {
                debug!(
                    path = %self.script.path.display(),
                    errors = errors.len(),
                    "module reverted to input"
                );
                TransformedModule {
                    transformed_contents: self.script.contents.clone(),
                    script: self.script,
                    template: self.template,
                    spans: Vec::new(),
                    directives: Vec::new(),
                    errors,
                    template_anchor,
                }
            }
        }
    }

    /// Parse and lower every template. A syntax error in any of them reverts
    /// the whole module; structural problems only skip the template they
    /// afflict.
    fn collect_edits(&self, shape: &ScriptShape) -> Result<(Vec<Edit>, Vec<TransformError>), Vec<TransformError>> {
        let mut edits = Vec::new();
        let mut structural = Vec::new();
        let mut syntax = Vec::new();

        for inline in &shape.inline_templates {
            let source = &self.script.contents[inline.contents.start..inline.contents.end];
            let template = match parse(source) {
                Ok(template) => template,
                Err(error) => {
                    syntax.push(self.syntax_error(&error, inline.contents.start, &self.script.path));
                    continue;
                }
            };

            let mut class = inline.class.map(|index| &shape.classes[index]);
            if let Some(c) = class {
                if c.name.is_none() {
                    structural.push(TransformError::structural(
                        &self.script.path,
                        "classes containing templates must have a name",
                        inline.full,
                    ));
                    // Still lower it, just without a context type.
                    class = None;
                }
            }

            let emit_opts = self.emit_options_for(class);
            edits.push(Edit {
                script_range: inline.full,
                original: inline.full,
                origin: Origin::Script,
                original_delta: inline.contents.start,
                prefix: String::new(),
                suffix: String::new(),
                emitted: emit_template(&template, &emit_opts),
                template_path: self.script.path.clone(),
            });
        }

        if let Some(companion) = &self.template {
            match parse(&companion.contents) {
                Ok(template) => match shape.default_export_class() {
                    Some(class) if class.name.is_some() => {
                        let emit_opts = self.emit_options_for(Some(class));
                        let name = class
                            .name
                            .as_ref()
                            .map(|(name, _)| name.clone())
                            .unwrap_or_default();
                        let insert_at = class.body_end;
                        edits.push(Edit {
                            script_range: Range::empty_at(insert_at),
                            original: Range::new(0, companion.contents.len()),
                            origin: Origin::Template,
                            original_delta: 0,
                            prefix: format!("\nprotected static '~template:{}' = ", name),
                            suffix: ";\n".to_string(),
                            emitted: emit_template(&template, &emit_opts),
                            template_path: companion.path.clone(),
                        });
                    }
                    Some(class) => {
                        structural.push(TransformError::structural(
                            &companion.path,
                            "classes with an associated template must have a name",
                            class.range,
                        ));
                    }
                    None => {
                        structural.push(TransformError::structural(
                            &companion.path,
                            "scripts with an associated template must have a default export",
                            Range::empty_at(0),
                        ));
                    }
                },
                Err(error) => {
                    syntax.push(self.syntax_error(&error, 0, &companion.path));
                }
            }
        }

        if syntax.is_empty() {
            edits.sort_by_key(|edit| edit.script_range.start);
            Ok((edits, structural))
        } else {
            syntax.append(&mut structural);
            Err(syntax)
        }
    }

    fn emit_options_for(&self, class: Option<&ClassInfo>) -> EmitOptions {
        let mut opts = self.opts.emit.clone();
        if let Some(class) = class {
            opts.context_type = class.applied_name();
            opts.type_params = class.type_params.clone();
        }
        opts
    }

    fn syntax_error(&self, error: &SyntaxError, base: usize, path: &Path) -> TransformError {
        TransformError::syntax(path, error.to_string(), error.range().shifted(base))
    }

    /// Rebuild the script in one pass, splicing each edit's generated code
    /// in place of (or into) its script range.
    fn assemble(self, edits: Vec<Edit>) -> TransformedModule {
        let src = &self.script.contents;
        let mut out = String::with_capacity(src.len() * 2);
        let mut spans = Vec::with_capacity(edits.len());
        let mut directives = Vec::new();
        let mut errors = Vec::new();
        let mut cursor = 0;

        for edit in edits {
            out.push_str(&src[cursor..edit.script_range.start]);
            let splice_start = out.len();
            out.push_str(&edit.prefix);

            let code_start = out.len();
            out.push_str(&edit.emitted.code);
            out.push_str(&edit.suffix);
            // The span claims the prefix and suffix too, so identity
            // translation on either side stays exact.
            let splice_range = Range::new(splice_start, out.len());

            let mut tree = edit.emitted.tree;
            let original_delta = edit.original_delta;
            tree.rebase(original_delta, code_start);
            tree.set_root_original(edit.original);

            let form = |kind| match kind {
                crate::emit::DirectiveKind::Ignore => self.opts.emit.ignore_form.clone(),
                crate::emit::DirectiveKind::ExpectError => self.opts.emit.expect_error_form.clone(),
            };
            for emitted in edit.emitted.directives {
                directives.push(Directive {
                    kind: emitted.kind,
                    form: form(emitted.kind).unwrap_or_default(),
                    path: edit.template_path.clone(),
                    location: emitted.location.shifted(original_delta),
                    area_of_effect: emitted.area_of_effect.shifted(code_start),
                });
            }
            for error in edit.emitted.errors {
                let location = error
                    .location
                    .map(|range| range.shifted(original_delta))
                    .unwrap_or(edit.original);
                errors.push(TransformError::structural(
                    &edit.template_path,
                    error.message,
                    location,
                ));
            }

            spans.push(CorrelatedSpan {
                origin: edit.origin,
                original: edit.original,
                script_range: edit.script_range,
                transformed: splice_range,
                tree,
            });
            cursor = edit.script_range.end;
        }
        out.push_str(&src[cursor..]);

        TransformedModule {
            script: self.script,
            template: self.template,
            transformed_contents: out,
            spans,
            directives,
            errors,
            template_anchor: None,
        }
    }
}

impl TransformedModule {
    /// Whether lowering failed and the transformed text is the input text.
    pub fn is_reverted(&self) -> bool {
        self.spans.is_empty() && !self.errors.is_empty()
    }

    pub fn spans(&self) -> &[CorrelatedSpan] {
        &self.spans
    }

    pub fn directives(&self) -> &[Directive] {
        &self.directives
    }

    /// The source file and offset a transformed offset corresponds to.
    pub fn original_offset(&self, transformed: usize) -> (&SourceFile, usize) {
        let index = self
            .spans
            .partition_point(|span| span.transformed.start <= transformed);
        if index > 0 {
            let span = &self.spans[index - 1];
            if span.transformed.contains(transformed) {
                let file = self.origin_file(span.origin);
                let node = span.tree.innermost_by_transformed(transformed);
                return match node {
                    Some(node) => {
                        let delta = transformed - node.transformed.start;
                        (file, node.original.start + delta.min(node.original.len()))
                    }
                    None => (file, span.original.start),
                };
            }
            // Identity region after the span: the text was copied verbatim.
            let offset = span.script_range.end + (transformed - span.transformed.end);
            return (&self.script, offset);
        }
        (&self.script, transformed)
    }

    /// Map a transformed range back to a source file and range. Both ends
    /// are expected to land in the same file; if they straddle a span
    /// boundary the range is collapsed to its start.
    pub fn original_range(&self, transformed: Range) -> (&SourceFile, Range) {
        let (file, start) = self.original_offset(transformed.start);
        let (end_file, end) = self.original_offset(transformed.end);
        if std::ptr::eq(file, end_file) && end >= start {
            (file, Range::new(start, end))
        } else {
            (file, Range::empty_at(start))
        }
    }

    /// The transformed offset corresponding to an offset in one of the
    /// module's input files. Returns None for a path the module does not
    /// contain.
    pub fn transformed_offset(&self, path: &Path, original: usize) -> Option<usize> {
        if path == self.script.path {
            return Some(self.transformed_offset_in_script(original));
        }
        if let Some(template) = &self.template {
            if path == template.path {
                return Some(self.transformed_offset_in_template(original));
            }
        }
        None
    }

    pub fn transformed_range(&self, path: &Path, original: Range) -> Option<Range> {
        let start = self.transformed_offset(path, original.start)?;
        let end = self.transformed_offset(path, original.end)?;
        Some(Range::new(start, end.max(start)))
    }

    fn transformed_offset_in_script(&self, original: usize) -> usize {
        let index = self
            .spans
            .partition_point(|span| span.script_range.start <= original);
        if index > 0 {
            let span = &self.spans[index - 1];
            if span.origin == Origin::Script && span.script_range.contains(original) {
                return self.descend_by_original(span, original);
            }
            return span.transformed.end + (original - span.script_range.end);
        }
        original
    }

    fn transformed_offset_in_template(&self, original: usize) -> usize {
        if let Some(span) = self.spans.iter().find(|span| span.origin == Origin::Template) {
            return self.descend_by_original(span, original.min(span.original.end));
        }
        // Reverted or structurally skipped: anchor template positions to the
        // companion's attachment point in the script.
        self.template_anchor.unwrap_or(0)
    }

    fn descend_by_original(&self, span: &CorrelatedSpan, original: usize) -> usize {
        match span.tree.innermost_by_original(original) {
            Some(node) => {
                let delta = original - node.original.start;
                node.transformed.start + delta.min(node.transformed.len())
            }
            None => span.transformed.start,
        }
    }

    fn origin_file(&self, origin: Origin) -> &SourceFile {
        match origin {
            Origin::Script => &self.script,
            // A Template-origin span can only exist if a template was given
            Origin::Template => self.template.as_ref().unwrap_or(&self.script),
        }
    }

    /// A dump of every correlated span's mapping tree, for tests and debug
    /// logging.
    pub fn debug_string(&self) -> String {
        let mut out = String::new();
        for span in &self.spans {
            let original_src = &self.origin_file(span.origin).contents;
            out.push_str(&span.tree.debug_string(original_src, &self.transformed_contents));
            out.push('\n');
        }
        out
    }
}
