/// Code Emitter
///
/// Lowers a markup AST into host-language (TypeScript-shaped) text plus a
/// nested mapping tree, diagnostics directives, and emission errors. Every
/// construct lowers to one of a small closed set of DSL operations — content
/// emission, element emission, component invocation, modifier application,
/// block invocation — never a free-form dynamic call, and every lowering
/// records its source range against its generated range down to leaf
/// identifiers.
///
/// All ranges in the result are template-local; the module assembler
/// re-bases them into module coordinates.

use crate::error::EmitError;
use crate::map::{MappingKind, MappingTree};
use veneer_syntax::ast::*;
use veneer_syntax::Range;

/// Contextual information and vocabulary for one template's emission.
#[derive(Debug, Clone)]
pub struct EmitOptions {
    /// Module the DSL types are imported from
    pub types_module: String,
    /// Name resolution vocabulary for bare path heads: `None` sends every
    /// free name through `$dsl.Globals`, `Some(list)` sends only listed
    /// names through `Globals` and captures the rest from the enclosing
    /// scope.
    pub globals: Option<Vec<String>>,
    /// Enclosing type name (plus applied type params) for the context
    /// parameter, e.g. `MyComponent<K>`
    pub context_type: Option<String>,
    /// Raw type parameter list for the generated function, e.g.
    /// `<K extends string>`
    pub type_params: Option<String>,
    /// Statements emitted verbatim at the top of the generated body
    pub preamble: Vec<String>,
    /// Leading comment text that produces an ignore directive, if enabled;
    /// trailing commentary after the form is allowed
    pub ignore_form: Option<String>,
    /// Leading comment text that produces an expect-error directive, if
    /// enabled
    pub expect_error_form: Option<String>,
}

impl Default for EmitOptions {
    fn default() -> Self {
        EmitOptions {
            types_module: "@veneer/dsl".to_string(),
            globals: None,
            context_type: None,
            type_params: None,
            preamble: Vec::new(),
            ignore_form: Some("@veneer-ignore".to_string()),
            expect_error_form: Some("@veneer-expect-error".to_string()),
        }
    }
}

/// What kind of diagnostics directive an escape comment produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectiveKind {
    /// Suppress any diagnostics in the area of effect
    Ignore,
    /// Require at least one diagnostic in the area of effect
    ExpectError,
}

impl DirectiveKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DirectiveKind::Ignore => "ignore",
            DirectiveKind::ExpectError => "expect-error",
        }
    }
}

/// A directive in template-local coordinates: `location` is the comment's
/// original range, `area_of_effect` the generated statements it governs.
#[derive(Debug, Clone, PartialEq)]
pub struct EmittedDirective {
    pub kind: DirectiveKind,
    pub location: Range,
    pub area_of_effect: Range,
}

/// The full result of lowering one template.
#[derive(Debug)]
pub struct EmitResult {
    pub code: String,
    pub tree: MappingTree,
    pub directives: Vec<EmittedDirective>,
    pub errors: Vec<EmitError>,
}

/// Lower a parsed template into host-language text.
pub fn emit_template(template: &Template, opts: &EmitOptions) -> EmitResult {
    let mut emitter = Emitter::new(opts);
    emitter.emit_root(template);
    EmitResult {
        code: emitter.out,
        tree: emitter.tree,
        directives: emitter.directives,
        errors: emitter.errors,
    }
}

struct Emitter<'a> {
    opts: &'a EmitOptions,
    out: String,
    indent: usize,
    tree: MappingTree,
    /// Currently open mapping nodes, innermost last
    open: Vec<usize>,
    /// Block-param scopes, innermost last
    scopes: Vec<Vec<String>>,
    directives: Vec<EmittedDirective>,
    errors: Vec<EmitError>,
    /// A directive comment waiting for its governed construct
    pending: Option<(DirectiveKind, Range)>,
}

impl<'a> Emitter<'a> {
    fn new(opts: &'a EmitOptions) -> Self {
        Emitter {
            opts,
            out: String::new(),
            indent: 0,
            tree: MappingTree::new(),
            open: Vec::new(),
            scopes: Vec::new(),
            directives: Vec::new(),
            errors: Vec::new(),
            pending: None,
        }
    }

    fn emit_root(&mut self, template: &Template) {
        let module = self.opts.types_module.clone();
        let type_params = self.opts.type_params.clone();
        let context_type = self.opts.context_type.clone();
        let preamble = self.opts.preamble.clone();

        self.mapped(MappingKind::Template, template.range, |e| {
            e.out
                .push_str(&format!("({{}} as typeof import(\"{}\")).template(function", module));
            if let Some(params) = &type_params {
                e.out.push_str(params);
            }
            e.out.push('(');
            match &context_type {
                Some(context) => e.out.push_str(&format!(
                    "$ctx: import(\"{}\").ResolveContext<{}>",
                    module, context
                )),
                None => e.out.push_str("$ctx"),
            }
            e.out
                .push_str(&format!(", $dsl: typeof import(\"{}\")) {{\n", module));

            e.indent = 1;
            for line in &preamble {
                e.write_indent();
                e.out.push_str(line);
                e.out.push('\n');
            }
            e.emit_nodes(&template.body);
            e.write_indent();
            e.out.push_str("$ctx; $dsl;\n");
            e.indent = 0;
            e.out.push_str("})");
            if context_type.is_some() {
                e.out.push_str(" as unknown");
            }
        });
    }

    /// Record a mapping node around the output produced by `f`.
    fn mapped(&mut self, kind: MappingKind, original: Range, f: impl FnOnce(&mut Self)) {
        let start = self.out.len();
        let parent = self.open.last().copied();
        let index = self.tree.reserve(kind, original, parent);
        self.open.push(index);
        f(self);
        self.open.pop();
        self.tree.complete(index, Range::new(start, self.out.len()));
    }

    fn emit_nodes(&mut self, nodes: &[Node]) {
        for node in nodes {
            match node {
                // Plain text has no type-level meaning
                Node::Content(_) => {}
                Node::Comment(comment) => self.handle_comment(comment),
                _ => {
                    self.write_indent();
                    let stmt_start = self.out.len();
                    match node {
                        Node::Mustache(m) => self.emit_mustache_statement(m),
                        Node::Block(b) => self.emit_block(b),
                        Node::Element(el) => self.emit_element(el),
                        Node::Content(_) | Node::Comment(_) => unreachable!(),
                    }
                    let stmt_end = self.out.len();
                    self.out.push('\n');

                    if let Some((kind, location)) = self.pending.take() {
                        self.directives.push(EmittedDirective {
                            kind,
                            location,
                            area_of_effect: Range::new(stmt_start, stmt_end),
                        });
                    }
                }
            }
        }

        if let Some((kind, location)) = self.pending.take() {
            self.errors.push(EmitError {
                message: format!("'{}' directive has no effect", kind.as_str()),
                location: Some(location),
            });
        }
    }

    fn handle_comment(&mut self, comment: &Comment) {
        let Some(kind) = self.directive_kind(&comment.text) else {
            return;
        };
        // A directive superseded before it governed anything never takes
        // effect; surface that instead of dropping it.
        if let Some((superseded, location)) = self.pending.take() {
            self.errors.push(EmitError {
                message: format!("'{}' directive has no effect", superseded.as_str()),
                location: Some(location),
            });
        }
        self.pending = Some((kind, comment.range));
    }

    /// A directive comment is its form alone, or the form followed by free
    /// commentary: `@veneer-ignore: unavoidable upstream any`.
    fn directive_kind(&self, text: &str) -> Option<DirectiveKind> {
        let matches = |form: &Option<String>| {
            form.as_deref().is_some_and(|form| match text.strip_prefix(form) {
                Some(rest) => !rest
                    .starts_with(|c: char| c.is_ascii_alphanumeric() || c == '-'),
                None => false,
            })
        };
        if matches(&self.opts.ignore_form) {
            Some(DirectiveKind::Ignore)
        } else if matches(&self.opts.expect_error_form) {
            Some(DirectiveKind::ExpectError)
        } else {
            None
        }
    }

    fn emit_mustache_statement(&mut self, mustache: &Mustache) {
        self.mapped(MappingKind::Mustache, mustache.range, |e| {
            e.out.push_str("$dsl.emitContent(");
            e.emit_call(&mustache.call);
            e.out.push(')');
        });
        self.out.push(';');
    }

    /// `resolve(path)(args...)`, or `resolveOrReturn` for a bare path with
    /// no arguments, matching the content-emission contract of the DSL.
    fn emit_call(&mut self, call: &Call) {
        let bare = call.positional.is_empty() && call.named.is_empty();
        if bare {
            self.out.push_str("$dsl.resolveOrReturn(");
        } else {
            self.out.push_str("$dsl.resolve(");
        }
        self.emit_path(&call.path);
        self.out.push_str(")(");
        self.emit_args(call);
        self.out.push(')');
    }

    /// Positional arguments in source order, then the named-argument hash.
    /// Nothing is reordered or dropped, so host arity errors remain
    /// attributable to the original call shape.
    fn emit_args(&mut self, call: &Call) {
        for arg in &call.positional {
            self.emit_expr(arg);
            self.out.push_str(", ");
        }
        if call.named.is_empty() {
            self.out.push_str("{}");
        } else {
            self.out.push_str("{ ");
            for (i, arg) in call.named.iter().enumerate() {
                if i > 0 {
                    self.out.push_str(", ");
                }
                self.mapped(MappingKind::Identifier, arg.name.range, |e| {
                    e.out.push_str(&arg.name.name);
                });
                self.out.push_str(": ");
                self.emit_expr(&arg.value);
            }
            self.out.push_str(" }");
        }
    }

    fn emit_expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Path(path) => self.emit_path(path),
            Expr::String(lit) => {
                self.out.push('"');
                self.out.push_str(&escape_string(&lit.value));
                self.out.push('"');
            }
            Expr::Number(lit) => self.out.push_str(&lit.text),
            Expr::Bool(lit) => self
                .out
                .push_str(if lit.value { "true" } else { "false" }),
            Expr::SubExpr(call) => {
                self.mapped(MappingKind::SubExpression, call.range, |e| {
                    e.out.push_str("$dsl.resolve(");
                    e.emit_path(&call.path);
                    e.out.push_str(")(");
                    e.emit_args(call);
                    e.out.push(')');
                });
            }
        }
    }

    fn emit_path(&mut self, path: &PathExpr) {
        self.mapped(MappingKind::PathExpression, path.range, |e| {
            match &path.head {
                PathHead::Arg(ident) => {
                    e.out.push_str("$ctx.args.");
                    e.emit_identifier(ident);
                }
                PathHead::This(range) => {
                    e.out.push_str("$ctx.");
                    let range = *range;
                    e.mapped(MappingKind::Identifier, range, |e| e.out.push_str("this"));
                }
                PathHead::Bare(ident) => e.emit_bare_head(ident),
            }
            for segment in &path.tail {
                e.out.push('.');
                e.emit_identifier(segment);
            }
        });
    }

    /// Resolve a bare leading identifier against block params, then the
    /// configured globals vocabulary.
    fn emit_bare_head(&mut self, ident: &Ident) {
        if self.in_scope(&ident.name) {
            self.emit_identifier(ident);
            return;
        }
        let through_globals = match &self.opts.globals {
            None => true,
            Some(list) => list.iter().any(|g| g == &ident.name),
        };
        if through_globals {
            self.out.push_str("$dsl.Globals[\"");
            self.emit_identifier(ident);
            self.out.push_str("\"]");
        } else {
            self.emit_identifier(ident);
        }
    }

    fn emit_identifier(&mut self, ident: &Ident) {
        self.mapped(MappingKind::Identifier, ident.range, |e| {
            e.out.push_str(&ident.name);
        });
    }

    fn in_scope(&self, name: &str) -> bool {
        self.scopes
            .iter()
            .rev()
            .any(|scope| scope.iter().any(|n| n == name))
    }

    fn emit_block(&mut self, block: &Block) {
        self.mapped(MappingKind::Block, block.range, |e| {
            e.out.push_str("$dsl.invokeBlock($dsl.resolve(");
            e.emit_path(&block.call.path);
            e.out.push_str(")(");
            e.emit_args(&block.call);
            e.out.push_str("), {\n");
            e.indent += 1;

            e.write_indent();
            e.out.push_str("default(");
            for (i, param) in block.params.iter().enumerate() {
                if i > 0 {
                    e.out.push_str(", ");
                }
                e.emit_identifier(param);
            }
            e.out.push_str(") {\n");
            e.indent += 1;
            e.scopes
                .push(block.params.iter().map(|p| p.name.clone()).collect());
            e.emit_nodes(&block.children);
            e.scopes.pop();
            e.indent -= 1;
            e.write_indent();
            e.out.push_str("},\n");

            if let Some(inverse) = &block.inverse {
                e.write_indent();
                e.out.push_str("else() {\n");
                e.indent += 1;
                e.emit_nodes(inverse);
                e.indent -= 1;
                e.write_indent();
                e.out.push_str("},\n");
            }

            e.indent -= 1;
            e.write_indent();
            e.out.push_str("})");
        });
        self.out.push(';');
    }

    fn emit_element(&mut self, element: &Element) {
        let component = element
            .name
            .name
            .chars()
            .next()
            .map(char::is_uppercase)
            .unwrap_or(false);

        self.mapped(MappingKind::Element, element.range, |e| {
            e.out.push_str("{\n");
            e.indent += 1;

            if component {
                e.emit_component_body(element);
            } else {
                e.emit_plain_element_body(element);
            }

            e.indent -= 1;
            e.write_indent();
            e.out.push('}');
        });
    }

    fn emit_plain_element_body(&mut self, element: &Element) {
        self.write_indent();
        self.out.push_str("const $e = $dsl.emitElement(\"");
        self.emit_identifier(&element.name);
        self.out.push_str("\");\n");

        for attr in &element.attrs {
            self.write_indent();
            self.mapped(MappingKind::Attribute, attr.range, |e| {
                e.out.push_str("$dsl.applyAttribute($e, \"");
                e.emit_identifier(&attr.name);
                e.out.push('"');
                match &attr.value {
                    None => {}
                    Some(AttrValue::Literal(lit)) => {
                        e.out
                            .push_str(&format!(", \"{}\"", escape_string(&lit.value)));
                    }
                    Some(AttrValue::Mustache(m)) => {
                        e.out.push_str(", ");
                        e.emit_attr_expression(m);
                    }
                }
                e.out.push(')');
            });
            self.out.push_str(";\n");
        }

        for modifier in &element.modifiers {
            self.write_indent();
            self.mapped(MappingKind::Mustache, modifier.range, |e| {
                e.out.push_str("$dsl.applyModifier($e, $dsl.resolve(");
                e.emit_path(&modifier.path);
                e.out.push_str(")(");
                e.emit_args(modifier);
                e.out.push_str("))");
            });
            self.out.push_str(";\n");
        }

        self.emit_nodes(&element.children);
    }

    fn emit_component_body(&mut self, element: &Element) {
        self.write_indent();
        self.out.push_str("const $c = $dsl.emitComponent($dsl.resolve(");
        self.emit_bare_head(&element.name);
        self.out.push_str(")(");

        if element.attrs.is_empty() {
            self.out.push_str("{}");
        } else {
            self.out.push_str("{ ");
            for (i, attr) in element.attrs.iter().enumerate() {
                if i > 0 {
                    self.out.push_str(", ");
                }
                self.mapped(MappingKind::Attribute, attr.range, |e| {
                    e.emit_identifier(&attr.name);
                    e.out.push_str(": ");
                    match &attr.value {
                        None => e.out.push_str("true"),
                        Some(AttrValue::Literal(lit)) => {
                            e.out.push('"');
                            e.out.push_str(&escape_string(&lit.value));
                            e.out.push('"');
                        }
                        Some(AttrValue::Mustache(m)) => e.emit_attr_expression(m),
                    }
                });
            }
            self.out.push_str(" }");
        }
        self.out.push_str("));\n");

        if !element.children.is_empty() {
            self.write_indent();
            self.out
                .push_str("$dsl.invokeBlock($c, \"default\", function() {\n");
            self.indent += 1;
            self.emit_nodes(&element.children);
            self.indent -= 1;
            self.write_indent();
            self.out.push_str("});\n");
        }
    }

    /// A mustache used as a value: a bare path passes the value through,
    /// anything with arguments resolves and applies them.
    fn emit_attr_expression(&mut self, mustache: &Mustache) {
        let call = &mustache.call;
        if call.positional.is_empty() && call.named.is_empty() {
            self.emit_path(&call.path);
        } else {
            self.mapped(MappingKind::Mustache, mustache.range, |e| {
                e.out.push_str("$dsl.resolve(");
                e.emit_path(&call.path);
                e.out.push_str(")(");
                e.emit_args(call);
                e.out.push(')');
            });
        }
    }

    fn write_indent(&mut self) {
        for _ in 0..self.indent {
            self.out.push_str("  ");
        }
    }
}

/// Escape for a double-quoted host string literal.
fn escape_string(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
        .replace('\r', "\\r")
        .replace('\t', "\\t")
}

#[cfg(test)]
mod tests {
    use super::*;
    use veneer_syntax::parse;

    fn emit(src: &str, opts: &EmitOptions) -> EmitResult {
        emit_template(&parse(src).unwrap(), opts)
    }

    #[test]
    fn lowers_argument_reference_to_content_emission() {
        let result = emit("{{@version}}", &EmitOptions::default());
        assert!(result.errors.is_empty());
        assert!(result.directives.is_empty());
        assert!(result
            .code
            .contains("$dsl.emitContent($dsl.resolveOrReturn($ctx.args.version)({}));"));
    }

    #[test]
    fn maps_identifier_leaf_exactly() {
        let src = "{{@version}}";
        let result = emit(src, &EmitOptions::default());
        let name_offset = src.find("version").unwrap();
        let node = result.tree.innermost_by_original(name_offset).unwrap();
        assert_eq!(node.kind, MappingKind::Identifier);
        assert_eq!(node.original, Range::new(3, 10));
        assert_eq!(
            &result.code[node.transformed.start..node.transformed.end],
            "version"
        );
    }

    #[test]
    fn globals_vocabulary_controls_bare_heads() {
        let none = emit("{{greeting}}", &EmitOptions::default());
        assert!(none.code.contains("$dsl.Globals[\"greeting\"]"));

        let capture_all = EmitOptions {
            globals: Some(Vec::new()),
            ..EmitOptions::default()
        };
        let all = emit("{{greeting}}", &capture_all);
        assert!(all.code.contains("resolveOrReturn(greeting)"));
        assert!(!all.code.contains("Globals"));

        let capture_some = EmitOptions {
            globals: Some(vec!["greeting".to_string()]),
            ..EmitOptions::default()
        };
        let some = emit("{{greeting}} {{other}}", &capture_some);
        assert!(some.code.contains("$dsl.Globals[\"greeting\"]"));
        assert!(some.code.contains("resolveOrReturn(other)"));
    }

    #[test]
    fn block_params_shadow_globals() {
        let result = emit(
            "{{#each @items as |item|}}{{item}}{{/each}}",
            &EmitOptions::default(),
        );
        assert!(result.code.contains("$dsl.Globals[\"each\"]"));
        assert!(result
            .code
            .contains("$dsl.emitContent($dsl.resolveOrReturn(item)({}));"));
    }

    #[test]
    fn arguments_keep_source_order() {
        let result = emit("{{format @value \"usd\" precision=2}}", &EmitOptions::default());
        let args_at = result
            .code
            .find("($ctx.args.value, \"usd\", { precision: 2 })")
            .expect("positional args precede the named hash");
        assert!(args_at > 0);
    }

    #[test]
    fn directive_comment_covers_following_statement() {
        let src = "{{! @veneer-ignore }}{{@missing}}";
        let result = emit(src, &EmitOptions::default());
        assert_eq!(result.directives.len(), 1);
        let directive = &result.directives[0];
        assert_eq!(directive.kind, DirectiveKind::Ignore);
        assert_eq!(directive.location, Range::new(0, 21));
        let governed = &result.code[directive.area_of_effect.start..directive.area_of_effect.end];
        assert!(governed.contains("$ctx.args.missing"));
        assert!(governed.ends_with(';'));
    }

    #[test]
    fn dangling_directive_is_an_error() {
        let result = emit("{{@x}}{{! @veneer-expect-error }}", &EmitOptions::default());
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].message.contains("expect-error"));
        assert!(result.directives.is_empty());
    }

    #[test]
    fn superseded_directive_is_an_error_not_a_silent_drop() {
        let src = "{{! @veneer-ignore }}{{! @veneer-expect-error }}{{@x}}";
        let result = emit(src, &EmitOptions::default());

        assert_eq!(result.directives.len(), 1);
        assert_eq!(result.directives[0].kind, DirectiveKind::ExpectError);

        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].message.contains("'ignore' directive has no effect"));
        assert_eq!(result.errors[0].location, Some(Range::new(0, 21)));
    }

    #[test]
    fn directive_comments_may_carry_commentary() {
        let result = emit(
            "{{! @veneer-ignore: upstream types are wrong }}{{@x}}",
            &EmitOptions::default(),
        );
        assert_eq!(result.directives.len(), 1);
        assert_eq!(result.directives[0].kind, DirectiveKind::Ignore);

        // A longer word sharing the prefix is still a plain comment.
        let plain = emit("{{! @veneer-ignores }}{{@x}}", &EmitOptions::default());
        assert!(plain.directives.is_empty());
        assert!(plain.errors.is_empty());
    }

    #[test]
    fn context_type_flows_into_signature() {
        let opts = EmitOptions {
            context_type: Some("Banner".to_string()),
            ..EmitOptions::default()
        };
        let result = emit("", &opts);
        assert!(result
            .code
            .contains("$ctx: import(\"@veneer/dsl\").ResolveContext<Banner>"));
        assert!(result.code.ends_with(") as unknown"));
    }

    #[test]
    fn element_and_modifier_lowering() {
        let result = emit(
            "<div class=\"big\" title={{@title}} {{track \"view\"}}>{{@body}}</div>",
            &EmitOptions::default(),
        );
        assert!(result.code.contains("const $e = $dsl.emitElement(\"div\");"));
        assert!(result
            .code
            .contains("$dsl.applyAttribute($e, \"class\", \"big\");"));
        assert!(result
            .code
            .contains("$dsl.applyAttribute($e, \"title\", $ctx.args.title);"));
        assert!(result.code.contains(
            "$dsl.applyModifier($e, $dsl.resolve($dsl.Globals[\"track\"])(\"view\", {}));"
        ));
    }

    #[test]
    fn component_invocation_with_children() {
        let opts = EmitOptions {
            globals: Some(Vec::new()),
            ..EmitOptions::default()
        };
        let result = emit("<Badge label=\"new\">{{@body}}</Badge>", &opts);
        assert!(result
            .code
            .contains("const $c = $dsl.emitComponent($dsl.resolve(Badge)({ label: \"new\" }));"));
        assert!(result
            .code
            .contains("$dsl.invokeBlock($c, \"default\", function() {"));
    }

    #[test]
    fn emission_is_deterministic() {
        let src = "{{#if @on}}<p>{{@msg}}</p>{{/if}}";
        let first = emit(src, &EmitOptions::default());
        let second = emit(src, &EmitOptions::default());
        assert_eq!(first.code, second.code);
        assert_eq!(first.tree, second.tree);
    }
}
