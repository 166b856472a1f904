/// Abstract syntax tree for the Veneer template dialect
///
/// Every node carries the byte `Range` it occupied in the source text.
/// Ranges are template-local; the transform layer re-bases them into module
/// coordinates when a template is embedded in a script.

use crate::span::Range;

/// A fully parsed template.
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    pub body: Vec<Node>,
    /// Covers the entire parsed text.
    pub range: Range,
}

/// Top-level and nested template content.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Literal text between constructs
    Content(Content),
    /// `{{expression}}`
    Mustache(Mustache),
    /// `{{#name ...}} ... {{/name}}`
    Block(Block),
    /// `<tag ...> ... </tag>`
    Element(Element),
    /// `{{! comment }}` or `{{!-- comment --}}`
    Comment(Comment),
}

impl Node {
    pub fn range(&self) -> Range {
        match self {
            Node::Content(n) => n.range,
            Node::Mustache(n) => n.range,
            Node::Block(n) => n.range,
            Node::Element(n) => n.range,
            Node::Comment(n) => n.range,
        }
    }
}

/// Literal text content.
#[derive(Debug, Clone, PartialEq)]
pub struct Content {
    pub text: String,
    pub range: Range,
}

/// A `{{...}}` expression statement.
#[derive(Debug, Clone, PartialEq)]
pub struct Mustache {
    pub call: Call,
    pub range: Range,
}

/// A path applied to an argument list: the common shape shared by
/// mustaches, block openings, sub-expressions, and element modifiers.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub path: PathExpr,
    pub positional: Vec<Expr>,
    pub named: Vec<NamedArg>,
    pub range: Range,
}

/// A `name=value` argument.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedArg {
    pub name: Ident,
    pub value: Expr,
    pub range: Range,
}

/// Argument expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Path(PathExpr),
    String(StringLit),
    Number(NumberLit),
    Bool(BoolLit),
    /// `(helper arg ...)`
    SubExpr(Box<Call>),
}

impl Expr {
    pub fn range(&self) -> Range {
        match self {
            Expr::Path(e) => e.range,
            Expr::String(e) => e.range,
            Expr::Number(e) => e.range,
            Expr::Bool(e) => e.range,
            Expr::SubExpr(e) => e.range,
        }
    }
}

/// A dotted path such as `@user.name`, `this.title`, or `helper`.
#[derive(Debug, Clone, PartialEq)]
pub struct PathExpr {
    pub head: PathHead,
    pub tail: Vec<Ident>,
    pub range: Range,
}

/// The first segment of a path. Whether a bare head is a block-local
/// binding, an outer-scope capture, or a configured global is resolved
/// during emission, not here.
#[derive(Debug, Clone, PartialEq)]
pub enum PathHead {
    /// `@name` — a named template argument
    Arg(Ident),
    /// `this`
    This(Range),
    /// Any other leading identifier
    Bare(Ident),
}

impl PathHead {
    pub fn range(&self) -> Range {
        match self {
            PathHead::Arg(i) | PathHead::Bare(i) => i.range,
            PathHead::This(r) => *r,
        }
    }
}

/// A block invocation with optional params and inverse body.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub call: Call,
    /// Bindings introduced by `as |a b|`
    pub params: Vec<Ident>,
    pub children: Vec<Node>,
    /// Body following `{{else}}`, if present
    pub inverse: Option<Vec<Node>>,
    /// The `{{#...}}` opening tag
    pub open: Range,
    /// The `{{/...}}` closing tag
    pub close: Range,
    pub range: Range,
}

/// An element. Tag names starting with an uppercase letter are component
/// invocations; the distinction is drawn during emission.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub name: Ident,
    pub attrs: Vec<Attr>,
    /// `{{modifier ...}}` entries in attribute position
    pub modifiers: Vec<Call>,
    pub children: Vec<Node>,
    pub self_closing: bool,
    pub range: Range,
}

/// An element attribute.
#[derive(Debug, Clone, PartialEq)]
pub struct Attr {
    pub name: Ident,
    pub value: Option<AttrValue>,
    pub range: Range,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Literal(StringLit),
    Mustache(Mustache),
}

/// A template comment. Comments whose text matches an enabled directive
/// form become diagnostics directives during the transform.
#[derive(Debug, Clone, PartialEq)]
pub struct Comment {
    pub text: String,
    pub range: Range,
}

/// An identifier with its source range.
#[derive(Debug, Clone, PartialEq)]
pub struct Ident {
    pub name: String,
    pub range: Range,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StringLit {
    pub value: String,
    pub range: Range,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NumberLit {
    pub text: String,
    pub range: Range,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoolLit {
    pub value: bool,
    pub range: Range,
}
