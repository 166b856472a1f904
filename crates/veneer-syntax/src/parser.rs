/// Recursive-descent parser for the Veneer template dialect
///
/// Produces an AST whose nodes all carry byte offsets into the input. Parse
/// failures surface as a single `SyntaxError` carrying the offending range;
/// the transform layer turns that into a template-syntax diagnostic and
/// reverts the containing module.

use crate::ast::*;
use crate::span::Range;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SyntaxError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SyntaxError {
    #[error("unclosed mustache")]
    UnclosedMustache { range: Range },

    #[error("unmatched block opening tag '{{{{#{name}}}}}'")]
    UnclosedBlock { name: String, range: Range },

    #[error("mismatched block closing tag '{{{{/{found}}}}}', expected '{{{{/{expected}}}}}'")]
    MismatchedBlockClose {
        expected: String,
        found: String,
        range: Range,
    },

    #[error("closing tag '{{{{/{name}}}}}' with no matching opening tag")]
    StrayBlockClose { name: String, range: Range },

    #[error("'{{{{else}}}}' outside of a block")]
    StrayElse { range: Range },

    #[error("unclosed element '<{name}>'")]
    UnclosedElement { name: String, range: Range },

    #[error("mismatched element closing tag '</{found}>', expected '</{expected}>'")]
    MismatchedElementClose {
        expected: String,
        found: String,
        range: Range,
    },

    #[error("unclosed comment")]
    UnclosedComment { range: Range },

    #[error("unterminated string literal")]
    UnterminatedString { range: Range },

    #[error("expected {expected}")]
    Expected { expected: String, range: Range },
}

impl SyntaxError {
    /// The source range the error points at.
    pub fn range(&self) -> Range {
        match self {
            SyntaxError::UnclosedMustache { range }
            | SyntaxError::UnclosedBlock { range, .. }
            | SyntaxError::MismatchedBlockClose { range, .. }
            | SyntaxError::StrayBlockClose { range, .. }
            | SyntaxError::StrayElse { range }
            | SyntaxError::UnclosedElement { range, .. }
            | SyntaxError::MismatchedElementClose { range, .. }
            | SyntaxError::UnclosedComment { range }
            | SyntaxError::UnterminatedString { range }
            | SyntaxError::Expected { range, .. } => *range,
        }
    }
}

/// Parse a complete template.
pub fn parse(src: &str) -> Result<Template> {
    let mut parser = Parser::new(src);
    let body = parser.parse_nodes()?;

    // Anything that stopped the top-level node loop is stray.
    match parser.peek_stop() {
        Some(Stop::BlockClose) => {
            let (name, range) = parser.scan_close_tag_name();
            Err(SyntaxError::StrayBlockClose { name, range })
        }
        Some(Stop::Else) => Err(SyntaxError::StrayElse {
            range: parser.peek_mustache_range(),
        }),
        Some(Stop::ElementClose) => {
            let (name, range) = parser.scan_element_close_name();
            Err(SyntaxError::MismatchedElementClose {
                expected: String::new(),
                found: name,
                range,
            })
        }
        None => Ok(Template {
            body,
            range: Range::new(0, src.len()),
        }),
    }
}

/// What interrupted a node-list parse, left unconsumed for the caller.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Stop {
    BlockClose,
    Else,
    ElementClose,
}

struct Parser<'a> {
    src: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str) -> Self {
        Parser {
            src,
            bytes: src.as_bytes(),
            pos: 0,
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn starts_with(&self, s: &str) -> bool {
        self.src[self.pos..].starts_with(s)
    }

    fn peek_stop(&self) -> Option<Stop> {
        if self.at_end() {
            None
        } else if self.starts_with("{{/") {
            Some(Stop::BlockClose)
        } else if self.peek_else() {
            Some(Stop::Else)
        } else if self.starts_with("</") {
            Some(Stop::ElementClose)
        } else {
            None
        }
    }

    fn peek_else(&self) -> bool {
        if !self.starts_with("{{") {
            return false;
        }
        let rest = self.src[self.pos + 2..].trim_start();
        rest.starts_with("else") && rest[4..].trim_start().starts_with("}}")
    }

    /// Parse nodes until EOF or an unconsumed stop token.
    fn parse_nodes(&mut self) -> Result<Vec<Node>> {
        let mut nodes = Vec::new();
        let mut content_start = self.pos;

        loop {
            if self.at_end() || self.peek_stop().is_some() {
                self.flush_content(content_start, self.pos, &mut nodes);
                return Ok(nodes);
            }

            if self.starts_with("{{") {
                self.flush_content(content_start, self.pos, &mut nodes);
                let node = self.parse_mustache_construct()?;
                nodes.push(node);
                content_start = self.pos;
            } else if self.at_element_open() {
                self.flush_content(content_start, self.pos, &mut nodes);
                let node = self.parse_element()?;
                nodes.push(Node::Element(node));
                content_start = self.pos;
            } else {
                self.pos += self.char_len();
            }
        }
    }

    fn flush_content(&self, start: usize, end: usize, nodes: &mut Vec<Node>) {
        if end > start {
            nodes.push(Node::Content(Content {
                text: self.src[start..end].to_string(),
                range: Range::new(start, end),
            }));
        }
    }

    fn char_len(&self) -> usize {
        self.src[self.pos..]
            .chars()
            .next()
            .map(|c| c.len_utf8())
            .unwrap_or(1)
    }

    fn at_element_open(&self) -> bool {
        if self.bytes[self.pos] != b'<' {
            return false;
        }
        matches!(self.bytes.get(self.pos + 1), Some(b) if b.is_ascii_alphabetic())
    }

    /// Dispatch on the text after `{{`.
    fn parse_mustache_construct(&mut self) -> Result<Node> {
        if self.starts_with("{{!") {
            return Ok(Node::Comment(self.parse_comment()?));
        }
        if self.starts_with("{{#") {
            return Ok(Node::Block(self.parse_block()?));
        }

        let start = self.pos;
        self.pos += 2;
        self.skip_ws();
        let call_start = self.pos;
        let call = self.parse_call(call_start)?;
        self.skip_ws();
        if !self.starts_with("}}") {
            return Err(SyntaxError::UnclosedMustache {
                range: Range::new(start, self.src.len().min(start + 2)),
            });
        }
        self.pos += 2;

        Ok(Node::Mustache(Mustache {
            call,
            range: Range::new(start, self.pos),
        }))
    }

    fn parse_comment(&mut self) -> Result<Comment> {
        let start = self.pos;
        let (open_len, close) = if self.starts_with("{{!--") {
            (5, "--}}")
        } else {
            (3, "}}")
        };
        self.pos += open_len;

        match self.src[self.pos..].find(close) {
            Some(rel) => {
                let text = self.src[self.pos..self.pos + rel].trim().to_string();
                self.pos += rel + close.len();
                Ok(Comment {
                    text,
                    range: Range::new(start, self.pos),
                })
            }
            None => Err(SyntaxError::UnclosedComment {
                range: Range::new(start, self.src.len()),
            }),
        }
    }

    fn parse_block(&mut self) -> Result<Block> {
        let open_start = self.pos;
        self.pos += 3; // {{#
        self.skip_ws();
        let call = self.parse_call(self.pos)?;
        self.skip_ws();

        let mut params = Vec::new();
        if self.starts_with("as ") || self.starts_with("as|") {
            self.pos += 2;
            self.skip_ws();
            self.expect_byte(b'|', "'|'")?;
            loop {
                self.skip_ws();
                if self.at_end() {
                    return Err(SyntaxError::Expected {
                        expected: "'|' closing block params".to_string(),
                        range: Range::empty_at(self.pos),
                    });
                }
                if self.bytes[self.pos] == b'|' {
                    self.pos += 1;
                    break;
                }
                params.push(self.parse_ident("block param")?);
            }
            self.skip_ws();
        }

        if !self.starts_with("}}") {
            return Err(SyntaxError::UnclosedMustache {
                range: Range::new(open_start, self.src.len().min(open_start + 3)),
            });
        }
        self.pos += 2;
        let open = Range::new(open_start, self.pos);
        let block_name = path_name(&call.path);

        let children = self.parse_nodes()?;

        let mut inverse = None;
        if self.peek_stop() == Some(Stop::Else) {
            self.consume_else();
            inverse = Some(self.parse_nodes()?);
        }

        match self.peek_stop() {
            Some(Stop::BlockClose) => {
                let close_start = self.pos;
                let (found, _) = self.scan_close_tag_name();
                self.pos += 3; // {{/
                self.skip_ws();
                self.skip_path_text();
                self.skip_ws();
                if !self.starts_with("}}") {
                    return Err(SyntaxError::UnclosedMustache {
                        range: Range::new(close_start, self.src.len().min(close_start + 3)),
                    });
                }
                self.pos += 2;
                let close = Range::new(close_start, self.pos);

                if found != block_name {
                    return Err(SyntaxError::MismatchedBlockClose {
                        expected: block_name,
                        found,
                        range: close,
                    });
                }

                Ok(Block {
                    call,
                    params,
                    children,
                    inverse,
                    open,
                    close,
                    range: Range::new(open_start, self.pos),
                })
            }
            _ => Err(SyntaxError::UnclosedBlock {
                name: block_name,
                range: open,
            }),
        }
    }

    fn consume_else(&mut self) {
        // Caller has verified the shape with peek_else.
        self.pos += 2;
        self.skip_ws();
        self.pos += 4; // else
        self.skip_ws();
        self.pos += 2; // }}
    }

    /// Name and range of an unconsumed `{{/name}}` tag.
    fn scan_close_tag_name(&self) -> (String, Range) {
        let start = self.pos;
        let mut p = self.pos + 3;
        while p < self.bytes.len() && (self.bytes[p] as char).is_whitespace() {
            p += 1;
        }
        let name_start = p;
        while p < self.bytes.len() && is_path_byte(self.bytes[p]) {
            p += 1;
        }
        let name = self.src[name_start..p].to_string();
        let end = self.src[p..].find("}}").map(|rel| p + rel + 2).unwrap_or(p);
        (name, Range::new(start, end))
    }

    fn skip_path_text(&mut self) {
        while !self.at_end() && is_path_byte(self.bytes[self.pos]) {
            self.pos += 1;
        }
    }

    fn peek_mustache_range(&self) -> Range {
        let end = self.src[self.pos..]
            .find("}}")
            .map(|rel| self.pos + rel + 2)
            .unwrap_or(self.src.len());
        Range::new(self.pos, end)
    }

    fn parse_element(&mut self) -> Result<Element> {
        let start = self.pos;
        self.pos += 1; // <
        let name = self.parse_ident("element name")?;

        let mut attrs = Vec::new();
        let mut modifiers = Vec::new();
        let mut self_closing = false;

        loop {
            self.skip_ws();
            if self.at_end() {
                return Err(SyntaxError::UnclosedElement {
                    name: name.name,
                    range: Range::new(start, self.src.len()),
                });
            }
            if self.starts_with("/>") {
                self.pos += 2;
                self_closing = true;
                break;
            }
            if self.bytes[self.pos] == b'>' {
                self.pos += 1;
                break;
            }
            if self.starts_with("{{") {
                // Modifier in attribute position
                let mod_start = self.pos;
                self.pos += 2;
                self.skip_ws();
                let call = self.parse_call(self.pos)?;
                self.skip_ws();
                if !self.starts_with("}}") {
                    return Err(SyntaxError::UnclosedMustache {
                        range: Range::new(mod_start, self.src.len().min(mod_start + 2)),
                    });
                }
                self.pos += 2;
                modifiers.push(call);
                continue;
            }
            attrs.push(self.parse_attr()?);
        }

        let mut children = Vec::new();
        if !self_closing {
            children = self.parse_nodes()?;
            match self.peek_stop() {
                Some(Stop::ElementClose) => {
                    let (found, close_range) = self.scan_element_close_name();
                    if found != name.name {
                        return Err(SyntaxError::MismatchedElementClose {
                            expected: name.name,
                            found,
                            range: close_range,
                        });
                    }
                    self.pos = close_range.end;
                }
                _ => {
                    return Err(SyntaxError::UnclosedElement {
                        name: name.name,
                        range: Range::new(start, self.pos),
                    })
                }
            }
        }

        Ok(Element {
            name,
            attrs,
            modifiers,
            children,
            self_closing,
            range: Range::new(start, self.pos),
        })
    }

    fn scan_element_close_name(&self) -> (String, Range) {
        let start = self.pos;
        let mut p = self.pos + 2;
        let name_start = p;
        while p < self.bytes.len() && is_ident_byte(self.bytes[p]) {
            p += 1;
        }
        let name = self.src[name_start..p].to_string();
        let end = if self.bytes.get(p) == Some(&b'>') { p + 1 } else { p };
        (name, Range::new(start, end))
    }

    fn parse_attr(&mut self) -> Result<Attr> {
        let name = self.parse_ident("attribute name")?;
        let start = name.range.start;

        if self.bytes.get(self.pos) != Some(&b'=') {
            let range = Range::new(start, self.pos);
            return Ok(Attr {
                name,
                value: None,
                range,
            });
        }
        self.pos += 1;

        let value = if self.starts_with("{{") {
            let node = self.parse_mustache_construct()?;
            match node {
                Node::Mustache(m) => AttrValue::Mustache(m),
                other => {
                    return Err(SyntaxError::Expected {
                        expected: "expression in attribute value".to_string(),
                        range: other.range(),
                    })
                }
            }
        } else if self.bytes.get(self.pos) == Some(&b'"') {
            AttrValue::Literal(self.parse_string()?)
        } else {
            return Err(SyntaxError::Expected {
                expected: "attribute value".to_string(),
                range: Range::empty_at(self.pos),
            });
        };

        let range = Range::new(start, self.pos);
        Ok(Attr {
            name,
            value: Some(value),
            range,
        })
    }

    /// Parse a path plus arguments, stopping at `}}`, `)`, `as |`, or a tag end.
    fn parse_call(&mut self, start: usize) -> Result<Call> {
        let path = self.parse_path()?;
        let mut positional = Vec::new();
        let mut named = Vec::new();

        loop {
            self.skip_ws();
            if self.at_end()
                || self.starts_with("}}")
                || self.starts_with(")")
                || self.starts_with("as ")
                || self.starts_with("as|")
            {
                break;
            }

            if let Some(name) = self.peek_named_arg()? {
                let value = self.parse_expr()?;
                let range = Range::new(name.range.start, value.range().end);
                named.push(NamedArg { name, value, range });
            } else {
                positional.push(self.parse_expr()?);
            }
        }

        let end = positional
            .last()
            .map(Expr::range)
            .map(|r| r.end)
            .max(named.last().map(|a| a.range.end))
            .unwrap_or(path.range.end);

        Ok(Call {
            path,
            positional,
            named,
            range: Range::new(start, end),
        })
    }

    /// If the next token is `ident=`, consume through the `=` and return the
    /// name; otherwise consume nothing.
    fn peek_named_arg(&mut self) -> Result<Option<Ident>> {
        if !matches!(self.bytes.get(self.pos), Some(b) if is_ident_start(*b)) {
            return Ok(None);
        }
        let mut p = self.pos;
        while p < self.bytes.len() && is_ident_byte(self.bytes[p]) {
            p += 1;
        }
        if self.bytes.get(p) != Some(&b'=') {
            return Ok(None);
        }
        let ident = self.parse_ident("argument name")?;
        self.pos += 1; // =
        Ok(Some(ident))
    }

    fn parse_expr(&mut self) -> Result<Expr> {
        match self.bytes.get(self.pos) {
            Some(b'"') => Ok(Expr::String(self.parse_string()?)),
            Some(b'(') => {
                let start = self.pos;
                self.pos += 1;
                self.skip_ws();
                let mut call = self.parse_call(start)?;
                self.skip_ws();
                self.expect_byte(b')', "')'")?;
                call.range = Range::new(start, self.pos);
                Ok(Expr::SubExpr(Box::new(call)))
            }
            Some(b) if b.is_ascii_digit() || *b == b'-' => {
                let start = self.pos;
                self.pos += 1;
                while matches!(self.bytes.get(self.pos), Some(b) if b.is_ascii_digit() || *b == b'.')
                {
                    self.pos += 1;
                }
                Ok(Expr::Number(NumberLit {
                    text: self.src[start..self.pos].to_string(),
                    range: Range::new(start, self.pos),
                }))
            }
            _ => {
                if self.keyword_ahead("true") {
                    let start = self.pos;
                    self.pos += 4;
                    return Ok(Expr::Bool(BoolLit {
                        value: true,
                        range: Range::new(start, self.pos),
                    }));
                }
                if self.keyword_ahead("false") {
                    let start = self.pos;
                    self.pos += 5;
                    return Ok(Expr::Bool(BoolLit {
                        value: false,
                        range: Range::new(start, self.pos),
                    }));
                }
                Ok(Expr::Path(self.parse_path()?))
            }
        }
    }

    fn keyword_ahead(&self, kw: &str) -> bool {
        self.starts_with(kw)
            && !matches!(
                self.bytes.get(self.pos + kw.len()),
                Some(b) if is_ident_byte(*b)
            )
    }

    fn parse_string(&mut self) -> Result<StringLit> {
        let start = self.pos;
        self.pos += 1; // opening quote
        let mut value = String::new();
        while let Some(&b) = self.bytes.get(self.pos) {
            match b {
                b'"' => {
                    self.pos += 1;
                    return Ok(StringLit {
                        value,
                        range: Range::new(start, self.pos),
                    });
                }
                b'\\' => {
                    if let Some(&esc) = self.bytes.get(self.pos + 1) {
                        value.push(esc as char);
                        self.pos += 2;
                    } else {
                        self.pos += 1;
                    }
                }
                _ => {
                    let len = self.char_len();
                    value.push_str(&self.src[self.pos..self.pos + len]);
                    self.pos += len;
                }
            }
        }
        Err(SyntaxError::UnterminatedString {
            range: Range::new(start, self.src.len()),
        })
    }

    fn parse_path(&mut self) -> Result<PathExpr> {
        let start = self.pos;
        let head = match self.bytes.get(self.pos) {
            Some(b'@') => {
                // The sigil belongs to the path range, not the identifier
                self.pos += 1;
                PathHead::Arg(self.parse_ident("argument name")?)
            }
            _ => {
                if self.keyword_ahead("this") {
                    self.pos += 4;
                    PathHead::This(Range::new(start, self.pos))
                } else {
                    PathHead::Bare(self.parse_ident("path")?)
                }
            }
        };

        let mut tail = Vec::new();
        while self.bytes.get(self.pos) == Some(&b'.') {
            self.pos += 1;
            tail.push(self.parse_ident("path segment")?);
        }

        Ok(PathExpr {
            head,
            tail,
            range: Range::new(start, self.pos),
        })
    }

    fn parse_ident(&mut self, expected: &str) -> Result<Ident> {
        let start = self.pos;
        if !matches!(self.bytes.get(self.pos), Some(b) if is_ident_start(*b)) {
            return Err(SyntaxError::Expected {
                expected: expected.to_string(),
                range: Range::empty_at(self.pos),
            });
        }
        while matches!(self.bytes.get(self.pos), Some(b) if is_ident_byte(*b)) {
            self.pos += 1;
        }
        Ok(Ident {
            name: self.src[start..self.pos].to_string(),
            range: Range::new(start, self.pos),
        })
    }

    fn expect_byte(&mut self, byte: u8, expected: &str) -> Result<()> {
        if self.bytes.get(self.pos) == Some(&byte) {
            self.pos += 1;
            Ok(())
        } else {
            Err(SyntaxError::Expected {
                expected: expected.to_string(),
                range: Range::empty_at(self.pos),
            })
        }
    }

    fn skip_ws(&mut self) {
        while matches!(
            self.bytes.get(self.pos),
            Some(b) if (*b as char).is_whitespace()
        ) {
            self.pos += 1;
        }
    }
}

fn path_name(path: &PathExpr) -> String {
    match &path.head {
        PathHead::Arg(i) | PathHead::Bare(i) => i.name.clone(),
        PathHead::This(_) => "this".to_string(),
    }
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'-'
}

fn is_path_byte(b: u8) -> bool {
    is_ident_byte(b) || b == b'.' || b == b'@'
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_content() {
        let template = parse("hello world").unwrap();
        assert_eq!(template.body.len(), 1);
        match &template.body[0] {
            Node::Content(c) => {
                assert_eq!(c.text, "hello world");
                assert_eq!(c.range, Range::new(0, 11));
            }
            other => panic!("expected content, got {:?}", other),
        }
    }

    #[test]
    fn parses_argument_mustache() {
        let src = "{{@version}}";
        let template = parse(src).unwrap();
        match &template.body[0] {
            Node::Mustache(m) => {
                assert_eq!(m.range, Range::new(0, src.len()));
                match &m.call.path.head {
                    PathHead::Arg(ident) => {
                        assert_eq!(ident.name, "version");
                        // Bare name only; the sigil lives in the path range
                        assert_eq!(ident.range, Range::new(3, 10));
                        assert_eq!(m.call.path.range, Range::new(2, 10));
                    }
                    other => panic!("expected arg head, got {:?}", other),
                }
            }
            other => panic!("expected mustache, got {:?}", other),
        }
    }

    #[test]
    fn parses_this_path_with_tail() {
        let template = parse("{{this.user.name}}").unwrap();
        match &template.body[0] {
            Node::Mustache(m) => {
                assert!(matches!(m.call.path.head, PathHead::This(_)));
                let tail: Vec<_> = m.call.path.tail.iter().map(|i| i.name.as_str()).collect();
                assert_eq!(tail, vec!["user", "name"]);
            }
            other => panic!("expected mustache, got {:?}", other),
        }
    }

    #[test]
    fn parses_call_arguments_in_order() {
        let template = parse("{{format @value \"usd\" precision=2}}").unwrap();
        match &template.body[0] {
            Node::Mustache(m) => {
                assert_eq!(m.call.positional.len(), 2);
                assert_eq!(m.call.named.len(), 1);
                assert_eq!(m.call.named[0].name.name, "precision");
            }
            other => panic!("expected mustache, got {:?}", other),
        }
    }

    #[test]
    fn parses_block_with_params_and_else() {
        let src = "{{#each @items as |item index|}}{{item}}{{else}}empty{{/each}}";
        let template = parse(src).unwrap();
        match &template.body[0] {
            Node::Block(b) => {
                assert_eq!(b.params.len(), 2);
                assert_eq!(b.params[0].name, "item");
                assert_eq!(b.children.len(), 1);
                assert_eq!(b.inverse.as_ref().unwrap().len(), 1);
                assert_eq!(b.range, Range::new(0, src.len()));
            }
            other => panic!("expected block, got {:?}", other),
        }
    }

    #[test]
    fn unmatched_block_open_is_an_error() {
        let err = parse("{{#if @ready}}never closed").unwrap_err();
        match err {
            SyntaxError::UnclosedBlock { name, .. } => assert_eq!(name, "if"),
            other => panic!("expected unclosed block, got {:?}", other),
        }
    }

    #[test]
    fn mismatched_block_close_is_an_error() {
        let err = parse("{{#if @ready}}x{{/each}}").unwrap_err();
        assert!(matches!(err, SyntaxError::MismatchedBlockClose { .. }));
    }

    #[test]
    fn unclosed_mustache_is_an_error() {
        let err = parse("{{hello").unwrap_err();
        assert!(matches!(err, SyntaxError::UnclosedMustache { .. }));
    }

    #[test]
    fn parses_element_with_attrs_and_modifier() {
        let src = "<div class=\"big\" title={{@title}} {{track \"view\"}}>hi</div>";
        let template = parse(src).unwrap();
        match &template.body[0] {
            Node::Element(el) => {
                assert_eq!(el.name.name, "div");
                assert_eq!(el.attrs.len(), 2);
                assert_eq!(el.modifiers.len(), 1);
                assert_eq!(el.children.len(), 1);
                assert!(!el.self_closing);
            }
            other => panic!("expected element, got {:?}", other),
        }
    }

    #[test]
    fn parses_self_closing_component() {
        let template = parse("<Badge label=\"new\" />").unwrap();
        match &template.body[0] {
            Node::Element(el) => {
                assert_eq!(el.name.name, "Badge");
                assert!(el.self_closing);
            }
            other => panic!("expected element, got {:?}", other),
        }
    }

    #[test]
    fn parses_directive_comment() {
        let template = parse("{{! @veneer-ignore }}{{@x}}").unwrap();
        match &template.body[0] {
            Node::Comment(c) => assert_eq!(c.text, "@veneer-ignore"),
            other => panic!("expected comment, got {:?}", other),
        }
    }

    #[test]
    fn parses_subexpression() {
        let template = parse("{{concat (uppercase @name) \"!\"}}").unwrap();
        match &template.body[0] {
            Node::Mustache(m) => {
                assert!(matches!(m.call.positional[0], Expr::SubExpr(_)));
            }
            other => panic!("expected mustache, got {:?}", other),
        }
    }

    #[test]
    fn node_ranges_are_disjoint_and_ordered() {
        let src = "a{{@x}}b{{@y}}c";
        let template = parse(src).unwrap();
        let ranges: Vec<_> = template.body.iter().map(Node::range).collect();
        for pair in ranges.windows(2) {
            assert!(pair[0].end <= pair[1].start);
        }
        assert_eq!(ranges.first().unwrap().start, 0);
        assert_eq!(ranges.last().unwrap().end, src.len());
    }
}
