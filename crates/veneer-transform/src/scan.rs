/// Script shape scanner
///
/// Locates inline template literals (`hbs\`...\``) and class declarations in
/// a host-language script without a full host parser. The scanner is
/// string- and comment-aware, tracks brace depth, and reports byte ranges
/// only; everything downstream treats its output as an opaque `ScriptShape`
/// so a real host parser could replace it behind the same seam.

use veneer_syntax::Range;

/// Structural facts about a script that the module assembler needs.
#[derive(Debug, Clone, Default)]
pub struct ScriptShape {
    pub classes: Vec<ClassInfo>,
    pub inline_templates: Vec<InlineTemplate>,
}

#[derive(Debug, Clone)]
pub struct ClassInfo {
    /// Class name with its range, or None for an anonymous class
    pub name: Option<(String, Range)>,
    /// Raw type parameter list, e.g. `<K extends string>`
    pub type_params: Option<String>,
    /// Names of the declared type parameters, for applying to the context
    pub type_param_names: Vec<String>,
    /// From the `class` keyword through the closing brace
    pub range: Range,
    /// Offset of the class body's closing brace
    pub body_end: usize,
    pub is_default_export: bool,
}

impl ClassInfo {
    /// The class name with its type parameters applied, e.g. `List<T>`.
    pub fn applied_name(&self) -> Option<String> {
        let (name, _) = self.name.as_ref()?;
        if self.type_param_names.is_empty() {
            Some(name.clone())
        } else {
            Some(format!("{}<{}>", name, self.type_param_names.join(", ")))
        }
    }
}

#[derive(Debug, Clone)]
pub struct InlineTemplate {
    /// From the tag identifier through the closing backtick
    pub full: Range,
    /// The template text between the backticks
    pub contents: Range,
    /// Index into `classes` of the innermost enclosing class, if any
    pub class: Option<usize>,
}

impl ScriptShape {
    /// The class a companion template attaches to: the default-exported one.
    pub fn default_export_class(&self) -> Option<&ClassInfo> {
        self.classes.iter().find(|c| c.is_default_export)
    }
}

/// Scan a script for inline templates tagged with `tag` and for class
/// declarations.
pub fn scan_script(src: &str, tag: &str) -> ScriptShape {
    Scanner::new(src, tag).run()
}

struct Scanner<'a> {
    src: &'a str,
    bytes: &'a [u8],
    tag: &'a str,
    pos: usize,
    depth: usize,
    /// Indices into `shape.classes` of classes whose body is still open,
    /// paired with the brace depth of their body
    open_classes: Vec<(usize, usize)>,
    /// Set when a `class` header has been seen but its body brace has not
    pending_class: Option<ClassInfo>,
    /// Sliding window of the last two identifiers, for `export default`
    last_words: [Option<&'a str>; 2],
    shape: ScriptShape,
}

impl<'a> Scanner<'a> {
    fn new(src: &'a str, tag: &'a str) -> Self {
        Scanner {
            src,
            bytes: src.as_bytes(),
            tag,
            pos: 0,
            depth: 0,
            open_classes: Vec::new(),
            pending_class: None,
            last_words: [None, None],
            shape: ScriptShape::default(),
        }
    }

    fn run(mut self) -> ScriptShape {
        while self.pos < self.bytes.len() {
            let b = self.bytes[self.pos];
            match b {
                b'/' if self.peek(1) == Some(b'/') => self.skip_line_comment(),
                b'/' if self.peek(1) == Some(b'*') => self.skip_block_comment(),
                b'\'' | b'"' => self.skip_string(b),
                b'`' => self.skip_template_literal(),
                b'{' => {
                    self.depth += 1;
                    if let Some(class) = self.pending_class.take() {
                        let index = self.shape.classes.len();
                        self.shape.classes.push(class);
                        self.open_classes.push((index, self.depth));
                    }
                    self.pos += 1;
                }
                b'}' => {
                    if let Some(&(index, depth)) = self.open_classes.last() {
                        if depth == self.depth {
                            self.shape.classes[index].body_end = self.pos;
                            self.shape.classes[index].range.end = self.pos + 1;
                            self.open_classes.pop();
                        }
                    }
                    self.depth = self.depth.saturating_sub(1);
                    self.pos += 1;
                }
                _ if is_ident_start(b) => self.scan_word(),
                _ => self.pos += 1,
            }
        }
        self.shape
    }

    fn peek(&self, ahead: usize) -> Option<u8> {
        self.bytes.get(self.pos + ahead).copied()
    }

    fn scan_word(&mut self) {
        let start = self.pos;
        while matches!(self.bytes.get(self.pos), Some(b) if is_ident_byte(*b)) {
            self.pos += 1;
        }
        let word = &self.src[start..self.pos];

        if word == "class" {
            self.scan_class_header(start);
        } else if word == self.tag && self.backtick_follows() {
            self.scan_inline_template(start);
        }

        self.last_words = [self.last_words[1], Some(word)];
    }

    fn backtick_follows(&self) -> bool {
        let mut p = self.pos;
        while matches!(self.bytes.get(p), Some(b) if (*b as char).is_whitespace()) {
            p += 1;
        }
        self.bytes.get(p) == Some(&b'`')
    }

    fn scan_class_header(&mut self, keyword_start: usize) {
        let is_default_export =
            self.last_words == [Some("export"), Some("default")];

        self.skip_ws();
        let mut name = None;
        if matches!(self.bytes.get(self.pos), Some(b) if is_ident_start(*b)) {
            let name_start = self.pos;
            while matches!(self.bytes.get(self.pos), Some(b) if is_ident_byte(*b)) {
                self.pos += 1;
            }
            let text = &self.src[name_start..self.pos];
            // `class extends Base {` is anonymous
            if text != "extends" {
                name = Some((text.to_string(), Range::new(name_start, self.pos)));
            } else {
                self.pos = name_start;
            }
        }

        let mut type_params = None;
        let mut type_param_names = Vec::new();
        if name.is_some() && self.bytes.get(self.pos) == Some(&b'<') {
            let params_start = self.pos;
            let mut angle_depth = 0usize;
            while let Some(&b) = self.bytes.get(self.pos) {
                match b {
                    b'<' => angle_depth += 1,
                    b'>' => {
                        angle_depth -= 1;
                        if angle_depth == 0 {
                            self.pos += 1;
                            break;
                        }
                    }
                    _ => {}
                }
                self.pos += 1;
            }
            let raw = &self.src[params_start..self.pos];
            type_param_names = parse_type_param_names(raw);
            type_params = Some(raw.to_string());
        }

        self.pending_class = Some(ClassInfo {
            name,
            type_params,
            type_param_names,
            range: Range::new(keyword_start, self.pos),
            body_end: self.pos,
            is_default_export,
        });
    }

    fn scan_inline_template(&mut self, tag_start: usize) {
        self.skip_ws();
        // backtick_follows guaranteed this
        self.pos += 1;
        let contents_start = self.pos;

        while let Some(&b) = self.bytes.get(self.pos) {
            match b {
                b'\\' => self.pos += 2,
                b'`' => break,
                _ => self.pos += 1,
            }
        }
        let contents_end = self.pos.min(self.bytes.len());
        if self.bytes.get(self.pos) == Some(&b'`') {
            self.pos += 1;
        }

        let class = self.open_classes.last().map(|&(index, _)| index);
        self.shape.inline_templates.push(InlineTemplate {
            full: Range::new(tag_start, self.pos),
            contents: Range::new(contents_start, contents_end),
            class,
        });
    }

    fn skip_line_comment(&mut self) {
        while let Some(&b) = self.bytes.get(self.pos) {
            self.pos += 1;
            if b == b'\n' {
                break;
            }
        }
    }

    fn skip_block_comment(&mut self) {
        self.pos += 2;
        while self.pos < self.bytes.len() {
            if self.bytes[self.pos] == b'*' && self.peek(1) == Some(b'/') {
                self.pos += 2;
                return;
            }
            self.pos += 1;
        }
    }

    fn skip_string(&mut self, quote: u8) {
        self.pos += 1;
        while let Some(&b) = self.bytes.get(self.pos) {
            match b {
                b'\\' => self.pos += 2,
                _ if b == quote => {
                    self.pos += 1;
                    return;
                }
                _ => self.pos += 1,
            }
        }
    }

    /// An untagged template literal; `${...}` interpolations may nest.
    fn skip_template_literal(&mut self) {
        self.pos += 1;
        let mut interp_depth = 0usize;
        while let Some(&b) = self.bytes.get(self.pos) {
            match b {
                b'\\' => self.pos += 2,
                b'$' if self.peek(1) == Some(b'{') => {
                    interp_depth += 1;
                    self.pos += 2;
                }
                b'}' if interp_depth > 0 => {
                    interp_depth -= 1;
                    self.pos += 1;
                }
                b'`' if interp_depth == 0 => {
                    self.pos += 1;
                    return;
                }
                _ => self.pos += 1,
            }
        }
    }

    fn skip_ws(&mut self) {
        while matches!(self.bytes.get(self.pos), Some(b) if (*b as char).is_whitespace()) {
            self.pos += 1;
        }
    }
}

/// Extract `["K", "V"]` from `<K extends string, V>`.
fn parse_type_param_names(raw: &str) -> Vec<String> {
    let inner = raw.trim_start_matches('<').trim_end_matches('>');
    let mut names = Vec::new();
    let mut depth = 0usize;
    let mut current = String::new();
    for c in inner.chars() {
        match c {
            '<' | '(' | '[' => {
                depth += 1;
                current.push(c);
            }
            '>' | ')' | ']' => {
                depth = depth.saturating_sub(1);
                current.push(c);
            }
            ',' if depth == 0 => {
                if let Some(name) = leading_ident(&current) {
                    names.push(name);
                }
                current.clear();
            }
            _ => current.push(c),
        }
    }
    if let Some(name) = leading_ident(&current) {
        names.push(name);
    }
    names
}

fn leading_ident(s: &str) -> Option<String> {
    let trimmed = s.trim_start();
    let end = trimmed
        .find(|c: char| !c.is_alphanumeric() && c != '_')
        .unwrap_or(trimmed.len());
    if end == 0 {
        None
    } else {
        Some(trimmed[..end].to_string())
    }
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_' || b == b'$'
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'$'
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_tagged_template_and_class() {
        let src = "import { hbs } from '@veneer/dsl';\n\
                   export default class Banner extends Component {\n\
                   \x20 static template = hbs`{{@title}}`;\n\
                   }\n";
        let shape = scan_script(src, "hbs");
        assert_eq!(shape.inline_templates.len(), 1);
        assert_eq!(shape.classes.len(), 1);

        let class = &shape.classes[0];
        assert_eq!(class.name.as_ref().unwrap().0, "Banner");
        assert!(class.is_default_export);

        let inline = &shape.inline_templates[0];
        assert_eq!(inline.class, Some(0));
        assert_eq!(&src[inline.contents.start..inline.contents.end], "{{@title}}");
        assert!(src[inline.full.start..inline.full.end].starts_with("hbs`"));
    }

    #[test]
    fn ignores_tags_inside_strings_and_comments() {
        let src = "const a = 'hbs`not one`';\n// hbs`nope`\n/* hbs`still no` */\nconst b = `plain ${x} literal`;\n";
        let shape = scan_script(src, "hbs");
        assert!(shape.inline_templates.is_empty());
    }

    #[test]
    fn anonymous_class_has_no_name() {
        let src = "export default class extends Component { static template = hbs``; }";
        let shape = scan_script(src, "hbs");
        assert_eq!(shape.classes.len(), 1);
        assert!(shape.classes[0].name.is_none());
        assert!(shape.classes[0].is_default_export);
        assert_eq!(shape.inline_templates[0].class, Some(0));
    }

    #[test]
    fn captures_type_parameters() {
        let src = "export default class List<K extends string, V> { static template = hbs``; }";
        let shape = scan_script(src, "hbs");
        let class = &shape.classes[0];
        assert_eq!(class.type_params.as_deref(), Some("<K extends string, V>"));
        assert_eq!(class.type_param_names, vec!["K", "V"]);
        assert_eq!(class.applied_name().unwrap(), "List<K, V>");
    }

    #[test]
    fn tracks_class_body_extent() {
        let src = "class A { x() { return 1; } }\nconst t = hbs`{{x}}`;";
        let shape = scan_script(src, "hbs");
        let class = &shape.classes[0];
        assert_eq!(class.body_end, src.find("} }").unwrap() + 2);
        // The template outside the class has no enclosing class
        assert_eq!(shape.inline_templates[0].class, None);
    }

    #[test]
    fn sibling_templates_found_in_order() {
        let src = "const a = hbs`{{@x}}`;\nconst b = hbs`{{@y}}`;";
        let shape = scan_script(src, "hbs");
        assert_eq!(shape.inline_templates.len(), 2);
        assert!(shape.inline_templates[0].full.end <= shape.inline_templates[1].full.start);
    }
}
