/// Nested position mappings between original and transformed text
///
/// Mappings form a tree: a template's mustache, its path expression, and the
/// path's identifier segments each get their own nested span. The tree is
/// stored as an arena of records with parent-index back-references, which
/// keeps traversal and re-basing simple.

use veneer_syntax::Range;

/// What kind of construct a mapping node corresponds to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MappingKind {
    Template,
    Mustache,
    Block,
    Element,
    Attribute,
    SubExpression,
    PathExpression,
    Identifier,
}

impl MappingKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MappingKind::Template => "Template",
            MappingKind::Mustache => "Mustache",
            MappingKind::Block => "Block",
            MappingKind::Element => "Element",
            MappingKind::Attribute => "Attribute",
            MappingKind::SubExpression => "SubExpression",
            MappingKind::PathExpression => "PathExpression",
            MappingKind::Identifier => "Identifier",
        }
    }
}

/// One record in the mapping arena. `original` and `transformed` are kept in
/// whatever coordinate space the owning structure has re-based them to.
#[derive(Debug, Clone, PartialEq)]
pub struct MappingNode {
    pub kind: MappingKind,
    pub original: Range,
    pub transformed: Range,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
}

/// An arena of mapping records. Node 0, when present, is the root; children
/// are recorded in emission order, so sibling transformed ranges ascend.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MappingTree {
    nodes: Vec<MappingNode>,
}

impl MappingTree {
    pub fn new() -> Self {
        MappingTree::default()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn root(&self) -> Option<&MappingNode> {
        self.nodes.first()
    }

    pub fn node(&self, index: usize) -> &MappingNode {
        &self.nodes[index]
    }

    pub fn nodes(&self) -> impl Iterator<Item = &MappingNode> {
        self.nodes.iter()
    }

    /// Open a node whose transformed range is not yet known. The caller must
    /// close it with `complete` once its output has been emitted.
    pub fn reserve(&mut self, kind: MappingKind, original: Range, parent: Option<usize>) -> usize {
        let index = self.nodes.len();
        self.nodes.push(MappingNode {
            kind,
            original,
            transformed: Range::default(),
            parent,
            children: Vec::new(),
        });
        if let Some(p) = parent {
            self.nodes[p].children.push(index);
        }
        index
    }

    pub fn complete(&mut self, index: usize, transformed: Range) {
        self.nodes[index].transformed = transformed;
    }

    /// Shift every node by the given deltas, moving template-local and
    /// emit-local coordinates into module coordinates.
    pub fn rebase(&mut self, original_delta: usize, transformed_delta: usize) {
        for node in &mut self.nodes {
            node.original = node.original.shifted(original_delta);
            node.transformed = node.transformed.shifted(transformed_delta);
        }
    }

    /// Override the root's original range. Used by the module assembler so a
    /// template's root span covers the full embedded construct, delimiters
    /// included.
    pub fn set_root_original(&mut self, original: Range) {
        if let Some(root) = self.nodes.first_mut() {
            root.original = original;
        }
    }

    /// The deepest node whose transformed range contains `offset`.
    pub fn innermost_by_transformed(&self, offset: usize) -> Option<&MappingNode> {
        self.innermost(offset, |node| node.transformed)
    }

    /// The deepest node whose original range contains `offset`.
    pub fn innermost_by_original(&self, offset: usize) -> Option<&MappingNode> {
        self.innermost(offset, |node| node.original)
    }

    fn innermost(&self, offset: usize, side: impl Fn(&MappingNode) -> Range) -> Option<&MappingNode> {
        let root = self.nodes.first()?;
        if !side(root).contains(offset) {
            return None;
        }
        let mut index = 0;
        'descend: loop {
            for &child in &self.nodes[index].children {
                let range = side(&self.nodes[child]);
                if !range.is_empty() && range.contains(offset) {
                    index = child;
                    continue 'descend;
                }
            }
            return Some(&self.nodes[index]);
        }
    }

    /// A nested, human-readable dump of the tree, with excerpts of both
    /// sides of each mapping. Used by tests and debug logging.
    pub fn debug_string(&self, original_src: &str, transformed_src: &str) -> String {
        let mut out = String::new();
        if !self.nodes.is_empty() {
            self.dump_node(0, 1, original_src, transformed_src, &mut out);
        }
        out
    }

    fn dump_node(
        &self,
        index: usize,
        depth: usize,
        original_src: &str,
        transformed_src: &str,
        out: &mut String,
    ) {
        let node = &self.nodes[index];
        let prefix = "| ".repeat(depth);
        out.push_str(&format!("{}Mapping: {}\n", prefix, node.kind.as_str()));
        out.push_str(&format!(
            "{} in({}:{}):  {}\n",
            prefix,
            node.original.start,
            node.original.end,
            excerpt(original_src, node.original)
        ));
        out.push_str(&format!(
            "{} out({}:{}): {}\n",
            prefix,
            node.transformed.start,
            node.transformed.end,
            excerpt(transformed_src, node.transformed)
        ));
        out.push_str(&format!("{}\n", prefix));
        for &child in &node.children {
            self.dump_node(child, depth + 1, original_src, transformed_src, out);
        }
    }
}

fn excerpt(src: &str, range: Range) -> String {
    src.get(range.start..range.end)
        .unwrap_or("")
        .replace('\n', "\\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tree() -> MappingTree {
        // out: generated text 0..60 for template 0..20, with a mustache at
        // in 5..15 -> out 10..40 and an identifier at in 7..13 -> out 25..31.
        let mut tree = MappingTree::new();
        let root = tree.reserve(MappingKind::Template, Range::new(0, 20), None);
        let mustache = tree.reserve(MappingKind::Mustache, Range::new(5, 15), Some(root));
        let ident = tree.reserve(MappingKind::Identifier, Range::new(7, 13), Some(mustache));
        tree.complete(ident, Range::new(25, 31));
        tree.complete(mustache, Range::new(10, 40));
        tree.complete(root, Range::new(0, 60));
        tree
    }

    #[test]
    fn innermost_descends_to_leaves() {
        let tree = sample_tree();
        let node = tree.innermost_by_transformed(27).unwrap();
        assert_eq!(node.kind, MappingKind::Identifier);
        let node = tree.innermost_by_transformed(12).unwrap();
        assert_eq!(node.kind, MappingKind::Mustache);
        let node = tree.innermost_by_transformed(50).unwrap();
        assert_eq!(node.kind, MappingKind::Template);
        assert!(tree.innermost_by_transformed(60).is_none());
    }

    #[test]
    fn innermost_by_original_mirrors_transformed() {
        let tree = sample_tree();
        assert_eq!(
            tree.innermost_by_original(8).unwrap().kind,
            MappingKind::Identifier
        );
        assert_eq!(
            tree.innermost_by_original(5).unwrap().kind,
            MappingKind::Mustache
        );
        assert_eq!(
            tree.innermost_by_original(2).unwrap().kind,
            MappingKind::Template
        );
    }

    #[test]
    fn rebase_shifts_both_sides() {
        let mut tree = sample_tree();
        tree.rebase(100, 1000);
        let root = tree.root().unwrap();
        assert_eq!(root.original, Range::new(100, 120));
        assert_eq!(root.transformed, Range::new(1000, 1060));
    }
}
