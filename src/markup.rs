use crate::error::DrawTextError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseNode {
    Text(String),
    Element { name: String, children: Vec<NodeId> },
}

/// Arena-backed parse tree. Node 0 is the implicit, unnamed root element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseTree {
    nodes: Vec<ParseNode>,
}

impl ParseTree {
    fn new() -> Self {
        Self {
            nodes: vec![ParseNode::Element {
                name: String::new(),
                children: Vec::new(),
            }],
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn node(&self, id: NodeId) -> &ParseNode {
        &self.nodes[id.0]
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// True when the input held no text and no tags.
    pub fn is_empty(&self) -> bool {
        self.children(self.root()).is_empty()
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        match &self.nodes[id.0] {
            ParseNode::Element { children, .. } => children,
            ParseNode::Text(_) => &[],
        }
    }

    fn append(&mut self, parent: NodeId, node: ParseNode) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(node);
        if let ParseNode::Element { children, .. } = &mut self.nodes[parent.0] {
            children.push(id);
        }
        id
    }

    fn name(&self, id: NodeId) -> Option<&str> {
        match &self.nodes[id.0] {
            ParseNode::Element { name, .. } if id.0 != 0 => Some(name),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Tag<'a> {
    start: usize,
    end: usize,
    name: &'a str,
    closing: bool,
}

/// Finds the next `<name>` or `</name>` token at or after `pos`. The name is
/// everything up to the first `>`; `<>` and a `<` with no `>` are plain text.
fn next_tag(text: &str, pos: usize) -> Option<Tag<'_>> {
    let bytes = text.as_bytes();
    let mut cursor = pos;
    while let Some(offset) = text[cursor..].find('<') {
        let start = cursor + offset;
        let gt = start + 1 + text[start + 1..].find('>')?;
        if gt > start + 1 {
            let body = &text[start + 1..gt];
            let closing = bytes[start + 1] == b'/' && body.len() > 1;
            let name = if closing { &body[1..] } else { body };
            // `</>` is a close tag named "/".
            let closing = closing || body == "/";
            return Some(Tag {
                start,
                end: gt + 1,
                name,
                closing,
            });
        }
        cursor = start + 1;
    }
    None
}

/// Parses inline markup into a tree. Tags must nest with stack discipline;
/// there are no attributes, self-closing tags or escapes.
pub fn parse_markup(text: &str) -> Result<ParseTree, DrawTextError> {
    let mut tree = ParseTree::new();
    let mut stack = vec![tree.root()];
    let mut pos = 0;

    while let Some(tag) = next_tag(text, pos) {
        let top = *stack.last().unwrap_or(&tree.root());
        if tag.start > pos {
            tree.append(top, ParseNode::Text(text[pos..tag.start].to_string()));
        }
        if tag.closing {
            let open = if stack.len() > 1 { stack.pop() } else { None };
            let expected = open.and_then(|id| tree.name(id));
            if expected != Some(tag.name) {
                return Err(DrawTextError::MismatchedTag {
                    expected: expected.map(str::to_string),
                    found: tag.name.to_string(),
                });
            }
        } else {
            let id = tree.append(
                top,
                ParseNode::Element {
                    name: tag.name.to_string(),
                    children: Vec::new(),
                },
            );
            stack.push(id);
        }
        pos = tag.end;
    }

    if let Some(&innermost) = stack.get(1..).and_then(|open| open.last()) {
        return Err(DrawTextError::UnclosedTag {
            name: tree.name(innermost).unwrap_or_default().to_string(),
        });
    }
    if pos < text.len() {
        let root = tree.root();
        tree.append(root, ParseNode::Text(text[pos..].to_string()));
    }
    Ok(tree)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_of(tree: &ParseTree, id: NodeId) -> &str {
        match tree.node(id) {
            ParseNode::Text(text) => text,
            other => panic!("expected text node, got {other:?}"),
        }
    }

    fn name_of(tree: &ParseTree, id: NodeId) -> &str {
        match tree.node(id) {
            ParseNode::Element { name, .. } => name,
            other => panic!("expected element, got {other:?}"),
        }
    }

    #[test]
    fn plain_text_becomes_single_root_child() {
        let tree = parse_markup("hello world").expect("parse");
        let children = tree.children(tree.root());
        assert_eq!(children.len(), 1);
        assert_eq!(text_of(&tree, children[0]), "hello world");
    }

    #[test]
    fn empty_input_has_no_children() {
        let tree = parse_markup("").expect("parse");
        assert!(tree.is_empty());
        assert_eq!(tree.node_count(), 1);
    }

    #[test]
    fn nested_elements_keep_document_order() {
        let tree = parse_markup("a<b>c<i>d</i>e</b>f").expect("parse");
        let root = tree.children(tree.root());
        assert_eq!(root.len(), 3);
        assert_eq!(text_of(&tree, root[0]), "a");
        assert_eq!(name_of(&tree, root[1]), "b");
        assert_eq!(text_of(&tree, root[2]), "f");

        let b = tree.children(root[1]);
        assert_eq!(b.len(), 3);
        assert_eq!(text_of(&tree, b[0]), "c");
        assert_eq!(name_of(&tree, b[1]), "i");
        assert_eq!(text_of(&tree, tree.children(b[1])[0]), "d");
        assert_eq!(text_of(&tree, b[2]), "e");
    }

    #[test]
    fn adjacent_tags_do_not_produce_empty_text() {
        let tree = parse_markup("<a></a><b>x</b>").expect("parse");
        let root = tree.children(tree.root());
        assert_eq!(root.len(), 2);
        assert!(tree.children(root[0]).is_empty());
    }

    #[test]
    fn mismatched_close_tag_fails() {
        let err = parse_markup("<a><b>x</b></c>").expect_err("mismatch");
        match err {
            DrawTextError::MismatchedTag { expected, found } => {
                assert_eq!(expected.as_deref(), Some("a"));
                assert_eq!(found, "c");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn close_tag_at_root_fails() {
        let err = parse_markup("x</a>").expect_err("mismatch");
        assert!(matches!(
            err,
            DrawTextError::MismatchedTag { expected: None, .. }
        ));
    }

    #[test]
    fn missing_close_tag_fails() {
        let err = parse_markup("<a>x").expect_err("unclosed");
        match err {
            DrawTextError::UnclosedTag { name } => assert_eq!(name, "a"),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn tag_names_take_anything_but_gt() {
        let tree = parse_markup("<a b>x</a b>").expect("parse");
        let root = tree.children(tree.root());
        assert_eq!(name_of(&tree, root[0]), "a b");
    }

    #[test]
    fn stray_angle_brackets_stay_text() {
        let tree = parse_markup("1 <> 2 < 3").expect("parse");
        let root = tree.children(tree.root());
        assert_eq!(root.len(), 1);
        assert_eq!(text_of(&tree, root[0]), "1 <> 2 < 3");
    }

    #[test]
    fn lone_slash_is_a_close_tag_named_slash() {
        let err = parse_markup("<a>x</>").expect_err("mismatch");
        match err {
            DrawTextError::MismatchedTag { expected, found } => {
                assert_eq!(expected.as_deref(), Some("a"));
                assert_eq!(found, "/");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn non_ascii_text_is_sliced_on_char_boundaries() {
        let tree = parse_markup("héllo <em>wörld</em>").expect("parse");
        let root = tree.children(tree.root());
        assert_eq!(text_of(&tree, root[0]), "héllo ");
        assert_eq!(text_of(&tree, tree.children(root[1])[0]), "wörld");
    }
}
