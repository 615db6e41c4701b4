use crate::markup::{NodeId, ParseNode, ParseTree};

/// A maximal text slice together with the tags enclosing it, outermost first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Run<'a> {
    pub context: Vec<&'a str>,
    pub text: &'a str,
}

enum Visit {
    Node(NodeId),
    Leave,
}

/// Flattens the tree into runs in document pre-order. The root element does
/// not contribute to the context and empty text nodes are dropped.
pub fn flatten(tree: &ParseTree) -> Vec<Run<'_>> {
    let mut runs = Vec::new();
    let mut context: Vec<&str> = Vec::new();
    let mut pending = vec![Visit::Node(tree.root())];

    while let Some(visit) = pending.pop() {
        let id = match visit {
            Visit::Leave => {
                context.pop();
                continue;
            }
            Visit::Node(id) => id,
        };
        match tree.node(id) {
            ParseNode::Text(text) => {
                if !text.is_empty() {
                    runs.push(Run {
                        context: context.clone(),
                        text,
                    });
                }
            }
            ParseNode::Element { name, children } => {
                if id != tree.root() {
                    context.push(name);
                    pending.push(Visit::Leave);
                }
                pending.extend(children.iter().rev().map(|child| Visit::Node(*child)));
            }
        }
    }
    runs
}
