//! Read-only document tree abstraction.
//!
//! The engine never owns or mutates documents. It walks them through the
//! [`DocumentTree`] trait and refers to nodes by [`NodeId`] handles, which
//! stay valid for as long as the tree they came from.

mod tree;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::{DefinitionKind, DefinitionRef};

pub use tree::{Document, DocumentBuilder, NodeSpec};

/// Non-owning handle to a node of a [`DocumentTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u32);

impl NodeId {
    /// Position of the node in its tree's storage.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A document instance: assemblies, fields, and flags in document order.
///
/// Implementations must be immutable for the duration of a validation run
/// and must return sequences in a stable document order.
pub trait DocumentTree: Sync {
    /// The document root.
    fn root(&self) -> NodeId;

    /// Child assemblies and fields of a node.
    fn children(&self, node: NodeId) -> &[NodeId];

    /// Flags of a node.
    fn flags(&self, node: NodeId) -> &[NodeId];

    /// Structural parent; `None` for the root.
    fn parent(&self, node: NodeId) -> Option<NodeId>;

    /// Scalar value of a field or flag; `None` when the node has no value.
    fn string_value(&self, node: NodeId) -> Option<&str>;

    /// Definition the node is an instance of.
    fn definition(&self, node: NodeId) -> &DefinitionRef;

    /// Name of the node as it appears in the document.
    fn name(&self, node: NodeId) -> &str;

    /// Structural kind of the node.
    fn kind(&self, node: NodeId) -> DefinitionKind {
        self.definition(node).kind
    }

    /// Human-readable location of a node, e.g. `/catalog/group[2]/@id`.
    fn display_path(&self, node: NodeId) -> String {
        let mut segments = Vec::new();
        let mut current = Some(node);
        while let Some(n) = current {
            let parent = self.parent(n);
            let segment = match (self.kind(n), parent) {
                (DefinitionKind::Flag, _) => format!("@{}", self.name(n)),
                (_, Some(p)) => {
                    let name = self.name(n);
                    let same_name: Vec<NodeId> = self
                        .children(p)
                        .iter()
                        .copied()
                        .filter(|c| self.name(*c) == name)
                        .collect();
                    match same_name.iter().position(|c| *c == n) {
                        Some(pos) if same_name.len() > 1 => format!("{}[{}]", name, pos + 1),
                        _ => name.to_string(),
                    }
                }
                (_, None) => self.name(n).to_string(),
            };
            segments.push(segment);
            current = parent;
        }
        segments.reverse();
        format!("/{}", segments.join("/"))
    }

    /// Every node in document order: a node, then its flags, then its children.
    fn walk(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![self.root()];
        while let Some(node) = stack.pop() {
            out.push(node);
            out.extend_from_slice(self.flags(node));
            stack.extend(self.children(node).iter().rev().copied());
        }
        out
    }
}
