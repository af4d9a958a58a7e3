//! In-memory document tree.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::{DocumentTree, NodeId};
use crate::error::Error;
use crate::model::{DefinitionKind, DefinitionRef};

#[derive(Debug, Clone)]
struct NodeData {
    name: String,
    definition: DefinitionRef,
    value: Option<String>,
    parent: Option<NodeId>,
    flags: Vec<NodeId>,
    children: Vec<NodeId>,
}

/// An arena-backed document tree.
///
/// Nodes are stored in creation order; the root is always the first node.
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<NodeData>,
}

impl Document {
    /// Start building a document with a root assembly.
    pub fn builder(root_name: impl Into<String>) -> DocumentBuilder {
        DocumentBuilder::new(root_name)
    }

    /// Build a document from a node description.
    pub fn from_spec(spec: &NodeSpec) -> Result<Self, Error> {
        if spec.kind != DefinitionKind::Assembly {
            return Err(Error::InvalidDocument(format!(
                "document root '{}' must be an assembly, found {}",
                spec.name, spec.kind
            )));
        }
        let mut builder = DocumentBuilder::new(spec.name.clone());
        let root = builder.root();
        builder.apply_spec(root, spec)?;
        Ok(builder.build())
    }

    /// Parse a JSON node description.
    pub fn from_json(json: &str) -> Result<Self, Error> {
        let spec: NodeSpec =
            serde_json::from_str(json).map_err(|e| Error::Deserialization(e.to_string()))?;
        Self::from_spec(&spec)
    }

    /// Number of nodes, flags included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if the document is empty. A built document always has a root.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn node(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.index()]
    }
}

impl DocumentTree for Document {
    fn root(&self) -> NodeId {
        NodeId(0)
    }

    fn children(&self, node: NodeId) -> &[NodeId] {
        &self.node(node).children
    }

    fn flags(&self, node: NodeId) -> &[NodeId] {
        &self.node(node).flags
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.node(node).parent
    }

    fn string_value(&self, node: NodeId) -> Option<&str> {
        self.node(node).value.as_deref()
    }

    fn definition(&self, node: NodeId) -> &DefinitionRef {
        &self.node(node).definition
    }

    fn name(&self, node: NodeId) -> &str {
        &self.node(node).name
    }
}

/// Incrementally builds a [`Document`].
///
/// Each node's definition defaults to its kind and name; use
/// [`set_definition`](Self::set_definition) when an instance name differs
/// from its definition name.
#[derive(Debug)]
pub struct DocumentBuilder {
    nodes: Vec<NodeData>,
}

impl DocumentBuilder {
    /// Create a builder with a root assembly.
    pub fn new(root_name: impl Into<String>) -> Self {
        let name = root_name.into();
        Self {
            nodes: vec![NodeData {
                definition: DefinitionRef::assembly(name.clone()),
                name,
                value: None,
                parent: None,
                flags: Vec::new(),
                children: Vec::new(),
            }],
        }
    }

    /// The root node.
    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    fn push(
        &mut self,
        parent: NodeId,
        kind: DefinitionKind,
        name: String,
        value: Option<String>,
    ) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(NodeData {
            definition: DefinitionRef::new(kind, name.clone()),
            name,
            value,
            parent: Some(parent),
            flags: Vec::new(),
            children: Vec::new(),
        });
        let parent = &mut self.nodes[parent.index()];
        match kind {
            DefinitionKind::Flag => parent.flags.push(id),
            _ => parent.children.push(id),
        }
        id
    }

    /// Add a child assembly.
    pub fn assembly(&mut self, parent: NodeId, name: impl Into<String>) -> NodeId {
        self.push(parent, DefinitionKind::Assembly, name.into(), None)
    }

    /// Add a child field with a value.
    pub fn field(
        &mut self,
        parent: NodeId,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> NodeId {
        self.push(parent, DefinitionKind::Field, name.into(), Some(value.into()))
    }

    /// Add a flag with a value.
    pub fn flag(
        &mut self,
        parent: NodeId,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> NodeId {
        self.push(parent, DefinitionKind::Flag, name.into(), Some(value.into()))
    }

    /// Override the definition a node is an instance of.
    pub fn set_definition(&mut self, node: NodeId, definition: DefinitionRef) -> &mut Self {
        self.nodes[node.index()].definition = definition;
        self
    }

    fn apply_spec(&mut self, node: NodeId, spec: &NodeSpec) -> Result<(), Error> {
        if let Some(def) = &spec.definition {
            let definition = DefinitionRef::new(spec.kind, def.clone());
            self.set_definition(node, definition);
        }
        self.nodes[node.index()].value = spec.value.clone();

        for (name, value) in &spec.flags {
            self.flag(node, name.clone(), value.clone());
        }
        for child in &spec.children {
            let id = match child.kind {
                DefinitionKind::Assembly => self.assembly(node, child.name.clone()),
                DefinitionKind::Field => {
                    self.push(node, DefinitionKind::Field, child.name.clone(), None)
                }
                DefinitionKind::Flag => {
                    return Err(Error::InvalidDocument(format!(
                        "flag '{}' must be declared in 'flags', not 'children'",
                        child.name
                    )))
                }
            };
            self.apply_spec(id, child)?;
        }
        Ok(())
    }

    /// Finish building.
    pub fn build(self) -> Document {
        Document { nodes: self.nodes }
    }
}

/// Serializable description of a document node.
///
/// ```json
/// { "kind": "assembly", "name": "catalog",
///   "flags": { "uuid": "..." },
///   "children": [ { "kind": "field", "name": "title", "value": "Demo" } ] }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSpec {
    /// Assembly or field.
    pub kind: DefinitionKind,
    /// Instance name.
    pub name: String,
    /// Definition name when it differs from the instance name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definition: Option<String>,
    /// Field value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Flags in document order.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub flags: IndexMap<String, String>,
    /// Child assemblies and fields in document order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeSpec>,
}
