use crate::tree::{NodeId, XmlAttr, XmlDeclaration, XmlNode, XmlNodeType, is_valid_name};

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum DocumentError {
    #[error("node {0} does not belong to this document")]
    UnknownNode(NodeId),
    #[error("node {0} is not an element")]
    NotAnElement(NodeId),
    #[error("document already has a root element")]
    MultipleRootElements,
    #[error("{0:?} is not a valid XML name")]
    InvalidName(String),
    #[error("node {0} is already attached")]
    AlreadyAttached(NodeId),
    #[error("node {node} cannot be attached beneath its own descendant {parent}")]
    Cycle { node: NodeId, parent: NodeId },
}

/// Rust-owned XML document.
///
/// Every node lives in `node_storage` and is addressed by its [`NodeId`];
/// ids stay valid for the lifetime of the document because nodes are never
/// removed. The document itself is the implicit parent of its top-level
/// children.
#[derive(Debug, Default, Clone)]
pub struct XmlDocument {
    declaration: Option<XmlDeclaration>,
    children: Vec<NodeId>,
    node_storage: Vec<XmlNode>,
}

impl XmlDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.declaration.is_none() && self.children.is_empty()
    }

    pub fn declaration(&self) -> Option<&XmlDeclaration> {
        self.declaration.as_ref()
    }

    /// Replace the document declaration. Serialisation always emits it first.
    pub fn set_declaration(&mut self, declaration: XmlDeclaration) {
        self.declaration = Some(declaration);
    }

    /// Top-level children of the document, in insertion order.
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn root_element(&self) -> Option<NodeId> {
        self.children
            .iter()
            .copied()
            .find(|id| self.node_storage[id.0].is_element())
    }

    pub fn node(&self, id: NodeId) -> Option<&XmlNode> {
        self.node_storage.get(id.0)
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.node_storage.len()
    }

    /// Allocate a detached element. Fails if `name` is not an XML `Name`.
    pub fn alloc_element(&mut self, name: &str) -> Result<NodeId, DocumentError> {
        check_name(name)?;
        Ok(self.alloc_node(XmlNode::element(name)))
    }

    /// Allocate a detached text or CDATA node.
    pub fn alloc_text_node(&mut self, content: &str, node_type: XmlNodeType) -> NodeId {
        debug_assert!(node_type != XmlNodeType::ElementNode);
        self.alloc_node(XmlNode::character_data(content, node_type))
    }

    fn alloc_node(&mut self, node: XmlNode) -> NodeId {
        let id = NodeId(self.node_storage.len());
        self.node_storage.push(node);
        id
    }

    /// Create an element and append it under `parent` (or the document) in
    /// one step. Nothing is allocated unless the append succeeds.
    pub fn append_element(
        &mut self,
        parent: Option<NodeId>,
        name: &str,
    ) -> Result<NodeId, DocumentError> {
        check_name(name)?;
        self.check_parent(parent, true)?;
        let id = self.alloc_node(XmlNode::element(name));
        self.link(parent, id);
        Ok(id)
    }

    /// Create a text or CDATA node and append it under `parent`.
    pub fn append_text(
        &mut self,
        parent: NodeId,
        content: &str,
        node_type: XmlNodeType,
    ) -> Result<NodeId, DocumentError> {
        self.check_parent(Some(parent), false)?;
        let id = self.alloc_text_node(content, node_type);
        self.link(Some(parent), id);
        Ok(id)
    }

    fn element(&self, id: NodeId) -> Result<&XmlNode, DocumentError> {
        let node = self.node(id).ok_or(DocumentError::UnknownNode(id))?;
        if !node.is_element() {
            return Err(DocumentError::NotAnElement(id));
        }
        Ok(node)
    }

    fn check_parent(
        &self,
        parent: Option<NodeId>,
        child_is_element: bool,
    ) -> Result<(), DocumentError> {
        match parent {
            Some(parent_id) => self.element(parent_id).map(|_| ()),
            None if child_is_element && self.root_element().is_some() => {
                Err(DocumentError::MultipleRootElements)
            }
            None => Ok(()),
        }
    }

    fn is_attached(&self, id: NodeId) -> bool {
        self.node_storage[id.0].parent.is_some() || self.children.contains(&id)
    }

    fn link(&mut self, parent: Option<NodeId>, child: NodeId) {
        match parent {
            Some(parent_id) => self.node_storage[parent_id.0].children.push(child),
            None => self.children.push(child),
        }
        self.node_storage[child.0].parent = parent;
    }

    /// Append the detached node `child` as the last child of `parent`, or of
    /// the document when `parent` is `None`. The document accepts at most one
    /// element, and a node cannot be attached twice or beneath itself.
    pub fn attach_child(
        &mut self,
        parent: Option<NodeId>,
        child: NodeId,
    ) -> Result<(), DocumentError> {
        let child_is_element = self
            .node(child)
            .ok_or(DocumentError::UnknownNode(child))?
            .is_element();
        self.check_parent(parent, child_is_element)?;

        if self.is_attached(child) {
            return Err(DocumentError::AlreadyAttached(child));
        }

        if let Some(parent_id) = parent {
            // Parent links are acyclic, so the walk ends at a detached node
            // or the document.
            let mut ancestor = Some(parent_id);
            while let Some(id) = ancestor {
                if id == child {
                    return Err(DocumentError::Cycle {
                        node: child,
                        parent: parent_id,
                    });
                }
                ancestor = self.node_storage[id.0].parent;
            }
        }

        self.link(parent, child);
        Ok(())
    }

    /// Insert or overwrite the attribute `name` on `element`, keeping the
    /// position of an existing attribute.
    pub fn set_attribute(
        &mut self,
        element: NodeId,
        name: &str,
        value: &str,
    ) -> Result<(), DocumentError> {
        check_name(name)?;
        self.element(element)?;
        let node = &mut self.node_storage[element.0];
        match node.attributes.iter_mut().find(|attr| attr.name == name) {
            Some(existing) => existing.value = value.to_owned(),
            None => node.attributes.push(XmlAttr {
                name: name.to_owned(),
                value: value.to_owned(),
            }),
        }
        Ok(())
    }

    /// Concatenated text and CDATA content beneath `id`, in document order.
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        let mut pending = vec![id];

        while let Some(next) = pending.pop() {
            let Some(node) = self.node(next) else {
                continue;
            };
            match node.type_ {
                XmlNodeType::ElementNode => pending.extend(node.children.iter().rev()),
                XmlNodeType::TextNode | XmlNodeType::CdataSectionNode => {
                    out.push_str(&node.content)
                }
            }
        }

        out
    }
}

fn check_name(name: &str) -> Result<(), DocumentError> {
    if is_valid_name(name) {
        Ok(())
    } else {
        Err(DocumentError::InvalidName(name.to_owned()))
    }
}
