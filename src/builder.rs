//! Fluent, scope-tracking XML builder.
//!
//! [`ScopedBuilder`] keeps an insertion point while callers issue a flat
//! sequence of calls. New elements become siblings at the current level
//! unless [`ScopedBuilder::within`] was called first, in which case the
//! element created last becomes the container for what follows.
//!
//! ```text
//! b.create_node("a")?            // <a/> is the root, scope = [a]
//!  .within()
//!  .create_node("b")?            // scope = [a, a], b inside a
//!  .create_node("c")?            // c inside a, sibling of b
//!  .end_within()?;               // scope = [a]
//! ```

use crate::doc::XmlDocument;
use crate::error::{BuilderError, BuilderResult};
use crate::save::dump_document;
use crate::tree::{NodeId, Standalone, XmlDeclaration, XmlNodeType};
use libc::c_int;
use log::{debug, trace, warn};
use std::fmt::Display;

/// Where the builder stands with respect to the document prolog.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum BuildPhase {
    /// Nothing has been added yet.
    Empty,
    /// A declaration exists but no element.
    Declared,
    /// At least one element exists.
    Building,
}

/// How the next created element is placed.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ScopeIntent {
    /// Append under the current top of the scope stack.
    Sibling,
    /// Push the current node before appending the next element.
    PendingWiden,
    /// The last creation opened a new scope level.
    Widened,
}

#[derive(Debug, Clone)]
pub struct BuilderOptions {
    /// Declaration synthesised when the first element is created without an
    /// explicit one.
    pub default_declaration: XmlDeclaration,
    /// `XML_SAVE_*` flags used by [`ScopedBuilder::render`].
    pub save_options: c_int,
}

impl Default for BuilderOptions {
    fn default() -> Self {
        BuilderOptions {
            default_declaration: XmlDeclaration::default(),
            save_options: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScopedBuilder {
    doc: XmlDocument,
    options: BuilderOptions,
    phase: BuildPhase,
    intent: ScopeIntent,
    scopes: Vec<NodeId>,
    current: Option<NodeId>,
}

impl Default for ScopedBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ScopedBuilder {
    pub fn new() -> Self {
        Self::with_options(BuilderOptions::default())
    }

    pub fn with_options(options: BuilderOptions) -> Self {
        ScopedBuilder {
            doc: XmlDocument::new(),
            options,
            phase: BuildPhase::Empty,
            intent: ScopeIntent::Sibling,
            scopes: Vec::new(),
            current: None,
        }
    }

    /// Attach an XML declaration. Only valid before any element is created
    /// and only once per document.
    pub fn declaration(
        &mut self,
        version: &str,
        encoding: &str,
        standalone: Standalone,
    ) -> BuilderResult<&mut Self> {
        match self.phase {
            BuildPhase::Empty => {}
            BuildPhase::Declared => {
                warn!(target: "xml2::builder", "declaration added twice");
                return Err(BuilderError::invalid_state(
                    "the document already has a declaration",
                ));
            }
            BuildPhase::Building => {
                warn!(target: "xml2::builder", "declaration added after content");
                return Err(BuilderError::invalid_state(
                    "a declaration must precede the first node",
                ));
            }
        }

        self.doc
            .set_declaration(XmlDeclaration::new(version, encoding, standalone));
        self.phase = BuildPhase::Declared;
        trace!(target: "xml2::builder", "declaration version={version} encoding={encoding}");
        Ok(self)
    }

    /// Like [`ScopedBuilder::declaration`], with the standalone flag given
    /// in its textual form (`"yes"`, `"no"` or `""`).
    pub fn declaration_str(
        &mut self,
        version: &str,
        encoding: &str,
        standalone: &str,
    ) -> BuilderResult<&mut Self> {
        let standalone = standalone
            .parse::<Standalone>()
            .map_err(|err| BuilderError::invalid_state(err.to_string()))?;
        self.declaration(version, encoding, standalone)
    }

    /// Declaration with version `1.0`, encoding `utf-8` and no standalone.
    pub fn declaration_default(&mut self) -> BuilderResult<&mut Self> {
        let XmlDeclaration {
            version,
            encoding,
            standalone,
        } = XmlDeclaration::default();
        self.declaration(&version, &encoding, standalone)
    }

    /// Create an element and make it the current node.
    ///
    /// The element is appended before any builder state changes, so a
    /// failure (an invalid name, or a root already attached through
    /// [`document_mut`](Self::document_mut)) leaves the builder untouched.
    pub fn create_node(&mut self, name: &str) -> BuilderResult<&mut Self> {
        let top = self.scopes.last().copied();
        let widen = top.is_some() && self.intent == ScopeIntent::PendingWiden;
        // A pending widen is only possible once a node exists.
        let parent = match top {
            None => None,
            Some(top) if widen => Some(self.current.unwrap_or(top)),
            Some(top) => Some(top),
        };

        let node = self.doc.append_element(parent, name)?;

        match parent {
            None => {
                if self.phase == BuildPhase::Empty {
                    debug!(target: "xml2::builder", "synthesising default declaration");
                    self.doc
                        .set_declaration(self.options.default_declaration.clone());
                }
                self.scopes.push(node);
                trace!(target: "xml2::builder", "root <{name}> depth=1");
            }
            Some(parent) => {
                if widen {
                    self.scopes.push(parent);
                    self.intent = ScopeIntent::Widened;
                    trace!(
                        target: "xml2::builder",
                        "widen into {parent} depth={}",
                        self.scopes.len()
                    );
                }
                trace!(target: "xml2::builder", "<{name}> under {parent}");
            }
        }

        self.phase = BuildPhase::Building;
        self.current = Some(node);
        Ok(self)
    }

    /// Make the next created element open a new scope under the current
    /// node.
    pub fn within(&mut self) -> &mut Self {
        self.intent = ScopeIntent::PendingWiden;
        self
    }

    /// Cancel a pending [`within`](Self::within), or close the innermost
    /// scope.
    ///
    /// The root scope cannot be closed: doing so, like calling this on an
    /// empty builder, fails with [`BuilderError::ScopeUnderflow`].
    pub fn end_within(&mut self) -> BuilderResult<&mut Self> {
        if self.intent == ScopeIntent::PendingWiden {
            self.intent = ScopeIntent::Sibling;
            trace!(target: "xml2::builder", "pending widen cancelled");
            return Ok(self);
        }

        if self.scopes.len() <= 1 {
            warn!(
                target: "xml2::builder",
                "end_within with depth {}",
                self.scopes.len()
            );
            return Err(BuilderError::ScopeUnderflow);
        }

        self.scopes.pop();
        self.intent = ScopeIntent::Sibling;
        trace!(target: "xml2::builder", "scope closed depth={}", self.scopes.len());
        Ok(self)
    }

    /// Disposal hook: one [`end_within`](Self::end_within).
    pub fn release_scope(&mut self) -> BuilderResult<&mut Self> {
        self.end_within()
    }

    /// Run `body` inside a new scope, closing it on every exit path.
    ///
    /// An error from `body` takes precedence over one from closing the
    /// scope.
    pub fn scoped<T, F>(&mut self, body: F) -> BuilderResult<T>
    where
        F: FnOnce(&mut Self) -> BuilderResult<T>,
    {
        self.within();
        let result = body(self);
        let closed = self.release_scope().map(|_| ());
        match result {
            Ok(value) => closed.map(|()| value),
            Err(err) => Err(err),
        }
    }

    /// Append text to the current node, as CDATA.
    pub fn set_text(&mut self, value: &str) -> BuilderResult<&mut Self> {
        self.set_text_with(value, true)
    }

    /// Append text to the current node, as a CDATA section when `use_cdata`
    /// is set and as escaped character data otherwise.
    pub fn set_text_with(&mut self, value: &str, use_cdata: bool) -> BuilderResult<&mut Self> {
        let current = self.require_current("set_text")?;
        let node_type = if use_cdata {
            XmlNodeType::CdataSectionNode
        } else {
            XmlNodeType::TextNode
        };
        self.doc.append_text(current, value, node_type)?;
        Ok(self)
    }

    /// Set (or overwrite) an attribute on the current node. The value is
    /// stored in its `Display` form.
    pub fn set_attribute<V: Display>(&mut self, name: &str, value: V) -> BuilderResult<&mut Self> {
        let current = self.require_current("set_attribute")?;
        self.doc.set_attribute(current, name, &value.to_string())?;
        Ok(self)
    }

    fn require_current(&self, operation: &str) -> BuilderResult<NodeId> {
        self.current.ok_or_else(|| {
            warn!(target: "xml2::builder", "{operation} before any node");
            BuilderError::invalid_state(format!("{operation} requires a node to be created first"))
        })
    }

    /// Serialise the document using the configured save options.
    pub fn render(&self) -> String {
        self.render_with(self.options.save_options)
    }

    pub fn render_with(&self, save_options: c_int) -> String {
        dump_document(&self.doc, save_options)
    }

    pub fn document(&self) -> &XmlDocument {
        &self.doc
    }

    pub fn document_mut(&mut self) -> &mut XmlDocument {
        &mut self.doc
    }

    pub fn into_document(self) -> XmlDocument {
        self.doc
    }

    pub fn current(&self) -> Option<NodeId> {
        self.current
    }

    /// Number of open scope frames.
    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    pub fn phase(&self) -> BuildPhase {
        self.phase
    }

    pub fn intent(&self) -> ScopeIntent {
        self.intent
    }
}
