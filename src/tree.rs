// libxml2-builder/src/tree.rs

// Node records stored in the document arena: type tags, ids, attributes and
// the XML declaration.

use std::fmt;
use std::str::FromStr;

pub const DEFAULT_VERSION: &str = "1.0";
pub const DEFAULT_ENCODING: &str = "utf-8";

// Discriminants follow libxml2's xmlElementType for the kinds we produce.
#[repr(C)]
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum XmlNodeType {
    ElementNode = 1,
    TextNode = 3,
    CdataSectionNode = 4,
}

/// Stable index of a node inside its owning [`crate::doc::XmlDocument`].
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct XmlAttr {
    pub name: String,
    pub value: String,
}

/// A single node. Elements use `name`, `attributes` and `children`; text and
/// CDATA nodes only carry `content`.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct XmlNode {
    pub type_: XmlNodeType,
    pub name: String,
    pub content: String,
    pub attributes: Vec<XmlAttr>,
    pub children: Vec<NodeId>,
    /// `None` when the node hangs directly off the document (or is detached).
    pub parent: Option<NodeId>,
}

impl XmlNode {
    pub(crate) fn element(name: &str) -> Self {
        XmlNode {
            type_: XmlNodeType::ElementNode,
            name: name.to_owned(),
            content: String::new(),
            attributes: Vec::new(),
            children: Vec::new(),
            parent: None,
        }
    }

    pub(crate) fn character_data(content: &str, type_: XmlNodeType) -> Self {
        XmlNode {
            type_,
            name: String::new(),
            content: content.to_owned(),
            attributes: Vec::new(),
            children: Vec::new(),
            parent: None,
        }
    }

    pub fn is_element(&self) -> bool {
        self.type_ == XmlNodeType::ElementNode
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|attr| attr.name == name)
            .map(|attr| attr.value.as_str())
    }
}

// NameStartChar from XML 1.0 (fifth edition), production [4].
fn is_name_start_char(c: char) -> bool {
    matches!(c,
        ':' | 'A'..='Z' | '_' | 'a'..='z'
        | '\u{C0}'..='\u{D6}'
        | '\u{D8}'..='\u{F6}'
        | '\u{F8}'..='\u{2FF}'
        | '\u{370}'..='\u{37D}'
        | '\u{37F}'..='\u{1FFF}'
        | '\u{200C}'..='\u{200D}'
        | '\u{2070}'..='\u{218F}'
        | '\u{2C00}'..='\u{2FEF}'
        | '\u{3001}'..='\u{D7FF}'
        | '\u{F900}'..='\u{FDCF}'
        | '\u{FDF0}'..='\u{FFFD}'
        | '\u{10000}'..='\u{EFFFF}')
}

// NameChar, production [4a].
fn is_name_char(c: char) -> bool {
    is_name_start_char(c)
        || matches!(c,
            '-' | '.' | '0'..='9' | '\u{B7}'
            | '\u{300}'..='\u{36F}'
            | '\u{203F}'..='\u{2040}')
}

/// Whether `name` matches the XML `Name` production.
pub fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if is_name_start_char(first) => chars.all(is_name_char),
        _ => false,
    }
}

/// The `standalone` pseudo-attribute of the XML declaration.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub enum Standalone {
    Yes,
    No,
    #[default]
    Unspecified,
}

impl Standalone {
    pub fn as_str(self) -> &'static str {
        match self {
            Standalone::Yes => "yes",
            Standalone::No => "no",
            Standalone::Unspecified => "",
        }
    }

    /// libxml2's `xmlDoc.standalone` encoding: 1 yes, 0 no, -1 absent.
    pub fn as_c_int(self) -> i32 {
        match self {
            Standalone::Yes => 1,
            Standalone::No => 0,
            Standalone::Unspecified => -1,
        }
    }

    pub fn from_c_int(value: i32) -> Option<Self> {
        [Standalone::Yes, Standalone::No, Standalone::Unspecified]
            .into_iter()
            .find(|standalone| standalone.as_c_int() == value)
    }
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct UnknownStandalone(pub String);

impl fmt::Display for UnknownStandalone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "standalone must be \"yes\", \"no\" or empty, got {:?}", self.0)
    }
}

impl FromStr for Standalone {
    type Err = UnknownStandalone;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "yes" => Ok(Standalone::Yes),
            "no" => Ok(Standalone::No),
            "" => Ok(Standalone::Unspecified),
            other => Err(UnknownStandalone(other.to_owned())),
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct XmlDeclaration {
    pub version: String,
    pub encoding: String,
    pub standalone: Standalone,
}

impl XmlDeclaration {
    pub fn new(version: &str, encoding: &str, standalone: Standalone) -> Self {
        XmlDeclaration {
            version: version.to_owned(),
            encoding: encoding.to_owned(),
            standalone,
        }
    }
}

impl Default for XmlDeclaration {
    fn default() -> Self {
        XmlDeclaration::new(DEFAULT_VERSION, DEFAULT_ENCODING, Standalone::Unspecified)
    }
}
