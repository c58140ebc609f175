//! Retained XML documents with source-line attribution.
//!
//! The initializer reaches back into parsed documents long after reading
//! them: deferred definitions bind against the original nodes, and every
//! diagnostic carries the line of the offending element.
//! So instead of streaming, the reader events are folded into a small
//! owned tree that lives for the whole initialization.

use std::path::Path;
use std::str::{self, Utf8Error};

use quick_xml::events::attributes::AttrError;
use quick_xml::events::{BytesStart, Event};
use quick_xml::{Error as ReaderError, Reader};
use thiserror::Error;

/// The error type for reading XML documents into retained form.
#[derive(Error, Debug)]
pub enum XmlError {
    #[error("reader failed: {0}")]
    Reader(#[from] ReaderError),
    #[error("error from an attribute: {0}")]
    Attr(#[from] AttrError),
    #[error("utf8 error: {0}")]
    Utf8(#[from] Utf8Error),
    #[error("cannot read file: {0}")]
    Io(#[from] std::io::Error),
    #[error("document has no root element")]
    NoRoot,
    #[error("unexpected end tag: `{0}`")]
    UnexpectedEndTag(String),
    #[error("open tags have not been closed")]
    UnclosedTags,
}

/// An indexing object for nodes within one [`XmlDocument`].
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub struct NodeId(u32);

impl NodeId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug)]
struct Node {
    name: String,
    attributes: Vec<(String, String)>,
    text: String,
    children: Vec<NodeId>,
    line: u32,
}

/// An XML document retained in memory,
/// with the 1-based source line of every element.
#[derive(Debug)]
pub struct XmlDocument {
    nodes: Vec<Node>,
    root: NodeId,
}

impl XmlDocument {
    /// Parses a file into a retained document.
    pub fn parse(path: &Path) -> Result<Self, XmlError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse_str(&content)
    }

    /// Parses document text into retained form.
    pub fn parse_str(content: &str) -> Result<Self, XmlError> {
        let mut line_starts = vec![0usize];
        for (offset, byte) in content.bytes().enumerate() {
            if byte == b'\n' {
                line_starts.push(offset + 1);
            }
        }
        let line_of = |offset: usize| line_starts.partition_point(|&start| start <= offset) as u32;

        let mut reader = Reader::from_str(content);
        let mut nodes: Vec<Node> = Vec::new();
        let mut stack: Vec<NodeId> = Vec::new();
        let mut root: Option<NodeId> = None;
        loop {
            // The reader position before the event is the offset of its `<`.
            let offset = reader.buffer_position() as usize;
            match reader.read_event()? {
                Event::Start(tag) => {
                    let id = attach(&mut nodes, &stack, &mut root, &tag, line_of(offset))?;
                    stack.push(id);
                }
                Event::Empty(tag) => {
                    attach(&mut nodes, &stack, &mut root, &tag, line_of(offset))?;
                }
                Event::End(tag) => {
                    let name = str::from_utf8(tag.name().as_ref())?.to_owned();
                    match stack.pop() {
                        Some(top) if nodes[top.index()].name == name => {}
                        _ => return Err(XmlError::UnexpectedEndTag(name)),
                    }
                }
                Event::Text(text) => {
                    if let Some(&top) = stack.last() {
                        let unescaped = text.unescape()?;
                        nodes[top.index()].text.push_str(unescaped.trim());
                    }
                }
                Event::CData(data) => {
                    if let Some(&top) = stack.last() {
                        nodes[top.index()].text.push_str(str::from_utf8(&data)?);
                    }
                }
                Event::Comment(_) | Event::Decl(_) | Event::PI(_) | Event::DocType(_) => continue,
                Event::Eof => {
                    if !stack.is_empty() {
                        return Err(XmlError::UnclosedTags);
                    }
                    break;
                }
            }
        }
        Ok(Self {
            nodes,
            root: root.ok_or(XmlError::NoRoot)?,
        })
    }

    /// The root element of the document.
    pub fn root(&self) -> XmlElement<'_> {
        XmlElement {
            doc: self,
            id: self.root,
        }
    }

    /// Rebuilds an element handle from its node id.
    pub fn element(&self, id: NodeId) -> XmlElement<'_> {
        XmlElement { doc: self, id }
    }

    fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }
}

fn attach(
    nodes: &mut Vec<Node>,
    stack: &[NodeId],
    root: &mut Option<NodeId>,
    tag: &BytesStart<'_>,
    line: u32,
) -> Result<NodeId, XmlError> {
    let name = str::from_utf8(tag.name().as_ref())?.to_owned();
    let mut attributes = Vec::new();
    for attr in tag.attributes() {
        let attr = attr?;
        let key = str::from_utf8(attr.key.as_ref())?.to_owned();
        let value = attr.unescape_value()?.into_owned();
        attributes.push((key, value));
    }
    let id = NodeId(nodes.len() as u32);
    nodes.push(Node {
        name,
        attributes,
        text: String::new(),
        children: Vec::new(),
        line,
    });
    if let Some(&parent) = stack.last() {
        nodes[parent.index()].children.push(id);
    } else if root.is_none() {
        *root = Some(id);
    }
    Ok(id)
}

/// A handle to an element of a retained document.
#[derive(Debug, Clone, Copy)]
pub struct XmlElement<'a> {
    doc: &'a XmlDocument,
    id: NodeId,
}

impl<'a> XmlElement<'a> {
    pub fn name(&self) -> &'a str {
        &self.doc.node(self.id).name
    }

    /// The 1-based source line of the element's start tag.
    pub fn line(&self) -> u32 {
        self.doc.node(self.id).line
    }

    pub fn attribute(&self, name: &str) -> Option<&'a str> {
        self.doc
            .node(self.id)
            .attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// The concatenated, trimmed text content of the element.
    pub fn text(&self) -> &'a str {
        &self.doc.node(self.id).text
    }

    /// The element children, in document order.
    pub fn children(&self) -> impl Iterator<Item = XmlElement<'a>> + 'a {
        let doc = self.doc;
        self.doc
            .node(self.id)
            .children
            .iter()
            .map(move |&id| XmlElement { doc, id })
    }

    /// The first child with the given tag name.
    pub fn child(&self, name: &str) -> Option<XmlElement<'a>> {
        self.children().find(|child| child.name() == name)
    }

    pub fn id(&self) -> NodeId {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = "\
<?xml version=\"1.0\"?>
<opsa-mef>
  <define-fault-tree name=\"cooling\">
    <label>Loss of cooling</label>
    <define-gate name=\"top\">
      <and>
        <basic-event name=\"pump\"/>
        <basic-event name=\"valve\"/>
      </and>
    </define-gate>
  </define-fault-tree>
</opsa-mef>
";

    #[test]
    fn tree_shape_and_attributes() {
        let doc = XmlDocument::parse_str(DOC).unwrap();
        let root = doc.root();
        assert_eq!(root.name(), "opsa-mef");
        let tree = root.child("define-fault-tree").unwrap();
        assert_eq!(tree.attribute("name"), Some("cooling"));
        assert_eq!(tree.child("label").unwrap().text(), "Loss of cooling");
        let gate = tree.child("define-gate").unwrap();
        let and = gate.children().next().unwrap();
        assert_eq!(and.name(), "and");
        assert_eq!(and.children().count(), 2);
    }

    #[test]
    fn line_attribution() {
        let doc = XmlDocument::parse_str(DOC).unwrap();
        let root = doc.root();
        assert_eq!(root.line(), 2);
        let tree = root.child("define-fault-tree").unwrap();
        assert_eq!(tree.line(), 3);
        let gate = tree.child("define-gate").unwrap();
        assert_eq!(gate.line(), 5);
    }

    #[test]
    fn mismatched_end_tag() {
        assert!(XmlDocument::parse_str("<a><b></a></b>").is_err());
    }

    #[test]
    fn missing_root() {
        assert!(matches!(
            XmlDocument::parse_str("<?xml version=\"1.0\"?>"),
            Err(XmlError::NoRoot)
        ));
    }
}
