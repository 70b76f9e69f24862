//! Minimal XML document tree on top of quick-xml.
//!
//! SAML processing needs two things from a parser: navigation by local name
//! and the exact byte span of each element, so that signed elements can be
//! digested over their original text. Namespace prefixes are dropped from
//! element and attribute names; `xmlns` declarations are not recorded.
//! Documents with a DOCTYPE are rejected.

use std::ops::Range;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::{SamlError, SamlResult};

/// An element with its attributes, children and concatenated text.
#[derive(Debug, Clone, Default)]
pub struct XmlElement {
    /// Local name (no prefix).
    pub name: String,
    /// Attributes as (local name, unescaped value).
    pub attributes: Vec<(String, String)>,
    /// Child elements in document order.
    pub children: Vec<XmlElement>,
    /// Unescaped text content directly inside this element.
    pub text: String,
    /// Byte range of the element in the source document.
    pub span: Range<usize>,
}

impl XmlElement {
    /// Returns the value of an attribute by local name.
    #[must_use]
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Returns the first direct child with the given local name.
    #[must_use]
    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.children.iter().find(|c| c.name == name)
    }

    /// Returns all direct children with the given local name.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlElement> {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Follows a path of local names through first-match children.
    #[must_use]
    pub fn path(&self, names: &[&str]) -> Option<&XmlElement> {
        names.iter().try_fold(self, |el, name| el.child(name))
    }

    /// Returns trimmed text, or `None` when blank.
    #[must_use]
    pub fn text_trimmed(&self) -> Option<&str> {
        let t = self.text.trim();
        (!t.is_empty()).then_some(t)
    }

    /// Returns the source text of this element.
    #[must_use]
    pub fn source<'a>(&self, document: &'a str) -> &'a str {
        document.get(self.span.clone()).unwrap_or_default()
    }
}

/// A parsed document: the source text and its root element.
#[derive(Debug, Clone)]
pub struct XmlDocument {
    source: String,
    root: XmlElement,
}

impl XmlDocument {
    /// Parses `source`.
    ///
    /// # Errors
    ///
    /// Returns [`SamlError::XmlParse`] for malformed XML, a DOCTYPE, or a
    /// document without a root element.
    pub fn parse(source: String) -> SamlResult<Self> {
        let root = parse_tree(&source)?;
        Ok(Self { source, root })
    }

    /// The document text.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// The root element.
    #[must_use]
    pub const fn root(&self) -> &XmlElement {
        &self.root
    }
}

fn position(reader: &Reader<&[u8]>) -> usize {
    usize::try_from(reader.buffer_position()).unwrap_or(usize::MAX)
}

fn open_element(e: &BytesStart<'_>, start: usize) -> SamlResult<XmlElement> {
    let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
    let mut attributes = Vec::new();
    for attr in e.attributes() {
        let attr = attr?;
        let key = attr.key.as_ref();
        if key == b"xmlns" || key.starts_with(b"xmlns:") {
            continue;
        }
        let local = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
        let value = attr.unescape_value()?.into_owned();
        attributes.push((local, value));
    }
    Ok(XmlElement {
        name,
        attributes,
        children: Vec::new(),
        text: String::new(),
        span: start..start,
    })
}

fn parse_tree(source: &str) -> SamlResult<XmlElement> {
    let mut reader = Reader::from_str(source);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root: Option<XmlElement> = None;

    loop {
        let before = position(&reader);
        let event = reader.read_event()?;
        let after = position(&reader);
        // Skipped whitespace is counted in `before`; the tag starts at '<'.
        let start = source
            .get(before..)
            .and_then(|rest| rest.find('<'))
            .map_or(before, |offset| before + offset);

        match event {
            Event::Start(e) => stack.push(open_element(&e, start)?),
            Event::Empty(e) => {
                let mut el = open_element(&e, start)?;
                el.span = start..after;
                attach(&mut stack, &mut root, el)?;
            }
            Event::End(_) => {
                let mut el = stack
                    .pop()
                    .ok_or_else(|| SamlError::XmlParse("unbalanced end tag".to_string()))?;
                el.span.end = after;
                attach(&mut stack, &mut root, el)?;
            }
            Event::Text(t) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&t.unescape()?);
                }
            }
            Event::CData(c) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&String::from_utf8_lossy(&c.into_inner()));
                }
            }
            Event::DocType(_) => {
                return Err(SamlError::XmlParse("DOCTYPE is not allowed".to_string()));
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(SamlError::XmlParse("unexpected end of document".to_string()));
    }
    root.ok_or_else(|| SamlError::XmlParse("document has no root element".to_string()))
}

fn attach(
    stack: &mut [XmlElement],
    root: &mut Option<XmlElement>,
    el: XmlElement,
) -> SamlResult<()> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(el);
        return Ok(());
    }
    if root.is_some() {
        return Err(SamlError::XmlParse("multiple root elements".to_string()));
    }
    *root = Some(el);
    Ok(())
}
