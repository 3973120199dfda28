//! XML codec boundary.
//!
//! Requests are built as a typed element tree and serialized once; responses
//! are scanned with an event reader for the handful of elements and
//! attributes the protocol documents. Nothing here knows protocol semantics.

use crate::error::Result;
use quick_xml::Reader;
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use std::collections::HashMap;

/// A tagged tree of elements, attributes, and text.
///
/// Built by pure construction functions in [`crate::request`] and serialized
/// exactly once by [`XmlElement::to_xml`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct XmlElement {
    name: String,
    attributes: Vec<(String, String)>,
    text: Option<String>,
    children: Vec<XmlElement>,
}

impl XmlElement {
    /// Empty element with the given tag name
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            text: None,
            children: Vec::new(),
        }
    }

    /// Leaf element wrapping a text node
    pub(crate) fn with_text(name: impl Into<String>, text: impl Into<String>) -> Self {
        let mut element = Self::new(name);
        element.text = Some(text.into());
        element
    }

    /// Add an attribute
    pub(crate) fn attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((key.into(), value.into()));
        self
    }

    /// Append a child element
    pub(crate) fn child(mut self, child: XmlElement) -> Self {
        self.children.push(child);
        self
    }

    /// Serialize the tree to an XML document with a declaration header.
    ///
    /// Text nodes and attribute values are escaped by the writer.
    pub(crate) fn to_xml(&self) -> Result<String> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        self.write_into(&mut writer)?;
        Ok(String::from_utf8_lossy(&writer.into_inner()).into_owned())
    }

    fn write_into(&self, writer: &mut Writer<Vec<u8>>) -> Result<()> {
        let mut start = BytesStart::new(self.name.as_str());
        for (key, value) in &self.attributes {
            start.push_attribute((key.as_str(), value.as_str()));
        }

        if self.text.is_none() && self.children.is_empty() {
            writer.write_event(Event::Empty(start))?;
            return Ok(());
        }

        writer.write_event(Event::Start(start))?;
        if let Some(text) = &self.text {
            writer.write_event(Event::Text(BytesText::new(text)))?;
        }
        for child in &self.children {
            child.write_into(writer)?;
        }
        writer.write_event(Event::End(BytesEnd::new(self.name.as_str())))?;
        Ok(())
    }
}

/// Text content of the first element named `name` anywhere in the document.
pub(crate) fn first_element_text(xml: &str, name: &str) -> Result<Option<String>> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);
    loop {
        match reader.read_event()? {
            Event::Start(e) if e.local_name().as_ref() == name.as_bytes() => {
                let text = reader.read_text(e.name())?;
                return Ok(Some(text.into_owned()));
            }
            Event::Eof => return Ok(None),
            _ => {}
        }
    }
}

/// Attribute map of the first element named `name` anywhere in the document.
pub(crate) fn first_element_attributes(
    xml: &str,
    name: &str,
) -> Result<Option<HashMap<String, String>>> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);
    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == name.as_bytes() => {
                let mut attributes = HashMap::new();
                for attribute in e.attributes() {
                    let attribute = attribute.map_err(quick_xml::Error::from)?;
                    attributes.insert(
                        String::from_utf8_lossy(attribute.key.local_name().as_ref()).into_owned(),
                        attribute.unescape_value()?.into_owned(),
                    );
                }
                return Ok(Some(attributes));
            }
            Event::Eof => return Ok(None),
            _ => {}
        }
    }
}
