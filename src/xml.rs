//! Minimal element tree over `quick-xml`, shared by every nested-element
//! document this crate reads or writes.

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

/// One parsed element with attributes, child elements and concatenated text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct XmlElement {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlElement>,
    pub text: String,
}

impl XmlElement {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.children.iter().find(|c| c.name == name)
    }

    /// Trimmed text of the first child named `name`, if non-empty.
    pub fn child_text(&self, name: &str) -> Option<String> {
        self.child(name)
            .map(|c| c.text.trim().to_string())
            .filter(|t| !t.is_empty())
    }
}

/// Parse a whole document and return its root element.
pub(crate) fn parse_document(text: &str) -> Result<XmlElement, String> {
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root: Option<XmlElement> = None;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| format!("at position {}: {}", reader.buffer_position(), e))?;
        match event {
            Event::Start(start) => stack.push(element_from(&start)?),
            Event::Empty(start) => {
                let element = element_from(&start)?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::End(_) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| "unbalanced closing tag".to_string())?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::Text(text) => {
                if let Some(top) = stack.last_mut() {
                    let unescaped = text.unescape().map_err(|e| e.to_string())?;
                    top.text.push_str(&unescaped);
                }
            }
            Event::CData(data) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&String::from_utf8_lossy(&data));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(format!("unclosed element <{}>", stack[stack.len() - 1].name));
    }
    root.ok_or_else(|| "document has no root element".to_string())
}

fn attach(
    stack: &mut [XmlElement],
    root: &mut Option<XmlElement>,
    element: XmlElement,
) -> Result<(), String> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None => {
            if root.is_some() {
                return Err("multiple root elements".to_string());
            }
            *root = Some(element);
        }
    }
    Ok(())
}

fn element_from(start: &BytesStart<'_>) -> Result<XmlElement, String> {
    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let mut attributes = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|e| e.to_string())?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value().map_err(|e| e.to_string())?.into_owned();
        attributes.push((key, value));
    }
    Ok(XmlElement {
        name,
        attributes,
        ..Default::default()
    })
}

/// Indented document writer.
pub(crate) struct XmlWriter {
    inner: Writer<Vec<u8>>,
}

impl XmlWriter {
    pub fn new() -> Self {
        Self {
            inner: Writer::new_with_indent(Vec::new(), b' ', 4),
        }
    }

    pub fn declaration(&mut self) -> Result<(), String> {
        self.write(Event::Decl(BytesDecl::new("1.0", None, None)))
    }

    pub fn comment(&mut self, text: &str) -> Result<(), String> {
        self.write(Event::Comment(BytesText::from_escaped(text)))
    }

    pub fn start(&mut self, name: &str, attributes: &[(&str, &str)]) -> Result<(), String> {
        self.write(Event::Start(tag(name, attributes)))
    }

    pub fn empty(&mut self, name: &str, attributes: &[(&str, &str)]) -> Result<(), String> {
        self.write(Event::Empty(tag(name, attributes)))
    }

    pub fn end(&mut self, name: &str) -> Result<(), String> {
        self.write(Event::End(BytesEnd::new(name)))
    }

    pub fn into_string(self) -> String {
        let mut text = String::from_utf8_lossy(&self.inner.into_inner()).into_owned();
        text.push('\n');
        text
    }

    fn write(&mut self, event: Event<'_>) -> Result<(), String> {
        self.inner.write_event(event).map_err(|e| e.to_string())
    }
}

fn tag<'a>(name: &'a str, attributes: &[(&'a str, &'a str)]) -> BytesStart<'a> {
    let mut start = BytesStart::new(name);
    for (key, value) in attributes {
        start.push_attribute((*key, *value));
    }
    start
}

/// Parse common boolean attribute spellings.
pub(crate) fn as_bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "yes" | "on" | "1"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_nested_document() {
        let doc = parse_document(
            r#"<?xml version="1.0"?>
<toolbox tool_path="tools">
    <section id="s1" name="One &amp; Two">
        <tool file="a.xml"/>
    </section>
    <tool file="b.xml">
        <tool_shed>shed.example.org</tool_shed>
    </tool>
</toolbox>"#,
        )
        .unwrap();
        assert_eq!(doc.name, "toolbox");
        assert_eq!(doc.attr("tool_path"), Some("tools"));
        assert_eq!(doc.children.len(), 2);
        assert_eq!(doc.children[0].attr("name"), Some("One & Two"));
        assert_eq!(doc.children[0].children[0].attr("file"), Some("a.xml"));
        assert_eq!(
            doc.children[1].child_text("tool_shed"),
            Some("shed.example.org".to_string())
        );
    }

    #[test]
    fn test_parse_rejects_unclosed_element() {
        assert!(parse_document("<toolbox><section id=\"x\"></toolbox>").is_err());
        assert!(parse_document("").is_err());
    }

    #[test]
    fn test_writer_escapes_attributes() {
        let mut writer = XmlWriter::new();
        writer.start("toolbox", &[]).unwrap();
        writer.empty("label", &[("text", "A < B")]).unwrap();
        writer.end("toolbox").unwrap();
        let text = writer.into_string();
        let doc = parse_document(&text).unwrap();
        assert_eq!(doc.children[0].attr("text"), Some("A < B"));
    }
}
