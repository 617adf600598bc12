//! Small owned XML tree for gamelist documents.
//!
//! Reading goes through `quick_xml::Reader`; writing is a plain tab-indented
//! serializer. Elements and attributes this crate does not model are kept
//! as-is so a rewrite never drops them.

use std::fs;
use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use crate::error::GamelistError;

#[derive(Debug, Clone, PartialEq)]
pub enum XmlNode {
    Element(XmlElement),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct XmlElement {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlNode>,
}

impl XmlElement {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// `<name>text</name>`
    pub fn with_text(name: impl Into<String>, text: impl Into<String>) -> Self {
        let mut el = Self::new(name);
        el.children.push(XmlNode::Text(text.into()));
        el
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn set_attr(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        if let Some((_, v)) = self.attributes.iter_mut().find(|(k, _)| k == key) {
            *v = value;
            return;
        }
        self.attributes.push((key.to_string(), value));
    }

    /// Child elements in document order.
    pub fn elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|c| match c {
            XmlNode::Element(e) => Some(e),
            XmlNode::Text(_) => None,
        })
    }

    pub fn elements_mut(&mut self) -> impl Iterator<Item = &mut XmlElement> {
        self.children.iter_mut().filter_map(|c| match c {
            XmlNode::Element(e) => Some(e),
            XmlNode::Text(_) => None,
        })
    }

    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.elements().find(|e| e.name == name)
    }

    /// Concatenated direct text content.
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|c| match c {
                XmlNode::Text(t) => Some(t.as_str()),
                XmlNode::Element(_) => None,
            })
            .collect()
    }

    pub fn child_text(&self, name: &str) -> Option<String> {
        self.child(name).map(XmlElement::text)
    }

    /// Replace the text of the first `name` child, or append a new one.
    pub fn set_child_text(&mut self, name: &str, text: impl Into<String>) {
        let text = text.into();
        if let Some(el) = self.elements_mut().find(|e| e.name == name) {
            el.children = vec![XmlNode::Text(text)];
            return;
        }
        self.push(XmlElement::with_text(name, text));
    }

    /// Remove every `name` child. Returns `true` if any was removed.
    pub fn remove_child(&mut self, name: &str) -> bool {
        let before = self.children.len();
        self.children
            .retain(|c| !matches!(c, XmlNode::Element(e) if e.name == name));
        self.children.len() != before
    }

    pub fn push(&mut self, child: XmlElement) {
        self.children.push(XmlNode::Element(child));
    }

    pub fn prepend(&mut self, child: XmlElement) {
        self.children.insert(0, XmlNode::Element(child));
    }

    /// Keep only the child elements for which `keep` returns `true`. Text
    /// children are left alone.
    pub fn retain_elements(&mut self, mut keep: impl FnMut(&XmlElement) -> bool) {
        self.children.retain(|c| match c {
            XmlNode::Element(e) => keep(e),
            XmlNode::Text(_) => true,
        });
    }

    fn write_to(&self, out: &mut String, depth: usize) {
        let indent = "\t".repeat(depth);
        out.push_str(&indent);
        out.push('<');
        out.push_str(&self.name);
        for (k, v) in &self.attributes {
            out.push_str(&format!(" {}=\"{}\"", k, escape_xml(v)));
        }

        if self.children.is_empty() {
            out.push_str(" />\n");
            return;
        }

        if self.children.iter().all(|c| matches!(c, XmlNode::Text(_))) {
            out.push('>');
            out.push_str(&escape_xml(&self.text()));
            out.push_str(&format!("</{}>\n", self.name));
            return;
        }

        out.push_str(">\n");
        for child in &self.children {
            match child {
                XmlNode::Element(e) => e.write_to(out, depth + 1),
                XmlNode::Text(t) => {
                    out.push_str(&indent);
                    out.push('\t');
                    out.push_str(&escape_xml(t));
                    out.push('\n');
                }
            }
        }
        out.push_str(&format!("{}</{}>\n", indent, self.name));
    }
}

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

fn element_from_start(e: &BytesStart<'_>) -> Result<XmlElement, GamelistError> {
    let mut el = XmlElement::new(String::from_utf8_lossy(e.name().as_ref()));
    for attr in e.attributes() {
        let attr = attr?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).to_string();
        let value = attr.unescape_value()?.into_owned();
        el.attributes.push((key, value));
    }
    Ok(el)
}

/// Parse a whole document and return its root element. `origin` is only used
/// in error messages.
pub fn parse_str(text: &str, origin: &Path) -> Result<XmlElement, GamelistError> {
    let mut xml = Reader::from_str(text);
    xml.config_mut().trim_text(true);

    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root: Option<XmlElement> = None;

    let mut attach = |stack: &mut Vec<XmlElement>, el: XmlElement| -> Result<(), GamelistError> {
        match stack.last_mut() {
            Some(parent) => parent.push(el),
            None if root.is_none() => root = Some(el),
            None => return Err(GamelistError::malformed(origin, "multiple root elements")),
        }
        Ok(())
    };

    loop {
        match xml.read_event()? {
            Event::Start(ref e) => stack.push(element_from_start(e)?),
            Event::Empty(ref e) => {
                let el = element_from_start(e)?;
                attach(&mut stack, el)?;
            }
            Event::End(_) => {
                let el = stack
                    .pop()
                    .ok_or_else(|| GamelistError::malformed(origin, "unexpected closing tag"))?;
                attach(&mut stack, el)?;
            }
            Event::Text(ref e) => {
                let text = e.unescape()?.into_owned();
                if let Some(top) = stack.last_mut() {
                    if !text.is_empty() {
                        top.children.push(XmlNode::Text(text));
                    }
                }
            }
            Event::CData(e) => {
                let text = String::from_utf8_lossy(&e.into_inner()).into_owned();
                if let Some(top) = stack.last_mut() {
                    top.children.push(XmlNode::Text(text));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(GamelistError::malformed(
            origin,
            format!("unclosed element <{}>", open.name),
        ));
    }
    root.ok_or_else(|| GamelistError::malformed(origin, "document has no root element"))
}

pub fn read_file(path: &Path) -> Result<XmlElement, GamelistError> {
    let text = fs::read_to_string(path)?;
    parse_str(&text, path)
}

/// Serialize a root element as a complete document.
pub fn to_xml_string(root: &XmlElement) -> String {
    let mut out = String::from("<?xml version=\"1.0\"?>\n");
    root.write_to(&mut out, 0);
    out
}

/// Write `root` to `path` through a temporary sibling and a rename, creating
/// parent directories as needed.
pub fn write_file(path: &Path, root: &XmlElement) -> Result<(), GamelistError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("xml.tmp");
    fs::write(&tmp, to_xml_string(root))?;
    fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0"?>
<gameList parentHash="42">
	<!-- hand edited -->
	<game id="7" source="ScreenScraper">
		<path>./Alpha &amp; Omega.zip</path>
		<name>Alpha &amp; Omega</name>
		<custom><nested>kept</nested></custom>
	</game>
	<folder>
		<path>./Hacks</path>
		<desc><![CDATA[Raw <text>]]></desc>
	</folder>
	<provider />
</gameList>
"#;

    #[test]
    fn test_parse_structure() {
        let root = parse_str(SAMPLE, Path::new("sample.xml")).unwrap();
        assert_eq!(root.name, "gameList");
        assert_eq!(root.attr("parentHash"), Some("42"));
        assert_eq!(root.elements().count(), 3);

        let game = root.child("game").unwrap();
        assert_eq!(game.attr("source"), Some("ScreenScraper"));
        assert_eq!(game.child_text("path").as_deref(), Some("./Alpha & Omega.zip"));
        assert_eq!(
            game.child("custom").unwrap().child_text("nested").as_deref(),
            Some("kept")
        );

        let folder = root.child("folder").unwrap();
        assert_eq!(folder.child_text("desc").as_deref(), Some("Raw <text>"));
        assert!(root.child("provider").unwrap().children.is_empty());
    }

    #[test]
    fn test_write_then_parse_preserves_unknown_content() {
        let root = parse_str(SAMPLE, Path::new("sample.xml")).unwrap();
        let text = to_xml_string(&root);
        assert!(text.contains("\t<game id=\"7\" source=\"ScreenScraper\">\n"));
        assert!(text.contains("\t\t<name>Alpha &amp; Omega</name>\n"));
        assert!(text.contains("<provider />"));
        let reparsed = parse_str(&text, Path::new("out.xml")).unwrap();
        assert_eq!(reparsed, root);
    }

    #[test]
    fn test_malformed_documents() {
        assert!(parse_str("<gameList><game></gameList>", Path::new("x")).is_err());
        assert!(parse_str("<gameList><game>", Path::new("x")).is_err());
        assert!(matches!(
            parse_str("", Path::new("x")),
            Err(GamelistError::Malformed { .. })
        ));
    }

    #[test]
    fn test_child_helpers() {
        let mut el = XmlElement::new("game");
        el.set_child_text("name", "A");
        el.set_child_text("name", "B");
        assert_eq!(el.elements().count(), 1);
        assert_eq!(el.child_text("name").as_deref(), Some("B"));
        el.prepend(XmlElement::with_text("path", "./a.zip"));
        assert_eq!(el.elements().next().unwrap().name, "path");
        assert!(el.remove_child("name"));
        assert!(!el.remove_child("name"));

        el.set_attr("id", "1");
        el.set_attr("id", "2");
        assert_eq!(el.attributes.len(), 1);
        assert_eq!(el.attr("id"), Some("2"));
    }

    #[test]
    fn test_write_file_is_atomic() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("sub/gamelist.xml");
        write_file(&path, &XmlElement::new("gameList")).unwrap();
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "<?xml version=\"1.0\"?>\n<gameList />\n"
        );
        assert!(!path.with_extension("xml.tmp").exists());
    }
}
