use anyhow::{Result, anyhow, bail};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use serde_json::{Map, Value};

/// An open element while its subtree is being read.
struct Frame {
    name: String,
    /// Attributes (`@`-prefixed) plus child elements collected so far.
    node: Map<String, Value>,
    text: String,
}

impl Frame {
    fn open(start: &BytesStart<'_>) -> Result<Self> {
        let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
        let mut node = Map::new();
        for attr in start.attributes() {
            let attr = attr?;
            let key = format!("@{}", String::from_utf8_lossy(attr.key.as_ref()));
            let value = attr.unescape_value()?.into_owned();
            node.insert(key, Value::String(value));
        }
        Ok(Frame {
            name,
            node,
            text: String::new(),
        })
    }

    /// Collapse the finished element into a tree value:
    /// nothing at all -> null, text only -> string, otherwise an object
    /// with any non-empty text under `#text`.
    fn close(mut self) -> (String, Value) {
        let value = if self.node.is_empty() {
            if self.text.is_empty() {
                Value::Null
            } else {
                Value::String(self.text)
            }
        } else {
            if !self.text.is_empty() {
                self.node.insert("#text".to_string(), Value::String(self.text));
            }
            Value::Object(self.node)
        };
        (self.name, value)
    }
}

/// A repeated child tag collapses into an array, in document order.
fn insert_child(node: &mut Map<String, Value>, name: String, value: Value) {
    match node.get_mut(&name) {
        Some(Value::Array(items)) => items.push(value),
        Some(existing) => {
            let first = existing.take();
            *existing = Value::Array(vec![first, value]);
        }
        None => {
            node.insert(name, value);
        }
    }
}

fn attach(frame: Frame, stack: &mut [Frame], root: &mut Option<Value>) -> Result<()> {
    let (name, value) = frame.close();
    if let Some(parent) = stack.last_mut() {
        insert_child(&mut parent.node, name, value);
    } else {
        if root.is_some() {
            bail!("multiple root elements");
        }
        let mut doc = Map::new();
        doc.insert(name, value);
        *root = Some(Value::Object(doc));
    }
    Ok(())
}

/// Parse an XML document into a generic mapping/list/scalar tree.
///
/// Attributes become `@`-prefixed keys, repeated child elements become
/// arrays, text-only elements become plain strings and empty elements
/// become null. Namespace prefixes stay verbatim in key names, so a
/// vendor extension reads as e.g. `ns3:TPX`.
pub fn parse_document(raw: &str) -> Result<Value> {
    let mut reader = Reader::from_str(raw);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Frame> = Vec::new();
    let mut root: Option<Value> = None;

    loop {
        match reader.read_event()? {
            Event::Start(start) => stack.push(Frame::open(&start)?),
            Event::Empty(start) => {
                let frame = Frame::open(&start)?;
                attach(frame, &mut stack, &mut root)?;
            }
            Event::End(_) => {
                let frame = stack
                    .pop()
                    .ok_or_else(|| anyhow!("closing tag without a matching opening tag"))?;
                attach(frame, &mut stack, &mut root)?;
            }
            Event::Text(text) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&text.unescape()?);
                }
            }
            Event::CData(cdata) => {
                if let Some(top) = stack.last_mut() {
                    top.text
                        .push_str(&String::from_utf8_lossy(&cdata.into_inner()));
                }
            }
            Event::Eof => break,
            _ => {} // declaration, comments, PIs, doctype
        }
    }

    if !stack.is_empty() {
        bail!("document ended inside `{}`", stack[stack.len() - 1].name);
    }
    root.ok_or_else(|| anyhow!("document has no root element"))
}
