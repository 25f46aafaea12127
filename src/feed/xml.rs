// src/feed/xml.rs

//! Markup to generic tree decoding.
//!
//! Elements become JSON objects keyed by their qualified name, attributes are
//! stored unprefixed next to child elements, and element text lands under
//! [`TEXT_KEY`]. A text-only element without attributes collapses to a plain
//! string, and repeated children collapse into an array. Every leaf stays a
//! string; numeric coercion happens in the accessors.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use serde_json::{Map, Value};

use crate::error::{AppError, Result};

/// Key holding an element's text when it also has attributes or children.
pub const TEXT_KEY: &str = "_";

struct Frame {
    name: String,
    fields: Map<String, Value>,
    text: String,
}

impl Frame {
    fn open(start: &BytesStart<'_>) -> Result<Self> {
        let name = qualified_name(start)?;
        let mut fields = Map::new();
        for attr in start.attributes() {
            let attr = attr.map_err(AppError::xml)?;
            let key = std::str::from_utf8(attr.key.as_ref())
                .map_err(AppError::xml)?
                .to_string();
            let value = attr.unescape_value().map_err(AppError::xml)?;
            fields.insert(key, Value::String(value.into_owned()));
        }
        Ok(Self {
            name,
            fields,
            text: String::new(),
        })
    }

    fn close(self) -> (String, Value) {
        let Frame {
            name,
            mut fields,
            text,
        } = self;
        let value = if fields.is_empty() {
            Value::String(text)
        } else {
            if !text.is_empty() {
                fields.insert(TEXT_KEY.to_string(), Value::String(text));
            }
            Value::Object(fields)
        };
        (name, value)
    }
}

fn qualified_name(start: &BytesStart<'_>) -> Result<String> {
    std::str::from_utf8(start.name().as_ref())
        .map(str::to_string)
        .map_err(AppError::xml)
}

/// Insert a child, turning the slot into an array on repetition.
fn insert_child(fields: &mut Map<String, Value>, name: String, value: Value) {
    match fields.get_mut(&name) {
        None => {
            fields.insert(name, value);
        }
        Some(Value::Array(items)) => items.push(value),
        Some(existing) => {
            let first = existing.take();
            *existing = Value::Array(vec![first, value]);
        }
    }
}

/// Decode a markup document into a generic tree rooted at its document element.
///
/// The returned value is an object with a single key, the root element name.
pub fn decode(raw: &str) -> Result<Value> {
    let input = raw.trim_start_matches('\u{feff}').trim();
    let mut reader = Reader::from_str(input);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Frame> = Vec::new();
    let mut root = Map::new();

    loop {
        match reader.read_event().map_err(AppError::xml)? {
            Event::Start(start) => stack.push(Frame::open(&start)?),
            Event::Empty(start) => {
                let (name, value) = Frame::open(&start)?.close();
                match stack.last_mut() {
                    Some(parent) => insert_child(&mut parent.fields, name, value),
                    None => insert_child(&mut root, name, value),
                }
            }
            Event::Text(text) => {
                if let Some(frame) = stack.last_mut() {
                    frame.text.push_str(&text.unescape().map_err(AppError::xml)?);
                }
            }
            Event::CData(data) => {
                if let Some(frame) = stack.last_mut() {
                    frame.text.push_str(&String::from_utf8_lossy(&data.into_inner()));
                }
            }
            Event::End(_) => {
                let frame = stack
                    .pop()
                    .ok_or_else(|| AppError::xml("unbalanced closing tag"))?;
                let (name, value) = frame.close();
                match stack.last_mut() {
                    Some(parent) => insert_child(&mut parent.fields, name, value),
                    None => insert_child(&mut root, name, value),
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(AppError::xml("unexpected end of document"));
    }
    if root.is_empty() {
        return Err(AppError::xml("document has no root element"));
    }
    Ok(Value::Object(root))
}
