//! Incremental JSON output.
//!
//! Templates drive a [`JsonWriter`] one token at a time instead of building the
//! whole result first, so a large `#foreach` can stream straight to a file or
//! socket.
//!
//! # Backends
//!
//! - [`JsonTextWriter`] over any `io::Write`; with a `Vec<u8>` it is the
//!   in-memory buffer ([`BufferWriter`]), with anything else it streams
//! - [`ValueBuilder`] assembles a [`Value`] (used when a template fragment is
//!   needed as a value, e.g. `#variable` bound to an object template)
//! - [`ChunkedWriter`] sends each element of a top-level array to its own sink
//!   obtained from a [`StreamFactory`]
//!
//! # Examples
//!
//! ```
//! use jtx::Value;
//! use jtx::output::{to_json, to_json_pretty};
//!
//! let value = Value::Integer(42);
//!
//! assert_eq!(to_json(&value), "42");
//! assert_eq!(to_json_pretty(&value), "42");
//! ```

use std::{
    collections::HashSet,
    fmt::Write as _,
    io::{self, Write},
};

use thiserror::Error;

use crate::value::{Map, Value, format_float};

/// Sink for JSON tokens.
///
/// Inside an object every value must be preceded by
/// [`write_property_name`](Self::write_property_name); inside an array values
/// are written directly. A name may appear once per object: the bundled
/// backends reject a repeat with an `InvalidInput` error.
pub trait JsonWriter {
    fn start_object(&mut self) -> io::Result<()>;
    fn end_object(&mut self) -> io::Result<()>;
    fn start_array(&mut self) -> io::Result<()>;
    fn end_array(&mut self) -> io::Result<()>;
    fn write_property_name(&mut self, name: &str) -> io::Result<()>;

    /// Write a complete value (scalars, or whole arrays/objects).
    fn write_value(&mut self, value: &Value) -> io::Result<()>;

    fn write_property(&mut self, name: &str, value: &Value) -> io::Result<()> {
        self.write_property_name(name)?;
        self.write_value(value)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Output formatting options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WriterOptions {
    /// Spaces per nesting level; 0 writes compact JSON
    pub indent: usize,
}

impl WriterOptions {
    pub fn compact() -> Self {
        WriterOptions { indent: 0 }
    }

    pub fn pretty() -> Self {
        WriterOptions { indent: 2 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Container {
    Object,
    Array,
}

#[derive(Debug)]
struct Frame {
    container: Container,
    count: usize,
    /// Property names already written (objects only)
    names: HashSet<String>,
}

impl Frame {
    fn new(container: Container) -> Self {
        Frame {
            container,
            count: 0,
            names: HashSet::new(),
        }
    }
}

/// Payload of the `InvalidInput` errors writers raise when driven out of order.
#[derive(Debug, Error)]
#[error("{0}")]
pub(crate) struct WriterMisuse(String);

fn misuse(message: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidInput, WriterMisuse(message.to_string()))
}

/// JSON text writer shared by the buffered and streaming backends.
pub struct JsonTextWriter<W: Write> {
    out: W,
    options: WriterOptions,
    stack: Vec<Frame>,
    /// A property name was written and its value has not started yet
    pending_name: bool,
    wrote_root: bool,
}

/// In-memory backend.
pub type BufferWriter = JsonTextWriter<Vec<u8>>;

impl JsonTextWriter<Vec<u8>> {
    pub fn buffer(options: WriterOptions) -> Self {
        JsonTextWriter::new(Vec::new(), options)
    }

    pub fn into_string(self) -> String {
        match String::from_utf8(self.out) {
            Ok(s) => s,
            Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
        }
    }
}

impl<W: Write> JsonTextWriter<W> {
    pub fn new(out: W, options: WriterOptions) -> Self {
        JsonTextWriter {
            out,
            options,
            stack: Vec::new(),
            pending_name: false,
            wrote_root: false,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn put(&mut self, text: &str) -> io::Result<()> {
        self.out.write_all(text.as_bytes())
    }

    fn newline(&mut self, depth: usize) -> io::Result<()> {
        if self.options.indent > 0 {
            let line = format!("\n{}", " ".repeat(depth * self.options.indent));
            self.put(&line)?;
        }
        Ok(())
    }

    /// Comma and line break before the next member of the open container.
    fn separator(&mut self) -> io::Result<()> {
        let depth = self.stack.len();
        let first = match self.stack.last_mut() {
            Some(frame) => {
                frame.count += 1;
                frame.count == 1
            }
            None => return Ok(()),
        };
        if !first {
            self.put(",")?;
        }
        self.newline(depth)
    }

    fn before_value(&mut self) -> io::Result<()> {
        if self.pending_name {
            self.pending_name = false;
            return Ok(());
        }
        match self.stack.last().map(|f| f.container) {
            Some(Container::Array) => self.separator(),
            Some(Container::Object) => Err(misuse("value written inside an object without a property name")),
            None if self.wrote_root => Err(misuse("more than one root value written")),
            None => {
                self.wrote_root = true;
                Ok(())
            }
        }
    }

    fn close(&mut self, container: Container, symbol: &str) -> io::Result<()> {
        if self.pending_name {
            return Err(misuse("container closed after a property name with no value"));
        }
        let frame = match self.stack.pop() {
            Some(frame) if frame.container == container => frame,
            _ => return Err(misuse("unbalanced end of container")),
        };
        if frame.count > 0 {
            self.newline(self.stack.len())?;
        }
        self.put(symbol)
    }

    fn write_scalar(&mut self, value: &Value) -> io::Result<()> {
        let text = match value {
            Value::Null => "null".to_string(),
            Value::Boolean(b) => b.to_string(),
            Value::Integer(n) => n.to_string(),
            Value::Float(n) => format_float(*n),
            Value::String(s) => quote(s),
            Value::Array(_) | Value::Object(_) => return Err(misuse("container written as scalar")),
        };
        self.put(&text)
    }
}

impl<W: Write> JsonWriter for JsonTextWriter<W> {
    fn start_object(&mut self) -> io::Result<()> {
        self.before_value()?;
        self.put("{")?;
        self.stack.push(Frame::new(Container::Object));
        Ok(())
    }

    fn end_object(&mut self) -> io::Result<()> {
        self.close(Container::Object, "}")
    }

    fn start_array(&mut self) -> io::Result<()> {
        self.before_value()?;
        self.put("[")?;
        self.stack.push(Frame::new(Container::Array));
        Ok(())
    }

    fn end_array(&mut self) -> io::Result<()> {
        self.close(Container::Array, "]")
    }

    fn write_property_name(&mut self, name: &str) -> io::Result<()> {
        let frame = match self.stack.last_mut() {
            Some(frame) if !self.pending_name && frame.container == Container::Object => frame,
            _ => return Err(misuse("property name written outside an object")),
        };
        if !frame.names.insert(name.to_string()) {
            return Err(misuse(&format!("duplicate property name '{}'", name)));
        }
        self.separator()?;
        let key = quote(name);
        self.put(&key)?;
        self.put(if self.options.indent > 0 { ": " } else { ":" })?;
        self.pending_name = true;
        Ok(())
    }

    fn write_value(&mut self, value: &Value) -> io::Result<()> {
        match value {
            Value::Object(map) => {
                self.start_object()?;
                for (key, item) in map {
                    self.write_property(key, item)?;
                }
                self.end_object()
            }
            Value::Array(items) => {
                self.start_array()?;
                for item in items {
                    self.write_value(item)?;
                }
                self.end_array()
            }
            scalar => {
                self.before_value()?;
                self.write_scalar(scalar)
            }
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}

/// Quote and escape a string per the JSON grammar.
fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{8}' => out.push_str("\\b"),
            '\u{c}' => out.push_str("\\f"),
            c if c.is_control() => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

enum Partial {
    Object(Map, Option<String>),
    Array(Vec<Value>),
}

/// Writer backend that builds a [`Value`] instead of text.
#[derive(Default)]
pub struct ValueBuilder {
    stack: Vec<Partial>,
    root: Option<Value>,
}

impl ValueBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// The completed value; `null` when nothing was written.
    pub fn finish(self) -> Value {
        self.root.unwrap_or(Value::Null)
    }

    fn insert(&mut self, value: Value) -> io::Result<()> {
        match self.stack.last_mut() {
            Some(Partial::Array(items)) => items.push(value),
            Some(Partial::Object(map, key)) => match key.take() {
                Some(key) => {
                    map.insert(key, value);
                }
                None => return Err(misuse("value written inside an object without a property name")),
            },
            None if self.root.is_some() => return Err(misuse("more than one root value written")),
            None => self.root = Some(value),
        }
        Ok(())
    }
}

impl JsonWriter for ValueBuilder {
    fn start_object(&mut self) -> io::Result<()> {
        self.stack.push(Partial::Object(Map::new(), None));
        Ok(())
    }

    fn end_object(&mut self) -> io::Result<()> {
        match self.stack.pop() {
            Some(Partial::Object(map, None)) => self.insert(Value::Object(map)),
            _ => Err(misuse("unbalanced end of object")),
        }
    }

    fn start_array(&mut self) -> io::Result<()> {
        self.stack.push(Partial::Array(Vec::new()));
        Ok(())
    }

    fn end_array(&mut self) -> io::Result<()> {
        match self.stack.pop() {
            Some(Partial::Array(items)) => self.insert(Value::Array(items)),
            _ => Err(misuse("unbalanced end of array")),
        }
    }

    fn write_property_name(&mut self, name: &str) -> io::Result<()> {
        match self.stack.last_mut() {
            Some(Partial::Object(map, _)) if map.contains_key(name) => {
                Err(misuse(&format!("duplicate property name '{}'", name)))
            }
            Some(Partial::Object(_, key @ None)) => {
                *key = Some(name.to_string());
                Ok(())
            }
            _ => Err(misuse("property name written outside an object")),
        }
    }

    fn write_value(&mut self, value: &Value) -> io::Result<()> {
        self.insert(value.clone())
    }
}

/// Supplies one output sink per logical chunk.
pub trait StreamFactory {
    fn begin_stream(&mut self, index: usize) -> io::Result<Box<dyn Write>>;
    fn end_stream(&mut self, sink: Box<dyn Write>, index: usize) -> io::Result<()>;
}

/// Writer that routes each element of a top-level array to its own stream.
///
/// A non-array result is written as a single chunk with index 0.
pub struct ChunkedWriter<'f> {
    factory: &'f mut dyn StreamFactory,
    options: WriterOptions,
    depth: usize,
    /// Root is an array whose elements are the chunks
    split: bool,
    current: Option<JsonTextWriter<Box<dyn Write>>>,
    next_index: usize,
}

impl<'f> ChunkedWriter<'f> {
    pub fn new(factory: &'f mut dyn StreamFactory, options: WriterOptions) -> Self {
        ChunkedWriter {
            factory,
            options,
            depth: 0,
            split: false,
            current: None,
            next_index: 0,
        }
    }

    /// Number of chunks written so far.
    pub fn chunks(&self) -> usize {
        self.next_index
    }

    fn boundary(&self) -> usize {
        if self.split { 1 } else { 0 }
    }

    fn chunk(&mut self) -> io::Result<&mut JsonTextWriter<Box<dyn Write>>> {
        if self.current.is_none() {
            if self.depth != self.boundary() {
                return Err(misuse("chunk started away from the top-level array"));
            }
            tracing::debug!(index = self.next_index, "beginning output chunk");
            let sink = self.factory.begin_stream(self.next_index)?;
            self.current = Some(JsonTextWriter::new(sink, self.options));
        }
        match self.current.as_mut() {
            Some(writer) => Ok(writer),
            None => Err(misuse("no open chunk")),
        }
    }

    /// Hand the sink back to the factory once the chunk's value is complete.
    fn finish_chunk(&mut self) -> io::Result<()> {
        if self.depth != self.boundary() {
            return Ok(());
        }
        if let Some(mut writer) = self.current.take() {
            writer.flush()?;
            let index = self.next_index;
            self.next_index += 1;
            self.factory.end_stream(writer.into_inner(), index)?;
        }
        Ok(())
    }
}

impl JsonWriter for ChunkedWriter<'_> {
    fn start_object(&mut self) -> io::Result<()> {
        self.chunk()?.start_object()?;
        self.depth += 1;
        Ok(())
    }

    fn end_object(&mut self) -> io::Result<()> {
        self.chunk()?.end_object()?;
        self.depth -= 1;
        self.finish_chunk()
    }

    fn start_array(&mut self) -> io::Result<()> {
        if self.depth == 0 && self.current.is_none() && !self.split && self.next_index == 0 {
            self.split = true;
            self.depth = 1;
            return Ok(());
        }
        self.chunk()?.start_array()?;
        self.depth += 1;
        Ok(())
    }

    fn end_array(&mut self) -> io::Result<()> {
        if self.split && self.depth == 1 && self.current.is_none() {
            self.depth = 0;
            return Ok(());
        }
        self.chunk()?.end_array()?;
        self.depth -= 1;
        self.finish_chunk()
    }

    fn write_property_name(&mut self, name: &str) -> io::Result<()> {
        self.chunk()?.write_property_name(name)
    }

    fn write_value(&mut self, value: &Value) -> io::Result<()> {
        self.chunk()?.write_value(value)?;
        self.finish_chunk()
    }
}

// Convenience functions

/// Converts a Value to compact JSON.
///
/// # Examples
///
/// ```
/// use jtx::{Map, Value};
/// use jtx::output::to_json;
///
/// let mut obj = Map::new();
/// obj.insert("name".to_string(), Value::String("Alice".to_string()));
/// obj.insert("age".to_string(), Value::Integer(30));
///
/// assert_eq!(to_json(&Value::Object(obj)), r#"{"name":"Alice","age":30}"#);
/// ```
pub fn to_json(value: &Value) -> String {
    render(value, WriterOptions::compact())
}

/// Converts a Value to JSON with 2-space indentation.
///
/// # Examples
///
/// ```
/// use jtx::{Map, Value};
/// use jtx::output::to_json_pretty;
///
/// let mut obj = Map::new();
/// obj.insert("name".to_string(), Value::String("Alice".to_string()));
///
/// assert_eq!(to_json_pretty(&Value::Object(obj)), "{\n  \"name\": \"Alice\"\n}");
/// ```
pub fn to_json_pretty(value: &Value) -> String {
    render(value, WriterOptions::pretty())
}

fn render(value: &Value, options: WriterOptions) -> String {
    let mut writer = BufferWriter::buffer(options);
    // Writing a complete value into a fresh in-memory buffer cannot fail.
    let _ = writer.write_value(value);
    writer.into_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_control_characters() {
        assert_eq!(quote("a\"b\\c\n\u{1}"), r#""a\"b\\c\n\u0001""#);
    }

    #[test]
    fn test_empty_containers_stay_on_one_line() {
        let value = Value::parse(r#"{"a": [], "b": {}}"#).unwrap();
        assert_eq!(to_json_pretty(&value), "{\n  \"a\": [],\n  \"b\": {}\n}");
    }

    #[test]
    fn test_value_without_name_in_object_is_rejected() {
        let mut writer = BufferWriter::buffer(WriterOptions::compact());
        writer.start_object().unwrap();
        assert!(writer.write_value(&Value::Integer(1)).is_err());
    }

    #[test]
    fn test_value_builder_preserves_order() {
        let mut builder = ValueBuilder::new();
        builder.start_object().unwrap();
        builder.write_property("z", &Value::Integer(1)).unwrap();
        builder.write_property("a", &Value::Integer(2)).unwrap();
        builder.end_object().unwrap();

        let value = builder.finish();
        let keys: Vec<&String> = value.as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["z", "a"]);
    }
}
