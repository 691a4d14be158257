use std::fmt::{self, Write};

/// A literal placed on the right hand side of a script statement.
/// Strings are always emitted as escaped python literals, so request data cannot leave the quotes.
#[derive(Debug, Clone, PartialEq)]
pub enum PyValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl fmt::Display for PyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PyValue::Str(value) => write_str_literal(f, value),
            PyValue::Int(value) => write!(f, "{value}"),
            // debug formatting keeps the decimal point ("200.0") and round trips exactly
            PyValue::Float(value) if value.is_finite() => write!(f, "{value:?}"),
            PyValue::Float(_) => f.write_str("0.0"),
            PyValue::Bool(true) => f.write_str("True"),
            PyValue::Bool(false) => f.write_str("False"),
        }
    }
}

fn write_str_literal(f: &mut fmt::Formatter<'_>, value: &str) -> fmt::Result {
    f.write_char('\'')?;
    for c in value.chars() {
        match c {
            '\\' => f.write_str("\\\\")?,
            '\'' => f.write_str("\\'")?,
            '\n' => f.write_str("\\n")?,
            '\r' => f.write_str("\\r")?,
            '\t' => f.write_str("\\t")?,
            c if c.is_ascii_graphic() || c == ' ' => f.write_char(c)?,
            c if (c as u32) <= 0xff => write!(f, "\\x{:02x}", c as u32)?,
            c if (c as u32) <= 0xffff => write!(f, "\\u{:04x}", c as u32)?,
            c => write!(f, "\\U{:08x}", c as u32)?,
        }
    }
    f.write_char('\'')
}

impl From<&str> for PyValue {
    fn from(value: &str) -> Self {
        PyValue::Str(value.to_owned())
    }
}

impl From<String> for PyValue {
    fn from(value: String) -> Self {
        PyValue::Str(value)
    }
}

impl From<i32> for PyValue {
    fn from(value: i32) -> Self {
        PyValue::Int(value.into())
    }
}

impl From<u32> for PyValue {
    fn from(value: u32) -> Self {
        PyValue::Int(value.into())
    }
}

impl From<f64> for PyValue {
    fn from(value: f64) -> Self {
        PyValue::Float(value)
    }
}

impl From<bool> for PyValue {
    fn from(value: bool) -> Self {
        PyValue::Bool(value)
    }
}

/// Builder for the python file blender runs through `--python`.
///
/// Statement targets and code blocks are `&'static str`, only values are dynamic, and those go
/// through [`PyValue`]. Rendering is deterministic: the same calls produce the same bytes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Script {
    lines: Vec<String>,
    indent: usize,
}

impl Script {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, line: String) -> &mut Self {
        let mut indented = "    ".repeat(self.indent);
        indented.push_str(&line);
        self.lines.push(indented);
        self
    }

    pub fn import(&mut self, module: &'static str) -> &mut Self {
        self.push(format!("import {module}"))
    }

    pub fn comment(&mut self, text: &'static str) -> &mut Self {
        self.push(format!("# {text}"))
    }

    pub fn blank(&mut self) -> &mut Self {
        self.lines.push(String::new());
        self
    }

    /// `target = value`
    pub fn assign(&mut self, target: &'static str, value: impl Into<PyValue>) -> &mut Self {
        let value = value.into();
        self.push(format!("{target} = {value}"))
    }

    /// `function(value)` as a bare statement
    pub fn call(&mut self, function: &'static str, value: impl Into<PyValue>) -> &mut Self {
        let value = value.into();
        self.push(format!("{function}({value})"))
    }

    /// Fixed statement with no runtime data in it.
    pub fn raw(&mut self, code: &'static str) -> &mut Self {
        self.push(code.to_owned())
    }

    /// Opens an indented block, `header` is written without the trailing colon.
    pub fn begin(&mut self, header: &'static str) -> &mut Self {
        self.push(format!("{header}:"));
        self.indent += 1;
        self
    }

    pub fn end(&mut self) -> &mut Self {
        self.indent = self.indent.saturating_sub(1);
        self
    }

    pub fn render(&self) -> String {
        let mut body = self.lines.join("\n");
        body.push('\n');
        body
    }
}

impl fmt::Display for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}
