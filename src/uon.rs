//! URL-Object Notation.
//!
//! Objects are written `(k=v,k2=v2)`, arrays `@(v1,v2)`. Strings that could
//! be read as something else (`true`, `null`, `123`, empty, or containing
//! grammar characters) are wrapped in `'`. Inside strings `~` escapes `~`
//! and `'`.

use indexmap::IndexMap;

use crate::error::ParseError;
use crate::value::PartValue;

/// Characters that always force a string to be quoted.
const NEEDS_QUOTE_CHARS: &[char] = &[')', ',', '=', '\n', '\t', '\r', '\u{8}', '\u{c}', ' '];

/// First characters of strings that may read as a literal.
const MAYBE_LITERAL_FIRST_CHARS: &str = "),=\n\t\r\u{8}\u{c} tfn+-.#0123456789";

/// Encode a value tree as UON.
pub fn to_uon(value: &PartValue) -> String {
    let mut out = String::new();
    write_value(value, &mut out);
    out
}

/// Encode a single string, quoting only when required.
pub fn encode_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    write_string(s, &mut out);
    out
}

/// Returns true if `s` must be quoted to survive a UON round trip.
pub fn needs_quotes(s: &str) -> bool {
    let Some(c0) = s.chars().next() else {
        return true;
    };
    if c0 == '@' || c0 == '(' {
        return true;
    }
    if s.contains(NEEDS_QUOTE_CHARS) {
        return true;
    }
    MAYBE_LITERAL_FIRST_CHARS.contains(c0)
        && (s == "true" || s == "false" || s == "null" || is_numeric(s))
}

/// Returns true if `s` reads as a decimal, hexadecimal, or floating point number.
pub fn is_numeric(s: &str) -> bool {
    let body = s.strip_prefix(['+', '-']).unwrap_or(s);
    if body.is_empty() {
        return false;
    }

    let hex = body
        .strip_prefix("0x")
        .or_else(|| body.strip_prefix("0X"))
        .or_else(|| body.strip_prefix('#'));
    if let Some(digits) = hex {
        return !digits.is_empty() && digits.chars().all(|c| c.is_ascii_hexdigit());
    }

    let (mantissa, exponent) = match body.find(['e', 'E']) {
        Some(i) => (&body[..i], Some(&body[i + 1..])),
        None => (body, None),
    };
    let (int_part, frac_part) = match mantissa.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (mantissa, None),
    };
    let all_digits = |p: &str| p.chars().all(|c| c.is_ascii_digit());
    if !all_digits(int_part) || !frac_part.map_or(true, all_digits) {
        return false;
    }
    if int_part.is_empty() && frac_part.map_or(true, str::is_empty) {
        return false;
    }
    match exponent {
        None => true,
        Some(e) => {
            let e = e.strip_prefix(['+', '-']).unwrap_or(e);
            !e.is_empty() && all_digits(e)
        }
    }
}

fn write_value(value: &PartValue, out: &mut String) {
    match value {
        PartValue::Null => out.push_str("null"),
        PartValue::Boolean(_)
        | PartValue::Integer(_)
        | PartValue::Long(_)
        | PartValue::Float(_)
        | PartValue::Double(_) => out.push_str(&value.to_string()),
        PartValue::List(items) => {
            out.push_str("@(");
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(item, out);
            }
            out.push(')');
        }
        PartValue::Map(map) => {
            out.push('(');
            for (i, (k, v)) in map.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_string(k, out);
                out.push('=');
                write_value(v, out);
            }
            out.push(')');
        }
        other => write_string(&other.to_string(), out),
    }
}

fn write_string(s: &str, out: &mut String) {
    let quoted = needs_quotes(s);
    if quoted {
        out.push('\'');
    }
    for c in s.chars() {
        if c == '~' || c == '\'' {
            out.push('~');
        }
        out.push(c);
    }
    if quoted {
        out.push('\'');
    }
}

/// A parsed UON tree. Leaves keep their text and whether they were quoted,
/// so a schema can decide how to interpret them.
#[derive(Debug, Clone, PartialEq)]
pub enum UonNode {
    Token { text: String, quoted: bool },
    List(Vec<UonNode>),
    Map(IndexMap<String, UonNode>),
}

impl UonNode {
    /// True for the bare `null` literal.
    pub fn is_null(&self) -> bool {
        matches!(self, UonNode::Token { text, quoted: false } if text == "null")
    }

    /// Interpret the tree without a schema: bare literals become booleans,
    /// numbers and null; everything quoted stays a string.
    pub fn into_value(self) -> PartValue {
        match self {
            UonNode::Token { text, quoted: true } => PartValue::String(text),
            UonNode::Token { text, quoted: false } => bare_literal(text),
            UonNode::List(items) => {
                PartValue::List(items.into_iter().map(UonNode::into_value).collect())
            }
            UonNode::Map(entries) => PartValue::Map(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, v.into_value()))
                    .collect(),
            ),
        }
    }
}

fn bare_literal(text: String) -> PartValue {
    match text.as_str() {
        "null" => return PartValue::Null,
        "true" => return PartValue::Boolean(true),
        "false" => return PartValue::Boolean(false),
        _ => {}
    }
    if is_numeric(&text) {
        if let Ok(n) = text.parse::<i64>() {
            return match i32::try_from(n) {
                Ok(small) => PartValue::Integer(small),
                Err(_) => PartValue::Long(n),
            };
        }
        if let Ok(n) = text.parse::<f64>() {
            return PartValue::Double(n);
        }
    }
    PartValue::String(text)
}

/// Parse a UON string.
///
/// A bare top-level token extends to the end of input; inside `@( )` and
/// `( )` bare tokens end at `,`, `)` and (for keys) `=`.
pub fn parse(input: &str) -> Result<UonNode, ParseError> {
    let mut reader = Reader {
        chars: input.chars().collect(),
        pos: 0,
    };
    let node = reader.value(false)?;
    reader.skip_ws();
    if reader.pos < reader.chars.len() {
        return Err(reader.error("unexpected trailing characters"));
    }
    Ok(node)
}

struct Reader {
    chars: Vec<char>,
    pos: usize,
}

impl Reader {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn error(&self, message: &str) -> ParseError {
        ParseError::Uon {
            position: self.pos,
            message: message.to_string(),
        }
    }

    fn expect(&mut self, c: char) -> Result<(), ParseError> {
        if self.peek() == Some(c) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(&format!("expected '{c}'")))
        }
    }

    fn value(&mut self, nested: bool) -> Result<UonNode, ParseError> {
        self.skip_ws();
        match self.peek() {
            Some('@') if self.peek_at(1) == Some('(') => {
                self.pos += 2;
                self.list()
            }
            Some('(') => {
                self.pos += 1;
                self.map()
            }
            Some('\'') => {
                let text = self.quoted()?;
                Ok(UonNode::Token { text, quoted: true })
            }
            _ => {
                let text = self.bare(nested, false)?;
                Ok(UonNode::Token {
                    text,
                    quoted: false,
                })
            }
        }
    }

    fn list(&mut self) -> Result<UonNode, ParseError> {
        let mut items = Vec::new();
        self.skip_ws();
        if self.peek() == Some(')') {
            self.pos += 1;
            return Ok(UonNode::List(items));
        }
        loop {
            items.push(self.value(true)?);
            self.skip_ws();
            match self.peek() {
                Some(',') => self.pos += 1,
                Some(')') => {
                    self.pos += 1;
                    return Ok(UonNode::List(items));
                }
                _ => return Err(self.error("expected ',' or ')' in array")),
            }
        }
    }

    fn map(&mut self) -> Result<UonNode, ParseError> {
        let mut entries = IndexMap::new();
        self.skip_ws();
        if self.peek() == Some(')') {
            self.pos += 1;
            return Ok(UonNode::Map(entries));
        }
        loop {
            self.skip_ws();
            let key = if self.peek() == Some('\'') {
                self.quoted()?
            } else {
                self.bare(true, true)?
            };
            self.skip_ws();
            self.expect('=')?;
            let value = self.value(true)?;
            entries.insert(key, value);
            self.skip_ws();
            match self.peek() {
                Some(',') => self.pos += 1,
                Some(')') => {
                    self.pos += 1;
                    return Ok(UonNode::Map(entries));
                }
                _ => return Err(self.error("expected ',' or ')' in object")),
            }
        }
    }

    fn quoted(&mut self) -> Result<String, ParseError> {
        self.expect('\'')?;
        let mut text = String::new();
        loop {
            match self.peek() {
                None => return Err(self.error("unterminated quoted string")),
                Some('~') => {
                    self.pos += 1;
                    let escaped = self
                        .peek()
                        .ok_or_else(|| self.error("dangling escape character"))?;
                    text.push(escaped);
                    self.pos += 1;
                }
                Some('\'') => {
                    self.pos += 1;
                    return Ok(text);
                }
                Some(c) => {
                    text.push(c);
                    self.pos += 1;
                }
            }
        }
    }

    fn bare(&mut self, nested: bool, is_key: bool) -> Result<String, ParseError> {
        let mut text = String::new();
        while let Some(c) = self.peek() {
            if nested && (c == ',' || c == ')') {
                break;
            }
            if is_key && c == '=' {
                break;
            }
            self.pos += 1;
            if c == '~' {
                if let Some(escaped) = self.peek() {
                    text.push(escaped);
                    self.pos += 1;
                    continue;
                }
            }
            text.push(c);
        }
        Ok(text.trim_end().to_string())
    }
}
