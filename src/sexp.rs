//! S-Expression support.
//!
//! This implements the data model and the transport encodings of
//! [S-Expressions]: the canonical encoding (length-prefixed strings,
//! no whitespace) that is used for interchange, and enough of the
//! advanced encoding (tokens, `#hex#`, quoted strings) to make keys
//! and data pleasant to write by hand.
//!
//! [S-Expressions]: https://people.csail.mit.edu/rivest/Sexp.txt

use std::fmt;
use std::ops::Deref;

use crate::Error;
use crate::Result;

/// An S-Expression.
///
/// An S-Expression is either a string, or a list of S-Expressions.
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum Sexp {
    /// Just a string.
    String(String_),
    /// A list of S-Expressions.
    List(Vec<Sexp>),
}

/// A string.
///
/// Strings are byte sequences without any further interpretation.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct String_ {
    data: Box<[u8]>,
}

impl String_ {
    /// Constructs a new string.
    pub fn new<B: Into<Box<[u8]>>>(data: B) -> Self {
        String_ { data: data.into() }
    }
}

impl Deref for String_ {
    type Target = [u8];
    fn deref(&self) -> &Self::Target {
        &self.data
    }
}

impl From<&[u8]> for String_ {
    fn from(b: &[u8]) -> Self {
        String_::new(b.to_vec())
    }
}

impl From<Vec<u8>> for String_ {
    fn from(b: Vec<u8>) -> Self {
        String_::new(b)
    }
}

impl From<&str> for String_ {
    fn from(s: &str) -> Self {
        String_::new(s.as_bytes().to_vec())
    }
}

impl fmt::Debug for String_ {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write_atom(f, &self.data)
    }
}

impl Sexp {
    /// Constructs a string expression.
    pub fn string<S: Into<String_>>(s: S) -> Sexp {
        Sexp::String(s.into())
    }

    /// Constructs a list expression.
    pub fn list(children: Vec<Sexp>) -> Sexp {
        Sexp::List(children)
    }

    /// Returns this expression's bytes if it is a string.
    pub fn atom(&self) -> Option<&[u8]> {
        match self {
            Sexp::String(s) => Some(s),
            Sexp::List(_) => None,
        }
    }

    /// Returns the `i`th element of a list.
    pub fn nth(&self, i: usize) -> Option<&Sexp> {
        match self {
            Sexp::String(_) => None,
            Sexp::List(l) => l.get(i),
        }
    }

    /// Returns the number of elements of a list, or 1 for a string.
    pub fn len(&self) -> usize {
        match self {
            Sexp::String(_) => 1,
            Sexp::List(l) => l.len(),
        }
    }

    /// Returns whether this is an empty list.
    pub fn is_empty(&self) -> bool {
        matches!(self, Sexp::List(l) if l.is_empty())
    }

    /// Finds the first sub-expression that is a list starting with
    /// the given token.
    ///
    /// The expression itself is considered first, then its
    /// sub-expressions, depth-first.
    pub fn find_token(&self, token: &[u8]) -> Option<&Sexp> {
        match self {
            Sexp::String(_) => None,
            Sexp::List(l) => {
                if l.first().and_then(Sexp::atom) == Some(token) {
                    return Some(self);
                }
                l.iter().find_map(|child| child.find_token(token))
            },
        }
    }

    /// Parses an expression from its transport encoding.
    ///
    /// Both the canonical encoding and the advanced encoding
    /// (tokens, `#hex#`, `"quoted"`) are accepted.  The input must
    /// contain exactly one expression.
    pub fn from_bytes(data: &[u8]) -> Result<Sexp> {
        let mut reader = Reader { data, pos: 0 };
        reader.skip_whitespace();
        let sexp = reader.parse_expression()?;
        reader.skip_whitespace();
        if reader.pos != data.len() {
            return Err(reader.bad("trailing data after expression"));
        }
        Ok(sexp)
    }

    /// Writes out the canonical encoding.
    pub fn to_vec(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.encode(&mut buf);
        buf
    }

    fn encode(&self, out: &mut Vec<u8>) {
        match self {
            Sexp::String(s) => {
                out.extend_from_slice(format!("{}:", s.len()).as_bytes());
                out.extend_from_slice(s);
            },
            Sexp::List(l) => {
                out.push(b'(');
                for child in l {
                    child.encode(out);
                }
                out.push(b')');
            },
        }
    }
}

impl fmt::Display for Sexp {
    /// Renders the advanced encoding, for diagnostics.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Sexp::String(s) => write_atom(f, s),
            Sexp::List(l) => {
                write!(f, "(")?;
                for (i, child) in l.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{}", child)?;
                }
                write!(f, ")")
            },
        }
    }
}

impl fmt::Debug for Sexp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self)
    }
}

fn write_atom(f: &mut fmt::Formatter, data: &[u8]) -> fmt::Result {
    if !data.is_empty()
        && !data[0].is_ascii_digit()
        && data.iter().all(|&b| is_token_char(b))
    {
        for b in data {
            write!(f, "{}", *b as char)?;
        }
        Ok(())
    } else {
        write!(f, "#")?;
        for b in data {
            write!(f, "{:02X}", b)?;
        }
        write!(f, "#")
    }
}

fn is_token_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b"-./_:*+=".contains(&b)
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn bad(&self, msg: &str) -> anyhow::Error {
        Error::MalformedExpression(
            format!("{} at offset {}", msg, self.pos)).into()
    }

    fn peek(&self) -> Option<u8> {
        self.data.get(self.pos).cloned()
    }

    fn skip_whitespace(&mut self) {
        while self.peek().map(|b| b.is_ascii_whitespace()).unwrap_or(false) {
            self.pos += 1;
        }
    }

    fn parse_expression(&mut self) -> Result<Sexp> {
        match self.peek() {
            None => Err(self.bad("unexpected end of input")),
            Some(b'(') => self.parse_list(),
            Some(b'#') => self.parse_hex(),
            Some(b'"') => self.parse_quoted(),
            Some(b) if b.is_ascii_digit() => self.parse_length_prefixed(),
            Some(b) if is_token_char(b) => self.parse_token(),
            Some(_) => Err(self.bad("unexpected character")),
        }
    }

    fn parse_list(&mut self) -> Result<Sexp> {
        self.pos += 1; // '('
        let mut children = Vec::new();
        loop {
            self.skip_whitespace();
            match self.peek() {
                None => return Err(self.bad("unterminated list")),
                Some(b')') => {
                    self.pos += 1;
                    return Ok(Sexp::List(children));
                },
                Some(_) => children.push(self.parse_expression()?),
            }
        }
    }

    fn parse_length_prefixed(&mut self) -> Result<Sexp> {
        let mut len: usize = 0;
        while let Some(b) = self.peek() {
            if b.is_ascii_digit() {
                len = len.checked_mul(10)
                    .and_then(|l| l.checked_add((b - b'0') as usize))
                    .ok_or_else(|| self.bad("string length overflows"))?;
                self.pos += 1;
            } else {
                break;
            }
        }
        if self.peek() != Some(b':') {
            return Err(self.bad("expected ':' after string length"));
        }
        self.pos += 1;
        if self.pos + len > self.data.len() {
            return Err(self.bad("string extends past end of input"));
        }
        let s = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(Sexp::String(s.into()))
    }

    fn parse_hex(&mut self) -> Result<Sexp> {
        self.pos += 1; // '#'
        let mut nibbles = Vec::new();
        loop {
            match self.peek() {
                None => return Err(self.bad("unterminated hex string")),
                Some(b'#') => {
                    self.pos += 1;
                    break;
                },
                Some(b) if b.is_ascii_whitespace() => self.pos += 1,
                Some(b) if b.is_ascii_hexdigit() => {
                    nibbles.push((b as char).to_digit(16).unwrap() as u8);
                    self.pos += 1;
                },
                Some(_) => return Err(self.bad("bad hex digit")),
            }
        }
        if nibbles.len() % 2 != 0 {
            return Err(self.bad("odd number of hex digits"));
        }
        let bytes: Vec<u8> = nibbles.chunks(2)
            .map(|pair| (pair[0] << 4) | pair[1])
            .collect();
        Ok(Sexp::String(bytes.into()))
    }

    fn parse_quoted(&mut self) -> Result<Sexp> {
        self.pos += 1; // '"'
        let mut bytes = Vec::new();
        loop {
            match self.peek() {
                None => return Err(self.bad("unterminated quoted string")),
                Some(b'"') => {
                    self.pos += 1;
                    return Ok(Sexp::String(bytes.into()));
                },
                Some(b'\\') => {
                    self.pos += 1;
                    let escaped = match self.peek() {
                        Some(b'n') => b'\n',
                        Some(b'r') => b'\r',
                        Some(b't') => b'\t',
                        Some(b'"') => b'"',
                        Some(b'\\') => b'\\',
                        _ => return Err(self.bad("bad escape sequence")),
                    };
                    bytes.push(escaped);
                    self.pos += 1;
                },
                Some(b) => {
                    bytes.push(b);
                    self.pos += 1;
                },
            }
        }
    }

    fn parse_token(&mut self) -> Result<Sexp> {
        let start = self.pos;
        while self.peek().map(is_token_char).unwrap_or(false) {
            self.pos += 1;
        }
        Ok(Sexp::String(self.data[start..self.pos].into()))
    }
}
