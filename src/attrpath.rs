use serde_json::Value;

use crate::errors::Result;
use crate::parser::{ParseError, Parser};

/// A parsed attribute path such as `variants.%2Fworld%2Fgeo.modelingVariant`.
#[derive(Debug, Clone, PartialEq)]
pub struct AttrPath {
    pub segments: Vec<Segment>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    Child(String), // .foo or ['foo']
    Wildcard,      // .* or [*]
    Index(usize),  // [0]
    Recursive,     // ..
}

impl AttrPath {
    pub fn parse(input: &str) -> Result<Self> {
        let mut p = Parser::new(input);
        Ok(parse_segments(&mut p)?)
    }

    /// Every value in `root` addressed by this path, in document order.
    pub fn resolve<'a>(&self, root: &'a Value) -> Vec<&'a Value> {
        let mut current: Vec<&Value> = vec![root];
        for seg in &self.segments {
            current = match seg {
                Segment::Child(k) => current
                    .into_iter()
                    .filter_map(|v| v.as_object().and_then(|map| map.get(k)))
                    .collect(),
                Segment::Index(i) => current
                    .into_iter()
                    .filter_map(|v| v.as_array().and_then(|arr| arr.get(*i)))
                    .collect(),
                Segment::Wildcard => current.into_iter().flat_map(children).collect(),
                Segment::Recursive => current
                    .into_iter()
                    .flat_map(|v| {
                        let mut out = Vec::new();
                        recurse_collect(v, &mut out);
                        out
                    })
                    .collect(),
            };
        }
        current
    }
}

/// Parse and resolve in one step; convenience for one-off lookups.
pub fn lookup<'a>(root: &'a Value, path: &str) -> Result<Vec<&'a Value>> {
    Ok(AttrPath::parse(path)?.resolve(root))
}

fn parse_segments(p: &mut Parser<'_>) -> std::result::Result<AttrPath, ParseError> {
    let mut segments = Vec::new();
    p.skip_ws();
    p.consume_char('$');
    // A leading bare name is shorthand for `.name`.
    if matches!(p.peek_char(), Some(c) if c != '.' && c != '[') {
        segments.push(Segment::Child(p.parse_name()?));
    }

    while !p.eof() {
        if p.consume_str("..") {
            segments.push(Segment::Recursive);
            if p.consume_char('*') {
                segments.push(Segment::Wildcard);
            } else if matches!(p.peek_char(), Some(c) if c != '[') {
                segments.push(Segment::Child(p.parse_name()?));
            }
            continue;
        }
        if p.consume_char('.') {
            if p.consume_char('*') {
                segments.push(Segment::Wildcard);
            } else {
                segments.push(Segment::Child(p.parse_name()?));
            }
            continue;
        }
        if p.consume_char('[') {
            p.skip_ws();
            if p.consume_char('*') {
                segments.push(Segment::Wildcard);
            } else if matches!(p.peek_char(), Some('\'') | Some('"')) {
                segments.push(Segment::Child(p.parse_quoted_string()?));
            } else {
                segments.push(Segment::Index(p.parse_index()?));
            }
            p.skip_ws();
            p.expect(']')?;
            continue;
        }
        return Err(ParseError::InvalidSyntax(format!(
            "unexpected character {:?}",
            p.peek_char().unwrap_or_default()
        )));
    }
    Ok(AttrPath { segments })
}

fn children(v: &Value) -> Vec<&Value> {
    match v {
        Value::Array(arr) => arr.iter().collect(),
        Value::Object(map) => map.values().collect(),
        _ => Vec::new(),
    }
}

fn recurse_collect<'a>(v: &'a Value, out: &mut Vec<&'a Value>) {
    out.push(v);
    for child in children(v) {
        recurse_collect(child, out);
    }
}

/// Encode a hierarchical scene path so it can be used as a single
/// attribute name: `%`, `.` and `/` are escaped.
pub fn delimiter_encode(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    for c in path.chars() {
        match c {
            '%' => out.push_str("%25"),
            '.' => out.push_str("%2E"),
            '/' => out.push_str("%2F"),
            _ => out.push(c),
        }
    }
    out
}

/// Inverse of [`delimiter_encode`]. Unknown or truncated escapes are kept as-is.
pub fn delimiter_decode(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut rest = name;
    while let Some(pos) = rest.find('%') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        let decoded = match tail.get(1..3).map(|h| h.to_ascii_uppercase()) {
            Some(h) if h == "25" => Some('%'),
            Some(h) if h == "2E" => Some('.'),
            Some(h) if h == "2F" => Some('/'),
            _ => None,
        };
        match decoded {
            Some(c) => {
                out.push(c);
                rest = &tail[3..];
            }
            None => {
                out.push('%');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}
