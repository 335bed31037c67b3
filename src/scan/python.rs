//! Minimal reader for the subset of Python used in DAG files: calls with
//! literal arguments, string literals, lists and names.

use super::ScanError;

/// A literal-ish Python expression.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Value {
    Str(String),
    Bool(bool),
    None,
    Int(i64),
    Name(String),
    List(Vec<Value>),
    Call { name: String, args: Vec<Arg> },
    /// Anything else, kept as source text.
    Other(String),
}

/// A call argument; `key` is set for keyword arguments.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Arg {
    pub key: Option<String>,
    pub value: Value,
}

/// Keyword lookup over a call's arguments.
pub(crate) fn kwarg<'a>(args: &'a [Arg], key: &str) -> Option<&'a Value> {
    args.iter()
        .find(|arg| arg.key.as_deref() == Some(key))
        .map(|arg| &arg.value)
}

/// The n-th positional argument.
pub(crate) fn positional(args: &[Arg], n: usize) -> Option<&Value> {
    args.iter()
        .filter(|arg| arg.key.is_none())
        .nth(n)
        .map(|arg| &arg.value)
}

impl Value {
    /// Source-like rendering for error messages.
    pub(crate) fn describe(&self) -> String {
        match self {
            Value::Str(s) => format!("{:?}", s),
            Value::Bool(b) => (if *b { "True" } else { "False" }).to_string(),
            Value::None => "None".to_string(),
            Value::Int(i) => i.to_string(),
            Value::Name(n) => n.clone(),
            Value::List(items) => format!(
                "[{}]",
                items.iter().map(Value::describe).collect::<Vec<_>>().join(", ")
            ),
            Value::Call { name, .. } => format!("{}(...)", name),
            Value::Other(text) => text.clone(),
        }
    }
}

/// Characters outside string literals, with their byte offsets.
///
/// Quote characters are not yielded. Escapes and `"""`/`'''` literals are
/// handled, and an unterminated literal runs to the end of the text.
pub(crate) struct CodeChars<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> CodeChars<'a> {
    pub(crate) fn new(text: &'a str) -> Self {
        Self { text, pos: 0 }
    }

    /// Continue scanning from `pos`.
    pub(crate) fn skip_to(&mut self, pos: usize) {
        self.pos = pos.max(self.pos);
    }
}

impl Iterator for CodeChars<'_> {
    type Item = (usize, char);

    fn next(&mut self) -> Option<(usize, char)> {
        loop {
            let text = self.text;
            let rest = &text[self.pos..];
            let c = rest.chars().next()?;
            let start = self.pos;

            if c == '\'' || c == '"' {
                let triple = if c == '"' { "\"\"\"" } else { "'''" };
                let delim = if rest.starts_with(triple) { triple } else { &rest[..1] };
                self.pos = start + delim.len() + literal_len(&rest[delim.len()..], delim);
                continue;
            }

            self.pos += c.len_utf8();
            return Some((start, c));
        }
    }
}

// Bytes up to and including the closing delimiter.
fn literal_len(body: &str, delim: &str) -> usize {
    let mut escaped = false;
    for (i, c) in body.char_indices() {
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if body[i..].starts_with(delim) {
            return i + delim.len();
        }
    }
    body.len()
}

/// Replace every `#` comment with spaces. Byte offsets and line breaks are
/// unchanged, so positions found in the result still point into `source`.
pub(crate) fn blank_comments(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut copied = 0;
    let mut chars = CodeChars::new(source);

    while let Some((i, c)) = chars.next() {
        if c != '#' {
            continue;
        }
        let end = source[i..].find('\n').map_or(source.len(), |n| i + n);
        out.push_str(&source[copied..i]);
        out.push_str(&blank(&source[i..end]));
        copied = end;
        chars.skip_to(end);
    }
    out.push_str(&source[copied..]);
    out
}

/// Replace string literals, quotes included, with spaces. Run on text whose
/// comments are already blanked.
pub(crate) fn blank_strings(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut copied = 0;

    for (i, c) in CodeChars::new(source) {
        out.push_str(&blank(&source[copied..i]));
        out.push(c);
        copied = i + c.len_utf8();
    }
    out.push_str(&blank(&source[copied..]));
    out
}

fn blank(text: &str) -> String {
    text.chars()
        .map(|c| if c == '\n' { "\n".to_string() } else { " ".repeat(c.len_utf8()) })
        .collect()
}

/// Join physical lines into statements. A newline inside brackets or after
/// a trailing `\` does not end a statement. Each statement comes back on one
/// line, paired with the line it starts on.
pub(crate) fn logical_lines(source: &str) -> Vec<(usize, String)> {
    let mut statements = Vec::new();
    let mut depth = 0usize;
    let mut continued = false;
    let mut start = 0;

    for (i, c) in CodeChars::new(source) {
        match c {
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth = depth.saturating_sub(1),
            '\n' if depth == 0 && !continued => {
                push_statement(source, start, i, &mut statements);
                start = i + 1;
            }
            _ => {}
        }
        if c == '\n' || !c.is_whitespace() {
            continued = c == '\\';
        }
    }
    push_statement(source, start, source.len(), &mut statements);

    statements
}

fn push_statement(source: &str, start: usize, end: usize, out: &mut Vec<(usize, String)>) {
    let text = &source[start..end];
    let trimmed = text.trim_start();
    if trimmed.trim_end().is_empty() {
        return;
    }
    let line = line_at(source, start + (text.len() - trimmed.len()));
    let joined = trimmed
        .replace("\\\r\n", " ")
        .replace("\\\n", " ")
        .replace(['\r', '\n'], " ");
    out.push((line, joined.trim_end().to_string()));
}

/// 1-based line number of a byte offset.
pub(crate) fn line_at(source: &str, offset: usize) -> usize {
    source[..offset].matches('\n').count() + 1
}

/// Given the offset of an opening `(`, return the text between it and its
/// matching `)` plus the offset just past the `)`.
pub(crate) fn call_body(source: &str, open: usize) -> Result<(&str, usize), ScanError> {
    let mut depth = 0usize;

    for (i, c) in CodeChars::new(&source[open..]) {
        let at = open + i;
        match c {
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Ok((&source[open + 1..at], at + 1));
                }
            }
            _ => {}
        }
    }

    Err(ScanError::Unterminated(line_at(source, open)))
}

/// Split on `sep` at bracket depth zero, outside string literals. Empty
/// trailing pieces (from a trailing comma) are dropped.
pub(crate) fn split_top_level(text: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;

    for (i, c) in CodeChars::new(text) {
        match c {
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth = depth.saturating_sub(1),
            c if c == sep && depth == 0 => {
                parts.push(&text[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&text[start..]);

    parts.retain(|part| !part.trim().is_empty());
    parts
}

/// Split a chain of `>>`/`<<` operators outside strings and brackets.
/// Returns the operands and the operators between them.
pub(crate) fn split_shift_chain(text: &str) -> (Vec<&str>, Vec<Shift>) {
    let mut operands = Vec::new();
    let mut operators = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    let mut chars = CodeChars::new(text);

    while let Some((i, c)) = chars.next() {
        match c {
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth = depth.saturating_sub(1),
            '>' | '<' if depth == 0 && text[i + 1..].starts_with(c) => {
                operands.push(&text[start..i]);
                operators.push(if c == '>' {
                    Shift::Downstream
                } else {
                    Shift::Upstream
                });
                start = i + 2;
                chars.skip_to(start);
            }
            _ => {}
        }
    }
    operands.push(&text[start..]);

    (operands, operators)
}

/// Strip parentheses that wrap the whole expression, as in `(a >> b)`.
pub(crate) fn unwrap_parens(text: &str) -> &str {
    let mut text = text.trim();
    while text.starts_with('(')
        && let Ok((inner, end)) = call_body(text, 0)
        && end == text.len()
    {
        text = inner.trim();
    }
    text
}

/// Direction of a bit-shift dependency operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Shift {
    /// `a >> b`: a runs before b.
    Downstream,
    /// `a << b`: b runs before a.
    Upstream,
}

/// Parse a call's argument list.
pub(crate) fn parse_args(body: &str) -> Vec<Arg> {
    split_top_level(body, ',')
        .into_iter()
        .map(|part| {
            let part = part.trim();
            match keyword_split(part) {
                Some((key, value)) => Arg {
                    key: Some(key.to_string()),
                    value: parse_value(value),
                },
                None => Arg {
                    key: None,
                    value: parse_value(part),
                },
            }
        })
        .collect()
}

// `name=value`, but not `a == b`
fn keyword_split(part: &str) -> Option<(&str, &str)> {
    let eq = part.find('=')?;
    let key = part[..eq].trim();
    let rest = &part[eq + 1..];
    if rest.starts_with('=') || !is_identifier(key) {
        return None;
    }
    Some((key, rest.trim()))
}

/// Parse a single expression.
pub(crate) fn parse_value(text: &str) -> Value {
    let text = text.trim();

    match text {
        "True" => return Value::Bool(true),
        "False" => return Value::Bool(false),
        "None" => return Value::None,
        _ => {}
    }

    if let Some(s) = parse_string(text) {
        return Value::Str(s);
    }

    if let Ok(i) = text.replace('_', "").parse::<i64>() {
        return Value::Int(i);
    }

    if let Some(inner) = text.strip_prefix('[').and_then(|t| t.strip_suffix(']')) {
        return Value::List(
            split_top_level(inner, ',')
                .into_iter()
                .map(parse_value)
                .collect(),
        );
    }

    if let Some(open) = text.find('(') {
        let name = text[..open].trim();
        if is_dotted_name(name)
            && let Ok((body, end)) = call_body(text, open)
            && end == text.len()
        {
            return Value::Call {
                name: name.to_string(),
                args: parse_args(body),
            };
        }
    }

    if is_dotted_name(text) {
        return Value::Name(text.to_string());
    }

    Value::Other(text.to_string())
}

/// Parse a quoted literal: single, double or triple quotes, optionally
/// `r`-prefixed.
fn parse_string(text: &str) -> Option<String> {
    let (raw, body) = match text.strip_prefix(['r', 'R']) {
        Some(rest) => (true, rest),
        None => (false, text),
    };

    let quote = body.chars().next().filter(|c| *c == '\'' || *c == '"')?;
    let delim = match quote {
        '"' if body.len() >= 6 && body.starts_with("\"\"\"") => "\"\"\"",
        '\'' if body.len() >= 6 && body.starts_with("'''") => "'''",
        _ => &body[..1],
    };
    let inner = body.strip_prefix(delim)?.strip_suffix(delim)?;

    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.char_indices();
    while let Some((i, c)) = chars.next() {
        if inner[i..].starts_with(delim) {
            // an unescaped delimiter means this was not a single literal
            return None;
        }
        if c != '\\' || raw {
            out.push(c);
            continue;
        }
        match chars.next().map(|(_, next)| next) {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('\\') => out.push('\\'),
            Some('\'') => out.push('\''),
            Some('"') => out.push('"'),
            Some('\n') => {}
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => return None,
        }
    }
    Some(out)
}

pub(crate) fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn is_dotted_name(text: &str) -> bool {
    !text.is_empty() && text.split('.').all(is_identifier)
}
