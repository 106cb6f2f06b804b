use crate::errors::{Error, ErrorCode, Result};

/// A single step of a compiled path.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    /// `$`, always the first token.
    Root,
    /// `.name`, `['name']`, or the bare-name bracket fallback.
    Child(String),
    /// `..`; the following steps apply at every descendant.
    Recursive,
    /// `.*` or `[*]`.
    Wildcard,
    /// `[n]`, possibly negative.
    Index(i64),
    /// `[start:end:step]` with every slot optional; step defaults to 1.
    Slice {
        start: Option<i64>,
        end: Option<i64>,
        step: Option<i64>,
    },
    /// `[a,b,...]`, holding all indices or all names, never mixed.
    Union(Union),
    /// `[?(expr)]` with the expression kept verbatim; parsed lazily at
    /// evaluation time.
    Filter(String),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Union {
    Indices(Vec<i64>),
    Names(Vec<String>),
}

/// Parse a path string into its token sequence.
///
/// Surrounding whitespace is ignored; the result always starts with
/// [`Token::Root`].
pub(crate) fn tokenize(path: &str) -> Result<Vec<Token>> {
    let path = path.trim();
    if path.is_empty() {
        return Err(Error::new(ErrorCode::InvalidPath, "path must not be empty"));
    }

    let mut s = Scanner::new(path);
    if !s.consume_char('$') {
        return Err(Error::new(
            ErrorCode::InvalidPath,
            "path must start with '$'",
        ));
    }
    let mut tokens = vec![Token::Root];

    while !s.eof() {
        if s.peek_str("..") {
            s.advance(2);
            tokens.push(Token::Recursive);
            // a key or wildcard directly after `..` belongs to the descent
            match s.peek_char() {
                Some('[') | Some('.') | None => {}
                Some('*') => {
                    s.advance(1);
                    tokens.push(Token::Wildcard);
                }
                Some(_) => {
                    let key = s.read_identifier();
                    if !key.is_empty() {
                        tokens.push(Token::Child(key.to_string()));
                    }
                }
            }
            continue;
        }
        if s.consume_char('.') {
            if s.consume_char('*') {
                tokens.push(Token::Wildcard);
                continue;
            }
            if s.eof() {
                return Err(Error::new(
                    ErrorCode::InvalidPath,
                    "unexpected end after '.'",
                ));
            }
            let pos = s.pos();
            let key = s.read_identifier();
            if key.is_empty() {
                return Err(Error::new(
                    ErrorCode::InvalidPath,
                    format!("expected key after '.' at position {pos}"),
                ));
            }
            tokens.push(Token::Child(key.to_string()));
            continue;
        }
        if s.consume_char('[') {
            let body = match s.capture_until(']') {
                Some(body) => body,
                None => return Err(Error::new(ErrorCode::InvalidPath, "unclosed '['")),
            };
            s.advance(1); // the ']'
            tokens.push(parse_bracket(body)?);
            continue;
        }
        return Err(Error::new(
            ErrorCode::InvalidPath,
            format!(
                "unexpected character '{}' at position {}",
                s.peek_char().unwrap_or_default(),
                s.pos()
            ),
        ));
    }

    Ok(tokens)
}

/// Classify a bracket body. Shapes are tested in a fixed order and the
/// first hit wins: filter, wildcard, union, quoted name, slice, index,
/// then the lenient bare-name fallback. The union test precedes the quoted
/// test so that `'a','b'` splits into two names instead of being swallowed
/// as one quoted key; a comma inside quotes (`'a,b'`) still names one key.
fn parse_bracket(body: &str) -> Result<Token> {
    if let Some(expr) = body
        .strip_prefix("?(")
        .and_then(|rest| rest.strip_suffix(')'))
    {
        if expr.trim().is_empty() {
            return Err(Error::new(
                ErrorCode::InvalidPath,
                "empty filter expression",
            ));
        }
        return Ok(Token::Filter(expr.to_string()));
    }
    if body == "*" {
        return Ok(Token::Wildcard);
    }
    let parts = split_top_level(body);
    if parts.len() > 1 {
        return Ok(Token::Union(parse_union(&parts)));
    }
    if let Some(name) = unquote(body) {
        // one quoted name only when the opening quote closes at the very end
        if !name.contains(&body[..1]) {
            return Ok(Token::Child(name.to_string()));
        }
    }
    if body.contains(':') {
        return parse_slice(body);
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return Err(Error::new(ErrorCode::InvalidPath, "empty brackets"));
    }
    if let Ok(index) = trimmed.parse::<i64>() {
        return Ok(Token::Index(index));
    }
    // lenient fallback: unquoted bracket content is a member name
    Ok(Token::Child(trimmed.to_string()))
}

/// Split on commas that sit outside quoted segments.
fn split_top_level(body: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut in_quote: Option<char> = None;
    let mut start = 0;
    for (i, c) in body.char_indices() {
        match in_quote {
            Some(quote) => {
                if c == quote {
                    in_quote = None;
                }
            }
            None => match c {
                '\'' | '"' => in_quote = Some(c),
                ',' => {
                    parts.push(&body[start..i]);
                    start = i + 1;
                }
                _ => {}
            },
        }
    }
    parts.push(&body[start..]);
    parts
}

/// A union commits to integer form only when every segment parses as a
/// decimal integer; anything else lands in name form, dequoted per segment.
fn parse_union(parts: &[&str]) -> Union {
    let parts: Vec<&str> = parts.iter().map(|part| part.trim()).collect();
    let indices: std::result::Result<Vec<i64>, _> =
        parts.iter().map(|part| part.parse::<i64>()).collect();
    match indices {
        Ok(indices) => Union::Indices(indices),
        Err(_) => Union::Names(
            parts
                .iter()
                .map(|&part| unquote(part).unwrap_or(part).to_string())
                .collect(),
        ),
    }
}

fn parse_slice(body: &str) -> Result<Token> {
    let parts: Vec<&str> = body.split(':').collect();
    if parts.len() > 3 {
        return Err(Error::new(
            ErrorCode::InvalidPath,
            format!("invalid slice: {body}"),
        ));
    }
    let slot = |part: Option<&&str>| -> Result<Option<i64>> {
        let part = part.map_or("", |p| p.trim());
        if part.is_empty() {
            return Ok(None);
        }
        part.parse::<i64>().map(Some).map_err(|_| {
            Error::new(
                ErrorCode::InvalidPath,
                format!("invalid slice component: {part}"),
            )
        })
    };
    Ok(Token::Slice {
        start: slot(parts.first())?,
        end: slot(parts.get(1))?,
        step: slot(parts.get(2))?,
    })
}

/// Strip one pair of matching single or double quotes, if present.
pub(crate) fn unquote(s: &str) -> Option<&str> {
    let bytes = s.as_bytes();
    if bytes.len() >= 2 && (bytes[0] == b'\'' || bytes[0] == b'"') && bytes[bytes.len() - 1] == bytes[0]
    {
        Some(&s[1..s.len() - 1])
    } else {
        None
    }
}

/// Minimal cursor over the path string.
struct Scanner<'a> {
    s: &'a str,
    i: usize,
}

impl<'a> Scanner<'a> {
    fn new(s: &'a str) -> Self {
        Self { s, i: 0 }
    }

    fn pos(&self) -> usize {
        self.i
    }

    fn eof(&self) -> bool {
        self.i >= self.s.len()
    }

    fn peek_char(&self) -> Option<char> {
        self.s[self.i..].chars().next()
    }

    fn peek_str(&self, lit: &str) -> bool {
        self.s[self.i..].starts_with(lit)
    }

    fn advance(&mut self, bytes: usize) {
        self.i += bytes;
    }

    fn consume_char(&mut self, c: char) -> bool {
        if self.peek_char() == Some(c) {
            self.i += c.len_utf8();
            true
        } else {
            false
        }
    }

    /// Read a run of identifier characters: letters, digits, `_`, `-`.
    /// May be empty.
    fn read_identifier(&mut self) -> &'a str {
        let start = self.i;
        while let Some(c) = self.peek_char() {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                self.i += 1;
            } else {
                break;
            }
        }
        &self.s[start..self.i]
    }

    /// Capture everything up to (not including) `end`, leaving the cursor
    /// on the terminator. `None` when the terminator never appears.
    fn capture_until(&mut self, end: char) -> Option<&'a str> {
        let start = self.i;
        while let Some(c) = self.peek_char() {
            if c == end {
                return Some(&self.s[start..self.i]);
            }
            self.i += c.len_utf8();
        }
        None
    }
}
