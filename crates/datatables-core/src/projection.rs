//! Inspection of the caller's base projection.
//!
//! Column discovery walks the top-level `SELECT` list: nested parentheses
//! (subqueries, function calls), string literals, quoted identifiers and
//! comments are stepped over so their commas and keywords never split or
//! end the list.

use std::sync::OnceLock;

use regex::Regex;

use crate::error::{Error, Result};

/// Keywords that expect an operand after them, so a word following one of
/// them is never an alias.
const OPERAND_KEYWORDS: &[&str] = &[
   "AND", "BETWEEN", "CASE", "COLLATE", "DISTINCT", "ELSE", "ESCAPE", "GLOB", "IN", "IS", "LIKE",
   "NOT", "OR", "REGEXP", "THEN", "WHEN",
];

/// Keywords that end an expression and cannot be an alias themselves.
const TERMINAL_KEYWORDS: &[&str] = &[
   "ASC", "DESC", "END", "FALSE", "NULL", "TRUE", "CURRENT_DATE", "CURRENT_TIME",
   "CURRENT_TIMESTAMP",
];

/// Names of the columns produced by `query`, in projection order.
///
/// Wildcard items (`*`, `t.*`) cannot be named and are skipped; a
/// projection with nothing nameable is a configuration error.
pub fn column_names(query: &str) -> Result<Vec<String>> {
   let list = select_list(query).ok_or(Error::NoColumns)?;

   let names: Vec<String> = split_top_level(list)
      .into_iter()
      .filter_map(item_name)
      .collect();

   if names.is_empty() {
      return Err(Error::NoColumns);
   }
   Ok(names)
}

/// Whether any line of `query` carries an `ORDER BY` clause.
///
/// Matched per line, so an `ORDER BY` inside a subquery also counts.
pub fn has_order_by(query: &str) -> bool {
   static RE: OnceLock<Regex> = OnceLock::new();
   let re = RE.get_or_init(|| Regex::new(r"(?i)(order\s+by)\s+(.+)$").expect("invalid regex"));
   query.lines().any(|line| re.is_match(line))
}

/// Rewrite the named placeholders (`:name`, `@name`, `$name`) of `query`.
///
/// `rename` receives each token with its sigil and returns the replacement,
/// or `None` to leave the token as written. Tokens inside string literals,
/// quoted identifiers and comments are never touched, nor are `::` casts.
pub fn rewrite_named_placeholders(query: &str, mut rename: impl FnMut(&str) -> Option<String>) -> String {
   let bytes = query.as_bytes();
   let len = bytes.len();
   let is_ident = |b: u8| b.is_ascii_alphanumeric() || b == b'_' || b == b'$';
   let mut out = String::with_capacity(len);
   let mut copied = 0;
   let mut i = 0;

   while i < len {
      match bytes[i] {
         b'\'' => i = skip_quoted(bytes, i, b'\''),
         b'"' => i = skip_quoted(bytes, i, b'"'),
         b'`' => i = skip_quoted(bytes, i, b'`'),
         b'[' => i = skip_quoted(bytes, i, b']'),
         b'-' if i + 1 < len && bytes[i + 1] == b'-' => i = skip_line_comment(bytes, i),
         b'/' if i + 1 < len && bytes[i + 1] == b'*' => i = skip_block_comment(bytes, i),
         b':' | b'@' | b'$'
            if i + 1 < len
               && (bytes[i + 1].is_ascii_alphabetic() || bytes[i + 1] == b'_')
               && (i == 0 || !(is_ident(bytes[i - 1]) || bytes[i - 1] == b':')) =>
         {
            let end = bytes[i + 1..]
               .iter()
               .position(|&b| !(b.is_ascii_alphanumeric() || b == b'_'))
               .map_or(len, |n| i + 1 + n);
            if let Some(replacement) = rename(&query[i..end]) {
               out.push_str(&query[copied..i]);
               out.push_str(&replacement);
               copied = end;
            }
            i = end;
            continue;
         }
         _ => {}
      }
      i += 1;
   }

   out.push_str(&query[copied..]);
   out
}

/// Check whether `keyword` appears as a standalone keyword at position `i`
/// in the uppercased byte slice `bytes`.
fn is_keyword_at(bytes: &[u8], i: usize, keyword: &[u8]) -> bool {
   let len = bytes.len();
   let klen = keyword.len();
   if i + klen > len || &bytes[i..i + klen] != keyword {
      return false;
   }
   let is_ident = |b: u8| b.is_ascii_alphanumeric() || b == b'_' || b == b'$';
   let before_ok = i == 0 || !is_ident(bytes[i - 1]);
   let after_ok = i + klen >= len || !is_ident(bytes[i + klen]);

   before_ok && after_ok
}

/// Advance past a quoted section opened at `i`; `close` is the closing byte.
/// Doubled closing quotes are escapes.
fn skip_quoted(bytes: &[u8], i: usize, close: u8) -> usize {
   let mut j = i + 1;
   while j < bytes.len() {
      if bytes[j] == close {
         if close != b']' && j + 1 < bytes.len() && bytes[j + 1] == close {
            j += 2;
            continue;
         }
         return j;
      }
      j += 1;
   }
   j
}

fn skip_line_comment(bytes: &[u8], i: usize) -> usize {
   let mut j = i + 2;
   while j < bytes.len() && bytes[j] != b'\n' {
      j += 1;
   }
   j
}

fn skip_block_comment(bytes: &[u8], i: usize) -> usize {
   let mut j = i + 2;
   while j + 1 < bytes.len() {
      if bytes[j] == b'*' && bytes[j + 1] == b'/' {
         return j + 1;
      }
      j += 1;
   }
   bytes.len().saturating_sub(1)
}

/// Call `on_top_level` at each position at paren depth 0 that is outside
/// quotes and comments. Returns the first `Some` it yields.
///
/// Uppercasing is ASCII-only so byte positions line up with `query`.
fn scan_top_level<T>(query: &str, mut on_top_level: impl FnMut(&[u8], usize) -> Option<T>) -> Option<T> {
   let upper = query.to_ascii_uppercase();
   let bytes = upper.as_bytes();
   let len = bytes.len();
   let mut depth: i32 = 0;
   let mut i = 0;

   while i < len {
      match bytes[i] {
         b'(' => depth += 1,
         b')' => depth -= 1,
         b'\'' => i = skip_quoted(bytes, i, b'\''),
         b'"' => i = skip_quoted(bytes, i, b'"'),
         b'`' => i = skip_quoted(bytes, i, b'`'),
         b'[' => i = skip_quoted(bytes, i, b']'),
         b'-' if i + 1 < len && bytes[i + 1] == b'-' => i = skip_line_comment(bytes, i),
         b'/' if i + 1 < len && bytes[i + 1] == b'*' => i = skip_block_comment(bytes, i),
         _ if depth == 0 => {
            if let Some(found) = on_top_level(bytes, i) {
               return Some(found);
            }
         }
         _ => {}
      }
      i += 1;
   }

   None
}

/// The text between the first top-level `SELECT` and its `FROM`, without any
/// leading `DISTINCT`/`ALL`.
fn select_list(query: &str) -> Option<&str> {
   let select = scan_top_level(query, |bytes, i| {
      is_keyword_at(bytes, i, b"SELECT").then_some(i)
   })?;
   let list_start = select + "SELECT".len();

   let list_end = scan_top_level(query, |bytes, i| {
      (i >= list_start && is_keyword_at(bytes, i, b"FROM")).then_some(i)
   })
   .unwrap_or(query.len());

   let list = query[list_start..list_end].trim().trim_end_matches(';').trim_end();
   let upper = list.to_ascii_uppercase();
   for modifier in ["DISTINCT", "ALL"] {
      if is_keyword_at(upper.as_bytes(), 0, modifier.as_bytes()) {
         return Some(list[modifier.len()..].trim_start());
      }
   }
   Some(list)
}

/// Split on commas at paren depth 0.
fn split_top_level(list: &str) -> Vec<&str> {
   let mut cuts = Vec::new();
   scan_top_level(list, |bytes, i| {
      if bytes[i] == b',' {
         cuts.push(i);
      }
      None::<()>
   });

   let mut items = Vec::with_capacity(cuts.len() + 1);
   let mut start = 0;
   for cut in cuts {
      items.push(list[start..cut].trim());
      start = cut + 1;
   }
   items.push(list[start..].trim());
   items.retain(|item| !item.is_empty());
   items
}

#[derive(Debug, Clone, PartialEq)]
struct Segment {
   text: String,
   quoted: bool,
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
   /// Identifier or keyword, possibly dotted (`film.length`, `t."x"`)
   Word(Vec<Segment>),
   /// Single-quoted string literal
   Literal(String),
   Number,
   /// Parenthesised group
   Group,
   Symbol(char),
}

impl Token {
   fn bare_keyword(&self) -> Option<String> {
      match self {
         Token::Word(segments) if segments.len() == 1 && !segments[0].quoted => {
            Some(segments[0].text.to_ascii_uppercase())
         }
         _ => None,
      }
   }

   fn is_operand(&self) -> bool {
      match self {
         Token::Word(_) => self
            .bare_keyword()
            .is_none_or(|kw| !OPERAND_KEYWORDS.contains(&kw.as_str())),
         Token::Literal(_) | Token::Number | Token::Group => true,
         Token::Symbol(_) => false,
      }
   }

   /// The name this token would give as an alias.
   fn alias(&self) -> Option<String> {
      match self {
         Token::Word(segments) if segments.len() == 1 => {
            if let Some(kw) = self.bare_keyword()
               && (TERMINAL_KEYWORDS.contains(&kw.as_str())
                  || OPERAND_KEYWORDS.contains(&kw.as_str()))
            {
               return None;
            }
            Some(segments[0].text.clone())
         }
         Token::Literal(text) => Some(text.clone()),
         _ => None,
      }
   }
}

/// Read a quoted section starting at `chars[i]`, returning its unescaped
/// content and the index just past the closing quote.
fn read_quoted(chars: &[char], i: usize, close: char) -> (String, usize) {
   let mut text = String::new();
   let mut j = i + 1;
   while j < chars.len() {
      if chars[j] == close {
         if close != ']' && j + 1 < chars.len() && chars[j + 1] == close {
            text.push(close);
            j += 2;
            continue;
         }
         return (text, j + 1);
      }
      text.push(chars[j]);
      j += 1;
   }
   (text, j)
}

fn is_ident_char(c: char) -> bool {
   c.is_alphanumeric() || c == '_' || c == '$'
}

fn closing_quote(c: char) -> Option<char> {
   match c {
      '"' => Some('"'),
      '`' => Some('`'),
      '[' => Some(']'),
      _ => None,
   }
}

/// Read one identifier segment (bare or quoted) at `i`.
fn read_segment(chars: &[char], i: usize) -> Option<(Segment, usize)> {
   let c = *chars.get(i)?;
   if let Some(close) = closing_quote(c) {
      let (text, next) = read_quoted(chars, i, close);
      return Some((Segment { text, quoted: true }, next));
   }
   if is_ident_char(c) && !c.is_ascii_digit() {
      let mut j = i;
      while j < chars.len() && is_ident_char(chars[j]) {
         j += 1;
      }
      let text = chars[i..j].iter().collect();
      return Some((
         Segment {
            text,
            quoted: false,
         },
         j,
      ));
   }
   None
}

fn tokenize(item: &str) -> Vec<Token> {
   let chars: Vec<char> = item.chars().collect();
   let mut tokens = Vec::new();
   let mut i = 0;

   while i < chars.len() {
      let c = chars[i];
      match c {
         _ if c.is_whitespace() => i += 1,
         '-' if chars.get(i + 1) == Some(&'-') => {
            while i < chars.len() && chars[i] != '\n' {
               i += 1;
            }
         }
         '/' if chars.get(i + 1) == Some(&'*') => {
            i += 2;
            while i + 1 < chars.len() && !(chars[i] == '*' && chars[i + 1] == '/') {
               i += 1;
            }
            i += 2;
         }
         '\'' => {
            let (text, next) = read_quoted(&chars, i, '\'');
            tokens.push(Token::Literal(text));
            i = next;
         }
         '(' => {
            let mut depth = 0;
            while i < chars.len() {
               match chars[i] {
                  '(' => depth += 1,
                  ')' => {
                     depth -= 1;
                     if depth == 0 {
                        break;
                     }
                  }
                  '\'' => i = read_quoted(&chars, i, '\'').1 - 1,
                  q if closing_quote(q).is_some() => {
                     i = read_quoted(&chars, i, closing_quote(q).unwrap_or(q)).1 - 1
                  }
                  _ => {}
               }
               i += 1;
            }
            tokens.push(Token::Group);
            i += 1;
         }
         _ if c.is_ascii_digit() => {
            while i < chars.len() && (is_ident_char(chars[i]) || chars[i] == '.') {
               i += 1;
            }
            tokens.push(Token::Number);
         }
         _ => match read_segment(&chars, i) {
            Some((first, mut next)) => {
               let mut segments = vec![first];
               while chars.get(next) == Some(&'.') {
                  match read_segment(&chars, next + 1) {
                     Some((segment, after)) => {
                        segments.push(segment);
                        next = after;
                     }
                     None => break,
                  }
               }
               tokens.push(Token::Word(segments));
               i = next;
            }
            None => {
               tokens.push(Token::Symbol(c));
               i += 1;
            }
         },
      }
   }

   tokens
}

/// Output name of a single projection item, or `None` for wildcards.
fn item_name(item: &str) -> Option<String> {
   let tokens = tokenize(item);
   let n = tokens.len();

   if n == 0 || tokens.last() == Some(&Token::Symbol('*')) {
      return None;
   }

   if n >= 2 {
      if tokens[n - 2].bare_keyword().as_deref() == Some("AS") {
         return tokens[n - 1].alias();
      }
      if tokens[n - 2].is_operand()
         && let Some(alias) = tokens[n - 1].alias()
      {
         return Some(alias);
      }
      return Some(item.to_string());
   }

   match &tokens[0] {
      Token::Word(segments) => segments.last().map(|s| s.text.clone()),
      _ => Some(item.to_string()),
   }
}
