//! Tolerant HTML scanning for server-rendered platform pages.
//!
//! Tag and attribute names match case-insensitively, unclosed elements run to the
//! end of the document, and malformed markup yields fewer matches instead of an error.

const VOID_TAGS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source",
    "track", "wbr",
];

/// An opening tag: its name and raw source (`<div class="x">`).
#[derive(Debug, Clone, Copy)]
pub struct Tag<'a> {
    name: &'a str,
    source: &'a str,
}

impl<'a> Tag<'a> {
    pub fn name(&self) -> &'a str {
        self.name
    }

    pub fn is(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }

    /// Attribute value with entities decoded. Valueless attributes read as `""`.
    pub fn attr(&self, name: &str) -> Option<String> {
        attributes(self.source, self.name.len())
            .into_iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| decode_entities(v))
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.attr("class")
            .is_some_and(|c| c.split_whitespace().any(|t| t == class))
    }
}

/// A matched element and its inner markup.
#[derive(Debug, Clone, Copy)]
pub struct Element<'a> {
    pub tag: Tag<'a>,
    inner: &'a str,
}

impl<'a> Element<'a> {
    pub fn attr(&self, name: &str) -> Option<String> {
        self.tag.attr(name)
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.tag.has_class(class)
    }

    pub fn inner(&self) -> &'a str {
        self.inner
    }

    /// Visible text: tags stripped, entities decoded, whitespace collapsed.
    pub fn text(&self) -> String {
        clean_text(self.inner)
    }

    pub fn find_all(&self, pred: impl Fn(&Tag<'_>) -> bool) -> Vec<Element<'a>> {
        find_all(self.inner, pred)
    }

    pub fn by_class(&self, class: &str) -> Vec<Element<'a>> {
        by_class(self.inner, class)
    }

    pub fn first_by_class(&self, class: &str) -> Option<Element<'a>> {
        first_by_class(self.inner, class)
    }

    pub fn by_tag(&self, name: &str) -> Vec<Element<'a>> {
        by_tag(self.inner, name)
    }

    /// Text of the first descendant with `class`, `None` when absent or blank.
    pub fn text_of_class(&self, class: &str) -> Option<String> {
        self.first_by_class(class)
            .map(|e| e.text())
            .filter(|t| !t.is_empty())
    }
}

enum Token<'a> {
    Open {
        tag: Tag<'a>,
        end: usize,
        self_closing: bool,
    },
    Close {
        name: &'a str,
        start: usize,
        end: usize,
    },
    Other {
        end: usize,
    },
}

fn tag_name(s: &str) -> &str {
    let len = s
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-' || c == ':'))
        .unwrap_or(s.len());
    &s[..len]
}

/// Index just past the `>` closing a tag, skipping quoted attribute values.
fn tag_end(html: &str, from: usize) -> usize {
    let mut quote: Option<u8> = None;
    for (i, &b) in html.as_bytes().iter().enumerate().skip(from) {
        match quote {
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None if b == b'"' || b == b'\'' => quote = Some(b),
            None if b == b'>' => return i + 1,
            None => {}
        }
    }
    html.len()
}

fn next_token(html: &str, from: usize) -> Option<Token<'_>> {
    let start = html.get(from..)?.find('<')? + from;
    let rest = &html[start + 1..];

    if rest.starts_with("!--") {
        let end = rest
            .find("-->")
            .map_or(html.len(), |e| start + 1 + e + 3);
        return Some(Token::Other { end });
    }
    if rest.starts_with('!') || rest.starts_with('?') {
        return Some(Token::Other {
            end: tag_end(html, start + 1),
        });
    }
    if let Some(close) = rest.strip_prefix('/') {
        let name = tag_name(close);
        return Some(Token::Close {
            name,
            start,
            end: tag_end(html, start + 1),
        });
    }

    let name = tag_name(rest);
    if name.is_empty() {
        return Some(Token::Other { end: start + 1 });
    }
    let end = tag_end(html, start + 1);
    let source = &html[start..end];
    let self_closing =
        source.ends_with("/>") || VOID_TAGS.iter().any(|v| v.eq_ignore_ascii_case(name));
    Some(Token::Open {
        tag: Tag { name, source },
        end,
        self_closing,
    })
}

/// Start of the matching close tag and the index just past it.
fn find_close(html: &str, name: &str, from: usize) -> (usize, usize) {
    let mut depth = 1usize;
    let mut pos = from;
    while let Some(token) = next_token(html, pos) {
        match token {
            Token::Open {
                tag,
                end,
                self_closing,
            } => {
                if !self_closing && tag.is(name) {
                    depth += 1;
                }
                pos = end;
            }
            Token::Close {
                name: closing,
                start,
                end,
            } => {
                if closing.eq_ignore_ascii_case(name) {
                    depth -= 1;
                    if depth == 0 {
                        return (start, end);
                    }
                }
                pos = end;
            }
            Token::Other { end } => pos = end,
        }
    }
    (html.len(), html.len())
}

/// Every element (nested ones included) whose opening tag satisfies `pred`, in document order.
pub fn find_all<'a>(html: &'a str, pred: impl Fn(&Tag<'_>) -> bool) -> Vec<Element<'a>> {
    let mut found = Vec::new();
    let mut pos = 0;
    while let Some(token) = next_token(html, pos) {
        match token {
            Token::Open {
                tag,
                end,
                self_closing,
            } => {
                if pred(&tag) {
                    let inner = if self_closing {
                        ""
                    } else {
                        let (close_start, _) = find_close(html, tag.name, end);
                        &html[end..close_start]
                    };
                    found.push(Element { tag, inner });
                }
                pos = end;
            }
            Token::Close { end, .. } | Token::Other { end } => pos = end,
        }
    }
    found
}

pub fn find_first<'a>(html: &'a str, pred: impl Fn(&Tag<'_>) -> bool) -> Option<Element<'a>> {
    find_all(html, pred).into_iter().next()
}

pub fn by_class<'a>(html: &'a str, class: &str) -> Vec<Element<'a>> {
    find_all(html, |t| t.has_class(class))
}

pub fn first_by_class<'a>(html: &'a str, class: &str) -> Option<Element<'a>> {
    find_first(html, |t| t.has_class(class))
}

pub fn by_id<'a>(html: &'a str, id: &str) -> Option<Element<'a>> {
    find_first(html, |t| t.attr("id").as_deref() == Some(id))
}

pub fn by_tag<'a>(html: &'a str, name: &str) -> Vec<Element<'a>> {
    find_all(html, |t| t.is(name))
}

/// `(name, raw value)` pairs from an opening tag's source.
fn attributes(source: &str, name_len: usize) -> Vec<(&str, &str)> {
    let body = source
        .get(1 + name_len..)
        .unwrap_or("")
        .trim_end_matches('>')
        .trim_end_matches('/');
    let bytes = body.as_bytes();
    let mut attrs = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        while i < bytes.len() && (bytes[i].is_ascii_whitespace() || bytes[i] == b'/') {
            i += 1;
        }
        let key_start = i;
        while i < bytes.len() && !bytes[i].is_ascii_whitespace() && bytes[i] != b'=' {
            i += 1;
        }
        let key = &body[key_start..i];
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }

        let mut value = "";
        if i < bytes.len() && bytes[i] == b'=' {
            i += 1;
            while i < bytes.len() && bytes[i].is_ascii_whitespace() {
                i += 1;
            }
            if i < bytes.len() && (bytes[i] == b'"' || bytes[i] == b'\'') {
                let quote = bytes[i];
                let value_start = i + 1;
                i = value_start;
                while i < bytes.len() && bytes[i] != quote {
                    i += 1;
                }
                value = &body[value_start..i];
                i += 1;
            } else {
                let value_start = i;
                while i < bytes.len() && !bytes[i].is_ascii_whitespace() {
                    i += 1;
                }
                value = &body[value_start..i];
            }
        }

        if !key.is_empty() {
            attrs.push((key, value));
        }
    }
    attrs
}

pub fn strip_tags(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_tag = false;
    for ch in s.chars() {
        match ch {
            '<' => {
                in_tag = true;
                out.push(' ');
            }
            '>' if in_tag => in_tag = false,
            _ if !in_tag => out.push(ch),
            _ => {}
        }
    }
    out
}

pub fn normalize_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn decode_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let after = &rest[amp + 1..];
        let decoded = after.find(';').filter(|&semi| semi <= 10).and_then(|semi| {
            let entity = &after[..semi];
            let ch = match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                "nbsp" => Some(' '),
                "ndash" => Some('–'),
                _ => entity
                    .strip_prefix("#x")
                    .or_else(|| entity.strip_prefix("#X"))
                    .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                    .or_else(|| entity.strip_prefix('#').and_then(|d| d.parse().ok()))
                    .and_then(char::from_u32),
            };
            ch.map(|c| (c, semi))
        });
        match decoded {
            Some((c, semi)) => {
                out.push(c);
                rest = &after[semi + 1..];
            }
            None => {
                out.push('&');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Visible text of a markup fragment.
pub fn clean_text(fragment: &str) -> String {
    normalize_ws(&decode_entities(&strip_tags(fragment)))
}

/// Value of `name` in the query string of `href`.
pub fn query_param(href: &str, name: &str) -> Option<String> {
    let (_, query) = href.split_once('?')?;
    let query = query.split('#').next().unwrap_or(query);
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(k, _)| *k == name)
        .map(|(_, v)| v.to_string())
        .filter(|v| !v.is_empty())
}

/// Path segment following `marker` (`/courses/12/assignments/7`, `"assignments"` → `"7"`).
pub fn segment_after(href: &str, marker: &str) -> Option<String> {
    let path = href.split(['?', '#']).next().unwrap_or(href);
    let mut segments = path.split('/');
    segments.find(|s| *s == marker)?;
    segments
        .next()
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}
