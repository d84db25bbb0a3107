//! Namespace stripping and serde parsing for UPnP XML.

use crate::{ApiError, Result};
use serde::de::DeserializeOwned;

/// Parse XML into `T` after removing namespace prefixes.
pub fn parse<T: DeserializeOwned>(xml: &str) -> Result<T> {
    let stripped = strip_namespaces(xml);
    quick_xml::de::from_str(&stripped)
        .map_err(|e| ApiError::ParseError(format!("XML deserialization failed: {}", e)))
}

/// Remove namespace prefixes from element and attribute names and drop
/// `xmlns` declarations.
///
/// `<dc:title>Song</dc:title>` becomes `<title>Song</title>`. Text content,
/// comments, CDATA and processing instructions are copied unchanged.
pub fn strip_namespaces(xml: &str) -> String {
    let mut result = String::with_capacity(xml.len());
    let mut rest = xml;

    while let Some(start) = rest.find('<') {
        result.push_str(&rest[..start]);
        rest = &rest[start..];

        // Markup that is not a plain tag is copied through to its terminator
        let special_end = if rest.starts_with("<!--") {
            Some("-->")
        } else if rest.starts_with("<![CDATA[") {
            Some("]]>")
        } else if rest.starts_with("<?") || rest.starts_with("<!") {
            Some(">")
        } else {
            None
        };
        if let Some(terminator) = special_end {
            let end = rest.find(terminator).map_or(rest.len(), |i| i + terminator.len());
            result.push_str(&rest[..end]);
            rest = &rest[end..];
            continue;
        }

        let end = tag_end(rest);
        strip_tag(&rest[..end], &mut result);
        rest = &rest[end..];
    }

    result.push_str(rest);
    result
}

/// Index just past the `>` closing the tag at the start of `tag`, skipping
/// quoted attribute values.
fn tag_end(tag: &str) -> usize {
    let mut quote = None;
    for (i, ch) in tag.char_indices() {
        match (quote, ch) {
            (Some(q), c) if c == q => quote = None,
            (None, '"') | (None, '\'') => quote = Some(ch),
            (None, '>') => return i + 1,
            _ => {}
        }
    }
    tag.len()
}

fn strip_tag(tag: &str, out: &mut String) {
    let inner = tag.trim_start_matches('<');
    let (closing, inner) = match inner.strip_prefix('/') {
        Some(rest) => (true, rest),
        None => (false, inner),
    };
    out.push('<');
    if closing {
        out.push('/');
    }

    let name_len = inner
        .find(|c: char| c.is_whitespace() || c == '>' || c == '/')
        .unwrap_or(inner.len());
    out.push_str(local_name(&inner[..name_len]));

    let mut attrs = &inner[name_len..];
    loop {
        let trimmed = attrs.trim_start();
        out.push_str(&attrs[..attrs.len() - trimmed.len()]);
        attrs = trimmed;

        if attrs.is_empty() || attrs.starts_with('>') || attrs.starts_with('/') {
            out.push_str(attrs);
            return;
        }

        let attr_name_len = attrs
            .find(|c: char| c == '=' || c.is_whitespace() || c == '>' || c == '/')
            .unwrap_or(attrs.len());
        let attr_name = &attrs[..attr_name_len];
        let value_len = attribute_value_len(&attrs[attr_name_len..]);
        let value = &attrs[attr_name_len..attr_name_len + value_len];

        if attr_name != "xmlns" && !attr_name.starts_with("xmlns:") {
            out.push_str(local_name(attr_name));
            out.push_str(value);
        } else if out.ends_with(' ') {
            out.pop();
        }
        attrs = &attrs[attr_name_len + value_len..];
    }
}

/// Length of `="value"` (with optional whitespace) at the start of `s`.
fn attribute_value_len(s: &str) -> usize {
    let after_ws = s.trim_start();
    let Some(after_eq) = after_ws.strip_prefix('=') else {
        return 0;
    };
    let value = after_eq.trim_start();
    let prefix = s.len() - value.len();

    match value.chars().next() {
        Some(q @ ('"' | '\'')) => match value[1..].find(q) {
            Some(close) => prefix + close + 2,
            None => s.len(),
        },
        _ => {
            let len = value
                .find(|c: char| c.is_whitespace() || c == '>' || c == '/')
                .unwrap_or(value.len());
            prefix + len
        }
    }
}

fn local_name(name: &str) -> &str {
    name.rsplit_once(':').map_or(name, |(_, local)| local)
}
