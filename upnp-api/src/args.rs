//! Typed action arguments.
//!
//! UPnP AV actions only ever exchange booleans, strings and unsigned
//! integers, so arguments are carried as a small tagged value in an ordered
//! list. Input lists are rendered into the SOAP body in order; output lists
//! declare the expected names and types and are filled in place from the
//! response element.

use crate::error::{ApiError, Result};
use xmltree::Element;

/// A single action argument value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgValue {
    Bool(bool),
    Str(String),
    UInt(u32),
}

impl ArgValue {
    /// Text as it appears in a SOAP body.
    pub fn to_text(&self) -> String {
        match self {
            ArgValue::Bool(true) => "1".to_string(),
            ArgValue::Bool(false) => "0".to_string(),
            ArgValue::Str(s) => s.clone(),
            ArgValue::UInt(n) => n.to_string(),
        }
    }

    /// Replace the value with `text` parsed as the same variant.
    fn assign(&mut self, name: &str, text: &str) -> Result<()> {
        let invalid = || ApiError::InvalidArgument {
            name: name.to_string(),
            value: text.to_string(),
        };

        match self {
            ArgValue::Bool(b) => *b = parse_bool(text).ok_or_else(invalid)?,
            ArgValue::Str(s) => *s = text.to_string(),
            ArgValue::UInt(n) => *n = text.trim().parse().map_err(|_| invalid())?,
        }
        Ok(())
    }
}

/// Read a UPnP boolean: `1`/`0`, `true`/`false` or `yes`/`no`, any case.
pub fn parse_bool(text: &str) -> Option<bool> {
    match text.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Some(true),
        "0" | "false" | "no" => Some(false),
        _ => None,
    }
}

impl From<bool> for ArgValue {
    fn from(value: bool) -> Self {
        ArgValue::Bool(value)
    }
}

impl From<&str> for ArgValue {
    fn from(value: &str) -> Self {
        ArgValue::Str(value.to_string())
    }
}

impl From<String> for ArgValue {
    fn from(value: String) -> Self {
        ArgValue::Str(value)
    }
}

impl From<u32> for ArgValue {
    fn from(value: u32) -> Self {
        ArgValue::UInt(value)
    }
}

/// Ordered `(name, value)` pairs.
///
/// ```
/// use upnp_api::{ActionArgs, ArgValue};
///
/// let args = ActionArgs::new()
///     .with("InstanceID", 0u32)
///     .with("Channel", "Master")
///     .with("DesiredMute", true);
///
/// assert_eq!(args.get("DesiredMute"), Some(&ArgValue::Bool(true)));
/// assert_eq!(
///     args.to_payload(),
///     "<InstanceID>0</InstanceID><Channel>Master</Channel><DesiredMute>1</DesiredMute>"
/// );
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionArgs(Vec<(String, ArgValue)>);

impl ActionArgs {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<ArgValue>) -> Self {
        self.push(name, value);
        self
    }

    pub fn push(&mut self, name: impl Into<String>, value: impl Into<ArgValue>) {
        self.0.push((name.into(), value.into()));
    }

    /// Append all of `other` after the existing arguments.
    pub fn extend(&mut self, other: ActionArgs) {
        self.0.extend(other.0);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ArgValue)> {
        self.0.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&ArgValue> {
        self.0
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, value)| value)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        match self.get(name)? {
            ArgValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn get_uint(&self, name: &str) -> Option<u32> {
        match self.get(name)? {
            ArgValue::UInt(n) => Some(*n),
            _ => None,
        }
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        match self.get(name)? {
            ArgValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Render as the inner XML of a SOAP action element.
    pub fn to_payload(&self) -> String {
        self.0
            .iter()
            .map(|(name, value)| {
                format!(
                    "<{name}>{}</{name}>",
                    quick_xml::escape::escape(value.to_text().as_str())
                )
            })
            .collect()
    }

    /// Fill every declared argument from the children of `response`.
    ///
    /// Fails on the first argument that is absent or does not parse as its
    /// declared variant. An empty element is an empty string, which only a
    /// `Str` argument accepts.
    pub fn decode_from(&mut self, response: &Element) -> Result<()> {
        for (name, value) in self.0.iter_mut() {
            let child = response
                .get_child(name.as_str())
                .ok_or_else(|| ApiError::MissingArgument(name.clone()))?;
            let text = child.get_text().unwrap_or_default();
            value.assign(name, &text)?;
        }
        Ok(())
    }
}

impl<N: Into<String>, V: Into<ArgValue>> FromIterator<(N, V)> for ActionArgs {
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(name, value)| (name.into(), value.into()))
                .collect(),
        )
    }
}
