//! Decoding of GENA notifications.
//!
//! AVTransport and RenderingControl do not event their variables one by one;
//! they send a single `LastChange` variable whose value is an escaped XML
//! document:
//!
//! ```xml
//! <Event xmlns="urn:schemas-upnp-org:metadata-1-0/AVT/">
//!   <InstanceID val="0">
//!     <TransportState val="PLAYING"/>
//!     <CurrentTrackDuration val="0:03:21"/>
//!   </InstanceID>
//! </Event>
//! ```
//!
//! [`extract_property`] pulls `LastChange` (or any other variable) out of the
//! `propertyset` body and [`decode_notification`] flattens the instance into
//! `name -> value`.

use std::collections::HashMap;
use xmltree::{Element, XMLNode};

/// Flatten the first `Event/InstanceID` of a `LastChange` document.
///
/// Children without a `val` attribute are skipped. When a variable appears
/// once per channel (`<Volume channel="LF" val="..."/>`), the `Master` or
/// channel-less value is kept. Malformed input is logged and yields an
/// empty map.
pub fn decode_notification(raw: &str) -> HashMap<String, String> {
    let mut values = HashMap::new();

    let event = match Element::parse(raw.trim().as_bytes()) {
        Ok(event) => event,
        Err(e) => {
            tracing::warn!("Discarding undecodable event payload: {}", e);
            return values;
        }
    };

    let Some(instance) = event.get_child("InstanceID") else {
        tracing::debug!("Event payload has no InstanceID");
        return values;
    };

    for child in instance.children.iter().filter_map(XMLNode::as_element) {
        let Some(value) = child.attributes.get("val") else {
            continue;
        };
        let name = child.name.clone();
        match child.attributes.get("channel").map(String::as_str) {
            None | Some("Master") => {
                values.insert(name, value.clone());
            }
            Some(_) => {
                values.entry(name).or_insert_with(|| value.clone());
            }
        }
    }

    values
}

/// Value of state variable `variable` in a GENA `propertyset` body.
///
/// Returns `None` when the body does not parse or the variable is absent.
pub fn extract_property(propertyset_xml: &str, variable: &str) -> Option<String> {
    let propertyset = match Element::parse(propertyset_xml.trim().as_bytes()) {
        Ok(propertyset) => propertyset,
        Err(e) => {
            tracing::warn!("Discarding undecodable property set: {}", e);
            return None;
        }
    };

    propertyset
        .children
        .iter()
        .filter_map(XMLNode::as_element)
        .filter(|property| property.name == "property")
        .find_map(|property| property.get_child(variable))
        .map(|element| element.get_text().map(|t| t.into_owned()).unwrap_or_default())
}
