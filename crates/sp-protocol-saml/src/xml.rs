//! XML helpers for SAML message processing.
//!
//! SAML messages are handled at two levels: a pull parser (`quick-xml`) for
//! reading element text and attributes, and byte-offset string operations
//! for the signature engine, which must reproduce exact document substrings.

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::{SpError, SpResult};

/// A parsed SAML document.
///
/// Signature canonicalization is whitespace-sensitive, so the document
/// records whether whitespace was preserved at parse time. The signature
/// verifier treats a collapsed parse as a fatal precondition failure.
#[derive(Debug, Clone)]
pub struct SamlDocument {
    xml: String,
    preserve_whitespace: bool,
}

impl SamlDocument {
    /// Parses a document, preserving whitespace.
    ///
    /// This is the only parse mode whose output is accepted by the
    /// signature verifier.
    pub fn parse(xml: impl Into<String>) -> SpResult<Self> {
        let xml = xml.into();
        check_well_formed(&xml)?;
        Ok(Self { xml, preserve_whitespace: true })
    }

    /// Parses a document with whitespace-only text nodes collapsed.
    ///
    /// Suitable for reading unsigned envelopes; documents parsed this way
    /// cannot be signature-verified.
    pub fn parse_collapsed(xml: impl Into<String>) -> SpResult<Self> {
        let xml: String = xml.into();
        check_well_formed(&xml)?;
        let collapsed = xml
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join("");
        Ok(Self { xml: collapsed, preserve_whitespace: false })
    }

    /// Returns the document text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.xml
    }

    /// Returns true if whitespace was preserved at parse time.
    #[must_use]
    pub const fn preserves_whitespace(&self) -> bool {
        self.preserve_whitespace
    }
}

/// Verifies the input is well-formed XML.
fn check_well_formed(xml: &str) -> SpResult<()> {
    let mut reader = Reader::from_str(xml);
    let mut saw_root = false;
    loop {
        match reader.read_event() {
            Ok(Event::Eof) => break,
            Ok(Event::Start(_) | Event::Empty(_)) => saw_root = true,
            Ok(_) => {}
            Err(e) => return Err(SpError::Format(format!("XML parsing error: {e}"))),
        }
    }
    if !saw_root {
        return Err(SpError::Format("document has no root element".to_string()));
    }
    Ok(())
}

/// Escapes a string for use in XML text or attribute content.
#[must_use]
pub fn xml_escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

fn unescape_owned(value: String) -> String {
    quick_xml::escape::unescape(&value)
        .map(|cow| cow.into_owned())
        .unwrap_or(value)
}

/// Returns the text content of the first element with the given local name.
#[must_use]
pub fn element_text(xml: &str, local_name: &str) -> Option<String> {
    let mut reader = Reader::from_str(xml);
    let mut inside = false;
    let mut text = String::new();
    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) if e.local_name().as_ref() == local_name.as_bytes() => {
                inside = true;
            }
            Ok(Event::Text(ref e)) if inside => {
                text.push_str(&String::from_utf8_lossy(e.as_ref()));
            }
            Ok(Event::End(ref e)) if e.local_name().as_ref() == local_name.as_bytes() => {
                return Some(unescape_owned(text));
            }
            Ok(Event::Eof) | Err(_) => return None,
            _ => {}
        }
    }
}

/// Returns an attribute of the first element with the given local name.
#[must_use]
pub fn element_attribute(xml: &str, local_name: &str, attribute: &str) -> Option<String> {
    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e) | Event::Empty(ref e))
                if e.local_name().as_ref() == local_name.as_bytes() =>
            {
                let attr = e.try_get_attribute(attribute).ok().flatten()?;
                return attr.unescape_value().ok().map(|v| v.into_owned());
            }
            Ok(Event::Eof) | Err(_) => return None,
            _ => {}
        }
    }
}

/// Returns the named attribute of every element with the given local name,
/// in document order.
#[must_use]
pub fn all_element_attributes(xml: &str, local_name: &str, attribute: &str) -> Vec<String> {
    let mut reader = Reader::from_str(xml);
    let mut values = Vec::new();
    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e) | Event::Empty(ref e))
                if e.local_name().as_ref() == local_name.as_bytes() =>
            {
                if let Ok(Some(attr)) = e.try_get_attribute(attribute) {
                    if let Ok(value) = attr.unescape_value() {
                        values.push(value.into_owned());
                    }
                }
            }
            Ok(Event::Eof) | Err(_) => return values,
            _ => {}
        }
    }
}

/// Returns the text of every element with the given local name, in
/// document order.
#[must_use]
pub fn all_element_texts(xml: &str, local_name: &str) -> Vec<String> {
    let mut reader = Reader::from_str(xml);
    let mut values = Vec::new();
    let mut current: Option<String> = None;
    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) if e.local_name().as_ref() == local_name.as_bytes() => {
                current = Some(String::new());
            }
            Ok(Event::Text(ref e)) => {
                if let Some(ref mut text) = current {
                    text.push_str(&String::from_utf8_lossy(e.as_ref()));
                }
            }
            Ok(Event::End(ref e)) if e.local_name().as_ref() == local_name.as_bytes() => {
                if let Some(text) = current.take() {
                    values.push(unescape_owned(text));
                }
            }
            Ok(Event::Eof) | Err(_) => return values,
            _ => {}
        }
    }
}

/// Returns an attribute of the document's root element.
#[must_use]
pub fn root_attribute(xml: &str, attribute: &str) -> Option<String> {
    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e) | Event::Empty(ref e)) => {
                let attr = e.try_get_attribute(attribute).ok().flatten()?;
                return attr.unescape_value().ok().map(|v| v.into_owned());
            }
            Ok(Event::Eof) | Err(_) => return None,
            _ => {}
        }
    }
}

/// Finds the byte offset of the opening `<` of the first element with the
/// given local name, or `None` if absent.
#[must_use]
pub fn find_element_start(xml: &str, local_name: &str) -> Option<usize> {
    let bytes = xml.as_bytes();
    let mut search_from = 0;
    while let Some(rel) = xml[search_from..].find(local_name) {
        let pos = search_from + rel;
        search_from = pos + 1;

        // Must be a start tag: "<name" or "<prefix:name".
        let boundary_ok = pos + local_name.len() >= xml.len()
            || matches!(bytes[pos + local_name.len()], b' ' | b'>' | b'/' | b'\t' | b'\n' | b'\r');
        if !boundary_ok {
            continue;
        }
        if pos == 0 {
            continue;
        }
        let before = bytes[pos - 1];
        if before == b'<' {
            return Some(pos - 1);
        }
        if before == b':' {
            // Walk back over the namespace prefix to the '<'.
            let mut i = pos - 1;
            while i > 0 && bytes[i - 1] != b'<' && bytes[i - 1] != b'/' && !bytes[i - 1].is_ascii_whitespace() {
                i -= 1;
            }
            if i > 0 && bytes[i - 1] == b'<' {
                return Some(i - 1);
            }
        }
    }
    None
}

/// Extracts the complete first element with the given local name, including
/// its start and end tags, as an exact document substring.
#[must_use]
pub fn extract_element(xml: &str, local_name: &str) -> Option<String> {
    let start = find_element_start(xml, local_name)?;
    let end = element_end(xml, start)?;
    Some(xml[start..end].to_string())
}

/// Removes the first element with the given local name from the document.
#[must_use]
pub fn remove_element(xml: &str, local_name: &str) -> String {
    let Some(start) = find_element_start(xml, local_name) else {
        return xml.to_string();
    };
    let Some(end) = element_end(xml, start) else {
        return xml.to_string();
    };
    format!("{}{}", &xml[..start], &xml[end..])
}

/// Finds the byte offset one past the end of the element starting at
/// `start` (which must point at its `<`).
fn element_end(xml: &str, start: usize) -> Option<usize> {
    let bytes = xml.as_bytes();

    // Read the qualified tag name.
    let mut name_end = start + 1;
    while name_end < xml.len()
        && !bytes[name_end].is_ascii_whitespace()
        && bytes[name_end] != b'>'
        && bytes[name_end] != b'/'
    {
        name_end += 1;
    }
    let qualified = &xml[start + 1..name_end];

    // Self-closing element.
    let open_end = start + xml[start..].find('>')?;
    if bytes[open_end - 1] == b'/' {
        return Some(open_end + 1);
    }

    // Track nesting of same-named elements.
    let open_pattern = format!("<{qualified}");
    let close_pattern = format!("</{qualified}>");
    let mut depth = 1usize;
    let mut cursor = open_end + 1;
    while depth > 0 {
        let next_close = xml[cursor..].find(&close_pattern)?;
        let next_open = xml[cursor..].find(&open_pattern);
        match next_open {
            Some(open_rel) if open_rel < next_close => {
                // Only count it when it is a real start tag, not a prefix
                // of a longer name.
                let after = cursor + open_rel + open_pattern.len();
                if after < xml.len()
                    && matches!(bytes[after], b' ' | b'>' | b'/' | b'\t' | b'\n' | b'\r')
                {
                    depth += 1;
                }
                cursor = after;
            }
            _ => {
                depth -= 1;
                cursor = cursor + next_close + close_pattern.len();
            }
        }
    }
    Some(cursor)
}

/// Locates the element carrying the given ID value.
///
/// SAML elements declare their identifiers with non-standard attribute
/// names, so resolution falls back to a case-insensitive scan over every
/// `id`-named attribute in the document. Returns the byte offset of the
/// element's `<`.
#[must_use]
pub fn find_element_with_id(xml: &str, id: &str) -> Option<usize> {
    let needle = format!("\"{id}\"");
    let bytes = xml.as_bytes();
    let mut search_from = 0;
    while let Some(rel) = xml[search_from..].find(&needle) {
        let pos = search_from + rel;
        search_from = pos + 1;

        // Expect `name="value"`; read the attribute name backwards.
        if pos == 0 || bytes[pos - 1] != b'=' {
            continue;
        }
        let mut name_start = pos - 1;
        while name_start > 0 && !bytes[name_start - 1].is_ascii_whitespace() && bytes[name_start - 1] != b'<' {
            name_start -= 1;
        }
        let attr_name = &xml[name_start..pos - 1];
        if !attr_name.eq_ignore_ascii_case("id") {
            continue;
        }

        // Walk back to the element's '<'.
        let mut element_start = name_start;
        while element_start > 0 && bytes[element_start - 1] != b'<' {
            element_start -= 1;
        }
        if element_start > 0 {
            return Some(element_start - 1);
        }
    }
    None
}

/// Returns an attribute of the element starting at the given byte offset.
#[must_use]
pub fn attribute_at(xml: &str, element_start: usize, attribute: &str) -> Option<String> {
    let open_end = element_start + xml[element_start..].find('>')?;
    let tag = &xml[element_start..open_end];
    for candidate in [format!(" {attribute}=\""), format!("{attribute}=\"")] {
        if let Some(attr_pos) = tag.find(&candidate) {
            let value_start = attr_pos + candidate.len();
            let value_end = tag[value_start..].find('"')?;
            return Some(tag[value_start..value_start + value_end].to_string());
        }
    }
    None
}

/// Extracts the complete element starting at the given byte offset.
#[must_use]
pub fn extract_element_at(xml: &str, element_start: usize) -> Option<String> {
    let end = element_end(xml, element_start)?;
    Some(xml[element_start..end].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"<samlp:Response xmlns:samlp="urn:oasis:names:tc:SAML:2.0:protocol" ID="_resp1" InResponseTo="_req1"><saml:Issuer xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion">https://idp.example.com</saml:Issuer><samlp:Status><samlp:StatusCode Value="urn:oasis:names:tc:SAML:2.0:status:Success"/></samlp:Status><saml:Assertion ID="_a1"><saml:Issuer>https://idp.example.com</saml:Issuer></saml:Assertion></samlp:Response>"#;

    #[test]
    fn parse_records_whitespace_mode() {
        let preserved = SamlDocument::parse(DOC).unwrap();
        assert!(preserved.preserves_whitespace());

        let collapsed = SamlDocument::parse_collapsed(DOC).unwrap();
        assert!(!collapsed.preserves_whitespace());
    }

    #[test]
    fn malformed_xml_is_rejected() {
        assert!(SamlDocument::parse("<a><b></a>").is_err());
        assert!(SamlDocument::parse("no markup").is_err());
    }

    #[test]
    fn element_text_ignores_namespace_prefix() {
        assert_eq!(element_text(DOC, "Issuer").as_deref(), Some("https://idp.example.com"));
    }

    #[test]
    fn element_attribute_lookup() {
        assert_eq!(
            element_attribute(DOC, "StatusCode", "Value").as_deref(),
            Some("urn:oasis:names:tc:SAML:2.0:status:Success")
        );
        assert_eq!(root_attribute(DOC, "InResponseTo").as_deref(), Some("_req1"));
    }

    #[test]
    fn extract_element_returns_exact_substring() {
        let assertion = extract_element(DOC, "Assertion").unwrap();
        assert!(assertion.starts_with("<saml:Assertion"));
        assert!(assertion.ends_with("</saml:Assertion>"));
        assert!(DOC.contains(&assertion));
    }

    #[test]
    fn remove_element_drops_only_first_match() {
        let without_status = remove_element(DOC, "Status");
        assert!(!without_status.contains("samlp:Status"));
        assert!(without_status.contains("saml:Assertion"));
    }

    #[test]
    fn id_resolution_is_case_insensitive() {
        let doc = r#"<Root><Child id="_x1">text</Child></Root>"#;
        let start = find_element_with_id(doc, "_x1").unwrap();
        assert!(doc[start..].starts_with("<Child"));

        let doc_upper = r#"<Root><Child ID="_x1">text</Child></Root>"#;
        assert!(find_element_with_id(doc_upper, "_x1").is_some());
    }

    #[test]
    fn id_resolution_ignores_non_id_attributes() {
        let doc = r#"<Root><Child Name="_x1"/><Other Id="_x1"/></Root>"#;
        let start = find_element_with_id(doc, "_x1").unwrap();
        assert!(doc[start..].starts_with("<Other"));
    }

    #[test]
    fn attribute_at_reads_from_element_start() {
        let start = find_element_with_id(DOC, "_a1").unwrap();
        assert_eq!(attribute_at(DOC, start, "ID").as_deref(), Some("_a1"));
    }

    #[test]
    fn nested_same_name_elements_are_matched() {
        let doc = "<a:Wrap><a:Wrap>inner</a:Wrap></a:Wrap><tail/>";
        let extracted = extract_element(doc, "Wrap").unwrap();
        assert_eq!(extracted, "<a:Wrap><a:Wrap>inner</a:Wrap></a:Wrap>");
    }

    #[test]
    fn escape_roundtrip() {
        let escaped = xml_escape(r#"a<b&"c""#);
        assert_eq!(escaped, "a&lt;b&amp;&quot;c&quot;");
    }
}
