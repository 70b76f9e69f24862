//! Exclusive XML Canonicalization 1.0, without comments.
//!
//! One element of a document is canonicalized in its document context.
//! Namespace declarations inherited from ancestors are rendered where they
//! are visibly utilized, or where an `InclusiveNamespaces` prefix list asks
//! for them. Attributes are sorted, empty elements are expanded, text and
//! attribute values are re-escaped, and comments are dropped. An optional
//! byte range, the enveloped signature, is left out of the output.

use std::collections::BTreeSet;
use std::ops::Range;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::{SamlError, SamlResult};

const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";

/// Namespace bindings, one frame per open element.
#[derive(Default)]
struct Bindings(Vec<Vec<(String, String)>>);

impl Bindings {
    fn lookup(&self, prefix: &str) -> Option<&str> {
        self.0
            .iter()
            .rev()
            .flat_map(|frame| frame.iter())
            .find(|(p, _)| p == prefix)
            .map(|(_, uri)| uri.as_str())
    }
}

fn utf8(bytes: &[u8]) -> SamlResult<&str> {
    std::str::from_utf8(bytes).map_err(|e| SamlError::XmlParse(e.to_string()))
}

fn unescape(raw: &str) -> SamlResult<String> {
    quick_xml::escape::unescape(raw)
        .map(std::borrow::Cow::into_owned)
        .map_err(|e| SamlError::XmlParse(e.to_string()))
}

fn normalize_line_endings(raw: &str) -> String {
    raw.replace("\r\n", "\n").replace('\r', "\n")
}

fn escape_text(value: &str, out: &mut String) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\r' => out.push_str("&#xD;"),
            _ => out.push(c),
        }
    }
}

fn escape_attr(value: &str, out: &mut String) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '"' => out.push_str("&quot;"),
            '\t' => out.push_str("&#x9;"),
            '\n' => out.push_str("&#xA;"),
            '\r' => out.push_str("&#xD;"),
            _ => out.push(c),
        }
    }
}

/// The `xmlns` declarations on a start tag, as (prefix, uri). The default
/// namespace has the empty prefix.
fn declarations(e: &BytesStart<'_>) -> SamlResult<Vec<(String, String)>> {
    let mut decls = Vec::new();
    for attr in e.attributes() {
        let attr = attr?;
        let key = attr.key.as_ref();
        let prefix = if key == b"xmlns" {
            ""
        } else if let Some(p) = key.strip_prefix(b"xmlns:") {
            utf8(p)?
        } else {
            continue;
        };
        let uri = unescape(utf8(&attr.value)?)?;
        decls.push((prefix.to_string(), uri));
    }
    Ok(decls)
}

struct Canonicalizer<'a> {
    inclusive_prefixes: &'a [String],
    scope: Bindings,
    rendered: Bindings,
    out: String,
}

impl Canonicalizer<'_> {
    fn start_tag(&mut self, e: &BytesStart<'_>) -> SamlResult<()> {
        let qname = e.name();
        let mut utilized = BTreeSet::new();
        utilized.insert(match qname.prefix() {
            Some(p) => utf8(p.as_ref())?.to_string(),
            None => String::new(),
        });

        let mut attributes = Vec::new();
        for attr in e.attributes() {
            let attr = attr?;
            let key = attr.key.as_ref();
            if key == b"xmlns" || key.starts_with(b"xmlns:") {
                continue;
            }
            let namespace = match attr.key.prefix() {
                Some(p) => {
                    let prefix = utf8(p.as_ref())?;
                    if prefix == "xml" {
                        XML_NS.to_string()
                    } else {
                        utilized.insert(prefix.to_string());
                        self.scope.lookup(prefix).unwrap_or_default().to_string()
                    }
                }
                None => String::new(),
            };
            let local = utf8(attr.key.local_name().as_ref())?.to_string();
            let raw = normalize_line_endings(utf8(&attr.value)?).replace(['\t', '\n'], " ");
            attributes.push((namespace, local, utf8(key)?.to_string(), unescape(&raw)?));
        }
        attributes.sort_by(|a, b| (&a.0, &a.1).cmp(&(&b.0, &b.1)));

        for prefix in self.inclusive_prefixes {
            let prefix = if prefix == "#default" { "" } else { prefix.as_str() };
            if self.scope.lookup(prefix).is_some() {
                utilized.insert(prefix.to_string());
            }
        }

        let mut frame = Vec::new();
        for prefix in utilized {
            let uri = match self.scope.lookup(&prefix) {
                Some(uri) => uri.to_string(),
                None if prefix.is_empty() => String::new(),
                None => {
                    return Err(SamlError::XmlParse(format!("unbound namespace prefix {prefix}")));
                }
            };
            let current = self
                .rendered
                .lookup(&prefix)
                .or_else(|| prefix.is_empty().then_some(""));
            if current != Some(uri.as_str()) {
                frame.push((prefix, uri));
            }
        }

        self.out.push('<');
        self.out.push_str(utf8(qname.as_ref())?);
        for (prefix, uri) in &frame {
            if prefix.is_empty() {
                self.out.push_str(" xmlns=\"");
            } else {
                self.out.push_str(" xmlns:");
                self.out.push_str(prefix);
                self.out.push_str("=\"");
            }
            escape_attr(uri, &mut self.out);
            self.out.push('"');
        }
        for (_, _, name, value) in &attributes {
            self.out.push(' ');
            self.out.push_str(name);
            self.out.push_str("=\"");
            escape_attr(value, &mut self.out);
            self.out.push('"');
        }
        self.out.push('>');
        self.rendered.0.push(frame);
        Ok(())
    }

    fn end_tag(&mut self, name: &[u8]) -> SamlResult<()> {
        self.out.push_str("</");
        self.out.push_str(utf8(name)?);
        self.out.push('>');
        self.rendered.0.pop();
        Ok(())
    }
}

/// Canonicalizes the element spanning `target` in `document`.
///
/// `exclude` is a byte range inside `target` whose nodes are dropped, used
/// for the enveloped-signature transform. `inclusive_prefixes` is the
/// `PrefixList` of an `InclusiveNamespaces` element; `#default` names the
/// default namespace.
///
/// # Errors
///
/// Returns [`SamlError::XmlParse`] for malformed XML, a DOCTYPE or an
/// unbound prefix.
pub fn exclusive_c14n(
    document: &str,
    target: Range<usize>,
    exclude: Option<Range<usize>>,
    inclusive_prefixes: &[String],
) -> SamlResult<String> {
    let mut reader = Reader::from_str(document);
    reader.config_mut().trim_text(false);

    let mut c14n = Canonicalizer {
        inclusive_prefixes,
        scope: Bindings::default(),
        rendered: Bindings::default(),
        out: String::new(),
    };
    let in_output = |pos: usize| {
        target.contains(&pos) && !exclude.as_ref().is_some_and(|r| r.contains(&pos))
    };

    loop {
        let pos = usize::try_from(reader.buffer_position()).unwrap_or(usize::MAX);
        if pos >= target.end {
            break;
        }
        match reader.read_event()? {
            Event::Start(e) => {
                c14n.scope.0.push(declarations(&e)?);
                if in_output(pos) {
                    c14n.start_tag(&e)?;
                }
            }
            Event::Empty(e) => {
                c14n.scope.0.push(declarations(&e)?);
                if in_output(pos) {
                    c14n.start_tag(&e)?;
                    c14n.end_tag(e.name().as_ref())?;
                }
                c14n.scope.0.pop();
            }
            Event::End(e) => {
                if in_output(pos) {
                    c14n.end_tag(e.name().as_ref())?;
                }
                c14n.scope.0.pop();
            }
            Event::Text(t) if in_output(pos) => {
                let text = unescape(&normalize_line_endings(utf8(&t)?))?;
                escape_text(&text, &mut c14n.out);
            }
            Event::CData(c) if in_output(pos) => {
                escape_text(&normalize_line_endings(utf8(&c)?), &mut c14n.out);
            }
            Event::PI(pi) if in_output(pos) => {
                c14n.out.push_str("<?");
                c14n.out.push_str(utf8(&pi)?);
                c14n.out.push_str("?>");
            }
            Event::DocType(_) => {
                return Err(SamlError::XmlParse("DOCTYPE is not allowed".to_string()));
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(c14n.out)
}
