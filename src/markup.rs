//! Lenient markup tree
//!
//! Package documents in the wild are a mix of well-formed XML, XHTML with
//! HTML entities, and plain HTML with unclosed void elements. Everything is
//! read through `quick_xml` into one generic tree so call sites never have to
//! care which of those shapes they got.
//!
//! Two helpers carry most of the weight:
//! - [`Element::children_named`] coerces "zero, one or many" children into an
//!   ordered sequence.
//! - [`Element::text_content`] extracts the plain text of any subtree.

use std::borrow::Cow;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

/// HTML elements that never have a closing tag. Only honoured in HTML
/// documents; in XML the same names (`meta`, `link`) may carry content.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// A markup node
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    Text(String),
}

/// An element with its local name, raw attributes and children
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Element {
    name: String,
    attrs: Vec<(String, String)>,
    children: Vec<Node>,
}

impl Element {
    fn new(name: String, attrs: Vec<(String, String)>) -> Self {
        Self {
            name,
            attrs,
            children: Vec::new(),
        }
    }

    /// Local name (namespace prefix stripped)
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Case-insensitive local name comparison
    pub fn is(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }

    /// Attribute lookup.
    ///
    /// An exact (prefixed) key wins; otherwise the first attribute whose local
    /// name matches is returned, so `attr("href")` also finds `xlink:href`.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .or_else(|| {
                self.attrs.iter().find(|(key, _)| {
                    key.rsplit_once(':')
                        .map(|(_, local)| local.eq_ignore_ascii_case(name))
                        .unwrap_or(false)
                })
            })
            .map(|(_, value)| value.as_str())
    }

    /// Values of every attribute named `name`, prefixed or not, in document order
    pub fn attr_values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> {
        self.attrs
            .iter()
            .filter(move |(key, _)| {
                let local = key.rsplit_once(':').map(|(_, local)| local).unwrap_or(key.as_str());
                local.eq_ignore_ascii_case(name)
            })
            .map(|(_, value)| value.as_str())
    }

    /// Child elements in document order
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(el) => Some(el),
            Node::Text(_) => None,
        })
    }

    /// Child elements with the given local name, as an ordered sequence
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> {
        self.elements().filter(move |el| el.is(name))
    }

    /// First child element with the given local name
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.elements().find(|el| el.is(name))
    }

    /// All descendant elements, depth-first pre-order (self excluded)
    pub fn descendants(&self) -> Descendants<'_> {
        let mut stack: Vec<&Element> = self.elements().collect();
        stack.reverse();
        Descendants { stack }
    }

    /// First descendant element with the given local name
    pub fn find(&self, name: &str) -> Option<&Element> {
        self.descendants().find(|el| el.is(name))
    }

    /// Concatenated text of the subtree, exactly as written
    pub fn raw_text(&self) -> String {
        let mut out = String::new();
        collect_text(self, &mut out);
        out
    }

    /// Text of the subtree with tags stripped and whitespace collapsed
    pub fn text_content(&self) -> String {
        self.raw_text().split_whitespace().collect::<Vec<_>>().join(" ")
    }
}

fn collect_text(el: &Element, out: &mut String) {
    for child in &el.children {
        match child {
            Node::Text(text) => out.push_str(text),
            Node::Element(inner) => {
                // Keep words from adjacent elements apart
                if !out.is_empty() && !out.ends_with(char::is_whitespace) && !is_inline(inner) {
                    out.push(' ');
                }
                collect_text(inner, out);
            }
        }
    }
}

fn is_inline(el: &Element) -> bool {
    const INLINE: &[&str] = &[
        "a", "abbr", "b", "bdi", "bdo", "cite", "code", "em", "i", "q", "rb", "rt", "ruby",
        "small", "span", "strong", "sub", "sup", "u",
    ];
    INLINE.iter().any(|name| el.is(name))
}

/// Pre-order iterator over descendant elements
pub struct Descendants<'a> {
    stack: Vec<&'a Element>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = &'a Element;

    fn next(&mut self) -> Option<Self::Item> {
        let el = self.stack.pop()?;
        let start = self.stack.len();
        self.stack.extend(el.elements());
        self.stack[start..].reverse();
        Some(el)
    }
}

/// A parsed markup document
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Document {
    root: Element,
}

impl Document {
    /// Parse markup leniently. Never fails: malformed input yields whatever
    /// tree was built before the reader gave up.
    pub fn parse(src: &str) -> Self {
        let src = src.trim_start_matches('\u{feff}');
        let mut reader = Reader::from_str(src);
        reader.check_end_names(false);

        let mut stack: Vec<Element> = vec![Element::default()];
        // Decided by the XML declaration or, failing that, the root element
        let mut xml: Option<bool> = None;

        loop {
            match reader.read_event() {
                Ok(Event::Decl(_)) => {
                    xml.get_or_insert(true);
                }
                Ok(Event::Start(e)) => {
                    let el = element_from(&e);
                    let xml = *xml.get_or_insert_with(|| !el.is("html"));
                    if !xml && VOID_ELEMENTS.iter().any(|void| el.is(void)) {
                        attach(&mut stack, Node::Element(el));
                    } else {
                        stack.push(el);
                    }
                }
                Ok(Event::Empty(e)) => {
                    let el = element_from(&e);
                    xml.get_or_insert_with(|| !el.is("html"));
                    attach(&mut stack, Node::Element(el));
                }
                Ok(Event::End(e)) => {
                    let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                    close(&mut stack, &name);
                }
                Ok(Event::Text(t)) => {
                    let text = t
                        .unescape_with(html_entity)
                        .map(Cow::into_owned)
                        .unwrap_or_else(|_| String::from_utf8_lossy(&t).into_owned());
                    attach(&mut stack, Node::Text(text));
                }
                Ok(Event::CData(c)) => {
                    attach(&mut stack, Node::Text(String::from_utf8_lossy(&c).into_owned()));
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(e) => {
                    tracing::trace!(
                        "Markup reader stopped at byte {}: {}",
                        reader.buffer_position(),
                        e
                    );
                    break;
                }
            }
        }

        while stack.len() > 1 {
            if let Some(el) = stack.pop() {
                attach(&mut stack, Node::Element(el));
            }
        }

        Document {
            root: stack.pop().unwrap_or_default(),
        }
    }

    /// Synthetic container holding every top-level node
    pub fn root(&self) -> &Element {
        &self.root
    }

    pub fn find(&self, name: &str) -> Option<&Element> {
        self.root.find(name)
    }

    pub fn descendants(&self) -> Descendants<'_> {
        self.root.descendants()
    }
}

fn element_from(start: &BytesStart) -> Element {
    let name = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();
    let attrs = start
        .html_attributes()
        .with_checks(false)
        .filter_map(|attr| attr.ok())
        .map(|attr| {
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr
                .unescape_value()
                .map(Cow::into_owned)
                .unwrap_or_else(|_| String::from_utf8_lossy(&attr.value).into_owned());
            (key, value)
        })
        .collect();
    Element::new(name, attrs)
}

fn attach(stack: &mut [Element], node: Node) {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(node);
    }
}

/// Close the nearest open element named `name`, implicitly closing anything
/// opened after it. Stray end tags are ignored.
fn close(stack: &mut Vec<Element>, name: &str) {
    let Some(pos) = stack.iter().rposition(|el| el.is(name)) else {
        return;
    };
    if pos == 0 {
        return;
    }
    while stack.len() > pos {
        if let Some(el) = stack.pop() {
            attach(stack, Node::Element(el));
        }
    }
}

/// Entities XHTML content documents use without declaring them
fn html_entity(name: &str) -> Option<&'static str> {
    match name {
        "nbsp" => Some("\u{a0}"),
        "ensp" => Some("\u{2002}"),
        "emsp" => Some("\u{2003}"),
        "thinsp" => Some("\u{2009}"),
        "shy" => Some("\u{ad}"),
        "ndash" => Some("\u{2013}"),
        "mdash" => Some("\u{2014}"),
        "lsquo" => Some("\u{2018}"),
        "rsquo" => Some("\u{2019}"),
        "ldquo" => Some("\u{201c}"),
        "rdquo" => Some("\u{201d}"),
        "hellip" => Some("\u{2026}"),
        "middot" => Some("\u{b7}"),
        "copy" => Some("\u{a9}"),
        "reg" => Some("\u{ae}"),
        "trade" => Some("\u{2122}"),
        "laquo" => Some("\u{ab}"),
        "raquo" => Some("\u{bb}"),
        _ => None,
    }
}
