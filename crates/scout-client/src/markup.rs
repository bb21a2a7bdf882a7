//! Narrow query surface over the `scraper` crate.
//!
//! Extraction code only needs element lookup by tag + class, attribute
//! access, text and a depth-first walk. Keeping that surface small means the
//! parser can be swapped without touching the extraction rules.

use scraper::{ElementRef, Html, Node};

/// A parsed page.
pub struct Document {
    html: Html,
}

impl Document {
    pub fn parse(payload: &str) -> Self {
        Self {
            html: Html::parse_document(payload),
        }
    }

    pub fn root(&self) -> Element<'_> {
        Element(self.html.root_element())
    }

    pub fn find(&self, tag: &str, class: &str) -> Option<Element<'_>> {
        self.root().find(tag, class)
    }

    pub fn find_all(&self, tag: &str, class: &str) -> Vec<Element<'_>> {
        self.root().find_all(tag, class)
    }
}

/// Callback events for [`Element::walk`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visit<'a> {
    /// An element was entered.
    Open(&'a str),
    /// A text node, untrimmed.
    Text(&'a str),
}

/// An element inside a [`Document`].
#[derive(Clone, Copy)]
pub struct Element<'a>(ElementRef<'a>);

impl<'a> Element<'a> {
    pub fn tag(&self) -> &'a str {
        self.0.value().name()
    }

    pub fn attr(&self, name: &str) -> Option<&'a str> {
        self.0.value().attr(name)
    }

    /// All descendant text, trimmed.
    pub fn text(&self) -> String {
        self.0.text().collect::<String>().trim().to_string()
    }

    pub fn parent(&self) -> Option<Element<'a>> {
        self.0.parent().and_then(ElementRef::wrap).map(Element)
    }

    /// First descendant matching `tag` and every class in `class`
    /// (whitespace separated; empty matches any element with that tag).
    pub fn find(&self, tag: &str, class: &str) -> Option<Element<'a>> {
        self.matching(tag, class).next()
    }

    pub fn find_all(&self, tag: &str, class: &str) -> Vec<Element<'a>> {
        self.matching(tag, class).collect()
    }

    fn matching<'q>(
        &self,
        tag: &'q str,
        class: &'q str,
    ) -> impl Iterator<Item = Element<'a>> + 'q
    where
        'a: 'q,
    {
        self.0
            .descendants()
            .skip(1)
            .filter_map(ElementRef::wrap)
            .filter(move |el| has_tag_and_classes(el, tag, class))
            .map(Element)
    }

    /// Depth-first walk over this element's subtree, not entering elements
    /// whose tag is in `skip`.
    pub fn walk(&self, skip: &[&str], visit: &mut impl FnMut(Visit<'a>)) {
        for child in self.0.children() {
            match child.value() {
                Node::Text(text) => visit(Visit::Text(text)),
                Node::Element(el) if skip.contains(&el.name()) => {}
                Node::Element(_) => {
                    if let Some(child) = ElementRef::wrap(child) {
                        let child = Element(child);
                        visit(Visit::Open(child.tag()));
                        child.walk(skip, visit);
                    }
                }
                _ => {}
            }
        }
    }
}

fn has_tag_and_classes(el: &ElementRef<'_>, tag: &str, class: &str) -> bool {
    let value = el.value();
    value.name().eq_ignore_ascii_case(tag)
        && class
            .split_whitespace()
            .all(|wanted| value.classes().any(|c| c == wanted))
}
