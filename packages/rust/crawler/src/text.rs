//! Flattening of HTML fragments into whitespace-normalized text with
//! character offsets for every inline link.

use scraper::{ElementRef, Node};
use url::Url;

use eventgraph_shared::SourceLink;

/// An inline link and the character span its label occupies in the text.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct InlineLink {
    /// Absolute target, fragment removed.
    pub href: Url,
    pub start: usize,
    pub end: usize,
}

/// Accumulates text from a DOM subtree.
pub(crate) struct TextCollector<'a> {
    page_url: &'a Url,
    text: String,
    chars: usize,
    pub links: Vec<InlineLink>,
    pub sources: Vec<SourceLink>,
}

impl<'a> TextCollector<'a> {
    pub fn new(page_url: &'a Url) -> Self {
        Self {
            page_url,
            text: String::new(),
            chars: 0,
            links: Vec::new(),
            sources: Vec::new(),
        }
    }

    /// Collect the text of `el`, skipping nested lists.
    pub fn collect(page_url: &'a Url, el: ElementRef<'_>) -> Self {
        let mut collector = Self::new(page_url);
        collector.walk(el);
        collector.finish();
        collector
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn into_text(self) -> String {
        self.text
    }

    fn push_str(&mut self, s: &str) {
        for c in s.chars() {
            if c.is_whitespace() {
                if !self.text.is_empty() && !self.text.ends_with(' ') {
                    self.text.push(' ');
                    self.chars += 1;
                }
            } else {
                self.text.push(c);
                self.chars += 1;
            }
        }
    }

    fn walk(&mut self, el: ElementRef<'_>) {
        for child in el.children() {
            match child.value() {
                Node::Text(text) => self.push_str(text),
                Node::Element(_) => {
                    let Some(child_el) = ElementRef::wrap(child) else {
                        continue;
                    };
                    match child_el.value().name() {
                        "ul" | "ol" | "sup" | "script" | "style" => {}
                        "br" => self.push_str(" "),
                        "a" => self.visit_link(child_el),
                        _ => self.walk(child_el),
                    }
                }
                _ => {}
            }
        }
    }

    fn visit_link(&mut self, el: ElementRef<'_>) {
        let href = el
            .value()
            .attr("href")
            .and_then(|href| self.page_url.join(href).ok())
            .map(|mut url| {
                url.set_fragment(None);
                url
            });

        let Some(href) = href else {
            self.walk(el);
            return;
        };

        let label = el.text().collect::<String>();
        let label = label.trim();
        let is_external = el.value().classes().any(|c| c == "external")
            || href.host_str() != self.page_url.host_str();
        if is_external && label.starts_with('(') && label.ends_with(')') {
            self.sources.push(SourceLink {
                label: label.trim_start_matches('(').trim_end_matches(')').trim().to_string(),
                url: href.to_string(),
            });
            return;
        }

        // Leading whitespace inside the anchor belongs to the surrounding text.
        if label.is_empty() {
            return;
        }
        let before = self.chars;
        self.walk(el);
        let start = if self.text_at(before) == Some(' ') { before + 1 } else { before };
        let mut end = self.chars;
        if end > start && self.text.ends_with(' ') {
            end -= 1;
        }
        if end > start {
            self.links.push(InlineLink { href, start, end });
        }
    }

    fn text_at(&self, index: usize) -> Option<char> {
        self.text.chars().nth(index)
    }

    fn finish(&mut self) {
        if self.text.ends_with(' ') {
            self.text.pop();
            self.chars -= 1;
        }
        let len = self.chars;
        for link in &mut self.links {
            link.end = link.end.min(len);
        }
        self.links.retain(|link| link.start < link.end);
    }

    /// Substring by character offsets.
    pub fn slice(&self, start: usize, end: usize) -> String {
        char_slice(&self.text, start, end)
    }
}

pub(crate) fn char_slice(text: &str, start: usize, end: usize) -> String {
    text.chars().skip(start).take(end.saturating_sub(start)).collect()
}
