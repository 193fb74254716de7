//! Minimal HTML builder. Text and attribute values are escaped when the tree
//! is rendered; only [`Markup`] passes through untouched.

use std::fmt;

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

/// Like [`escape_html`], plus backticks.
pub fn escape_attr(text: &str) -> String {
    escape_html(text).replace('`', "&#96;")
}

/// Already-rendered HTML.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Markup(String);

impl Markup {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Markup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone)]
pub enum Node {
    Text(String),
    Raw(Markup),
    Element(Element),
}

impl From<Element> for Node {
    fn from(element: Element) -> Self {
        Node::Element(element)
    }
}

impl From<Markup> for Node {
    fn from(markup: Markup) -> Self {
        Node::Raw(markup)
    }
}

impl From<&str> for Node {
    fn from(text: &str) -> Self {
        Node::Text(text.to_string())
    }
}

impl From<String> for Node {
    fn from(text: String) -> Self {
        Node::Text(text)
    }
}

const VOID_TAGS: &[&str] = &["br", "hr", "img", "input", "meta", "link"];

#[derive(Debug, Clone)]
pub struct Element {
    tag: &'static str,
    attrs: Vec<(&'static str, Option<String>)>,
    children: Vec<Node>,
}

pub fn el(tag: &'static str) -> Element {
    Element {
        tag,
        attrs: Vec::new(),
        children: Vec::new(),
    }
}

impl Element {
    pub fn attr(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.attrs.push((name, Some(value.into())));
        self
    }

    /// Boolean attribute such as `selected` or `disabled`, emitted only when `on`.
    pub fn flag(mut self, name: &'static str, on: bool) -> Self {
        if on {
            self.attrs.push((name, None));
        }
        self
    }

    pub fn class(self, value: impl Into<String>) -> Self {
        self.attr("class", value)
    }

    pub fn id(self, value: impl Into<String>) -> Self {
        self.attr("id", value)
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.children.push(Node::Text(text.into()));
        self
    }

    pub fn child(mut self, node: impl Into<Node>) -> Self {
        self.children.push(node.into());
        self
    }

    pub fn children<I, N>(mut self, nodes: I) -> Self
    where
        I: IntoIterator<Item = N>,
        N: Into<Node>,
    {
        self.children.extend(nodes.into_iter().map(Into::into));
        self
    }

    pub fn child_if(self, node: Option<impl Into<Node>>) -> Self {
        match node {
            Some(node) => self.child(node),
            None => self,
        }
    }

    fn write_to(&self, out: &mut String) {
        out.push('<');
        out.push_str(self.tag);
        for (name, value) in &self.attrs {
            out.push(' ');
            out.push_str(name);
            if let Some(value) = value {
                out.push_str("=\"");
                out.push_str(&escape_attr(value));
                out.push('"');
            }
        }
        out.push('>');
        if VOID_TAGS.contains(&self.tag) {
            return;
        }
        for child in &self.children {
            match child {
                Node::Text(text) => out.push_str(&escape_html(text)),
                Node::Raw(markup) => out.push_str(markup.as_str()),
                Node::Element(element) => element.write_to(out),
            }
        }
        out.push_str("</");
        out.push_str(self.tag);
        out.push('>');
    }

    pub fn render(&self) -> Markup {
        let mut out = String::new();
        self.write_to(&mut out);
        Markup(out)
    }
}

/// Full page: the doctype followed by `root`.
pub fn document(root: &Element) -> Markup {
    let mut out = String::from("<!doctype html>");
    root.write_to(&mut out);
    Markup(out)
}

/// Renders several siblings into one fragment.
pub fn fragment<I, N>(nodes: I) -> Markup
where
    I: IntoIterator<Item = N>,
    N: Into<Node>,
{
    let mut out = String::new();
    for node in nodes {
        match node.into() {
            Node::Text(text) => out.push_str(&escape_html(&text)),
            Node::Raw(markup) => out.push_str(markup.as_str()),
            Node::Element(element) => element.write_to(&mut out),
        }
    }
    Markup(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_the_five_html_specials() {
        assert_eq!(
            escape_html(r#"<a href="x">Tom & 'Jerry'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; &#39;Jerry&#39;&lt;/a&gt;"
        );
        assert_eq!(escape_attr("`x`"), "&#96;x&#96;");
    }

    #[test]
    fn text_and_attributes_are_escaped_on_render() {
        let html = el("div")
            .class("stop \"warn\"")
            .attr("title", "Pedido <1>")
            .text("P1 & P2")
            .render();
        assert_eq!(
            html.as_str(),
            r#"<div class="stop &quot;warn&quot;" title="Pedido &lt;1&gt;">P1 &amp; P2</div>"#
        );
    }

    #[test]
    fn raw_markup_passes_through_and_void_tags_close_themselves() {
        let inner = el("strong").text("ok").render();
        let html = el("p")
            .child(inner)
            .child(el("input").attr("name", "telefone").flag("required", true))
            .child(el("option").flag("selected", false).text("PIX"))
            .render();
        assert_eq!(
            html.as_str(),
            r#"<p><strong>ok</strong><input name="telefone" required><option>PIX</option></p>"#
        );
    }

    #[test]
    fn document_starts_with_doctype() {
        let html = document(&el("html").child(el("body")));
        assert_eq!(html.as_str(), "<!doctype html><html><body></body></html>");
    }

    #[test]
    fn fragment_joins_siblings() {
        let html = fragment([el("li").text("a"), el("li").text("<b>")]);
        assert_eq!(html.as_str(), "<li>a</li><li>&lt;b&gt;</li>");
    }
}
