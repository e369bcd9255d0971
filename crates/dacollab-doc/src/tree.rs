//! Owned HTML tree
//!
//! The converter operates on a plain owned tree instead of a DOM handle:
//! the lax parser output is copied into it once, all transform passes
//! mutate it in place, and the serializer walks it to produce the final
//! HTML string. Serialization is hand-written because the output format
//! is fixed byte-for-byte (attribute quoting, void elements, `<br/>`),
//! and the roundtrip contract depends on it.

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
	Element(Element),
	Text(String),
	Comment(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Element {
	pub tag: Box<str>,
	pub attrs: Vec<(Box<str>, Box<str>)>,
	pub children: Vec<Node>,
}

impl Node {
	pub fn text(text: impl Into<String>) -> Node {
		Node::Text(text.into())
	}

	pub fn as_element(&self) -> Option<&Element> {
		match self {
			Node::Element(el) => Some(el),
			_ => None,
		}
	}

	pub fn as_element_mut(&mut self) -> Option<&mut Element> {
		match self {
			Node::Element(el) => Some(el),
			_ => None,
		}
	}

	pub fn is_tag(&self, tag: &str) -> bool {
		matches!(self, Node::Element(el) if &*el.tag == tag)
	}

	/// Whitespace-only text node.
	pub fn is_blank_text(&self) -> bool {
		matches!(self, Node::Text(t) if t.trim().is_empty())
	}
}

impl Element {
	pub fn new(tag: impl Into<Box<str>>) -> Element {
		Element { tag: tag.into(), attrs: Vec::new(), children: Vec::new() }
	}

	pub fn with_attr(mut self, name: &str, value: &str) -> Element {
		self.set_attr(name, value);
		self
	}

	pub fn with_children(mut self, children: Vec<Node>) -> Element {
		self.children = children;
		self
	}

	pub fn attr(&self, name: &str) -> Option<&str> {
		self.attrs.iter().find(|(n, _)| &**n == name).map(|(_, v)| &**v)
	}

	pub fn has_attr(&self, name: &str) -> bool {
		self.attrs.iter().any(|(n, _)| &**n == name)
	}

	/// Set an attribute, replacing an existing value in place.
	pub fn set_attr(&mut self, name: &str, value: &str) {
		if let Some(entry) = self.attrs.iter_mut().find(|(n, _)| &**n == name) {
			entry.1 = value.into();
		} else {
			self.attrs.push((name.into(), value.into()));
		}
	}

	pub fn remove_attr(&mut self, name: &str) -> Option<Box<str>> {
		let idx = self.attrs.iter().position(|(n, _)| &**n == name)?;
		Some(self.attrs.remove(idx).1)
	}

	pub fn class_list(&self) -> Vec<&str> {
		self.attr("class").map(|c| c.split_whitespace().collect()).unwrap_or_default()
	}

	/// Concatenated text content of the subtree.
	pub fn text_content(&self) -> String {
		let mut out = String::new();
		collect_text(&self.children, &mut out);
		out
	}

	/// Child elements with the given tag, ignoring other nodes.
	pub fn child_elements<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a Element> {
		self.children.iter().filter_map(move |n| n.as_element().filter(|el| &*el.tag == tag))
	}

	/// True when the subtree contains an element with the given tag.
	pub fn contains_tag(&self, tag: &str) -> bool {
		self.children.iter().any(|n| match n {
			Node::Element(el) => &*el.tag == tag || el.contains_tag(tag),
			_ => false,
		})
	}
}

fn collect_text(nodes: &[Node], out: &mut String) {
	for node in nodes {
		match node {
			Node::Text(t) => out.push_str(t),
			Node::Element(el) => collect_text(&el.children, out),
			Node::Comment(_) => {}
		}
	}
}

// Serialization //
//***************//

/// Elements serialized without a closing tag.
const VOID_ELEMENTS: &[&str] = &[
	"area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source",
	"track", "wbr",
];

fn is_void(tag: &str) -> bool {
	VOID_ELEMENTS.contains(&tag)
}

fn escape_text(text: &str, out: &mut String) {
	for ch in text.chars() {
		match ch {
			'&' => out.push_str("&amp;"),
			'<' => out.push_str("&lt;"),
			'>' => out.push_str("&gt;"),
			_ => out.push(ch),
		}
	}
}

fn escape_attr(value: &str, out: &mut String) {
	for ch in value.chars() {
		match ch {
			'&' => out.push_str("&amp;"),
			'"' => out.push_str("&quot;"),
			_ => out.push(ch),
		}
	}
}

fn serialize_node(node: &Node, out: &mut String) {
	match node {
		Node::Text(text) => escape_text(text, out),
		Node::Comment(text) => {
			out.push_str("<!--");
			out.push_str(text);
			out.push_str("-->");
		}
		Node::Element(el) => {
			out.push('<');
			out.push_str(&el.tag);
			for (name, value) in &el.attrs {
				out.push(' ');
				out.push_str(name);
				out.push_str("=\"");
				escape_attr(value, out);
				out.push('"');
			}
			if &*el.tag == "br" {
				out.push_str("/>");
				return;
			}
			out.push('>');
			if is_void(&el.tag) {
				return;
			}
			for child in &el.children {
				serialize_node(child, out);
			}
			out.push_str("</");
			out.push_str(&el.tag);
			out.push('>');
		}
	}
}

/// Serialize a node list to an HTML string.
pub fn serialize(nodes: &[Node]) -> String {
	let mut out = String::new();
	for node in nodes {
		serialize_node(node, &mut out);
	}
	out
}


// vim: ts=4
