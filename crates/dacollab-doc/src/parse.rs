//! Lax HTML parsing
//!
//! Authored HTML is parsed with the html5ever-based `scraper` parser and
//! copied into the owned [`tree`](crate::tree) representation. Parsing is
//! forgiving: malformed input yields whatever tree the HTML5 algorithm
//! recovers, and the converter works with that.

use ego_tree::NodeRef;
use scraper::Html;

use crate::tree::{Element, Node};

type HtmlNode<'a> = NodeRef<'a, scraper::node::Node>;

/// Rename the legacy regional-edit tags to their current names.
///
/// Applied to the raw string before parsing so open and close tags are
/// rewritten together.
pub fn fix_legacy_tags(html: &str) -> String {
	html.replace("<da-loc-added", "<da-diff-added")
		.replace("</da-loc-added", "</da-diff-added")
		.replace("<da-loc-deleted", "<da-diff-deleted")
		.replace("</da-loc-deleted", "</da-diff-deleted")
}

/// Parse an HTML string and return the `<body>` content as owned nodes.
pub fn parse_html(html: &str) -> Vec<Node> {
	let parsed = Html::parse_document(html);
	let root = parsed.tree.root();

	// The HTML5 algorithm always produces html > head + body; the authored
	// content ends up under body regardless of how the input was wrapped.
	if let Some(body) = find_element(root, "body") {
		return convert_children(body);
	}
	convert_children(root)
}

fn find_element<'a>(node: HtmlNode<'a>, tag: &str) -> Option<HtmlNode<'a>> {
	for child in node.children() {
		if let scraper::node::Node::Element(el) = child.value() {
			if el.name() == tag {
				return Some(child);
			}
		}
		if let Some(found) = find_element(child, tag) {
			return Some(found);
		}
	}
	None
}

fn convert_children(node: HtmlNode<'_>) -> Vec<Node> {
	let mut out = Vec::new();
	for child in node.children() {
		if let Some(converted) = convert_node(child) {
			out.push(converted);
		}
	}
	out
}

fn convert_node(node: HtmlNode<'_>) -> Option<Node> {
	match node.value() {
		scraper::node::Node::Element(el) => {
			let mut element = Element::new(el.name().to_string());
			for (name, value) in el.attrs() {
				element.attrs.push((name.into(), value.into()));
			}
			element.children = convert_children(node);
			Some(Node::Element(element))
		}
		scraper::node::Node::Text(text) => Some(Node::Text(text.to_string())),
		scraper::node::Node::Comment(comment) => Some(Node::Comment(comment.to_string())),
		_ => None,
	}
}


// vim: ts=4
