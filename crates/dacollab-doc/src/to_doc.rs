//! Schema-guided parse: HTML tree → CRDT fragment
//!
//! Walks the transformed HTML tree and builds the structured document
//! inside the `prosemirror` XML fragment. Block elements become XML
//! elements named after their node kind, inline content becomes XML text
//! runs with marks as text attributes, and images/hard breaks become
//! inline elements.

use yrs::types::xml::*;
use yrs::{Text, TransactionMut};

use crate::blocks;
use crate::schema::{self, Link, Marks};
use crate::tree::{Element, Node};

/// Block-level tags: a container holding any of these gets block parsing,
/// everything else is treated as one paragraph of inline content.
const BLOCK_TAGS: &[&str] = &[
	"p", "h1", "h2", "h3", "h4", "h5", "h6", "ul", "ol", "blockquote", "pre", "hr", "table",
	"div", "da-diff-added", "da-diff-deleted",
];

/// Build the document fragment from the flattened section content.
pub fn build_fragment(txn: &mut TransactionMut, frag: &XmlFragmentRef, nodes: &[Node]) {
	append_blocks(txn, frag, nodes);
}

fn append_element<P: XmlFragment>(
	txn: &mut TransactionMut,
	parent: &P,
	name: &str,
	attrs: &[(Box<str>, Box<str>)],
) -> XmlElementRef {
	let el = parent.push_back(txn, XmlElementPrelim::empty(name));
	for (key, value) in attrs {
		el.insert_attribute(txn, &**key, &**value);
	}
	el
}

fn append_blocks<P: XmlFragment>(txn: &mut TransactionMut, parent: &P, nodes: &[Node]) {
	for node in nodes {
		match node {
			Node::Comment(_) => {}
			Node::Text(text) => {
				if !text.trim().is_empty() {
					let p = append_element(txn, parent, schema::PARAGRAPH, &[]);
					let mut cx = InlineCx::default();
					append_inline(txn, &p, std::slice::from_ref(node), &Marks::default(), &mut cx);
				}
			}
			Node::Element(el) => append_block_element(txn, parent, el),
		}
	}
}

fn append_block_element<P: XmlFragment>(txn: &mut TransactionMut, parent: &P, el: &Element) {
	if let Some(level) = schema::heading_level(&el.tag) {
		let heading = append_element(txn, parent, schema::HEADING, &el.attrs);
		heading.insert_attribute(txn, schema::LEVEL_ATTR, level.to_string());
		append_inline_content(txn, &heading, &el.children);
		return;
	}

	match &*el.tag {
		"p" => {
			let p = append_element(txn, parent, schema::PARAGRAPH, &el.attrs);
			append_inline_content(txn, &p, &el.children);
		}
		"ul" | "ol" => {
			let name = if &*el.tag == "ul" { schema::BULLET_LIST } else { schema::ORDERED_LIST };
			let list = append_element(txn, parent, name, &el.attrs);
			for item in el.child_elements("li") {
				let li = append_element(txn, &list, schema::LIST_ITEM, &item.attrs);
				append_content(txn, &li, &item.children);
			}
		}
		"blockquote" => {
			let quote = append_element(txn, parent, schema::BLOCKQUOTE, &el.attrs);
			append_content(txn, &quote, &el.children);
		}
		"pre" => {
			let code = append_element(txn, parent, schema::CODE_BLOCK, &el.attrs);
			let text: XmlTextRef = code.push_back(txn, XmlTextPrelim::new(""));
			let content = el.text_content();
			text.insert(txn, 0, &content);
		}
		"hr" => {
			append_element(txn, parent, schema::HORIZONTAL_RULE, &el.attrs);
		}
		"table" => {
			let table = append_element(txn, parent, schema::TABLE, &el.attrs);
			for row in blocks::table_rows(el) {
				let tr = append_element(txn, &table, schema::TABLE_ROW, &row.attrs);
				for cell in row.children.iter().filter_map(|n| {
					n.as_element().filter(|c| &*c.tag == "td" || &*c.tag == "th")
				}) {
					let td = append_element(txn, &tr, schema::TABLE_CELL, &cell.attrs);
					append_content(txn, &td, &cell.children);
				}
			}
		}
		"da-diff-added" => {
			let wrapper = append_element(txn, parent, schema::DIFF_ADDED, &el.attrs);
			append_blocks(txn, &wrapper, &el.children);
		}
		"da-diff-deleted" => {
			let wrapper = append_element(txn, parent, schema::DIFF_DELETED, &el.attrs);
			append_blocks(txn, &wrapper, &el.children);
		}
		"img" | "picture" => {
			// A block-level image still lives in a paragraph.
			let p = append_element(txn, parent, schema::PARAGRAPH, &[]);
			let mut cx = InlineCx::default();
			append_inline(
				txn,
				&p,
				std::slice::from_ref(&Node::Element(el.clone())),
				&Marks::default(),
				&mut cx,
			);
		}
		"div" => {
			// Stray container: flatten its children into the flow.
			append_blocks(txn, parent, &el.children);
		}
		_ => {
			let p = append_element(txn, parent, schema::PARAGRAPH, &[]);
			let mut cx = InlineCx::default();
			append_inline(
				txn,
				&p,
				std::slice::from_ref(&Node::Element(el.clone())),
				&Marks::default(),
				&mut cx,
			);
		}
	}
}

/// Parse a container that may hold blocks or bare inline content
/// (list items, table cells, blockquotes).
fn append_content<P: XmlFragment>(txn: &mut TransactionMut, parent: &P, children: &[Node]) {
	let has_blocks = children.iter().any(|n| {
		n.as_element().is_some_and(|el| BLOCK_TAGS.contains(&&*el.tag))
	});
	if has_blocks {
		append_blocks(txn, parent, children);
	} else {
		append_inline_content(txn, parent, children);
	}
}

/// Wrap bare inline content in one paragraph.
fn append_inline_content<P: XmlFragment>(txn: &mut TransactionMut, parent: &P, children: &[Node]) {
	append_inline(txn, parent, children, &Marks::default(), &mut InlineCx::default());
}

/// Tracks the open text run; inline elements (images, hard breaks) close
/// it so subsequent text starts a fresh run.
#[derive(Default)]
struct InlineCx {
	text: Option<XmlTextRef>,
}

fn append_inline<P: XmlFragment>(
	txn: &mut TransactionMut,
	parent: &P,
	nodes: &[Node],
	marks: &Marks,
	cx: &mut InlineCx,
) {
	for node in nodes {
		match node {
			Node::Comment(_) => {}
			Node::Text(text) => {
				let text_ref = match &cx.text {
					Some(t) => t.clone(),
					None => {
						let t: XmlTextRef = parent.push_back(txn, XmlTextPrelim::new(""));
						cx.text = Some(t.clone());
						t
					}
				};
				let idx = text_ref.len(txn);
				// Attributes are always passed explicitly: a plain insert
				// would inherit the preceding segment's formatting.
				text_ref.insert_with_attributes(txn, idx, text, marks.to_attrs());
			}
			Node::Element(el) => append_inline_element(txn, parent, el, marks, cx),
		}
	}
}

fn append_inline_element<P: XmlFragment>(
	txn: &mut TransactionMut,
	parent: &P,
	el: &Element,
	marks: &Marks,
	cx: &mut InlineCx,
) {
	let recurse_with = |txn: &mut TransactionMut, cx: &mut InlineCx, marks: Marks| {
		append_inline(txn, parent, &el.children, &marks, cx);
	};

	match &*el.tag {
		"strong" | "b" => {
			let mut m = marks.clone();
			m.strong = true;
			recurse_with(txn, cx, m);
		}
		"em" | "i" => {
			let mut m = marks.clone();
			m.em = true;
			recurse_with(txn, cx, m);
		}
		"u" => {
			let mut m = marks.clone();
			m.underline = true;
			recurse_with(txn, cx, m);
		}
		"s" | "strike" | "del" => {
			let mut m = marks.clone();
			m.strike = true;
			recurse_with(txn, cx, m);
		}
		"sup" => {
			let mut m = marks.clone();
			m.sup = true;
			recurse_with(txn, cx, m);
		}
		"sub" => {
			let mut m = marks.clone();
			m.sub = true;
			recurse_with(txn, cx, m);
		}
		"code" => {
			let mut m = marks.clone();
			m.code = true;
			recurse_with(txn, cx, m);
		}
		"a" => {
			let mut m = marks.clone();
			m.link = Some(Link {
				href: el.attr("href").unwrap_or_default().to_string(),
				title: el.attr("title").map(str::to_string),
			});
			recurse_with(txn, cx, m);
		}
		"br" => {
			cx.text = None;
			append_element(txn, parent, schema::HARD_BREAK, &[]);
		}
		"img" => {
			cx.text = None;
			append_image(txn, parent, el);
		}
		"picture" => {
			cx.text = None;
			if let Some(img) = find_img(el) {
				append_image(txn, parent, img);
			}
		}
		_ => recurse_with(txn, cx, marks.clone()),
	}
}

fn append_image<P: XmlFragment>(txn: &mut TransactionMut, parent: &P, img: &Element) {
	let image = parent.push_back(txn, XmlElementPrelim::empty(schema::IMAGE));
	for (key, value) in &img.attrs {
		// `loading` is re-defaulted on the way out.
		if &**key == "loading" {
			continue;
		}
		image.insert_attribute(txn, &**key, &**value);
	}
}

fn find_img(el: &Element) -> Option<&Element> {
	for child in &el.children {
		if let Node::Element(inner) = child {
			if &*inner.tag == "img" {
				return Some(inner);
			}
			if let Some(found) = find_img(inner) {
				return Some(found);
			}
		}
	}
	None
}

// vim: ts=4
