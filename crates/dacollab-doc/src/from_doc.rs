//! Schema-directed serialization: CRDT fragment → HTML
//!
//! Reads the structured document back into the owned HTML tree, then runs
//! the emission passes (table to block, diff unwrapping, spacer removal,
//! list/image emission rules, section join, metadata, envelope) and
//! serializes the result.

use yrs::types::text::YChange;
use yrs::types::xml::*;
use yrs::{Any, GetString, Out, ReadTxn, Text};

use crate::blocks;
use crate::schema::{self, Marks};
use crate::tree::{serialize, Element, Node};

/// Read the fragment's block sequence into the intermediate HTML tree.
pub fn read_blocks<T: ReadTxn>(txn: &T, frag: &XmlFragmentRef) -> Vec<Node> {
	let mut out = Vec::new();
	for child in frag.children(txn) {
		convert_child(txn, child, &mut out);
	}
	out
}

fn convert_child<T: ReadTxn>(txn: &T, child: XmlOut, out: &mut Vec<Node>) {
	match child {
		XmlOut::Element(el) => out.extend(convert_element(txn, &el)),
		XmlOut::Text(text) => out.extend(convert_text(txn, &text)),
		XmlOut::Fragment(frag) => {
			for inner in frag.children(txn) {
				convert_child(txn, inner, out);
			}
		}
	}
}

fn element_attrs<T: ReadTxn>(txn: &T, el: &XmlElementRef) -> Vec<(String, String)> {
	let mut attrs: Vec<(String, String)> =
		el.attributes(txn).map(|(key, value)| (key.to_string(), value.to_string())).collect();
	// The CRDT stores attributes unordered; sort for a stable byte form.
	attrs.sort();
	attrs
}

fn html_element<T: ReadTxn>(txn: &T, tag: &str, el: &XmlElementRef, skip: &[&str]) -> Element {
	let mut out = Element::new(tag.to_string());
	for (key, value) in element_attrs(txn, el) {
		if !skip.contains(&key.as_str()) {
			out.set_attr(&key, &value);
		}
	}
	out
}

fn convert_element<T: ReadTxn>(txn: &T, el: &XmlElementRef) -> Vec<Node> {
	let tag = el.tag().to_string();
	match tag.as_str() {
		schema::PARAGRAPH => {
			let mut p = html_element(txn, "p", el, &[]);
			p.children = convert_children(txn, el);
			vec![Node::Element(p)]
		}
		schema::HEADING => {
			let level = el
				.get_attribute(txn, schema::LEVEL_ATTR)
				.map(|v| v.to_string())
				.and_then(|v| v.parse::<u8>().ok())
				.unwrap_or(1);
			let mut heading = html_element(txn, schema::heading_tag(level), el, &[schema::LEVEL_ATTR]);
			heading.children = convert_children(txn, el);
			vec![Node::Element(heading)]
		}
		schema::BULLET_LIST | schema::ORDERED_LIST => {
			let html_tag = if tag == schema::BULLET_LIST { "ul" } else { "ol" };
			let mut list = html_element(txn, html_tag, el, &[]);
			list.children = convert_children(txn, el);
			vec![Node::Element(list)]
		}
		schema::LIST_ITEM => {
			let mut li = html_element(txn, "li", el, &[]);
			li.children = convert_children(txn, el);
			vec![Node::Element(li)]
		}
		schema::BLOCKQUOTE => {
			let mut quote = html_element(txn, "blockquote", el, &[]);
			quote.children = convert_children(txn, el);
			vec![Node::Element(quote)]
		}
		schema::CODE_BLOCK => {
			let mut text = String::new();
			for child in el.children(txn) {
				if let XmlOut::Text(t) = child {
					text.push_str(&t.get_string(txn));
				}
			}
			let code = Element::new("code").with_children(vec![Node::Text(text)]);
			let mut pre = html_element(txn, "pre", el, &[]);
			pre.children = vec![Node::Element(code)];
			vec![Node::Element(pre)]
		}
		schema::HORIZONTAL_RULE => vec![Node::Element(html_element(txn, "hr", el, &[]))],
		schema::TABLE => {
			let mut table = html_element(txn, "table", el, &[]);
			table.children = convert_children(txn, el);
			vec![Node::Element(table)]
		}
		schema::TABLE_ROW => {
			let mut tr = html_element(txn, "tr", el, &[]);
			tr.children = convert_children(txn, el);
			vec![Node::Element(tr)]
		}
		schema::TABLE_CELL => {
			let mut td = html_element(txn, "td", el, &[]);
			td.children = convert_children(txn, el);
			vec![Node::Element(td)]
		}
		schema::DIFF_ADDED => {
			let mut wrapper = html_element(txn, "da-diff-added", el, &[]);
			wrapper.children = convert_children(txn, el);
			vec![Node::Element(wrapper)]
		}
		schema::DIFF_DELETED => {
			let mut wrapper = html_element(txn, "da-diff-deleted", el, &[]);
			wrapper.children = convert_children(txn, el);
			vec![Node::Element(wrapper)]
		}
		schema::IMAGE => vec![Node::Element(html_element(txn, "img", el, &[]))],
		schema::HARD_BREAK => vec![Node::Element(Element::new("br"))],
		_ => convert_children(txn, el),
	}
}

fn convert_children<T: ReadTxn>(txn: &T, el: &XmlElementRef) -> Vec<Node> {
	let mut out = Vec::new();
	for child in el.children(txn) {
		convert_child(txn, child, &mut out);
	}
	out
}

fn convert_text<T: ReadTxn>(txn: &T, text: &XmlTextRef) -> Vec<Node> {
	let segments: Vec<(String, Marks)> = text
		.diff(txn, YChange::identity)
		.into_iter()
		.map(|diff| {
			let chunk = match &diff.insert {
				Out::Any(Any::String(s)) => s.to_string(),
				other => other.to_string(),
			};
			let marks = Marks::from_attrs(diff.attributes.as_deref());
			(chunk, marks)
		})
		.collect();
	emit_segments(&segments)
}

/// Emit text segments as nested mark tags in canonical order: consecutive
/// segments sharing the outermost mark are grouped under one tag.
fn emit_segments(segments: &[(String, Marks)]) -> Vec<Node> {
	let mut out = Vec::new();
	let mut i = 0;
	while i < segments.len() {
		let (text, marks) = &segments[i];
		let mark = schema::MARK_ORDER.iter().copied().find(|m| marks.has(m));
		let Some(mark) = mark else {
			out.push(Node::Text(text.clone()));
			i += 1;
			continue;
		};

		let link = marks.link.clone();
		let mut j = i + 1;
		while j < segments.len()
			&& segments[j].1.has(mark)
			&& (mark != schema::MARK_LINK || segments[j].1.link == link)
		{
			j += 1;
		}

		let inner: Vec<(String, Marks)> = segments[i..j]
			.iter()
			.map(|(t, m)| {
				let mut m = m.clone();
				m.clear(mark);
				(t.clone(), m)
			})
			.collect();

		let mut wrapper = match mark {
			schema::MARK_LINK => {
				let mut a = Element::new("a");
				if let Some(link) = &link {
					a.set_attr("href", &link.href);
					if let Some(title) = &link.title {
						a.set_attr("title", title);
					}
				}
				a
			}
			schema::MARK_STRONG => Element::new("strong"),
			schema::MARK_EM => Element::new("em"),
			schema::MARK_UNDERLINE => Element::new("u"),
			schema::MARK_STRIKE => Element::new("s"),
			schema::MARK_SUP => Element::new("sup"),
			schema::MARK_SUB => Element::new("sub"),
			_ => Element::new("code"),
		};
		wrapper.children = emit_segments(&inner);
		out.push(Node::Element(wrapper));
		i = j;
	}
	out
}

// Emission passes //
//*****************//

/// Run the emission passes over the block sequence and serialize the full
/// body, appending the metadata block when `metadata` is non-empty.
pub fn emit_body(mut nodes: Vec<Node>, metadata: &[(String, String)]) -> String {
	convert_tables(&mut nodes);
	drop_spacers(&mut nodes);
	unwrap_diff_wrappers(&mut nodes);
	unwrap_single_paragraph_items(&mut nodes);
	unfold_image_paragraphs(&mut nodes);
	wrap_images(&mut nodes);

	let mut main = Element::new("main");
	for section in join_sections(nodes) {
		main.children.push(Node::Element(section));
	}
	if !metadata.is_empty() {
		main.children.push(Node::Element(metadata_block(metadata)));
	}

	let body = Element::new("body").with_children(vec![
		Node::Element(Element::new("header")),
		Node::Element(main),
		Node::Element(Element::new("footer")),
	]);
	serialize(&[Node::Element(body)])
}

/// Replace every table with the block `<div>` it encodes.
fn convert_tables(nodes: &mut Vec<Node>) {
	for node in nodes.iter_mut() {
		let Some(el) = node.as_element_mut() else { continue };
		if &*el.tag == "table" {
			let block = blocks::table_to_div(el);
			*node = Node::Element(block);
		} else {
			convert_tables(&mut el.children);
		}
	}
}

/// Unwrap `<da-diff-added>` (hoisting the marker attribute onto element
/// children) and sanitize `<da-diff-deleted>` in place.
fn unwrap_diff_wrappers(nodes: &mut Vec<Node>) {
	let mut i = 0;
	while i < nodes.len() {
		let unwrap = match nodes[i].as_element_mut() {
			Some(el) => {
				unwrap_diff_wrappers(&mut el.children);
				match &*el.tag {
					"da-diff-added" => true,
					"da-diff-deleted" | "da-loc-added" | "da-loc-deleted" => {
						el.remove_attr("contenteditable");
						false
					}
					_ => false,
				}
			}
			None => false,
		};

		if unwrap {
			let Node::Element(mut wrapper) = nodes.remove(i) else { unreachable!() };
			for child in wrapper.children.iter_mut() {
				if let Some(child_el) = child.as_element_mut() {
					if !child_el.has_attr("da-diff-added") {
						child_el.set_attr("da-diff-added", "");
					}
				}
			}
			let count = wrapper.children.len();
			for (off, child) in wrapper.children.into_iter().enumerate() {
				nodes.insert(i + off, child);
			}
			i += count;
			continue;
		}
		i += 1;
	}
}

fn is_empty_paragraph(node: &Node) -> bool {
	node.as_element().is_some_and(|el| {
		&*el.tag == "p" && el.attrs.is_empty() && el.children.iter().all(Node::is_blank_text)
	})
}

/// Remove the empty paragraph spacers flanking block divs, here and inside
/// kept diff wrappers.
fn drop_spacers(nodes: &mut Vec<Node>) {
	let is_block = |n: &Node| n.as_element().is_some_and(|el| &*el.tag == "div");
	let mut i = 0;
	while i < nodes.len() {
		if is_empty_paragraph(&nodes[i]) {
			let after_block = i > 0 && is_block(&nodes[i - 1]);
			let before_block = i + 1 < nodes.len() && is_block(&nodes[i + 1]);
			if after_block || before_block {
				nodes.remove(i);
				continue;
			}
		}
		if let Some(el) = nodes[i].as_element_mut() {
			if &*el.tag == "da-diff-deleted" || &*el.tag == "da-diff-added" {
				drop_spacers(&mut el.children);
			}
		}
		i += 1;
	}
}

/// `<li>` holding exactly one `<p>` renders its inline children directly.
fn unwrap_single_paragraph_items(nodes: &mut Vec<Node>) {
	for node in nodes.iter_mut() {
		let Some(el) = node.as_element_mut() else { continue };
		unwrap_single_paragraph_items(&mut el.children);
		if &*el.tag != "li" {
			continue;
		}
		let significant: Vec<usize> = el
			.children
			.iter()
			.enumerate()
			.filter(|(_, n)| !n.is_blank_text())
			.map(|(i, _)| i)
			.collect();
		if let [only] = significant[..] {
			if el.children[only].is_tag("p") {
				let Node::Element(p) = el.children.remove(only) else { unreachable!() };
				el.children = p.children;
			}
		}
	}
}

/// `<p>` whose non-whitespace children are exclusively images renders as
/// the images themselves.
fn unfold_image_paragraphs(nodes: &mut Vec<Node>) {
	let mut i = 0;
	while i < nodes.len() {
		let all_images = match nodes[i].as_element_mut() {
			Some(el) => {
				unfold_image_paragraphs(&mut el.children);
				&*el.tag == "p"
					&& el.children.iter().any(|n| n.is_tag("img"))
					&& el.children.iter().all(|n| n.is_tag("img") || n.is_blank_text())
			}
			None => false,
		};

		if all_images {
			let Node::Element(p) = nodes.remove(i) else { unreachable!() };
			let images: Vec<Node> = p.children.into_iter().filter(|n| n.is_tag("img")).collect();
			let count = images.len();
			for (off, img) in images.into_iter().enumerate() {
				nodes.insert(i + off, img);
			}
			i += count;
			continue;
		}
		i += 1;
	}
}

/// Wrap every `<img>` with a `src` in the canonical `<picture>` envelope,
/// hoisting `href`/`title`/`da-diff-added` onto an enclosing `<a>`.
fn wrap_images(nodes: &mut Vec<Node>) {
	for node in nodes.iter_mut() {
		let Some(el) = node.as_element_mut() else { continue };
		if &*el.tag != "img" {
			wrap_images(&mut el.children);
			continue;
		}
		let Some(src) = el.attr("src").map(str::to_string) else { continue };

		let href = el.remove_attr("href");
		let title_for_link = href.as_ref().and_then(|_| el.attr("title").map(str::to_string));
		let diff_added = if href.is_some() { el.remove_attr("da-diff-added") } else { None };
		if href.is_some() {
			el.remove_attr("title");
		}

		let img = canonical_img(el, &src);
		let mut picture = Element::new("picture").with_children(vec![
			Node::Element(Element::new("source").with_attr("srcset", &src)),
			Node::Element(
				Element::new("source")
					.with_attr("srcset", &src)
					.with_attr("media", "(min-width: 600px)"),
			),
			Node::Element(img),
		]);

		if let Some(href) = href {
			let mut anchor = Element::new("a").with_attr("href", &href);
			if let Some(title) = title_for_link {
				anchor.set_attr("title", &title);
			}
			if let Some(diff) = diff_added {
				anchor.set_attr("da-diff-added", &diff);
			}
			anchor.children = vec![Node::Element(picture)];
			picture = anchor;
		}

		*node = Node::Element(picture);
	}
}

/// Rebuild the `<img>` with attributes in a fixed order.
fn canonical_img(el: &Element, src: &str) -> Element {
	let mut img = Element::new("img");
	let loading = el.attr("loading").unwrap_or("lazy").to_string();
	img.set_attr("loading", &loading);
	img.set_attr("src", src);
	let mut rest: Vec<(Box<str>, Box<str>)> = el
		.attrs
		.iter()
		.filter(|(k, _)| !matches!(&**k, "loading" | "src"))
		.cloned()
		.collect();
	rest.sort();
	for (key, value) in rest {
		img.set_attr(&key, &value);
	}
	img
}

/// Split the flat block sequence at `<hr>` into sibling section divs.
fn join_sections(nodes: Vec<Node>) -> Vec<Element> {
	let mut sections: Vec<Element> = Vec::new();
	let mut current = Element::new("div");
	for node in nodes {
		if node.is_tag("hr") {
			trim_section(&mut current);
			sections.push(current);
			current = Element::new("div");
		} else if !node.is_blank_text() {
			current.children.push(node);
		}
	}
	trim_section(&mut current);
	sections.push(current);
	sections
}

/// Drop the empty spacer paragraphs at a section's edges.
fn trim_section(section: &mut Element) {
	while section.children.first().is_some_and(is_empty_paragraph) {
		section.children.remove(0);
	}
	while section.children.last().is_some_and(is_empty_paragraph) {
		section.children.pop();
	}
}

fn metadata_block(metadata: &[(String, String)]) -> Element {
	let mut block = Element::new("div").with_attr("class", "da-metadata");
	for (key, value) in metadata {
		let row = Element::new("div").with_children(vec![
			Node::Element(Element::new("div").with_children(vec![Node::text(key.clone())])),
			Node::Element(Element::new("div").with_children(vec![Node::text(value.clone())])),
		]);
		block.children.push(Node::Element(row));
	}
	block
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::schema::Link;

	fn seg(text: &str, marks: Marks) -> (String, Marks) {
		(text.to_string(), marks)
	}

	#[test]
	fn segments_group_under_the_outermost_mark() {
		let strong = Marks { strong: true, ..Marks::default() };
		let strong_em = Marks { strong: true, em: true, ..Marks::default() };
		let nodes = emit_segments(&[seg("b", strong), seg("bi", strong_em)]);
		assert_eq!(serialize(&nodes), "<strong>b<em>bi</em></strong>");
	}

	#[test]
	fn link_runs_split_on_href_change() {
		let one = Marks {
			link: Some(Link { href: "https://a.test/".into(), title: None }),
			..Marks::default()
		};
		let two = Marks {
			link: Some(Link { href: "https://b.test/".into(), title: None }),
			..Marks::default()
		};
		let nodes = emit_segments(&[seg("a", one), seg("b", two)]);
		assert_eq!(
			serialize(&nodes),
			"<a href=\"https://a.test/\">a</a><a href=\"https://b.test/\">b</a>"
		);
	}

	#[test]
	fn plain_segments_stay_bare_text() {
		let nodes = emit_segments(&[seg("x", Marks::default())]);
		assert_eq!(serialize(&nodes), "x");
	}

	#[test]
	fn images_get_the_picture_envelope() {
		let mut nodes =
			vec![Node::Element(Element::new("img").with_attr("src", "a.png").with_attr("alt", "x"))];
		wrap_images(&mut nodes);
		assert_eq!(
			serialize(&nodes),
			"<picture>\
				<source srcset=\"a.png\">\
				<source srcset=\"a.png\" media=\"(min-width: 600px)\">\
				<img loading=\"lazy\" src=\"a.png\" alt=\"x\">\
			</picture>"
		);
	}

	#[test]
	fn images_without_src_stay_bare() {
		let mut nodes = vec![Node::Element(Element::new("img").with_attr("alt", "x"))];
		wrap_images(&mut nodes);
		assert_eq!(serialize(&nodes), "<img alt=\"x\">");
	}

	#[test]
	fn sections_trim_their_spacer_paragraphs() {
		let nodes = vec![
			Node::Element(Element::new("p")),
			Node::Element(Element::new("p").with_children(vec![Node::text("a")])),
			Node::Element(Element::new("p")),
			Node::Element(Element::new("hr")),
			Node::Element(Element::new("p")),
			Node::Element(Element::new("p").with_children(vec![Node::text("b")])),
		];
		let sections = join_sections(nodes);
		assert_eq!(sections.len(), 2);
		let rendered: Vec<String> =
			sections.into_iter().map(|s| serialize(&[Node::Element(s)])).collect();
		assert_eq!(rendered[0], "<div><p>a</p></div>");
		assert_eq!(rendered[1], "<div><p>b</p></div>");
	}

	#[test]
	fn unwrapping_added_marks_children() {
		let wrapper = Element::new("da-diff-added").with_children(vec![
			Node::Element(Element::new("p").with_children(vec![Node::text("x")])),
		]);
		let mut nodes = vec![Node::Element(wrapper)];
		unwrap_diff_wrappers(&mut nodes);
		assert_eq!(serialize(&nodes), "<p da-diff-added=\"\">x</p>");
	}

	#[test]
	fn empty_document_renders_the_canonical_body() {
		assert_eq!(
			emit_body(Vec::new(), &[]),
			"<body><header></header><main><div></div></main><footer></footer></body>"
		);
	}
}

// vim: ts=4
