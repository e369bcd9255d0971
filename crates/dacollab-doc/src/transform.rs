//! HTML-side transform passes
//!
//! The passes that run between lax parsing and the schema-guided parse,
//! in application order: metadata extraction, regional-edit
//! attribute wrapping, link/image hoisting, comment stripping, block to
//! table conversion, section-break detection, and section splitting.

use crate::blocks;
use crate::tree::{Element, Node};

/// Marker classes bounding a multi-element regional edit.
const GROUP_START: &str = "block-group-start";
const GROUP_END: &str = "block-group-end";

/// Take the children of the first `<main>` element, or the full tree when
/// no `<main>` exists.
pub fn take_main(body: Vec<Node>) -> Vec<Node> {
	fn extract(nodes: Vec<Node>) -> Result<Vec<Node>, Vec<Node>> {
		let mut remaining = Vec::with_capacity(nodes.len());
		for node in nodes {
			match node {
				Node::Element(el) if &*el.tag == "main" => return Ok(el.children),
				Node::Element(mut el) => {
					let children = std::mem::take(&mut el.children);
					match extract(children) {
						Ok(found) => return Ok(found),
						Err(children) => {
							el.children = children;
							remaining.push(Node::Element(el));
						}
					}
				}
				other => remaining.push(other),
			}
		}
		Err(remaining)
	}

	match extract(body) {
		Ok(main) => main,
		Err(all) => all,
	}
}

/// Extract and remove a top-level `<div class="da-metadata">`, parsing its
/// two-column rows into key/value pairs.
pub fn extract_metadata(nodes: &mut Vec<Node>) -> Vec<(String, String)> {
	let idx = nodes.iter().position(|n| {
		n.as_element().is_some_and(|el| &*el.tag == "div" && el.class_list().contains(&"da-metadata"))
	});
	let Some(idx) = idx else {
		return Vec::new();
	};
	let Node::Element(meta) = nodes.remove(idx) else {
		return Vec::new();
	};

	let mut entries = Vec::new();
	for row in meta.child_elements("div") {
		let mut cells = row.child_elements("div");
		let Some(key_cell) = cells.next() else { continue };
		let key = key_cell.text_content().trim().to_string();
		if key.is_empty() {
			continue;
		}
		let value = cells.next().map(|c| c.text_content().trim().to_string()).unwrap_or_default();
		entries.push((key, value));
	}
	entries
}

/// Wrap every element carrying a `da-diff-added` attribute in a
/// synthesized `<da-diff-added>` element. An element opening a block
/// group extends the wrap through the sibling that closes the group.
/// The attribute stays on the element so it survives unwrapping on the
/// way back out.
pub fn wrap_diff_attrs(nodes: &mut Vec<Node>) {
	let mut i = 0;
	while i < nodes.len() {
		let qualifies = match nodes[i].as_element() {
			Some(el) => {
				el.has_attr("da-diff-added")
					&& &*el.tag != "da-diff-added"
					&& &*el.tag != "da-diff-deleted"
			}
			None => false,
		};

		if qualifies {
			let end = if nodes[i]
				.as_element()
				.is_some_and(|el| el.class_list().contains(&GROUP_START))
			{
				nodes[i + 1..]
					.iter()
					.position(|n| {
						n.as_element().is_some_and(|el| el.class_list().contains(&GROUP_END))
					})
					.map(|off| i + 1 + off)
					.unwrap_or(nodes.len() - 1)
			} else {
				i
			};

			let group: Vec<Node> = nodes.drain(i..=end).collect();
			let wrapper = Element::new("da-diff-added").with_children(group);
			nodes.insert(i, Node::Element(wrapper));
			i += 1;
			continue;
		}

		if let Some(el) = nodes[i].as_element_mut() {
			wrap_diff_attrs(&mut el.children);
		}
		i += 1;
	}
}

/// For any `<a>` wrapping a `<picture>` or `<img>`, hoist `href`, `title`
/// and `da-diff-added` onto the `<img>` itself and splice the `<a>`'s
/// children into its place.
pub fn hoist_link_images(nodes: &mut Vec<Node>) {
	let mut i = 0;
	while i < nodes.len() {
		let is_image_link = nodes[i].as_element().is_some_and(|el| {
			&*el.tag == "a" && (el.contains_tag("picture") || el.contains_tag("img"))
		});

		if is_image_link {
			let Node::Element(mut anchor) = nodes.remove(i) else { unreachable!() };
			let href = anchor.attr("href").map(str::to_string);
			let title = anchor.attr("title").map(str::to_string);
			let diff_added = anchor.has_attr("da-diff-added");

			if let Some(img) = find_img_mut(&mut anchor.children) {
				if let Some(href) = &href {
					img.set_attr("href", href);
				}
				if let Some(title) = &title {
					img.set_attr("title", title);
				}
				if diff_added {
					img.set_attr("da-diff-added", "");
				}
			}

			let count = anchor.children.len();
			for (off, child) in anchor.children.into_iter().enumerate() {
				nodes.insert(i + off, child);
			}
			i += count;
			continue;
		}

		if let Some(el) = nodes[i].as_element_mut() {
			hoist_link_images(&mut el.children);
		}
		i += 1;
	}
}

fn find_img_mut(nodes: &mut [Node]) -> Option<&mut Element> {
	for node in nodes {
		if let Node::Element(el) = node {
			if &*el.tag == "img" {
				return Some(el);
			}
			if let Some(found) = find_img_mut(&mut el.children) {
				return Some(found);
			}
		}
	}
	None
}

/// Remove HTML comment nodes everywhere.
pub fn strip_comments(nodes: &mut Vec<Node>) {
	nodes.retain(|n| !matches!(n, Node::Comment(_)));
	for node in nodes {
		if let Some(el) = node.as_element_mut() {
			strip_comments(&mut el.children);
		}
	}
}

/// Convert authored blocks to tables inside each top-level section of
/// `<main>`, recursing into diff wrappers.
pub fn convert_blocks(sections: &mut Vec<Node>) {
	for node in sections {
		let Some(el) = node.as_element_mut() else { continue };
		match &*el.tag {
			"div" => convert_blocks_in_section(&mut el.children),
			"da-diff-added" | "da-diff-deleted" => convert_blocks(&mut el.children),
			_ => {}
		}
	}
}

fn convert_blocks_in_section(children: &mut Vec<Node>) {
	let mut i = 0;
	while i < children.len() {
		let is_block = children[i]
			.as_element()
			.is_some_and(|el| &*el.tag == "div" && !el.class_list().is_empty());

		if is_block {
			let Node::Element(block) = children.remove(i) else { unreachable!() };
			let table = blocks::div_to_table(&block);
			// Empty paragraph spacers keep a cursor position on both sides.
			children.insert(i, Node::Element(Element::new("p")));
			children.insert(i + 1, Node::Element(table));
			children.insert(i + 2, Node::Element(Element::new("p")));
			i += 3;
			continue;
		}

		if let Some(el) = children[i].as_element_mut() {
			if &*el.tag == "da-diff-added" || &*el.tag == "da-diff-deleted" {
				convert_blocks_in_section(&mut el.children);
			}
		}
		i += 1;
	}
}

/// Replace `<p>---</p>` with `<hr>` everywhere.
pub fn detect_section_breaks(nodes: &mut Vec<Node>) {
	for node in nodes.iter_mut() {
		let is_break = node.as_element().is_some_and(|el| {
			&*el.tag == "p"
				&& el.children.len() == 1
				&& matches!(&el.children[0], Node::Text(t) if t == "---")
		});
		if is_break {
			*node = Node::Element(Element::new("hr"));
		} else if let Some(el) = node.as_element_mut() {
			detect_section_breaks(&mut el.children);
		}
	}
}

/// Flatten the top-level section `<div>`s into one sequence delimited by
/// `<hr>` (each flanked by empty `<p>` spacers).
pub fn split_sections(sections: Vec<Node>) -> Vec<Node> {
	let mut out = Vec::new();
	let mut seen_section = false;
	for node in sections {
		match node {
			Node::Element(el) if &*el.tag == "div" => {
				if seen_section {
					out.push(Node::Element(Element::new("p")));
					out.push(Node::Element(Element::new("hr")));
					out.push(Node::Element(Element::new("p")));
				}
				seen_section = true;
				out.extend(el.children);
			}
			node if node.is_blank_text() => {}
			node => out.push(node),
		}
	}
	out
}


// vim: ts=4
