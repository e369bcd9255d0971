//! Block ⇄ table conversion
//!
//! Authored blocks are classed `<div>`s whose nested `<div>` rows carry
//! the block content. Inside the document tree they are represented as
//! tables: the first row is a single spanning cell holding the block
//! name, subsequent rows hold the cells. The conversion is exact in both
//! directions for tables produced by serialization.

use crate::tree::{Element, Node};

/// Attributes carried between a block `<div>` and its table form.
const CARRIED_ATTRS: &[&str] = &["data-id", "da-diff-added"];

/// Compose the block name shown in the table's header cell:
/// `"first-class (remaining, classes)"`.
pub fn block_name_from_classes(classes: &[&str]) -> String {
	match classes {
		[] => String::new(),
		[first] => (*first).to_string(),
		[first, rest @ ..] => format!("{} ({})", first, rest.join(", ")),
	}
}

/// Derive CSS class names from a block name.
///
/// The name is lowercased with runs of non-alphanumerics collapsed to
/// single dashes; a parenthesized suffix contributes one class per
/// comma-separated entry.
pub fn to_block_css_class_names(text: &str) -> Vec<String> {
	let text = text.trim();
	let (base, variants) = match text.split_once('(') {
		Some((base, rest)) => (base, rest.trim_end_matches(')')),
		None => (text, ""),
	};

	let mut names = vec![base.to_string()];
	names.extend(variants.split(',').map(|v| v.to_string()));

	names
		.iter()
		.map(|name| {
			let mut out = String::new();
			let mut pending_dash = false;
			for ch in name.trim().to_lowercase().chars() {
				if ch.is_ascii_alphanumeric() {
					if pending_dash && !out.is_empty() {
						out.push('-');
					}
					pending_dash = false;
					out.push(ch);
				} else {
					pending_dash = true;
				}
			}
			out
		})
		.filter(|name| !name.is_empty())
		.collect()
}

/// Convert a classed block `<div>` into its table form.
pub fn div_to_table(block: &Element) -> Element {
	let classes = block.class_list();
	let name = block_name_from_classes(&classes);

	// Rows are the block's child divs, cells the divs nested in them.
	let rows: Vec<Vec<&Element>> = block
		.child_elements("div")
		.map(|row| row.child_elements("div").collect())
		.collect();
	let widest = rows.iter().map(|cells| cells.len()).max().unwrap_or(0).max(1);

	let mut table = Element::new("table");
	for attr in CARRIED_ATTRS {
		if let Some(value) = block.attr(attr) {
			table.set_attr(attr, value);
		}
	}

	let mut header_cell = Element::new("td").with_children(vec![Node::text(name)]);
	if widest > 1 {
		header_cell.set_attr("colspan", &widest.to_string());
	}
	table
		.children
		.push(Node::Element(Element::new("tr").with_children(vec![Node::Element(header_cell)])));

	for cells in rows {
		let count = cells.len();
		let mut tr = Element::new("tr");
		for (idx, cell) in cells.into_iter().enumerate() {
			let mut td = Element::new("td").with_children(cell.children.clone());
			// A short row's last cell spans the remainder of the widest row.
			if idx + 1 == count && widest > count {
				td.set_attr("colspan", &(widest - count + 1).to_string());
			}
			tr.children.push(Node::Element(td));
		}
		table.children.push(Node::Element(tr));
	}

	table
}

/// Convert a table back into the classed block `<div>` it encodes.
pub fn table_to_div(table: &Element) -> Element {
	let rows: Vec<&Element> = table_rows(table);

	let name = rows
		.first()
		.and_then(|row| row.child_elements("td").next().or_else(|| row.child_elements("th").next()))
		.map(|cell| cell.text_content())
		.unwrap_or_default();

	let mut block = Element::new("div");
	let classes = to_block_css_class_names(&name);
	if !classes.is_empty() {
		block.set_attr("class", &classes.join(" "));
	}
	for attr in CARRIED_ATTRS {
		if let Some(value) = table.attr(attr) {
			block.set_attr(attr, value);
		}
	}

	for row in rows.iter().skip(1) {
		let mut row_div = Element::new("div");
		for cell in row.children.iter().filter_map(|n| {
			n.as_element().filter(|el| &*el.tag == "td" || &*el.tag == "th")
		}) {
			row_div
				.children
				.push(Node::Element(Element::new("div").with_children(cell.children.clone())));
		}
		block.children.push(Node::Element(row_div));
	}

	block
}

/// Collect `<tr>` elements whether or not the parser inserted a `<tbody>`.
pub(crate) fn table_rows(table: &Element) -> Vec<&Element> {
	let mut rows = Vec::new();
	for child in &table.children {
		if let Some(el) = child.as_element() {
			match &*el.tag {
				"tr" => rows.push(el),
				"thead" | "tbody" | "tfoot" => rows.extend(el.child_elements("tr")),
				_ => {}
			}
		}
	}
	rows
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::tree::serialize;

	fn block(html_classes: &str, rows: &[&[&str]]) -> Element {
		let mut el = Element::new("div").with_attr("class", html_classes);
		for row in rows {
			let mut row_div = Element::new("div");
			for cell in *row {
				row_div.children.push(Node::Element(
					Element::new("div").with_children(vec![Node::text(*cell)]),
				));
			}
			el.children.push(Node::Element(row_div));
		}
		el
	}

	#[test]
	fn class_names_roundtrip_through_block_name() {
		let name = block_name_from_classes(&["marquee", "light"]);
		assert_eq!(name, "marquee (light)");
		assert_eq!(to_block_css_class_names(&name), vec!["marquee", "light"]);

		assert_eq!(to_block_css_class_names("Columns (Wide, Dark Mode)"), vec![
			"columns", "wide", "dark-mode",
		]);
		assert_eq!(to_block_css_class_names("  Hero  "), vec!["hero"]);
	}

	#[test]
	fn collapses_nonalnum_runs() {
		assert_eq!(to_block_css_class_names("Foo -- Bar!"), vec!["foo-bar"]);
	}

	#[test]
	fn single_class_has_no_parens() {
		assert_eq!(block_name_from_classes(&["hero"]), "hero");
	}

	#[test]
	fn converts_block_to_table_with_header_span() {
		let table = div_to_table(&block("marquee light", &[&["a", "b"], &["c"]]));
		assert_eq!(
			serialize(&[Node::Element(table)]),
			"<table>\
				<tr><td colspan=\"2\">marquee (light)</td></tr>\
				<tr><td>a</td><td>b</td></tr>\
				<tr><td colspan=\"2\">c</td></tr>\
			</table>"
		);
	}

	#[test]
	fn block_table_block_is_identity() {
		let original = block("marquee light", &[&["a", "b"], &["c", "d"]]);
		let roundtripped = table_to_div(&div_to_table(&original));
		assert_eq!(original, roundtripped);
	}

	#[test]
	fn table_block_table_is_identity() {
		let table = div_to_table(&block("columns wide", &[&["x"], &["y", "z"]]));
		let again = div_to_table(&table_to_div(&table));
		assert_eq!(table, again);
	}

	#[test]
	fn carries_data_id_and_diff_marker() {
		let mut el = block("hero", &[&["x"]]);
		el.set_attr("data-id", "b1");
		el.set_attr("da-diff-added", "");
		let table = div_to_table(&el);
		assert_eq!(table.attr("data-id"), Some("b1"));
		assert_eq!(table.attr("da-diff-added"), Some(""));
		let back = table_to_div(&table);
		assert_eq!(back.attr("data-id"), Some("b1"));
		assert_eq!(back.attr("da-diff-added"), Some(""));
	}

	#[test]
	fn reads_rows_from_tbody() {
		let table = div_to_table(&block("hero", &[&["x"]]));
		let mut wrapped = Element::new("table");
		let mut tbody = Element::new("tbody");
		tbody.children = table.children.clone();
		wrapped.children.push(Node::Element(tbody));
		let back = table_to_div(&wrapped);
		assert_eq!(back.attr("class"), Some("hero"));
		assert_eq!(back.children.len(), 1);
	}
}

// vim: ts=4
