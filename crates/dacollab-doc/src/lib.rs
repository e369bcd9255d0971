//! HTML ⇄ CRDT document converter
//!
//! Translates authored HTML into the structured document stored in the
//! CRDT's `prosemirror` XML fragment and back. The conversion is lossless
//! up to documented normalizations, and HTML produced by [`render_html`]
//! roundtrips byte-identically (modulo whitespace between tags).
//!
//! Pipeline in: lax parse → transform passes (metadata extraction, diff
//! wrapping, link/image hoisting, block→table, section split) →
//! schema-guided parse into the fragment.
//!
//! Pipeline out: schema-directed read → emission passes (table→block,
//! diff unwrap, section join, image/list emission rules) → serializer.

use yrs::{Doc, Map, ReadTxn, Transact};

use dacollab_types::prelude::*;

pub mod blocks;
pub mod from_doc;
pub mod parse;
pub mod schema;
pub mod to_doc;
pub mod transform;
pub mod tree;

use tree::Node;

/// Root slot holding the structured document fragment.
pub const PROSEMIRROR_SLOT: &str = "prosemirror";

/// Root map slot holding document-level metadata.
pub const METADATA_SLOT: &str = "daMetadata";

/// Root map slot used to surface server-side errors to clients.
pub const ERROR_SLOT: &str = "error";

/// Canonical empty document body, substituted for empty or missing input.
pub const EMPTY_BODY: &str =
	"<body><header></header><main><div></div></main><footer></footer></body>";

/// Run the inbound transform passes over an HTML string, yielding the
/// flattened section content and the extracted metadata entries.
fn html_to_flat(html: &str) -> (Vec<Node>, Vec<(String, String)>) {
	let html = parse::fix_legacy_tags(html);
	let body = parse::parse_html(&html);
	let mut main = transform::take_main(body);
	let metadata = transform::extract_metadata(&mut main);
	transform::wrap_diff_attrs(&mut main);
	transform::hoist_link_images(&mut main);
	transform::strip_comments(&mut main);
	transform::convert_blocks(&mut main);
	transform::detect_section_breaks(&mut main);
	(transform::split_sections(main), metadata)
}

fn effective_html(html: Option<&str>) -> &str {
	match html {
		Some(h) if !h.trim().is_empty() => h,
		_ => EMPTY_BODY,
	}
}

/// Parse authored HTML into the document.
///
/// Empty or missing input is replaced by [`EMPTY_BODY`]. The structured
/// content lands in the `prosemirror` fragment and metadata entries in the
/// `daMetadata` map; existing content is appended to, so callers seeding a
/// non-empty document should use [`rebuild_from_html`].
pub fn apply_html(doc: &Doc, html: Option<&str>) -> DaResult<()> {
	let (flat, metadata) = html_to_flat(effective_html(html));

	let frag = doc.get_or_insert_xml_fragment(PROSEMIRROR_SLOT);
	let meta_map = doc.get_or_insert_map(METADATA_SLOT);
	let mut txn = doc.transact_mut();
	to_doc::build_fragment(&mut txn, &frag, &flat);
	for (key, value) in metadata {
		meta_map.insert(&mut txn, key, value);
	}
	Ok(())
}

/// Clear the document and re-parse the given HTML, in one transaction.
///
/// Used by the persistence binder's delayed rebuild: the fragment and
/// every root map slot are emptied before the authoritative HTML is
/// applied, so clients observe the swap as a single update.
pub fn rebuild_from_html(doc: &Doc, html: Option<&str>) -> DaResult<()> {
	use yrs::types::xml::XmlFragment;

	let (flat, metadata) = html_to_flat(effective_html(html));

	let frag = doc.get_or_insert_xml_fragment(PROSEMIRROR_SLOT);
	let meta_map = doc.get_or_insert_map(METADATA_SLOT);
	let error_map = doc.get_or_insert_map(ERROR_SLOT);
	let mut txn = doc.transact_mut();

	let len = frag.len(&txn);
	if len > 0 {
		frag.remove_range(&mut txn, 0, len);
	}
	for map in [&meta_map, &error_map] {
		let keys: Vec<String> = map.iter(&txn).map(|(key, _)| key.to_string()).collect();
		for key in keys {
			map.remove(&mut txn, &key);
		}
	}

	to_doc::build_fragment(&mut txn, &frag, &flat);
	for (key, value) in metadata {
		meta_map.insert(&mut txn, key, value);
	}
	Ok(())
}

/// Serialize the document back to HTML.
pub fn render_html(doc: &Doc) -> String {
	let txn = doc.transact();
	let blocks = txn
		.get_xml_fragment(PROSEMIRROR_SLOT)
		.map(|frag| from_doc::read_blocks(&txn, &frag))
		.unwrap_or_default();
	let metadata = read_metadata(&txn);
	from_doc::emit_body(blocks, &metadata)
}

fn read_metadata<T: ReadTxn>(txn: &T) -> Vec<(String, String)> {
	let Some(map) = txn.get_map(METADATA_SLOT) else {
		return Vec::new();
	};
	let mut entries: Vec<(String, String)> = map
		.iter(txn)
		.map(|(key, value)| (key.to_string(), schema::any_to_string(&out_to_any(value, txn))))
		.collect();
	entries.sort();
	entries
}

fn out_to_any<T: ReadTxn>(out: yrs::Out, txn: &T) -> yrs::Any {
	match out {
		yrs::Out::Any(any) => any,
		other => yrs::Any::from(other.to_string(txn)),
	}
}

/// Convert an HTML string through a throwaway document and back,
/// normalizing it to the serializer's canonical form.
pub fn normalize_html(html: &str) -> DaResult<String> {
	let doc = Doc::new();
	apply_html(&doc, Some(html))?;
	Ok(render_html(&doc))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn empty_input_yields_canonical_body() {
		let doc = Doc::new();
		apply_html(&doc, None).unwrap();
		assert_eq!(render_html(&doc), EMPTY_BODY);

		let doc = Doc::new();
		apply_html(&doc, Some("")).unwrap();
		assert_eq!(render_html(&doc), EMPTY_BODY);
	}

	#[test]
	fn simple_paragraph_roundtrips() {
		let html = "<body><header></header><main><div><p>Hi</p></div></main><footer></footer></body>";
		assert_eq!(normalize_html(html).unwrap(), html);
	}

	#[test]
	fn metadata_survives_roundtrip() {
		let html = "<body><header></header><main><div><p>x</p></div>\
			<div class=\"da-metadata\"><div><div>template</div><div>blog</div></div></div>\
			</main><footer></footer></body>";
		let normalized = normalize_html(html).unwrap();
		assert!(normalized.contains("<div class=\"da-metadata\">"));
		assert!(normalized.contains("<div>template</div><div>blog</div>"));
		// Stable under a second pass.
		assert_eq!(normalize_html(&normalized).unwrap(), normalized);
	}

	#[test]
	fn rebuild_replaces_content() {
		let doc = Doc::new();
		apply_html(&doc, Some("<body><main><div><p>old</p></div></main></body>")).unwrap();
		rebuild_from_html(&doc, Some("<body><main><div><p>new</p></div></main></body>")).unwrap();
		let html = render_html(&doc);
		assert!(html.contains("<p>new</p>"));
		assert!(!html.contains("old"));
	}
}

// vim: ts=4
