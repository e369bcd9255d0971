//! Roundtrip corpus for the HTML ⇄ document converter.
//!
//! The contract under test: for any HTML produced by the serializer,
//! parsing it back and serializing again yields byte-identical output.

use dacollab_doc::{apply_html, normalize_html, render_html, EMPTY_BODY};
use yrs::Doc;

fn body(main: &str) -> String {
	format!("<body><header></header><main>{}</main><footer></footer></body>", main)
}

/// Normalize once (authored form → canonical form), then assert the
/// canonical form is a fixed point.
fn assert_stable(html: &str) -> String {
	let once = normalize_html(html).unwrap();
	let twice = normalize_html(&once).unwrap();
	assert_eq!(once, twice, "serializer output must be a roundtrip fixed point");
	once
}

#[test]
fn canonical_forms_are_fixed_points() {
	let cases = [
		body("<div><p>Hi</p></div>"),
		body("<div><h1>Title</h1><p>Text with <strong>bold</strong> and <em>italics</em>.</p></div>"),
		body("<div><ul><li>one</li><li>two</li></ul><ol><li>first</li></ol></div>"),
		body("<div><blockquote><p>quoted</p></blockquote></div>"),
		body("<div><pre><code>let x = 1;</code></pre></div>"),
		body("<div><p>a<br/>b</p></div>"),
		body("<div><p><code>inline code</code> and <s>gone</s> and <u>kept</u></p></div>"),
		body("<div><p><sup>up</sup><sub>down</sub></p></div>"),
		body("<div><p><a href=\"https://x.test/\" title=\"t\">link</a></p></div>"),
		body("<div><p>first</p></div><div><p>second</p></div>"),
	];
	for case in cases {
		assert_eq!(assert_stable(&case), case);
	}
}

#[test]
fn empty_and_null_input_yield_canonical_empty_body() {
	let doc = Doc::new();
	apply_html(&doc, None).unwrap();
	assert_eq!(render_html(&doc), EMPTY_BODY);

	let doc = Doc::new();
	apply_html(&doc, Some("   ")).unwrap();
	assert_eq!(render_html(&doc), EMPTY_BODY);

	assert_eq!(assert_stable(EMPTY_BODY), EMPTY_BODY);
}

#[test]
fn regional_edit_roundtrip() {
	// End-to-end scenario: added paragraph followed by a deleted region.
	let html = body(
		"<div>\
			<p da-diff-added=\"\">New</p>\
			<da-diff-deleted data-mdast=\"ignore\"><p>Old</p></da-diff-deleted>\
		</div>",
	);
	assert_eq!(assert_stable(&html), html);
}

#[test]
fn legacy_loc_tags_are_renamed() {
	let html = body("<div><da-loc-deleted><p>Old</p></da-loc-deleted></div>");
	let normalized = assert_stable(&html);
	assert!(normalized.contains("<da-diff-deleted>"));
	assert!(!normalized.contains("da-loc-"));
}

#[test]
fn contenteditable_is_stripped_from_deleted_regions() {
	let html = body(
		"<div><da-diff-deleted contenteditable=\"false\"><p>Old</p></da-diff-deleted></div>",
	);
	let normalized = assert_stable(&html);
	assert!(!normalized.contains("contenteditable"));
}

#[test]
fn block_and_table_roundtrip() {
	// End-to-end scenario: a marquee block with two rows.
	let html = body(
		"<div>\
			<div class=\"marquee light\">\
				<div><div>A</div><div>B</div></div>\
				<div><div>C</div></div>\
			</div>\
		</div>",
	);
	let normalized = assert_stable(&html);
	assert_eq!(
		normalized,
		body(
			"<div>\
				<div class=\"marquee light\">\
					<div><div>A</div><div>B</div></div>\
					<div><div>C</div></div>\
				</div>\
			</div>"
		)
	);
}

#[test]
fn images_are_emitted_as_pictures() {
	let html = body("<div><p><img src=\"a.png\" alt=\"x\"></p></div>");
	let normalized = assert_stable(&html);
	assert_eq!(
		normalized,
		body(
			"<div>\
				<picture>\
					<source srcset=\"a.png\">\
					<source srcset=\"a.png\" media=\"(min-width: 600px)\">\
					<img loading=\"lazy\" src=\"a.png\" alt=\"x\">\
				</picture>\
			</div>"
		)
	);
}

#[test]
fn linked_images_hoist_href_back_to_anchor() {
	let html = body(
		"<div><p><a href=\"https://x.test/\" title=\"t\"><img src=\"a.png\"></a></p></div>",
	);
	let normalized = assert_stable(&html);
	assert_eq!(
		normalized,
		body(
			"<div>\
				<a href=\"https://x.test/\" title=\"t\">\
					<picture>\
						<source srcset=\"a.png\">\
						<source srcset=\"a.png\" media=\"(min-width: 600px)\">\
						<img loading=\"lazy\" src=\"a.png\">\
					</picture>\
				</a>\
			</div>"
		)
	);
}

#[test]
fn dash_dash_dash_becomes_a_section_break() {
	let html = body("<div><p>one</p><p>---</p><p>two</p></div>");
	let normalized = assert_stable(&html);
	assert_eq!(normalized, body("<div><p>one</p></div><div><p>two</p></div>"));
}

#[test]
fn sections_split_and_join() {
	let html = body("<div><p>one</p></div><div><p>two</p></div><div><p>three</p></div>");
	assert_eq!(assert_stable(&html), html);
}

#[test]
fn metadata_block_is_appended_last() {
	let html = body(
		"<div><p>content</p></div>\
		<div class=\"da-metadata\">\
			<div><div>template</div><div>blog</div></div>\
			<div><div>title</div><div>My Page</div></div>\
		</div>",
	);
	let normalized = assert_stable(&html);
	assert!(normalized.ends_with(
		"<div class=\"da-metadata\">\
			<div><div>template</div><div>blog</div></div>\
			<div><div>title</div><div>My Page</div></div>\
		</div></main><footer></footer></body>"
	));
}

#[test]
fn nested_marks_keep_canonical_nesting() {
	let html = body("<div><p><strong>b<em>bi</em></strong></p></div>");
	assert_eq!(assert_stable(&html), html);
}

#[test]
fn diffed_block_keeps_marker_through_table_form() {
	let html = body(
		"<div>\
			<div class=\"hero\" da-diff-added=\"\"><div><div>X</div></div></div>\
		</div>",
	);
	let normalized = assert_stable(&html);
	assert!(normalized.contains("<div class=\"hero\" da-diff-added=\"\">"));
}

#[test]
fn comments_are_stripped() {
	let html = body("<div><!-- hidden --><p>x</p></div>");
	assert_eq!(assert_stable(&html), body("<div><p>x</p></div>"));
}
