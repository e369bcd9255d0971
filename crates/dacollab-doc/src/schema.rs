//! Document schema
//!
//! Names of the structured node kinds stored in the CRDT XML fragment and
//! the inline marks carried as text attributes, plus the shared mark-set
//! type both converter directions use.

use std::collections::HashMap;
use std::sync::Arc;

use yrs::types::Attrs;
use yrs::Any;

// Node kind names inside the XML fragment.
pub const PARAGRAPH: &str = "paragraph";
pub const HEADING: &str = "heading";
pub const BULLET_LIST: &str = "bullet_list";
pub const ORDERED_LIST: &str = "ordered_list";
pub const LIST_ITEM: &str = "list_item";
pub const BLOCKQUOTE: &str = "blockquote";
pub const CODE_BLOCK: &str = "code_block";
pub const HORIZONTAL_RULE: &str = "horizontal_rule";
pub const IMAGE: &str = "image";
pub const HARD_BREAK: &str = "hard_break";
pub const TABLE: &str = "table";
pub const TABLE_ROW: &str = "table_row";
pub const TABLE_CELL: &str = "table_cell";
pub const DIFF_ADDED: &str = "da_diff_added";
pub const DIFF_DELETED: &str = "da_diff_deleted";

/// Attribute carrying the heading level on [`HEADING`] nodes.
pub const LEVEL_ATTR: &str = "level";

// Mark attribute keys on text segments.
pub const MARK_STRONG: &str = "strong";
pub const MARK_EM: &str = "em";
pub const MARK_UNDERLINE: &str = "u";
pub const MARK_STRIKE: &str = "s";
pub const MARK_SUP: &str = "sup";
pub const MARK_SUB: &str = "sub";
pub const MARK_CODE: &str = "code";
pub const MARK_LINK: &str = "link";
pub const MARK_LINK_TITLE: &str = "link_title";

/// Nesting order of mark tags in emitted HTML, outermost first.
pub const MARK_ORDER: &[&str] = &[
	MARK_LINK,
	MARK_STRONG,
	MARK_EM,
	MARK_UNDERLINE,
	MARK_STRIKE,
	MARK_SUP,
	MARK_SUB,
	MARK_CODE,
];

/// A link mark's payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Link {
	pub href: String,
	pub title: Option<String>,
}

/// The set of marks active on a text segment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Marks {
	pub strong: bool,
	pub em: bool,
	pub underline: bool,
	pub strike: bool,
	pub sup: bool,
	pub sub: bool,
	pub code: bool,
	pub link: Option<Link>,
}

impl Marks {
	pub fn is_empty(&self) -> bool {
		!(self.strong
			|| self.em
			|| self.underline
			|| self.strike
			|| self.sup
			|| self.sub
			|| self.code)
			&& self.link.is_none()
	}

	pub fn has(&self, mark: &str) -> bool {
		match mark {
			MARK_STRONG => self.strong,
			MARK_EM => self.em,
			MARK_UNDERLINE => self.underline,
			MARK_STRIKE => self.strike,
			MARK_SUP => self.sup,
			MARK_SUB => self.sub,
			MARK_CODE => self.code,
			MARK_LINK => self.link.is_some(),
			_ => false,
		}
	}

	pub fn clear(&mut self, mark: &str) {
		match mark {
			MARK_STRONG => self.strong = false,
			MARK_EM => self.em = false,
			MARK_UNDERLINE => self.underline = false,
			MARK_STRIKE => self.strike = false,
			MARK_SUP => self.sup = false,
			MARK_SUB => self.sub = false,
			MARK_CODE => self.code = false,
			MARK_LINK => self.link = None,
			_ => {}
		}
	}

	/// Encode the mark set as text attributes for the CRDT.
	pub fn to_attrs(&self) -> Attrs {
		let mut attrs: Attrs = HashMap::new();
		let on = [
			(MARK_STRONG, self.strong),
			(MARK_EM, self.em),
			(MARK_UNDERLINE, self.underline),
			(MARK_STRIKE, self.strike),
			(MARK_SUP, self.sup),
			(MARK_SUB, self.sub),
			(MARK_CODE, self.code),
		];
		for (key, set) in on {
			if set {
				attrs.insert(Arc::from(key), Any::from(true));
			}
		}
		if let Some(link) = &self.link {
			attrs.insert(Arc::from(MARK_LINK), Any::from(link.href.clone()));
			if let Some(title) = &link.title {
				attrs.insert(Arc::from(MARK_LINK_TITLE), Any::from(title.clone()));
			}
		}
		attrs
	}

	/// Decode a text segment's attributes back into a mark set.
	pub fn from_attrs(attrs: Option<&Attrs>) -> Marks {
		let mut marks = Marks::default();
		let Some(attrs) = attrs else {
			return marks;
		};
		let truthy = |value: &Any| !matches!(value, Any::Null | Any::Undefined | Any::Bool(false));
		for (key, value) in attrs.iter() {
			if !truthy(value) {
				continue;
			}
			match key.as_ref() {
				MARK_STRONG => marks.strong = true,
				MARK_EM => marks.em = true,
				MARK_UNDERLINE => marks.underline = true,
				MARK_STRIKE => marks.strike = true,
				MARK_SUP => marks.sup = true,
				MARK_SUB => marks.sub = true,
				MARK_CODE => marks.code = true,
				MARK_LINK => {
					let href = any_to_string(value);
					let title = marks.link.take().and_then(|l| l.title);
					marks.link = Some(Link { href, title });
				}
				MARK_LINK_TITLE => {
					let title = Some(any_to_string(value));
					match &mut marks.link {
						Some(link) => link.title = title,
						None => marks.link = Some(Link { href: String::new(), title }),
					}
				}
				_ => {}
			}
		}
		marks
	}
}

/// Render an `Any` attribute value as its plain string form.
pub fn any_to_string(value: &Any) -> String {
	match value {
		Any::String(s) => s.to_string(),
		other => other.to_string(),
	}
}

/// Heading tag for a level, clamped to h1-h6.
pub fn heading_tag(level: u8) -> &'static str {
	match level {
		1 => "h1",
		2 => "h2",
		3 => "h3",
		4 => "h4",
		5 => "h5",
		_ => "h6",
	}
}

/// Heading level of an `hN` tag, if it is one.
pub fn heading_level(tag: &str) -> Option<u8> {
	match tag {
		"h1" => Some(1),
		"h2" => Some(2),
		"h3" => Some(3),
		"h4" => Some(4),
		"h5" => Some(5),
		"h6" => Some(6),
		_ => None,
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn marks_roundtrip_through_attrs() {
		let marks = Marks {
			strong: true,
			code: true,
			link: Some(Link { href: "https://x.test/".into(), title: Some("t".into()) }),
			..Marks::default()
		};
		let attrs = marks.to_attrs();
		let back = Marks::from_attrs(Some(&attrs));
		assert_eq!(marks, back);
	}

	#[test]
	fn empty_marks_produce_no_attrs() {
		assert!(Marks::default().to_attrs().is_empty());
		assert!(Marks::from_attrs(None).is_empty());
	}

	#[test]
	fn heading_levels_map_both_ways() {
		assert_eq!(heading_tag(2), "h2");
		assert_eq!(heading_level("h2"), Some(2));
		assert_eq!(heading_level("p"), None);
	}
}

// vim: ts=4
