//! Key-convention translation between caller-facing values and wire payloads.
//!
//! Callers spell object keys with medial capitals (`helperType`) while the backend speaks
//! underscore-separated keys (`helper_type`). [`to_convention`] rewrites every object key in a
//! [`Value`] tree for the requested [`Direction`]; string values, numbers, and booleans are never
//! touched.

// self
use crate::_prelude::*;

/// Translation direction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
	/// Caller convention to wire convention (`wordWord` → `word_word`).
	Outbound,
	/// Wire convention to caller convention (`word_word` → `wordWord`).
	Inbound,
}
impl Direction {
	/// Rewrites a single object key for this direction.
	pub fn rewrite_key(self, key: &str) -> String {
		match self {
			Direction::Outbound => snake_key(key),
			Direction::Inbound => camel_key(key),
		}
	}
}

/// Recursively rewrites every object key in `value` for `direction`.
pub fn to_convention(value: Value, direction: Direction) -> Value {
	match value {
		Value::Array(items) =>
			Value::Array(items.into_iter().map(|item| to_convention(item, direction)).collect()),
		Value::Object(fields) => Value::Object(
			fields
				.into_iter()
				.map(|(key, value)| (direction.rewrite_key(&key), to_convention(value, direction)))
				.collect(),
		),
		other => other,
	}
}

/// Shorthand for [`to_convention`] with [`Direction::Outbound`].
pub fn to_wire(value: Value) -> Value {
	to_convention(value, Direction::Outbound)
}

/// Shorthand for [`to_convention`] with [`Direction::Inbound`].
pub fn from_wire(value: Value) -> Value {
	to_convention(value, Direction::Inbound)
}

/// Inserts `_` before each ASCII uppercase letter and lowercases it.
pub fn snake_key(key: &str) -> String {
	let mut buf = String::with_capacity(key.len() + 4);

	for ch in key.chars() {
		if ch.is_ascii_uppercase() {
			buf.push('_');
			buf.push(ch.to_ascii_lowercase());
		} else {
			buf.push(ch);
		}
	}

	buf
}

/// Drops each `_` that precedes an ASCII lowercase letter and uppercases that letter.
///
/// Underscores followed by anything else (digits, another underscore, end of key) are kept.
pub fn camel_key(key: &str) -> String {
	let mut buf = String::with_capacity(key.len());
	let mut chars = key.chars().peekable();

	while let Some(ch) = chars.next() {
		match (ch, chars.peek().copied()) {
			('_', Some(next)) if next.is_ascii_lowercase() => {
				chars.next();
				buf.push(next.to_ascii_uppercase());
			},
			_ => buf.push(ch),
		}
	}

	buf
}
