// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Deterministic byte encoding for AAD and signed payloads.
//!
//! Output never depends on serializer field ordering. Each encoding starts
//! with a domain tag, followed by named fields in the order the caller writes
//! them. Every field is `name_len || name || type_tag || value_len || value`
//! with big-endian `u32` lengths, so no two distinct field sequences can
//! produce the same bytes.

const TAG_STR: u8 = 0x01;
const TAG_U64: u8 = 0x02;
const TAG_I64: u8 = 0x03;
const TAG_BYTES: u8 = 0x04;
const TAG_NONE: u8 = 0x05;

#[derive(Debug, Clone)]
pub struct CanonicalEncoder {
	buf: Vec<u8>,
}

impl CanonicalEncoder {
	pub fn new(domain: &str) -> Self {
		let mut encoder = Self {
			buf: Vec::with_capacity(128),
		};
		encoder.put_len_prefixed(domain.as_bytes());
		encoder
	}

	pub fn str(mut self, name: &str, value: &str) -> Self {
		self.put_field(name, TAG_STR, value.as_bytes());
		self
	}

	pub fn u64(mut self, name: &str, value: u64) -> Self {
		self.put_field(name, TAG_U64, &value.to_be_bytes());
		self
	}

	pub fn i64(mut self, name: &str, value: i64) -> Self {
		self.put_field(name, TAG_I64, &value.to_be_bytes());
		self
	}

	pub fn bytes(mut self, name: &str, value: &[u8]) -> Self {
		self.put_field(name, TAG_BYTES, value);
		self
	}

	/// Absent values are encoded explicitly, distinct from an empty string.
	pub fn opt_str(mut self, name: &str, value: Option<&str>) -> Self {
		match value {
			Some(value) => self.put_field(name, TAG_STR, value.as_bytes()),
			None => self.put_field(name, TAG_NONE, &[]),
		}
		self
	}

	pub fn opt_i64(mut self, name: &str, value: Option<i64>) -> Self {
		match value {
			Some(value) => self.put_field(name, TAG_I64, &value.to_be_bytes()),
			None => self.put_field(name, TAG_NONE, &[]),
		}
		self
	}

	pub fn finish(self) -> Vec<u8> {
		self.buf
	}

	fn put_field(&mut self, name: &str, tag: u8, value: &[u8]) {
		self.put_len_prefixed(name.as_bytes());
		self.buf.push(tag);
		self.put_len_prefixed(value);
	}

	fn put_len_prefixed(&mut self, value: &[u8]) {
		self.buf.extend_from_slice(&(value.len() as u32).to_be_bytes());
		self.buf.extend_from_slice(value);
	}
}
