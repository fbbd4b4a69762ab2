//! Append-only string pool.
//!
//! Strings are stored NUL-terminated one after another and referred to by
//! their byte offset. Offset 0 always holds the empty string, so a zero
//! offset in a record means "no string".

use ahash::AHashMap;

use crate::{Error, Result};

/// Builds the string pool section, interning every string once.
#[derive(Debug, Clone)]
pub struct StringPoolBuilder {
    data: Vec<u8>,
    offsets: AHashMap<String, u32>,
}

impl Default for StringPoolBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl StringPoolBuilder {
    pub fn new() -> Self {
        Self {
            data: vec![0],
            offsets: AHashMap::new(),
        }
    }

    /// Add `s` and return its offset. Strings already in the pool are not
    /// stored again; the empty string is always at offset 0.
    ///
    /// Interior NUL bytes would truncate the string on read and are rejected.
    pub fn add(&mut self, s: &str) -> Result<u32> {
        if s.is_empty() {
            return Ok(0);
        }
        if let Some(offset) = self.offsets.get(s) {
            return Ok(*offset);
        }
        if s.as_bytes().contains(&0) {
            return Err(Error::Config(format!("string contains a NUL byte: {:?}", s)));
        }

        let offset = u32::try_from(self.data.len())
            .map_err(|_| Error::SectionOverflow("string pool"))?;
        if self.data.len() + s.len() + 1 > u32::MAX as usize {
            return Err(Error::SectionOverflow("string pool"));
        }
        self.data.extend_from_slice(s.as_bytes());
        self.data.push(0);
        self.offsets.insert(s.to_string(), offset);
        Ok(offset)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.len() <= 1
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}

/// Read-only view over a string pool section.
#[derive(Debug, Clone, Copy)]
pub struct StringPool<'a> {
    data: &'a [u8],
}

impl<'a> StringPool<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    /// Get the string starting at `offset`.
    pub fn get(&self, offset: u32) -> Result<&'a str> {
        let start = offset as usize;
        if start == 0 && self.data.is_empty() {
            return Ok("");
        }
        let tail = self.data.get(start..).ok_or_else(|| {
            Error::corrupt_section("string pool", format!("offset {} out of range", offset))
        })?;
        let end = tail.iter().position(|b| *b == 0).ok_or_else(|| {
            Error::corrupt_section("string pool", format!("string at {} is not terminated", offset))
        })?;
        std::str::from_utf8(&tail[..end]).map_err(|_| {
            Error::corrupt_section("string pool", format!("string at {} is not UTF-8", offset))
        })
    }

    /// Iterate over `(offset, string)` pairs, skipping the leading empty string.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &'a str)> + 'a {
        let data = self.data;
        let mut offset = 0usize;
        std::iter::from_fn(move || {
            while offset < data.len() {
                let start = offset;
                let end = data[start..].iter().position(|b| *b == 0)? + start;
                offset = end + 1;
                if end > start {
                    let s = std::str::from_utf8(&data[start..end]).ok()?;
                    return Some((start as u32, s));
                }
            }
            None
        })
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
