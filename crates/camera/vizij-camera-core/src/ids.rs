//! Identifiers and simple allocators for stack entries and parameters.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Unique id of one stack entry. Never reused within a stack's lifetime.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntryId(pub u32);

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "entry#{}", self.0)
    }
}

/// Name of a camera parameter (e.g. `"fov"`, `"boom_length"`).
#[derive(Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParamId(pub String);

impl ParamId {
    pub fn new(name: impl Into<String>) -> Self {
        ParamId(name.into())
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ParamId {
    fn from(name: &str) -> Self {
        ParamId(name.to_string())
    }
}

impl fmt::Display for ParamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Handle to a parameter setter slot. The serial detects reuse of a recycled slot.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct SetterHandle {
    pub index: u32,
    pub serial: u32,
}

/// Monotonic allocator for EntryId.
#[derive(Default, Debug)]
pub struct IdAllocator {
    next_entry: u32,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn alloc_entry(&mut self) -> EntryId {
        let id = EntryId(self.next_entry);
        self.next_entry = self.next_entry.wrapping_add(1);
        id
    }

    #[inline]
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_monotonic() {
        let mut alloc = IdAllocator::new();
        assert_eq!(alloc.alloc_entry(), EntryId(0));
        assert_eq!(alloc.alloc_entry(), EntryId(1));
        alloc.reset();
        assert_eq!(alloc.alloc_entry(), EntryId(0));
    }

    #[test]
    fn param_ids_compare_by_name() {
        assert_eq!(ParamId::from("fov"), ParamId::new(String::from("fov")));
        assert_eq!(ParamId::from("fov").to_string(), "fov");
    }
}
