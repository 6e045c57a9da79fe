//! Named parameter table with override/merge semantics.
//!
//! Every entry carries two flags:
//! - `changed`: written since the last [`ParameterTable::clear_changed_flags`].
//! - `input`: declared as a rig input; only input parameters take part in the
//!   cross-entry pre-blend.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::ids::ParamId;
use crate::value::{blend_values, FromValue, Value};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParamEntry {
    pub value: Value,
    #[serde(default)]
    pub changed: bool,
    #[serde(default)]
    pub input: bool,
}

/// Which entries of the source table an override or blend touches.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OverrideFilter {
    /// Every entry.
    #[default]
    None,
    /// Entries flagged as rig inputs.
    InputOnly,
    /// Entries already present in the destination table.
    KnownOnly,
    /// Entries missing from the destination table.
    UnknownOnly,
    /// Entries flagged as changed.
    ChangedOnly,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterTable {
    entries: HashMap<ParamId, ParamEntry>,
}

impl ParameterTable {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    pub fn contains(&self, id: &ParamId) -> bool {
        self.entries.contains_key(id)
    }

    pub fn get(&self, id: &ParamId) -> Option<&Value> {
        self.entries.get(id).map(|e| &e.value)
    }

    pub fn entry(&self, id: &ParamId) -> Option<&ParamEntry> {
        self.entries.get(id)
    }

    /// Typed read; `None` when absent or of another kind.
    pub fn try_get<T: FromValue>(&self, id: &ParamId) -> Option<T> {
        self.get(id).and_then(T::from_value)
    }

    /// Write a value and flag it changed. Existing input flags are kept.
    pub fn set(&mut self, id: ParamId, value: impl Into<Value>) {
        let value = value.into();
        self.entries
            .entry(id)
            .and_modify(|e| {
                e.value = value.clone();
                e.changed = true;
            })
            .or_insert(ParamEntry {
                value,
                changed: true,
                input: false,
            });
    }

    /// Write a value flagged as a rig input.
    pub fn set_input(&mut self, id: ParamId, value: impl Into<Value>) {
        self.entries.insert(
            id,
            ParamEntry {
                value: value.into(),
                changed: true,
                input: true,
            },
        );
    }

    pub fn remove(&mut self, id: &ParamId) -> Option<Value> {
        self.entries.remove(id).map(|e| e.value)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ParamId, &ParamEntry)> {
        self.entries.iter()
    }

    pub fn ids(&self) -> impl Iterator<Item = &ParamId> {
        self.entries.keys()
    }

    pub fn clear_changed_flags(&mut self) {
        for e in self.entries.values_mut() {
            e.changed = false;
        }
    }

    fn passes(&self, id: &ParamId, entry: &ParamEntry, filter: OverrideFilter) -> bool {
        match filter {
            OverrideFilter::None => true,
            OverrideFilter::InputOnly => entry.input,
            OverrideFilter::KnownOnly => self.entries.contains_key(id),
            OverrideFilter::UnknownOnly => !self.entries.contains_key(id),
            OverrideFilter::ChangedOnly => entry.changed,
        }
    }

    /// Copy every entry of `other` (or only its changed ones) over this table.
    pub fn override_all(&mut self, other: &ParameterTable, only_changed: bool) {
        let filter = if only_changed {
            OverrideFilter::ChangedOnly
        } else {
            OverrideFilter::None
        };
        self.override_with(other, filter);
    }

    /// Copy entries of `other` that pass `filter` over this table.
    pub fn override_with(&mut self, other: &ParameterTable, filter: OverrideFilter) {
        for (id, src) in other.entries.iter() {
            if !self.passes(id, src, filter) {
                continue;
            }
            match self.entries.get_mut(id) {
                Some(dst) => {
                    dst.value = src.value.clone();
                    dst.changed = src.changed;
                    dst.input |= src.input;
                }
                None => {
                    self.entries.insert(id.clone(), src.clone());
                }
            }
        }
    }

    /// Blend entries of `other` that pass `filter` into this table by `factor`.
    /// Entries missing here are copied outright, there is nothing to blend from.
    pub fn lerp(&mut self, other: &ParameterTable, factor: f32, filter: OverrideFilter) {
        for (id, src) in other.entries.iter() {
            if !self.passes(id, src, filter) {
                continue;
            }
            match self.entries.get_mut(id) {
                Some(dst) => {
                    dst.value = blend_values(&dst.value, &src.value, factor);
                    dst.changed |= src.changed;
                    dst.input |= src.input;
                }
                None => {
                    self.entries.insert(id.clone(), src.clone());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(pairs: &[(&str, f32)]) -> ParameterTable {
        let mut t = ParameterTable::new();
        for (k, v) in pairs {
            t.set(ParamId::from(*k), *v);
        }
        t
    }

    #[test]
    fn set_and_typed_get() {
        let mut t = ParameterTable::new();
        t.set(ParamId::from("fov"), 60.0f32);
        assert_eq!(t.try_get::<f32>(&ParamId::from("fov")), Some(60.0));
        assert_eq!(t.try_get::<bool>(&ParamId::from("fov")), None);
        assert_eq!(t.try_get::<f32>(&ParamId::from("missing")), None);
    }

    #[test]
    fn set_keeps_input_flag() {
        let mut t = ParameterTable::new();
        t.set_input(ParamId::from("dist"), 3.0f32);
        t.set(ParamId::from("dist"), 4.0f32);
        let e = t.entry(&ParamId::from("dist")).unwrap();
        assert!(e.input);
        assert_eq!(e.value, Value::Float(4.0));
    }

    #[test]
    fn known_only_override_skips_unknown_ids() {
        let mut dst = table(&[("a", 1.0)]);
        let src = table(&[("a", 5.0), ("b", 6.0)]);
        dst.override_with(&src, OverrideFilter::KnownOnly);
        assert_eq!(dst.get(&ParamId::from("a")), Some(&Value::Float(5.0)));
        assert!(!dst.contains(&ParamId::from("b")));
    }

    #[test]
    fn unknown_only_override_keeps_existing_values() {
        let src = table(&[("a", 5.0), ("b", 6.0)]);
        let mut dst = table(&[("a", 1.0)]);
        dst.override_with(&src, OverrideFilter::UnknownOnly);
        assert_eq!(dst.get(&ParamId::from("a")), Some(&Value::Float(1.0)));
        assert_eq!(dst.get(&ParamId::from("b")), Some(&Value::Float(6.0)));
    }

    #[test]
    fn changed_only_override_after_clearing_flags() {
        let mut src = table(&[("a", 5.0), ("b", 6.0)]);
        src.clear_changed_flags();
        src.set(ParamId::from("b"), 7.0f32);

        let mut dst = ParameterTable::new();
        dst.override_all(&src, true);
        assert!(!dst.contains(&ParamId::from("a")));
        assert_eq!(dst.get(&ParamId::from("b")), Some(&Value::Float(7.0)));
    }

    #[test]
    fn input_only_lerp_blends_inputs_only() {
        let mut src = ParameterTable::new();
        src.set_input(ParamId::from("dist"), 10.0f32);
        src.set(ParamId::from("private"), 10.0f32);

        let mut dst = table(&[("dist", 0.0), ("private", 0.0)]);
        dst.lerp(&src, 0.25, OverrideFilter::InputOnly);
        assert_eq!(dst.get(&ParamId::from("dist")), Some(&Value::Float(2.5)));
        assert_eq!(dst.get(&ParamId::from("private")), Some(&Value::Float(0.0)));
    }
}
