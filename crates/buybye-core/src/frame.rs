//! Binding environments ("frames") and ordered frame-sets.
//!
//! A frame maps rule-local variables to values and remembers which log
//! entries it was joined from. Within a frame a variable has exactly one
//! value; across the frames of a set it may differ.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::log::OccurrenceId;
use crate::value::{Record, Value};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Var(String);

impl Var {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Var {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for Var {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for Var {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Frame
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frame {
    bindings: BTreeMap<Var, Value>,
    provenance: BTreeSet<OccurrenceId>,
}

impl Frame {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, var: &Var) -> Option<&Value> {
        self.bindings.get(var)
    }

    /// Lookup by name, for predicates written against literal names.
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.bindings.get(&Var::from(name))
    }

    pub fn is_bound(&self, var: &Var) -> bool {
        self.bindings.contains_key(var)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn bindings(&self) -> impl Iterator<Item = (&Var, &Value)> {
        self.bindings.iter()
    }

    /// Unify `var` with `value` in place. Fails (returns `false`, frame
    /// untouched) when `var` is already bound to something else.
    pub fn unify(&mut self, var: &Var, value: &Value) -> bool {
        match self.bindings.get(var) {
            Some(existing) => existing == value,
            None => {
                self.bindings.insert(var.clone(), value.clone());
                true
            }
        }
    }

    /// Non-mutating [`unify`](Self::unify).
    pub fn bind(&self, var: &Var, value: &Value) -> Option<Frame> {
        let mut next = self.clone();
        next.unify(var, value).then_some(next)
    }

    pub fn provenance(&self) -> &BTreeSet<OccurrenceId> {
        &self.provenance
    }

    pub fn with_occurrence(mut self, id: OccurrenceId) -> Self {
        self.provenance.insert(id);
        self
    }

    /// Bindings as a record keyed by variable name.
    pub fn to_record(&self) -> Record {
        self.bindings
            .iter()
            .map(|(k, v)| (k.0.clone(), v.clone()))
            .collect()
    }

    fn bindings_except(&self, excluded: &[&Var]) -> BTreeMap<Var, Value> {
        self.bindings
            .iter()
            .filter(|(k, _)| !excluded.contains(k))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Frames
// ---------------------------------------------------------------------------

/// Ordered set of alternative solutions (rows of a join).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frames(Vec<Frame>);

impl Frames {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn single(frame: Frame) -> Self {
        Self(vec![frame])
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn push(&mut self, frame: Frame) {
        self.0.push(frame);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Frame> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[Frame] {
        &self.0
    }

    pub fn filter(self, mut keep: impl FnMut(&Frame) -> bool) -> Frames {
        self.0.into_iter().filter(|f| keep(f)).collect()
    }

    /// Group-by + array aggregation.
    ///
    /// Frames that agree on every binding other than `fields` (and `into`)
    /// collapse into one frame whose `into` holds the list of their `fields`
    /// values, in input order. With a single field the list holds bare
    /// values; with several, each element is an object keyed by field name.
    /// A frame missing any of `fields` joins its group but adds no element.
    /// Groups appear in order of first occurrence. Provenance is merged.
    pub fn collect_as(&self, fields: &[Var], into: &Var) -> Frames {
        let mut excluded: Vec<&Var> = fields.iter().collect();
        excluded.push(into);

        let mut groups: Vec<(BTreeMap<Var, Value>, Vec<Value>, BTreeSet<OccurrenceId>)> =
            Vec::new();

        for frame in &self.0 {
            let key = frame.bindings_except(&excluded);
            let element = match fields {
                [single] => frame.get(single).cloned(),
                _ => fields
                    .iter()
                    .map(|f| frame.get(f).map(|v| (f.0.clone(), v.clone())))
                    .collect::<Option<Record>>()
                    .map(Value::Object),
            };

            let idx = match groups.iter().position(|(k, _, _)| *k == key) {
                Some(i) => i,
                None => {
                    groups.push((key, Vec::new(), BTreeSet::new()));
                    groups.len() - 1
                }
            };
            let group = &mut groups[idx];
            if let Some(v) = element {
                group.1.push(v);
            }
            group.2.extend(frame.provenance.iter().copied());
        }

        groups
            .into_iter()
            .map(|(mut bindings, values, provenance)| {
                bindings.insert(into.clone(), Value::Array(values));
                Frame {
                    bindings,
                    provenance,
                }
            })
            .collect()
    }
}

impl FromIterator<Frame> for Frames {
    fn from_iter<I: IntoIterator<Item = Frame>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for Frames {
    type Item = Frame;
    type IntoIter = std::vec::IntoIter<Frame>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Frames {
    type Item = &'a Frame;
    type IntoIter = std::slice::Iter<'a, Frame>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl Extend<Frame> for Frames {
    fn extend<I: IntoIterator<Item = Frame>>(&mut self, iter: I) {
        self.0.extend(iter);
    }
}
