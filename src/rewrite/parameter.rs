use std::collections::BTreeMap;

use crate::route::RouteUnit;
use crate::value::Value;

use super::token::UnitFilter;

/// Original parameters plus the edits rewriting applies to them.
///
/// Replacements and removals apply to every unit. A filtered group mirrors an
/// IN list or the rows of an INSERT: each unit keeps the parameters of the
/// items routed to it, or all of them when none is, matching the SQL the
/// unit receives.
#[derive(Debug, Clone, Default)]
pub struct ParameterBuilder {
    original: Vec<Value>,
    replaced: BTreeMap<usize, Value>,
    removed: Vec<usize>,
    groups: Vec<Vec<(Vec<usize>, UnitFilter)>>,
    added: Vec<Value>,
}

impl ParameterBuilder {
    pub fn new(original: &[Value]) -> Self {
        Self {
            original: original.to_vec(),
            ..Default::default()
        }
    }

    pub fn original(&self) -> &[Value] {
        &self.original
    }

    /// Current value at `index`, with earlier replacements applied.
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.replaced.get(&index).or_else(|| self.original.get(index))
    }

    pub fn replace(&mut self, index: usize, value: Value) {
        self.replaced.insert(index, value);
    }

    pub fn remove(&mut self, index: usize) {
        if !self.removed.contains(&index) {
            self.removed.push(index);
        }
    }

    pub fn add(&mut self, value: Value) {
        self.added.push(value);
    }

    /// Registers per-item parameter indices with the filter of each item.
    pub fn add_filtered_group(&mut self, items: Vec<(Vec<usize>, UnitFilter)>) {
        if items.iter().any(|(indices, _)| !indices.is_empty()) {
            self.groups.push(items);
        }
    }

    fn dropped_for(&self, unit: &RouteUnit) -> Vec<usize> {
        let mut dropped = Vec::new();
        for group in &self.groups {
            if !group.iter().any(|(_, filter)| filter.accepts(unit)) {
                continue;
            }
            for (indices, filter) in group {
                if !filter.accepts(unit) {
                    dropped.extend(indices.iter().copied());
                }
            }
        }
        dropped
    }

    pub fn has_edits(&self) -> bool {
        !self.replaced.is_empty()
            || !self.removed.is_empty()
            || !self.groups.is_empty()
            || !self.added.is_empty()
    }

    /// Frozen parameter list for `unit`; `None` keeps every grouped parameter.
    pub fn build(&self, unit: Option<&RouteUnit>) -> Vec<Value> {
        let dropped = unit.map(|u| self.dropped_for(u)).unwrap_or_default();
        let mut result = Vec::with_capacity(self.original.len() + self.added.len());
        for (index, value) in self.original.iter().enumerate() {
            if self.removed.contains(&index) || dropped.contains(&index) {
                continue;
            }
            result.push(self.replaced.get(&index).unwrap_or(value).clone());
        }
        result.extend(self.added.iter().cloned());
        result
    }
}
