//! Route units and the routing entry point.

pub mod broadcast;
pub mod engine;
pub mod readwrite;
pub mod shadow;
pub mod single;
pub mod standard;

pub use engine::{classify, classify_tables, BroadcastScope, RouteCategory, Router};

use std::collections::HashSet;
use std::fmt;

use smallvec::SmallVec;

use crate::error::{Error, Result};
use crate::names::{eq_ignore_case, normalize};

/// Logical name and the actual name it resolves to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RouteMapper {
    pub logic_name: String,
    pub actual_name: String,
}

impl RouteMapper {
    pub fn new(logic_name: impl Into<String>, actual_name: impl Into<String>) -> Self {
        Self {
            logic_name: logic_name.into(),
            actual_name: actual_name.into(),
        }
    }

    /// Mapper whose actual name equals the logical name.
    pub fn identity(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            logic_name: name.clone(),
            actual_name: name,
        }
    }
}

/// One physical execution target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteUnit {
    pub data_source_mapper: RouteMapper,
    pub table_mappers: SmallVec<[RouteMapper; 2]>,
}

impl RouteUnit {
    pub fn new(
        data_source_mapper: RouteMapper,
        table_mappers: impl IntoIterator<Item = RouteMapper>,
    ) -> Self {
        Self {
            data_source_mapper,
            table_mappers: table_mappers.into_iter().collect(),
        }
    }

    pub fn data_source(&self) -> &str {
        &self.data_source_mapper.actual_name
    }

    pub fn logic_data_source(&self) -> &str {
        &self.data_source_mapper.logic_name
    }

    /// Actual table for `logic_table`, if the unit maps it.
    pub fn actual_table(&self, logic_table: &str) -> Option<&str> {
        self.table_mappers
            .iter()
            .find(|m| eq_ignore_case(&m.logic_name, logic_table))
            .map(|m| m.actual_name.as_str())
    }

    fn key(&self) -> String {
        let mut key = normalize(&self.data_source_mapper.actual_name);
        for mapper in &self.table_mappers {
            key.push('|');
            key.push_str(&normalize(&mapper.logic_name));
            key.push('=');
            key.push_str(&normalize(&mapper.actual_name));
        }
        key
    }
}

impl fmt::Display for RouteUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.data_source_mapper.actual_name)?;
        for (i, mapper) in self.table_mappers.iter().enumerate() {
            let sep = if i == 0 { ':' } else { ',' };
            write!(f, "{}{}", sep, mapper.actual_name)?;
        }
        Ok(())
    }
}

/// Accumulates units for one `route()` call; duplicates are dropped and
/// insertion order is kept.
#[derive(Debug, Default)]
pub struct RouteContextBuilder {
    units: Vec<RouteUnit>,
    keys: HashSet<String>,
}

impl RouteContextBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, unit: RouteUnit) -> bool {
        if self.keys.insert(unit.key()) {
            self.units.push(unit);
            true
        } else {
            false
        }
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Freezes the context. Zero units is an unroutable statement.
    pub fn build(self, category: RouteCategory, tables: &[String]) -> Result<RouteContext> {
        if self.units.is_empty() {
            return Err(Error::Unroutable {
                tables: tables.to_vec(),
            });
        }
        Ok(RouteContext {
            units: self.units,
            category,
        })
    }
}

/// Frozen routing result of one statement.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteContext {
    units: Vec<RouteUnit>,
    category: RouteCategory,
}

impl RouteContext {
    pub fn units(&self) -> &[RouteUnit] {
        &self.units
    }

    pub fn category(&self) -> &RouteCategory {
        &self.category
    }

    pub fn is_single_routing(&self) -> bool {
        self.units.len() == 1
    }

    /// Distinct actual data sources in unit order.
    pub fn data_source_names(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.units
            .iter()
            .map(RouteUnit::data_source)
            .filter(|ds| seen.insert(normalize(ds)))
            .collect()
    }

    /// Rebuilds the context with every data source mapper passed through `map`.
    pub fn map_data_sources<F>(self, category: RouteCategory, mut map: F) -> Result<RouteContext>
    where
        F: FnMut(&RouteMapper) -> Result<RouteMapper>,
    {
        let mut builder = RouteContextBuilder::new();
        let tables: Vec<String> = self
            .units
            .iter()
            .flat_map(|u| u.table_mappers.iter().map(|m| m.logic_name.clone()))
            .collect();
        for unit in self.units {
            let data_source_mapper = map(&unit.data_source_mapper)?;
            builder.push(RouteUnit {
                data_source_mapper,
                table_mappers: unit.table_mappers,
            });
        }
        builder.build(category, &tables)
    }
}
