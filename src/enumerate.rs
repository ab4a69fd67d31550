//! Deterministic work queue enumeration.
//!
//! The queue is the cartesian product of (entities × years × variants) in a
//! fixed order: entity-major, then year ascending, then variant in declared
//! order. It is never materialized; items are computed from their offset,
//! which gives resume O(1) random access and guarantees that offset `k`
//! addresses the same item in every run with identical inputs.

use crate::{Entity, ReportVariant};

/// One (entity, year, variant) unit of fetch-and-match work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    /// The company to query
    pub entity: Entity,
    /// Business year
    pub year: i32,
    /// Report variant
    pub variant: ReportVariant,
}

/// The full ordered work sequence for one job.
#[derive(Debug, Clone)]
pub struct WorkQueue {
    entities: Vec<Entity>,
    years: Vec<i32>,
    variants: Vec<ReportVariant>,
}

impl WorkQueue {
    /// Build the queue from filtered entities, an inclusive year range, and
    /// the selected variants.
    ///
    /// An inverted year range or an empty entity/variant selection yields an
    /// empty queue, which is valid: the job completes immediately.
    pub fn build(
        entities: Vec<Entity>,
        year_start: i32,
        year_end: i32,
        variants: &[ReportVariant],
    ) -> Self {
        let years = if year_end < year_start {
            Vec::new()
        } else {
            (year_start..=year_end).collect()
        };
        Self {
            entities,
            years,
            variants: variants.to_vec(),
        }
    }

    /// Total number of work items.
    pub fn len(&self) -> usize {
        self.entities.len() * self.years.len() * self.variants.len()
    }

    /// Whether the queue holds no items.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The item at `offset`, or `None` past the end.
    ///
    /// Stable across calls and across process restarts for identical inputs.
    pub fn get(&self, offset: usize) -> Option<WorkItem> {
        if offset >= self.len() {
            return None;
        }
        let per_entity = self.years.len() * self.variants.len();
        let entity_idx = offset / per_entity;
        let rem = offset % per_entity;
        let year_idx = rem / self.variants.len();
        let variant_idx = rem % self.variants.len();
        Some(WorkItem {
            entity: self.entities[entity_idx].clone(),
            year: self.years[year_idx],
            variant: self.variants[variant_idx],
        })
    }

    /// Iterate `(offset, item)` pairs starting at `offset`.
    pub fn iter_from(&self, offset: usize) -> impl Iterator<Item = (usize, WorkItem)> + '_ {
        (offset..self.len()).map(|k| (k, self.get(k).expect("offset bounded by len")))
    }
}
