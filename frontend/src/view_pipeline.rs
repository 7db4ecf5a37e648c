//! Pure derivation of the visible page from a collection.
//!
//! `derive` holds no state of its own: the same collection, view state,
//! group scope and busy map always produce the same page. Controllers call
//! it after every mutation and hand the result to the rendering sink.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;

use icu_collator::{Collator, CollatorOptions, Strength};
use log::warn;
use serde::Serialize;

use crate::busy::BusyTracker;
use crate::live_collection::{Entity, LiveCollection};

pub const DEFAULT_PAGE_SIZE: usize = 10;

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    #[default]
    Name,
    /// Busy, then active, then inactive; ties broken by name.
    Status,
    /// Collection order as stored.
    Insertion,
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortDir {
    #[default]
    Asc,
    Desc,
}

impl SortDir {
    pub fn toggled(self) -> Self {
        match self {
            SortDir::Asc => SortDir::Desc,
            SortDir::Desc => SortDir::Asc,
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ViewState {
    pub filter_query: String,
    pub sort_key: SortKey,
    pub sort_dir: SortDir,
    pub page_index: usize,
    pub page_size: usize,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            filter_query: String::new(),
            sort_key: SortKey::default(),
            sort_dir: SortDir::default(),
            page_index: 0,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// What makes an entity "active" for the status ranking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityRule {
    /// A boolean field such as `online`.
    BoolField(&'static str),
    /// A run status field that is queued or running.
    InFlightStatus(&'static str),
}

/// Which fields of an opaque entity the pipeline reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowSchema {
    /// Candidate name fields, first present wins. A dotted name reads one
    /// level into a sub-map (`job.name`).
    pub name_fields: Vec<&'static str>,
    pub activity: ActivityRule,
}

impl RowSchema {
    pub fn display_name<'a>(&self, entity: &'a Entity) -> &'a str {
        self.name_fields
            .iter()
            .find_map(|path| match path.split_once('.') {
                Some((map, field)) => entity
                    .field(map)
                    .and_then(|value| value.get(field))
                    .and_then(|value| value.as_str()),
                None => entity.str_field(path),
            })
            .unwrap_or("")
    }

    pub fn is_active(&self, entity: &Entity) -> bool {
        match self.activity {
            ActivityRule::BoolField(field) => entity.bool_field(field).unwrap_or(false),
            ActivityRule::InFlightStatus(field) => entity
                .str_field(field)
                .is_some_and(shared::is_in_flight_status),
        }
    }

    fn status_rank(&self, entity: &Entity, busy: &BusyTracker) -> u8 {
        if busy.is_busy(entity.key()).is_some() {
            2
        } else if self.is_active(entity) {
            1
        } else {
            0
        }
    }
}

/// Result of one derivation. `page_index` is already clamped.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedPage<'a> {
    pub rows: Vec<&'a Entity>,
    pub total: usize,
    pub page_index: usize,
    pub page_count: usize,
}

impl DerivedPage<'_> {
    pub fn range(&self, page_size: usize) -> PageRange {
        PageRange::new(self.page_index, page_size, self.total)
    }

    pub fn has_prev(&self) -> bool {
        self.page_index > 0
    }

    pub fn has_next(&self) -> bool {
        self.page_index + 1 < self.page_count
    }

    pub fn keys(&self) -> Vec<&str> {
        self.rows.iter().map(|entity| entity.key()).collect()
    }
}

pub fn page_count(total: usize, page_size: usize) -> usize {
    total.div_ceil(page_size.max(1)).max(1)
}

pub fn clamp_page_index(requested: usize, total: usize, page_size: usize) -> usize {
    requested.min(page_count(total, page_size) - 1)
}

pub fn derive<'a>(
    collection: &'a LiveCollection,
    view: &ViewState,
    group_scope: Option<&HashSet<String>>,
    schema: &RowSchema,
    busy: &BusyTracker,
) -> DerivedPage<'a> {
    let query = view.filter_query.to_lowercase();

    let mut visible: Vec<&Entity> = collection
        .iter()
        .filter(|entity| group_scope.is_none_or(|scope| scope.contains(entity.key())))
        .filter(|entity| {
            query.is_empty() || schema.display_name(entity).to_lowercase().contains(&query)
        })
        .collect();

    if view.sort_key != SortKey::Insertion {
        // stable: equal rows keep collection order
        visible.sort_by(|a, b| {
            let ordering = compare(a, b, view.sort_key, schema, busy);
            match view.sort_dir {
                SortDir::Asc => ordering,
                SortDir::Desc => ordering.reverse(),
            }
        });
    }

    let total = visible.len();
    let page_size = view.page_size.max(1);
    let page_index = clamp_page_index(view.page_index, total, page_size);
    let rows = visible
        .into_iter()
        .skip(page_index * page_size)
        .take(page_size)
        .collect();

    DerivedPage {
        rows,
        total,
        page_index,
        page_count: page_count(total, page_size),
    }
}

fn compare(
    a: &Entity,
    b: &Entity,
    key: SortKey,
    schema: &RowSchema,
    busy: &BusyTracker,
) -> Ordering {
    let by_name = || compare_names(schema.display_name(a), schema.display_name(b));
    match key {
        SortKey::Status => schema
            .status_rank(a, busy)
            .cmp(&schema.status_rank(b, busy))
            .then_with(by_name),
        SortKey::Name => by_name(),
        SortKey::Insertion => Ordering::Equal,
    }
}

thread_local! {
    static NAME_COLLATOR: Option<Collator> = name_collator();
}

/// Root locale at secondary strength: case is ignored, accents are not.
fn name_collator() -> Option<Collator> {
    let mut options = CollatorOptions::new();
    options.strength = Some(Strength::Secondary);
    Collator::try_new(&Default::default(), options)
        .map_err(|e| warn!("Name collator unavailable, sorting by code point: {}", e))
        .ok()
}

pub fn compare_names(a: &str, b: &str) -> Ordering {
    NAME_COLLATOR.with(|collator| match collator {
        Some(collator) => collator.compare(a, b),
        None => a.to_lowercase().cmp(&b.to_lowercase()),
    })
}

/// Footer text for the current page, `"1-10 of 25"`.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRange {
    pub start: usize,
    pub end: usize,
    pub total: usize,
}

impl PageRange {
    pub fn new(page_index: usize, page_size: usize, total: usize) -> Self {
        if total == 0 {
            return Self {
                start: 0,
                end: 0,
                total: 0,
            };
        }
        let page_size = page_size.max(1);
        let start = page_index * page_size + 1;
        let end = (start + page_size - 1).min(total);
        Self { start, end, total }
    }
}

impl fmt::Display for PageRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{} of {}", self.start, self.end, self.total)
    }
}
