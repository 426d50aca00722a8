//! Range scopes over timestamped records.
//!
//! `filter` is the reference semantics for "records whose `attribute` lies in
//! `[start, end]`". Any storage-backed query for the same scope must return
//! the same set of records; `check_equivalence` is how that is verified.

use crate::{
    calendar::{self, CalendarRange},
    clock::Clock,
    error::HarnessResult,
    types::{Instant, Record, RecordId},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Records whose `attribute` lies within `range` (inclusive), in input order.
///
/// A record without a timestamp under `attribute` is an error, not a miss:
/// silently dropping it would hide a broken fixture.
pub fn filter(records: &[Record], attribute: &str, range: &CalendarRange) -> HarnessResult<Vec<Record>> {
    let mut matched = Vec::new();
    for record in records {
        if range.contains(record.timestamp(attribute)?) {
            matched.push(record.clone());
        }
    }
    Ok(matched)
}

/// Which calendar window a scope covers, relative to "now".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "window", rename_all = "snake_case")]
pub enum Window {
    /// The whole calendar month `n` months ago (0 = current month).
    MonthsAgo { n: u32 },
    /// Start of the month `older` months ago through the end of the month
    /// `newer` months ago.
    MonthSpan { older: u32, newer: u32 },
    /// The calendar day containing "now".
    Today,
}

impl Window {
    pub fn range(&self, now: Instant) -> HarnessResult<CalendarRange> {
        match *self {
            Self::MonthsAgo { n } => calendar::month_range(n, now),
            Self::MonthSpan { older, newer } => calendar::month_span(older, newer, now),
            Self::Today => calendar::day_range(now),
        }
    }
}

/// A named, time-relative query: "records whose `attribute` falls in `window`".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scope {
    pub name:      String,
    pub attribute: String,
    pub window:    Window,
}

impl Scope {
    pub fn new(name: impl Into<String>, attribute: impl Into<String>, window: Window) -> Self {
        Self { name: name.into(), attribute: attribute.into(), window }
    }

    /// Shorthand for the usual "created N months ago" scope.
    pub fn months_ago(name: impl Into<String>, attribute: impl Into<String>, n: u32) -> Self {
        Self::new(name, attribute, Window::MonthsAgo { n })
    }

    pub fn range(&self, now: Instant) -> HarnessResult<CalendarRange> {
        self.window.range(now)
    }

    /// Evaluate against `records` using the clock's current reading.
    pub fn apply(&self, clock: &Clock, records: &[Record]) -> HarnessResult<Vec<Record>> {
        let range = self.range(clock.now())?;
        filter(records, &self.attribute, &range)
    }
}

/// A storage layer able to answer range scopes. The harness mirrors
/// generated records into it and compares its answers with `filter`.
pub trait ScopeBackend {
    /// Stable name for log output.
    fn name(&self) -> &'static str;

    fn insert(&mut self, records: &[Record]) -> HarnessResult<()>;

    /// Ids of stored records whose `attribute` lies within `range`.
    fn query(&self, attribute: &str, range: &CalendarRange) -> HarnessResult<Vec<RecordId>>;

    /// Remove everything inserted. Called at scenario teardown.
    fn clear(&mut self) -> HarnessResult<()>;
}

/// Backend that answers with `filter` over its own copy of the records.
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    records: Vec<Record>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl ScopeBackend for InMemoryBackend {
    fn name(&self) -> &'static str { "in_memory" }

    fn insert(&mut self, records: &[Record]) -> HarnessResult<()> {
        self.records.extend_from_slice(records);
        Ok(())
    }

    fn query(&self, attribute: &str, range: &CalendarRange) -> HarnessResult<Vec<RecordId>> {
        Ok(filter(&self.records, attribute, range)?.iter().map(Record::id).collect())
    }

    fn clear(&mut self) -> HarnessResult<()> {
        self.records.clear();
        Ok(())
    }
}

/// Set comparison between `filter` (expected) and a backend's answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Equivalence {
    pub backend:    String,
    pub expected:   BTreeSet<RecordId>,
    /// Matched by `filter` but not returned by the backend.
    pub missing:    BTreeSet<RecordId>,
    /// Returned by the backend but not matched by `filter`.
    pub unexpected: BTreeSet<RecordId>,
}

impl Equivalence {
    pub fn is_equivalent(&self) -> bool {
        self.missing.is_empty() && self.unexpected.is_empty()
    }
}

/// Query `backend` for the scope and compare the result, as a set, with
/// `filter` over `records`. The backend is expected to already hold them.
pub fn check_equivalence<B: ScopeBackend + ?Sized>(
    backend: &B,
    records: &[Record],
    attribute: &str,
    range: &CalendarRange,
) -> HarnessResult<Equivalence> {
    let expected: BTreeSet<RecordId> = filter(records, attribute, range)?
        .iter()
        .map(Record::id)
        .collect();
    let actual: BTreeSet<RecordId> = backend.query(attribute, range)?.into_iter().collect();

    let equivalence = Equivalence {
        backend:    backend.name().to_string(),
        missing:    expected.difference(&actual).copied().collect(),
        unexpected: actual.difference(&expected).copied().collect(),
        expected,
    };
    if !equivalence.is_equivalent() {
        log::warn!(
            "backend '{}' diverged from filter on '{attribute}' in [{}, {}]: {} missing, {} unexpected",
            equivalence.backend,
            range.start(),
            range.end(),
            equivalence.missing.len(),
            equivalence.unexpected.len(),
        );
    }
    Ok(equivalence)
}
