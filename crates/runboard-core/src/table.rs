//! Table queries: named filters, sorting and pagination over in-memory rows,
//! plus the typed page requests the workspace listings use.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{Result, RunboardError};
use crate::models::{RunSummary, StepInfo, StepStatus};

type Predicate<'a, T> = Box<dyn Fn(&T) -> bool + 'a>;
type Comparator<'a, T> = Box<dyn Fn(&T, &T) -> Ordering + 'a>;

/// Filters keyed by column id, applied in the order they were first set,
/// followed by an optional sort.
pub struct TableQuery<'a, T> {
    filters: IndexMap<String, Predicate<'a, T>>,
    sort: Option<(Comparator<'a, T>, bool)>,
}

impl<'a, T> Default for TableQuery<'a, T> {
    fn default() -> Self {
        Self {
            filters: IndexMap::new(),
            sort: None,
        }
    }
}

impl<'a, T> TableQuery<'a, T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the filter for column `id`, replacing any previous one.
    pub fn set_filter<F>(&mut self, id: impl Into<String>, predicate: F) -> &mut Self
    where
        F: Fn(&T) -> bool + 'a,
    {
        self.filters.insert(id.into(), Box::new(predicate));
        self
    }

    pub fn clear_filter(&mut self, id: &str) -> &mut Self {
        self.filters.shift_remove(id);
        self
    }

    pub fn active_filters(&self) -> impl Iterator<Item = &str> {
        self.filters.keys().map(String::as_str)
    }

    pub fn sort_by<F>(&mut self, compare: F, descending: bool) -> &mut Self
    where
        F: Fn(&T, &T) -> Ordering + 'a,
    {
        self.sort = Some((Box::new(compare), descending));
        self
    }

    pub fn clear_sort(&mut self) -> &mut Self {
        self.sort = None;
        self
    }

    /// Rows passing every filter, stably sorted if a sort is set.
    pub fn apply<'r>(&self, rows: &'r [T]) -> Vec<&'r T> {
        let mut out: Vec<&T> = rows
            .iter()
            .filter(|row| self.filters.values().all(|f| f(*row)))
            .collect();
        if let Some((compare, descending)) = &self.sort {
            out.sort_by(|a, b| {
                let ord = compare(*a, *b);
                if *descending {
                    ord.reverse()
                } else {
                    ord
                }
            });
        }
        out
    }
}

/// Case-insensitive substring match; an empty needle matches everything.
pub fn text_filter<'a, T, G>(getter: G, needle: &str) -> impl Fn(&T) -> bool + 'a
where
    T: 'a,
    G: Fn(&T) -> Option<&str> + 'a,
{
    let needle = needle.to_lowercase();
    move |row: &T| {
        needle.is_empty()
            || getter(row)
                .map(|v| v.to_lowercase().contains(&needle))
                .unwrap_or(false)
    }
}

/// Exact match against one option; an empty choice ("Any") matches everything.
pub fn select_filter<'a, T, G>(getter: G, choice: &str) -> impl Fn(&T) -> bool + 'a
where
    T: 'a,
    G: Fn(&T) -> Option<&str> + 'a,
{
    let choice = choice.to_string();
    move |row: &T| choice.is_empty() || getter(row) == Some(choice.as_str())
}

/// Compare by a string column; missing values sort as `""`.
pub fn sort_by_string<T, G>(getter: G) -> impl Fn(&T, &T) -> Ordering
where
    G: Fn(&T) -> Option<&str>,
{
    move |a: &T, b: &T| getter(a).unwrap_or("").cmp(getter(b).unwrap_or(""))
}

/// Compare by a numeric column; missing values sort as `0`.
pub fn sort_by_number<T, G>(getter: G) -> impl Fn(&T, &T) -> Ordering
where
    G: Fn(&T) -> Option<f64>,
{
    move |a: &T, b: &T| getter(a).unwrap_or(0.0).total_cmp(&getter(b).unwrap_or(0.0))
}

// ─── Pagination ──────────────────────────────────────────────────────────────

pub const PAGE_SIZE_OPTIONS: [usize; 4] = [10, 20, 100, 500];
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// Fixed-size pages, numbered from 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page_size: usize,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl Pagination {
    pub fn new(page_size: usize) -> Result<Self> {
        if page_size == 0 {
            return Err(RunboardError::InvalidPage { page: 1, page_size });
        }
        Ok(Self { page_size })
    }

    pub fn page_count(&self, total: usize) -> usize {
        total.div_ceil(self.page_size)
    }

    /// Pager controls are hidden when everything fits on one page.
    pub fn hide_on_single_page(&self, total: usize) -> bool {
        self.page_count(total) <= 1
    }

    /// Rows of page `page`; empty past the end.
    pub fn page<'r, R>(&self, rows: &'r [R], page: usize) -> Result<&'r [R]> {
        if page == 0 {
            return Err(RunboardError::InvalidPage {
                page,
                page_size: self.page_size,
            });
        }
        let start = (page - 1).saturating_mul(self.page_size).min(rows.len());
        let end = start.saturating_add(self.page_size).min(rows.len());
        Ok(&rows[start..end])
    }
}

// ─── Page requests ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunSort {
    Name,
    #[default]
    StartDate,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepSort {
    UniqueId,
    #[default]
    StartTime,
}

fn default_descending() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageRequest<S> {
    pub current_page: usize,
    pub page_size: usize,
    pub sort_by: S,
    #[serde(default = "default_descending")]
    pub sort_descending: bool,
    /// Keep only rows whose name contains this string.
    #[serde(default, rename = "match", skip_serializing_if = "Option::is_none")]
    pub match_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<StepStatus>,
}

impl<S: Default> Default for PageRequest<S> {
    fn default() -> Self {
        Self {
            current_page: 1,
            page_size: DEFAULT_PAGE_SIZE,
            sort_by: S::default(),
            sort_descending: true,
            match_text: None,
            status: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageResponse<T, S> {
    #[serde(flatten)]
    pub request: PageRequest<S>,
    pub data: Vec<T>,
    /// Rows matching the request, across all pages.
    pub total_items: usize,
}

fn timestamp_key(t: Option<DateTime<Utc>>) -> Option<f64> {
    t.map(|t| t.timestamp_micros() as f64)
}

fn respond<T: Clone, S: Clone>(
    rows: &[T],
    query: &TableQuery<'_, T>,
    request: &PageRequest<S>,
) -> Result<PageResponse<T, S>> {
    let pagination = Pagination::new(request.page_size)?;
    let matched = query.apply(rows);
    let data = pagination
        .page(&matched, request.current_page)?
        .iter()
        .copied()
        .cloned()
        .collect();
    Ok(PageResponse {
        request: request.clone(),
        data,
        total_items: matched.len(),
    })
}

/// One page of runs, filtered by name and sorted as requested.
pub fn paginate_runs(
    runs: &[RunSummary],
    request: &PageRequest<RunSort>,
) -> Result<PageResponse<RunSummary, RunSort>> {
    let mut query = TableQuery::new();
    if let Some(text) = &request.match_text {
        query.set_filter("name", text_filter(|r: &RunSummary| Some(r.name.as_str()), text));
    }
    match request.sort_by {
        RunSort::Name => query.sort_by(
            sort_by_string(|r: &RunSummary| Some(r.name.as_str())),
            request.sort_descending,
        ),
        RunSort::StartDate => query.sort_by(
            sort_by_number(|r: &RunSummary| timestamp_key(r.started)),
            request.sort_descending,
        ),
    };
    respond(runs, &query, request)
}

/// One page of steps, filtered by id and status and sorted as requested.
pub fn paginate_steps(
    steps: &[StepInfo],
    request: &PageRequest<StepSort>,
) -> Result<PageResponse<StepInfo, StepSort>> {
    let mut query = TableQuery::new();
    if let Some(text) = &request.match_text {
        query.set_filter("id", text_filter(|s: &StepInfo| Some(s.id.as_str()), text));
    }
    if let Some(status) = request.status {
        query.set_filter("status", move |s: &StepInfo| s.status == status);
    }
    match request.sort_by {
        StepSort::UniqueId => query.sort_by(
            sort_by_string(|s: &StepInfo| Some(s.id.as_str())),
            request.sort_descending,
        ),
        StepSort::StartTime => query.sort_by(
            sort_by_number(|s: &StepInfo| timestamp_key(s.started)),
            request.sort_descending,
        ),
    };
    respond(steps, &query, request)
}
