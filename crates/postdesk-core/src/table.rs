//! Search, sort and pagination for the posts table

use postdesk_api::PostRecord;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Column a table can be sorted by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    #[default]
    Id,
    UserId,
    Title,
    Body,
}

impl SortKey {
    pub fn as_str(self) -> &'static str {
        match self {
            SortKey::Id => "id",
            SortKey::UserId => "user_id",
            SortKey::Title => "title",
            SortKey::Body => "body",
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "id" => Ok(SortKey::Id),
            "user_id" | "userid" | "user" => Ok(SortKey::UserId),
            "title" => Ok(SortKey::Title),
            "body" => Ok(SortKey::Body),
            other => Err(format!("unknown sort column '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn reversed(self) -> Self {
        match self {
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::Asc,
        }
    }
}

/// Current sort column and direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SortConfig {
    pub key: SortKey,
    pub direction: SortDirection,
}

impl SortConfig {
    pub fn new(key: SortKey, direction: SortDirection) -> Self {
        Self { key, direction }
    }

    /// Select a column: the current column flips direction, a new one starts ascending
    pub fn toggle(&mut self, key: SortKey) {
        if self.key == key {
            self.direction = self.direction.reversed();
        } else {
            self.key = key;
            self.direction = SortDirection::Asc;
        }
    }

    fn compare(&self, a: &PostRecord, b: &PostRecord) -> Ordering {
        let ordering = match self.key {
            SortKey::Id => a.post.id.cmp(&b.post.id),
            SortKey::UserId => a.post.user_id.cmp(&b.post.user_id),
            SortKey::Title => compare_text(&a.post.title, &b.post.title),
            SortKey::Body => compare_text(&a.post.body, &b.post.body),
        };
        match self.direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    }

    /// Sort records in place; equal rows keep their relative order
    pub fn sort(&self, records: &mut [PostRecord]) {
        records.sort_by(|a, b| self.compare(a, b));
    }
}

fn compare_text(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

/// Keep records whose title, body, id or user id contains `term`, ignoring case.
/// A blank term keeps everything.
pub fn filter_posts(records: &[PostRecord], term: &str) -> Vec<PostRecord> {
    if term.trim().is_empty() {
        return records.to_vec();
    }

    let needle = term.to_lowercase();
    records
        .iter()
        .filter(|record| {
            let post = &record.post;
            post.title.to_lowercase().contains(&needle)
                || post.body.to_lowercase().contains(&needle)
                || post.id.to_string().contains(&needle)
                || post.user_id.to_string().contains(&needle)
        })
        .cloned()
        .collect()
}

/// Page position over a list of known length. Pages are numbered from 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    current_page: usize,
    page_size: usize,
    total_items: usize,
}

impl Pagination {
    pub fn new(total_items: usize, page_size: usize) -> Self {
        Self {
            current_page: 1,
            page_size: page_size.max(1),
            total_items,
        }
    }

    pub fn current_page(&self) -> usize {
        self.current_page
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn total_items(&self) -> usize {
        self.total_items
    }

    pub fn total_pages(&self) -> usize {
        self.total_items.div_ceil(self.page_size)
    }

    /// Jump to `page`, clamped into `1..=total_pages`
    pub fn go_to(&mut self, page: usize) {
        self.current_page = page.min(self.total_pages()).max(1);
    }

    pub fn next(&mut self) {
        if self.can_go_next() {
            self.current_page += 1;
        }
    }

    pub fn prev(&mut self) {
        if self.can_go_prev() {
            self.current_page -= 1;
        }
    }

    pub fn can_go_next(&self) -> bool {
        self.current_page < self.total_pages()
    }

    pub fn can_go_prev(&self) -> bool {
        self.current_page > 1
    }

    pub fn start_index(&self) -> usize {
        ((self.current_page - 1) * self.page_size).min(self.total_items)
    }

    pub fn end_index(&self) -> usize {
        (self.start_index() + self.page_size).min(self.total_items)
    }

    /// The slice of `items` on the current page
    pub fn page<'a, T>(&self, items: &'a [T]) -> &'a [T] {
        let start = self.start_index().min(items.len());
        let end = self.end_index().min(items.len());
        &items[start..end]
    }

    /// Range label such as `"11-20 of 95"`
    pub fn showing(&self) -> String {
        if self.total_items == 0 {
            "0-0 of 0".to_string()
        } else {
            format!(
                "{}-{} of {}",
                self.start_index() + 1,
                self.end_index(),
                self.total_items
            )
        }
    }
}

/// What to show of the posts table
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableQuery {
    pub search: String,
    pub sort: SortConfig,
    /// 1-based; clamped to the available pages
    pub page: usize,
}

/// One rendered page of the posts table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TablePage {
    pub rows: Vec<PostRecord>,
    pub pagination: Pagination,
}

/// Filter, sort and paginate `records`
pub fn table_page(records: &[PostRecord], query: &TableQuery, page_size: usize) -> TablePage {
    let mut rows = filter_posts(records, &query.search);
    query.sort.sort(&mut rows);

    let mut pagination = Pagination::new(rows.len(), page_size);
    pagination.go_to(query.page);

    TablePage {
        rows: pagination.page(&rows).to_vec(),
        pagination,
    }
}
