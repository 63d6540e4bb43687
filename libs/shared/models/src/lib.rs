pub mod appointment;
pub mod auth;
pub mod consultation;
pub mod doctor;
pub mod error;
pub mod medical_record;
pub mod schedule;
pub mod user;

use serde::Deserialize;

pub const DEFAULT_PAGE_LIMIT: usize = 100;
pub const MAX_PAGE_LIMIT: usize = 500;

/// Offset pagination as accepted on every listing endpoint.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
pub struct Page {
    #[serde(default)]
    pub skip: usize,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    DEFAULT_PAGE_LIMIT
}

impl Default for Page {
    fn default() -> Self {
        Self {
            skip: 0,
            limit: DEFAULT_PAGE_LIMIT,
        }
    }
}

impl Page {
    pub fn new(skip: usize, limit: usize) -> Self {
        Self { skip, limit }.clamped()
    }

    pub fn clamped(self) -> Self {
        Self {
            skip: self.skip,
            limit: self.limit.clamp(1, MAX_PAGE_LIMIT),
        }
    }

    pub fn apply<T>(&self, items: impl IntoIterator<Item = T>) -> Vec<T> {
        let page = self.clamped();
        items.into_iter().skip(page.skip).take(page.limit).collect()
    }
}
