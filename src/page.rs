//! Pagination and sorting types shared by adapters and the HTTP layer.

use serde::Serialize;
use serde_json::Value;
use std::str::FromStr;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl FromStr for SortDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "ASC" => Ok(SortDirection::Asc),
            "DESC" => Ok(SortDirection::Desc),
            other => Err(format!("invalid sort direction '{other}' (expected ASC or DESC)")),
        }
    }
}

#[derive(Clone, Debug)]
pub struct SortSpec {
    pub field: String,
    pub direction: SortDirection,
}

/// A 0-based page request. `size` must be positive; the engine rejects zero.
#[derive(Clone, Debug)]
pub struct PageRequest {
    pub page: u64,
    pub size: u64,
    pub sort: Option<SortSpec>,
}

impl PageRequest {
    /// Row offset of this page, or None when `page * size` overflows u64.
    /// Adapters reject an overflowing request as a validation error.
    pub fn offset(&self) -> Option<u64> {
        self.page.checked_mul(self.size)
    }
}

/// One page of results plus the derived pagination flags.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub content: Vec<Value>,
    pub current_page: u64,
    pub page_size: u64,
    pub total_elements: u64,
    pub total_pages: u64,
    pub first: bool,
    pub last: bool,
}

impl Page {
    pub fn new(content: Vec<Value>, current_page: u64, page_size: u64, total_elements: u64) -> Self {
        let total_pages = if page_size == 0 {
            0
        } else {
            total_elements.div_ceil(page_size)
        };
        Page {
            content,
            current_page,
            page_size,
            total_elements,
            total_pages,
            first: current_page == 0,
            last: total_pages == 0 || current_page >= total_pages - 1,
        }
    }
}
