//! Shared application state for all routes.

use crate::registry::ServiceRegistry;
use std::sync::Arc;

/// Pagination defaults applied when the query string omits them.
#[derive(Clone, Copy, Debug)]
pub struct PageDefaults {
    pub page_size: u64,
    pub max_page_size: u64,
}

impl Default for PageDefaults {
    fn default() -> Self {
        PageDefaults {
            page_size: 20,
            max_page_size: 1000,
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ServiceRegistry>,
    pub defaults: PageDefaults,
}

impl AppState {
    pub fn new(registry: Arc<ServiceRegistry>) -> Self {
        AppState {
            registry,
            defaults: PageDefaults::default(),
        }
    }

    pub fn with_defaults(registry: Arc<ServiceRegistry>, defaults: PageDefaults) -> Self {
        AppState { registry, defaults }
    }
}
