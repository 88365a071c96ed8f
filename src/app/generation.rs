//! Request generations for page fetches.
//!
//! Every fetch records the request it was started for. A response is applied only if no newer
//! request has started since, so a slow response for page 2 can't overwrite page 3.

use crate::domain::filter::to_tokens;
use crate::domain::query::{QueryOptions, SortDirection};
use std::sync::Mutex;

/// Everything that changes which rows a fetch returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestSignature {
    pub table_id: i64,
    pub page: u32,
    pub page_size: u32,
    pub sort: Option<(String, SortDirection)>,
    pub filters: Vec<String>,
}

impl RequestSignature {
    pub fn new(table_id: i64, options: &QueryOptions) -> Self {
        Self {
            table_id,
            page: options.page(),
            page_size: options.page_size(),
            sort: options
                .sort_column
                .clone()
                .map(|column| (column, options.sort_direction)),
            filters: to_tokens(&options.filters),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generation {
    id: u64,
    signature: RequestSignature,
}

impl Generation {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn signature(&self) -> &RequestSignature {
        &self.signature
    }
}

#[derive(Debug, Default)]
pub struct GenerationTracker {
    latest: Mutex<Option<Generation>>,
}

impl GenerationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a fetch. Repeating the in-flight request keeps its generation, so a refresh of the
    /// same page does not discard the response already on its way.
    pub fn begin(&self, signature: RequestSignature) -> Generation {
        let mut latest = self.latest.lock().unwrap_or_else(|e| e.into_inner());
        let id = match latest.as_ref() {
            Some(current) if current.signature == signature => current.id,
            Some(current) => current.id + 1,
            None => 1,
        };
        let generation = Generation { id, signature };
        *latest = Some(generation.clone());
        generation
    }

    pub fn is_current(&self, generation: &Generation) -> bool {
        let latest = self.latest.lock().unwrap_or_else(|e| e.into_inner());
        latest.as_ref().map(|g| g.id) == Some(generation.id)
    }

    pub fn current(&self) -> Option<Generation> {
        self.latest.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::filter::{Filter, FilterOperator};

    #[test]
    fn newer_request_makes_older_stale() {
        let tracker = GenerationTracker::new();
        let page2 = tracker.begin(RequestSignature::new(7, &QueryOptions::new(2, 100)));
        let page3 = tracker.begin(RequestSignature::new(7, &QueryOptions::new(3, 100)));
        assert!(!tracker.is_current(&page2));
        assert!(tracker.is_current(&page3));
        assert!(page3.id() > page2.id());
    }

    #[test]
    fn identical_request_keeps_generation() {
        let tracker = GenerationTracker::new();
        let options = QueryOptions::new(1, 50)
            .with_filters(vec![Filter::new("name", FilterOperator::Like, "a%")]);
        let first = tracker.begin(RequestSignature::new(1, &options));
        let again = tracker.begin(RequestSignature::new(1, &options));
        assert_eq!(first.id(), again.id());
        assert!(tracker.is_current(&first));
    }

    #[test]
    fn filter_or_sort_change_is_a_new_request() {
        let tracker = GenerationTracker::new();
        let base = QueryOptions::new(1, 50);
        let first = tracker.begin(RequestSignature::new(1, &base));
        let sorted = base.clone().with_sort("id", SortDirection::Desc);
        let second = tracker.begin(RequestSignature::new(1, &sorted));
        assert_ne!(first.id(), second.id());
        assert_eq!(tracker.current().map(|g| g.id()), Some(second.id()));
    }
}
