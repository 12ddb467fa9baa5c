use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::codec::SearchParamCodec;
use crate::filter::{FilterState, FilterValue};
use crate::page::Cursor;
use crate::schema::Sort;

/// Cache identity of a filtered table.
///
/// The canonical form is the scope plus the normalized query string, so two
/// states that normalize equally share a key and any semantic difference
/// yields a different one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryKey {
    scope: String,
    canonical: String,
}

impl QueryKey {
    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn canonical(&self) -> &str {
        &self.canonical
    }

    /// SHA-256 of the full key, hex encoded.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.scope.as_bytes());
        hasher.update(b"?");
        hasher.update(self.canonical.as_bytes());
        hasher
            .finalize()
            .iter()
            .map(|byte| format!("{byte:02x}"))
            .collect()
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}?{}", self.scope, self.canonical)
    }
}

pub fn build_query_key(scope: &str, codec: &SearchParamCodec, state: &FilterState) -> QueryKey {
    QueryKey {
        scope: scope.to_string(),
        canonical: codec.serialize(state),
    }
}

/// Body sent to the list endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListRequest {
    pub filters: BTreeMap<String, FilterValue>,
    pub sort: Sort,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<Cursor>,
    /// Exclusive lower bound on row timestamps, used by live polling.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub since: Option<i64>,
    pub page_size: u32,
}

/// A filter state bound into a reusable request template plus its key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryOptions {
    key: QueryKey,
    template: Arc<ListRequest>,
}

impl QueryOptions {
    pub fn new(scope: &str, codec: &SearchParamCodec, state: &FilterState) -> Self {
        let schema = codec.schema();
        let normalized = state.normalize(schema);
        let template = ListRequest {
            filters: normalized.effective_filters(schema),
            sort: normalized.sort().clone(),
            cursor: None,
            since: None,
            page_size: normalized.page_size(),
        };
        Self {
            key: build_query_key(scope, codec, &normalized),
            template: Arc::new(template),
        }
    }

    pub fn key(&self) -> &QueryKey {
        &self.key
    }

    pub fn page_size(&self) -> u32 {
        self.template.page_size
    }

    pub fn page_request(&self, cursor: Option<Cursor>) -> ListRequest {
        ListRequest {
            cursor,
            ..(*self.template).clone()
        }
    }

    pub fn live_request(&self, since: Option<i64>) -> ListRequest {
        ListRequest {
            since,
            ..(*self.template).clone()
        }
    }
}
