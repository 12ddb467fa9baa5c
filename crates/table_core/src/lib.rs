//! Table core: pure loader state machine, filter codec and view-model helpers.
mod codec;
mod effect;
mod error;
mod filter;
mod live;
mod msg;
mod page;
mod query;
mod schema;
mod state;
mod update;
mod view_model;

pub use codec::{decode_field_value, encode_field_value, ParseIssue, ParseOutcome, SearchParamCodec};
pub use effect::Effect;
pub use error::{FailureKind, FetchError};
pub use filter::{DateRange, FilterState, FilterValue};
pub use live::{LiveMode, LiveState};
pub use msg::Msg;
pub use page::{Cursor, ListResponse, Page, PageOrigin, Row};
pub use query::{build_query_key, ListRequest, QueryKey, QueryOptions};
pub use schema::{
    FieldKind, FieldSpec, FilterSchema, FilterSchemaBuilder, PageSizeLimits, SchemaError, Sort,
    SortDirection, SortParseError, SIZE_PARAM, SORT_PARAM,
};
pub use state::{Generation, LoadError, LoadStatus, PagePurpose, RequestId, TableState};
pub use update::update;
pub use view_model::{ErrorBanner, LiveView, TableViewModel};
