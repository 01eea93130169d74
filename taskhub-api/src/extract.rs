/// Request extractors that reject with the API error envelope
///
/// Axum's stock `Json`, `Path` and `Query` extractors answer malformed input
/// with plain-text bodies. These wrappers route the rejection through
/// [`ApiError`] so clients always see `{"error": {...}}` with
/// `VALIDATION_ERROR`.

use axum::extract::{
    rejection::{JsonRejection, PathRejection, QueryRejection},
    FromRequest, FromRequestParts,
};
use serde::{de::DeserializeOwned, Deserialize};
use taskhub_shared::models::{Page, SortOrder, TimeRange};
use uuid::Uuid;
use validator::Validate;

use crate::error::{ApiError, ApiResult};

/// JSON body extractor
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// Path parameter extractor
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct ApiPath<T>(pub T);

/// Query string extractor
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::invalid_field("body", rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::invalid_field("params", rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::invalid_field("query", rejection.body_text())
    }
}

/// Deserializes and validates a body that was extracted as raw JSON
///
/// Creation handlers that must authorize before judging the payload take the
/// body as a `serde_json::Value` and call this once access is granted.
pub fn parse_body<T>(value: serde_json::Value) -> ApiResult<T>
where
    T: DeserializeOwned + Validate,
{
    let parsed: T = serde_json::from_value(value).map_err(|e| ApiError::invalid_field("body", e.to_string()))?;
    parsed.validate()?;
    Ok(parsed)
}

/// `?page=&limit=` query parameters
///
/// Unparseable values fall back to the defaults instead of failing the
/// request.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
}

impl PageQuery {
    pub fn page(&self) -> Page {
        Page::new(parse_positive(&self.page), parse_positive(&self.limit))
    }
}

fn parse_positive(raw: &Option<String>) -> Option<u32> {
    raw.as_deref().and_then(|v| v.trim().parse::<u32>().ok())
}

/// `?sortBy=&sortOrder=` query parameters
///
/// Each list endpoint whitelists its own sort fields; an unknown field or
/// order falls back to the endpoint default.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SortQuery {
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

impl SortQuery {
    pub fn field<F>(&self, parse: impl Fn(&str) -> Option<F>, default: F) -> F {
        self.sort_by.as_deref().and_then(parse).unwrap_or(default)
    }

    pub fn order(&self, default: SortOrder) -> SortOrder {
        self.sort_order.as_deref().and_then(SortOrder::parse).unwrap_or(default)
    }
}

/// `?createdAfter=&createdBefore=&updatedAfter=&updatedBefore=`
///
/// Bounds are inclusive. Values that are neither RFC 3339 nor `YYYY-MM-DD`
/// are ignored.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateRangeQuery {
    pub created_after: Option<String>,
    pub created_before: Option<String>,
    pub updated_after: Option<String>,
    pub updated_before: Option<String>,
}

impl DateRangeQuery {
    pub fn created(&self) -> TimeRange {
        TimeRange::parse(self.created_after.as_deref(), self.created_before.as_deref())
    }

    pub fn updated(&self) -> TimeRange {
        TimeRange::parse(self.updated_after.as_deref(), self.updated_before.as_deref())
    }
}

/// Trimmed query value, `None` when absent or blank
pub fn non_blank(raw: &Option<String>) -> Option<String> {
    raw.as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Optional UUID query value; blank counts as absent
pub fn uuid_param(field: &'static str, raw: &Option<String>) -> ApiResult<Option<Uuid>> {
    non_blank(raw)
        .map(|v| v.parse::<Uuid>().map_err(|_| ApiError::invalid_field(field, "Invalid UUID")))
        .transpose()
}

/// `true`/`false` query value; anything else counts as absent
pub fn bool_param(raw: &Option<String>) -> Option<bool> {
    match non_blank(raw)?.to_ascii_lowercase().as_str() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}
