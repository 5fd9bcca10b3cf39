use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, FromRequestParts, Path, Query, Request},
    http::{request::Parts, HeaderMap},
    Json,
};
use serde::{de::DeserializeOwned, Deserialize};
use std::convert::Infallible;
use std::str::FromStr;
use utoipa::IntoParams;
use validator::Validate;

use crate::{
    dto::BaseUrl,
    errors::{FieldErrors, ServiceError},
    repositories::{CouponSortField, PageRequest, SortDirection},
    AppState,
};

/// Pagination and sort query parameters for coupon listings
#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct PageParams {
    /// Zero-based page index (default: 0)
    pub page: Option<u64>,
    /// Items per page (default: 10)
    pub size: Option<u64>,
    /// One of id, name, discountValue, validFrom, validTo, createdAt, updatedAt (default: id)
    pub sort_by: Option<String>,
    /// asc or desc (default: asc)
    pub direction: Option<String>,
}

impl PageParams {
    /// Resolves defaults and rejects out-of-range sizes, unreachable pages and unknown sort keys.
    pub fn into_page_request(
        self,
        default_size: u64,
        max_size: u64,
    ) -> Result<PageRequest, ServiceError> {
        let mut errors = FieldErrors::new();

        let size = self.size.unwrap_or(default_size);
        if size == 0 || size > max_size {
            errors.insert(
                "size".to_string(),
                format!("Page size must be between 1 and {}", max_size),
            );
        }

        let page = self.page.unwrap_or(0);
        let offset_fits = page
            .checked_mul(size)
            .is_some_and(|offset| offset <= i64::MAX as u64);
        if !offset_fits {
            errors.insert("page".to_string(), "Page index is too large".to_string());
        }

        let sort_by = match self.sort_by.as_deref().map(str::trim) {
            None | Some("") => CouponSortField::default(),
            Some(raw) => CouponSortField::from_str(raw).unwrap_or_else(|_| {
                errors.insert("sortBy".to_string(), format!("Unsupported sort field: {}", raw));
                CouponSortField::default()
            }),
        };

        let direction = match self.direction.as_deref().map(str::trim) {
            None | Some("") => SortDirection::default(),
            Some(raw) => SortDirection::from_str(raw).unwrap_or_else(|_| {
                errors.insert(
                    "direction".to_string(),
                    "Sort direction must be asc or desc".to_string(),
                );
                SortDirection::default()
            }),
        };

        if !errors.is_empty() {
            return Err(ServiceError::ValidationError(errors));
        }
        Ok(PageRequest::new(page, size).sorted(sort_by, direction))
    }
}

/// Page request resolved from the query string with the configured size limits.
#[derive(Debug, Clone, Copy)]
pub struct Pagination(pub PageRequest);

#[async_trait]
impl FromRequestParts<AppState> for Pagination {
    type Rejection = ServiceError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Query(params) = Query::<PageParams>::try_from_uri(&parts.uri)
            .map_err(|e| ServiceError::BadRequest(format!("Invalid query parameters: {}", e)))?;
        let request = params.into_page_request(
            state.config.api_default_page_size,
            state.config.api_max_page_size,
        )?;
        Ok(Self(request))
    }
}

/// Numeric id taken from the route, rejected through the error envelope when malformed.
#[derive(Debug, Clone, Copy)]
pub struct EntityId(pub i64);

#[async_trait]
impl<S> FromRequestParts<S> for EntityId
where
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(id) = Path::<i64>::from_request_parts(parts, state)
            .await
            .map_err(|e| ServiceError::BadRequest(format!("Invalid id: {}", e.body_text())))?;
        Ok(Self(id))
    }
}

/// JSON body whose rejections render through the error envelope.
///
/// Validation is left to the caller.
#[derive(Debug, Clone)]
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection: JsonRejection| {
                ServiceError::BadRequest(format!("Invalid request body: {}", rejection.body_text()))
            })?;
        Ok(Self(value))
    }
}

/// JSON body that is deserialized and then validated.
#[derive(Debug, Clone)]
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let JsonBody(value) = JsonBody::<T>::from_request(req, state).await?;
        value.validate()?;
        Ok(Self(value))
    }
}

#[async_trait]
impl FromRequestParts<AppState> for BaseUrl {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(match &state.config.public_base_url {
            Some(configured) => BaseUrl::new(configured.as_str()),
            None => base_url_from_headers(&parts.headers),
        })
    }
}

/// Scheme and host the client used to reach us, honouring reverse proxy headers.
pub fn base_url_from_headers(headers: &HeaderMap) -> BaseUrl {
    let first_value = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    let scheme = first_value("x-forwarded-proto").unwrap_or("http");
    let host = first_value("x-forwarded-host")
        .or_else(|| first_value("host"))
        .unwrap_or("localhost");
    BaseUrl::new(format!("{}://{}", scheme, host))
}
