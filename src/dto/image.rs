use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::BaseUrl;
use crate::entities::image;

/// Public view of stored image metadata. The storage key stays server side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ImageSummary {
    pub id: i64,
    #[schema(example = "pizza.jpg")]
    pub file_name: String,
    #[schema(example = "image/jpeg")]
    pub file_type: Option<String>,
    pub file_size: Option<i64>,
    pub description: Option<String>,
    /// Where the binary content is served.
    pub url: String,
    pub created_at: DateTime<Utc>,
}

impl ImageSummary {
    pub fn from_model(model: image::Model, base: &BaseUrl) -> Self {
        Self {
            url: base.image_content_url(model.id),
            id: model.id,
            file_name: model.file_name,
            file_type: model.file_type,
            file_size: model.file_size,
            description: model.description,
            created_at: model.created_at,
        }
    }
}
