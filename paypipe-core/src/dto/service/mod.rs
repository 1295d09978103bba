//! Service catalog DTOs

use serde::{Deserialize, Serialize};

/// Query string for `GET /services/search`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchServices {
    #[serde(default)]
    pub q: String,
}
