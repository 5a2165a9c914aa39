use serde::{Deserialize, Serialize};

// ==================================================================================================
// Response Envelope
// ==================================================================================================

/// Standard response wrapper: `{ isSuccess, message, data }`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiEnvelope<T> {
    #[serde(default)]
    pub is_success: bool,
    #[serde(default)]
    pub message: Option<String>,
    pub data: Option<T>,
}

impl<T> ApiEnvelope<T> {
    /// Payload of a successful envelope
    pub fn into_data(self) -> Option<T> {
        if self.is_success {
            self.data
        } else {
            None
        }
    }
}

// ==================================================================================================
// Pagination
// ==================================================================================================

/// One page of a server-side list
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginatedList<T> {
    pub items: Vec<T>,
    pub total_count: u64,
    pub current_page: u32,
    pub page_size: u32,
    pub total_pages: u32,
    pub has_next_page: bool,
    pub has_previous_page: bool,
}

/// Paging and filtering parameters for list endpoints
#[derive(Debug, Clone, PartialEq)]
pub struct PaginationQuery {
    pub page_number: u32,
    pub page_size: u32,
    pub sort_order: Option<String>,
    pub order_by: Option<String>,
    pub search: Option<String>,
}

impl Default for PaginationQuery {
    fn default() -> Self {
        Self {
            page_number: 1,
            page_size: 10,
            sort_order: None,
            order_by: None,
            search: None,
        }
    }
}

impl PaginationQuery {
    /// Render as query parameters; unset optional fields are omitted
    pub fn to_query(&self) -> Vec<(String, String)> {
        let mut params = vec![
            ("pageNumber".to_string(), self.page_number.to_string()),
            ("pageSize".to_string(), self.page_size.to_string()),
        ];
        let optional = [
            ("sortOrder", &self.sort_order),
            ("orderBy", &self.order_by),
            ("search", &self.search),
        ];
        for (key, value) in optional {
            if let Some(v) = value.as_ref().filter(|v| !v.is_empty()) {
                params.push((key.to_string(), v.clone()));
            }
        }
        params
    }
}
