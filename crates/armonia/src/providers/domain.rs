use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::impl_entity;

pub const DEFAULT_PAGE_SIZE: usize = 10;
pub const MAX_PAGE_SIZE: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProviderCategory {
    Plumbing,
    Electricity,
    Cleaning,
    Gardening,
    Security,
    Other,
}

impl ProviderCategory {
    pub const fn label(self) -> &'static str {
        match self {
            ProviderCategory::Plumbing => "Plomería",
            ProviderCategory::Electricity => "Electricidad",
            ProviderCategory::Cleaning => "Limpieza",
            ProviderCategory::Gardening => "Jardinería",
            ProviderCategory::Security => "Seguridad",
            ProviderCategory::Other => "Otro",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceProvider {
    pub id: u64,
    pub name: String,
    pub category: ProviderCategory,
    pub description: String,
    pub contact_phone: String,
    pub contact_email: String,
    pub address: String,
    /// Mean review rating, 0 until the first review.
    pub rating: f64,
    pub review_count: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub id: u64,
    pub service_provider_id: u64,
    pub user_id: u64,
    pub user_name: String,
    pub rating: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl_entity!(ServiceProvider, "service provider");
impl_entity!(Review, "review");

#[derive(Debug, Clone, Deserialize)]
pub struct NewProvider {
    pub name: String,
    pub category: ProviderCategory,
    pub description: String,
    pub contact_phone: String,
    pub contact_email: String,
    pub address: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProviderUpdate {
    pub name: Option<String>,
    pub category: Option<ProviderCategory>,
    pub description: Option<String>,
    pub contact_phone: Option<String>,
    pub contact_email: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewReview {
    pub rating: u8,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProviderFilter {
    pub search: Option<String>,
    pub category: Option<ProviderCategory>,
    pub min_rating: Option<f64>,
    pub page: Option<usize>,
    pub limit: Option<usize>,
}

impl ProviderFilter {
    /// Case-insensitive search over name, description and category label.
    pub fn matches(&self, provider: &ServiceProvider) -> bool {
        let search = self
            .search
            .as_deref()
            .map(|term| term.trim().to_lowercase())
            .filter(|term| !term.is_empty());

        self.category.map_or(true, |category| provider.category == category)
            && self.min_rating.map_or(true, |min| provider.rating >= min)
            && search.map_or(true, |term| {
                provider.name.to_lowercase().contains(&term)
                    || provider.description.to_lowercase().contains(&term)
                    || provider.category.label().to_lowercase().contains(&term)
            })
    }

    pub fn window(&self) -> (usize, usize) {
        let page = self.page.unwrap_or(1).max(1);
        let limit = self
            .limit
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);
        (page, limit)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProviderPage {
    pub providers: Vec<ServiceProvider>,
    pub total: usize,
    pub page: usize,
    pub limit: usize,
}
