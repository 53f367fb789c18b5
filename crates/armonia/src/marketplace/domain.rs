use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::impl_entity;

pub const DEFAULT_PAGE_SIZE: usize = 20;
pub const MAX_PAGE_SIZE: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ListingCategory {
    Home,
    Technology,
    Services,
    Classes,
    Other,
}

impl ListingCategory {
    pub const ALL: [ListingCategory; 5] = [
        ListingCategory::Home,
        ListingCategory::Technology,
        ListingCategory::Services,
        ListingCategory::Classes,
        ListingCategory::Other,
    ];

    pub const fn display_name(self) -> &'static str {
        match self {
            ListingCategory::Home => "Hogar",
            ListingCategory::Technology => "Tecnología",
            ListingCategory::Services => "Servicios",
            ListingCategory::Classes => "Clases",
            ListingCategory::Other => "Otros",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ListingStatus {
    Active,
    Sold,
    Reported,
    Deleted,
}

impl ListingStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ListingStatus::Active => "ACTIVE",
            ListingStatus::Sold => "SOLD",
            ListingStatus::Reported => "REPORTED",
            ListingStatus::Deleted => "DELETED",
        }
    }
}

/// Item offered between residents. `price` is in minor currency units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub id: u64,
    pub seller_id: u64,
    pub title: String,
    pub description: String,
    pub price: u64,
    pub category: ListingCategory,
    pub images: Vec<String>,
    pub status: ListingStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReportStatus {
    Pending,
    Resolved,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingReport {
    pub id: u64,
    pub listing_id: u64,
    pub reporter_id: u64,
    pub reason: String,
    pub status: ReportStatus,
    pub resolution: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketMessage {
    pub id: u64,
    pub listing_id: u64,
    pub sender_id: u64,
    pub receiver_id: u64,
    pub content: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

impl_entity!(Listing, "listing");
impl_entity!(ListingReport, "listing report");
impl_entity!(MarketMessage, "market message");

#[derive(Debug, Clone, Deserialize)]
pub struct NewListing {
    pub title: String,
    pub description: String,
    pub price: u64,
    pub category: ListingCategory,
    #[serde(default)]
    pub images: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListingUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub price: Option<u64>,
    pub category: Option<ListingCategory>,
    pub images: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListingFilter {
    pub category: Option<ListingCategory>,
    pub search: Option<String>,
    pub min_price: Option<u64>,
    pub max_price: Option<u64>,
    pub page: Option<usize>,
    pub limit: Option<usize>,
}

impl ListingFilter {
    pub fn matches(&self, listing: &Listing) -> bool {
        let search = self
            .search
            .as_deref()
            .map(|term| term.trim().to_lowercase())
            .filter(|term| !term.is_empty());

        listing.status == ListingStatus::Active
            && self.category.map_or(true, |category| listing.category == category)
            && self.min_price.map_or(true, |min| listing.price >= min)
            && self.max_price.map_or(true, |max| listing.price <= max)
            && search.map_or(true, |term| {
                listing.title.to_lowercase().contains(&term)
                    || listing.description.to_lowercase().contains(&term)
            })
    }

    /// 1-based page and clamped page size.
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
pub struct ListingPage {
    pub listings: Vec<Listing>,
    pub total: usize,
    pub page: usize,
    pub limit: usize,
    pub total_pages: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewReport {
    pub listing_id: u64,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ModerationAction {
    Dismiss,
    Remove,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Resolution {
    pub action: ModerationAction,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportView {
    #[serde(flatten)]
    pub report: ListingReport,
    pub listing: Listing,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewMessage {
    pub listing_id: u64,
    pub receiver_id: u64,
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryView {
    pub value: ListingCategory,
    pub label: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadedImage {
    pub url: String,
    pub content_type: String,
    pub size: usize,
}
