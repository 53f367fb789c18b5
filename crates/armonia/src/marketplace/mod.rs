//! Resident classifieds: listings, moderation reports and buyer/seller messages.

mod domain;
mod router;
mod service;

pub use domain::{
    CategoryView, Listing, ListingCategory, ListingFilter, ListingPage, ListingReport,
    ListingStatus, ListingUpdate, MarketMessage, ModerationAction, NewListing, NewMessage,
    NewReport, ReportStatus, ReportView, Resolution, UploadedImage, DEFAULT_PAGE_SIZE,
    MAX_PAGE_SIZE,
};
pub use router::marketplace_router;
pub use service::{image_mime, MarketplaceService, MAX_IMAGE_BYTES};
