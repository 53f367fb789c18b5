//! Service provider directory with resident reviews.

mod domain;
mod router;
mod service;

pub use domain::{
    NewProvider, NewReview, ProviderCategory, ProviderFilter, ProviderPage, ProviderUpdate, Review,
    ServiceProvider,
};
pub use router::providers_router;
pub use service::ProviderService;
