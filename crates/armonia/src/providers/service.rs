use std::sync::Arc;

use chrono::Utc;
use serde_json::json;

use super::domain::{
    NewProvider, NewReview, ProviderFilter, ProviderPage, ProviderUpdate, Review, ServiceProvider,
};
use crate::error::{require_text, ServiceError};
use crate::members::{display_name, Member};
use crate::notifications::ActivityLogger;
use crate::store::{require, Database, Repository, RepositoryError};
use crate::tenancy::{Actor, SchemaName};

const UNKNOWN_REVIEWER: &str = "Unknown User";

fn admin_only(actor: &Actor, action: &str) -> Result<(), ServiceError> {
    if actor.is_admin() {
        Ok(())
    } else {
        Err(ServiceError::forbidden(format!(
            "only administrators can {action} service providers"
        )))
    }
}

/// Mean rating and count over `reviews`.
fn rating_summary(reviews: &[Review]) -> (f64, u32) {
    if reviews.is_empty() {
        return (0.0, 0);
    }
    let total: u32 = reviews.iter().map(|review| u32::from(review.rating)).sum();
    let count = reviews.len() as u32;
    (f64::from(total) / f64::from(count), count)
}

pub struct ProviderService {
    providers: Arc<dyn Repository<ServiceProvider>>,
    reviews: Arc<dyn Repository<Review>>,
    members: Arc<dyn Repository<Member>>,
    activity: Arc<ActivityLogger>,
}

impl ProviderService {
    pub fn new(database: &Database, activity: Arc<ActivityLogger>) -> Self {
        Self {
            providers: database.service_providers.clone(),
            reviews: database.reviews.clone(),
            members: database.members.clone(),
            activity,
        }
    }

    pub fn create(
        &self,
        schema: &SchemaName,
        actor: &Actor,
        input: NewProvider,
    ) -> Result<ServiceProvider, ServiceError> {
        admin_only(actor, "register")?;
        let now = Utc::now();
        let stored = self.providers.insert(
            schema,
            ServiceProvider {
                id: 0,
                name: require_text("name", &input.name)?,
                category: input.category,
                description: input.description.trim().to_string(),
                contact_phone: require_text("contact_phone", &input.contact_phone)?,
                contact_email: require_text("contact_email", &input.contact_email)?,
                address: input.address.trim().to_string(),
                rating: 0.0,
                review_count: 0,
                created_at: now,
                updated_at: now,
            },
        )?;
        tracing::info!(%schema, provider_id = stored.id, category = stored.category.label(), "service provider registered");
        self.activity.record(
            schema,
            Some(actor.user_id),
            "CREATE_SERVICE_PROVIDER",
            "service_provider",
            stored.id,
            json!({ "category": stored.category }),
        );
        Ok(stored)
    }

    pub fn list(
        &self,
        schema: &SchemaName,
        filter: &ProviderFilter,
    ) -> Result<ProviderPage, ServiceError> {
        let mut providers = self.providers.find(schema, &|provider| filter.matches(provider))?;
        providers.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        let (page, limit) = filter.window();
        let total = providers.len();
        let providers = providers
            .into_iter()
            .skip((page - 1).saturating_mul(limit))
            .take(limit)
            .collect();
        Ok(ProviderPage {
            providers,
            total,
            page,
            limit,
        })
    }

    pub fn get(&self, schema: &SchemaName, id: u64) -> Result<ServiceProvider, ServiceError> {
        require(self.providers.as_ref(), schema, id)
    }

    pub fn update(
        &self,
        schema: &SchemaName,
        actor: &Actor,
        id: u64,
        update: ProviderUpdate,
    ) -> Result<ServiceProvider, ServiceError> {
        admin_only(actor, "edit")?;
        let stored = self.providers.modify(schema, id, &mut |provider| {
            if let Some(name) = &update.name {
                provider.name = require_text("name", name)?;
            }
            if let Some(category) = update.category {
                provider.category = category;
            }
            if let Some(description) = &update.description {
                provider.description = description.trim().to_string();
            }
            if let Some(phone) = &update.contact_phone {
                provider.contact_phone = require_text("contact_phone", phone)?;
            }
            if let Some(email) = &update.contact_email {
                provider.contact_email = require_text("contact_email", email)?;
            }
            if let Some(address) = &update.address {
                provider.address = address.trim().to_string();
            }
            provider.updated_at = Utc::now();
            Ok(())
        })?;
        self.activity.record(
            schema,
            Some(actor.user_id),
            "UPDATE_SERVICE_PROVIDER",
            "service_provider",
            id,
            json!({}),
        );
        Ok(stored)
    }

    /// Remove a provider together with its reviews.
    pub fn delete(
        &self,
        schema: &SchemaName,
        actor: &Actor,
        id: u64,
    ) -> Result<ServiceProvider, ServiceError> {
        admin_only(actor, "remove")?;
        require(self.providers.as_ref(), schema, id)?;
        for review in self
            .reviews
            .find(schema, &|review| review.service_provider_id == id)?
        {
            self.reviews.delete(schema, review.id)?;
        }
        let removed = self.providers.delete(schema, id)?;
        self.activity.record(
            schema,
            Some(actor.user_id),
            "DELETE_SERVICE_PROVIDER",
            "service_provider",
            id,
            json!({}),
        );
        Ok(removed)
    }

    /// Store a review and refresh the provider's rating. One review per user and provider.
    pub fn add_review(
        &self,
        schema: &SchemaName,
        actor: &Actor,
        provider_id: u64,
        input: NewReview,
    ) -> Result<Review, ServiceError> {
        if !(1..=5).contains(&input.rating) {
            return Err(ServiceError::validation("rating", "must be between 1 and 5"));
        }
        require(self.providers.as_ref(), schema, provider_id)?;
        let user_name = display_name(self.members.as_ref(), schema, actor.user_id)?
            .unwrap_or_else(|| UNKNOWN_REVIEWER.to_string());
        let comment = input
            .comment
            .map(|comment| comment.trim().to_string())
            .filter(|comment| !comment.is_empty());

        let review = Review {
            id: 0,
            service_provider_id: provider_id,
            user_id: actor.user_id,
            user_name,
            rating: input.rating,
            comment,
            created_at: Utc::now(),
        };
        let stored = self
            .reviews
            .insert_unique(schema, review, &|existing| {
                existing.service_provider_id == provider_id && existing.user_id == actor.user_id
            })
            .map_err(|err| match err {
                RepositoryError::Conflict => {
                    ServiceError::conflict("you have already reviewed this provider")
                }
                other => other.into(),
            })?;

        let reviews = self.reviews.as_ref();
        let provider = self.providers.modify(schema, provider_id, &mut |provider| {
            let all = reviews.find(schema, &|review| review.service_provider_id == provider_id)?;
            let (rating, count) = rating_summary(&all);
            provider.rating = rating;
            provider.review_count = count;
            provider.updated_at = Utc::now();
            Ok(())
        })?;

        tracing::info!(%schema, provider_id, rating = provider.rating, reviews = provider.review_count, "provider reviewed");
        self.activity.record(
            schema,
            Some(actor.user_id),
            "REVIEW_SERVICE_PROVIDER",
            "service_provider",
            provider_id,
            json!({ "rating": stored.rating }),
        );
        Ok(stored)
    }

    /// Reviews of a provider, newest first.
    pub fn reviews_for(
        &self,
        schema: &SchemaName,
        provider_id: u64,
    ) -> Result<Vec<Review>, ServiceError> {
        require(self.providers.as_ref(), schema, provider_id)?;
        let mut reviews = self
            .reviews
            .find(schema, &|review| review.service_provider_id == provider_id)?;
        reviews.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(reviews)
    }
}
