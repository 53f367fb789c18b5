use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use sha2::{Digest, Sha256};

use super::domain::{
    CategoryView, Listing, ListingCategory, ListingFilter, ListingPage, ListingReport,
    ListingStatus, ListingUpdate, MarketMessage, ModerationAction, NewListing, NewMessage,
    NewReport, ReportStatus, ReportView, Resolution, UploadedImage,
};
use crate::error::{require_text, ServiceError};
use crate::notifications::{
    publish, ActivityLogger, EventPublisher, NotificationCenter, NotificationDraft,
    NotificationKind, NotificationSource, RealtimeEvent,
};
use crate::store::{require, Database, Repository, RepositoryError};
use crate::tenancy::{Actor, SchemaName};

pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

/// The `image/*` MIME type guessed from a file name's extension.
pub fn image_mime(file_name: &str) -> Result<mime_guess::Mime, ServiceError> {
    mime_guess::from_path(file_name)
        .first()
        .filter(|mime| mime.type_() == mime_guess::mime::IMAGE)
        .ok_or_else(|| {
            ServiceError::validation("images", format!("{file_name} is not an image file"))
        })
}

/// Resident-to-resident classifieds with moderation and buyer/seller messaging.
pub struct MarketplaceService {
    listings: Arc<dyn Repository<Listing>>,
    reports: Arc<dyn Repository<ListingReport>>,
    messages: Arc<dyn Repository<MarketMessage>>,
    publisher: Arc<dyn EventPublisher>,
    notifications: Arc<NotificationCenter>,
    activity: Arc<ActivityLogger>,
}

impl MarketplaceService {
    pub fn new(
        database: &Database,
        publisher: Arc<dyn EventPublisher>,
        notifications: Arc<NotificationCenter>,
        activity: Arc<ActivityLogger>,
    ) -> Self {
        Self {
            listings: database.listings.clone(),
            reports: database.listing_reports.clone(),
            messages: database.market_messages.clone(),
            publisher,
            notifications,
            activity,
        }
    }

    fn validate_images(images: Vec<String>) -> Result<Vec<String>, ServiceError> {
        images
            .into_iter()
            .map(|name| {
                let name = require_text("images", &name)?;
                image_mime(&name)?;
                Ok(name)
            })
            .collect()
    }

    /// Live listing: deleted ones are reported as missing.
    fn visible(&self, schema: &SchemaName, id: u64) -> Result<Listing, ServiceError> {
        let listing = require(self.listings.as_ref(), schema, id)?;
        if listing.status == ListingStatus::Deleted {
            return Err(ServiceError::not_found("listing", id));
        }
        Ok(listing)
    }

    fn seller_owned(
        &self,
        schema: &SchemaName,
        actor: &Actor,
        id: u64,
    ) -> Result<Listing, ServiceError> {
        let listing = self.visible(schema, id)?;
        if listing.seller_id != actor.user_id {
            return Err(ServiceError::forbidden("only the seller can change this listing"));
        }
        Ok(listing)
    }

    pub fn create_listing(
        &self,
        schema: &SchemaName,
        actor: &Actor,
        input: NewListing,
    ) -> Result<Listing, ServiceError> {
        let title = require_text("title", &input.title)?;
        let description = require_text("description", &input.description)?;
        let images = Self::validate_images(input.images)?;
        let now = Utc::now();

        let stored = self.listings.insert(
            schema,
            Listing {
                id: 0,
                seller_id: actor.user_id,
                title,
                description,
                price: input.price,
                category: input.category,
                images,
                status: ListingStatus::Active,
                created_at: now,
                updated_at: now,
            },
        )?;
        self.activity.record(
            schema,
            Some(actor.user_id),
            "CREATE_LISTING",
            "listing",
            stored.id,
            json!({ "category": stored.category }),
        );
        Ok(stored)
    }

    pub fn list_listings(
        &self,
        schema: &SchemaName,
        filter: &ListingFilter,
    ) -> Result<ListingPage, ServiceError> {
        let mut listings = self.listings.find(schema, &|listing| filter.matches(listing))?;
        listings.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        let (page, limit) = filter.window();
        let total = listings.len();
        let listings = listings
            .into_iter()
            .skip((page - 1) * limit)
            .take(limit)
            .collect();

        Ok(ListingPage {
            listings,
            total,
            page,
            limit,
            total_pages: total.div_ceil(limit),
        })
    }

    pub fn get_listing(&self, schema: &SchemaName, id: u64) -> Result<Listing, ServiceError> {
        self.visible(schema, id)
    }

    pub fn update_listing(
        &self,
        schema: &SchemaName,
        actor: &Actor,
        id: u64,
        update: ListingUpdate,
    ) -> Result<Listing, ServiceError> {
        let mut listing = self.seller_owned(schema, actor, id)?;
        if let Some(title) = update.title {
            listing.title = require_text("title", &title)?;
        }
        if let Some(description) = update.description {
            listing.description = require_text("description", &description)?;
        }
        if let Some(images) = update.images {
            listing.images = Self::validate_images(images)?;
        }
        if let Some(price) = update.price {
            listing.price = price;
        }
        if let Some(category) = update.category {
            listing.category = category;
        }
        listing.updated_at = Utc::now();

        let stored = self.listings.update(schema, listing)?;
        self.activity.record(
            schema,
            Some(actor.user_id),
            "UPDATE_LISTING",
            "listing",
            id,
            json!({}),
        );
        Ok(stored)
    }

    pub fn delete_listing(
        &self,
        schema: &SchemaName,
        actor: &Actor,
        id: u64,
    ) -> Result<Listing, ServiceError> {
        let mut listing = self.visible(schema, id)?;
        if listing.seller_id != actor.user_id && !actor.is_admin() {
            return Err(ServiceError::forbidden(
                "only the seller or an administrator can delete this listing",
            ));
        }
        listing.status = ListingStatus::Deleted;
        listing.updated_at = Utc::now();

        let stored = self.listings.update(schema, listing)?;
        self.activity.record(
            schema,
            Some(actor.user_id),
            "DELETE_LISTING",
            "listing",
            id,
            json!({}),
        );
        Ok(stored)
    }

    pub fn mark_sold(
        &self,
        schema: &SchemaName,
        actor: &Actor,
        id: u64,
    ) -> Result<Listing, ServiceError> {
        let mut listing = self.seller_owned(schema, actor, id)?;
        if listing.status != ListingStatus::Active {
            return Err(ServiceError::invalid_state(format!(
                "cannot sell a listing with status {}",
                listing.status.label()
            )));
        }
        listing.status = ListingStatus::Sold;
        listing.updated_at = Utc::now();

        let stored = self.listings.update(schema, listing)?;
        self.activity.record(
            schema,
            Some(actor.user_id),
            "SELL_LISTING",
            "listing",
            id,
            json!({}),
        );
        Ok(stored)
    }

    pub fn report_listing(
        &self,
        schema: &SchemaName,
        actor: &Actor,
        input: NewReport,
    ) -> Result<ListingReport, ServiceError> {
        let reason = require_text("reason", &input.reason)?;
        let mut listing = self.visible(schema, input.listing_id)?;
        let reporter_id = actor.user_id;

        let report = self
            .reports
            .insert_unique(
                schema,
                ListingReport {
                    id: 0,
                    listing_id: listing.id,
                    reporter_id,
                    reason,
                    status: ReportStatus::Pending,
                    resolution: None,
                    created_at: Utc::now(),
                },
                &|existing| {
                    existing.listing_id == input.listing_id
                        && existing.reporter_id == reporter_id
                        && existing.status == ReportStatus::Pending
                },
            )
            .map_err(|err| match err {
                RepositoryError::Conflict => {
                    ServiceError::conflict("you already reported this listing")
                }
                other => other.into(),
            })?;

        if listing.status == ListingStatus::Active {
            listing.status = ListingStatus::Reported;
            listing.updated_at = Utc::now();
            self.listings.update(schema, listing)?;
        }

        tracing::info!(%schema, listing_id = input.listing_id, report_id = report.id, "listing reported");
        self.activity.record(
            schema,
            Some(reporter_id),
            "REPORT_LISTING",
            "listing",
            input.listing_id,
            json!({ "report_id": report.id }),
        );
        Ok(report)
    }

    pub fn reported_listings(
        &self,
        schema: &SchemaName,
        actor: &Actor,
    ) -> Result<Vec<ReportView>, ServiceError> {
        if !actor.is_admin() {
            return Err(ServiceError::forbidden("moderation is restricted to administrators"));
        }
        let pending = self
            .reports
            .find(schema, &|report| report.status == ReportStatus::Pending)?;
        pending
            .into_iter()
            .map(|report| {
                let listing = require(self.listings.as_ref(), schema, report.listing_id)?;
                Ok(ReportView { report, listing })
            })
            .collect()
    }

    pub fn resolve_report(
        &self,
        schema: &SchemaName,
        actor: &Actor,
        report_id: u64,
        resolution: Resolution,
    ) -> Result<ReportView, ServiceError> {
        if !actor.is_admin() {
            return Err(ServiceError::forbidden("moderation is restricted to administrators"));
        }
        let mut report = require(self.reports.as_ref(), schema, report_id)?;
        if report.status != ReportStatus::Pending {
            return Err(ServiceError::invalid_state("report is already resolved"));
        }
        let mut listing = require(self.listings.as_ref(), schema, report.listing_id)?;

        let verdict = match resolution.action {
            ModerationAction::Dismiss => {
                if listing.status == ListingStatus::Reported {
                    listing.status = ListingStatus::Active;
                }
                "dismissed"
            }
            ModerationAction::Remove => {
                listing.status = ListingStatus::Deleted;
                "removed"
            }
        };
        listing.updated_at = Utc::now();
        let listing = self.listings.update(schema, listing)?;

        report.status = ReportStatus::Resolved;
        report.resolution = Some(match resolution.notes {
            Some(notes) if !notes.trim().is_empty() => format!("{verdict}: {}", notes.trim()),
            _ => verdict.to_string(),
        });
        let report = self.reports.update(schema, report)?;

        self.activity.record(
            schema,
            Some(actor.user_id),
            "RESOLVE_REPORT",
            "listing",
            listing.id,
            json!({ "report_id": report.id, "action": resolution.action }),
        );
        if resolution.action == ModerationAction::Remove {
            self.notifications.deliver(
                schema,
                listing.seller_id,
                NotificationDraft::new(
                    NotificationSource::Marketplace,
                    "Listing removed",
                    format!("\"{}\" was removed after a moderation review", listing.title),
                )
                .kind(NotificationKind::Warning)
                .source_id(listing.id),
            );
        }
        Ok(ReportView { report, listing })
    }

    pub fn send_message(
        &self,
        schema: &SchemaName,
        actor: &Actor,
        input: NewMessage,
    ) -> Result<MarketMessage, ServiceError> {
        let content = require_text("content", &input.content)?;
        if input.receiver_id == actor.user_id {
            return Err(ServiceError::validation(
                "receiver_id",
                "cannot send a message to yourself",
            ));
        }
        let listing = self.visible(schema, input.listing_id)?;

        let stored = self.messages.insert(
            schema,
            MarketMessage {
                id: 0,
                listing_id: listing.id,
                sender_id: actor.user_id,
                receiver_id: input.receiver_id,
                content,
                read: false,
                created_at: Utc::now(),
            },
        )?;

        publish(
            self.publisher.as_ref(),
            schema,
            RealtimeEvent::new(
                "MARKET_MESSAGE",
                format!("user-{}", stored.receiver_id),
                json!(stored),
            ),
        );
        Ok(stored)
    }

    pub fn messages_for(
        &self,
        schema: &SchemaName,
        listing_id: u64,
        user_id: u64,
    ) -> Result<Vec<MarketMessage>, ServiceError> {
        let mut messages = self.messages.find(schema, &|message| {
            message.listing_id == listing_id
                && (message.sender_id == user_id || message.receiver_id == user_id)
        })?;
        messages.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(messages)
    }

    pub fn categories(&self) -> Vec<CategoryView> {
        ListingCategory::ALL
            .iter()
            .map(|category| CategoryView {
                value: *category,
                label: category.display_name(),
            })
            .collect()
    }

    /// Validate an uploaded listing photo and derive its content-addressed URL.
    pub fn upload_image(
        &self,
        schema: &SchemaName,
        file_name: &str,
        content: &[u8],
    ) -> Result<UploadedImage, ServiceError> {
        let mime = image_mime(file_name)?;
        if content.is_empty() || content.len() > MAX_IMAGE_BYTES {
            return Err(ServiceError::validation(
                "file",
                format!("images must be between 1 byte and {MAX_IMAGE_BYTES} bytes"),
            ));
        }

        let digest = format!("{:x}", Sha256::digest(content));
        let extension = Path::new(file_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_else(|| mime.subtype().to_string());

        Ok(UploadedImage {
            url: format!("/uploads/{schema}/marketplace/{}.{extension}", &digest[..16]),
            content_type: mime.essence_str().to_string(),
            size: content.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_names_must_map_to_image_types() {
        assert_eq!(image_mime("sofa.JPG").expect("jpeg").essence_str(), "image/jpeg");
        assert!(image_mime("photo.webp").is_ok());
        assert!(image_mime("invoice.pdf").is_err());
        assert!(image_mime("no-extension").is_err());
    }

    #[test]
    fn filter_window_clamps_page_size() {
        let filter = ListingFilter {
            page: Some(0),
            limit: Some(500),
            ..ListingFilter::default()
        };
        assert_eq!(filter.window(), (1, 100));
        assert_eq!(ListingFilter::default().window(), (1, 20));
    }
}
