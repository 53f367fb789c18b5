//! Service graph for one process: every domain service over a shared [`Database`].

use std::sync::Arc;

use axum::Router;

use crate::assembly::{
    assemblies_router, AssemblyService, DocumentRenderer, Sha256Signer, SignatureProvider,
    StoredDocumentRenderer,
};
use crate::communications::{
    announcements_router, events_router, AnnouncementService, EventService,
};
use crate::config::AssemblyConfig;
use crate::finances::{invoice_rules_router, InvoiceRuleService};
use crate::inventory::{inventory_router, InventoryService};
use crate::marketplace::{marketplace_router, MarketplaceService};
use crate::members::{members_router, MemberService};
use crate::messaging::{messaging_router, MessagingService};
use crate::notifications::{
    activity_router, notification_router, ActivityLogger, EventPublisher, NotificationCenter,
};
use crate::payments::{payments_router, GatewayClient, PaymentService, SimulatedGateway};
use crate::pqr::{pqr_router, PqrService};
use crate::providers::{providers_router, ProviderService};
use crate::reservations::{reservation_router, ReservationService};
use crate::store::Database;

/// Outbound collaborators swapped out in tests or real deployments.
pub struct Integrations {
    pub publisher: Arc<dyn EventPublisher>,
    pub gateway_client: Arc<dyn GatewayClient>,
    pub renderer: Arc<dyn DocumentRenderer>,
    pub signer: Arc<dyn SignatureProvider>,
}

impl Integrations {
    /// In-process implementations: simulated gateway, URL-only documents, SHA-256 signatures.
    pub fn in_process(publisher: Arc<dyn EventPublisher>, config: &AssemblyConfig) -> Self {
        Self {
            publisher,
            gateway_client: Arc::new(SimulatedGateway),
            renderer: Arc::new(StoredDocumentRenderer::new(
                config.documents_base_url.clone(),
            )),
            signer: Arc::new(Sha256Signer),
        }
    }
}

#[derive(Clone)]
pub struct Services {
    pub notifications: Arc<NotificationCenter>,
    pub activity: Arc<ActivityLogger>,
    pub members: Arc<MemberService>,
    pub inventory: Arc<InventoryService>,
    pub reservations: Arc<ReservationService>,
    pub marketplace: Arc<MarketplaceService>,
    pub pqr: Arc<PqrService>,
    pub payments: Arc<PaymentService>,
    pub announcements: Arc<AnnouncementService>,
    pub events: Arc<EventService>,
    pub messaging: Arc<MessagingService>,
    pub providers: Arc<ProviderService>,
    pub invoice_rules: Arc<InvoiceRuleService>,
    pub assemblies: Arc<AssemblyService>,
}

impl Services {
    pub fn new(database: &Database, integrations: Integrations, config: AssemblyConfig) -> Self {
        let Integrations {
            publisher,
            gateway_client,
            renderer,
            signer,
        } = integrations;

        let activity = Arc::new(ActivityLogger::new(database.activity.clone()));
        let notifications = Arc::new(NotificationCenter::new(database, publisher.clone()));

        Self {
            members: Arc::new(MemberService::new(database, activity.clone())),
            inventory: Arc::new(InventoryService::new(database, activity.clone())),
            reservations: Arc::new(ReservationService::new(
                database,
                notifications.clone(),
                activity.clone(),
            )),
            marketplace: Arc::new(MarketplaceService::new(
                database,
                publisher.clone(),
                notifications.clone(),
                activity.clone(),
            )),
            pqr: Arc::new(PqrService::new(
                database,
                notifications.clone(),
                activity.clone(),
            )),
            payments: Arc::new(PaymentService::new(
                database,
                gateway_client,
                notifications.clone(),
                activity.clone(),
            )),
            announcements: Arc::new(AnnouncementService::new(
                database,
                publisher.clone(),
                activity.clone(),
            )),
            events: Arc::new(EventService::new(
                database,
                publisher.clone(),
                notifications.clone(),
                activity.clone(),
            )),
            messaging: Arc::new(MessagingService::new(
                database,
                publisher.clone(),
                notifications.clone(),
            )),
            providers: Arc::new(ProviderService::new(database, activity.clone())),
            invoice_rules: Arc::new(InvoiceRuleService::new(database, activity.clone())),
            assemblies: Arc::new(AssemblyService::new(
                database,
                publisher,
                activity.clone(),
                renderer,
                signer,
                config,
            )),
            notifications,
            activity,
        }
    }

    /// Every `/api/v1` route of the domain modules.
    pub fn router(&self) -> Router {
        Router::new()
            .merge(notification_router(self.notifications.clone()))
            .merge(activity_router(self.activity.clone()))
            .merge(members_router(self.members.clone()))
            .merge(inventory_router(self.inventory.clone()))
            .merge(reservation_router(self.reservations.clone()))
            .merge(marketplace_router(self.marketplace.clone()))
            .merge(pqr_router(self.pqr.clone()))
            .merge(payments_router(self.payments.clone()))
            .merge(announcements_router(self.announcements.clone()))
            .merge(events_router(self.events.clone()))
            .merge(messaging_router(self.messaging.clone()))
            .merge(providers_router(self.providers.clone()))
            .merge(invoice_rules_router(self.invoice_rules.clone()))
            .merge(assemblies_router(self.assemblies.clone()))
    }
}
