//! Tenant-scoped storage.
//!
//! Services only see [`Repository`] trait objects. The in-memory implementation keeps one
//! table per tenant schema, so a row inserted under one schema is invisible from any other.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::assembly::{
    Assembly, AssemblyMinutes, Attendee, DigitalSignature, Vote, Voting,
};
use crate::communications::{Announcement, AnnouncementRead, CommunityEvent, EventAttendee};
use crate::error::ServiceError;
use crate::finances::InvoiceRule;
use crate::inventory::{CommonArea, ParkingSpot, Pet, Property, Resident, Vehicle};
use crate::marketplace::{Listing, ListingReport, MarketMessage};
use crate::members::Member;
use crate::messaging::{Conversation, Message, MessageRead};
use crate::notifications::{ActivityEntry, Notification, NotificationConfirmation};
use crate::payments::{GatewayConfig, Payment, Transaction};
use crate::pqr::{PqrComment, PqrTicket};
use crate::providers::{Review, ServiceProvider};
use crate::reservations::Reservation;
use crate::tenancy::SchemaName;

/// Row type stored by a [`Repository`].
pub trait Entity: Clone + Send + Sync + 'static {
    const KIND: &'static str;

    fn id(&self) -> u64;
    fn assign_id(&mut self, id: u64);
}

/// Implements [`Entity`] for a row struct carrying an `id: u64` field.
macro_rules! impl_entity {
    ($row:ty, $kind:literal) => {
        impl $crate::store::Entity for $row {
            const KIND: &'static str = $kind;

            fn id(&self) -> u64 {
                self.id
            }

            fn assign_id(&mut self, id: u64) {
                self.id = id;
            }
        }
    };
}

pub(crate) use impl_entity;

/// Storage abstraction so services can be exercised in isolation.
pub trait Repository<T: Entity>: Send + Sync {
    /// Store a new row under the next sequential id of the tenant.
    fn insert(&self, schema: &SchemaName, record: T) -> Result<T, RepositoryError>;
    /// Like `insert`, but fails with `Conflict` when an existing row matches `conflicts`.
    fn insert_unique(
        &self,
        schema: &SchemaName,
        record: T,
        conflicts: &dyn Fn(&T) -> bool,
    ) -> Result<T, RepositoryError>;
    fn update(&self, schema: &SchemaName, record: T) -> Result<T, RepositoryError>;
    /// Apply `change` to the stored row while the table is held.
    ///
    /// Nothing is written when `change` fails. `change` must not call back into the same
    /// repository.
    fn modify(
        &self,
        schema: &SchemaName,
        id: u64,
        change: &mut dyn FnMut(&mut T) -> Result<(), ServiceError>,
    ) -> Result<T, ServiceError>;
    /// Like `modify`, but fails with `Conflict` when `conflicts(changed, other)` holds for
    /// any other row.
    fn modify_unique(
        &self,
        schema: &SchemaName,
        id: u64,
        change: &mut dyn FnMut(&mut T) -> Result<(), ServiceError>,
        conflicts: &dyn Fn(&T, &T) -> bool,
    ) -> Result<T, ServiceError>;
    fn fetch(&self, schema: &SchemaName, id: u64) -> Result<Option<T>, RepositoryError>;
    fn delete(&self, schema: &SchemaName, id: u64) -> Result<T, RepositoryError>;
    fn list(&self, schema: &SchemaName) -> Result<Vec<T>, RepositoryError>;

    fn find(
        &self,
        schema: &SchemaName,
        predicate: &dyn Fn(&T) -> bool,
    ) -> Result<Vec<T>, RepositoryError> {
        Ok(self
            .list(schema)?
            .into_iter()
            .filter(|record| predicate(record))
            .collect())
    }
}

/// Error enumeration for repository failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Fetch a row or fail with a typed `NotFound`.
pub fn require<T: Entity>(
    repository: &dyn Repository<T>,
    schema: &SchemaName,
    id: u64,
) -> Result<T, ServiceError> {
    repository
        .fetch(schema, id)?
        .ok_or_else(|| ServiceError::not_found(T::KIND, id))
}

#[derive(Debug)]
struct Table<T> {
    next_id: u64,
    rows: BTreeMap<u64, T>,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self {
            next_id: 1,
            rows: BTreeMap::new(),
        }
    }
}

impl<T: Entity> Table<T> {
    fn push(&mut self, mut record: T) -> T {
        let id = self.next_id;
        self.next_id += 1;
        record.assign_id(id);
        self.rows.insert(id, record.clone());
        record
    }
}

/// Mutex-guarded per-tenant tables ordered by id.
#[derive(Debug)]
pub struct MemoryRepository<T> {
    tables: Mutex<HashMap<SchemaName, Table<T>>>,
}

impl<T> Default for MemoryRepository<T> {
    fn default() -> Self {
        Self {
            tables: Mutex::new(HashMap::new()),
        }
    }
}

impl<T: Entity> MemoryRepository<T> {
    fn lock(&self) -> Result<MutexGuard<'_, HashMap<SchemaName, Table<T>>>, RepositoryError> {
        self.tables
            .lock()
            .map_err(|_| RepositoryError::Unavailable(format!("{} table poisoned", T::KIND)))
    }
}

impl<T: Entity> Repository<T> for MemoryRepository<T> {
    fn insert(&self, schema: &SchemaName, record: T) -> Result<T, RepositoryError> {
        let mut tables = self.lock()?;
        Ok(tables.entry(schema.clone()).or_default().push(record))
    }

    fn insert_unique(
        &self,
        schema: &SchemaName,
        record: T,
        conflicts: &dyn Fn(&T) -> bool,
    ) -> Result<T, RepositoryError> {
        let mut tables = self.lock()?;
        let table = tables.entry(schema.clone()).or_default();
        if table.rows.values().any(|existing| conflicts(existing)) {
            return Err(RepositoryError::Conflict);
        }
        Ok(table.push(record))
    }

    fn update(&self, schema: &SchemaName, record: T) -> Result<T, RepositoryError> {
        let mut tables = self.lock()?;
        let row = tables
            .get_mut(schema)
            .and_then(|table| table.rows.get_mut(&record.id()))
            .ok_or(RepositoryError::NotFound)?;
        *row = record.clone();
        Ok(record)
    }

    fn modify(
        &self,
        schema: &SchemaName,
        id: u64,
        change: &mut dyn FnMut(&mut T) -> Result<(), ServiceError>,
    ) -> Result<T, ServiceError> {
        let mut tables = self.lock()?;
        let row = tables
            .get_mut(schema)
            .and_then(|table| table.rows.get_mut(&id))
            .ok_or_else(|| ServiceError::not_found(T::KIND, id))?;
        let mut draft = row.clone();
        change(&mut draft)?;
        *row = draft.clone();
        Ok(draft)
    }

    fn modify_unique(
        &self,
        schema: &SchemaName,
        id: u64,
        change: &mut dyn FnMut(&mut T) -> Result<(), ServiceError>,
        conflicts: &dyn Fn(&T, &T) -> bool,
    ) -> Result<T, ServiceError> {
        let mut tables = self.lock()?;
        let table = tables
            .get_mut(schema)
            .ok_or_else(|| ServiceError::not_found(T::KIND, id))?;
        let mut draft = table
            .rows
            .get(&id)
            .cloned()
            .ok_or_else(|| ServiceError::not_found(T::KIND, id))?;
        change(&mut draft)?;
        if table
            .rows
            .values()
            .any(|other| other.id() != id && conflicts(&draft, other))
        {
            return Err(RepositoryError::Conflict.into());
        }
        table.rows.insert(id, draft.clone());
        Ok(draft)
    }

    fn fetch(&self, schema: &SchemaName, id: u64) -> Result<Option<T>, RepositoryError> {
        let tables = self.lock()?;
        Ok(tables
            .get(schema)
            .and_then(|table| table.rows.get(&id))
            .cloned())
    }

    fn delete(&self, schema: &SchemaName, id: u64) -> Result<T, RepositoryError> {
        let mut tables = self.lock()?;
        tables
            .get_mut(schema)
            .and_then(|table| table.rows.remove(&id))
            .ok_or(RepositoryError::NotFound)
    }

    fn list(&self, schema: &SchemaName) -> Result<Vec<T>, RepositoryError> {
        let tables = self.lock()?;
        Ok(tables
            .get(schema)
            .map(|table| table.rows.values().cloned().collect())
            .unwrap_or_default())
    }
}

/// Every repository the services need, as trait objects.
#[derive(Clone)]
pub struct Database {
    pub members: Arc<dyn Repository<Member>>,
    pub properties: Arc<dyn Repository<Property>>,
    pub residents: Arc<dyn Repository<Resident>>,
    pub pets: Arc<dyn Repository<Pet>>,
    pub vehicles: Arc<dyn Repository<Vehicle>>,
    pub common_areas: Arc<dyn Repository<CommonArea>>,
    pub parking_spots: Arc<dyn Repository<ParkingSpot>>,
    pub reservations: Arc<dyn Repository<Reservation>>,
    pub listings: Arc<dyn Repository<Listing>>,
    pub listing_reports: Arc<dyn Repository<ListingReport>>,
    pub market_messages: Arc<dyn Repository<MarketMessage>>,
    pub pqr_tickets: Arc<dyn Repository<PqrTicket>>,
    pub pqr_comments: Arc<dyn Repository<PqrComment>>,
    pub gateways: Arc<dyn Repository<GatewayConfig>>,
    pub payments: Arc<dyn Repository<Payment>>,
    pub transactions: Arc<dyn Repository<Transaction>>,
    pub announcements: Arc<dyn Repository<Announcement>>,
    pub announcement_reads: Arc<dyn Repository<AnnouncementRead>>,
    pub community_events: Arc<dyn Repository<CommunityEvent>>,
    pub event_attendees: Arc<dyn Repository<EventAttendee>>,
    pub conversations: Arc<dyn Repository<Conversation>>,
    pub messages: Arc<dyn Repository<Message>>,
    pub message_reads: Arc<dyn Repository<MessageRead>>,
    pub service_providers: Arc<dyn Repository<ServiceProvider>>,
    pub reviews: Arc<dyn Repository<Review>>,
    pub invoice_rules: Arc<dyn Repository<InvoiceRule>>,
    pub assemblies: Arc<dyn Repository<Assembly>>,
    pub attendees: Arc<dyn Repository<Attendee>>,
    pub votings: Arc<dyn Repository<Voting>>,
    pub votes: Arc<dyn Repository<Vote>>,
    pub minutes: Arc<dyn Repository<AssemblyMinutes>>,
    pub signatures: Arc<dyn Repository<DigitalSignature>>,
    pub notifications: Arc<dyn Repository<Notification>>,
    pub notification_confirmations: Arc<dyn Repository<NotificationConfirmation>>,
    pub activity: Arc<dyn Repository<ActivityEntry>>,
}

impl Database {
    pub fn in_memory() -> Self {
        Self {
            members: Arc::new(MemoryRepository::default()),
            properties: Arc::new(MemoryRepository::default()),
            residents: Arc::new(MemoryRepository::default()),
            pets: Arc::new(MemoryRepository::default()),
            vehicles: Arc::new(MemoryRepository::default()),
            common_areas: Arc::new(MemoryRepository::default()),
            parking_spots: Arc::new(MemoryRepository::default()),
            reservations: Arc::new(MemoryRepository::default()),
            listings: Arc::new(MemoryRepository::default()),
            listing_reports: Arc::new(MemoryRepository::default()),
            market_messages: Arc::new(MemoryRepository::default()),
            pqr_tickets: Arc::new(MemoryRepository::default()),
            pqr_comments: Arc::new(MemoryRepository::default()),
            gateways: Arc::new(MemoryRepository::default()),
            payments: Arc::new(MemoryRepository::default()),
            transactions: Arc::new(MemoryRepository::default()),
            announcements: Arc::new(MemoryRepository::default()),
            announcement_reads: Arc::new(MemoryRepository::default()),
            community_events: Arc::new(MemoryRepository::default()),
            event_attendees: Arc::new(MemoryRepository::default()),
            conversations: Arc::new(MemoryRepository::default()),
            messages: Arc::new(MemoryRepository::default()),
            message_reads: Arc::new(MemoryRepository::default()),
            service_providers: Arc::new(MemoryRepository::default()),
            reviews: Arc::new(MemoryRepository::default()),
            invoice_rules: Arc::new(MemoryRepository::default()),
            assemblies: Arc::new(MemoryRepository::default()),
            attendees: Arc::new(MemoryRepository::default()),
            votings: Arc::new(MemoryRepository::default()),
            votes: Arc::new(MemoryRepository::default()),
            minutes: Arc::new(MemoryRepository::default()),
            signatures: Arc::new(MemoryRepository::default()),
            notifications: Arc::new(MemoryRepository::default()),
            notification_confirmations: Arc::new(MemoryRepository::default()),
            activity: Arc::new(MemoryRepository::default()),
        }
    }
}

impl Default for Database {
    fn default() -> Self {
        Self::in_memory()
    }
}
