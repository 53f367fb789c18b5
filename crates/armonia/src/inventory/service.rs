use std::collections::{HashMap, HashSet};
use std::io::Read;
use std::sync::Arc;

use chrono::{Datelike, Utc};
use serde::Serialize;
use serde_json::json;

use super::domain::{
    CommonArea, CommonAreaUpdate, InventoryStats, NewCommonArea, NewParkingSpot, NewPet,
    NewProperty, NewResident, NewVehicle, ParkingSpot, ParkingSpotUpdate, Pet, PetView, Property,
    PropertyUpdate, PropertyView, Resident, ResidentStatus, ResidentUpdate, Vehicle, VehicleView,
};
use super::sheet;
use crate::error::{require_text, ServiceError};
use crate::notifications::ActivityLogger;
use crate::store::{require, Database, Repository, RepositoryError};
use crate::tenancy::{Actor, SchemaName};

const MIN_VEHICLE_YEAR: i32 = 1900;

/// Properties, residents, pets, vehicles, common areas and parking spots of a complex.
pub struct InventoryService {
    properties: Arc<dyn Repository<Property>>,
    residents: Arc<dyn Repository<Resident>>,
    pets: Arc<dyn Repository<Pet>>,
    vehicles: Arc<dyn Repository<Vehicle>>,
    common_areas: Arc<dyn Repository<CommonArea>>,
    parking_spots: Arc<dyn Repository<ParkingSpot>>,
    activity: Arc<ActivityLogger>,
}

/// Result of a bulk property import.
#[derive(Debug, Clone, Serialize)]
pub struct ImportSummary {
    pub created: Vec<Property>,
    pub skipped: Vec<ImportIssue>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportIssue {
    pub unit_number: String,
    pub reason: String,
}

fn validate_coefficient(value: f64) -> Result<f64, ServiceError> {
    if !(0.0..=100.0).contains(&value) {
        return Err(ServiceError::validation(
            "coefficient",
            "must be between 0 and 100",
        ));
    }
    Ok(value)
}

fn validate_email(email: Option<String>) -> Result<Option<String>, ServiceError> {
    match email.map(|raw| raw.trim().to_string()) {
        Some(value) if value.is_empty() => Ok(None),
        Some(value) if !value.contains('@') => Err(ServiceError::validation(
            "email",
            "must be a valid e-mail address",
        )),
        other => Ok(other),
    }
}

/// Highest hourly rate a common area may charge, in minor units.
pub const MAX_HOURLY_RATE: u64 = 1_000_000_000;

fn validate_hourly_rate(rate: Option<u64>) -> Result<Option<u64>, ServiceError> {
    match rate {
        Some(rate) if rate > MAX_HOURLY_RATE => Err(ServiceError::validation(
            "hourly_rate",
            format!("must be at most {MAX_HOURLY_RATE}"),
        )),
        other => Ok(other),
    }
}

fn validate_capacity(capacity: u32) -> Result<u32, ServiceError> {
    if capacity == 0 {
        return Err(ServiceError::validation("capacity", "must be at least 1"));
    }
    Ok(capacity)
}

impl InventoryService {
    pub fn new(database: &Database, activity: Arc<ActivityLogger>) -> Self {
        Self {
            properties: database.properties.clone(),
            residents: database.residents.clone(),
            pets: database.pets.clone(),
            vehicles: database.vehicles.clone(),
            common_areas: database.common_areas.clone(),
            parking_spots: database.parking_spots.clone(),
            activity,
        }
    }

    fn log(&self, schema: &SchemaName, actor: &Actor, action: &str, kind: &str, id: u64) {
        self.activity
            .record(schema, Some(actor.user_id), action, kind, id, json!({}));
    }

    fn active_resident_counts(
        &self,
        schema: &SchemaName,
    ) -> Result<HashMap<u64, usize>, ServiceError> {
        let mut counts = HashMap::new();
        for resident in self
            .residents
            .find(schema, &|resident| resident.status == ResidentStatus::Active)?
        {
            *counts.entry(resident.property_id).or_insert(0) += 1;
        }
        Ok(counts)
    }

    fn complex_properties(
        &self,
        schema: &SchemaName,
        complex_id: u64,
    ) -> Result<HashMap<u64, Property>, ServiceError> {
        Ok(self
            .properties
            .find(schema, &|property| property.complex_id == complex_id)?
            .into_iter()
            .map(|property| (property.id, property))
            .collect())
    }

    pub fn list_properties(
        &self,
        schema: &SchemaName,
        complex_id: u64,
    ) -> Result<Vec<PropertyView>, ServiceError> {
        let counts = self.active_resident_counts(schema)?;
        let mut views: Vec<PropertyView> = self
            .properties
            .find(schema, &|property| property.complex_id == complex_id)?
            .into_iter()
            .map(|property| PropertyView {
                active_residents: counts.get(&property.id).copied().unwrap_or(0),
                property,
            })
            .collect();
        views.sort_by(|a, b| a.property.unit_number.cmp(&b.property.unit_number));
        Ok(views)
    }

    pub fn get_property(&self, schema: &SchemaName, id: u64) -> Result<PropertyView, ServiceError> {
        let property = require(self.properties.as_ref(), schema, id)?;
        let active_residents = self
            .residents
            .find(schema, &|resident| {
                resident.property_id == id && resident.status == ResidentStatus::Active
            })?
            .len();
        Ok(PropertyView {
            property,
            active_residents,
        })
    }

    pub fn create_property(
        &self,
        schema: &SchemaName,
        actor: &Actor,
        input: NewProperty,
    ) -> Result<Property, ServiceError> {
        let unit_number = require_text("unit_number", &input.unit_number)?;
        let coefficient = validate_coefficient(input.coefficient)?;
        let now = Utc::now();
        let property = Property {
            id: 0,
            complex_id: input.complex_id,
            unit_number: unit_number.clone(),
            property_type: input.property_type,
            status: input.status,
            area: input.area,
            block: input.block,
            zone: input.zone,
            owner_id: input.owner_id,
            owner_name: input.owner_name,
            coefficient,
            created_at: now,
            updated_at: now,
        };

        let stored = self
            .properties
            .insert_unique(schema, property, &|existing| {
                existing.complex_id == input.complex_id && existing.unit_number == unit_number
            })
            .map_err(|err| match err {
                RepositoryError::Conflict => ServiceError::conflict(format!(
                    "unit {unit_number} already exists in complex {}",
                    input.complex_id
                )),
                other => other.into(),
            })?;

        tracing::info!(%schema, property_id = stored.id, unit = %stored.unit_number, "property created");
        self.log(schema, actor, "CREATE_PROPERTY", "property", stored.id);
        Ok(stored)
    }

    pub fn update_property(
        &self,
        schema: &SchemaName,
        actor: &Actor,
        id: u64,
        update: PropertyUpdate,
    ) -> Result<Property, ServiceError> {
        let mut property = require(self.properties.as_ref(), schema, id)?;

        if let Some(raw) = update.unit_number {
            let unit_number = require_text("unit_number", &raw)?;
            let complex_id = property.complex_id;
            let taken = !self
                .properties
                .find(schema, &|other| {
                    other.id != id && other.complex_id == complex_id && other.unit_number == unit_number
                })?
                .is_empty();
            if taken {
                return Err(ServiceError::conflict(format!(
                    "unit {unit_number} already exists in complex {complex_id}"
                )));
            }
            property.unit_number = unit_number;
        }
        if let Some(coefficient) = update.coefficient {
            property.coefficient = validate_coefficient(coefficient)?;
        }
        if let Some(property_type) = update.property_type {
            property.property_type = property_type;
        }
        if let Some(status) = update.status {
            property.status = status;
        }
        if update.area.is_some() {
            property.area = update.area;
        }
        if update.block.is_some() {
            property.block = update.block;
        }
        if update.zone.is_some() {
            property.zone = update.zone;
        }
        if update.owner_id.is_some() {
            property.owner_id = update.owner_id;
        }
        if update.owner_name.is_some() {
            property.owner_name = update.owner_name;
        }
        property.updated_at = Utc::now();

        let stored = self.properties.update(schema, property)?;
        self.log(schema, actor, "UPDATE_PROPERTY", "property", id);
        Ok(stored)
    }

    pub fn list_residents(
        &self,
        schema: &SchemaName,
        complex_id: u64,
        property_id: Option<u64>,
    ) -> Result<Vec<Resident>, ServiceError> {
        let properties = self.complex_properties(schema, complex_id)?;
        let mut residents = self.residents.find(schema, &|resident| {
            properties.contains_key(&resident.property_id)
                && property_id.map_or(true, |id| resident.property_id == id)
        })?;
        residents.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(residents)
    }

    pub fn create_resident(
        &self,
        schema: &SchemaName,
        actor: &Actor,
        input: NewResident,
    ) -> Result<Resident, ServiceError> {
        require(self.properties.as_ref(), schema, input.property_id)?;
        let name = require_text("name", &input.name)?;
        let email = validate_email(input.email)?;
        let now = Utc::now();

        let stored = self.residents.insert(
            schema,
            Resident {
                id: 0,
                property_id: input.property_id,
                user_id: input.user_id,
                name,
                email,
                phone: input.phone,
                document_number: input.document_number,
                is_owner: input.is_owner,
                status: ResidentStatus::Active,
                move_in_date: input.move_in_date,
                created_at: now,
                updated_at: now,
            },
        )?;
        self.log(schema, actor, "CREATE_RESIDENT", "resident", stored.id);
        Ok(stored)
    }

    pub fn update_resident(
        &self,
        schema: &SchemaName,
        actor: &Actor,
        id: u64,
        update: ResidentUpdate,
    ) -> Result<Resident, ServiceError> {
        let mut resident = require(self.residents.as_ref(), schema, id)?;
        if let Some(name) = update.name {
            resident.name = require_text("name", &name)?;
        }
        if update.email.is_some() {
            resident.email = validate_email(update.email)?;
        }
        if update.phone.is_some() {
            resident.phone = update.phone;
        }
        if update.document_number.is_some() {
            resident.document_number = update.document_number;
        }
        if let Some(is_owner) = update.is_owner {
            resident.is_owner = is_owner;
        }
        if let Some(status) = update.status {
            resident.status = status;
        }
        if update.move_in_date.is_some() {
            resident.move_in_date = update.move_in_date;
        }
        resident.updated_at = Utc::now();

        let stored = self.residents.update(schema, resident)?;
        self.log(schema, actor, "UPDATE_RESIDENT", "resident", id);
        Ok(stored)
    }

    pub fn delete_resident(
        &self,
        schema: &SchemaName,
        actor: &Actor,
        id: u64,
    ) -> Result<Resident, ServiceError> {
        let removed = self.residents.delete(schema, id).map_err(|err| match err {
            RepositoryError::NotFound => ServiceError::not_found("resident", id),
            other => other.into(),
        })?;
        self.log(schema, actor, "DELETE_RESIDENT", "resident", id);
        Ok(removed)
    }

    /// Resolve a resident and check it lives in `property_id`.
    fn household(
        &self,
        schema: &SchemaName,
        property_id: u64,
        resident_id: u64,
    ) -> Result<(Property, Resident), ServiceError> {
        let property = require(self.properties.as_ref(), schema, property_id)?;
        let resident = require(self.residents.as_ref(), schema, resident_id)?;
        if resident.property_id != property.id {
            return Err(ServiceError::validation(
                "resident_id",
                format!("resident {resident_id} does not live in property {property_id}"),
            ));
        }
        Ok((property, resident))
    }

    fn names(&self, schema: &SchemaName) -> Result<HashMap<u64, String>, ServiceError> {
        Ok(self
            .residents
            .list(schema)?
            .into_iter()
            .map(|resident| (resident.id, resident.name))
            .collect())
    }

    pub fn list_pets(
        &self,
        schema: &SchemaName,
        complex_id: u64,
        property_id: Option<u64>,
    ) -> Result<Vec<PetView>, ServiceError> {
        let properties = self.complex_properties(schema, complex_id)?;
        let names = self.names(schema)?;
        let mut views: Vec<PetView> = self
            .pets
            .find(schema, &|pet| {
                properties.contains_key(&pet.property_id)
                    && property_id.map_or(true, |id| pet.property_id == id)
            })?
            .into_iter()
            .map(|pet| PetView {
                unit_number: properties
                    .get(&pet.property_id)
                    .map(|property| property.unit_number.clone())
                    .unwrap_or_default(),
                resident_name: names.get(&pet.resident_id).cloned().unwrap_or_default(),
                pet,
            })
            .collect();
        views.sort_by(|a, b| a.pet.name.cmp(&b.pet.name));
        Ok(views)
    }

    pub fn create_pet(
        &self,
        schema: &SchemaName,
        actor: &Actor,
        input: NewPet,
    ) -> Result<PetView, ServiceError> {
        let name = require_text("name", &input.name)?;
        let (property, resident) = self.household(schema, input.property_id, input.resident_id)?;

        let pet = self.pets.insert(
            schema,
            Pet {
                id: 0,
                property_id: property.id,
                resident_id: resident.id,
                name,
                pet_type: input.pet_type,
                breed: input.breed,
                age: input.age,
                weight: input.weight,
                color: input.color,
                vaccinated: input.vaccinated,
                vaccine_expiry_date: input.vaccine_expiry_date,
                notes: input.notes,
                created_at: Utc::now(),
            },
        )?;
        self.log(schema, actor, "CREATE_PET", "pet", pet.id);
        Ok(PetView {
            pet,
            unit_number: property.unit_number,
            resident_name: resident.name,
        })
    }

    pub fn list_vehicles(
        &self,
        schema: &SchemaName,
        complex_id: u64,
        property_id: Option<u64>,
    ) -> Result<Vec<VehicleView>, ServiceError> {
        let properties = self.complex_properties(schema, complex_id)?;
        let names = self.names(schema)?;
        let mut views: Vec<VehicleView> = self
            .vehicles
            .find(schema, &|vehicle| {
                properties.contains_key(&vehicle.property_id)
                    && property_id.map_or(true, |id| vehicle.property_id == id)
            })?
            .into_iter()
            .map(|vehicle| VehicleView {
                unit_number: properties
                    .get(&vehicle.property_id)
                    .map(|property| property.unit_number.clone())
                    .unwrap_or_default(),
                resident_name: names.get(&vehicle.resident_id).cloned().unwrap_or_default(),
                vehicle,
            })
            .collect();
        views.sort_by(|a, b| a.vehicle.license_plate.cmp(&b.vehicle.license_plate));
        Ok(views)
    }

    pub fn create_vehicle(
        &self,
        schema: &SchemaName,
        actor: &Actor,
        input: NewVehicle,
    ) -> Result<VehicleView, ServiceError> {
        let plate = require_text("license_plate", &input.license_plate)?.to_uppercase();
        let brand = require_text("brand", &input.brand)?;
        let model = require_text("model", &input.model)?;
        let max_year = Utc::now().year() + 1;
        if !(MIN_VEHICLE_YEAR..=max_year).contains(&input.year) {
            return Err(ServiceError::validation(
                "year",
                format!("must be between {MIN_VEHICLE_YEAR} and {max_year}"),
            ));
        }
        let (property, resident) = self.household(schema, input.property_id, input.resident_id)?;

        let vehicle = Vehicle {
            id: 0,
            property_id: property.id,
            resident_id: resident.id,
            license_plate: plate.clone(),
            brand,
            model,
            year: input.year,
            color: input.color.trim().to_string(),
            vehicle_type: input.vehicle_type,
            parking_spot: input.parking_spot,
            notes: input.notes,
            created_at: Utc::now(),
        };
        let stored = self
            .vehicles
            .insert_unique(schema, vehicle, &|existing| existing.license_plate == plate)
            .map_err(|err| match err {
                RepositoryError::Conflict => {
                    ServiceError::conflict(format!("license plate {plate} is already registered"))
                }
                other => other.into(),
            })?;

        self.log(schema, actor, "CREATE_VEHICLE", "vehicle", stored.id);
        Ok(VehicleView {
            vehicle: stored,
            unit_number: property.unit_number,
            resident_name: resident.name,
        })
    }

    pub fn create_common_area(
        &self,
        schema: &SchemaName,
        actor: &Actor,
        input: NewCommonArea,
    ) -> Result<CommonArea, ServiceError> {
        let name = require_text("name", &input.name)?;
        let capacity = validate_capacity(input.capacity)?;
        let hourly_rate = validate_hourly_rate(input.hourly_rate)?;
        let now = Utc::now();

        let stored = self.common_areas.insert(
            schema,
            CommonArea {
                id: 0,
                complex_id: input.complex_id,
                name,
                description: input.description,
                area_type: input.area_type,
                capacity,
                is_active: input.is_active,
                requires_approval: input.requires_approval,
                hourly_rate,
                created_at: now,
                updated_at: now,
            },
        )?;
        self.log(schema, actor, "CREATE_COMMON_AREA", "common_area", stored.id);
        Ok(stored)
    }

    pub fn list_common_areas(
        &self,
        schema: &SchemaName,
        complex_id: u64,
        active_only: bool,
    ) -> Result<Vec<CommonArea>, ServiceError> {
        let mut areas = self.common_areas.find(schema, &|area| {
            area.complex_id == complex_id && (!active_only || area.is_active)
        })?;
        areas.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(areas)
    }

    pub fn get_common_area(&self, schema: &SchemaName, id: u64) -> Result<CommonArea, ServiceError> {
        require(self.common_areas.as_ref(), schema, id)
    }

    pub fn update_common_area(
        &self,
        schema: &SchemaName,
        actor: &Actor,
        id: u64,
        update: CommonAreaUpdate,
    ) -> Result<CommonArea, ServiceError> {
        let mut area = require(self.common_areas.as_ref(), schema, id)?;
        if let Some(name) = update.name {
            area.name = require_text("name", &name)?;
        }
        if let Some(capacity) = update.capacity {
            area.capacity = validate_capacity(capacity)?;
        }
        if update.description.is_some() {
            area.description = update.description;
        }
        if let Some(area_type) = update.area_type {
            area.area_type = area_type;
        }
        if let Some(is_active) = update.is_active {
            area.is_active = is_active;
        }
        if let Some(requires_approval) = update.requires_approval {
            area.requires_approval = requires_approval;
        }
        if update.hourly_rate.is_some() {
            area.hourly_rate = validate_hourly_rate(update.hourly_rate)?;
        }
        area.updated_at = Utc::now();

        let stored = self.common_areas.update(schema, area)?;
        self.log(schema, actor, "UPDATE_COMMON_AREA", "common_area", id);
        Ok(stored)
    }

    pub fn delete_common_area(
        &self,
        schema: &SchemaName,
        actor: &Actor,
        id: u64,
    ) -> Result<CommonArea, ServiceError> {
        require(self.common_areas.as_ref(), schema, id)?;
        let removed = self.common_areas.delete(schema, id)?;
        self.log(schema, actor, "DELETE_COMMON_AREA", "common_area", id);
        Ok(removed)
    }

    pub fn create_parking_spot(
        &self,
        schema: &SchemaName,
        actor: &Actor,
        input: NewParkingSpot,
    ) -> Result<ParkingSpot, ServiceError> {
        let number = require_text("number", &input.number)?;
        if let Some(property_id) = input.property_id {
            require(self.properties.as_ref(), schema, property_id)?;
        }
        let now = Utc::now();
        let spot = ParkingSpot {
            id: 0,
            complex_id: input.complex_id,
            number: number.clone(),
            spot_type: input.spot_type,
            status: input.status,
            property_id: input.property_id,
            created_at: now,
            updated_at: now,
        };

        let stored = self
            .parking_spots
            .insert_unique(schema, spot, &|existing| {
                existing.complex_id == input.complex_id && existing.number == number
            })
            .map_err(|err| match err {
                RepositoryError::Conflict => ServiceError::conflict(format!(
                    "parking spot {number} already exists in complex {}",
                    input.complex_id
                )),
                other => other.into(),
            })?;
        self.log(schema, actor, "CREATE_PARKING_SPOT", "parking_spot", stored.id);
        Ok(stored)
    }

    pub fn list_parking_spots(
        &self,
        schema: &SchemaName,
        complex_id: u64,
    ) -> Result<Vec<ParkingSpot>, ServiceError> {
        let mut spots = self
            .parking_spots
            .find(schema, &|spot| spot.complex_id == complex_id)?;
        spots.sort_by(|a, b| a.number.cmp(&b.number));
        Ok(spots)
    }

    pub fn get_parking_spot(&self, schema: &SchemaName, id: u64) -> Result<ParkingSpot, ServiceError> {
        require(self.parking_spots.as_ref(), schema, id)
    }

    pub fn update_parking_spot(
        &self,
        schema: &SchemaName,
        actor: &Actor,
        id: u64,
        update: ParkingSpotUpdate,
    ) -> Result<ParkingSpot, ServiceError> {
        let mut spot = require(self.parking_spots.as_ref(), schema, id)?;
        if let Some(raw) = update.number {
            let number = require_text("number", &raw)?;
            let complex_id = spot.complex_id;
            let taken = !self
                .parking_spots
                .find(schema, &|other| {
                    other.id != id && other.complex_id == complex_id && other.number == number
                })?
                .is_empty();
            if taken {
                return Err(ServiceError::conflict(format!(
                    "parking spot {number} already exists in complex {complex_id}"
                )));
            }
            spot.number = number;
        }
        if let Some(property_id) = update.property_id {
            require(self.properties.as_ref(), schema, property_id)?;
            spot.property_id = Some(property_id);
        }
        if let Some(spot_type) = update.spot_type {
            spot.spot_type = spot_type;
        }
        if let Some(status) = update.status {
            spot.status = status;
        }
        spot.updated_at = Utc::now();

        let stored = self.parking_spots.update(schema, spot)?;
        self.log(schema, actor, "UPDATE_PARKING_SPOT", "parking_spot", id);
        Ok(stored)
    }

    pub fn delete_parking_spot(
        &self,
        schema: &SchemaName,
        actor: &Actor,
        id: u64,
    ) -> Result<ParkingSpot, ServiceError> {
        require(self.parking_spots.as_ref(), schema, id)?;
        let removed = self.parking_spots.delete(schema, id)?;
        self.log(schema, actor, "DELETE_PARKING_SPOT", "parking_spot", id);
        Ok(removed)
    }

    pub fn inventory_stats(
        &self,
        schema: &SchemaName,
        complex_id: u64,
    ) -> Result<InventoryStats, ServiceError> {
        let properties = self.complex_properties(schema, complex_id)?;
        let property_ids: HashSet<u64> = properties.keys().copied().collect();

        let active_residents = self
            .residents
            .find(schema, &|resident| {
                property_ids.contains(&resident.property_id)
                    && resident.status == ResidentStatus::Active
            })?
            .len();
        let total_pets = self
            .pets
            .find(schema, &|pet| property_ids.contains(&pet.property_id))?
            .len();
        let total_vehicles = self
            .vehicles
            .find(schema, &|vehicle| property_ids.contains(&vehicle.property_id))?
            .len();
        let common_areas = self
            .common_areas
            .find(schema, &|area| area.complex_id == complex_id)?
            .len();

        Ok(InventoryStats {
            total_properties: properties.len(),
            occupied_properties: properties
                .values()
                .filter(|property| property.status.is_occupied())
                .count(),
            active_residents,
            total_pets,
            total_vehicles,
            common_areas,
        })
    }

    pub fn export_properties_csv(
        &self,
        schema: &SchemaName,
        complex_id: u64,
    ) -> Result<String, ServiceError> {
        let views = self.list_properties(schema, complex_id)?;
        let bytes =
            sheet::write_properties(&views).map_err(|err| ServiceError::Export(err.to_string()))?;
        String::from_utf8(bytes).map_err(|err| ServiceError::Export(err.to_string()))
    }

    /// Create every property in the sheet. Duplicates and invalid rows are reported, not fatal.
    pub fn import_properties_csv<R: Read>(
        &self,
        schema: &SchemaName,
        actor: &Actor,
        complex_id: u64,
        reader: R,
    ) -> Result<ImportSummary, ServiceError> {
        let drafts = sheet::parse_properties(reader, complex_id)
            .map_err(|err| ServiceError::validation("csv", err.to_string()))?;

        let mut summary = ImportSummary {
            created: Vec::new(),
            skipped: Vec::new(),
        };
        for draft in drafts {
            let unit_number = draft.unit_number.clone();
            match self.create_property(schema, actor, draft) {
                Ok(property) => summary.created.push(property),
                Err(ServiceError::Repository(err)) => return Err(err.into()),
                Err(err) => summary.skipped.push(ImportIssue {
                    unit_number,
                    reason: err.to_string(),
                }),
            }
        }

        tracing::info!(
            %schema,
            complex_id,
            created = summary.created.len(),
            skipped = summary.skipped.len(),
            "property import finished"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::domain::{PetType, PropertyStatus, PropertyType, VehicleType};
    use crate::store::MemoryRepository;

    fn service() -> InventoryService {
        let database = Database::in_memory();
        let activity = Arc::new(ActivityLogger::new(Arc::new(MemoryRepository::default())));
        InventoryService::new(&database, activity)
    }

    fn schema() -> SchemaName {
        SchemaName::parse("tenant_a").expect("valid schema")
    }

    fn admin() -> Actor {
        Actor::admin(1)
    }

    fn property(unit: &str, coefficient: f64) -> NewProperty {
        NewProperty {
            complex_id: 1,
            unit_number: unit.to_string(),
            property_type: PropertyType::Apartment,
            status: PropertyStatus::Occupied,
            area: Some(70.0),
            block: Some("A".to_string()),
            zone: None,
            owner_id: None,
            owner_name: Some("Laura".to_string()),
            coefficient,
        }
    }

    fn resident(property_id: u64, name: &str) -> NewResident {
        NewResident {
            property_id,
            user_id: None,
            name: name.to_string(),
            email: Some(format!("{}@example.com", name.to_lowercase())),
            phone: None,
            document_number: None,
            is_owner: true,
            move_in_date: None,
        }
    }

    #[test]
    fn unit_numbers_are_unique_per_complex() {
        let service = service();
        service
            .create_property(&schema(), &admin(), property("101", 2.5))
            .expect("first property");
        let error = service
            .create_property(&schema(), &admin(), property("101", 2.5))
            .expect_err("duplicate unit");
        assert!(matches!(error, ServiceError::Conflict(_)));

        let mut other_complex = property("101", 2.5);
        other_complex.complex_id = 2;
        assert!(service
            .create_property(&schema(), &admin(), other_complex)
            .is_ok());
    }

    #[test]
    fn rejects_out_of_range_coefficient() {
        let error = service()
            .create_property(&schema(), &admin(), property("101", 120.0))
            .expect_err("coefficient rejected");
        assert!(matches!(error, ServiceError::Validation(_)));
    }

    #[test]
    fn property_views_count_active_residents() {
        let service = service();
        let unit = service
            .create_property(&schema(), &admin(), property("202", 3.0))
            .expect("property");
        service
            .create_property(&schema(), &admin(), property("101", 3.0))
            .expect("property");
        service
            .create_resident(&schema(), &admin(), resident(unit.id, "Ana"))
            .expect("resident");
        let moved_out = service
            .create_resident(&schema(), &admin(), resident(unit.id, "Luis"))
            .expect("resident");
        service
            .update_resident(
                &schema(),
                &admin(),
                moved_out.id,
                ResidentUpdate {
                    status: Some(ResidentStatus::Inactive),
                    ..ResidentUpdate::default()
                },
            )
            .expect("resident updated");

        let views = service.list_properties(&schema(), 1).expect("listed");
        assert_eq!(views[0].property.unit_number, "101");
        assert_eq!(views[1].active_residents, 1);

        let stats = service.inventory_stats(&schema(), 1).expect("stats");
        assert_eq!(stats.total_properties, 2);
        assert_eq!(stats.occupied_properties, 2);
        assert_eq!(stats.active_residents, 1);
    }

    #[test]
    fn pets_require_resident_of_the_property() {
        let service = service();
        let first = service
            .create_property(&schema(), &admin(), property("101", 1.0))
            .expect("property");
        let second = service
            .create_property(&schema(), &admin(), property("102", 1.0))
            .expect("property");
        let ana = service
            .create_resident(&schema(), &admin(), resident(first.id, "Ana"))
            .expect("resident");

        let pet = NewPet {
            property_id: second.id,
            resident_id: ana.id,
            name: "Toby".to_string(),
            pet_type: PetType::Dog,
            breed: None,
            age: Some(3),
            weight: None,
            color: None,
            vaccinated: true,
            vaccine_expiry_date: None,
            notes: None,
        };
        let error = service
            .create_pet(&schema(), &admin(), pet.clone())
            .expect_err("wrong household");
        assert!(matches!(error, ServiceError::Validation(_)));

        let view = service
            .create_pet(
                &schema(),
                &admin(),
                NewPet {
                    property_id: first.id,
                    ..pet
                },
            )
            .expect("pet registered");
        assert_eq!(view.unit_number, "101");
        assert_eq!(view.resident_name, "Ana");
    }

    #[test]
    fn vehicle_plates_are_upper_cased_and_unique() {
        let service = service();
        let unit = service
            .create_property(&schema(), &admin(), property("101", 1.0))
            .expect("property");
        let ana = service
            .create_resident(&schema(), &admin(), resident(unit.id, "Ana"))
            .expect("resident");
        let vehicle = |plate: &str| NewVehicle {
            property_id: unit.id,
            resident_id: ana.id,
            license_plate: plate.to_string(),
            brand: "Mazda".to_string(),
            model: "3".to_string(),
            year: 2020,
            color: "Rojo".to_string(),
            vehicle_type: VehicleType::Car,
            parking_spot: None,
            notes: None,
        };

        let view = service
            .create_vehicle(&schema(), &admin(), vehicle("abc123"))
            .expect("vehicle");
        assert_eq!(view.vehicle.license_plate, "ABC123");

        let error = service
            .create_vehicle(&schema(), &admin(), vehicle(" ABC123 "))
            .expect_err("duplicate plate");
        assert!(matches!(error, ServiceError::Conflict(_)));

        let mut vintage = vehicle("OLD001");
        vintage.year = 1850;
        assert!(matches!(
            service.create_vehicle(&schema(), &admin(), vintage),
            Err(ServiceError::Validation(_))
        ));
    }

    #[test]
    fn import_reports_duplicates_without_failing() {
        let service = service();
        service
            .create_property(&schema(), &admin(), property("101", 1.0))
            .expect("property");
        let sheet = "unit_number,type,coefficient\n101,APARTMENT,1\n102,APARTMENT,1.5\n";

        let summary = service
            .import_properties_csv(&schema(), &admin(), 1, sheet.as_bytes())
            .expect("import runs");
        assert_eq!(summary.created.len(), 1);
        assert_eq!(summary.skipped.len(), 1);
        assert_eq!(summary.skipped[0].unit_number, "101");

        let export = service.export_properties_csv(&schema(), 1).expect("export");
        let lines: Vec<&str> = export.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[1].starts_with("101,APARTMENT,OCCUPIED,A,,70"));
    }
}
