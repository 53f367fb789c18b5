use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::store::impl_entity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PropertyType {
    Apartment,
    House,
    Office,
    Commercial,
    Parking,
    Storage,
}

impl PropertyType {
    pub const fn label(self) -> &'static str {
        match self {
            PropertyType::Apartment => "APARTMENT",
            PropertyType::House => "HOUSE",
            PropertyType::Office => "OFFICE",
            PropertyType::Commercial => "COMMERCIAL",
            PropertyType::Parking => "PARKING",
            PropertyType::Storage => "STORAGE",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PropertyStatus {
    #[default]
    Available,
    Occupied,
    Rented,
    UnderMaintenance,
}

impl PropertyStatus {
    pub const fn label(self) -> &'static str {
        match self {
            PropertyStatus::Available => "AVAILABLE",
            PropertyStatus::Occupied => "OCCUPIED",
            PropertyStatus::Rented => "RENTED",
            PropertyStatus::UnderMaintenance => "UNDER_MAINTENANCE",
        }
    }

    pub fn is_occupied(self) -> bool {
        matches!(self, PropertyStatus::Occupied | PropertyStatus::Rented)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResidentStatus {
    #[default]
    Active,
    Inactive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PetType {
    Dog,
    Cat,
    Bird,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VehicleType {
    Car,
    Motorcycle,
    Bicycle,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AreaType {
    Salon,
    Bbq,
    Court,
    Pool,
    Gym,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SpotType {
    Covered,
    Uncovered,
    Visitor,
    Disabled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SpotStatus {
    #[default]
    Available,
    Occupied,
    Reserved,
    Maintenance,
}

/// A unit within a residential complex. `coefficient` is its ownership share in percent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    pub id: u64,
    pub complex_id: u64,
    pub unit_number: String,
    pub property_type: PropertyType,
    pub status: PropertyStatus,
    pub area: Option<f64>,
    pub block: Option<String>,
    pub zone: Option<String>,
    pub owner_id: Option<u64>,
    pub owner_name: Option<String>,
    pub coefficient: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resident {
    pub id: u64,
    pub property_id: u64,
    pub user_id: Option<u64>,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub document_number: Option<String>,
    pub is_owner: bool,
    pub status: ResidentStatus,
    pub move_in_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pet {
    pub id: u64,
    pub property_id: u64,
    pub resident_id: u64,
    pub name: String,
    pub pet_type: PetType,
    pub breed: Option<String>,
    pub age: Option<u32>,
    pub weight: Option<f64>,
    pub color: Option<String>,
    pub vaccinated: bool,
    pub vaccine_expiry_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: u64,
    pub property_id: u64,
    pub resident_id: u64,
    pub license_plate: String,
    pub brand: String,
    pub model: String,
    pub year: i32,
    pub color: String,
    pub vehicle_type: VehicleType,
    pub parking_spot: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Bookable shared facility. `hourly_rate` is in minor currency units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommonArea {
    pub id: u64,
    pub complex_id: u64,
    pub name: String,
    pub description: Option<String>,
    pub area_type: AreaType,
    pub capacity: u32,
    pub is_active: bool,
    pub requires_approval: bool,
    pub hourly_rate: Option<u64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParkingSpot {
    pub id: u64,
    pub complex_id: u64,
    pub number: String,
    pub spot_type: SpotType,
    pub status: SpotStatus,
    pub property_id: Option<u64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl_entity!(Property, "property");
impl_entity!(Resident, "resident");
impl_entity!(Pet, "pet");
impl_entity!(Vehicle, "vehicle");
impl_entity!(CommonArea, "common area");
impl_entity!(ParkingSpot, "parking spot");

#[derive(Debug, Clone, Deserialize)]
pub struct NewProperty {
    pub complex_id: u64,
    pub unit_number: String,
    pub property_type: PropertyType,
    #[serde(default)]
    pub status: PropertyStatus,
    pub area: Option<f64>,
    pub block: Option<String>,
    pub zone: Option<String>,
    pub owner_id: Option<u64>,
    pub owner_name: Option<String>,
    #[serde(default)]
    pub coefficient: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PropertyUpdate {
    pub unit_number: Option<String>,
    pub property_type: Option<PropertyType>,
    pub status: Option<PropertyStatus>,
    pub area: Option<f64>,
    pub block: Option<String>,
    pub zone: Option<String>,
    pub owner_id: Option<u64>,
    pub owner_name: Option<String>,
    pub coefficient: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewResident {
    pub property_id: u64,
    pub user_id: Option<u64>,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub document_number: Option<String>,
    #[serde(default)]
    pub is_owner: bool,
    pub move_in_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResidentUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub document_number: Option<String>,
    pub is_owner: Option<bool>,
    pub status: Option<ResidentStatus>,
    pub move_in_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewPet {
    pub property_id: u64,
    pub resident_id: u64,
    pub name: String,
    pub pet_type: PetType,
    pub breed: Option<String>,
    pub age: Option<u32>,
    pub weight: Option<f64>,
    pub color: Option<String>,
    #[serde(default)]
    pub vaccinated: bool,
    pub vaccine_expiry_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewVehicle {
    pub property_id: u64,
    pub resident_id: u64,
    pub license_plate: String,
    pub brand: String,
    pub model: String,
    pub year: i32,
    pub color: String,
    pub vehicle_type: VehicleType,
    pub parking_spot: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewCommonArea {
    pub complex_id: u64,
    pub name: String,
    pub description: Option<String>,
    pub area_type: AreaType,
    pub capacity: u32,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub requires_approval: bool,
    pub hourly_rate: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommonAreaUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub area_type: Option<AreaType>,
    pub capacity: Option<u32>,
    pub is_active: Option<bool>,
    pub requires_approval: Option<bool>,
    pub hourly_rate: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewParkingSpot {
    pub complex_id: u64,
    pub number: String,
    pub spot_type: SpotType,
    #[serde(default)]
    pub status: SpotStatus,
    pub property_id: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ParkingSpotUpdate {
    pub number: Option<String>,
    pub spot_type: Option<SpotType>,
    pub status: Option<SpotStatus>,
    pub property_id: Option<u64>,
}

fn default_true() -> bool {
    true
}

/// Property enriched with its active resident count.
#[derive(Debug, Clone, Serialize)]
pub struct PropertyView {
    #[serde(flatten)]
    pub property: Property,
    pub active_residents: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct PetView {
    #[serde(flatten)]
    pub pet: Pet,
    pub unit_number: String,
    pub resident_name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct VehicleView {
    #[serde(flatten)]
    pub vehicle: Vehicle,
    pub unit_number: String,
    pub resident_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InventoryStats {
    pub total_properties: usize,
    pub occupied_properties: usize,
    pub active_residents: usize,
    pub total_pets: usize,
    pub total_vehicles: usize,
    pub common_areas: usize,
}
