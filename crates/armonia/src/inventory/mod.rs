//! Complex inventory: units, households, pets, vehicles, common areas and parking.

mod domain;
mod router;
mod service;
mod sheet;

pub use domain::{
    AreaType, CommonArea, CommonAreaUpdate, InventoryStats, NewCommonArea, NewParkingSpot, NewPet,
    NewProperty, NewResident, NewVehicle, ParkingSpot, ParkingSpotUpdate, Pet, PetType, PetView,
    Property, PropertyStatus, PropertyType, PropertyUpdate, PropertyView, Resident,
    ResidentStatus, ResidentUpdate, SpotStatus, SpotType, Vehicle, VehicleType, VehicleView,
};
pub use router::{inventory_router, InventoryQuery};
pub use service::{ImportIssue, ImportSummary, InventoryService};
