pub mod flight;
pub mod inventory;

pub use flight::{
    Flight, FlightError, FlightStatus, FlightUpdate, Location, NewFlight, PriceTiers, SeatClass,
    SeatPool, SeatPools,
};
pub use inventory::{allocate_seats, InventoryError, DEFAULT_PROBE_LIMIT};
