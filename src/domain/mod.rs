pub mod client;
pub mod constraints;
pub mod consumption;
pub mod features;
pub mod planning;
pub mod prices;
pub mod time_slot;
pub mod water_heater;

pub use client::{Client, ClientDoc};
pub use constraints::Constraints;
pub use consumption::ConsumptionProfile;
pub use features::{Features, OptimizationMode};
pub use planning::{Planning, Setpoint};
pub use prices::{Prices, TariffMode};
pub use time_slot::TimeSlot;
pub use water_heater::{WaterHeater, WATER_HEAT_CAPACITY};
