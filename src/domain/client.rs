use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::domain::constraints::Constraints;
use crate::domain::consumption::ConsumptionProfile;
use crate::domain::features::{Features, OptimizationMode};
use crate::domain::planning::{Planning, Setpoint};
use crate::domain::prices::{Prices, TariffMode};
use crate::domain::time_slot::TimeSlot;
use crate::domain::water_heater::WaterHeater;
use crate::error::{OptimizerError, Result};

/// Fully configured optimization client: weekly schedule, restrictions,
/// feature flags, tariff and heater physics.
#[derive(Debug, Clone, PartialEq)]
pub struct Client {
    pub client_id: i64,
    pub planning: Planning,
    pub constraints: Constraints,
    pub features: Features,
    pub prices: Prices,
    pub water_heater: WaterHeater,
}

impl Client {
    pub fn new(
        client_id: i64,
        planning: Planning,
        constraints: Constraints,
        features: Features,
        prices: Prices,
        water_heater: WaterHeater,
    ) -> Self {
        Self {
            client_id,
            planning,
            constraints,
            features,
            prices,
            water_heater,
        }
    }

    /// Builds a client from its wire document. Any parse or validation
    /// failure surfaces as a single error; nothing is partially constructed.
    pub fn from_doc(doc: ClientDoc) -> Result<Self> {
        doc.try_into()
    }

    pub fn to_doc(&self) -> ClientDoc {
        ClientDoc::from(self)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let doc: ClientDoc = serde_yaml::from_str(yaml)
            .map_err(|e| OptimizerError::validation(format!("client config parse failed: {e}")))?;
        Self::from_doc(doc)
    }

    pub fn to_yaml(&self) -> String {
        serde_yaml::to_string(&self.to_doc()).expect("client document always serializes")
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let doc: ClientDoc = serde_json::from_str(json)
            .map_err(|e| OptimizerError::validation(format!("client config parse failed: {e}")))?;
        Self::from_doc(doc)
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.to_doc()).expect("client document always serializes")
    }
}

// ---------------------------------------------------------------------------
// Wire document
// ---------------------------------------------------------------------------

/// Serialized form of a client, the canonical format at the service boundary.
/// Field names are part of the external contract and must not change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientDoc {
    #[serde(default)]
    pub client_id: i64,
    pub water_heater: WaterHeaterDoc,
    pub prices: PricesDoc,
    pub features: FeaturesDoc,
    pub constraints: ConstraintsDoc,
    #[serde(default)]
    pub planning: Vec<SetpointDoc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaterHeaterDoc {
    pub volume: f64,
    pub power: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub insulation_coeff: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temp_cold_water: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricesDoc {
    pub mode: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hp_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hc_price: Option<f64>,
    pub resell_price: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hp_slots: Option<Vec<SlotDoc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotDoc {
    pub start: String,
    pub end: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeaturesDoc {
    pub gradation: bool,
    pub mode: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstraintsDoc {
    pub min_temp: f64,
    #[serde(default)]
    pub forbidden_slots: Vec<SlotDoc>,
    #[serde(default)]
    pub consumption_profile: Option<Vec<Vec<f64>>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetpointDoc {
    pub day: u8,
    pub time: String,
    pub target_temp: f64,
    #[serde(default)]
    pub volume: f64,
}

/// Parses a 24-hour `HH:MM` string.
fn parse_time(text: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(text, "%H:%M")
        .map_err(|_| OptimizerError::validation(format!("invalid time '{text}', expected HH:MM")))
}

fn format_time(time: NaiveTime) -> String {
    time.format("%H:%M").to_string()
}

impl SlotDoc {
    fn to_slot(&self) -> Result<TimeSlot> {
        TimeSlot::new(parse_time(&self.start)?, parse_time(&self.end)?)
    }

    fn from_slot(slot: &TimeSlot) -> Self {
        Self {
            start: format_time(slot.start()),
            end: format_time(slot.end()),
        }
    }
}

impl TryFrom<ClientDoc> for Client {
    type Error = OptimizerError;

    fn try_from(doc: ClientDoc) -> Result<Self> {
        let mut water_heater = WaterHeater::new(doc.water_heater.volume, doc.water_heater.power)?;
        if let Some(coeff) = doc.water_heater.insulation_coeff {
            water_heater.set_insulation(coeff)?;
        }
        if let Some(temp) = doc.water_heater.temp_cold_water {
            water_heater.set_cold_water(temp)?;
        }

        let mode = TariffMode::from_str(&doc.prices.mode)?;
        let mut prices = Prices::new(mode);
        prices.set_resale(doc.prices.resell_price)?;
        match mode {
            TariffMode::Base => {
                if let Some(base) = doc.prices.base_price {
                    prices.set_base(base)?;
                }
            }
            TariffMode::PeakOffPeak => {
                if let Some(peak) = doc.prices.hp_price {
                    prices.set_peak(peak)?;
                }
                if let Some(offpeak) = doc.prices.hc_price {
                    prices.set_offpeak(offpeak)?;
                }
                if let Some(slots) = &doc.prices.hp_slots {
                    let parsed: Result<Vec<TimeSlot>> =
                        slots.iter().map(SlotDoc::to_slot).collect();
                    prices.set_peak_slots(parsed?)?;
                }
            }
        }

        let features = Features::new(
            doc.features.gradation,
            OptimizationMode::from_str(&doc.features.mode)?,
        );

        let forbidden: Result<Vec<TimeSlot>> = doc
            .constraints
            .forbidden_slots
            .iter()
            .map(SlotDoc::to_slot)
            .collect();
        let profile = match &doc.constraints.consumption_profile {
            Some(rows) => ConsumptionProfile::from_rows(rows)?,
            None => ConsumptionProfile::flat(),
        };
        let constraints = Constraints::new(profile, forbidden?, doc.constraints.min_temp)?;

        let setpoints: Result<Vec<Setpoint>> = doc
            .planning
            .iter()
            .map(|sp| Setpoint::new(sp.day, parse_time(&sp.time)?, sp.target_temp, sp.volume))
            .collect();
        let planning = Planning::from_setpoints(setpoints?);

        Ok(Client::new(
            doc.client_id,
            planning,
            constraints,
            features,
            prices,
            water_heater,
        ))
    }
}

impl From<&Client> for ClientDoc {
    fn from(client: &Client) -> Self {
        let prices = &client.prices;
        let prices_doc = match prices.mode() {
            TariffMode::Base => PricesDoc {
                mode: prices.mode().as_str().to_string(),
                base_price: prices.base().ok(),
                hp_price: None,
                hc_price: None,
                resell_price: prices.resale(),
                hp_slots: None,
            },
            TariffMode::PeakOffPeak => PricesDoc {
                mode: prices.mode().as_str().to_string(),
                base_price: None,
                hp_price: prices.peak().ok(),
                hc_price: prices.offpeak().ok(),
                resell_price: prices.resale(),
                hp_slots: prices
                    .peak_slots()
                    .ok()
                    .map(|slots| slots.iter().map(SlotDoc::from_slot).collect()),
            },
        };

        Self {
            client_id: client.client_id,
            water_heater: WaterHeaterDoc {
                volume: client.water_heater.volume(),
                power: client.water_heater.power(),
                insulation_coeff: Some(client.water_heater.insulation()),
                temp_cold_water: Some(client.water_heater.cold_water()),
            },
            prices: prices_doc,
            features: FeaturesDoc {
                gradation: client.features.gradation,
                mode: client.features.mode.as_str().to_string(),
            },
            constraints: ConstraintsDoc {
                min_temp: client.constraints.minimum_temperature(),
                forbidden_slots: client
                    .constraints
                    .forbidden_slots()
                    .iter()
                    .map(SlotDoc::from_slot)
                    .collect(),
                consumption_profile: Some(client.constraints.consumption_profile().to_rows()),
            },
            planning: client
                .planning
                .setpoints()
                .iter()
                .map(|sp| SetpointDoc {
                    day: sp.day(),
                    time: format_time(sp.time()),
                    target_temp: sp.temperature(),
                    volume: sp.drawn_volume(),
                })
                .collect(),
        }
    }
}
