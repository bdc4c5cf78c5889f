use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Device type a catalog entry can fill in a campus design
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceType {
    Router,
    CoreSwitch,
    DistributionSwitch,
    AccessSwitch,
    AccessPoint,
}

impl DeviceType {
    /// Every type a design requires, in BOM order
    pub const ALL: [DeviceType; 5] = [
        DeviceType::Router,
        DeviceType::CoreSwitch,
        DeviceType::DistributionSwitch,
        DeviceType::AccessSwitch,
        DeviceType::AccessPoint,
    ];

    /// Storage/wire form ("core_switch")
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceType::Router => "router",
            DeviceType::CoreSwitch => "core_switch",
            DeviceType::DistributionSwitch => "distribution_switch",
            DeviceType::AccessSwitch => "access_switch",
            DeviceType::AccessPoint => "access_point",
        }
    }

    /// Human-facing label used in topology nodes and reports
    pub fn label(&self) -> &'static str {
        match self {
            DeviceType::Router => "Router",
            DeviceType::CoreSwitch => "Core Switch",
            DeviceType::DistributionSwitch => "Distribution Switch",
            DeviceType::AccessSwitch => "Access Switch",
            DeviceType::AccessPoint => "Access Point",
        }
    }
}

/// Displays as the type name used in error messages ("AccessPoint")
impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeviceType::Router => "Router",
            DeviceType::CoreSwitch => "CoreSwitch",
            DeviceType::DistributionSwitch => "DistributionSwitch",
            DeviceType::AccessSwitch => "AccessSwitch",
            DeviceType::AccessPoint => "AccessPoint",
        };
        f.write_str(name)
    }
}

impl FromStr for DeviceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DeviceType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown device type '{}'", s))
    }
}

/// DeviceCatalogEntry is a purchasable device the planner may select
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceCatalogEntry {
    pub id: String,
    pub device_type: DeviceType,
    pub model: String,
    #[serde(default)]
    pub vendor: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port_count: Option<u32>,
    pub poe_capable: bool,
    pub unit_price: f64,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// CreateDeviceRequest for adding or replacing a catalog entry
#[derive(Debug, Clone, Deserialize)]
pub struct CreateDeviceRequest {
    #[serde(default)]
    pub id: String,
    pub device_type: DeviceType,
    pub model: String,
    #[serde(default)]
    pub vendor: String,
    #[serde(default)]
    pub port_count: Option<u32>,
    #[serde(default)]
    pub poe_capable: bool,
    pub unit_price: f64,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}
