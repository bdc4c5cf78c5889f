//! Seed data for a fresh database.

use crate::models::{CreateDeviceRequest, DeviceType};

/// Default catalog: one representative device per type, in selection order.
/// (id, type, model, vendor, ports, poe, unit price)
pub fn seed_catalog_params() -> Vec<(&'static str, DeviceType, &'static str, &'static str, Option<u32>, bool, f64)> {
    vec![
        ("rtr-isr4331", DeviceType::Router, "ISR4331", "Cisco", Some(3), false, 2500.0),
        ("core-c9500", DeviceType::CoreSwitch, "Catalyst 9500-24Y4C", "Cisco", Some(28), false, 4000.0),
        ("dist-c9300", DeviceType::DistributionSwitch, "Catalyst 9300-24S", "Cisco", Some(24), false, 1800.0),
        ("acc-c9200", DeviceType::AccessSwitch, "Catalyst 9200-48P", "Cisco", Some(48), true, 900.0),
        ("ap-c9120", DeviceType::AccessPoint, "Catalyst 9120AXI", "Cisco", None, true, 350.0),
    ]
}

pub fn seed_catalog() -> Vec<CreateDeviceRequest> {
    seed_catalog_params()
        .into_iter()
        .map(|(id, device_type, model, vendor, port_count, poe_capable, unit_price)| CreateDeviceRequest {
            id: id.to_string(),
            device_type,
            model: model.to_string(),
            vendor: vendor.to_string(),
            port_count,
            poe_capable,
            unit_price,
            active: true,
        })
        .collect()
}
