use std::collections::HashMap;

use super::{CatalogIssue, PlanError};
use crate::models::{BillOfMaterialsLine, DepartmentHostSummary, DeviceCatalogEntry, DeviceType};

/// Ports assumed when the selected access switch declares none
pub const DEFAULT_ACCESS_SWITCH_PORTS: u32 = 48;

/// Wireless clients served by one access point
pub const HOSTS_PER_ACCESS_POINT: u64 = 30;

/// Size the bill of materials for the given departments.
///
/// One representative device is selected per type: the first active entry in
/// catalog order. All five types must be selectable even when a type ends up
/// with zero quantity, otherwise the catalog is reported incomplete.
pub fn size_hardware(
    summaries: &[DepartmentHostSummary],
    catalog: &[DeviceCatalogEntry],
) -> Result<Vec<BillOfMaterialsLine>, PlanError> {
    let selected = select_devices(catalog)?;

    let wired: u64 = summaries.iter().map(|s| s.wired_hosts).sum();
    let wireless: u64 = summaries.iter().map(|s| s.wireless_hosts).sum();

    let access_switch = selected[&DeviceType::AccessSwitch];
    let ports = access_switch
        .port_count
        .filter(|p| *p > 0)
        .unwrap_or(DEFAULT_ACCESS_SWITCH_PORTS);

    let quantities = [
        (DeviceType::Router, 1),
        (DeviceType::CoreSwitch, 1),
        (DeviceType::DistributionSwitch, summaries.len() as u64),
        (DeviceType::AccessSwitch, wired.div_ceil(u64::from(ports))),
        (DeviceType::AccessPoint, wireless.div_ceil(HOSTS_PER_ACCESS_POINT)),
    ];

    Ok(quantities
        .into_iter()
        .filter(|(_, qty)| *qty > 0)
        .map(|(device_type, quantity)| {
            let device = selected[&device_type];
            BillOfMaterialsLine {
                device_id: device.id.clone(),
                device_type,
                model: device.model.clone(),
                quantity,
                unit_price: device.unit_price,
                total_cost: quantity as f64 * device.unit_price,
            }
        })
        .collect())
}

fn select_devices(
    catalog: &[DeviceCatalogEntry],
) -> Result<HashMap<DeviceType, &DeviceCatalogEntry>, PlanError> {
    let mut issues = Vec::new();
    if !catalog.iter().any(|d| d.active) {
        issues.push(CatalogIssue::Empty);
    }

    let mut selected = HashMap::new();
    for device_type in DeviceType::ALL {
        let Some(device) = catalog
            .iter()
            .find(|d| d.active && d.device_type == device_type)
        else {
            issues.push(CatalogIssue::MissingType(device_type));
            continue;
        };

        if device.id.trim().is_empty() {
            issues.push(CatalogIssue::MissingIdentifier(device_type));
        } else if !device.unit_price.is_finite() || device.unit_price <= 0.0 {
            issues.push(CatalogIssue::InvalidPrice {
                device_type,
                device_id: device.id.clone(),
                unit_price: device.unit_price,
            });
        } else {
            selected.insert(device_type, device);
        }
    }

    if issues.is_empty() {
        Ok(selected)
    } else {
        Err(PlanError::CatalogIncomplete { issues })
    }
}
