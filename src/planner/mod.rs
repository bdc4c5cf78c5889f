//! Design synthesis engine.
//!
//! Every stage is a pure function of its inputs: room occupancy is reduced to
//! per-department host totals, which independently drive hardware sizing and
//! subnet allocation; the topology is derived from all three. Nothing here
//! touches the store, so identical input always yields identical output.

mod hardware;
mod hosts;
mod requirements;
mod subnets;
mod topology;

use std::fmt;

use crate::models::*;

pub use hardware::size_hardware;
pub use hosts::aggregate_hosts;
pub use requirements::validate_requirements;
pub use subnets::allocate_subnets;
pub use topology::synthesize_topology;

/// A single offending input field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldIssue {
    pub field: String,
    pub message: String,
}

impl FieldIssue {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Problem found while selecting devices from the catalog
#[derive(Debug, Clone, PartialEq)]
pub enum CatalogIssue {
    Empty,
    MissingType(DeviceType),
    MissingIdentifier(DeviceType),
    InvalidPrice {
        device_type: DeviceType,
        device_id: String,
        unit_price: f64,
    },
}

impl CatalogIssue {
    pub fn device_type(&self) -> Option<DeviceType> {
        match self {
            CatalogIssue::Empty => None,
            CatalogIssue::MissingType(t) | CatalogIssue::MissingIdentifier(t) => Some(*t),
            CatalogIssue::InvalidPrice { device_type, .. } => Some(*device_type),
        }
    }
}

impl fmt::Display for CatalogIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CatalogIssue::Empty => f.write_str("device catalog is empty"),
            CatalogIssue::MissingType(t) => write!(f, "no active {} in catalog", t),
            CatalogIssue::MissingIdentifier(t) => write!(f, "selected {} has no identifier", t),
            CatalogIssue::InvalidPrice {
                device_type,
                device_id,
                unit_price,
            } => write!(
                f,
                "selected {} '{}' has invalid unit price {}",
                device_type, device_id, unit_price
            ),
        }
    }
}

/// Fatal failure of design generation. Nothing is persisted when one occurs.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PlanError {
    #[error("invalid requirements: {}", join(.issues))]
    Validation { issues: Vec<FieldIssue> },

    #[error("incomplete device catalog: {}", join(.issues))]
    CatalogIncomplete { issues: Vec<CatalogIssue> },

    #[error("address space exhausted: {reason}")]
    AddressSpaceExhausted {
        department: Option<String>,
        reason: String,
    },
}

fn join<T: fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Everything the engine derives for one request
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct DesignPlan {
    pub host_summaries: Vec<DepartmentHostSummary>,
    pub bill_of_materials: Vec<BillOfMaterialsLine>,
    pub subnet_assignments: Vec<SubnetAssignment>,
    pub topology: TopologyGraph,
    pub total_estimated_cost: f64,
}

/// Run the whole pipeline for a request's departments against a catalog snapshot
pub fn synthesize(
    departments: &[DepartmentRequirement],
    catalog: &[DeviceCatalogEntry],
) -> Result<DesignPlan, PlanError> {
    if departments.is_empty() {
        return Err(PlanError::Validation {
            issues: vec![FieldIssue::new("departments", "at least one department is required")],
        });
    }

    let host_summaries = aggregate_hosts(departments);
    let bill_of_materials = size_hardware(&host_summaries, catalog)?;
    let subnet_assignments = allocate_subnets(&host_summaries)?;
    let topology = synthesize_topology(&host_summaries, &bill_of_materials, &subnet_assignments);
    let total_estimated_cost = bill_of_materials.iter().map(|l| l.total_cost).sum();

    Ok(DesignPlan {
        host_summaries,
        bill_of_materials,
        subnet_assignments,
        topology,
        total_estimated_cost,
    })
}
