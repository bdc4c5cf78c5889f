use std::collections::HashSet;

use super::{FieldIssue, PlanError};
use crate::models::{DepartmentInput, DepartmentRequirement, RoomRequirement};

/// Check submitted requirements and convert them to their domain form.
///
/// Every problem is collected so the caller can report them all at once;
/// nothing is returned unless the whole submission is valid.
pub fn validate_requirements(
    departments: &[DepartmentInput],
) -> Result<Vec<DepartmentRequirement>, PlanError> {
    let mut issues = Vec::new();

    if departments.is_empty() {
        issues.push(FieldIssue::new("departments", "at least one department is required"));
    }

    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(departments.len());

    for (d, dept) in departments.iter().enumerate() {
        let name = dept.name.trim();
        if name.is_empty() {
            issues.push(FieldIssue::new(format!("departments[{}].name", d), "name is required"));
        } else if !seen.insert(name.to_lowercase()) {
            issues.push(FieldIssue::new(
                format!("departments[{}].name", d),
                format!("duplicate department name '{}'", name),
            ));
        }

        let mut rooms = Vec::with_capacity(dept.rooms.len());
        for (r, room) in dept.rooms.iter().enumerate() {
            let field = format!("departments[{}].rooms[{}]", d, r);
            if room.name.trim().is_empty() {
                issues.push(FieldIssue::new(format!("{}.name", field), "name is required"));
            }
            let wired = host_count(&mut issues, &field, "wired_hosts", room.wired_hosts);
            let wireless = host_count(&mut issues, &field, "wireless_hosts", room.wireless_hosts);
            rooms.push(RoomRequirement {
                name: room.name.trim().to_string(),
                wired_hosts: wired,
                wireless_hosts: wireless,
            });
        }

        out.push(DepartmentRequirement {
            name: name.to_string(),
            rooms,
        });
    }

    if issues.is_empty() {
        Ok(out)
    } else {
        Err(PlanError::Validation { issues })
    }
}

fn host_count(issues: &mut Vec<FieldIssue>, field: &str, key: &str, value: Option<i64>) -> u32 {
    match value {
        None => 0,
        Some(v) if v < 0 => {
            issues.push(FieldIssue::new(format!("{}.{}", field, key), "must not be negative"));
            0
        }
        Some(v) => u32::try_from(v).unwrap_or_else(|_| {
            issues.push(FieldIssue::new(format!("{}.{}", field, key), "is too large"));
            0
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RoomInput;

    fn room(name: &str, wired: Option<i64>, wireless: Option<i64>) -> RoomInput {
        RoomInput {
            name: name.to_string(),
            wired_hosts: wired,
            wireless_hosts: wireless,
        }
    }

    fn dept(name: &str, rooms: Vec<RoomInput>) -> DepartmentInput {
        DepartmentInput {
            name: name.to_string(),
            rooms,
        }
    }

    fn issue_fields(err: PlanError) -> Vec<String> {
        match err {
            PlanError::Validation { issues } => issues.into_iter().map(|i| i.field).collect(),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_valid_input_converts() {
        let out = validate_requirements(&[dept(" Library ", vec![room("Stacks", Some(5), None)])]).unwrap();
        assert_eq!(out[0].name, "Library");
        assert_eq!(out[0].rooms[0].wired_hosts, 5);
        assert_eq!(out[0].rooms[0].wireless_hosts, 0);
    }

    #[test]
    fn test_zero_departments_rejected() {
        assert_eq!(issue_fields(validate_requirements(&[]).unwrap_err()), vec!["departments"]);
    }

    #[test]
    fn test_collects_every_issue() {
        let err = validate_requirements(&[
            dept("Lab", vec![room("A", Some(-1), Some(3))]),
            dept("lab", vec![room("", Some(1), Some(-7))]),
            dept("", vec![]),
        ])
        .unwrap_err();
        assert_eq!(
            issue_fields(err),
            vec![
                "departments[0].rooms[0].wired_hosts",
                "departments[1].name",
                "departments[1].rooms[0].name",
                "departments[1].rooms[0].wireless_hosts",
                "departments[2].name",
            ]
        );
    }
}
