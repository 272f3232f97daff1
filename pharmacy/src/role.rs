//! Roles and the static permission table.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Role attached to an authenticated user.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Patient using the patient portal
    Patient,
    /// Caregiver acting for a patient
    Caregiver,
    /// Prescribing provider
    Prescriber,
    /// Licensed pharmacist
    Pharmacist,
    /// Pharmacy technician
    Technician,
    /// Employer benefits administrator
    HrAdmin,
    /// Platform administrator
    SystemAdmin,
    /// Developer account (no data access)
    Developer,
}

impl Role {
    /// Every role.
    pub const ALL: [Self; 8] = [
        Self::Patient,
        Self::Caregiver,
        Self::Prescriber,
        Self::Pharmacist,
        Self::Technician,
        Self::HrAdmin,
        Self::SystemAdmin,
        Self::Developer,
    ];

    /// Roles that may use the pharmacy portal.
    pub const PHARMACY_STAFF: [Self; 3] = [Self::Pharmacist, Self::Technician, Self::SystemAdmin];

    /// Wire and database name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Patient => "patient",
            Self::Caregiver => "caregiver",
            Self::Prescriber => "prescriber",
            Self::Pharmacist => "pharmacist",
            Self::Technician => "technician",
            Self::HrAdmin => "hr_admin",
            Self::SystemAdmin => "system_admin",
            Self::Developer => "developer",
        }
    }

    /// Whether this role belongs to pharmacy staff.
    #[must_use]
    pub fn is_pharmacy_staff(self) -> bool {
        Self::PHARMACY_STAFF.contains(&self)
    }

    /// Permissions granted to this role.
    #[must_use]
    pub const fn permissions(self) -> &'static [Permission] {
        match self {
            Self::Patient => PATIENT,
            Self::Caregiver => CAREGIVER,
            Self::Prescriber => PRESCRIBER,
            Self::Pharmacist => PHARMACIST,
            Self::Technician => TECHNICIAN,
            Self::HrAdmin => HR_ADMIN,
            Self::SystemAdmin => SYSTEM_ADMIN,
            Self::Developer => &[],
        }
    }

    /// Whether this role may perform `action` on `resource`.
    #[must_use]
    pub fn can(self, action: &str, resource: &str) -> bool {
        self.permissions().iter().any(|p| p.grants(action, resource))
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| format!("unknown role '{s}'"))
    }
}

/// One `(action, resource)` grant. `*` matches anything.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Permission {
    /// Verb, e.g. `read`, `verify`
    pub action: &'static str,
    /// Resource, e.g. `prescriptions`, `own_orders`
    pub resource: &'static str,
}

impl Permission {
    const fn new(action: &'static str, resource: &'static str) -> Self {
        Self { action, resource }
    }

    fn grants(&self, action: &str, resource: &str) -> bool {
        (self.action == "*" || self.action == action)
            && (self.resource == "*" || self.resource == resource)
    }
}

const PATIENT: &[Permission] = &[
    Permission::new("read", "own_orders"),
    Permission::new("create", "own_orders"),
    Permission::new("read", "own_prescriptions"),
    Permission::new("read", "own_profile"),
    Permission::new("update", "own_profile"),
];

const CAREGIVER: &[Permission] = &[
    Permission::new("read", "patient_prescriptions"),
    Permission::new("read", "patient_orders"),
    Permission::new("create", "patient_orders"),
];

const PRESCRIBER: &[Permission] = &[
    Permission::new("read", "patients"),
    Permission::new("create", "prescriptions"),
    Permission::new("read", "prescriptions"),
    Permission::new("update", "prescriptions"),
];

const PHARMACIST: &[Permission] = &[
    Permission::new("read", "prescriptions"),
    Permission::new("update", "prescriptions"),
    Permission::new("verify", "prescriptions"),
    Permission::new("read", "orders"),
    Permission::new("update", "orders"),
];

const TECHNICIAN: &[Permission] = &[
    Permission::new("read", "prescriptions"),
    Permission::new("read", "orders"),
    Permission::new("update", "orders"),
];

const HR_ADMIN: &[Permission] = &[
    Permission::new("read", "employees"),
    Permission::new("create", "employees"),
    Permission::new("update", "employees"),
    Permission::new("read", "benefits"),
];

const SYSTEM_ADMIN: &[Permission] = &[Permission::new("*", "*")];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pharmacy_staff_set() {
        let staff: Vec<_> = Role::ALL.into_iter().filter(|r| r.is_pharmacy_staff()).collect();
        assert_eq!(staff, Role::PHARMACY_STAFF.to_vec());
    }

    #[test]
    fn only_pharmacist_and_admin_may_verify() {
        let verifiers: Vec<_> = Role::ALL
            .into_iter()
            .filter(|r| r.can("verify", "prescriptions"))
            .collect();
        assert_eq!(verifiers, vec![Role::Pharmacist, Role::SystemAdmin]);
    }

    #[test]
    fn developer_has_nothing() {
        assert!(Role::Developer.permissions().is_empty());
        assert!(!Role::Developer.can("read", "orders"));
    }

    #[test]
    fn patient_scope_is_own_data() {
        assert!(Role::Patient.can("create", "own_orders"));
        assert!(!Role::Patient.can("read", "orders"));
        assert!(Role::Caregiver.can("create", "patient_orders"));
    }

    #[test]
    fn role_names_parse() {
        for role in Role::ALL {
            assert_eq!(role.as_str().parse::<Role>(), Ok(role));
        }
    }
}
