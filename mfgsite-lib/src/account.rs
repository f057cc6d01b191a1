use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};

use crate::ids;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn from_i16(v: i16) -> Option<Self> {
        match v {
            0 => Some(Role::User),
            1 => Some(Role::Admin),
            _ => None
        }
    }

    pub fn as_i16(&self) -> i16 {
        match self {
            Role::User => 0,
            Role::Admin => 1,
        }
    }
}

/// tri-state view over `is_approved` + `approved_at`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

impl ApprovalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalStatus::Pending => "pending",
            ApprovalStatus::Approved => "approved",
            ApprovalStatus::Rejected => "rejected",
        }
    }
}

impl std::fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// the approval and role record the gate reads for a signed in user.
///
/// `approved_at` is set whenever an admin acts on the account, so an
/// unapproved account with a timestamp has been rejected while one without
/// is still waiting on review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: ids::UserId,
    pub role: Role,
    pub is_approved: bool,
    pub approved_at: Option<DateTime<Utc>>,
}

impl Account {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn status(&self) -> ApprovalStatus {
        if self.is_approved {
            ApprovalStatus::Approved
        } else if self.approved_at.is_some() {
            ApprovalStatus::Rejected
        } else {
            ApprovalStatus::Pending
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn account(is_approved: bool, approved_at: Option<DateTime<Utc>>) -> Account {
        Account {
            id: 1,
            role: Role::User,
            is_approved,
            approved_at,
        }
    }

    #[test]
    fn status_from_fields() {
        let now = Utc::now();

        assert_eq!(account(false, None).status(), ApprovalStatus::Pending);
        assert_eq!(account(false, Some(now)).status(), ApprovalStatus::Rejected);
        assert_eq!(account(true, Some(now)).status(), ApprovalStatus::Approved);
        assert_eq!(account(true, None).status(), ApprovalStatus::Approved);
    }

    #[test]
    fn role_int_mapping() {
        for role in [Role::User, Role::Admin] {
            assert_eq!(Role::from_i16(role.as_i16()), Some(role));
        }

        assert_eq!(Role::from_i16(7), None, "unknown role value");
    }
}
