use aerobook_shared::{ApprovalStatus, Masked};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::{CoreError, CoreResult};

pub const DEFAULT_REJECTION_REASON: &str = "Application did not meet requirements.";
pub const MIN_PASSWORD_LENGTH: usize = 6;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Operator,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Operator => "operator",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "operator" => Ok(Role::Operator),
            "admin" => Ok(Role::Admin),
            other => Err(CoreError::Validation(format!("unknown role: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Address {
    #[serde(default)]
    pub street: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub zip_code: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

/// Operator application record. Only users with `Role::Operator` carry one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OperatorDetails {
    pub company_name: String,
    pub license_number: Option<String>,
    pub approval_status: ApprovalStatus,
    pub approved_by: Option<Uuid>,
    pub approved_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
}

impl OperatorDetails {
    pub fn pending(company_name: String, license_number: Option<String>) -> Self {
        Self {
            company_name,
            license_number,
            approval_status: ApprovalStatus::Pending,
            approved_by: None,
            approved_at: None,
            rejection_reason: None,
        }
    }

    /// pending | rejected | approved -> approved
    pub fn approve(&mut self, admin_id: Uuid, now: DateTime<Utc>) {
        self.approval_status = ApprovalStatus::Approved;
        self.approved_by = Some(admin_id);
        self.approved_at = Some(now);
        self.rejection_reason = None;
    }

    /// pending | approved | rejected -> rejected
    pub fn reject(&mut self, reason: String) {
        self.approval_status = ApprovalStatus::Rejected;
        self.approved_by = None;
        self.approved_at = None;
        self.rejection_reason = Some(reason);
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: Option<String>,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: Masked<String>,
    pub phone: String,
    pub role: Role,
    pub date_of_birth: Option<NaiveDate>,
    pub address: Option<Address>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operator_details: Option<OperatorDetails>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn approval_status(&self) -> Option<ApprovalStatus> {
        self.operator_details.as_ref().map(|d| d.approval_status)
    }

    pub fn ensure_operator(&self) -> CoreResult<()> {
        if self.role != Role::Operator {
            return Err(CoreError::Forbidden("Access denied. Operator role required.".to_string()));
        }
        Ok(())
    }

    /// Evaluated against the freshly loaded record on every publish attempt.
    pub fn ensure_can_publish_flights(&self) -> CoreResult<()> {
        if self.role != Role::Operator {
            return Err(CoreError::Forbidden("Access Denied: Only operators can create flights.".to_string()));
        }
        if self.approval_status() != Some(ApprovalStatus::Approved) {
            return Err(CoreError::Forbidden("Your operator account is not yet approved.".to_string()));
        }
        Ok(())
    }

    pub fn approve_operator(&mut self, admin: &User, now: DateTime<Utc>) -> CoreResult<()> {
        let details = self.operator_details_for_decision(admin)?;
        details.approve(admin.id, now);
        self.updated_at = now;
        Ok(())
    }

    pub fn reject_operator(&mut self, admin: &User, reason: Option<String>, now: DateTime<Utc>) -> CoreResult<()> {
        let reason = reason
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| DEFAULT_REJECTION_REASON.to_string());
        let details = self.operator_details_for_decision(admin)?;
        details.reject(reason);
        self.updated_at = now;
        Ok(())
    }

    pub fn apply_decision(&mut self, admin: &User, decision: &OperatorDecision, now: DateTime<Utc>) -> CoreResult<()> {
        match decision {
            OperatorDecision::Approve => self.approve_operator(admin, now),
            OperatorDecision::Reject { reason } => self.reject_operator(admin, reason.clone(), now),
        }
    }

    fn operator_details_for_decision(&mut self, admin: &User) -> CoreResult<&mut OperatorDetails> {
        if !admin.is_admin() {
            return Err(CoreError::Forbidden("Access Denied: Admin role required.".to_string()));
        }
        match (self.role, self.operator_details.as_mut()) {
            (Role::Operator, Some(details)) => Ok(details),
            _ => Err(CoreError::NotFound("Operator not found".to_string())),
        }
    }

    pub fn apply_profile(&mut self, update: &ProfileUpdate, now: DateTime<Utc>) -> CoreResult<()> {
        if let Some(first_name) = &update.first_name {
            if first_name.trim().is_empty() {
                return Err(CoreError::Validation("firstName cannot be empty".to_string()));
            }
        }
        if let Some(phone) = &update.phone {
            if phone.trim().is_empty() {
                return Err(CoreError::Validation("phone cannot be empty".to_string()));
            }
        }

        if let Some(first_name) = &update.first_name {
            self.first_name = first_name.trim().to_string();
        }
        if let Some(last_name) = &update.last_name {
            self.last_name = Some(last_name.trim().to_string());
        }
        if let Some(phone) = &update.phone {
            self.phone = phone.trim().to_string();
        }
        if let Some(address) = &update.address {
            self.address = Some(address.clone());
        }
        self.updated_at = now;
        Ok(())
    }
}

/// Admin ruling on an operator application.
#[derive(Debug, Clone, PartialEq)]
pub enum OperatorDecision {
    Approve,
    Reject { reason: Option<String> },
}

/// Self-service profile fields; role and operator state are not reachable from here.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ProfileUpdate {
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<Address>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub password: String,
    pub phone: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub license_number: Option<String>,
}

impl Registration {
    pub fn normalized_email(&self) -> String {
        normalize_email(&self.email)
    }

    pub fn validate(&self) -> CoreResult<()> {
        if self.username.trim().is_empty() {
            return Err(CoreError::Validation("username is required".to_string()));
        }
        let email = self.normalized_email();
        if email.is_empty() || !email.contains('@') {
            return Err(CoreError::Validation("a valid email is required".to_string()));
        }
        if self.password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(CoreError::Validation(format!(
                "password must be at least {} characters",
                MIN_PASSWORD_LENGTH
            )));
        }
        if self.phone.trim().is_empty() {
            return Err(CoreError::Validation("phone is required".to_string()));
        }
        Ok(())
    }

    /// Build the stored record. Operators start in the pending approval state.
    pub fn into_user(self, password_hash: String, now: DateTime<Utc>) -> User {
        let first_name = self.username.trim().to_string();
        let operator_details = (self.role == Role::Operator).then(|| {
            OperatorDetails::pending(
                first_name.clone(),
                self.license_number.map(|l| l.trim().to_string()).filter(|l| !l.is_empty()),
            )
        });
        User {
            id: Uuid::new_v4(),
            email: normalize_email(&self.email),
            first_name,
            last_name: None,
            password_hash: Masked::new(password_hash),
            phone: self.phone.trim().to_string(),
            role: self.role,
            date_of_birth: None,
            address: None,
            operator_details,
            created_at: now,
            updated_at: now,
        }
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
