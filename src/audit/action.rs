//! Audit Action Taxonomy
//!
//! Every audit entry carries an [`AuditAction`]: a recognised taxonomy tag
//! with a typed metadata payload, or an `Uncategorized` catch-all that keeps
//! the raw payload so that new action kinds never block a caller.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Tag of the compensating record written by a retraction
pub const RETRACTION_TAG: &str = "audit.retracted";

/// Before/after values for a single field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldChange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after: Option<Value>,
}

/// Generic description of a change to an entity
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ChangeSet {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, FieldChange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RoleChange {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct LoginFailure {
    pub attempted_identity: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Metadata of a retraction record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RetractionDetails {
    pub retracted_entry_id: String,
    pub reason: String,
    pub retracted_by: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "RawAction", from = "RawAction")]
pub enum AuditAction {
    UserCreated(ChangeSet),
    UserDeleted(ChangeSet),
    UserRoleChanged(RoleChange),
    CourseCreated(ChangeSet),
    CourseUpdated(ChangeSet),
    CourseDeleted(ChangeSet),
    CouponCreated(ChangeSet),
    CouponDeleted(ChangeSet),
    EnrollmentGranted(ChangeSet),
    EnrollmentRevoked(ChangeSet),
    BadgeAwarded(ChangeSet),
    TestimonialApproved(ChangeSet),
    TestimonialDeleted(ChangeSet),
    TicketClosed(ChangeSet),
    LoginFailed(LoginFailure),
    Retracted(RetractionDetails),
    Uncategorized { tag: String, payload: Value },
}

/// Wire and storage shape of an action: tag, metadata and a flag telling
/// readers the tag was not recognised.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawAction {
    pub action: String,
    #[serde(default)]
    pub metadata: Value,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub uncategorized: bool,
}

impl AuditAction {
    pub fn tag(&self) -> &str {
        match self {
            Self::UserCreated(_) => "user.created",
            Self::UserDeleted(_) => "user.deleted",
            Self::UserRoleChanged(_) => "user.role.changed",
            Self::CourseCreated(_) => "course.created",
            Self::CourseUpdated(_) => "course.updated",
            Self::CourseDeleted(_) => "course.deleted",
            Self::CouponCreated(_) => "coupon.created",
            Self::CouponDeleted(_) => "coupon.deleted",
            Self::EnrollmentGranted(_) => "enrollment.granted",
            Self::EnrollmentRevoked(_) => "enrollment.revoked",
            Self::BadgeAwarded(_) => "badge.awarded",
            Self::TestimonialApproved(_) => "testimonial.approved",
            Self::TestimonialDeleted(_) => "testimonial.deleted",
            Self::TicketClosed(_) => "ticket.closed",
            Self::LoginFailed(_) => "login.failed",
            Self::Retracted(_) => RETRACTION_TAG,
            Self::Uncategorized { tag, .. } => tag,
        }
    }

    pub fn metadata(&self) -> Value {
        let value = match self {
            Self::UserCreated(c)
            | Self::UserDeleted(c)
            | Self::CourseCreated(c)
            | Self::CourseUpdated(c)
            | Self::CourseDeleted(c)
            | Self::CouponCreated(c)
            | Self::CouponDeleted(c)
            | Self::EnrollmentGranted(c)
            | Self::EnrollmentRevoked(c)
            | Self::BadgeAwarded(c)
            | Self::TestimonialApproved(c)
            | Self::TestimonialDeleted(c)
            | Self::TicketClosed(c) => serde_json::to_value(c),
            Self::UserRoleChanged(r) => serde_json::to_value(r),
            Self::LoginFailed(l) => serde_json::to_value(l),
            Self::Retracted(d) => serde_json::to_value(d),
            Self::Uncategorized { payload, .. } => Ok(payload.clone()),
        };
        // Plain data structs always serialize
        value.unwrap_or(Value::Null)
    }

    pub fn is_uncategorized(&self) -> bool {
        matches!(self, Self::Uncategorized { .. })
    }

    pub fn is_retraction(&self) -> bool {
        matches!(self, Self::Retracted(_))
    }

    /// Rebuild an action from its tag and metadata.
    ///
    /// Unknown tags, and known tags whose metadata does not fit the typed
    /// payload, fall back to `Uncategorized`.
    pub fn from_parts(tag: &str, metadata: Value) -> Self {
        fn typed<T: serde::de::DeserializeOwned>(metadata: &Value) -> Option<T> {
            let value = if metadata.is_null() {
                Value::Object(Default::default())
            } else {
                metadata.clone()
            };
            serde_json::from_value(value).ok()
        }

        let parsed = match tag {
            "user.created" => typed(&metadata).map(Self::UserCreated),
            "user.deleted" => typed(&metadata).map(Self::UserDeleted),
            "user.role.changed" => typed(&metadata).map(Self::UserRoleChanged),
            "course.created" => typed(&metadata).map(Self::CourseCreated),
            "course.updated" => typed(&metadata).map(Self::CourseUpdated),
            "course.deleted" => typed(&metadata).map(Self::CourseDeleted),
            "coupon.created" => typed(&metadata).map(Self::CouponCreated),
            "coupon.deleted" => typed(&metadata).map(Self::CouponDeleted),
            "enrollment.granted" => typed(&metadata).map(Self::EnrollmentGranted),
            "enrollment.revoked" => typed(&metadata).map(Self::EnrollmentRevoked),
            "badge.awarded" => typed(&metadata).map(Self::BadgeAwarded),
            "testimonial.approved" => typed(&metadata).map(Self::TestimonialApproved),
            "testimonial.deleted" => typed(&metadata).map(Self::TestimonialDeleted),
            "ticket.closed" => typed(&metadata).map(Self::TicketClosed),
            "login.failed" => typed(&metadata).map(Self::LoginFailed),
            RETRACTION_TAG => typed(&metadata).map(Self::Retracted),
            _ => None,
        };

        parsed.unwrap_or_else(|| Self::Uncategorized {
            tag: tag.to_string(),
            payload: metadata,
        })
    }
}

impl From<AuditAction> for RawAction {
    fn from(action: AuditAction) -> Self {
        Self {
            action: action.tag().to_string(),
            metadata: action.metadata(),
            uncategorized: action.is_uncategorized(),
        }
    }
}

impl From<RawAction> for AuditAction {
    fn from(raw: RawAction) -> Self {
        Self::from_parts(&raw.action, raw.metadata)
    }
}
