//! Patient profile with field-level encryption of personal data.
//!
//! The profile service hands [`ProfileDetails`] through a
//! [`crate::domain::ports::FieldCipher`] before storage, so repositories only
//! ever see ciphertext for these fields.

use chrono::{DateTime, Utc};

use super::UserId;

/// Maximum length of the blood type field.
pub const BLOOD_TYPE_MAX: usize = 10;
/// Maximum length of the profile picture URL.
pub const PROFILE_PICTURE_URL_MAX: usize = 500;

/// Personal fields stored encrypted at rest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileDetails {
    /// Given name.
    pub first_name: Option<String>,
    /// Family name.
    pub last_name: Option<String>,
    /// ISO-8601 date of birth.
    pub date_of_birth: Option<String>,
    /// Contact phone number.
    pub phone: Option<String>,
    /// Postal address.
    pub address: Option<String>,
    /// Medical record number.
    pub medical_record_number: Option<String>,
    /// Insurance policy number.
    pub insurance_number: Option<String>,
    /// Emergency contact name.
    pub emergency_contact_name: Option<String>,
    /// Emergency contact phone.
    pub emergency_contact_phone: Option<String>,
}

impl ProfileDetails {
    /// Apply `f` to every present field, stopping at the first failure.
    ///
    /// # Errors
    /// Propagates the first error returned by `f`.
    pub fn try_map<E>(self, mut f: impl FnMut(String) -> Result<String, E>) -> Result<Self, E> {
        let mut apply = |value: Option<String>| value.map(&mut f).transpose();
        Ok(Self {
            first_name: apply(self.first_name)?,
            last_name: apply(self.last_name)?,
            date_of_birth: apply(self.date_of_birth)?,
            phone: apply(self.phone)?,
            address: apply(self.address)?,
            medical_record_number: apply(self.medical_record_number)?,
            insurance_number: apply(self.insurance_number)?,
            emergency_contact_name: apply(self.emergency_contact_name)?,
            emergency_contact_phone: apply(self.emergency_contact_phone)?,
        })
    }

    /// Overlay `update` onto `self`; absent fields keep their current value.
    #[must_use]
    pub fn merge(self, update: Self) -> Self {
        Self {
            first_name: update.first_name.or(self.first_name),
            last_name: update.last_name.or(self.last_name),
            date_of_birth: update.date_of_birth.or(self.date_of_birth),
            phone: update.phone.or(self.phone),
            address: update.address.or(self.address),
            medical_record_number: update.medical_record_number.or(self.medical_record_number),
            insurance_number: update.insurance_number.or(self.insurance_number),
            emergency_contact_name: update
                .emergency_contact_name
                .or(self.emergency_contact_name),
            emergency_contact_phone: update
                .emergency_contact_phone
                .or(self.emergency_contact_phone),
        }
    }
}

/// Patient profile attached to a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    /// Owning account; one profile per user.
    pub user_id: UserId,
    /// Encrypted personal fields (plaintext inside the domain).
    pub details: ProfileDetails,
    /// ABO/Rh blood type.
    pub blood_type: Option<String>,
    /// Avatar URL.
    pub profile_picture_url: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Requested profile changes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileUpdate {
    /// Personal fields to set.
    pub details: ProfileDetails,
    /// New blood type.
    pub blood_type: Option<String>,
    /// New avatar URL.
    pub profile_picture_url: Option<String>,
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn merge_keeps_existing_values_for_absent_fields() {
        let current = ProfileDetails {
            first_name: Some("Ada".into()),
            phone: Some("555-0100".into()),
            ..ProfileDetails::default()
        };
        let update = ProfileDetails {
            phone: Some("555-0199".into()),
            ..ProfileDetails::default()
        };
        let merged = current.merge(update);
        assert_eq!(merged.first_name.as_deref(), Some("Ada"));
        assert_eq!(merged.phone.as_deref(), Some("555-0199"));
    }

    #[rstest]
    fn try_map_only_touches_present_fields() {
        let details = ProfileDetails {
            last_name: Some("Lovelace".into()),
            ..ProfileDetails::default()
        };
        let mut calls = 0;
        let mapped = details
            .try_map(|value| {
                calls += 1;
                Ok::<_, ()>(value.to_uppercase())
            })
            .expect("mapping succeeds");
        assert_eq!(calls, 1);
        assert_eq!(mapped.last_name.as_deref(), Some("LOVELACE"));
        assert!(mapped.first_name.is_none());
    }
}
