//! PostgreSQL-backed `ProfileRepository` implementation using Diesel ORM.
//!
//! The PII columns already hold ciphertext when they reach this adapter;
//! it stores and returns them untouched.

use async_trait::async_trait;
use diesel::prelude::*;
use diesel::upsert::excluded;
use diesel_async::RunQueryDsl;

use crate::domain::ports::{PersistenceError, ProfileRepository};
use crate::domain::{ProfileDetails, UserId, UserProfile};

use super::diesel_helpers::{map_diesel_error, map_pool_error};
use super::models::ProfileRow;
use super::pool::DbPool;
use super::schema::user_profiles;

/// Diesel-backed implementation of the `ProfileRepository` port.
#[derive(Clone)]
pub struct DieselProfileRepository {
    pool: DbPool,
}

impl DieselProfileRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_profile(row: ProfileRow) -> UserProfile {
    UserProfile {
        user_id: UserId::from_uuid(row.user_id),
        details: ProfileDetails {
            first_name: row.first_name,
            last_name: row.last_name,
            date_of_birth: row.date_of_birth,
            phone: row.phone,
            address: row.address,
            medical_record_number: row.medical_record_number,
            insurance_number: row.insurance_number,
            emergency_contact_name: row.emergency_contact_name,
            emergency_contact_phone: row.emergency_contact_phone,
        },
        blood_type: row.blood_type,
        profile_picture_url: row.profile_picture_url,
        created_at: row.created_at,
        updated_at: row.updated_at,
    }
}

fn profile_to_row(profile: &UserProfile) -> ProfileRow {
    let details = profile.details.clone();
    ProfileRow {
        user_id: *profile.user_id.as_uuid(),
        first_name: details.first_name,
        last_name: details.last_name,
        date_of_birth: details.date_of_birth,
        phone: details.phone,
        address: details.address,
        medical_record_number: details.medical_record_number,
        insurance_number: details.insurance_number,
        emergency_contact_name: details.emergency_contact_name,
        emergency_contact_phone: details.emergency_contact_phone,
        blood_type: profile.blood_type.clone(),
        profile_picture_url: profile.profile_picture_url.clone(),
        created_at: profile.created_at,
        updated_at: profile.updated_at,
    }
}

#[async_trait]
impl ProfileRepository for DieselProfileRepository {
    async fn find(&self, user_id: &UserId) -> Result<Option<UserProfile>, PersistenceError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row: Option<ProfileRow> = user_profiles::table
            .filter(user_profiles::user_id.eq(user_id.as_uuid()))
            .select(ProfileRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;
        Ok(row.map(row_to_profile))
    }

    async fn upsert(&self, profile: &UserProfile) -> Result<(), PersistenceError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row = profile_to_row(profile);
        diesel::insert_into(user_profiles::table)
            .values(&row)
            .on_conflict(user_profiles::user_id)
            .do_update()
            .set((
                user_profiles::first_name.eq(excluded(user_profiles::first_name)),
                user_profiles::last_name.eq(excluded(user_profiles::last_name)),
                user_profiles::date_of_birth.eq(excluded(user_profiles::date_of_birth)),
                user_profiles::phone.eq(excluded(user_profiles::phone)),
                user_profiles::address.eq(excluded(user_profiles::address)),
                user_profiles::medical_record_number
                    .eq(excluded(user_profiles::medical_record_number)),
                user_profiles::insurance_number.eq(excluded(user_profiles::insurance_number)),
                user_profiles::emergency_contact_name
                    .eq(excluded(user_profiles::emergency_contact_name)),
                user_profiles::emergency_contact_phone
                    .eq(excluded(user_profiles::emergency_contact_phone)),
                user_profiles::blood_type.eq(excluded(user_profiles::blood_type)),
                user_profiles::profile_picture_url.eq(excluded(user_profiles::profile_picture_url)),
                user_profiles::updated_at.eq(excluded(user_profiles::updated_at)),
            ))
            .execute(&mut conn)
            .await
            .map(|_| ())
            .map_err(map_diesel_error)
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.
    use super::*;
    use chrono::Utc;
    use rstest::rstest;

    #[rstest]
    fn profiles_round_trip_through_rows() {
        let now = Utc::now();
        let profile = UserProfile {
            user_id: UserId::random(),
            details: ProfileDetails {
                first_name: Some("v1:ciphertext".into()),
                last_name: None,
                date_of_birth: None,
                phone: Some("v1:other".into()),
                address: None,
                medical_record_number: None,
                insurance_number: None,
                emergency_contact_name: None,
                emergency_contact_phone: None,
            },
            blood_type: Some("AB-".into()),
            profile_picture_url: None,
            created_at: now,
            updated_at: now,
        };
        assert_eq!(row_to_profile(profile_to_row(&profile)), profile);
    }
}
