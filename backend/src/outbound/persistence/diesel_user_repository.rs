//! PostgreSQL-backed `UserRepository` implementation using Diesel ORM.
//!
//! Password hashes live in the `users` row but are only read through
//! [`UserRepository::password_hash`]; replaced hashes are archived in
//! `password_history` inside the same transaction that swaps them.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::dsl::count_star;
use diesel::pg::Pg;
use diesel::prelude::*;
use diesel_async::scoped_futures::ScopedFutureExt as _;
use diesel_async::{AsyncConnection, RunQueryDsl};
use pagination::{Page, PageRequest};
use uuid::Uuid;

use crate::domain::ports::{PersistenceError, UserCounts, UserListFilter, UserRepository};
use crate::domain::{Email, FullName, Role, User, UserId};

use super::diesel_helpers::{
    collect_rows, map_diesel_error, map_pool_error, parse_column, to_count, with_conflict_message,
};
use super::models::{NewPasswordHistoryRow, NewUserRow, UserRow, UserUpdate};
use super::pool::DbPool;
use super::schema::{password_history, users};

const EMAIL_TAKEN: &str = "email already registered";

/// Diesel-backed implementation of the `UserRepository` port.
#[derive(Clone)]
pub struct DieselUserRepository {
    pool: DbPool,
}

impl DieselUserRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_user(row: UserRow) -> Result<User, PersistenceError> {
    let email = Email::parse(&row.email)
        .map_err(|err| PersistenceError::query(format!("stored email is invalid: {err}")))?;
    let full_name = FullName::new(&row.full_name)
        .map_err(|err| PersistenceError::query(format!("stored name is invalid: {err}")))?;
    Ok(User {
        id: UserId::from_uuid(row.id),
        email,
        full_name,
        role: parse_column(&row.role, "role")?,
        is_verified: row.is_verified,
        is_active: row.is_active,
        created_at: row.created_at,
        updated_at: row.updated_at,
        last_login: row.last_login,
    })
}

fn filtered(filter: UserListFilter) -> users::BoxedQuery<'static, Pg> {
    let mut query = users::table.into_boxed();
    if let Some(role) = filter.role {
        query = query.filter(users::role.eq(role.as_str()));
    }
    if let Some(flag) = filter.is_verified {
        query = query.filter(users::is_verified.eq(flag));
    }
    query
}

#[async_trait]
impl UserRepository for DieselUserRepository {
    async fn insert(&self, user: &User, password_hash: &str) -> Result<(), PersistenceError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row = NewUserRow {
            id: *user.id.as_uuid(),
            email: user.email.as_ref(),
            password_hash,
            full_name: user.full_name.as_ref(),
            role: user.role.as_str(),
            is_verified: user.is_verified,
            is_active: user.is_active,
            created_at: user.created_at,
            updated_at: user.updated_at,
            last_login: user.last_login,
        };
        diesel::insert_into(users::table)
            .values(&row)
            .execute(&mut conn)
            .await
            .map(|_| ())
            .map_err(|err| with_conflict_message(map_diesel_error(err), EMAIL_TAKEN))
    }

    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, PersistenceError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row: Option<UserRow> = users::table
            .filter(users::id.eq(id.as_uuid()))
            .select(UserRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;
        row.map(row_to_user).transpose()
    }

    async fn find_by_email(&self, email: &Email) -> Result<Option<User>, PersistenceError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row: Option<UserRow> = users::table
            .filter(users::email.eq(email.as_ref()))
            .select(UserRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;
        row.map(row_to_user).transpose()
    }

    async fn update(&self, user: &User) -> Result<(), PersistenceError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let changes = UserUpdate {
            email: user.email.as_ref(),
            full_name: user.full_name.as_ref(),
            role: user.role.as_str(),
            is_verified: user.is_verified,
            is_active: user.is_active,
            updated_at: user.updated_at,
            last_login: user.last_login,
        };
        let updated = diesel::update(users::table.filter(users::id.eq(user.id.as_uuid())))
            .set(&changes)
            .execute(&mut conn)
            .await
            .map_err(|err| with_conflict_message(map_diesel_error(err), EMAIL_TAKEN))?;
        if updated == 0 {
            return Err(PersistenceError::query("user not found"));
        }
        Ok(())
    }

    async fn password_hash(&self, id: &UserId) -> Result<Option<String>, PersistenceError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        users::table
            .filter(users::id.eq(id.as_uuid()))
            .select(users::password_hash)
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)
    }

    async fn replace_password(
        &self,
        id: &UserId,
        new_hash: &str,
        changed_at: DateTime<Utc>,
    ) -> Result<(), PersistenceError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let user_id = *id.as_uuid();
        let new_hash = new_hash.to_owned();

        let replaced = conn
            .transaction(|conn| {
                async move {
                    let previous: Option<String> = users::table
                        .filter(users::id.eq(user_id))
                        .select(users::password_hash)
                        .for_update()
                        .first(conn)
                        .await
                        .optional()?;
                    let Some(previous) = previous else {
                        return Ok(false);
                    };
                    diesel::insert_into(password_history::table)
                        .values(&NewPasswordHistoryRow {
                            id: Uuid::new_v4(),
                            user_id,
                            password_hash: &previous,
                            created_at: changed_at,
                        })
                        .execute(conn)
                        .await?;
                    diesel::update(users::table.filter(users::id.eq(user_id)))
                        .set((
                            users::password_hash.eq(&new_hash),
                            users::updated_at.eq(changed_at),
                        ))
                        .execute(conn)
                        .await?;
                    Ok(true)
                }
                .scope_boxed()
            })
            .await
            .map_err(map_diesel_error)?;

        if replaced {
            Ok(())
        } else {
            Err(PersistenceError::query("user not found"))
        }
    }

    async fn recent_password_hashes(
        &self,
        id: &UserId,
        limit: u32,
    ) -> Result<Vec<String>, PersistenceError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        password_history::table
            .filter(password_history::user_id.eq(id.as_uuid()))
            .order_by(password_history::created_at.desc())
            .select(password_history::password_hash)
            .limit(i64::from(limit))
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)
    }

    async fn list(
        &self,
        filter: UserListFilter,
        page: PageRequest,
    ) -> Result<Page<User>, PersistenceError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let total: i64 = filtered(filter)
            .count()
            .get_result(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        let rows: Vec<UserRow> = filtered(filter)
            .select(UserRow::as_select())
            .order_by((users::created_at.asc(), users::id.asc()))
            .offset(page.offset_i64())
            .limit(page.limit_i64())
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        let items = collect_rows(rows.into_iter().map(row_to_user))?;
        Ok(Page::new(items, to_count(total), page))
    }

    async fn counts(&self) -> Result<UserCounts, PersistenceError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let grouped: Vec<(String, i64)> = users::table
            .group_by(users::role)
            .select((users::role, count_star()))
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        let verified: i64 = users::table
            .filter(users::is_verified.eq(true))
            .count()
            .get_result(&mut conn)
            .await
            .map_err(map_diesel_error)?;

        let mut by_role = Vec::with_capacity(Role::ALL.len());
        let mut total = 0;
        for (raw, count) in grouped {
            let role: Role = parse_column(&raw, "role")?;
            total += to_count(count);
            by_role.push((role, to_count(count)));
        }
        Ok(UserCounts {
            total,
            verified: to_count(verified),
            by_role,
        })
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.
    use super::*;
    use rstest::rstest;

    fn row(email: &str, role: &str) -> UserRow {
        UserRow {
            id: Uuid::new_v4(),
            email: email.to_owned(),
            full_name: "Ada Lovelace".to_owned(),
            role: role.to_owned(),
            is_verified: true,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            last_login: None,
        }
    }

    #[rstest]
    fn rows_convert_to_users() {
        let user = row_to_user(row("ada@example.com", "doctor")).expect("valid row");
        assert_eq!(user.role, Role::Doctor);
        assert_eq!(user.email.as_ref(), "ada@example.com");
    }

    #[rstest]
    #[case("ada@example.com", "surgeon")]
    #[case("not-an-email", "patient")]
    fn corrupt_rows_are_query_errors(#[case] email: &str, #[case] role: &str) {
        let err = row_to_user(row(email, role)).expect_err("corrupt row");
        assert!(matches!(err, PersistenceError::Query { .. }));
    }
}
