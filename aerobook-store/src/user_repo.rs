use aerobook_core::identity::{Address, OperatorDecision, OperatorDetails, ProfileUpdate, Role, User};
use aerobook_core::repository::UserRepository;
use aerobook_core::CoreResult;
use aerobook_shared::{ApprovalStatus, Masked};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::database::{corrupt, db_error};

const USER_COLUMNS: &str = "id, first_name, last_name, email, password_hash, phone, role, date_of_birth, \
     address, operator_details, created_at, updated_at";

pub struct PostgresUserRepository {
    pool: PgPool,
}

impl PostgresUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    first_name: String,
    last_name: Option<String>,
    email: String,
    password_hash: String,
    phone: String,
    role: String,
    date_of_birth: Option<NaiveDate>,
    address: Option<Json<Address>>,
    operator_details: Option<Json<OperatorDetails>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = aerobook_core::CoreError;

    fn try_from(row: UserRow) -> CoreResult<Self> {
        Ok(User {
            id: row.id,
            first_name: row.first_name,
            last_name: row.last_name,
            email: row.email,
            password_hash: Masked::new(row.password_hash),
            phone: row.phone,
            role: row.role.parse::<Role>().map_err(corrupt)?,
            date_of_birth: row.date_of_birth,
            address: row.address.map(|a| a.0),
            operator_details: row.operator_details.map(|d| d.0),
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

async fn lock_user(conn: &mut PgConnection, id: Uuid) -> CoreResult<Option<User>> {
    let row = sqlx::query_as::<_, UserRow>(&format!("SELECT {} FROM users WHERE id = $1 FOR UPDATE", USER_COLUMNS))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(db_error)?;
    row.map(User::try_from).transpose()
}

fn into_users(rows: Vec<UserRow>) -> CoreResult<Vec<User>> {
    rows.into_iter().map(User::try_from).collect()
}

#[async_trait]
impl UserRepository for PostgresUserRepository {
    async fn create_user(&self, user: &User) -> CoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO users (id, first_name, last_name, email, password_hash, phone, role, date_of_birth,
                               address, operator_details, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(user.id)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.email)
        .bind(user.password_hash.expose())
        .bind(&user.phone)
        .bind(user.role.as_str())
        .bind(user.date_of_birth)
        .bind(user.address.as_ref().map(Json))
        .bind(user.operator_details.as_ref().map(Json))
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    async fn get_user(&self, id: Uuid) -> CoreResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;
        row.map(User::try_from).transpose()
    }

    async fn find_by_email(&self, email: &str) -> CoreResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users WHERE LOWER(email) = LOWER($1)",
            USER_COLUMNS
        ))
        .bind(email.trim())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;
        row.map(User::try_from).transpose()
    }

    async fn list_users(&self) -> CoreResult<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>(&format!("SELECT {} FROM users ORDER BY created_at DESC", USER_COLUMNS))
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;
        into_users(rows)
    }

    async fn list_operators(&self, status: ApprovalStatus) -> CoreResult<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users WHERE role = 'operator' AND operator_details->>'approvalStatus' = $1 \
             ORDER BY created_at DESC",
            USER_COLUMNS
        ))
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;
        into_users(rows)
    }

    async fn count_by_role(&self, role: Role) -> CoreResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE role = $1")
            .bind(role.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(count.max(0) as u64)
    }

    async fn update_profile(&self, id: Uuid, update: &ProfileUpdate) -> CoreResult<Option<User>> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;
        let Some(mut user) = lock_user(&mut *tx, id).await? else {
            return Ok(None);
        };
        user.apply_profile(update, Utc::now())?;

        sqlx::query(
            r#"
            UPDATE users
            SET first_name = $2, last_name = $3, phone = $4, address = $5, updated_at = $6
            WHERE id = $1
            "#,
        )
        .bind(user.id)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.phone)
        .bind(user.address.as_ref().map(Json))
        .bind(user.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;

        tx.commit().await.map_err(db_error)?;
        Ok(Some(user))
    }

    async fn decide_operator(&self, id: Uuid, admin: &User, decision: &OperatorDecision) -> CoreResult<Option<User>> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;
        let Some(mut user) = lock_user(&mut *tx, id).await? else {
            return Ok(None);
        };
        user.apply_decision(admin, decision, Utc::now())?;

        sqlx::query("UPDATE users SET operator_details = $2, updated_at = $3 WHERE id = $1")
            .bind(user.id)
            .bind(user.operator_details.as_ref().map(Json))
            .bind(user.updated_at)
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;

        tx.commit().await.map_err(db_error)?;
        Ok(Some(user))
    }
}
