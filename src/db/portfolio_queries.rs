use sqlx::PgPool;
use uuid::Uuid;
use crate::models::{CreatePortfolio, Portfolio, UpdatePortfolio};

pub async fn fetch_all_for_owner(pool: &PgPool, owner_id: Uuid) -> Result<Vec<Portfolio>, sqlx::Error> {
    sqlx::query_as::<_, Portfolio>(
        "SELECT id, owner_id, name, description, created_at
         FROM portfolios
         WHERE owner_id = $1
         ORDER BY created_at DESC")
        .bind(owner_id)
        .fetch_all(pool)
        .await
}

pub async fn fetch_one(pool: &PgPool, id: Uuid, owner_id: Uuid) -> Result<Option<Portfolio>, sqlx::Error> {
    sqlx::query_as::<_, Portfolio>(
        "SELECT id, owner_id, name, description, created_at
         FROM portfolios
         WHERE id = $1 AND owner_id = $2")
        .bind(id)
        .bind(owner_id)
        .fetch_optional(pool)
        .await
}

pub async fn create(pool: &PgPool, owner_id: Uuid, input: CreatePortfolio) -> Result<Portfolio, sqlx::Error> {
    sqlx::query_as::<_, Portfolio>(
        "INSERT INTO portfolios (id, owner_id, name, description)
         VALUES ($1, $2, $3, $4)
         RETURNING id, owner_id, name, description, created_at")
        .bind(Uuid::new_v4())
        .bind(owner_id)
        .bind(input.name)
        .bind(input.description)
        .fetch_one(pool)
        .await
}

pub async fn update(pool: &PgPool, id: Uuid, owner_id: Uuid, input: UpdatePortfolio) -> Result<Option<Portfolio>, sqlx::Error> {
    sqlx::query_as::<_, Portfolio>(
        "UPDATE portfolios
         SET name = COALESCE($3, name),
             description = COALESCE($4, description)
         WHERE id = $1 AND owner_id = $2
         RETURNING id, owner_id, name, description, created_at")
        .bind(id)
        .bind(owner_id)
        .bind(input.name)
        .bind(input.description)
        .fetch_optional(pool)
        .await
}

pub async fn delete(pool: &PgPool, id: Uuid, owner_id: Uuid) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM portfolios WHERE id = $1 AND owner_id = $2")
        .bind(id)
        .bind(owner_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

pub async fn fetch_all_ids(pool: &PgPool) -> Result<Vec<Uuid>, sqlx::Error> {
    sqlx::query_scalar::<_, Uuid>("SELECT id FROM portfolios")
        .fetch_all(pool)
        .await
}
