use axum::async_trait;
use sqlx::PgPool;

use crate::error::{Error, Result};
use crate::models::user::{NewUser, User, UserChanges};
use crate::services::query_resolver::{UserFilter, UserQuery};

const USER_COLUMNS: &str = "id, name, email, password_hash, created_at, updated_at";

/// One page of users plus the size of the whole filtered set.
#[derive(Debug, Clone)]
pub struct UserPage {
    pub items: Vec<User>,
    pub total: i64,
}

/// Persistence of users. Email uniqueness is case-insensitive and enforced
/// by the store itself; a losing insert or update yields [`Error::Conflict`].
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, id: i64) -> Result<Option<User>>;

    /// Whether another user already owns `email`, ignoring `except_id`.
    async fn email_taken(&self, email: &str, except_id: Option<i64>) -> Result<bool>;

    async fn create(&self, user: NewUser) -> Result<User>;

    /// Fails with [`Error::NotFound`] when the user is gone.
    async fn update(&self, id: i64, changes: UserChanges) -> Result<User>;

    /// Fails with [`Error::NotFound`] when nothing was deleted.
    async fn delete(&self, id: i64) -> Result<()>;

    async fn query_paginated(&self, query: &UserQuery) -> Result<UserPage>;
}

#[derive(Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

enum Bind {
    Text(String),
    Int(i64),
}

/// Builds the `WHERE` clause for `filter`, numbering placeholders from `$1`.
fn where_clause(filter: &UserFilter) -> (String, Vec<Bind>) {
    let mut clauses: Vec<String> = Vec::new();
    let mut args: Vec<Bind> = Vec::new();

    for (column, terms) in [("name", &filter.name), ("email", &filter.email)] {
        if terms.is_empty() {
            continue;
        }
        let mut any = Vec::with_capacity(terms.len());
        for term in terms {
            args.push(Bind::Text(format!("%{}%", escape_like(term))));
            any.push(format!("{} ILIKE ${}", column, args.len()));
        }
        clauses.push(format!("({})", any.join(" OR ")));
    }
    if let Some(id) = filter.id {
        args.push(Bind::Int(id));
        clauses.push(format!("id = ${}", args.len()));
    }

    let clause = if clauses.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", clauses.join(" AND "))
    };
    (clause, args)
}

fn order_clause(query: &UserQuery) -> String {
    let parts: Vec<String> = query
        .sorts
        .iter()
        .map(|s| format!("{} {}", s.field.column(), s.direction.sql()))
        .collect();
    format!("ORDER BY {}", parts.join(", "))
}

fn escape_like(term: &str) -> String {
    let mut out = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn find_by_id(&self, id: i64) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE id = $1",
            USER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn email_taken(&self, email: &str, except_id: Option<i64>) -> Result<bool> {
        let taken = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM users
                WHERE LOWER(email) = LOWER($1)
                  AND ($2::BIGINT IS NULL OR id <> $2)
            )
            "#,
        )
        .bind(email)
        .bind(except_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(taken)
    }

    async fn create(&self, user: NewUser) -> Result<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (name, email, password_hash)
            VALUES ($1, $2, $3)
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(user.name)
        .bind(user.email)
        .bind(user.password_hash)
        .fetch_one(&self.pool)
        .await?;
        Ok(user)
    }

    async fn update(&self, id: i64, changes: UserChanges) -> Result<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET
                name = COALESCE($2, name),
                email = COALESCE($3, email),
                password_hash = COALESCE($4, password_hash),
                updated_at = CASE
                    WHEN (COALESCE($2, name), COALESCE($3, email), COALESCE($4, password_hash))
                        IS DISTINCT FROM (name, email, password_hash)
                    THEN NOW()
                    ELSE updated_at
                END
            WHERE id = $1
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(id)
        .bind(changes.name)
        .bind(changes.email)
        .bind(changes.password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => Error::NotFound("User not found".to_string()),
            other => other.into(),
        })?;
        Ok(user)
    }

    async fn delete(&self, id: i64) -> Result<()> {
        let res = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if res.rows_affected() == 0 {
            return Err(Error::NotFound("User not found".to_string()));
        }
        Ok(())
    }

    async fn query_paginated(&self, query: &UserQuery) -> Result<UserPage> {
        let (where_clause, args) = where_clause(&query.filter);

        let items_query = format!(
            "SELECT {} FROM users {} {} LIMIT ${} OFFSET ${}",
            USER_COLUMNS,
            where_clause,
            order_clause(query),
            args.len() + 1,
            args.len() + 2
        );
        let total_query = format!("SELECT COUNT(*) FROM users {}", where_clause);

        let mut items_statement = sqlx::query_as::<_, User>(&items_query);
        for value in &args {
            items_statement = match value {
                Bind::Text(text) => items_statement.bind(text.as_str()),
                Bind::Int(int) => items_statement.bind(*int),
            };
        }
        let items = items_statement
            .bind(query.per_page)
            .bind(query.offset())
            .fetch_all(&self.pool)
            .await?;

        let mut total_statement = sqlx::query_scalar::<_, i64>(&total_query);
        for value in &args {
            total_statement = match value {
                Bind::Text(text) => total_statement.bind(text.as_str()),
                Bind::Int(int) => total_statement.bind(*int),
            };
        }
        let total = total_statement.fetch_one(&self.pool).await?;

        Ok(UserPage { items, total })
    }
}
