//! Schema bootstrap.
//!
//! Tables are created on startup when absent so a fresh database serves
//! requests without a separate migration step. Statements are idempotent;
//! existing data is never touched.

use crate::error::ApiError;
use sqlx::PgPool;

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS students (
        id          SERIAL PRIMARY KEY,
        student_id  TEXT NOT NULL UNIQUE,
        name        TEXT NOT NULL,
        email       TEXT NOT NULL UNIQUE,
        password    TEXT NOT NULL,
        created_at  TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS assignments (
        id          SERIAL PRIMARY KEY,
        title       TEXT NOT NULL,
        description TEXT NOT NULL,
        due_date    DATE NOT NULL,
        files       JSONB NOT NULL DEFAULT '[]',
        created_at  TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at  TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS assignment_comments (
        id            SERIAL PRIMARY KEY,
        assignment_id INTEGER NOT NULL,
        author        TEXT NOT NULL,
        text          TEXT NOT NULL,
        created_at    TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS topics (
        id          SERIAL PRIMARY KEY,
        topic_id    TEXT NOT NULL UNIQUE,
        subject     TEXT NOT NULL,
        message     TEXT NOT NULL,
        author      TEXT NOT NULL,
        created_at  TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS replies (
        id          SERIAL PRIMARY KEY,
        reply_id    TEXT NOT NULL UNIQUE,
        topic_id    TEXT NOT NULL,
        text        TEXT NOT NULL,
        author      TEXT NOT NULL,
        created_at  TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS weeks (
        id          SERIAL PRIMARY KEY,
        week_id     TEXT NOT NULL UNIQUE,
        title       TEXT NOT NULL,
        start_date  DATE NOT NULL,
        description TEXT NOT NULL,
        links       JSONB NOT NULL DEFAULT '[]',
        created_at  TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at  TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS week_comments (
        id          SERIAL PRIMARY KEY,
        week_id     TEXT NOT NULL,
        author      TEXT NOT NULL,
        text        TEXT NOT NULL,
        created_at  TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
];

pub async fn ensure_schema(pool: &PgPool) -> Result<(), ApiError> {
    for stmt in SCHEMA {
        sqlx::query(stmt).execute(pool).await?;
    }
    tracing::info!(tables = SCHEMA.len(), "schema ready");
    Ok(())
}
