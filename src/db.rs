//! CRUD helpers for the people table.

use thiserror::Error;
use tokio_postgres::{Client, Row};
use tracing::debug;

/// An error from a people query.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("no such person")]
    NotFound,
    #[error("database error: {0}")]
    Postgres(#[from] tokio_postgres::Error),
}

/// A row of the people table.
#[derive(Clone, Debug, PartialEq)]
pub struct Person {
    pub id: i32,
    pub name: String,
    pub email: String,
}

impl Person {
    fn from_row(row: &Row) -> Self {
        Self {
            id: row.get("id"),
            name: row.get("name"),
            email: row.get("email"),
        }
    }
}

pub async fn person_by_id(db: &Client, id: i32) -> Result<Person, DbError> {
    debug!("fetching person {}", id);
    let row = db
        .query_opt("SELECT id, name, email FROM people WHERE id = $1", &[&id])
        .await?
        .ok_or(DbError::NotFound)?;

    Ok(Person::from_row(&row))
}

pub async fn update_person(db: &Client, id: i32, name: &str, email: &str) -> Result<(), DbError> {
    debug!("updating person {}", id);
    let updated = db
        .execute(
            "UPDATE people SET name = $1, email = $2 WHERE id = $3",
            &[&name, &email, &id],
        )
        .await?;

    if updated == 0 {
        return Err(DbError::NotFound);
    }

    Ok(())
}

pub async fn all_people(db: &Client) -> Result<Vec<Person>, DbError> {
    debug!("fetching all people");
    let rows = db
        .query("SELECT id, name, email FROM people ORDER BY id", &[])
        .await?;

    Ok(rows.iter().map(Person::from_row).collect())
}
