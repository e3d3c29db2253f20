//! Client / behavior / skill persistence

use chrono::{NaiveDate, Utc};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use abatrack_common::model::{Behavior, Client, CollectionMethod, Skill, SkillType};
use abatrack_common::{Error, Result};

use super::{parse_guid, parse_stored_timestamp};

fn row_to_client(row: &sqlx::sqlite::SqliteRow) -> Result<Client> {
    Ok(Client {
        id: parse_guid(&row.get::<String, _>("guid"))?,
        name: row.get("name"),
        birthdate: abatrack_common::time::parse_date(&row.get::<String, _>("birthdate"))
            .map_err(|e| Error::Internal(e.to_string()))?,
        info: row.get("info"),
        created_at: parse_stored_timestamp(&row.get::<String, _>("created_at"))?,
    })
}

fn row_to_behavior(row: &sqlx::sqlite::SqliteRow) -> Result<Behavior> {
    let method: String = row.get("method");
    let settings: String = row.get("settings");
    Ok(Behavior {
        id: parse_guid(&row.get::<String, _>("guid"))?,
        client_id: parse_guid(&row.get::<String, _>("client_id"))?,
        name: row.get("name"),
        description: row.get("description"),
        method: method.parse()?,
        settings: serde_json::from_str(&settings)
            .map_err(|e| Error::Internal(format!("Corrupt behavior settings: {}", e)))?,
        created_at: parse_stored_timestamp(&row.get::<String, _>("created_at"))?,
    })
}

fn row_to_skill(row: &sqlx::sqlite::SqliteRow) -> Result<Skill> {
    let skill_type: String = row.get("skill_type");
    Ok(Skill {
        id: parse_guid(&row.get::<String, _>("guid"))?,
        client_id: parse_guid(&row.get::<String, _>("client_id"))?,
        name: row.get("name"),
        description: row.get("description"),
        method: row.get("method"),
        skill_type: skill_type.parse()?,
        created_at: parse_stored_timestamp(&row.get::<String, _>("created_at"))?,
    })
}

/// Insert a new client
pub async fn insert_client(
    pool: &SqlitePool,
    name: &str,
    birthdate: NaiveDate,
    info: Option<&str>,
) -> Result<Client> {
    let client = Client {
        id: Uuid::new_v4(),
        name: name.to_string(),
        birthdate,
        info: info.map(|s| s.to_string()),
        created_at: Utc::now(),
    };

    sqlx::query(
        "INSERT INTO clients (guid, name, birthdate, info, created_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(client.id.to_string())
    .bind(&client.name)
    .bind(client.birthdate.to_string())
    .bind(&client.info)
    .bind(client.created_at.to_rfc3339())
    .execute(pool)
    .await?;

    Ok(client)
}

/// List clients, newest first (BCBA management view)
pub async fn list_clients_by_created(pool: &SqlitePool) -> Result<Vec<Client>> {
    let rows = sqlx::query("SELECT * FROM clients ORDER BY created_at DESC")
        .fetch_all(pool)
        .await?;
    rows.iter().map(row_to_client).collect()
}

/// List clients ordered by name (collection view)
pub async fn list_clients_by_name(pool: &SqlitePool) -> Result<Vec<Client>> {
    let rows = sqlx::query("SELECT * FROM clients ORDER BY name ASC")
        .fetch_all(pool)
        .await?;
    rows.iter().map(row_to_client).collect()
}

/// Fetch one client or NotFound
pub async fn get_client(pool: &SqlitePool, client_id: Uuid) -> Result<Client> {
    let row = sqlx::query("SELECT * FROM clients WHERE guid = ?")
        .bind(client_id.to_string())
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Client not found: {}", client_id)))?;
    row_to_client(&row)
}

/// Insert a new behavior for a client
///
/// INTERVAL/MTS require a positive integer `interval_seconds` in settings.
pub async fn insert_behavior(
    pool: &SqlitePool,
    client_id: Uuid,
    name: &str,
    description: Option<&str>,
    method: CollectionMethod,
    settings: serde_json::Value,
) -> Result<Behavior> {
    if method.requires_interval_seconds() {
        let ok = settings
            .get("interval_seconds")
            .and_then(|v| v.as_i64())
            .map(|secs| secs > 0)
            .unwrap_or(false);
        if !ok {
            return Err(Error::InvalidInput(
                "settings.interval_seconds (positive int) is required for INTERVAL/MTS"
                    .to_string(),
            ));
        }
    }

    let behavior = Behavior {
        id: Uuid::new_v4(),
        client_id,
        name: name.to_string(),
        description: description.map(|s| s.to_string()),
        method,
        settings,
        created_at: Utc::now(),
    };

    sqlx::query(
        r#"
        INSERT INTO behaviors (guid, client_id, name, description, method, settings, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(behavior.id.to_string())
    .bind(behavior.client_id.to_string())
    .bind(&behavior.name)
    .bind(&behavior.description)
    .bind(behavior.method.as_str())
    .bind(behavior.settings.to_string())
    .bind(behavior.created_at.to_rfc3339())
    .execute(pool)
    .await?;

    Ok(behavior)
}

/// List a client's behaviors, oldest first
pub async fn list_behaviors(pool: &SqlitePool, client_id: Uuid) -> Result<Vec<Behavior>> {
    let rows = sqlx::query("SELECT * FROM behaviors WHERE client_id = ? ORDER BY created_at ASC")
        .bind(client_id.to_string())
        .fetch_all(pool)
        .await?;
    rows.iter().map(row_to_behavior).collect()
}

/// Fetch one behavior or NotFound
pub async fn get_behavior(pool: &SqlitePool, behavior_id: Uuid) -> Result<Behavior> {
    let row = sqlx::query("SELECT * FROM behaviors WHERE guid = ?")
        .bind(behavior_id.to_string())
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Behavior not found: {}", behavior_id)))?;
    row_to_behavior(&row)
}

/// Insert a new skill for a client
pub async fn insert_skill(
    pool: &SqlitePool,
    client_id: Uuid,
    name: &str,
    description: Option<&str>,
    skill_type: SkillType,
) -> Result<Skill> {
    let skill = Skill {
        id: Uuid::new_v4(),
        client_id,
        name: name.to_string(),
        description: description.map(|s| s.to_string()),
        method: "PERCENTAGE".to_string(),
        skill_type,
        created_at: Utc::now(),
    };

    sqlx::query(
        r#"
        INSERT INTO skills (guid, client_id, name, description, method, skill_type, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(skill.id.to_string())
    .bind(skill.client_id.to_string())
    .bind(&skill.name)
    .bind(&skill.description)
    .bind(&skill.method)
    .bind(skill.skill_type.as_str())
    .bind(skill.created_at.to_rfc3339())
    .execute(pool)
    .await?;

    Ok(skill)
}

/// List a client's skills, oldest first
pub async fn list_skills(pool: &SqlitePool, client_id: Uuid) -> Result<Vec<Skill>> {
    let rows = sqlx::query("SELECT * FROM skills WHERE client_id = ? ORDER BY created_at ASC")
        .bind(client_id.to_string())
        .fetch_all(pool)
        .await?;
    rows.iter().map(row_to_skill).collect()
}

/// Fetch one skill or NotFound
pub async fn get_skill(pool: &SqlitePool, skill_id: Uuid) -> Result<Skill> {
    let row = sqlx::query("SELECT * FROM skills WHERE guid = ?")
        .bind(skill_id.to_string())
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Skill not found: {}", skill_id)))?;
    row_to_skill(&row)
}
