//! Session and event persistence
//!
//! Sessions own their events. Deleting a session removes behavior events,
//! then skill events, then the session row, all in one transaction —
//! cascade order is explicit so correctness does not depend on the storage
//! engine honoring ON DELETE CASCADE.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use abatrack_common::api::{SessionDetails, SessionListQuery, SessionSummary};
use abatrack_common::model::{
    BehaviorEvent, BehaviorSession, CollectionMethod, NewBehaviorEvent, NewSkillEvent, SkillEvent,
};
use abatrack_common::{Error, Result};

use super::{parse_guid, parse_stored_timestamp};

fn row_to_session(row: &sqlx::sqlite::SqliteRow) -> Result<BehaviorSession> {
    let ended_at: Option<String> = row.get("ended_at");
    Ok(BehaviorSession {
        id: parse_guid(&row.get::<String, _>("guid"))?,
        client_id: parse_guid(&row.get::<String, _>("client_id"))?,
        started_at: parse_stored_timestamp(&row.get::<String, _>("started_at"))?,
        ended_at: ended_at.as_deref().map(parse_stored_timestamp).transpose()?,
    })
}

fn row_to_behavior_event(row: &sqlx::sqlite::SqliteRow) -> Result<BehaviorEvent> {
    let event_type: String = row.get("event_type");
    let extra: Option<String> = row.get("extra");
    Ok(BehaviorEvent {
        id: parse_guid(&row.get::<String, _>("guid"))?,
        session_id: parse_guid(&row.get::<String, _>("session_id"))?,
        behavior_id: parse_guid(&row.get::<String, _>("behavior_id"))?,
        event_type: event_type.parse()?,
        value: row.get("value"),
        happened_at: parse_stored_timestamp(&row.get::<String, _>("happened_at"))?,
        extra: extra
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
            .map_err(|e| Error::Internal(format!("Corrupt event extra: {}", e)))?,
    })
}

fn row_to_skill_event(row: &sqlx::sqlite::SqliteRow) -> Result<SkillEvent> {
    let event_type: String = row.get("event_type");
    Ok(SkillEvent {
        id: parse_guid(&row.get::<String, _>("guid"))?,
        session_id: parse_guid(&row.get::<String, _>("session_id"))?,
        skill_id: parse_guid(&row.get::<String, _>("skill_id"))?,
        event_type: event_type.parse()?,
        happened_at: parse_stored_timestamp(&row.get::<String, _>("happened_at"))?,
    })
}

/// Create a new open session for a client
///
/// `started_at` is the server instant; the client-chosen date is advisory
/// and not persisted.
pub async fn insert_session(pool: &SqlitePool, client_id: Uuid) -> Result<BehaviorSession> {
    let session = BehaviorSession {
        id: Uuid::new_v4(),
        client_id,
        started_at: Utc::now(),
        ended_at: None,
    };

    sqlx::query(
        "INSERT INTO behavior_sessions (guid, client_id, started_at, ended_at) VALUES (?, ?, ?, NULL)",
    )
    .bind(session.id.to_string())
    .bind(session.client_id.to_string())
    .bind(session.started_at.to_rfc3339())
    .execute(pool)
    .await?;

    Ok(session)
}

/// Fetch one session or NotFound
pub async fn get_session(pool: &SqlitePool, session_id: Uuid) -> Result<BehaviorSession> {
    let row = sqlx::query("SELECT * FROM behavior_sessions WHERE guid = ?")
        .bind(session_id.to_string())
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Session not found: {}", session_id)))?;
    row_to_session(&row)
}

fn require_open(session: &BehaviorSession) -> Result<()> {
    if !session.is_open() {
        return Err(Error::Conflict(format!(
            "Session {} is already ended",
            session.id
        )));
    }
    Ok(())
}

/// Insert a batch of behavior events for an open session
///
/// The whole batch is one transaction in queue order. Every event's
/// behavior must belong to the session's client and its event type must
/// match the behavior's collection method; a single mismatch rejects the
/// batch so nothing is half-recorded.
pub async fn insert_behavior_events(
    pool: &SqlitePool,
    session: &BehaviorSession,
    events: &[NewBehaviorEvent],
    received_at: DateTime<Utc>,
) -> Result<usize> {
    require_open(session)?;

    // Resolve each distinct behavior once: (owner client, method)
    let mut targets: HashMap<Uuid, (Uuid, CollectionMethod)> = HashMap::new();
    for ev in events {
        if targets.contains_key(&ev.behavior_id) {
            continue;
        }
        let row = sqlx::query("SELECT client_id, method FROM behaviors WHERE guid = ?")
            .bind(ev.behavior_id.to_string())
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| Error::InvalidInput(format!("Unknown behavior: {}", ev.behavior_id)))?;
        let client_id = parse_guid(&row.get::<String, _>("client_id"))?;
        let method: CollectionMethod = row.get::<String, _>("method").parse()?;
        targets.insert(ev.behavior_id, (client_id, method));
    }

    for ev in events {
        let (client_id, method) = targets[&ev.behavior_id];
        if client_id != session.client_id {
            return Err(Error::InvalidInput(format!(
                "Behavior {} does not belong to the session's client",
                ev.behavior_id
            )));
        }
        if !ev.event_type.valid_for(method) {
            return Err(Error::InvalidInput(format!(
                "Event type {} is not valid for a {} behavior",
                ev.event_type.as_str(),
                method.as_str()
            )));
        }
    }

    let mut tx = pool.begin().await?;
    for ev in events {
        let happened_at = ev.happened_at.unwrap_or(received_at);
        sqlx::query(
            r#"
            INSERT INTO behavior_events (guid, session_id, behavior_id, event_type, value, happened_at, extra)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(session.id.to_string())
        .bind(ev.behavior_id.to_string())
        .bind(ev.event_type.as_str())
        .bind(ev.value)
        .bind(happened_at.to_rfc3339())
        .bind(ev.extra.as_ref().map(|v| v.to_string()))
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;

    Ok(events.len())
}

/// Insert a batch of skill events for an open session
pub async fn insert_skill_events(
    pool: &SqlitePool,
    session: &BehaviorSession,
    events: &[NewSkillEvent],
    received_at: DateTime<Utc>,
) -> Result<usize> {
    require_open(session)?;

    let mut owners: HashMap<Uuid, Uuid> = HashMap::new();
    for ev in events {
        if owners.contains_key(&ev.skill_id) {
            continue;
        }
        let row = sqlx::query("SELECT client_id FROM skills WHERE guid = ?")
            .bind(ev.skill_id.to_string())
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| Error::InvalidInput(format!("Unknown skill: {}", ev.skill_id)))?;
        owners.insert(ev.skill_id, parse_guid(&row.get::<String, _>("client_id"))?);
    }

    for ev in events {
        if owners[&ev.skill_id] != session.client_id {
            return Err(Error::InvalidInput(format!(
                "Skill {} does not belong to the session's client",
                ev.skill_id
            )));
        }
    }

    let mut tx = pool.begin().await?;
    for ev in events {
        let happened_at = ev.happened_at.unwrap_or(received_at);
        sqlx::query(
            r#"
            INSERT INTO skill_events (guid, session_id, skill_id, event_type, happened_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(session.id.to_string())
        .bind(ev.skill_id.to_string())
        .bind(ev.event_type.as_str())
        .bind(happened_at.to_rfc3339())
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;

    Ok(events.len())
}

/// Mark a session ended; an already-ended session is a conflict
pub async fn end_session(pool: &SqlitePool, session_id: Uuid) -> Result<BehaviorSession> {
    let mut session = get_session(pool, session_id).await?;
    require_open(&session)?;

    let ended_at = Utc::now();
    sqlx::query("UPDATE behavior_sessions SET ended_at = ? WHERE guid = ?")
        .bind(ended_at.to_rfc3339())
        .bind(session_id.to_string())
        .execute(pool)
        .await?;

    session.ended_at = Some(ended_at);
    Ok(session)
}

/// List sessions with per-session event counts, newest first
///
/// Optional filters: start date range (on the session's calendar date)
/// and owning client.
pub async fn list_sessions(
    pool: &SqlitePool,
    query: &SessionListQuery,
) -> Result<Vec<SessionSummary>> {
    let mut sql = String::from(
        r#"
        SELECT s.*,
            (SELECT COUNT(*) FROM behavior_events e WHERE e.session_id = s.guid) AS behavior_event_count,
            (SELECT COUNT(*) FROM skill_events e WHERE e.session_id = s.guid) AS skill_event_count
        FROM behavior_sessions s
        WHERE 1 = 1
        "#,
    );

    let mut binds: Vec<String> = Vec::new();
    if let Some(from) = query.date_from {
        sql.push_str(" AND date(s.started_at) >= date(?)");
        binds.push(from.to_string());
    }
    if let Some(to) = query.date_to {
        sql.push_str(" AND date(s.started_at) <= date(?)");
        binds.push(to.to_string());
    }
    if let Some(client_id) = query.client_id {
        sql.push_str(" AND s.client_id = ?");
        binds.push(client_id.to_string());
    }
    sql.push_str(" ORDER BY s.started_at DESC");

    let mut q = sqlx::query(&sql);
    for b in &binds {
        q = q.bind(b);
    }
    let rows = q.fetch_all(pool).await?;

    rows.iter()
        .map(|row| {
            Ok(SessionSummary {
                session: row_to_session(row)?,
                behavior_event_count: row.get("behavior_event_count"),
                skill_event_count: row.get("skill_event_count"),
            })
        })
        .collect()
}

/// Fetch a session's events grouped by behavior and skill target
pub async fn session_details(pool: &SqlitePool, session_id: Uuid) -> Result<SessionDetails> {
    use abatrack_common::api::{BehaviorEventGroup, SkillEventGroup};

    let session = get_session(pool, session_id).await?;

    let rows = sqlx::query(
        "SELECT * FROM behavior_events WHERE session_id = ? ORDER BY happened_at ASC",
    )
    .bind(session_id.to_string())
    .fetch_all(pool)
    .await?;
    let behavior_events: Vec<BehaviorEvent> =
        rows.iter().map(row_to_behavior_event).collect::<Result<_>>()?;

    let rows = sqlx::query(
        "SELECT * FROM skill_events WHERE session_id = ? ORDER BY happened_at ASC",
    )
    .bind(session_id.to_string())
    .fetch_all(pool)
    .await?;
    let skill_events: Vec<SkillEvent> =
        rows.iter().map(row_to_skill_event).collect::<Result<_>>()?;

    // Group preserving first-seen target order
    let mut behaviors: Vec<BehaviorEventGroup> = Vec::new();
    for ev in behavior_events {
        match behaviors.iter_mut().find(|g| g.behavior.id == ev.behavior_id) {
            Some(group) => group.events.push(ev),
            None => {
                let behavior = super::catalog::get_behavior(pool, ev.behavior_id).await?;
                behaviors.push(BehaviorEventGroup {
                    behavior,
                    events: vec![ev],
                });
            }
        }
    }

    let mut skills: Vec<SkillEventGroup> = Vec::new();
    for ev in skill_events {
        match skills.iter_mut().find(|g| g.skill.id == ev.skill_id) {
            Some(group) => group.events.push(ev),
            None => {
                let skill = super::catalog::get_skill(pool, ev.skill_id).await?;
                skills.push(SkillEventGroup {
                    skill,
                    events: vec![ev],
                });
            }
        }
    }

    Ok(SessionDetails {
        session,
        behaviors,
        skills,
    })
}

/// Hard-delete one behavior event
pub async fn delete_behavior_event(pool: &SqlitePool, event_id: Uuid) -> Result<()> {
    let result = sqlx::query("DELETE FROM behavior_events WHERE guid = ?")
        .bind(event_id.to_string())
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!(
            "Behavior event not found: {}",
            event_id
        )));
    }
    Ok(())
}

/// Hard-delete one skill event
pub async fn delete_skill_event(pool: &SqlitePool, event_id: Uuid) -> Result<()> {
    let result = sqlx::query("DELETE FROM skill_events WHERE guid = ?")
        .bind(event_id.to_string())
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!(
            "Skill event not found: {}",
            event_id
        )));
    }
    Ok(())
}

/// Delete a session and all its events, events first
pub async fn delete_session(pool: &SqlitePool, session_id: Uuid) -> Result<()> {
    // Existence check up front so a repeat delete is a clean 404
    get_session(pool, session_id).await?;

    let mut tx = pool.begin().await?;
    sqlx::query("DELETE FROM behavior_events WHERE session_id = ?")
        .bind(session_id.to_string())
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM skill_events WHERE session_id = ?")
        .bind(session_id.to_string())
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM behavior_sessions WHERE guid = ?")
        .bind(session_id.to_string())
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    Ok(())
}
