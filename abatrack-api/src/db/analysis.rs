//! Per-date aggregation for analysis charts
//!
//! Points are derived from raw events on every request; nothing is cached
//! or stored, so deletions in the review surface show up immediately.
//! Events group by the calendar date of `happened_at` (UTC).

use std::collections::{BTreeMap, HashSet};

use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use abatrack_common::api::{BehaviorAnalysis, BehaviorMeta, SkillAnalysis, SkillMeta};
use abatrack_common::model::{BehaviorEventType, CollectionMethod, DatedPoint, SkillEventType};
use abatrack_common::time::date_key;
use abatrack_common::Result;

use super::parse_stored_timestamp;

#[derive(Default)]
struct DateBucket {
    value_sum: i64,
    hit_count: i64,
    correct: i64,
    total: i64,
    sessions: HashSet<Uuid>,
}

/// Aggregate one behavior's events into one point per calendar date
///
/// FREQUENCY: sum of INC/DEC values (net count; collectors clamp only
/// the display, so corrections can drive a date net negative).
/// DURATION: sum of STOP values in seconds (START rows carry no value
/// and are skipped). INTERVAL/MTS: count of HIT events. Dates with no
/// relevant events produce no point.
pub async fn behavior_points(pool: &SqlitePool, behavior_id: Uuid) -> Result<BehaviorAnalysis> {
    let behavior = super::catalog::get_behavior(pool, behavior_id).await?;

    let rows = sqlx::query(
        r#"
        SELECT session_id, event_type, value, happened_at
        FROM behavior_events
        WHERE behavior_id = ?
        ORDER BY happened_at ASC
        "#,
    )
    .bind(behavior_id.to_string())
    .fetch_all(pool)
    .await?;

    let mut buckets: BTreeMap<chrono::NaiveDate, DateBucket> = BTreeMap::new();
    for row in &rows {
        let event_type: BehaviorEventType = row.get::<String, _>("event_type").parse()?;
        let relevant = match behavior.method {
            CollectionMethod::Frequency => matches!(
                event_type,
                BehaviorEventType::Inc | BehaviorEventType::Dec
            ),
            CollectionMethod::Duration => event_type == BehaviorEventType::Stop,
            CollectionMethod::Interval | CollectionMethod::Mts => {
                event_type == BehaviorEventType::Hit
            }
        };
        if !relevant {
            continue;
        }

        let happened_at = parse_stored_timestamp(&row.get::<String, _>("happened_at"))?;
        let session_id = super::parse_guid(&row.get::<String, _>("session_id"))?;
        let bucket = buckets.entry(date_key(happened_at)).or_default();
        bucket.sessions.insert(session_id);
        match behavior.method {
            CollectionMethod::Frequency | CollectionMethod::Duration => {
                bucket.value_sum += row.get::<Option<i64>, _>("value").unwrap_or(0);
            }
            CollectionMethod::Interval | CollectionMethod::Mts => {
                bucket.hit_count += 1;
            }
        }
    }

    let points = buckets
        .into_iter()
        .map(|(date, bucket)| DatedPoint {
            date,
            value: match behavior.method {
                CollectionMethod::Frequency | CollectionMethod::Duration => bucket.value_sum,
                CollectionMethod::Interval | CollectionMethod::Mts => bucket.hit_count,
            },
            session_count: bucket.sessions.len() as i64,
        })
        .collect();

    Ok(BehaviorAnalysis {
        behavior: BehaviorMeta {
            id: behavior.id,
            name: behavior.name,
            method: behavior.method,
        },
        points,
    })
}

/// Aggregate one skill's trials into percent-correct per calendar date
///
/// value = round(100 * correct / total). Dates with zero trials never
/// appear, so no division by zero is possible.
pub async fn skill_points(pool: &SqlitePool, skill_id: Uuid) -> Result<SkillAnalysis> {
    let skill = super::catalog::get_skill(pool, skill_id).await?;

    let rows = sqlx::query(
        r#"
        SELECT session_id, event_type, happened_at
        FROM skill_events
        WHERE skill_id = ?
        ORDER BY happened_at ASC
        "#,
    )
    .bind(skill_id.to_string())
    .fetch_all(pool)
    .await?;

    let mut buckets: BTreeMap<chrono::NaiveDate, DateBucket> = BTreeMap::new();
    for row in &rows {
        let event_type: SkillEventType = row.get::<String, _>("event_type").parse()?;
        let happened_at = parse_stored_timestamp(&row.get::<String, _>("happened_at"))?;
        let session_id = super::parse_guid(&row.get::<String, _>("session_id"))?;

        let bucket = buckets.entry(date_key(happened_at)).or_default();
        bucket.sessions.insert(session_id);
        bucket.total += 1;
        if event_type == SkillEventType::Correct {
            bucket.correct += 1;
        }
    }

    let points = buckets
        .into_iter()
        .map(|(date, bucket)| DatedPoint {
            date,
            value: (bucket.correct as f64 / bucket.total as f64 * 100.0).round() as i64,
            session_count: bucket.sessions.len() as i64,
        })
        .collect();

    Ok(SkillAnalysis {
        skill: SkillMeta {
            id: skill.id,
            name: skill.name,
            method: skill.method,
            skill_type: skill.skill_type,
        },
        points,
    })
}
