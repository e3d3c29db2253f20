//! Durable store client
//!
//! [`EventStore`] is the seam between the collection engine and
//! abatrack-api. The engine is generic over it so the sync and lifecycle
//! logic can be exercised against an in-memory store in tests.

use std::future::Future;

use chrono::NaiveDate;
use uuid::Uuid;

use abatrack_common::api::{
    PostBehaviorEventsRequest, PostEventsResponse, PostSkillEventsRequest, StartSessionRequest,
};
use abatrack_common::model::{BehaviorSession, NewBehaviorEvent, NewSkillEvent, Role};

use crate::error::{CollectorError, Result};

/// Operations the engine needs from the durable store
pub trait EventStore {
    /// Open a new session for a client
    fn start_session(
        &self,
        client_id: Uuid,
        date: NaiveDate,
    ) -> impl Future<Output = Result<BehaviorSession>> + Send;

    /// Append a batch of behavior events to an open session
    fn post_behavior_events(
        &self,
        session_id: Uuid,
        events: &[NewBehaviorEvent],
    ) -> impl Future<Output = Result<usize>> + Send;

    /// Append a batch of skill events to an open session
    fn post_skill_events(
        &self,
        session_id: Uuid,
        events: &[NewSkillEvent],
    ) -> impl Future<Output = Result<usize>> + Send;

    /// Mark a session ended
    fn end_session(&self, session_id: Uuid) -> impl Future<Output = Result<BehaviorSession>> + Send;
}

/// HTTP-backed store talking to abatrack-api
#[derive(Debug, Clone)]
pub struct HttpEventStore {
    http: reqwest::Client,
    base_url: String,
    role: Role,
}

impl HttpEventStore {
    /// `base_url` without a trailing slash, e.g. `http://127.0.0.1:8001`
    pub fn new(base_url: impl Into<String>, role: Role) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            role,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Map a non-success response to `Rejected`, extracting the server's
    /// error message when the body matches the API error envelope.
    async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let message = match response.json::<serde_json::Value>().await {
            Ok(body) => body["error"]["message"]
                .as_str()
                .unwrap_or("unknown error")
                .to_string(),
            Err(_) => "unknown error".to_string(),
        };
        Err(CollectorError::Rejected { status, message })
    }
}

impl EventStore for HttpEventStore {
    async fn start_session(&self, client_id: Uuid, date: NaiveDate) -> Result<BehaviorSession> {
        let response = self
            .http
            .post(self.url("/api/sessions/start"))
            .header(ROLE_HEADER, self.role.as_str())
            .json(&StartSessionRequest { client_id, date })
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    async fn post_behavior_events(
        &self,
        session_id: Uuid,
        events: &[NewBehaviorEvent],
    ) -> Result<usize> {
        let response = self
            .http
            .post(self.url(&format!("/api/sessions/{}/events", session_id)))
            .header(ROLE_HEADER, self.role.as_str())
            .json(&PostBehaviorEventsRequest {
                events: events.to_vec(),
            })
            .send()
            .await?;
        let ack: PostEventsResponse = Self::check(response).await?.json().await?;
        Ok(ack.created)
    }

    async fn post_skill_events(&self, session_id: Uuid, events: &[NewSkillEvent]) -> Result<usize> {
        let response = self
            .http
            .post(self.url(&format!("/api/sessions/{}/skill-events", session_id)))
            .header(ROLE_HEADER, self.role.as_str())
            .json(&PostSkillEventsRequest {
                events: events.to_vec(),
            })
            .send()
            .await?;
        let ack: PostEventsResponse = Self::check(response).await?.json().await?;
        Ok(ack.created)
    }

    async fn end_session(&self, session_id: Uuid) -> Result<BehaviorSession> {
        let response = self
            .http
            .post(self.url(&format!("/api/sessions/{}/end", session_id)))
            .header(ROLE_HEADER, self.role.as_str())
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }
}

/// Request header carrying the actor role, shared with abatrack-api
pub const ROLE_HEADER: &str = "x-abatrack-role";
