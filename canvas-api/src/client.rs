use reqwest::{Client, IntoUrl, Method, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::config::ApiConfig;
use crate::error::{parse_error_message, ApiError};

/// Name given to rooms created without one.
pub const DEFAULT_ROOM_NAME: &str = "Untitled Project";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct User {
    #[serde(rename = "_id", alias = "id", default)]
    pub id: Option<String>,
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub room_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default)]
    pub last_modified: Option<String>,
}

#[derive(Deserialize)]
struct UserEnvelope {
    user: User,
}

#[derive(Deserialize)]
struct RoomEnvelope {
    room: Room,
}

#[derive(Deserialize)]
struct RoomsEnvelope {
    rooms: Vec<Room>,
}

#[derive(Serialize)]
struct RoomNameBody<'a> {
    name: &'a str,
}

/// Client for the account and room service.
///
/// Every request carries the bearer token when one is set. Calls that
/// act on behalf of a user fail with [`ApiError::MissingToken`] without
/// touching the network when none is.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    config: ApiConfig,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(config: ApiConfig) -> Result<Self, ApiError> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build()?;
        Ok(Self {
            http,
            config,
            token: None,
        })
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.set_token(Some(token.into()));
        self
    }

    pub fn set_token(&mut self, token: Option<String>) {
        self.token = token.filter(|t| !t.trim().is_empty());
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    /// Absolute URL for an `/api/...` path.
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.config.base_url.trim().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// `/api/rooms/{id}` with the id encoded as a single path segment.
    pub fn room_url(&self, room_id: &str) -> Result<Url, ApiError> {
        let base = self.endpoint("api/rooms");
        let mut url = Url::parse(&base).map_err(|e| ApiError::InvalidUrl(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidUrl(base.clone()))?
            .push(room_id);
        Ok(url)
    }

    fn request(&self, method: Method, url: impl IntoUrl) -> RequestBuilder {
        let builder = self.http.request(method, url);
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    fn authed(&self, method: Method, url: impl IntoUrl) -> Result<RequestBuilder, ApiError> {
        if self.token.is_none() {
            return Err(ApiError::MissingToken);
        }
        Ok(self.request(method, url))
    }

    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, ApiError> {
        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            let message = parse_error_message(status, &body);
            log::warn!("API call failed: {status} {message}");
            return Err(ApiError::Status { status, message });
        }
        Ok(serde_json::from_str(&body)?)
    }

    /// `GET /api/auth/me`
    pub async fn current_user(&self) -> Result<User, ApiError> {
        let builder = self.authed(Method::GET, self.endpoint("api/auth/me"))?;
        let envelope: UserEnvelope = self.send(builder).await?;
        log::debug!("Authenticated as {}", envelope.user.username);
        Ok(envelope.user)
    }

    /// `GET /api/rooms/my-rooms`
    pub async fn list_rooms(&self) -> Result<Vec<Room>, ApiError> {
        let envelope: RoomsEnvelope = self
            .send(self.authed(Method::GET, self.endpoint("api/rooms/my-rooms"))?)
            .await?;
        Ok(envelope.rooms)
    }

    /// `POST /api/rooms`. A blank name becomes [`DEFAULT_ROOM_NAME`].
    pub async fn create_room(&self, name: &str) -> Result<Room, ApiError> {
        let name = match name.trim() {
            "" => DEFAULT_ROOM_NAME,
            trimmed => trimmed,
        };
        let builder = self
            .authed(Method::POST, self.endpoint("api/rooms"))?
            .json(&RoomNameBody { name });
        let envelope: RoomEnvelope = self.send(builder).await?;
        log::info!("Created room {} ({})", envelope.room.room_id, envelope.room.name);
        Ok(envelope.room)
    }

    /// `PUT /api/rooms/{id}`
    pub async fn rename_room(&self, room_id: &str, name: &str) -> Result<Room, ApiError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ApiError::EmptyRoomName);
        }
        let builder = self
            .authed(Method::PUT, self.room_url(room_id)?)?
            .json(&RoomNameBody { name });
        let envelope: RoomEnvelope = self.send(builder).await?;
        Ok(envelope.room)
    }

    /// `DELETE /api/rooms/{id}`
    pub async fn delete_room(&self, room_id: &str) -> Result<(), ApiError> {
        let builder = self.authed(Method::DELETE, self.room_url(room_id)?)?;
        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                status,
                message: parse_error_message(status, &body),
            });
        }
        log::info!("Deleted room {room_id}");
        Ok(())
    }

    /// `GET /api/rooms/{id}`. Works anonymously.
    pub async fn room(&self, room_id: &str) -> Result<Room, ApiError> {
        let envelope: RoomEnvelope = self
            .send(self.request(Method::GET, self.room_url(room_id)?))
            .await?;
        Ok(envelope.room)
    }

    /// Display name of a room, if it has one.
    pub async fn room_name(&self, room_id: &str) -> Result<Option<String>, ApiError> {
        let room = self.room(room_id).await?;
        Ok(Some(room.name).filter(|n| !n.trim().is_empty()))
    }
}
