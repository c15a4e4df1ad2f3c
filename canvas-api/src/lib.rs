//! HTTP client for the Code Canvas account and room service.
//!
//! Covers the calls the room client makes around a session: who am I,
//! my rooms, create/rename/delete, and the display name of a room. Room
//! link helpers live in [`links`].

pub mod client;
pub mod config;
pub mod error;
pub mod links;

pub use client::{ApiClient, Room, User, DEFAULT_ROOM_NAME};
pub use config::ApiConfig;
pub use error::ApiError;
pub use links::{extract_room_id, generate_room_id, room_link};
