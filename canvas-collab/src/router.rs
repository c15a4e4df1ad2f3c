//! Inbound event routing over the shared channel.
//!
//! Each component registers the event kinds it consumes and gets a
//! [`ListenerId`] back. A kind can be claimed by at most one listener, so
//! the session and chat namespaces never overlap. Unregistering releases
//! every kind the listener held; [`EventRouter::listener_count`] makes a
//! dangling registration visible after teardown.

use std::collections::HashMap;
use uuid::Uuid;

use crate::protocol::{EventKind, ServerEvent};

/// Handle for one registration.
pub type ListenerId = Uuid;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouterError {
    #[error("event kind `{}` is already claimed by listener {owner}", .kind.wire_name())]
    KindClaimed { kind: EventKind, owner: ListenerId },
    #[error("registration must name at least one event kind")]
    EmptyRegistration,
}

#[derive(Debug, Default)]
pub struct EventRouter {
    /// kind → owning listener
    routes: HashMap<EventKind, ListenerId>,
    /// listener → kinds it holds
    listeners: HashMap<ListenerId, Vec<EventKind>>,
}

impl EventRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `kinds` for a new listener.
    ///
    /// Either every kind is claimed or none is.
    pub fn register(&mut self, kinds: &[EventKind]) -> Result<ListenerId, RouterError> {
        if kinds.is_empty() {
            return Err(RouterError::EmptyRegistration);
        }
        if let Some((&kind, &owner)) = kinds
            .iter()
            .find_map(|kind| self.routes.get_key_value(kind))
        {
            return Err(RouterError::KindClaimed { kind, owner });
        }

        let id = Uuid::new_v4();
        for &kind in kinds {
            self.routes.insert(kind, id);
        }
        self.listeners.insert(id, kinds.to_vec());
        log::debug!("Listener {id} registered for {} event kind(s)", kinds.len());
        Ok(id)
    }

    /// Release every kind held by `id`. Returns `false` for unknown ids.
    pub fn unregister(&mut self, id: ListenerId) -> bool {
        match self.listeners.remove(&id) {
            Some(kinds) => {
                for kind in kinds {
                    self.routes.remove(&kind);
                }
                log::debug!("Listener {id} unregistered");
                true
            }
            None => false,
        }
    }

    /// Listener that should receive `event`, if any.
    pub fn route(&self, event: &ServerEvent) -> Option<ListenerId> {
        self.routes.get(&event.kind()).copied()
    }

    pub fn is_claimed(&self, kind: EventKind) -> bool {
        self.routes.contains_key(&kind)
    }

    pub fn is_registered(&self, id: ListenerId) -> bool {
        self.listeners.contains_key(&id)
    }

    /// Number of live registrations.
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::UsernamePayload;

    #[test]
    fn test_register_and_route() {
        let mut router = EventRouter::new();
        let session = router.register(EventKind::SESSION).unwrap();
        let chat = router.register(EventKind::CHAT).unwrap();

        assert_eq!(router.route(&ServerEvent::UsersInRoom(2)), Some(session));
        let joined = ServerEvent::UserJoinedChat(UsernamePayload { username: "A".into() });
        assert_eq!(router.route(&joined), Some(chat));
        assert_eq!(router.listener_count(), 2);
    }

    #[test]
    fn test_overlapping_registration_rejected() {
        let mut router = EventRouter::new();
        let owner = router.register(&[EventKind::LoadCode]).unwrap();

        let err = router
            .register(&[EventKind::UsersInRoom, EventKind::LoadCode])
            .unwrap_err();
        assert_eq!(
            err,
            RouterError::KindClaimed {
                kind: EventKind::LoadCode,
                owner
            }
        );
        // Nothing from the failed registration leaked in
        assert!(!router.is_claimed(EventKind::UsersInRoom));
        assert_eq!(router.listener_count(), 1);
    }

    #[test]
    fn test_unregister_releases_kinds() {
        let mut router = EventRouter::new();
        let id = router.register(EventKind::SESSION).unwrap();
        assert!(router.unregister(id));
        assert!(!router.unregister(id));
        assert_eq!(router.listener_count(), 0);
        assert!(router.route(&ServerEvent::UsersInRoom(1)).is_none());

        // Kinds can be claimed again afterwards
        assert!(router.register(EventKind::SESSION).is_ok());
    }

    #[test]
    fn test_empty_registration_rejected() {
        let mut router = EventRouter::new();
        assert_eq!(router.register(&[]), Err(RouterError::EmptyRegistration));
    }
}
