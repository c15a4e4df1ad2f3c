//! Room scenarios driven through the in-memory connector.
//!
//! The connector plays the server, so every step is deterministic and
//! timers are advanced with explicit instants.

use std::time::{Duration, Instant};

use canvas_collab::client::{ClientConfig, RoomClient};
use canvas_collab::protocol::{ClientEvent, CodeChange, CodeUpdate, ServerEvent, UsernamePayload};
use canvas_collab::{ConnectionState, MemoryConnector, MembershipState, EDIT_DEBOUNCE};
use canvas_core::{CodeBuffers, Language};

fn client() -> RoomClient<MemoryConnector> {
    RoomClient::new(MemoryConnector::new(), ClientConfig::default())
}

fn joined_client(room: &str, now: Instant) -> RoomClient<MemoryConnector> {
    let mut client = client();
    client.join_room(room, None).unwrap();
    client.connector().open(0);
    client
        .connector()
        .deliver(0, ServerEvent::LoadCode(CodeBuffers::new("<p>hi</p>", "", "")));
    client.process_pending_signals(now);
    client
}

fn code_changes(events: &[ClientEvent]) -> Vec<&CodeChange> {
    events
        .iter()
        .filter_map(|e| match e {
            ClientEvent::CodeChange(change) => Some(change),
            _ => None,
        })
        .collect()
}

#[test]
fn test_edits_within_window_send_once() {
    let t0 = Instant::now();
    let mut client = joined_client("r", t0);

    let mut now = t0;
    for i in 0..10 {
        client
            .edit(Language::Js, format!("let x = {i};"), now)
            .unwrap();
        now += Duration::from_millis(14);
        client.poll_timers(now);
    }
    client.poll_timers(now + EDIT_DEBOUNCE);

    let sent = client.connector().sent(0);
    let changes = code_changes(&sent);
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].code, "let x = 9;");
}

#[test]
fn test_nothing_sent_before_snapshot() {
    let t0 = Instant::now();
    let mut client = client();
    client.join_room("r", None).unwrap();
    client.connector().open(0);
    client.process_pending_signals(t0);

    client.edit(Language::Html, "draft".into(), t0).unwrap();
    client.poll_timers(t0 + Duration::from_secs(2));
    assert!(code_changes(&client.connector().sent(0)).is_empty());

    client
        .connector()
        .deliver(0, ServerEvent::LoadCode(CodeBuffers::new("stored", "", "")));
    client.process_pending_signals(t0 + Duration::from_secs(3));
    assert_eq!(client.session().state(), MembershipState::Joined);
    assert_eq!(client.session().buffers().unwrap().html, "stored");
}

#[test]
fn test_one_leave_per_join() {
    let t0 = Instant::now();
    let mut client = joined_client("r", t0);
    assert!(client.leave_room());
    assert!(!client.leave_room());
    client.teardown();

    let leaves = client
        .connector()
        .sent(0)
        .iter()
        .filter(|e| matches!(e, ClientEvent::LeaveRoom(_)))
        .count();
    assert_eq!(leaves, 1);
}

#[test]
fn test_leave_counts_across_rooms() {
    let connector = MemoryConnector::new();
    {
        let mut client = RoomClient::new(connector.clone(), ClientConfig::default());
        client.join_room("a", None).unwrap();
        client.join_room("b", None).unwrap();
        client.leave_room();
        client.join_room("c", None).unwrap();
        // Dropped while in "c"
    }

    let sent = connector.sent(0);
    let joins: Vec<_> = sent
        .iter()
        .filter_map(|e| match e {
            ClientEvent::JoinRoom(room) => Some(room.as_str()),
            _ => None,
        })
        .collect();
    let leaves: Vec<_> = sent
        .iter()
        .filter_map(|e| match e {
            ClientEvent::LeaveRoom(room) => Some(room.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(joins, vec!["a", "b", "c"]);
    assert_eq!(leaves, vec!["a", "b", "c"]);
}

#[test]
fn test_buffer_matches_latest_update() {
    let t0 = Instant::now();
    let mut client = joined_client("r", t0);
    for code in ["a", "b", "c"] {
        client.connector().deliver(
            0,
            ServerEvent::CodeUpdate(CodeUpdate {
                room_id: None,
                language: Language::Css,
                code: code.into(),
            }),
        );
    }
    client.process_pending_signals(t0);
    assert_eq!(client.session().buffers().unwrap().css, "c");
}

#[test]
fn test_disconnect_keeps_room_without_rejoin() {
    let t0 = Instant::now();
    let mut client = joined_client("r", t0);
    client.connector().close(0);
    client.process_pending_signals(t0);

    assert_eq!(client.connection_state(), ConnectionState::Disconnected);
    assert_eq!(client.session().state(), MembershipState::Joined);
    assert_eq!(client.connector().connection_count(), 1);
    let joins = client
        .connector()
        .sent(0)
        .iter()
        .filter(|e| matches!(e, ClientEvent::JoinRoom(_)))
        .count();
    assert_eq!(joins, 1);
}

#[test]
fn test_credential_change_reopens_and_drops_stale_events() {
    let t0 = Instant::now();
    let mut client = joined_client("room-x", t0);
    assert_eq!(client.connector().request(0).unwrap().credential, None);

    client.set_credential(Some("token-1".into())).unwrap();
    assert_eq!(client.connector().connection_count(), 2);
    assert!(client.connector().is_released(0));
    assert_eq!(
        client.connector().request(1).unwrap().credential.as_deref(),
        Some("token-1")
    );

    // Left on the old channel, joined on the new one
    assert_eq!(
        client.connector().sent(0).last(),
        Some(&ClientEvent::LeaveRoom("room-x".into()))
    );
    assert_eq!(
        client.connector().sent(1),
        vec![ClientEvent::JoinRoom("room-x".into())]
    );

    // Events still in flight on the old channel are never applied
    client.connector().deliver(
        0,
        ServerEvent::LoadCode(CodeBuffers::new("stale", "stale", "stale")),
    );
    client.connector().deliver(0, ServerEvent::UsersInRoom(42));
    client.process_pending_signals(t0);
    assert_eq!(client.session().state(), MembershipState::Joining);
    assert_eq!(client.session().participants(), 0);

    client.connector().open(1);
    client
        .connector()
        .deliver(1, ServerEvent::LoadCode(CodeBuffers::new("fresh", "", "")));
    client.process_pending_signals(t0);
    assert_eq!(client.connection_state(), ConnectionState::Connected);
    assert_eq!(client.session().buffers().unwrap().html, "fresh");
}

#[test]
fn test_same_credential_does_not_reopen() {
    let mut client = client();
    client.set_credential(Some("t".into())).unwrap();
    client.set_credential(Some("t".into())).unwrap();
    assert_eq!(client.connector().connection_count(), 1);
}

#[test]
fn test_taken_then_accepted_retry() {
    let t0 = Instant::now();
    let mut client = joined_client("r", t0);

    client.claim_name("Bob", t0).unwrap();
    client.connector().deliver(0, ServerEvent::UsernameTaken(None));
    client.process_pending_signals(t0);
    assert!(client.chat().identity().is_claim_form_open());
    assert!(!client.chat().identity().is_resolved());

    client.claim_name("Bob2", t0).unwrap();
    client.connector().deliver(
        0,
        ServerEvent::UsernameAccepted(Some(UsernamePayload { username: "Bob2".into() })),
    );
    client.process_pending_signals(t0);
    assert_eq!(client.chat().identity().display_name(), Some("Bob2"));
    assert!(!client.chat().identity().is_claim_form_open());
}
