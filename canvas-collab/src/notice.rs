//! Transient notices (toasts).
//!
//! Only the latest notice is shown; a new one replaces it. The driver expires
//! it on the next tick past its deadline.

use std::time::{Duration, Instant};

pub const NOTICE_DURATION: Duration = Duration::from_secs(3);

/// Shorter lifetime for acknowledgements such as "Link copied".
pub const ACK_DURATION: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Success,
    Error,
    Info,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub message: String,
    pub kind: NoticeKind,
    pub expires_at: Instant,
}

#[derive(Debug)]
pub struct NoticeBoard {
    duration: Duration,
    current: Option<Notice>,
}

impl Default for NoticeBoard {
    fn default() -> Self {
        Self::new(NOTICE_DURATION)
    }
}

impl NoticeBoard {
    pub fn new(duration: Duration) -> Self {
        Self { duration, current: None }
    }

    /// Show a notice for the default duration.
    pub fn show(&mut self, message: impl Into<String>, kind: NoticeKind, now: Instant) -> &Notice {
        self.show_for(message, kind, now, self.duration)
    }

    pub fn show_for(
        &mut self,
        message: impl Into<String>,
        kind: NoticeKind,
        now: Instant,
        duration: Duration,
    ) -> &Notice {
        let notice = Notice {
            message: message.into(),
            kind,
            expires_at: now + duration,
        };
        match kind {
            NoticeKind::Error => log::warn!("{}", notice.message),
            _ => log::info!("{}", notice.message),
        }
        self.current.insert(notice)
    }

    /// Drop the notice if it has expired. Returns `true` if one was removed.
    pub fn expire(&mut self, now: Instant) -> bool {
        match &self.current {
            Some(notice) if now >= notice.expires_at => {
                self.current = None;
                true
            }
            _ => false,
        }
    }

    pub fn current(&self) -> Option<&Notice> {
        self.current.as_ref()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.current.as_ref().map(|n| n.expires_at)
    }

    pub fn dismiss(&mut self) {
        self.current = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notice_expires() {
        let t0 = Instant::now();
        let mut board = NoticeBoard::default();
        board.show("Room renamed", NoticeKind::Success, t0);
        assert!(!board.expire(t0 + Duration::from_millis(2999)));
        assert!(board.current().is_some());
        assert!(board.expire(t0 + NOTICE_DURATION));
        assert!(board.current().is_none());
        assert!(board.next_deadline().is_none());
    }

    #[test]
    fn test_new_notice_replaces_previous() {
        let t0 = Instant::now();
        let mut board = NoticeBoard::default();
        board.show("first", NoticeKind::Info, t0);
        board.show_for("Link copied", NoticeKind::Success, t0, ACK_DURATION);
        let notice = board.current().unwrap();
        assert_eq!(notice.message, "Link copied");
        assert_eq!(board.next_deadline(), Some(t0 + ACK_DURATION));
    }
}
