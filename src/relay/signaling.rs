// Per-session WebRTC negotiation state
// Pure state machine; the caller supplies the clock so timeouts are testable

use std::fmt;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalState {
    /// No negotiation started (WebRTC disabled or not yet begun)
    Idle,
    /// Local description being generated
    Offering,
    /// Offer relayed to the phone, waiting for answer + channel open
    AwaitingAnswer,
    /// Data channel open; input may arrive on it
    Connected,
    /// Negotiation abandoned or link lost; WebSocket carries everything
    Closed,
}

impl fmt::Display for SignalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalState::Idle => write!(f, "idle"),
            SignalState::Offering => write!(f, "offering"),
            SignalState::AwaitingAnswer => write!(f, "awaiting-answer"),
            SignalState::Connected => write!(f, "connected"),
            SignalState::Closed => write!(f, "closed"),
        }
    }
}

/// Negotiation state for one controller session.
///
/// `Closed` is terminal. Every transition method returns whether it
/// actually changed (or accepted) something, so callers can ignore
/// out-of-order events without extra checks.
#[derive(Debug, Clone)]
pub struct Signaling {
    state: SignalState,
    timeout: Duration,
    deadline: Option<Instant>,
    answered: bool,
}

impl Signaling {
    pub fn new(timeout: Duration) -> Self {
        Self {
            state: SignalState::Idle,
            timeout,
            deadline: None,
            answered: false,
        }
    }

    pub fn state(&self) -> SignalState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == SignalState::Connected
    }

    /// Negotiation still in flight (Offering or AwaitingAnswer)
    pub fn is_pending(&self) -> bool {
        matches!(
            self.state,
            SignalState::Offering | SignalState::AwaitingAnswer
        )
    }

    /// Idle -> Offering; arms the deadline
    pub fn start(&mut self, now: Instant) -> bool {
        if self.state != SignalState::Idle {
            return false;
        }
        self.state = SignalState::Offering;
        self.deadline = Some(now + self.timeout);
        true
    }

    /// Offering -> AwaitingAnswer
    pub fn offer_sent(&mut self) -> bool {
        if self.state != SignalState::Offering {
            return false;
        }
        self.state = SignalState::AwaitingAnswer;
        true
    }

    /// Accept the phone's answer. Only the first answer counts.
    pub fn answer_received(&mut self) -> bool {
        if self.state != SignalState::AwaitingAnswer || self.answered {
            return false;
        }
        self.answered = true;
        true
    }

    /// Candidates are forwarded while a peer exists, dropped otherwise
    pub fn accepts_candidates(&self) -> bool {
        matches!(
            self.state,
            SignalState::Offering | SignalState::AwaitingAnswer | SignalState::Connected
        )
    }

    /// AwaitingAnswer -> Connected, unless the deadline already passed
    pub fn channel_open(&mut self, now: Instant) -> bool {
        if self.state != SignalState::AwaitingAnswer {
            return false;
        }
        if self.deadline.is_some_and(|deadline| now >= deadline) {
            self.close();
            return false;
        }
        self.state = SignalState::Connected;
        self.deadline = None;
        true
    }

    /// Peer failure or channel close. Returns true if this ended a live
    /// or pending negotiation.
    pub fn link_lost(&mut self) -> bool {
        match self.state {
            SignalState::Offering | SignalState::AwaitingAnswer | SignalState::Connected => {
                self.close();
                true
            }
            SignalState::Idle | SignalState::Closed => false,
        }
    }

    pub fn close(&mut self) {
        self.state = SignalState::Closed;
        self.deadline = None;
    }

    /// Force `Closed` if the deadline passed before `Connected`.
    /// Returns true exactly once, on the call that expired it.
    pub fn expired(&mut self, now: Instant) -> bool {
        if !self.is_pending() {
            return false;
        }
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.close();
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIMEOUT: Duration = Duration::from_secs(5);

    #[test]
    fn test_happy_path_reaches_connected() {
        let t0 = Instant::now();
        let mut sig = Signaling::new(TIMEOUT);
        assert_eq!(sig.state(), SignalState::Idle);

        assert!(sig.start(t0));
        assert_eq!(sig.state(), SignalState::Offering);
        assert!(sig.offer_sent());
        assert_eq!(sig.state(), SignalState::AwaitingAnswer);
        assert!(sig.answer_received());
        assert!(sig.channel_open(t0 + Duration::from_millis(300)));
        assert!(sig.is_connected());

        // Connected never times out
        assert!(!sig.expired(t0 + Duration::from_secs(60)));
        assert!(sig.is_connected());
    }

    #[test]
    fn test_timeout_forces_closed_once() {
        let t0 = Instant::now();
        let mut sig = Signaling::new(TIMEOUT);
        sig.start(t0);
        sig.offer_sent();

        assert!(!sig.expired(t0 + Duration::from_millis(4999)));
        assert!(sig.expired(t0 + TIMEOUT));
        assert_eq!(sig.state(), SignalState::Closed);
        assert!(!sig.expired(t0 + Duration::from_secs(10)));
    }

    #[test]
    fn test_timeout_applies_while_still_offering() {
        let t0 = Instant::now();
        let mut sig = Signaling::new(TIMEOUT);
        sig.start(t0);
        assert!(sig.expired(t0 + Duration::from_secs(6)));
        assert!(!sig.offer_sent());
    }

    #[test]
    fn test_late_channel_open_is_rejected() {
        let t0 = Instant::now();
        let mut sig = Signaling::new(TIMEOUT);
        sig.start(t0);
        sig.offer_sent();
        sig.answer_received();

        assert!(!sig.channel_open(t0 + Duration::from_secs(7)));
        assert_eq!(sig.state(), SignalState::Closed);
    }

    #[test]
    fn test_link_loss_from_connected() {
        let t0 = Instant::now();
        let mut sig = Signaling::new(TIMEOUT);
        sig.start(t0);
        sig.offer_sent();
        sig.channel_open(t0);

        assert!(sig.link_lost());
        assert_eq!(sig.state(), SignalState::Closed);
        assert!(!sig.link_lost());
    }

    #[test]
    fn test_out_of_order_events_are_ignored() {
        let t0 = Instant::now();
        let mut sig = Signaling::new(TIMEOUT);

        // Nothing started yet
        assert!(!sig.offer_sent());
        assert!(!sig.answer_received());
        assert!(!sig.channel_open(t0));
        assert!(!sig.accepts_candidates());
        assert!(!sig.link_lost());

        sig.start(t0);
        assert!(sig.accepts_candidates());
        // Answer before the offer went out
        assert!(!sig.answer_received());

        sig.offer_sent();
        assert!(sig.answer_received());
        assert!(!sig.answer_received());
    }

    #[test]
    fn test_closed_is_terminal() {
        let t0 = Instant::now();
        let mut sig = Signaling::new(TIMEOUT);
        sig.close();
        assert!(!sig.start(t0));
        assert!(!sig.accepts_candidates());
        assert_eq!(sig.state().to_string(), "closed");
    }
}
