//! Bounded per-connection outbound queue with message-id allocation and
//! retry bookkeeping.
//!
//! Grounded on the teacher's `mqtt-core/src/msg_assurance/mod.rs`
//! (`ExactlyOncePacket`/`AtLeastOncePacket` retry state, `RetryDuration`) and
//! `mqtt-broker/src/session.rs` (per-session qos1/qos2 packet lists plus
//! `id_gen`), collapsed here into a single fixed-size ring since MQTT-SN only
//! ever has one outstanding message per activity at a time.

use std::time::{Duration, Instant};

use crate::error::EngineErrorKind;

/// `Tretry` default: how long to wait before retransmitting an unacked message.
pub const DEFAULT_T_RETRY: Duration = Duration::from_secs(1);
/// `Nretry` default: retransmit attempts before giving up and reporting failure.
pub const DEFAULT_N_RETRY: u8 = 5;
/// Default ring size; generous for a single-connection client or gateway
/// session where only a handful of activities are ever concurrently pending.
pub const DEFAULT_QUEUE_LEN: usize = 20;

/// A message-id paired with the cached frame bytes due for retransmission.
pub type RetransmitFrame = (u16, Vec<u8>);
/// A message-id paired with the activity it was pursuing when its retry
/// budget ran out.
pub type FailedMessage = (u16, Activity);

/// What a queued message is working towards; surfaced back to the engine on
/// completion or failure so it knows which callback to fire.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Activity {
    None,
    Connecting,
    WillTopic,
    WillMessage,
    Registering,
    RegisteringAll,
    Publishing,
    Subscribing,
    Unsubscribing,
    Searching,
    Disconnecting,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    pub id: u16,
    pub activity: Activity,
    /// `true` once this slot has an outstanding request that expects a reply;
    /// distinguishes "empty slot" from "in use".
    active: bool,
    /// Raw frame bytes as last sent, kept so a retry can resend byte-for-byte
    /// except for the DUP bit this module flips in place.
    frame: Vec<u8>,
    /// One-shot messages (SEARCHGW, PINGREQ) are not governed by Tretry/Nretry;
    /// they are freed as soon as a single reply-or-timeout resolves them.
    one_shot: bool,
    attempts: u8,
    last_sent: Option<Instant>,
    /// Topic id this activity concerns, for engines to recover context when a
    /// retry is reconstructed without re-deriving it from `frame`.
    pub topic_id: u16,
}

impl Message {
    fn new(id: u16, activity: Activity, frame: Vec<u8>, one_shot: bool, topic_id: u16) -> Self {
        Self {
            id,
            activity,
            active: true,
            frame,
            one_shot,
            attempts: 0,
            last_sent: None,
            topic_id,
        }
    }

    pub fn frame(&self) -> &[u8] {
        &self.frame
    }

    pub fn attempts(&self) -> u8 {
        self.attempts
    }

    /// Sets the DUP bit (MQTT-SN's high flag bit) on PUBLISH/SUBSCRIBE frames
    /// before a retransmit; other message types carry no DUP semantics and are
    /// resent byte-identical.
    fn mark_dup(&mut self) {
        if let Some(byte) = self.frame.get_mut(2) {
            *byte |= crate::frame::flags::DUP;
        }
    }
}

/// Fixed-size ring of in-flight activities for one connection. Message ids
/// are allocated from a monotonic per-connection counter that skips `0`
/// (reserved to mean "no id yet") and wraps from `0xFFFF` back to `1`.
#[derive(Debug)]
pub struct MessageQueue {
    slots: Vec<Option<Message>>,
    next_id: u16,
    t_retry: Duration,
    n_retry: u8,
}

impl MessageQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: (0..capacity).map(|_| None).collect(),
            next_id: 1,
            t_retry: DEFAULT_T_RETRY,
            n_retry: DEFAULT_N_RETRY,
        }
    }

    pub fn with_retry_law(capacity: usize, t_retry: Duration, n_retry: u8) -> Self {
        Self {
            t_retry,
            n_retry,
            ..Self::new(capacity)
        }
    }

    fn allocate_id(&mut self) -> u16 {
        let id = self.next_id;
        self.next_id = if self.next_id == 0xFFFF { 1 } else { self.next_id + 1 };
        id
    }

    /// Finds the first free slot and occupies it with a new activity,
    /// allocating the next message id and recording `frame` as the bytes to
    /// (re)transmit. Returns `None` when the queue is full.
    pub fn add_message(&mut self, activity: Activity, frame: Vec<u8>, one_shot: bool, topic_id: u16) -> Option<u16> {
        let idx = self.slots.iter().position(|s| s.is_none())?;
        let id = self.allocate_id();
        self.slots[idx] = Some(Message::new(id, activity, frame, one_shot, topic_id));
        Some(id)
    }

    pub fn get_by_id(&self, id: u16) -> Option<&Message> {
        self.slots.iter().flatten().find(|m| m.id == id)
    }

    pub fn get_by_id_mut(&mut self, id: u16) -> Option<&mut Message> {
        self.slots.iter_mut().flatten().find(|m| m.id == id)
    }

    /// Replaces a slot's cached frame bytes once the caller has re-encoded it
    /// with the id the queue just assigned. Used by activities (REGISTER,
    /// PUBLISH, SUBSCRIBE) whose wire format embeds the message id, which
    /// isn't known until after `add_message` allocates it.
    pub fn set_frame(&mut self, id: u16, frame: Vec<u8>) -> bool {
        match self.get_by_id_mut(id) {
            Some(m) => {
                m.frame = frame;
                true
            }
            None => false,
        }
    }

    /// Overwrites a slot's frame and activity in place and resets its retry
    /// state, without reallocating a message id. Used by the QoS 2 PUBREC
    /// transition, which recycles the PUBLISH slot to carry PUBREL so the
    /// existing retry law covers the new frame from a clean slate.
    pub fn recycle(&mut self, id: u16, activity: Activity, frame: Vec<u8>) -> bool {
        match self.get_by_id_mut(id) {
            Some(m) => {
                m.activity = activity;
                m.frame = frame;
                m.attempts = 0;
                m.last_sent = None;
                true
            }
            None => false,
        }
    }

    /// The first occupied slot, scanning from the head; used by engines that
    /// only ever drive one activity per connection at a time (§4.5's
    /// single-outstanding-request state machines).
    pub fn get_active(&self) -> Option<&Message> {
        self.slots.iter().flatten().next()
    }

    pub fn has_activity(&self, activity: Activity) -> bool {
        self.slots.iter().flatten().any(|m| m.activity == activity)
    }

    /// Removes and returns the message matching `id`, freeing its slot. The
    /// normal path out of the queue on a successful ack.
    pub fn complete(&mut self, id: u16) -> Option<Message> {
        let idx = self.slots.iter().position(|s| s.as_ref().map(|m| m.id) == Some(id))?;
        self.slots[idx].take()
    }

    /// Removes and returns the first slot matching `activity`. Used for
    /// exchanges that carry no message id to correlate on, such as CONNECT's
    /// handshake with CONNACK.
    pub fn complete_activity(&mut self, activity: Activity) -> Option<Message> {
        let idx = self.slots.iter().position(|s| s.as_ref().map(|m| m.activity) == Some(activity))?;
        self.slots[idx].take()
    }

    pub fn is_full(&self) -> bool {
        self.slots.iter().all(|s| s.is_some())
    }

    pub fn free_all(&mut self) {
        for slot in &mut self.slots {
            *slot = None;
        }
    }

    /// Advances retry state for every occupied slot at `now`. Returns frames
    /// to retransmit (with DUP set where applicable) and ids whose retry
    /// budget (`Nretry` attempts) is exhausted — those slots are freed here
    /// and the caller is expected to surface [`MSG_FAILURE`] to its engine.
    pub fn tick(&mut self, now: Instant) -> (Vec<RetransmitFrame>, Vec<FailedMessage>) {
        let mut to_send = Vec::new();
        let mut failed = Vec::new();

        for slot in &mut self.slots {
            let Some(msg) = slot else { continue };

            let due = match msg.last_sent {
                None => true,
                Some(last) => now.duration_since(last) >= self.t_retry,
            };
            if !due {
                continue;
            }

            if msg.attempts > self.n_retry {
                failed.push((msg.id, msg.activity));
                *slot = None;
                continue;
            }

            if msg.attempts > 0 {
                msg.mark_dup();
            }
            msg.attempts += 1;
            msg.last_sent = Some(now);
            to_send.push((msg.id, msg.frame.clone()));

            if msg.one_shot {
                // Sent once; no retries and no failure callback regardless of
                // whether a reply ever arrives.
                *slot = None;
            }
        }

        (to_send, failed)
    }

    pub fn n_retry(&self) -> u8 {
        self.n_retry
    }

    pub fn t_retry(&self) -> Duration {
        self.t_retry
    }
}

impl Default for MessageQueue {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_LEN)
    }
}

/// Convenience for engines translating a queue failure into the shared error
/// enum; kept here rather than duplicated across client/gateway.
pub fn failure_to_engine_error(_activity: Activity) -> EngineErrorKind {
    EngineErrorKind::Timeout
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_message_allocates_ids_starting_at_one_never_zero() {
        let mut q = MessageQueue::new(4);
        let id1 = q.add_message(Activity::Publishing, vec![0, 0x0C], false, 1).unwrap();
        let id2 = q.add_message(Activity::Subscribing, vec![0, 0x12], false, 0).unwrap();
        assert_eq!(id1, 1);
        assert_eq!(id2, 2);
    }

    #[test]
    fn add_message_fails_when_queue_is_full() {
        let mut q = MessageQueue::new(1);
        assert!(q.add_message(Activity::Publishing, vec![], false, 0).is_some());
        assert!(q.add_message(Activity::Publishing, vec![], false, 0).is_none());
    }

    #[test]
    fn id_wraps_from_0xffff_to_one() {
        let mut q = MessageQueue::new(1);
        q.next_id = 0xFFFF;
        let id = q.add_message(Activity::Searching, vec![], true, 0).unwrap();
        assert_eq!(id, 0xFFFF);
        assert_eq!(q.next_id, 1);
    }

    #[test]
    fn complete_frees_the_slot() {
        let mut q = MessageQueue::new(2);
        let id = q.add_message(Activity::Publishing, vec![], false, 0).unwrap();
        assert!(q.complete(id).is_some());
        assert!(q.get_by_id(id).is_none());
        assert!(!q.is_full());
    }

    #[test]
    fn tick_sends_immediately_then_waits_for_t_retry() {
        let mut q = MessageQueue::with_retry_law(2, Duration::from_secs(1), 5);
        q.add_message(Activity::Publishing, vec![0, 0x0C, 0], false, 1).unwrap();
        let t0 = Instant::now();
        let (sent, failed) = q.tick(t0);
        assert_eq!(sent.len(), 1);
        assert!(failed.is_empty());

        let (sent, _) = q.tick(t0 + Duration::from_millis(500));
        assert!(sent.is_empty(), "retry before Tretry elapsed should not resend");

        let (sent, _) = q.tick(t0 + Duration::from_secs(1));
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1[2] & crate::frame::flags::DUP, crate::frame::flags::DUP, "retransmit must set DUP");
    }

    #[test]
    fn tick_surfaces_failure_after_n_retry_attempts() {
        let mut q = MessageQueue::with_retry_law(1, Duration::from_millis(10), 2);
        q.add_message(Activity::Publishing, vec![0, 0x0C, 0], false, 1).unwrap();
        let t0 = Instant::now();

        q.tick(t0); // attempt 1
        q.tick(t0 + Duration::from_millis(10)); // attempt 2
        q.tick(t0 + Duration::from_millis(20)); // attempt 3 (> n_retry=2)
        let (_, failed) = q.tick(t0 + Duration::from_millis(30));
        assert_eq!(failed, vec![(1, Activity::Publishing)]);
        assert!(q.get_by_id(1).is_none());
    }

    #[test]
    fn one_shot_message_is_freed_after_its_first_send_with_no_retry() {
        let mut q = MessageQueue::with_retry_law(1, Duration::from_millis(10), 5);
        let id = q.add_message(Activity::Searching, vec![0, 0x01, 0], true, 0).unwrap();
        let t0 = Instant::now();

        let (sent, failed) = q.tick(t0);
        assert_eq!(sent.len(), 1);
        assert!(failed.is_empty(), "one-shot completion is not a failure");
        assert!(q.get_by_id(id).is_none(), "slot must be freed right after the first send");

        let (sent, failed) = q.tick(t0 + Duration::from_millis(10));
        assert!(sent.is_empty(), "a freed one-shot slot must never be resent");
        assert!(failed.is_empty());
    }
}
