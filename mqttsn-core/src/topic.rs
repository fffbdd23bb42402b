//! Per-connection topic registry: text ↔ 16-bit id mapping, wildcard
//! matching, and the three id flavors (normal, predefined, 2-byte short).
//!
//! Grounded on the teacher's `mqtt-core/src/topic.rs` (`TopicName`/
//! `TopicFilter` token-based wildcard matching) and `mqtt-broker/src/topic.rs`
//! (`ServerTopics`, a lazily-populated map keyed by topic), generalized here
//! to also track the numeric id side of the binding that MQTT-SN needs and
//! MQTT does not.

use crate::frame::flags;
use crate::qos::Qos;

pub const RESERVED_UNASSIGNED_ID: u16 = 0x0000;
pub const RESERVED_INVALID_ID: u16 = 0xFFFF;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TopicIdType {
    Normal,
    Predefined,
    Short,
}

impl TopicIdType {
    pub fn from_flags(byte: u8) -> Self {
        if byte & flags::DEFINED_TOPIC != 0 {
            TopicIdType::Predefined
        } else if byte & flags::SHORT_TOPIC != 0 {
            TopicIdType::Short
        } else {
            TopicIdType::Normal
        }
    }

    pub fn to_flags(self) -> u8 {
        match self {
            TopicIdType::Normal => 0,
            TopicIdType::Predefined => flags::DEFINED_TOPIC,
            TopicIdType::Short => flags::SHORT_TOPIC,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Topic {
    id: u16,
    text: String,
    complete: bool,
    subscribed: bool,
    predefined: bool,
    qos: Qos,
    created_at_ms: u64,
    /// Message id of the REGISTER/SUBSCRIBE that is still awaiting its ack,
    /// for registry lookups keyed by mid (`complete_topic`, `del_topic_by_mid`).
    pending_mid: Option<u16>,
}

impl Topic {
    fn new(text: String, created_at_ms: u64) -> Self {
        let is_wildcard = is_wildcard_text(&text);
        Topic {
            id: RESERVED_UNASSIGNED_ID,
            text,
            complete: is_wildcard,
            subscribed: false,
            predefined: false,
            qos: Qos::AtMostOnce,
            created_at_ms,
            pending_mid: None,
        }
    }

    pub fn id(&self) -> u16 {
        self.id
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscribed
    }

    pub fn is_predefined(&self) -> bool {
        self.predefined
    }

    pub fn is_wildcard(&self) -> bool {
        is_wildcard_text(&self.text)
    }

    pub fn is_short(&self) -> bool {
        self.text.len() == 2 && self.text.is_ascii()
    }

    pub fn qos(&self) -> Qos {
        self.qos
    }

    pub fn set_qos(&mut self, qos: Qos) {
        self.qos = qos;
    }

    pub fn set_subscribed(&mut self, subscribed: bool) {
        self.subscribed = subscribed;
    }

    pub fn pending_mid(&self) -> Option<u16> {
        self.pending_mid
    }

    pub fn created_at_ms(&self) -> u64 {
        self.created_at_ms
    }
}

pub fn is_wildcard_text(text: &str) -> bool {
    text.contains('+') || text.contains('#')
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopicError {
    /// `create_topic` was asked to bind an id that is already bound to a
    /// different topic string.
    IdAlreadyBound,
}

/// Per-connection mapping of topic text to id. Ordered by insertion so the
/// "replay REGISTER for every non-wildcard topic on resume" walk (spec.md
/// §4.4/§4.6) can iterate deterministically.
#[derive(Debug, Default)]
pub struct TopicRegistry {
    topics: Vec<Topic>,
}

impl TopicRegistry {
    pub fn new() -> Self {
        Self { topics: Vec::new() }
    }

    fn next_id(&self) -> u16 {
        self.topics
            .iter()
            .filter(|t| t.complete && !t.is_wildcard())
            .map(|t| t.id)
            .max()
            .unwrap_or(0)
            .wrapping_add(1)
    }

    /// Client-side registration request: returns the existing topic if the
    /// text is already known (possibly incomplete), otherwise inserts a new
    /// incomplete (or, for wildcards, immediately-complete) entry.
    pub fn reg_topic(&mut self, text: &str, mid: u16, now_ms: u64) -> &Topic {
        if self.position_by_text(text).is_none() {
            let mut topic = Topic::new(text.to_string(), now_ms);
            if !topic.is_wildcard() {
                topic.pending_mid = Some(mid);
            }
            self.topics.push(topic);
        }
        let idx = self.position_by_text(text).unwrap();
        &self.topics[idx]
    }

    /// Gateway-side registration: allocate the next id immediately if the
    /// text is new; otherwise return the existing binding.
    pub fn add_topic(&mut self, text: &str, now_ms: u64) -> &Topic {
        if self.position_by_text(text).is_none() {
            let mut topic = Topic::new(text.to_string(), now_ms);
            if !topic.is_wildcard() {
                topic.id = self.next_id();
                topic.complete = true;
            }
            self.topics.push(topic);
        }
        let idx = self.position_by_text(text).unwrap();
        &self.topics[idx]
    }

    /// Force-binds `id` to `text`. Fails if `id` is already bound to a
    /// different, still-complete text. `id == 0` is permitted (wildcard
    /// subscription placeholders).
    pub fn create_topic(
        &mut self,
        text: &str,
        id: u16,
        predefined: bool,
        now_ms: u64,
    ) -> Result<&Topic, TopicError> {
        if id != RESERVED_UNASSIGNED_ID {
            if let Some(existing) = self.get_topic_by_id(id) {
                if existing.text() != text {
                    return Err(TopicError::IdAlreadyBound);
                }
            }
        }

        if let Some(idx) = self.position_by_text(text) {
            let topic = &mut self.topics[idx];
            topic.id = id;
            topic.complete = true;
            topic.predefined = predefined;
        } else {
            let mut topic = Topic::new(text.to_string(), now_ms);
            topic.id = id;
            topic.complete = true;
            topic.predefined = predefined;
            self.topics.push(topic);
        }

        Ok(&self.topics[self.position_by_text(text).unwrap()])
    }

    /// Resolves a pending (mid-keyed) topic once the peer assigns an id.
    /// No-op for already-complete topics; refuses to assign a non-zero id
    /// to a wildcard subscription placeholder.
    pub fn complete_topic(&mut self, mid: u16, id: u16) -> Option<&Topic> {
        let idx = self
            .topics
            .iter()
            .position(|t| t.pending_mid == Some(mid) && !t.complete)?;

        let topic = &mut self.topics[idx];
        if topic.is_wildcard() {
            return None;
        }
        topic.id = id;
        topic.complete = true;
        topic.pending_mid = None;
        Some(&self.topics[idx])
    }

    pub fn get_topic_by_id(&self, id: u16) -> Option<&Topic> {
        self.topics.iter().find(|t| t.complete && t.id == id && id != RESERVED_UNASSIGNED_ID)
    }

    pub fn get_topic_by_id_mut(&mut self, id: u16) -> Option<&mut Topic> {
        self.topics
            .iter_mut()
            .find(|t| t.complete && t.id == id && id != RESERVED_UNASSIGNED_ID)
    }

    pub fn get_topic_by_text(&self, text: &str) -> Option<&Topic> {
        self.topics.iter().find(|t| t.text == text)
    }

    pub fn get_topic_by_text_mut(&mut self, text: &str) -> Option<&mut Topic> {
        self.topics.iter_mut().find(|t| t.text == text)
    }

    pub fn get_topic_by_mid(&self, mid: u16) -> Option<&Topic> {
        self.topics.iter().find(|t| t.pending_mid == Some(mid))
    }

    pub fn del_topic(&mut self, id: u16) -> Option<Topic> {
        let idx = self
            .topics
            .iter()
            .position(|t| t.complete && t.id == id && id != RESERVED_UNASSIGNED_ID)?;
        Some(self.topics.remove(idx))
    }

    pub fn del_topic_by_mid(&mut self, mid: u16) -> Option<Topic> {
        let idx = self.topics.iter().position(|t| t.pending_mid == Some(mid))?;
        Some(self.topics.remove(idx))
    }

    pub fn free_all(&mut self) {
        self.topics.clear();
    }

    /// Iterates topics in insertion order; used to replay REGISTERs for a
    /// resumed non-clean session (non-wildcard, non-short only).
    pub fn iter(&self) -> impl Iterator<Item = &Topic> {
        self.topics.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Topic> {
        self.topics.iter_mut()
    }

    fn position_by_text(&self, text: &str) -> Option<usize> {
        self.topics.iter().position(|t| t.text == text)
    }

    /// Wildcard match: `+` matches exactly one non-`/` level, `#` matches the
    /// remainder and must be the final token. Leading/trailing `/` are
    /// significant (an empty token between two slashes must match literally).
    pub fn matches(subscription_text: &str, publish_text: &str) -> bool {
        let mut sub_tokens = subscription_text.split('/').peekable();
        let mut pub_tokens = publish_text.split('/');

        loop {
            match (sub_tokens.next(), pub_tokens.next()) {
                (Some("#"), None) => return sub_tokens.peek().is_none(),
                (Some("#"), Some(_)) => {
                    // '#' must be the final token of the filter.
                    return sub_tokens.peek().is_none();
                }
                (Some("+"), Some(_)) => continue,
                (Some("+"), None) => return false,
                (Some(s), Some(p)) => {
                    if s != p {
                        return false;
                    }
                }
                (Some(_), None) => return false,
                (None, Some(_)) => return false,
                (None, None) => return true,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_topic_allocates_sequential_ids_starting_at_one() {
        let mut reg = TopicRegistry::new();
        let t1 = reg.add_topic("a/b", 0);
        assert_eq!(t1.id(), 1);
        let t2 = reg.add_topic("a/c", 0);
        assert_eq!(t2.id(), 2);
    }

    #[test]
    fn add_topic_is_idempotent_for_existing_text() {
        let mut reg = TopicRegistry::new();
        let id = reg.add_topic("a/b", 0).id();
        let id2 = reg.add_topic("a/b", 0).id();
        assert_eq!(id, id2);
    }

    #[test]
    fn wildcard_topics_are_complete_with_id_zero() {
        let mut reg = TopicRegistry::new();
        let t = reg.add_topic("a/+/c", 0);
        assert!(t.is_complete());
        assert_eq!(t.id(), 0);
        assert!(t.is_wildcard());
    }

    #[test]
    fn reg_topic_leaves_normal_topics_incomplete_until_completed() {
        let mut reg = TopicRegistry::new();
        let t = reg.reg_topic("sensors/t", 7, 0);
        assert!(!t.is_complete());
        reg.complete_topic(7, 1);
        let t = reg.get_topic_by_text("sensors/t").unwrap();
        assert!(t.is_complete());
        assert_eq!(t.id(), 1);
    }

    #[test]
    fn complete_topic_refuses_wildcards() {
        let mut reg = TopicRegistry::new();
        reg.reg_topic("a/+", 3, 0);
        assert!(reg.complete_topic(3, 5).is_none());
    }

    #[test]
    fn create_topic_rejects_id_rebinding() {
        let mut reg = TopicRegistry::new();
        reg.create_topic("a", 5, false, 0).unwrap();
        assert!(reg.create_topic("b", 5, false, 0).is_err());
    }

    #[test]
    fn match_plus_single_level() {
        assert!(TopicRegistry::matches("sensors/+/temp", "sensors/kitchen/temp"));
        assert!(!TopicRegistry::matches("sensors/+/temp", "sensors/kitchen/hum"));
        assert!(!TopicRegistry::matches("a/+", "a/b/c"));
    }

    #[test]
    fn match_hash_multi_level() {
        assert!(TopicRegistry::matches("sensors/#", "sensors/a/b"));
        assert!(TopicRegistry::matches("sensors/#", "sensors"));
    }

    #[test]
    fn topic_id_uniqueness_after_arbitrary_sequence() {
        let mut reg = TopicRegistry::new();
        reg.add_topic("a", 0);
        reg.add_topic("b", 0);
        reg.del_topic(1);
        let t = reg.add_topic("c", 0);
        assert_ne!(t.id(), 0);

        let mut seen = std::collections::HashSet::new();
        for t in reg.iter().filter(|t| t.is_complete() && !t.is_wildcard()) {
            assert!(seen.insert(t.id()), "duplicate id {}", t.id());
            assert_ne!(t.id(), 0);
        }
    }
}
