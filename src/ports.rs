// src/ports.rs
//! Interfaces the tracking core consumes: clock, position source and user prompt.
//!
//! Everything here is single-threaded. The in-memory implementations
//! (`ManualClock`, `ManualSource`, `ScriptedPrompt`) share their state through
//! `Rc` handles so a caller can keep driving them after handing a clone to a
//! [`TrackSession`](crate::session::TrackSession).

use crate::error::SourceError;
use chrono::Utc;
use std::{
    cell::{Cell, RefCell},
    collections::VecDeque,
    fmt,
    rc::Rc,
};

/// Wall clock in milliseconds since the Unix epoch.
pub trait Clock {
    fn now_ms(&self) -> i64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// Clock that only moves when told to.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<i64>>,
}

impl ManualClock {
    pub fn new(start_ms: i64) -> Self {
        Self {
            now: Rc::new(Cell::new(start_ms)),
        }
    }

    pub fn advance(&self, ms: i64) {
        self.now.set(self.now.get() + ms);
    }

    pub fn set(&self, ms: i64) {
        self.now.set(ms);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.now.get()
    }
}

/// Identifies one subscription to a position source. Samples carry the id
/// of the subscription that produced them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Continuous position stream. Each `subscribe` opens an independent
/// subscription; samples are delivered to the session by the event loop.
pub trait PositionSource {
    fn subscribe(&mut self) -> Result<SubscriptionId, SourceError>;
    fn unsubscribe(&mut self, id: SubscriptionId);
}

#[derive(Debug, Default)]
struct ManualSourceState {
    next_id: u64,
    active: Vec<SubscriptionId>,
    unavailable: Option<String>,
    subscribes: usize,
}

/// Position source whose samples are pushed by the caller.
#[derive(Debug, Clone, Default)]
pub struct ManualSource {
    state: Rc<RefCell<ManualSourceState>>,
}

impl ManualSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// A source that refuses every subscription.
    pub fn unavailable(reason: &str) -> Self {
        let source = Self::default();
        source.state.borrow_mut().unavailable = Some(reason.to_string());
        source
    }

    pub fn active(&self) -> Vec<SubscriptionId> {
        self.state.borrow().active.clone()
    }

    /// The single live subscription, if exactly one exists.
    pub fn current(&self) -> Option<SubscriptionId> {
        let state = self.state.borrow();
        match state.active.as_slice() {
            [only] => Some(*only),
            _ => None,
        }
    }

    pub fn subscribe_count(&self) -> usize {
        self.state.borrow().subscribes
    }
}

impl PositionSource for ManualSource {
    fn subscribe(&mut self) -> Result<SubscriptionId, SourceError> {
        let mut state = self.state.borrow_mut();
        if let Some(reason) = &state.unavailable {
            return Err(SourceError::Unsupported(reason.clone()));
        }
        state.next_id += 1;
        state.subscribes += 1;
        let id = SubscriptionId(state.next_id);
        state.active.push(id);
        Ok(id)
    }

    fn unsubscribe(&mut self, id: SubscriptionId) {
        self.state.borrow_mut().active.retain(|active| *active != id);
    }
}

/// Blocking user decisions. The state machine does not proceed past a
/// decision point until the prompt returns.
pub trait Prompt {
    fn confirm(&mut self, message: &str) -> bool;
    fn prompt_text(&mut self, message: &str, default: &str) -> Option<String>;
    /// Show a message that the user must acknowledge.
    fn notify(&mut self, message: &str);
}

#[derive(Debug, Default)]
struct Script {
    confirms: VecDeque<bool>,
    texts: VecDeque<Option<String>>,
    notices: Vec<String>,
    asked: Vec<String>,
}

/// Prompt answering from queued replies. Unscripted confirms answer `false`
/// and unscripted text prompts accept the default.
#[derive(Debug, Clone, Default)]
pub struct ScriptedPrompt {
    script: Rc<RefCell<Script>>,
}

impl ScriptedPrompt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_confirm(&self, answer: bool) -> &Self {
        self.script.borrow_mut().confirms.push_back(answer);
        self
    }

    pub fn push_text(&self, answer: Option<&str>) -> &Self {
        self.script
            .borrow_mut()
            .texts
            .push_back(answer.map(str::to_string));
        self
    }

    /// Messages passed to `notify`, oldest first.
    pub fn notices(&self) -> Vec<String> {
        self.script.borrow().notices.clone()
    }

    /// Questions asked through `confirm` or `prompt_text`, oldest first.
    pub fn asked(&self) -> Vec<String> {
        self.script.borrow().asked.clone()
    }
}

impl Prompt for ScriptedPrompt {
    fn confirm(&mut self, message: &str) -> bool {
        let mut script = self.script.borrow_mut();
        script.asked.push(message.to_string());
        script.confirms.pop_front().unwrap_or(false)
    }

    fn prompt_text(&mut self, message: &str, default: &str) -> Option<String> {
        let mut script = self.script.borrow_mut();
        script.asked.push(message.to_string());
        script
            .texts
            .pop_front()
            .unwrap_or_else(|| Some(default.to_string()))
    }

    fn notify(&mut self, message: &str) {
        self.script.borrow_mut().notices.push(message.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_shared() {
        let clock = ManualClock::new(1_000);
        let handle = clock.clone();
        handle.advance(500);
        assert_eq!(clock.now_ms(), 1_500);
    }

    #[test]
    fn test_manual_source_cycles() {
        let mut source = ManualSource::new();
        let first = source.subscribe().unwrap();
        source.unsubscribe(first);
        let second = source.subscribe().unwrap();
        assert_ne!(first, second);
        assert_eq!(source.current(), Some(second));
        assert_eq!(source.subscribe_count(), 2);
    }

    #[test]
    fn test_unavailable_source() {
        let mut source = ManualSource::unavailable("no GPS");
        assert!(matches!(source.subscribe(), Err(SourceError::Unsupported(_))));
    }

    #[test]
    fn test_scripted_prompt_defaults() {
        let mut prompt = ScriptedPrompt::new();
        prompt.push_confirm(true);
        assert!(prompt.confirm("save?"));
        assert!(!prompt.confirm("again?"));
        assert_eq!(prompt.prompt_text("name?", "Route").as_deref(), Some("Route"));
        assert_eq!(prompt.asked().len(), 3);
    }
}
