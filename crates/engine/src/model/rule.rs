use super::action::Action;
use super::actor::ActorId;
use super::trigger::{Trigger, TriggerCategory};

/// Immutable trigger/action pairing owned by one actor.
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    trigger: Trigger,
    action: Action,
}

impl Rule {
    pub fn new(trigger: Trigger, action: Action) -> Self {
        Self { trigger, action }
    }

    pub fn trigger(&self) -> &Trigger {
        &self.trigger
    }

    pub fn action(&self) -> &Action {
        &self.action
    }

    pub fn category(&self) -> TriggerCategory {
        self.trigger.category()
    }

    pub(crate) fn remapped(&self, from: ActorId, to: ActorId) -> Self {
        let mut trigger = self.trigger.clone();
        let mut action = self.action.clone();
        trigger.remap(from, to);
        action.remap(from, to);
        Self { trigger, action }
    }
}
