use crate::model::{ActorId, AttributeKind};

/// Side-channel notifications for the presentation layer, drained once per
/// tick boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum SimEvent {
    ActorAdded {
        actor_id: ActorId,
        name: String,
    },
    ActorDestroyed {
        actor_id: ActorId,
        name: String,
    },
    AttributeChanged {
        actor_id: ActorId,
        attribute: AttributeKind,
        value: i32,
    },
    LevelAdvanced {
        from: usize,
        to: usize,
    },
    SceneShift {
        source: ActorId,
        direction: String,
        speed: f64,
    },
    PlaySound {
        source: ActorId,
        sound: String,
    },
    GameCompleted,
}

#[derive(Debug, Default)]
pub struct SimEvents {
    queue: Vec<SimEvent>,
}

impl SimEvents {
    pub fn push(&mut self, event: SimEvent) {
        self.queue.push(event);
    }

    pub fn drain(&mut self) -> Vec<SimEvent> {
        std::mem::take(&mut self.queue)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SimEvent> {
        self.queue.iter()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
