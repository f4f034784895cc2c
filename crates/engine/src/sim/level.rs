use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::model::{
    Action, ActionContext, ActionOutcome, Actor, ActorId, AttributeChange, AttributeKind,
    CollisionSide, Rule, Trigger, TriggerCategory, Vec2,
};

use super::events::{SimEvent, SimEvents};
use super::physics::OpenEdges;

/// Follow-up triggers (attribute thresholds) drained by one outer dispatch.
pub const MAX_CASCADED_TRIGGERS: usize = 1024;
/// Depth of the off-screen boundary actors placed by garbage collectors.
pub const GARBAGE_COLLECTOR_THICKNESS: f64 = 50.0;

/// Kept out of circulation so the id allocator can never wrap.
const RESERVED_ID: ActorId = ActorId(u64::MAX);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LevelInfo {
    pub name: String,
    pub width: f64,
    pub height: f64,
    pub background: String,
    pub hud_options: Vec<String>,
    pub scrolling_direction: String,
    pub termination: String,
    pub winning_condition: String,
    pub losing_condition: String,
}

impl Default for LevelInfo {
    fn default() -> Self {
        Self {
            name: "level".to_string(),
            width: 0.0,
            height: 0.0,
            background: String::new(),
            hud_options: Vec::new(),
            scrolling_direction: String::new(),
            termination: String::new(),
            winning_condition: String::new(),
            losing_condition: String::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum BoundarySide {
    Left,
    Right,
    Top,
    Bottom,
}

impl BoundarySide {
    pub const ALL: [BoundarySide; 4] = [
        BoundarySide::Left,
        BoundarySide::Right,
        BoundarySide::Top,
        BoundarySide::Bottom,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Right => "right",
            Self::Top => "top",
            Self::Bottom => "bottom",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "left" => Some(Self::Left),
            "right" => Some(Self::Right),
            "top" => Some(Self::Top),
            "bottom" => Some(Self::Bottom),
            _ => None,
        }
    }
}

impl fmt::Display for BoundarySide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LevelError {
    #[error("actor id {id} is already used in level '{level}'")]
    DuplicateActorId { level: String, id: ActorId },
    #[error("actor {id} is not part of level '{level}'")]
    UnknownActor { level: String, id: ActorId },
    #[error("actor id {id} is reserved in level '{level}'")]
    ReservedActorId { level: String, id: ActorId },
    #[error("level '{level}' has no actor ids left to allocate")]
    IdsExhausted { level: String },
}

/// One stage of a game: an insertion-ordered actor arena plus the trigger
/// index used to route candidate triggers to the actors that care about them.
#[derive(Debug, Clone, Default)]
pub struct Level {
    pub info: LevelInfo,
    actors: Vec<Actor>,
    slots: HashMap<ActorId, usize>,
    trigger_index: BTreeMap<TriggerCategory, Vec<ActorId>>,
    templates: Vec<Actor>,
    garbage_collectors: BTreeMap<BoundarySide, ActorId>,
    next_id: u64,
    pending_triggers: VecDeque<Trigger>,
}

impl Level {
    pub fn new(info: LevelInfo) -> Self {
        Self {
            info,
            ..Self::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }

    pub fn size(&self) -> Vec2 {
        Vec2::new(self.info.width, self.info.height)
    }

    pub fn add_actor(&mut self, actor: Actor) -> Result<(), LevelError> {
        let id = actor.id();
        self.ensure_unused(id)?;
        self.bump_next_id(id);
        let slot = self.actors.len();
        self.actors.push(actor);
        self.slots.insert(id, slot);
        self.index_actor(id);
        self.guard_with_collectors(id);
        Ok(())
    }

    /// Registers an off-stage actor that `CreateActor` can copy from. Templates
    /// are never simulated or dispatched to.
    pub fn add_template(&mut self, template: Actor) -> Result<(), LevelError> {
        let id = template.id();
        self.ensure_unused(id)?;
        self.bump_next_id(id);
        self.templates.push(template);
        Ok(())
    }

    pub fn remove_actor(&mut self, id: ActorId) -> Option<Actor> {
        self.remove_actors(&[id]).pop()
    }

    /// Removes every listed actor in one pass, keeping the arena order of the
    /// survivors. Unknown ids are ignored.
    pub fn remove_actors(&mut self, ids: &[ActorId]) -> Vec<Actor> {
        if ids.is_empty() {
            return Vec::new();
        }
        let mut removed = Vec::new();
        let mut kept = Vec::with_capacity(self.actors.len());
        for actor in self.actors.drain(..) {
            if ids.contains(&actor.id()) {
                removed.push(actor);
            } else {
                kept.push(actor);
            }
        }
        self.actors = kept;
        if removed.is_empty() {
            return removed;
        }

        self.rebuild_slots();
        let removed_ids: Vec<ActorId> = removed.iter().map(Actor::id).collect();
        self.trigger_index.retain(|_, registered| {
            registered.retain(|id| !removed_ids.contains(id));
            !registered.is_empty()
        });
        self.garbage_collectors
            .retain(|_, id| !removed_ids.contains(id));

        let collector_ids: Vec<ActorId> = self.garbage_collectors.values().copied().collect();
        for collector in collector_ids {
            self.strip_rules_where(collector, |rule| {
                removed_ids
                    .iter()
                    .any(|removed| rule.trigger().references(*removed))
            });
        }
        removed
    }

    pub fn actor(&self, id: ActorId) -> Option<&Actor> {
        self.slots.get(&id).map(|slot| &self.actors[*slot])
    }

    pub(crate) fn actor_mut(&mut self, id: ActorId) -> Option<&mut Actor> {
        let slot = *self.slots.get(&id)?;
        self.actors.get_mut(slot)
    }

    pub fn actors(&self) -> &[Actor] {
        &self.actors
    }

    pub fn actor_ids(&self) -> Vec<ActorId> {
        self.actors.iter().map(Actor::id).collect()
    }

    pub fn dead_actor_ids(&self) -> Vec<ActorId> {
        self.actors
            .iter()
            .filter(|actor| actor.is_dead())
            .map(Actor::id)
            .collect()
    }

    pub fn templates(&self) -> &[Actor] {
        &self.templates
    }

    pub fn template(&self, id: ActorId) -> Option<&Actor> {
        self.templates.iter().find(|template| template.id() == id)
    }

    pub fn add_rule(&mut self, id: ActorId, rule: Rule) -> Result<(), LevelError> {
        let category = rule.category();
        match self.actor_mut(id) {
            Some(actor) => actor.add_rule(rule),
            None => return Err(self.unknown(id)),
        }
        self.register(category, id);
        Ok(())
    }

    /// Adds a rule to an off-stage template; copies spawned from it carry it.
    pub fn add_template_rule(&mut self, id: ActorId, rule: Rule) -> Result<(), LevelError> {
        let Some(slot) = self.templates.iter().position(|template| template.id() == id) else {
            return Err(self.unknown(id));
        };
        self.templates[slot].add_rule(rule);
        Ok(())
    }

    pub fn remove_rules_where(
        &mut self,
        id: ActorId,
        predicate: impl FnMut(&Rule) -> bool,
    ) -> Result<usize, LevelError> {
        if !self.slots.contains_key(&id) {
            return Err(self.unknown(id));
        }
        Ok(self.strip_rules_where(id, predicate))
    }

    pub fn next_id(&self) -> u64 {
        self.next_id
    }

    pub(crate) fn set_next_id(&mut self, next_id: u64) {
        self.next_id = self.next_id.max(next_id);
    }

    /// Hands out the next free id. `u64::MAX` is never allocated.
    pub fn allocate_id(&mut self) -> Result<ActorId, LevelError> {
        let id = ActorId(self.next_id);
        if id == RESERVED_ID {
            return Err(LevelError::IdsExhausted {
                level: self.info.name.clone(),
            });
        }
        self.next_id += 1;
        Ok(id)
    }

    /// Actors registered under `category`, in arena order.
    pub fn registered(&self, category: &TriggerCategory) -> &[ActorId] {
        self.trigger_index
            .get(category)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn garbage_collector_sides(&self) -> Vec<BoundarySide> {
        self.garbage_collectors.keys().copied().collect()
    }

    pub fn garbage_collectors(&self) -> impl Iterator<Item = (BoundarySide, ActorId)> + '_ {
        self.garbage_collectors
            .iter()
            .map(|(side, id)| (*side, *id))
    }

    /// Sides guarded by a garbage collector stay open to the physics clamp.
    pub fn open_edges(&self) -> OpenEdges {
        let open = |side: BoundarySide| self.garbage_collectors.contains_key(&side);
        OpenEdges {
            left: open(BoundarySide::Left),
            right: open(BoundarySide::Right),
            top: open(BoundarySide::Top),
            bottom: open(BoundarySide::Bottom),
        }
    }

    pub fn is_garbage_collector(&self, id: ActorId) -> bool {
        self.garbage_collectors.values().any(|collector| *collector == id)
    }

    /// Places a static boundary actor just outside the level on each listed
    /// side. Any actor (present or spawned later) touching one is destroyed.
    pub fn set_garbage_collectors(&mut self, sides: &[BoundarySide]) {
        let existing: Vec<ActorId> = self.garbage_collectors.values().copied().collect();
        self.remove_actors(&existing);

        for side in sides {
            if self.garbage_collectors.contains_key(side) {
                continue;
            }
            let placed = self
                .allocate_id()
                .and_then(|id| self.place_garbage_collector(*side, id));
            if let Err(error) = placed {
                debug!(level = %self.info.name, side = %side, error = %error, "garbage_collector_skipped");
            }
        }
    }

    /// Places one boundary actor under a caller-chosen id, as when restoring a
    /// saved level.
    pub(crate) fn place_garbage_collector(
        &mut self,
        side: BoundarySide,
        id: ActorId,
    ) -> Result<(), LevelError> {
        self.ensure_unused(id)?;
        self.bump_next_id(id);
        let targets: Vec<ActorId> = self
            .actors
            .iter()
            .map(Actor::id)
            .filter(|target| !self.is_garbage_collector(*target))
            .collect();

        let (position, size) = self.boundary_geometry(side);
        let collector = Actor::new(id, format!("garbage_collector_{side}"))
            .with_position(position.x, position.y)
            .with_size(size.x, size.y)
            .with_static(true);
        self.actors.push(collector);
        self.slots.insert(id, self.actors.len() - 1);
        self.garbage_collectors.insert(side, id);
        for target in targets {
            self.attach_collector_rule(id, target);
        }
        debug!(level = %self.info.name, side = %side, actor_id = id.0, "garbage_collector_placed");
        Ok(())
    }

    fn boundary_geometry(&self, side: BoundarySide) -> (Vec2, Vec2) {
        let t = GARBAGE_COLLECTOR_THICKNESS;
        let width = self.info.width.max(0.0);
        let height = self.info.height.max(0.0);
        match side {
            BoundarySide::Left => (Vec2::new(-t, -t), Vec2::new(t, height + 2.0 * t)),
            BoundarySide::Right => (Vec2::new(width, -t), Vec2::new(t, height + 2.0 * t)),
            BoundarySide::Top => (Vec2::new(-t, -t), Vec2::new(width + 2.0 * t, t)),
            BoundarySide::Bottom => (Vec2::new(-t, height), Vec2::new(width + 2.0 * t, t)),
        }
    }

    fn guard_with_collectors(&mut self, target: ActorId) {
        let collectors: Vec<ActorId> = self.garbage_collectors.values().copied().collect();
        for collector in collectors {
            self.attach_collector_rule(collector, target);
        }
    }

    fn attach_collector_rule(&mut self, collector: ActorId, target: ActorId) {
        let rule = Rule::new(
            Trigger::collision(CollisionSide::Any, collector, target),
            Action::Destroy { target },
        );
        if self.add_rule(collector, rule).is_err() {
            debug!(actor_id = collector.0, "garbage_collector_missing");
        }
    }

    /// Routes a candidate trigger to every live registered actor whose stored
    /// rules evaluate true against it, then drains any follow-up triggers the
    /// performed actions queued. Returns the number of actions applied.
    pub fn handle_trigger(&mut self, candidate: &Trigger, ctx: &mut ActionContext<'_>) -> u32 {
        let mut performed = self.dispatch(candidate, ctx);
        let mut cascaded = 0usize;
        while let Some(next) = self.pending_triggers.pop_front() {
            if cascaded >= MAX_CASCADED_TRIGGERS {
                warn!(
                    level = %self.info.name,
                    dropped = self.pending_triggers.len() + 1,
                    limit = MAX_CASCADED_TRIGGERS,
                    "cascaded_trigger_limit_reached"
                );
                self.pending_triggers.clear();
                break;
            }
            cascaded += 1;
            performed = performed.saturating_add(self.dispatch(&next, ctx));
        }
        performed
    }

    fn dispatch(&mut self, candidate: &Trigger, ctx: &mut ActionContext<'_>) -> u32 {
        let category = candidate.category();
        let Some(registered) = self.trigger_index.get(&category) else {
            return 0;
        };
        let registered = registered.clone();

        let mut performed = 0u32;
        for id in registered {
            let actions: Vec<Action> = match self.actor(id) {
                Some(actor) if !actor.is_dead() => actor
                    .rules_for(&category)
                    .iter()
                    .filter(|rule| rule.trigger().evaluate(candidate))
                    .map(|rule| rule.action().clone())
                    .collect(),
                _ => continue,
            };
            for action in actions {
                if action.perform(self, ctx) == ActionOutcome::Applied {
                    performed += 1;
                }
            }
        }
        performed
    }

    /// Applies an attribute delta and queues an `AttributeReached` candidate
    /// for each stored threshold the change crossed. Returns false when the
    /// actor is not in the level.
    pub fn change_attribute(
        &mut self,
        id: ActorId,
        attribute: AttributeKind,
        delta: i32,
        events: &mut SimEvents,
    ) -> bool {
        let Some(actor) = self.actor_mut(id) else {
            return false;
        };
        let Some(change) = actor.attributes.change(attribute, delta) else {
            return true;
        };
        events.push(SimEvent::AttributeChanged {
            actor_id: id,
            attribute,
            value: change.after,
        });
        self.queue_thresholds(id, change);
        true
    }

    fn queue_thresholds(&mut self, id: ActorId, change: AttributeChange) {
        let category = TriggerCategory::AttributeReached(change.kind);
        let mut thresholds: Vec<i32> = Vec::new();
        for registered in self.registered(&category) {
            let Some(actor) = self.actor(*registered) else {
                continue;
            };
            for rule in actor.rules_for(&category) {
                if let Trigger::AttributeReached {
                    actor, threshold, ..
                } = rule.trigger()
                {
                    if *actor == id && change.crosses(*threshold) && !thresholds.contains(threshold)
                    {
                        thresholds.push(*threshold);
                    }
                }
            }
        }
        for threshold in thresholds {
            self.pending_triggers.push_back(Trigger::AttributeReached {
                actor: id,
                attribute: change.kind,
                threshold,
            });
        }
    }

    /// Copies `template` (an off-stage template, or failing that a level
    /// actor) to `position` under a fresh id.
    pub fn spawn_from_template(
        &mut self,
        template: ActorId,
        position: Vec2,
        events: &mut SimEvents,
    ) -> Option<ActorId> {
        let source = self.template(template).or_else(|| self.actor(template))?;
        let mut copy = source.spawn_copy(ActorId(self.next_id));
        let new_id = match self.allocate_id() {
            Ok(id) => id,
            Err(error) => {
                debug!(template = template.0, error = %error, "actor_spawn_skipped");
                return None;
            }
        };
        copy.position = position;
        let name = copy.name.clone();

        let slot = self.actors.len();
        self.actors.push(copy);
        self.slots.insert(new_id, slot);
        self.index_actor(new_id);
        self.guard_with_collectors(new_id);

        events.push(SimEvent::ActorAdded {
            actor_id: new_id,
            name,
        });
        debug!(template = template.0, actor_id = new_id.0, "actor_spawned");
        Some(new_id)
    }

    fn ensure_unused(&self, id: ActorId) -> Result<(), LevelError> {
        if id == RESERVED_ID {
            return Err(LevelError::ReservedActorId {
                level: self.info.name.clone(),
                id,
            });
        }
        if self.slots.contains_key(&id) || self.template(id).is_some() {
            return Err(LevelError::DuplicateActorId {
                level: self.info.name.clone(),
                id,
            });
        }
        Ok(())
    }

    fn bump_next_id(&mut self, id: ActorId) {
        self.next_id = self.next_id.max(id.0.saturating_add(1));
    }

    fn unknown(&self, id: ActorId) -> LevelError {
        LevelError::UnknownActor {
            level: self.info.name.clone(),
            id,
        }
    }

    fn rebuild_slots(&mut self) {
        self.slots.clear();
        for (slot, actor) in self.actors.iter().enumerate() {
            self.slots.insert(actor.id(), slot);
        }
    }

    fn index_actor(&mut self, id: ActorId) {
        let categories: Vec<TriggerCategory> = match self.actor(id) {
            Some(actor) => actor.categories().cloned().collect(),
            None => return,
        };
        for category in categories {
            self.register(category, id);
        }
    }

    /// Inserts `id` under `category` keeping arena order; no-op when present.
    fn register(&mut self, category: TriggerCategory, id: ActorId) {
        let slots = &self.slots;
        let registered = self.trigger_index.entry(category).or_default();
        if registered.contains(&id) {
            return;
        }
        let slot_of = |actor: &ActorId| slots.get(actor).copied().unwrap_or(usize::MAX);
        let own_slot = slot_of(&id);
        let at = registered.partition_point(|other| slot_of(other) < own_slot);
        registered.insert(at, id);
    }

    fn strip_rules_where(&mut self, id: ActorId, predicate: impl FnMut(&Rule) -> bool) -> usize {
        let Some(actor) = self.actor_mut(id) else {
            return 0;
        };
        let removed = actor.remove_rules_where(predicate);
        if removed == 0 {
            return 0;
        }
        let remaining: Vec<TriggerCategory> = actor.categories().cloned().collect();
        self.trigger_index.retain(|category, registered| {
            if !remaining.contains(category) {
                registered.retain(|registered_id| *registered_id != id);
            }
            !registered.is_empty()
        });
        removed
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;
    use crate::sim::PhysicsEngine;

    fn dispatch(level: &mut Level, trigger: &Trigger) -> (u32, SimEvents) {
        let physics = PhysicsEngine::default();
        let mut events = SimEvents::default();
        let mut rng = StdRng::seed_from_u64(3);
        let mut ctx = ActionContext::new(&physics, &mut events, &mut rng);
        let performed = level.handle_trigger(trigger, &mut ctx);
        (performed, events)
    }

    fn assert_index_consistent(level: &Level) {
        for (category, registered) in &level.trigger_index {
            for id in registered {
                let actor = level.actor(*id).expect("indexed actor exists");
                assert!(!actor.rules_for(category).is_empty());
            }
        }
        for actor in level.actors() {
            for category in actor.categories() {
                assert!(level.registered(category).contains(&actor.id()));
            }
        }
    }

    #[test]
    fn rules_sharing_a_trigger_all_fire_in_order() {
        let mut level = Level::default();
        level
            .add_actor(Actor::new(ActorId(1), "hero"))
            .expect("add hero");
        level
            .add_rule(
                ActorId(1),
                Rule::new(
                    Trigger::key("right"),
                    Action::MoveByHeading {
                        target: ActorId(1),
                        heading_degrees: 0.0,
                        distance: 5.0,
                    },
                ),
            )
            .expect("rule one");
        level
            .add_rule(
                ActorId(1),
                Rule::new(
                    Trigger::key("right"),
                    Action::PlaySound {
                        source: ActorId(1),
                        sound: "step.wav".into(),
                    },
                ),
            )
            .expect("rule two");

        let (performed, events) = dispatch(&mut level, &Trigger::key("RIGHT"));
        assert_eq!(performed, 2);
        assert_eq!(level.actor(ActorId(1)).expect("hero").position.x, 5.0);
        assert_eq!(events.len(), 1);
        assert_index_consistent(&level);
    }

    #[test]
    fn unregistered_category_is_a_no_op() {
        let mut level = Level::default();
        level
            .add_actor(Actor::new(ActorId(1), "hero").with_position(2.0, 2.0))
            .expect("add hero");
        let (performed, events) = dispatch(&mut level, &Trigger::key("space"));
        assert_eq!(performed, 0);
        assert!(events.is_empty());
        assert_eq!(level.actor(ActorId(1)).expect("hero").position, Vec2::new(2.0, 2.0));
    }

    #[test]
    fn non_matching_operands_do_not_fire() {
        let mut level = Level::default();
        level.add_actor(Actor::new(ActorId(1), "a")).expect("add a");
        level.add_actor(Actor::new(ActorId(2), "b")).expect("add b");
        level
            .add_rule(
                ActorId(1),
                Rule::new(
                    Trigger::collision(CollisionSide::Any, ActorId(1), ActorId(2)),
                    Action::Destroy { target: ActorId(1) },
                ),
            )
            .expect("rule");
        let (performed, _) = dispatch(
            &mut level,
            &Trigger::collision(CollisionSide::Any, ActorId(2), ActorId(1)),
        );
        assert_eq!(performed, 0);
        assert!(!level.actor(ActorId(1)).expect("a").is_dead());
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let mut level = Level::default();
        level.add_actor(Actor::new(ActorId(4), "a")).expect("add");
        let err = level
            .add_actor(Actor::new(ActorId(4), "b"))
            .expect_err("duplicate");
        assert!(matches!(err, LevelError::DuplicateActorId { id: ActorId(4), .. }));
        assert_eq!(level.allocate_id(), Ok(ActorId(5)));
    }

    #[test]
    fn top_id_is_reserved_and_allocation_stops_short_of_it() {
        let mut level = Level::new(LevelInfo {
            width: 100.0,
            height: 100.0,
            ..LevelInfo::default()
        });
        let err = level
            .add_actor(Actor::new(ActorId(u64::MAX), "edge"))
            .expect_err("reserved");
        assert!(matches!(err, LevelError::ReservedActorId { .. }));

        level
            .add_actor(Actor::new(ActorId(u64::MAX - 1), "last"))
            .expect("last usable id");
        level
            .add_template(Actor::new(ActorId(1), "coin"))
            .expect("template");
        assert!(matches!(
            level.allocate_id(),
            Err(LevelError::IdsExhausted { .. })
        ));

        level.set_garbage_collectors(&[BoundarySide::Left]);
        assert!(level.garbage_collector_sides().is_empty());

        let mut events = SimEvents::default();
        assert!(level
            .spawn_from_template(ActorId(1), Vec2::ZERO, &mut events)
            .is_none());
        assert!(events.is_empty());
        assert_eq!(level.actors().len(), 1);
    }

    #[test]
    fn removal_clears_index_entries() {
        let mut level = Level::default();
        for id in 1..=3 {
            let mut actor = Actor::new(ActorId(id), format!("a{id}"));
            actor.add_rule(Rule::new(Trigger::key("x"), Action::Jump { target: ActorId(id) }));
            level.add_actor(actor).expect("add");
        }
        let category = Trigger::key("x").category();
        assert_eq!(
            level.registered(&category),
            &[ActorId(1), ActorId(2), ActorId(3)]
        );

        let removed = level.remove_actors(&[ActorId(2)]);
        assert_eq!(removed.len(), 1);
        assert_eq!(level.registered(&category), &[ActorId(1), ActorId(3)]);
        assert!(level.actor(ActorId(2)).is_none());
        assert_eq!(level.actor(ActorId(3)).expect("a3").id(), ActorId(3));
        assert_index_consistent(&level);

        level
            .remove_rules_where(ActorId(1), |_| true)
            .expect("strip rules");
        assert_eq!(level.registered(&category), &[ActorId(3)]);
        assert_index_consistent(&level);
    }

    #[test]
    fn dead_actors_are_not_dispatched_to() {
        let mut level = Level::default();
        let mut actor = Actor::new(ActorId(1), "ghost");
        actor.add_rule(Rule::new(
            Trigger::key("a"),
            Action::ApplyImpulse {
                target: ActorId(1),
                dx: 1.0,
                dy: 0.0,
            },
        ));
        actor.mark_dead();
        level.add_actor(actor).expect("add");
        let (performed, _) = dispatch(&mut level, &Trigger::key("a"));
        assert_eq!(performed, 0);
    }

    #[test]
    fn crossing_a_threshold_fires_attribute_rules() {
        let mut level = Level::default();
        let mut hero = Actor::new(ActorId(1), "hero");
        hero.attributes
            .define(AttributeKind::Health, 2, 0, 10)
            .expect("define");
        hero.add_rule(Rule::new(
            Trigger::key("hit"),
            Action::ChangeAttribute {
                target: ActorId(1),
                attribute: AttributeKind::Health,
                delta: -5,
            },
        ));
        hero.add_rule(Rule::new(
            Trigger::AttributeReached {
                actor: ActorId(1),
                attribute: AttributeKind::Health,
                threshold: 0,
            },
            Action::Destroy { target: ActorId(1) },
        ));
        level.add_actor(hero).expect("add");

        let (performed, events) = dispatch(&mut level, &Trigger::key("hit"));
        assert_eq!(performed, 2);
        let hero = level.actor(ActorId(1)).expect("hero");
        assert_eq!(hero.attributes.get(AttributeKind::Health), Some(0));
        assert!(hero.is_dead());
        assert_eq!(
            events.iter().collect::<Vec<_>>(),
            vec![&SimEvent::AttributeChanged {
                actor_id: ActorId(1),
                attribute: AttributeKind::Health,
                value: 0,
            }]
        );
    }

    #[test]
    fn self_feeding_thresholds_stop_at_cascade_limit() {
        let mut level = Level::default();
        let mut counter = Actor::new(ActorId(1), "counter");
        counter.add_rule(Rule::new(
            Trigger::key("go"),
            Action::ChangeAttribute {
                target: ActorId(1),
                attribute: AttributeKind::Points,
                delta: 1,
            },
        ));
        // Every time points reach 1 they drop to 0 and climb back.
        counter.add_rule(Rule::new(
            Trigger::AttributeReached {
                actor: ActorId(1),
                attribute: AttributeKind::Points,
                threshold: 1,
            },
            Action::ChangeAttribute {
                target: ActorId(1),
                attribute: AttributeKind::Points,
                delta: -1,
            },
        ));
        counter.add_rule(Rule::new(
            Trigger::AttributeReached {
                actor: ActorId(1),
                attribute: AttributeKind::Points,
                threshold: 0,
            },
            Action::ChangeAttribute {
                target: ActorId(1),
                attribute: AttributeKind::Points,
                delta: 1,
            },
        ));
        level.add_actor(counter).expect("add");

        let (performed, _) = dispatch(&mut level, &Trigger::key("go"));
        assert_eq!(performed as usize, 1 + MAX_CASCADED_TRIGGERS);
        assert!(level.pending_triggers.is_empty());
    }

    #[test]
    fn spawned_copies_get_fresh_ids_and_collector_rules() {
        let mut level = Level::new(LevelInfo {
            width: 100.0,
            height: 100.0,
            ..LevelInfo::default()
        });
        level.add_actor(Actor::new(ActorId(1), "hero")).expect("add");
        level
            .add_template(Actor::new(ActorId(2), "coin"))
            .expect("template");
        level.set_garbage_collectors(&[BoundarySide::Bottom]);
        let collector = ActorId(3);
        assert!(level.is_garbage_collector(collector));

        let mut events = SimEvents::default();
        let spawned = level
            .spawn_from_template(ActorId(2), Vec2::new(10.0, 10.0), &mut events)
            .expect("spawn");
        assert_eq!(spawned, ActorId(4));
        assert_eq!(level.actor(spawned).expect("copy").position, Vec2::new(10.0, 10.0));
        assert_eq!(
            events.drain(),
            vec![SimEvent::ActorAdded {
                actor_id: spawned,
                name: "coin".into()
            }]
        );
        let collector_rules: Vec<&Rule> = level.actor(collector).expect("gc").rules().collect();
        assert_eq!(collector_rules.len(), 2);
        assert_index_consistent(&level);

        level.remove_actor(spawned);
        assert_eq!(level.actor(collector).expect("gc").rule_count(), 1);

        level.add_actor(Actor::new(ActorId(10), "late")).expect("late");
        assert_eq!(level.actor(collector).expect("gc").rule_count(), 2);
        assert!(level
            .spawn_from_template(ActorId(99), Vec2::ZERO, &mut events)
            .is_none());
    }

    #[test]
    fn garbage_collector_destroys_only_the_actor_it_touches() {
        let mut level = Level::new(LevelInfo {
            width: 100.0,
            height: 100.0,
            ..LevelInfo::default()
        });
        level.add_actor(Actor::new(ActorId(1), "a")).expect("a");
        level.add_actor(Actor::new(ActorId(2), "b")).expect("b");
        level.set_garbage_collectors(&[BoundarySide::Left]);
        let collector = level.garbage_collectors[&BoundarySide::Left];

        let (performed, _) = dispatch(
            &mut level,
            &Trigger::collision(CollisionSide::Any, collector, ActorId(2)),
        );
        assert_eq!(performed, 1);
        assert!(!level.actor(ActorId(1)).expect("a").is_dead());
        assert!(level.actor(ActorId(2)).expect("b").is_dead());
        assert_eq!(level.dead_actor_ids(), vec![ActorId(2)]);
    }
}
