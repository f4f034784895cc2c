use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::attributes::AttributeStore;
use super::geometry::{Aabb, Vec2};
use super::rule::Rule;
use super::trigger::TriggerCategory;

pub const DEFAULT_ACTOR_SIZE: Vec2 = Vec2 { x: 32.0, y: 32.0 };

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorId(pub u64);

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Actor {
    id: ActorId,
    pub name: String,
    /// Presentation-owned sprite, referenced by name only.
    pub sprite: String,
    pub position: Vec2,
    pub velocity: Vec2,
    pub size: Vec2,
    pub heading_degrees: f64,
    /// Static actors are skipped by the physics tick.
    pub is_static: bool,
    pub attributes: AttributeStore,
    rules: BTreeMap<TriggerCategory, Vec<Rule>>,
    dead: bool,
}

impl Actor {
    pub fn new(id: ActorId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            sprite: String::new(),
            position: Vec2::ZERO,
            velocity: Vec2::ZERO,
            size: DEFAULT_ACTOR_SIZE,
            heading_degrees: 0.0,
            is_static: false,
            attributes: AttributeStore::default(),
            rules: BTreeMap::new(),
            dead: false,
        }
    }

    pub fn with_position(mut self, x: f64, y: f64) -> Self {
        self.position = Vec2::new(x, y);
        self
    }

    pub fn with_velocity(mut self, x: f64, y: f64) -> Self {
        self.velocity = Vec2::new(x, y);
        self
    }

    pub fn with_size(mut self, width: f64, height: f64) -> Self {
        self.size = Vec2::new(width, height);
        self
    }

    pub fn with_static(mut self, is_static: bool) -> Self {
        self.is_static = is_static;
        self
    }

    pub fn id(&self) -> ActorId {
        self.id
    }

    pub fn bounds(&self) -> Aabb {
        Aabb::from_position_size(self.position, self.size)
    }

    pub fn is_dead(&self) -> bool {
        self.dead
    }

    pub fn mark_dead(&mut self) {
        self.dead = true;
    }

    /// Files the rule under its trigger's category, after any rules already
    /// stored there.
    pub fn add_rule(&mut self, rule: Rule) {
        self.rules.entry(rule.category()).or_default().push(rule);
    }

    /// Removes every rule matching `predicate`; returns how many were dropped.
    pub fn remove_rules_where(&mut self, mut predicate: impl FnMut(&Rule) -> bool) -> usize {
        let mut removed = 0;
        self.rules.retain(|_, rules| {
            let before = rules.len();
            rules.retain(|rule| !predicate(rule));
            removed += before - rules.len();
            !rules.is_empty()
        });
        removed
    }

    pub fn rules_for(&self, category: &TriggerCategory) -> &[Rule] {
        self.rules
            .get(category)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn categories(&self) -> impl Iterator<Item = &TriggerCategory> {
        self.rules.keys()
    }

    pub fn rules(&self) -> impl Iterator<Item = &Rule> {
        self.rules.values().flatten()
    }

    pub fn rule_count(&self) -> usize {
        self.rules.values().map(Vec::len).sum()
    }

    /// Copy with a fresh id. References to the original id inside the rules
    /// are rewritten to the copy so self-targeting behavior follows it.
    pub fn spawn_copy(&self, new_id: ActorId) -> Actor {
        let mut rules = BTreeMap::<TriggerCategory, Vec<Rule>>::new();
        for rule in self.rules() {
            let rule = rule.remapped(self.id, new_id);
            rules.entry(rule.category()).or_default().push(rule);
        }
        Actor {
            id: new_id,
            name: self.name.clone(),
            sprite: self.sprite.clone(),
            position: self.position,
            velocity: self.velocity,
            size: self.size,
            heading_degrees: self.heading_degrees,
            is_static: self.is_static,
            attributes: self.attributes.clone(),
            rules,
            dead: false,
        }
    }
}
