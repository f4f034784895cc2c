//! Pairwise overlap detection that turns contacts into collision triggers.
//!
//! Contact side is picked by minimum penetration depth: the axis the two boxes
//! overlap least on is the axis they met along. When both depths are equal the
//! vertical axis wins, so a box landing exactly on a corner reports
//! `Top`/`Bottom` rather than `Left`/`Right`. Sides are reported from the
//! first actor's point of view; the reversed pair gets the opposite side.

use crate::model::{Actor, ActionContext, CollisionSide, Trigger};

use super::level::Level;

#[derive(Debug, Clone, Copy, Default)]
pub struct CollisionDetector;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollisionPass {
    pub contacts: u32,
    pub triggers: u32,
    pub actions_performed: u32,
}

impl CollisionDetector {
    pub fn new() -> Self {
        Self
    }

    /// Side of `main` touched by `other`, or `None` when they do not overlap.
    pub fn contact_side(main: &Actor, other: &Actor) -> Option<CollisionSide> {
        let a = main.bounds();
        let b = other.bounds();
        let overlap = a.overlap(&b);
        if overlap.x <= 0.0 || overlap.y <= 0.0 {
            return None;
        }

        let a_center = a.center();
        let b_center = b.center();
        let side = if overlap.y <= overlap.x {
            if b_center.y < a_center.y {
                CollisionSide::Top
            } else {
                CollisionSide::Bottom
            }
        } else if b_center.x > a_center.x {
            CollisionSide::Right
        } else {
            CollisionSide::Left
        };
        Some(side)
    }

    /// Candidate triggers for every overlapping pair of live actors, in arena
    /// order: (A,B) before (B,A); precise side, then `Side` for horizontal
    /// contacts, then `Any`.
    pub fn detect(&self, actors: &[Actor]) -> Vec<Trigger> {
        let mut triggers = Vec::new();
        for (index, first) in actors.iter().enumerate() {
            if first.is_dead() {
                continue;
            }
            for second in actors[index + 1..].iter() {
                if second.is_dead() {
                    continue;
                }
                let Some(side) = Self::contact_side(first, second) else {
                    continue;
                };
                push_contact(&mut triggers, side, first, second);
                push_contact(&mut triggers, side.opposite(), second, first);
            }
        }
        triggers
    }

    /// Detects on the level's current actors and routes each trigger through
    /// `Level::handle_trigger`. Actors spawned while dispatching only take part
    /// in later passes.
    pub fn run(&self, level: &mut Level, ctx: &mut ActionContext<'_>) -> CollisionPass {
        let triggers = self.detect(level.actors());
        let mut pass = CollisionPass {
            contacts: (triggers
                .iter()
                .filter(|trigger| matches!(trigger, Trigger::Collision { side: CollisionSide::Any, .. }))
                .count()
                / 2) as u32,
            triggers: triggers.len() as u32,
            actions_performed: 0,
        };
        for trigger in &triggers {
            pass.actions_performed = pass
                .actions_performed
                .saturating_add(level.handle_trigger(trigger, ctx));
        }
        pass
    }
}

fn push_contact(triggers: &mut Vec<Trigger>, side: CollisionSide, main: &Actor, other: &Actor) {
    triggers.push(Trigger::collision(side, main.id(), other.id()));
    if side.is_horizontal() {
        triggers.push(Trigger::collision(CollisionSide::Side, main.id(), other.id()));
    }
    triggers.push(Trigger::collision(CollisionSide::Any, main.id(), other.id()));
}
