mod collision;
mod events;
mod game;
mod level;
mod physics;

pub use collision::{CollisionDetector, CollisionPass};
pub use events::{SimEvent, SimEvents};
pub use game::{Game, GameConfig, GameError, GameInfo, GameState, TickReport};
pub use level::{
    BoundarySide, Level, LevelError, LevelInfo, GARBAGE_COLLECTOR_THICKNESS,
    MAX_CASCADED_TRIGGERS,
};
pub use physics::{OpenEdges, PhysicsConfig, PhysicsEngine};
