mod atomic_io;
mod authored;
mod compiler;
mod factory;
mod save;

pub use authored::{
    build_game, build_level, AuthoredActor, AuthoredAttribute, AuthoredGame, AuthoredLevel,
    AuthoredRule, AuthoringAlert, BuiltGame,
};
pub use compiler::{compile_game_xml, load_game_xml, SourceLocation, XmlCompileError, XmlErrorCode};
pub use factory::{
    action_spec, create_action, create_rule, create_trigger, key_arg, trigger_spec, FactoryError,
};
pub use save::{
    encode_save_json, load_game, parse_save_json, restore_game, save_game, snapshot_game,
    validate_save, PersistError, SaveGame, SavedActor, SavedAttribute, SavedCollector, SavedLevel,
    SavedRule, SAVE_VERSION,
};
