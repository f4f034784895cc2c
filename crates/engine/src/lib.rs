use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub mod app;
pub mod content;
pub mod model;
pub mod sim;

pub use app::{
    run_headless, AppError, InputScript, InputScriptError, LoopConfig, LoopMetricsSnapshot,
    RunSummary,
};
pub use content::{
    build_game, build_level, compile_game_xml, load_game, load_game_xml, restore_game, save_game,
    snapshot_game, AuthoredActor, AuthoredGame, AuthoredLevel, AuthoringAlert, BuiltGame,
    FactoryError, PersistError, SaveGame, XmlCompileError,
};
pub use model::{Action, Actor, ActorId, BehaviorArg, BehaviorSpec, Rule, Trigger, Vec2};
pub use sim::{
    Game, GameConfig, GameError, GameInfo, GameState, Level, LevelInfo, PhysicsConfig, SimEvent,
    TickReport,
};

pub const ROOT_ENV_VAR: &str = "RULEPLAY_ROOT";

#[derive(Debug, Clone)]
pub struct AppPaths {
    pub root: PathBuf,
    pub saves_dir: PathBuf,
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to read environment variable {var}: {source}")]
    EnvVar {
        var: &'static str,
        #[source]
        source: env::VarError,
    },
    #[error("failed to resolve current executable path: {0}")]
    CurrentExe(#[source] std::io::Error),
    #[error("current executable path has no parent directory: {0}")]
    ExeHasNoParent(PathBuf),
    #[error("failed to create saves directory at {path}: {source}")]
    CreateSavesDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(
        "RULEPLAY_ROOT is set but does not point to a valid project root: {path}\n\
A valid root must contain Cargo.toml and either crates/ or saves/."
    )]
    InvalidEnvRoot { path: PathBuf },
    #[error(
        "Could not detect project root by walking upward from executable directory: {start_dir}\n\
Expected a directory containing Cargo.toml and either crates/ or saves/.\n\
Set {env_var} explicitly, for example:\n\
Bash/zsh: export {env_var}=\"/path/to/ruleplay\""
    )]
    RootNotFound {
        start_dir: PathBuf,
        env_var: &'static str,
    },
}

pub fn resolve_app_paths() -> Result<AppPaths, StartupError> {
    AppPaths::at(resolve_root()?)
}

impl AppPaths {
    /// Lays out the directories under `root`, creating `saves/` if missing.
    pub fn at(root: PathBuf) -> Result<Self, StartupError> {
        let saves_dir = root.join("saves");
        fs::create_dir_all(&saves_dir).map_err(|source| StartupError::CreateSavesDir {
            path: saves_dir.clone(),
            source,
        })?;
        Ok(Self { root, saves_dir })
    }

    /// Bare file names land in the saves directory; anything with a directory
    /// component is used as given.
    pub fn save_path(&self, requested: &Path) -> PathBuf {
        let has_parent = requested
            .parent()
            .is_some_and(|parent| !parent.as_os_str().is_empty());
        if has_parent || requested.is_absolute() {
            requested.to_path_buf()
        } else {
            self.saves_dir.join(requested)
        }
    }
}

fn resolve_root() -> Result<PathBuf, StartupError> {
    match env::var(ROOT_ENV_VAR) {
        Ok(value) => {
            let raw = PathBuf::from(value);
            let normalized = normalize_path(&raw);
            if is_repo_marker(&normalized) {
                Ok(normalized)
            } else {
                Err(StartupError::InvalidEnvRoot { path: normalized })
            }
        }
        Err(env::VarError::NotPresent) => {
            let exe = env::current_exe().map_err(StartupError::CurrentExe)?;
            let exe_dir = exe
                .parent()
                .map(Path::to_path_buf)
                .ok_or_else(|| StartupError::ExeHasNoParent(exe.clone()))?;

            for candidate in exe_dir.ancestors() {
                if is_repo_marker(candidate) {
                    return Ok(normalize_path(candidate));
                }
            }

            Err(StartupError::RootNotFound {
                start_dir: normalize_path(&exe_dir),
                env_var: ROOT_ENV_VAR,
            })
        }
        Err(source) => Err(StartupError::EnvVar {
            var: ROOT_ENV_VAR,
            source,
        }),
    }
}

fn is_repo_marker(path: &Path) -> bool {
    let cargo_toml = path.join("Cargo.toml").is_file();
    let has_crates = path.join("crates").is_dir();
    let has_saves = path.join("saves").is_dir();

    cargo_toml && (has_crates || has_saves)
}

fn normalize_path(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
