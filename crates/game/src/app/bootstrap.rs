use std::fs;
use std::path::{Path, PathBuf};

use rule_engine::{
    build_game, load_game, load_game_xml, resolve_app_paths, Game, GameConfig, InputScript,
    InputScriptError, LoopConfig, PersistError, PhysicsConfig, StartupError, XmlCompileError,
};
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Error)]
pub(crate) enum BootstrapError {
    #[error("{0}\n\n{usage}", usage = usage_text())]
    Usage(String),
    #[error("failed to read player config {path}: {source}")]
    ReadConfig {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse player config {path}: {source}")]
    ParseConfig {
        path: PathBuf,
        #[source]
        source: serde_path_to_error::Error<serde_json::Error>,
    },
    #[error("game file {path} must end in .xml (authored) or .json (save)")]
    UnsupportedGameFile { path: PathBuf },
    #[error(transparent)]
    Script(#[from] InputScriptError),
    #[error(transparent)]
    Xml(#[from] XmlCompileError),
    #[error(transparent)]
    Persist(#[from] PersistError),
    #[error(transparent)]
    Startup(#[from] StartupError),
}

/// Optional JSON file passed with `--config`. Command-line flags win.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct PlayerConfig {
    pub(crate) target_tps: u32,
    pub(crate) max_ticks: Option<u64>,
    pub(crate) realtime: bool,
    pub(crate) seed: Option<u64>,
    pub(crate) physics: PhysicsConfig,
    pub(crate) presses: Vec<String>,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            target_tps: LoopConfig::default().target_tps,
            max_ticks: None,
            realtime: false,
            seed: None,
            physics: PhysicsConfig::default(),
            presses: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct CliArgs {
    pub(crate) game_path: PathBuf,
    pub(crate) config_path: Option<PathBuf>,
    pub(crate) ticks: Option<u64>,
    pub(crate) presses: Vec<String>,
    pub(crate) seed: Option<u64>,
    pub(crate) save: Option<PathBuf>,
    pub(crate) realtime: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum CliCommand {
    Run(CliArgs),
    Help,
}

/// Game settings the player asked for explicitly, as opposed to defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub(crate) struct ConfigOverrides {
    pub(crate) seed: Option<u64>,
    pub(crate) physics: Option<PhysicsConfig>,
}

pub(crate) struct AppWiring {
    pub(crate) game: Game,
    pub(crate) loop_config: LoopConfig,
    pub(crate) script: InputScript,
    pub(crate) save_path: Option<PathBuf>,
}

pub(crate) fn build_app(args: CliArgs) -> Result<AppWiring, BootstrapError> {
    info!("=== Rule Player Startup ===");

    let player_config = match &args.config_path {
        Some(path) => load_player_config(path)?,
        None => PlayerConfig::default(),
    };
    let mut script = InputScript::parse(player_config.presses.iter().map(String::as_str))?;
    script.extend(InputScript::parse(args.presses.iter().map(String::as_str))?);

    let overrides = ConfigOverrides {
        seed: args.seed.or(player_config.seed),
        physics: (player_config.physics != PhysicsConfig::default())
            .then_some(player_config.physics),
    };
    let game_config = GameConfig {
        physics: player_config.physics,
        seed: overrides.seed.unwrap_or(GameConfig::default().seed),
    };
    let game = load_any_game(&args.game_path, game_config, overrides)?;

    let loop_config = LoopConfig {
        target_tps: player_config.target_tps,
        max_ticks: args.ticks.or(player_config.max_ticks),
        realtime: args.realtime || player_config.realtime,
        ..LoopConfig::default()
    };

    let save_path = match &args.save {
        Some(requested) if requested.parent().is_some_and(|p| !p.as_os_str().is_empty()) => {
            Some(requested.clone())
        }
        Some(requested) => Some(resolve_app_paths()?.save_path(requested)),
        None => None,
    };

    info!(
        game = %game.info.name,
        levels = game.levels().len(),
        tick = game.tick(),
        presses = script.len(),
        save_path = ?save_path,
        "app_wired"
    );
    Ok(AppWiring {
        game,
        loop_config,
        script,
        save_path,
    })
}

fn load_any_game(
    path: &Path,
    config: GameConfig,
    overrides: ConfigOverrides,
) -> Result<Game, BootstrapError> {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("xml") => {
            let authored = load_game_xml(path)?;
            let built = build_game(&authored, config);
            for alert in &built.alerts {
                warn!(alert = %alert, "authoring_alert_skipped");
            }
            Ok(built.game)
        }
        Some("json") => {
            let game = load_game(path)?;
            info!(path = %path.display(), tick = game.tick(), "save_loaded");
            let ignored = ignored_overrides(&overrides, game.config());
            if !ignored.is_empty() {
                warn!(
                    path = %path.display(),
                    ignored = ?ignored,
                    "save_keeps_its_own_game_config"
                );
            }
            Ok(game)
        }
        _ => Err(BootstrapError::UnsupportedGameFile {
            path: path.to_path_buf(),
        }),
    }
}

/// Requested settings a restored save will not honour; a save carries its own
/// seed and physics.
pub(crate) fn ignored_overrides(
    overrides: &ConfigOverrides,
    restored: &GameConfig,
) -> Vec<&'static str> {
    let mut ignored = Vec::new();
    if overrides.seed.is_some_and(|seed| seed != restored.seed) {
        ignored.push("seed");
    }
    if overrides
        .physics
        .is_some_and(|physics| physics != restored.physics)
    {
        ignored.push("physics");
    }
    ignored
}

pub(crate) fn load_player_config(path: &Path) -> Result<PlayerConfig, BootstrapError> {
    let raw = fs::read_to_string(path).map_err(|source| BootstrapError::ReadConfig {
        path: path.to_path_buf(),
        source,
    })?;
    let mut deserializer = serde_json::Deserializer::from_str(&raw);
    serde_path_to_error::deserialize(&mut deserializer).map_err(|source| {
        BootstrapError::ParseConfig {
            path: path.to_path_buf(),
            source,
        }
    })
}

pub(crate) fn parse_args(args: &[String]) -> Result<CliCommand, BootstrapError> {
    if args.iter().any(|arg| arg == "-h" || arg == "--help") {
        return Ok(CliCommand::Help);
    }

    let mut parsed = CliArgs::default();
    let mut game_path = None;
    let mut index = 0usize;
    while index < args.len() {
        let flag = args[index].as_str();
        let value = move || flag_value(args, index, flag);
        match flag {
            "--ticks" => {
                let raw = value()?;
                parsed.ticks = Some(raw.parse::<u64>().map_err(|_| {
                    BootstrapError::Usage(format!("invalid --ticks value '{raw}' (expected u64)"))
                })?);
                index += 2;
            }
            "--seed" => {
                let raw = value()?;
                parsed.seed = Some(raw.parse::<u64>().map_err(|_| {
                    BootstrapError::Usage(format!("invalid --seed value '{raw}' (expected u64)"))
                })?);
                index += 2;
            }
            "--press" => {
                parsed.presses.push(value()?.clone());
                index += 2;
            }
            "--save" => {
                parsed.save = Some(PathBuf::from(value()?));
                index += 2;
            }
            "--config" => {
                parsed.config_path = Some(PathBuf::from(value()?));
                index += 2;
            }
            "--realtime" => {
                parsed.realtime = true;
                index += 1;
            }
            other if other.starts_with("--") => {
                return Err(BootstrapError::Usage(format!("unknown flag '{other}'")));
            }
            other => {
                if game_path.is_some() {
                    return Err(BootstrapError::Usage(format!(
                        "unexpected extra argument '{other}'"
                    )));
                }
                game_path = Some(PathBuf::from(other));
                index += 1;
            }
        }
    }

    parsed.game_path =
        game_path.ok_or_else(|| BootstrapError::Usage("missing game file".to_string()))?;
    Ok(CliCommand::Run(parsed))
}

fn flag_value<'a>(args: &'a [String], index: usize, flag: &str) -> Result<&'a String, BootstrapError> {
    args.get(index + 1)
        .ok_or_else(|| BootstrapError::Usage(format!("missing value for {flag}")))
}

pub(crate) fn usage_text() -> String {
    [
        "rule_player - headless runner for rule-driven games",
        "",
        "Usage:",
        "  rule_player <game.xml|save.json> [--ticks <u64>] [--press <KEY@TICK>]... [--seed <u64>]",
        "              [--save <path>] [--realtime] [--config <player.json>]",
        "",
        "A bare --save file name is placed under $RULEPLAY_ROOT/saves.",
        "Without --realtime a tick limit (--ticks or max_ticks in the config) is required.",
    ]
    .join("\n")
}

pub(crate) fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}

#[cfg(test)]
mod tests {
    use rule_engine::GameState;
    use tempfile::TempDir;

    use super::*;

    const DOORS: &str = r#"<Game name="Doors">
  <Level name="hall" width="320" height="240">
    <Actor id="1" name="door" static="true">
      <Rule>
        <Trigger name="KeyPressed"><Arg type="key">space</Arg></Trigger>
        <Action name="NextLevel"><Arg type="actor">1</Arg></Action>
      </Rule>
    </Actor>
  </Level>
</Game>"#;

    fn args(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|arg| arg.to_string()).collect()
    }

    #[test]
    fn parses_flags_in_any_order() {
        let command = parse_args(&args(&[
            "--ticks", "120", "game.xml", "--press", "SPACE@3", "--press", "LEFT@9", "--seed",
            "7", "--realtime",
        ]))
        .expect("parse");

        let CliCommand::Run(parsed) = command else {
            panic!("expected run command");
        };
        assert_eq!(parsed.game_path, PathBuf::from("game.xml"));
        assert_eq!(parsed.ticks, Some(120));
        assert_eq!(parsed.presses, vec!["SPACE@3", "LEFT@9"]);
        assert_eq!(parsed.seed, Some(7));
        assert!(parsed.realtime);
        assert_eq!(parsed.save, None);
    }

    #[test]
    fn rejects_bad_arguments() {
        assert!(matches!(parse_args(&args(&[])), Err(BootstrapError::Usage(_))));
        assert!(matches!(
            parse_args(&args(&["game.xml", "--ticks"])),
            Err(BootstrapError::Usage(_))
        ));
        assert!(matches!(
            parse_args(&args(&["game.xml", "--ticks", "soon"])),
            Err(BootstrapError::Usage(_))
        ));
        assert!(matches!(
            parse_args(&args(&["game.xml", "--fly"])),
            Err(BootstrapError::Usage(_))
        ));
        assert_eq!(parse_args(&args(&["--help"])).expect("help"), CliCommand::Help);
    }

    #[test]
    fn player_config_errors_name_the_failing_field() {
        let temp = TempDir::new().expect("temp");
        let path = temp.path().join("player.json");
        fs::write(&path, r#"{"physics": {"gravity": "heavy"}}"#).expect("write");

        let error = load_player_config(&path).expect_err("bad gravity");
        let message = error.to_string();
        assert!(message.contains("physics.gravity"), "{message}");
    }

    #[test]
    fn player_config_fills_defaults() {
        let temp = TempDir::new().expect("temp");
        let path = temp.path().join("player.json");
        fs::write(&path, r#"{"max_ticks": 30, "presses": ["SPACE@2"]}"#).expect("write");

        let config = load_player_config(&path).expect("config");
        assert_eq!(config.max_ticks, Some(30));
        assert_eq!(config.target_tps, 60);
        assert_eq!(config.physics, PhysicsConfig::default());
    }

    #[test]
    fn builds_app_from_xml_with_config_and_flag_overrides() {
        let temp = TempDir::new().expect("temp");
        let game_path = temp.path().join("doors.xml");
        fs::write(&game_path, DOORS).expect("write game");
        let config_path = temp.path().join("player.json");
        fs::write(&config_path, r#"{"max_ticks": 30, "seed": 3, "presses": ["SPACE@5"]}"#)
            .expect("write config");
        let save_path = temp.path().join("out").join("slot.json");

        let app = build_app(CliArgs {
            game_path,
            config_path: Some(config_path),
            ticks: Some(8),
            presses: vec!["SPACE@6".to_string()],
            seed: None,
            save: Some(save_path.clone()),
            realtime: false,
        })
        .expect("wire");

        assert_eq!(app.loop_config.max_ticks, Some(8));
        assert_eq!(app.game.config().seed, 3);
        assert_eq!(app.game.state(), GameState::Stopped);
        assert_eq!(app.script.len(), 2);
        assert_eq!(app.save_path, Some(save_path));
    }

    #[test]
    fn loading_a_save_reports_overrides_it_cannot_apply() {
        let temp = TempDir::new().expect("temp");
        let xml_path = temp.path().join("doors.xml");
        fs::write(&xml_path, DOORS).expect("write game");
        let authored = load_game_xml(&xml_path).expect("load xml");
        let game = build_game(
            &authored,
            GameConfig {
                seed: 11,
                ..GameConfig::default()
            },
        )
        .game;
        let save_path = temp.path().join("slot.json");
        rule_engine::save_game(&game, &save_path).expect("save");

        let wiring = build_app(CliArgs {
            game_path: save_path,
            seed: Some(99),
            ticks: Some(1),
            ..CliArgs::default()
        })
        .expect("wire from save");
        assert_eq!(wiring.game.config().seed, 11);

        let restored = *wiring.game.config();
        let requested = ConfigOverrides {
            seed: Some(99),
            physics: Some(PhysicsConfig {
                gravity: 2.0,
                ..PhysicsConfig::default()
            }),
        };
        assert_eq!(ignored_overrides(&requested, &restored), vec!["seed", "physics"]);
        let matching = ConfigOverrides {
            seed: Some(11),
            physics: None,
        };
        assert!(ignored_overrides(&matching, &restored).is_empty());
        assert!(ignored_overrides(&ConfigOverrides::default(), &restored).is_empty());
    }

    #[test]
    fn unsupported_game_extension_is_rejected() {
        let result = build_app(CliArgs {
            game_path: PathBuf::from("game.toml"),
            ..CliArgs::default()
        });
        assert!(matches!(
            result,
            Err(BootstrapError::UnsupportedGameFile { .. })
        ));
    }
}
