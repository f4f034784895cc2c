use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use roxmltree::{Document, Node};

use crate::model::{ActorId, ArgType, AttributeKind, BehaviorArg, BehaviorSpec};
use crate::sim::{BoundarySide, GameInfo, LevelInfo};

use super::authored::{AuthoredActor, AuthoredAttribute, AuthoredGame, AuthoredLevel, AuthoredRule};
use super::factory::key_arg;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XmlErrorCode {
    ReadFile,
    XmlMalformed,
    InvalidRoot,
    UnknownElement,
    UnknownAttribute,
    MissingField,
    InvalidValue,
}

#[derive(Debug, Clone)]
pub struct XmlCompileError {
    pub code: XmlErrorCode,
    pub message: String,
    pub file_path: Option<PathBuf>,
    pub location: Option<SourceLocation>,
}

impl fmt::Display for XmlCompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.code, self.message)?;
        match (&self.file_path, self.location) {
            (Some(path), Some(loc)) => write!(
                f,
                " (file={}, line={}, column={})",
                path.display(),
                loc.line,
                loc.column
            ),
            (Some(path), None) => write!(f, " (file={})", path.display()),
            (None, Some(loc)) => write!(f, " (line={}, column={})", loc.line, loc.column),
            (None, None) => Ok(()),
        }
    }
}

impl std::error::Error for XmlCompileError {}

const GAME_ATTRS: &[&str] = &["name", "description"];
const LEVEL_ATTRS: &[&str] = &[
    "name",
    "width",
    "height",
    "background",
    "hud",
    "scrolling",
    "termination",
    "win",
    "lose",
];
const ACTOR_ATTRS: &[&str] = &[
    "id", "name", "sprite", "x", "y", "vx", "vy", "width", "height", "static",
];
const ATTRIBUTE_ATTRS: &[&str] = &["kind", "value", "min", "max"];

pub fn load_game_xml(path: &Path) -> Result<AuthoredGame, XmlCompileError> {
    let raw = fs::read_to_string(path).map_err(|source| XmlCompileError {
        code: XmlErrorCode::ReadFile,
        message: format!("failed to read XML file: {source}"),
        file_path: Some(path.to_path_buf()),
        location: None,
    })?;
    compile_game_xml(&raw).map_err(|mut error| {
        error.file_path = Some(path.to_path_buf());
        error
    })
}

pub fn compile_game_xml(raw: &str) -> Result<AuthoredGame, XmlCompileError> {
    let doc = Document::parse(raw).map_err(|error| XmlCompileError {
        code: XmlErrorCode::XmlMalformed,
        message: format!("malformed XML: {error}"),
        file_path: None,
        location: Some(SourceLocation {
            line: error.pos().row as usize,
            column: error.pos().col as usize,
        }),
    })?;

    let root = doc.root_element();
    if root.tag_name().name() != "Game" {
        return Err(error_at_node(
            XmlErrorCode::InvalidRoot,
            "root element must be <Game>".to_string(),
            &doc,
            root,
        ));
    }
    check_attributes(&doc, root, GAME_ATTRS)?;

    let mut game = AuthoredGame {
        info: GameInfo {
            name: optional_text_attr(root, "name"),
            description: optional_text_attr(root, "description"),
        },
        levels: Vec::new(),
    };
    for child in elements(root) {
        match child.tag_name().name() {
            "Level" => game.levels.push(parse_level(&doc, child)?),
            other => {
                return Err(error_at_node(
                    XmlErrorCode::UnknownElement,
                    format!("unsupported element <{other}> in <Game>; expected <Level>"),
                    &doc,
                    child,
                ))
            }
        }
    }
    Ok(game)
}

fn parse_level(doc: &Document<'_>, node: Node<'_, '_>) -> Result<AuthoredLevel, XmlCompileError> {
    check_attributes(doc, node, LEVEL_ATTRS)?;
    let info = LevelInfo {
        name: required_attr(doc, node, "name")?.to_string(),
        width: number_attr(doc, node, "width", 0.0)?,
        height: number_attr(doc, node, "height", 0.0)?,
        background: optional_text_attr(node, "background"),
        hud_options: node
            .attribute("hud")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|item| !item.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default(),
        scrolling_direction: optional_text_attr(node, "scrolling"),
        termination: optional_text_attr(node, "termination"),
        winning_condition: optional_text_attr(node, "win"),
        losing_condition: optional_text_attr(node, "lose"),
    };
    if info.width < 0.0 || info.height < 0.0 {
        return Err(error_at_node(
            XmlErrorCode::InvalidValue,
            "level width and height must be >= 0".to_string(),
            doc,
            node,
        ));
    }

    let mut level = AuthoredLevel {
        info,
        ..AuthoredLevel::default()
    };
    for child in elements(node) {
        match child.tag_name().name() {
            "Actor" => level.actors.push(parse_actor(doc, child)?),
            "Template" => level.templates.push(parse_actor(doc, child)?),
            "GarbageCollector" => {
                check_attributes(doc, child, &["side"])?;
                let raw = required_attr(doc, child, "side")?;
                let side = BoundarySide::parse(raw).ok_or_else(|| {
                    error_at_node(
                        XmlErrorCode::InvalidValue,
                        format!("invalid side '{raw}'; allowed values: left, right, top, bottom"),
                        doc,
                        child,
                    )
                })?;
                if !level.garbage_collectors.contains(&side) {
                    level.garbage_collectors.push(side);
                }
            }
            other => {
                return Err(error_at_node(
                    XmlErrorCode::UnknownElement,
                    format!(
                        "unsupported element <{other}> in <Level>; expected <Actor>, <Template> or <GarbageCollector>"
                    ),
                    doc,
                    child,
                ))
            }
        }
    }
    Ok(level)
}

fn parse_actor(doc: &Document<'_>, node: Node<'_, '_>) -> Result<AuthoredActor, XmlCompileError> {
    check_attributes(doc, node, ACTOR_ATTRS)?;
    let raw_id = required_attr(doc, node, "id")?;
    let id = raw_id.parse::<u64>().map_err(|_| {
        error_at_node(
            XmlErrorCode::InvalidValue,
            format!("actor id '{raw_id}' is not a non-negative integer"),
            doc,
            node,
        )
    })?;
    let defaults = AuthoredActor::default();
    let mut actor = AuthoredActor {
        id: ActorId(id),
        name: optional_text_attr(node, "name"),
        sprite: optional_text_attr(node, "sprite"),
        x: number_attr(doc, node, "x", 0.0)?,
        y: number_attr(doc, node, "y", 0.0)?,
        vx: number_attr(doc, node, "vx", 0.0)?,
        vy: number_attr(doc, node, "vy", 0.0)?,
        width: number_attr(doc, node, "width", defaults.width)?,
        height: number_attr(doc, node, "height", defaults.height)?,
        is_static: bool_attr(doc, node, "static")?,
        ..defaults
    };

    for child in elements(node) {
        match child.tag_name().name() {
            "Attribute" => actor.attributes.push(parse_attribute(doc, child)?),
            "Rule" => {
                check_attributes(doc, child, &["category"])?;
                let rule = parse_rule(doc, child)?;
                match child.attribute("category").map(str::trim) {
                    Some(category) if !category.is_empty() => actor
                        .rules
                        .entry(category.to_string())
                        .or_default()
                        .push(rule),
                    _ => actor.push_rule(rule),
                }
            }
            other => {
                return Err(error_at_node(
                    XmlErrorCode::UnknownElement,
                    format!("unsupported element <{other}> in <{}>", node.tag_name().name()),
                    doc,
                    child,
                ))
            }
        }
    }
    Ok(actor)
}

fn parse_attribute(
    doc: &Document<'_>,
    node: Node<'_, '_>,
) -> Result<AuthoredAttribute, XmlCompileError> {
    check_attributes(doc, node, ATTRIBUTE_ATTRS)?;
    let raw_kind = required_attr(doc, node, "kind")?;
    let kind = raw_kind.parse::<AttributeKind>().map_err(|error| {
        error_at_node(XmlErrorCode::InvalidValue, error.to_string(), doc, node)
    })?;
    Ok(AuthoredAttribute {
        kind,
        value: int_attr(doc, node, "value", 0)?,
        min: int_attr(doc, node, "min", i32::MIN)?,
        max: int_attr(doc, node, "max", i32::MAX)?,
    })
}

fn parse_rule(doc: &Document<'_>, node: Node<'_, '_>) -> Result<AuthoredRule, XmlCompileError> {
    let mut trigger = None;
    let mut action = None;
    for child in elements(node) {
        let slot = match child.tag_name().name() {
            "Trigger" => &mut trigger,
            "Action" => &mut action,
            other => {
                return Err(error_at_node(
                    XmlErrorCode::UnknownElement,
                    format!("unsupported element <{other}> in <Rule>; expected <Trigger> and <Action>"),
                    doc,
                    child,
                ))
            }
        };
        if slot.is_some() {
            return Err(error_at_node(
                XmlErrorCode::InvalidValue,
                format!("<Rule> has more than one <{}>", child.tag_name().name()),
                doc,
                child,
            ));
        }
        *slot = Some(parse_behavior(doc, child)?);
    }

    match (trigger, action) {
        (Some(trigger), Some(action)) => Ok(AuthoredRule { trigger, action }),
        (None, _) => Err(error_at_node(
            XmlErrorCode::MissingField,
            "<Rule> is missing its <Trigger>".to_string(),
            doc,
            node,
        )),
        (_, None) => Err(error_at_node(
            XmlErrorCode::MissingField,
            "<Rule> is missing its <Action>".to_string(),
            doc,
            node,
        )),
    }
}

fn parse_behavior(doc: &Document<'_>, node: Node<'_, '_>) -> Result<BehaviorSpec, XmlCompileError> {
    check_attributes(doc, node, &["name"])?;
    let name = required_attr(doc, node, "name")?.to_string();
    let mut args = Vec::new();
    for child in elements(node) {
        if child.tag_name().name() != "Arg" {
            return Err(error_at_node(
                XmlErrorCode::UnknownElement,
                format!(
                    "unsupported element <{}> in <{}>; expected <Arg>",
                    child.tag_name().name(),
                    node.tag_name().name()
                ),
                doc,
                child,
            ));
        }
        args.push(parse_arg(doc, child)?);
    }
    Ok(BehaviorSpec { name, args })
}

fn parse_arg(doc: &Document<'_>, node: Node<'_, '_>) -> Result<BehaviorArg, XmlCompileError> {
    check_attributes(doc, node, &["type"])?;
    let raw_type = required_attr(doc, node, "type")?;
    let arg_type = ArgType::from_token(raw_type).ok_or_else(|| {
        error_at_node(
            XmlErrorCode::InvalidValue,
            format!(
                "invalid argument type '{raw_type}'; allowed values: actor, attribute, int, number, text, key"
            ),
            doc,
            node,
        )
    })?;
    let text = node.text().map(str::trim).unwrap_or_default();
    let invalid = || {
        error_at_node(
            XmlErrorCode::InvalidValue,
            format!("'{text}' is not a valid {arg_type} argument"),
            doc,
            node,
        )
    };
    let arg = match arg_type {
        ArgType::Actor => BehaviorArg::Actor(ActorId(text.parse::<u64>().map_err(|_| invalid())?)),
        ArgType::Attribute => {
            BehaviorArg::Attribute(text.parse::<AttributeKind>().map_err(|_| invalid())?)
        }
        ArgType::Int => BehaviorArg::Int(text.parse::<i32>().map_err(|_| invalid())?),
        ArgType::Number => {
            let value = text.parse::<f64>().map_err(|_| invalid())?;
            if !value.is_finite() {
                return Err(invalid());
            }
            BehaviorArg::Number(value)
        }
        ArgType::Text => BehaviorArg::Text(text.to_string()),
        ArgType::Key => {
            if text.is_empty() {
                return Err(invalid());
            }
            key_arg(text)
        }
    };
    Ok(arg)
}

fn elements<'a, 'input>(node: Node<'a, 'input>) -> impl Iterator<Item = Node<'a, 'input>> {
    node.children().filter(|child| child.is_element())
}

fn check_attributes(
    doc: &Document<'_>,
    node: Node<'_, '_>,
    allowed: &[&str],
) -> Result<(), XmlCompileError> {
    for attribute in node.attributes() {
        if !allowed.contains(&attribute.name()) {
            return Err(error_at_node(
                XmlErrorCode::UnknownAttribute,
                format!(
                    "unknown attribute '{}' on <{}>",
                    attribute.name(),
                    node.tag_name().name()
                ),
                doc,
                node,
            ));
        }
    }
    Ok(())
}

fn required_attr<'a>(
    doc: &Document<'_>,
    node: Node<'a, '_>,
    name: &str,
) -> Result<&'a str, XmlCompileError> {
    match node.attribute(name).map(str::trim) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(error_at_node(
            XmlErrorCode::MissingField,
            format!(
                "missing required attribute '{name}' on <{}>",
                node.tag_name().name()
            ),
            doc,
            node,
        )),
    }
}

fn optional_text_attr(node: Node<'_, '_>, name: &str) -> String {
    node.attribute(name)
        .map(str::trim)
        .unwrap_or_default()
        .to_string()
}

fn number_attr(
    doc: &Document<'_>,
    node: Node<'_, '_>,
    name: &str,
    default: f64,
) -> Result<f64, XmlCompileError> {
    let Some(raw) = node.attribute(name) else {
        return Ok(default);
    };
    match raw.trim().parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(error_at_node(
            XmlErrorCode::InvalidValue,
            format!("attribute '{name}' value '{raw}' is not a valid number"),
            doc,
            node,
        )),
    }
}

fn int_attr(
    doc: &Document<'_>,
    node: Node<'_, '_>,
    name: &str,
    default: i32,
) -> Result<i32, XmlCompileError> {
    let Some(raw) = node.attribute(name) else {
        return Ok(default);
    };
    raw.trim().parse::<i32>().map_err(|_| {
        error_at_node(
            XmlErrorCode::InvalidValue,
            format!("attribute '{name}' value '{raw}' is not a valid integer"),
            doc,
            node,
        )
    })
}

fn bool_attr(doc: &Document<'_>, node: Node<'_, '_>, name: &str) -> Result<bool, XmlCompileError> {
    match node.attribute(name).map(str::trim) {
        None => Ok(false),
        Some("true") => Ok(true),
        Some("false") => Ok(false),
        Some(raw) => Err(error_at_node(
            XmlErrorCode::InvalidValue,
            format!("attribute '{name}' value '{raw}' must be true or false"),
            doc,
            node,
        )),
    }
}

fn error_at_node(
    code: XmlErrorCode,
    message: String,
    doc: &Document<'_>,
    node: Node<'_, '_>,
) -> XmlCompileError {
    let pos = doc.text_pos_at(node.range().start);
    XmlCompileError {
        code,
        message,
        file_path: None,
        location: Some(SourceLocation {
            line: pos.row as usize,
            column: pos.col as usize,
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;
    use crate::content::build_game;
    use crate::model::{Action, KeyCode, Trigger};
    use crate::sim::GameConfig;

    const PLATFORMER: &str = r#"<Game name="Hopper" description="jump around">
  <Level name="meadow" width="640" height="480" hud="Health, Points" scrolling="right" win="reach flag">
    <Actor id="1" name="hero" sprite="hero.png" x="10" y="20" vx="1.5">
      <Attribute kind="Health" value="3" min="0" max="5"/>
      <Rule category="Key:SPACE">
        <Trigger name="KeyPressed"><Arg type="key">space</Arg></Trigger>
        <Action name="Jump"><Arg type="actor">1</Arg></Action>
      </Rule>
      <Rule>
        <Trigger name="HealthReached"><Arg type="actor">1</Arg><Arg type="int">0</Arg></Trigger>
        <Action name="Destroy"><Arg type="actor">1</Arg></Action>
      </Rule>
    </Actor>
    <Actor id="2" name="floor" y="460" width="640" height="20" static="true"/>
    <Template id="3" name="coin"/>
    <GarbageCollector side="bottom"/>
  </Level>
</Game>"#;

    #[test]
    fn valid_document_compiles_and_builds() {
        let authored = compile_game_xml(PLATFORMER).expect("compile");
        assert_eq!(authored.info.name, "Hopper");
        let level = &authored.levels[0];
        assert_eq!(level.info.hud_options, vec!["Health", "Points"]);
        assert_eq!(level.info.winning_condition, "reach flag");
        assert_eq!(level.actors.len(), 2);
        assert_eq!(level.templates.len(), 1);
        assert_eq!(level.garbage_collectors, vec![BoundarySide::Bottom]);

        let hero = &level.actors[0];
        assert_eq!(hero.vx, 1.5);
        assert_eq!(hero.width, 32.0);
        assert!(hero.rules.contains_key("AttributeReached:Health"));
        assert!(level.actors[1].is_static);

        let built = build_game(&authored, GameConfig::default());
        assert!(built.alerts.is_empty());
        let hero = built.game.levels()[0].actor(ActorId(1)).expect("hero");
        let space = hero.rules_for(&Trigger::key("space").category());
        assert_eq!(space.len(), 1);
        assert_eq!(space[0].action(), &Action::Jump { target: ActorId(1) });
        assert_eq!(
            space[0].trigger(),
            &Trigger::KeyPressed {
                key: KeyCode::new("SPACE")
            }
        );
    }

    #[test]
    fn top_actor_id_becomes_an_alert_instead_of_a_crash() {
        let authored = compile_game_xml(
            r#"<Game><Level name="edge" width="100" height="100"><Actor id="18446744073709551615" name="edge"/><GarbageCollector side="left"/></Level></Game>"#,
        )
        .expect("compile");

        let built = build_game(&authored, GameConfig::default());
        assert_eq!(built.alerts.len(), 1);
        assert_eq!(built.alerts[0].actor, Some(ActorId(u64::MAX)));
        let level = &built.game.levels()[0];
        assert!(level.actor(ActorId(u64::MAX)).is_none());
        assert_eq!(level.garbage_collector_sides(), vec![BoundarySide::Left]);
    }

    #[test]
    fn unknown_element_reports_location() {
        let err = compile_game_xml("<Game>\n  <Level name=\"a\">\n    <Teleporter/>\n  </Level>\n</Game>")
            .expect_err("error");
        assert_eq!(err.code, XmlErrorCode::UnknownElement);
        assert_eq!(err.location, Some(SourceLocation { line: 3, column: 5 }));
    }

    #[test]
    fn malformed_xml_reports_location() {
        let err = compile_game_xml("<Game><Level name=\"a\"></Game>").expect_err("error");
        assert_eq!(err.code, XmlErrorCode::XmlMalformed);
        assert!(err.location.is_some());
    }

    #[test]
    fn wrong_root_and_missing_fields_error() {
        let err = compile_game_xml("<Defs/>").expect_err("root");
        assert_eq!(err.code, XmlErrorCode::InvalidRoot);

        let err = compile_game_xml(r#"<Game><Level name="a"><Actor name="x"/></Level></Game>"#)
            .expect_err("missing id");
        assert_eq!(err.code, XmlErrorCode::MissingField);

        let err = compile_game_xml(
            r#"<Game><Level name="a"><Actor id="1"><Rule><Trigger name="Collision"/></Rule></Actor></Level></Game>"#,
        )
        .expect_err("missing action");
        assert_eq!(err.code, XmlErrorCode::MissingField);
        assert!(err.message.contains("<Action>"));
    }

    #[test]
    fn invalid_values_error() {
        let err = compile_game_xml(r#"<Game><Level name="a" width="wide"/></Game>"#)
            .expect_err("width");
        assert_eq!(err.code, XmlErrorCode::InvalidValue);

        let err = compile_game_xml(
            r#"<Game><Level name="a"><Actor id="1"><Rule><Trigger name="KeyPressed"><Arg type="vector">1</Arg></Trigger><Action name="Jump"/></Rule></Actor></Level></Game>"#,
        )
        .expect_err("arg type");
        assert_eq!(err.code, XmlErrorCode::InvalidValue);

        let err = compile_game_xml(r#"<Game><Level name="a" colour="red"/></Game>"#)
            .expect_err("attribute");
        assert_eq!(err.code, XmlErrorCode::UnknownAttribute);
    }

    #[test]
    fn load_reports_file_path() {
        let temp = TempDir::new().expect("temp");
        let path = temp.path().join("game.xml");
        let err = load_game_xml(&path).expect_err("missing");
        assert_eq!(err.code, XmlErrorCode::ReadFile);

        fs::write(&path, "<Game><Level/></Game>").expect("write");
        let err = load_game_xml(&path).expect_err("level name");
        assert_eq!(err.file_path.as_deref(), Some(path.as_path()));
        assert!(err.to_string().contains("game.xml"));

        fs::write(&path, PLATFORMER).expect("write");
        assert_eq!(load_game_xml(&path).expect("load").levels.len(), 1);
    }
}
