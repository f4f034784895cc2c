use std::collections::BTreeMap;

use thiserror::Error;

use crate::model::KeyCode;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InputScriptError {
    #[error("key press '{entry}' must look like KEY@TICK")]
    MissingSeparator { entry: String },
    #[error("key press '{entry}' has an empty key")]
    EmptyKey { entry: String },
    #[error("key press '{entry}' has an invalid tick: {reason}")]
    InvalidTick { entry: String, reason: String },
}

/// Key presses to feed a headless run, keyed by the tick they land on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputScript {
    presses: BTreeMap<u64, Vec<KeyCode>>,
}

impl InputScript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses entries such as `SPACE@12`. Ticks start at 1.
    pub fn parse<'a>(entries: impl IntoIterator<Item = &'a str>) -> Result<Self, InputScriptError> {
        let mut script = Self::new();
        for entry in entries {
            let (key, tick) = parse_entry(entry)?;
            script.push(tick, key);
        }
        Ok(script)
    }

    pub fn push(&mut self, tick: u64, key: KeyCode) {
        self.presses.entry(tick).or_default().push(key);
    }

    pub fn extend(&mut self, other: InputScript) {
        for (tick, keys) in other.presses {
            self.presses.entry(tick).or_default().extend(keys);
        }
    }

    pub fn presses_at(&self, tick: u64) -> &[KeyCode] {
        self.presses.get(&tick).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn last_tick(&self) -> Option<u64> {
        self.presses.keys().next_back().copied()
    }

    pub fn len(&self) -> usize {
        self.presses.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.presses.is_empty()
    }
}

fn parse_entry(entry: &str) -> Result<(KeyCode, u64), InputScriptError> {
    let Some((key, tick)) = entry.rsplit_once('@') else {
        return Err(InputScriptError::MissingSeparator {
            entry: entry.to_string(),
        });
    };
    if key.trim().is_empty() {
        return Err(InputScriptError::EmptyKey {
            entry: entry.to_string(),
        });
    }
    let tick = tick
        .trim()
        .parse::<u64>()
        .map_err(|error| InputScriptError::InvalidTick {
            entry: entry.to_string(),
            reason: error.to_string(),
        })?;
    if tick == 0 {
        return Err(InputScriptError::InvalidTick {
            entry: entry.to_string(),
            reason: "ticks start at 1".to_string(),
        });
    }
    Ok((KeyCode::new(key), tick))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_groups_presses_by_tick() {
        let script = InputScript::parse(["space@3", "LEFT@1", "Right@3"]).expect("parse");

        assert_eq!(script.len(), 3);
        assert_eq!(script.presses_at(1), &[KeyCode::new("LEFT")]);
        assert_eq!(
            script.presses_at(3),
            &[KeyCode::new("SPACE"), KeyCode::new("RIGHT")]
        );
        assert!(script.presses_at(2).is_empty());
        assert_eq!(script.last_tick(), Some(3));
    }

    #[test]
    fn rejects_malformed_entries() {
        assert!(matches!(
            InputScript::parse(["SPACE"]),
            Err(InputScriptError::MissingSeparator { .. })
        ));
        assert!(matches!(
            InputScript::parse([" @4"]),
            Err(InputScriptError::EmptyKey { .. })
        ));
        assert!(matches!(
            InputScript::parse(["SPACE@soon"]),
            Err(InputScriptError::InvalidTick { .. })
        ));
        assert!(matches!(
            InputScript::parse(["SPACE@0"]),
            Err(InputScriptError::InvalidTick { .. })
        ));
    }
}
