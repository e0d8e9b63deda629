//! Navigation plans: pure data describing the input for one target song.

use crate::catalog::Song;
use crate::text::GroupKey;
use serde::Serialize;
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "key", rename_all = "kebab-case")]
pub enum InputAction {
    /// Letter shortcut; jumps the cursor to the first entry of that block.
    PressLetter(char),
    QuickJumpNonlatin,
    QuickJumpSymbol,
    MoveUp,
    MoveDown,
    Confirm,
}

impl fmt::Display for InputAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputAction::PressLetter(c) => write!(f, "press-letter({})", c),
            InputAction::QuickJumpNonlatin => write!(f, "quick-jump-nonlatin"),
            InputAction::QuickJumpSymbol => write!(f, "quick-jump-symbol"),
            InputAction::MoveUp => write!(f, "move-up"),
            InputAction::MoveDown => write!(f, "move-down"),
            InputAction::Confirm => write!(f, "confirm"),
        }
    }
}

/// One action, pressed `repeat` times with `delay_after` following each press.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InputStep {
    pub action: InputAction,
    pub repeat: u32,
    #[serde(rename = "delayAfterMs", with = "crate::millis")]
    pub delay_after: Duration,
}

impl InputStep {
    pub fn new(action: InputAction, delay_after: Duration) -> Self {
        Self::repeated(action, 1, delay_after)
    }

    pub fn repeated(action: InputAction, repeat: u32, delay_after: Duration) -> Self {
        Self {
            action,
            repeat: repeat.max(1),
            delay_after,
        }
    }

    pub fn total_delay(&self) -> Duration {
        self.delay_after.saturating_mul(self.repeat)
    }
}

impl fmt::Display for InputStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.repeat > 1 {
            write!(f, "{}x{}", self.action, self.repeat)
        } else {
            write!(f, "{}", self.action)
        }
    }
}

/// Diagnostics attached to a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanTrace {
    /// Group whose shortcut the plan enters through.
    pub entry: GroupKey,
    /// Signed distance walked from the entry point; positive is downward.
    pub offset: i64,
    pub total_keys: u32,
    #[serde(rename = "totalDelayMs", with = "crate::millis")]
    pub total_delay: Duration,
}

impl fmt::Display for PlanTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "entry={} offset={:+} keys={} delay={}ms",
            self.entry,
            self.offset,
            self.total_keys,
            self.total_delay.as_millis()
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationPlan {
    pub song: Song,
    pub steps: Vec<InputStep>,
    pub trace: PlanTrace,
}

impl NavigationPlan {
    /// Assemble a plan and derive its trace from the steps.
    pub fn new(song: Song, steps: Vec<InputStep>, entry: GroupKey, offset: i64) -> Self {
        let trace = PlanTrace {
            entry,
            offset,
            total_keys: steps.iter().fold(0u32, |n, s| n.saturating_add(s.repeat)),
            total_delay: steps
                .iter()
                .fold(Duration::ZERO, |d, s| d.saturating_add(s.total_delay())),
        };
        Self { song, steps, trace }
    }

    pub fn total_key_presses(&self) -> u32 {
        self.trace.total_keys
    }

    pub fn total_delay(&self) -> Duration {
        self.trace.total_delay
    }

    /// Steps expanded into single presses, in execution order.
    pub fn key_sequence(&self) -> impl Iterator<Item = (usize, InputStep)> + '_ {
        self.steps
            .iter()
            .enumerate()
            .flat_map(|(index, step)| (0..step.repeat).map(move |_| (index, *step)))
    }
}

impl fmt::Display for NavigationPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let steps: Vec<String> = self.steps.iter().map(ToString::to_string).collect();
        write!(f, "{} -> [{}]", self.song.title, steps.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn song() -> Song {
        Song {
            id: None,
            title: "Binary Star".into(),
            normalized_title: "binarystar".into(),
            group_key: GroupKey::Letter('b'),
            sequence_index: 2,
            position: 3,
        }
    }

    #[test]
    fn test_trace_totals() {
        let plan = NavigationPlan::new(
            song(),
            vec![
                InputStep::new(InputAction::PressLetter('b'), Duration::from_millis(150)),
                InputStep::repeated(InputAction::MoveDown, 2, Duration::from_millis(50)),
            ],
            GroupKey::Letter('b'),
            2,
        );
        assert_eq!(plan.total_key_presses(), 3);
        assert_eq!(plan.total_delay(), Duration::from_millis(250));
        assert_eq!(plan.trace.to_string(), "entry=b offset=+2 keys=3 delay=250ms");
        assert_eq!(plan.to_string(), "Binary Star -> [press-letter(b), move-downx2]");
    }

    #[test]
    fn test_totals_saturate_instead_of_overflowing() {
        let step = InputStep::repeated(InputAction::MoveDown, u32::MAX, Duration::MAX);
        assert_eq!(step.total_delay(), Duration::MAX);

        let plan = NavigationPlan::new(song(), vec![step, step], GroupKey::Letter('b'), 2);
        assert_eq!(plan.total_delay(), Duration::MAX);
        assert_eq!(plan.total_key_presses(), u32::MAX);
    }

    #[test]
    fn test_key_sequence_expands_repeats() {
        let plan = NavigationPlan::new(
            song(),
            vec![
                InputStep::new(InputAction::PressLetter('b'), Duration::ZERO),
                InputStep::repeated(InputAction::MoveDown, 2, Duration::ZERO),
            ],
            GroupKey::Letter('b'),
            2,
        );
        let indexes: Vec<usize> = plan.key_sequence().map(|(i, _)| i).collect();
        assert_eq!(indexes, vec![0, 1, 1]);
    }

    #[test]
    fn test_repeat_is_at_least_one() {
        let step = InputStep::repeated(InputAction::MoveUp, 0, Duration::ZERO);
        assert_eq!(step.repeat, 1);
    }

    #[test]
    fn test_step_serialization() {
        let step = InputStep::new(InputAction::PressLetter('b'), Duration::from_millis(120));
        let json = serde_json::to_value(step).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "action": {"kind": "press-letter", "key": "b"},
                "repeat": 1,
                "delayAfterMs": 120
            })
        );
        let json = serde_json::to_value(InputStep::new(InputAction::Confirm, Duration::ZERO)).unwrap();
        assert_eq!(json["action"], serde_json::json!({"kind": "confirm"}));
    }
}
