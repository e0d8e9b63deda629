//! Navigation Planner
//!
//! Computes the input plan for one target song from catalog data alone. The
//! game's cursor is never observed, so a plan is only correct because every
//! entry step lands on a known song: the first entry of a shortcut block.
//!
//! Default walk:
//! - Latin target: `press-letter(L)`, then `move-down` x `sequence_index`
//! - non-Latin / symbol target: `press-letter('a')` to enter alphabetic
//!   mode, the matching quick-jump key, then `move-down` x `sequence_index`
//! - optional `confirm`
//!
//! With `shortest_path` enabled, Latin targets may enter through a
//! neighbouring letter block and walk up instead; see [`NavigationPlanner::plan`].

use crate::catalog::{Song, SongCatalog};
use crate::error::NavError;
use crate::plan::{InputAction, InputStep, NavigationPlan};
use crate::query::NavigationQuery;
use crate::text::GroupKey;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannerConfig {
    /// Append a `confirm` step at the end of every plan.
    pub press_confirm: bool,
    /// Allow entering through the nearest letter block (Latin targets only).
    pub shortest_path: bool,
    /// Letter pressed to enter alphabetic mode before a quick-jump key.
    pub alpha_mode_letter: char,
    /// Pause after a letter or quick-jump key.
    pub entry_delay: Duration,
    /// Pause after each arrow key.
    pub move_delay: Duration,
    /// Pause after the confirm key.
    pub confirm_delay: Duration,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            press_confirm: false,
            shortest_path: false,
            alpha_mode_letter: 'a',
            entry_delay: Duration::from_millis(150),
            move_delay: Duration::from_millis(50),
            confirm_delay: Duration::from_millis(80),
        }
    }
}

pub struct NavigationPlanner {
    catalog: Arc<SongCatalog>,
    config: PlannerConfig,
}

impl NavigationPlanner {
    pub fn new(catalog: Arc<SongCatalog>, config: PlannerConfig) -> Self {
        Self { catalog, config }
    }

    pub fn catalog(&self) -> &SongCatalog {
        &self.catalog
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Resolve `query` and plan the route to it.
    pub fn compute_plan(&self, query: &NavigationQuery) -> Result<NavigationPlan, NavError> {
        let song = self.catalog.resolve(query)?;
        let plan = self.plan(song);
        debug!("Planned {} for {}: {}", plan.trace, query, plan);
        Ok(plan)
    }

    /// Build the plan for an already-resolved song. Pure; never fails.
    ///
    /// Shortest-path entry (Latin targets, list-ordered catalogs only): every
    /// non-empty letter block's first song is a candidate anchor. The anchor
    /// with the smallest `|target.position - anchor.position|` wins; ties go to
    /// the anchor above the target (a downward walk), then to the target's own
    /// letter, then alphabetically.
    pub fn plan(&self, song: &Song) -> NavigationPlan {
        let cfg = &self.config;
        let mut steps = Vec::new();

        let (entry, offset) = match song.group_key {
            GroupKey::Letter(letter) => {
                let (anchor, offset) = if cfg.shortest_path {
                    self.nearest_anchor(song)
                        .unwrap_or((letter, song.sequence_index as i64))
                } else {
                    (letter, song.sequence_index as i64)
                };
                steps.push(InputStep::new(
                    InputAction::PressLetter(anchor),
                    cfg.entry_delay,
                ));
                (GroupKey::Letter(anchor), offset)
            }
            overflow => {
                let jump = if overflow == GroupKey::NonLatin {
                    InputAction::QuickJumpNonlatin
                } else {
                    InputAction::QuickJumpSymbol
                };
                steps.push(InputStep::new(
                    InputAction::PressLetter(cfg.alpha_mode_letter),
                    cfg.entry_delay,
                ));
                steps.push(InputStep::new(jump, cfg.entry_delay));
                (overflow, song.sequence_index as i64)
            }
        };

        if offset != 0 {
            let action = if offset > 0 {
                InputAction::MoveDown
            } else {
                InputAction::MoveUp
            };
            let repeat = u32::try_from(offset.unsigned_abs()).unwrap_or(u32::MAX);
            steps.push(InputStep::repeated(action, repeat, cfg.move_delay));
        }

        if cfg.press_confirm {
            steps.push(InputStep::new(InputAction::Confirm, cfg.confirm_delay));
        }

        NavigationPlan::new(song.clone(), steps, entry, offset)
    }

    fn nearest_anchor(&self, song: &Song) -> Option<(char, i64)> {
        let own = song.group_key.letter()?;
        if !self.catalog.is_list_ordered() {
            warn!("Catalog is not in list order; shortest-path entry disabled");
            return None;
        }

        self.catalog
            .groups()
            .filter_map(|key| {
                let letter = key.letter()?;
                let head = self.catalog.group_head(key)?;
                Some((letter, song.position as i64 - head.position as i64))
            })
            .min_by_key(|&(letter, offset)| (offset.unsigned_abs(), offset < 0, letter != own, letter))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::SongRecord;

    fn catalog(titles: &[&str]) -> Arc<SongCatalog> {
        Arc::new(SongCatalog::load(titles.iter().map(|t| SongRecord::titled(t))).unwrap())
    }

    fn sample() -> Arc<SongCatalog> {
        catalog(&["Airwave", "Binary Sunset", "Binary Star", "Cradle"])
    }

    fn actions(plan: &NavigationPlan) -> Vec<(InputAction, u32)> {
        plan.steps.iter().map(|s| (s.action, s.repeat)).collect()
    }

    #[test]
    fn test_latin_target_walks_down_from_letter() {
        let planner = NavigationPlanner::new(sample(), PlannerConfig::default());
        let plan = planner
            .compute_plan(&NavigationQuery::by_title("Binary Star"))
            .unwrap();
        assert_eq!(
            actions(&plan),
            vec![
                (InputAction::PressLetter('b'), 1),
                (InputAction::MoveDown, 1)
            ]
        );
        assert_eq!(plan.trace.entry, GroupKey::Letter('b'));
        assert_eq!(plan.trace.offset, 1);
        assert_eq!(plan.total_key_presses(), 2);
    }

    #[test]
    fn test_group_head_needs_no_offset() {
        let planner = NavigationPlanner::new(sample(), PlannerConfig::default());
        let plan = planner
            .compute_plan(&NavigationQuery::by_title("Cradle"))
            .unwrap();
        assert_eq!(actions(&plan), vec![(InputAction::PressLetter('c'), 1)]);
    }

    #[test]
    fn test_overflow_groups_enter_alpha_mode_first() {
        let planner = NavigationPlanner::new(
            catalog(&["Airwave", "아리랑", "비상", "1st Love"]),
            PlannerConfig::default(),
        );

        let plan = planner.compute_plan(&NavigationQuery::by_title("비상")).unwrap();
        assert_eq!(
            actions(&plan),
            vec![
                (InputAction::PressLetter('a'), 1),
                (InputAction::QuickJumpNonlatin, 1),
                (InputAction::MoveDown, 1),
            ]
        );

        let plan = planner.compute_plan(&NavigationQuery::by_title("1st Love")).unwrap();
        assert_eq!(
            actions(&plan),
            vec![
                (InputAction::PressLetter('a'), 1),
                (InputAction::QuickJumpSymbol, 1),
            ]
        );
        assert_eq!(plan.trace.entry, GroupKey::SymbolDigit);
    }

    #[test]
    fn test_confirm_and_delays_come_from_config() {
        let config = PlannerConfig {
            press_confirm: true,
            entry_delay: Duration::from_millis(200),
            move_delay: Duration::from_millis(40),
            confirm_delay: Duration::from_millis(10),
            ..PlannerConfig::default()
        };
        let planner = NavigationPlanner::new(sample(), config);
        let plan = planner
            .compute_plan(&NavigationQuery::by_title("Binary Star"))
            .unwrap();
        assert_eq!(plan.steps.last().map(|s| s.action), Some(InputAction::Confirm));
        assert_eq!(plan.total_delay(), Duration::from_millis(250));
    }

    #[test]
    fn test_unknown_title_produces_no_plan() {
        let planner = NavigationPlanner::new(sample(), PlannerConfig::default());
        let err = planner
            .compute_plan(&NavigationQuery::by_title("ZZZ-Unknown"))
            .unwrap_err();
        assert!(matches!(err, NavError::SongNotFound { .. }));
    }

    #[test]
    fn test_plan_is_deterministic() {
        let planner = NavigationPlanner::new(sample(), PlannerConfig::default());
        let query = NavigationQuery::by_title("Binary Star");
        assert_eq!(
            planner.compute_plan(&query).unwrap(),
            planner.compute_plan(&query).unwrap()
        );
    }

    fn shortest() -> PlannerConfig {
        PlannerConfig {
            shortest_path: true,
            ..PlannerConfig::default()
        }
    }

    #[test]
    fn test_shortest_path_walks_up_from_next_block() {
        // b has 5 songs; the last one is closer to c's head than to b's head
        let planner = NavigationPlanner::new(
            catalog(&["Airwave", "B1", "B2", "B3", "B4", "B5", "Cradle"]),
            shortest(),
        );
        let plan = planner.compute_plan(&NavigationQuery::by_title("B5")).unwrap();
        assert_eq!(
            actions(&plan),
            vec![(InputAction::PressLetter('c'), 1), (InputAction::MoveUp, 1)]
        );
        assert_eq!(plan.trace.offset, -1);
        assert_eq!(plan.trace.entry, GroupKey::Letter('c'));
    }

    #[test]
    fn test_shortest_path_ties_prefer_downward() {
        // B3 is two below b's head and two above c's head
        let planner = NavigationPlanner::new(
            catalog(&["B1", "B2", "B3", "B4", "Cradle"]),
            shortest(),
        );
        let plan = planner.compute_plan(&NavigationQuery::by_title("B3")).unwrap();
        assert_eq!(
            actions(&plan),
            vec![(InputAction::PressLetter('b'), 1), (InputAction::MoveDown, 2)]
        );
    }

    #[test]
    fn test_shortest_path_matches_default_for_heads() {
        let planner = NavigationPlanner::new(sample(), shortest());
        let plan = planner.compute_plan(&NavigationQuery::by_title("Cradle")).unwrap();
        assert_eq!(actions(&plan), vec![(InputAction::PressLetter('c'), 1)]);
    }

    #[test]
    fn test_shortest_path_ignored_for_unordered_catalog() {
        let planner = NavigationPlanner::new(
            catalog(&["Cradle", "B1", "B2", "B3", "Airwave"]),
            shortest(),
        );
        let plan = planner.compute_plan(&NavigationQuery::by_title("B3")).unwrap();
        assert_eq!(
            actions(&plan),
            vec![(InputAction::PressLetter('b'), 1), (InputAction::MoveDown, 2)]
        );
    }
}
