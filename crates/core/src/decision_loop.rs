/*
This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0.
If a copy of the MPL was not distributed with this file,
You can obtain one at https://mozilla.org/MPL/2.0/.
*/
//! Scoring: how Consideration scores become an action score, and how a winner is picked.
//!
//! Everything here is read-only with respect to the world. The only mutable state touched
//! is the Blackboard's per-cycle cache, so scoring the same catalogue twice against the
//! same world always yields the same scores and the same winner.

use bevy::reflect::Reflect;

use crate::actions::UtilityAction;
use crate::blackboard::Blackboard;
use crate::considerations::Consideration;
use crate::curves::sanitize_output;
use crate::types::{ActionKey, ActionScore, MAX_CONSIDERATION_SCORE, MIN_CONSIDERATION_SCORE};
use crate::world::{AgentView, AgentWorld};

/// Correction formula as per the GDC 2015 "Building a Better Centaur AI"
/// presentation by Dave Mark and Mike Lewis.
///
/// Gives the raw product a small bonus per Consideration, so that actions
/// are not penalized merely for having more Considerations.
///
/// Example w/ 5 Considerations:
/// - Input 0.900 => Output = 0.972
/// - Input 0.500 => Output = 0.700
/// - Input 1.000 => Output = 1.000
pub fn consideration_adjustment(
    score: ActionScore,
    num_considerations: usize,
) -> ActionScore {
    if score <= MIN_CONSIDERATION_SCORE {
        return MIN_CONSIDERATION_SCORE
    }

    if score >= MAX_CONSIDERATION_SCORE {
        return MAX_CONSIDERATION_SCORE
    }

    if num_considerations == 0 {
        return score
    }

    let modification_factor = 1. - (1. / num_considerations as f32);
    let makeup_val = (1. - score) * modification_factor;
    score + (makeup_val * score)
}

/// How the Consideration scores of one action combine into a single number.
///
/// Whatever the strategy, a single zero Consideration vetoes the action (the result is 0),
/// and the result stays within [0, 1] before the action's bonus is applied.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum ScoreAggregation {
    /// Plain product of all Consideration scores.
    #[default]
    Product,

    /// Product with the per-Consideration makeup from `consideration_adjustment()`.
    CompensatedProduct,

    /// N-th root of the product.
    GeometricMean,

    /// User formula over (product, number of Considerations). The output is clamped to [0, 1].
    Custom(fn(ActionScore, usize) -> ActionScore),
}

impl ScoreAggregation {
    /// Turns the raw product of `count` Consideration scores into the aggregated score.
    pub fn finish(&self, product: ActionScore, count: usize) -> ActionScore {
        if product <= MIN_CONSIDERATION_SCORE || product.is_nan() {
            return MIN_CONSIDERATION_SCORE
        }

        let finished = match self {
            Self::Product => product,
            Self::CompensatedProduct => consideration_adjustment(product, count),
            Self::GeometricMean => match count {
                0 => product,
                n => product.powf(1. / n as f32),
            },
            Self::Custom(formula) => formula(product, count),
        };

        sanitize_output(finished)
    }
}

/// Scores a list of Considerations, stopping at the first zero.
///
/// An empty list aggregates to 1, so an action without Considerations scores its bonus.
pub fn aggregate_considerations<W: AgentWorld>(
    considerations: &[Consideration<W>],
    blackboard: &mut Blackboard<W>,
    view: AgentView<'_, W>,
    aggregation: &ScoreAggregation,
) -> ActionScore {
    let mut product = MAX_CONSIDERATION_SCORE;

    for consideration in considerations {
        product *= consideration.score(blackboard, view);

        if product <= MIN_CONSIDERATION_SCORE {
            #[cfg(feature = "logging")]
            bevy::log::trace!("Consideration {:?} vetoed the action", consideration.name());
            return MIN_CONSIDERATION_SCORE
        }
    }

    aggregation.finish(product, considerations.len())
}

/// Turns anything a custom `compute_score()` might return into a usable, non-negative score.
pub fn sanitize_score(score: ActionScore) -> ActionScore {
    match score.is_finite() && score > MIN_CONSIDERATION_SCORE {
        true => score,
        false => MIN_CONSIDERATION_SCORE,
    }
}

/// What happened to a candidate during the last decision cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Reflect)]
pub enum CandidateStatus {
    /// Fully scored.
    Scored,
    /// The precondition rejected it; scores 0.
    Ineligible,
    /// Skipped because its `max_score()` could not beat the best score found so far; scores 0.
    Pruned,
}

#[derive(Clone, Debug, PartialEq, Reflect)]
pub struct CandidateScore {
    pub key: ActionKey,
    pub score: ActionScore,
    pub status: CandidateStatus,
}

/// Knobs for one pass of `score_candidates()`.
#[derive(Clone, Copy, Debug, Default)]
pub struct ScoringOptions {
    pub aggregation: ScoreAggregation,

    /// Skip candidates whose `max_score()` is not above the best score so far.
    ///
    /// Such candidates can at best tie, and ties never win, so the winner is unaffected.
    pub prune_dominated: bool,

    /// Index of a candidate that must always be fully scored (the running action,
    /// whose exact score the interruption check compares against).
    pub always_score: Option<usize>,
}

/// Scores every candidate in registration order and returns the winner, if any.
///
/// The winner is the candidate with the strictly greatest positive score; on ties the
/// earliest-registered candidate wins. If nothing scores above 0, there is no winner.
///
/// Per-candidate results are written into `scores` (cleared first) for diagnostics.
pub fn score_candidates<W: AgentWorld>(
    actions: &[Box<dyn UtilityAction<W>>],
    blackboard: &mut Blackboard<W>,
    view: AgentView<'_, W>,
    options: &ScoringOptions,
    scores: &mut Vec<CandidateScore>,
) -> Option<(usize, ActionScore)> {
    scores.clear();

    let mut best: Option<(usize, ActionScore)> = None;
    let mut best_score = MIN_CONSIDERATION_SCORE;

    for (idx, action) in actions.iter().enumerate() {
        let must_score = options.always_score == Some(idx);

        if options.prune_dominated && !must_score && best.is_some() && action.max_score() <= best_score {
            scores.push(CandidateScore {
                key: action.key().clone(),
                score: MIN_CONSIDERATION_SCORE,
                status: CandidateStatus::Pruned,
            });
            continue;
        }

        if !action.can_run(blackboard, view) {
            scores.push(CandidateScore {
                key: action.key().clone(),
                score: MIN_CONSIDERATION_SCORE,
                status: CandidateStatus::Ineligible,
            });
            continue;
        }

        let score = sanitize_score(action.compute_score(blackboard, view, &options.aggregation));

        #[cfg(feature = "logging")]
        bevy::log::debug!("Agent {:?}: action {:?} scored {}", view.agent, action.key(), score);

        if score > best_score {
            best_score = score;
            best = Some((idx, score));
        }

        scores.push(CandidateScore {
            key: action.key().clone(),
            score,
            status: CandidateStatus::Scored,
        });
    }

    best
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::action_runtime::PlanQueue;
    use crate::actions::ActionDefinition;
    use crate::curves::{LinearCurve, SupportedUtilityCurve};
    use crate::world::testing::{AGENT, TestWorld};

    fn constant(value: ActionScore) -> Consideration<TestWorld> {
        Consideration::from_fn(
            format!("Const{}", value),
            SupportedUtilityCurve::Linear(LinearCurve),
            move |_blackboard: &mut Blackboard<TestWorld>, _view: AgentView<'_, TestWorld>| value,
        )
    }

    fn boxed(action: ActionDefinition<TestWorld>) -> Box<dyn UtilityAction<TestWorld>> {
        Box::new(action)
    }

    #[test]
    fn compensation_matches_reference_values() {
        assert!((consideration_adjustment(0.9, 5) - 0.972).abs() < 1e-4);
        assert!((consideration_adjustment(0.5, 5) - 0.7).abs() < 1e-4);
        assert_eq!(consideration_adjustment(1.0, 5), 1.0);
        assert_eq!(consideration_adjustment(0.0, 5), 0.0);
        assert_eq!(consideration_adjustment(0.5, 0), 0.5);
    }

    #[test]
    fn zero_product_vetoes_every_aggregation() {
        let strategies = [
            ScoreAggregation::Product,
            ScoreAggregation::CompensatedProduct,
            ScoreAggregation::GeometricMean,
            ScoreAggregation::Custom(|_, _| 1.0),
        ];

        for strategy in strategies {
            assert_eq!(strategy.finish(0.0, 3), 0.0, "{:?}", strategy);
        }
    }

    #[test]
    fn aggregations_stay_in_range() {
        assert!((ScoreAggregation::GeometricMean.finish(0.25, 2) - 0.5).abs() < 1e-6);
        assert_eq!(ScoreAggregation::Custom(|product, _| product * 10.).finish(0.5, 1), 1.0);
        assert_eq!(ScoreAggregation::Custom(|_, _| f32::NAN).finish(0.5, 1), 0.0);
    }

    #[test]
    fn veto_short_circuits_remaining_considerations() {
        let world = TestWorld::default();
        let view = AgentView::new(AGENT, &world);
        let mut blackboard = Blackboard::default();

        let considerations = vec![constant(0.0), constant(0.9), constant(0.9)];
        let score = aggregate_considerations(&considerations, &mut blackboard, view, &ScoreAggregation::Product);
        assert_eq!(score, 0.0);

        let none: Vec<Consideration<TestWorld>> = Vec::new();
        assert_eq!(aggregate_considerations(&none, &mut blackboard, view, &ScoreAggregation::Product), 1.0);
    }

    #[test]
    fn highest_score_wins_and_ties_go_to_the_first() {
        let world = TestWorld::default();
        let view = AgentView::new(AGENT, &world);
        let mut blackboard = Blackboard::default();
        let mut scores = Vec::new();

        let actions = vec![
            boxed(ActionDefinition::new("A").with_consideration(constant(0.4))),
            boxed(ActionDefinition::new("B").with_consideration(constant(0.5))),
            boxed(ActionDefinition::new("C").with_consideration(constant(0.5))),
        ];

        let winner = score_candidates(&actions, &mut blackboard, view, &ScoringOptions::default(), &mut scores);
        assert_eq!(winner, Some((1, 0.5)));
        assert_eq!(scores.len(), 3);
        assert_eq!(scores[0].score, 0.4);
        assert_eq!(scores[2].status, CandidateStatus::Scored);
    }

    #[test]
    fn all_zero_means_no_winner() {
        let world = TestWorld::default();
        let view = AgentView::new(AGENT, &world);
        let mut blackboard = Blackboard::default();
        let mut scores = Vec::new();

        let actions = vec![
            boxed(ActionDefinition::new("A").with_consideration(constant(0.0))),
            boxed(ActionDefinition::new("B").with_bonus(0.0)),
        ];

        let winner = score_candidates(&actions, &mut blackboard, view, &ScoringOptions::default(), &mut scores);
        assert_eq!(winner, None);
    }

    #[test]
    fn pruning_does_not_change_the_winner() {
        let world = TestWorld::default();
        let view = AgentView::new(AGENT, &world);
        let mut blackboard = Blackboard::default();
        let mut scores = Vec::new();

        let actions = vec![
            boxed(ActionDefinition::new("Big").with_bonus(2.0).with_consideration(constant(0.5))),
            boxed(ActionDefinition::new("Small").with_bonus(0.5).with_consideration(constant(1.0))),
            boxed(ActionDefinition::new("Bigger").with_bonus(3.0).with_consideration(constant(0.5))),
        ];

        let plain = score_candidates(&actions, &mut blackboard, view, &ScoringOptions::default(), &mut scores);

        let pruning = ScoringOptions { prune_dominated: true, ..Default::default() };
        let pruned = score_candidates(&actions, &mut blackboard, view, &pruning, &mut scores);

        assert_eq!(plain, pruned);
        assert_eq!(pruned, Some((2, 1.5)));
        assert_eq!(scores[1].status, CandidateStatus::Pruned);

        let protected = ScoringOptions { prune_dominated: true, always_score: Some(1), ..Default::default() };
        score_candidates(&actions, &mut blackboard, view, &protected, &mut scores);
        assert_eq!(scores[1].score, 0.5);
    }

    /// Scores above its bonus, so pruning has to go by `max_score()`.
    struct Overachiever {
        key: ActionKey,
        ceiling: Option<ActionScore>,
    }

    impl UtilityAction<TestWorld> for Overachiever {
        fn key(&self) -> &ActionKey {
            &self.key
        }

        fn considerations(&self) -> &[Consideration<TestWorld>] {
            &[]
        }

        fn max_score(&self) -> ActionScore {
            self.ceiling.unwrap_or_else(|| self.bonus())
        }

        fn compute_score(
            &self,
            _blackboard: &mut Blackboard<TestWorld>,
            _view: AgentView<'_, TestWorld>,
            _aggregation: &ScoreAggregation,
        ) -> ActionScore {
            5.0
        }

        fn compile(&self, _blackboard: &mut Blackboard<TestWorld>, _view: AgentView<'_, TestWorld>) -> PlanQueue<TestWorld> {
            PlanQueue::empty()
        }
    }

    #[test]
    fn pruning_respects_custom_score_ceilings() {
        let world = TestWorld::default();
        let view = AgentView::new(AGENT, &world);
        let mut blackboard = Blackboard::default();
        let mut scores = Vec::new();
        let pruning = ScoringOptions { prune_dominated: true, ..Default::default() };

        let honest = vec![
            boxed(ActionDefinition::new("Steady").with_bonus(2.0).with_consideration(constant(1.0))),
            Box::new(Overachiever { key: ActionKey::from("Surge"), ceiling: Some(5.0) }) as Box<dyn UtilityAction<TestWorld>>,
        ];
        let winner = score_candidates(&honest, &mut blackboard, view, &pruning, &mut scores);
        assert_eq!(winner, Some((1, 5.0)));
        assert_eq!(scores[1].status, CandidateStatus::Scored);

        // Without a raised ceiling the bonus caps it and it gets pruned.
        let capped = vec![
            boxed(ActionDefinition::new("Steady").with_bonus(2.0).with_consideration(constant(1.0))),
            Box::new(Overachiever { key: ActionKey::from("Surge"), ceiling: None }) as Box<dyn UtilityAction<TestWorld>>,
        ];
        let winner = score_candidates(&capped, &mut blackboard, view, &pruning, &mut scores);
        assert_eq!(winner, Some((0, 2.0)));
        assert_eq!(scores[1].status, CandidateStatus::Pruned);
    }

    #[test]
    fn failed_preconditions_score_zero() {
        let world = TestWorld::default().with_flag("stunned", true);
        let view = AgentView::new(AGENT, &world);
        let mut blackboard = Blackboard::default();
        let mut scores = Vec::new();

        let actions = vec![
            boxed(
                ActionDefinition::new("Attack")
                    .with_precondition(|_blackboard: &mut Blackboard<TestWorld>, view: AgentView<'_, TestWorld>| {
                        !view.world.flags.get("stunned").copied().unwrap_or_default()
                    })
            ),
            boxed(ActionDefinition::new("Idle").with_bonus(0.1)),
        ];

        let winner = score_candidates(&actions, &mut blackboard, view, &ScoringOptions::default(), &mut scores);
        assert_eq!(winner.map(|(idx, _)| idx), Some(1));
        assert_eq!(scores[0].status, CandidateStatus::Ineligible);
    }
}
