//! Weighted completion metrics.
//!
//! Progress is `sum(done weights) / sum(all weights)` expressed as a whole
//! percentage. Overall progress flattens every subtask of every todo into one
//! sequence, so it is itself a weighted average rather than an average of
//! per-todo percentages.

use serde::Serialize;

use crate::model::{Subtask, Todo};

/// Weight used when a stored weight is not a finite number.
pub const DEFAULT_WEIGHT: f64 = 1.0;

/// Coerce a raw weight: non-finite becomes [`DEFAULT_WEIGHT`], negative becomes 0.
pub fn effective_weight(weight: f64) -> f64 {
    if !weight.is_finite() {
        DEFAULT_WEIGHT
    } else if weight < 0.0 {
        0.0
    } else {
        weight
    }
}

/// Sums of effective weights, as shown next to a todo ("done 3/5").
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct WeightTotals {
    pub done: f64,
    pub total: f64,
}

impl WeightTotals {
    /// Percentage in `[0, 100]`, rounded half-up; 0 when nothing carries weight.
    pub fn percentage(&self) -> u8 {
        if self.total <= 0.0 {
            return 0;
        }
        let pct = round_half_up(100.0 * self.done / self.total);
        pct.clamp(0.0, 100.0) as u8
    }
}

/// Sum the effective weights of `subtasks`.
///
/// When the plain sums overflow, both are expressed in units of the largest
/// weight instead, which keeps their ratio.
pub fn weight_totals<'a, I>(subtasks: I) -> WeightTotals
where
    I: IntoIterator<Item = &'a Subtask>,
{
    let weighted: Vec<(f64, bool)> = subtasks
        .into_iter()
        .map(|sub| (effective_weight(sub.weight), sub.done))
        .collect();

    let totals = sum_weights(&weighted, 1.0);
    if totals.total.is_finite() {
        return totals;
    }
    let largest = weighted.iter().fold(0.0_f64, |max, (weight, _)| max.max(*weight));
    sum_weights(&weighted, largest)
}

fn sum_weights(weighted: &[(f64, bool)], unit: f64) -> WeightTotals {
    weighted
        .iter()
        .fold(WeightTotals::default(), |mut totals, &(weight, done)| {
            let weight = weight / unit;
            totals.total += weight;
            if done {
                totals.done += weight;
            }
            totals
        })
}

/// Weighted completion of a subtask sequence.
pub fn weighted_percentage<'a, I>(subtasks: I) -> u8
where
    I: IntoIterator<Item = &'a Subtask>,
{
    weight_totals(subtasks).percentage()
}

/// Weighted completion across every subtask of every todo.
pub fn overall_percentage(todos: &[Todo]) -> u8 {
    weighted_percentage(todos.iter().flat_map(|todo| todo.subtasks.iter()))
}

fn round_half_up(value: f64) -> f64 {
    (value + 0.5).floor()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sub(done: bool, weight: f64) -> Subtask {
        Subtask {
            id: format!("s-{weight}-{done}"),
            text: String::new(),
            done,
            weight,
        }
    }

    #[test]
    fn effective_weight_rules() {
        assert_eq!(effective_weight(f64::NAN), 1.0);
        assert_eq!(effective_weight(f64::INFINITY), 1.0);
        assert_eq!(effective_weight(f64::NEG_INFINITY), 1.0);
        assert_eq!(effective_weight(-2.5), 0.0);
        assert_eq!(effective_weight(0.0), 0.0);
        assert_eq!(effective_weight(3.5), 3.5);
    }

    #[test]
    fn empty_is_zero() {
        assert_eq!(weighted_percentage(&[] as &[Subtask]), 0);
    }

    #[test]
    fn all_zero_weights_is_zero() {
        let subs = vec![sub(true, 0.0), sub(false, -4.0), sub(true, 0.0)];
        assert_eq!(weighted_percentage(&subs), 0);
    }

    #[test]
    fn rounds_half_up() {
        // 1 / 8 = 12.5%
        let subs = vec![sub(true, 1.0), sub(false, 7.0)];
        assert_eq!(weighted_percentage(&subs), 13);
    }

    #[test]
    fn one_third_rounds_down() {
        let subs = vec![sub(false, 2.0), sub(true, 1.0)];
        assert_eq!(weighted_percentage(&subs), 33);
    }

    #[test]
    fn huge_weights_do_not_overflow() {
        let subs = vec![sub(true, 1e308), sub(true, 1e308)];
        assert_eq!(weighted_percentage(&subs), 100);

        let subs = vec![sub(true, f64::MAX), sub(false, f64::MAX), sub(false, 1.0)];
        assert_eq!(weighted_percentage(&subs), 50);

        let totals = weight_totals(&[sub(true, 1e308), sub(false, 1e308)]);
        assert!(totals.total.is_finite());
        assert_eq!(totals.percentage(), 50);
    }

    #[test]
    fn non_finite_weight_counts_as_one() {
        let subs = vec![sub(true, f64::NAN), sub(false, 1.0)];
        assert_eq!(weighted_percentage(&subs), 50);
    }

    #[test]
    fn stays_within_bounds() {
        let weights = [0.0, 0.1, 1.0, 2.0, 1e-9, 1e12, -1.0, f64::NAN, f64::INFINITY];
        for (i, a) in weights.iter().enumerate() {
            for b in weights.iter().skip(i) {
                for done in [(false, false), (true, false), (false, true), (true, true)] {
                    let subs = vec![sub(done.0, *a), sub(done.1, *b)];
                    let pct = weighted_percentage(&subs);
                    assert!(pct <= 100, "{a} {b} {done:?} gave {pct}");
                }
            }
        }
    }

    #[test]
    fn overall_is_weighted_across_todos() {
        let todos = vec![
            Todo {
                id: "a".to_string(),
                title: "A".to_string(),
                subtasks: vec![sub(true, 1.0)],
            },
            Todo {
                id: "b".to_string(),
                title: "B".to_string(),
                subtasks: vec![sub(false, 3.0)],
            },
        ];
        // Averaging per-todo percentages would give 50.
        assert_eq!(overall_percentage(&todos), 25);
    }

    #[test]
    fn totals_report_done_and_total() {
        let subs = vec![sub(true, 2.0), sub(false, 1.5)];
        let totals = weight_totals(&subs);
        assert_eq!(totals.done, 2.0);
        assert_eq!(totals.total, 3.5);
    }
}
