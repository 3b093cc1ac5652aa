//! Partition of a plan into pre / parallel / post lanes, plus validation and repair.
//!
//! Classifier output is untrusted: [`check_partition`] reports whether it is a
//! permutation of the plan and [`reconcile`] repairs it into one. Steps are
//! matched by trimmed text with multiset semantics, so a plan may repeat a step.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Steps grouped by scheduling lane.
///
/// After [`reconcile`] each lane keeps the classifier's order; steps the classifier
/// missed are appended to `post` in plan order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Partition {
    /// Run one by one before the parallel group.
    pub pre: Vec<String>,
    /// Run concurrently.
    pub parallel: Vec<String>,
    /// Run one by one after the parallel group has joined.
    pub post: Vec<String>,
}

impl Partition {
    pub fn is_empty(&self) -> bool {
        self.pre.is_empty() && self.parallel.is_empty() && self.post.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pre.len() + self.parallel.len() + self.post.len()
    }

    /// pre ++ parallel ++ post.
    pub fn flatten(&self) -> Vec<String> {
        self.pre
            .iter()
            .chain(&self.parallel)
            .chain(&self.post)
            .cloned()
            .collect()
    }
}

/// Result of [`check_partition`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartitionCheck {
    Valid,
    Invalid(String),
}

impl PartitionCheck {
    pub fn is_valid(&self) -> bool {
        matches!(self, PartitionCheck::Valid)
    }
}

fn key(step: &str) -> &str {
    step.trim()
}

fn counts(plan: &[String]) -> HashMap<&str, usize> {
    let mut counts = HashMap::new();
    for step in plan {
        *counts.entry(key(step)).or_insert(0) += 1;
    }
    counts
}

/// Checks that `candidate` flattened is a permutation of `plan`.
pub fn check_partition(plan: &[String], candidate: &Partition) -> PartitionCheck {
    let mut remaining = counts(plan);
    for step in candidate.flatten() {
        match remaining.get_mut(key(&step)) {
            Some(n) if *n > 0 => *n -= 1,
            Some(_) => return PartitionCheck::Invalid(format!("duplicate step: {}", step)),
            None => return PartitionCheck::Invalid(format!("unknown step: {}", step)),
        }
    }
    match plan.iter().find(|s| remaining.get(key(s)).is_some_and(|n| *n > 0)) {
        Some(missing) => PartitionCheck::Invalid(format!("missing step: {}", missing)),
        None => PartitionCheck::Valid,
    }
}

/// Repairs `raw` into a partition whose flattening is a permutation of `plan`.
///
/// Unknown steps are dropped, only the first occurrence of a duplicate is kept
/// (up to its multiplicity in the plan), and steps the classifier left out are
/// appended to `post` in plan order. Kept steps use the plan's own text.
pub fn reconcile(plan: &[String], raw: Partition) -> Partition {
    let mut remaining = counts(plan);
    let canonical: HashMap<&str, &String> = plan.iter().map(|s| (key(s), s)).collect();

    let mut take = |lane: Vec<String>| -> Vec<String> {
        lane.into_iter()
            .filter_map(|step| {
                let k = key(&step);
                match remaining.get_mut(k) {
                    Some(n) if *n > 0 => {
                        *n -= 1;
                        canonical.get(k).map(|s| (*s).clone())
                    }
                    _ => None,
                }
            })
            .collect()
    };
    let pre = take(raw.pre);
    let parallel = take(raw.parallel);
    let mut post = take(raw.post);

    for step in plan {
        if let Some(n) = remaining.get_mut(key(step)) {
            if *n > 0 {
                *n -= 1;
                post.push(step.clone());
            }
        }
    }

    Partition {
        pre,
        parallel,
        post,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn steps(xs: &[&str]) -> Vec<String> {
        xs.iter().map(|s| s.to_string()).collect()
    }

    fn sorted(mut v: Vec<String>) -> Vec<String> {
        v.sort();
        v
    }

    #[test]
    fn well_formed_partition_is_valid_and_unchanged() {
        let plan = steps(&["a", "b", "c", "d"]);
        let raw = Partition {
            pre: steps(&["a"]),
            parallel: steps(&["b", "c"]),
            post: steps(&["d"]),
        };
        assert!(check_partition(&plan, &raw).is_valid());
        assert_eq!(reconcile(&plan, raw.clone()), raw);
    }

    /// **Scenario**: Steps the classifier dropped end up in post, in plan order.
    #[test]
    fn lossy_output_moves_missing_steps_to_post() {
        let plan = steps(&["a", "b", "c", "d"]);
        let raw = Partition {
            pre: vec![],
            parallel: steps(&["c"]),
            post: vec![],
        };
        assert_eq!(
            check_partition(&plan, &raw),
            PartitionCheck::Invalid("missing step: a".into())
        );
        let fixed = reconcile(&plan, raw);
        assert_eq!(fixed.parallel, steps(&["c"]));
        assert_eq!(fixed.post, steps(&["a", "b", "d"]));
    }

    /// **Scenario**: Lanes keep the classifier's order; only missed steps follow plan order.
    #[test]
    fn lanes_keep_classifier_order() {
        let plan = steps(&["a", "b", "c", "d", "e"]);
        let raw = Partition {
            pre: vec![],
            parallel: steps(&["d", "a"]),
            post: steps(&["e"]),
        };
        let fixed = reconcile(&plan, raw);
        assert_eq!(fixed.parallel, steps(&["d", "a"]));
        assert_eq!(fixed.post, steps(&["e", "b", "c"]));
    }

    #[test]
    fn duplicates_keep_first_occurrence() {
        let plan = steps(&["a", "b"]);
        let raw = Partition {
            pre: steps(&["a"]),
            parallel: steps(&["a", "b"]),
            post: steps(&["b"]),
        };
        assert!(!check_partition(&plan, &raw).is_valid());
        let fixed = reconcile(&plan, raw);
        assert_eq!(fixed.pre, steps(&["a"]));
        assert_eq!(fixed.parallel, steps(&["b"]));
        assert!(fixed.post.is_empty());
    }

    #[test]
    fn unknown_steps_are_dropped_and_whitespace_is_ignored() {
        let plan = steps(&["Explain recursion", "Give examples"]);
        let raw = Partition {
            pre: steps(&["  Explain recursion "]),
            parallel: steps(&["Invented step"]),
            post: vec![],
        };
        let fixed = reconcile(&plan, raw);
        assert_eq!(fixed.pre, steps(&["Explain recursion"]));
        assert!(fixed.parallel.is_empty());
        assert_eq!(fixed.post, steps(&["Give examples"]));
    }

    /// **Scenario**: Whatever the classifier says, pre ++ parallel ++ post is a permutation of the plan.
    #[test]
    fn reconcile_always_yields_permutation() {
        let plan = steps(&["a", "b", "b", "c", "d"]);
        let candidates = vec![
            Partition::default(),
            Partition {
                pre: steps(&["d", "d", "d"]),
                parallel: steps(&["zzz", "b"]),
                post: steps(&["a", "b", "b", "b"]),
            },
            Partition {
                pre: steps(&["c"]),
                parallel: steps(&["a", "b", "b", "d"]),
                post: vec![],
            },
        ];
        for raw in candidates {
            let fixed = reconcile(&plan, raw);
            assert!(check_partition(&plan, &fixed).is_valid());
            assert_eq!(sorted(fixed.flatten()), sorted(plan.clone()));
        }
    }

    #[test]
    fn empty_plan_reconciles_to_empty_partition() {
        let raw = Partition {
            pre: steps(&["x"]),
            ..Default::default()
        };
        let fixed = reconcile(&[], raw);
        assert!(fixed.is_empty());
        assert_eq!(fixed.len(), 0);
    }
}
