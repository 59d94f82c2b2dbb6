//! Sequence expansion
//!
//! Turns an ordered step list into concrete local paths. The engine
//! pre-fetches the referenced pools so expansion itself is pure and
//! deterministic given the RNG.

use std::collections::HashMap;

use rand::Rng;

use crate::models::{Preroll, SequenceStep};

/// Pre-fetched inputs for one expansion.
#[derive(Debug, Default)]
pub struct SequencePools {
    /// Union pool (primary + membership) per referenced category.
    pub by_category: HashMap<i64, Vec<Preroll>>,
    /// Referenced fixed prerolls by id.
    pub by_id: HashMap<i64, Preroll>,
}

/// Category ids a step list draws random picks from.
pub fn referenced_categories(steps: &[SequenceStep]) -> Vec<i64> {
    let mut out = Vec::new();
    for step in steps {
        if let SequenceStep::Random { category_id, .. } = step {
            if !out.contains(category_id) {
                out.push(*category_id);
            }
        }
    }
    out
}

/// Preroll ids a step list pins in place.
pub fn referenced_prerolls(steps: &[SequenceStep]) -> Vec<i64> {
    let mut out = Vec::new();
    for step in steps {
        for id in step.fixed_ids() {
            if !out.contains(&id) {
                out.push(id);
            }
        }
    }
    out
}

/// Expand steps into an ordered path list. Random steps draw
/// `min(count, pool)` without replacement; fixed steps keep their order;
/// references to missing prerolls or empty pools contribute nothing.
pub fn expand<R: Rng>(
    steps: &[SequenceStep],
    pools: &SequencePools,
    rng: &mut R,
) -> Vec<String> {
    let mut paths = Vec::new();
    for step in steps {
        match step {
            SequenceStep::Random { category_id, count } => {
                let Some(pool) = pools.by_category.get(category_id) else {
                    continue;
                };
                if pool.is_empty() {
                    continue;
                }
                let k = (*count).max(1).min(pool.len() as u32) as usize;
                if k == pool.len() {
                    paths.extend(pool.iter().map(|p| p.path.clone()));
                } else {
                    let picks = rand::seq::index::sample(rng, pool.len(), k);
                    paths.extend(picks.iter().map(|i| pool[i].path.clone()));
                }
            }
            SequenceStep::Fixed { .. } => {
                for id in step.fixed_ids() {
                    if let Some(preroll) = pools.by_id.get(&id) {
                        paths.push(preroll.path.clone());
                    }
                }
            }
        }
    }
    paths
}

/// A schedule's contribution to a blend pool: its expanded sequence when it
/// has one, otherwise a uniform sample of up to three prerolls from its
/// category pool.
pub fn blend_contribution<R: Rng>(
    steps: &[SequenceStep],
    category_pool: &[Preroll],
    pools: &SequencePools,
    rng: &mut R,
) -> Vec<String> {
    if !steps.is_empty() {
        return expand(steps, pools, rng);
    }
    if category_pool.is_empty() {
        return Vec::new();
    }
    let k = category_pool.len().min(3);
    if k == category_pool.len() {
        category_pool.iter().map(|p| p.path.clone()).collect()
    } else {
        rand::seq::index::sample(rng, category_pool.len(), k)
            .iter()
            .map(|i| category_pool[i].path.clone())
            .collect()
    }
}

/// Round-robin interleave: output position `i * n + j` takes element `i` of
/// list `j` when available.
pub fn interleave(lists: &[Vec<String>]) -> Vec<String> {
    let longest = lists.iter().map(Vec::len).max().unwrap_or(0);
    let mut out = Vec::new();
    for i in 0..longest {
        for list in lists {
            if let Some(path) = list.get(i) {
                out.push(path.clone());
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn preroll(id: i64, path: &str) -> Preroll {
        Preroll {
            id,
            filename: path.rsplit('/').next().unwrap_or(path).to_string(),
            path: path.to_string(),
            display_name: None,
            category_id: None,
            duration_seconds: None,
            file_size: None,
            managed: true,
        }
    }

    fn pools() -> SequencePools {
        let mut by_category = HashMap::new();
        by_category.insert(
            5,
            vec![
                preroll(20, "/m/c5/x.mp4"),
                preroll(21, "/m/c5/y.mp4"),
                preroll(22, "/m/c5/z.mp4"),
            ],
        );
        let mut by_id = HashMap::new();
        by_id.insert(10, preroll(10, "/m/fixed/a.mp4"));
        by_id.insert(11, preroll(11, "/m/fixed/b.mp4"));
        SequencePools { by_category, by_id }
    }

    #[test]
    fn fixed_then_random_keeps_order_and_draws_distinct() {
        let steps = vec![
            SequenceStep::Fixed {
                preroll_id: None,
                preroll_ids: Some(vec![10, 11]),
            },
            SequenceStep::Random {
                category_id: 5,
                count: 2,
            },
        ];
        let pools = pools();
        let mut rng = rand::rng();
        let paths = expand(&steps, &pools, &mut rng);
        assert_eq!(paths.len(), 4);
        assert_eq!(paths[0], "/m/fixed/a.mp4");
        assert_eq!(paths[1], "/m/fixed/b.mp4");
        let pool_paths = ["/m/c5/x.mp4", "/m/c5/y.mp4", "/m/c5/z.mp4"];
        assert!(pool_paths.contains(&paths[2].as_str()));
        assert!(pool_paths.contains(&paths[3].as_str()));
        assert_ne!(paths[2], paths[3]);
    }

    #[test]
    fn random_count_clamps_to_pool_size() {
        let steps = vec![SequenceStep::Random {
            category_id: 5,
            count: 99,
        }];
        let pools = pools();
        let mut rng = rand::rng();
        let paths = expand(&steps, &pools, &mut rng);
        assert_eq!(paths.len(), 3);
    }

    #[test]
    fn missing_references_contribute_nothing() {
        let steps = vec![
            SequenceStep::Random {
                category_id: 404,
                count: 2,
            },
            SequenceStep::Fixed {
                preroll_id: Some(404),
                preroll_ids: None,
            },
        ];
        let pools = pools();
        let mut rng = rand::rng();
        assert!(expand(&steps, &pools, &mut rng).is_empty());
    }

    #[test]
    fn referenced_ids_are_collected_once() {
        let steps = vec![
            SequenceStep::Random {
                category_id: 5,
                count: 1,
            },
            SequenceStep::Random {
                category_id: 5,
                count: 2,
            },
            SequenceStep::Fixed {
                preroll_id: Some(10),
                preroll_ids: None,
            },
            SequenceStep::Fixed {
                preroll_id: None,
                preroll_ids: Some(vec![10, 11]),
            },
        ];
        assert_eq!(referenced_categories(&steps), vec![5]);
        assert_eq!(referenced_prerolls(&steps), vec![10, 11]);
    }

    #[test]
    fn interleave_is_round_robin() {
        let lists = vec![
            vec!["a".to_string(), "b".to_string(), "c".to_string()],
            vec!["x".to_string(), "y".to_string()],
        ];
        assert_eq!(interleave(&lists), vec!["a", "x", "b", "y", "c"]);
    }

    #[test]
    fn blend_contribution_samples_up_to_three() {
        let pool = vec![
            preroll(1, "/m/1.mp4"),
            preroll(2, "/m/2.mp4"),
            preroll(3, "/m/3.mp4"),
            preroll(4, "/m/4.mp4"),
        ];
        let pools = SequencePools::default();
        let mut rng = rand::rng();
        let picks = blend_contribution(&[], &pool, &pools, &mut rng);
        assert_eq!(picks.len(), 3);
        let mut unique = picks.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), 3);
    }
}
