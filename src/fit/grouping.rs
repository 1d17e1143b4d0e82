//! Partition of a training subset into groups ("batches") for the trainer.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::error::FittingError;

/// What to do when `batch_size × batch_count` exceeds the subset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Repeat {
    /// Never reuse a trial; too few trials is an error.
    Never,
    /// Start a new shuffled pass over the subset when one is exhausted.
    Reshuffle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grouping {
    pub batch_size: usize,
    pub batch_count: usize,
    pub repeat: Repeat,
}

/// Upper bound on `batch_count`.
pub const MAX_BATCH_COUNT: usize = 1 << 20;

impl Default for Grouping {
    fn default() -> Self {
        Self {
            batch_size: 256,
            batch_count: 50,
            repeat: Repeat::Never,
        }
    }
}

/// Exactly `batch_count` groups of indices into `0..n`.
///
/// With [`Repeat::Never`] every group is full and no index appears twice.
/// With [`Repeat::Reshuffle`] each pass is an independent shuffle chunked
/// into groups; a group never spans two passes, so the last group of a pass
/// may be short. Within a pass no index repeats.
pub fn form_groups(
    n: usize,
    grouping: &Grouping,
    rng: &mut StdRng,
) -> Result<Vec<Vec<usize>>, FittingError> {
    let Grouping {
        batch_size,
        batch_count,
        repeat,
    } = *grouping;
    if batch_size == 0 || batch_count == 0 {
        return Err(FittingError::InvalidGrouping(format!(
            "batch size and count must be positive (got {batch_size} × {batch_count})"
        )));
    }
    if batch_count > MAX_BATCH_COUNT {
        return Err(FittingError::InvalidGrouping(format!(
            "batch count {batch_count} exceeds the limit of {MAX_BATCH_COUNT}"
        )));
    }
    if n == 0 {
        return Err(FittingError::InsufficientTrials {
            needed: batch_size,
            available: 0,
        });
    }

    match repeat {
        Repeat::Never => {
            let needed = batch_size.saturating_mul(batch_count);
            if needed > n {
                return Err(FittingError::InsufficientTrials {
                    needed,
                    available: n,
                });
            }
            let order = shuffled(n, rng);
            Ok(order
                .chunks_exact(batch_size)
                .take(batch_count)
                .map(<[usize]>::to_vec)
                .collect())
        }
        Repeat::Reshuffle => {
            let mut groups = Vec::new();
            while groups.len() < batch_count {
                let order = shuffled(n, rng);
                for chunk in order.chunks(batch_size) {
                    if groups.len() == batch_count {
                        break;
                    }
                    groups.push(chunk.to_vec());
                }
            }
            Ok(groups)
        }
    }
}

fn shuffled(n: usize, rng: &mut StdRng) -> Vec<usize> {
    let mut order: Vec<usize> = (0..n).collect();
    order.shuffle(rng);
    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use std::collections::HashSet;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(17)
    }

    #[test]
    fn never_repeat_rejects_oversized_request() {
        let err = form_groups(10_000, &Grouping::default(), &mut rng()).unwrap_err();
        assert!(matches!(
            err,
            FittingError::InsufficientTrials {
                needed: 12_800,
                available: 10_000
            }
        ));
    }

    #[test]
    fn never_repeat_gives_disjoint_full_groups() {
        let grouping = Grouping {
            batch_count: 39,
            ..Grouping::default()
        };
        let groups = form_groups(10_000, &grouping, &mut rng()).unwrap();
        assert_eq!(groups.len(), 39);
        assert!(groups.iter().all(|g| g.len() == 256));
        let seen: HashSet<usize> = groups.iter().flatten().copied().collect();
        assert_eq!(seen.len(), 39 * 256);
    }

    #[test]
    fn reshuffle_fills_the_requested_count() {
        let grouping = Grouping {
            repeat: Repeat::Reshuffle,
            ..Grouping::default()
        };
        let n = 10_000;
        let groups = form_groups(n, &grouping, &mut rng()).unwrap();
        assert_eq!(groups.len(), 50);
        assert!(groups.iter().all(|g| !g.is_empty() && g.len() <= 256));

        // Replay the passes: consecutive groups until their sizes sum to n form one pass.
        let mut pass: Vec<usize> = Vec::new();
        for g in &groups {
            pass.extend(g);
            if pass.len() == n {
                let unique: HashSet<usize> = pass.iter().copied().collect();
                assert_eq!(unique.len(), n);
                pass.clear();
            }
        }
        let unique: HashSet<usize> = pass.iter().copied().collect();
        assert_eq!(unique.len(), pass.len());
    }

    #[test]
    fn reshuffle_on_tiny_subset_cycles() {
        let grouping = Grouping {
            batch_size: 4,
            batch_count: 5,
            repeat: Repeat::Reshuffle,
        };
        let groups = form_groups(6, &grouping, &mut rng()).unwrap();
        let sizes: Vec<usize> = groups.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![4, 2, 4, 2, 4]);
    }

    #[test]
    fn zero_sized_grouping_is_invalid() {
        let grouping = Grouping {
            batch_size: 0,
            ..Grouping::default()
        };
        assert!(matches!(
            form_groups(100, &grouping, &mut rng()),
            Err(FittingError::InvalidGrouping(_))
        ));
    }

    #[test]
    fn absurd_batch_count_is_invalid() {
        for repeat in [Repeat::Never, Repeat::Reshuffle] {
            let grouping = Grouping {
                batch_size: 1,
                batch_count: usize::MAX,
                repeat,
            };
            assert!(matches!(
                form_groups(10, &grouping, &mut rng()),
                Err(FittingError::InvalidGrouping(_))
            ));
        }
    }
}
