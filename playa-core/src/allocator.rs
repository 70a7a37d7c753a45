//! Priority admission and eviction over a fixed byte budget.
//!
//! Greedy single pass:
//! 1. Stable-sort candidates by ascending priority number.
//! 2. Admit a candidate if it fits in the remaining budget.
//! 3. Otherwise evict retained packages with a strictly higher priority
//!    number, least important first, until the deficit is covered. If the
//!    whole eligible set cannot cover it, skip the candidate and evict
//!    nothing.
//!
//! Only packages that were installed before the pass can be evicted; a
//! candidate admitted earlier in the same pass is never displaced. This is a
//! heuristic, not a knapsack solver: a candidate may be skipped even when a
//! different combination of evictions would have fit it.

use playa_types::ContentPackage;

/// One admitted candidate and the installed packages removed for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    /// The admitted candidate.
    pub package: ContentPackage,
    /// Installed packages evicted to make room, in eviction order.
    pub evicts: Vec<ContentPackage>,
}

/// Result of one allocator pass.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Admission {
    /// Admitted candidates with their evictions, in admission order.
    pub plan: Vec<Placement>,
    /// Candidates that did not fit, in priority order.
    pub skipped: Vec<ContentPackage>,
    /// Installed packages that survive the pass.
    pub retained: Vec<ContentPackage>,
    /// Sum of retained and admitted sizes.
    pub used_bytes: u64,
}

impl Admission {
    /// Admitted candidates, in admission order.
    pub fn admitted(&self) -> Vec<ContentPackage> {
        self.plan.iter().map(|p| p.package.clone()).collect()
    }

    /// All evicted packages, in eviction order.
    pub fn evicted(&self) -> Vec<ContentPackage> {
        self.plan
            .iter()
            .flat_map(|p| p.evicts.iter().cloned())
            .collect()
    }
}

/// Run the allocator.
///
/// `installed` is the current on-device set; `candidates` are the packages
/// offered for admission. Zero-size and duplicate-id candidates are taken
/// as-is.
pub fn admit(
    installed: &[ContentPackage],
    candidates: &[ContentPackage],
    capacity_bytes: u64,
) -> Admission {
    let mut ordered: Vec<&ContentPackage> = candidates.iter().collect();
    // sort_by_key is stable: equal priorities keep input order.
    ordered.sort_by_key(|p| p.priority);

    let mut retained: Vec<ContentPackage> = installed.to_vec();
    let retained_bytes: u64 = retained.iter().map(|p| p.size_bytes).sum();
    // Signed: an installed set already over capacity leaves negative room.
    let mut remaining = i128::from(capacity_bytes) - i128::from(retained_bytes);

    let mut plan = Vec::new();
    let mut skipped = Vec::new();

    for candidate in ordered {
        let size = candidate.size_bytes;

        if size > capacity_bytes {
            skipped.push(candidate.clone());
            continue;
        }

        if i128::from(size) <= remaining {
            remaining -= i128::from(size);
            plan.push(Placement {
                package: candidate.clone(),
                evicts: Vec::new(),
            });
            continue;
        }

        let deficit = u64::try_from(i128::from(size) - remaining).unwrap_or(u64::MAX);
        match eviction_set(&retained, candidate.priority, deficit) {
            Some(victims) => {
                let evicts: Vec<ContentPackage> =
                    victims.iter().map(|&i| retained[i].clone()).collect();
                let freed: u64 = evicts.iter().map(|p| p.size_bytes).sum();
                // Remove from the highest index down so earlier indices stay valid.
                let mut indices = victims;
                indices.sort_unstable_by(|a, b| b.cmp(a));
                for idx in indices {
                    retained.remove(idx);
                }
                remaining += i128::from(freed) - i128::from(size);
                plan.push(Placement {
                    package: candidate.clone(),
                    evicts,
                });
            }
            None => skipped.push(candidate.clone()),
        }
    }

    let used_bytes = retained.iter().map(|p| p.size_bytes).sum::<u64>()
        + plan.iter().map(|p| p.package.size_bytes).sum::<u64>();

    Admission {
        plan,
        skipped,
        retained,
        used_bytes,
    }
}

/// Indices into `retained` to evict for a candidate of `priority`, or `None`
/// if evicting every eligible package would not cover `deficit`.
fn eviction_set(retained: &[ContentPackage], priority: i32, deficit: u64) -> Option<Vec<usize>> {
    let mut eligible: Vec<usize> = (0..retained.len())
        .filter(|&i| retained[i].priority > priority)
        .collect();
    // Least important (highest number) first; stable for equal priorities.
    eligible.sort_by(|&a, &b| retained[b].priority.cmp(&retained[a].priority));

    let mut freed = 0u64;
    let mut chosen = Vec::new();
    for idx in eligible {
        if freed >= deficit {
            break;
        }
        freed += retained[idx].size_bytes;
        chosen.push(idx);
    }

    (freed >= deficit).then_some(chosen)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pkg(id: &str, priority: i32, size: u64) -> ContentPackage {
        ContentPackage::new(id, priority, size)
    }

    fn ids(pkgs: &[ContentPackage]) -> Vec<&str> {
        pkgs.iter().map(|p| p.id.as_str()).collect()
    }

    #[test]
    fn fits_then_skips_without_evictable_packages() {
        let result = admit(&[], &[pkg("a", 1, 400), pkg("b", 2, 700)], 1000);

        assert_eq!(ids(&result.admitted()), vec!["a"]);
        assert_eq!(ids(&result.skipped), vec!["b"]);
        assert!(result.evicted().is_empty());
        assert_eq!(result.used_bytes, 400);
    }

    #[test]
    fn evicts_lower_priority_installed_package() {
        let installed = [pkg("c", 5, 500)];
        let result = admit(&installed, &[pkg("a", 1, 700)], 1000);

        assert_eq!(ids(&result.admitted()), vec!["a"]);
        assert_eq!(ids(&result.evicted()), vec!["c"]);
        assert!(result.retained.is_empty());
        assert_eq!(result.used_bytes, 700);
    }

    #[test]
    fn never_evicts_equal_or_higher_priority() {
        let installed = [pkg("same", 3, 600), pkg("better", 1, 300)];
        let result = admit(&installed, &[pkg("new", 3, 500)], 1000);

        assert!(result.plan.is_empty());
        assert_eq!(ids(&result.skipped), vec!["new"]);
        assert_eq!(ids(&result.retained), vec!["same", "better"]);
        assert_eq!(result.used_bytes, 900);
    }

    #[test]
    fn no_partial_eviction_when_deficit_not_covered() {
        let installed = [pkg("low", 9, 100), pkg("mid", 2, 800)];
        let result = admit(&installed, &[pkg("new", 5, 400)], 1000);

        // remaining 100, deficit 300, only "low" (100) is eligible.
        assert_eq!(ids(&result.skipped), vec!["new"]);
        assert_eq!(ids(&result.retained), vec!["low", "mid"]);
        assert_eq!(result.used_bytes, 900);
    }

    #[test]
    fn evicts_least_important_first_and_stops_when_covered() {
        let installed = [pkg("p6", 6, 300), pkg("p9", 9, 200), pkg("p7", 7, 300)];
        // remaining 200, deficit 300: p9 (200) then p7 (300) covers it.
        let result = admit(&installed, &[pkg("new", 1, 500)], 1000);

        assert_eq!(ids(&result.evicted()), vec!["p9", "p7"]);
        assert_eq!(ids(&result.retained), vec!["p6"]);
        assert_eq!(result.used_bytes, 800);
    }

    #[test]
    fn candidates_processed_in_stable_priority_order() {
        let candidates = [
            pkg("late", 5, 100),
            pkg("first-tie", 2, 100),
            pkg("second-tie", 2, 100),
            pkg("top", 0, 100),
        ];
        let result = admit(&[], &candidates, 1000);
        assert_eq!(
            ids(&result.admitted()),
            vec!["top", "first-tie", "second-tie", "late"]
        );
    }

    #[test]
    fn tie_order_decides_which_candidate_fits() {
        let candidates = [pkg("x", 1, 600), pkg("y", 1, 600)];
        let result = admit(&[], &candidates, 1000);
        assert_eq!(ids(&result.admitted()), vec!["x"]);
        assert_eq!(ids(&result.skipped), vec!["y"]);
    }

    #[test]
    fn oversize_candidate_always_skipped() {
        let installed = [pkg("low", 9, 500)];
        let result = admit(&installed, &[pkg("huge", 0, 1001)], 1000);
        assert_eq!(ids(&result.skipped), vec!["huge"]);
        assert_eq!(ids(&result.retained), vec!["low"]);
    }

    #[test]
    fn admitted_candidates_are_not_evicted_in_same_pass() {
        // "b" is admitted first (fits); "a" cannot displace it even though
        // it has a better priority, because "b" was never installed.
        let candidates = [pkg("b", 1, 600), pkg("a", 0, 0), pkg("c", 2, 500)];
        let result = admit(&[], &candidates, 1000);
        assert_eq!(ids(&result.admitted()), vec!["a", "b"]);
        assert_eq!(ids(&result.skipped), vec!["c"]);
    }

    #[test]
    fn zero_size_and_duplicates_accepted() {
        let candidates = [pkg("z", 1, 0), pkg("dup", 2, 10), pkg("dup", 2, 10)];
        let result = admit(&[], &candidates, 10);
        assert_eq!(ids(&result.admitted()), vec!["z", "dup"]);
        assert_eq!(ids(&result.skipped), vec!["dup"]);
        assert_eq!(result.used_bytes, 10);
    }

    #[test]
    fn overfull_installed_set_leaves_no_room() {
        let installed = [pkg("big", 1, 1500)];
        let result = admit(&installed, &[pkg("x", 2, 1)], 1000);
        // nothing lower priority to evict
        assert_eq!(ids(&result.skipped), vec!["x"]);
    }

    #[test]
    fn overage_counts_against_the_candidate() {
        // Capacity was lowered below what is already installed.
        let installed = [pkg("a", 1, 1200), pkg("b", 9, 100)];
        let result = admit(&installed, &[pkg("c", 2, 100)], 1000);
        // Evicting "b" frees 100 but the deficit is 400.
        assert!(result.plan.is_empty());
        assert_eq!(ids(&result.skipped), vec!["c"]);
        assert_eq!(ids(&result.retained), vec!["a", "b"]);

        let installed = [pkg("a", 1, 900), pkg("b", 9, 300)];
        let result = admit(&installed, &[pkg("c", 2, 100)], 1000);
        // Overage of 200 plus 100 for "c" is covered by evicting "b".
        assert_eq!(ids(&result.admitted()), vec!["c"]);
        assert_eq!(ids(&result.evicted()), vec!["b"]);
        assert_eq!(result.used_bytes, 1000);
    }

    #[test]
    fn used_bytes_never_exceeds_capacity() {
        // Deterministic pseudo-random grid over sizes and priorities.
        let mut seed: u64 = 0x9E37_79B9_7F4A_7C15;
        let mut next = move || {
            seed ^= seed << 13;
            seed ^= seed >> 7;
            seed ^= seed << 17;
            seed
        };

        for _ in 0..200 {
            let capacity = next() % 5000;
            let mut installed = Vec::new();
            let mut installed_bytes = 0;
            for i in 0..(next() % 6) {
                let size = next() % 1500;
                if installed_bytes + size <= capacity {
                    installed_bytes += size;
                    installed.push(pkg(&format!("i{i}"), (next() % 10) as i32, size));
                }
            }
            let candidates: Vec<_> = (0..(next() % 8))
                .map(|i| pkg(&format!("c{i}"), (next() % 10) as i32, next() % 2500))
                .collect();

            let result = admit(&installed, &candidates, capacity);
            assert!(result.used_bytes <= capacity);

            for placement in &result.plan {
                for victim in &placement.evicts {
                    assert!(victim.priority > placement.package.priority);
                }
            }
            assert_eq!(
                result.plan.len() + result.skipped.len(),
                candidates.len()
            );
        }
    }
}
