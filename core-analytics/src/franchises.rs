//! Franchise clustering over the list's relation graph.

use core_library::{AnimeId, AnimeListEntry};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};

/// A connected group of at least two related entries in the user's list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FranchiseCluster {
    /// Shortest member title. A display heuristic only.
    pub canonical_title: String,
    /// Member ids, ascending.
    pub anime_ids: Vec<AnimeId>,
}

impl FranchiseCluster {
    pub fn len(&self) -> usize {
        self.anime_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.anime_ids.is_empty()
    }

    pub fn contains(&self, id: AnimeId) -> bool {
        self.anime_ids.binary_search(&id).is_ok()
    }
}

/// Undirected adjacency between entries of the list.
///
/// An edge exists when either entry cites the other. Relations whose target
/// is not in the list are dropped.
fn build_adjacency(entries: &[AnimeListEntry]) -> HashMap<AnimeId, BTreeSet<AnimeId>> {
    let in_list: HashSet<AnimeId> = entries.iter().map(|entry| entry.id).collect();
    let mut adjacency: HashMap<AnimeId, BTreeSet<AnimeId>> =
        in_list.iter().map(|id| (*id, BTreeSet::new())).collect();

    for entry in entries {
        for relation in entry.related_anime() {
            let target = relation.target_id;
            if target == entry.id || !in_list.contains(&target) {
                continue;
            }
            adjacency.entry(entry.id).or_default().insert(target);
            adjacency.entry(target).or_default().insert(entry.id);
        }
    }

    adjacency
}

/// Connected components of size two or more, largest first.
pub fn franchise_clusters(entries: &[AnimeListEntry]) -> Vec<FranchiseCluster> {
    let adjacency = build_adjacency(entries);
    let titles: HashMap<AnimeId, &str> = entries
        .iter()
        .map(|entry| (entry.id, entry.title.as_str()))
        .collect();

    let mut roots: Vec<AnimeId> = adjacency.keys().copied().collect();
    roots.sort_unstable();

    let mut visited: HashSet<AnimeId> = HashSet::with_capacity(roots.len());
    let mut clusters = Vec::new();

    for root in roots {
        if !visited.insert(root) {
            continue;
        }

        let mut component = vec![root];
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            for neighbour in adjacency.get(&id).into_iter().flatten() {
                if visited.insert(*neighbour) {
                    component.push(*neighbour);
                    stack.push(*neighbour);
                }
            }
        }

        if component.len() < 2 {
            continue;
        }
        component.sort_unstable();

        let canonical_title = component
            .iter()
            .filter_map(|id| titles.get(id).copied())
            .min_by(|a, b| a.chars().count().cmp(&b.chars().count()).then_with(|| a.cmp(b)))
            .unwrap_or_default()
            .to_string();

        clusters.push(FranchiseCluster {
            canonical_title,
            anime_ids: component,
        });
    }

    clusters.sort_by(|a, b| {
        b.len()
            .cmp(&a.len())
            .then_with(|| a.anime_ids.cmp(&b.anime_ids))
    });

    clusters
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{entry, related_to, titled};
    use core_library::ListStatus;

    #[test]
    fn test_chain_forms_single_cluster() {
        let entries = vec![
            related_to(entry(1, ListStatus::Completed, 8), 2),
            related_to(related_to(entry(2, ListStatus::Completed, 7), 1), 3),
            entry(3, ListStatus::Watching, 0),
            entry(4, ListStatus::Completed, 9),
        ];

        let clusters = franchise_clusters(&entries);

        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].anime_ids, vec![1, 2, 3]);
        assert!(!clusters.iter().any(|cluster| cluster.contains(4)));
    }

    #[test]
    fn test_one_sided_relation_is_undirected() {
        // Only 3 cites 1; the edge still joins them.
        let entries = vec![
            entry(1, ListStatus::Completed, 8),
            related_to(entry(3, ListStatus::Completed, 7), 1),
        ];

        let clusters = franchise_clusters(&entries);

        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].anime_ids, vec![1, 3]);
    }

    #[test]
    fn test_relations_outside_list_are_not_traversed() {
        // 1 and 2 both point at 99, which is not in the list.
        let entries = vec![
            related_to(entry(1, ListStatus::Completed, 8), 99),
            related_to(entry(2, ListStatus::Completed, 7), 99),
        ];

        assert!(franchise_clusters(&entries).is_empty());
    }

    #[test]
    fn test_self_reference_is_not_a_cluster() {
        let entries = vec![related_to(entry(1, ListStatus::Completed, 8), 1)];
        assert!(franchise_clusters(&entries).is_empty());
    }

    #[test]
    fn test_canonical_title_is_shortest() {
        let entries = vec![
            titled(related_to(entry(1, ListStatus::Completed, 8), 2), "Mob Psycho 100 II"),
            titled(related_to(entry(2, ListStatus::Completed, 9), 3), "Mob Psycho 100"),
            titled(entry(3, ListStatus::Completed, 9), "Mob Psycho 100 III"),
        ];

        let clusters = franchise_clusters(&entries);
        assert_eq!(clusters[0].canonical_title, "Mob Psycho 100");
    }

    #[test]
    fn test_clusters_sorted_by_size() {
        let entries = vec![
            related_to(entry(1, ListStatus::Completed, 8), 2),
            entry(2, ListStatus::Completed, 8),
            related_to(entry(10, ListStatus::Completed, 8), 11),
            related_to(entry(11, ListStatus::Completed, 8), 12),
            entry(12, ListStatus::Completed, 8),
        ];

        let sizes: Vec<_> = franchise_clusters(&entries)
            .iter()
            .map(FranchiseCluster::len)
            .collect();
        assert_eq!(sizes, vec![3, 2]);
    }
}
