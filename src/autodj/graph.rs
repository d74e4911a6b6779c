//! The mood graph: a static undirected genre affinity graph
//!
//! Transitions only follow edges, so the station drifts between related
//! moods instead of jumping across the map.

use std::collections::HashMap;
use std::sync::OnceLock;

/// A node in the mood graph.
#[derive(Debug, Clone)]
pub struct Genre {
    pub name: &'static str,
    pub adjacent: &'static [&'static str],
}

const EDGES: &[(&str, &[&str])] = &[
    ("ambient", &["chillwave", "classical"]),
    (
        "chillwave",
        &["ambient", "lofi hip hop", "classical", "synthwave"],
    ),
    ("lofi hip hop", &["chillwave", "jazz"]),
    ("jazz", &["lofi hip hop", "bossa nova", "acoustic folk"]),
    ("bossa nova", &["jazz"]),
    ("acoustic folk", &["jazz"]),
    ("classical", &["ambient", "chillwave", "cinematic"]),
    ("cinematic", &["classical", "indie rock"]),
    ("synthwave", &["chillwave", "electronic", "indie rock"]),
    ("electronic", &["synthwave", "drum and bass", "disco funk"]),
    ("drum and bass", &["electronic"]),
    ("disco funk", &["electronic", "rock"]),
    ("indie rock", &["cinematic", "synthwave", "rock"]),
    ("rock", &["indie rock", "disco funk"]),
];

/// The full mood graph, keyed by genre name.
pub fn mood_graph() -> &'static HashMap<&'static str, Genre> {
    static GRAPH: OnceLock<HashMap<&'static str, Genre>> = OnceLock::new();
    GRAPH.get_or_init(|| {
        EDGES
            .iter()
            .map(|&(name, adjacent)| (name, Genre { name, adjacent }))
            .collect()
    })
}

/// All genre names in the mood graph.
pub fn genre_names() -> Vec<&'static str> {
    mood_graph().keys().copied().collect()
}

/// Whether a genre exists in the mood graph.
pub fn is_valid_genre(name: &str) -> bool {
    mood_graph().contains_key(name)
}

/// Neighbors of a genre, or an empty slice for unknown genres.
pub fn adjacent_genres(name: &str) -> &'static [&'static str] {
    mood_graph().get(name).map(|g| g.adjacent).unwrap_or(&[])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{HashSet, VecDeque};

    #[test]
    fn fourteen_genres() {
        assert_eq!(mood_graph().len(), 14);
    }

    #[test]
    fn every_genre_has_neighbors() {
        for (name, genre) in mood_graph() {
            assert!(!genre.adjacent.is_empty(), "genre {name:?} has no neighbors");
        }
    }

    #[test]
    fn adjacency_is_symmetric() {
        for (name, genre) in mood_graph() {
            for adj in genre.adjacent {
                let neighbor = mood_graph()
                    .get(adj)
                    .unwrap_or_else(|| panic!("{name:?} lists unknown genre {adj:?}"));
                assert!(
                    neighbor.adjacent.contains(name),
                    "asymmetric edge: {name:?} -> {adj:?} exists but not the reverse"
                );
            }
        }
    }

    #[test]
    fn graph_is_fully_connected() {
        // BFS from any node must reach all 14 genres.
        let start = *mood_graph().keys().next().unwrap();
        let mut visited: HashSet<&str> = HashSet::from([start]);
        let mut queue = VecDeque::from([start]);

        while let Some(current) = queue.pop_front() {
            for &adj in adjacent_genres(current) {
                if visited.insert(adj) {
                    queue.push_back(adj);
                }
            }
        }

        assert_eq!(
            visited.len(),
            mood_graph().len(),
            "unreachable genres exist"
        );
    }

    #[test]
    fn genre_name_consistency() {
        for (key, genre) in mood_graph() {
            assert_eq!(*key, genre.name);
        }
    }

    #[test]
    fn validity_checks() {
        assert!(is_valid_genre("ambient"));
        assert!(is_valid_genre("lofi hip hop"));
        assert!(is_valid_genre("drum and bass"));
        assert!(!is_valid_genre("metal"));
        assert!(!is_valid_genre(""));
        assert!(!is_valid_genre("Ambient")); // case sensitive
    }

    #[test]
    fn genre_names_are_unique_and_valid() {
        let names = genre_names();
        assert_eq!(names.len(), mood_graph().len());
        let mut seen = HashSet::new();
        for name in names {
            assert!(seen.insert(name), "duplicate genre name {name:?}");
            assert!(is_valid_genre(name));
        }
    }
}
