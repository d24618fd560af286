use crate::types::Category;
use serde::{Deserialize, Serialize};

/// Genres called during a match
pub const BEAT_GENRES: &[&str] = &[
    "Trap",
    "Hip-Hop",
    "Drill",
    "Boom Bap",
    "Lo-Fi",
    "Jazz",
    "R&B",
    "Soul",
    "Funk",
    "Electronic",
    "House",
    "Techno",
    "Dubstep",
    "Ambient",
    "Rock",
    "Metal",
    "Pop",
    "Country",
    "Reggae",
    "Latin",
    "Afrobeat",
    "K-Pop",
    "Indie",
    "Classical",
    "Blues",
];

/// Immutable set of category labels, kept in insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryPool {
    labels: Vec<Category>,
}

impl CategoryPool {
    /// Build a pool, trimming labels and dropping blanks and duplicates
    pub fn new<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut unique: Vec<Category> = Vec::new();
        for label in labels {
            let label = label.into().trim().to_string();
            if !label.is_empty() && !unique.contains(&label) {
                unique.push(label);
            }
        }
        Self { labels: unique }
    }

    pub fn beat_genres() -> Self {
        Self::new(BEAT_GENRES.iter().copied())
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn contains(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }

    pub fn labels(&self) -> &[Category] {
        &self.labels
    }
}

impl Default for CategoryPool {
    fn default() -> Self {
        Self::beat_genres()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_beat_genres_pool() {
        let pool = CategoryPool::beat_genres();
        assert_eq!(pool.len(), 25);
        assert!(pool.contains("Boom Bap"));
    }

    #[test]
    fn test_pool_drops_duplicates_and_blanks() {
        let pool = CategoryPool::new(["Jazz", " Jazz ", "", "Soul"]);
        assert_eq!(pool.labels(), &["Jazz".to_string(), "Soul".to_string()]);
    }
}
