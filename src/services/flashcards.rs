use std::collections::HashSet;

use rand::seq::IndexedRandom;
use rand::Rng;
use serde::Serialize;

use crate::store::{ProgressStore, StoreError, WordCatalog};
use crate::types::WordRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "level", rename_all = "camelCase")]
pub enum CardFilter {
    Level(u8),
    All,
    Difficult,
}

impl CardFilter {
    pub fn label(self) -> String {
        match self {
            Self::Level(level) => format!("Level {level}"),
            Self::All => "All".to_string(),
            Self::Difficult => "Difficult".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum CardDraw {
    Card {
        word: WordRecord,
        remaining: usize,
        is_difficult: bool,
    },
    /// Every card in the deck has been shown.
    Complete { total: usize },
    /// The filter matched no words.
    Empty,
}

/// Resolves the cards a filter selects. Difficult ids missing from the
/// catalog are skipped.
pub async fn load_flashcard_pool<C, S>(
    catalog: &C,
    store: &S,
    user_id: &str,
    filter: CardFilter,
) -> Result<Vec<WordRecord>, StoreError>
where
    C: WordCatalog + ?Sized,
    S: ProgressStore + ?Sized,
{
    match filter {
        CardFilter::Level(level) => catalog.words_by_level(level).await,
        CardFilter::All => catalog.all_words().await,
        CardFilter::Difficult => {
            let mut cards = Vec::new();
            for word_id in store.difficult_words(user_id).await? {
                if let Some(word) = catalog.word_by_id(&word_id).await? {
                    cards.push(word);
                }
            }
            Ok(cards)
        }
    }
}

#[derive(Debug, Clone)]
pub struct FlashcardDeck {
    filter: CardFilter,
    cards: Vec<WordRecord>,
    difficult: HashSet<String>,
    studied: HashSet<String>,
    current: Option<WordRecord>,
}

impl FlashcardDeck {
    pub fn new(filter: CardFilter, cards: Vec<WordRecord>, difficult: impl IntoIterator<Item = String>) -> Self {
        Self {
            filter,
            cards,
            difficult: difficult.into_iter().collect(),
            studied: HashSet::new(),
            current: None,
        }
    }

    /// Replaces the deck for a new filter and forgets what was studied.
    pub fn change_filter(&mut self, filter: CardFilter, cards: Vec<WordRecord>) {
        self.filter = filter;
        self.cards = cards;
        self.studied.clear();
        self.current = None;
    }

    /// Draws a random card not yet shown in this pass and marks it studied.
    pub fn draw<R: Rng + ?Sized>(&mut self, rng: &mut R) -> CardDraw {
        if self.cards.is_empty() {
            return CardDraw::Empty;
        }
        let available: Vec<&WordRecord> = self
            .cards
            .iter()
            .filter(|c| !self.studied.contains(&c.id))
            .collect();
        let Some(card) = available.choose(rng).map(|c| (*c).clone()) else {
            self.current = None;
            return CardDraw::Complete {
                total: self.cards.len(),
            };
        };

        self.studied.insert(card.id.clone());
        self.current = Some(card.clone());
        CardDraw::Card {
            is_difficult: self.difficult.contains(&card.id),
            remaining: self.remaining(),
            word: card,
        }
    }

    pub fn restart(&mut self) {
        self.studied.clear();
        self.current = None;
    }

    pub fn remaining(&self) -> usize {
        self.cards
            .iter()
            .filter(|c| !self.studied.contains(&c.id))
            .count()
    }

    pub fn is_complete(&self) -> bool {
        !self.cards.is_empty() && self.remaining() == 0
    }

    pub fn filter(&self) -> CardFilter {
        self.filter
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub fn current(&self) -> Option<&WordRecord> {
        self.current.as_ref()
    }

    pub fn is_difficult(&self, word_id: &str) -> bool {
        self.difficult.contains(word_id)
    }

    /// Mirrors a flag already persisted through [`toggle_difficult`].
    pub fn set_difficult(&mut self, word_id: &str, difficult: bool) {
        if difficult {
            self.difficult.insert(word_id.to_string());
        } else {
            self.difficult.remove(word_id);
        }
    }
}

/// Flips the difficult mark for a word and persists the whole set. Returns
/// the new state only after the write succeeded.
pub async fn toggle_difficult<S: ProgressStore + ?Sized>(
    store: &S,
    user_id: &str,
    word_id: &str,
) -> Result<bool, StoreError> {
    let mut marked = store.difficult_words(user_id).await?;
    let now_difficult = if marked.remove(word_id) {
        false
    } else {
        marked.insert(word_id.to_string());
        true
    };
    store.set_difficult_words(user_id, &marked).await?;
    tracing::debug!(user_id, word_id, difficult = now_difficult, "toggled difficult word");
    Ok(now_difficult)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn cards(n: usize) -> Vec<WordRecord> {
        (0..n).map(|i| WordRecord::new(format!("c{i}"), format!("card{i}"), 2)).collect()
    }

    #[test]
    fn test_draws_every_card_once_then_completes() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let mut deck = FlashcardDeck::new(CardFilter::Level(2), cards(3), Vec::new());
        let mut seen = HashSet::new();
        for expected_remaining in [2, 1, 0] {
            match deck.draw(&mut rng) {
                CardDraw::Card { word, remaining, .. } => {
                    assert_eq!(remaining, expected_remaining);
                    assert!(seen.insert(word.id));
                }
                other => panic!("unexpected draw {other:?}"),
            }
        }
        assert_eq!(deck.draw(&mut rng), CardDraw::Complete { total: 3 });
        assert!(deck.is_complete());

        deck.restart();
        assert_eq!(deck.remaining(), 3);
    }

    #[test]
    fn test_empty_deck_and_filter_change() {
        let mut rng = ChaCha8Rng::seed_from_u64(6);
        let mut deck = FlashcardDeck::new(CardFilter::Difficult, Vec::new(), Vec::new());
        assert_eq!(deck.draw(&mut rng), CardDraw::Empty);

        deck.change_filter(CardFilter::All, cards(2));
        assert!(matches!(deck.draw(&mut rng), CardDraw::Card { remaining: 1, .. }));
        deck.change_filter(CardFilter::Level(2), cards(2));
        assert_eq!(deck.remaining(), 2);
        assert_eq!(deck.filter().label(), "Level 2");
    }

    #[tokio::test]
    async fn test_toggle_difficult_persists() {
        let store = MemoryStore::with_words(cards(4));
        assert!(toggle_difficult(&store, "u", "c1").await.unwrap());
        assert!(toggle_difficult(&store, "u", "c3").await.unwrap());
        assert!(!toggle_difficult(&store, "u", "c1").await.unwrap());

        let pool = load_flashcard_pool(&store, &store, "u", CardFilter::Difficult)
            .await
            .unwrap();
        let ids: Vec<&str> = pool.iter().map(|w| w.id.as_str()).collect();
        assert_eq!(ids, vec!["c3"]);
    }

    #[tokio::test]
    async fn test_toggle_difficult_surfaces_write_failure() {
        let store = MemoryStore::new();
        store.set_fail_writes(true);
        assert!(toggle_difficult(&store, "u", "c1").await.is_err());
        store.set_fail_writes(false);
        assert!(store.difficult_words("u").await.unwrap().is_empty());
    }
}
