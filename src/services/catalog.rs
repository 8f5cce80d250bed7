use crate::store::{StoreError, WordCatalog};
use crate::types::{WordRecord, MAX_WORD_LEVEL, MIN_WORD_LEVEL};

pub const SEARCH_LIMIT: usize = 100;

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("word id is empty")]
    EmptyId,
    #[error("word text is empty")]
    EmptyWord,
    #[error("level {0} outside 1..=5")]
    InvalidLevel(u8),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Admin word search. Sorts by word, applies the level filter and the row
/// limit, then keeps words whose text or definition contains `term`
/// ignoring case. The term filter runs after the limit.
pub fn search_words(
    words: &[WordRecord],
    term: Option<&str>,
    level: Option<u8>,
    limit: usize,
) -> Vec<WordRecord> {
    let mut matched: Vec<&WordRecord> = words
        .iter()
        .filter(|w| level.map_or(true, |l| w.level == l))
        .collect();
    matched.sort_by(|a, b| a.word.cmp(&b.word));
    matched.truncate(limit);

    let term = term.map(str::to_lowercase).filter(|t| !t.is_empty());
    matched
        .into_iter()
        .filter(|w| match &term {
            Some(t) => {
                w.word.to_lowercase().contains(t)
                    || w
                        .definition
                        .as_deref()
                        .is_some_and(|d| d.to_lowercase().contains(t))
            }
            None => true,
        })
        .cloned()
        .collect()
}

pub fn validate_word(word: &WordRecord) -> Result<(), CatalogError> {
    if word.id.trim().is_empty() {
        return Err(CatalogError::EmptyId);
    }
    if word.word.trim().is_empty() {
        return Err(CatalogError::EmptyWord);
    }
    if !(MIN_WORD_LEVEL..=MAX_WORD_LEVEL).contains(&word.level) {
        return Err(CatalogError::InvalidLevel(word.level));
    }
    Ok(())
}

pub async fn save_word<C: WordCatalog + ?Sized>(catalog: &C, word: WordRecord) -> Result<(), CatalogError> {
    validate_word(&word)?;
    let word_id = word.id.clone();
    catalog.upsert_word(word).await?;
    tracing::info!(word_id = %word_id, "saved word");
    Ok(())
}
