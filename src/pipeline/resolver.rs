//! Asset resolution: reconcile a product's normalized name against the
//! downloads index. Three ordered tiers, stopping at the first hit; a miss
//! is reported by the caller, never fatal.

use std::collections::HashSet;
use tracing::debug;

use super::downloads_index::{DownloadsIndex, DownloadsIndexEntry};

/// Resolve a normalized product key against the index.
///
/// 1. Exact key match.
/// 2. Substring match in either direction, first hit in index order.
/// 3. Token overlap: highest intersection of `_`-separated word sets wins,
///    provided it reaches `min_token_overlap`; ties go to the entry
///    encountered first.
pub fn resolve<'a>(
    product_key: &str,
    index: &'a DownloadsIndex,
    min_token_overlap: usize,
) -> Option<&'a DownloadsIndexEntry> {
    if let Some(entry) = index.get(product_key) {
        return Some(entry);
    }

    if let Some(entry) = index
        .iter()
        .find(|e| e.key.contains(product_key) || product_key.contains(&e.key))
    {
        debug!("substring match: '{}' -> '{}'", product_key, entry.key);
        return Some(entry);
    }

    let product_words: HashSet<&str> = tokens(product_key);
    let mut best: Option<&DownloadsIndexEntry> = None;
    let mut best_score = 0usize;
    for entry in index.iter() {
        let score = tokens(&entry.key).intersection(&product_words).count();
        // Strict improvement only, so the first-encountered entry wins ties.
        if score > best_score && score >= min_token_overlap {
            best_score = score;
            best = Some(entry);
        }
    }
    if let Some(entry) = best {
        debug!(
            "token-overlap match ({} words): '{}' -> '{}'",
            best_score, product_key, entry.key
        );
    }
    best
}

fn tokens(key: &str) -> HashSet<&str> {
    key.split('_').filter(|t| !t.is_empty()).collect()
}
