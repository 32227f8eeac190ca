//! Pinned results and selection-frequency boosts applied on top of plugin scores
use crate::error::Result as RflaunchResult;
use crate::result::{PluginResult, ResultIdentity};
use log::{debug, warn};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Score given to a pinned result; nothing can sort above it.
pub const PINNED_SCORE: i32 = i32::MAX;

/// Highest score an unpinned result can end up with.
pub const MAX_UNPINNED_SCORE: i32 = PINNED_SCORE - 1;

/// Points added per recorded selection.
pub const SELECTION_WEIGHT: i32 = 10;

const PINNED_FILE: &str = "pinned.json";
const SELECTIONS_FILE: &str = "selections.json";

/// Score after the overlay: pinned beats everything, otherwise the selection
/// boost is added unless the plugin asked to keep its raw scores. Unpinned
/// scores are capped below [`PINNED_SCORE`].
pub fn overlay_score(
    result: &PluginResult,
    pinned: Option<&ResultIdentity>,
    selection_count: u32,
    keep_raw_score: bool,
) -> i32 {
    if let Some(pin) = pinned {
        if pin.plugin_id == result.plugin_id
            && pin.title == result.title
            && pin.subtitle == result.subtitle
        {
            return PINNED_SCORE;
        }
    }
    if keep_raw_score {
        return result.score.min(MAX_UNPINNED_SCORE);
    }
    let boost = i32::try_from(selection_count)
        .unwrap_or(i32::MAX)
        .saturating_mul(SELECTION_WEIGHT);
    result.score.saturating_add(boost).min(MAX_UNPINNED_SCORE)
}

/// At most one pinned result per exact raw query.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct PinnedRecords {
    records: HashMap<String, ResultIdentity>,
}

impl PinnedRecords {
    pub fn get(&self, raw_query: &str) -> Option<&ResultIdentity> {
        self.records.get(raw_query)
    }

    pub fn pin(&mut self, raw_query: &str, identity: ResultIdentity) {
        self.records.insert(raw_query.to_string(), identity);
    }

    pub fn unpin(&mut self, raw_query: &str) -> Option<ResultIdentity> {
        self.records.remove(raw_query)
    }

    pub fn is_pinned(&self, raw_query: &str, result: &PluginResult) -> bool {
        self.get(raw_query)
            .is_some_and(|pin| *pin == result.identity())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// How often each result has been picked. Counts only ever grow.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct SelectionFrequency {
    #[serde(with = "identity_counts")]
    counts: HashMap<ResultIdentity, u32>,
}

impl SelectionFrequency {
    pub fn count(&self, identity: &ResultIdentity) -> u32 {
        self.counts.get(identity).copied().unwrap_or(0)
    }

    pub fn record(&mut self, identity: ResultIdentity) -> u32 {
        let count = self.counts.entry(identity).or_insert(0);
        *count = count.saturating_add(1);
        *count
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

// JSON maps need string keys, so identities are stored as a list of entries.
mod identity_counts {
    use super::ResultIdentity;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::collections::HashMap;

    #[derive(Serialize, Deserialize)]
    struct Record {
        #[serde(flatten)]
        identity: ResultIdentity,
        count: u32,
    }

    pub fn serialize<S: Serializer>(
        counts: &HashMap<ResultIdentity, u32>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let mut records: Vec<Record> = counts
            .iter()
            .map(|(identity, count)| Record {
                identity: identity.clone(),
                count: *count,
            })
            .collect();
        records.sort_by(|a, b| {
            (&a.identity.plugin_id, &a.identity.title, &a.identity.subtitle).cmp(&(
                &b.identity.plugin_id,
                &b.identity.title,
                &b.identity.subtitle,
            ))
        });
        records.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<HashMap<ResultIdentity, u32>, D::Error> {
        let records = Vec::<Record>::deserialize(deserializer)?;
        Ok(records
            .into_iter()
            .map(|record| (record.identity, record.count))
            .collect())
    }
}

/// Shared owner of the pinned and selection maps. Mutated from the UI side,
/// read from dispatch workers.
#[derive(Debug, Default)]
pub struct RankingStore {
    pinned: RwLock<PinnedRecords>,
    selections: RwLock<SelectionFrequency>,
    data_dir: Option<PathBuf>,
}

impl RankingStore {
    /// In-memory store that never touches disk.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads both maps from `data_dir`. Missing or corrupt files start empty.
    pub fn open(data_dir: &Path) -> Self {
        Self {
            pinned: RwLock::new(read_json(&data_dir.join(PINNED_FILE))),
            selections: RwLock::new(read_json(&data_dir.join(SELECTIONS_FILE))),
            data_dir: Some(data_dir.to_path_buf()),
        }
    }

    /// Score of `result` for the query `raw_query` after the overlay.
    pub fn adjusted_score(&self, raw_query: &str, result: &PluginResult, keep_raw_score: bool) -> i32 {
        let pinned = self.pinned.read();
        let count = if keep_raw_score {
            0
        } else {
            self.selections.read().count(&result.identity())
        };
        overlay_score(result, pinned.get(raw_query), count, keep_raw_score)
    }

    pub fn pin(&self, raw_query: &str, result: &PluginResult) {
        self.pinned.write().pin(raw_query, result.identity());
        debug!("Pinned '{}' for query '{raw_query}'", result.title);
    }

    pub fn unpin(&self, raw_query: &str) -> bool {
        self.pinned.write().unpin(raw_query).is_some()
    }

    pub fn is_pinned(&self, raw_query: &str, result: &PluginResult) -> bool {
        self.pinned.read().is_pinned(raw_query, result)
    }

    pub fn record_selection(&self, result: &PluginResult) -> u32 {
        self.selections.write().record(result.identity())
    }

    pub fn selection_count(&self, result: &PluginResult) -> u32 {
        self.selections.read().count(&result.identity())
    }

    /// Writes both maps back to the data directory, if the store has one.
    pub fn save(&self) -> RflaunchResult<()> {
        let Some(dir) = &self.data_dir else {
            return Ok(());
        };
        fs::create_dir_all(dir)?;
        fs::write(
            dir.join(PINNED_FILE),
            serde_json::to_string_pretty(&*self.pinned.read())?,
        )?;
        fs::write(
            dir.join(SELECTIONS_FILE),
            serde_json::to_string_pretty(&*self.selections.read())?,
        )?;
        Ok(())
    }
}

fn read_json<T: Default + for<'de> Deserialize<'de>>(path: &Path) -> T {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return T::default(),
        Err(e) => {
            warn!("Failed to read {}: {}", path.display(), e);
            return T::default();
        }
    };
    serde_json::from_str(&content).unwrap_or_else(|e| {
        warn!("Ignoring corrupt ranking data in {}: {}", path.display(), e);
        T::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn result(plugin: &str, title: &str, score: i32) -> PluginResult {
        let mut r = PluginResult::new(title, "", score);
        r.plugin_id = plugin.to_string();
        r
    }

    #[test]
    fn pinned_result_gets_max_score() {
        let r = result("a", "Alpha", 3);
        let pin = r.identity();
        assert_eq!(overlay_score(&r, Some(&pin), 0, false), PINNED_SCORE);
        assert_eq!(overlay_score(&r, Some(&pin), 0, true), PINNED_SCORE);
    }

    #[test]
    fn pin_for_other_result_is_ignored() {
        let r = result("a", "Alpha", 3);
        let other = result("a", "Beta", 3).identity();
        assert_eq!(overlay_score(&r, Some(&other), 2, false), 23);
    }

    #[test]
    fn selection_boost_respects_keep_raw_score() {
        let r = result("b", "Bravo", 10);
        assert_eq!(overlay_score(&r, None, 3, false), 40);
        assert_eq!(overlay_score(&r, None, 3, true), 10);
    }

    #[test]
    fn unpinned_scores_stay_below_pin() {
        let top = result("b", "x", i32::MAX);
        assert_eq!(overlay_score(&top, None, 0, true), MAX_UNPINNED_SCORE);
        assert_eq!(overlay_score(&top, None, 0, false), MAX_UNPINNED_SCORE);
        let boosted = result("b", "y", i32::MAX - 1);
        assert_eq!(overlay_score(&boosted, None, 5, false), MAX_UNPINNED_SCORE);
    }

    #[test]
    fn store_applies_pin_only_for_exact_raw_query() {
        let store = RankingStore::new();
        let r = result("a", "Alpha", 1);
        store.pin("alp", &r);
        assert_eq!(store.adjusted_score("alp", &r, false), PINNED_SCORE);
        assert_eq!(store.adjusted_score("alpha", &r, false), 1);
        assert!(store.unpin("alp"));
        assert_eq!(store.adjusted_score("alp", &r, false), 1);
    }

    #[test]
    fn store_persists_both_maps() {
        let dir = TempDir::new().unwrap();
        let r = result("b", "Bravo", 10);
        {
            let store = RankingStore::open(dir.path());
            store.record_selection(&r);
            store.record_selection(&r);
            store.pin("br", &r);
            store.save().unwrap();
        }

        let reopened = RankingStore::open(dir.path());
        assert_eq!(reopened.selection_count(&r), 2);
        assert!(reopened.is_pinned("br", &r));
    }

    #[test]
    fn corrupt_files_start_empty() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(PINNED_FILE), "{not json").unwrap();
        let store = RankingStore::open(dir.path());
        assert!(!store.is_pinned("x", &result("a", "x", 0)));
    }
}
