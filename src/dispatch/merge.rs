//! Per-plugin batch bookkeeping and the merged, sorted view
use crate::result::PluginResult;

/// Latest batch per plugin slot. Slots follow candidate order so that equal
/// scores always break ties the same way.
#[derive(Debug)]
pub struct ResultMerger {
    slots: Vec<Option<Vec<PluginResult>>>,
    limit: usize,
}

impl ResultMerger {
    pub fn new(slot_count: usize, limit: usize) -> Self {
        Self {
            slots: vec![None; slot_count],
            limit,
        }
    }

    /// Replaces the batch held for `slot`. Batches are never appended.
    pub fn replace(&mut self, slot: usize, batch: Vec<PluginResult>) {
        if let Some(entry) = self.slots.get_mut(slot) {
            *entry = Some(batch);
        }
    }

    /// Flattened slots, sorted by score (stable), de-duplicated by result
    /// identity and cut to the limit.
    pub fn view(&self) -> Vec<PluginResult> {
        let mut merged: Vec<&PluginResult> = self.slots.iter().flatten().flatten().collect();
        merged.sort_by(|a, b| b.score.cmp(&a.score));

        let mut out: Vec<PluginResult> = Vec::with_capacity(merged.len().min(self.limit));
        for result in merged {
            if out.len() >= self.limit {
                break;
            }
            if out.iter().any(|kept| kept.same_identity(result)) {
                continue;
            }
            out.push(result.clone());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(plugin: &str, title: &str, score: i32) -> PluginResult {
        let mut r = PluginResult::new(title, "", score);
        r.plugin_id = plugin.to_string();
        r
    }

    fn titles(results: &[PluginResult]) -> Vec<&str> {
        results.iter().map(|r| r.title.as_str()).collect()
    }

    #[test]
    fn newer_batch_replaces_older_one() {
        let mut merger = ResultMerger::new(2, 10);
        merger.replace(0, vec![result("web", "draft", 5)]);
        merger.replace(1, vec![result("calc", "42", 1)]);
        merger.replace(0, vec![result("web", "final", 7), result("web", "alt", 2)]);
        assert_eq!(titles(&merger.view()), vec!["final", "alt", "42"]);
    }

    #[test]
    fn equal_scores_keep_slot_order() {
        let mut merger = ResultMerger::new(3, 10);
        merger.replace(2, vec![result("c", "third", 5)]);
        merger.replace(0, vec![result("a", "first", 5)]);
        merger.replace(1, vec![result("b", "second", 5)]);
        assert_eq!(titles(&merger.view()), vec!["first", "second", "third"]);
    }

    #[test]
    fn duplicates_and_overflow_are_dropped() {
        let mut merger = ResultMerger::new(1, 2);
        merger.replace(
            0,
            vec![
                result("a", "x", 9),
                result("a", "x", 3),
                result("a", "y", 8),
                result("a", "z", 1),
            ],
        );
        let view = merger.view();
        assert_eq!(titles(&view), vec!["x", "y"]);
        assert_eq!(view[0].score, 9);
    }

    #[test]
    fn out_of_range_slot_is_ignored() {
        let mut merger = ResultMerger::new(1, 5);
        merger.replace(3, vec![result("a", "x", 1)]);
        assert!(merger.view().is_empty());
    }
}
