//! Live Table Implementation

use crate::window::FrequencyWindow;
use frame_codec::{decode_row, DecodedRow};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

/// Live table configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TableConfig {
    /// Maximum identifiers kept (default: 512)
    pub max_rows: usize,
    /// Frequency window span in milliseconds (default: 5000)
    pub frequency_window_ms: u64,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            max_rows: 512,
            frequency_window_ms: 5000,
        }
    }
}

/// One rendered row
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LiveRow {
    pub id: String,
    pub display: String,
}

struct Inner {
    /// Identifier → display text, in first-seen order
    rows: IndexMap<String, String>,
    /// Every identifier ever seen, sorted
    known_ids: BTreeSet<String>,
    filter: Option<String>,
    window: FrequencyWindow,
}

/// Latest row per CAN identifier, shared between the monitor loop and
/// display readers.
///
/// Eviction is by first insertion: refreshing an identifier keeps its
/// original position.
pub struct LiveTable {
    inner: Mutex<Inner>,
    max_rows: usize,
}

impl LiveTable {
    /// Create a new table
    pub fn new(config: TableConfig) -> Self {
        info!(
            "Creating live table (max {} rows, {} ms window)",
            config.max_rows, config.frequency_window_ms
        );
        Self {
            inner: Mutex::new(Inner {
                rows: IndexMap::new(),
                known_ids: BTreeSet::new(),
                filter: None,
                window: FrequencyWindow::new(config.frequency_window_ms),
            }),
            max_rows: config.max_rows.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A panicked writer leaves the table usable; the data is display-only
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Insert or replace the row for `id`, evicting the oldest-inserted
    /// identifiers when over capacity
    pub fn update(&self, id: &str, row: &DecodedRow) {
        let mut inner = self.lock();
        inner.rows.insert(id.to_string(), row.to_string());
        while inner.rows.len() > self.max_rows {
            if let Some((evicted, _)) = inner.rows.shift_remove_index(0) {
                debug!("Evicted live row {}", evicted);
            }
        }
        inner.known_ids.insert(id.to_string());
    }

    /// Decode a monitor line, update its row and count it toward the
    /// selected identifier's frequency
    pub fn observe_line(&self, raw: &str) -> Option<DecodedRow> {
        self.observe_line_at(raw, crate::now_ms())
    }

    /// [`Self::observe_line`] with an explicit clock
    pub fn observe_line_at(&self, raw: &str, now_ms: u64) -> Option<DecodedRow> {
        let row = decode_row(raw)?;
        self.update(&row.id, &row);
        self.record_observation_at(&row.id, now_ms);
        Some(row)
    }

    /// Ordered copy of all rows
    pub fn snapshot(&self) -> Vec<LiveRow> {
        self.lock()
            .rows
            .iter()
            .map(|(id, display)| LiveRow {
                id: id.clone(),
                display: display.clone(),
            })
            .collect()
    }

    /// Rows whose identifier starts with the active filter (all rows
    /// without one)
    pub fn filtered_snapshot(&self) -> Vec<LiveRow> {
        let inner = self.lock();
        inner
            .rows
            .iter()
            .filter(|(id, _)| match &inner.filter {
                Some(filter) => id.starts_with(filter.as_str()),
                None => true,
            })
            .map(|(id, display)| LiveRow {
                id: id.clone(),
                display: display.clone(),
            })
            .collect()
    }

    /// Number of rows held
    pub fn len(&self) -> usize {
        self.lock().rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every identifier seen so far, sorted
    pub fn known_ids(&self) -> Vec<String> {
        self.lock().known_ids.iter().cloned().collect()
    }

    /// Select an identifier (or none), restarting frequency measurement
    pub fn set_filter(&self, id: Option<&str>) {
        let mut inner = self.lock();
        inner.filter = id
            .map(|id| id.trim().to_ascii_uppercase())
            .filter(|id| !id.is_empty());
        inner.window.clear();
        info!("Live table filter: {:?}", inner.filter);
    }

    /// Currently selected identifier
    pub fn filter(&self) -> Option<String> {
        self.lock().filter.clone()
    }

    /// Count an observation of `id` if it is the selected identifier
    pub fn record_observation(&self, id: &str) {
        self.record_observation_at(id, crate::now_ms());
    }

    /// [`Self::record_observation`] with an explicit clock
    pub fn record_observation_at(&self, id: &str, now_ms: u64) {
        let mut inner = self.lock();
        let selected = matches!(&inner.filter, Some(filter) if filter.eq_ignore_ascii_case(id));
        if selected {
            inner.window.record(now_ms);
        }
    }

    /// Observations per second of the selected identifier
    pub fn current_frequency_hz(&self) -> f64 {
        self.frequency_hz_at(crate::now_ms())
    }

    /// [`Self::current_frequency_hz`] with an explicit clock
    pub fn frequency_hz_at(&self, now_ms: u64) -> f64 {
        self.lock().window.frequency_hz(now_ms)
    }

    /// Status text such as `Freq (7E8): 2.00 /s`
    pub fn frequency_label(&self) -> String {
        self.frequency_label_at(crate::now_ms())
    }

    /// [`Self::frequency_label`] with an explicit clock
    pub fn frequency_label_at(&self, now_ms: u64) -> String {
        let mut inner = self.lock();
        match inner.filter.clone() {
            Some(filter) => {
                let hz = inner.window.frequency_hz(now_ms);
                format!("Freq ({}): {:.2} /s", filter, hz)
            }
            None => "Freq: -".to_string(),
        }
    }

    /// Text rendering of the table for a terminal or log
    pub fn render(&self) -> String {
        let rows = self.filtered_snapshot();
        let mut out = String::from("--- CAN Live (by ID) ---\n");
        if rows.is_empty() {
            out.push_str("No data yet.\n");
        } else {
            for row in rows {
                let _ = writeln!(out, "{}", row.display);
            }
        }
        out
    }
}

impl Default for LiveTable {
    fn default() -> Self {
        Self::new(TableConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn table(max_rows: usize) -> LiveTable {
        LiveTable::new(TableConfig {
            max_rows,
            ..Default::default()
        })
    }

    fn row(id: &str) -> DecodedRow {
        DecodedRow {
            id: id.to_string(),
            bytes: vec!["00".into()],
        }
    }

    fn ids(table: &LiveTable) -> Vec<String> {
        table.snapshot().into_iter().map(|r| r.id).collect()
    }

    #[test]
    fn test_fifo_eviction() {
        let table = table(3);
        for id in ["AAA", "BBB", "CCC", "DDD"] {
            table.update(id, &row(id));
        }
        assert_eq!(ids(&table), vec!["BBB", "CCC", "DDD"]);
        // Everything seen is still suggested
        assert_eq!(table.known_ids(), vec!["AAA", "BBB", "CCC", "DDD"]);
    }

    #[test]
    fn test_refresh_does_not_change_eviction_order() {
        let table = table(3);
        for id in ["AAA", "BBB", "CCC"] {
            table.update(id, &row(id));
        }
        table.update(
            "BBB",
            &DecodedRow {
                id: "BBB".into(),
                bytes: vec!["FF".into()],
            },
        );
        table.update("DDD", &row("DDD"));
        table.update("EEE", &row("EEE"));

        // BBB was first inserted before CCC, so it goes first despite the refresh
        assert_eq!(ids(&table), vec!["CCC", "DDD", "EEE"]);
    }

    #[test]
    fn test_row_replaced_in_place() {
        let table = table(8);
        table.observe_line_at("7E8 03 41 0C 1A", 0).unwrap();
        table.observe_line_at("3A0 11", 0).unwrap();
        table.observe_line_at("7E8 03 41 0D 20", 0).unwrap();

        let rows = table.snapshot();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].display, "ID 7E8 03 41 0D 20");
        assert_eq!(rows[1].display, "ID 3A0 11");
    }

    #[test]
    fn test_snapshot_is_detached() {
        let table = table(8);
        table.observe_line_at("100 01", 0);
        let before = table.snapshot();
        table.observe_line_at("200 02", 0);
        assert_eq!(before.len(), 1);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_unparsable_lines_ignored() {
        let table = table(8);
        assert!(table.observe_line_at("OK", 0).is_none());
        assert!(table.is_empty());
    }

    #[test]
    fn test_frequency_only_counts_selected_id() {
        let table = table(8);
        table.set_filter(Some("7e8"));
        assert_eq!(table.filter().as_deref(), Some("7E8"));

        for i in 0..10 {
            table.observe_line_at("7E8 03 41 0C 1A", 1_000 + i * 100);
            table.observe_line_at("3A0 11", 1_000 + i * 100);
        }
        assert_eq!(table.frequency_hz_at(1_900), 2.0);
        assert_eq!(table.frequency_label_at(1_900), "Freq (7E8): 2.00 /s");
        // Pruned on read once the window has passed
        assert_eq!(table.frequency_hz_at(7_000), 0.0);
    }

    #[test]
    fn test_filter_change_resets_window() {
        let table = table(8);
        table.set_filter(Some("7E8"));
        table.record_observation_at("7E8", 100);
        table.record_observation_at("7E8", 200);
        table.set_filter(Some("3A0"));
        assert_eq!(table.frequency_hz_at(300), 0.0);

        table.set_filter(None);
        table.record_observation_at("3A0", 400);
        assert_eq!(table.frequency_hz_at(400), 0.0);
        assert_eq!(table.frequency_label_at(400), "Freq: -");
    }

    #[test]
    fn test_render_with_filter() {
        let table = table(8);
        assert_eq!(table.render(), "--- CAN Live (by ID) ---\nNo data yet.\n");

        table.observe_line_at("7E8 03 41", 0);
        table.observe_line_at("7E0 02 01", 0);
        table.observe_line_at("3A0", 0);
        table.set_filter(Some("7E"));
        assert_eq!(
            table.render(),
            "--- CAN Live (by ID) ---\nID 7E8 03 41\nID 7E0 02 01\n"
        );
    }

    proptest! {
        #[test]
        fn prop_never_exceeds_bound(
            bound in 1usize..16,
            ids in proptest::collection::vec("[0-9A-F]{3}", 0..64),
        ) {
            let table = table(bound);
            for id in &ids {
                table.update(id, &row(id));
                prop_assert!(table.len() <= bound);
            }
        }
    }
}
