// src/session.rs

use chrono::{DateTime, Local};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{watch, RwLock};
use tracing::info;

use crate::{
    catalog::{self, Indicator},
    table::{ObservationTable, YearRange},
};

/// Initial slider selection.
pub const DEFAULT_SELECTION: (i32, i32) = (2005, 2006);

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Whether the scheduler has delivered a table yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Phase {
    Idle,
    Fetched,
}

/// What the user has picked, plus the submit bookkeeping.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewState {
    pub indicator: Indicator,
    pub years: YearRange,
    pub submit_count: u64,
    pub last_fetched_at: Option<DateTime<Local>>,
    /// Upper bound of the year slider; grows by one on every submit.
    pub slider_max: i32,
}

impl ViewState {
    pub fn new(slider_min: i32, slider_max: i32) -> Self {
        let (start, end) = DEFAULT_SELECTION;
        let years = YearRange::new(start.max(slider_min), end.min(slider_max))
            .unwrap_or_else(|_| YearRange::single(slider_min));
        Self {
            indicator: catalog::default_indicator(),
            years,
            submit_count: 0,
            last_fetched_at: None,
            slider_max,
        }
    }

    pub fn submit_count_text(&self) -> String {
        format!("Submit Count: {}", self.submit_count)
    }

    pub fn last_fetched_text(&self) -> String {
        match self.last_fetched_at {
            Some(ts) => format!("Data Last Fetched: {}", ts.format(TIMESTAMP_FORMAT)),
            None => "Data Last Fetched: None".to_string(),
        }
    }
}

/// Sole writer of the session's table, owned by the refresh scheduler.
/// Not `Clone`.
#[derive(Debug)]
pub struct TableWriter {
    tx: watch::Sender<Option<Arc<ObservationTable>>>,
}

impl TableWriter {
    /// Replace the stored table wholesale.
    pub fn replace(&self, table: ObservationTable) {
        let rows = table.len();
        let first = self.tx.send_replace(Some(Arc::new(table))).is_none();
        if first {
            info!(rows, "session fetched first table");
        } else {
            info!(rows, "session table replaced");
        }
    }
}

/// Session-scoped state: the last table plus the view.
#[derive(Debug)]
pub struct SessionStore {
    table: watch::Receiver<Option<Arc<ObservationTable>>>,
    view: RwLock<ViewState>,
    slider_min: i32,
}

impl SessionStore {
    /// A fresh `Idle` session and the writer handle for its table.
    pub fn new(slider_min: i32, slider_max: i32) -> (Self, TableWriter) {
        let (tx, rx) = watch::channel(None);
        let store = Self {
            table: rx,
            view: RwLock::new(ViewState::new(slider_min, slider_max)),
            slider_min,
        };
        (store, TableWriter { tx })
    }

    pub fn phase(&self) -> Phase {
        if self.table.borrow().is_some() {
            Phase::Fetched
        } else {
            Phase::Idle
        }
    }

    /// Current table snapshot; empty while `Idle`.
    pub fn table(&self) -> Arc<ObservationTable> {
        self.table.borrow().clone().unwrap_or_default()
    }

    /// Receiver that wakes whenever the table is replaced.
    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<ObservationTable>>> {
        self.table.clone()
    }

    pub async fn view(&self) -> ViewState {
        self.view.read().await.clone()
    }

    pub fn slider_min(&self) -> i32 {
        self.slider_min
    }

    /// Apply a selection and count the submit. The count is positive after
    /// any submit, so the timestamp is restamped every time.
    pub async fn submit(&self, indicator: Indicator, years: YearRange) -> ViewState {
        let mut view = self.view.write().await;
        view.indicator = indicator;
        view.years = years;
        view.submit_count += 1;
        view.last_fetched_at = Some(Local::now());
        view.slider_max += 1;
        info!(
            count = view.submit_count,
            indicator = indicator.code,
            start = years.start(),
            end = years.end(),
            "submit"
        );
        view.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::INDICATORS;

    #[tokio::test]
    async fn starts_idle_with_defaults() {
        let (store, _writer) = SessionStore::new(2005, 2016);
        assert_eq!(store.phase(), Phase::Idle);
        assert!(store.table().is_empty());

        let view = store.view().await;
        assert_eq!(view.indicator, INDICATORS[0]);
        assert_eq!((view.years.start(), view.years.end()), (2005, 2006));
        assert_eq!(view.submit_count_text(), "Submit Count: 0");
        assert_eq!(view.last_fetched_text(), "Data Last Fetched: None");
        assert_eq!(view.slider_max, 2016);
    }

    #[tokio::test]
    async fn writer_moves_to_fetched_and_replaces() {
        let (store, writer) = SessionStore::new(2005, 2016);
        let mut rx = store.subscribe();

        writer.replace(ObservationTable::default());
        assert_eq!(store.phase(), Phase::Fetched);
        assert!(rx.has_changed().unwrap());
        let _ = rx.borrow_and_update();

        let table = ObservationTable::new(INDICATORS.to_vec(), Vec::new()).unwrap();
        writer.replace(table.clone());
        assert_eq!(*store.table(), table);
        assert!(rx.has_changed().unwrap());
    }

    #[tokio::test]
    async fn submit_counts_up_by_one() {
        let (store, _writer) = SessionStore::new(2005, 2016);
        let mut last = 0;
        for _ in 0..5 {
            let view = store.submit(INDICATORS[1], YearRange::single(2010)).await;
            assert_eq!(view.submit_count, last + 1);
            last = view.submit_count;
        }
        let view = store.view().await;
        assert_eq!(view.submit_count, 5);
        assert_eq!(view.indicator, INDICATORS[1]);
        assert_eq!(view.slider_max, 2021);
    }

    #[tokio::test]
    async fn submit_stamps_last_fetched() {
        let (store, _writer) = SessionStore::new(2005, 2016);
        let view = store.submit(INDICATORS[0], YearRange::single(2005)).await;
        let ts = view.last_fetched_at.expect("timestamp after submit");
        assert!(view.last_fetched_text().starts_with("Data Last Fetched: "));
        assert!(view.last_fetched_text().contains(&ts.format("%Y-%m-%d").to_string()));
    }

    #[tokio::test]
    async fn submit_does_not_fetch() {
        let (store, _writer) = SessionStore::new(2005, 2016);
        store.submit(INDICATORS[0], YearRange::single(2005)).await;
        assert_eq!(store.phase(), Phase::Idle);
    }
}
