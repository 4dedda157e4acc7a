#![allow(dead_code)]

use candlecall::domain::error::CandlecallError;
use candlecall::domain::interval::Interval;
pub use candlecall::domain::ohlcv::{Candle, RawBar, Series};
use candlecall::ports::data_port::MarketDataPort;
use chrono::{Duration, NaiveDate, NaiveDateTime};
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};

/// Data port returning queued responses in order, then falling back to
/// per-symbol data. Counts every call.
pub struct MockDataPort {
    pub data: HashMap<String, Vec<RawBar>>,
    pub errors: HashMap<String, String>,
    scripted: RefCell<VecDeque<Result<Vec<RawBar>, String>>>,
    calls: Cell<usize>,
    requests: RefCell<Vec<(String, NaiveDate, NaiveDate, Interval)>>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
            scripted: RefCell::new(VecDeque::new()),
            calls: Cell::new(0),
            requests: RefCell::new(Vec::new()),
        }
    }

    pub fn with_bars(mut self, symbol: &str, bars: Vec<RawBar>) -> Self {
        self.data.insert(symbol.to_string(), bars);
        self
    }

    pub fn with_error(mut self, symbol: &str, reason: &str) -> Self {
        self.errors.insert(symbol.to_string(), reason.to_string());
        self
    }

    pub fn then_bars(self, bars: Vec<RawBar>) -> Self {
        self.scripted.borrow_mut().push_back(Ok(bars));
        self
    }

    pub fn then_error(self, reason: &str) -> Self {
        self.scripted.borrow_mut().push_back(Err(reason.to_string()));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.get()
    }

    pub fn requests(&self) -> Vec<(String, NaiveDate, NaiveDate, Interval)> {
        self.requests.borrow().clone()
    }
}

impl MarketDataPort for MockDataPort {
    fn history(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
        interval: Interval,
    ) -> Result<Vec<RawBar>, CandlecallError> {
        self.calls.set(self.calls.get() + 1);
        self.requests
            .borrow_mut()
            .push((symbol.to_string(), start, end, interval));

        if let Some(next) = self.scripted.borrow_mut().pop_front() {
            return next.map_err(|reason| CandlecallError::Provider { reason });
        }
        if let Some(reason) = self.errors.get(symbol) {
            return Err(CandlecallError::Provider {
                reason: reason.clone(),
            });
        }
        Ok(self.data.get(symbol).cloned().unwrap_or_default())
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn now() -> NaiveDateTime {
    date(2025, 6, 15).and_hms_opt(12, 0, 0).unwrap()
}

/// Daily bars whose closes follow `closes`, starting 2020-01-01.
pub fn bars_from_closes(closes: &[f64]) -> Vec<RawBar> {
    let start = date(2020, 1, 1).and_hms_opt(0, 0, 0).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| RawBar {
            timestamp: start + Duration::days(i as i64),
            open: Some(close),
            high: Some(close + 1.0),
            low: Some(close - 1.0),
            close: Some(close),
        })
        .collect()
}

/// `count` daily bars rising by one per day from `start_price`.
pub fn generate_bars(count: usize, start_price: f64) -> Vec<RawBar> {
    let closes: Vec<f64> = (0..count).map(|i| start_price + i as f64).collect();
    bars_from_closes(&closes)
}

/// `flat` bars at 100 followed by `tail` strictly falling bars.
pub fn falling_tail(flat: usize, tail: usize) -> Vec<RawBar> {
    let closes: Vec<f64> = (0..flat)
        .map(|_| 100.0)
        .chain((0..tail).map(|i| 90.0 - i as f64))
        .collect();
    bars_from_closes(&closes)
}

pub fn to_csv(bars: &[RawBar]) -> String {
    let mut out = String::from("date,open,high,low,close\n");
    for bar in bars {
        let cell = |v: Option<f64>| v.map(|x| x.to_string()).unwrap_or_default();
        out.push_str(&format!(
            "{},{},{},{},{}\n",
            bar.timestamp.format("%Y-%m-%d"),
            cell(bar.open),
            cell(bar.high),
            cell(bar.low),
            cell(bar.close)
        ));
    }
    out
}
