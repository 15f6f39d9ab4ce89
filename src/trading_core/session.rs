//! Session and news gating
//!
//! The state machine only asks whether a new setup may be searched for at a given instant.
//! Trading windows and news blackouts are provided here as interchangeable gates.

use chrono::{DateTime, Duration, NaiveTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::SessionError;

/// Boolean predicate over a timestamp
pub trait SessionGate {
    fn is_open(&self, at: DateTime<Utc>) -> bool;
}

/// Gate that never blocks
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysOpen;

impl SessionGate for AlwaysOpen {
    fn is_open(&self, _at: DateTime<Utc>) -> bool {
        true
    }
}

/// Local-time trading window, inclusive at both ends
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SessionWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl SessionWindow {
    pub fn contains(&self, time: NaiveTime) -> bool {
        self.start <= time && time <= self.end
    }
}

/// Open while the local time falls inside any configured window
#[derive(Debug, Clone)]
pub struct SessionWindows {
    timezone: Tz,
    windows: Vec<SessionWindow>,
}

impl SessionWindows {
    pub fn new(timezone: Tz, windows: Vec<SessionWindow>) -> Result<Self, SessionError> {
        if let Some(w) = windows.iter().find(|w| w.end < w.start) {
            return Err(SessionError::InvertedWindow {
                start: w.start,
                end: w.end,
            });
        }
        Ok(Self { timezone, windows })
    }
}

impl SessionGate for SessionWindows {
    fn is_open(&self, at: DateTime<Utc>) -> bool {
        let local = at.with_timezone(&self.timezone).time();
        self.windows.iter().any(|w| w.contains(local))
    }
}

/// Closed within `buffer` of any scheduled news event
#[derive(Debug, Clone)]
pub struct NewsBlackout {
    buffer: Duration,
    events: Vec<DateTime<Utc>>,
}

impl NewsBlackout {
    pub fn new(buffer_minutes: i64) -> Self {
        Self {
            buffer: Duration::minutes(buffer_minutes),
            events: Vec::new(),
        }
    }

    pub fn add_event(&mut self, at: DateTime<Utc>) {
        self.events.push(at);
    }

    pub fn is_news_active(&self, at: DateTime<Utc>) -> bool {
        self.events
            .iter()
            .any(|&event| event - self.buffer <= at && at <= event + self.buffer)
    }
}

impl SessionGate for NewsBlackout {
    fn is_open(&self, at: DateTime<Utc>) -> bool {
        !self.is_news_active(at)
    }
}

/// Open only when every inner gate is open
#[derive(Default)]
pub struct AllOf {
    gates: Vec<Box<dyn SessionGate>>,
}

impl AllOf {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, gate: impl SessionGate + 'static) -> Self {
        self.gates.push(Box::new(gate));
        self
    }
}

impl SessionGate for AllOf {
    fn is_open(&self, at: DateTime<Utc>) -> bool {
        self.gates.iter().all(|g| g.is_open(at))
    }
}

/// Configuration for session gating
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Apply the trading windows (default: false, replay runs around the clock)
    pub enabled: bool,
    /// IANA zone the windows are expressed in (default: Asia/Kolkata)
    pub timezone: String,
    /// Trading windows (default: London 12:30-16:30 and New York 18:30-21:30 IST)
    pub windows: Vec<SessionWindow>,
    /// Blackout either side of a news event (default: 15 minutes)
    pub news_buffer_minutes: i64,
    /// Scheduled news events
    pub news_events: Vec<DateTime<Utc>>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        let hm = |h, m| NaiveTime::from_hms_opt(h, m, 0).unwrap_or(NaiveTime::MIN);
        Self {
            enabled: false,
            timezone: "Asia/Kolkata".to_string(),
            windows: vec![
                SessionWindow {
                    start: hm(12, 30),
                    end: hm(16, 30),
                },
                SessionWindow {
                    start: hm(18, 30),
                    end: hm(21, 30),
                },
            ],
            news_buffer_minutes: 15,
            news_events: Vec::new(),
        }
    }
}

impl SessionConfig {
    /// Build the gate described by this config
    pub fn build_gate(&self) -> Result<Box<dyn SessionGate>, SessionError> {
        let mut gate = AllOf::new();

        if self.enabled {
            let tz: Tz = self
                .timezone
                .parse()
                .map_err(|_| SessionError::UnknownTimezone(self.timezone.clone()))?;
            gate = gate.with(SessionWindows::new(tz, self.windows.clone())?);
        }

        if !self.news_events.is_empty() {
            let mut news = NewsBlackout::new(self.news_buffer_minutes);
            for &event in &self.news_events {
                news.add_event(event);
            }
            gate = gate.with(news);
        }

        Ok(Box::new(gate))
    }
}
