//! Strategy state machine for the impulse/pullback scalp
//!
//! Sequences the pattern stages on every closed candle:
//! 1. SEARCHING - trend in one direction plus an impulse leg in the same direction
//! 2. WAITING_PULLBACK - collect pullback candles until they qualify or run too long
//! 3. WAITING_TRIGGER - armed at the pullback extreme; fire on a candle or tick breakout
//!
//! A setup produces at most one signal. Firing, invalidation and timeouts all return the
//! machine to SEARCHING.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::entry::{EntryConfig, EntryTrigger};
use super::impulse::{ImpulseConfig, ImpulseDetector, ImpulseLeg};
use super::indicators::IndicatorSnapshot;
use super::pullback::{PullbackConfig, PullbackQualifier, PullbackVerdict};
use super::ring::RingBuffer;
use super::session::{AlwaysOpen, SessionGate};
use super::structure::{StructureBreak, StructureConfig, StructureMonitor};
use super::trend::{TrendAnalyzer, TrendConfig};
use crate::error::SignalError;
use crate::execution::risk::RiskManager;
use crate::pips::PipScale;
use crate::types::{Candle, Direction, Tick};

/// Configuration for the strategy state machine
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyConfig {
    /// Average candle range below which setups are abandoned, in pips (default: 0.6)
    pub volatility_floor_pips: f64,
    /// Candles kept for impulse scanning (default: 100)
    pub candle_cache: usize,
    /// Candles an armed trigger may wait before the setup expires (default: 10)
    pub max_trigger_candles: u64,
    pub trend: TrendConfig,
    pub impulse: ImpulseConfig,
    pub pullback: PullbackConfig,
    pub structure: StructureConfig,
    pub entry: EntryConfig,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            volatility_floor_pips: 0.6,
            candle_cache: 100,
            max_trigger_candles: 10,
            trend: TrendConfig::default(),
            impulse: ImpulseConfig::default(),
            pullback: PullbackConfig::default(),
            structure: StructureConfig::default(),
            entry: EntryConfig::default(),
        }
    }
}

/// State of the strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StrategyState {
    Searching,
    WaitingPullback,
    WaitingTrigger,
}

impl std::fmt::Display for StrategyState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StrategyState::Searching => write!(f, "SEARCHING"),
            StrategyState::WaitingPullback => write!(f, "WAITING_PULLBACK"),
            StrategyState::WaitingTrigger => write!(f, "WAITING_TRIGGER"),
        }
    }
}

/// Levels fixed once the pullback qualifies
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ArmedTrigger {
    pub trigger_price: f64,
    pub invalidation_price: f64,
    pub pb_extreme: f64,
    /// Candle index on which the pullback qualified
    pub armed_at: u64,
}

/// The live setup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Setup {
    pub id: u64,
    pub direction: Direction,
    pub impulse: ImpulseLeg,
    pub pb_candles: Vec<Candle>,
    pub trigger: Option<ArmedTrigger>,
}

/// Entry instruction with validated stop/target geometry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub direction: Direction,
    pub entry_price: f64,
    pub sl: f64,
    pub tp: f64,
    pub setup_id: u64,
    pub timestamp: DateTime<Utc>,
}

impl Signal {
    /// Build a signal, rejecting a stop/target that does not bracket the entry
    pub fn new(
        direction: Direction,
        entry_price: f64,
        sl: f64,
        tp: f64,
        setup_id: u64,
        timestamp: DateTime<Utc>,
    ) -> Result<Self, SignalError> {
        match direction {
            Direction::Buy if !(sl < entry_price && entry_price < tp) => {
                return Err(SignalError::InvalidBuyGeometry {
                    direction,
                    entry: entry_price,
                    sl,
                    tp,
                });
            }
            Direction::Sell if !(tp < entry_price && entry_price < sl) => {
                return Err(SignalError::InvalidSellGeometry {
                    direction,
                    entry: entry_price,
                    sl,
                    tp,
                });
            }
            _ => {}
        }
        Ok(Self {
            direction,
            entry_price,
            sl,
            tp,
            setup_id,
            timestamp,
        })
    }
}

/// Why a setup was abandoned
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ResetReason {
    LowVolatility,
    TrendLost,
    PullbackTooLong,
    Structure(StructureBreak),
    TriggerTimeout,
    InvalidSignal,
}

impl std::fmt::Display for ResetReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResetReason::LowVolatility => write!(f, "volatility below floor"),
            ResetReason::TrendLost => write!(f, "trend invalidated during pullback"),
            ResetReason::PullbackTooLong => write!(f, "pullback too long"),
            ResetReason::Structure(StructureBreak::ExtremeBreached) => {
                write!(f, "pullback extreme breached")
            }
            ResetReason::Structure(StructureBreak::EmaLost) => write!(f, "close crossed EMA"),
            ResetReason::TriggerTimeout => write!(f, "trigger timed out"),
            ResetReason::InvalidSignal => write!(f, "signal geometry invalid"),
        }
    }
}

/// State transition events
#[derive(Debug, Clone, PartialEq)]
pub enum StrategyTransition {
    /// Impulse found in trend direction, waiting for pullback
    ImpulseDetected {
        setup_id: u64,
        direction: Direction,
        size_pips: f64,
    },
    /// Pullback qualified, trigger armed
    PullbackQualified {
        setup_id: u64,
        trigger_price: f64,
        invalidation_price: f64,
    },
    /// Setup abandoned
    SetupReset { setup_id: u64, reason: ResetReason },
    /// Breakout fired
    SignalEmitted(Signal),
}

impl StrategyTransition {
    pub fn into_signal(self) -> Option<Signal> {
        match self {
            StrategyTransition::SignalEmitted(signal) => Some(signal),
            _ => None,
        }
    }
}

/// The strategy state machine
pub struct StrategyStateMachine {
    config: StrategyConfig,
    scale: PipScale,
    state: StrategyState,
    setup: Option<Setup>,
    next_setup_id: u64,
    candles: RingBuffer<Candle>,
    trend: TrendAnalyzer,
    impulse: ImpulseDetector,
    pullback: PullbackQualifier,
    structure: StructureMonitor,
    entry: EntryTrigger,
    session: Box<dyn SessionGate>,
}

impl StrategyStateMachine {
    pub fn new(config: StrategyConfig, scale: PipScale) -> Self {
        Self {
            scale,
            state: StrategyState::Searching,
            setup: None,
            next_setup_id: 1,
            candles: RingBuffer::new(config.candle_cache),
            trend: TrendAnalyzer::new(config.trend.clone(), scale),
            impulse: ImpulseDetector::new(config.impulse.clone(), scale),
            pullback: PullbackQualifier::new(config.pullback.clone(), scale),
            structure: StructureMonitor::new(config.structure.clone(), scale),
            entry: EntryTrigger::new(config.entry.clone(), scale),
            session: Box::new(AlwaysOpen),
            config,
        }
    }

    /// Replace the session/news gate consulted before searching for a new setup
    pub fn with_session_gate(mut self, gate: Box<dyn SessionGate>) -> Self {
        self.session = gate;
        self
    }

    pub fn state(&self) -> StrategyState {
        self.state
    }

    pub fn setup(&self) -> Option<&Setup> {
        self.setup.as_ref()
    }

    /// Abandon the current setup and return to searching
    pub fn reset(&mut self) {
        self.state = StrategyState::Searching;
        self.setup = None;
    }

    fn reset_with(&mut self, reason: ResetReason) -> Option<StrategyTransition> {
        let setup_id = self.setup.as_ref().map_or(0, |s| s.id);
        info!("Setup {} reset: {}", setup_id, reason);
        self.reset();
        Some(StrategyTransition::SetupReset { setup_id, reason })
    }

    /// Process a closed candle and return any state transition
    pub fn on_candle(
        &mut self,
        candle: &Candle,
        indicators: &IndicatorSnapshot,
        risk: &RiskManager,
    ) -> Option<StrategyTransition> {
        self.candles.push(*candle);

        if let Some(avg_range) = indicators.avg_range {
            if self.scale.to_pips(avg_range) < self.config.volatility_floor_pips {
                if self.state == StrategyState::Searching {
                    return None;
                }
                return self.reset_with(ResetReason::LowVolatility);
            }
        }

        match self.state {
            StrategyState::Searching => self.process_searching(candle, indicators),
            StrategyState::WaitingPullback => self.process_pullback(candle, indicators),
            StrategyState::WaitingTrigger => self.process_trigger(candle, indicators, risk),
        }
    }

    /// Tick-level breakout check. Only acts while a trigger is armed.
    pub fn on_tick(&mut self, tick: &Tick, risk: &RiskManager) -> Option<StrategyTransition> {
        if self.state != StrategyState::WaitingTrigger {
            return None;
        }
        let setup = self.setup.as_ref()?;
        let armed = setup.trigger?;
        let entry = self
            .entry
            .check_tick(setup.direction, armed.trigger_price, tick)?;
        debug!("Tick breakout: {} @ {:.5}", setup.direction, entry);
        self.fire(entry, tick.timestamp, risk)
    }

    fn process_searching(
        &mut self,
        candle: &Candle,
        indicators: &IndicatorSnapshot,
    ) -> Option<StrategyTransition> {
        if !self.session.is_open(candle.timestamp_close) {
            return None;
        }

        let uptrend = self.trend.qualify_uptrend(candle, indicators);
        let downtrend = self.trend.qualify_downtrend(candle, indicators);
        if !uptrend && !downtrend {
            return None;
        }

        let leg = self.impulse.detect(self.candles.as_slice())?;
        let consistent = match leg.direction {
            Direction::Buy => uptrend,
            Direction::Sell => downtrend,
        };
        if !consistent {
            return None;
        }

        let setup_id = self.next_setup_id;
        self.next_setup_id += 1;
        info!(
            "Impulse detected: {} {:.1} pips over {} candles (setup {})",
            leg.direction, leg.size_pips, leg.candle_count, setup_id
        );

        let transition = StrategyTransition::ImpulseDetected {
            setup_id,
            direction: leg.direction,
            size_pips: leg.size_pips,
        };
        self.setup = Some(Setup {
            id: setup_id,
            direction: leg.direction,
            impulse: leg,
            pb_candles: Vec::new(),
            trigger: None,
        });
        self.state = StrategyState::WaitingPullback;
        Some(transition)
    }

    fn process_pullback(
        &mut self,
        candle: &Candle,
        indicators: &IndicatorSnapshot,
    ) -> Option<StrategyTransition> {
        let direction = {
            let setup = self.setup.as_mut()?;
            setup.pb_candles.push(*candle);
            setup.direction
        };

        if !self.trend.qualify(direction, candle, indicators) {
            return self.reset_with(ResetReason::TrendLost);
        }

        let setup = self.setup.as_mut()?;
        let verdict = self
            .pullback
            .qualify(&setup.pb_candles, &setup.impulse, indicators);

        match verdict {
            PullbackVerdict::Qualified { depth } => {
                let highs = setup.pb_candles.iter().map(|c| c.high);
                let lows = setup.pb_candles.iter().map(|c| c.low);
                let pb_high = highs.fold(f64::NEG_INFINITY, f64::max);
                let pb_low = lows.fold(f64::INFINITY, f64::min);
                let (trigger_price, invalidation_price) = match direction {
                    Direction::Buy => (pb_high, pb_low),
                    Direction::Sell => (pb_low, pb_high),
                };

                setup.trigger = Some(ArmedTrigger {
                    trigger_price,
                    invalidation_price,
                    pb_extreme: invalidation_price,
                    armed_at: candle.index,
                });
                let setup_id = setup.id;
                self.state = StrategyState::WaitingTrigger;

                info!(
                    "Pullback qualified for {} setup {} (depth {:.2}, trigger {:.5}, invalidation {:.5})",
                    direction, setup_id, depth, trigger_price, invalidation_price
                );
                Some(StrategyTransition::PullbackQualified {
                    setup_id,
                    trigger_price,
                    invalidation_price,
                })
            }
            verdict => {
                debug!("Pullback not qualified: {}", verdict);
                if setup.pb_candles.len() > self.pullback.max_candles() {
                    return self.reset_with(ResetReason::PullbackTooLong);
                }
                None
            }
        }
    }

    fn process_trigger(
        &mut self,
        candle: &Candle,
        indicators: &IndicatorSnapshot,
        risk: &RiskManager,
    ) -> Option<StrategyTransition> {
        let setup = self.setup.as_ref()?;
        let direction = setup.direction;
        let armed = setup.trigger?;

        if let Some(broken) =
            self.structure
                .check(direction, candle, armed.invalidation_price, indicators.ema)
        {
            return self.reset_with(ResetReason::Structure(broken));
        }

        if candle.index.saturating_sub(armed.armed_at) > self.config.max_trigger_candles {
            return self.reset_with(ResetReason::TriggerTimeout);
        }

        let entry = self
            .entry
            .check_candle(direction, armed.trigger_price, candle)?;
        debug!("Candle breakout: {} @ {:.5}", direction, entry);
        self.fire(entry, candle.timestamp_close, risk)
    }

    /// Size the trade, emit the signal and return to searching
    fn fire(
        &mut self,
        entry: f64,
        timestamp: DateTime<Utc>,
        risk: &RiskManager,
    ) -> Option<StrategyTransition> {
        let setup = self.setup.as_ref()?;
        let armed = setup.trigger?;
        let (sl, tp) = risk.calculate_sl_tp(setup.direction, entry, armed.pb_extreme);

        match Signal::new(setup.direction, entry, sl, tp, setup.id, timestamp) {
            Ok(signal) => {
                info!(
                    "Entry triggered: {} @ {:.5} (SL {:.5}, TP {:.5}, setup {})",
                    signal.direction, signal.entry_price, signal.sl, signal.tp, signal.setup_id
                );
                self.reset();
                Some(StrategyTransition::SignalEmitted(signal))
            }
            Err(e) => {
                warn!("Discarding trigger: {}", e);
                self.reset_with(ResetReason::InvalidSignal)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::config::RiskConfig;
    use chrono::{Duration, TimeZone};

    const EURUSD: &str = "EURUSD";

    fn ts(index: u64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 5, 8, 0, 0).unwrap() + Duration::minutes(index as i64)
    }

    fn candle(index: u64, open: f64, high: f64, low: f64, close: f64) -> Candle {
        Candle {
            open,
            high,
            low,
            close,
            tick_count: 70,
            index,
            timestamp_open: ts(index),
            timestamp_close: ts(index),
        }
    }

    fn snap(ema: f64, slope: f64) -> IndicatorSnapshot {
        IndicatorSnapshot {
            ema,
            ema_slope: Some(slope),
            avg_range: Some(0.0003),
        }
    }

    fn machine() -> StrategyStateMachine {
        StrategyStateMachine::new(StrategyConfig::default(), PipScale::for_symbol(EURUSD))
    }

    fn risk() -> RiskManager {
        RiskManager::new(RiskConfig::default(), PipScale::for_symbol(EURUSD))
    }

    /// Five bullish candles, 1.1000 -> 1.1010 close, highs to 1.1011
    fn impulse() -> Vec<(Candle, IndicatorSnapshot)> {
        (0..5)
            .map(|i| {
                let base = 1.1000 + 0.0002 * i as f64;
                (
                    candle(i, base, base + 0.0003, base, base + 0.0002),
                    snap(1.1000, 0.0002),
                )
            })
            .collect()
    }

    fn pullback_candle(index: u64) -> (Candle, IndicatorSnapshot) {
        (
            candle(index, 1.1007, 1.1008, 1.1007, 1.1007),
            snap(1.1006, 0.00016),
        )
    }

    /// Drive the machine to WAITING_TRIGGER, returning the transitions seen
    fn arm(sm: &mut StrategyStateMachine, risk: &RiskManager) -> Vec<StrategyTransition> {
        let mut seen = Vec::new();
        for (c, s) in impulse()
            .into_iter()
            .chain((5..8).map(pullback_candle))
        {
            seen.extend(sm.on_candle(&c, &s, risk));
        }
        seen
    }

    #[test]
    fn test_state_machine_init() {
        let sm = machine();
        assert_eq!(sm.state(), StrategyState::Searching);
        assert!(sm.setup().is_none());
    }

    #[test]
    fn test_impulse_then_pullback_arms_trigger() {
        let mut sm = machine();
        let risk = risk();
        let seen = arm(&mut sm, &risk);

        assert!(matches!(
            seen[0],
            StrategyTransition::ImpulseDetected {
                setup_id: 1,
                direction: Direction::Buy,
                ..
            }
        ));
        match &seen[1] {
            StrategyTransition::PullbackQualified {
                trigger_price,
                invalidation_price,
                ..
            } => {
                assert!((trigger_price - 1.1008).abs() < 1e-12);
                assert!((invalidation_price - 1.1007).abs() < 1e-12);
            }
            other => panic!("unexpected transition {:?}", other),
        }
        assert_eq!(seen.len(), 2);
        assert_eq!(sm.state(), StrategyState::WaitingTrigger);
    }

    #[test]
    fn test_breakout_candle_emits_one_signal() {
        let mut sm = machine();
        let risk = risk();
        let mut signals: Vec<Signal> = arm(&mut sm, &risk)
            .into_iter()
            .filter_map(StrategyTransition::into_signal)
            .collect();

        let breakout = candle(8, 1.1008, 1.1013, 1.1007, 1.1013);
        signals.extend(
            sm.on_candle(&breakout, &snap(1.1007, 0.00017), &risk)
                .and_then(StrategyTransition::into_signal),
        );

        assert_eq!(signals.len(), 1);
        let signal = &signals[0];
        assert_eq!(signal.direction, Direction::Buy);
        assert!((signal.entry_price - 1.10083).abs() < 1e-9);
        assert!(signal.sl < signal.entry_price && signal.entry_price < signal.tp);
        // Structural risk under 4 pips, fallback stop of 6.5 pips
        assert!((signal.sl - 1.10018).abs() < 1e-9);
        assert_eq!(sm.state(), StrategyState::Searching);
    }

    #[test]
    fn test_sell_setup_mirrors_buy() {
        let mut sm = machine();
        let risk = risk();
        let mut seen = Vec::new();

        // Five bearish candles, 1.1000 -> 1.0990 close, lows to 1.0989
        for i in 0..5 {
            let base = 1.1000 - 0.0002 * i as f64;
            let c = candle(i, base, base, base - 0.0003, base - 0.0002);
            seen.extend(sm.on_candle(&c, &snap(1.1000, -0.0002), &risk));
        }
        let pullback = [
            candle(5, 1.0993, 1.0994, 1.0992, 1.0993),
            candle(6, 1.0993, 1.0993, 1.09915, 1.0992),
        ];
        for c in &pullback {
            seen.extend(sm.on_candle(c, &snap(1.0994, -0.00016), &risk));
        }

        assert!(matches!(
            seen[0],
            StrategyTransition::ImpulseDetected {
                direction: Direction::Sell,
                ..
            }
        ));
        match &seen[1] {
            StrategyTransition::PullbackQualified {
                trigger_price,
                invalidation_price,
                ..
            } => {
                // Sell triggers below the lowest pullback low, invalidates above the highest high
                assert!((trigger_price - 1.09915).abs() < 1e-12);
                assert!((invalidation_price - 1.0994).abs() < 1e-12);
            }
            other => panic!("unexpected transition {:?}", other),
        }
        assert_eq!(sm.state(), StrategyState::WaitingTrigger);

        // Inside the range: no trigger, no structure break
        let inside = candle(7, 1.0992, 1.0993, 1.0992, 1.0993);
        assert!(sm.on_candle(&inside, &snap(1.0994, -0.00016), &risk).is_none());

        let breakdown = candle(8, 1.0992, 1.0993, 1.0987, 1.0987);
        let signal = sm
            .on_candle(&breakdown, &snap(1.0993, -0.00017), &risk)
            .and_then(StrategyTransition::into_signal)
            .unwrap();
        assert_eq!(signal.direction, Direction::Sell);
        assert!((signal.entry_price - 1.09912).abs() < 1e-9);
        assert!(signal.tp < signal.entry_price && signal.entry_price < signal.sl);
        // 3.3 pips of structural risk falls back to a 6.5 pip stop
        assert!((signal.sl - 1.09977).abs() < 1e-9);
        assert!((signal.tp - 1.09834).abs() < 1e-9);
    }

    #[test]
    fn test_tick_trigger_fires_at_ask() {
        let mut sm = machine();
        let risk = risk();
        arm(&mut sm, &risk);

        let quiet = Tick::new(EURUSD, 1.1006, 1.1008, ts(9)).unwrap();
        assert!(sm.on_tick(&quiet, &risk).is_none());

        let tick = Tick::new(EURUSD, 1.1008, 1.1009, ts(9)).unwrap();
        let signal = sm.on_tick(&tick, &risk).and_then(StrategyTransition::into_signal).unwrap();
        assert_eq!(signal.entry_price, 1.1009);
        assert_eq!(sm.state(), StrategyState::Searching);

        // Setup consumed: a second breakout tick does nothing
        assert!(sm.on_tick(&tick, &risk).is_none());
    }

    #[test]
    fn test_on_tick_ignored_unless_armed() {
        let mut sm = machine();
        let tick = Tick::new(EURUSD, 1.2, 1.2001, ts(0)).unwrap();
        assert!(sm.on_tick(&tick, &risk()).is_none());
    }

    #[test]
    fn test_structure_break_resets() {
        let mut sm = machine();
        let risk = risk();
        arm(&mut sm, &risk);

        let breach = candle(8, 1.1007, 1.1007, 1.1000, 1.1001);
        let t = sm.on_candle(&breach, &snap(1.1006, 0.00016), &risk);
        assert!(matches!(
            t,
            Some(StrategyTransition::SetupReset {
                reason: ResetReason::Structure(StructureBreak::ExtremeBreached),
                ..
            })
        ));
        assert_eq!(sm.state(), StrategyState::Searching);
    }

    #[test]
    fn test_trigger_timeout() {
        let mut sm = machine();
        let risk = risk();
        arm(&mut sm, &risk);

        // Armed on candle 6; candles 8..=16 wait without breaking out
        let mut last = None;
        for i in 8..=17 {
            let (c, s) = pullback_candle(i);
            last = sm.on_candle(&c, &s, &risk);
            if last.is_some() {
                assert_eq!(i, 17);
            }
        }
        assert!(matches!(
            last,
            Some(StrategyTransition::SetupReset {
                reason: ResetReason::TriggerTimeout,
                ..
            })
        ));
    }

    #[test]
    fn test_low_volatility_resets() {
        let mut sm = machine();
        let risk = risk();
        for (c, s) in impulse() {
            sm.on_candle(&c, &s, &risk);
        }
        assert_eq!(sm.state(), StrategyState::WaitingPullback);

        let (c, mut s) = pullback_candle(5);
        s.avg_range = Some(0.00005);
        let t = sm.on_candle(&c, &s, &risk);
        assert!(matches!(
            t,
            Some(StrategyTransition::SetupReset {
                reason: ResetReason::LowVolatility,
                ..
            })
        ));
        assert_eq!(sm.state(), StrategyState::Searching);
    }

    #[test]
    fn test_trend_loss_during_pullback() {
        let mut sm = machine();
        let risk = risk();
        for (c, s) in impulse() {
            sm.on_candle(&c, &s, &risk);
        }
        let (c, _) = pullback_candle(5);
        let t = sm.on_candle(&c, &snap(1.1006, -0.0001), &risk);
        assert!(matches!(
            t,
            Some(StrategyTransition::SetupReset {
                reason: ResetReason::TrendLost,
                ..
            })
        ));
    }

    #[test]
    fn test_pullback_too_long() {
        let mut sm = machine();
        let risk = risk();
        for (c, s) in impulse() {
            sm.on_candle(&c, &s, &risk);
        }
        // Pullback candles that never come near the EMA
        let mut last = None;
        for i in 5..11 {
            let c = candle(i, 1.1007, 1.1008, 1.1007, 1.1007);
            last = sm.on_candle(&c, &snap(1.0990, 0.0002), &risk);
        }
        assert!(matches!(
            last,
            Some(StrategyTransition::SetupReset {
                reason: ResetReason::PullbackTooLong,
                ..
            })
        ));
    }

    #[test]
    fn test_closed_session_blocks_search() {
        struct Closed;
        impl SessionGate for Closed {
            fn is_open(&self, _at: DateTime<Utc>) -> bool {
                false
            }
        }

        let mut sm = machine().with_session_gate(Box::new(Closed));
        let risk = risk();
        assert!(arm(&mut sm, &risk).is_empty());
        assert_eq!(sm.state(), StrategyState::Searching);
    }

    #[test]
    fn test_identical_inputs_identical_signals() {
        let risk = risk();
        let run = || {
            let mut sm = machine();
            let mut out = arm(&mut sm, &risk);
            out.extend(sm.on_candle(
                &candle(8, 1.1008, 1.1013, 1.1007, 1.1013),
                &snap(1.1007, 0.00017),
                &risk,
            ));
            out
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_signal_geometry_validated() {
        assert!(Signal::new(Direction::Buy, 1.1, 1.2, 1.3, 1, ts(0)).is_err());
        assert!(Signal::new(Direction::Sell, 1.1, 1.0, 1.2, 1, ts(0)).is_err());
        assert!(Signal::new(Direction::Sell, 1.1, 1.2, 1.0, 1, ts(0)).is_ok());
    }
}
