//! Per-round trading telemetry: player activity, concentration and a composite risk score
//!
//! Flattens the trade events of one completed round into a single record next to its duration
//! and peak. Players are classified by how they traded, and three normalized risks are blended
//! into one score.

use crate::types::RoundOutcome;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Rounds at least this long carry no duration risk
const DURATION_RISK_TICKS: f64 = 500.0;
/// Trade count at which activity risk saturates
const ACTIVITY_RISK_TRADES: f64 = 100.0;

const DURATION_WEIGHT: f64 = 0.4;
const CONCENTRATION_WEIGHT: f64 = 0.3;
const ACTIVITY_WEIGHT: f64 = 0.3;

/// Share of the round before which an entry counts as early
const EARLY_ENTRY: f64 = 0.3;
/// Share of the round after which an entry counts as late
const LATE_ENTRY: f64 = 0.7;
const HIGH_LEVEL: u32 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeSide {
    Buy,
    Sell,
}

/// One trade placed during the round
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeEvent {
    pub player_id: String,
    pub side: TradeSide,
    pub tick: u32,
    pub price: f64,
    pub qty: f64,
    /// Amount paid on a buy
    #[serde(default)]
    pub cost: f64,
    /// Amount received on a sell
    #[serde(default)]
    pub proceeds: f64,
    #[serde(default)]
    pub level: u32,
}

/// Completed round plus its trades, oldest first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundTelemetry {
    #[serde(flatten)]
    pub outcome: RoundOutcome,
    #[serde(default)]
    pub trades: Vec<TradeEvent>,
}

/// Everything one player did in a round
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PlayerActivity {
    pub trades: u32,
    pub buy_count: u32,
    pub sell_count: u32,
    pub volume: f64,
    pub cost: f64,
    pub proceeds: f64,
    /// Level reported on the player's latest trade
    pub level: u32,
    pub entry_tick: u32,
    pub exit_tick: u32,
}

impl PlayerActivity {
    pub fn profit_loss(&self) -> f64 {
        self.proceeds - self.cost
    }

    /// First rule that matches wins
    pub fn pattern(&self, round_duration: u32) -> TradingPattern {
        let duration = round_duration as f64;
        if self.trades >= 5 && self.volume < 0.1 {
            TradingPattern::Scalper
        } else if self.trades <= 2 && self.volume > 1.0 {
            TradingPattern::Whale
        } else if self.sell_count == 0 {
            TradingPattern::Hodler
        } else if self.trades >= 4 && self.buy_count == self.sell_count {
            TradingPattern::Flipper
        } else if (self.entry_tick as f64) < duration * EARLY_ENTRY {
            TradingPattern::EarlyBird
        } else if (self.entry_tick as f64) > duration * LATE_ENTRY {
            TradingPattern::LateJoiner
        } else {
            TradingPattern::Regular
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TradingPattern {
    /// Many small trades
    Scalper,
    /// Few large trades
    Whale,
    /// Never sold
    Hodler,
    /// Balanced buys and sells
    Flipper,
    EarlyBird,
    LateJoiner,
    Regular,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PatternCounts {
    pub scalpers: usize,
    pub whales: usize,
    pub hodlers: usize,
    pub flippers: usize,
    pub early_birds: usize,
    pub late_joiners: usize,
    pub regulars: usize,
}

impl PatternCounts {
    fn add(&mut self, pattern: TradingPattern) {
        let slot = match pattern {
            TradingPattern::Scalper => &mut self.scalpers,
            TradingPattern::Whale => &mut self.whales,
            TradingPattern::Hodler => &mut self.hodlers,
            TradingPattern::Flipper => &mut self.flippers,
            TradingPattern::EarlyBird => &mut self.early_birds,
            TradingPattern::LateJoiner => &mut self.late_joiners,
            TradingPattern::Regular => &mut self.regulars,
        };
        *slot += 1;
    }
}

/// Normalized risk components, each in [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RoundRisk {
    /// Shorter rounds are riskier
    pub duration: f64,
    /// Top player's share of traded volume
    pub concentration: f64,
    pub activity: f64,
    pub composite: f64,
}

impl RoundRisk {
    pub fn new(duration_ticks: u32, concentration: f64, total_trades: usize) -> Self {
        let duration = (1.0 - duration_ticks as f64 / DURATION_RISK_TICKS).max(0.0);
        let activity = (total_trades as f64 / ACTIVITY_RISK_TRADES).min(1.0);
        Self {
            duration,
            concentration,
            activity,
            composite: DURATION_WEIGHT * duration
                + CONCENTRATION_WEIGHT * concentration
                + ACTIVITY_WEIGHT * activity,
        }
    }
}

/// One flat record per completed round
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoundTradingFeatures {
    pub duration: u32,
    pub peak: f64,
    pub instant_end: bool,

    pub total_trades: usize,
    pub unique_players: usize,
    pub buy_orders: usize,
    pub sell_orders: usize,
    pub buy_sell_ratio: f64,

    pub avg_trades_per_player: f64,
    pub avg_volume_per_player: f64,
    pub top_player_volume_ratio: f64,

    pub profitable_players: usize,
    pub profitable_player_ratio: f64,
    pub total_profits: f64,
    pub total_losses: f64,

    pub early_entry_players: usize,
    pub late_entry_players: usize,
    /// Mean over players that reported a level
    pub avg_player_level: f64,
    pub high_level_players: usize,

    pub patterns: PatternCounts,
    pub risk: RoundRisk,
}

/// Group trades by player, keeping the order players first appeared in
pub fn player_activity(trades: &[TradeEvent]) -> Vec<(String, PlayerActivity)> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut players: Vec<(String, PlayerActivity)> = Vec::new();

    for trade in trades {
        let slot = *index.entry(trade.player_id.as_str()).or_insert_with(|| {
            players.push((
                trade.player_id.clone(),
                PlayerActivity {
                    entry_tick: trade.tick,
                    ..Default::default()
                },
            ));
            players.len() - 1
        });
        let activity = &mut players[slot].1;

        activity.trades += 1;
        activity.volume += trade.qty;
        activity.level = trade.level;
        activity.exit_tick = trade.tick;
        match trade.side {
            TradeSide::Buy => {
                activity.buy_count += 1;
                activity.cost += trade.cost;
            }
            TradeSide::Sell => {
                activity.sell_count += 1;
                activity.proceeds += trade.proceeds;
            }
        }
    }

    players
}

impl RoundTradingFeatures {
    pub fn from_telemetry(telemetry: &RoundTelemetry) -> Self {
        let outcome = &telemetry.outcome;
        let duration = outcome.duration as f64;
        let trades = &telemetry.trades;
        let players = player_activity(trades);
        let n = players.len();

        let buy_orders = trades.iter().filter(|t| t.side == TradeSide::Buy).count();
        let sell_orders = trades.len() - buy_orders;

        let total_volume: f64 = players.iter().map(|(_, p)| p.volume).sum();
        let top_volume = players.iter().map(|(_, p)| p.volume).fold(0.0, f64::max);
        let top_player_volume_ratio = if n > 0 {
            top_volume / total_volume.max(0.001)
        } else {
            0.0
        };

        let mut patterns = PatternCounts::default();
        for (_, p) in &players {
            patterns.add(p.pattern(outcome.duration));
        }

        let profitable_players = players.iter().filter(|(_, p)| p.profit_loss() > 0.0).count();
        let total_profits: f64 = players.iter().map(|(_, p)| p.profit_loss().max(0.0)).sum();
        let total_losses: f64 = -players
            .iter()
            .map(|(_, p)| p.profit_loss().min(0.0))
            .sum::<f64>();

        let levels: Vec<u32> = players.iter().map(|(_, p)| p.level).filter(|&l| l > 0).collect();
        let avg_player_level = if levels.is_empty() {
            0.0
        } else {
            levels.iter().map(|&l| l as f64).sum::<f64>() / levels.len() as f64
        };

        let per_player = |total: f64| if n > 0 { total / n as f64 } else { 0.0 };

        Self {
            duration: outcome.duration,
            peak: outcome.peak,
            instant_end: outcome.is_instant_end(),
            total_trades: trades.len(),
            unique_players: n,
            buy_orders,
            sell_orders,
            buy_sell_ratio: buy_orders as f64 / sell_orders.max(1) as f64,
            avg_trades_per_player: per_player(trades.len() as f64),
            avg_volume_per_player: per_player(total_volume),
            top_player_volume_ratio,
            profitable_players,
            profitable_player_ratio: per_player(profitable_players as f64),
            total_profits,
            total_losses,
            early_entry_players: players
                .iter()
                .filter(|(_, p)| (p.entry_tick as f64) < duration * EARLY_ENTRY)
                .count(),
            late_entry_players: players
                .iter()
                .filter(|(_, p)| (p.entry_tick as f64) > duration * LATE_ENTRY)
                .count(),
            avg_player_level,
            high_level_players: players.iter().filter(|(_, p)| p.level > HIGH_LEVEL).count(),
            patterns,
            risk: RoundRisk::new(outcome.duration, top_player_volume_ratio, trades.len()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trade(player: &str, side: TradeSide, tick: u32, qty: f64, amount: f64) -> TradeEvent {
        TradeEvent {
            player_id: player.to_string(),
            side,
            tick,
            price: 1.0,
            qty,
            cost: if side == TradeSide::Buy { amount } else { 0.0 },
            proceeds: if side == TradeSide::Sell { amount } else { 0.0 },
            level: 0,
        }
    }

    fn activity(trades: &[TradeEvent]) -> PlayerActivity {
        player_activity(trades).remove(0).1
    }

    #[test]
    fn test_player_activity_groups_in_order() {
        let trades = vec![
            trade("b", TradeSide::Buy, 5, 0.5, 0.5),
            trade("a", TradeSide::Buy, 8, 0.2, 0.2),
            trade("b", TradeSide::Sell, 40, 0.5, 0.9),
        ];
        let players = player_activity(&trades);
        assert_eq!(players.len(), 2);
        assert_eq!(players[0].0, "b");

        let b = &players[0].1;
        assert_eq!((b.trades, b.buy_count, b.sell_count), (2, 1, 1));
        assert_eq!((b.entry_tick, b.exit_tick), (5, 40));
        assert!((b.profit_loss() - 0.4).abs() < 1e-12);
    }

    #[test]
    fn test_pattern_rules_in_order() {
        let scalper: Vec<_> = (0..5).map(|i| trade("p", TradeSide::Buy, i, 0.01, 0.01)).collect();
        assert_eq!(activity(&scalper).pattern(100), TradingPattern::Scalper);

        let whale = [trade("p", TradeSide::Buy, 50, 2.0, 2.0)];
        assert_eq!(activity(&whale).pattern(100), TradingPattern::Whale);

        let hodler = [
            trade("p", TradeSide::Buy, 50, 0.3, 0.3),
            trade("p", TradeSide::Buy, 60, 0.3, 0.3),
            trade("p", TradeSide::Buy, 70, 0.3, 0.3),
        ];
        assert_eq!(activity(&hodler).pattern(100), TradingPattern::Hodler);

        let flipper = [
            trade("p", TradeSide::Buy, 50, 0.3, 0.3),
            trade("p", TradeSide::Sell, 55, 0.3, 0.4),
            trade("p", TradeSide::Buy, 60, 0.3, 0.3),
            trade("p", TradeSide::Sell, 65, 0.3, 0.2),
        ];
        assert_eq!(activity(&flipper).pattern(100), TradingPattern::Flipper);

        let entry = |tick| {
            activity(&[
                trade("p", TradeSide::Buy, tick, 0.3, 0.3),
                trade("p", TradeSide::Sell, tick + 1, 0.3, 0.3),
            ])
            .pattern(100)
        };
        assert_eq!(entry(10), TradingPattern::EarlyBird);
        assert_eq!(entry(80), TradingPattern::LateJoiner);
        assert_eq!(entry(50), TradingPattern::Regular);
    }

    #[test]
    fn test_round_features_and_composite_risk() {
        let mut trades = vec![
            trade("whale", TradeSide::Buy, 10, 3.0, 3.0),
            trade("small", TradeSide::Buy, 120, 0.5, 0.5),
            trade("small", TradeSide::Sell, 190, 0.5, 0.8),
            trade("late", TradeSide::Buy, 180, 0.5, 0.5),
            trade("late", TradeSide::Sell, 195, 0.5, 0.1),
        ];
        trades[0].level = 40;
        trades[1].level = 10;
        trades[2].level = 10;
        let telemetry = RoundTelemetry {
            outcome: RoundOutcome::new(200, 2.4),
            trades,
        };

        let f = RoundTradingFeatures::from_telemetry(&telemetry);
        assert_eq!((f.total_trades, f.unique_players), (5, 3));
        assert_eq!((f.buy_orders, f.sell_orders), (3, 2));
        assert!((f.buy_sell_ratio - 1.5).abs() < 1e-12);
        assert!((f.top_player_volume_ratio - 0.6).abs() < 1e-12);
        assert_eq!(f.profitable_players, 1);
        assert!((f.total_profits - 0.3).abs() < 1e-12);
        // Whale's unsold 3.0 plus the late trader's 0.4
        assert!((f.total_losses - 3.4).abs() < 1e-12);
        assert_eq!((f.early_entry_players, f.late_entry_players), (1, 1));
        assert!((f.avg_player_level - 25.0).abs() < 1e-12);
        assert_eq!(f.high_level_players, 1);
        assert_eq!(f.patterns.whales, 1);
        assert_eq!(f.patterns.late_joiners, 1);
        assert_eq!(f.patterns.regulars, 1);

        // 0.4 * 0.6 + 0.3 * 0.6 + 0.3 * 0.05
        assert!((f.risk.duration - 0.6).abs() < 1e-12);
        assert!((f.risk.activity - 0.05).abs() < 1e-12);
        assert!((f.risk.composite - 0.435).abs() < 1e-12);
    }

    #[test]
    fn test_round_without_trades() {
        let telemetry = RoundTelemetry {
            outcome: RoundOutcome::new(8, 1.0),
            trades: Vec::new(),
        };
        let f = RoundTradingFeatures::from_telemetry(&telemetry);
        assert!(f.instant_end);
        assert_eq!(f.unique_players, 0);
        assert_eq!(f.top_player_volume_ratio, 0.0);
        assert_eq!(f.patterns, PatternCounts::default());
        assert!((f.risk.composite - 0.4 * (1.0 - 8.0 / 500.0)).abs() < 1e-12);
    }

    #[test]
    fn test_telemetry_from_json() {
        let line = r#"{"duration": 320, "peak": 3.1, "trades": [
            {"player_id": "x", "side": "buy", "tick": 4, "price": 1.0, "qty": 0.2, "cost": 0.2}
        ]}"#;
        let telemetry: RoundTelemetry = serde_json::from_str(line).unwrap();
        assert_eq!(telemetry.outcome.duration, 320);
        assert_eq!(telemetry.trades[0].side, TradeSide::Buy);
        assert_eq!(telemetry.trades[0].proceeds, 0.0);

        let bare: RoundTelemetry = serde_json::from_str(r#"{"duration": 5, "peak": 1.0}"#).unwrap();
        assert!(bare.trades.is_empty());
    }
}
