//! Environment-driven configuration, read once at startup.

use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::time::Duration;

use crate::types::EndVoteRule;

/// Timings and tunables for game rooms
#[derive(Debug, Clone)]
pub struct GameConfig {
    /// Winner display time before the next round or game over
    pub round_advance_delay: Duration,
    /// Pause before a new round when the czar drops mid-round
    pub czar_disconnect_delay: Duration,
    /// How long a disconnected seat is held for a reconnect
    pub disconnect_grace: Duration,
    /// How long a finished room stays around before deletion
    pub finished_retention: Duration,
    /// Fraction of the white pool added to each room as blank cards
    pub blank_card_ratio: f64,
    pub end_vote_rule: EndVoteRule,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            round_advance_delay: Duration::from_secs(5),
            czar_disconnect_delay: Duration::from_secs(3),
            disconnect_grace: Duration::from_secs(60),
            finished_retention: Duration::from_secs(60),
            blank_card_ratio: 0.02,
            end_vote_rule: EndVoteRule::Unanimous,
        }
    }
}

fn env_secs(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(default)
}

impl GameConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let blank_card_ratio = std::env::var("BLANK_CARD_RATIO")
            .ok()
            .and_then(|v| v.trim().parse::<f64>().ok())
            .filter(|r| (0.0..=1.0).contains(r))
            .unwrap_or(defaults.blank_card_ratio);

        let end_vote_rule = match std::env::var("END_VOTE_RULE")
            .map(|v| v.trim().to_lowercase())
            .as_deref()
        {
            Ok("majority") => EndVoteRule::Majority,
            Ok("unanimous") | Err(_) => EndVoteRule::Unanimous,
            Ok(other) => {
                tracing::warn!("Unknown END_VOTE_RULE '{}', using unanimous", other);
                EndVoteRule::Unanimous
            }
        };

        Self {
            round_advance_delay: env_secs("ROUND_ADVANCE_DELAY_SECS", defaults.round_advance_delay),
            czar_disconnect_delay: env_secs(
                "CZAR_DISCONNECT_DELAY_SECS",
                defaults.czar_disconnect_delay,
            ),
            disconnect_grace: env_secs("DISCONNECT_GRACE_SECS", defaults.disconnect_grace),
            finished_retention: env_secs("FINISHED_RETENTION_SECS", defaults.finished_retention),
            blank_card_ratio,
            end_vote_rule,
        }
    }
}

/// Process-level settings
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: IpAddr,
    pub port: u16,
    pub cards_path: PathBuf,
    pub static_dir: PathBuf,
    pub game: GameConfig,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let bind_addr = std::env::var("BIND_ADDR")
            .ok()
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));

        let port = std::env::var("PORT")
            .ok()
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(3000);

        let cards_path = std::env::var("CARDS_PATH")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "data/cards.json".to_string());

        let static_dir = std::env::var("STATIC_DIR")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "static".to_string());

        Self {
            bind_addr,
            port,
            cards_path: PathBuf::from(cards_path),
            static_dir: PathBuf::from(static_dir),
            game: GameConfig::from_env(),
        }
    }
}
