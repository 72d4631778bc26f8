use crate::hub::{DEFAULT_HUB_QUEUE_CAPACITY, HubConfig};
use crate::session::{
    DEFAULT_MAILBOX_CAPACITY, DEFAULT_PING_PERIOD, DEFAULT_PONG_WAIT, DEFAULT_WRITE_WAIT,
    SessionConfig,
};
use std::env;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

pub const DEFAULT_MAX_FRAME_BYTES: usize = 4096;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub jwt_secret: String,
    pub max_frame_bytes: usize,
    pub hub: HubConfig,
    pub session: SessionConfig,
}

fn var_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn secs_or(key: &str, default: Duration) -> Duration {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .map(Duration::from_secs)
        .unwrap_or(default)
}

/// Replaces values the session duties cannot run with.
fn checked_session(mut session: SessionConfig) -> SessionConfig {
    if session.mailbox_capacity == 0 {
        warn!("MAILBOX_CAPACITY must be positive, using 1");
        session.mailbox_capacity = 1;
    }
    if session.pong_wait.is_zero() {
        warn!("PONG_WAIT_SECS must be positive, using the default");
        session.pong_wait = DEFAULT_PONG_WAIT;
    }
    if session.write_wait.is_zero() {
        warn!("WRITE_WAIT_SECS must be positive, using the default");
        session.write_wait = DEFAULT_WRITE_WAIT;
    }
    if session.ping_period.is_zero() || session.ping_period >= session.pong_wait {
        warn!(
            ping_period = ?session.ping_period,
            pong_wait = ?session.pong_wait,
            "Ping period must be positive and shorter than pong wait, using 9/10 of pong wait"
        );
        session.ping_period = session.pong_wait * 9 / 10;
    }
    session
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            database_url: "sqlite::memory:".to_string(),
            jwt_secret: "dev-secret".to_string(),
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
            hub: HubConfig::default(),
            session: SessionConfig::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let jwt_secret = env::var("JWT_SECRET").unwrap_or_else(|_| {
            warn!("JWT_SECRET not set, using the development secret");
            "dev-secret".to_string()
        });

        let session = checked_session(SessionConfig {
            mailbox_capacity: var_or("MAILBOX_CAPACITY", DEFAULT_MAILBOX_CAPACITY),
            pong_wait: secs_or("PONG_WAIT_SECS", DEFAULT_PONG_WAIT),
            ping_period: secs_or("PING_PERIOD_SECS", DEFAULT_PING_PERIOD),
            write_wait: secs_or("WRITE_WAIT_SECS", DEFAULT_WRITE_WAIT),
        });

        Self {
            port: var_or("PORT", 3000),
            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite::memory:".to_string()),
            jwt_secret,
            max_frame_bytes: var_or("MAX_FRAME_BYTES", DEFAULT_MAX_FRAME_BYTES),
            hub: HubConfig {
                queue_capacity: var_or("HUB_QUEUE_CAPACITY", DEFAULT_HUB_QUEUE_CAPACITY),
            },
            session,
        }
    }

    pub fn addr(&self) -> String {
        format!("0.0.0.0:{}", self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(capacity: usize, pong: u64, ping: u64, write: u64) -> SessionConfig {
        SessionConfig {
            mailbox_capacity: capacity,
            pong_wait: Duration::from_secs(pong),
            ping_period: Duration::from_secs(ping),
            write_wait: Duration::from_secs(write),
        }
    }

    #[test]
    fn valid_timers_are_kept() {
        let checked = checked_session(session(8, 60, 54, 10));
        assert_eq!(checked.mailbox_capacity, 8);
        assert_eq!(checked.pong_wait, Duration::from_secs(60));
        assert_eq!(checked.ping_period, Duration::from_secs(54));
        assert_eq!(checked.write_wait, Duration::from_secs(10));
    }

    #[test]
    fn zero_values_fall_back() {
        let checked = checked_session(session(0, 0, 0, 0));
        assert_eq!(checked.mailbox_capacity, 1);
        assert_eq!(checked.pong_wait, DEFAULT_PONG_WAIT);
        assert_eq!(checked.write_wait, DEFAULT_WRITE_WAIT);
        assert!(!checked.ping_period.is_zero());
        assert!(checked.ping_period < checked.pong_wait);
    }

    #[test]
    fn ping_period_is_kept_below_pong_wait() {
        let checked = checked_session(session(8, 10, 30, 10));
        assert_eq!(checked.ping_period, Duration::from_secs(9));
    }
}
