//! Environment-driven configuration for the Scheduler Core.
//!
//! No config *file* loading lives here (that is explicitly out of scope);
//! every knob is an environment variable with a hard-coded default, following
//! a `DB_*` / `REDIS_*` / `RABBITMQ_*` / `SCHEDULER_*` naming convention.
//! `dotenvy::from_filename(".env.local")` is the caller's responsibility —
//! the runtime binary loads it before calling `SchedulerConfig::from_env`.

use std::net::IpAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use ipnet::IpNet;

#[derive(Debug, Clone)]
pub struct DbConfig {
    pub url: String,
    pub min_connections: u32,
    pub max_connections: u32,
}

#[derive(Debug, Clone)]
pub struct RedisConfig {
    pub url: String,
    pub pool_size: u32,
}

#[derive(Debug, Clone)]
pub struct BrokerConfig {
    pub url: String,
    pub task_exchange: String,
    pub result_exchange: String,
    pub result_queue: String,
    pub prefetch: u16,
    pub publish_timeout: Duration,
    pub retry_base: Duration,
    pub retry_multiplier: f64,
    pub retry_max_delay: Duration,
    pub retry_attempts: u32,
    pub retry_jitter_pct: f64,
}

#[derive(Debug, Clone)]
pub struct TuningConfig {
    pub max_concurrent_tasks: usize,
    pub lease_ttl: Duration,
    pub task_timeout: Duration,
    pub lock_timeout: Duration,
    pub cleanup_interval: Duration,
    pub task_orphan_timeout: Duration,
    pub index_reconcile_interval: Duration,
    pub shutdown_timeout: Duration,
    pub tick_interval: Duration,
}

impl Default for TuningConfig {
    fn default() -> Self {
        let lease_ttl = Duration::from_secs(300);
        Self {
            max_concurrent_tasks: 10,
            lease_ttl,
            task_timeout: Duration::from_secs(10),
            lock_timeout: Duration::from_secs(5),
            cleanup_interval: Duration::from_secs(60),
            // default = lease_ttl/.
            task_orphan_timeout: lease_ttl,
            index_reconcile_interval: Duration::from_secs(60),
            shutdown_timeout: Duration::from_secs(30),
            tick_interval: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AdminConfig {
    /// CIDR blocks allowed to have their `X-Forwarded-For` header trusted.
    /// Empty means: never trust forwarded headers, always use the socket
    /// peer address.
    pub trusted_proxies: Vec<IpNet>,
    pub bind_addr: String,
    /// Sliding-window request cap per resolved client IP. `0` disables the
    /// limiter.
    pub rate_limit_per_minute: u32,
}

impl AdminConfig {
    pub fn trusts(&self, peer: IpAddr) -> bool {
        self.trusted_proxies.iter().any(|net| net.contains(&peer))
    }
}

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub db: DbConfig,
    pub redis: RedisConfig,
    pub broker: BrokerConfig,
    pub tuning: TuningConfig,
    pub admin: AdminConfig,
    pub owner_id: String,
}

impl SchedulerConfig {
    pub fn from_env() -> Result<Self> {
        let tuning = TuningConfig {
            max_concurrent_tasks: env_usize("SCHEDULER_MAX_CONCURRENT_TASKS", 10)?,
            task_timeout: env_duration_secs("SCHEDULER_TASK_TIMEOUT", 10)?,
            lock_timeout: env_duration_secs("SCHEDULER_LOCK_TIMEOUT", 5)?,
            cleanup_interval: env_duration_secs("SCHEDULER_CLEANUP_INTERVAL", 60)?,
            ..TuningConfig::default()
        };

        let lease_ttl = env_duration_secs("SCHEDULER_LEASE_TTL", tuning.lease_ttl.as_secs())?;
        let task_orphan_timeout =
            env_duration_secs("SCHEDULER_TASK_ORPHAN_TIMEOUT", lease_ttl.as_secs())?;

        let tuning = TuningConfig {
            lease_ttl,
            task_orphan_timeout,
            ..tuning
        };

        Ok(Self {
            db: DbConfig {
                url: env_string("DB_URL", "postgres://localhost/scheduler_core"),
                min_connections: env_u32("DB_MIN_CONNECTIONS", 5)?,
                max_connections: env_u32("DB_MAX_CONNECTIONS", 20)?,
            },
            redis: RedisConfig {
                url: env_string("REDIS_URL", "redis://localhost:6379"),
                pool_size: env_u32("REDIS_POOL_SIZE", 10)?,
            },
            broker: BrokerConfig {
                url: env_string("RABBITMQ_URL", "amqp://localhost:5672/%2f"),
                task_exchange: env_string("RABBITMQ_TASK_EXCHANGE", "checks.tasks"),
                result_exchange: env_string("RABBITMQ_RESULT_EXCHANGE", "checks.results"),
                result_queue: env_string("RABBITMQ_RESULT_QUEUE", "scheduler.results"),
                prefetch: env_u16("RABBITMQ_PREFETCH", 10)?,
                publish_timeout: Duration::from_secs(10),
                retry_base: Duration::from_secs(1),
                retry_multiplier: 2.0,
                retry_max_delay: Duration::from_secs(30),
                retry_attempts: 3,
                retry_jitter_pct: 0.25,
            },
            tuning,
            admin: AdminConfig {
                trusted_proxies: env_cidr_list("ADMIN_TRUSTED_PROXIES")?,
                bind_addr: env_string("ADMIN_BIND_ADDR", "127.0.0.1:8899"),
                rate_limit_per_minute: env_u32("ADMIN_RATE_LIMIT_PER_MINUTE", 600)?,
            },
            owner_id: env_string("SCHEDULER_OWNER_ID", &default_owner_id()),
        })
    }
}

fn default_owner_id() -> String {
    format!("replica-{}", std::process::id())
}

fn env_string(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_u32(key: &str, default: u32) -> Result<u32> {
    match std::env::var(key) {
        Ok(v) => v.parse().with_context(|| format!("parse {key}")),
        Err(_) => Ok(default),
    }
}

fn env_u16(key: &str, default: u16) -> Result<u16> {
    match std::env::var(key) {
        Ok(v) => v.parse().with_context(|| format!("parse {key}")),
        Err(_) => Ok(default),
    }
}

fn env_usize(key: &str, default: usize) -> Result<usize> {
    match std::env::var(key) {
        Ok(v) => v.parse().with_context(|| format!("parse {key}")),
        Err(_) => Ok(default),
    }
}

fn env_duration_secs(key: &str, default_secs: u64) -> Result<Duration> {
    match std::env::var(key) {
        Ok(v) => {
            let secs: u64 = v.parse().with_context(|| format!("parse {key}"))?;
            Ok(Duration::from_secs(secs))
        }
        Err(_) => Ok(Duration::from_secs(default_secs)),
    }
}

fn env_cidr_list(key: &str) -> Result<Vec<IpNet>> {
    match std::env::var(key) {
        Ok(v) if !v.trim().is_empty() => v
            .split(',')
            .map(|s| s.trim().parse::<IpNet>().with_context(|| format!("parse {key}")))
            .collect(),
        _ => Ok(Vec::new()),
    }
}
