use std::time::Duration;

// -
// Cache members

/// Read/write bound for a single cache command round trip
pub(crate) const CACHE_RW_TIMEOUT: Duration = Duration::from_secs(1);

pub(crate) const DEFAULT_CACHE_POOL_SIZE: i64 = 10;

/// Connection slots are allocated up front, so the size is capped
pub(crate) const MAX_CACHE_POOL_SIZE: i64 = 1024;

pub(crate) const DEFAULT_CACHE_IDLE_TIMEOUT_SECS: i64 = 300;

// -
// Database members

pub(crate) const DEFAULT_DB_MAX_LIFETIME_SECS: i64 = 2 * 3600;

pub(crate) const DEFAULT_DB_MAX_IDLE_CONNS: i64 = 5;

pub(crate) const DEFAULT_DB_MAX_OPEN_CONNS: i64 = 100;

// -
// Messaging members

pub(crate) const AMQP_DEFAULT_PORT: u16 = 5672;

/// Protocol header a 0-9-1 client opens with
pub(crate) const AMQP_PROTOCOL_HEADER: &[u8; 8] = b"AMQP\x00\x00\x09\x01";

// -
// Engine

/// User steps are shifted past the internal bring-up steps
pub(crate) const USER_STEP_OFFSET: i64 = 100;
