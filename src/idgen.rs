//! Unique reference id generation.
//!
//! # Layout
//! ```text
//! | 1 bit unused | 41 bits ms since epoch | 10 bits node | 12 bits sequence |
//! ```
//!
//! # Design Decisions
//! - Ids from one generator are strictly increasing, even if the wall clock steps back
//! - A sequence overflow within one millisecond borrows the next millisecond instead of sleeping
//! - Node id comes from config, or is derived from `HOSTNAME` so each pod gets its own

use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds since the Unix epoch of the id epoch (2010-11-04T01:42:54.657Z).
pub const EPOCH_MS: i64 = 1_288_834_974_657;
pub const NODE_BITS: u32 = 10;
pub const STEP_BITS: u32 = 12;
pub const MAX_NODE_ID: i64 = (1 << NODE_BITS) - 1;
const STEP_MASK: i64 = (1 << STEP_BITS) - 1;
const TIME_SHIFT: u32 = NODE_BITS + STEP_BITS;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdGenError {
    #[error("HOSTNAME is not set")]
    MissingHostname,
    #[error("node id {0} must be between 0 and {max}", max = MAX_NODE_ID)]
    NodeIdOutOfRange(i64),
}

/// Source of unique 64-bit reference ids.
pub trait IdGenerator: Send + Sync {
    fn generate(&self) -> i64;
}

#[derive(Debug)]
struct SnowflakeState {
    last_ms: i64,
    step: i64,
}

/// Snowflake generator for one node.
#[derive(Debug)]
pub struct Snowflake {
    node_id: i64,
    state: Mutex<SnowflakeState>,
}

impl Snowflake {
    pub fn new(node_id: i64) -> Result<Self, IdGenError> {
        if !(0..=MAX_NODE_ID).contains(&node_id) {
            return Err(IdGenError::NodeIdOutOfRange(node_id));
        }
        Ok(Self {
            node_id,
            state: Mutex::new(SnowflakeState {
                last_ms: 0,
                step: 0,
            }),
        })
    }

    pub fn node_id(&self) -> i64 {
        self.node_id
    }

    fn next_id(&self, now_ms: i64) -> i64 {
        let mut state = self.state.lock().expect("snowflake mutex poisoned");

        if now_ms > state.last_ms {
            state.last_ms = now_ms;
            state.step = 0;
        } else {
            state.step = (state.step + 1) & STEP_MASK;
            if state.step == 0 {
                state.last_ms += 1;
            }
        }

        (state.last_ms << TIME_SHIFT) | (self.node_id << STEP_BITS) | state.step
    }
}

impl IdGenerator for Snowflake {
    fn generate(&self) -> i64 {
        let now_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(EPOCH_MS);
        self.next_id(now_ms - EPOCH_MS)
    }
}

/// Split an id into (ms since epoch, node, sequence).
pub fn decompose(id: i64) -> (i64, i64, i64) {
    (
        id >> TIME_SHIFT,
        (id >> STEP_BITS) & MAX_NODE_ID,
        id & STEP_MASK,
    )
}

/// FNV-1a 64 of `hostname`, reduced to the node id range.
pub fn node_id_from_hostname(hostname: &str) -> i64 {
    const OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;

    let hash = hostname.bytes().fold(OFFSET_BASIS, |hash, byte| {
        (hash ^ u64::from(byte)).wrapping_mul(PRIME)
    });
    (hash % (MAX_NODE_ID as u64 + 1)) as i64
}

/// Node id for this process, derived from the `HOSTNAME` environment variable.
pub fn pod_node_id() -> Result<i64, IdGenError> {
    match std::env::var("HOSTNAME") {
        Ok(hostname) if !hostname.is_empty() => Ok(node_id_from_hostname(&hostname)),
        _ => Err(IdGenError::MissingHostname),
    }
}
