//! Key generators for INSERTs that omit the generated key column.

use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use tessera_common::datum::Datum;
use tessera_common::error::TesseraResult;

use crate::algorithm::{AlgorithmConfig, Props};

pub trait KeyGenerator: Send + Sync + fmt::Debug {
    fn type_name(&self) -> &'static str;

    fn next_key(&self) -> Datum;
}

/// 2016-11-01T00:00:00Z in milliseconds.
pub const SNOWFLAKE_EPOCH_MS: i64 = 1_477_958_400_000;

const WORKER_ID_BITS: u32 = 10;
const SEQUENCE_BITS: u32 = 12;
const MAX_WORKER_ID: i64 = (1 << WORKER_ID_BITS) - 1;
const SEQUENCE_MASK: i64 = (1 << SEQUENCE_BITS) - 1;

#[derive(Debug, Default)]
struct SnowflakeState {
    last_ms: i64,
    sequence: i64,
}

/// 41-bit millisecond timestamp | 10-bit worker id | 12-bit sequence.
///
/// Keys are strictly increasing per generator. When the wall clock steps
/// back the generator keeps issuing from its last timestamp, borrowing
/// from the future when a millisecond's sequence is exhausted.
pub struct SnowflakeKeyGenerator {
    worker_id: i64,
    max_tolerate_ms: i64,
    state: Mutex<SnowflakeState>,
    clock: Box<dyn Fn() -> i64 + Send + Sync>,
}

impl fmt::Debug for SnowflakeKeyGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SnowflakeKeyGenerator")
            .field("worker_id", &self.worker_id)
            .field("max_tolerate_ms", &self.max_tolerate_ms)
            .finish()
    }
}

fn system_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(SNOWFLAKE_EPOCH_MS)
}

impl SnowflakeKeyGenerator {
    pub(crate) fn new(props: &Props<'_>) -> TesseraResult<Self> {
        let worker_id = props.i64_or("worker-id", 0)?;
        if !(0..=MAX_WORKER_ID).contains(&worker_id) {
            return Err(props.error(format!(
                "worker-id must be within [0, {MAX_WORKER_ID}], got {worker_id}"
            )));
        }
        let max_tolerate_ms = props.i64_or("max-tolerate-time-difference-ms", 10)?;
        Ok(Self::with_clock(worker_id, max_tolerate_ms, Box::new(system_millis)))
    }

    pub fn with_clock(
        worker_id: i64,
        max_tolerate_ms: i64,
        clock: Box<dyn Fn() -> i64 + Send + Sync>,
    ) -> Self {
        Self {
            worker_id: worker_id & MAX_WORKER_ID,
            max_tolerate_ms,
            state: Mutex::new(SnowflakeState::default()),
            clock,
        }
    }

    pub fn worker_id_of(key: i64) -> i64 {
        (key >> SEQUENCE_BITS) & MAX_WORKER_ID
    }

    pub fn timestamp_of(key: i64) -> i64 {
        (key >> (SEQUENCE_BITS + WORKER_ID_BITS)) + SNOWFLAKE_EPOCH_MS
    }
}

impl KeyGenerator for SnowflakeKeyGenerator {
    fn type_name(&self) -> &'static str {
        "SNOWFLAKE"
    }

    fn next_key(&self) -> Datum {
        let now = (self.clock)();
        let mut state = self.state.lock();
        if now < state.last_ms {
            let behind = state.last_ms - now;
            if behind > self.max_tolerate_ms {
                tracing::warn!(
                    behind_ms = behind,
                    tolerate_ms = self.max_tolerate_ms,
                    "clock moved backwards beyond tolerance; continuing from last timestamp"
                );
            }
        }
        let ms = now.max(state.last_ms);
        if ms == state.last_ms {
            state.sequence = (state.sequence + 1) & SEQUENCE_MASK;
            if state.sequence == 0 {
                state.last_ms += 1;
            }
        } else {
            state.sequence = 0;
            state.last_ms = ms;
        }
        let key = ((state.last_ms - SNOWFLAKE_EPOCH_MS) << (SEQUENCE_BITS + WORKER_ID_BITS))
            | (self.worker_id << SEQUENCE_BITS)
            | state.sequence;
        Datum::Int64(key)
    }
}

/// Process-local counter starting at `start` (default 1).
#[derive(Debug)]
pub struct IncrementKeyGenerator {
    next: AtomicI64,
}

impl IncrementKeyGenerator {
    pub fn new(start: i64) -> Self {
        Self {
            next: AtomicI64::new(start),
        }
    }
}

impl KeyGenerator for IncrementKeyGenerator {
    fn type_name(&self) -> &'static str {
        "INCREMENT"
    }

    fn next_key(&self) -> Datum {
        Datum::Int64(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

pub fn create_key_generator(
    name: &str,
    config: &AlgorithmConfig,
) -> TesseraResult<Arc<dyn KeyGenerator>> {
    let props = Props::new(name, &config.props);
    match config.kind.to_ascii_uppercase().as_str() {
        "SNOWFLAKE" => Ok(Arc::new(SnowflakeKeyGenerator::new(&props)?)),
        "INCREMENT" => {
            Ok(Arc::new(IncrementKeyGenerator::new(props.i64_or("start", 1)?)))
        }
        other => Err(props.error(format!("unknown key generator type '{other}'"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicI64 as Clock;

    fn fixed_clock(at: Arc<Clock>) -> Box<dyn Fn() -> i64 + Send + Sync> {
        Box::new(move || at.load(Ordering::SeqCst))
    }

    #[test]
    fn test_snowflake_layout() {
        let now = SNOWFLAKE_EPOCH_MS + 1_000;
        let g = SnowflakeKeyGenerator::with_clock(7, 10, fixed_clock(Arc::new(Clock::new(now))));
        let Datum::Int64(k) = g.next_key() else {
            panic!("snowflake keys are integers")
        };
        assert_eq!(SnowflakeKeyGenerator::worker_id_of(k), 7);
        assert_eq!(SnowflakeKeyGenerator::timestamp_of(k), now);
        assert_eq!(k & SEQUENCE_MASK, 0);
    }

    #[test]
    fn test_snowflake_monotonic_when_clock_steps_back() {
        let clock = Arc::new(Clock::new(SNOWFLAKE_EPOCH_MS + 5_000));
        let g = SnowflakeKeyGenerator::with_clock(1, 10, fixed_clock(clock.clone()));
        let mut last = i64::MIN;
        for step in [0, 0, -3, -500, 2, 1] {
            clock.fetch_add(step, Ordering::SeqCst);
            let Datum::Int64(k) = g.next_key() else {
                panic!("snowflake keys are integers")
            };
            assert!(k > last, "{k} <= {last}");
            last = k;
        }
    }

    #[test]
    fn test_snowflake_sequence_rollover_moves_forward() {
        let clock = Arc::new(Clock::new(SNOWFLAKE_EPOCH_MS + 1));
        let g = SnowflakeKeyGenerator::with_clock(0, 10, fixed_clock(clock));
        let mut last = i64::MIN;
        for _ in 0..(SEQUENCE_MASK + 10) {
            let Datum::Int64(k) = g.next_key() else {
                panic!("snowflake keys are integers")
            };
            assert!(k > last);
            last = k;
        }
    }

    #[test]
    fn test_snowflake_worker_id_validated() {
        let cfg = AlgorithmConfig::new("SNOWFLAKE").with_prop("worker-id", 5000i64);
        assert!(create_key_generator("k", &cfg).unwrap_err().is_configuration());
        let cfg = AlgorithmConfig::new("snowflake");
        assert_eq!(create_key_generator("k", &cfg).unwrap().type_name(), "SNOWFLAKE");
    }

    #[test]
    fn test_increment() {
        let cfg = AlgorithmConfig::new("INCREMENT").with_prop("start", 100i64);
        let g = create_key_generator("k", &cfg).unwrap();
        assert_eq!(g.next_key(), Datum::Int64(100));
        assert_eq!(g.next_key(), Datum::Int64(101));
        assert!(create_key_generator("k", &AlgorithmConfig::new("UUIDV9")).is_err());
    }
}
