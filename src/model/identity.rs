use std::fmt;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use uuid::Uuid;

use crate::core::{DataType, DbError, Result, Value};

/// 2021-01-01T00:00:00+08:00
pub const DEFAULT_SNOWFLAKE_EPOCH: i64 = 1_609_430_400_000;

const WORKER_ID_BITS: u32 = 5;
const DATACENTER_ID_BITS: u32 = 5;
const SEQUENCE_BITS: u32 = 12;

const MAX_NODE_ID: i64 = (1 << WORKER_ID_BITS) - 1;
const SEQUENCE_MASK: i64 = (1 << SEQUENCE_BITS) - 1;

const WORKER_SHIFT: u32 = SEQUENCE_BITS;
const DATACENTER_SHIFT: u32 = SEQUENCE_BITS + WORKER_ID_BITS;
const TIMESTAMP_SHIFT: u32 = SEQUENCE_BITS + WORKER_ID_BITS + DATACENTER_ID_BITS;

/// How an identity field receives its value on insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityStrategy {
    /// Time-ordered integer; `None` uses the configured epoch.
    Snowflake { epoch_millis: Option<i64> },
    /// 32 lowercase hex characters.
    Uuid32,
    /// Hyphenated 36 character form.
    Uuid36,
    /// The store assigns the key; it is read back after insert.
    StoreAssigned,
}

impl Default for IdentityStrategy {
    fn default() -> Self {
        Self::Snowflake { epoch_millis: None }
    }
}

impl IdentityStrategy {
    pub fn snowflake() -> Self {
        Self::default()
    }

    pub fn is_store_assigned(&self) -> bool {
        matches!(self, Self::StoreAssigned)
    }

    pub(crate) fn check_field_type(&self, field: &str, data_type: DataType) -> Result<()> {
        match (self, data_type) {
            (Self::Uuid32 | Self::Uuid36, DataType::Text) => Ok(()),
            (Self::Uuid32 | Self::Uuid36, other) => Err(DbError::configuration(format!(
                "uuid identity on field '{}' requires a text field, found {}",
                field, other
            ))),
            (Self::Snowflake { .. }, DataType::Integer | DataType::Text) => Ok(()),
            (Self::Snowflake { .. }, other) => Err(DbError::configuration(format!(
                "snowflake identity on field '{}' requires an integer or text field, found {}",
                field, other
            ))),
            (Self::StoreAssigned, _) => Ok(()),
        }
    }
}

/// Produces identity values for newly inserted models.
pub trait IdGenerator: Send + Sync {
    fn generate(&self) -> Result<Value>;
}

pub struct Uuid32Generator;

impl IdGenerator for Uuid32Generator {
    fn generate(&self) -> Result<Value> {
        Ok(Value::Text(Uuid::new_v4().simple().to_string()))
    }
}

pub struct Uuid36Generator;

impl IdGenerator for Uuid36Generator {
    fn generate(&self) -> Result<Value> {
        Ok(Value::Text(Uuid::new_v4().hyphenated().to_string()))
    }
}

/// 41 bits of milliseconds since `epoch`, 5 bits datacenter, 5 bits worker,
/// 12 bits sequence.
pub struct SnowflakeGenerator {
    epoch: i64,
    datacenter_id: i64,
    worker_id: i64,
    state: Mutex<SnowflakeState>,
}

#[derive(Default)]
struct SnowflakeState {
    last_timestamp: i64,
    sequence: i64,
}

impl SnowflakeGenerator {
    pub fn new(epoch: i64, datacenter_id: i64, worker_id: i64) -> Result<Self> {
        if !(0..=MAX_NODE_ID).contains(&datacenter_id) || !(0..=MAX_NODE_ID).contains(&worker_id) {
            return Err(DbError::configuration(format!(
                "snowflake datacenter/worker ids must be within 0..={}",
                MAX_NODE_ID
            )));
        }
        Ok(Self {
            epoch,
            datacenter_id,
            worker_id,
            state: Mutex::new(SnowflakeState::default()),
        })
    }

    pub fn epoch(&self) -> i64 {
        self.epoch
    }

    pub fn next_id(&self) -> Result<i64> {
        let mut state = self.state.lock()?;
        let mut timestamp = Utc::now().timestamp_millis();

        if timestamp < state.last_timestamp {
            return Err(DbError::ExecutionError(format!(
                "clock moved backwards, refusing to generate id for {}ms",
                state.last_timestamp - timestamp
            )));
        }

        if timestamp == state.last_timestamp {
            state.sequence = (state.sequence + 1) & SEQUENCE_MASK;
            if state.sequence == 0 {
                while timestamp <= state.last_timestamp {
                    std::hint::spin_loop();
                    timestamp = Utc::now().timestamp_millis();
                }
            }
        } else {
            state.sequence = 0;
        }
        state.last_timestamp = timestamp;

        Ok(((timestamp - self.epoch) << TIMESTAMP_SHIFT)
            | (self.datacenter_id << DATACENTER_SHIFT)
            | (self.worker_id << WORKER_SHIFT)
            | state.sequence)
    }
}

impl IdGenerator for SnowflakeGenerator {
    fn generate(&self) -> Result<Value> {
        self.next_id().map(Value::Integer)
    }
}

impl fmt::Debug for SnowflakeGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SnowflakeGenerator")
            .field("epoch", &self.epoch)
            .field("datacenter_id", &self.datacenter_id)
            .field("worker_id", &self.worker_id)
            .finish()
    }
}

/// Identity metadata attached to the identity field of a descriptor.
#[derive(Clone)]
pub struct Identity {
    pub strategy: IdentityStrategy,
    pub generator: Option<Arc<dyn IdGenerator>>,
}

impl Identity {
    /// Produces a value shaped for a field of `data_type`, or `None` when the
    /// store assigns keys.
    pub fn next_value(&self, data_type: DataType) -> Result<Option<Value>> {
        let Some(generator) = &self.generator else {
            return Ok(None);
        };
        let value = generator.generate()?;
        let value = match (data_type, value) {
            (DataType::Text, Value::Text(s)) => Value::Text(s),
            (DataType::Text, other) => Value::Text(other.to_string()),
            (_, other) => other.cast_to(&data_type)?,
        };
        Ok(Some(value))
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("strategy", &self.strategy)
            .field("generator", &self.generator.is_some())
            .finish()
    }
}
