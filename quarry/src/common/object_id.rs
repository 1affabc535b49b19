use crate::common::current_epoch_seconds;
use crate::errors::{ErrorKind, QuarryError, QuarryResult};
use crate::ID_GENERATOR;
use log::info;
use rand::rngs::OsRng;
use rand::Rng;
use std::fmt::{Debug, Display};
use std::str::FromStr;
use std::sync::atomic::{AtomicU32, Ordering};

const ID_LENGTH: usize = 12;
const HEX_LENGTH: usize = ID_LENGTH * 2;
const COUNTER_MASK: u32 = 0x00FF_FFFF;

/// The identity of a stored document.
///
/// An `ObjectId` is 12 bytes: a 4-byte big-endian creation time in seconds,
/// a 5-byte process-unique value and a 3-byte counter. Its canonical text
/// form is 24 lowercase hex characters. Ids are generated on the client, so
/// a record knows its identity before it is ever written.
///
/// # Examples
///
/// ```rust,ignore
/// use quarry::common::ObjectId;
///
/// let id = ObjectId::new();
/// let parsed = ObjectId::parse_str(&id.to_hex())?;
/// assert_eq!(id, parsed);
/// ```
#[derive(PartialEq, Eq, Ord, PartialOrd, Hash, Clone, Copy, serde::Deserialize, serde::Serialize)]
pub struct ObjectId {
    bytes: [u8; ID_LENGTH],
}

impl ObjectId {
    /// Generates a new unique `ObjectId`.
    pub fn new() -> Self {
        ID_GENERATOR.next_id()
    }

    /// Wraps raw id bytes.
    pub fn from_bytes(bytes: [u8; ID_LENGTH]) -> Self {
        ObjectId { bytes }
    }

    /// Parses the canonical 24-hex text form.
    ///
    /// Upper case hex digits are accepted; anything else fails with
    /// [ErrorKind::InvalidId].
    pub fn parse_str(text: &str) -> QuarryResult<ObjectId> {
        if text.len() != HEX_LENGTH || !text.chars().all(|c| c.is_ascii_hexdigit()) {
            log::error!("Invalid object id text {:?}", text);
            return Err(QuarryError::new(
                &format!("Invalid object id {:?}: expected {} hex characters", text, HEX_LENGTH),
                ErrorKind::InvalidId,
            ));
        }

        let mut bytes = [0u8; ID_LENGTH];
        for (i, byte) in bytes.iter_mut().enumerate() {
            let pair = &text[i * 2..i * 2 + 2];
            *byte = u8::from_str_radix(pair, 16).map_err(|_| {
                log::error!("Invalid object id text {:?}", text);
                QuarryError::new(
                    &format!("Invalid object id {:?}: not a hex string", text),
                    ErrorKind::InvalidId,
                )
            })?;
        }
        Ok(ObjectId { bytes })
    }

    pub fn bytes(&self) -> [u8; ID_LENGTH] {
        self.bytes
    }

    /// Creation time in seconds since the unix epoch.
    pub fn timestamp(&self) -> u32 {
        u32::from_be_bytes([self.bytes[0], self.bytes[1], self.bytes[2], self.bytes[3]])
    }

    pub fn to_hex(&self) -> String {
        self.bytes.iter().map(|b| format!("{:02x}", b)).collect()
    }
}

impl Default for ObjectId {
    fn default() -> Self {
        ObjectId::new()
    }
}

impl FromStr for ObjectId {
    type Err = QuarryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ObjectId::parse_str(s)
    }
}

impl Debug for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ObjectId(\"{}\")", self.to_hex())
    }
}

impl Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Generates process-unique [ObjectId]s.
pub struct ObjectIdGenerator {
    process_unique: [u8; 5],
    counter: AtomicU32,
}

impl ObjectIdGenerator {
    pub fn new() -> Self {
        let process_unique: [u8; 5] = OsRng.gen();
        let counter = OsRng.gen::<u32>() & COUNTER_MASK;
        info!("Initialized object id generator with counter seed {}", counter);

        ObjectIdGenerator {
            process_unique,
            counter: AtomicU32::new(counter),
        }
    }

    pub fn next_id(&self) -> ObjectId {
        let seconds = current_epoch_seconds();
        let count = self.counter.fetch_add(1, Ordering::Relaxed) & COUNTER_MASK;

        let mut bytes = [0u8; ID_LENGTH];
        bytes[0..4].copy_from_slice(&(seconds as u32).to_be_bytes());
        bytes[4..9].copy_from_slice(&self.process_unique);
        bytes[9..12].copy_from_slice(&count.to_be_bytes()[1..4]);
        ObjectId { bytes }
    }
}

impl Default for ObjectIdGenerator {
    fn default() -> Self {
        ObjectIdGenerator::new()
    }
}
