//! Collision-resistant random names for units.
//!
//! Names are drawn uniformly from [`ALPHABET`] by rejection sampling: each raw
//! byte is masked to its low 6 bits and kept only if it indexes the alphabet,
//! so no symbol is favoured the way a modulo reduction would favour some.

use rand::TryRngCore;
use rand::rngs::OsRng;

use crate::error::{Result, SandboxError};

/// The 62 symbols a name is made of.
pub const ALPHABET: &[u8; 62] = b"abcdefghijklmnopqrstuvwxyz0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Length of the names the executor gives its units.
pub const UNIT_NAME_LENGTH: usize = 20;

const INDEX_MASK: u8 = 0x3f;

/// Consecutive refills without a single accepted byte before the source is
/// declared broken. A healthy source hits this with probability ~(1/32)^64.
const MAX_BARREN_REFILLS: u32 = 64;

/// Supplier of raw random bytes.
pub trait EntropySource: Send + Sync {
    fn fill(&self, buf: &mut [u8]) -> Result<()>;
}

/// Operating system CSPRNG. Never falls back to a weaker generator.
pub struct OsEntropy;

impl EntropySource for OsEntropy {
    fn fill(&self, buf: &mut [u8]) -> Result<()> {
        OsRng
            .try_fill_bytes(buf)
            .map_err(|e| SandboxError::EntropyUnavailable(e.to_string()))
    }
}

pub struct NameGenerator {
    entropy: Box<dyn EntropySource>,
}

impl Default for NameGenerator {
    fn default() -> Self {
        Self::new(Box::new(OsEntropy))
    }
}

impl NameGenerator {
    pub fn new(entropy: Box<dyn EntropySource>) -> Self {
        Self { entropy }
    }

    /// Generate a name of exactly `length` alphabet symbols.
    ///
    /// Raw bytes are drawn in blocks of ~1.3x `length` to absorb the ~3%
    /// rejection rate; the block is refilled until enough symbols are
    /// accepted.
    pub fn generate(&self, length: usize) -> Result<String> {
        let block_len = (length * 13).div_ceil(10).max(1);
        let mut raw = vec![0u8; block_len];
        let mut name = String::with_capacity(length);
        let mut barren_refills = 0;

        while name.len() < length {
            self.entropy.fill(&mut raw)?;
            let before = name.len();
            for byte in &raw {
                if let Some(&symbol) = ALPHABET.get(usize::from(byte & INDEX_MASK)) {
                    name.push(char::from(symbol));
                    if name.len() == length {
                        break;
                    }
                }
            }

            if name.len() == before {
                barren_refills += 1;
                if barren_refills >= MAX_BARREN_REFILLS {
                    return Err(SandboxError::EntropyUnavailable(
                        "entropy source produced no usable bytes".into(),
                    ));
                }
            } else {
                barren_refills = 0;
            }
        }

        Ok(name)
    }
}

/// Generate a name from the OS entropy source.
pub fn random_name(length: usize) -> Result<String> {
    NameGenerator::default().generate(length)
}
