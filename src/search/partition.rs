//! Key space partitioning
//!
//! A [`KeySpace`] of `size` keys is split over a fixed number of workers.
//! Two layouts are supported:
//! - **Contiguous**: worker `i` owns `[i*per, (i+1)*per - 1]` with
//!   `per = size / n`; the last worker also absorbs the remainder.
//! - **Strided**: worker `i` owns every key congruent to `i mod n`.
//!
//! Either way every key in `[0, size)` belongs to exactly one worker.

use crate::search::config::PartitionStrategy;
use crate::search::error::PartitionError;

/// Default key width, matching a 2^20 demo key space
pub const DEFAULT_KEY_BITS: u32 = 20;

/// The full set of candidate keys, `[0, size)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeySpace {
    size: u64,
}

impl KeySpace {
    pub fn new(size: u64) -> Result<Self, PartitionError> {
        if size == 0 {
            return Err(PartitionError::EmptyKeySpace);
        }
        Ok(Self { size })
    }

    /// Key space of all `bits`-bit keys, limited to `max_bits`.
    pub fn from_bits(bits: u32, max_bits: u32) -> Result<Self, PartitionError> {
        if bits == 0 || bits > max_bits || bits >= u64::BITS {
            return Err(PartitionError::KeyBitsOutOfRange {
                bits,
                max: max_bits,
            });
        }
        Self::new(1u64 << bits)
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn contains(&self, key: u64) -> bool {
        key < self.size
    }
}

impl Default for KeySpace {
    fn default() -> Self {
        Self {
            size: 1 << DEFAULT_KEY_BITS,
        }
    }
}

/// The keys one worker is responsible for: `lower, lower + stride, ... < end`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerRange {
    pub worker_id: usize,
    pub lower: u64,
    pub end: u64,
    pub stride: usize,
}

impl WorkerRange {
    /// Inclusive upper bound, or `None` for an empty range.
    ///
    /// For strided ranges this is the last key actually visited.
    pub fn upper(&self) -> Option<u64> {
        let len = self.len();
        if len == 0 {
            return None;
        }
        Some(self.lower + (len - 1) * self.stride as u64)
    }

    /// Number of keys in the range
    pub fn len(&self) -> u64 {
        if self.end <= self.lower {
            return 0;
        }
        (self.end - self.lower).div_ceil(self.stride as u64)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keys in scan order (ascending)
    pub fn keys(&self) -> impl Iterator<Item = u64> + use<> {
        (self.lower..self.end).step_by(self.stride)
    }

    #[cfg(test)]
    pub fn contains(&self, key: u64) -> bool {
        key >= self.lower && key < self.end && (key - self.lower) % self.stride as u64 == 0
    }
}

impl std::fmt::Display for WorkerRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.upper() {
            Some(upper) if self.stride == 1 => write!(f, "[{}, {}]", self.lower, upper),
            Some(upper) => write!(f, "[{}, {}] step {}", self.lower, upper, self.stride),
            None => write!(f, "[]"),
        }
    }
}

/// Split `space` over `worker_count` workers.
pub fn partition(
    space: KeySpace,
    worker_count: usize,
    strategy: PartitionStrategy,
) -> Result<Vec<WorkerRange>, PartitionError> {
    if worker_count == 0 {
        return Err(PartitionError::NoWorkers);
    }
    let size = space.size();

    let ranges = match strategy {
        PartitionStrategy::Contiguous => {
            let per_worker = size / worker_count as u64;
            (0..worker_count)
                .map(|worker_id| {
                    let lower = per_worker * worker_id as u64;
                    let end = if worker_id == worker_count - 1 {
                        size
                    } else {
                        lower + per_worker
                    };
                    WorkerRange {
                        worker_id,
                        lower,
                        end,
                        stride: 1,
                    }
                })
                .collect()
        }
        PartitionStrategy::Strided => (0..worker_count)
            .map(|worker_id| WorkerRange {
                worker_id,
                lower: worker_id as u64,
                end: size,
                stride: worker_count,
            })
            .collect(),
    };

    Ok(ranges)
}

/// The worker whose range holds `key`, if any.
#[cfg(test)]
pub fn owner_of(ranges: &[WorkerRange], key: u64) -> Option<usize> {
    ranges.iter().find(|r| r.contains(key)).map(|r| r.worker_id)
}
