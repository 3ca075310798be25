use std::fmt;
use std::time::{Duration, Instant};

use anyhow::Result;
use wire_type::varint::{self, Varint};

/// How a varint type compares to its fixed-width encoding.
#[derive(Debug, Clone, Copy)]
pub struct VarintStats {
    pub name: &'static str,
    /// Fixed width of the type in bytes.
    pub width: usize,
    pub count: u64,
    /// Bytes saved by values shorter than the fixed width.
    pub saved: u64,
    /// Bytes wasted by values longer than the fixed width.
    pub wasted: u64,
    pub elapsed: Duration,
}

impl VarintStats {
    /// The average encoded length.
    pub fn average_len(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }

        let fixed = self.count * self.width as u64;
        let total = fixed + self.wasted - self.saved;
        total as f64 / self.count as f64
    }
}

impl fmt::Display for VarintStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:>3}: {} values in {:.2?}, {} bytes saved, {} bytes wasted",
            self.name, self.count, self.elapsed, self.saved, self.wasted,
        )
    }
}

/// Encodes and decodes `count` values from `sample`, checking that each
/// survives and counting the bytes saved or wasted compared to `T`'s width.
pub fn measure<T, F>(name: &'static str, count: u32, mut sample: F) -> Result<VarintStats>
where
    T: Varint + PartialEq + fmt::Debug,
    F: FnMut(u32) -> T,
{
    let width = size_of::<T>();
    let mut stats = VarintStats {
        name,
        width,
        count: 0,
        saved: 0,
        wasted: 0,
        elapsed: Duration::ZERO,
    };

    let start = Instant::now();
    for index in 0..count {
        let value = sample(index);
        let bytes = varint::to_bytes(value);
        let (rev, read) = varint::decode::<T>(&bytes)?;

        anyhow::ensure!(
            read == bytes.len(),
            "{name} {value:?}: wrote {} bytes, read {read}",
            bytes.len()
        );
        anyhow::ensure!(rev == value, "{name} {value:?}: read back {rev:?}");

        let len = bytes.len();
        if len < width {
            stats.saved += (width - len) as u64;
        } else {
            stats.wasted += (len - width) as u64;
        }

        stats.count += 1;
    }

    stats.elapsed = start.elapsed();
    Ok(stats)
}
