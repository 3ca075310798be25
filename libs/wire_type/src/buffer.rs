//! A fixed-capacity ring buffer over an [`io::Read`].
//!
//! The buffer tracks two cursors: `get`, the next unread byte, and `set`, the
//! next byte to fill. While `get <= set` the unread bytes are `[get, set)`.
//! Once `get > set` they wrap around and are `[get, capacity)` followed by
//! `[0, set)`. Compaction turns either shape back into a single run starting
//! at offset 0 so that decoding can look at one contiguous slice.

use std::io;

/// The capacity used by [`StreamBuffer::new`].
pub const DEFAULT_CAPACITY: usize = 4096;

/// The smallest capacity a buffer is created with. This keeps any header
/// contiguous after a refill.
pub const MIN_CAPACITY: usize = 16;

/// Buffers bytes read from a source so that decoding doesn't need a system
/// call per byte.
///
/// Payloads larger than the capacity are paged through in chunks.
#[derive(Debug)]
pub struct StreamBuffer {
    data: Box<[u8]>,
    get: usize,
    set: usize,
}

impl Default for StreamBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamBuffer {
    /// Creates a new empty buffer with [`DEFAULT_CAPACITY`].
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Creates a new empty buffer with the given capacity.
    ///
    /// Capacities below [`MIN_CAPACITY`] are raised to it.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: vec![0u8; capacity.max(MIN_CAPACITY)].into_boxed_slice(),
            get: 0,
            set: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// The amount of unread bytes.
    pub fn buffered_count(&self) -> usize {
        if self.get <= self.set {
            self.set - self.get
        } else {
            self.data.len() - self.get + self.set
        }
    }

    /// The first contiguous run of unread bytes.
    ///
    /// If the data wraps around, this is only the part up to the end of the
    /// storage. [`Self::compact`] makes all of it contiguous.
    pub fn unread(&self) -> &[u8] {
        if self.get <= self.set {
            &self.data[self.get..self.set]
        } else {
            &self.data[self.get..]
        }
    }

    /// Marks `count` bytes of [`Self::unread`] as read.
    ///
    /// # Panics
    ///
    /// Panics if `count` is greater than the length of [`Self::unread`].
    pub fn consume(&mut self, count: usize) {
        assert!(count <= self.unread().len(), "cannot consume more than is buffered");

        self.get += count;
        if self.get == self.data.len() && self.set < self.get {
            self.get = 0;
        }
    }

    /// Moves the unread bytes to the start of the storage.
    ///
    /// Wrapped data is always compacted. Contiguous data is only moved if
    /// `force` is set. An empty buffer just resets its cursors.
    pub fn compact(&mut self, force: bool) {
        if self.get == self.set {
            self.get = 0;
            self.set = 0;
        } else if self.get > self.set {
            // [head | free | tail] -> [tail | head | free]
            let tail = self.data.len() - self.get;
            self.data.rotate_right(tail);
            self.set += tail;
            self.get = 0;
        } else if force && self.get != 0 {
            self.data.copy_within(self.get..self.set, 0);
            self.set -= self.get;
            self.get = 0;
        }
    }

    /// Compacts the buffer and then reads as many bytes from `source` as fit
    /// into the free space.
    ///
    /// Returns the number of bytes read. 0 means the source is exhausted or
    /// the buffer is full.
    ///
    /// # Errors
    ///
    /// Returns any error of the source other than
    /// [`io::ErrorKind::Interrupted`], which is retried.
    pub fn refill<R: io::Read>(&mut self, source: &mut R) -> io::Result<usize> {
        self.compact(true);

        let free = &mut self.data[self.set..];
        if free.is_empty() {
            return Ok(0);
        }

        let read = loop {
            match source.read(free) {
                Ok(read) => break read,
                Err(why) if why.kind() == io::ErrorKind::Interrupted => {},
                Err(why) => return Err(why),
            }
        };

        self.set += read;
        Ok(read)
    }

    /// Copies unread bytes into `dest`, refilling from `source` whenever the
    /// buffer runs dry.
    ///
    /// Returns the number of bytes copied, which is only less than
    /// `dest.len()` if the source ended.
    ///
    /// # Errors
    ///
    /// Returns any error of the source.
    pub fn read_into<R: io::Read>(&mut self, source: &mut R, dest: &mut [u8]) -> io::Result<usize> {
        let mut copied = 0;
        while copied < dest.len() {
            let unread = self.unread();
            if unread.is_empty() {
                if self.refill(source)? == 0 {
                    break;
                }

                continue;
            }

            let count = unread.len().min(dest.len() - copied);
            dest[copied..copied + count].copy_from_slice(&unread[..count]);
            self.consume(count);
            copied += count;
        }

        Ok(copied)
    }

    /// Discards up to `count` bytes, refilling from `source` as needed without
    /// keeping the data around.
    ///
    /// Returns the number of bytes skipped, which is only less than `count` if
    /// the source ended.
    ///
    /// # Errors
    ///
    /// Returns any error of the source.
    pub fn skip<R: io::Read>(&mut self, source: &mut R, count: u64) -> io::Result<u64> {
        let mut skipped = 0u64;
        while skipped < count {
            let available = self.unread().len();
            if available == 0 {
                if self.refill(source)? == 0 {
                    break;
                }

                continue;
            }

            let step = usize::try_from(count - skipped).map_or(available, |rem| rem.min(available));
            self.consume(step);
            skipped += step as u64;
        }

        Ok(skipped)
    }

    #[cfg(test)]
    fn from_parts(data: &[u8], get: usize, set: usize) -> Self {
        Self {
            data: data.into(),
            get,
            set,
        }
    }
}
