//! Per-session RID allocation within a session's assigned range (§4.8 of
//! the routing design): monotonic allocation plus a free set for reuse.

use ahash::HashSet;
use codec::{handshake::RidRange, message::Rid};

#[derive(Debug)]
pub enum Error {
    ExhaustedRange,
}

impl std::error::Error for Error {}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Allocates and recycles RIDs inside one session's disjoint range.
pub struct RidAllocator {
    range: RidRange,
    cur: u64,
    free: HashSet<Rid>,
}

impl RidAllocator {
    pub fn new(range: RidRange) -> Self {
        Self {
            cur: range.start,
            range,
            free: HashSet::default(),
        }
    }

    pub fn range(&self) -> RidRange {
        self.range
    }

    /// # Test
    ///
    /// ```
    /// use codec::handshake::RidRange;
    /// use kvndb_service::rid::RidAllocator;
    ///
    /// let mut alloc = RidAllocator::new(RidRange { start: 0, end: 3 });
    /// assert_eq!(alloc.alloc().unwrap(), 0);
    /// assert_eq!(alloc.alloc().unwrap(), 1);
    /// assert!(alloc.alloc().is_err());
    ///
    /// alloc.free(0);
    /// assert_eq!(alloc.alloc().unwrap(), 0);
    /// ```
    pub fn alloc(&mut self) -> Result<Rid, Error> {
        if let Some(&rid) = self.free.iter().next() {
            self.free.remove(&rid);
            return Ok(rid);
        }

        if self.cur + 1 >= self.range.end {
            return Err(Error::ExhaustedRange);
        }

        let rid = self.cur as Rid;
        self.cur += 1;
        Ok(rid)
    }

    /// Returns a RID to the free set once its correlated reply (ANSWER,
    /// NOTFOUND or ALLKEYS) has arrived.
    pub fn free(&mut self, rid: Rid) {
        self.free.insert(rid);
    }
}
