//! Memory budget guard shared by every allocation of a decode.

use super::{Error, Result};

/// Running byte budget.
///
/// Call [`MemoryBudget::check_count`] with the declared element count and its
/// per-category cap, then [`MemoryBudget::reserve`] with the element type,
/// before allocating anything sized from file data.
#[derive(Debug, Clone)]
pub struct MemoryBudget {
    limit: usize,
    used: usize,
}

impl MemoryBudget {
    /// Create a budget of `limit` bytes.
    pub fn new(limit: usize) -> Self {
        Self { limit, used: 0 }
    }

    /// Bytes reserved so far.
    #[inline]
    pub fn used(&self) -> usize {
        self.used
    }

    /// Configured limit in bytes.
    #[inline]
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Bytes still available.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.limit.saturating_sub(self.used)
    }

    /// Reject `count` if it exceeds the per-category `max`.
    pub fn check_count(&self, what: &str, count: u64, max: usize) -> Result<usize> {
        if count > max as u64 {
            return Err(Error::budget(format!("{what}: count {count} exceeds limit {max}")));
        }
        Ok(count as usize)
    }

    /// Reserve room for `count` values of `T`.
    pub fn reserve<T>(&mut self, what: &str, count: usize) -> Result<()> {
        let bytes = count
            .checked_mul(std::mem::size_of::<T>())
            .ok_or_else(|| Error::budget(format!("{what}: size overflow for {count} elements")))?;
        self.reserve_bytes(what, bytes)
    }

    /// Reserve `bytes` raw bytes.
    pub fn reserve_bytes(&mut self, what: &str, bytes: usize) -> Result<()> {
        let total = self
            .used
            .checked_add(bytes)
            .filter(|total| *total <= self.limit)
            .ok_or_else(|| {
                Error::budget(format!(
                    "{what}: {bytes} bytes requested, {} of {} already used",
                    self.used, self.limit
                ))
            })?;
        self.used = total;
        Ok(())
    }

    /// Return `bytes` reserved for a temporary buffer that has been dropped.
    pub fn release(&mut self, bytes: usize) {
        self.used = self.used.saturating_sub(bytes);
    }

    /// Check a count against its cap and reserve storage for it in one step.
    pub fn allocate<T>(&mut self, what: &str, count: u64, max: usize) -> Result<usize> {
        let n = self.check_count(what, count, max)?;
        self.reserve::<T>(what, n)?;
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_cap() {
        let budget = MemoryBudget::new(1 << 20);
        assert_eq!(budget.check_count("tokens", 10, 10).unwrap(), 10);
        let err = budget.check_count("tokens", 11, 10).unwrap_err();
        assert!(matches!(err, Error::BudgetExceeded(_)));
    }

    #[test]
    fn test_running_total() {
        let mut budget = MemoryBudget::new(1024);
        budget.reserve::<u64>("a", 100).unwrap();
        assert_eq!(budget.used(), 800);
        assert_eq!(budget.remaining(), 224);
        let err = budget.reserve::<u64>("b", 29).unwrap_err();
        assert!(matches!(err, Error::BudgetExceeded(_)));
        // a failed reservation does not consume budget
        assert_eq!(budget.used(), 800);
        budget.reserve::<u64>("c", 28).unwrap();
        assert_eq!(budget.used(), 1024);
    }

    #[test]
    fn test_overflow_is_rejected() {
        let mut budget = MemoryBudget::new(usize::MAX);
        let err = budget.reserve::<u64>("huge", usize::MAX / 2).unwrap_err();
        assert!(matches!(err, Error::BudgetExceeded(_)));
    }

    #[test]
    fn test_release_scratch() {
        let mut budget = MemoryBudget::new(100);
        budget.reserve_bytes("scratch", 80).unwrap();
        assert!(budget.reserve_bytes("out", 40).is_err());
        budget.release(80);
        assert_eq!(budget.used(), 0);
        budget.reserve_bytes("out", 40).unwrap();
        budget.release(1000);
        assert_eq!(budget.used(), 0);
    }

    #[test]
    fn test_allocate() {
        let mut budget = MemoryBudget::new(64);
        assert_eq!(budget.allocate::<u32>("ints", 16, 100).unwrap(), 16);
        assert!(budget.allocate::<u32>("ints", 1, 100).is_err());
        assert!(budget.allocate::<u8>("bytes", 1000, 10).is_err());
    }
}
