//! ID generator utilities.

/// Monotonically increasing generator of IDs.
///
/// IDs handed out by a single [`Gen`] are unique and strictly increasing, which makes them useful
/// as tie-breakers when ordering things that were created at the "same" time.
#[derive(Debug, Clone)]
pub struct Gen<Id> {
    next: u64,
    phantom: std::marker::PhantomData<fn() -> Id>,
}

impl<Id> Default for Gen<Id> {
    fn default() -> Self {
        Gen::from_start(0)
    }
}

impl<Id> Gen<Id> {
    pub fn from_start(start: u64) -> Self {
        Gen {
            next: start,
            phantom: std::marker::PhantomData,
        }
    }
}

impl<Id: From<u64>> Gen<Id> {
    pub fn next(&mut self) -> Id {
        let id = self.next;
        self.next = id.checked_add(1).expect("ID allocator overflowed u64");
        Id::from(id)
    }
}

#[cfg(test)]
mod tests {
    use super::Gen;

    #[test]
    fn smoketest_gen() {
        let mut ids: Gen<u64> = Gen::from_start(7);
        assert_eq!(ids.next(), 7);
        assert_eq!(ids.next(), 8);

        let mut cloned = ids.clone();
        assert_eq!(cloned.next(), 9);
        assert_eq!(ids.next(), 9);
    }
}
