/// Pool index of a worker slot. Stable for the lifetime of the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct SlotId(pub usize);

impl SlotId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl From<usize> for SlotId {
    fn from(index: usize) -> Self {
        SlotId(index)
    }
}

impl std::fmt::Display for SlotId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "slot-{}", self.0)
    }
}
