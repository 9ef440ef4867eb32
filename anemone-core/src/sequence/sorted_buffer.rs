/// A growable buffer of integers kept in ascending order.
///
/// This is the unit a snapshot is made of: writers fill a private
/// `SortedBuffer` and publish it, readers index into a published one.
/// The type itself is not synchronized; immutability after publication
/// is the publisher's contract, not this type's.
///
/// Capacity is retained across [`clear`](Self::clear) so a buffer cycled
/// through the pool reaches steady state without reallocating.
///
#[derive(Debug)]
pub struct SortedBuffer {
    values: Vec<i32>,
}

impl SortedBuffer {
    pub fn new() -> Self {
        SortedBuffer { values: Vec::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        SortedBuffer {
            values: Vec::with_capacity(capacity),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Bounds-checked positional read.
    #[inline]
    pub fn get(&self, pos: usize) -> Option<i32> {
        self.values.get(pos).copied()
    }

    /// Positional read. Panics when `pos` is out of range.
    #[inline]
    pub fn value_at(&self, pos: usize) -> i32 {
        self.values[pos]
    }

    /// Drop the content, keep the capacity.
    #[inline]
    pub fn clear(&mut self) {
        self.values.clear();
    }

    /// Replace the content with a copy of `other`.
    pub fn copy_from(&mut self, other: &SortedBuffer) {
        self.values.clear();
        self.values.extend_from_slice(&other.values);
    }

    /// Insert `value` at the unique index that keeps the buffer ascending.
    ///
    /// Returns the index the value landed at. The relative order of equal
    /// values is unspecified.
    ///
    pub fn insert_sorted(&mut self, value: i32) -> usize {
        match self.values.last() {
            // Interior insert: first slot whose occupant is not smaller.
            Some(&back) if value < back => {
                let at = self.values.partition_point(|&existing| existing < value);
                self.values.insert(at, value);
                at
            }
            // Empty buffer, or value >= back: append.
            _ => {
                self.values.push(value);
                self.values.len() - 1
            }
        }
    }

    #[inline]
    pub fn as_slice(&self) -> &[i32] {
        &self.values
    }

    pub fn to_vec(&self) -> Vec<i32> {
        self.values.clone()
    }
}

impl Default for SortedBuffer {
    fn default() -> Self {
        Self::new()
    }
}
