//! Silence padding for underruns and paused output.

/// A pre-allocated block of silence, one chunk long.
///
/// The block is allocated once when the device opens. Filling never
/// allocates: requests longer than the block are served in block-sized
/// copies.
pub struct ZeroFill<T> {
    block: Box<[T]>,
}

impl<T: Copy + Default> ZeroFill<T> {
    /// Allocates a silence block of `len` cells (at least one).
    pub fn new(len: usize) -> Self {
        Self {
            block: vec![T::default(); len.max(1)].into_boxed_slice(),
        }
    }

    /// Overwrites all of `dst` with silence.
    pub fn fill(&self, dst: &mut [T]) {
        for piece in dst.chunks_mut(self.block.len()) {
            piece.copy_from_slice(&self.block[..piece.len()]);
        }
    }

    /// Overwrites all of `dst` with silence converted to the destination type.
    pub fn fill_map<U>(&self, dst: &mut [U], mut convert: impl FnMut(&T) -> U) {
        for piece in dst.chunks_mut(self.block.len()) {
            for (out, cell) in piece.iter_mut().zip(self.block.iter()) {
                *out = convert(cell);
            }
        }
    }

    /// Overwrites `dst[from..]` with converted silence. Returns the number of
    /// elements padded.
    pub fn pad_from_map<U>(&self, dst: &mut [U], from: usize, convert: impl FnMut(&T) -> U) -> usize {
        match dst.get_mut(from..) {
            Some(tail) => {
                self.fill_map(tail, convert);
                tail.len()
            }
            None => 0,
        }
    }

    /// Overwrites `dst[from..]` with silence. Returns the number of cells padded.
    pub fn pad_from(&self, dst: &mut [T], from: usize) -> usize {
        self.pad_from_map(dst, from, |&cell| cell)
    }

    /// Length of the silence block in cells.
    pub fn len(&self) -> usize {
        self.block.len()
    }

    /// Always `false`; the block holds at least one cell.
    pub fn is_empty(&self) -> bool {
        self.block.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_longer_than_block() {
        let zero = ZeroFill::<i16>::new(4);
        let mut out = vec![7i16; 11];
        zero.fill(&mut out);
        assert!(out.iter().all(|&s| s == 0));
    }

    #[test]
    fn test_pad_from_keeps_head() {
        let zero = ZeroFill::<f32>::new(8);
        let mut out = vec![0.5f32; 6];
        assert_eq!(zero.pad_from(&mut out, 4), 2);
        assert_eq!(out, vec![0.5, 0.5, 0.5, 0.5, 0.0, 0.0]);
        assert_eq!(zero.pad_from(&mut out, 6), 0);
        assert_eq!(zero.pad_from(&mut out, 9), 0);
    }

    #[test]
    fn test_fill_map_converts() {
        let zero = ZeroFill::<u8>::new(3);
        let mut out = vec![1.0f32; 7];
        zero.fill_map(&mut out, |&b| f32::from(b));
        assert!(out.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_minimum_block() {
        let zero = ZeroFill::<u8>::new(0);
        assert_eq!(zero.len(), 1);
        assert!(!zero.is_empty());
    }
}
