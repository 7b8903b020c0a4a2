//! Fixed-capacity circular buffer shared by the control thread and the
//! hardware callback.

use parking_lot::Mutex;

use crate::AudioError;

/// Cursor and storage state, only ever touched under the lock.
struct RingState<T> {
    store: Box<[T]>,
    write_pos: usize,
    read_pos: usize,
    occupied: usize,
}

impl<T> RingState<T> {
    fn capacity(&self) -> usize {
        self.store.len()
    }

    fn free(&self) -> usize {
        self.capacity() - self.occupied
    }
}

/// A thread-safe circular buffer of fixed-size cells.
///
/// Both ends take the same exclusive lock, held only for the duration of a
/// bounded copy, so the real-time reader is never made to wait on anything
/// longer than one transfer. The buffer never grows: writes beyond the free
/// space are truncated and reads beyond the stored data come back short.
pub struct RingBuffer<T> {
    state: Mutex<RingState<T>>,
}

impl<T: Copy + Default> RingBuffer<T> {
    /// Allocates a buffer of `capacity` default-initialized cells.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` for a zero capacity and `Allocation` if the
    /// backing store cannot be reserved.
    pub fn new(capacity: usize) -> Result<Self, AudioError> {
        if capacity == 0 {
            return Err(AudioError::invalid_config("ring buffer capacity must be non-zero"));
        }

        let mut store = Vec::new();
        store
            .try_reserve_exact(capacity)
            .map_err(|_| AudioError::Allocation { cells: capacity })?;
        store.resize(capacity, T::default());

        Ok(Self {
            state: Mutex::new(RingState {
                store: store.into_boxed_slice(),
                write_pos: 0,
                read_pos: 0,
                occupied: 0,
            }),
        })
    }

    /// Copies as many cells from `src` as fit. Returns the count written.
    pub fn put(&self, src: &[T]) -> usize {
        self.put_map(src, |&cell| cell)
    }

    /// Copies up to `dst.len()` cells out of the buffer. Returns the count read.
    ///
    /// Cells of `dst` past the returned count are left untouched.
    pub fn get(&self, dst: &mut [T]) -> usize {
        self.get_map(dst, |&cell| cell)
    }

    /// Like [`put`](Self::put), converting each element on the way in.
    pub fn put_map<U>(&self, src: &[U], mut convert: impl FnMut(&U) -> T) -> usize {
        let mut state = self.state.lock();
        let count = src.len().min(state.free());
        if count == 0 {
            return 0;
        }

        let capacity = state.capacity();
        let start = state.write_pos;
        let tail = count.min(capacity - start);
        let head = count - tail;

        for (slot, value) in state.store[start..start + tail].iter_mut().zip(&src[..tail]) {
            *slot = convert(value);
        }
        for (slot, value) in state.store[..head].iter_mut().zip(&src[tail..count]) {
            *slot = convert(value);
        }

        state.write_pos = if head > 0 { head } else { (start + tail) % capacity };
        state.occupied += count;
        count
    }

    /// Like [`get`](Self::get), converting each element on the way out.
    pub fn get_map<U>(&self, dst: &mut [U], mut convert: impl FnMut(&T) -> U) -> usize {
        let mut state = self.state.lock();
        let count = dst.len().min(state.occupied);
        if count == 0 {
            return 0;
        }

        let capacity = state.capacity();
        let start = state.read_pos;
        let tail = count.min(capacity - start);
        let head = count - tail;

        for (out, cell) in dst[..tail].iter_mut().zip(&state.store[start..start + tail]) {
            *out = convert(cell);
        }
        for (out, cell) in dst[tail..count].iter_mut().zip(&state.store[..head]) {
            *out = convert(cell);
        }

        state.read_pos = if head > 0 { head } else { (start + tail) % capacity };
        state.occupied -= count;
        count
    }

    /// Zeroes both cursors and the occupancy. Contents are left as they are.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.write_pos = 0;
        state.read_pos = 0;
        state.occupied = 0;
    }

    /// Number of cells stored and not yet read.
    pub fn occupied(&self) -> usize {
        self.state.lock().occupied
    }

    /// Number of cells that can be written before truncation starts.
    pub fn free(&self) -> usize {
        self.state.lock().free()
    }

    /// Total number of cells.
    pub fn capacity(&self) -> usize {
        self.state.lock().capacity()
    }

    /// Returns `true` if no cells are stored.
    pub fn is_empty(&self) -> bool {
        self.occupied() == 0
    }
}
