/// Index of one preallocated block buffer in the pool.
///
/// Handles are plain indices so wiring stays data, not pointers; every
/// buffer lives for the whole instrument and is reused each cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BufferId {
    /// Per-sample oscillator frequency in Hz, after glide/bend/LFO.
    Frequency,
    OscA,
    OscB,
    Noise,
    /// Hard-sync pulse train written by oscillator A.
    Sync,
    /// Per-sample pulse width for PWM.
    PulseWidth,
    Lfo,
    /// Envelope output, refilled by whichever envelope ran last.
    Envelope,
    /// Per-voice pre-filter mix.
    Scratch,
}

impl BufferId {
    pub const COUNT: usize = 9;

    fn index(self) -> usize {
        match self {
            BufferId::Frequency => 0,
            BufferId::OscA => 1,
            BufferId::OscB => 2,
            BufferId::Noise => 3,
            BufferId::Sync => 4,
            BufferId::PulseWidth => 5,
            BufferId::Lfo => 6,
            BufferId::Envelope => 7,
            BufferId::Scratch => 8,
        }
    }
}

/// Fixed set of block-length f32 buffers, allocated once at instrument load.
///
/// Nothing on the render path allocates; operators check buffers out for the
/// duration of one call. A buffer's previous contents are only meaningful if
/// the current cycle wrote them first.
pub struct BufferPool {
    block_len: usize,
    buffers: [Vec<f32>; BufferId::COUNT],
}

impl BufferPool {
    pub fn new(block_len: usize) -> Self {
        Self {
            block_len,
            buffers: core::array::from_fn(|_| vec![0.0; block_len]),
        }
    }

    pub fn block_len(&self) -> usize {
        self.block_len
    }

    /// Check out several buffers at once for one operator invocation.
    ///
    /// The ids must be distinct; asking for the same buffer twice is a
    /// wiring bug in the caller, not a runtime condition.
    pub fn checkout<const N: usize>(&mut self, ids: [BufferId; N]) -> [&mut [f32]; N] {
        self.buffers
            .get_disjoint_mut(ids.map(BufferId::index))
            .expect("buffer checkout requires distinct ids")
            .map(|buffer| buffer.as_mut_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checkout_returns_distinct_block_length_buffers() {
        let mut pool = BufferPool::new(64);
        let [a, b] = pool.checkout([BufferId::OscA, BufferId::OscB]);
        assert_eq!(a.len(), 64);
        assert_eq!(b.len(), 64);
        a[0] = 1.0;
        b[0] = 2.0;
        let [a] = pool.checkout([BufferId::OscA]);
        assert_eq!(a[0], 1.0);
    }
}
