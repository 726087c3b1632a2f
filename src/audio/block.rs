//! Fixed-size block assembly for captured audio
//!
//! Drivers do not always honor a requested buffer size: some deliver
//! shorter or longer slices than asked for, and a few ignore the request
//! entirely. The host expects every block to be exactly
//! `frames_per_buffer` samples, so the audio thread re-blocks here.
//!
//! ## Design Notes
//!
//! The pending buffer is allocated once, up front. When the driver hands
//! over exactly one block and nothing is pending, the driver slice is
//! passed through untouched.

/// Re-blocks a stream of sample slices into fixed-size blocks.
///
/// Lives on the audio thread only; no locking.
///
/// ## Example
///
/// ```
/// use chordcoach_hw::audio::BlockAssembler;
///
/// let mut blocks = BlockAssembler::new(4);
/// let mut seen = Vec::new();
/// blocks.push(&[0.1, 0.2, 0.3], |b| seen.push(b.to_vec()));
/// blocks.push(&[0.4, 0.5], |b| seen.push(b.to_vec()));
/// assert_eq!(seen, vec![vec![0.1, 0.2, 0.3, 0.4]]);
/// assert_eq!(blocks.pending(), 1);
/// ```
pub struct BlockAssembler {
    /// Samples waiting for the current block to fill up
    pending: Vec<f32>,
    /// Samples per emitted block
    block_len: usize,
}

impl BlockAssembler {
    /// Create an assembler that emits blocks of `block_len` samples
    ///
    /// # Panics
    /// If `block_len` is zero.
    pub fn new(block_len: usize) -> Self {
        assert!(block_len > 0, "block length must be non-zero");
        Self {
            pending: Vec::with_capacity(block_len),
            block_len,
        }
    }

    /// Feed a driver slice, calling `emit` once per completed block
    ///
    /// Blocks are emitted in arrival order. Leftover samples are kept for
    /// the next call.
    pub fn push(&mut self, mut data: &[f32], mut emit: impl FnMut(&[f32])) {
        while !data.is_empty() {
            if self.pending.is_empty() && data.len() >= self.block_len {
                let (block, rest) = data.split_at(self.block_len);
                emit(block);
                data = rest;
                continue;
            }

            let take = (self.block_len - self.pending.len()).min(data.len());
            self.pending.extend_from_slice(&data[..take]);
            data = &data[take..];

            if self.pending.len() == self.block_len {
                emit(&self.pending);
                self.pending.clear();
            }
        }
    }

    /// Number of samples held back waiting for a full block
    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}
