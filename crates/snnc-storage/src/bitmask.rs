//! Per-connection enable bits for bitmask-gated projections.
//!
//! Connection `gid = pre * num_post + post` lives in 32-bit word `gid >> 5`
//! under mask `0x80000000 >> (gid & 31)`, matching the `B(x,i)` macro in
//! the generated headers.

use crate::error::{Result, StorageError};
use crate::sparse::SparseProjection;
use std::io::{Read, Write};

/// Word index of connection `gid`
pub const fn word_index(gid: u64) -> usize {
    (gid >> 5) as usize
}

/// Bit mask of connection `gid` inside its word
pub const fn bit_mask(gid: u64) -> u32 {
    0x8000_0000u32 >> (gid & 31)
}

/// One enable bit per (pre, post) pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectivityBitmask {
    num_pre: u32,
    num_post: u32,
    words: Vec<u32>,
}

impl ConnectivityBitmask {
    /// All connections disabled
    pub fn new(num_pre: u32, num_post: u32) -> Self {
        Self {
            num_pre,
            num_post,
            words: vec![0; Self::word_count(num_pre, num_post)],
        }
    }

    /// Words needed for a `num_pre x num_post` mask
    pub fn word_count(num_pre: u32, num_post: u32) -> usize {
        (u64::from(num_pre) * u64::from(num_post)).div_ceil(32) as usize
    }

    /// Linear connection id of `(pre, post)`
    pub fn connection_id(&self, pre: u32, post: u32) -> u64 {
        u64::from(pre) * u64::from(self.num_post) + u64::from(post)
    }

    fn checked_id(&self, pre: u32, post: u32) -> Result<u64> {
        if pre >= self.num_pre {
            return Err(StorageError::OutOfBounds {
                index: pre as usize,
                max: self.num_pre as usize,
            });
        }
        if post >= self.num_post {
            return Err(StorageError::OutOfBounds {
                index: post as usize,
                max: self.num_post as usize,
            });
        }
        Ok(self.connection_id(pre, post))
    }

    /// Enable a connection
    pub fn set(&mut self, pre: u32, post: u32) -> Result<()> {
        let gid = self.checked_id(pre, post)?;
        self.words[word_index(gid)] |= bit_mask(gid);
        Ok(())
    }

    /// Disable a connection
    pub fn clear(&mut self, pre: u32, post: u32) -> Result<()> {
        let gid = self.checked_id(pre, post)?;
        self.words[word_index(gid)] &= !bit_mask(gid);
        Ok(())
    }

    /// True when the connection is enabled; out-of-range pairs are disabled
    pub fn is_set(&self, pre: u32, post: u32) -> bool {
        match self.checked_id(pre, post) {
            Ok(gid) => self.words[word_index(gid)] & bit_mask(gid) != 0,
            Err(_) => false,
        }
    }

    /// Enabled connection count
    pub fn count_enabled(&self) -> u64 {
        self.words.iter().map(|w| u64::from(w.count_ones())).sum()
    }

    /// Packed words
    pub fn words(&self) -> &[u32] {
        &self.words
    }

    /// Source population size
    pub fn num_pre(&self) -> u32 {
        self.num_pre
    }

    /// Target population size
    pub fn num_post(&self) -> u32 {
        self.num_post
    }

    /// Mask enabling exactly the projection's connections
    pub fn from_sparse(proj: &SparseProjection) -> Result<Self> {
        let mut mask = Self::new(proj.source_count(), proj.target_count());
        for (pre, post) in proj.edges() {
            mask.set(pre, post)?;
        }
        Ok(mask)
    }

    /// Enabled connections as a projection, targets ascending within each row
    pub fn to_sparse(&self) -> Result<SparseProjection> {
        let edges: Vec<(u32, u32)> = (0..self.num_pre)
            .flat_map(|pre| (0..self.num_post).map(move |post| (pre, post)))
            .filter(|&(pre, post)| self.is_set(pre, post))
            .collect();
        SparseProjection::from_edges(self.num_pre, self.num_post, &edges)
    }

    /// Write the words little-endian with no framing
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        for w in &self.words {
            writer.write_all(&w.to_le_bytes())?;
        }
        Ok(())
    }

    /// Read a `num_pre x num_post` mask written by [`write_to`](Self::write_to)
    pub fn read_from<R: Read>(reader: &mut R, num_pre: u32, num_post: u32) -> Result<Self> {
        let count = Self::word_count(num_pre, num_post);
        let bytes = crate::file::read_section(reader, "bitmask", count * 4)?;
        let words = bytes
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        Ok(Self {
            num_pre,
            num_post,
            words,
        })
    }
}
