//! Compressed sparse projection (`indInG` row starts + `ind` column indices)

use crate::error::{Result, StorageError};
use std::ops::Range;

/// Row-compressed connection set between a source and a target population
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SparseProjection {
    /// Row starts, `source_count + 1` entries
    ind_in_g: Vec<u32>,
    /// Target index of every connection, grouped by source
    ind: Vec<u32>,
    /// Size of the target population
    target_count: u32,
}

impl SparseProjection {
    /// Projection with no connections
    pub fn empty(source_count: u32, target_count: u32) -> Self {
        Self {
            ind_in_g: vec![0; source_count as usize + 1],
            ind: Vec::new(),
            target_count,
        }
    }

    /// Build from `(source, target)` pairs; connections keep their order within a row
    pub fn from_edges(source_count: u32, target_count: u32, edges: &[(u32, u32)]) -> Result<Self> {
        let mut counts = vec![0u32; source_count as usize + 1];
        for &(pre, post) in edges {
            if pre >= source_count {
                return Err(StorageError::OutOfBounds {
                    index: pre as usize,
                    max: source_count as usize,
                });
            }
            if post >= target_count {
                return Err(StorageError::OutOfBounds {
                    index: post as usize,
                    max: target_count as usize,
                });
            }
            counts[pre as usize + 1] += 1;
        }
        for i in 1..counts.len() {
            counts[i] += counts[i - 1];
        }

        let mut cursor = counts.clone();
        let mut ind = vec![0u32; edges.len()];
        for &(pre, post) in edges {
            let slot = &mut cursor[pre as usize];
            ind[*slot as usize] = post;
            *slot += 1;
        }

        Ok(Self {
            ind_in_g: counts,
            ind,
            target_count,
        })
    }

    /// Assemble from raw arrays, validating the invariants
    pub fn from_parts(ind_in_g: Vec<u32>, ind: Vec<u32>, target_count: u32) -> Result<Self> {
        let proj = Self {
            ind_in_g,
            ind,
            target_count,
        };
        proj.validate()?;
        Ok(proj)
    }

    /// Check `indInG[0] == 0`, monotonic rows, `indInG[last] == connN` and target bounds
    pub fn validate(&self) -> Result<()> {
        let first = self
            .ind_in_g
            .first()
            .copied()
            .ok_or_else(|| StorageError::invalid_projection("indInG is empty"))?;
        if first != 0 {
            return Err(StorageError::invalid_projection(format!(
                "indInG[0] is {first}, expected 0"
            )));
        }
        if let Some(i) = self.ind_in_g.windows(2).position(|w| w[1] < w[0]) {
            return Err(StorageError::invalid_projection(format!(
                "indInG decreases at row {i}: {} > {}",
                self.ind_in_g[i],
                self.ind_in_g[i + 1]
            )));
        }
        let last = self.ind_in_g[self.ind_in_g.len() - 1] as usize;
        if last != self.ind.len() {
            return Err(StorageError::invalid_projection(format!(
                "indInG ends at {last} but connN is {}",
                self.ind.len()
            )));
        }
        if let Some(pos) = self.ind.iter().position(|&t| t >= self.target_count) {
            return Err(StorageError::invalid_projection(format!(
                "ind[{pos}] = {} exceeds target count {}",
                self.ind[pos], self.target_count
            )));
        }
        Ok(())
    }

    /// Total connection count
    pub fn conn_n(&self) -> usize {
        self.ind.len()
    }

    /// Number of source neurons
    pub fn source_count(&self) -> u32 {
        (self.ind_in_g.len() - 1) as u32
    }

    /// Number of target neurons
    pub fn target_count(&self) -> u32 {
        self.target_count
    }

    /// Row starts
    pub fn ind_in_g(&self) -> &[u32] {
        &self.ind_in_g
    }

    /// Column indices
    pub fn ind(&self) -> &[u32] {
        &self.ind
    }

    /// Half-open index range of source `pre`'s connections in `ind`
    pub fn row_range(&self, pre: u32) -> Range<usize> {
        let pre = pre as usize;
        self.ind_in_g[pre] as usize..self.ind_in_g[pre + 1] as usize
    }

    /// Targets of source `pre`
    pub fn row(&self, pre: u32) -> &[u32] {
        &self.ind[self.row_range(pre)]
    }

    /// Number of connections leaving `pre`
    pub fn out_degree(&self, pre: u32) -> u32 {
        let pre = pre as usize;
        self.ind_in_g[pre + 1] - self.ind_in_g[pre]
    }

    /// Largest out-degree over all sources
    pub fn max_out_degree(&self) -> u32 {
        self.ind_in_g
            .windows(2)
            .map(|w| w[1] - w[0])
            .max()
            .unwrap_or(0)
    }

    /// Every connection as `(source, target)`, row by row
    pub fn edges(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        (0..self.source_count()).flat_map(move |pre| self.row(pre).iter().map(move |&post| (pre, post)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn builds_rows_from_unordered_edges() {
        let proj = SparseProjection::from_edges(3, 4, &[(2, 1), (0, 3), (2, 0), (0, 1)]).unwrap();
        assert_eq!(proj.ind_in_g(), &[0, 2, 2, 4]);
        assert_eq!(proj.row(0), &[3, 1]);
        assert_eq!(proj.row(1), &[] as &[u32]);
        assert_eq!(proj.row(2), &[1, 0]);
        assert_eq!(proj.out_degree(2), 2);
        assert_eq!(proj.max_out_degree(), 2);
        assert_eq!(proj.conn_n(), 4);
    }

    #[test]
    fn rejects_out_of_range_target() {
        let err = SparseProjection::from_edges(2, 2, &[(0, 2)]).unwrap_err();
        assert!(matches!(err, StorageError::OutOfBounds { index: 2, max: 2 }));
    }

    #[test]
    fn validate_catches_each_invariant() {
        assert!(SparseProjection::from_parts(vec![1, 1], vec![0], 1).is_err());
        assert!(SparseProjection::from_parts(vec![0, 2, 1], vec![0, 0], 1).is_err());
        assert!(SparseProjection::from_parts(vec![0, 1], vec![0, 0], 1).is_err());
        assert!(SparseProjection::from_parts(vec![0, 1], vec![5], 2).is_err());
        assert!(SparseProjection::from_parts(vec![], vec![], 2).is_err());
        assert!(SparseProjection::from_parts(vec![0, 1, 1], vec![1], 2).is_ok());
    }

    proptest! {
        #[test]
        fn generated_projections_hold_invariants(
            src in 1u32..20,
            trg in 1u32..20,
            raw in proptest::collection::vec((0u32..1000, 0u32..1000), 0..100),
        ) {
            let edges: Vec<_> = raw.iter().map(|(a, b)| (a % src, b % trg)).collect();
            let proj = SparseProjection::from_edges(src, trg, &edges).unwrap();
            prop_assert!(proj.validate().is_ok());
            prop_assert_eq!(proj.ind_in_g()[0], 0);
            prop_assert_eq!(*proj.ind_in_g().last().unwrap() as usize, proj.conn_n());
            prop_assert_eq!(proj.edges().count(), edges.len());
        }
    }
}
