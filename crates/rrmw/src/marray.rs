// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 rrmw project

//! Multi-dimensional arrays and the strided sub-array copy plan.
//!
//! Arrays are dense and row-major: dimension 0 has stride 1 and higher
//! dimensions stride by the product of the lower dimension lengths.
//! Copying a rectangular region between two differently-shaped arrays
//! reduces to a sequence of contiguous runs; [`MultiDimCopyIndices`]
//! computes that sequence lazily and [`MultiDimArray`] applies it.
//!
//! The same plan serves every element kind (numeric, pod, named-array
//! element); the element type is just the generic parameter.

use crate::error::{Error, Result};

/// Dense row-major array with explicit dimension lengths.
///
/// Invariant: `data.len()` equals the product of `dims`. The fields stay
/// private so the invariant holds for the lifetime of the value.
#[derive(Debug, Clone, PartialEq)]
pub struct MultiDimArray<T> {
    dims: Vec<u32>,
    data: Vec<T>,
}

impl<T> MultiDimArray<T> {
    /// Build an array from dimensions and element storage.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] when the element count does not
    /// match the product of `dims`.
    pub fn new(dims: Vec<u32>, data: Vec<T>) -> Result<Self> {
        let expected = checked_product(&dims)?;
        if data.len() != expected {
            return Err(Error::InvalidArgument(format!(
                "multidim array data length {} does not match dimensions {:?}",
                data.len(),
                dims
            )));
        }
        Ok(MultiDimArray { dims, data })
    }

    pub fn dims(&self) -> &[u32] {
        &self.dims
    }

    pub fn data(&self) -> &[T] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [T] {
        &mut self.data
    }

    pub fn into_data(self) -> Vec<T> {
        self.data
    }

    pub fn element_count(&self) -> usize {
        self.data.len()
    }
}

impl<T: Clone> MultiDimArray<T> {
    /// Copy the region at `pos`/`count` of this array into `buffer` at
    /// `buffer_pos`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] when the region does not fit
    /// either array; neither array is modified in that case.
    pub fn retrieve_sub_array(
        &self,
        pos: &[u32],
        buffer: &mut MultiDimArray<T>,
        buffer_pos: &[u32],
        count: &[u32],
    ) -> Result<()> {
        let plan = MultiDimCopyIndices::new(&self.dims, pos, &buffer.dims, buffer_pos, count)?;
        for (src, dst, len) in plan {
            buffer.data[dst..dst + len].clone_from_slice(&self.data[src..src + len]);
        }
        Ok(())
    }

    /// Copy the region at `buffer_pos`/`count` of `buffer` into this array
    /// at `pos`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] when the region does not fit
    /// either array; neither array is modified in that case.
    pub fn assign_sub_array(
        &mut self,
        pos: &[u32],
        buffer: &MultiDimArray<T>,
        buffer_pos: &[u32],
        count: &[u32],
    ) -> Result<()> {
        let plan = MultiDimCopyIndices::new(&self.dims, pos, &buffer.dims, buffer_pos, count)?;
        for (dst, src, len) in plan {
            self.data[dst..dst + len].clone_from_slice(&buffer.data[src..src + len]);
        }
        Ok(())
    }
}

/// Lazy copy plan between two row-major arrays.
///
/// Yields `(offset_a, offset_b, run_length)` triples. Each triple is one
/// contiguous run in both arrays; together the runs cover the requested
/// region exactly once.
#[derive(Debug)]
pub struct MultiDimCopyIndices {
    count: Vec<u32>,
    stride_a: Vec<usize>,
    stride_b: Vec<usize>,
    base_a: usize,
    base_b: usize,
    /// Current position in dimensions `1..count.len()`; dimension 0 is
    /// always emitted as one run.
    odometer: Vec<u32>,
    done: bool,
}

impl MultiDimCopyIndices {
    /// Validate the region and build the plan.
    ///
    /// `count` addresses the lowest `count.len()` dimensions of both
    /// arrays; any higher dimensions are selected by the position vectors
    /// alone. All preconditions are checked before anything is yielded:
    /// `count` must be non-empty, must not exceed either rank, the
    /// position vectors must match their array ranks, and `pos + count`
    /// must fit inside the dimensions on both sides.
    pub fn new(
        dims_a: &[u32],
        pos_a: &[u32],
        dims_b: &[u32],
        pos_b: &[u32],
        count: &[u32],
    ) -> Result<Self> {
        if count.is_empty() {
            return Err(Error::InvalidArgument(
                "multidim copy count is empty".to_string(),
            ));
        }
        if count.len() > dims_a.len() || count.len() > dims_b.len() {
            return Err(Error::InvalidArgument(format!(
                "multidim copy count rank {} exceeds array ranks {} and {}",
                count.len(),
                dims_a.len(),
                dims_b.len()
            )));
        }
        check_region(dims_a, pos_a, count)?;
        check_region(dims_b, pos_b, count)?;

        let stride_a = strides(dims_a)?;
        let stride_b = strides(dims_b)?;
        let base_a = base_offset(&stride_a, pos_a);
        let base_b = base_offset(&stride_b, pos_b);

        // A zero-length dimension means an empty region: yield nothing.
        let empty = count.contains(&0);
        Ok(MultiDimCopyIndices {
            count: count.to_vec(),
            stride_a,
            stride_b,
            base_a,
            base_b,
            odometer: vec![0; count.len().saturating_sub(1)],
            done: empty,
        })
    }
}

impl Iterator for MultiDimCopyIndices {
    type Item = (usize, usize, usize);

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let mut offset_a = self.base_a;
        let mut offset_b = self.base_b;
        for (k, &step) in self.odometer.iter().enumerate() {
            offset_a += step as usize * self.stride_a[k + 1];
            offset_b += step as usize * self.stride_b[k + 1];
        }
        let run = self.count[0] as usize;

        // Advance the odometer over dimensions 1..rank, carrying upward.
        // When the highest dimension carries out, the plan is complete.
        let mut carried = true;
        for (k, step) in self.odometer.iter_mut().enumerate() {
            *step += 1;
            if *step < self.count[k + 1] {
                carried = false;
                break;
            }
            *step = 0;
        }
        if carried {
            self.done = true;
        }
        Some((offset_a, offset_b, run))
    }
}

fn check_region(dims: &[u32], pos: &[u32], count: &[u32]) -> Result<()> {
    if pos.len() != dims.len() {
        return Err(Error::InvalidArgument(format!(
            "multidim copy position rank {} does not match array rank {}",
            pos.len(),
            dims.len()
        )));
    }
    for i in 0..dims.len() {
        let extent = if i < count.len() { count[i] } else { 1 };
        let end = u64::from(pos[i]) + u64::from(extent);
        if end > u64::from(dims[i]) {
            return Err(Error::InvalidArgument(format!(
                "multidim copy region exceeds dimension {} ({} + {} > {})",
                i, pos[i], extent, dims[i]
            )));
        }
    }
    Ok(())
}

fn strides(dims: &[u32]) -> Result<Vec<usize>> {
    let mut out = Vec::with_capacity(dims.len());
    let mut acc = 1usize;
    for (i, &d) in dims.iter().enumerate() {
        out.push(acc);
        if i + 1 < dims.len() {
            acc = acc.checked_mul(d as usize).ok_or_else(|| {
                Error::InvalidArgument("multidim array dimensions overflow".to_string())
            })?;
        }
    }
    Ok(out)
}

fn checked_product(dims: &[u32]) -> Result<usize> {
    let mut acc = 1usize;
    for &d in dims {
        acc = acc.checked_mul(d as usize).ok_or_else(|| {
            Error::InvalidArgument("multidim array dimensions overflow".to_string())
        })?;
    }
    Ok(acc)
}

fn base_offset(strides: &[usize], pos: &[u32]) -> usize {
    strides
        .iter()
        .zip(pos.iter())
        .map(|(s, p)| s * *p as usize)
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seq_array(dims: &[u32]) -> MultiDimArray<i32> {
        let n: u32 = dims.iter().product();
        MultiDimArray::new(dims.to_vec(), (0..n as i32).collect()).unwrap()
    }

    #[test]
    fn single_dimension_is_one_run() {
        let plan = MultiDimCopyIndices::new(&[10], &[2], &[8], &[3], &[4]).unwrap();
        let runs: Vec<_> = plan.collect();
        assert_eq!(runs, vec![(2, 3, 4)]);
    }

    #[test]
    fn two_dimensional_plan_partitions_exactly() {
        // 4x4 source, 3x3 destination, copying a 2x2 block.
        let plan = MultiDimCopyIndices::new(&[4, 4], &[1, 1], &[3, 3], &[0, 0], &[2, 2]).unwrap();
        let runs: Vec<_> = plan.collect();
        assert_eq!(runs, vec![(5, 0, 2), (9, 3, 2)]);
    }

    #[test]
    fn plan_covers_region_exactly_once() {
        // Mark every source element the plan touches; the marks must be the
        // requested rectangle, each exactly once.
        let dims = [5u32, 4, 3];
        let pos = [1u32, 1, 0];
        let count = [3u32, 2, 2];
        let plan =
            MultiDimCopyIndices::new(&dims, &pos, &dims, &[0, 0, 0], &count).unwrap();
        let mut touched = vec![0u8; 5 * 4 * 3];
        let mut total = 0usize;
        for (a, _b, len) in plan {
            for covered in &mut touched[a..a + len] {
                *covered += 1;
            }
            total += len;
        }
        assert_eq!(total, 3 * 2 * 2);
        for z in 0..3u32 {
            for y in 0..4u32 {
                for x in 0..5u32 {
                    let idx = (x + y * 5 + z * 20) as usize;
                    let inside = (1..4).contains(&x) && (1..3).contains(&y) && z < 2;
                    assert_eq!(touched[idx], u8::from(inside), "element ({x},{y},{z})");
                }
            }
        }
    }

    #[test]
    fn retrieve_sub_array_copies_block() {
        let src = seq_array(&[4, 4]);
        let mut dst = MultiDimArray::new(vec![2, 2], vec![0i32; 4]).unwrap();
        src.retrieve_sub_array(&[1, 2], &mut dst, &[0, 0], &[2, 2])
            .unwrap();
        // Source column-0-major layout: element (x,y) = x + 4*y.
        assert_eq!(dst.data(), &[9, 10, 13, 14]);
    }

    #[test]
    fn assign_sub_array_writes_block() {
        let mut dst = MultiDimArray::new(vec![3, 3], vec![0i32; 9]).unwrap();
        let src = MultiDimArray::new(vec![2, 2], vec![1, 2, 3, 4]).unwrap();
        dst.assign_sub_array(&[1, 1], &src, &[0, 0], &[2, 2]).unwrap();
        assert_eq!(dst.data(), &[0, 0, 0, 0, 1, 2, 0, 3, 4]);
    }

    #[test]
    fn short_count_selects_a_slab() {
        // Copy one row of the second plane of a 3x2x2 array.
        let src = seq_array(&[3, 2, 2]);
        let mut dst = MultiDimArray::new(vec![3], vec![0i32; 3]).unwrap();
        src.retrieve_sub_array(&[0, 1, 1], &mut dst, &[0], &[3]).unwrap();
        assert_eq!(dst.data(), &[9, 10, 11]);
    }

    #[test]
    fn preconditions_reject_bad_regions() {
        assert!(MultiDimCopyIndices::new(&[4], &[0], &[4], &[0], &[]).is_err());
        assert!(MultiDimCopyIndices::new(&[4], &[0], &[4], &[0], &[1, 1]).is_err());
        assert!(MultiDimCopyIndices::new(&[4], &[3], &[4], &[0], &[2]).is_err());
        assert!(MultiDimCopyIndices::new(&[4], &[0], &[4], &[3], &[2]).is_err());
        assert!(MultiDimCopyIndices::new(&[4, 2], &[0], &[4, 2], &[0, 0], &[2]).is_err());
    }

    #[test]
    fn failed_copy_leaves_buffers_untouched() {
        let src = seq_array(&[4]);
        let mut dst = MultiDimArray::new(vec![2], vec![7i32, 7]).unwrap();
        assert!(src.retrieve_sub_array(&[3], &mut dst, &[0], &[2]).is_err());
        assert_eq!(dst.data(), &[7, 7]);
    }

    #[test]
    fn zero_count_yields_nothing() {
        let plan = MultiDimCopyIndices::new(&[4, 4], &[0, 0], &[4, 4], &[0, 0], &[0, 2]).unwrap();
        assert_eq!(plan.count(), 0);
    }

    #[test]
    fn dimension_mismatch_rejected_at_construction() {
        assert!(MultiDimArray::new(vec![2, 2], vec![1i32, 2, 3]).is_err());
    }
}
