// src/map/map_buffer.rs

//! The map buffer: a bounded sliding window of labelled frames on the
//! integer plane.
//!
//! A buffer accepts a stream of positioned frames, keeps the `max_frames`
//! most recent ones, optionally shifts labels so every frame owns a unique
//! numeric range (`auto_reindex`), optionally stitches objects across
//! adjacent frame boundaries (`stitch_labels`), and serves rectangular
//! read-back with zero fill outside the covered area.
//!
//! Policy flags are fixed at construction through [`MapBufferBuilder`];
//! they cannot change once frames have been added.

use std::collections::VecDeque;

use bitvec::prelude::*;
use log::debug;

#[cfg(feature = "rayon")]
use rayon::prelude::*;

use crate::image::element::ElementType;
use crate::image::geom::IRect;
use crate::image::matrix::{ChannelData, Matrix, Samples, MAX_PIXEL_COUNT};
use crate::labels::pair_log::ObjectPairLog;
use crate::map::frame::{next_base_from_max, shift_label, Frame};
use crate::utils::error::{MapError, Result};

/// Row-block granularity of the parallel label passes.
pub(super) const BLOCK_ROWS: usize = 256;

/// Configures a [`MapBuffer`] before the first frame is added.
///
/// The policy flags only exist here: once `build` has run they are fixed
/// for the buffer's lifetime.
#[derive(Debug, Clone)]
pub struct MapBufferBuilder {
    max_frames: usize,
    stitch_labels: bool,
    auto_reindex: bool,
    zero_is_background: bool,
    stitch_cost_threshold: Option<f64>,
}

impl MapBufferBuilder {
    /// Enables object stitching across adjacent frame boundaries.
    pub fn with_stitch_labels(mut self, stitch_labels: bool) -> Self {
        self.stitch_labels = stitch_labels;
        self
    }

    /// Enables the indexing-base shift applied to every added frame.
    pub fn with_auto_reindex(mut self, auto_reindex: bool) -> Self {
        self.auto_reindex = auto_reindex;
        self
    }

    /// Treats label 0 as background: never shifted, never stitched.
    pub fn with_zero_is_background(mut self, zero_is_background: bool) -> Self {
        self.zero_is_background = zero_is_background;
        self
    }

    /// Absolute cutoff for accepting a cross-boundary link. Without it the
    /// stitcher falls back to the per-link label-width heuristic.
    pub fn with_stitch_cost_threshold(mut self, threshold: f64) -> Self {
        self.stitch_cost_threshold = Some(threshold);
        self
    }

    pub fn build(self) -> Result<MapBuffer> {
        if self.max_frames == 0 {
            return Err(MapError::BadInput(
                "map buffer capacity must be at least one frame".into(),
            ));
        }
        Ok(MapBuffer {
            max_frames: self.max_frames,
            stitch_labels: self.stitch_labels,
            auto_reindex: self.auto_reindex,
            zero_is_background: self.zero_is_background,
            stitch_cost_threshold: self.stitch_cost_threshold,
            frames: VecDeque::new(),
            indexing_base: 0,
            first_frame_position: None,
            pair_log: ObjectPairLog::new(),
            raw_partial_objects: BitVec::new(),
            entry_channel_types: None,
        })
    }
}

/// Bounded FIFO of frames plus the derived label bookkeeping.
///
/// Single-owner: one thread mutates, the same thread reads. The internal
/// parallel passes fork and join within a single call.
#[derive(Debug)]
pub struct MapBuffer {
    pub(super) max_frames: usize,
    pub(super) stitch_labels: bool,
    pub(super) auto_reindex: bool,
    pub(super) zero_is_background: bool,
    pub(super) stitch_cost_threshold: Option<f64>,
    pub(super) frames: VecDeque<Frame>,
    pub(super) indexing_base: i32,
    pub(super) first_frame_position: Option<IRect>,
    pub(super) pair_log: ObjectPairLog,
    // Bit set for a raw label iff its region reaches a frame edge that is
    // not internal to the covered area. Recomputed on every stitching add.
    pub(super) raw_partial_objects: BitVec,
    // Channel layout of the first added matrix; all later adds must match.
    pub(super) entry_channel_types: Option<Vec<ElementType>>,
}

impl MapBuffer {
    pub fn builder(max_frames: usize) -> MapBufferBuilder {
        MapBufferBuilder {
            max_frames,
            stitch_labels: false,
            auto_reindex: false,
            zero_is_background: false,
            stitch_cost_threshold: None,
        }
    }

    pub fn max_frames(&self) -> usize {
        self.max_frames
    }

    pub fn stitch_labels(&self) -> bool {
        self.stitch_labels
    }

    pub fn auto_reindex(&self) -> bool {
        self.auto_reindex
    }

    pub fn zero_is_background(&self) -> bool {
        self.zero_is_background
    }

    pub fn number_of_frames(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Stored frames in insertion order, oldest first.
    pub fn frames(&self) -> impl Iterator<Item = &Frame> {
        self.frames.iter()
    }

    pub fn last_frame(&self) -> Result<&Frame> {
        self.frames
            .back()
            .ok_or_else(|| MapError::NotFound("map buffer contains no frames".into()))
    }

    /// Position of the first frame added since the last clear; sticky even
    /// after that frame is evicted.
    pub fn first_frame_position(&self) -> Option<IRect> {
        self.first_frame_position
    }

    pub fn indexing_base(&self) -> i32 {
        self.indexing_base
    }

    /// Number of objects issued so far: the indexing base, plus one for
    /// the background label when it is reserved.
    pub fn number_of_objects(&self) -> i64 {
        self.indexing_base as i64 + if self.zero_is_background { 1 } else { 0 }
    }

    /// Bit per raw label: set iff the label's region reaches a frame edge
    /// not internal to the covered area.
    pub fn partial_objects_mask(&self) -> &BitSlice {
        &self.raw_partial_objects
    }

    /// Base-indexed mask of completed objects: every constituent raw piece
    /// non-partial. Sized to cover every label issued so far.
    pub fn completed_objects_mask(&mut self) -> Result<BitVec> {
        let n = (self.indexing_base as usize + 1).max(self.raw_partial_objects.len());
        let mut non_partial = !self.raw_partial_objects.clone();
        non_partial.resize(n, true);
        self.pair_log.reindex_by_and(&non_partial)
    }

    /// Materialised stitching map over every label issued so far.
    pub fn stitching_map(&mut self) -> Result<Vec<i32>> {
        let n = self.indexing_base as usize + 1;
        self.pair_log.reindex_table(n)
    }

    pub fn pair_log(&self) -> &ObjectPairLog {
        &self.pair_log
    }

    /// Empties the frame window and all derived state. The indexing base
    /// is zeroed only when `reset_indexing`.
    pub fn clear(&mut self, reset_indexing: bool) {
        self.frames.clear();
        self.pair_log.clear();
        self.raw_partial_objects = BitVec::new();
        self.first_frame_position = None;
        self.entry_channel_types = None;
        if reset_indexing {
            self.indexing_base = 0;
        }
        debug!(
            "map buffer cleared, indexing base {} ({})",
            self.indexing_base,
            if reset_indexing { "reset" } else { "kept" }
        );
    }

    // ── Add frame ───────────────────────────────────────────────────────

    /// Adds a frame with its left-top corner at `left_top`.
    ///
    /// `crop` restricts the matrix to a sub-rectangle (in matrix
    /// coordinates) before placement. With `disable_overlapping`, a new
    /// frame intersecting any stored frame is a `Conflict` and the buffer
    /// is left unchanged. Eviction of the oldest frame happens only after
    /// every validation and derived-state update has succeeded.
    pub fn add_frame(
        &mut self,
        matrix: Matrix,
        left_top: (i64, i64),
        crop: Option<IRect>,
        disable_overlapping: bool,
    ) -> Result<Frame> {
        // Channel layout must match whatever the buffer has seen so far.
        if let Some(expected) = &self.entry_channel_types {
            if expected.len() != matrix.num_channels() {
                return Err(MapError::ChannelCountMismatch {
                    expected: expected.len(),
                    actual: matrix.num_channels(),
                });
            }
            if *expected != matrix.channel_types() {
                return Err(MapError::BadShape(format!(
                    "channel layout {:?} does not match the buffer's {:?}",
                    matrix.channel_types(),
                    expected
                )));
            }
        }
        let entry_types = matrix.channel_types();

        if let Some(c) = crop {
            let bounds = IRect::new(0, matrix.dim_x() - 1, 0, matrix.dim_y() - 1)?;
            if !bounds.contains_rect(&c) {
                return Err(MapError::BadShape(format!(
                    "crop {:?} outside matrix {}x{}",
                    c,
                    matrix.dim_x(),
                    matrix.dim_y()
                )));
            }
        }

        // The frame rectangle is known before any label work runs, so the
        // overlap check fires first.
        let (dim_x, dim_y) = match crop {
            Some(c) => (c.size_x(), c.size_y()),
            None => (matrix.dim_x(), matrix.dim_y()),
        };
        let position = IRect::from_origin_and_sizes(left_top.0, left_top.1, dim_x, dim_y)?;
        if disable_overlapping {
            if let Some(hit) = self
                .frames
                .iter()
                .find(|f| f.position().intersects(&position))
            {
                return Err(MapError::Conflict(format!(
                    "frame {:?} overlaps stored frame {:?}",
                    position,
                    hit.position()
                )));
            }
        }

        let (stored, next_base) = if self.auto_reindex {
            self.shift_for_add(&matrix, left_top, crop)?
        } else {
            let effective = match crop {
                Some(c) => {
                    matrix.sub_matrix_zero_extended(c.min_x(), c.min_y(), c.size_x(), c.size_y())?
                }
                None => matrix,
            };
            let frame = Frame::new(left_top, effective)?;
            if self.stitch_labels && frame.min_label()? < 0 {
                return Err(MapError::BadInput(format!(
                    "negative label in frame at {:?}",
                    frame.position()
                )));
            }
            (frame, self.indexing_base)
        };

        if self.stitch_labels {
            stored.matrix().ensure_label_channel()?;
            self.stitch_frame(&stored)?;
            self.recompute_partial_objects(&stored)?;
        }

        self.indexing_base = next_base;
        self.entry_channel_types = Some(entry_types);
        if self.first_frame_position.is_none() {
            self.first_frame_position = Some(stored.position());
        }

        // Eviction strictly after all derived-state mutation.
        if self.frames.len() == self.max_frames {
            if let Some(evicted) = self.frames.pop_front() {
                debug!("evicted frame at {:?}", evicted.position());
            }
        }
        self.frames.push_back(stored.clone());
        debug!(
            "added frame at {:?}; {} frames, indexing base {}",
            stored.position(),
            self.frames.len(),
            self.indexing_base
        );
        Ok(stored)
    }

    /// Label shift for `auto_reindex`, choosing between the fused direct
    /// path and the general per-pixel one.
    fn shift_for_add(
        &self,
        matrix: &Matrix,
        left_top: (i64, i64),
        crop: Option<IRect>,
    ) -> Result<(Frame, i32)> {
        if let Some(src) = matrix.direct_i32() {
            // Fast path: crop, negativity check, base shift and next-base
            // scan fused into one (optionally parallel) row sweep.
            let (crop_x, crop_y, out_dim_x, out_dim_y) = match crop {
                Some(c) => (
                    c.min_x() as usize,
                    c.min_y() as usize,
                    c.size_x() as usize,
                    c.size_y() as usize,
                ),
                None => (0, 0, matrix.dim_x() as usize, matrix.dim_y() as usize),
            };
            let (shifted, max_shifted) = self.fused_shift(
                src,
                matrix.dim_x() as usize,
                crop_x,
                crop_y,
                out_dim_x,
                out_dim_y,
            )?;
            let next =
                next_base_from_max(max_shifted, self.indexing_base, self.zero_is_background)?;
            let frame = Frame::new(
                left_top,
                Matrix::from_i32(out_dim_x as i64, out_dim_y as i64, shifted)?,
            )?;
            return Ok((frame, next));
        }

        let effective = match crop {
            Some(c) => {
                matrix.sub_matrix_zero_extended(c.min_x(), c.min_y(), c.size_x(), c.size_y())?
            }
            None => matrix.clone(),
        };
        let frame = Frame::new(left_top, effective)?;
        let shifted = frame.add_indexing_base(self.zero_is_background, self.indexing_base)?;
        let next = shifted.next_indexing_base(self.indexing_base, self.zero_is_background)?;
        Ok((shifted, next))
    }

    /// One sweep over the cropped rows of a direct `i32` array: validates
    /// non-negativity, applies the base shift and tracks the post-shift
    /// maximum. Blocks of [`BLOCK_ROWS`] rows run on the worker pool when
    /// the `rayon` feature is enabled; no result escapes before the join.
    fn fused_shift(
        &self,
        src: &[i32],
        src_dim_x: usize,
        crop_x: usize,
        crop_y: usize,
        out_dim_x: usize,
        out_dim_y: usize,
    ) -> Result<(Vec<i32>, i32)> {
        let base = self.indexing_base;
        let zero_is_background = self.zero_is_background;
        let mut out = vec![0i32; out_dim_x * out_dim_y];

        let shift_block = |block: &mut [i32], block_index: usize| -> Result<i64> {
            let mut max = 0i64;
            let first_row = crop_y + block_index * BLOCK_ROWS;
            for (r, out_row) in block.chunks_mut(out_dim_x).enumerate() {
                let offset = (first_row + r) * src_dim_x + crop_x;
                let src_row = &src[offset..offset + out_dim_x];
                for (out_label, &label) in out_row.iter_mut().zip(src_row) {
                    let shifted = shift_label(label as i64, base, zero_is_background)?;
                    *out_label = shifted;
                    max = max.max(shifted as i64);
                }
            }
            Ok(max)
        };

        #[cfg(feature = "rayon")]
        let max = out
            .par_chunks_mut(BLOCK_ROWS * out_dim_x)
            .enumerate()
            .map(|(block_index, block)| shift_block(block, block_index))
            .try_reduce(|| 0i64, |a, b| Ok(a.max(b)))?;

        #[cfg(not(feature = "rayon"))]
        let max = {
            let mut max = 0i64;
            for (block_index, block) in out.chunks_mut(BLOCK_ROWS * out_dim_x).enumerate() {
                max = max.max(shift_block(block, block_index)?);
            }
            max
        };

        Ok((out, max as i32))
    }

    // ── Rectangular reads ───────────────────────────────────────────────

    /// Fresh zero-filled matrix over `rect`; the intersection with every
    /// stored frame is copied in insertion order, so later frames win on
    /// overlap.
    pub fn read_matrix(&self, rect: IRect) -> Result<Matrix> {
        if self.frames.is_empty() {
            return Err(MapError::NotFound("read on empty map buffer".into()));
        }
        let count = rect.pixel_count()?;
        if count > MAX_PIXEL_COUNT {
            return Err(MapError::BadShape(format!(
                "read rectangle {:?} exceeds {} pixels",
                rect, MAX_PIXEL_COUNT
            )));
        }
        let types = self.frames[0].matrix().channel_types();
        let mut channels: Vec<Samples> = types
            .iter()
            .map(|t| Samples::zeros(*t, count as usize))
            .collect();
        for frame in &self.frames {
            let isect = match rect.intersection(&frame.position()) {
                Some(r) => r,
                None => continue,
            };
            for (c, samples) in channels.iter_mut().enumerate() {
                samples.copy_rows_from(
                    rect.size_x() as usize,
                    (isect.min_x() - rect.min_x()) as usize,
                    (isect.min_y() - rect.min_y()) as usize,
                    frame.matrix().channel(c)?.samples(),
                    frame.dim_x() as usize,
                    (isect.min_x() - frame.position().min_x()) as usize,
                    (isect.min_y() - frame.position().min_y()) as usize,
                    isect.size_x() as usize,
                    isect.size_y() as usize,
                )?;
            }
        }
        Matrix::new(
            rect.size_x(),
            rect.size_y(),
            channels.into_iter().map(ChannelData::new).collect(),
        )
    }

    /// Like [`MapBuffer::read_matrix`], with channel 0 passed through the
    /// object-pair disjoint set. `quick_mode` promises the bases are
    /// already resolved, making every lookup single-level; otherwise the
    /// set is resolved first.
    pub fn read_matrix_reindexed(&mut self, rect: IRect, quick_mode: bool) -> Result<Matrix> {
        if !quick_mode {
            self.pair_log.resolve_all_bases();
        }
        let plain = self.read_matrix(rect)?;
        plain.ensure_label_channel()?;
        let channel = plain.channel(0)?;
        let reindexed = self.reindex_samples(channel, rect.size_x() as usize)?;
        plain.with_channel(0, ChannelData::from_i32(reindexed))
    }

    /// Maps a label channel through `parent_or_this`, in parallel row
    /// blocks when the storage is direct.
    fn reindex_samples(&self, channel: &ChannelData, dim_x: usize) -> Result<Vec<i32>> {
        if let Some(src) = channel.as_i32_slice() {
            #[cfg(feature = "rayon")]
            return Ok(src
                .par_chunks(BLOCK_ROWS * dim_x.max(1))
                .flat_map_iter(|block| block.iter().map(|&v| self.pair_log.reindex(v)))
                .collect());
            #[cfg(not(feature = "rayon"))]
            {
                let _ = dim_x;
                return Ok(src.iter().map(|&v| self.pair_log.reindex(v)).collect());
            }
        }
        let mut out = Vec::with_capacity(channel.len());
        for index in 0..channel.len() {
            out.push(self.pair_log.reindex(channel.get_i64(index) as i32));
        }
        Ok(out)
    }

    /// One-pixel-thick reindexed label line, the vertical/horizontal
    /// specialisation used by the stitcher. `rect` must have size 1 on at
    /// least one axis; the caller must have resolved all bases.
    pub fn read_labels_line_reindexed(&self, rect: IRect) -> Result<Vec<i32>> {
        if rect.size_x() != 1 && rect.size_y() != 1 {
            return Err(MapError::BadInput(format!(
                "label line {:?} is not unit-thin",
                rect
            )));
        }
        if self.frames.is_empty() {
            return Err(MapError::NotFound("read on empty map buffer".into()));
        }
        self.frames[0].matrix().ensure_label_channel()?;
        let vertical = rect.size_x() == 1;
        let len = if vertical {
            rect.size_y() as usize
        } else {
            rect.size_x() as usize
        };
        let mut line = vec![0i32; len];
        for frame in &self.frames {
            let isect = match rect.intersection(&frame.position()) {
                Some(r) => r,
                None => continue,
            };
            let labels = if vertical {
                frame.labels_line_vertical(rect.min_x(), isect.min_y(), isect.max_y())?
            } else {
                frame.labels_line_horizontal(rect.min_y(), isect.min_x(), isect.max_x())?
            };
            let offset = if vertical {
                (isect.min_y() - rect.min_y()) as usize
            } else {
                (isect.min_x() - rect.min_x()) as usize
            };
            line[offset..offset + labels.len()].copy_from_slice(&labels);
        }
        for label in &mut line {
            *label = self.pair_log.reindex(*label);
        }
        Ok(line)
    }

    // ── Coverage ────────────────────────────────────────────────────────

    /// Whether `rect` lies entirely inside the union of stored frame
    /// positions.
    pub fn is_covered(&self, rect: IRect) -> bool {
        let positions: Vec<IRect> = self.frames.iter().map(|f| f.position()).collect();
        rect.is_covered_by(&positions)
    }

    /// Minimal rectangle enclosing every stored frame.
    pub fn containing_rectangle(&self) -> Result<IRect> {
        let mut iter = self.frames.iter();
        let first = iter
            .next()
            .ok_or_else(|| MapError::NotFound("map buffer contains no frames".into()))?;
        let mut rect = first.position();
        for frame in iter {
            rect = rect.bounding(&frame.position())?;
        }
        Ok(rect)
    }

    /// Moves `orig` toward `target` while keeping the result covered.
    ///
    /// Axes are processed independently, highest-numbered first (y, then
    /// x); on each axis the min bound is attempted, then the max bound,
    /// and any attempt leaving the rectangle uncovered is rolled back.
    /// Disjoint `orig` and `target` return `orig` unchanged unless
    /// `target` itself is covered.
    pub fn change_rectangle_on_map(
        &self,
        orig: IRect,
        target: IRect,
        must_be_covered: bool,
    ) -> Result<IRect> {
        if must_be_covered && !self.is_covered(orig) {
            return Err(MapError::Conflict(format!(
                "rectangle {:?} is not covered by the map",
                orig
            )));
        }
        if orig.intersection(&target).is_none() {
            return Ok(if self.is_covered(target) { target } else { orig });
        }
        let mut current = orig;
        // Axis 1 (y) first, then axis 0 (x). The max attempt builds on the
        // outcome of the min attempt, so a successful move is kept.
        for vertical in [true, false] {
            let min_attempt = if vertical {
                IRect::new(current.min_x(), current.max_x(), target.min_y(), current.max_y())
            } else {
                IRect::new(target.min_x(), current.max_x(), current.min_y(), current.max_y())
            };
            if let Ok(attempt) = min_attempt {
                if self.is_covered(attempt) {
                    current = attempt;
                }
            }
            let max_attempt = if vertical {
                IRect::new(current.min_x(), current.max_x(), current.min_y(), target.max_y())
            } else {
                IRect::new(current.min_x(), target.max_x(), current.min_y(), current.max_y())
            };
            if let Ok(attempt) = max_attempt {
                if self.is_covered(attempt) {
                    current = attempt;
                }
            }
        }
        Ok(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn label_matrix(dim_x: i64, dim_y: i64, data: Vec<i32>) -> Matrix {
        Matrix::from_i32(dim_x, dim_y, data).unwrap()
    }

    fn read_labels(buffer: &MapBuffer, rect: IRect) -> Vec<i64> {
        let m = buffer.read_matrix(rect).unwrap();
        let mut out = Vec::new();
        for y in 0..m.dim_y() {
            for x in 0..m.dim_x() {
                out.push(m.get_i64(0, x, y).unwrap());
            }
        }
        out
    }

    #[test]
    fn empty_read_is_not_found() {
        let buffer = MapBuffer::builder(1).build().unwrap();
        let rect = IRect::new(0, 9, 0, 9).unwrap();
        assert!(matches!(
            buffer.read_matrix(rect),
            Err(MapError::NotFound(_))
        ));
    }

    #[test]
    fn round_trip_single_frame() {
        let mut buffer = MapBuffer::builder(4).build().unwrap();
        let m = label_matrix(2, 2, vec![9, 8, 7, 6]);
        let frame = buffer.add_frame(m.clone(), (5, -3), None, false).unwrap();
        let back = buffer.read_matrix(frame.position()).unwrap();
        assert_eq!(back, m);
    }

    #[test]
    fn zero_fill_outside_coverage() {
        let mut buffer = MapBuffer::builder(4).build().unwrap();
        buffer
            .add_frame(label_matrix(1, 1, vec![5]), (0, 0), None, false)
            .unwrap();
        let rect = IRect::new(0, 2, 0, 0).unwrap();
        assert_eq!(read_labels(&buffer, rect), vec![5, 0, 0]);
    }

    #[test]
    fn later_frame_wins_on_overlap() {
        let mut buffer = MapBuffer::builder(4).build().unwrap();
        buffer
            .add_frame(label_matrix(2, 1, vec![1, 1]), (0, 0), None, false)
            .unwrap();
        buffer
            .add_frame(label_matrix(2, 1, vec![2, 2]), (1, 0), None, false)
            .unwrap();
        let rect = IRect::new(0, 2, 0, 0).unwrap();
        assert_eq!(read_labels(&buffer, rect), vec![1, 2, 2]);
    }

    #[test]
    fn auto_reindex_with_background() {
        // Seed scenario: two 2x2 frames side by side.
        let mut buffer = MapBuffer::builder(4)
            .with_auto_reindex(true)
            .with_zero_is_background(true)
            .build()
            .unwrap();
        buffer
            .add_frame(label_matrix(2, 2, vec![0, 1, 1, 2]), (0, 0), None, false)
            .unwrap();
        assert_eq!(buffer.indexing_base(), 2);
        assert_eq!(buffer.number_of_objects(), 3);
        buffer
            .add_frame(label_matrix(2, 2, vec![0, 1, 1, 1]), (2, 0), None, false)
            .unwrap();
        assert_eq!(buffer.indexing_base(), 3);
        let rect = IRect::new(0, 3, 0, 1).unwrap();
        assert_eq!(
            read_labels(&buffer, rect),
            vec![0, 1, 0, 3, 1, 2, 3, 3]
        );
    }

    #[test]
    fn auto_reindex_without_background() {
        let mut buffer = MapBuffer::builder(4)
            .with_auto_reindex(true)
            .build()
            .unwrap();
        buffer
            .add_frame(label_matrix(2, 2, vec![0, 1, 1, 2]), (0, 0), None, false)
            .unwrap();
        assert_eq!(buffer.indexing_base(), 3);
        let f2 = buffer
            .add_frame(label_matrix(2, 2, vec![0, 1, 1, 1]), (2, 0), None, false)
            .unwrap();
        assert_eq!(f2.matrix().get_i64(0, 0, 0).unwrap(), 3);
        assert_eq!(f2.matrix().get_i64(0, 1, 0).unwrap(), 4);
        assert_eq!(buffer.indexing_base(), 5);
        assert_eq!(buffer.number_of_objects(), 5);
    }

    #[test]
    fn sliding_window_eviction() {
        let mut buffer = MapBuffer::builder(2).build().unwrap();
        let a = buffer
            .add_frame(label_matrix(1, 1, vec![1]), (0, 0), None, false)
            .unwrap();
        buffer
            .add_frame(label_matrix(1, 1, vec![2]), (5, 0), None, false)
            .unwrap();
        buffer
            .add_frame(label_matrix(1, 1, vec![3]), (10, 0), None, false)
            .unwrap();
        assert_eq!(buffer.number_of_frames(), 2);
        assert_eq!(buffer.first_frame_position(), Some(a.position()));
        let kept: Vec<i64> = buffer
            .frames()
            .map(|f| f.position().min_x())
            .collect();
        assert_eq!(kept, vec![5, 10]);
    }

    #[test]
    fn overlap_rejected_and_state_untouched() {
        let mut buffer = MapBuffer::builder(4).build().unwrap();
        buffer
            .add_frame(label_matrix(4, 4, vec![1; 16]), (0, 0), None, true)
            .unwrap();
        let err = buffer.add_frame(label_matrix(4, 4, vec![2; 16]), (2, 2), None, true);
        assert!(matches!(err, Err(MapError::Conflict(_))));
        assert_eq!(buffer.number_of_frames(), 1);
        let rect = IRect::new(2, 2, 2, 2).unwrap();
        assert_eq!(read_labels(&buffer, rect), vec![1]);
    }

    #[test]
    fn crop_restricts_the_added_matrix() {
        let mut buffer = MapBuffer::builder(4).build().unwrap();
        let m = label_matrix(3, 3, vec![1, 2, 3, 4, 5, 6, 7, 8, 9]);
        let crop = IRect::new(1, 2, 1, 2).unwrap();
        let frame = buffer.add_frame(m, (0, 0), Some(crop), false).unwrap();
        assert_eq!(frame.position(), IRect::new(0, 1, 0, 1).unwrap());
        assert_eq!(read_labels(&buffer, frame.position()), vec![5, 6, 8, 9]);
    }

    #[test]
    fn crop_outside_matrix_rejected() {
        let mut buffer = MapBuffer::builder(4).build().unwrap();
        let m = label_matrix(2, 2, vec![1, 2, 3, 4]);
        let crop = IRect::new(1, 2, 0, 1).unwrap();
        assert!(matches!(
            buffer.add_frame(m, (0, 0), Some(crop), false),
            Err(MapError::BadShape(_))
        ));
    }

    #[test]
    fn channel_layout_mismatch_rejected() {
        let mut buffer = MapBuffer::builder(4).build().unwrap();
        buffer
            .add_frame(label_matrix(1, 1, vec![1]), (0, 0), None, false)
            .unwrap();
        let other = Matrix::zeros(ElementType::U16, 1, 1, 1).unwrap();
        assert!(matches!(
            buffer.add_frame(other, (5, 5), None, false),
            Err(MapError::BadShape(_))
        ));
    }

    #[test]
    fn fused_and_general_shift_agree() {
        // Same labels through the direct-i32 fast path and a u16 channel.
        let labels = vec![0, 3, 3, 0, 7, 7, 1, 0, 2];
        let mut direct = MapBuffer::builder(4)
            .with_auto_reindex(true)
            .with_zero_is_background(true)
            .build()
            .unwrap();
        direct
            .add_frame(label_matrix(3, 3, vec![0, 1, 2, 0, 1, 2, 0, 1, 2]), (9, 9), None, false)
            .unwrap();
        direct
            .add_frame(label_matrix(3, 3, labels.clone()), (0, 0), None, false)
            .unwrap();

        let mut general = MapBuffer::builder(4)
            .with_auto_reindex(true)
            .with_zero_is_background(true)
            .build()
            .unwrap();
        let mut u16_data = Samples::zeros(ElementType::U16, 9);
        if let Samples::U16(v) = &mut u16_data {
            for (dst, src) in v.iter_mut().zip(&[0, 1, 2, 0, 1, 2, 0, 1, 2]) {
                *dst = *src as u16;
            }
        }
        general
            .add_frame(
                Matrix::new(3, 3, vec![ChannelData::new(u16_data)]).unwrap(),
                (9, 9),
                None,
                false,
            )
            .unwrap();
        let mut u16_labels = Samples::zeros(ElementType::U16, 9);
        if let Samples::U16(v) = &mut u16_labels {
            for (dst, src) in v.iter_mut().zip(&labels) {
                *dst = *src as u16;
            }
        }
        general
            .add_frame(
                Matrix::new(3, 3, vec![ChannelData::new(u16_labels)]).unwrap(),
                (0, 0),
                None,
                false,
            )
            .unwrap();

        assert_eq!(direct.indexing_base(), general.indexing_base());
        let rect = IRect::new(0, 2, 0, 2).unwrap();
        assert_eq!(read_labels(&direct, rect), read_labels(&general, rect));
    }

    #[test]
    fn indexing_base_survives_clear_without_reset() {
        let mut buffer = MapBuffer::builder(4)
            .with_auto_reindex(true)
            .build()
            .unwrap();
        buffer
            .add_frame(label_matrix(1, 1, vec![4]), (0, 0), None, false)
            .unwrap();
        assert_eq!(buffer.indexing_base(), 5);
        buffer.clear(false);
        assert!(buffer.is_empty());
        assert_eq!(buffer.first_frame_position(), None);
        assert_eq!(buffer.indexing_base(), 5);
        buffer.clear(true);
        assert_eq!(buffer.indexing_base(), 0);
    }

    #[test]
    fn coverage_checks() {
        let mut buffer = MapBuffer::builder(4).build().unwrap();
        buffer
            .add_frame(label_matrix(4, 2, vec![1; 8]), (0, 0), None, false)
            .unwrap();
        buffer
            .add_frame(label_matrix(4, 2, vec![2; 8]), (0, 2), None, false)
            .unwrap();
        assert!(buffer.is_covered(IRect::new(0, 3, 0, 3).unwrap()));
        assert!(buffer.is_covered(IRect::new(1, 2, 1, 2).unwrap()));
        assert!(!buffer.is_covered(IRect::new(0, 4, 0, 3).unwrap()));
        assert_eq!(
            buffer.containing_rectangle().unwrap(),
            IRect::new(0, 3, 0, 3).unwrap()
        );
    }

    #[test]
    fn change_rectangle_moves_within_coverage() {
        let mut buffer = MapBuffer::builder(4).build().unwrap();
        // L-shaped coverage: [0,3]x[0,1] plus [0,1]x[2,3].
        buffer
            .add_frame(label_matrix(4, 2, vec![1; 8]), (0, 0), None, false)
            .unwrap();
        buffer
            .add_frame(label_matrix(2, 2, vec![2; 4]), (0, 2), None, false)
            .unwrap();
        let orig = IRect::new(0, 1, 0, 1).unwrap();
        let target = IRect::new(1, 3, 1, 3).unwrap();
        let moved = buffer.change_rectangle_on_map(orig, target, true).unwrap();
        assert!(buffer.is_covered(moved));
        // The y axis moves first: [0,1] x [1,3] stays covered, after which
        // x can only shrink to column 1 (stretching to 3 would leave the
        // covered area).
        assert_eq!(moved, IRect::new(1, 1, 1, 3).unwrap());
        let overlap = orig.intersection(&target).unwrap();
        assert!(moved.contains_rect(&overlap));
    }

    #[test]
    fn change_rectangle_disjoint_target() {
        let mut buffer = MapBuffer::builder(4).build().unwrap();
        buffer
            .add_frame(label_matrix(4, 4, vec![0; 16]), (0, 0), None, false)
            .unwrap();
        let orig = IRect::new(0, 1, 0, 1).unwrap();
        let covered_target = IRect::new(2, 3, 2, 3).unwrap();
        assert_eq!(
            buffer
                .change_rectangle_on_map(orig, covered_target, true)
                .unwrap(),
            covered_target
        );
        let outside_target = IRect::new(10, 11, 10, 11).unwrap();
        assert_eq!(
            buffer
                .change_rectangle_on_map(orig, outside_target, true)
                .unwrap(),
            orig
        );
    }

    #[test]
    fn uncovered_orig_with_must_be_covered_is_conflict() {
        let mut buffer = MapBuffer::builder(4).build().unwrap();
        buffer
            .add_frame(label_matrix(2, 2, vec![0; 4]), (0, 0), None, false)
            .unwrap();
        let orig = IRect::new(0, 4, 0, 4).unwrap();
        assert!(matches!(
            buffer.change_rectangle_on_map(orig, orig, true),
            Err(MapError::Conflict(_))
        ));
    }

    #[test]
    fn oversized_read_rejected() {
        let mut buffer = MapBuffer::builder(4).build().unwrap();
        buffer
            .add_frame(label_matrix(1, 1, vec![1]), (0, 0), None, false)
            .unwrap();
        let huge = IRect::new(0, (1 << 16) - 1, 0, (1 << 16) - 1).unwrap();
        assert!(matches!(
            buffer.read_matrix(huge),
            Err(MapError::BadShape(_))
        ));
    }
}
