// src/map/stitcher.rs

//! Cross-boundary object stitching and the jointed last-frame read.
//!
//! When a buffer runs with `stitch_labels`, every added frame is compared
//! against the stored frames that touch its border. Along each shared
//! boundary the two adjacent one-pixel label lines are reduced to run
//! centroids, matched by minimum-cost linking, and every accepted link
//! lands in the object-pair log, so a physically connected object ends up
//! under a single base label.
//!
//! The jointed read renders the last frame expanded to an enclosing
//! rectangle, keeps completed stitched objects and applies the configured
//! policy to objects that are incomplete or continue past the rectangle.

use std::iter;

use bitvec::prelude::*;
use log::{debug, trace};

use crate::graph::linking::min_cost_linking;
use crate::image::geom::IRect;
use crate::image::matrix::{ChannelData, Matrix, Samples};
use crate::labels::pair_log::ObjectPairLog;
use crate::map::frame::Frame;
use crate::map::map_buffer::MapBuffer;
use crate::utils::error::{MapError, Result};

/// Policy for a jointed object that is incomplete or continues past the
/// expansion rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JointingTooLargeObjects {
    /// Drop the object entirely (its pixels become zero).
    #[default]
    Skip,
    /// Keep whatever of the object the expansion rectangle clips.
    RetainLastPart,
}

/// Per-read options of the jointed last-frame read.
#[derive(Debug, Clone)]
pub struct JointReadOptions {
    /// Expansion around the last frame's position. `None` grows the
    /// rectangle to every stored frame sharing a stitched object with the
    /// last frame.
    pub joint_expansion: Option<(i64, i64)>,
    /// Interpret `joint_expansion` as percents of the last frame's sizes.
    pub expansion_in_percents: bool,
    /// Trim trailing all-zero rows and columns from the result.
    pub auto_crop: bool,
    /// Zero padding added on each side after cropping.
    pub zero_padding: (i64, i64),
    pub jointing_too_large_objects: JointingTooLargeObjects,
    /// Renumber the result's labels `1, 2, ...` and return the restoring
    /// table.
    pub sequentially_reindex: bool,
    /// Include entry 0 (mapping to background) in the restoring table.
    pub zero_based_restoring_table: bool,
}

impl Default for JointReadOptions {
    fn default() -> Self {
        JointReadOptions {
            joint_expansion: None,
            expansion_in_percents: false,
            auto_crop: false,
            zero_padding: (0, 0),
            jointing_too_large_objects: JointingTooLargeObjects::Skip,
            sequentially_reindex: false,
            zero_based_restoring_table: false,
        }
    }
}

impl JointReadOptions {
    pub fn with_expansion(mut self, dx: i64, dy: i64) -> Self {
        self.joint_expansion = Some((dx, dy));
        self
    }

    pub fn with_expansion_in_percents(mut self, percents: bool) -> Self {
        self.expansion_in_percents = percents;
        self
    }

    pub fn with_auto_crop(mut self, auto_crop: bool) -> Self {
        self.auto_crop = auto_crop;
        self
    }

    pub fn with_zero_padding(mut self, px: i64, py: i64) -> Self {
        self.zero_padding = (px, py);
        self
    }

    pub fn with_jointing_too_large_objects(mut self, policy: JointingTooLargeObjects) -> Self {
        self.jointing_too_large_objects = policy;
        self
    }

    pub fn with_sequentially_reindex(mut self, reindex: bool) -> Self {
        self.sequentially_reindex = reindex;
        self
    }

    pub fn with_zero_based_restoring_table(mut self, zero_based: bool) -> Self {
        self.zero_based_restoring_table = zero_based;
        self
    }
}

/// Result of a jointed read: the assembled frame and, when sequential
/// reindexing ran, the table taking compact labels back to stitched ones.
#[derive(Debug, Clone)]
pub struct JointedFrame {
    pub frame: Frame,
    pub restoring_table: Option<Vec<i32>>,
}

// ─── Label runs on a boundary line ──────────────────────────────────────

/// One maximal run of equal non-zero labels on a boundary line.
#[derive(Debug, Clone, Copy)]
struct LabelRun {
    label: i32,
    /// Centroid coordinate along the line.
    position: f64,
    length: i64,
}

/// Decomposes a label line into runs of equal non-zero labels; the run
/// centroid is the mid-point of its first and last coordinate.
fn line_runs(labels: &[i32], start: i64) -> Vec<LabelRun> {
    let mut runs = Vec::new();
    let mut index = 0;
    while index < labels.len() {
        let label = labels[index];
        let mut end = index + 1;
        while end < labels.len() && labels[end] == label {
            end += 1;
        }
        if label != 0 {
            runs.push(LabelRun {
                label,
                position: start as f64 + (index + end - 1) as f64 / 2.0,
                length: (end - index) as i64,
            });
        }
        index = end;
    }
    runs
}

/// Links two boundary lines and collects the accepted label pairs.
///
/// Without an absolute threshold, a link is accepted when its cost does
/// not exceed the wider of the two runs (the label-width heuristic).
fn link_boundary_lines(
    pairs: &mut Vec<(i32, i32, f64)>,
    new_line: &[i32],
    neighbour_line: &[i32],
    start: i64,
    threshold: Option<f64>,
) -> Result<()> {
    let new_runs = line_runs(new_line, start);
    let neighbour_runs = line_runs(neighbour_line, start);
    if new_runs.is_empty() || neighbour_runs.is_empty() {
        return Ok(());
    }
    let s: Vec<f64> = new_runs.iter().map(|r| r.position).collect();
    let t: Vec<f64> = neighbour_runs.iter().map(|r| r.position).collect();
    for link in min_cost_linking(&s, &t)? {
        let a = new_runs[link.source_index];
        let b = neighbour_runs[link.target_index];
        let cutoff = threshold.unwrap_or_else(|| a.length.max(b.length) as f64);
        if link.cost <= cutoff {
            pairs.push((a.label, b.label, link.cost));
        }
    }
    Ok(())
}

fn set_bit(bits: &mut BitVec, index: usize) {
    if index >= bits.len() {
        bits.resize(index + 1, false);
    }
    bits.set(index, true);
}

fn mark_labels(bits: &mut BitVec, labels: &[i32]) {
    for &label in labels {
        if label > 0 {
            set_bit(bits, label as usize);
        }
    }
}

fn union_into(dst: &mut BitVec, src: &BitVec) {
    if src.len() > dst.len() {
        dst.resize(src.len(), false);
    }
    for index in src.iter_ones() {
        dst.set(index, true);
    }
}

fn bits_intersect(a: &BitVec, b: &BitVec) -> bool {
    a.iter_ones().any(|index| index < b.len() && b[index])
}

/// Every base label present in channel 0 of `frame`.
fn frame_bases(frame: &Frame, pair_log: &ObjectPairLog) -> Result<BitVec> {
    let channel = frame.matrix().channel(0)?;
    let mut bits = BitVec::new();
    for index in 0..channel.len() {
        let raw = channel.get_i64(index) as i32;
        if raw > 0 {
            set_bit(&mut bits, pair_log.reindex(raw) as usize);
        }
    }
    Ok(bits)
}

/// Marks as partial every label of `frame` with a pixel on an edge whose
/// outward neighbour is not inside the covered area.
fn mark_partial_edges(frame: &Frame, coverage: &[IRect], bits: &mut BitVec) -> Result<()> {
    let pos = frame.position();

    // Left and right sides: vertical outside strips.
    let vertical_sides = [
        (pos.min_x().checked_sub(1), pos.min_x()),
        (pos.max_x().checked_add(1), pos.max_x()),
    ];
    for (outside_x, inside_x) in vertical_sides {
        match outside_x {
            None => {
                // The plane ends here; the whole side counts as uncovered.
                let labels = frame.labels_line_vertical(inside_x, pos.min_y(), pos.max_y())?;
                mark_labels(bits, &labels);
            }
            Some(x) => {
                let strip = IRect::new(x, x, pos.min_y(), pos.max_y())?;
                for piece in strip.subtract_all(coverage) {
                    let labels =
                        frame.labels_line_vertical(inside_x, piece.min_y(), piece.max_y())?;
                    mark_labels(bits, &labels);
                }
            }
        }
    }

    // Top and bottom sides: horizontal outside strips.
    let horizontal_sides = [
        (pos.min_y().checked_sub(1), pos.min_y()),
        (pos.max_y().checked_add(1), pos.max_y()),
    ];
    for (outside_y, inside_y) in horizontal_sides {
        match outside_y {
            None => {
                let labels = frame.labels_line_horizontal(inside_y, pos.min_x(), pos.max_x())?;
                mark_labels(bits, &labels);
            }
            Some(y) => {
                let strip = IRect::new(pos.min_x(), pos.max_x(), y, y)?;
                for piece in strip.subtract_all(coverage) {
                    let labels =
                        frame.labels_line_horizontal(inside_y, piece.min_x(), piece.max_x())?;
                    mark_labels(bits, &labels);
                }
            }
        }
    }
    Ok(())
}

impl MapBuffer {
    /// Stitches a new frame against every stored frame sharing a boundary
    /// line with it. Runs once per added frame, before the frame lands in
    /// the window.
    pub(super) fn stitch_frame(&mut self, new_frame: &Frame) -> Result<()> {
        if self.frames.is_empty() {
            return Ok(());
        }
        self.pair_log.resolve_all_bases();
        let pos = new_frame.position();
        let threshold = self.stitch_cost_threshold;
        let mut pairs: Vec<(i32, i32, f64)> = Vec::new();

        for frame in &self.frames {
            let fpos = frame.position();

            // Neighbour on the left: its right column faces our left one.
            if fpos.max_x().checked_add(1) == Some(pos.min_x()) {
                let y0 = pos.min_y().max(fpos.min_y());
                let y1 = pos.max_y().min(fpos.max_y());
                if y0 <= y1 {
                    let new_line = self
                        .reindex_line(new_frame.labels_line_vertical(pos.min_x(), y0, y1)?);
                    let neighbour_line = self
                        .read_labels_line_reindexed(IRect::new(fpos.max_x(), fpos.max_x(), y0, y1)?)?;
                    link_boundary_lines(&mut pairs, &new_line, &neighbour_line, y0, threshold)?;
                }
            }
            // Neighbour on the right.
            if pos.max_x().checked_add(1) == Some(fpos.min_x()) {
                let y0 = pos.min_y().max(fpos.min_y());
                let y1 = pos.max_y().min(fpos.max_y());
                if y0 <= y1 {
                    let new_line = self
                        .reindex_line(new_frame.labels_line_vertical(pos.max_x(), y0, y1)?);
                    let neighbour_line = self
                        .read_labels_line_reindexed(IRect::new(fpos.min_x(), fpos.min_x(), y0, y1)?)?;
                    link_boundary_lines(&mut pairs, &new_line, &neighbour_line, y0, threshold)?;
                }
            }
            // Neighbour above.
            if fpos.max_y().checked_add(1) == Some(pos.min_y()) {
                let x0 = pos.min_x().max(fpos.min_x());
                let x1 = pos.max_x().min(fpos.max_x());
                if x0 <= x1 {
                    let new_line = self
                        .reindex_line(new_frame.labels_line_horizontal(pos.min_y(), x0, x1)?);
                    let neighbour_line = self
                        .read_labels_line_reindexed(IRect::new(x0, x1, fpos.max_y(), fpos.max_y())?)?;
                    link_boundary_lines(&mut pairs, &new_line, &neighbour_line, x0, threshold)?;
                }
            }
            // Neighbour below.
            if pos.max_y().checked_add(1) == Some(fpos.min_y()) {
                let x0 = pos.min_x().max(fpos.min_x());
                let x1 = pos.max_x().min(fpos.max_x());
                if x0 <= x1 {
                    let new_line = self
                        .reindex_line(new_frame.labels_line_horizontal(pos.max_y(), x0, x1)?);
                    let neighbour_line = self
                        .read_labels_line_reindexed(IRect::new(x0, x1, fpos.min_y(), fpos.min_y())?)?;
                    link_boundary_lines(&mut pairs, &new_line, &neighbour_line, x0, threshold)?;
                }
            }
        }

        let accepted = pairs.len();
        for (a, b, cost) in pairs {
            if a != b {
                trace!("stitched labels {} and {} at cost {}", a, b, cost);
                self.pair_log.add_pair(a, b)?;
            }
        }
        debug!(
            "stitch pass for frame at {:?}: {} links accepted, {} pairs logged",
            pos,
            accepted,
            self.pair_log.num_pairs()
        );
        Ok(())
    }

    fn reindex_line(&self, mut labels: Vec<i32>) -> Vec<i32> {
        for label in &mut labels {
            *label = self.pair_log.reindex(*label);
        }
        labels
    }

    /// Rebuilds the partial-object bit set over the stored frames plus the
    /// frame being added: a raw label is partial iff one of its pixels
    /// sits on a frame edge whose outward neighbour is uncovered. Frames
    /// added later internalise old edges, so the set is recomputed rather
    /// than patched.
    pub(super) fn recompute_partial_objects(&mut self, new_frame: &Frame) -> Result<()> {
        let coverage: Vec<IRect> = self
            .frames
            .iter()
            .map(|f| f.position())
            .chain(iter::once(new_frame.position()))
            .collect();
        let mut bits = BitVec::new();
        for frame in self.frames.iter().chain(iter::once(new_frame)) {
            mark_partial_edges(frame, &coverage, &mut bits)?;
        }
        self.raw_partial_objects = bits;
        Ok(())
    }

    /// Expansion rectangle for `joint_expansion == None`: grows to the
    /// position of every stored frame sharing a stitched object with the
    /// last frame, to fixpoint.
    fn expansion_to_stitched_objects(&self, last: &Frame) -> Result<IRect> {
        let mut included = vec![false; self.frames.len()];
        if let Some(index) = included.last_mut() {
            *index = true;
        }
        let mut bases = frame_bases(last, &self.pair_log)?;
        let mut rect = last.position();
        loop {
            let mut changed = false;
            for (index, frame) in self.frames.iter().enumerate() {
                if included[index] {
                    continue;
                }
                let frame_set = frame_bases(frame, &self.pair_log)?;
                if bits_intersect(&frame_set, &bases) {
                    included[index] = true;
                    rect = rect.bounding(&frame.position())?;
                    union_into(&mut bases, &frame_set);
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }
        Ok(rect)
    }

    /// Base labels appearing in stored-frame regions outside `expansion`;
    /// those objects continue past the jointed rectangle.
    fn bases_outside(&self, expansion: &IRect) -> Result<BitVec> {
        let mut bits = BitVec::new();
        for frame in &self.frames {
            let fpos = frame.position();
            for piece in fpos.subtract(expansion) {
                for y in piece.min_y()..=piece.max_y() {
                    let labels = frame.labels_line_horizontal(y, piece.min_x(), piece.max_x())?;
                    for label in labels {
                        if label > 0 {
                            set_bit(&mut bits, self.pair_log.reindex(label) as usize);
                        }
                    }
                }
            }
        }
        Ok(bits)
    }

    /// Reads the last frame expanded to `E`, with stitched labels, keeping
    /// completed objects and applying the too-large policy to the rest.
    pub fn read_last_frame_jointed(&mut self, options: &JointReadOptions) -> Result<JointedFrame> {
        if !self.stitch_labels {
            return Err(MapError::BadInput(
                "jointed read requires a buffer built with stitch_labels".into(),
            ));
        }
        let last = self.last_frame()?.clone();
        self.pair_log.resolve_all_bases();

        let expansion = match options.joint_expansion {
            Some((dx, dy)) => {
                let (dx, dy) = if options.expansion_in_percents {
                    match (
                        last.dim_x().checked_mul(dx),
                        last.dim_y().checked_mul(dy),
                    ) {
                        (Some(ex), Some(ey)) => (ex / 100, ey / 100),
                        _ => {
                            return Err(MapError::BadShape(format!(
                                "percent expansion ({}, {}) overflows",
                                dx, dy
                            )));
                        }
                    }
                } else {
                    (dx, dy)
                };
                if dx < 0 || dy < 0 {
                    return Err(MapError::BadInput(format!(
                        "joint expansion must be non-negative, got ({}, {})",
                        dx, dy
                    )));
                }
                last.position().dilate(dx, dy)?
            }
            None => self.expansion_to_stitched_objects(&last)?,
        };

        let rendered = self.read_matrix_reindexed(expansion, true)?;
        let matrix = match options.jointing_too_large_objects {
            JointingTooLargeObjects::RetainLastPart => rendered,
            JointingTooLargeObjects::Skip => {
                let completed = self.completed_objects_mask()?;
                let outside = self.bases_outside(&expansion)?;
                let suppressed = |base: i32| {
                    let index = base as usize;
                    (index < completed.len() && !completed[index])
                        || (index < outside.len() && outside[index])
                };
                suppress_objects(&rendered, suppressed)?
            }
        };

        let mut frame = Frame::new((expansion.min_x(), expansion.min_y()), matrix)?;
        if options.auto_crop {
            frame = crop_trailing_zeros(&frame)?;
        }
        let (px, py) = options.zero_padding;
        if px < 0 || py < 0 {
            return Err(MapError::BadInput(format!(
                "zero padding must be non-negative, got ({}, {})",
                px, py
            )));
        }
        if px > 0 || py > 0 {
            frame = frame.sub_frame_zero_extended(frame.position().dilate(px, py)?)?;
        }

        let restoring_table = if options.sequentially_reindex {
            let (reindexed, table) =
                frame.sequentially_reindex(options.zero_based_restoring_table)?;
            frame = reindexed;
            Some(table)
        } else {
            None
        };

        debug!(
            "jointed read of frame at {:?} produced {:?}",
            last.position(),
            frame.position()
        );
        Ok(JointedFrame {
            frame,
            restoring_table,
        })
    }
}

/// Zeroes every pixel (all channels) whose base label is suppressed.
fn suppress_objects(rendered: &Matrix, suppressed: impl Fn(i32) -> bool) -> Result<Matrix> {
    let ch0 = rendered.channel(0)?;
    let mut doomed: Vec<usize> = Vec::new();
    for index in 0..ch0.len() {
        let label = ch0.get_i64(index) as i32;
        if label > 0 && suppressed(label) {
            doomed.push(index);
        }
    }
    if doomed.is_empty() {
        return Ok(rendered.clone());
    }
    let mut channels: Vec<Samples> = rendered
        .channels()
        .iter()
        .map(|c| c.samples().clone())
        .collect();
    for samples in &mut channels {
        for &index in &doomed {
            samples.set_zero(index);
        }
    }
    Matrix::new(
        rendered.dim_x(),
        rendered.dim_y(),
        channels.into_iter().map(ChannelData::new).collect(),
    )
}

/// Trims trailing all-zero rows and columns, keeping at least one pixel.
fn crop_trailing_zeros(frame: &Frame) -> Result<Frame> {
    let matrix = frame.matrix();
    let mut last_x = 0;
    let mut last_y = 0;
    for y in 0..matrix.dim_y() {
        for x in 0..matrix.dim_x() {
            if !matrix.is_zero_pixel(x, y)? {
                last_x = last_x.max(x);
                last_y = last_y.max(y);
            }
        }
    }
    let pos = frame.position();
    let cropped = IRect::new(
        pos.min_x(),
        pos.min_x() + last_x,
        pos.min_y(),
        pos.min_y() + last_y,
    )?;
    frame.sub_frame_zero_extended(cropped)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stitching_buffer() -> MapBuffer {
        MapBuffer::builder(8)
            .with_stitch_labels(true)
            .with_auto_reindex(true)
            .with_zero_is_background(true)
            .build()
            .unwrap()
    }

    fn label_matrix(dim_x: i64, dim_y: i64, data: Vec<i32>) -> Matrix {
        Matrix::from_i32(dim_x, dim_y, data).unwrap()
    }

    /// Two 3x3 frames side by side carrying one horizontal bar that does
    /// not touch any outer edge of the pair.
    fn add_interior_bar(buffer: &mut MapBuffer) {
        buffer
            .add_frame(
                label_matrix(3, 3, vec![0, 0, 0, 0, 1, 1, 0, 0, 0]),
                (0, 0),
                None,
                false,
            )
            .unwrap();
        buffer
            .add_frame(
                label_matrix(3, 3, vec![0, 0, 0, 1, 1, 0, 0, 0, 0]),
                (3, 0),
                None,
                false,
            )
            .unwrap();
    }

    #[test]
    fn runs_reduce_to_centroids() {
        let runs = line_runs(&[0, 7, 7, 7, 0, 9, 0], 10);
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].label, 7);
        assert_eq!(runs[0].position, 12.0);
        assert_eq!(runs[0].length, 3);
        assert_eq!(runs[1].label, 9);
        assert_eq!(runs[1].position, 15.0);
    }

    #[test]
    fn adjacent_bars_are_stitched() {
        let mut buffer = stitching_buffer();
        add_interior_bar(&mut buffer);
        // First frame's bar kept label 1; second frame's piece became 2
        // and was stitched back to 1.
        assert_eq!(buffer.pair_log().num_pairs(), 1);
        let rect = IRect::new(0, 5, 1, 1).unwrap();
        let m = buffer.read_matrix_reindexed(rect, false).unwrap();
        let row: Vec<i64> = (0..6).map(|x| m.get_i64(0, x, 0).unwrap()).collect();
        assert_eq!(row, vec![0, 1, 1, 1, 1, 0]);
    }

    #[test]
    fn interior_object_is_complete() {
        let mut buffer = stitching_buffer();
        add_interior_bar(&mut buffer);
        let completed = buffer.completed_objects_mask().unwrap();
        assert!(completed.get(1).map(|b| *b).unwrap_or(true));
        assert!(!buffer.partial_objects_mask().get(1).map(|b| *b).unwrap_or(false));
    }

    #[test]
    fn edge_object_is_partial() {
        let mut buffer = stitching_buffer();
        // The bar touches the left outer edge of the covered area.
        buffer
            .add_frame(
                label_matrix(3, 3, vec![0, 0, 0, 1, 1, 0, 0, 0, 0]),
                (0, 0),
                None,
                false,
            )
            .unwrap();
        assert!(buffer.partial_objects_mask()[1]);
        let completed = buffer.completed_objects_mask().unwrap();
        assert!(!completed[1]);
    }

    #[test]
    fn covering_an_edge_completes_the_object() {
        let mut buffer = stitching_buffer();
        buffer
            .add_frame(
                label_matrix(3, 3, vec![0, 0, 0, 0, 1, 1, 0, 0, 0]),
                (0, 0),
                None,
                false,
            )
            .unwrap();
        // The bar reaches x=2, the right edge, still uncovered.
        assert!(buffer.partial_objects_mask()[1]);
        // A neighbour frame internalises that edge; its own piece stops
        // short of every uncovered edge.
        buffer
            .add_frame(
                label_matrix(3, 3, vec![0, 0, 0, 1, 0, 0, 0, 0, 0]),
                (3, 0),
                None,
                false,
            )
            .unwrap();
        let completed = buffer.completed_objects_mask().unwrap();
        assert!(completed[1]);
    }

    #[test]
    fn jointed_read_assembles_whole_object() {
        let mut buffer = stitching_buffer();
        add_interior_bar(&mut buffer);
        let options = JointReadOptions::default().with_expansion(3, 0);
        let jointed = buffer.read_last_frame_jointed(&options).unwrap();
        assert_eq!(jointed.frame.position(), IRect::new(0, 8, 0, 2).unwrap());
        let m = jointed.frame.matrix();
        let row: Vec<i64> = (0..9).map(|x| m.get_i64(0, x, 1).unwrap()).collect();
        assert_eq!(row, vec![0, 1, 1, 1, 1, 0, 0, 0, 0]);
    }

    #[test]
    fn automatic_expansion_covers_stitched_frames() {
        let mut buffer = stitching_buffer();
        add_interior_bar(&mut buffer);
        let jointed = buffer
            .read_last_frame_jointed(&JointReadOptions::default())
            .unwrap();
        assert_eq!(jointed.frame.position(), IRect::new(0, 5, 0, 2).unwrap());
    }

    #[test]
    fn skip_drops_partial_objects() {
        let mut buffer = stitching_buffer();
        // Object touching the uncovered left edge: partial.
        buffer
            .add_frame(
                label_matrix(3, 3, vec![0, 0, 0, 1, 1, 0, 0, 0, 0]),
                (0, 0),
                None,
                false,
            )
            .unwrap();
        let skip = buffer
            .read_last_frame_jointed(&JointReadOptions::default().with_expansion(0, 0))
            .unwrap();
        let m = skip.frame.matrix();
        for y in 0..3 {
            for x in 0..3 {
                assert_eq!(m.get_i64(0, x, y).unwrap(), 0);
            }
        }
        let retain = buffer
            .read_last_frame_jointed(
                &JointReadOptions::default()
                    .with_expansion(0, 0)
                    .with_jointing_too_large_objects(JointingTooLargeObjects::RetainLastPart),
            )
            .unwrap();
        assert_eq!(retain.frame.matrix().get_i64(0, 0, 1).unwrap(), 1);
    }

    #[test]
    fn object_beyond_expansion_is_too_large() {
        let mut buffer = stitching_buffer();
        add_interior_bar(&mut buffer);
        // Expansion covering only the last frame: the stitched bar
        // continues into the first frame, outside the rectangle.
        let jointed = buffer
            .read_last_frame_jointed(&JointReadOptions::default().with_expansion(0, 0))
            .unwrap();
        let m = jointed.frame.matrix();
        for y in 0..3 {
            for x in 0..3 {
                assert_eq!(m.get_i64(0, x, y).unwrap(), 0);
            }
        }
    }

    #[test]
    fn auto_crop_and_padding() {
        let mut buffer = stitching_buffer();
        add_interior_bar(&mut buffer);
        let options = JointReadOptions::default()
            .with_expansion(3, 0)
            .with_auto_crop(true)
            .with_zero_padding(1, 1);
        let jointed = buffer.read_last_frame_jointed(&options).unwrap();
        // Trailing zero columns 5..8 and row 2 are trimmed, then one
        // pixel of padding grows every side.
        assert_eq!(jointed.frame.position(), IRect::new(-1, 5, -1, 2).unwrap());
        let m = jointed.frame.matrix();
        assert_eq!(m.get_i64(0, 2, 2).unwrap(), 1);
        assert_eq!(m.get_i64(0, 0, 0).unwrap(), 0);
    }

    #[test]
    fn sequential_reindex_of_jointed_result() {
        let mut buffer = stitching_buffer();
        add_interior_bar(&mut buffer);
        let options = JointReadOptions::default()
            .with_expansion(3, 0)
            .with_sequentially_reindex(true)
            .with_zero_based_restoring_table(true);
        let jointed = buffer.read_last_frame_jointed(&options).unwrap();
        let table = jointed.restoring_table.unwrap();
        assert_eq!(table, vec![0, 1]);
        assert_eq!(jointed.frame.matrix().get_i64(0, 1, 1).unwrap(), 1);
    }

    #[test]
    fn jointed_read_needs_stitching() {
        let mut buffer = MapBuffer::builder(2).build().unwrap();
        buffer
            .add_frame(label_matrix(1, 1, vec![1]), (0, 0), None, false)
            .unwrap();
        assert!(matches!(
            buffer.read_last_frame_jointed(&JointReadOptions::default()),
            Err(MapError::BadInput(_))
        ));
    }
}
