// src/map/frame.rs

//! Positioned frames: a matrix pinned at a rectangle of the plane.
//!
//! A [`Frame`] is an immutable value. Operations that "change" a frame
//! return a new one, sharing the underlying channel storage whenever the
//! pixels are untouched.

use crate::image::geom::IRect;
use crate::image::matrix::{ChannelData, Matrix};
use crate::labels::disjoint_set::MAX_LABEL;
use crate::utils::error::{MapError, Result};

/// A matrix placed on the plane with its left-top corner at a point.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    position: IRect,
    matrix: Matrix,
}

impl Frame {
    /// Pins `matrix` at `left_top`. The inclusive max corner is computed
    /// with overflow checking.
    pub fn new(left_top: (i64, i64), matrix: Matrix) -> Result<Frame> {
        let position = IRect::from_origin_and_sizes(
            left_top.0,
            left_top.1,
            matrix.dim_x(),
            matrix.dim_y(),
        )?;
        Ok(Frame { position, matrix })
    }

    pub fn position(&self) -> IRect {
        self.position
    }

    pub fn matrix(&self) -> &Matrix {
        &self.matrix
    }

    pub fn dim_x(&self) -> i64 {
        self.matrix.dim_x()
    }

    pub fn dim_y(&self) -> i64 {
        self.matrix.dim_y()
    }

    /// Frame over `rect` (plane coordinates) whose pixels outside this
    /// frame are zero. Cheap when `rect` equals the current position.
    pub fn sub_frame_zero_extended(&self, rect: IRect) -> Result<Frame> {
        if rect == self.position {
            return Ok(self.clone());
        }
        let dx = rect.min_x().checked_sub(self.position.min_x());
        let dy = rect.min_y().checked_sub(self.position.min_y());
        let (dx, dy) = match (dx, dy) {
            (Some(dx), Some(dy)) => (dx, dy),
            _ => {
                return Err(MapError::BadShape(format!(
                    "sub-frame {:?} too far from {:?}",
                    rect, self.position
                )));
            }
        };
        let matrix = self
            .matrix
            .sub_matrix_zero_extended(dx, dy, rect.size_x(), rect.size_y())?;
        Ok(Frame {
            position: rect,
            matrix,
        })
    }

    /// Largest label in channel 0. Requires an integer label channel;
    /// a value beyond the 31-bit label range (possible in an unsigned
    /// 32-bit channel) is `BadInput`.
    pub fn max_label(&self) -> Result<i32> {
        self.matrix.ensure_label_channel()?;
        let channel = self.matrix.channel(0)?;
        let mut max = i64::MIN;
        for index in 0..channel.len() {
            max = max.max(channel.get_i64(index));
        }
        if max > MAX_LABEL as i64 {
            return Err(MapError::BadInput(format!(
                "label {} outside [0, {}]",
                max, MAX_LABEL
            )));
        }
        Ok(max as i32)
    }

    /// Smallest label in channel 0; used to reject negative labels on
    /// entry when no base shift runs.
    pub fn min_label(&self) -> Result<i32> {
        self.matrix.ensure_label_channel()?;
        let channel = self.matrix.channel(0)?;
        let mut min = i64::MAX;
        for index in 0..channel.len() {
            min = min.min(channel.get_i64(index));
        }
        if min > MAX_LABEL as i64 {
            return Err(MapError::BadInput(format!(
                "label {} outside [0, {}]",
                min, MAX_LABEL
            )));
        }
        Ok(min as i32)
    }

    /// New frame whose channel 0 is shifted by `base`:
    /// `label == 0 && zero_is_background` stays 0, everything else becomes
    /// `label + base`. Negative labels are `BadInput`; a shifted label
    /// beyond the 31-bit range is `Exhausted`.
    pub fn add_indexing_base(&self, zero_is_background: bool, base: i32) -> Result<Frame> {
        self.matrix.ensure_label_channel()?;
        let channel = self.matrix.channel(0)?;
        let count = channel.len();
        let mut shifted = Vec::with_capacity(count);
        for index in 0..count {
            let label = channel.get_i64(index);
            shifted.push(shift_label(label, base, zero_is_background)?);
        }
        let matrix = self.matrix.with_channel(0, ChannelData::from_i32(shifted))?;
        Ok(Frame {
            position: self.position,
            matrix,
        })
    }

    /// The indexing base to adopt after this (already shifted) frame is
    /// added: `max(current, zero_is_background ? max_label : max_label + 1)`.
    /// Unchanged for an all-zero frame when zero is background.
    pub fn next_indexing_base(&self, current_base: i32, zero_is_background: bool) -> Result<i32> {
        next_base_from_max(self.max_label()?, current_base, zero_is_background)
    }

    /// Renumbers raw non-zero labels `1, 2, ...` in ascending order of
    /// their raw value, returning the reindexed frame and the restoring
    /// table mapping new labels back to raw ones. With
    /// `include_background` the table gains entry 0 mapping to 0.
    pub fn sequentially_reindex(&self, include_background: bool) -> Result<(Frame, Vec<i32>)> {
        self.matrix.ensure_label_channel()?;
        let channel = self.matrix.channel(0)?;
        let count = channel.len();

        // Pass 1: sorted distinct non-zero labels.
        let mut raw: Vec<i32> = Vec::new();
        for index in 0..count {
            let label = channel.get_i64(index);
            if label < 0 || label > MAX_LABEL as i64 {
                return Err(MapError::BadInput(format!(
                    "label {} outside [0, {}]",
                    label, MAX_LABEL
                )));
            }
            if label != 0 {
                raw.push(label as i32);
            }
        }
        raw.sort_unstable();
        raw.dedup();

        // Pass 2: rewrite through the rank of each raw label.
        let mut renumbered = Vec::with_capacity(count);
        for index in 0..count {
            let label = channel.get_i64(index) as i32;
            if label == 0 {
                renumbered.push(0);
            } else {
                let rank = raw.binary_search(&label).map_err(|_| {
                    MapError::Internal(format!("label {} vanished between passes", label))
                })?;
                renumbered.push(rank as i32 + 1);
            }
        }

        let mut restoring = Vec::with_capacity(raw.len() + 1);
        if include_background {
            restoring.push(0);
        }
        restoring.extend_from_slice(&raw);

        let matrix = self
            .matrix
            .with_channel(0, ChannelData::from_i32(renumbered))?;
        Ok((
            Frame {
                position: self.position,
                matrix,
            },
            restoring,
        ))
    }

    /// Channel-0 labels along the vertical line `x` for `y0..=y1`, in plane
    /// coordinates.
    pub fn labels_line_vertical(&self, x: i64, y0: i64, y1: i64) -> Result<Vec<i32>> {
        self.matrix.ensure_label_channel()?;
        if !self.position.contains(x, y0) || !self.position.contains(x, y1) {
            return Err(MapError::BadInput(format!(
                "line x={} y=[{}, {}] outside frame {:?}",
                x, y0, y1, self.position
            )));
        }
        let lx = x - self.position.min_x();
        let mut labels = Vec::with_capacity((y1 - y0 + 1) as usize);
        for y in y0..=y1 {
            labels.push(self.matrix.get_i64(0, lx, y - self.position.min_y())? as i32);
        }
        Ok(labels)
    }

    /// Channel-0 labels along the horizontal line `y` for `x0..=x1`, in
    /// plane coordinates.
    pub fn labels_line_horizontal(&self, y: i64, x0: i64, x1: i64) -> Result<Vec<i32>> {
        self.matrix.ensure_label_channel()?;
        if !self.position.contains(x0, y) || !self.position.contains(x1, y) {
            return Err(MapError::BadInput(format!(
                "line y={} x=[{}, {}] outside frame {:?}",
                y, x0, x1, self.position
            )));
        }
        let ly = y - self.position.min_y();
        let mut labels = Vec::with_capacity((x1 - x0 + 1) as usize);
        for x in x0..=x1 {
            labels.push(self.matrix.get_i64(0, x - self.position.min_x(), ly)? as i32);
        }
        Ok(labels)
    }
}

/// Next-base rule shared by [`Frame::next_indexing_base`] and the fused
/// add path, which tracks the post-shift maximum during its sweep.
pub(crate) fn next_base_from_max(
    max_shifted: i32,
    current_base: i32,
    zero_is_background: bool,
) -> Result<i32> {
    let candidate = if zero_is_background {
        max_shifted as i64
    } else {
        max_shifted as i64 + 1
    };
    if candidate > MAX_LABEL as i64 {
        return Err(MapError::Exhausted(format!(
            "next indexing base {} exceeds the label range",
            candidate
        )));
    }
    Ok(current_base.max(candidate.max(0) as i32))
}

/// Shared label-shift rule for the slow and fused add paths.
pub(crate) fn shift_label(label: i64, base: i32, zero_is_background: bool) -> Result<i32> {
    if label < 0 {
        return Err(MapError::BadInput(format!("negative label {}", label)));
    }
    if label == 0 && zero_is_background {
        return Ok(0);
    }
    let shifted = label + base as i64;
    if shifted > MAX_LABEL as i64 {
        return Err(MapError::Exhausted(format!(
            "label {} + base {} exceeds {}",
            label, base, MAX_LABEL
        )));
    }
    Ok(shifted as i32)
}
