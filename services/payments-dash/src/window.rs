// services/payments-dash/src/window.rs
//
// Row virtualization: which slice of a long table to actually render

use std::ops::Range;

/// One rendered row and where it sits in the full scrollable area.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VirtualItem {
    pub index: usize,
    pub start: u64,
    pub size: u64,
}

/// The window of rows to render for a given scroll position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualWindow {
    pub range: Range<usize>,
    /// Rows intersecting the viewport, without overscan
    pub visible: Range<usize>,
    pub total_size: u64,
    pub scroll_offset: u64,
    row_height: u64,
}

impl VirtualWindow {
    /// Rows intersecting `[scroll_offset, scroll_offset + viewport)`, widened by
    /// `overscan` on each side and clipped to `[0, count)`.
    pub fn compute(
        count: usize,
        scroll_offset: u64,
        viewport: u64,
        row_height: u64,
        overscan: usize,
    ) -> Self {
        let row_height = row_height.max(1);
        let total_size = count as u64 * row_height;
        let scroll_offset = clamp_scroll(scroll_offset, total_size, viewport);

        if count == 0 {
            return Self {
                range: 0..0,
                visible: 0..0,
                total_size,
                scroll_offset,
                row_height,
            };
        }

        let first = ((scroll_offset / row_height) as usize).min(count);
        let last = (scroll_offset + viewport).div_ceil(row_height) as usize;
        let visible = first..last.clamp(first, count);

        let start = visible.start.saturating_sub(overscan);
        let end = visible.end.saturating_add(overscan).min(count);

        Self {
            range: start..end,
            visible,
            total_size,
            scroll_offset,
            row_height,
        }
    }

    pub fn items(&self) -> impl Iterator<Item = VirtualItem> + '_ {
        self.range.clone().map(move |index| VirtualItem {
            index,
            start: index as u64 * self.row_height,
            size: self.row_height,
        })
    }

    pub fn len(&self) -> usize {
        self.range.len()
    }

    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }

    /// Rows of overscan rendered above the first visible row.
    pub fn leading_overscan(&self) -> usize {
        self.visible.start - self.range.start
    }
}

/// Largest valid scroll offset is `total - viewport`.
pub fn clamp_scroll(scroll_offset: u64, total_size: u64, viewport: u64) -> u64 {
    scroll_offset.min(total_size.saturating_sub(viewport))
}
