//! Scale calculator: fit a source size into the target box, keeping aspect.
//!
//! Both rules pick the axis with the larger scale factor (the tighter axis)
//! and divide both sides by that factor. When the factors are equal the
//! height branch is taken. Vector and raster assets go through the same
//! [`ScaleMode`], so the two paths can never disagree on a tie.
//!
//! | Rule | Factor | 2000×1000 into 600×300 |
//! |------|--------|------------------------|
//! | [`fit`] (whole factor) | `floor(src / target)`, at least 1 | 666×333 |
//! | [`fit_exact`] | exact ratio, never below 1 | 600×300 |

use crate::config::ScaleMode;

/// Bounding box every asset of a run is fitted into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetBox {
    pub width: u32,
    pub height: u32,
}

impl TargetBox {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl ScaleMode {
    /// Output dimensions for a `source_w`×`source_h` asset.
    pub fn fit(self, source_w: u32, source_h: u32, target: TargetBox) -> (u32, u32) {
        match self {
            ScaleMode::WholeFactor => fit(source_w, source_h, target.width, target.height),
            ScaleMode::Exact => fit_exact(source_w, source_h, target.width, target.height),
        }
    }
}

/// Whole-factor fit.
///
/// `factor_x = floor(source_w / target_w)`, `factor_y = floor(source_h / target_h)`,
/// each clamped to at least 1 (a zero target axis yields 1). Both sides are
/// divided by `factor_x` when it is strictly larger, otherwise by `factor_y`.
pub fn fit(source_w: u32, source_h: u32, target_w: u32, target_h: u32) -> (u32, u32) {
    let factor_x = source_w.checked_div(target_w).unwrap_or(1).max(1);
    let factor_y = source_h.checked_div(target_h).unwrap_or(1).max(1);

    let factor = if factor_x > factor_y {
        factor_x
    } else {
        factor_y
    };

    (shrink(source_w, factor), shrink(source_h, factor))
}

/// Exact-ratio fit.
///
/// The binding axis lands exactly on the target and the other axis is
/// truncated. Sources already inside the box are returned unchanged, and a
/// zero target axis never binds.
pub fn fit_exact(source_w: u32, source_h: u32, target_w: u32, target_h: u32) -> (u32, u32) {
    if source_w == 0 || source_h == 0 {
        return (source_w, source_h);
    }

    let fits_w = target_w == 0 || source_w <= target_w;
    let fits_h = target_h == 0 || source_h <= target_h;
    if fits_w && fits_h {
        return (source_w, source_h);
    }

    let (sw, sh, tw, th) = (
        source_w as u64,
        source_h as u64,
        target_w as u64,
        target_h as u64,
    );

    // factor_x > factor_y  ⇔  sw/tw > sh/th  ⇔  sw·th > sh·tw
    let x_binds = match (target_w, target_h) {
        (0, _) => false,
        (_, 0) => true,
        _ => sw * th > sh * tw,
    };

    if x_binds {
        (target_w, ((sh * tw / sw) as u32).max(1))
    } else {
        (((sw * th / sh) as u32).max(1), target_h)
    }
}

fn shrink(side: u32, factor: u32) -> u32 {
    if side == 0 {
        0
    } else {
        (side / factor).max(1)
    }
}
