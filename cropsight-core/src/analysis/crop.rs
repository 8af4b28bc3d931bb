use ndarray::prelude::*;

use crate::{
    analysis::bbox::{Bbox, CenterBox},
    consts::CROP_CONTEXT_SCALE,
    error::{CropsightError, EmptyCropSnafu},
};

/// Which extent of a detection sizes its classifier crop.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum CropBasis {
    /// Square window sized from the detection height alone.
    #[default]
    Height,
    /// Square window sized from the longer side of the detection.
    LongestSide,
}

/// Crop policy used when planning classifier inputs.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CropPolicy {
    pub basis: CropBasis,
    /// Crop side as a multiple of the basis extent.
    pub scale: f32,
}

impl Default for CropPolicy {
    fn default() -> Self {
        Self {
            basis: CropBasis::Height,
            scale: CROP_CONTEXT_SCALE,
        }
    }
}

/// Integer crop window in image pixels, `torchvision`-style `(top, left, height, width)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CropRegion {
    pub top: i32,
    pub left: i32,
    pub height: i32,
    pub width: i32,
}

impl CropRegion {
    /// Plans the context window around a detection.
    ///
    /// The window starts one basis extent above the box and one basis extent
    /// plus half the box width to its left, and spans `scale` basis extents in
    /// both directions. Negative origins are moved to zero and the extent is
    /// shrunk so the window ends inside the image. A box larger than the image
    /// can still produce a non-positive height or width.
    ///
    /// # Example
    /// ```
    /// use cropsight_core::analysis::bbox::Bbox;
    /// use cropsight_core::analysis::crop::{CropPolicy, CropRegion};
    /// let bbox = Bbox::from_xyxy(40.0, 50.0, 60.0, 60.0);
    /// let region = CropRegion::plan(&bbox, &bbox.to_center_box(), 200, 200, &CropPolicy::default());
    /// assert_eq!((region.top, region.left, region.height, region.width), (40, 20, 30, 30));
    /// ```
    pub fn plan(
        bbox: &Bbox,
        center: &CenterBox,
        image_width: u32,
        image_height: u32,
        policy: &CropPolicy,
    ) -> Self {
        let extent = match policy.basis {
            CropBasis::Height => center.height(),
            CropBasis::LongestSide => center.height().max(center.width()),
        };

        let mut top = (bbox.min.y - extent) as i32;
        let mut left = (bbox.min.x - extent - center.width() / 2.0) as i32;
        let mut height = (extent * policy.scale) as i32;
        let mut width = (extent * policy.scale) as i32;

        let image_width = image_width as i32;
        let image_height = image_height as i32;

        if top < 0 {
            top = 0;
        }
        if left < 0 {
            left = 0;
        }
        if top + height > image_height {
            height = image_height - top;
        }
        if left + width > image_width {
            width = image_width - left;
        }

        Self {
            top,
            left,
            height,
            width,
        }
    }

    /// Whether the window covers at least one pixel.
    pub fn is_empty(&self) -> bool {
        self.height <= 0 || self.width <= 0
    }

    /// Views the window inside a `(channel, height, width)` tensor.
    pub fn crop_chw<'a>(
        &self,
        tensor: &'a Array3<f32>,
    ) -> Result<ArrayView3<'a, f32>, CropsightError> {
        let (_, height, width) = tensor.dim();
        if self.is_empty() || self.top as usize >= height || self.left as usize >= width {
            return EmptyCropSnafu {
                top: self.top,
                left: self.left,
                height: self.height,
                width: self.width,
            }
            .fail();
        }

        let top = self.top as usize;
        let left = self.left as usize;
        let bottom = (top + self.height as usize).min(height);
        let right = (left + self.width as usize).min(width);

        Ok(tensor.slice(s![.., top..bottom, left..right]))
    }
}
