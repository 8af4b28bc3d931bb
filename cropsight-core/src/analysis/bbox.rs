use glam::Vec2;
use serde::Serialize;

/// A 2D axis-aligned bounding box represented by minimum and maximum points.
///
/// Coordinates are image pixel coordinates: the origin is the top-left corner
/// and Y grows downward. `min <= max` on both axes is the producer's
/// responsibility and is not validated here.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Bbox {
    /// The minimum point of the bounding box (top-left corner).
    pub min: Vec2,
    /// The maximum point of the bounding box (bottom-right corner).
    pub max: Vec2,
}

/// Center/size representation of a detection, the `xywh` companion of [`Bbox`].
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct CenterBox {
    pub center: Vec2,
    pub size: Vec2,
}

impl CenterBox {
    pub fn new(center: Vec2, size: Vec2) -> Self {
        Self { center, size }
    }

    pub fn width(&self) -> f32 {
        self.size.x
    }

    pub fn height(&self) -> f32 {
        self.size.y
    }
}

/// Integer pixel rectangle obtained by truncating a [`Bbox`] toward zero.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PixelRect {
    pub x_min: i64,
    pub y_min: i64,
    pub x_max: i64,
    pub y_max: i64,
}

impl Bbox {
    /// Creates a new bounding box from minimum and maximum points.
    ///
    /// # Example
    /// ```
    /// use glam::Vec2;
    /// use cropsight_core::analysis::bbox::Bbox;
    /// let bbox = Bbox::new(Vec2::new(0.0, 0.0), Vec2::new(10.0, 5.0));
    /// assert_eq!(bbox.area(), 50.0);
    /// ```
    pub fn new(min: Vec2, max: Vec2) -> Self {
        Self { min, max }
    }

    /// Creates a bounding box from `x_min, y_min, x_max, y_max`.
    pub fn from_xyxy(x_min: f32, y_min: f32, x_max: f32, y_max: f32) -> Self {
        Self::new(Vec2::new(x_min, y_min), Vec2::new(x_max, y_max))
    }

    /// Creates a new bounding box from a center point and size vector.
    ///
    /// This constructor is commonly used with YOLO-style detection outputs where
    /// bounding boxes are represented as (center_x, center_y, width, height).
    ///
    /// # Example
    /// ```
    /// use glam::Vec2;
    /// use cropsight_core::analysis::bbox::Bbox;
    /// // Create a bbox centered at (100, 200) with size 50x80
    /// let bbox = Bbox::from_center_size(Vec2::new(100.0, 200.0), Vec2::new(50.0, 80.0));
    /// assert_eq!(bbox.min, Vec2::new(75.0, 160.0));
    /// assert_eq!(bbox.max, Vec2::new(125.0, 240.0));
    /// ```
    pub fn from_center_size(center: Vec2, size: Vec2) -> Self {
        let half_size = size / 2.0;
        Self {
            min: center - half_size,
            max: center + half_size,
        }
    }

    /// Calculates the area of the bounding box (width × height).
    pub fn area(&self) -> f32 {
        let length = self.max - self.min;

        length.x * length.y
    }

    /// Width and height of the box.
    pub fn size(&self) -> Vec2 {
        self.max - self.min
    }

    /// Calculates the center point of the bounding box.
    ///
    /// # Example
    /// ```
    /// use glam::Vec2;
    /// use cropsight_core::analysis::bbox::Bbox;
    /// let bbox = Bbox::new(Vec2::new(0.0, 0.0), Vec2::new(4.0, 2.0));
    /// assert_eq!(bbox.center(), Vec2::new(2.0, 1.0));
    /// ```
    pub fn center(&self) -> Vec2 {
        (self.min + self.max) / 2.0
    }

    /// The `xywh` view of this box.
    pub fn to_center_box(&self) -> CenterBox {
        CenterBox::new(self.center(), self.size())
    }

    /// Returns the intersection rectangle of two boxes.
    ///
    /// Boxes that merely touch along an edge still produce a (zero-area)
    /// region; `None` is returned only when the boxes are separated on at
    /// least one axis.
    ///
    /// # Example
    /// ```
    /// use glam::Vec2;
    /// use cropsight_core::analysis::bbox::Bbox;
    /// let a = Bbox::from_xyxy(0.0, 0.0, 10.0, 10.0);
    /// let b = Bbox::from_xyxy(5.0, 5.0, 15.0, 15.0);
    /// assert_eq!(a.overlap_region(&b), Some(Bbox::from_xyxy(5.0, 5.0, 10.0, 10.0)));
    /// assert_eq!(a.overlap_region(&Bbox::from_xyxy(20.0, 20.0, 30.0, 30.0)), None);
    /// ```
    pub fn overlap_region(&self, other: &Self) -> Option<Self> {
        let min = self.min.max(other.min);
        let max = self.max.min(other.max);

        if max.x < min.x || max.y < min.y {
            None
        } else {
            Some(Self { min, max })
        }
    }

    /// Calculates the area of intersection between this bounding box and another,
    /// or 0.0 if the boxes do not intersect.
    pub fn intersection(&self, other: &Self) -> f32 {
        self.overlap_region(other)
            .map(|region| region.area())
            .unwrap_or(0.0)
    }

    /// Calculates the Intersection over Union (IoU) between this bounding box and another.
    ///
    /// # Formula
    /// IoU = Intersection Area / Union Area
    /// Union Area = Area1 + Area2 - Intersection Area
    ///
    /// A union of zero (two zero-area boxes) yields 0.0.
    ///
    /// # Example
    /// ```
    /// use glam::Vec2;
    /// use cropsight_core::analysis::bbox::Bbox;
    /// let bbox1 = Bbox::new(Vec2::new(0.0, 0.0), Vec2::new(2.0, 2.0));
    /// let bbox2 = Bbox::new(Vec2::new(0.0, 0.0), Vec2::new(2.0, 2.0));
    /// assert_eq!(bbox1.iou(&bbox2), 1.0); // Identical boxes
    /// ```
    pub fn iou(&self, other: &Self) -> f32 {
        self.iou_with_region(other).0
    }

    /// IoU together with the overlap region it was computed from.
    pub fn iou_with_region(&self, other: &Self) -> (f32, Option<Self>) {
        let Some(region) = self.overlap_region(other) else {
            return (0.0, None);
        };

        let intersection_area = region.area();
        let union_area = self.area() + other.area() - intersection_area;

        let iou = if union_area > 0.0 {
            intersection_area / union_area
        } else {
            0.0
        };

        (iou, Some(region))
    }

    /// Clamps the bounding box coordinates to stay within the specified bounds.
    ///
    /// # Example
    /// ```
    /// use glam::Vec2;
    /// use cropsight_core::analysis::bbox::Bbox;
    /// let bbox = Bbox::new(Vec2::new(-10.0, -5.0), Vec2::new(1030.0, 1030.0));
    /// let clamped = bbox.clamp(Vec2::new(0.0, 0.0), Vec2::new(1023.0, 1023.0));
    /// assert_eq!(clamped.min, Vec2::new(0.0, 0.0));
    /// assert_eq!(clamped.max, Vec2::new(1023.0, 1023.0));
    /// ```
    pub fn clamp(&self, min_bounds: Vec2, max_bounds: Vec2) -> Self {
        Self {
            min: self.min.max(min_bounds).min(max_bounds),
            max: self.max.min(max_bounds).max(min_bounds),
        }
    }

    /// Undoes a letterbox transform: subtracts the padding offset then divides by the scale.
    pub fn unletterbox(&self, offset: Vec2, scale: f32) -> Self {
        Self {
            min: (self.min - offset) / scale,
            max: (self.max - offset) / scale,
        }
    }

    /// Truncates every coordinate toward zero, as pixel indexing does.
    pub fn to_pixels(&self) -> PixelRect {
        PixelRect {
            x_min: self.min.x as i64,
            y_min: self.min.y as i64,
            x_max: self.max.x as i64,
            y_max: self.max.y as i64,
        }
    }
}
