use image::{Rgb, RgbImage};
use imageproc::{drawing::draw_filled_rect_mut, rect::Rect};
use ndarray::prelude::*;
use tracing::trace;

use crate::{
    analysis::bbox::{Bbox, CenterBox},
    consts::PROXIMITY_FACTOR,
};

/// Blackens the parts of neighbouring detections that do not overlap `boxes[target]`.
///
/// For every other box whose top-left corner lies within
/// `trunc(PROXIMITY_FACTOR * target_center.height)` of the target's on both
/// axes, the strips of that box outside its overlap with the target are set
/// to zero. A neighbour that is near but does not intersect the target is
/// blackened entirely. The target itself is never touched.
///
/// Rectangles are clipped to the image. Returns the number of neighbours that
/// were obscured.
pub fn obscure_neighbours(
    image: &mut RgbImage,
    boxes: &[Bbox],
    target: usize,
    target_center: &CenterBox,
) -> usize {
    let Some(specific) = boxes.get(target) else {
        return 0;
    };

    let gate = (target_center.height() * PROXIMITY_FACTOR).trunc();
    let mut obscured = 0;

    for (index, candidate) in boxes.iter().enumerate() {
        if index == target {
            continue;
        }

        let distance_x = (candidate.min.x - specific.min.x).abs();
        let distance_y = (candidate.min.y - specific.min.y).abs();
        if distance_x >= gate || distance_y >= gate {
            continue;
        }

        let (iou, region) = specific.iou_with_region(candidate);
        let cand = candidate.to_pixels();

        match region {
            Some(region) if iou > 0.0 => {
                let ovl = region.to_pixels();
                if cand.y_min < ovl.y_min {
                    blacken(image, cand.x_min, cand.y_min, cand.x_max, ovl.y_min);
                }
                if ovl.y_max < cand.y_max {
                    blacken(image, cand.x_min, ovl.y_max, cand.x_max, cand.y_max);
                }
                if cand.x_min < ovl.x_min {
                    blacken(image, cand.x_min, ovl.y_min, ovl.x_min, ovl.y_max);
                }
                if ovl.x_max < cand.x_max {
                    blacken(image, ovl.x_max, ovl.y_min, cand.x_max, ovl.y_max);
                }
            }
            _ => blacken(image, cand.x_min, cand.y_min, cand.x_max, cand.y_max),
        }

        trace!(index, iou, "obscured neighbour");
        obscured += 1;
    }

    obscured
}

/// Obscures the neighbours of `boxes[target]` and returns the whole image as a
/// `(channel, height, width)` tensor with values in `[0, 1]`.
pub fn obscure_non_intersection(
    image: &mut RgbImage,
    boxes: &[Bbox],
    target: usize,
    target_center: &CenterBox,
) -> Array3<f32> {
    obscure_neighbours(image, boxes, target, target_center);
    to_chw_tensor(image)
}

/// Zeroes `[x_min, x_max) × [y_min, y_max)` across all channels.
fn blacken(image: &mut RgbImage, x_min: i64, y_min: i64, x_max: i64, y_max: i64) {
    if x_max <= x_min || y_max <= y_min {
        return;
    }

    let rect = Rect::at(x_min as i32, y_min as i32)
        .of_size((x_max - x_min) as u32, (y_max - y_min) as u32);
    draw_filled_rect_mut(image, rect, Rgb([0, 0, 0]));
}

/// Converts an RGB image into a normalised `(channel, height, width)` tensor.
pub fn to_chw_tensor(image: &RgbImage) -> Array3<f32> {
    let mut tensor = Array3::zeros([3, image.height() as usize, image.width() as usize]);

    for (x, y, pixel) in image.enumerate_pixels() {
        let x = x as usize;
        let y = y as usize;
        let [r, g, b] = pixel.0;
        tensor[[0, y, x]] = r as f32 / 255.0;
        tensor[[1, y, x]] = g as f32 / 255.0;
        tensor[[2, y, x]] = b as f32 / 255.0;
    }

    tensor
}

/// Converts a `(channel, height, width)` tensor in `[0, 1]` back into an RGB image.
///
/// Values are scaled by 255 and truncated, saturating outside `[0, 255]`.
pub fn chw_to_image(tensor: ArrayView3<f32>) -> RgbImage {
    let (_, height, width) = tensor.dim();

    RgbImage::from_fn(width as u32, height as u32, |x, y| {
        let x = x as usize;
        let y = y as usize;
        Rgb([
            (tensor[[0, y, x]] * 255.0) as u8,
            (tensor[[1, y, x]] * 255.0) as u8,
            (tensor[[2, y, x]] * 255.0) as u8,
        ])
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
    const BLACK: Rgb<u8> = Rgb([0, 0, 0]);

    fn white(width: u32, height: u32) -> RgbImage {
        RgbImage::from_pixel(width, height, WHITE)
    }

    fn black_pixels(image: &RgbImage) -> usize {
        image.pixels().filter(|p| **p == BLACK).count()
    }

    fn is_black(image: &RgbImage, x0: u32, y0: u32, x1: u32, y1: u32) -> bool {
        (y0..y1).all(|y| (x0..x1).all(|x| *image.get_pixel(x, y) == BLACK))
    }

    #[test]
    fn test_target_alone_is_untouched() {
        let mut image = white(50, 50);
        let boxes = [Bbox::from_xyxy(10.0, 10.0, 30.0, 30.0)];

        let obscured = obscure_neighbours(&mut image, &boxes, 0, &boxes[0].to_center_box());
        assert_eq!(obscured, 0);
        assert_eq!(black_pixels(&image), 0);
    }

    #[test]
    fn test_identical_duplicate_is_untouched() {
        // A duplicate of the target overlaps it completely, nothing lies outside
        let mut image = white(50, 50);
        let target = Bbox::from_xyxy(10.0, 10.0, 30.0, 30.0);
        let boxes = [target, target];

        obscure_neighbours(&mut image, &boxes, 0, &target.to_center_box());
        assert_eq!(black_pixels(&image), 0);
    }

    #[test]
    fn test_disjoint_neighbour_in_gate_is_fully_blackened() {
        // Same row, separated horizontally: gate = 2 * 10 = 20
        let mut image = white(60, 40);
        let target = Bbox::from_xyxy(10.0, 10.0, 20.0, 20.0);
        let neighbour = Bbox::from_xyxy(25.0, 10.0, 28.0, 20.0);
        let boxes = [target, neighbour];

        let obscured = obscure_neighbours(&mut image, &boxes, 0, &target.to_center_box());
        assert_eq!(obscured, 1);
        assert!(is_black(&image, 25, 10, 28, 20));
        assert_eq!(black_pixels(&image), 3 * 10);
    }

    #[test]
    fn test_distant_neighbour_outside_gate_is_kept() {
        let mut image = white(100, 100);
        let target = Bbox::from_xyxy(10.0, 10.0, 20.0, 20.0);
        // dx = 20 is not below the gate of 20
        let neighbour = Bbox::from_xyxy(30.0, 10.0, 40.0, 20.0);
        let boxes = [target, neighbour];

        let obscured = obscure_neighbours(&mut image, &boxes, 0, &target.to_center_box());
        assert_eq!(obscured, 0);
        assert_eq!(black_pixels(&image), 0);
    }

    #[test]
    fn test_overlapping_neighbour_keeps_intersection() {
        let mut image = white(60, 60);
        let target = Bbox::from_xyxy(10.0, 10.0, 30.0, 30.0);
        let neighbour = Bbox::from_xyxy(20.0, 20.0, 40.0, 40.0);
        let boxes = [target, neighbour];

        obscure_neighbours(&mut image, &boxes, 0, &target.to_center_box());

        // overlap (20,20)-(30,30) stays visible
        assert!((20..30).all(|y| (20..30).all(|x| *image.get_pixel(x, y) == WHITE)));
        // bottom strip of the neighbour below the overlap
        assert!(is_black(&image, 20, 30, 40, 40));
        // right strip beside the overlap
        assert!(is_black(&image, 30, 20, 40, 30));
        // target area outside the neighbour is untouched
        assert!((10..20).all(|y| (10..30).all(|x| *image.get_pixel(x, y) == WHITE)));
        assert_eq!(black_pixels(&image), 20 * 10 + 10 * 10);
    }

    #[test]
    fn test_neighbour_enclosing_target_gets_all_four_strips() {
        let mut image = white(40, 40);
        let target = Bbox::from_xyxy(10.0, 10.0, 20.0, 20.0);
        let neighbour = Bbox::from_xyxy(5.0, 5.0, 25.0, 25.0);
        let boxes = [target, neighbour];

        obscure_neighbours(&mut image, &boxes, 0, &target.to_center_box());

        assert!(is_black(&image, 5, 5, 25, 10));
        assert!(is_black(&image, 5, 20, 25, 25));
        assert!(is_black(&image, 5, 10, 10, 20));
        assert!(is_black(&image, 20, 10, 25, 20));
        assert!((10..20).all(|y| (10..20).all(|x| *image.get_pixel(x, y) == WHITE)));
        assert_eq!(black_pixels(&image), 20 * 20 - 10 * 10);
    }

    #[test]
    fn test_rectangles_are_clipped_to_image() {
        let mut image = white(30, 30);
        let target = Bbox::from_xyxy(10.0, 10.0, 20.0, 20.0);
        let neighbour = Bbox::from_xyxy(25.0, 10.0, 45.0, 20.0);
        let boxes = [target, neighbour];

        obscure_neighbours(&mut image, &boxes, 0, &target.to_center_box());
        assert!(is_black(&image, 25, 10, 30, 20));
        assert_eq!(black_pixels(&image), 5 * 10);
    }

    #[test]
    fn test_out_of_range_target_is_noop() {
        let mut image = white(10, 10);
        let boxes = [Bbox::from_xyxy(0.0, 0.0, 5.0, 5.0)];
        assert_eq!(
            obscure_neighbours(&mut image, &boxes, 3, &boxes[0].to_center_box()),
            0
        );
    }

    #[test]
    fn test_tensor_layout_and_range() {
        let mut image = RgbImage::new(4, 2);
        image.put_pixel(3, 1, Rgb([255, 0, 51]));

        let tensor = to_chw_tensor(&image);
        assert_eq!(tensor.dim(), (3, 2, 4));
        assert_eq!(tensor[[0, 1, 3]], 1.0);
        assert_eq!(tensor[[1, 1, 3]], 0.0);
        assert!((tensor[[2, 1, 3]] - 0.2).abs() < 1e-6);
        assert!(tensor.iter().all(|v| (0.0..=1.0).contains(v)));

        let restored = chw_to_image(tensor.view());
        assert_eq!(restored.dimensions(), (4, 2));
        assert_eq!(restored.get_pixel(3, 1)[0], 255);
        assert_eq!(restored.get_pixel(0, 0), &Rgb([0, 0, 0]));
    }

    #[test]
    fn test_obscure_non_intersection_returns_full_frame() {
        let mut image = white(60, 40);
        let target = Bbox::from_xyxy(10.0, 10.0, 20.0, 20.0);
        let neighbour = Bbox::from_xyxy(25.0, 10.0, 28.0, 20.0);
        let boxes = [target, neighbour];

        let tensor = obscure_non_intersection(&mut image, &boxes, 0, &target.to_center_box());
        assert_eq!(tensor.dim(), (3, 40, 60));
        assert_eq!(tensor[[0, 15, 26]], 0.0);
        assert_eq!(tensor[[0, 15, 15]], 1.0);
    }
}
