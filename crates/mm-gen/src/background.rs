use std::collections::VecDeque;
use image::{Rgba, RgbaImage};
use crate::{GenError, Result};

/// Separates the product from its backdrop before image conditioning.
pub trait BackgroundRemover: Send {
    /// Returns a copy of `image` with background pixels made fully transparent.
    fn remove_background(&self, image: &RgbaImage) -> Result<RgbaImage>;
}

/// Keys out the region connected to the image border whose color stays
/// within `tolerance` of the mean border color.
#[derive(Debug, Clone, Copy)]
pub struct BorderKeyRemover {
    pub tolerance: u8,
}

impl Default for BorderKeyRemover {
    fn default() -> Self {
        Self { tolerance: 24 }
    }
}

impl BorderKeyRemover {
    pub fn new(tolerance: u8) -> Self {
        Self { tolerance }
    }

    fn border_key(image: &RgbaImage) -> [f32; 3] {
        let (w, h) = image.dimensions();
        let mut sum = [0f64; 3];
        let mut count = 0f64;
        for (x, y, px) in image.enumerate_pixels() {
            if x == 0 || y == 0 || x + 1 == w || y + 1 == h {
                for c in 0..3 {
                    sum[c] += f64::from(px[c]);
                }
                count += 1.0;
            }
        }
        sum.map(|s| (s / count) as f32)
    }

    fn matches(&self, key: [f32; 3], px: &Rgba<u8>) -> bool {
        (0..3).all(|c| (f32::from(px[c]) - key[c]).abs() <= f32::from(self.tolerance))
    }
}

impl BackgroundRemover for BorderKeyRemover {
    fn remove_background(&self, image: &RgbaImage) -> Result<RgbaImage> {
        let (w, h) = image.dimensions();
        if w == 0 || h == 0 {
            return Err(GenError::Background("image has no pixels".into()));
        }

        let key = Self::border_key(image);
        let index = |x: u32, y: u32| y as usize * w as usize + x as usize;
        let mut visited = vec![false; w as usize * h as usize];
        let mut queue = VecDeque::new();

        for x in 0..w {
            queue.push_back((x, 0));
            queue.push_back((x, h - 1));
        }
        for y in 0..h {
            queue.push_back((0, y));
            queue.push_back((w - 1, y));
        }

        let mut output = image.clone();
        let mut removed = 0usize;
        while let Some((x, y)) = queue.pop_front() {
            let i = index(x, y);
            if visited[i] {
                continue;
            }
            visited[i] = true;
            if !self.matches(key, image.get_pixel(x, y)) {
                continue;
            }

            output.get_pixel_mut(x, y)[3] = 0;
            removed += 1;

            if x > 0 {
                queue.push_back((x - 1, y));
            }
            if x + 1 < w {
                queue.push_back((x + 1, y));
            }
            if y > 0 {
                queue.push_back((x, y - 1));
            }
            if y + 1 < h {
                queue.push_back((x, y + 1));
            }
        }

        if removed == visited.len() {
            return Err(GenError::Background("no foreground object found".into()));
        }

        tracing::debug!("keyed out {} of {} pixels", removed, visited.len());
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn disc_on_backdrop(size: u32) -> RgbaImage {
        RgbaImage::from_fn(size, size, |x, y| {
            let dx = x as f32 - size as f32 / 2.0;
            let dy = y as f32 - size as f32 / 2.0;
            if (dx * dx + dy * dy).sqrt() < size as f32 / 4.0 {
                Rgba([220, 40, 40, 255])
            } else {
                Rgba([10, 10, 12, 255])
            }
        })
    }

    #[test]
    fn test_backdrop_becomes_transparent() {
        let out = BorderKeyRemover::default()
            .remove_background(&disc_on_backdrop(32))
            .unwrap();
        assert_eq!(out.get_pixel(0, 0)[3], 0);
        assert_eq!(out.get_pixel(31, 31)[3], 0);
        assert_eq!(*out.get_pixel(16, 16), Rgba([220, 40, 40, 255]));
    }

    #[test]
    fn test_enclosed_backdrop_colored_pixels_are_kept() {
        let mut image = disc_on_backdrop(32);
        // a hole inside the object that happens to match the backdrop
        image.put_pixel(16, 16, Rgba([10, 10, 12, 255]));
        let out = BorderKeyRemover::default().remove_background(&image).unwrap();
        assert_eq!(out.get_pixel(16, 16)[3], 255);
    }

    #[test]
    fn test_uniform_image_has_no_foreground() {
        let image = RgbaImage::from_pixel(8, 8, Rgba([5, 5, 5, 255]));
        assert!(matches!(
            BorderKeyRemover::default().remove_background(&image),
            Err(GenError::Background(_))
        ));
    }

    #[test]
    fn test_non_square_image_is_indexed_row_major() {
        let image = RgbaImage::from_fn(48, 16, |x, y| {
            if (20..28).contains(&x) && (4..12).contains(&y) {
                Rgba([40, 200, 40, 255])
            } else {
                Rgba([10, 10, 12, 255])
            }
        });
        let out = BorderKeyRemover::default().remove_background(&image).unwrap();
        assert_eq!(out.dimensions(), (48, 16));
        assert_eq!(out.get_pixel(47, 15)[3], 0);
        assert_eq!(out.get_pixel(2, 8)[3], 0);
        assert_eq!(out.get_pixel(24, 8)[3], 255);
    }

    #[test]
    fn test_empty_image_is_rejected() {
        assert!(BorderKeyRemover::default().remove_background(&RgbaImage::new(0, 0)).is_err());
    }
}
