//! Skyline bottom-left rectangle packer.
//!
//! The skyline is a list of horizontal segments covering the full canvas
//! width, each at the height of the tallest rectangle placed beneath it.
//! A new rectangle goes where its top edge ends up lowest, ties broken by
//! the leftmost position.

/// Requested rectangle; `id` is echoed back in the placement.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PackRect {
    pub id: usize,
    pub width: u32,
    pub height: u32,
}

/// Where a rectangle landed, in canvas pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Placement {
    pub id: usize,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Placement {
    pub fn overlaps(&self, other: &Placement) -> bool {
        self.x < other.x + other.width
            && other.x < self.x + self.width
            && self.y < other.y + other.height
            && other.y < self.y + self.height
    }
}

#[derive(Clone, Copy, Debug)]
struct Segment {
    x: u32,
    y: u32,
    width: u32,
}

pub struct SkylinePacker {
    width: u32,
    height: u32,
    skyline: Vec<Segment>,
}

impl SkylinePacker {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            skyline: vec![Segment { x: 0, y: 0, width }],
        }
    }

    /// Pack every rectangle, tallest first. `None` if any of them does not
    /// fit; the packer is then left in an unspecified state.
    pub fn pack_all(&mut self, rects: &[PackRect]) -> Option<Vec<Placement>> {
        let mut order: Vec<&PackRect> = rects.iter().collect();
        order.sort_by(|a, b| b.height.cmp(&a.height).then(b.width.cmp(&a.width)));

        let mut placed = Vec::with_capacity(rects.len());
        for rect in order {
            let (x, y) = self.insert(rect.width, rect.height)?;
            placed.push(Placement {
                id: rect.id,
                x,
                y,
                width: rect.width,
                height: rect.height,
            });
        }
        placed.sort_by_key(|p| p.id);
        Some(placed)
    }

    /// Place one rectangle, returning its top-left corner.
    pub fn insert(&mut self, width: u32, height: u32) -> Option<(u32, u32)> {
        if width == 0 || height == 0 || width > self.width || height > self.height {
            return None;
        }

        let mut best: Option<(usize, u32)> = None;
        for i in 0..self.skyline.len() {
            if let Some(y) = self.fit(i, width, height) {
                let better = match best {
                    None => true,
                    Some((_, best_y)) => y < best_y,
                };
                if better {
                    best = Some((i, y));
                }
            }
        }

        let (index, y) = best?;
        let x = self.skyline[index].x;
        self.raise(index, x, y + height, width);
        Some((x, y))
    }

    /// Lowest y at which a `width` x `height` rectangle can sit when its left
    /// edge is at segment `index`.
    fn fit(&self, index: usize, width: u32, height: u32) -> Option<u32> {
        let x = self.skyline[index].x;
        if x + width > self.width {
            return None;
        }

        let mut y = 0;
        let mut remaining = width;
        for seg in &self.skyline[index..] {
            y = y.max(seg.y);
            if y + height > self.height {
                return None;
            }
            if seg.width >= remaining {
                return Some(y);
            }
            remaining -= seg.width;
        }
        None
    }

    /// Insert a new segment and trim whatever it now covers.
    fn raise(&mut self, index: usize, x: u32, y: u32, width: u32) {
        self.skyline.insert(index, Segment { x, y, width });

        let end = x + width;
        let next = index + 1;
        while next < self.skyline.len() {
            let Segment { x: seg_x, width: seg_width, .. } = self.skyline[next];
            if seg_x >= end {
                break;
            }
            let covered = end - seg_x;
            if seg_width <= covered {
                self.skyline.remove(next);
            } else {
                self.skyline[next].x += covered;
                self.skyline[next].width -= covered;
                break;
            }
        }

        // Merge neighbours at the same height.
        let mut j = 0;
        while j + 1 < self.skyline.len() {
            if self.skyline[j].y == self.skyline[j + 1].y {
                self.skyline[j].width += self.skyline[j + 1].width;
                self.skyline.remove(j + 1);
            } else {
                j += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rects(sizes: &[(u32, u32)]) -> Vec<PackRect> {
        sizes
            .iter()
            .enumerate()
            .map(|(id, &(width, height))| PackRect { id, width, height })
            .collect()
    }

    fn assert_disjoint_and_inside(placed: &[Placement], size: u32) {
        for (i, a) in placed.iter().enumerate() {
            assert!(a.x + a.width <= size && a.y + a.height <= size, "{a:?}");
            for b in &placed[i + 1..] {
                assert!(!a.overlaps(b), "{a:?} overlaps {b:?}");
            }
        }
    }

    #[test]
    fn mixed_sizes_do_not_overlap() {
        let input = rects(&[
            (64, 64),
            (32, 128),
            (128, 16),
            (16, 16),
            (64, 32),
            (8, 200),
            (100, 50),
            (40, 40),
            (40, 40),
            (256, 8),
        ]);
        let mut packer = SkylinePacker::new(256, 256);
        let placed = packer.pack_all(&input).expect("fits");
        assert_eq!(placed.len(), input.len());
        for (p, r) in placed.iter().zip(&input) {
            assert_eq!((p.id, p.width, p.height), (r.id, r.width, r.height));
        }
        assert_disjoint_and_inside(&placed, 256);
    }

    #[test]
    fn exact_fill() {
        let input = rects(&[(32, 32); 16]);
        let mut packer = SkylinePacker::new(128, 128);
        let placed = packer.pack_all(&input).expect("16 tiles fill the canvas");
        assert_disjoint_and_inside(&placed, 128);
        assert!(packer.insert(1, 1).is_none());
    }

    #[test]
    fn first_rect_goes_top_left() {
        let mut packer = SkylinePacker::new(64, 64);
        assert_eq!(packer.insert(10, 20), Some((0, 0)));
        assert_eq!(packer.insert(10, 10), Some((10, 0)));
        // Lowest spot now sits to the right of both.
        assert_eq!(packer.insert(44, 5), Some((20, 0)));
    }

    #[test]
    fn oversized_rect_is_rejected() {
        let mut packer = SkylinePacker::new(64, 64);
        assert!(packer.insert(65, 1).is_none());
        assert!(packer.insert(0, 4).is_none());
        let input = rects(&[(64, 40), (64, 40)]);
        assert!(SkylinePacker::new(64, 64).pack_all(&input).is_none());
    }
}
