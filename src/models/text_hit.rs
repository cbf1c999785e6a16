use serde::{Deserialize, Serialize};

/// Match rectangle in PDF points, origin at the page's top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HitRect {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl HitRect {
    pub fn scaled(&self, scale: f64) -> HitRect {
        let s = scale as f32;
        HitRect {
            left: self.left * s,
            top: self.top * s,
            right: self.right * s,
            bottom: self.bottom * s,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextHit {
    pub page_index: usize,
    pub rects: Vec<HitRect>,
}

impl TextHit {
    /// Rectangles mapped into the pixel space of a page rendered at `scale`.
    pub fn scaled(&self, scale: f64) -> Vec<HitRect> {
        self.rects.iter().map(|r| r.scaled(scale)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scaled_rects_follow_render_scale() {
        let hit = TextHit {
            page_index: 0,
            rects: vec![HitRect {
                left: 100.0,
                top: 40.0,
                right: 180.0,
                bottom: 60.0,
            }],
        };

        let scaled = hit.scaled(0.5);
        assert_eq!(
            scaled,
            vec![HitRect {
                left: 50.0,
                top: 20.0,
                right: 90.0,
                bottom: 30.0,
            }]
        );
        assert_eq!(hit.rects[0].left, 100.0);
    }
}
