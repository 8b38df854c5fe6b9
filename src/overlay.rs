//! Detection overlays and the information panel.
//!
//! Rendering always happens on a copy of the captured frame; the original
//! stays untouched for the next pipeline stage. Frames are packed RGB24
//! (see `crate::frame`), so overlay colors below are RGB triples.
//!
//! Glyph rendering needs a TTF font. One is looked up from the configured
//! path or a few common system locations; when none is found the overlay
//! still draws boxes and the panel background and warns once. Label text
//! and panel text simply stay empty in that case.

use std::path::{Path, PathBuf};

use ab_glyph::{FontVec, PxScale};
use anyhow::Result;
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;

use crate::detect::Detection;
use crate::frame::Frame;

/// Box colors cycled by class id.
const PALETTE: [[u8; 3]; 6] = [
    [0, 200, 80],
    [66, 135, 245],
    [240, 180, 20],
    [230, 70, 70],
    [170, 90, 220],
    [0, 190, 190],
];

const BOX_THICKNESS: i32 = 2;
const LABEL_HEIGHT: u32 = 16;
const PANEL_LEFT: u32 = 10;
const PANEL_TOP: u32 = 10;
const PANEL_RIGHT: u32 = 400;
const PANEL_BOTTOM: u32 = 150;
const TEXT_GREEN: Rgb<u8> = Rgb([0, 255, 0]);
const TEXT_WHITE: Rgb<u8> = Rgb([255, 255, 255]);
const TEXT_YELLOW: Rgb<u8> = Rgb([255, 255, 0]);

const FONT_FALLBACK_PATHS: [&str; 4] = [
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/liberation/LiberationSans-Regular.ttf",
];

#[derive(Clone, Debug, Default)]
pub struct OverlayStyle {
    /// Explicit TTF font path; system fallbacks are tried when unset.
    pub font_path: Option<PathBuf>,
}

/// Values shown in the information panel alongside the statistics.
#[derive(Clone, Copy, Debug, Default)]
pub struct PanelInfo {
    pub fps: f32,
    pub frame_count: u64,
    pub total_detections: u64,
    pub confidence_threshold: f32,
}

pub struct Overlay {
    font: Option<FontVec>,
}

impl Overlay {
    pub fn new(style: &OverlayStyle) -> Self {
        let font = load_font(style.font_path.as_deref());
        if font.is_none() {
            log::warn!("no overlay font found; boxes and panel render without text");
        }
        Self { font }
    }

    /// Render detections and (optionally) the info panel onto a copy of
    /// `frame`.
    pub fn render(
        &self,
        frame: &Frame,
        detections: &[&Detection],
        panel: Option<&PanelInfo>,
    ) -> Result<RgbImage> {
        let mut img = frame.to_rgb_image()?;
        for det in detections {
            self.draw_detection(&mut img, det);
        }
        if let Some(info) = panel {
            self.draw_panel(&mut img, info);
        }
        Ok(img)
    }

    fn draw_detection(&self, img: &mut RgbImage, det: &Detection) {
        let (w, h) = (img.width() as i32, img.height() as i32);
        let color = class_color(det.class_id);

        let x0 = (det.bbox.x as i32).clamp(0, w - 1);
        let y0 = (det.bbox.y as i32).clamp(0, h - 1);
        let x1 = ((det.bbox.x + det.bbox.w) as i32).clamp(x0 + 1, w);
        let y1 = ((det.bbox.y + det.bbox.h) as i32).clamp(y0 + 1, h);

        for inset in 0..BOX_THICKNESS {
            let bw = (x1 - x0) - 2 * inset;
            let bh = (y1 - y0) - 2 * inset;
            if bw <= 0 || bh <= 0 {
                break;
            }
            draw_hollow_rect_mut(
                img,
                Rect::at(x0 + inset, y0 + inset).of_size(bw as u32, bh as u32),
                color,
            );
        }

        if let Some(font) = &self.font {
            let label = format!("{} {:.2}", det.class_name, det.confidence);
            let chip_y = (y0 - LABEL_HEIGHT as i32).max(0);
            let chip_w = (label.len() as u32 * 8).min(img.width() - x0 as u32);
            draw_filled_rect_mut(
                img,
                Rect::at(x0, chip_y).of_size(chip_w.max(1), LABEL_HEIGHT),
                color,
            );
            draw_text_mut(
                img,
                Rgb([0, 0, 0]),
                x0 + 2,
                chip_y + 1,
                PxScale::from(14.0),
                font,
                &label,
            );
        }
    }

    fn draw_panel(&self, img: &mut RgbImage, info: &PanelInfo) {
        let x1 = PANEL_RIGHT.min(img.width());
        let y1 = PANEL_BOTTOM.min(img.height());
        if PANEL_LEFT >= x1 || PANEL_TOP >= y1 {
            return;
        }

        // 70% black blend, matching the classic semi-transparent HUD look.
        for y in PANEL_TOP..y1 {
            for x in PANEL_LEFT..x1 {
                let px = img.get_pixel_mut(x, y);
                for channel in px.0.iter_mut() {
                    *channel = (*channel as f32 * 0.3) as u8;
                }
            }
        }

        let Some(font) = &self.font else {
            return;
        };
        let scale = PxScale::from(15.0);
        let x = PANEL_LEFT as i32 + 10;
        let lines = [
            (format!("FPS: {:.1}", info.fps), TEXT_GREEN),
            (format!("Frame: {}", info.frame_count), TEXT_WHITE),
            (
                format!("Total detections: {}", info.total_detections),
                TEXT_WHITE,
            ),
            (
                format!("Threshold: {:.2}", info.confidence_threshold),
                TEXT_WHITE,
            ),
            ("q quit | s shot | r reset | +/- thr".to_string(), TEXT_YELLOW),
        ];
        for (i, (line, color)) in lines.iter().enumerate() {
            let y = PANEL_TOP as i32 + 10 + i as i32 * 22;
            draw_text_mut(img, *color, x, y, scale, font, line);
        }
    }
}

fn class_color(class_id: u32) -> Rgb<u8> {
    Rgb(PALETTE[class_id as usize % PALETTE.len()])
}

fn load_font(explicit: Option<&Path>) -> Option<FontVec> {
    let mut candidates: Vec<PathBuf> = Vec::new();
    if let Some(path) = explicit {
        candidates.push(path.to_path_buf());
    }
    candidates.extend(FONT_FALLBACK_PATHS.iter().map(PathBuf::from));

    for path in candidates {
        if let Ok(bytes) = std::fs::read(&path) {
            match FontVec::try_from_vec(bytes) {
                Ok(font) => {
                    log::debug!("overlay font loaded from {}", path.display());
                    return Some(font);
                }
                Err(err) => log::warn!("unusable font at {}: {}", path.display(), err),
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::BoundingBox;

    fn white_frame() -> Frame {
        Frame::from_rgb(vec![200u8; 640 * 480 * 3], 640, 480).unwrap()
    }

    fn det_at(x: f32, y: f32, w: f32, h: f32) -> Detection {
        Detection {
            class_id: 0,
            class_name: "person".to_string(),
            confidence: 0.9,
            bbox: BoundingBox::new(x, y, w, h),
        }
    }

    #[test]
    fn renders_on_a_copy() -> Result<()> {
        let overlay = Overlay::new(&OverlayStyle::default());
        let frame = white_frame();
        let before = frame.data.clone();
        let _ = overlay.render(&frame, &[&det_at(50.0, 50.0, 100.0, 80.0)], None)?;
        assert_eq!(frame.data, before);
        Ok(())
    }

    #[test]
    fn draws_box_edges_in_class_color() -> Result<()> {
        let overlay = Overlay::new(&OverlayStyle::default());
        let det = det_at(50.0, 50.0, 100.0, 80.0);
        let img = overlay.render(&white_frame(), &[&det], None)?;
        assert_eq!(img.get_pixel(50, 50).0, PALETTE[0]);
        assert_eq!(img.get_pixel(149, 129).0, PALETTE[0]);
        Ok(())
    }

    #[test]
    fn clamps_boxes_to_the_frame() -> Result<()> {
        let overlay = Overlay::new(&OverlayStyle::default());
        let det = det_at(600.0, 450.0, 500.0, 500.0);
        // Must not panic or write out of bounds.
        let img = overlay.render(&white_frame(), &[&det], None)?;
        assert_eq!(img.get_pixel(600, 450).0, PALETTE[0]);
        Ok(())
    }

    #[test]
    fn panel_darkens_its_region_only() -> Result<()> {
        let overlay = Overlay::new(&OverlayStyle::default());
        let info = PanelInfo {
            fps: 12.5,
            frame_count: 42,
            total_detections: 7,
            confidence_threshold: 0.5,
        };
        let img = overlay.render(&white_frame(), &[], Some(&info))?;
        // Bottom-right corner of the panel is away from any text line.
        assert_eq!(img.get_pixel(398, 148).0, [60, 60, 60]);
        // Outside the panel the frame is untouched.
        assert_eq!(img.get_pixel(500, 300).0, [200, 200, 200]);
        Ok(())
    }
}
