//! Renderable form of a prediction: the photo next to a top-k confidence chart.

use crate::record::PredictionRecord;
use image::{Rgb, RgbImage, imageops, imageops::FilterType};

pub const CARD_HEIGHT: u32 = 224;
const PANEL_WIDTH: u32 = 224;
const PADDING: u32 = 8;
const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
const BAR: Rgb<u8> = Rgb([127, 127, 127]);
const AXIS: Rgb<u8> = Rgb([64, 64, 64]);

/// Compose the prediction card persisted by the save policies.
pub fn render_prediction_card(record: &PredictionRecord) -> RgbImage {
    let photo = scale_to_height(record, CARD_HEIGHT);
    let width = photo.width() + PANEL_WIDTH;
    let mut card = RgbImage::from_pixel(width, CARD_HEIGHT, BACKGROUND);
    imageops::overlay(&mut card, &photo, 0, 0);
    draw_bars(&mut card, photo.width(), record);
    card
}

fn scale_to_height(record: &PredictionRecord, height: u32) -> RgbImage {
    let img = record.image();
    let (w, h) = (img.width().max(1), img.height().max(1));
    let width = ((w as u64 * height as u64) / h as u64).max(1) as u32;
    img.resize_exact(width, height, FilterType::Triangle).to_rgb8()
}

fn draw_bars(card: &mut RgbImage, x0: u32, record: &PredictionRecord) {
    let baseline = CARD_HEIGHT - PADDING;
    let usable_h = CARD_HEIGHT - 2 * PADDING;
    let left = x0 + PADDING;
    let usable_w = PANEL_WIDTH - 2 * PADDING;
    // At least one pixel column per bar; lower-ranked candidates past that are not drawn.
    let alternatives = record.alternatives();
    let alternatives = &alternatives[..alternatives.len().min(usable_w as usize)];

    for x in left..left + usable_w {
        card.put_pixel(x, baseline, AXIS);
    }
    if alternatives.is_empty() {
        return;
    }
    let slot = usable_w / alternatives.len() as u32;
    let bar_w = (slot * 3 / 4).max(1);
    for (i, alt) in alternatives.iter().enumerate() {
        let conf = if alt.confidence.is_finite() {
            alt.confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let bar_h = (conf * usable_h as f32).round() as u32;
        let bx = left + i as u32 * slot + (slot - bar_w) / 2;
        for y in baseline.saturating_sub(bar_h)..baseline {
            for x in bx..bx + bar_w {
                card.put_pixel(x, y, BAR);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::DynamicImage;

    fn record_top(w: u32, h: u32, scores: &[f32], k: usize) -> PredictionRecord {
        let labels: Vec<String> = (0..scores.len()).map(|i| format!("breed_{i}")).collect();
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(w, h, Rgb([10, 200, 10])));
        PredictionRecord::from_scores("dog.jpg", img, scores, &labels, k).unwrap()
    }

    fn record(w: u32, h: u32, scores: &[f32]) -> PredictionRecord {
        record_top(w, h, scores, 5)
    }

    #[test]
    fn card_keeps_aspect_and_adds_panel() {
        let card = render_prediction_card(&record(448, 224, &[0.7, 0.2, 0.1]));
        assert_eq!(card.height(), CARD_HEIGHT);
        assert_eq!(card.width(), 448 + PANEL_WIDTH);
        assert_eq!(card.get_pixel(10, 10), &Rgb([10, 200, 10]));
    }

    #[test]
    fn tallest_bar_belongs_to_top_label() {
        let card = render_prediction_card(&record(224, 224, &[0.9, 0.1]));
        let slot = (PANEL_WIDTH - 2 * PADDING) / 2;
        let first_bar_x = 224 + PADDING + slot / 2;
        let second_bar_x = first_bar_x + slot;
        let mid_y = CARD_HEIGHT / 2;
        assert_eq!(card.get_pixel(first_bar_x, mid_y), &BAR);
        assert_eq!(card.get_pixel(second_bar_x, mid_y), &BACKGROUND);
    }

    #[test]
    fn more_candidates_than_pixel_columns_still_render() {
        let scores: Vec<f32> = (0..300).map(|i| 1.0 - i as f32 / 300.0).collect();
        let rec = record_top(100, 224, &scores, 300);
        assert_eq!(rec.alternatives().len(), 300);
        let card = render_prediction_card(&rec);
        assert_eq!(card.width(), 100 + PANEL_WIDTH);
        let first_bar_x = 100 + PADDING;
        assert_eq!(card.get_pixel(first_bar_x, CARD_HEIGHT / 2), &BAR);
        let last_x = 100 + PANEL_WIDTH - PADDING - 1;
        assert_eq!(card.get_pixel(last_x, CARD_HEIGHT - PADDING), &AXIS);
    }
}
