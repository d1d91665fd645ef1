//! PNG line chart of observed cases followed by the forecast.

use std::io::Cursor;

use chrono::{Datelike, NaiveDate, Weekday};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};

use crate::ml::ForecastPoint;

pub mod colors {
    use image::Rgb;

    pub const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
    pub const BLACK: Rgb<u8> = Rgb([0, 0, 0]);
    pub const GRID: Rgb<u8> = Rgb([225, 225, 225]);
    pub const GRAY: Rgb<u8> = Rgb([128, 128, 128]);
    pub const BLUE: Rgb<u8> = Rgb([31, 119, 180]);
    pub const RED: Rgb<u8> = Rgb([214, 39, 40]);
}

#[derive(Debug, Clone)]
pub struct ChartConfig {
    pub width: u32,
    pub height: u32,
    pub margin_left: u32,
    pub margin_right: u32,
    pub margin_top: u32,
    pub margin_bottom: u32,
    pub line_width: u32,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            width: 1000,
            height: 500,
            margin_left: 60,
            margin_right: 20,
            margin_top: 20,
            margin_bottom: 50,
            line_width: 2,
        }
    }
}

/// Maps dates and values onto pixel coordinates inside the plot area.
struct Frame {
    x0: f64,
    x1: f64,
    y0: f64,
    y1: f64,
    start: NaiveDate,
    days: f64,
    min: f64,
    max: f64,
}

impl Frame {
    fn x(&self, date: NaiveDate) -> f64 {
        let t = (date - self.start).num_days() as f64 / self.days;
        self.x0 + t * (self.x1 - self.x0)
    }

    fn y(&self, value: f64) -> f64 {
        let t = (value - self.min) / (self.max - self.min);
        self.y1 - t * (self.y1 - self.y0)
    }
}

pub struct ForecastChart {
    config: ChartConfig,
}

impl ForecastChart {
    pub fn new(config: ChartConfig) -> Self {
        Self { config }
    }

    /// Observed series in blue, forecast in red starting from the last
    /// observation, and a dashed marker where the forecast begins.
    pub fn render(&self, observed: &[(NaiveDate, f64)], forecast: &[ForecastPoint]) -> RgbImage {
        let cfg = &self.config;
        let mut img = RgbImage::from_pixel(cfg.width, cfg.height, colors::WHITE);

        let mut forecast_line: Vec<(NaiveDate, f64)> = Vec::with_capacity(forecast.len() + 1);
        if let Some(last) = observed.last() {
            forecast_line.push(*last);
        }
        forecast_line.extend(forecast.iter().map(|p| (p.date, p.value)));

        let all: Vec<(NaiveDate, f64)> = observed.iter().chain(&forecast_line).copied().collect();
        let Some(frame) = self.frame(&all) else {
            return img;
        };

        self.draw_grid(&mut img, &frame);

        let to_px = |(d, v): &(NaiveDate, f64)| (frame.x(*d), frame.y(*v));
        let observed_px: Vec<(f64, f64)> = observed.iter().map(to_px).collect();
        let forecast_px: Vec<(f64, f64)> = forecast_line.iter().map(to_px).collect();

        if let Some((date, _)) = observed.last() {
            draw_dashed_vertical(&mut img, frame.x(*date), frame.y0, frame.y1, colors::GRAY);
        }
        draw_polyline(&mut img, &observed_px, cfg.line_width, colors::BLUE);
        draw_polyline(&mut img, &forecast_px, cfg.line_width, colors::RED);

        self.draw_axes(&mut img, &frame);
        self.draw_legend(&mut img);
        img
    }

    pub fn render_png(
        &self,
        observed: &[(NaiveDate, f64)],
        forecast: &[ForecastPoint],
    ) -> Result<Vec<u8>, image::ImageError> {
        let img = self.render(observed, forecast);
        let mut bytes = Vec::new();
        DynamicImage::ImageRgb8(img).write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
        Ok(bytes)
    }

    fn frame(&self, points: &[(NaiveDate, f64)]) -> Option<Frame> {
        let start = points.iter().map(|(d, _)| *d).min()?;
        let end = points.iter().map(|(d, _)| *d).max()?;
        let max = points.iter().map(|(_, v)| *v).fold(f64::NEG_INFINITY, f64::max);
        let min = points.iter().map(|(_, v)| *v).fold(f64::INFINITY, f64::min).min(0.0);
        let max = if max > min { max + 0.05 * (max - min) } else { min + 1.0 };

        let cfg = &self.config;
        Some(Frame {
            x0: cfg.margin_left as f64,
            x1: (cfg.width - cfg.margin_right) as f64,
            y0: cfg.margin_top as f64,
            y1: (cfg.height - cfg.margin_bottom) as f64,
            start,
            days: ((end - start).num_days() as f64).max(1.0),
            min,
            max,
        })
    }

    fn draw_grid(&self, img: &mut RgbImage, frame: &Frame) {
        for i in 1..5 {
            let y = frame.y0 + (frame.y1 - frame.y0) * i as f64 / 5.0;
            draw_line(img, (frame.x0, y), (frame.x1, y), colors::GRID);
        }
    }

    fn draw_axes(&self, img: &mut RgbImage, frame: &Frame) {
        draw_line(img, (frame.x0, frame.y1), (frame.x1, frame.y1), colors::BLACK);
        draw_line(img, (frame.x0, frame.y0), (frame.x0, frame.y1), colors::BLACK);

        // weekly ticks on Sundays, thinned out for long ranges
        let total_weeks = (frame.days / 7.0).ceil() as usize + 1;
        let step = (total_weeks / 40).max(1);
        let offset = (7 - frame.start.weekday().num_days_from_sunday() as i64) % 7;
        let mut sunday = frame.start + chrono::Duration::days(offset);
        debug_assert_eq!(sunday.weekday(), Weekday::Sun);
        let mut n = 0usize;
        while frame.x(sunday) <= frame.x1 + 0.5 {
            if n % step == 0 {
                let x = frame.x(sunday);
                draw_line(img, (x, frame.y1), (x, frame.y1 + 6.0), colors::BLACK);
            }
            sunday += chrono::Duration::weeks(1);
            n += 1;
        }

        for i in 0..=5 {
            let y = frame.y0 + (frame.y1 - frame.y0) * i as f64 / 5.0;
            draw_line(img, (frame.x0 - 6.0, y), (frame.x0, y), colors::BLACK);
        }
    }

    fn draw_legend(&self, img: &mut RgbImage) {
        let x = self.config.margin_left + 12;
        let y = self.config.margin_top + 10;
        fill_rect(img, x, y, 24, 4, colors::BLUE);
        fill_rect(img, x, y + 12, 24, 4, colors::RED);
    }
}

impl Default for ForecastChart {
    fn default() -> Self {
        Self::new(ChartConfig::default())
    }
}

fn put(img: &mut RgbImage, x: i64, y: i64, color: Rgb<u8>) {
    if x >= 0 && y >= 0 && (x as u32) < img.width() && (y as u32) < img.height() {
        img.put_pixel(x as u32, y as u32, color);
    }
}

pub fn fill_rect(img: &mut RgbImage, x: u32, y: u32, width: u32, height: u32, color: Rgb<u8>) {
    for dy in 0..height {
        for dx in 0..width {
            put(img, (x + dx) as i64, (y + dy) as i64, color);
        }
    }
}

/// Bresenham line between two pixel positions.
pub fn draw_line(img: &mut RgbImage, from: (f64, f64), to: (f64, f64), color: Rgb<u8>) {
    let (mut x, mut y) = (from.0.round() as i64, from.1.round() as i64);
    let (x1, y1) = (to.0.round() as i64, to.1.round() as i64);
    let dx = (x1 - x).abs();
    let dy = -(y1 - y).abs();
    let sx = if x < x1 { 1 } else { -1 };
    let sy = if y < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        put(img, x, y, color);
        if x == x1 && y == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x += sx;
        }
        if e2 <= dx {
            err += dx;
            y += sy;
        }
    }
}

fn draw_polyline(img: &mut RgbImage, points: &[(f64, f64)], width: u32, color: Rgb<u8>) {
    let half = width as f64 / 2.0;
    for pair in points.windows(2) {
        for offset in 0..width.max(1) {
            let o = offset as f64 - half + 0.5;
            draw_line(img, (pair[0].0, pair[0].1 + o), (pair[1].0, pair[1].1 + o), color);
        }
    }
}

fn draw_dashed_vertical(img: &mut RgbImage, x: f64, y0: f64, y1: f64, color: Rgb<u8>) {
    let x = x.round() as i64;
    let (top, bottom) = (y0.round() as i64, y1.round() as i64);
    for y in top..=bottom {
        if (y - top) % 10 < 6 {
            put(img, x, y, color);
        }
    }
}
