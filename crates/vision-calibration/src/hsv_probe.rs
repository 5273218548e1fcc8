use anyhow::{bail, Context};
use clap::Parser;
use std::path::PathBuf;
use vision_core::{logging, source::load_color};
use vision_detection::color::{HueRange, HUE_LIMIT};
use vision_detection::Frame;

/// Prints the HSV value under a pixel and a range that would select it.
#[derive(Debug, Parser)]
#[command(name = "hsv_probe")]
struct Args {
    /// Image to sample
    image: PathBuf,

    #[arg(short)]
    x: u32,

    #[arg(short)]
    y: u32,

    /// Side of the square averaged around (x, y)
    #[arg(long, default_value_t = 5)]
    window: u32,

    /// Hue tolerance, in 0..180 units
    #[arg(long, default_value_t = 8)]
    hue_tol: u8,

    /// Saturation and value tolerance
    #[arg(long, default_value_t = 50)]
    sv_tol: u8,
}

fn main() -> anyhow::Result<()> {
    logging::init("info");
    let args = Args::parse();

    let frame = load_color(&args.image)
        .with_context(|| format!("Could not load {}", args.image.display()))?;
    let hsv = frame.to_hsv()?;

    let Some(px) = hsv.get_pixel(args.x, args.y) else {
        bail!(
            "({}, {}) is outside the {}x{} image",
            args.x,
            args.y,
            hsv.width,
            hsv.height
        );
    };
    println!("HSV Value at ({}, {}): {:?}", args.x, args.y, px);

    let mean = window_mean(&hsv, args.x, args.y, args.window);
    println!("Mean over {0}x{0} window: {mean:?}", args.window);

    let (lower, upper) = suggest_range(mean, args.hue_tol, args.sv_tol);
    let range = HueRange::new(lower, upper)?;
    tracing::debug!(?range, "suggested range");
    println!("Suggested range:");
    println!("{{ lower = {lower:?}, upper = {upper:?} }}");
    Ok(())
}

// Hue is averaged on the circle so reds near the seam don't collapse to cyan.
fn window_mean(hsv: &Frame, cx: u32, cy: u32, window: u32) -> [u8; 3] {
    let half = window / 2;
    let (mut sin, mut cos) = (0.0f64, 0.0f64);
    let (mut s_sum, mut v_sum, mut n) = (0u64, 0u64, 0u64);

    for y in cy.saturating_sub(half)..=cy.saturating_add(half) {
        for x in cx.saturating_sub(half)..=cx.saturating_add(half) {
            let Some(px) = hsv.get_pixel(x, y) else {
                continue;
            };
            let angle = px[0] as f64 / HUE_LIMIT as f64 * std::f64::consts::TAU;
            sin += angle.sin();
            cos += angle.cos();
            s_sum += px[1] as u64;
            v_sum += px[2] as u64;
            n += 1;
        }
    }

    if n == 0 {
        return [0, 0, 0];
    }
    let mut angle = sin.atan2(cos);
    if angle < 0.0 {
        angle += std::f64::consts::TAU;
    }
    let hue = (angle / std::f64::consts::TAU * HUE_LIMIT as f64).round() as u16 % HUE_LIMIT as u16;
    [
        hue as u8,
        (s_sum as f64 / n as f64).round() as u8,
        (v_sum as f64 / n as f64).round() as u8,
    ]
}

/// Lower/upper bounds around `hsv`; the hue pair is inverted when it wraps.
fn suggest_range(hsv: [u8; 3], hue_tol: u8, sv_tol: u8) -> ([u8; 3], [u8; 3]) {
    let limit = HUE_LIMIT as i16;
    let tol = (hue_tol as i16).min(limit / 2 - 1);
    let h = hsv[0] as i16;
    let h_lo = (h - tol).rem_euclid(limit) as u8;
    let h_hi = (h + tol).rem_euclid(limit) as u8;
    (
        [h_lo, hsv[1].saturating_sub(sv_tol), hsv[2].saturating_sub(sv_tol)],
        [h_hi, hsv[1].saturating_add(sv_tol), hsv[2].saturating_add(sv_tol)],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use vision_detection::{FrameConfig, PixelFormat};

    fn hsv_frame(pixels: &[[u8; 3]], width: u32) -> Frame {
        Frame::new(FrameConfig {
            data: pixels.iter().flatten().copied().collect(),
            width,
            height: pixels.len() as u32 / width,
            format: PixelFormat::HSV,
        })
        .unwrap()
    }

    #[test]
    fn suggestion_clamps_saturation_and_value() {
        let (lower, upper) = suggest_range([60, 230, 20], 10, 50);
        assert_eq!(lower, [50, 180, 0]);
        assert_eq!(upper, [70, 255, 70]);
    }

    #[test]
    fn suggestion_near_the_seam_wraps() {
        let (lower, upper) = suggest_range([2, 200, 150], 8, 50);
        assert_eq!(lower[0], 174);
        assert_eq!(upper[0], 10);
        let range = HueRange::new(lower, upper).unwrap();
        assert!(matches!(range, HueRange::Wrapping(_)));
        assert!(range.contains(178, 200, 150));
        assert!(range.contains(5, 200, 150));
    }

    #[test]
    fn window_mean_handles_hue_seam() {
        let frame = hsv_frame(&[[178, 100, 100], [2, 200, 200]], 2);
        assert_eq!(window_mean(&frame, 0, 0, 3), [0, 150, 150]);
    }

    #[test]
    fn window_mean_clips_at_edges() {
        let frame = hsv_frame(&[[30, 10, 20]; 4], 2);
        assert_eq!(window_mean(&frame, 1, 1, 9), [30, 10, 20]);
    }
}
