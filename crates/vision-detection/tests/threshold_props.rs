//! Property checks for range thresholding.

use proptest::prelude::*;
use vision_detection::{ColorRange, Frame, FrameConfig, HsvBounds, Mask, PixelFormat};

fn hsv_frame() -> impl Strategy<Value = Frame> {
    (1u32..12, 1u32..12).prop_flat_map(|(w, h)| {
        prop::collection::vec((0u8..180, any::<u8>(), any::<u8>()), (w * h) as usize).prop_map(
            move |pixels| {
                Frame::new(FrameConfig {
                    data: pixels.into_iter().flat_map(|(hue, sat, val)| [hue, sat, val]).collect(),
                    width: w,
                    height: h,
                    format: PixelFormat::HSV,
                })
                .unwrap()
            },
        )
    })
}

// Hue may be inverted (wrapping); saturation and value are ordered.
fn bounds() -> impl Strategy<Value = HsvBounds> {
    (0u8..=180, 0u8..=180, any::<(u8, u8)>(), any::<(u8, u8)>()).prop_map(
        |(h_lo, h_hi, (s_a, s_b), (v_a, v_b))| HsvBounds {
            lower: [h_lo, s_a.min(s_b), v_a.min(v_b)],
            upper: [h_hi, s_a.max(s_b), v_a.max(v_b)],
        },
    )
}

proptest! {
    #[test]
    fn threshold_is_union_of_sub_range_masks(
        frame in hsv_frame(),
        first in bounds(),
        second in bounds(),
    ) {
        let range = ColorRange::from_bounds("probe", &[first, second]).unwrap();
        let combined = range.threshold(&frame).unwrap();

        let mut expected = Mask::zeros(frame.width as usize, frame.height as usize);
        for sub in range.sub_ranges() {
            expected.union_with(&sub.mask(&frame).unwrap());
        }
        prop_assert_eq!(&combined, &expected);

        // union is idempotent
        let mut again = combined.clone();
        again.union_with(&combined);
        prop_assert_eq!(&again, &combined);
    }

    #[test]
    fn threshold_agrees_with_pixel_membership(frame in hsv_frame(), b in bounds()) {
        let range = ColorRange::from_bounds("probe", &[b]).unwrap();
        let mask = range.threshold(&frame).unwrap();
        for y in 0..frame.height {
            for x in 0..frame.width {
                let px = frame.get_pixel(x, y).unwrap();
                prop_assert_eq!(
                    mask.is_set(x as usize, y as usize),
                    range.contains(px[0], px[1], px[2])
                );
            }
        }
    }
}
