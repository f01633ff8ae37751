//! 픽셀 통계.
//!
//! 휘도(luma) 버퍼를 직접 순회해 거의 검은 픽셀의 비율을 구한다.

use image::DynamicImage;

/// 이미지 1장의 휘도 통계
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelStats {
    pub width: u32,
    pub height: u32,
    /// 휘도가 임계값 이하인 픽셀 비율 (0.0 ~ 1.0)
    pub dark_ratio: f64,
    /// 평균 휘도 (0 ~ 255)
    pub mean_luma: f64,
}

/// 휘도 `near_black_luma` 이하를 검은 픽셀로 보고 통계 계산
///
/// 빈 이미지는 `None`.
pub fn luma_stats(image: &DynamicImage, near_black_luma: u8) -> Option<PixelStats> {
    let luma = image.to_luma8();
    let (width, height) = luma.dimensions();
    let raw = luma.as_raw();
    if raw.is_empty() {
        return None;
    }

    let mut dark = 0u64;
    let mut sum = 0u64;
    for &value in raw {
        if value <= near_black_luma {
            dark += 1;
        }
        sum += u64::from(value);
    }

    let total = raw.len() as f64;
    Some(PixelStats {
        width,
        height,
        dark_ratio: dark as f64 / total,
        mean_luma: sum as f64 / total,
    })
}
