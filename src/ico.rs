//! ICO Container - Single PNG Image
//!
//! Layout (little-endian): 6-byte ICONDIR, one 16-byte ICONDIRENTRY, then
//! the PNG payload verbatim at offset 22.

use crate::config::IconSize;
use crate::pipeline::ItemError;

pub const ICO_HEADER_LEN: usize = 22;

const RESOURCE_TYPE_ICON: u16 = 1;
const COLOR_PLANES: u16 = 1;
const BITS_PER_PIXEL: u16 = 32;

/// Dimension byte for the directory entry. 256 does not fit in a byte and
/// is written as 0.
fn dimension_byte(pixels: u32) -> u8 {
    if pixels >= 256 {
        0
    } else {
        pixels as u8
    }
}

/// Wrap an encoded PNG in a single-image icon container.
pub fn build_icon_container(png: &[u8], size: IconSize) -> Result<Vec<u8>, ItemError> {
    if png.is_empty() {
        return Err(ItemError::ContainerBuild("PNG payload is empty".to_string()));
    }
    let data_size = u32::try_from(png.len()).map_err(|_| {
        ItemError::ContainerBuild(format!("PNG payload of {} bytes is too large", png.len()))
    })?;

    let mut out = Vec::new();
    out.try_reserve_exact(ICO_HEADER_LEN + png.len())
        .map_err(|e| ItemError::ContainerBuild(format!("Allocation failed: {e}")))?;

    let dim = dimension_byte(size.pixels());

    // ICONDIR
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&RESOURCE_TYPE_ICON.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes());

    // ICONDIRENTRY
    out.push(dim);
    out.push(dim);
    out.push(0); // color count
    out.push(0); // reserved
    out.extend_from_slice(&COLOR_PLANES.to_le_bytes());
    out.extend_from_slice(&BITS_PER_PIXEL.to_le_bytes());
    out.extend_from_slice(&data_size.to_le_bytes());
    out.extend_from_slice(&(ICO_HEADER_LEN as u32).to_le_bytes());

    debug_assert_eq!(out.len(), ICO_HEADER_LEN);
    out.extend_from_slice(png);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn u16_at(bytes: &[u8], offset: usize) -> u16 {
        u16::from_le_bytes([bytes[offset], bytes[offset + 1]])
    }

    fn u32_at(bytes: &[u8], offset: usize) -> u32 {
        u32::from_le_bytes(bytes[offset..offset + 4].try_into().unwrap())
    }

    #[test]
    fn test_header_layout() {
        let png = vec![0xAB; 100];
        let ico = build_icon_container(&png, IconSize::S64).unwrap();

        assert_eq!(ico.len(), 122);
        assert_eq!(u16_at(&ico, 0), 0);
        assert_eq!(u16_at(&ico, 2), 1);
        assert_eq!(u16_at(&ico, 4), 1);
        assert_eq!(ico[6], 64);
        assert_eq!(ico[7], 64);
        assert_eq!(ico[8], 0);
        assert_eq!(ico[9], 0);
        assert_eq!(u16_at(&ico, 10), 1);
        assert_eq!(u16_at(&ico, 12), 32);
        assert_eq!(u32_at(&ico, 14), 100);
        assert_eq!(u32_at(&ico, 18), 22);
        assert_eq!(&ico[22..], &png[..]);
    }

    #[test]
    fn test_every_size() {
        let png = b"\x89PNG\r\n\x1a\nrest".to_vec();
        for size in IconSize::ALL {
            let ico = build_icon_container(&png, size).unwrap();
            let expected = if size.pixels() == 256 { 0 } else { size.pixels() as u8 };
            assert_eq!(ico.len(), 22 + png.len());
            assert_eq!(ico[6], expected);
            assert_eq!(ico[7], expected);
            assert_eq!(u32_at(&ico, 14), png.len() as u32);
            assert_eq!(u32_at(&ico, 18), 22);
        }
    }

    #[test]
    fn test_exact_bytes_for_256() {
        let ico = build_icon_container(&[1, 2, 3], IconSize::S256).unwrap();
        assert_eq!(
            ico,
            [
                0, 0, 1, 0, 1, 0, // ICONDIR
                0, 0, 0, 0, 1, 0, 32, 0, 3, 0, 0, 0, 22, 0, 0, 0, // entry
                1, 2, 3,
            ]
        );
    }

    #[test]
    fn test_empty_payload_rejected() {
        let err = build_icon_container(&[], IconSize::S32).unwrap_err();
        assert!(matches!(err, ItemError::ContainerBuild(_)));
    }
}
