//! Minimal images used by tests.

/// 1x1 greyscale PNG with no text chunks.
pub const BLANK_PNG: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44, 0x52,
    0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x00, 0x00, 0x00, 0x00, 0x3A, 0x7E, 0x9B,
    0x55, 0x00, 0x00, 0x00, 0x0A, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x63, 0x60, 0x00, 0x00, 0x00,
    0x02, 0x00, 0x01, 0x48, 0xAF, 0xA4, 0x71, 0x00, 0x00, 0x00, 0x00, 0x49, 0x45, 0x4E, 0x44, 0xAE,
    0x42, 0x60, 0x82,
];

/// 1x1 PNG with a `tEXt` chunk: `parameters` = "a cat\nSteps: 20".
pub const PARAMETERS_PNG: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44, 0x52,
    0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x00, 0x00, 0x00, 0x00, 0x3A, 0x7E, 0x9B,
    0x55, 0x00, 0x00, 0x00, 0x1A, 0x74, 0x45, 0x58, 0x74, 0x70, 0x61, 0x72, 0x61, 0x6D, 0x65, 0x74,
    0x65, 0x72, 0x73, 0x00, 0x61, 0x20, 0x63, 0x61, 0x74, 0x0A, 0x53, 0x74, 0x65, 0x70, 0x73, 0x3A,
    0x20, 0x32, 0x30, 0xB0, 0xFC, 0xE8, 0x5D, 0x00, 0x00, 0x00, 0x0A, 0x49, 0x44, 0x41, 0x54, 0x78,
    0x9C, 0x63, 0x60, 0x00, 0x00, 0x00, 0x02, 0x00, 0x01, 0x48, 0xAF, 0xA4, 0x71, 0x00, 0x00, 0x00,
    0x00, 0x49, 0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
];

/// JPEG skeleton without EXIF: SOI, JFIF APP0, two padding COM segments, EOI.
///
/// Padded to ~8 KB because the EXIF reader wants more than a few bytes of
/// input before it gives up on a file.
pub fn blank_jpeg() -> Vec<u8> {
    let mut bytes = vec![0xFF, 0xD8];
    bytes.extend_from_slice(&[
        0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F', 0x00, 0x01, 0x01, 0x00, 0x00, 0x01,
        0x00, 0x01, 0x00, 0x00,
    ]);
    for _ in 0..2 {
        let body = [b' '; 4000];
        bytes.extend_from_slice(&[0xFF, 0xFE]);
        bytes.extend_from_slice(&(body.len() as u16 + 2).to_be_bytes());
        bytes.extend_from_slice(&body);
    }
    bytes.extend_from_slice(&[0xFF, 0xD9]);
    bytes
}
