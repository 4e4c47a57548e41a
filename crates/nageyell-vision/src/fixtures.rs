//! QR rendering for tests and offline demos.

use nageyell_types::{frame::Frame, NageError, Result};
use qrcode::{Color, QrCode};

const MODULE_PX: usize = 6;
const QUIET_ZONE: usize = 4;

/// Renders `payload` as a black-on-white QR code frame.
///
/// Panics if the payload does not fit in a QR code; callers pass short literals.
pub fn qr_frame(payload: &str) -> Frame {
    try_qr_frame(payload).expect("payload fits in a QR code")
}

pub fn try_qr_frame(payload: &str) -> Result<Frame> {
    let code = QrCode::new(payload.as_bytes())
        .map_err(|err| NageError::Serialization(format!("qr: {err}")))?;
    let modules = code.width();
    let colors = code.to_colors();
    let side = (modules + QUIET_ZONE * 2) * MODULE_PX;

    let mut data = vec![255u8; side * side * Frame::CHANNELS];
    for (idx, color) in colors.iter().enumerate() {
        if *color != Color::Dark {
            continue;
        }
        let mx = idx % modules + QUIET_ZONE;
        let my = idx / modules + QUIET_ZONE;
        for py in my * MODULE_PX..(my + 1) * MODULE_PX {
            for px in mx * MODULE_PX..(mx + 1) * MODULE_PX {
                let offset = (py * side + px) * Frame::CHANNELS;
                data[offset..offset + 3].copy_from_slice(&[0, 0, 0]);
            }
        }
    }
    Ok(Frame::from_rgba(side as u32, side as u32, data))
}
