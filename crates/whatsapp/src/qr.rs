use qrcode::{QrCode, render::unicode};

/// Render a pairing challenge as a compact terminal QR code.
///
/// Returns `None` when the payload is too long to encode.
pub fn render_terminal(payload: &str) -> Option<String> {
    let code = QrCode::new(payload.as_bytes()).ok()?;
    Some(
        code.render::<unicode::Dense1x2>()
            .dark_color(unicode::Dense1x2::Light)
            .light_color(unicode::Dense1x2::Dark)
            .quiet_zone(true)
            .build(),
    )
}
