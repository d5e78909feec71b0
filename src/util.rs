/// Derive a stable chart color from a server name, for entries without a
/// configured color. Same name, same color, across restarts.
pub fn color_for_name(name: &str) -> String {
    let mut hash: i32 = 0;
    for c in name.chars().rev() {
        hash = (c as i32).wrapping_add(hash.wrapping_shl(5).wrapping_sub(hash));
    }

    let scaled = ((hash as f64).sin() * 10_000.0).abs().fract() * 16_777_216.0;
    format!("#{:06x}", (scaled as u32).min(0xff_ff_ff))
}

/// Reference URL for a favicon identified by its content hash
pub fn hashed_favicon_url(hash: &str) -> String {
    format!("/hashedfavicon_{hash}.png")
}
