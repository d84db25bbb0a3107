//! `H+:MM:SS` durations as used by AVTransport.

/// Format seconds as `HH:MM:SS`.
///
/// Hours are zero padded to two digits and grow past 99 if needed.
///
/// ```
/// assert_eq!(upnp_api::time_to_string(3725), "01:02:05");
/// ```
pub fn time_to_string(seconds: u32) -> String {
    format!(
        "{:02}:{:02}:{:02}",
        seconds / 3600,
        (seconds / 60) % 60,
        seconds % 60
    )
}

/// Parse `h:m:s` into seconds.
///
/// Each part contributes its leading digits; parsing stops at the first part
/// without any, so fractional seconds (`0:03:21.500`) are ignored and
/// `NOT_IMPLEMENTED` reads as 0.
///
/// ```
/// assert_eq!(upnp_api::time_to_seconds("0:03:21.500"), 201);
/// assert_eq!(upnp_api::time_to_seconds("NOT_IMPLEMENTED"), 0);
/// ```
pub fn time_to_seconds(value: &str) -> u32 {
    let mut parts = [0u32; 3];

    for (slot, part) in parts.iter_mut().zip(value.trim().split(':')) {
        let digits: String = part.trim().chars().take_while(char::is_ascii_digit).collect();
        match digits.parse::<u32>() {
            Ok(n) => *slot = n,
            Err(_) => break,
        }
    }

    let [hours, minutes, seconds] = parts;
    hours
        .saturating_mul(3600)
        .saturating_add(minutes.saturating_mul(60))
        .saturating_add(seconds)
}
