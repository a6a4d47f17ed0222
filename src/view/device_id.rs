const DEFAULT_MAC: &str = "00:00:00:00:00:00";

/// Renders a numeric device ID as a colon separated MAC address.
///
/// IDs fitting in six bytes are padded to 12 hex digits, larger ones to 16.
/// The broadcast ID 0 renders as the all-zero address.
pub fn format_device_id(device_id: u64) -> String {
    if device_id == 0 {
        return DEFAULT_MAC.to_string();
    }

    let hex = format!("{:X}", device_id);
    let width = if hex.len() > 12 { 16 } else { 12 };
    let padded = format!("{:0>width$}", hex, width = width);

    let mut mac = String::with_capacity(width + width / 2);
    for (index, digit) in padded.chars().enumerate() {
        if index != 0 && index % 2 == 0 {
            mac.push(':');
        }
        mac.push(digit);
    }
    mac
}

/// Parses a MAC string (colons and spaces ignored) back into its numeric ID.
pub fn parse_device_mac(mac: &str) -> Option<u64> {
    let digits: String = mac.chars().filter(|c| *c != ':' && *c != ' ').collect();
    if digits.is_empty() {
        return None;
    }
    u64::from_str_radix(&digits, 16).ok()
}
