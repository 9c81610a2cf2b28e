//! Receiver and sender mode handling.
//!
//! Over the messaging REST API the RFH2 modes reduce to payload
//! normalization on the receive side and content-type selection on the
//! send side.

use bridge_core::{ReceiverMode, SenderMode};

/// Apply the configured receiver mode to a raw payload.
pub fn normalize_received(mode: ReceiverMode, payload: Vec<u8>) -> Vec<u8> {
    match mode {
        ReceiverMode::Default | ReceiverMode::Rfh2 => payload,
        ReceiverMode::NoRfh2 => extract_xml(payload),
    }
}

/// Trim any framing before the first `<?xml` declaration.
///
/// Payloads without the marker pass through unchanged.
pub fn extract_xml(payload: Vec<u8>) -> Vec<u8> {
    match find(&payload, b"<?xml") {
        Some(0) | None => payload,
        Some(i) => payload[i..].to_vec(),
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Content type sent with a put, per the configured sender mode.
pub fn content_type_for(mode: SenderMode, format: &str, ccsid: i32) -> String {
    match mode {
        SenderMode::Default => "application/octet-stream".to_string(),
        SenderMode::Rfh2 => "text/xml;charset=utf-8".to_string(),
        SenderMode::Custom => {
            let charset = charset_for_ccsid(ccsid);
            match format.trim().to_uppercase().as_str() {
                "MQSTR" => format!("text/plain;charset={charset}"),
                "MQHRF2" => format!("text/xml;charset={charset}"),
                _ => "application/octet-stream".to_string(),
            }
        }
    }
}

fn charset_for_ccsid(ccsid: i32) -> &'static str {
    match ccsid {
        819 => "iso-8859-1",
        1200 | 1201 => "utf-16",
        _ => "utf-8",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_strips_leading_framing() {
        let framed = b"RFH \x02\x00\x00\x00junk<?xml version=\"1.0\"?><doc/>".to_vec();
        assert_eq!(
            extract_xml(framed),
            b"<?xml version=\"1.0\"?><doc/>".to_vec()
        );
    }

    #[test]
    fn extract_is_identity_without_marker() {
        let plain = b"just some bytes".to_vec();
        assert_eq!(extract_xml(plain.clone()), plain);
    }

    #[test]
    fn extract_is_identity_when_marker_leads() {
        let xml = b"<?xml version=\"1.0\"?><doc/>".to_vec();
        assert_eq!(extract_xml(xml.clone()), xml);
    }

    #[test]
    fn only_no_rfh2_normalizes() {
        let framed = b"junk<?xml?>".to_vec();
        assert_eq!(
            normalize_received(ReceiverMode::Default, framed.clone()),
            framed
        );
        assert_eq!(
            normalize_received(ReceiverMode::Rfh2, framed.clone()),
            framed
        );
        assert_eq!(
            normalize_received(ReceiverMode::NoRfh2, framed),
            b"<?xml?>".to_vec()
        );
    }

    #[test]
    fn sender_content_types() {
        assert_eq!(
            content_type_for(SenderMode::Default, "", 1208),
            "application/octet-stream"
        );
        assert_eq!(
            content_type_for(SenderMode::Rfh2, "", 1208),
            "text/xml;charset=utf-8"
        );
        assert_eq!(
            content_type_for(SenderMode::Custom, "MQSTR", 1208),
            "text/plain;charset=utf-8"
        );
        assert_eq!(
            content_type_for(SenderMode::Custom, "mqstr", 819),
            "text/plain;charset=iso-8859-1"
        );
        assert_eq!(
            content_type_for(SenderMode::Custom, "MQIMS", 1208),
            "application/octet-stream"
        );
    }
}
