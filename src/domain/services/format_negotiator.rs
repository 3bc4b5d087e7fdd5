//! Output format negotiation.
//!
//! Matches the client's `Accept` media ranges against the operator's
//! configured format preference, falling back to passthrough for
//! sources the transcoder must not touch (vector or animated formats).

use crate::domain::entities::{OutputFormat, TargetFormat};

/// Content types that are never transcoded: vector, animated, or icon
/// formats where re-encoding would lose semantics.
const PASSTHROUGH_TYPES: &[&str] = &[
    "image/svg+xml",
    "image/gif",
    "image/apng",
    "image/x-icon",
    "image/vnd.microsoft.icon",
];

/// One parsed `Accept` media range.
#[derive(Debug, Clone, Copy)]
struct MediaRange<'a> {
    range: &'a str,
    weight: f32,
}

fn parse_accept(accepted: &[String]) -> Vec<MediaRange<'_>> {
    accepted
        .iter()
        .filter_map(|entry| {
            let mut parts = entry.split(';');
            let range = parts.next()?.trim();
            if range.is_empty() {
                return None;
            }
            let mut weight = 1.0f32;
            for param in parts {
                if let Some(value) = param.trim().strip_prefix("q=") {
                    weight = value.trim().parse().unwrap_or(0.0);
                }
            }
            Some(MediaRange { range, weight })
        })
        .collect()
}

/// The client's weight for a concrete content type, if acceptable.
fn client_weight(ranges: &[MediaRange<'_>], content_type: &str) -> Option<f32> {
    let mut best: Option<f32> = None;
    for range in ranges {
        let matches = range.range == content_type
            || range.range == "image/*"
            || range.range == "*/*";
        if matches && range.weight > 0.0 {
            best = Some(best.map_or(range.weight, |b| b.max(range.weight)));
        }
    }
    best
}

/// Picks the transcode target from the client's `Accept` ranges and the
/// operator's configured preference order.
///
/// Higher client weight wins; configuration order breaks ties. Returns
/// `None` when no configured format is acceptable.
#[must_use]
pub fn client_target(accepted: &[String], configured: &[TargetFormat]) -> Option<TargetFormat> {
    let ranges = parse_accept(accepted);
    let mut best: Option<(f32, TargetFormat)> = None;
    for format in configured {
        if let Some(weight) = client_weight(&ranges, format.content_type()) {
            // Strictly-greater keeps the earlier configured format on ties.
            if best.is_none_or(|(w, _)| weight > w) {
                best = Some((weight, *format));
            }
        }
    }
    best.map(|(_, format)| format)
}

/// Whether a source content type may be resized and re-encoded.
#[must_use]
pub fn is_transcodable(content_type: &str) -> bool {
    let base = content_type
        .split(';')
        .next()
        .unwrap_or(content_type)
        .trim();
    base.starts_with("image/") && !PASSTHROUGH_TYPES.contains(&base)
}

/// Full negotiation: client preference intersected with the configured
/// formats, overridden to passthrough when the origin content type is
/// not transcodable.
#[must_use]
pub fn negotiate(
    accepted: &[String],
    origin_content_type: &str,
    configured: &[TargetFormat],
) -> OutputFormat {
    if !is_transcodable(origin_content_type) {
        return OutputFormat::Passthrough;
    }
    client_target(accepted, configured).map_or(OutputFormat::Passthrough, OutputFormat::Target)
}
