use serde_json::Value;

use crate::models::GenerationRequest;

pub const MAX_FRAMES: u32 = 8;

/// Coerces an arbitrary JSON value into a frame count in `[1, MAX_FRAMES]`.
/// Anything non-numeric (absent, null, strings) falls back to a single frame.
pub fn safe_frame_count(raw: Option<&Value>) -> u32 {
    raw.and_then(|v| v.as_i64().or_else(|| v.as_f64().map(|f| f as i64)))
        .map(|n| n.clamp(1, MAX_FRAMES as i64) as u32)
        .unwrap_or(1)
}

/// Renders the generation instruction for one lookbook request. Deterministic
/// for a given input, including the all-empty request.
pub fn compose_prompt(request: &GenerationRequest, frames: u32) -> String {
    let framing = if frames == 1 {
        "ONE cohesive frame".to_string()
    } else {
        format!("{frames} cohesive frames, shared art direction")
    };

    format!(
        "Luxury lookbook for Maison GDC ({framing}).\n\
         Concept: {concept}\n\
         Palette: {palette}\n\
         SKUs: {skus}\n\
         Style: Parisian minimalist luxe; candlelight 2700K; cohesive editorial art direction.",
        concept = request.concept,
        palette = request.palette.join(", "),
        skus = request.skus.join(", "),
    )
}
