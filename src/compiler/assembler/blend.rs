use crate::compiler::assembler::types::BlendMode;

fn normalize_blend_token(s: &str) -> String {
    s.trim().to_ascii_lowercase().replace('_', "-")
}

/// Blend mode for a material `blending` value; `None` for tokens we do not know.
pub fn blend_mode_for_material(blending: &str) -> Option<BlendMode> {
    let token = normalize_blend_token(blending);
    Some(match token.as_str() {
        "translucent" => BlendMode::Alpha,
        "additive" => BlendMode::Add,
        "normal" | "disabled" => BlendMode::None,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_material_tokens() {
        assert_eq!(blend_mode_for_material("translucent"), Some(BlendMode::Alpha));
        assert_eq!(blend_mode_for_material(" Additive "), Some(BlendMode::Add));
        assert_eq!(blend_mode_for_material("normal"), Some(BlendMode::None));
        assert_eq!(blend_mode_for_material("disabled"), Some(BlendMode::None));
        assert_eq!(blend_mode_for_material("multiply"), None);
    }
}
