/// Prepended to both stages; maps the legacy HLSL-flavoured helpers onto GLSL 450.
pub const COMPAT_HEADER: &str = "#version 450

#define GLSL 1
#define HLSL 0
#define highp

#define CAST2(x) (vec2(x))
#define CAST3(x) (vec3(x))
#define CAST4(x) (vec4(x))
#define CAST3X3(x) (mat3(x))

#define texSample2D texture
#define texSample2DLod textureLod
#define mul(x, y) ((y) * (x))
#define frac fract
#define atan2 atan
#define fmod(x, y) (x-y*trunc(x/y))
#define ddx dFdx
#define ddy(x) dFdy(-(x))
#define saturate(x) (clamp(x, 0.0, 1.0))

#define float1 float
#define float2 vec2
#define float3 vec3
#define float4 vec4
#define lerp mix

";

pub fn prepend_compat_header(source: &str) -> String {
    let mut out = String::with_capacity(COMPAT_HEADER.len() + source.len());
    out.push_str(COMPAT_HEADER);
    out.push_str(source);
    out
}
