/// WGSL shader code for the normal map pass chain
///
/// One module holds every pass:
/// - `vs_main` - full-screen triangle, no vertex buffers
/// - `fs_copy` - passthrough of the bound input
/// - `fs_blur` - 9-tap Gaussian along `params.direction`
/// - `fs_normal` - Sobel/Scharr gradient to packed normal
///
/// All passes share the same bind group layout: input texture (binding 0),
/// linear clamp sampler (binding 1) and `PassParams` uniform (binding 2).

pub const NORMAL_MAP_SHADER: &str = r#"
// ========== Vertex Shader ==========
// Full-screen triangle covering entire viewport

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
}

@vertex
fn vs_main(@builtin(vertex_index) vertex_index: u32) -> VertexOutput {
    var output: VertexOutput;

    // Vertex 0: (-1, -1), vertex 1: (3, -1), vertex 2: (-1, 3)
    let x = f32(i32(vertex_index & 1u) * 4 - 1);
    let y = f32(i32(vertex_index >> 1u) * 4 - 1);

    output.clip_position = vec4<f32>(x, y, 0.0, 1.0);
    return output;
}

// ========== Shared State ==========

// Must match GpuPassParams in pipeline code (48 bytes)
struct PassParams {
    direction: vec2<f32>,   // (1, 0) horizontal, (0, 1) vertical
    radius: f32,            // Blur radius in UV units, 0 = passthrough
    dz: f32,                // Depth scale
    invert_r: f32,          // +1 or -1
    invert_g: f32,          // +1 or -1
    invert_h: f32,          // +1 or -1
    algorithm: u32,         // 1 = Sobel, 0 = Scharr
    height_mode: u32,       // 0 = invert_h on gradients, 1 = invert_h on Z
    padding0: u32,
    padding1: u32,
    padding2: u32,
}

@group(0) @binding(0)
var input_texture: texture_2d<f32>;

@group(0) @binding(1)
var texture_sampler: sampler;

@group(0) @binding(2)
var<uniform> params: PassParams;

// Load a texel with coordinates clamped to the texture (replicated border)
fn load_clamped(coords: vec2<i32>) -> vec4<f32> {
    let dimensions = vec2<i32>(textureDimensions(input_texture));
    let clamped = clamp(coords, vec2<i32>(0, 0), dimensions - vec2<i32>(1, 1));
    return textureLoad(input_texture, clamped, 0);
}

fn pixel_coords(position: vec4<f32>) -> vec2<i32> {
    return vec2<i32>(floor(position.xy));
}

// ========== Copy ==========

@fragment
fn fs_copy(input: VertexOutput) -> @location(0) vec4<f32> {
    return load_clamped(pixel_coords(input.clip_position));
}

// ========== Separable Blur ==========

@fragment
fn fs_blur(input: VertexOutput) -> @location(0) vec4<f32> {
    let coords = pixel_coords(input.clip_position);
    if (params.radius == 0.0) {
        return load_clamped(coords);
    }

    let dimensions = vec2<f32>(textureDimensions(input_texture));
    let uv = (vec2<f32>(coords) + vec2<f32>(0.5, 0.5)) / dimensions;
    let offset = params.direction * params.radius;

    var sum = vec4<f32>(0.0);
    sum += textureSampleLevel(input_texture, texture_sampler, uv - 4.0 * offset, 0.0) * 0.051;
    sum += textureSampleLevel(input_texture, texture_sampler, uv - 3.0 * offset, 0.0) * 0.0918;
    sum += textureSampleLevel(input_texture, texture_sampler, uv - 2.0 * offset, 0.0) * 0.12245;
    sum += textureSampleLevel(input_texture, texture_sampler, uv - 1.0 * offset, 0.0) * 0.1531;
    sum += textureSampleLevel(input_texture, texture_sampler, uv, 0.0) * 0.1633;
    sum += textureSampleLevel(input_texture, texture_sampler, uv + 1.0 * offset, 0.0) * 0.1531;
    sum += textureSampleLevel(input_texture, texture_sampler, uv + 2.0 * offset, 0.0) * 0.12245;
    sum += textureSampleLevel(input_texture, texture_sampler, uv + 3.0 * offset, 0.0) * 0.0918;
    sum += textureSampleLevel(input_texture, texture_sampler, uv + 4.0 * offset, 0.0) * 0.051;
    return sum;
}

// ========== Normal Map ==========

// Height in byte units (0..255) from the R channel
fn height_at(coords: vec2<i32>) -> f32 {
    return load_clamped(coords).r * 255.0;
}

@fragment
fn fs_normal(input: VertexOutput) -> @location(0) vec4<f32> {
    let p = pixel_coords(input.clip_position);

    let tl = height_at(p + vec2<i32>(-1, -1));
    let t = height_at(p + vec2<i32>(0, -1));
    let tr = height_at(p + vec2<i32>(1, -1));
    let l = height_at(p + vec2<i32>(-1, 0));
    let r = height_at(p + vec2<i32>(1, 0));
    let bl = height_at(p + vec2<i32>(-1, 1));
    let b = height_at(p + vec2<i32>(0, 1));
    let br = height_at(p + vec2<i32>(1, 1));

    // Sobel 1-2-1, Scharr 3-10-3
    var side_weight = 1.0;
    var mid_weight = 2.0;
    if (params.algorithm == 0u) {
        side_weight = 3.0;
        mid_weight = 10.0;
    }

    let gx = (side_weight * tr + mid_weight * r + side_weight * br) - (side_weight * tl + mid_weight * l + side_weight * bl);
    let gy = (side_weight * bl + mid_weight * b + side_weight * br) - (side_weight * tl + mid_weight * t + side_weight * tr);

    var height_sign = params.invert_h;
    if (params.height_mode == 1u) {
        height_sign = 1.0;
    }

    // Scale into [-1, 1] first so huge depth scales don't overflow the squares
    let v = vec3<f32>(
        -gx * params.invert_r * height_sign,
        -gy * params.invert_g * height_sign,
        params.dz
    );
    var n = normalize(v / max(max(abs(v.x), abs(v.y)), abs(v.z)));
    if (params.height_mode == 1u) {
        n.z = n.z * params.invert_h;
    }

    // Quantize here so the Rgba8Unorm store is exact
    let packed = round((n + vec3<f32>(1.0)) * 0.5 * 255.0) / 255.0;
    return vec4<f32>(packed, 1.0);
}
"#;

/// Get the shader source code for the pass chain
pub fn get_shader() -> &'static str {
    NORMAL_MAP_SHADER
}
