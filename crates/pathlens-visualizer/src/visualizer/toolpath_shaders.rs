//! # OpenGL Shaders for Instanced Toolpath Rendering
//!
//! Each instance carries its own model matrix in attribute slots 2..=5.

pub const TOOLPATH_VERTEX_SHADER: &str = r#"
#version 330 core

layout (location = 0) in vec3 position;
layout (location = 1) in vec3 normal;
layout (location = 2) in mat4 instance_model;

uniform mat4 view_projection;

out vec3 frag_normal;

void main() {
    gl_Position = view_projection * instance_model * vec4(position, 1.0);
    frag_normal = normalize(mat3(instance_model) * normal);
}
"#;

pub const TOOLPATH_FRAGMENT_SHADER: &str = r#"
#version 330 core

in vec3 frag_normal;

uniform vec4 base_color;
uniform vec3 light_direction;
uniform float ambient;

out vec4 final_color;

void main() {
    vec3 n = normalize(frag_normal);
    // Two-sided diffuse; tubes are open so back faces show
    float diffuse = abs(dot(n, normalize(-light_direction)));
    float shade = ambient + (1.0 - ambient) * diffuse;
    final_color = vec4(base_color.rgb * shade, base_color.a);
}
"#;
