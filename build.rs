/// Build script for MeshRender
///
/// # Shader Strategy:
/// - Mesh/pixel shaders are compiled offline with dxc (ms_6_5 / ps_6_5)
///   into MeshletMS.cso / MeshletPS.cso and loaded as opaque blobs at runtime.
fn main() {
    // Trigger rebuild if shader files change
    println!("cargo:rerun-if-changed=shaders/MeshletMS.hlsl");
    println!("cargo:rerun-if-changed=shaders/MeshletPS.hlsl");
    println!("cargo:rerun-if-changed=shaders/Shared.hlsli");
}
