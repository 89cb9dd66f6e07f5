/// Proto-generated modules.
///
/// `tonic::include_proto!` expands to an `include!` of the file that
/// prost/tonic-build wrote into `OUT_DIR` during the build script.
pub mod gputopo_v1 {
    // Package name declared in gputopo.proto is `gputopo.v1`.
    tonic::include_proto!("gputopo.v1");
}
