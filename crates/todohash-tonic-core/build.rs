//! Generates the gRPC client and server bindings for `proto/todohash.proto`.
//!
//! The encoded file descriptor set is written next to the generated code so
//! the server can expose it through gRPC reflection:
//!
//! ```rust,ignore
//! pub const FILE_DESCRIPTOR_SET: &[u8] =
//!     tonic::include_file_descriptor_set!("todohash_descriptor");
//! ```
use std::env;
use std::path::PathBuf;

fn main() {
    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());
    let descriptor_path = out_dir.join("todohash_descriptor.bin");

    let mut config = tonic_prost_build::Config::new();
    config.file_descriptor_set_path(&descriptor_path);

    tonic_prost_build::configure()
        .compile_with_config(config, &["proto/todohash.proto"], &["proto"])
        .unwrap();
}
