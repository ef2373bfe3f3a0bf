// Build script to compile protobuf files into Rust code.
//
// Generates message structs and the UserHandling service traits from the
// .proto definitions in the proto/ directory.

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tonic_build::configure()
        .build_server(true)
        .build_client(true)
        .compile_protos(&["proto/watermelon.proto"], &["proto"])?;

    Ok(())
}
