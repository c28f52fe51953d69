fn main() -> Result<(), Box<dyn std::error::Error>> {
    // The server side is only used by the in-process tests.
    tonic_build::configure()
        .build_server(true)
        .build_client(true)
        .compile_protos(&["proto/dxvif.proto"], &["proto"])?;
    Ok(())
}
