fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("cargo:rerun-if-env-changed=LOADCAP_REGEN_PROTO");
    println!("cargo:rerun-if-changed=proto/loadcap/v1/load_balancing.proto");

    // The generated code is checked in under src/generated so that builds
    // do not need protoc. Set LOADCAP_REGEN_PROTO after editing the proto.
    if std::env::var_os("LOADCAP_REGEN_PROTO").is_none() {
        return Ok(());
    }

    tonic_build::configure()
        .build_server(true)
        .build_client(true)
        .out_dir("src/generated")
        .compile_protos(&["proto/loadcap/v1/load_balancing.proto"], &["proto"])?;
    Ok(())
}
