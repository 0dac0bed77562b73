fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("cargo:rerun-if-changed=proto/dht.proto");
    tonic_build::compile_protos("proto/dht.proto")?;
    Ok(())
}
