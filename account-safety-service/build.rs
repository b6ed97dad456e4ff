// Build script for account-safety-service
// Compiles account_safety.proto for gRPC server and client code generation
fn main() {
    println!("cargo:rerun-if-changed=../proto/services/account_safety.proto");

    // Ensure a protoc binary is available even when one isn't installed on the
    // host by falling back to the vendored protoc distribution.
    if std::env::var_os("PROTOC").is_none() {
        if let Ok(protoc) = protoc_bin_vendored::protoc_bin_path() {
            std::env::set_var("PROTOC", protoc);
        }
    }

    // account-safety-service PROVIDES AccountSafetyService (server implementation)
    // Client code is also generated for integration tests
    tonic_build::configure()
        .build_server(true)
        .build_client(true)
        .compile_protos(
            &["../proto/services/account_safety.proto"],
            &["../proto/services"],
        )
        .expect("Failed to compile account_safety.proto for account-safety-service");
}
