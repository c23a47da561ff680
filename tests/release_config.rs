#[test]
fn cargo_toml_has_release_profile() {
    let cargo_toml = include_str!("../Cargo.toml");
    assert!(
        cargo_toml.contains("[profile.release]"),
        "Cargo.toml must have a [profile.release] section"
    );
    assert!(
        cargo_toml.contains("lto = true"),
        "Release profile must enable LTO"
    );
    assert!(
        cargo_toml.contains("strip = true"),
        "Release profile must strip symbols"
    );
}

#[test]
fn http_client_avoids_native_tls() {
    let cargo_toml = include_str!("../Cargo.toml");
    let reqwest = cargo_toml
        .lines()
        .find(|l| l.starts_with("reqwest"))
        .expect("reqwest dependency");
    assert!(
        reqwest.contains("default-features = false") && reqwest.contains("rustls"),
        "reqwest must use rustls so the binary has no OpenSSL dependency"
    );
}
