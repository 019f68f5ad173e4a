pub fn version() -> &'static str {
    concat!("roster-server v", env!("CARGO_PKG_VERSION"))
}
