use tracing_subscriber::EnvFilter;

/// Setup logging of events reported by domain-xfr and its test suite.
///
/// Use the RUST_LOG environment variable to override the defaults.
///
/// E.g. To enable debug level logging:
///   RUST_LOG=DEBUG
///
/// Or to log only what happens while receiving transfers:
///   RUST_LOG=domain_xfr::xfr::consumer=TRACE
///
/// Or to enable trace level logging but not for the zone store:
///   RUST_LOG=TRACE,domain_xfr::zonetree=OFF
///
/// Without RUST_LOG, only warnings are shown. When called from tests,
/// output goes through the test harness and is only shown for failing
/// tests. Calling this more than once is harmless.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .with_target(true)
        .without_time()
        .try_init()
        .ok();
}
