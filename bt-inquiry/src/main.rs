//! bt-inquiry: periodic Bluetooth device inquiry
//!
//! Runs a BR/EDR inquiry on the default BlueZ adapter, reports every device
//! found, waits, and repeats until Ctrl-C or SIGTERM. Configured through the
//! JSON file named by `BT_INQUIRY_CONFIG`.

mod bluez;

use anyhow::Context;

use probehound::cancel::CancelToken;
use probehound::config::InquiryConfig;
use probehound::discovery::DiscoveryLoop;
use probehound::protocol::VERSION;
use probehound::report::Reporter;

use bluez::BluezDiscoverer;

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_secs()
        .init();

    let config = InquiryConfig::from_env().context("loading inquiry config")?;
    log::info!(
        "bt-inquiry v{} starting: {}s inquiry every {}s",
        VERSION,
        config.duration_secs,
        config.interval_secs
    );

    let reporter = Reporter::open(&config.log_path)
        .with_context(|| format!("opening {}", config.log_path.display()))?;
    let discoverer = BluezDiscoverer::new().context("connecting to bluetoothd")?;

    let cancel = CancelToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || {
        log::info!("Shutdown requested");
        handler_token.cancel();
    })
    .context("installing signal handler")?;

    let mut inquiry = DiscoveryLoop::new(discoverer, config.params(), config.interval(), reporter);
    inquiry.run(&cancel)?;
    Ok(())
}
