#[tokio::main]
async fn main() {
    if let Err(e) = ncd_monitor_lib::run().await {
        eprintln!("ncd-monitor: {e}");
        std::process::exit(1);
    }
}
