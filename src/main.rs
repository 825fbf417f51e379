use picohttpd::config::Config;
use picohttpd::server;
use picohttpd::site::Site;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .init();

    let cfg = Config::load()?;
    let site = Site::new(cfg.doc_root.clone());

    server::listener::run(&cfg, site)
}
