use std::net::TcpListener;
use std::sync::Arc;

use anyhow::Context;
use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::iterator::Signals;
use tracing::info;

use skiff::config::Config;
use skiff::files::FileServer;
use skiff::http::handler::Handler;
use skiff::reactor::Reactor;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .init();

    let cfg = Config::load();

    let files = Arc::new(FileServer::new(&cfg.root)?);
    let listener = TcpListener::bind(&cfg.listen_addr)
        .with_context(|| format!("failed to bind {}", cfg.listen_addr))?;
    listener.set_nonblocking(true)?;

    let mut reactor = Reactor::new()?;
    reactor.register(Handler::acceptor(listener, files))?;

    let handle = reactor.shutdown_handle()?;
    let mut signals = Signals::new([SIGINT, SIGTERM])?;
    std::thread::spawn(move || {
        if signals.forever().next().is_some() {
            info!("shutdown signal received");
            handle.stop();
        }
    });

    info!(
        "Listening on {} serving {}",
        cfg.listen_addr,
        cfg.root.display()
    );
    reactor.run()?;
    Ok(())
}
