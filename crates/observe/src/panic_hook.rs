//! Installs a panic hook that logs through `tracing` instead of stderr, so
//! panics in spawned tasks show up alongside the rest of a process's
//! structured logs.

pub fn install() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        tracing::error!(%info, "panic");
        default_hook(info);
    }));
}
