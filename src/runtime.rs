use once_cell::sync::Lazy;
use tokio::runtime::{Builder, Handle, Runtime};

// Hosts blocking helpers (encoder log drains) off the UI thread.
static RUNTIME: Lazy<Runtime> = Lazy::new(|| {
    Builder::new_multi_thread()
        .worker_threads(1)
        .enable_all()
        .thread_name("broadcastme-rt")
        .build()
        .expect("Failed to build Tokio runtime")
});

pub fn runtime_handle() -> Handle {
    RUNTIME.handle().clone()
}
