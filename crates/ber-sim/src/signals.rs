use std::sync::atomic::AtomicBool;

use ber_exp::CancelToken;

static SHUTDOWN: AtomicBool = AtomicBool::new(false);

#[cfg(unix)]
extern "C" fn request_shutdown(_signum: libc::c_int) {
    // Only an atomic store is async-signal-safe here.
    SHUTDOWN.store(true, std::sync::atomic::Ordering::SeqCst);
}

/// Routes SIGINT and SIGTERM into a cancellation token.
///
/// The sweep starts no further trials, drops the unfinished row, writes its
/// checkpoint and stops.
pub fn install_shutdown_handler() -> CancelToken {
    #[cfg(unix)]
    unsafe {
        let handler = request_shutdown as extern "C" fn(libc::c_int) as libc::sighandler_t;
        libc::signal(libc::SIGINT, handler);
        libc::signal(libc::SIGTERM, handler);
    }
    CancelToken::from_static(&SHUTDOWN)
}
