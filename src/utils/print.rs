//! Logging macros over the `log` facade.
//!
//! Most log lines in this codebase belong to some identifiable party: a
//! replica logs under its port number, a protocol client under its client
//! ID. Each level macro therefore takes an optional `Display` prefix ahead
//! of a `;`, rendered parenthesized before the message; executable
//! entrypoints, which have no useful identity, use the plain form.

/// Log TRACE message, with `kv_trace!(prefix; ...)` or plain form.
#[macro_export]
macro_rules! kv_trace {
    ($prefix:expr; $fmt_str:literal $($fmt_arg:tt)*) => {
        log::trace!(concat!("({}) ", $fmt_str), $prefix $($fmt_arg)*)
    };

    ($fmt_str:literal $($fmt_arg:tt)*) => {
        log::trace!($fmt_str $($fmt_arg)*)
    };
}

/// Log DEBUG message, with `kv_debug!(prefix; ...)` or plain form.
#[macro_export]
macro_rules! kv_debug {
    ($prefix:expr; $fmt_str:literal $($fmt_arg:tt)*) => {
        log::debug!(concat!("({}) ", $fmt_str), $prefix $($fmt_arg)*)
    };

    ($fmt_str:literal $($fmt_arg:tt)*) => {
        log::debug!($fmt_str $($fmt_arg)*)
    };
}

/// Log INFO message, with `kv_info!(prefix; ...)` or plain form.
#[macro_export]
macro_rules! kv_info {
    ($prefix:expr; $fmt_str:literal $($fmt_arg:tt)*) => {
        log::info!(concat!("({}) ", $fmt_str), $prefix $($fmt_arg)*)
    };

    ($fmt_str:literal $($fmt_arg:tt)*) => {
        log::info!($fmt_str $($fmt_arg)*)
    };
}

/// Log WARN message, with `kv_warn!(prefix; ...)` or plain form.
#[macro_export]
macro_rules! kv_warn {
    ($prefix:expr; $fmt_str:literal $($fmt_arg:tt)*) => {
        log::warn!(concat!("({}) ", $fmt_str), $prefix $($fmt_arg)*)
    };

    ($fmt_str:literal $($fmt_arg:tt)*) => {
        log::warn!($fmt_str $($fmt_arg)*)
    };
}

/// Log ERROR message, with `kv_error!(prefix; ...)` or plain form.
#[macro_export]
macro_rules! kv_error {
    ($prefix:expr; $fmt_str:literal $($fmt_arg:tt)*) => {
        log::error!(concat!("({}) ", $fmt_str), $prefix $($fmt_arg)*)
    };

    ($fmt_str:literal $($fmt_arg:tt)*) => {
        log::error!($fmt_str $($fmt_arg)*)
    };
}

/// Log at ERROR level and produce the matching `Err(KvError)` in one step.
/// The prefix, when given, is baked into the error string too: these errors
/// cross task and channel boundaries, and the message must stay
/// attributable after it has left the party that produced it.
#[macro_export]
macro_rules! logged_err {
    ($prefix:expr; $fmt_str:literal $($fmt_arg:tt)*) => {{
        kv_error!($prefix; $fmt_str $($fmt_arg)*);
        Err(KvError(format!(
            concat!("({}) ", $fmt_str),
            $prefix $($fmt_arg)*
        )))
    }};

    ($fmt_str:literal $($fmt_arg:tt)*) => {{
        kv_error!($fmt_str $($fmt_arg)*);
        Err(KvError(format!($fmt_str $($fmt_arg)*)))
    }};
}
