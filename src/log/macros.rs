//! Macros for generating log messages.

#[macro_export]
macro_rules! critical {
    ($threshold:expr, $($arg:tt)+) => {
        {
            if ($threshold) as u8 <= $crate::log::get_global_logging_threshold() {
                $crate::log::init_logger();
                tracing::event!(
                    tracing::Level::ERROR,
                    "[CRITICAL] {}",
                    format_args!($($arg)+)
                );
            }
        }
    };
    ($($arg:tt)+) => {
        {
            $crate::log::init_logger();
            tracing::event!(
                tracing::Level::ERROR,
                "[CRITICAL] {}",
                format_args!($($arg)+)
            );
        }
    };
}

#[macro_export]
macro_rules! error {
    ($threshold:expr, $($arg:tt)+) => {
        {
            if ($threshold) as u8 <= $crate::log::get_global_logging_threshold() {
                $crate::log::init_logger();
                tracing::event!(tracing::Level::ERROR, "{}", format_args!($($arg)+));
            }
        }
    };
    ($($arg:tt)+) => {
        {
            $crate::log::init_logger();
            tracing::event!(tracing::Level::ERROR, "{}", format_args!($($arg)+));
        }
    };
}

#[macro_export]
macro_rules! warning {
    ($threshold:expr, $($arg:tt)+) => {
        {
            if ($threshold) as u8 <= $crate::log::get_global_logging_threshold() {
                $crate::log::init_logger();
                tracing::event!(tracing::Level::WARN, "{}", format_args!($($arg)+));
            }
        }
    };
    ($($arg:tt)+) => {
        {
            $crate::log::init_logger();
            tracing::event!(tracing::Level::WARN, "{}", format_args!($($arg)+));
        }
    };
}

#[macro_export]
macro_rules! info {
    ($threshold:expr, $($arg:tt)+) => {
        {
            if ($threshold) as u8 <= $crate::log::get_global_logging_threshold() {
                $crate::log::init_logger();
                tracing::event!(tracing::Level::INFO, "{}", format_args!($($arg)+));
            }
        }
    };
    ($($arg:tt)+) => {
        {
            $crate::log::init_logger();
            tracing::event!(tracing::Level::INFO, "{}", format_args!($($arg)+));
        }
    };
}

#[macro_export]
macro_rules! debug {
    ($threshold:expr, $($arg:tt)+) => {
        {
            if ($threshold) as u8 <= $crate::log::get_global_logging_threshold() {
                $crate::log::init_logger();
                tracing::event!(tracing::Level::DEBUG, "{}", format_args!($($arg)+));
            }
        }
    };
    ($($arg:tt)+) => {
        {
            $crate::log::init_logger();
            tracing::event!(tracing::Level::DEBUG, "{}", format_args!($($arg)+));
        }
    };
}

#[macro_export]
macro_rules! trace {
    ($threshold:expr, $($arg:tt)+) => {
        {
            if ($threshold) as u8 <= $crate::log::get_global_logging_threshold() {
                $crate::log::init_logger();
                tracing::event!(tracing::Level::TRACE, "{}", format_args!($($arg)+));
            }
        }
    };
    ($($arg:tt)+) => {
        {
            $crate::log::init_logger();
            tracing::event!(tracing::Level::TRACE, "{}", format_args!($($arg)+));
        }
    };
}


// The following makes the macros importable directly from the `log` module.
pub use {critical, error, warning, info, debug, trace};
