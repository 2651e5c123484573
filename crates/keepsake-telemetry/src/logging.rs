//! Logging helpers with the engine's standard fields.

/// Log a message lifecycle event with `subsystem` and `message_id`.
///
/// ```rust,ignore
/// log_message_event!(info, "ks-04", "message transitioned", message.id, to = %status);
/// ```
#[macro_export]
macro_rules! log_message_event {
    ($level:ident, $subsystem:expr, $msg:expr, $message_id:expr $(, $($field:tt)*)?) => {
        tracing::$level!(
            subsystem = $subsystem,
            message_id = %$message_id,
            $($($field)*,)?
            $msg
        )
    };
}

/// Log an owner-scoped event with `subsystem` and `owner_id`.
#[macro_export]
macro_rules! log_owner_event {
    ($level:ident, $subsystem:expr, $msg:expr, $owner_id:expr $(, $($field:tt)*)?) => {
        tracing::$level!(
            subsystem = $subsystem,
            owner_id = %$owner_id,
            $($($field)*,)?
            $msg
        )
    };
}
