//! Xenstore message type codes.
//!
//! Every header starts with one of these. `XS_ERROR` replies carry a
//! nul-terminated errno name instead of structured data, and `XS_WATCH_EVENT`
//! messages arrive unsolicited once a watch is registered.

pub const XS_DEBUG: u32 = 0;
pub const XS_DIRECTORY: u32 = 1;
pub const XS_READ: u32 = 2;
pub const XS_GET_PERMS: u32 = 3;
pub const XS_WATCH: u32 = 4;
pub const XS_UNWATCH: u32 = 5;
pub const XS_TRANSACTION_START: u32 = 6;
pub const XS_TRANSACTION_END: u32 = 7;
pub const XS_INTRODUCE: u32 = 8;
pub const XS_RELEASE: u32 = 9;
pub const XS_GET_DOMAIN_PATH: u32 = 10;
pub const XS_WRITE: u32 = 11;
pub const XS_MKDIR: u32 = 12;
pub const XS_RM: u32 = 13;
pub const XS_SET_PERMS: u32 = 14;
pub const XS_WATCH_EVENT: u32 = 15;
pub const XS_ERROR: u32 = 16;
pub const XS_IS_DOMAIN_INTRODUCED: u32 = 17;
pub const XS_RESUME: u32 = 18;
pub const XS_SET_TARGET: u32 = 19;
pub const XS_RESTRICT: u32 = 20;
pub const XS_RESET_WATCHES: u32 = 21;
pub const XS_DIRECTORY_PART: u32 = 22;

/// Returns a human-readable name for a type code.
pub fn type_name(code: u32) -> &'static str {
    match code {
        XS_DEBUG => "DEBUG",
        XS_DIRECTORY => "DIRECTORY",
        XS_READ => "READ",
        XS_GET_PERMS => "GET_PERMS",
        XS_WATCH => "WATCH",
        XS_UNWATCH => "UNWATCH",
        XS_TRANSACTION_START => "TRANSACTION_START",
        XS_TRANSACTION_END => "TRANSACTION_END",
        XS_INTRODUCE => "INTRODUCE",
        XS_RELEASE => "RELEASE",
        XS_GET_DOMAIN_PATH => "GET_DOMAIN_PATH",
        XS_WRITE => "WRITE",
        XS_MKDIR => "MKDIR",
        XS_RM => "RM",
        XS_SET_PERMS => "SET_PERMS",
        XS_WATCH_EVENT => "WATCH_EVENT",
        XS_ERROR => "ERROR",
        XS_IS_DOMAIN_INTRODUCED => "IS_DOMAIN_INTRODUCED",
        XS_RESUME => "RESUME",
        XS_SET_TARGET => "SET_TARGET",
        XS_RESTRICT => "RESTRICT",
        XS_RESET_WATCHES => "RESET_WATCHES",
        XS_DIRECTORY_PART => "DIRECTORY_PART",
        _ => "UNKNOWN",
    }
}

/// Returns true if the code is part of the protocol.
pub fn is_known(code: u32) -> bool {
    code <= XS_DIRECTORY_PART
}
