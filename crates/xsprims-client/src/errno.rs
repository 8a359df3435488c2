//! Error names carried by `XS_ERROR` replies and their errno values.
//!
//! The host sends the symbolic name (for example `"EACCES"`); the numbers are
//! the Linux errno values the xenstore protocol has always used.

pub const EPERM: i32 = 1;
pub const ENOENT: i32 = 2;
pub const EIO: i32 = 5;
pub const E2BIG: i32 = 7;
pub const EAGAIN: i32 = 11;
pub const ENOMEM: i32 = 12;
pub const EACCES: i32 = 13;
pub const EBUSY: i32 = 16;
pub const EEXIST: i32 = 17;
pub const EISDIR: i32 = 21;
pub const EINVAL: i32 = 22;
pub const ENOSPC: i32 = 28;
pub const EROFS: i32 = 30;
pub const ENOSYS: i32 = 38;
pub const ENOTEMPTY: i32 = 39;
pub const EISCONN: i32 = 106;

/// Every error name the host may send.
pub const XSD_ERRORS: &[(i32, &str)] = &[
    (EINVAL, "EINVAL"),
    (EACCES, "EACCES"),
    (EEXIST, "EEXIST"),
    (EISDIR, "EISDIR"),
    (ENOENT, "ENOENT"),
    (ENOMEM, "ENOMEM"),
    (ENOSPC, "ENOSPC"),
    (EIO, "EIO"),
    (ENOTEMPTY, "ENOTEMPTY"),
    (ENOSYS, "ENOSYS"),
    (EROFS, "EROFS"),
    (EBUSY, "EBUSY"),
    (EAGAIN, "EAGAIN"),
    (EISCONN, "EISCONN"),
    (E2BIG, "E2BIG"),
    (EPERM, "EPERM"),
];

/// Errno for an error name. Unknown names map to `EIO`.
pub fn errno_for(name: &str) -> i32 {
    XSD_ERRORS
        .iter()
        .find(|(_, known)| *known == name)
        .map_or(EIO, |(errno, _)| *errno)
}

/// Error name for an errno, if the protocol defines one.
pub fn errno_name(errno: i32) -> Option<&'static str> {
    XSD_ERRORS
        .iter()
        .find(|(known, _)| *known == errno)
        .map(|(_, name)| *name)
}
