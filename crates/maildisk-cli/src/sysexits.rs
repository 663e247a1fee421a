//! Process exit statuses from `sysexits.h`.

use maildisk_sdk::{SdkError, StoreError};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Sysexit(pub i32);

pub const EX_DATAERR: Sysexit = Sysexit(65);
pub const EX_NOINPUT: Sysexit = Sysexit(66);
pub const EX_UNAVAILABLE: Sysexit = Sysexit(69);
pub const EX_SOFTWARE: Sysexit = Sysexit(70);
pub const EX_CANTCREAT: Sysexit = Sysexit(73);
pub const EX_IOERR: Sysexit = Sysexit(74);
pub const EX_PROTOCOL: Sysexit = Sysexit(76);
pub const EX_NOPERM: Sysexit = Sysexit(77);
pub const EX_CONFIG: Sysexit = Sysexit(78);

impl Sysexit {
    pub fn exit(self) -> ! {
        std::process::exit(self.0)
    }
}

pub fn for_store_error(err: &StoreError) -> Sysexit {
    match err {
        StoreError::ContentNotFound { .. } => EX_NOINPUT,
        StoreError::LoginFailed => EX_NOPERM,
        StoreError::MailboxAlreadyExists => EX_CANTCREAT,
        StoreError::MaxConnIsZero => EX_CONFIG,
        StoreError::InitFailed { .. } => EX_UNAVAILABLE,
        StoreError::SizeExceeded { .. } | StoreError::InvalidDigestLength { .. } => EX_DATAERR,
        StoreError::PoolClosed => EX_SOFTWARE,
        StoreError::Backend(_) => EX_PROTOCOL,
    }
}

pub fn for_error(err: &anyhow::Error) -> Sysexit {
    if let Some(sdk) = err.downcast_ref::<SdkError>() {
        return match sdk {
            SdkError::PathNotFound(_) => EX_NOINPUT,
            SdkError::Config(_) => EX_CONFIG,
            SdkError::InvalidDigest(_) => EX_DATAERR,
            SdkError::Index(_) => EX_IOERR,
            SdkError::Store(e) => for_store_error(e),
        };
    }
    if err.downcast_ref::<std::io::Error>().is_some() {
        return EX_IOERR;
    }
    EX_SOFTWARE
}
