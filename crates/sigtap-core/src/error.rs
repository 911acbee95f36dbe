//! Error types shared by every sigtap component.
//!
//! Each [`Error`] variant corresponds to one [`Status`] kind and carries a
//! short context message describing what was being attempted. The kind is
//! what callers match on; the message is for humans and logs.

use core::fmt;
use thiserror::Error;

/// Result alias used throughout sigtap.
pub type Result<T> = core::result::Result<T, Error>;

/// Failure kinds, without context.
///
/// The discriminants are stable and appear in [`ErrorReport`](crate::ErrorReport)
/// records handed to error sinks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Status {
    /// Operation is only legal while the module is initializing.
    NotInitializing = 2,
    /// An argument was missing or out of its domain.
    InvalidArgument = 3,
    /// An index or size was outside the accepted range.
    OutOfBounds = 4,
    /// Lookup did not find the requested element.
    ElementNotFound = 5,
    /// An element with the same identity already exists.
    DuplicateEntry = 6,
    /// A resource was used before being initialized.
    ResourceUninitialized = 7,
    /// A required resource does not exist.
    ResourceNotFound = 8,
    /// A resource that should be absent already exists.
    ResourceExisting = 9,
    /// A lock or other synchronization primitive could not be acquired.
    ResourceException = 10,
    /// Memory could not be reserved.
    AllocationFailed = 11,
    /// Data did not have the expected format.
    InvalidFormat = 12,
    /// The component still waits for configuration.
    PendingConfiguration = 13,
    /// No view is selected for a directive.
    NoViewSelected = 14,
    /// The app does not have the expected type.
    WrongAppType = 15,
    /// No app instance is attached to the session.
    AppInstanceNotFound = 16,
    /// The media-interception facility refused or failed.
    MediaBug = 17,
}

impl Status {
    /// Canonical, context-free description of this status.
    pub const fn message(self) -> &'static str {
        match self {
            Self::NotInitializing => "module initialization completed; operation not permitted",
            Self::InvalidArgument => "invalid argument",
            Self::OutOfBounds => "out of bounds",
            Self::ElementNotFound => "element not found",
            Self::DuplicateEntry => "duplicate entry",
            Self::ResourceUninitialized => "resource uninitialized",
            Self::ResourceNotFound => "resource not found",
            Self::ResourceExisting => "resource already exists",
            Self::ResourceException => "resource exception",
            Self::AllocationFailed => "allocation failed",
            Self::InvalidFormat => "invalid format",
            Self::PendingConfiguration => "configuration pending",
            Self::NoViewSelected => "no view selected",
            Self::WrongAppType => "wrong app type",
            Self::AppInstanceNotFound => "app instance not found",
            Self::MediaBug => "media bug error",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Errors returned by sigtap operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// Mutation attempted after module initialization completed.
    #[error("module initialization completed; operation not permitted: {0}")]
    NotInitializing(String),

    /// Missing or out-of-domain argument.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Index or size outside the accepted range.
    #[error("out of bounds: {0}")]
    OutOfBounds(String),

    /// Requested element was not found.
    #[error("element not found: {0}")]
    ElementNotFound(String),

    /// Element with the same identity already exists.
    #[error("duplicate entry: {0}")]
    DuplicateEntry(String),

    /// Resource used before initialization.
    #[error("resource uninitialized: {0}")]
    ResourceUninitialized(String),

    /// Required resource does not exist.
    #[error("resource not found: {0}")]
    ResourceNotFound(String),

    /// Resource exists but should not.
    #[error("resource already exists: {0}")]
    ResourceExisting(String),

    /// Lock acquisition timed out or a primitive failed.
    #[error("resource exception: {0}")]
    ResourceException(String),

    /// Memory reservation failed.
    #[error("allocation failed: {0}")]
    AllocationFailed(String),

    /// Data had an unexpected format.
    #[error("invalid format: {0}")]
    InvalidFormat(String),

    /// Configuration has not been completed yet.
    #[error("configuration pending: {0}")]
    PendingConfiguration(String),

    /// No view is selected.
    #[error("no view selected: {0}")]
    NoViewSelected(String),

    /// App type mismatch.
    #[error("wrong app type: {0}")]
    WrongAppType(String),

    /// No app instance is attached to the session.
    #[error("app instance not found: {0}")]
    AppInstanceNotFound(String),

    /// Media interception could not be installed or removed.
    #[error("media bug error: {0}")]
    MediaBug(String),
}

impl Error {
    /// The context-free kind of this error.
    pub fn kind(&self) -> Status {
        match self {
            Self::NotInitializing(_) => Status::NotInitializing,
            Self::InvalidArgument(_) => Status::InvalidArgument,
            Self::OutOfBounds(_) => Status::OutOfBounds,
            Self::ElementNotFound(_) => Status::ElementNotFound,
            Self::DuplicateEntry(_) => Status::DuplicateEntry,
            Self::ResourceUninitialized(_) => Status::ResourceUninitialized,
            Self::ResourceNotFound(_) => Status::ResourceNotFound,
            Self::ResourceExisting(_) => Status::ResourceExisting,
            Self::ResourceException(_) => Status::ResourceException,
            Self::AllocationFailed(_) => Status::AllocationFailed,
            Self::InvalidFormat(_) => Status::InvalidFormat,
            Self::PendingConfiguration(_) => Status::PendingConfiguration,
            Self::NoViewSelected(_) => Status::NoViewSelected,
            Self::WrongAppType(_) => Status::WrongAppType,
            Self::AppInstanceNotFound(_) => Status::AppInstanceNotFound,
            Self::MediaBug(_) => Status::MediaBug,
        }
    }

    /// Context message without the kind prefix.
    pub fn context(&self) -> &str {
        match self {
            Self::NotInitializing(m)
            | Self::InvalidArgument(m)
            | Self::OutOfBounds(m)
            | Self::ElementNotFound(m)
            | Self::DuplicateEntry(m)
            | Self::ResourceUninitialized(m)
            | Self::ResourceNotFound(m)
            | Self::ResourceExisting(m)
            | Self::ResourceException(m)
            | Self::AllocationFailed(m)
            | Self::InvalidFormat(m)
            | Self::PendingConfiguration(m)
            | Self::NoViewSelected(m)
            | Self::WrongAppType(m)
            | Self::AppInstanceNotFound(m)
            | Self::MediaBug(m) => m,
        }
    }

    /// Create a not-initializing error.
    pub fn not_initializing(what: impl Into<String>) -> Self {
        Self::NotInitializing(what.into())
    }

    /// Create an invalid-argument error.
    pub fn invalid_argument(what: impl Into<String>) -> Self {
        Self::InvalidArgument(what.into())
    }

    /// Create a resource-exception error.
    pub fn resource_exception(what: impl Into<String>) -> Self {
        Self::ResourceException(what.into())
    }

    /// Create an allocation-failed error.
    pub fn allocation_failed(what: impl Into<String>) -> Self {
        Self::AllocationFailed(what.into())
    }
}
