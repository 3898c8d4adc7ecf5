//! Error types for the port layer
//!
//! Only conditions detectable before the point of no return are reported
//! as `Result`s; once a context has been saved or restored there is no
//! recoverable error class left. Everything fatal at runtime goes through
//! the terminal hooks instead.

/// Port layer error type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PortError {
    /// `start_scheduler` was called a second time
    AlreadyStarted,
    /// `end_scheduler` was called before the scheduler was started
    NotStarted,
    /// No current task was registered before starting the scheduler.
    /// This is the path taken when the kernel core failed to allocate
    /// its first task.
    NoTaskSelected,
}

/// Result type alias for port operations
pub type PortResult<T> = Result<T, PortError>;
