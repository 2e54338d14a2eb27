//! Open flags for database connections.

use bitflags::bitflags;

bitflags! {
    /// Flags controlling how a driver opens the backing store.
    ///
    /// Drivers may ignore flags they cannot honor (`DISABLE_SYNC` in
    /// particular is advisory).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct DatabaseFlags: u32 {
        /// Create the backing store if it does not exist.
        const CREATE_IF_NOT_EXISTS = 1;
        /// Refuse write transactions on this connection.
        const READ_ONLY = 2;
        /// Relax commit durability (the driver may ignore this).
        const DISABLE_SYNC = 4;
    }
}
