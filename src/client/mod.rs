//! Client connection layer

pub mod control_plane;
#[cfg(test)]
pub(crate) mod mock;
pub mod pg_connection;

pub use control_plane::{
    share, ConnectionSource, ResultSet, ServiceConnection, ServiceConnectionExt,
    SharedConnection,
};
pub use pg_connection::{ConnectionFactory, PgConnection};
