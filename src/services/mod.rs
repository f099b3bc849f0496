// Service exports
pub mod connection;
pub mod forms;
pub mod postgres;
pub mod tally;
pub mod tunnel;

pub use connection::{
    interactive_connect, CliPrompter, ConnectType, Connection, ConnectionError,
    ConnectionParameter, Prompter, SshTunnelParameter,
};
pub use forms::{patch_imports, CompiledForm, FormCompiler, FormError};
pub use postgres::{ImportCounts, OutdatedCounts, PostgresClient, PostgresError};
pub use tally::{PreparedTally, TallyError, TallyParameters, TallyReport, TallyService};
pub use tunnel::{SshTunnel, TunnelError};
