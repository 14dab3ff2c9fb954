// Remote connector model for a live debugger object tree
//
// Implements the connector side of attaching to a remote debug stub:
// - Typed launch parameter descriptions
// - Tree nodes with atomic, observed attribute changes
// - Connectors that launch a connect:// attempt through a ConnectionManager
// - Containers that own connectors and track the default one

pub mod connector;
pub mod container;
pub mod error;
pub mod manager;
pub mod node;
pub mod parameters;

pub use connector::{LaunchState, PendingLaunch, RemoteConnector};
pub use container::ConnectorContainer;
pub use error::{
    ConnectionError, ConnectionResult, ContainerError, LaunchCause, LaunchFailed, ValidationError,
};
pub use manager::{connect_url, parse_connect_url, ConnectionManager};
pub use node::{AttributeChange, AttributeValue, TargetNode, TargetPath};
pub use parameters::{LaunchArgs, ParamType, ParamValue, ParameterDescriptor, ParameterSet};
