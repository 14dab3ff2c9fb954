// Remote process connector
//
// One way of reaching a remote debug stub: a fixed Host/Port/Async parameter
// set, and a launch that binds those arguments, builds a connect:// target and
// hands it to the ConnectionManager on a spawned task.

use crate::container::ConnectorContainer;
use crate::error::{
    ConnectionError, ContainerError, ContainerResult, LaunchFailed, LaunchResult, ValidationError,
};
use crate::manager::{connect_url, ConnectionManager};
use crate::node::{
    AttributeValue, TargetNode, TargetPath, DISPLAY_ATTRIBUTE_NAME, PARAMETERS_ATTRIBUTE_NAME,
};
use crate::parameters::{BoundArgs, LaunchArgs, ParamType, ParameterDescriptor, ParameterSet};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::future::{ready, Future, Ready};
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::task::{Context, Poll};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub const HOST_PARAM: &str = "Host";
pub const PORT_PARAM: &str = "Port";
pub const ASYNC_PARAM: &str = "Async";

pub const STATE_ATTRIBUTE_NAME: &str = "State";

/// Where a connector is in its launch protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LaunchState {
    Initialized,
    Launching,
    Connected,
    LaunchFailed,
}

impl LaunchState {
    /// Reason text attached to the attribute change for this transition
    pub fn reason(&self) -> &'static str {
        match self {
            LaunchState::Initialized => "Initialized",
            LaunchState::Launching => "Launching",
            LaunchState::Connected => "Connected",
            LaunchState::LaunchFailed => "Launch failed",
        }
    }
}

impl fmt::Display for LaunchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.reason())
    }
}

/// Connector to a remote debug stub reachable at host:port
pub struct RemoteConnector {
    node: TargetNode,
    container: Weak<ConnectorContainer>,
    params: ParameterSet,
    manager: Arc<dyn ConnectionManager>,
    state: Mutex<LaunchState>,
}

impl RemoteConnector {
    pub(crate) fn new(
        container: Weak<ConnectorContainer>,
        path: TargetPath,
        manager: Arc<dyn ConnectionManager>,
    ) -> Self {
        let name = path.name().to_string();
        let node = TargetNode::new(path, name.clone());
        let params = ParameterSet::copy_of(Self::compute_parameters());

        let mut attributes = BTreeMap::new();
        attributes.insert(DISPLAY_ATTRIBUTE_NAME.to_string(), AttributeValue::Str(name));
        attributes.insert(
            PARAMETERS_ATTRIBUTE_NAME.to_string(),
            AttributeValue::Parameters(params.clone()),
        );
        attributes.insert(
            STATE_ATTRIBUTE_NAME.to_string(),
            AttributeValue::from(LaunchState::Initialized.reason()),
        );
        node.update_attributes(attributes, LaunchState::Initialized.reason());

        Self {
            node,
            container,
            params,
            manager,
            state: Mutex::new(LaunchState::Initialized),
        }
    }

    fn compute_parameters() -> Vec<ParameterDescriptor> {
        vec![
            ParameterDescriptor::create(
                ParamType::String,
                HOST_PARAM,
                true,
                "localhost",
                HOST_PARAM,
                "host for connection",
            ),
            ParameterDescriptor::create(
                ParamType::String,
                PORT_PARAM,
                true,
                "12345",
                PORT_PARAM,
                "port for connection",
            ),
            ParameterDescriptor::create(
                ParamType::Bool,
                ASYNC_PARAM,
                false,
                true,
                ASYNC_PARAM,
                "connect asynchronously",
            ),
        ]
    }

    pub fn name(&self) -> &str {
        self.node.display()
    }

    pub fn path(&self) -> &TargetPath {
        self.node.path()
    }

    pub fn node(&self) -> &TargetNode {
        &self.node
    }

    /// The frozen launch parameters, in display order
    pub fn parameters(&self) -> &ParameterSet {
        &self.params
    }

    pub fn state(&self) -> LaunchState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make this connector its container's default
    pub fn set_active(self: &Arc<Self>) -> Ready<ContainerResult<()>> {
        let result = match self.container.upgrade() {
            Some(container) => container.set_default_connector(self),
            None => Err(ContainerError::Detached(self.path().to_string())),
        };
        ready(result)
    }

    /// Start a connection attempt
    ///
    /// Returns at once; the connect runs on a spawned tokio task. Dropping the
    /// returned future does not stop the attempt.
    pub fn launch(self: &Arc<Self>, args: LaunchArgs) -> PendingLaunch {
        let serialized = serde_json::to_string(&args).unwrap_or_else(|_| format!("{:?}", args));

        let (url, async_mode) = match self.params.bind(&args).and_then(|b| Self::target(&b)) {
            Ok(target) => target,
            Err(e) => {
                warn!("{}: rejected launch arguments: {}", self.path(), e);
                self.transition(LaunchState::LaunchFailed);
                let failure = LaunchFailed::new(serialized.clone(), e);
                return PendingLaunch::ready(serialized, Err(failure));
            }
        };

        self.transition(LaunchState::Launching);
        info!("{}: connecting to {} (async={})", self.path(), url, async_mode);

        let connector = Arc::clone(self);
        let args = serialized.clone();
        let handle = tokio::spawn(async move {
            match connector.manager.connect(&url, async_mode).await {
                Ok(()) => {
                    connector.transition(LaunchState::Connected);
                    info!("{}: connected to {}", connector.path(), url);
                    Ok(())
                }
                Err(e) => {
                    connector.transition(LaunchState::LaunchFailed);
                    warn!("{}: connect to {} failed: {}", connector.path(), url, e);
                    Err(LaunchFailed::new(args, e))
                }
            }
        });

        PendingLaunch::spawned(serialized, handle)
    }

    fn target(bound: &BoundArgs) -> Result<(String, bool), ValidationError> {
        let host = bound.string(HOST_PARAM)?;
        let port = bound.string(PORT_PARAM)?;
        let async_mode = bound.boolean(ASYNC_PARAM)?;
        Ok((connect_url(host, port), async_mode))
    }

    fn transition(&self, next: LaunchState) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        debug!("{}: {} -> {}", self.path(), *state, next);
        *state = next;

        let mut update = BTreeMap::new();
        update.insert(
            STATE_ATTRIBUTE_NAME.to_string(),
            AttributeValue::from(next.reason()),
        );
        self.node.update_attributes(update, next.reason());
    }
}

impl fmt::Debug for RemoteConnector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteConnector")
            .field("path", self.path())
            .field("state", &self.state())
            .field("params", &self.params.names())
            .finish_non_exhaustive()
    }
}

/// Result of a launch that may still be in flight
///
/// Polling again after it has resolved yields an `Aborted` launch failure.
#[derive(Debug)]
pub struct PendingLaunch {
    inner: PendingInner,
    args: String,
}

#[derive(Debug)]
enum PendingInner {
    Ready(LaunchResult<()>),
    Spawned(JoinHandle<LaunchResult<()>>),
    Done,
}

impl PendingLaunch {
    fn ready(args: String, result: LaunchResult<()>) -> Self {
        Self {
            inner: PendingInner::Ready(result),
            args,
        }
    }

    fn spawned(args: String, handle: JoinHandle<LaunchResult<()>>) -> Self {
        Self {
            inner: PendingInner::Spawned(handle),
            args,
        }
    }

    fn aborted(&self, reason: String) -> LaunchFailed {
        LaunchFailed::new(self.args.clone(), ConnectionError::Aborted(reason))
    }
}

impl Future for PendingLaunch {
    type Output = LaunchResult<()>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match std::mem::replace(&mut this.inner, PendingInner::Done) {
            PendingInner::Ready(result) => Poll::Ready(result),
            PendingInner::Spawned(mut handle) => match Pin::new(&mut handle).poll(cx) {
                Poll::Pending => {
                    this.inner = PendingInner::Spawned(handle);
                    Poll::Pending
                }
                Poll::Ready(Ok(result)) => Poll::Ready(result),
                Poll::Ready(Err(e)) => Poll::Ready(Err(this.aborted(e.to_string()))),
            },
            PendingInner::Done => {
                Poll::Ready(Err(this.aborted("launch result already taken".to_string())))
            }
        }
    }
}
