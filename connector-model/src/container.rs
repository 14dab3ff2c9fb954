// Connector container
//
// Owns the connectors under one model node and tracks which of them is the
// default. The default is a weak reference guarded by a mutex; the last
// writer wins.

use crate::connector::RemoteConnector;
use crate::error::{ContainerError, ContainerResult};
use crate::manager::ConnectionManager;
use crate::node::{AttributeValue, TargetNode, TargetPath, DISPLAY_ATTRIBUTE_NAME};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, Weak};
use tracing::{info, warn};

pub const CONTAINER_NAME: &str = "Connectors";
pub const DEFAULT_ATTRIBUTE_NAME: &str = "Default";

pub struct ConnectorContainer {
    node: TargetNode,
    connectors: Vec<Arc<RemoteConnector>>,
    default_connector: Mutex<Option<Weak<RemoteConnector>>>,
}

impl ConnectorContainer {
    /// Populate a container under `parent` with one connector per name
    ///
    /// The first connector starts out as the default. Repeated names and
    /// names that collide with the container's own attributes are skipped.
    pub fn new<I, S>(parent: &TargetPath, manager: Arc<dyn ConnectionManager>, names: I) -> Arc<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let path = parent.child(CONTAINER_NAME);

        Arc::new_cyclic(|weak: &Weak<Self>| {
            let mut connectors: Vec<Arc<RemoteConnector>> = Vec::new();
            for name in names {
                let name = name.into();
                if connectors.iter().any(|c| c.name() == name) {
                    warn!("{}: duplicate connector '{}' skipped", path, name);
                    continue;
                }
                if is_reserved_name(&name) {
                    warn!("{}: reserved connector name '{}' skipped", path, name);
                    continue;
                }
                connectors.push(Arc::new(RemoteConnector::new(
                    weak.clone(),
                    path.child(name),
                    manager.clone(),
                )));
            }

            let node = TargetNode::new(path.clone(), CONTAINER_NAME);
            let mut attributes = BTreeMap::new();
            attributes.insert(
                DISPLAY_ATTRIBUTE_NAME.to_string(),
                AttributeValue::from(CONTAINER_NAME),
            );
            if let Some(first) = connectors.first() {
                attributes.insert(
                    DEFAULT_ATTRIBUTE_NAME.to_string(),
                    AttributeValue::Object(first.path().clone()),
                );
            }
            node.change_attributes(
                Vec::new(),
                connectors.iter().map(|c| c.path().clone()).collect(),
                attributes,
                "Initialized",
            );

            info!("{}: populated {} connector(s)", path, connectors.len());

            Self {
                node,
                default_connector: Mutex::new(connectors.first().map(Arc::downgrade)),
                connectors,
            }
        })
    }

    pub fn node(&self) -> &TargetNode {
        &self.node
    }

    pub fn path(&self) -> &TargetPath {
        self.node.path()
    }

    /// Members in population order
    pub fn connectors(&self) -> &[Arc<RemoteConnector>] {
        &self.connectors
    }

    pub fn connector(&self, name: &str) -> Option<&Arc<RemoteConnector>> {
        self.connectors.iter().find(|c| c.name() == name)
    }

    pub fn find(&self, name: &str) -> ContainerResult<&Arc<RemoteConnector>> {
        self.connector(name)
            .ok_or_else(|| ContainerError::NotFound(name.to_string()))
    }

    pub fn default_connector(&self) -> Option<Arc<RemoteConnector>> {
        self.default_connector
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .and_then(Weak::upgrade)
    }

    /// Designate `connector` as the default. It must belong to this container.
    pub fn set_default_connector(&self, connector: &Arc<RemoteConnector>) -> ContainerResult<()> {
        if !self.connectors.iter().any(|c| Arc::ptr_eq(c, connector)) {
            warn!(
                "{}: refusing default {} from another container",
                self.path(),
                connector.path()
            );
            return Err(ContainerError::NotMember {
                connector: connector.path().to_string(),
                container: self.path().to_string(),
            });
        }

        let mut current = self
            .default_connector
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *current = Some(Arc::downgrade(connector));

        let mut update = BTreeMap::new();
        update.insert(
            DEFAULT_ATTRIBUTE_NAME.to_string(),
            AttributeValue::Object(connector.path().clone()),
        );
        self.node.update_attributes(update, "Default connector changed");

        info!("{}: default connector is now {}", self.path(), connector.name());
        Ok(())
    }
}

// Children are keyed by name in the same map as the container's attributes
fn is_reserved_name(name: &str) -> bool {
    name.is_empty() || name.starts_with('_') || name == DEFAULT_ATTRIBUTE_NAME
}

impl fmt::Debug for ConnectorContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectorContainer")
            .field("path", self.path())
            .field("connectors", &self.connectors)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConnectionResult;
    use async_trait::async_trait;

    struct NullManager;

    #[async_trait]
    impl ConnectionManager for NullManager {
        async fn connect(&self, _url: &str, _async_mode: bool) -> ConnectionResult<()> {
            Ok(())
        }
    }

    fn container(names: &[&str]) -> Arc<ConnectorContainer> {
        ConnectorContainer::new(&TargetPath::root(), Arc::new(NullManager), names.iter().copied())
    }

    #[test]
    fn test_population() {
        let container = container(&["c1", "c2", "c1"]);

        let names: Vec<&str> = container.connectors().iter().map(|c| c.name()).collect();
        assert_eq!(names, vec!["c1", "c2"]);
        assert_eq!(container.node().children().len(), 2);
        assert_eq!(
            container.node().attribute("c2"),
            Some(AttributeValue::Object(TargetPath::root().child("Connectors").child("c2")))
        );
        assert_eq!(container.default_connector().unwrap().name(), "c1");
    }

    #[tokio::test]
    async fn test_last_set_active_wins() {
        let container = container(&["c1", "c2"]);
        let c1 = container.find("c1").unwrap().clone();
        let c2 = container.find("c2").unwrap().clone();

        c1.set_active().await.unwrap();
        c2.set_active().await.unwrap();

        let default = container.default_connector().unwrap();
        assert!(Arc::ptr_eq(&default, &c2));
        assert_eq!(
            container.node().attribute(DEFAULT_ATTRIBUTE_NAME),
            Some(AttributeValue::Object(c2.path().clone()))
        );
    }

    #[test]
    fn test_foreign_connector_rejected() {
        let ours = container(&["c1"]);
        let theirs = container(&["c1"]);
        let foreign = theirs.connectors()[0].clone();

        let err = ours.set_default_connector(&foreign).unwrap_err();
        assert!(matches!(err, ContainerError::NotMember { .. }));
        assert!(Arc::ptr_eq(
            &ours.default_connector().unwrap(),
            &ours.connectors()[0]
        ));
    }

    #[test]
    fn test_set_default_notifies() {
        let container = container(&["c1", "c2"]);
        let mut rx = container.node().subscribe();

        container
            .set_default_connector(&container.connectors()[1].clone())
            .unwrap();

        assert_eq!(rx.try_recv().unwrap().reason, "Default connector changed");
    }

    #[test]
    fn test_reserved_names_skipped() {
        let container = container(&["A", "Default", "_display", ""]);

        let names: Vec<&str> = container.connectors().iter().map(|c| c.name()).collect();
        assert_eq!(names, vec!["A"]);
        assert_eq!(container.node().children().len(), 1);

        let a = container.find("A").unwrap();
        assert_eq!(
            container.node().attribute(DEFAULT_ATTRIBUTE_NAME),
            Some(AttributeValue::Object(a.path().clone()))
        );
        assert_eq!(
            container.node().attribute(DISPLAY_ATTRIBUTE_NAME),
            Some(AttributeValue::from(CONTAINER_NAME))
        );
        assert!(container.find("Default").is_err());
    }

    #[test]
    fn test_find_missing() {
        let container = container(&[]);
        assert_eq!(
            container.find("nope").unwrap_err(),
            ContainerError::NotFound("nope".to_string())
        );
        assert!(container.default_connector().is_none());
    }

    #[test]
    fn test_concurrent_set_default_ends_on_a_member() {
        let container = container(&["c1", "c2"]);
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let container = container.clone();
                std::thread::spawn(move || {
                    let target = container.connectors()[i % 2].clone();
                    container.set_default_connector(&target).unwrap();
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let default = container.default_connector().unwrap();
        assert!(container.connectors().iter().any(|c| Arc::ptr_eq(c, &default)));
    }
}
