//! Deployment impacter: what a scale operation adds or removes.
//!
//! Counts are per parent instance. Scaling `Java` hosted on `WebServer` to
//! 2 means two `Java` instances under every live `WebServer` instance.

use cairn_core::{CoreResult, InstanceId, RelationshipId};
use cairn_topology::Topology;
use tracing::debug;

/// Instances and relationship instances touched by one scale operation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScaleImpact {
    /// Node being scaled
    pub node: String,
    /// Node instances added or to be removed, descendants included
    pub instances: Vec<InstanceId>,
    /// Relationship instances added or to be removed
    pub relationships: Vec<RelationshipId>,
}

impl ScaleImpact {
    fn new(node: &str) -> Self {
        Self {
            node: node.to_string(),
            ..Self::default()
        }
    }

    /// Whether nothing changes
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty() && self.relationships.is_empty()
    }
}

/// Computes scale impacts
#[derive(Debug, Clone, Copy, Default)]
pub struct Impacter;

impl Impacter {
    /// Parent instances a node is scaled under; `None` for a root node
    ///
    /// # Errors
    ///
    /// Returns error if the node is unknown
    pub fn groups(topology: &Topology, node: &str) -> CoreResult<Vec<Option<InstanceId>>> {
        Ok(match &topology.node(node)?.parent {
            Some(parent) => topology.instances_of(parent).into_iter().map(Some).collect(),
            None => vec![None],
        })
    }

    /// Current per-parent counts of a node
    ///
    /// # Errors
    ///
    /// Returns error if the node is unknown
    pub fn counts(topology: &Topology, node: &str) -> CoreResult<Vec<u32>> {
        Ok(Self::groups(topology, node)?
            .into_iter()
            .map(|parent| count(topology, node, parent))
            .collect())
    }

    /// Add instances until every parent holds `target`, then generate the
    /// relationship instances the new instances take part in
    ///
    /// The topology is mutated; nothing is installed.
    ///
    /// # Errors
    ///
    /// Returns error if the node is unknown or a host cannot be resolved
    pub fn scale_up(topology: &mut Topology, node: &str, target: u32) -> CoreResult<ScaleImpact> {
        let mut impact = ScaleImpact::new(node);
        for parent in Self::groups(topology, node)? {
            let current = count(topology, node, parent);
            if current < target {
                let created = topology.add_instances(node, parent, target - current)?;
                impact.instances.extend(created);
            }
        }
        impact.relationships = topology.generate_relationships();
        debug!(
            node,
            target,
            instances = impact.instances.len(),
            relationships = impact.relationships.len(),
            "scale-up impact"
        );
        Ok(impact)
    }

    /// Select the highest-index instances above `target` under every parent,
    /// with everything that has to go with them
    ///
    /// The topology is not mutated.
    ///
    /// # Errors
    ///
    /// Returns error if the node is unknown
    pub fn scale_down(topology: &Topology, node: &str, target: u32) -> CoreResult<ScaleImpact> {
        let mut roots = Vec::new();
        for parent in Self::groups(topology, node)? {
            let live = topology.instances_under(node, parent);
            let keep = usize::try_from(target).unwrap_or(usize::MAX);
            if live.len() > keep {
                roots.extend_from_slice(&live[keep..]);
            }
        }
        let (instances, relationships) = topology.removal_closure(&roots);
        debug!(
            node,
            target,
            instances = instances.len(),
            relationships = relationships.len(),
            "scale-down impact"
        );
        Ok(ScaleImpact {
            node: node.to_string(),
            instances,
            relationships,
        })
    }
}

fn count(topology: &Topology, node: &str, parent: Option<InstanceId>) -> u32 {
    u32::try_from(topology.instances_under(node, parent).len()).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cairn_sim::SimEnvironment;
    use cairn_topology::{NodeDescription, RelationshipDescription, TopologyDescription};

    fn web_java(env: &SimEnvironment) -> Topology {
        let desc = TopologyDescription::new("web")
            .with_node(NodeDescription::new("WebServer", "Compute").with_instances(1, 4, 2))
            .with_node(NodeDescription::new("Java", "Software").with_host("WebServer"))
            .with_relationship(RelationshipDescription::new(
                "java_on_web",
                "HostedOn",
                "Java",
                "WebServer",
            ));
        Topology::from_description(&desc, &env.registry()).unwrap()
    }

    fn names(topology: &Topology, ids: &[InstanceId]) -> Vec<String> {
        ids.iter()
            .map(|id| topology.instance(*id).unwrap().name.clone())
            .collect()
    }

    #[test]
    fn test_scale_up_includes_children_and_relationships() {
        let env = SimEnvironment::new();
        let mut topology = web_java(&env);
        let impact = Impacter::scale_up(&mut topology, "WebServer", 3).unwrap();
        assert_eq!(names(&topology, &impact.instances), vec!["WebServer_3", "Java_3"]);
        assert_eq!(impact.relationships.len(), 1);
        let rel = topology.relationship(impact.relationships[0]).unwrap();
        assert_eq!(topology.instance(rel.source).unwrap().name, "Java_3");
        assert_eq!(topology.instance(rel.target).unwrap().name, "WebServer_3");
    }

    #[test]
    fn test_scale_child_per_parent() {
        let env = SimEnvironment::new();
        let mut topology = web_java(&env);
        let impact = Impacter::scale_up(&mut topology, "Java", 2).unwrap();
        assert_eq!(impact.instances.len(), 2);
        assert_eq!(Impacter::counts(&topology, "Java").unwrap(), vec![2, 2]);
    }

    #[test]
    fn test_scale_down_takes_highest_index() {
        let env = SimEnvironment::new();
        let mut topology = web_java(&env);
        Impacter::scale_up(&mut topology, "WebServer", 4).unwrap();
        let impact = Impacter::scale_down(&topology, "WebServer", 2).unwrap();
        let mut removed = names(&topology, &impact.instances);
        removed.sort();
        assert_eq!(removed, vec!["Java_3", "Java_4", "WebServer_3", "WebServer_4"]);
        assert_eq!(impact.relationships.len(), 2);
        // Nothing leaves the topology until the uninstall completes
        assert_eq!(topology.instance_count(), 8);
    }

    #[test]
    fn test_unchanged_count_is_empty() {
        let env = SimEnvironment::new();
        let mut topology = web_java(&env);
        assert!(Impacter::scale_up(&mut topology, "WebServer", 2).unwrap().is_empty());
        assert!(Impacter::scale_down(&topology, "WebServer", 2).unwrap().is_empty());
        assert!(Impacter::groups(&topology, "Nope").is_err());
    }
}
