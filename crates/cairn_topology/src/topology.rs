//! The topology aggregate.
//!
//! A `Topology` owns every scaling group and every live instance. Instances
//! live in arenas keyed by id and are handed out as `Arc`s so a running
//! workflow can keep using an instance after it has been pruned here.
//!
//! Relationship generation follows the sibling rule: two instances are only
//! connected when no scaling group appears in both of their ancestor chains
//! with different instances. `Tomcat_1/War_1` and `Tomcat_2/War_2` each get
//! their own load balancer link instead of a cross product.

use crate::description::TopologyDescription;
use crate::instance::{Attributes, NodeInstance, RelationshipInstance};
use crate::node::{DeploymentNode, DeploymentRelationshipNode};
use crate::registry::TypeRegistry;
use crate::validate::{into_core_error, Validator};
use cairn_core::{CoreError, CoreResult, InstanceId, RelationshipId};
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

type Pending = IndexMap<InstanceId, NodeInstance>;

/// Scaling groups plus the live instances generated from them
#[derive(Debug, Default)]
pub struct Topology {
    name: String,
    nodes: IndexMap<String, DeploymentNode>,
    relationship_nodes: IndexMap<String, DeploymentRelationshipNode>,
    instances: IndexMap<InstanceId, Arc<NodeInstance>>,
    relationships: IndexMap<RelationshipId, Arc<RelationshipInstance>>,
}

impl Topology {
    /// Validate a description and generate its default instances and
    /// relationship instances
    ///
    /// # Errors
    ///
    /// Returns error if the description is invalid or a host cannot be resolved
    pub fn from_description(
        desc: &TopologyDescription,
        registry: &TypeRegistry,
    ) -> CoreResult<Self> {
        Validator::new(registry)
            .validate(desc)
            .map_err(|errors| into_core_error(&errors))?;

        let mut topology = Self {
            name: desc.name.clone(),
            ..Self::default()
        };
        for node in &desc.nodes {
            let entry = registry.node_type(&node.type_name)?.clone();
            topology
                .nodes
                .insert(node.name.clone(), DeploymentNode::new(node, entry));
        }
        for rel in &desc.relationships {
            let entry = registry.relationship_type(&rel.type_name)?.clone();
            topology
                .relationship_nodes
                .insert(rel.name.clone(), DeploymentRelationshipNode::new(rel, entry));
        }

        let roots: Vec<(String, u32)> = topology
            .nodes
            .values()
            .filter(|n| n.parent.is_none())
            .map(|n| (n.name.clone(), n.bounds.default))
            .collect();
        for (node, count) in roots {
            topology.add_instances(&node, None, count)?;
        }
        let relationships = topology.generate_relationships();

        debug!(
            topology = %topology.name,
            instances = topology.instances.len(),
            relationships = relationships.len(),
            "topology instantiated"
        );
        Ok(topology)
    }

    /// Topology name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Look up a scaling group
    ///
    /// # Errors
    ///
    /// Returns error if no node has that name
    pub fn node(&self, name: &str) -> CoreResult<&DeploymentNode> {
        self.nodes
            .get(name)
            .ok_or_else(|| CoreError::not_found("node", name))
    }

    /// Look up a relationship group
    ///
    /// # Errors
    ///
    /// Returns error if no relationship node has that name
    pub fn relationship_node(&self, name: &str) -> CoreResult<&DeploymentRelationshipNode> {
        self.relationship_nodes
            .get(name)
            .ok_or_else(|| CoreError::not_found("relationship node", name))
    }

    /// All scaling groups, in declaration order
    pub fn nodes(&self) -> impl Iterator<Item = &DeploymentNode> {
        self.nodes.values()
    }

    /// All relationship groups, in declaration order
    pub fn relationship_nodes(&self) -> impl Iterator<Item = &DeploymentRelationshipNode> {
        self.relationship_nodes.values()
    }

    /// Look up a node instance
    #[must_use]
    pub fn instance(&self, id: InstanceId) -> Option<&Arc<NodeInstance>> {
        self.instances.get(&id)
    }

    /// Look up a node instance by name
    #[must_use]
    pub fn instance_by_name(&self, name: &str) -> Option<&Arc<NodeInstance>> {
        self.instances.get(&InstanceId::from_name(name))
    }

    /// Look up a relationship instance
    #[must_use]
    pub fn relationship(&self, id: RelationshipId) -> Option<&Arc<RelationshipInstance>> {
        self.relationships.get(&id)
    }

    /// All node instances, in creation order
    pub fn instances(&self) -> impl Iterator<Item = &Arc<NodeInstance>> {
        self.instances.values()
    }

    /// All relationship instances, in creation order
    pub fn relationships(&self) -> impl Iterator<Item = &Arc<RelationshipInstance>> {
        self.relationships.values()
    }

    /// Ids of every node instance
    #[must_use]
    pub fn instance_ids(&self) -> Vec<InstanceId> {
        self.instances.keys().copied().collect()
    }

    /// Ids of every relationship instance
    #[must_use]
    pub fn relationship_ids(&self) -> Vec<RelationshipId> {
        self.relationships.keys().copied().collect()
    }

    /// Number of node instances
    #[must_use]
    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    /// Number of relationship instances
    #[must_use]
    pub fn relationship_count(&self) -> usize {
        self.relationships.len()
    }

    /// Live instances of a node, in creation order
    #[must_use]
    pub fn instances_of(&self, node: &str) -> Vec<InstanceId> {
        self.nodes
            .get(node)
            .map(|n| n.instances().iter().copied().collect())
            .unwrap_or_default()
    }

    /// Live instances of a node under one parent instance, ordered by index
    #[must_use]
    pub fn instances_under(&self, node: &str, parent: Option<InstanceId>) -> Vec<InstanceId> {
        let mut found: Vec<&Arc<NodeInstance>> = self
            .instances_of(node)
            .into_iter()
            .filter_map(|id| self.instances.get(&id))
            .filter(|inst| inst.parent == parent)
            .collect();
        found.sort_by_key(|inst| inst.index);
        found.into_iter().map(|inst| inst.id).collect()
    }

    /// Instances whose structural parent is `id`
    #[must_use]
    pub fn children_of(&self, id: InstanceId) -> Vec<InstanceId> {
        self.instances
            .values()
            .filter(|inst| inst.parent == Some(id))
            .map(|inst| inst.id)
            .collect()
    }

    /// Instances hosted on `id`
    #[must_use]
    pub fn hosted_on(&self, id: InstanceId) -> Vec<InstanceId> {
        self.instances
            .values()
            .filter(|inst| inst.host == Some(id))
            .map(|inst| inst.id)
            .collect()
    }

    /// Host and parent of an instance, without duplicates
    #[must_use]
    pub fn structural_parents(&self, id: InstanceId) -> Vec<InstanceId> {
        let Some(inst) = self.instances.get(&id) else {
            return Vec::new();
        };
        let mut parents = Vec::with_capacity(2);
        for candidate in [inst.host, inst.parent].into_iter().flatten() {
            if !parents.contains(&candidate) {
                parents.push(candidate);
            }
        }
        parents
    }

    /// Every instance above `id` along host and parent links
    #[must_use]
    pub fn structural_ancestors(&self, id: InstanceId) -> Vec<InstanceId> {
        let mut ancestors: Vec<InstanceId> = Vec::new();
        let mut frontier = self.structural_parents(id);
        while let Some(next) = frontier.pop() {
            if next == id || ancestors.contains(&next) {
                continue;
            }
            ancestors.push(next);
            frontier.extend(self.structural_parents(next));
        }
        ancestors
    }

    /// Instances that `id` declares a dependency on
    ///
    /// Each declared node resolves to the instances of that node reachable
    /// under the sibling rule.
    #[must_use]
    pub fn dependency_targets(&self, id: InstanceId) -> Vec<InstanceId> {
        let Some(node) = self.instances.get(&id).and_then(|inst| self.nodes.get(&inst.node)) else {
            return Vec::new();
        };
        node.depends_on
            .iter()
            .flat_map(|dep| self.instances_of(dep))
            .filter(|target| *target != id && self.connected(id, *target))
            .collect()
    }

    /// Relationship instances with `id` as an endpoint
    #[must_use]
    pub fn relationships_of(&self, id: InstanceId) -> Vec<RelationshipId> {
        self.relationships
            .values()
            .filter(|rel| rel.touches(id))
            .map(|rel| rel.id)
            .collect()
    }

    /// Whether two instances may be linked under the sibling rule
    #[must_use]
    pub fn connected(&self, a: InstanceId, b: InstanceId) -> bool {
        self.connected_in(&Pending::new(), a, b)
    }

    /// Generate `count` new instances of `node` under `parent`, along with
    /// the default number of each child node under every new instance
    ///
    /// New instances are inserted with their hosts resolved. Relationship
    /// instances are not generated; call [`Topology::generate_relationships`].
    ///
    /// # Errors
    ///
    /// Returns error if the node is unknown, `parent` does not match the
    /// node's declared parent, or a host cannot be resolved
    pub fn add_instances(
        &mut self,
        node: &str,
        parent: Option<InstanceId>,
        count: u32,
    ) -> CoreResult<Vec<InstanceId>> {
        let declared = self.node(node)?.parent.clone();
        let actual = match parent {
            Some(id) => Some(
                self.instances
                    .get(&id)
                    .ok_or_else(|| CoreError::not_found("instance", id))?
                    .node
                    .clone(),
            ),
            None => None,
        };
        if declared != actual {
            return Err(CoreError::validation(
                "parent",
                format!(
                    "{node} must be created under {}, got {}",
                    declared.as_deref().unwrap_or("no parent"),
                    actual.as_deref().unwrap_or("no parent")
                ),
            ));
        }

        let mut pending = Pending::new();
        self.spawn(&mut pending, node, parent, count)?;

        let mut hosts = Vec::new();
        for inst in pending.values() {
            if let Some(host_node) = self.nodes.get(&inst.node).and_then(|n| n.host.as_deref()) {
                hosts.push((inst.id, self.resolve_host(&pending, inst, host_node)?));
            }
        }

        let created: Vec<InstanceId> = pending.keys().copied().collect();
        for (id, inst) in pending {
            let host = hosts.iter().find(|(owner, _)| *owner == id).map(|(_, h)| *h);
            if let Some(group) = self.nodes.get_mut(&inst.node) {
                group.add_instance(id);
            }
            self.instances.insert(id, Arc::new(inst.with_host(host)));
        }
        Ok(created)
    }

    fn spawn(
        &mut self,
        pending: &mut Pending,
        node: &str,
        parent: Option<InstanceId>,
        count: u32,
    ) -> CoreResult<()> {
        let children: Vec<(String, u32)> = self
            .nodes
            .values()
            .filter(|n| n.parent.as_deref() == Some(node))
            .map(|n| (n.name.clone(), n.bounds.default))
            .collect();

        for _ in 0..count {
            let group = self
                .nodes
                .get_mut(node)
                .ok_or_else(|| CoreError::not_found("node", node))?;
            let index = group.allocate_index();
            let entry = &group.node_type;
            let inst = NodeInstance::new(
                node,
                index,
                &entry.name,
                entry.capabilities.clone(),
                entry.construct(),
            )
            .with_parent(parent);
            let id = inst.id;
            pending.insert(id, inst);

            for (child, child_count) in &children {
                self.spawn(pending, child, Some(id), *child_count)?;
            }
        }
        Ok(())
    }

    fn lookup<'a>(&'a self, pending: &'a Pending, id: InstanceId) -> Option<&'a NodeInstance> {
        pending
            .get(&id)
            .or_else(|| self.instances.get(&id).map(AsRef::as_ref))
    }

    /// The instance followed by its ancestors
    fn chain<'a>(&'a self, pending: &'a Pending, id: InstanceId) -> Vec<&'a NodeInstance> {
        let mut chain = Vec::new();
        let mut current = self.lookup(pending, id);
        while let Some(inst) = current {
            chain.push(inst);
            current = inst.parent.and_then(|p| self.lookup(pending, p));
        }
        chain
    }

    fn connected_in(&self, pending: &Pending, a: InstanceId, b: InstanceId) -> bool {
        let left = self.chain(pending, a);
        let right = self.chain(pending, b);
        !left.iter().any(|pa| {
            right
                .iter()
                .any(|pb| pa.node == pb.node && pa.id != pb.id)
        })
    }

    fn resolve_host(
        &self,
        pending: &Pending,
        inst: &NodeInstance,
        host_node: &str,
    ) -> CoreResult<InstanceId> {
        let chain = self.chain(pending, inst.id);
        if let Some(ancestor) = chain.iter().skip(1).find(|a| a.node == host_node) {
            return Ok(ancestor.id);
        }

        let existing = self.instances_of(host_node);
        let fresh = pending
            .values()
            .filter(|p| p.node == host_node)
            .map(|p| p.id);
        existing
            .into_iter()
            .chain(fresh)
            .find(|candidate| self.connected_in(pending, inst.id, *candidate))
            .ok_or_else(|| {
                CoreError::not_found("host instance", format!("{host_node} for {}", inst.name))
            })
    }

    /// Generate every missing relationship instance
    ///
    /// Pairs already linked are skipped, so after a scale-up this returns
    /// exactly the relationship instances touching new node instances.
    pub fn generate_relationships(&mut self) -> Vec<RelationshipId> {
        let mut fresh = Vec::new();
        for group in self.relationship_nodes.values() {
            let sources = self.instances_of(&group.source);
            let targets = self.instances_of(&group.target);
            for source in &sources {
                for target in &targets {
                    if source == target {
                        continue;
                    }
                    if !group.many_to_many && !self.connected(*source, *target) {
                        continue;
                    }
                    let id = RelationshipId::from_endpoints(&group.name, *source, *target);
                    if self.relationships.contains_key(&id) {
                        continue;
                    }
                    let entry = &group.relationship_type;
                    fresh.push(RelationshipInstance::new(
                        &group.name,
                        &entry.name,
                        *source,
                        *target,
                        entry.capabilities.clone(),
                        entry.construct(),
                    ));
                }
            }
        }

        let mut created = Vec::with_capacity(fresh.len());
        for rel in fresh {
            let id = rel.id;
            if let Some(group) = self.relationship_nodes.get_mut(&rel.relationship) {
                group.add_instance(id);
            }
            self.relationships.insert(id, Arc::new(rel));
            created.push(id);
        }
        created
    }

    /// Instances and relationship instances that must go with `roots`:
    /// the roots, their descendants, anything hosted on them, and every
    /// relationship instance touching one of those
    #[must_use]
    pub fn removal_closure(&self, roots: &[InstanceId]) -> (Vec<InstanceId>, Vec<RelationshipId>) {
        let mut closure: IndexSet<InstanceId> = IndexSet::new();
        let mut stack: Vec<InstanceId> = roots.to_vec();
        while let Some(id) = stack.pop() {
            if !self.instances.contains_key(&id) || !closure.insert(id) {
                continue;
            }
            stack.extend(self.children_of(id));
            stack.extend(self.hosted_on(id));
        }

        let relationships = self
            .relationships
            .values()
            .filter(|rel| closure.contains(&rel.source) || closure.contains(&rel.target))
            .map(|rel| rel.id)
            .collect();
        (closure.into_iter().collect(), relationships)
    }

    /// Drop instances and relationship instances from the topology
    ///
    /// Returns how many entries were actually removed.
    pub fn remove(&mut self, instances: &[InstanceId], relationships: &[RelationshipId]) -> usize {
        let mut removed = 0;
        for id in relationships {
            if let Some(rel) = self.relationships.shift_remove(id) {
                if let Some(group) = self.relationship_nodes.get_mut(&rel.relationship) {
                    group.remove_instance(*id);
                }
                removed += 1;
            }
        }
        for id in instances {
            if let Some(inst) = self.instances.shift_remove(id) {
                if let Some(group) = self.nodes.get_mut(&inst.node) {
                    group.remove_instance(*id);
                }
                removed += 1;
            }
        }
        removed
    }

    /// Serializable view of the current state
    #[must_use]
    pub fn snapshot(&self) -> TopologySnapshot {
        let name_of = |id: InstanceId| {
            self.instances
                .get(&id)
                .map_or_else(|| id.to_string(), |inst| inst.name.clone())
        };
        TopologySnapshot {
            name: self.name.clone(),
            instances: self
                .instances
                .values()
                .map(|inst| InstanceSnapshot {
                    name: inst.name.clone(),
                    node: inst.node.clone(),
                    type_name: inst.type_name.clone(),
                    parent: inst.parent.map(name_of),
                    host: inst.host.map(name_of),
                    state: inst.state(),
                    attributes: inst.attributes(),
                })
                .collect(),
            relationships: self
                .relationships
                .values()
                .map(|rel| RelationshipSnapshot {
                    relationship: rel.relationship.clone(),
                    type_name: rel.type_name.clone(),
                    source: name_of(rel.source),
                    target: name_of(rel.target),
                    state: rel.state(),
                    attributes: rel.attributes(),
                })
                .collect(),
        }
    }
}

/// Serializable view of one node instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceSnapshot {
    /// Instance name
    pub name: String,
    /// Scaling group
    pub node: String,
    /// Type name
    #[serde(rename = "type")]
    pub type_name: String,
    /// Parent instance name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    /// Host instance name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    /// State string
    pub state: String,
    /// Attribute map
    #[serde(default)]
    pub attributes: Attributes,
}

/// Serializable view of one relationship instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipSnapshot {
    /// Relationship node name
    pub relationship: String,
    /// Type name
    #[serde(rename = "type")]
    pub type_name: String,
    /// Source instance name
    pub source: String,
    /// Target instance name
    pub target: String,
    /// State string
    pub state: String,
    /// Attribute map
    #[serde(default)]
    pub attributes: Attributes,
}

/// Serializable view of a whole topology
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopologySnapshot {
    /// Topology name
    pub name: String,
    /// Node instances
    pub instances: Vec<InstanceSnapshot>,
    /// Relationship instances
    pub relationships: Vec<RelationshipSnapshot>,
}

impl TopologySnapshot {
    /// Find an instance by name
    #[must_use]
    pub fn instance(&self, name: &str) -> Option<&InstanceSnapshot> {
        self.instances.iter().find(|i| i.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::description::{NodeDescription, RelationshipDescription};
    use crate::lifecycle::NoopLifecycle;
    use crate::registry::{NodeKind, NodeTypeEntry, RelationshipKind, RelationshipTypeEntry};
    use proptest::prelude::*;

    fn registry() -> TypeRegistry {
        let mut registry = TypeRegistry::new();
        for (name, kind) in [("Compute", NodeKind::Compute), ("Software", NodeKind::Software)] {
            registry
                .register_node(NodeTypeEntry::new(name, kind, || Arc::new(NoopLifecycle)))
                .unwrap();
        }
        for (name, kind) in [
            ("HostedOn", RelationshipKind::HostedOn),
            ("ConnectsTo", RelationshipKind::DependsOn),
        ] {
            registry
                .register_relationship(RelationshipTypeEntry::new(
                    name,
                    kind,
                    || Arc::new(NoopLifecycle),
                ))
                .unwrap();
        }
        registry
    }

    fn web_java() -> TopologyDescription {
        TopologyDescription::new("web")
            .with_node(NodeDescription::new("WebServer", "Compute").with_instances(1, 3, 2))
            .with_node(NodeDescription::new("Java", "Software").with_host("WebServer"))
            .with_relationship(RelationshipDescription::new(
                "java_on_web",
                "HostedOn",
                "Java",
                "WebServer",
            ))
    }

    /// Vm hosts a Tomcat with a War and a load balancer in front of it.
    fn war_lb(many_to_many: bool) -> TopologyDescription {
        TopologyDescription::new("petclinic")
            .with_node(NodeDescription::new("Vm", "Compute").with_instances(1, 4, 2))
            .with_node(NodeDescription::new("Tomcat", "Software").with_host("Vm"))
            .with_node(NodeDescription::new("War", "Software").with_host("Tomcat"))
            .with_node(NodeDescription::new("ApacheLoadBalancer", "Software").with_host("Vm"))
            .with_relationship(
                RelationshipDescription::new("war_lb", "ConnectsTo", "War", "ApacheLoadBalancer")
                    .with_many_to_many(many_to_many),
            )
    }

    #[test]
    fn test_hosted_instances_follow_host() {
        let topology = Topology::from_description(&web_java(), &registry()).unwrap();

        assert_eq!(topology.instance_count(), 4);
        assert_eq!(topology.relationship_count(), 2);
        let java_2 = topology.instance_by_name("Java_2").unwrap();
        let web_2 = topology.instance_by_name("WebServer_2").unwrap();
        assert_eq!(java_2.host, Some(web_2.id));
        assert_eq!(java_2.parent, Some(web_2.id));
        assert_eq!(topology.structural_parents(java_2.id), vec![web_2.id]);
    }

    #[test]
    fn test_sibling_isolation() {
        let topology = Topology::from_description(&war_lb(false), &registry()).unwrap();

        assert_eq!(topology.relationship_count(), 2);
        for rel in topology.relationships() {
            let war = topology.instance(rel.source).unwrap();
            let lb = topology.instance(rel.target).unwrap();
            assert_eq!(war.index, lb.index, "{} linked to {}", war.name, lb.name);
        }
    }

    #[test]
    fn test_many_to_many_crosses_siblings() {
        let topology = Topology::from_description(&war_lb(true), &registry()).unwrap();
        assert_eq!(topology.relationship_count(), 4);
    }

    #[test]
    fn test_add_instances_and_delta_relationships() {
        let mut topology = Topology::from_description(&war_lb(false), &registry()).unwrap();
        let created = topology.add_instances("Vm", None, 1).unwrap();

        // Vm, Tomcat, War, ApacheLoadBalancer
        assert_eq!(created.len(), 4);
        let rels = topology.generate_relationships();
        assert_eq!(rels.len(), 1);
        assert!(topology.generate_relationships().is_empty());
        assert!(topology.instance_by_name("War_3").is_some());
    }

    #[test]
    fn test_add_instances_rejects_wrong_parent() {
        let mut topology = Topology::from_description(&web_java(), &registry()).unwrap();
        let err = topology.add_instances("Java", None, 1).unwrap_err();
        assert!(matches!(err, CoreError::Validation { .. }));
    }

    #[test]
    fn test_removal_closure_and_remove() {
        let mut topology = Topology::from_description(&web_java(), &registry()).unwrap();
        let web_2 = topology.instance_by_name("WebServer_2").unwrap().id;
        let java_2 = topology.instance_by_name("Java_2").unwrap().id;

        let (instances, relationships) = topology.removal_closure(&[web_2]);
        assert_eq!(instances.len(), 2);
        assert!(instances.contains(&java_2));
        assert_eq!(relationships.len(), 1);

        assert_eq!(topology.remove(&instances, &relationships), 3);
        assert_eq!(topology.instance_count(), 2);
        assert_eq!(topology.instances_of("WebServer").len(), 1);
        assert_eq!(topology.relationship_node("java_on_web").unwrap().instances().len(), 1);
    }

    #[test]
    fn test_indexes_not_reused() {
        let mut topology = Topology::from_description(&web_java(), &registry()).unwrap();
        let web_2 = topology.instance_by_name("WebServer_2").unwrap().id;
        let (instances, relationships) = topology.removal_closure(&[web_2]);
        topology.remove(&instances, &relationships);

        topology.add_instances("WebServer", None, 1).unwrap();
        assert!(topology.instance_by_name("WebServer_3").is_some());
        assert!(topology.instance_by_name("Java_3").is_some());
        assert_eq!(topology.instances_under("WebServer", None).len(), 2);
    }

    #[test]
    fn test_dependency_targets() {
        let desc = TopologyDescription::new("deps")
            .with_node(NodeDescription::new("Db", "Compute"))
            .with_node(NodeDescription::new("App", "Compute").with_dependency("Db"));
        let topology = Topology::from_description(&desc, &registry()).unwrap();
        let app = topology.instance_by_name("App_1").unwrap().id;
        let db = topology.instance_by_name("Db_1").unwrap().id;
        assert_eq!(topology.dependency_targets(app), vec![db]);
        assert!(topology.dependency_targets(db).is_empty());
    }

    #[test]
    fn test_structural_ancestors_follow_host_chain() {
        let topology = Topology::from_description(&war_lb(false), &registry()).unwrap();
        let war = topology.instance_by_name("War_2").unwrap().id;
        let tomcat = topology.instance_by_name("Tomcat_2").unwrap().id;
        let vm = topology.instance_by_name("Vm_2").unwrap().id;

        assert_eq!(topology.structural_parents(war), vec![tomcat]);
        let ancestors = topology.structural_ancestors(war);
        assert_eq!(ancestors.len(), 2);
        assert!(ancestors.contains(&tomcat));
        assert!(ancestors.contains(&vm));
        assert!(topology.structural_ancestors(vm).is_empty());
    }

    proptest! {
        #[test]
        fn prop_sibling_rule_survives_scale_up(
            initial in 1u32..4,
            added in 0u32..3,
            many_to_many in any::<bool>(),
        ) {
            let desc = TopologyDescription::new("petclinic")
                .with_node(NodeDescription::new("Vm", "Compute").with_instances(1, 8, initial))
                .with_node(NodeDescription::new("Tomcat", "Software").with_host("Vm"))
                .with_node(NodeDescription::new("War", "Software").with_host("Tomcat"))
                .with_node(NodeDescription::new("ApacheLoadBalancer", "Software").with_host("Vm"))
                .with_relationship(
                    RelationshipDescription::new(
                        "war_lb",
                        "ConnectsTo",
                        "War",
                        "ApacheLoadBalancer",
                    )
                        .with_many_to_many(many_to_many),
                );
            let mut topology = Topology::from_description(&desc, &registry()).unwrap();
            if added > 0 {
                topology.add_instances("Vm", None, added).unwrap();
                topology.generate_relationships();
            }

            let vms = (initial + added) as usize;
            let links: Vec<_> = topology
                .relationships()
                .filter(|rel| rel.relationship == "war_lb")
                .collect();
            if many_to_many {
                prop_assert_eq!(links.len(), vms * vms);
            } else {
                prop_assert_eq!(links.len(), vms);
                for rel in links {
                    let war = topology.instance(rel.source).unwrap();
                    let lb = topology.instance(rel.target).unwrap();
                    prop_assert_eq!(war.index, lb.index);
                }
            }
        }
    }

    #[test]
    fn test_snapshot_uses_names() {
        let topology = Topology::from_description(&web_java(), &registry()).unwrap();
        let snapshot = topology.snapshot();
        let java = snapshot.instance("Java_1").unwrap();
        assert_eq!(java.host.as_deref(), Some("WebServer_1"));
        assert_eq!(java.state, "initial");
        let json = serde_json::to_string(&snapshot).unwrap();
        let back: TopologySnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back, snapshot);
    }
}
