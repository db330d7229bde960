//! Containers, shared definitions and the model that owns them.
//!
//! A [`Container`] is the operand type for boolean operations: a named,
//! attributed instance of a [`Definition`] placed by a rigid transform.
//! Several containers may share one definition; mutating code must go
//! through [`Model::make_unique`] or an isolation copy so bystander
//! instances keep their geometry.

use crate::float_types::Real;
use crate::shell::{Attributes, Shell};
use nalgebra::{Matrix4, Point3};
use slotmap::{SlotMap, new_key_type};

new_key_type! {
    /// Handle to a [`Definition`]. Stale handles resolve to `None`.
    pub struct DefinitionId;
    /// Handle to a [`Container`]. Stale handles resolve to `None`.
    pub struct ContainerId;
}

/// Geometry shared by any number of container instances: a flat shell plus
/// nested child containers. Children are opaque to the boolean engine --
/// they are carried along, never traversed.
#[derive(Debug, Clone, Default)]
pub struct Definition {
    pub shell: Shell,
    pub children: Vec<Container>,
}

impl Definition {
    pub fn new(shell: Shell) -> Self {
        Definition {
            shell,
            children: Vec::new(),
        }
    }
}

/// A placed instance of a definition.
#[derive(Debug, Clone)]
pub struct Container {
    pub name: String,
    pub attributes: Attributes,
    /// Rigid transform placing local geometry into the parent frame.
    pub transform: Matrix4<Real>,
    pub definition: DefinitionId,
}

impl Container {
    pub fn new(name: impl Into<String>, definition: DefinitionId) -> Self {
        Container {
            name: name.into(),
            attributes: Attributes::default(),
            transform: Matrix4::identity(),
            definition,
        }
    }

    /// Transform a point from the parent frame into this container's local
    /// frame.
    pub fn to_local(&self, point: &Point3<Real>) -> Point3<Real> {
        self.inverse_transform().transform_point(point)
    }

    /// Transform a point from this container's local frame into the parent
    /// frame.
    pub fn to_parent(&self, point: &Point3<Real>) -> Point3<Real> {
        self.transform.transform_point(point)
    }

    pub fn inverse_transform(&self) -> Matrix4<Real> {
        self.transform.try_inverse().expect("Matrix not invertible?")
    }
}

/// Owner of all definitions and top-level containers.
#[derive(Debug, Default)]
pub struct Model {
    definitions: SlotMap<DefinitionId, Definition>,
    containers: SlotMap<ContainerId, Container>,
}

impl Model {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_definition(&mut self, definition: Definition) -> DefinitionId {
        self.definitions.insert(definition)
    }

    pub fn add_container(&mut self, container: Container) -> ContainerId {
        self.containers.insert(container)
    }

    /// Add a fresh container instancing `definition` at identity.
    pub fn instance(&mut self, name: impl Into<String>, definition: DefinitionId) -> ContainerId {
        self.add_container(Container::new(name, definition))
    }

    pub fn container(&self, id: ContainerId) -> Option<&Container> {
        self.containers.get(id)
    }

    pub fn container_mut(&mut self, id: ContainerId) -> Option<&mut Container> {
        self.containers.get_mut(id)
    }

    pub fn definition(&self, id: DefinitionId) -> Option<&Definition> {
        self.definitions.get(id)
    }

    pub fn definition_mut(&mut self, id: DefinitionId) -> Option<&mut Definition> {
        self.definitions.get_mut(id)
    }

    /// The definition a container instances, if both still exist.
    pub fn definition_of(&self, id: ContainerId) -> Option<&Definition> {
        self.definitions.get(self.containers.get(id)?.definition)
    }

    pub fn containers(&self) -> impl Iterator<Item = (ContainerId, &Container)> {
        self.containers.iter()
    }

    /// How many instances (top-level or nested anywhere) share `id`.
    pub fn instance_count(&self, id: DefinitionId) -> usize {
        let top = self
            .containers
            .values()
            .filter(|c| c.definition == id)
            .count();
        let nested = self
            .definitions
            .values()
            .flat_map(|d| d.children.iter())
            .filter(|c| c.definition == id)
            .count();
        top + nested
    }

    /// Give `id` a private copy of its definition when the definition is
    /// shared, so other instances keep their geometry untouched. No-op for
    /// an already-unique container.
    pub fn make_unique(&mut self, id: ContainerId) {
        let Some(container) = self.containers.get(id) else {
            return;
        };
        let def_id = container.definition;
        if self.instance_count(def_id) <= 1 {
            return;
        }
        let Some(cloned) = self.definitions.get(def_id).cloned() else {
            return;
        };
        let new_id = self.definitions.insert(cloned);
        if let Some(container) = self.containers.get_mut(id) {
            container.definition = new_id;
        }
    }

    /// Copy `source`'s geometry into a private, disposable container placed
    /// at identity in the parent frame (geometry pre-transformed by the
    /// source's placement). When `keep_original` is false the source
    /// container is erased once copied.
    ///
    /// The returned container must not outlive a single operator
    /// invocation; callers erase it via [`Model::erase_container`].
    pub fn isolate(&mut self, source: ContainerId, keep_original: bool) -> Option<ContainerId> {
        let container = self.containers.get(source)?;
        let transform = container.transform;
        let definition = self.definitions.get(container.definition)?;

        let mut shell = definition.shell.clone();
        shell.transform(&transform);
        let children = definition
            .children
            .iter()
            .map(|child| {
                let mut child = child.clone();
                child.transform = transform * child.transform;
                child
            })
            .collect();

        let def_id = self.definitions.insert(Definition { shell, children });
        let temp = self.add_container(Container::new("", def_id));
        if !keep_original {
            self.erase_container(source);
        }
        Some(temp)
    }

    /// Merge the content of `source` into `destination`: the source shell
    /// is brought into the destination's local frame and absorbed (welding
    /// coincident vertices, collapsing duplicate edges and coincident
    /// faces), nested children are re-parented with composed transforms,
    /// and the source container is erased unless `keep_original`.
    pub fn merge_into(
        &mut self,
        destination: ContainerId,
        source: ContainerId,
        keep_original: bool,
    ) -> Option<()> {
        let dest = self.containers.get(destination)?;
        let src = self.containers.get(source)?;
        let matrix = dest.inverse_transform() * src.transform;
        let dest_def = dest.definition;
        let src_def = self.definitions.get(src.definition)?.clone();

        let dest_def = self.definitions.get_mut(dest_def)?;
        dest_def.shell.merge(&src_def.shell, &matrix);
        for mut child in src_def.children {
            child.transform = matrix * child.transform;
            dest_def.children.push(child);
        }
        if !keep_original {
            self.erase_container(source);
        }
        Some(())
    }

    /// Erase a container, garbage-collecting its definition when nothing
    /// else references it.
    pub fn erase_container(&mut self, id: ContainerId) {
        let Some(container) = self.containers.remove(id) else {
            return;
        };
        let def_id = container.definition;
        if self.instance_count(def_id) == 0 {
            self.definitions.remove(def_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes;
    use nalgebra::{Translation3, Vector3};

    #[test]
    fn make_unique_leaves_bystanders_alone() {
        let mut model = Model::new();
        let def = shapes::cube(&mut model, 1.0);
        let a = model.instance("a", def);
        let b = model.instance("b", def);
        model.make_unique(a);
        let def_a = model.container(a).unwrap().definition;
        let def_b = model.container(b).unwrap().definition;
        assert_ne!(def_a, def_b);
        assert_eq!(def_b, def);
    }

    #[test]
    fn isolate_bakes_the_placement_in() {
        let mut model = Model::new();
        let def = shapes::cube(&mut model, 1.0);
        let a = model.instance("a", def);
        model.container_mut(a).unwrap().transform =
            Translation3::from(Vector3::new(5.0, 0.0, 0.0)).to_homogeneous();
        let temp = model.isolate(a, true).unwrap();
        assert!(model.container(a).is_some());
        let shell = &model.definition_of(temp).unwrap().shell;
        let max_x = shell
            .pool
            .iter()
            .map(|(_, p)| p.x)
            .fold(Real::MIN, Real::max);
        assert!((max_x - 6.0).abs() < 1e-9);
        // Temp copies are disposable and independent.
        model.erase_container(temp);
        assert!(model.container(temp).is_none());
        assert!(model.definition_of(a).is_some());
    }

    #[test]
    fn erase_collects_unreferenced_definitions() {
        let mut model = Model::new();
        let def = shapes::cube(&mut model, 1.0);
        let a = model.instance("a", def);
        model.erase_container(a);
        assert!(model.definition(def).is_none());
    }
}
