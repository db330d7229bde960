//! Solidity and point-classification behavior.

use nalgebra::{Point3, Translation3, Vector3};
use solidops::shell::{Attributes, Shell};
use solidops::{Container, Definition, DefinitionId, Model};
use solidops::shapes;

type Real = f64;

fn place(model: &mut Model, name: &str, def: DefinitionId, at: Vector3<Real>) -> solidops::ContainerId {
    let mut container = Container::new(name, def);
    container.transform = Translation3::from(at).to_homogeneous();
    model.add_container(container)
}

/// Six outward-facing quads for an axis-aligned box.
fn box_loops(min: Point3<Real>, max: Point3<Real>) -> Vec<Vec<Point3<Real>>> {
    let p = |x: Real, y: Real, z: Real| Point3::new(x, y, z);
    let (x0, y0, z0) = (min.x, min.y, min.z);
    let (x1, y1, z1) = (max.x, max.y, max.z);
    vec![
        vec![p(x0, y0, z0), p(x0, y1, z0), p(x1, y1, z0), p(x1, y0, z0)],
        vec![p(x0, y0, z1), p(x1, y0, z1), p(x1, y1, z1), p(x0, y1, z1)],
        vec![p(x0, y0, z0), p(x1, y0, z0), p(x1, y0, z1), p(x0, y0, z1)],
        vec![p(x0, y1, z0), p(x0, y1, z1), p(x1, y1, z1), p(x1, y1, z0)],
        vec![p(x0, y0, z0), p(x0, y0, z1), p(x0, y1, z1), p(x0, y1, z0)],
        vec![p(x1, y0, z0), p(x1, y1, z0), p(x1, y1, z1), p(x1, y0, z1)],
    ]
}

fn add_box(shell: &mut Shell, min: Point3<Real>, max: Point3<Real>, inward: bool) {
    for mut loop_ in box_loops(min, max) {
        if inward {
            loop_.reverse();
        }
        shell.add_face(&loop_, &[], Attributes::default()).unwrap();
    }
}

#[test]
fn cube_is_solid() {
    let mut model = Model::new();
    let def = shapes::cube(&mut model, 1.0);
    let a = model.instance("a", def);
    assert_eq!(model.is_solid(a), Some(true));
}

#[test]
fn stale_handle_is_undefined() {
    let mut model = Model::new();
    let def = shapes::cube(&mut model, 1.0);
    let a = model.instance("a", def);
    model.erase_container(a);
    assert_eq!(model.is_solid(a), None);
    assert_eq!(model.within(&Point3::new(0.5, 0.5, 0.5), a, true, true), None);
}

#[test]
fn open_box_is_not_solid() {
    let mut model = Model::new();
    let def = shapes::cube(&mut model, 1.0);
    model.definition_mut(def).unwrap().shell.faces.pop();
    let a = model.instance("a", def);
    assert_eq!(model.is_solid(a), Some(false));
    // Verified queries refuse with an undefined result rather than a
    // meaningless parity...
    assert_eq!(model.within(&Point3::new(0.5, 0.5, 0.5), a, true, true), None);
    // ...but the raw parity is still available when the caller opts out.
    assert!(model.within(&Point3::new(0.5, 0.5, 0.5), a, true, false).is_some());
}

#[test]
fn parity_inside_outside_and_boundary() {
    let mut model = Model::new();
    let def = shapes::cube(&mut model, 1.0);
    let a = model.instance("a", def);

    assert_eq!(model.within(&Point3::new(0.5, 0.5, 0.5), a, true, true), Some(true));
    for outside in [
        Point3::new(10.0, 0.5, 0.5),
        Point3::new(0.5, -10.0, 0.5),
        Point3::new(0.5, 0.5, 10.0),
    ] {
        assert_eq!(model.within(&outside, a, true, true), Some(false));
    }
    // The boundary verdict is whatever the caller configures.
    let face_center = Point3::new(0.5, 0.5, 0.0);
    assert_eq!(model.within(&face_center, a, true, true), Some(true));
    assert_eq!(model.within(&face_center, a, false, true), Some(false));
    // Edges and vertices are boundary too.
    assert_eq!(model.within(&Point3::new(0.5, 0.0, 0.0), a, true, true), Some(true));
    assert_eq!(model.within(&Point3::new(1.0, 1.0, 1.0), a, false, true), Some(false));
}

#[test]
fn within_respects_the_container_transform() {
    let mut model = Model::new();
    let def = shapes::cube(&mut model, 1.0);
    let a = place(&mut model, "a", def, Vector3::new(100.0, 0.0, 0.0));
    assert_eq!(model.within(&Point3::new(100.5, 0.5, 0.5), a, true, true), Some(true));
    assert_eq!(model.within(&Point3::new(0.5, 0.5, 0.5), a, true, true), Some(false));
}

#[test]
fn nested_children_are_opaque() {
    let mut model = Model::new();
    let parent_def = shapes::cube(&mut model, 1.0);

    // A blatantly non-manifold child: a single dangling quad.
    let mut open = Shell::new();
    open.add_face(
        &[
            Point3::new(0.2, 0.2, 0.2),
            Point3::new(0.4, 0.2, 0.2),
            Point3::new(0.4, 0.4, 0.2),
            Point3::new(0.2, 0.4, 0.2),
        ],
        &[],
        Attributes::default(),
    )
    .unwrap();
    let child_def = model.add_definition(Definition::new(open));
    let child = Container::new("child", child_def);
    model
        .definition_mut(parent_def)
        .unwrap()
        .children
        .push(child);

    let a = model.instance("a", parent_def);
    // Solidity and parity depend only on the container's own geometry.
    assert_eq!(model.is_solid(a), Some(true));
    assert_eq!(model.within(&Point3::new(0.5, 0.5, 0.5), a, true, true), Some(true));
}

#[test]
fn cavity_interior_is_outside_the_solid() {
    let mut model = Model::new();
    let mut shell = Shell::new();
    add_box(&mut shell, Point3::new(0.0, 0.0, 0.0), Point3::new(3.0, 3.0, 3.0), false);
    add_box(&mut shell, Point3::new(1.0, 1.0, 1.0), Point3::new(2.0, 2.0, 2.0), true);
    let def = model.add_definition(Definition::new(shell));
    let a = model.instance("a", def);

    assert_eq!(model.is_solid(a), Some(true));
    // Inside the material, between the two skins.
    assert_eq!(model.within(&Point3::new(0.5, 0.5, 0.5), a, true, true), Some(true));
    // Inside the void.
    assert_eq!(model.within(&Point3::new(1.5, 1.5, 1.5), a, true, true), Some(false));
    // On the cavity wall.
    assert_eq!(model.within(&Point3::new(1.5, 1.5, 1.0), a, true, true), Some(true));
}

#[test]
fn cubes_sharing_an_edge_are_solid() {
    let mut model = Model::new();
    let mut shell = Shell::new();
    add_box(&mut shell, Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 1.0, 1.0), false);
    add_box(&mut shell, Point3::new(1.0, 1.0, 0.0), Point3::new(2.0, 2.0, 1.0), false);
    let def = model.add_definition(Definition::new(shell));
    let a = model.instance("a", def);
    // The shared vertical edge binds four faces: even, still solid.
    assert_eq!(model.is_solid(a), Some(true));
}
