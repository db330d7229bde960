//! Definition builders for simple solids.

use crate::float_types::Real;
use crate::model::{Definition, DefinitionId, Model};
use crate::shell::{Attributes, Shell};
use nalgebra::Point3;

/// An axis-aligned cuboid spanning `[0, x] × [0, y] × [0, z]`, with outward
/// normals. Registered as a fresh definition in `model`.
pub fn cuboid(model: &mut Model, x: Real, y: Real, z: Real) -> DefinitionId {
    assert!(
        x > 0.0 && y > 0.0 && z > 0.0,
        "cuboid dimensions must be positive"
    );
    let p = |px: Real, py: Real, pz: Real| Point3::new(px, py, pz);
    let faces: [[Point3<Real>; 4]; 6] = [
        // bottom (-z) and top (+z)
        [p(0.0, 0.0, 0.0), p(0.0, y, 0.0), p(x, y, 0.0), p(x, 0.0, 0.0)],
        [p(0.0, 0.0, z), p(x, 0.0, z), p(x, y, z), p(0.0, y, z)],
        // front (-y) and back (+y)
        [p(0.0, 0.0, 0.0), p(x, 0.0, 0.0), p(x, 0.0, z), p(0.0, 0.0, z)],
        [p(0.0, y, 0.0), p(0.0, y, z), p(x, y, z), p(x, y, 0.0)],
        // left (-x) and right (+x)
        [p(0.0, 0.0, 0.0), p(0.0, 0.0, z), p(0.0, y, z), p(0.0, y, 0.0)],
        [p(x, 0.0, 0.0), p(x, y, 0.0), p(x, y, z), p(x, 0.0, z)],
    ];
    let mut shell = Shell::new();
    for loop_ in &faces {
        shell
            .add_face(loop_, &[], Attributes::default())
            .expect("cuboid faces are planar and non-degenerate");
    }
    model.add_definition(Definition::new(shell))
}

/// A cube of edge length `size` with one corner at the origin.
pub fn cube(model: &mut Model, size: Real) -> DefinitionId {
    cuboid(model, size, size, size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn cube_is_closed_with_outward_normals() {
        let mut model = Model::new();
        let def = cube(&mut model, 2.0);
        let shell = &model.definition(def).unwrap().shell;
        assert_eq!(shell.faces.len(), 6);
        assert_eq!(shell.edges().count(), 12);
        assert!(shell.is_manifold());
        assert_relative_eq!(shell.volume(), 8.0, epsilon = 1e-9);
        // Outward: every face's plane keeps the solid's center behind it.
        let center = Point3::new(1.0, 1.0, 1.0);
        for face in &shell.faces {
            assert!(face.plane.signed_distance(&center) < 0.0);
        }
    }
}
