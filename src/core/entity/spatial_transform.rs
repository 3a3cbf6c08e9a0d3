use cgmath::{Deg, ElementWise, One, Quaternion, Rotation, Rotation3, Vector3};

/// Represents the spatial data for an element or scene node.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpatialTransform {
    pub scale: Vector3<f32>,
    pub position: Vector3<f32>,
    pub rotation: Quaternion<f32>,
}

impl SpatialTransform {
    /// Get the identity transform (ie doesn't do anything).
    pub fn identity() -> Self {
        Self {
            scale: Vector3::new(1.0, 1.0, 1.0),
            position: Vector3::new(0.0, 0.0, 0.0),
            rotation: Quaternion::one(),
        }
    }

    /// Build a transform from a position and an euler rotation in degrees.
    ///
    /// The rotation is applied X first, then Y, then Z.
    pub fn from_euler_degrees(position: [f32; 3], rotation: [f32; 3]) -> Self {
        Self {
            scale: Vector3::new(1.0, 1.0, 1.0),
            position: position.into(),
            rotation: euler_degrees_to_quaternion(rotation),
        }
    }

    /// A rotation around `pivot`, ie how cubes and groups turn their content.
    pub fn about_pivot(pivot: [f32; 3], rotation: [f32; 3]) -> Self {
        let rotation = euler_degrees_to_quaternion(rotation);
        let pivot = Vector3::from(pivot);
        Self {
            scale: Vector3::new(1.0, 1.0, 1.0),
            position: pivot - rotation.rotate_vector(pivot),
            rotation,
        }
    }

    /// Apply this transform to a point.
    pub fn transform_point(&self, point: [f32; 3]) -> [f32; 3] {
        let scaled = self.scale.mul_element_wise(Vector3::from(point));
        let rotated = self.rotation.rotate_vector(scaled);
        (rotated + self.position).into()
    }

    /// Apply only the rotation of this transform to a direction.
    pub fn transform_direction(&self, direction: [f32; 3]) -> [f32; 3] {
        self.rotation.rotate_vector(Vector3::from(direction)).into()
    }

    /// Combines this transform with a child transform.
    /// Returns the resulting overall transform of the child.
    pub fn combine(&self, child: &SpatialTransform) -> SpatialTransform {
        let scaled_position = self.scale.mul_element_wise(child.position);
        let combined_scale = self.scale.mul_element_wise(child.scale);

        let rotated_position = self.rotation * scaled_position;
        let final_position = self.position + rotated_position;
        let combined_rotation = self.rotation * child.rotation;

        SpatialTransform {
            scale: combined_scale,
            position: final_position,
            rotation: combined_rotation,
        }
    }
}

impl Default for SpatialTransform {
    fn default() -> Self {
        Self::identity()
    }
}

/// Converts an XYZ euler rotation in degrees into a quaternion equal to `Rz * Ry * Rx`.
pub fn euler_degrees_to_quaternion(rotation: [f32; 3]) -> Quaternion<f32> {
    Quaternion::from_angle_z(Deg(rotation[2]))
        * Quaternion::from_angle_y(Deg(rotation[1]))
        * Quaternion::from_angle_x(Deg(rotation[0]))
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use cgmath::Point3;

    use super::*;

    fn rotate_about(point: [f32; 3], pivot: [f32; 3], rotation: Quaternion<f32>) -> [f32; 3] {
        let pivot = Point3::from(pivot);
        let offset = Point3::from(point) - pivot;
        (pivot + rotation.rotate_vector(offset)).into()
    }

    fn assert_near(a: [f32; 3], b: [f32; 3]) {
        for axis in 0..3 {
            assert_abs_diff_eq!(a[axis], b[axis], epsilon = 1e-4);
        }
    }

    #[test]
    fn identity_leaves_points_alone() {
        let t = SpatialTransform::identity();
        assert_near(t.transform_point([1.0, 2.0, 3.0]), [1.0, 2.0, 3.0]);
    }

    #[test]
    fn z_rotation_quarter_turn() {
        let q = euler_degrees_to_quaternion([0.0, 0.0, 90.0]);
        let p = rotate_about([1.0, 0.0, 0.0], [0.0, 0.0, 0.0], q);
        assert_near(p, [0.0, 1.0, 0.0]);
    }

    #[test]
    fn x_is_applied_before_z() {
        // x then z: (0,1,0) -x90-> (0,0,1) -z90-> (0,0,1)
        let q = euler_degrees_to_quaternion([90.0, 0.0, 90.0]);
        let p = rotate_about([0.0, 1.0, 0.0], [0.0, 0.0, 0.0], q);
        assert_near(p, [0.0, 0.0, 1.0]);
    }

    #[test]
    fn rotation_about_pivot() {
        let q = euler_degrees_to_quaternion([0.0, 180.0, 0.0]);
        let p = rotate_about([2.0, 0.0, 0.0], [1.0, 0.0, 0.0], q);
        assert_near(p, [0.0, 0.0, 0.0]);
    }

    #[test]
    fn pivot_transform_matches_rotate_about() {
        let t = SpatialTransform::about_pivot([1.0, 2.0, 0.0], [0.0, 0.0, 90.0]);
        let q = euler_degrees_to_quaternion([0.0, 0.0, 90.0]);
        assert_near(
            t.transform_point([3.0, 2.0, 0.0]),
            rotate_about([3.0, 2.0, 0.0], [1.0, 2.0, 0.0], q),
        );
    }

    #[test]
    fn combine_translates_child_into_parent_space() {
        let parent = SpatialTransform::from_euler_degrees([10.0, 0.0, 0.0], [0.0, 0.0, 0.0]);
        let child = SpatialTransform::from_euler_degrees([1.0, 2.0, 3.0], [0.0, 0.0, 0.0]);
        let combined = parent.combine(&child);
        assert_near(combined.position.into(), [11.0, 2.0, 3.0]);
    }
}
