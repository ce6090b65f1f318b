//! Corner roles for the four table/projector fiducials.

use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// Integer pixel coordinate `(x, y)`.
pub type PixelPoint = Point2<i32>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CornerRole {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

/// Roles handed out to the first four markers sorted by ascending `x + y`.
///
/// This is a mounting convention of the rig, not geometry: the camera looks at
/// the table rotated so that the marker nearest the image origin is the
/// table's top-right corner. Re-mounting the camera means changing this table.
pub const ROLES_BY_ASCENDING_SUM: [CornerRole; 4] = [
    CornerRole::TopRight,
    CornerRole::BottomRight,
    CornerRole::TopLeft,
    CornerRole::BottomLeft,
];

/// Exactly one point per corner role.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableCorners {
    pub top_left: PixelPoint,
    pub top_right: PixelPoint,
    pub bottom_left: PixelPoint,
    pub bottom_right: PixelPoint,
}

impl TableCorners {
    #[inline]
    pub fn get(&self, role: CornerRole) -> PixelPoint {
        match role {
            CornerRole::TopLeft => self.top_left,
            CornerRole::TopRight => self.top_right,
            CornerRole::BottomLeft => self.bottom_left,
            CornerRole::BottomRight => self.bottom_right,
        }
    }

    /// Points in the given role order, as sub-pixel coordinates.
    pub fn in_order(&self, order: [CornerRole; 4]) -> [Point2<f32>; 4] {
        order.map(|role| {
            let p = self.get(role);
            Point2::new(p.x as f32, p.y as f32)
        })
    }
}

/// Assign corner roles to marker centers given in detection order.
///
/// Only the first four centers are considered; they are sorted by `x + y`
/// (ties keep detection order) and receive [`ROLES_BY_ASCENDING_SUM`] in turn.
/// Returns `None` when fewer than four centers are available.
pub fn assign_roles(centers: &[PixelPoint]) -> Option<TableCorners> {
    let first: &[PixelPoint; 4] = centers.get(..4)?.try_into().ok()?;

    let mut order = [0usize, 1, 2, 3];
    order.sort_by_key(|&i| (first[i].x + first[i].y, i));

    let mut slots = [None; 4];
    for (rank, &idx) in order.iter().enumerate() {
        let slot = match ROLES_BY_ASCENDING_SUM[rank] {
            CornerRole::TopLeft => 0,
            CornerRole::TopRight => 1,
            CornerRole::BottomLeft => 2,
            CornerRole::BottomRight => 3,
        };
        slots[slot] = Some(first[idx]);
    }

    Some(TableCorners {
        top_left: slots[0]?,
        top_right: slots[1]?,
        bottom_left: slots[2]?,
        bottom_right: slots[3]?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(x: i32, y: i32) -> PixelPoint {
        PixelPoint::new(x, y)
    }

    #[test]
    fn smallest_sum_becomes_top_right() {
        let corners = assign_roles(&[p(500, 400), p(20, 30), p(480, 20), p(10, 420)]).unwrap();
        assert_eq!(corners.top_right, p(20, 30));
        assert_eq!(corners.bottom_right, p(10, 420));
        assert_eq!(corners.top_left, p(480, 20));
        assert_eq!(corners.bottom_left, p(500, 400));
    }

    #[test]
    fn roles_do_not_depend_on_detection_order() {
        let pts = [p(500, 400), p(20, 30), p(480, 20), p(10, 420)];
        let reference = assign_roles(&pts).unwrap();
        let perms = [[3, 2, 1, 0], [1, 3, 0, 2], [2, 0, 3, 1], [0, 2, 1, 3]];
        for perm in perms {
            let shuffled: Vec<_> = perm.iter().map(|&i| pts[i]).collect();
            assert_eq!(assign_roles(&shuffled).unwrap(), reference);
        }
    }

    #[test]
    fn extra_markers_are_ignored_and_few_markers_fail() {
        let pts = [p(500, 400), p(20, 30), p(480, 20), p(10, 420), p(0, 0)];
        assert_eq!(assign_roles(&pts), assign_roles(&pts[..4]));
        assert!(assign_roles(&pts[..3]).is_none());
        assert!(assign_roles(&[]).is_none());
    }

    #[test]
    fn equal_sums_keep_detection_order() {
        let corners = assign_roles(&[p(10, 0), p(0, 10), p(50, 50), p(60, 60)]).unwrap();
        assert_eq!(corners.top_right, p(10, 0));
        assert_eq!(corners.bottom_right, p(0, 10));
    }
}
