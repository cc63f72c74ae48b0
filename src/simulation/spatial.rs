//! Spatial indexing for obstacle queries.
//!
//! At the start of every tick the bodies of all obstacle agents are copied
//! into an [`ObstacleIndex`]. Sensors and collision checks then read this
//! snapshot, so the outcome of a tick does not depend on update order.

use kdtree::distance::squared_euclidean;
use kdtree::{ErrorKind as KdTreeError, KdTree};
use tracing::warn;

use super::geometric_utils::{Point, Polygon};

/// Type alias for 2D spatial KD-tree used for efficient neighbor queries.
pub type Tree2D = KdTree<f32, usize, [f32; 2]>;

/// Snapshot of obstacle bodies with a KD-tree over their centroids.
#[derive(Default)]
pub struct ObstacleIndex {
    /// `(owner id, body)` pairs.
    bodies: Vec<(usize, Polygon)>,
    /// Largest body radius; pads every radius query.
    max_radius: f32,
    /// `None` when the tree could not be built; queries then scan linearly.
    tree: Option<Tree2D>,
}

impl ObstacleIndex {
    /// An index without obstacles.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Builds an index from `(owner id, body)` pairs.
    pub fn build(bodies: Vec<(usize, Polygon)>) -> Self {
        let max_radius = bodies
            .iter()
            .map(|(_, body)| body.radius())
            .fold(0.0, f32::max);
        let tree = match build_tree(&bodies) {
            Ok(tree) => Some(tree),
            Err(e) => {
                warn!(error = ?e, bodies = bodies.len(), "obstacle kd-tree unavailable, using linear scan");
                None
            }
        };
        Self {
            bodies,
            max_radius,
            tree,
        }
    }

    /// Number of bodies in the snapshot.
    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    /// Whether the snapshot holds no bodies.
    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    /// All `(owner id, body)` pairs.
    pub fn bodies(&self) -> &[(usize, Polygon)] {
        &self.bodies
    }

    /// Bodies that could touch a circle of `radius` around `center`, skipping
    /// the one owned by `exclude`.
    ///
    /// The result may contain bodies that do not actually reach the circle but
    /// never misses one that does.
    pub fn near(&self, center: Point, radius: f32, exclude: usize) -> Vec<&Polygon> {
        let reach = radius + self.max_radius;
        let hits = self.tree.as_ref().and_then(|tree| {
            tree.within(&[center.x, center.y], reach * reach, &squared_euclidean)
                .ok()
        });
        match hits {
            Some(hits) => hits
                .into_iter()
                .map(|(_, &i)| &self.bodies[i])
                .filter(|(owner, _)| *owner != exclude)
                .map(|(_, body)| body)
                .collect(),
            None => self
                .bodies
                .iter()
                .filter(|(owner, _)| *owner != exclude)
                .map(|(_, body)| body)
                .collect(),
        }
    }
}

fn build_tree(bodies: &[(usize, Polygon)]) -> Result<Tree2D, KdTreeError> {
    let mut tree = KdTree::with_capacity(2, bodies.len().max(1));
    for (i, (_, body)) in bodies.iter().enumerate() {
        let c = body.centroid();
        tree.add([c.x, c.y], i)?;
    }
    Ok(tree)
}
