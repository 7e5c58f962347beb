//! Bounding Volume Hierarchy (BVH) acceleration structure.
//!
//! A flat binary BVH built with a binned surface-area heuristic. Nodes
//! are emitted pre-order, left subtree first: a node's left child sits
//! at the next index, and its token addresses the right child. Leaves
//! hold exactly one primitive token.

use ember_math::{Aabb, Ray, Vec2, Vec3A};

use crate::sphere::PreparedSphere;
use crate::token::{Token, TokenKind};
use crate::triangle::PreparedTriangle;

/// Number of centroid bins tested per split.
const SAH_BINS: usize = 12;

/// Relative cost of a traversal step vs. a primitive intersection.
const COST_TRAVERSAL: f32 = 1.0;
const COST_INTERSECT: f32 = 1.2;

/// One BVH node: bounds plus a token, half a cache line.
#[derive(Clone, Copy, Debug)]
#[repr(C, align(32))]
pub struct BvhNode {
    min: [f32; 3],
    max: [f32; 3],
    token: Token,
}

impl BvhNode {
    #[inline]
    fn bounds(&self) -> Aabb {
        Aabb {
            min: Vec3A::from(self.min),
            max: Vec3A::from(self.max),
        }
    }

    fn from_bounds(bounds: &Aabb, token: Token) -> Self {
        Self {
            min: [bounds.min.x, bounds.min.y, bounds.min.z],
            max: [bounds.max.x, bounds.max.y, bounds.max.z],
            token,
        }
    }
}

/// Primitive slices the BVH dispatches into at leaves.
#[derive(Clone, Copy)]
pub struct Geometry<'a> {
    pub triangles: &'a [PreparedTriangle],
    pub spheres: &'a [PreparedSphere],
}

impl Geometry<'_> {
    /// Intersect one primitive by token. Returns (t, uv).
    #[inline]
    pub fn intersect(&self, token: Token, ray: &Ray) -> Option<(f32, Vec2)> {
        match token.kind() {
            TokenKind::Triangle => self.triangles[token.index()].intersect(ray),
            TokenKind::Sphere => self.spheres[token.index()].intersect(ray),
            _ => None,
        }
    }
}

/// A ray query, reused across traversals to keep the stack allocation.
///
/// On a hit, `distance`, `token` and `uv` describe the nearest
/// intersection; on a miss `distance` stays at the initial bound.
pub struct TraceQuery {
    pub ray: Ray,
    pub distance: f32,
    pub token: Token,
    pub uv: Vec2,

    /// Primitive excluded from hits (the spawning surface)
    pub ignore: Token,

    stack: Vec<(u32, f32)>,
}

impl TraceQuery {
    /// Unbounded query.
    pub fn new(ray: Ray) -> Self {
        Self {
            ray,
            distance: f32::INFINITY,
            token: Token::INVALID,
            uv: Vec2::ZERO,
            ignore: Token::INVALID,
            stack: Vec::with_capacity(64),
        }
    }

    /// Query with a caller-provided upper bound on the hit distance.
    pub fn bounded(ray: Ray, distance: f32) -> Self {
        let mut query = Self::new(ray);
        query.distance = distance;
        query
    }

    /// Reuse the query for a new unbounded ray.
    pub fn reset(&mut self, ray: Ray, ignore: Token) {
        self.reset_bounded(ray, f32::INFINITY, ignore);
    }

    /// Reuse the query for a new bounded ray.
    pub fn reset_bounded(&mut self, ray: Ray, distance: f32, ignore: Token) {
        self.ray = ray;
        self.distance = distance;
        self.token = Token::INVALID;
        self.uv = Vec2::ZERO;
        self.ignore = ignore;
        self.stack.clear();
    }

    /// True when the query found a hit.
    #[inline]
    pub fn hit(&self) -> bool {
        self.token.is_valid()
    }
}

struct BuildPrim {
    bounds: Aabb,
    centroid: Vec3A,
    token: Token,
}

#[inline]
fn component(v: Vec3A, axis: usize) -> f32 {
    match axis {
        0 => v.x,
        1 => v.y,
        _ => v.z,
    }
}

/// The flat BVH.
#[derive(Debug)]
pub struct Bvh {
    nodes: Vec<BvhNode>,
    max_depth: u32,
}

impl Bvh {
    /// Build over an array of primitive bounds with parallel tokens.
    pub fn build(items: &[(Aabb, Token)]) -> Self {
        let mut prims: Vec<BuildPrim> = items
            .iter()
            .map(|(bounds, token)| BuildPrim {
                bounds: *bounds,
                centroid: bounds.centroid(),
                token: *token,
            })
            .collect();

        if prims.is_empty() {
            return Self {
                nodes: Vec::new(),
                max_depth: 0,
            };
        }

        let mut nodes = Vec::with_capacity(prims.len() * 2);
        let mut max_depth = 0;
        Self::build_node(&mut prims, &mut nodes, 1, &mut max_depth);

        log::debug!(
            "Built BVH: {} primitives, {} nodes, depth {}",
            items.len(),
            nodes.len(),
            max_depth
        );

        Self { nodes, max_depth }
    }

    /// Emit the node for `prims` and its subtrees; returns its index.
    fn build_node(
        prims: &mut [BuildPrim],
        nodes: &mut Vec<BvhNode>,
        depth: u32,
        max_depth: &mut u32,
    ) -> usize {
        *max_depth = (*max_depth).max(depth);

        let mut bounds = Aabb::EMPTY;
        for prim in prims.iter() {
            bounds.encapsulate_box(&prim.bounds);
        }

        let index = nodes.len();

        if prims.len() == 1 {
            nodes.push(BvhNode::from_bounds(&bounds, prims[0].token));
            return index;
        }

        // Placeholder token; patched once the right child index is known
        nodes.push(BvhNode::from_bounds(&bounds, Token::INVALID));

        let mid = Self::choose_split(prims, &bounds);
        let (left, right) = prims.split_at_mut(mid);

        Self::build_node(left, nodes, depth + 1, max_depth);
        let right_index = Self::build_node(right, nodes, depth + 1, max_depth);
        nodes[index].token = Token::node(right_index);

        index
    }

    /// Partition `prims` in place at the binned-SAH split; returns the
    /// partition point (never 0 or len).
    fn choose_split(prims: &mut [BuildPrim], bounds: &Aabb) -> usize {
        let mut centroid_bounds = Aabb::EMPTY;
        for prim in prims.iter() {
            centroid_bounds.encapsulate(prim.centroid);
        }

        let axis = centroid_bounds.major_axis();
        let extent = component(centroid_bounds.extent(), axis);

        // All centroids coincide: SAH has nothing to bin, split evenly
        if extent <= 1e-12 {
            return prims.len() / 2;
        }

        let origin = component(centroid_bounds.min, axis);
        let to_bin = |c: Vec3A| -> usize {
            (((component(c, axis) - origin) / extent * SAH_BINS as f32) as usize)
                .min(SAH_BINS - 1)
        };

        let mut bin_counts = [0usize; SAH_BINS];
        let mut bin_bounds = [Aabb::EMPTY; SAH_BINS];
        for prim in prims.iter() {
            let b = to_bin(prim.centroid);
            bin_counts[b] += 1;
            bin_bounds[b].encapsulate_box(&prim.bounds);
        }

        // Suffix areas/counts for the right side of each candidate split
        let mut right_bounds = [Aabb::EMPTY; SAH_BINS];
        let mut right_counts = [0usize; SAH_BINS];
        let mut acc = Aabb::EMPTY;
        let mut count = 0;
        for b in (1..SAH_BINS).rev() {
            acc.encapsulate_box(&bin_bounds[b]);
            count += bin_counts[b];
            right_bounds[b] = acc;
            right_counts[b] = count;
        }

        // Sweep left to right, scoring a split after each bin
        let parent_area = bounds.half_area().max(1e-12);
        let mut best_bin = 0;
        let mut best_cost = f32::INFINITY;
        let mut left_acc = Aabb::EMPTY;
        let mut left_count = 0;
        for b in 0..SAH_BINS - 1 {
            left_acc.encapsulate_box(&bin_bounds[b]);
            left_count += bin_counts[b];
            let right_count = right_counts[b + 1];
            if left_count == 0 || right_count == 0 {
                continue;
            }

            let cost = COST_TRAVERSAL
                + (left_acc.half_area() * left_count as f32
                    + right_bounds[b + 1].half_area() * right_count as f32)
                    / parent_area
                    * COST_INTERSECT;
            if cost < best_cost {
                best_cost = cost;
                best_bin = b;
            }
        }

        if best_cost.is_infinite() {
            return prims.len() / 2;
        }

        // Partition in place: bins <= best_bin go left
        let mut mid = 0;
        for i in 0..prims.len() {
            if to_bin(prims[i].centroid) <= best_bin {
                prims.swap(i, mid);
                mid += 1;
            }
        }

        if mid == 0 || mid == prims.len() {
            prims.len() / 2
        } else {
            mid
        }
    }

    /// Number of nodes in the tree.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Deepest node level recorded during the build; bounds the
    /// traversal stack.
    pub fn max_depth(&self) -> u32 {
        self.max_depth
    }

    /// Find the nearest hit along the query ray, honoring the query's
    /// initial distance bound and ignore token.
    pub fn trace(&self, geometry: &Geometry, query: &mut TraceQuery) {
        if self.nodes.is_empty() {
            return;
        }

        let TraceQuery {
            ray,
            distance,
            token,
            uv,
            ignore,
            stack,
        } = query;

        let root_entry = self.nodes[0].bounds().intersect(ray);
        if root_entry >= *distance {
            return;
        }

        stack.clear();
        stack.push((0, root_entry));

        while let Some((index, entry)) = stack.pop() {
            // The best hit may have improved since this entry was pushed
            if entry >= *distance {
                continue;
            }

            let node = &self.nodes[index as usize];
            if node.token.kind() == TokenKind::Node {
                let left = index + 1;
                let right = node.token.index() as u32;
                let t_left = self.nodes[left as usize].bounds().intersect(ray);
                let t_right = self.nodes[right as usize].bounds().intersect(ray);

                // Push the farther child first so the nearer pops first
                let (near, near_t, far, far_t) = if t_left <= t_right {
                    (left, t_left, right, t_right)
                } else {
                    (right, t_right, left, t_left)
                };
                if far_t < *distance {
                    stack.push((far, far_t));
                }
                if near_t < *distance {
                    stack.push((near, near_t));
                }
            } else if node.token != *ignore {
                if let Some((t, prim_uv)) = geometry.intersect(node.token, ray) {
                    if t < *distance {
                        *distance = t;
                        *token = node.token;
                        *uv = prim_uv;
                    }
                }
            }
        }
    }

    /// True when anything blocks the query ray within its distance
    /// bound. Stops at the first hit.
    pub fn occlude(&self, geometry: &Geometry, query: &mut TraceQuery) -> bool {
        if self.nodes.is_empty() {
            return false;
        }

        let TraceQuery {
            ray,
            distance,
            ignore,
            stack,
            ..
        } = query;
        let travel = *distance;

        let root_entry = self.nodes[0].bounds().intersect(ray);
        if root_entry >= travel {
            return false;
        }

        stack.clear();
        stack.push((0, root_entry));

        while let Some((index, _)) = stack.pop() {
            let node = &self.nodes[index as usize];
            if node.token.kind() == TokenKind::Node {
                let left = index + 1;
                let right = node.token.index() as u32;
                let t_left = self.nodes[left as usize].bounds().intersect(ray);
                let t_right = self.nodes[right as usize].bounds().intersect(ray);
                if t_right < travel {
                    stack.push((right, t_right));
                }
                if t_left < travel {
                    stack.push((left, t_left));
                }
            } else if node.token != *ignore {
                if let Some((t, _)) = geometry.intersect(node.token, ray) {
                    if t < travel {
                        return true;
                    }
                }
            }
        }

        false
    }

    /// Approximate traversal work for a ray: the number of AABB tests a
    /// trace would perform.
    pub fn trace_cost(&self, ray: &Ray) -> u32 {
        if self.nodes.is_empty() {
            return 0;
        }
        if self.nodes[0].bounds().intersect(ray).is_infinite() {
            return 1;
        }
        1 + self.cost_node(0, ray)
    }

    fn cost_node(&self, index: usize, ray: &Ray) -> u32 {
        let node = &self.nodes[index];
        if node.token.kind() != TokenKind::Node {
            return 1;
        }

        let left = index + 1;
        let right = node.token.index();
        let mut cost = 2;
        if self.nodes[left].bounds().intersect(ray).is_finite() {
            cost += self.cost_node(left, ray);
        }
        if self.nodes[right].bounds().intersect(ray).is_finite() {
            cost += self.cost_node(right, ray);
        }
        cost
    }
}

/// O(n) fallback tracer over all primitives. Reference implementation
/// for parity tests and for scenes too small to warrant a tree.
pub fn trace_linear(geometry: &Geometry, query: &mut TraceQuery) {
    for (i, triangle) in geometry.triangles.iter().enumerate() {
        let token = Token::triangle(i);
        if token == query.ignore {
            continue;
        }
        if let Some((t, uv)) = triangle.intersect(&query.ray) {
            if t < query.distance {
                query.distance = t;
                query.token = token;
                query.uv = uv;
            }
        }
    }

    for (i, sphere) in geometry.spheres.iter().enumerate() {
        let token = Token::sphere(i);
        if token == query.ignore {
            continue;
        }
        if let Some((t, uv)) = sphere.intersect(&query.ray) {
            if t < query.distance {
                query.distance = t;
                query.token = token;
                query.uv = uv;
            }
        }
    }
}
