//! Lagrange finite elements on tetrahedra.
//!
//! The reference tetrahedron has vertices `(0, 0, 0)`, `(1, 0, 0)`, `(0, 1, 0)` and `(0, 0, 1)`,
//! matching the rules in [`fk_quadrature::simplex`]. Its barycentric coordinates are
//! `λ_0 = 1 - ξ_1 - ξ_2 - ξ_3` and `λ_k = ξ_k` for `k = 1, 2, 3`.
use fk_quadrature::Rule3d;
use nalgebra::{Matrix3, Point3, Vector3};

/// The `P_r` Lagrange element on the reference tetrahedron.
///
/// The nodes of degree `r` are the points with barycentric coordinates `α / r`, where `α`
/// runs over the multi-indices of four non-negative integers summing to `r`. The four
/// vertex nodes come first, in vertex order, followed by the remaining nodes in lexicographic
/// order of their multi-indices. The basis function of node `α` is
/// <div>$$
///   \varphi_\alpha = \prod_{k=0}^{3} P_{\alpha_k}(\lambda_k), \qquad
///   P_m(\lambda) = \prod_{j=0}^{m-1} \frac{r \lambda - j}{j + 1},
/// $$</div>
/// which is one at its own node and zero at all others.
#[derive(Debug, Clone, PartialEq)]
pub struct LagrangeTetrahedron {
    degree: usize,
    multi_indices: Vec<[usize; 4]>,
}

impl LagrangeTetrahedron {
    /// Panics if `degree` is zero.
    pub fn new(degree: usize) -> Self {
        assert!(degree >= 1, "Lagrange elements need degree at least 1");
        let mut multi_indices: Vec<[usize; 4]> = (0..4)
            .map(|vertex| {
                let mut alpha = [0; 4];
                alpha[vertex] = degree;
                alpha
            })
            .collect();

        for a1 in 0..=degree {
            for a2 in 0..=degree - a1 {
                for a3 in 0..=degree - a1 - a2 {
                    let alpha = [degree - a1 - a2 - a3, a1, a2, a3];
                    if !alpha.contains(&degree) {
                        multi_indices.push(alpha);
                    }
                }
            }
        }

        debug_assert_eq!(multi_indices.len(), num_lagrange_nodes(degree));
        Self { degree, multi_indices }
    }

    pub fn degree(&self) -> usize {
        self.degree
    }

    pub fn num_nodes(&self) -> usize {
        self.multi_indices.len()
    }

    /// Barycentric multi-indices of the nodes, in node order.
    pub fn multi_indices(&self) -> &[[usize; 4]] {
        &self.multi_indices
    }

    /// Reference coordinates of the node with the given multi-index.
    pub fn node_reference_coords(&self, alpha: &[usize; 4]) -> Point3<f64> {
        let r = self.degree as f64;
        Point3::new(alpha[1] as f64 / r, alpha[2] as f64 / r, alpha[3] as f64 / r)
    }

    /// Evaluates all basis functions at the reference point `xi`.
    pub fn populate_basis(&self, values: &mut [f64], xi: &Point3<f64>) {
        assert_eq!(values.len(), self.num_nodes());
        let lambda = barycentric(xi);
        for (value, alpha) in values.iter_mut().zip(&self.multi_indices) {
            *value = (0..4)
                .map(|k| self.factor(alpha[k], lambda[k]).0)
                .product();
        }
    }

    /// Evaluates the reference gradients of all basis functions at the reference point `xi`.
    pub fn populate_basis_gradients(&self, gradients: &mut [Vector3<f64>], xi: &Point3<f64>) {
        assert_eq!(gradients.len(), self.num_nodes());
        let lambda = barycentric(xi);
        for (gradient, alpha) in gradients.iter_mut().zip(&self.multi_indices) {
            let factors = [0, 1, 2, 3].map(|k| self.factor(alpha[k], lambda[k]));
            // Derivatives with respect to each barycentric coordinate
            let d_lambda = [0, 1, 2, 3].map(|k| {
                (0..4)
                    .map(|l| if l == k { factors[l].1 } else { factors[l].0 })
                    .product::<f64>()
            });
            *gradient = Vector3::new(
                d_lambda[1] - d_lambda[0],
                d_lambda[2] - d_lambda[0],
                d_lambda[3] - d_lambda[0],
            );
        }
    }

    /// Value and derivative of `P_m` at `lambda`.
    fn factor(&self, m: usize, lambda: f64) -> (f64, f64) {
        let r = self.degree as f64;
        let mut value = 1.0;
        let mut derivative = 0.0;
        for j in 0..m {
            let denominator = (j + 1) as f64;
            let f = (r * lambda - j as f64) / denominator;
            let df = r / denominator;
            derivative = derivative * f + value * df;
            value *= f;
        }
        (value, derivative)
    }
}

/// Number of nodes of the `P_r` Lagrange tetrahedron, `(r + 1)(r + 2)(r + 3) / 6`.
pub fn num_lagrange_nodes(degree: usize) -> usize {
    (degree + 1) * (degree + 2) * (degree + 3) / 6
}

fn barycentric(xi: &Point3<f64>) -> [f64; 4] {
    [1.0 - xi.x - xi.y - xi.z, xi.x, xi.y, xi.z]
}

/// The affine map from the reference tetrahedron to a physical tetrahedron.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TetrahedronGeometry {
    origin: Point3<f64>,
    jacobian: Matrix3<f64>,
    inverse_transpose: Matrix3<f64>,
    determinant: f64,
}

impl TetrahedronGeometry {
    /// Returns `None` if the tetrahedron is degenerate.
    pub fn from_vertices(vertices: &[Point3<f64>; 4]) -> Option<Self> {
        let [a, b, c, d] = vertices;
        let jacobian = Matrix3::from_columns(&[b - a, c - a, d - a]);
        let determinant = jacobian.determinant();
        let inverse_transpose = jacobian.try_inverse()?.transpose();
        Some(Self {
            origin: *a,
            jacobian,
            inverse_transpose,
            determinant,
        })
    }

    pub fn map_reference_coords(&self, xi: &Point3<f64>) -> Point3<f64> {
        self.origin + self.jacobian * xi.coords
    }

    /// Absolute value of the Jacobian determinant, six times the cell volume.
    pub fn abs_determinant(&self) -> f64 {
        self.determinant.abs()
    }

    /// Maps a reference gradient to a physical gradient.
    pub fn physical_gradient(&self, reference_gradient: &Vector3<f64>) -> Vector3<f64> {
        self.inverse_transpose * reference_gradient
    }
}

/// Basis values and gradients of an element at the points of a quadrature rule, mapped to
/// the current cell.
///
/// Reference values are tabulated once on construction; [`reinit`](Self::reinit) only maps
/// the weights, points and gradients to a new cell.
#[derive(Debug, Clone)]
pub struct CellValues {
    num_nodes: usize,
    reference_weights: Vec<f64>,
    reference_points: Vec<Point3<f64>>,
    // Indexed by q * num_nodes + i
    basis_values: Vec<f64>,
    reference_gradients: Vec<Vector3<f64>>,
    gradients: Vec<Vector3<f64>>,
    weights: Vec<f64>,
    points: Vec<Point3<f64>>,
}

impl CellValues {
    pub fn new(element: &LagrangeTetrahedron, quadrature: &Rule3d) -> Self {
        let (weights, points) = quadrature;
        let num_nodes = element.num_nodes();
        let num_points = weights.len();
        let reference_points: Vec<_> = points.iter().map(|&p| Point3::from(p)).collect();

        let mut basis_values = vec![0.0; num_points * num_nodes];
        let mut reference_gradients = vec![Vector3::zeros(); num_points * num_nodes];
        for (q, xi) in reference_points.iter().enumerate() {
            let range = q * num_nodes..(q + 1) * num_nodes;
            element.populate_basis(&mut basis_values[range.clone()], xi);
            element.populate_basis_gradients(&mut reference_gradients[range], xi);
        }

        Self {
            num_nodes,
            reference_weights: weights.clone(),
            reference_points,
            basis_values,
            gradients: reference_gradients.clone(),
            reference_gradients,
            weights: vec![0.0; num_points],
            points: vec![Point3::origin(); num_points],
        }
    }

    /// Maps the tabulated data onto the given cell.
    pub fn reinit(&mut self, geometry: &TetrahedronGeometry) {
        let det = geometry.abs_determinant();
        for (w, w_ref) in self.weights.iter_mut().zip(&self.reference_weights) {
            *w = det * w_ref;
        }
        for (x, xi) in self.points.iter_mut().zip(&self.reference_points) {
            *x = geometry.map_reference_coords(xi);
        }
        for (g, g_ref) in self.gradients.iter_mut().zip(&self.reference_gradients) {
            *g = geometry.physical_gradient(g_ref);
        }
    }

    pub fn num_nodes(&self) -> usize {
        self.num_nodes
    }

    pub fn num_quadrature_points(&self) -> usize {
        self.weights.len()
    }

    /// Quadrature weight times the absolute Jacobian determinant at point `q`.
    pub fn jxw(&self, q: usize) -> f64 {
        self.weights[q]
    }

    pub fn quadrature_point(&self, q: usize) -> &Point3<f64> {
        &self.points[q]
    }

    /// Values of all basis functions at point `q`.
    pub fn values(&self, q: usize) -> &[f64] {
        &self.basis_values[q * self.num_nodes..(q + 1) * self.num_nodes]
    }

    /// Physical gradients of all basis functions at point `q`.
    pub fn gradients(&self, q: usize) -> &[Vector3<f64>] {
        &self.gradients[q * self.num_nodes..(q + 1) * self.num_nodes]
    }

    /// Value at point `q` of the finite element function with the given nodal coefficients.
    pub fn interpolate(&self, coefficients: &[f64], q: usize) -> f64 {
        self.values(q).iter().zip(coefficients).map(|(phi, u)| phi * u).sum()
    }

    /// Gradient at point `q` of the finite element function with the given nodal coefficients.
    pub fn interpolate_gradient(&self, coefficients: &[f64], q: usize) -> Vector3<f64> {
        self.gradients(q)
            .iter()
            .zip(coefficients)
            .fold(Vector3::zeros(), |sum, (grad_phi, u)| sum + grad_phi * *u)
    }
}
