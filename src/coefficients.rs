//! Coefficient fields of the Fisher-Kolmogorov equation.
//!
//! Every field is a pure function of position, and of time where relevant. Time is passed
//! explicitly, so evaluation has no hidden state and fields can be shared between ranks.
use crate::config::Parameters;
use nalgebra::{Matrix3, Point3, Vector3};

/// A scalar field `g(x)`, such as the initial condition.
pub trait ScalarField: Send + Sync {
    fn value(&self, x: &Point3<f64>) -> f64;
}

/// A scalar field `g(x, t)`, such as the forcing term.
pub trait TimeDependentField: Send + Sync {
    fn value(&self, x: &Point3<f64>, t: f64) -> f64;
}

/// A tensor field `D(x)`, which for diffusion must be symmetric positive definite.
pub trait TensorField: Send + Sync {
    fn value(&self, x: &Point3<f64>) -> Matrix3<f64>;
}

/// A unit vector field, such as the local axon direction.
pub trait DirectionField: Send + Sync {
    fn direction(&self, x: &Point3<f64>) -> Vector3<f64>;
}

/// A reference solution `u(x, t)` together with its spatial gradient.
pub trait ExactSolution: Send + Sync {
    fn value(&self, x: &Point3<f64>, t: f64) -> f64;
    fn gradient(&self, x: &Point3<f64>, t: f64) -> Vector3<f64>;
}

impl<F> ScalarField for F
where
    F: Fn(&Point3<f64>) -> f64 + Send + Sync,
{
    fn value(&self, x: &Point3<f64>) -> f64 {
        self(x)
    }
}

impl<F> TimeDependentField for F
where
    F: Fn(&Point3<f64>, f64) -> f64 + Send + Sync,
{
    fn value(&self, x: &Point3<f64>, t: f64) -> f64 {
        self(x, t)
    }
}

impl<F> TensorField for F
where
    F: Fn(&Point3<f64>) -> Matrix3<f64> + Send + Sync,
{
    fn value(&self, x: &Point3<f64>) -> Matrix3<f64> {
        self(x)
    }
}

/// A field with the same value everywhere and at all times.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Constant(pub f64);

impl ScalarField for Constant {
    fn value(&self, _x: &Point3<f64>) -> f64 {
        self.0
    }
}

impl TimeDependentField for Constant {
    fn value(&self, _x: &Point3<f64>, _t: f64) -> f64 {
        self.0
    }
}

impl ExactSolution for Constant {
    fn value(&self, _x: &Point3<f64>, _t: f64) -> f64 {
        self.0
    }

    fn gradient(&self, _x: &Point3<f64>, _t: f64) -> Vector3<f64> {
        Vector3::zeros()
    }
}

/// The forcing term `f = 0`.
pub const ZERO_FORCING: Constant = Constant(0.0);

/// Diffusion `D(x) = d I`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IsotropicDiffusion(pub f64);

impl TensorField for IsotropicDiffusion {
    fn value(&self, _x: &Point3<f64>) -> Matrix3<f64> {
        Matrix3::identity() * self.0
    }
}

/// Unit vectors pointing away from a center point.
///
/// At the center itself, where the direction is undefined, the field is `e_x`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RadialDirection {
    pub center: Point3<f64>,
}

impl DirectionField for RadialDirection {
    fn direction(&self, x: &Point3<f64>) -> Vector3<f64> {
        let offset = x - self.center;
        let norm = offset.norm();
        if norm > 0.0 {
            offset / norm
        } else {
            Vector3::x()
        }
    }
}

/// Anisotropic diffusion along axons, `D(x) = d_ext I + d_axn n(x) n(x)^T`.
///
/// The extracellular part diffuses equally in all directions, and the axonal part adds
/// transport along the unit direction `n(x)`. With non-negative coefficients and
/// `d_ext > 0` the tensor is symmetric positive definite.
#[derive(Debug, Clone)]
pub struct AxonalDiffusion<N> {
    pub d_ext: f64,
    pub d_axn: f64,
    pub axon_direction: N,
}

impl<N: DirectionField> TensorField for AxonalDiffusion<N> {
    fn value(&self, x: &Point3<f64>) -> Matrix3<f64> {
        let n = self.axon_direction.direction(x);
        Matrix3::identity() * self.d_ext + n * n.transpose() * self.d_axn
    }
}

/// A concentration `value` inside the ball of radius `radius` around `center`, zero outside.
///
/// Models a localized seed of misfolded protein.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeedInitialCondition {
    pub center: Point3<f64>,
    pub radius: f64,
    pub value: f64,
}

impl ScalarField for SeedInitialCondition {
    fn value(&self, x: &Point3<f64>) -> f64 {
        if (x - self.center).norm() <= self.radius {
            self.value
        } else {
            0.0
        }
    }
}

/// An exact solution assembled from closures for the value and the gradient.
#[derive(Debug, Clone, Copy)]
pub struct FnExactSolution<U, G> {
    value: U,
    gradient: G,
}

impl<U, G> FnExactSolution<U, G>
where
    U: Fn(&Point3<f64>, f64) -> f64 + Send + Sync,
    G: Fn(&Point3<f64>, f64) -> Vector3<f64> + Send + Sync,
{
    pub fn new(value: U, gradient: G) -> Self {
        Self { value, gradient }
    }
}

impl<U, G> ExactSolution for FnExactSolution<U, G>
where
    U: Fn(&Point3<f64>, f64) -> f64 + Send + Sync,
    G: Fn(&Point3<f64>, f64) -> Vector3<f64> + Send + Sync,
{
    fn value(&self, x: &Point3<f64>, t: f64) -> f64 {
        (self.value)(x, t)
    }

    fn gradient(&self, x: &Point3<f64>, t: f64) -> Vector3<f64> {
        (self.gradient)(x, t)
    }
}

/// The coefficient fields of one problem instance.
pub struct Coefficients {
    pub diffusion: Box<dyn TensorField>,
    pub forcing: Box<dyn TimeDependentField>,
    pub initial_condition: Box<dyn ScalarField>,
}

impl Coefficients {
    /// The shipped brain model: axonal diffusion radiating from the axon center, no forcing,
    /// and a seed of misfolded protein as the initial condition.
    pub fn from_parameters(parameters: &Parameters) -> Self {
        let physics = &parameters.physics;
        let seed = &parameters.initial_condition;
        Self::new(
            AxonalDiffusion {
                d_ext: physics.d_ext,
                d_axn: physics.d_axn,
                axon_direction: RadialDirection {
                    center: Point3::from(physics.axon_center),
                },
            },
            ZERO_FORCING,
            SeedInitialCondition {
                center: Point3::from(seed.seed_center),
                radius: seed.seed_radius,
                value: seed.seed_value,
            },
        )
    }

    pub fn new(
        diffusion: impl TensorField + 'static,
        forcing: impl TimeDependentField + 'static,
        initial_condition: impl ScalarField + 'static,
    ) -> Self {
        Self {
            diffusion: Box::new(diffusion),
            forcing: Box::new(forcing),
            initial_condition: Box::new(initial_condition),
        }
    }
}
