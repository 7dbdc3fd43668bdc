use matrix::Matrix;

/// Matrices with at least this many entries are mapped on the rayon pool.
const PARALLEL_THRESHOLD: usize = 4096;

/// An elementwise activation and its derivative, both taken with respect to the
/// pre-activation `z`.
#[derive(Clone, Copy, Debug)]
pub struct Activation {
    pub function: fn(f64) -> f64,
    pub derivative: fn(f64) -> f64,
}

impl Activation {
    pub fn apply(&self, z: &Matrix) -> Matrix {
        map_elements(z, self.function)
    }

    pub fn prime(&self, z: &Matrix) -> Matrix {
        map_elements(z, self.derivative)
    }
}

fn map_elements(z: &Matrix, f: fn(f64) -> f64) -> Matrix {
    if z.rows() * z.cols() >= PARALLEL_THRESHOLD {
        z.par_map(f)
    } else {
        z.map(f)
    }
}

pub fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

pub fn sigmoid_prime(z: f64) -> f64 {
    let s = sigmoid(z);
    s * (1.0 - s)
}

pub const SIGMOID: Activation = Activation {
    function: sigmoid,
    derivative: sigmoid_prime,
};
