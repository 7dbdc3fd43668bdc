use crate::activations::SIGMOID;
use crate::costs::Cost;
use crate::error::{NetworkError, Result};
use crate::record::NetworkRecord;
use crate::regularization::{L1_REG, L2_REG, RegularizationFunction};
use matrix::Matrix;
use rand::Rng;
use std::fs;
use std::path::Path;

/// How weights and biases are drawn when a network is (re)initialised.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum WeightInit {
    /// Weights ~ N(0, 1) / sqrt(size of the receiving layer), biases ~ N(0, 1).
    #[default]
    Default,
    /// Weights and biases ~ N(0, 1).
    Large,
}

/// Settings for one mini-batch update.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StepParameters {
    /// Learning rate.
    pub eta: f64,
    /// Momentum coefficient; zero gives plain gradient descent.
    pub mu: f64,
    /// L1 strength
    pub lambda_l1: f64,
    /// L2 strength
    pub lambda_l2: f64,
    /// Size of the full training set, used to scale the regularization.
    pub n: usize,
}

/// Cost gradients, summed over the examples passed to [`Network::backprop`].
#[derive(Clone, Debug, PartialEq)]
pub struct Gradients {
    /// One matrix per weight matrix of the network
    pub nabla_w: Vec<Matrix>,
    pub nabla_b: Vec<Matrix>,
}

impl Gradients {
    /// Zero gradients shaped like the weights and biases of `network`.
    pub fn zeros_for(network: &Network) -> Self {
        Self {
            nabla_w: zeros_like(&network.weights),
            nabla_b: zeros_like(&network.biases),
        }
    }

    /// Resets every entry to zero, keeping the shapes.
    pub fn clear(&mut self) {
        self.nabla_w = zeros_like(&self.nabla_w);
        self.nabla_b = zeros_like(&self.nabla_b);
    }
}

fn zeros_like(matrices: &[Matrix]) -> Vec<Matrix> {
    matrices
        .iter()
        .map(|m| Matrix::zeros(m.rows(), m.cols()))
        .collect()
}

/// A fully connected feedforward network with sigmoid activations in every
/// non-input layer, trained with momentum.
///
/// Layer `i + 1` is computed from layer `i` as `sigmoid(weights[i] . a + biases[i])`,
/// where `weights[i]` is `sizes[i + 1] x sizes[i]` and `biases[i]` is a column vector.
/// Every weight and bias carries a velocity of the same shape that is updated by
/// [`Network::apply_gradients`] and persists across mini-batches.
///
/// # Examples
///
/// ```
/// use matrix::Matrix;
/// use neural_network::{Cost, Network};
/// use rand::SeedableRng;
/// use rand::rngs::StdRng;
///
/// let mut rng = StdRng::seed_from_u64(42);
/// let network = Network::new(vec![2, 3, 1], Cost::CrossEntropy, &mut rng).unwrap();
///
/// let output = network.feedforward(&Matrix::from(vec![1.0, 0.0])).unwrap();
/// assert_eq!(output.shape(), (1, 1));
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct Network {
    sizes: Vec<usize>,
    weights: Vec<Matrix>,
    biases: Vec<Matrix>,
    vel_weights: Vec<Matrix>,
    vel_biases: Vec<Matrix>,
    cost: Cost,
}

impl Network {
    /// Creates a network with the given layer sizes, drawing its parameters with
    /// [`WeightInit::Default`].
    ///
    /// # Arguments
    ///
    /// * `sizes` - Number of neurons per layer, input layer first. At least two layers.
    /// * `cost` - Cost function of the output layer.
    /// * `rng` - Source of the initial weights and biases.
    ///
    /// # Errors
    ///
    /// Returns [`NetworkError::InvalidSizes`] if there are fewer than two layers or a
    /// layer is empty.
    pub fn new<R: Rng + ?Sized>(sizes: Vec<usize>, cost: Cost, rng: &mut R) -> Result<Self> {
        Self::with_init(sizes, cost, WeightInit::Default, rng)
    }

    pub fn with_init<R: Rng + ?Sized>(
        sizes: Vec<usize>,
        cost: Cost,
        init: WeightInit,
        rng: &mut R,
    ) -> Result<Self> {
        validate_sizes(&sizes)?;
        let (weights, biases) = draw_parameters(&sizes, init, rng);
        Ok(Self::assemble(sizes, weights, biases, cost))
    }

    /// Creates a network from explicit parameters, with zero velocities.
    ///
    /// # Errors
    ///
    /// Returns an error if `sizes` is invalid or any matrix has the wrong shape.
    pub fn from_parameters(
        sizes: Vec<usize>,
        weights: Vec<Matrix>,
        biases: Vec<Matrix>,
        cost: Cost,
    ) -> Result<Self> {
        validate_sizes(&sizes)?;
        let gaps = sizes.len() - 1;
        if weights.len() != gaps || biases.len() != gaps {
            return Err(NetworkError::InvalidShape {
                what: "parameter list".to_string(),
                expected: (gaps, gaps),
                actual: (weights.len(), biases.len()),
            });
        }
        for (i, (w, b)) in weights.iter().zip(&biases).enumerate() {
            check_shape(&format!("weights[{i}]"), w, (sizes[i + 1], sizes[i]))?;
            check_shape(&format!("biases[{i}]"), b, (sizes[i + 1], 1))?;
        }
        Ok(Self::assemble(sizes, weights, biases, cost))
    }

    fn assemble(sizes: Vec<usize>, weights: Vec<Matrix>, biases: Vec<Matrix>, cost: Cost) -> Self {
        let vel_weights = zeros_like(&weights);
        let vel_biases = zeros_like(&biases);
        Network {
            sizes,
            weights,
            biases,
            vel_weights,
            vel_biases,
            cost,
        }
    }

    pub fn sizes(&self) -> &[usize] {
        &self.sizes
    }

    pub fn weights(&self) -> &[Matrix] {
        &self.weights
    }

    pub fn biases(&self) -> &[Matrix] {
        &self.biases
    }

    pub fn vel_weights(&self) -> &[Matrix] {
        &self.vel_weights
    }

    pub fn vel_biases(&self) -> &[Matrix] {
        &self.vel_biases
    }

    pub fn cost(&self) -> Cost {
        self.cost
    }

    pub fn set_cost(&mut self, cost: Cost) {
        self.cost = cost;
    }

    pub fn input_size(&self) -> usize {
        self.sizes[0]
    }

    pub fn output_size(&self) -> usize {
        self.sizes[self.sizes.len() - 1]
    }

    /// Draws fresh weights and biases and zeroes the velocities.
    pub fn reinitialize<R: Rng + ?Sized>(&mut self, init: WeightInit, rng: &mut R) {
        let (weights, biases) = draw_parameters(&self.sizes, init, rng);
        self.weights = weights;
        self.biases = biases;
        self.reset_velocities();
    }

    pub fn reset_velocities(&mut self) {
        self.vel_weights = zeros_like(&self.weights);
        self.vel_biases = zeros_like(&self.biases);
    }

    /// Runs the input columns through the network.
    ///
    /// # Arguments
    ///
    /// * `input` - One example per column; must have as many rows as the input layer.
    ///
    /// # Returns
    ///
    /// The output activations, one column per input column.
    ///
    /// # Errors
    ///
    /// Returns [`NetworkError::InvalidInput`] if the row count is wrong.
    pub fn feedforward(&self, input: &Matrix) -> Result<Matrix> {
        self.check_rows(input, self.input_size())?;
        let mut a = input.clone();
        for (w, b) in self.weights.iter().zip(&self.biases) {
            a = SIGMOID.apply(&w.dot_multiply(&a).add_column(b));
        }
        Ok(a)
    }

    /// Computes the cost gradients for the batch `(x, y)` and adds them to `gradients`.
    ///
    /// The gradients are summed, not averaged, over the columns of the batch, so the
    /// caller is expected to pass cleared [`Gradients`] unless it wants to accumulate
    /// several batches.
    ///
    /// # Errors
    ///
    /// Returns an error if `x` or `y` has the wrong number of rows, or if their column
    /// counts differ.
    pub fn backprop(&self, x: &Matrix, y: &Matrix, gradients: &mut Gradients) -> Result<()> {
        self.check_rows(x, self.input_size())?;
        self.check_rows(y, self.output_size())?;
        if x.cols() != y.cols() {
            return Err(NetworkError::DatasetMismatch {
                inputs: x.cols(),
                targets: y.cols(),
            });
        }

        let mut activations = Vec::with_capacity(self.sizes.len());
        let mut zs = Vec::with_capacity(self.weights.len());
        activations.push(x.clone());
        for (w, b) in self.weights.iter().zip(&self.biases) {
            let z = w.dot_multiply(&activations[activations.len() - 1]).add_column(b);
            activations.push(SIGMOID.apply(&z));
            zs.push(z);
        }

        let last = self.weights.len() - 1;
        let mut delta = self.cost.error(&zs[last], &activations[last + 1], y);
        for layer in (0..=last).rev() {
            if layer < last {
                delta = self.weights[layer + 1]
                    .transpose()
                    .dot_multiply(&delta)
                    .elementwise_multiply(&SIGMOID.prime(&zs[layer]));
            }
            gradients.nabla_b[layer] += &delta.sum_columns();
            gradients.nabla_w[layer] += &delta.dot_multiply(&activations[layer].transpose());
        }
        Ok(())
    }

    /// Applies one momentum step computed from gradients summed over `batch_len`
    /// examples.
    ///
    /// For every layer the weight velocity is first decayed by the L1 and L2 terms,
    /// then both velocities are scaled by `mu`, the averaged gradient step
    /// `(eta / batch_len) * nabla` is subtracted, and the velocities are added to the
    /// weights and biases.
    pub fn apply_gradients(&mut self, gradients: &Gradients, batch_len: usize, step: &StepParameters) {
        let rate = step.eta / batch_len as f64;
        let layers = self
            .weights
            .iter_mut()
            .zip(self.biases.iter_mut())
            .zip(self.vel_weights.iter_mut().zip(self.vel_biases.iter_mut()))
            .zip(gradients.nabla_w.iter().zip(&gradients.nabla_b));

        for (((w, b), (vel_w, vel_b)), (nabla_w, nabla_b)) in layers {
            L1_REG.decay(vel_w, w, step.eta, step.lambda_l1, step.n);
            L2_REG.decay(vel_w, w, step.eta, step.lambda_l2, step.n);

            *vel_w *= step.mu;
            *vel_b *= step.mu;
            vel_w.scaled_add(-rate, nabla_w);
            vel_b.scaled_add(-rate, nabla_b);

            *w += &*vel_w;
            *b += &*vel_b;
        }
    }

    /// Combined L1 and L2 penalty of the current weights for a dataset of `n` examples.
    pub fn regularization_penalty(&self, lambda_l1: f64, lambda_l2: f64, n: usize) -> f64 {
        L1_REG.penalty(&self.weights, lambda_l1, n) + L2_REG.penalty(&self.weights, lambda_l2, n)
    }

    /// Saves the network to a file in JSON format.
    ///
    /// Velocities are not saved.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails or if the file cannot be written.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use neural_network::{Cost, Network};
    /// use rand::SeedableRng;
    /// use rand::rngs::StdRng;
    ///
    /// let network = Network::new(vec![2, 3, 1], Cost::Quadratic, &mut StdRng::seed_from_u64(1)).unwrap();
    /// network.save("my_network.json").unwrap();
    /// ```
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(&NetworkRecord::from(self))?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Loads a network saved by [`Network::save`]. Velocities start at zero.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not valid JSON, names an
    /// unknown cost function or holds matrices of the wrong shape.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        let record: NetworkRecord = serde_json::from_str(&json)?;
        Network::try_from(record)
    }

    fn check_rows(&self, m: &Matrix, expected: usize) -> Result<()> {
        if m.rows() != expected {
            return Err(NetworkError::InvalidInput {
                expected,
                actual: m.rows(),
            });
        }
        Ok(())
    }
}

fn validate_sizes(sizes: &[usize]) -> Result<()> {
    if sizes.len() < 2 || sizes.contains(&0) {
        return Err(NetworkError::InvalidSizes(sizes.to_vec()));
    }
    Ok(())
}

fn check_shape(what: &str, m: &Matrix, expected: (usize, usize)) -> Result<()> {
    if m.shape() != expected {
        return Err(NetworkError::InvalidShape {
            what: what.to_string(),
            expected,
            actual: m.shape(),
        });
    }
    Ok(())
}

fn draw_parameters<R: Rng + ?Sized>(
    sizes: &[usize],
    init: WeightInit,
    rng: &mut R,
) -> (Vec<Matrix>, Vec<Matrix>) {
    sizes
        .windows(2)
        .map(|window| {
            let (from, to) = (window[0], window[1]);
            let mut w = Matrix::random_normal(to, from, rng);
            if init == WeightInit::Default {
                w *= 1.0 / (to as f64).sqrt();
            }
            let b = Matrix::random_normal(to, 1, rng);
            (w, b)
        })
        .unzip()
}
