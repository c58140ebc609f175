//! The expression language of probabilistic model data.
//!
//! Expressions are typed AST nodes stored in the [`Model`]'s arena;
//! sub-expressions are referenced through [`ExpressionId`] handles.
//! The initializer builds them and checks their shape;
//! their numeric semantics (evaluation, sampling) belong to the
//! downstream analysis engines.

use crate::error::Error;
use crate::model::Model;
use crate::parameter::ParameterId;

/// An indexing object for expressions in a model.
///
/// These cannot be directly created
/// but have to be provided by a [`Model`].
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct ExpressionId(pub(crate) u32);

impl ExpressionId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// Constant values carried by literal expressions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
}

impl Value {
    /// Numeric view of the constant.
    pub fn as_f64(self) -> f64 {
        match self {
            Value::Bool(b) => {
                if b {
                    1.0
                } else {
                    0.0
                }
            }
            Value::Int(i) => i as f64,
            Value::Float(f) => f,
        }
    }
}

/// A typed expression node.
///
/// Arity is fixed per variant except for the variadic
/// `Min`/`Max`/`Mean`/`And`/`Or`,
/// the overloaded [`Expression::lognormal`] and [`Expression::periodic_test`],
/// and the bespoke `Histogram` and `Switch` shapes.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// Literal constant.
    Constant(Value),
    /// Reference to a parameter.
    Parameter(ParameterId),
    /// Reference to the model's mission time.
    MissionTime,
    // Arithmetic.
    Neg(ExpressionId),
    Add(ExpressionId, ExpressionId),
    Sub(ExpressionId, ExpressionId),
    Mul(ExpressionId, ExpressionId),
    Div(ExpressionId, ExpressionId),
    Mod(ExpressionId, ExpressionId),
    Pow(ExpressionId, ExpressionId),
    Abs(ExpressionId),
    Acos(ExpressionId),
    Asin(ExpressionId),
    Atan(ExpressionId),
    Cos(ExpressionId),
    Sin(ExpressionId),
    Tan(ExpressionId),
    Cosh(ExpressionId),
    Sinh(ExpressionId),
    Tanh(ExpressionId),
    Exp(ExpressionId),
    Log(ExpressionId),
    Log10(ExpressionId),
    Sqrt(ExpressionId),
    Ceil(ExpressionId),
    Floor(ExpressionId),
    Min(Vec<ExpressionId>),
    Max(Vec<ExpressionId>),
    Mean(Vec<ExpressionId>),
    // Boolean logic and comparisons.
    Not(ExpressionId),
    And(Vec<ExpressionId>),
    Or(Vec<ExpressionId>),
    Eq(ExpressionId, ExpressionId),
    Df(ExpressionId, ExpressionId),
    Lt(ExpressionId, ExpressionId),
    Gt(ExpressionId, ExpressionId),
    Leq(ExpressionId, ExpressionId),
    Geq(ExpressionId, ExpressionId),
    /// Conditional: (condition, then, else).
    Ite(ExpressionId, ExpressionId, ExpressionId),
    /// Ordered cases of (test, value) with a default value.
    Switch {
        cases: Vec<(ExpressionId, ExpressionId)>,
        default: ExpressionId,
    },
    /// Piecewise distribution: `boundaries.len() == weights.len() + 1`.
    Histogram {
        boundaries: Vec<ExpressionId>,
        weights: Vec<ExpressionId>,
    },
    // Random deviates; structural only, never sampled here.
    Exponential {
        rate: ExpressionId,
        time: ExpressionId,
    },
    Glm {
        gamma: ExpressionId,
        rate: ExpressionId,
        mu: ExpressionId,
        time: ExpressionId,
    },
    Weibull {
        alpha: ExpressionId,
        beta: ExpressionId,
        t0: ExpressionId,
        time: ExpressionId,
    },
    /// Arguments in one of the 4-, 5-, or 11-parameter forms.
    PeriodicTest(Vec<ExpressionId>),
    UniformDeviate {
        min: ExpressionId,
        max: ExpressionId,
    },
    NormalDeviate {
        mean: ExpressionId,
        sigma: ExpressionId,
    },
    /// Either (mean, error factor, confidence level) or (mu, sigma).
    LognormalDeviate(Vec<ExpressionId>),
    GammaDeviate {
        k: ExpressionId,
        theta: ExpressionId,
    },
    BetaDeviate {
        alpha: ExpressionId,
        beta: ExpressionId,
    },
}

impl Expression {
    /// Builds a lognormal deviate from 2 (mu, sigma)
    /// or 3 (mean, error factor, confidence level) arguments.
    pub fn lognormal(args: Vec<ExpressionId>) -> Result<Self, Error> {
        match args.len() {
            2 | 3 => Ok(Expression::LognormalDeviate(args)),
            n => Err(Error::InvalidArgument(format!(
                "lognormal-deviate takes 2 or 3 arguments, got {n}"
            ))),
        }
    }

    /// Builds a periodic-test deviate from one of its overloaded forms.
    pub fn periodic_test(args: Vec<ExpressionId>) -> Result<Self, Error> {
        match args.len() {
            4 | 5 | 11 => Ok(Expression::PeriodicTest(args)),
            n => Err(Error::InvalidArgument(format!(
                "periodic-test takes 4, 5, or 11 arguments, got {n}"
            ))),
        }
    }

    /// Builds a histogram from parallel boundary and weight sequences.
    /// The boundaries include the lower bound, so there is one more
    /// boundary than weights.
    pub fn histogram(
        boundaries: Vec<ExpressionId>,
        weights: Vec<ExpressionId>,
    ) -> Result<Self, Error> {
        if weights.is_empty() || boundaries.len() != weights.len() + 1 {
            return Err(Error::InvalidArgument(format!(
                "histogram requires a lower boundary and at least one bin, \
                 got {} boundaries and {} weights",
                boundaries.len(),
                weights.len()
            )));
        }
        Ok(Expression::Histogram {
            boundaries,
            weights,
        })
    }

    /// Direct child expressions of this node.
    pub fn children(&self) -> Vec<ExpressionId> {
        match self {
            Expression::Constant(_) | Expression::Parameter(_) | Expression::MissionTime => {
                Vec::new()
            }
            Expression::Neg(x)
            | Expression::Abs(x)
            | Expression::Acos(x)
            | Expression::Asin(x)
            | Expression::Atan(x)
            | Expression::Cos(x)
            | Expression::Sin(x)
            | Expression::Tan(x)
            | Expression::Cosh(x)
            | Expression::Sinh(x)
            | Expression::Tanh(x)
            | Expression::Exp(x)
            | Expression::Log(x)
            | Expression::Log10(x)
            | Expression::Sqrt(x)
            | Expression::Ceil(x)
            | Expression::Floor(x)
            | Expression::Not(x) => vec![*x],
            Expression::Add(a, b)
            | Expression::Sub(a, b)
            | Expression::Mul(a, b)
            | Expression::Div(a, b)
            | Expression::Mod(a, b)
            | Expression::Pow(a, b)
            | Expression::Eq(a, b)
            | Expression::Df(a, b)
            | Expression::Lt(a, b)
            | Expression::Gt(a, b)
            | Expression::Leq(a, b)
            | Expression::Geq(a, b) => vec![*a, *b],
            Expression::Min(args)
            | Expression::Max(args)
            | Expression::Mean(args)
            | Expression::And(args)
            | Expression::Or(args)
            | Expression::PeriodicTest(args)
            | Expression::LognormalDeviate(args) => args.clone(),
            Expression::Ite(c, t, e) => vec![*c, *t, *e],
            Expression::Switch { cases, default } => {
                let mut out: Vec<ExpressionId> = Vec::with_capacity(cases.len() * 2 + 1);
                for (test, value) in cases {
                    out.push(*test);
                    out.push(*value);
                }
                out.push(*default);
                out
            }
            Expression::Histogram {
                boundaries,
                weights,
            } => boundaries.iter().chain(weights).copied().collect(),
            Expression::Exponential { rate, time } => vec![*rate, *time],
            Expression::Glm {
                gamma,
                rate,
                mu,
                time,
            } => vec![*gamma, *rate, *mu, *time],
            Expression::Weibull {
                alpha,
                beta,
                t0,
                time,
            } => vec![*alpha, *beta, *t0, *time],
            Expression::UniformDeviate { min, max } => vec![*min, *max],
            Expression::NormalDeviate { mean, sigma } => vec![*mean, *sigma],
            Expression::GammaDeviate { k, theta } => vec![*k, *theta],
            Expression::BetaDeviate { alpha, beta } => vec![*alpha, *beta],
        }
    }
}

impl Model {
    /// Folds an expression to a number when it is a literal constant,
    /// a parameter with a foldable body, or the mission time.
    /// Anything requiring real evaluation yields `None`.
    pub fn as_constant(&self, id: ExpressionId) -> Option<f64> {
        match self.expression(id) {
            Expression::Constant(value) => Some(value.as_f64()),
            Expression::Parameter(parameter) => self
                .parameter(*parameter)
                .expression()
                .and_then(|body| self.as_constant(body)),
            Expression::MissionTime => Some(self.mission_time().value()),
            _ => None,
        }
    }

    /// Checks the numeric domain of an expression node.
    ///
    /// Only trivially-constant operands are folded;
    /// interval analysis over deviates is downstream work.
    /// Run after parameter cycle detection so parameter folding terminates.
    pub fn validate_expression(&self, id: ExpressionId) -> Result<(), Error> {
        let constant = |arg: ExpressionId| self.as_constant(arg);
        let non_negative = |arg: ExpressionId, what: &str| -> Result<(), Error> {
            match constant(arg) {
                Some(v) if v < 0.0 => Err(Error::InvalidArgument(format!(
                    "{what} cannot be negative: {v}"
                ))),
                _ => Ok(()),
            }
        };
        let positive = |arg: ExpressionId, what: &str| -> Result<(), Error> {
            match constant(arg) {
                Some(v) if v <= 0.0 => Err(Error::InvalidArgument(format!(
                    "{what} must be positive: {v}"
                ))),
                _ => Ok(()),
            }
        };

        match self.expression(id) {
            Expression::Div(_, divisor) | Expression::Mod(_, divisor) => {
                if constant(*divisor) == Some(0.0) {
                    return Err(Error::InvalidArgument("division by zero".to_owned()));
                }
                Ok(())
            }
            Expression::Exponential { rate, time } => {
                non_negative(*rate, "rate of failure")?;
                non_negative(*time, "mission time")
            }
            Expression::Glm {
                gamma,
                rate,
                mu,
                time,
            } => {
                if let Some(g) = constant(*gamma) {
                    if !(0.0..=1.0).contains(&g) {
                        return Err(Error::InvalidArgument(format!(
                            "failure-on-demand probability must be in [0, 1]: {g}"
                        )));
                    }
                }
                non_negative(*rate, "rate of failure")?;
                non_negative(*mu, "rate of repair")?;
                non_negative(*time, "mission time")
            }
            Expression::Weibull {
                alpha,
                beta,
                t0,
                time,
            } => {
                positive(*alpha, "scale parameter")?;
                positive(*beta, "shape parameter")?;
                non_negative(*t0, "time shift")?;
                non_negative(*time, "mission time")
            }
            Expression::PeriodicTest(args) => {
                non_negative(args[0], "rate of failure")?;
                // The test interval position depends on the overloaded form.
                match args.len() {
                    4 => {
                        positive(args[1], "time between tests")?;
                        non_negative(args[2], "time before the first test")?;
                        non_negative(args[3], "mission time")
                    }
                    5 => {
                        non_negative(args[1], "rate of repair")?;
                        positive(args[2], "time between tests")?;
                        non_negative(args[3], "time before the first test")?;
                        non_negative(args[4], "mission time")
                    }
                    _ => Ok(()),
                }
            }
            Expression::UniformDeviate { min, max } => {
                if let (Some(lo), Some(hi)) = (constant(*min), constant(*max)) {
                    if lo >= hi {
                        return Err(Error::InvalidArgument(format!(
                            "the lower bound {lo} must be less than the upper bound {hi}"
                        )));
                    }
                }
                Ok(())
            }
            Expression::NormalDeviate { sigma, .. } => positive(*sigma, "standard deviation"),
            Expression::LognormalDeviate(args) => {
                if args.len() == 2 {
                    positive(args[1], "standard deviation")
                } else {
                    positive(args[0], "mean")?;
                    if let Some(ef) = constant(args[1]) {
                        if ef <= 1.0 {
                            return Err(Error::InvalidArgument(format!(
                                "error factor must be greater than 1: {ef}"
                            )));
                        }
                    }
                    if let Some(level) = constant(args[2]) {
                        if !(0.0 < level && level < 1.0) {
                            return Err(Error::InvalidArgument(format!(
                                "confidence level must be in (0, 1): {level}"
                            )));
                        }
                    }
                    Ok(())
                }
            }
            Expression::GammaDeviate { k, theta } => {
                positive(*k, "shape parameter")?;
                positive(*theta, "scale parameter")
            }
            Expression::BetaDeviate { alpha, beta } => {
                positive(*alpha, "alpha shape parameter")?;
                positive(*beta, "beta shape parameter")
            }
            Expression::Histogram {
                boundaries,
                weights,
            } => {
                let folded: Option<Vec<f64>> = boundaries.iter().map(|b| constant(*b)).collect();
                if let Some(bounds) = folded {
                    if bounds.windows(2).any(|w| w[0] >= w[1]) {
                        return Err(Error::InvalidArgument(
                            "histogram boundaries must be strictly increasing".to_owned(),
                        ));
                    }
                }
                for weight in weights {
                    non_negative(*weight, "histogram weight")?;
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overloaded_arities() {
        let args = |n: u32| (0..n).map(ExpressionId).collect::<Vec<_>>();
        assert!(Expression::lognormal(args(2)).is_ok());
        assert!(Expression::lognormal(args(3)).is_ok());
        assert!(Expression::lognormal(args(1)).is_err());
        assert!(Expression::lognormal(args(4)).is_err());
        assert!(Expression::periodic_test(args(4)).is_ok());
        assert!(Expression::periodic_test(args(5)).is_ok());
        assert!(Expression::periodic_test(args(11)).is_ok());
        assert!(Expression::periodic_test(args(3)).is_err());
        assert!(Expression::periodic_test(args(6)).is_err());
    }

    #[test]
    fn histogram_shape() {
        let ids = |n: u32| (0..n).map(ExpressionId).collect::<Vec<_>>();
        assert!(Expression::histogram(ids(3), ids(2)).is_ok());
        assert!(Expression::histogram(ids(2), ids(2)).is_err());
        assert!(Expression::histogram(ids(1), ids(0)).is_err());
    }

    #[test]
    fn domain_checks_fold_constants() {
        let mut model = Model::new("test");
        let lo = model.add_expression(Expression::Constant(Value::Float(2.0)));
        let hi = model.add_expression(Expression::Constant(Value::Float(1.0)));
        let uniform = model.add_expression(Expression::UniformDeviate { min: lo, max: hi });
        assert!(matches!(
            model.validate_expression(uniform),
            Err(Error::InvalidArgument(_))
        ));

        let sigma = model.add_expression(Expression::Constant(Value::Float(0.5)));
        let normal = model.add_expression(Expression::NormalDeviate {
            mean: lo,
            sigma,
        });
        assert!(model.validate_expression(normal).is_ok());

        let zero = model.add_expression(Expression::Constant(Value::Int(0)));
        let division = model.add_expression(Expression::Div(lo, zero));
        assert!(model.validate_expression(division).is_err());
    }
}
