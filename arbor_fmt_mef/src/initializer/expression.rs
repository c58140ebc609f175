//! Expression extraction from XML elements.
//!
//! The element tag selects the expression kind.
//! Constants, parameter references, and mission time are handled
//! directly; every other tag goes through the generic extraction,
//! which reads the child elements as sub-expressions with the arity
//! the kind demands.
//! Extracted expressions are queued for bulk validation after cycle
//! detection, so cyclic parameter references cannot blow the stack
//! during range checks.

use arbor_core::{Error, Expression, ExpressionId, Model, Units, Value};

use super::{at_line, node_ref, required_attribute, Initializer};
use crate::vocabulary::*;
use crate::xml::XmlElement;

impl Initializer {
    /// Builds the expression rooted at `node`,
    /// storing it in the model's arena.
    pub(super) fn build_expression(
        &mut self,
        doc: usize,
        node: XmlElement<'_>,
        base_path: &str,
    ) -> Result<ExpressionId, Error> {
        match node.name() {
            TAG_INT => {
                let value = required_attribute(node, ATTR_VALUE)?;
                let value: i64 = value.parse().map_err(|_| {
                    Error::Validation(format!(
                        "{}invalid `value` attribute: {value}",
                        at_line(node)
                    ))
                })?;
                Ok(self.model.add_expression(Expression::Constant(Value::Int(value))))
            }
            TAG_FLOAT => {
                let value = required_attribute(node, ATTR_VALUE)?;
                let value: f64 = value.parse().map_err(|_| {
                    Error::Validation(format!(
                        "{}invalid `value` attribute: {value}",
                        at_line(node)
                    ))
                })?;
                Ok(self
                    .model
                    .add_expression(Expression::Constant(Value::Float(value))))
            }
            TAG_BOOL => {
                let value = required_attribute(node, ATTR_VALUE)?;
                Ok(if value == "true" { Model::ONE } else { Model::ZERO })
            }
            TAG_PI => Ok(Model::PI),
            TAG_PARAMETER => {
                let name = required_attribute(node, ATTR_NAME)?;
                let parameter = self.model.get_parameter(name, base_path).ok_or_else(|| {
                    Error::Validation(format!(
                        "{}Undefined parameter {name} with base path {base_path}",
                        at_line(node)
                    ))
                })?;
                check_units(node, self.model.parameter(parameter).unit())?;
                Ok(self.model.add_expression(Expression::Parameter(parameter)))
            }
            TAG_SYSTEM_MISSION_TIME => {
                check_units(node, self.model.mission_time().unit())?;
                Ok(self.model.add_expression(Expression::MissionTime))
            }
            _ => {
                let expression = self
                    .extract_expression(doc, node, base_path)
                    .map_err(|err| match err {
                        Error::InvalidArgument(msg) => {
                            Error::Validation(format!("{}{msg}", at_line(node)))
                        }
                        other => other,
                    })?;
                let id = self.model.add_expression(expression);
                self.expressions.push((id, node_ref(doc, node)));
                Ok(id)
            }
        }
    }

    /// Generic extraction dispatched on the element tag.
    fn extract_expression(
        &mut self,
        doc: usize,
        node: XmlElement<'_>,
        base_path: &str,
    ) -> Result<Expression, Error> {
        let args: Vec<XmlElement<'_>> = node.children().collect();
        match node.name() {
            "neg" => {
                let [x] = self.extract_fixed(doc, &args, base_path, node)?;
                Ok(Expression::Neg(x))
            }
            "add" => {
                let [a, b] = self.extract_fixed(doc, &args, base_path, node)?;
                Ok(Expression::Add(a, b))
            }
            "sub" => {
                let [a, b] = self.extract_fixed(doc, &args, base_path, node)?;
                Ok(Expression::Sub(a, b))
            }
            "mul" => {
                let [a, b] = self.extract_fixed(doc, &args, base_path, node)?;
                Ok(Expression::Mul(a, b))
            }
            "div" => {
                let [a, b] = self.extract_fixed(doc, &args, base_path, node)?;
                Ok(Expression::Div(a, b))
            }
            "mod" => {
                let [a, b] = self.extract_fixed(doc, &args, base_path, node)?;
                Ok(Expression::Mod(a, b))
            }
            "pow" => {
                let [a, b] = self.extract_fixed(doc, &args, base_path, node)?;
                Ok(Expression::Pow(a, b))
            }
            "abs" => self.extract_unary(doc, &args, base_path, node, Expression::Abs),
            "acos" => self.extract_unary(doc, &args, base_path, node, Expression::Acos),
            "asin" => self.extract_unary(doc, &args, base_path, node, Expression::Asin),
            "atan" => self.extract_unary(doc, &args, base_path, node, Expression::Atan),
            "cos" => self.extract_unary(doc, &args, base_path, node, Expression::Cos),
            "sin" => self.extract_unary(doc, &args, base_path, node, Expression::Sin),
            "tan" => self.extract_unary(doc, &args, base_path, node, Expression::Tan),
            "cosh" => self.extract_unary(doc, &args, base_path, node, Expression::Cosh),
            "sinh" => self.extract_unary(doc, &args, base_path, node, Expression::Sinh),
            "tanh" => self.extract_unary(doc, &args, base_path, node, Expression::Tanh),
            "exp" => self.extract_unary(doc, &args, base_path, node, Expression::Exp),
            "log" => self.extract_unary(doc, &args, base_path, node, Expression::Log),
            "log10" => self.extract_unary(doc, &args, base_path, node, Expression::Log10),
            "sqrt" => self.extract_unary(doc, &args, base_path, node, Expression::Sqrt),
            "ceil" => self.extract_unary(doc, &args, base_path, node, Expression::Ceil),
            "floor" => self.extract_unary(doc, &args, base_path, node, Expression::Floor),
            "not" => self.extract_unary(doc, &args, base_path, node, Expression::Not),
            "min" => self.extract_variadic(doc, &args, base_path, node, Expression::Min),
            "max" => self.extract_variadic(doc, &args, base_path, node, Expression::Max),
            "mean" => self.extract_variadic(doc, &args, base_path, node, Expression::Mean),
            "and" => self.extract_variadic(doc, &args, base_path, node, Expression::And),
            "or" => self.extract_variadic(doc, &args, base_path, node, Expression::Or),
            "eq" => {
                let [a, b] = self.extract_fixed(doc, &args, base_path, node)?;
                Ok(Expression::Eq(a, b))
            }
            "df" => {
                let [a, b] = self.extract_fixed(doc, &args, base_path, node)?;
                Ok(Expression::Df(a, b))
            }
            "lt" => {
                let [a, b] = self.extract_fixed(doc, &args, base_path, node)?;
                Ok(Expression::Lt(a, b))
            }
            "gt" => {
                let [a, b] = self.extract_fixed(doc, &args, base_path, node)?;
                Ok(Expression::Gt(a, b))
            }
            "leq" => {
                let [a, b] = self.extract_fixed(doc, &args, base_path, node)?;
                Ok(Expression::Leq(a, b))
            }
            "geq" => {
                let [a, b] = self.extract_fixed(doc, &args, base_path, node)?;
                Ok(Expression::Geq(a, b))
            }
            "ite" => {
                let [condition, then, otherwise] =
                    self.extract_fixed(doc, &args, base_path, node)?;
                Ok(Expression::Ite(condition, then, otherwise))
            }
            "exponential" => {
                let [rate, time] = self.extract_fixed(doc, &args, base_path, node)?;
                Ok(Expression::Exponential { rate, time })
            }
            "GLM" => {
                let [gamma, rate, mu, time] = self.extract_fixed(doc, &args, base_path, node)?;
                Ok(Expression::Glm {
                    gamma,
                    rate,
                    mu,
                    time,
                })
            }
            "Weibull" => {
                let [alpha, beta, t0, time] = self.extract_fixed(doc, &args, base_path, node)?;
                Ok(Expression::Weibull {
                    alpha,
                    beta,
                    t0,
                    time,
                })
            }
            "periodic-test" => {
                let args = self.extract_all(doc, &args, base_path)?;
                Expression::periodic_test(args)
            }
            "uniform-deviate" => {
                let [min, max] = self.extract_fixed(doc, &args, base_path, node)?;
                Ok(Expression::UniformDeviate { min, max })
            }
            "normal-deviate" => {
                let [mean, sigma] = self.extract_fixed(doc, &args, base_path, node)?;
                Ok(Expression::NormalDeviate { mean, sigma })
            }
            "lognormal-deviate" => {
                let args = self.extract_all(doc, &args, base_path)?;
                Expression::lognormal(args)
            }
            "gamma-deviate" => {
                let [k, theta] = self.extract_fixed(doc, &args, base_path, node)?;
                Ok(Expression::GammaDeviate { k, theta })
            }
            "beta-deviate" => {
                let [alpha, beta] = self.extract_fixed(doc, &args, base_path, node)?;
                Ok(Expression::BetaDeviate { alpha, beta })
            }
            "histogram" => self.extract_histogram(doc, &args, base_path),
            "switch" => self.extract_switch(doc, &args, base_path),
            other => Err(Error::Validation(format!(
                "{}unsupported expression `{other}`",
                at_line(node)
            ))),
        }
    }

    fn extract_fixed<const N: usize>(
        &mut self,
        doc: usize,
        args: &[XmlElement<'_>],
        base_path: &str,
        node: XmlElement<'_>,
    ) -> Result<[ExpressionId; N], Error> {
        if args.len() != N {
            return Err(Error::InvalidArgument(format!(
                "`{}` takes {N} arguments, got {}",
                node.name(),
                args.len()
            )));
        }
        let mut out = [Model::ZERO; N];
        for (slot, arg) in out.iter_mut().zip(args) {
            *slot = self.build_expression(doc, *arg, base_path)?;
        }
        Ok(out)
    }

    fn extract_unary(
        &mut self,
        doc: usize,
        args: &[XmlElement<'_>],
        base_path: &str,
        node: XmlElement<'_>,
        construct: fn(ExpressionId) -> Expression,
    ) -> Result<Expression, Error> {
        let [x] = self.extract_fixed(doc, args, base_path, node)?;
        Ok(construct(x))
    }

    fn extract_variadic(
        &mut self,
        doc: usize,
        args: &[XmlElement<'_>],
        base_path: &str,
        node: XmlElement<'_>,
        construct: fn(Vec<ExpressionId>) -> Expression,
    ) -> Result<Expression, Error> {
        if args.is_empty() {
            return Err(Error::InvalidArgument(format!(
                "`{}` takes at least one argument",
                node.name()
            )));
        }
        let args = self.extract_all(doc, args, base_path)?;
        Ok(construct(args))
    }

    fn extract_all(
        &mut self,
        doc: usize,
        args: &[XmlElement<'_>],
        base_path: &str,
    ) -> Result<Vec<ExpressionId>, Error> {
        args.iter()
            .map(|arg| self.build_expression(doc, *arg, base_path))
            .collect()
    }

    /// The first child is the lower boundary;
    /// each following `bin` carries an upper boundary and a weight.
    fn extract_histogram(
        &mut self,
        doc: usize,
        args: &[XmlElement<'_>],
        base_path: &str,
    ) -> Result<Expression, Error> {
        let (first, bins) = args.split_first().ok_or_else(|| {
            Error::InvalidArgument(
                "histogram requires a lower boundary and at least one bin".to_owned(),
            )
        })?;
        let mut boundaries = vec![self.build_expression(doc, *first, base_path)?];
        let mut weights = Vec::new();
        for bin in bins {
            let pair: Vec<XmlElement<'_>> = bin.children().collect();
            if bin.name() != TAG_BIN || pair.len() != 2 {
                return Err(Error::InvalidArgument(format!(
                    "histogram bin takes an upper boundary and a weight, got `{}` with {} elements",
                    bin.name(),
                    pair.len()
                )));
            }
            boundaries.push(self.build_expression(doc, pair[0], base_path)?);
            weights.push(self.build_expression(doc, pair[1], base_path)?);
        }
        Expression::histogram(boundaries, weights)
    }

    /// All children but the last are `case` nodes of (test, value);
    /// the last child is the default value.
    fn extract_switch(
        &mut self,
        doc: usize,
        args: &[XmlElement<'_>],
        base_path: &str,
    ) -> Result<Expression, Error> {
        let (default_node, case_nodes) = args.split_last().ok_or_else(|| {
            Error::InvalidArgument("switch requires a default value".to_owned())
        })?;
        let mut cases = Vec::new();
        for case in case_nodes {
            let pair: Vec<XmlElement<'_>> = case.children().collect();
            if case.name() != TAG_CASE || pair.len() != 2 {
                return Err(Error::InvalidArgument(format!(
                    "switch case takes a test and a value, got `{}` with {} elements",
                    case.name(),
                    pair.len()
                )));
            }
            let test = self.build_expression(doc, pair[0], base_path)?;
            let value = self.build_expression(doc, pair[1], base_path)?;
            cases.push((test, value));
        }
        let default = self.build_expression(doc, *default_node, base_path)?;
        Ok(Expression::Switch { cases, default })
    }
}

fn check_units(node: XmlElement<'_>, declared: Units) -> Result<(), Error> {
    if let Some(unit) = node.attribute(ATTR_UNIT) {
        if unit != declared.as_str() {
            return Err(Error::Validation(format!(
                "{}Parameter unit mismatch.\nExpected: {}\nGiven: {unit}",
                at_line(node),
                declared.as_str()
            )));
        }
    }
    Ok(())
}
