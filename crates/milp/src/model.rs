use std::fmt::{Display, Formatter};

use crate::{MilpError, MilpResult, lp_writer::LpWriter};

/// Handle to a variable of one [`Model`].
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct VarId(usize);

impl VarId {
    pub const fn index(self) -> usize {
        self.0
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum VarKind {
    Binary,
    Integer,
    Continuous,
}

impl VarKind {
    pub const fn is_integral(self) -> bool {
        matches!(self, Self::Binary | Self::Integer)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Variable {
    pub name: String,
    pub kind: VarKind,
    pub lower: f64,
    pub upper: f64,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Comparison {
    Eq,
    Le,
    Ge,
}

impl Display for Comparison {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let op = match self {
            Self::Eq => "=",
            Self::Le => "<=",
            Self::Ge => ">=",
        };
        f.write_str(op)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Sense {
    Minimize,
    Maximize,
}

impl Display for Sense {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Minimize => f.write_str("Minimize"),
            Self::Maximize => f.write_str("Maximize"),
        }
    }
}

/// Sparse linear expression `sum(coeff * var)`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LinearExpr {
    terms: Vec<(VarId, f64)>,
}

impl LinearExpr {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, var: VarId, coeff: f64) {
        self.terms.push((var, coeff));
    }

    pub fn with_term(mut self, var: VarId, coeff: f64) -> Self {
        self.add(var, coeff);
        self
    }

    pub fn terms(&self) -> &[(VarId, f64)] {
        &self.terms
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Evaluates the expression against a full assignment of variable values.
    pub fn evaluate(&self, values: &[f64]) -> f64 {
        self.terms
            .iter()
            .map(|(var, coeff)| coeff * values[var.index()])
            .sum()
    }
}

impl FromIterator<(VarId, f64)> for LinearExpr {
    fn from_iter<I: IntoIterator<Item = (VarId, f64)>>(iter: I) -> Self {
        Self {
            terms: iter.into_iter().collect(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Constraint {
    pub name: String,
    pub expr: LinearExpr,
    pub op: Comparison,
    pub rhs: f64,
}

impl Constraint {
    pub fn is_satisfied(&self, values: &[f64], tolerance: f64) -> bool {
        let lhs = self.expr.evaluate(values);
        match self.op {
            Comparison::Eq => (lhs - self.rhs).abs() <= tolerance,
            Comparison::Le => lhs <= self.rhs + tolerance,
            Comparison::Ge => lhs >= self.rhs - tolerance,
        }
    }
}

/// A mixed-integer linear program: variables, linear constraints and one
/// linear objective.
#[derive(Clone, Debug, PartialEq)]
pub struct Model {
    pub name: String,
    sense: Sense,
    objective: LinearExpr,
    variables: Vec<Variable>,
    constraints: Vec<Constraint>,
}

impl Model {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sense: Sense::Minimize,
            objective: LinearExpr::new(),
            variables: Vec::new(),
            constraints: Vec::new(),
        }
    }

    pub fn add_var(
        &mut self,
        name: impl Into<String>,
        kind: VarKind,
        lower: f64,
        upper: f64,
    ) -> VarId {
        let id = VarId(self.variables.len());
        self.variables.push(Variable {
            name: name.into(),
            kind,
            lower,
            upper,
        });
        id
    }

    pub fn add_binary(&mut self, name: impl Into<String>) -> VarId {
        self.add_var(name, VarKind::Binary, 0.0, 1.0)
    }

    pub fn add_continuous(&mut self, name: impl Into<String>, lower: f64, upper: f64) -> VarId {
        self.add_var(name, VarKind::Continuous, lower, upper)
    }

    pub fn add_constraint(
        &mut self,
        name: impl Into<String>,
        expr: LinearExpr,
        op: Comparison,
        rhs: f64,
    ) {
        self.constraints.push(Constraint {
            name: name.into(),
            expr,
            op,
            rhs,
        });
    }

    pub fn set_objective(&mut self, sense: Sense, expr: LinearExpr) {
        self.sense = sense;
        self.objective = expr;
    }

    pub fn minimize(&mut self, expr: LinearExpr) {
        self.set_objective(Sense::Minimize, expr);
    }

    pub fn maximize(&mut self, expr: LinearExpr) {
        self.set_objective(Sense::Maximize, expr);
    }

    pub fn sense(&self) -> Sense {
        self.sense
    }

    pub fn objective(&self) -> &LinearExpr {
        &self.objective
    }

    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    pub fn variable(&self, id: VarId) -> &Variable {
        &self.variables[id.index()]
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn num_vars(&self) -> usize {
        self.variables.len()
    }

    pub fn num_constraints(&self) -> usize {
        self.constraints.len()
    }

    pub fn num_integral(&self) -> usize {
        self.variables
            .iter()
            .filter(|v| v.kind.is_integral())
            .count()
    }

    /// Rejects models a backend cannot interpret: dangling variable ids,
    /// non-finite coefficients and empty or inverted bounds.
    pub fn validate(&self) -> MilpResult<()> {
        for var in &self.variables {
            if var.lower.is_nan() || var.upper.is_nan() || var.lower > var.upper {
                return Err(MilpError::invalid_model(format!(
                    "variable {} has invalid bounds [{}, {}]",
                    var.name, var.lower, var.upper
                )));
            }
        }

        self.validate_expr("objective", &self.objective)?;
        for constraint in &self.constraints {
            self.validate_expr(&constraint.name, &constraint.expr)?;
            if !constraint.rhs.is_finite() {
                return Err(MilpError::invalid_model(format!(
                    "constraint {} has non-finite right-hand side {}",
                    constraint.name, constraint.rhs
                )));
            }
        }

        Ok(())
    }

    /// Checks an assignment against bounds, integrality and every row.
    pub fn is_feasible(&self, values: &[f64], tolerance: f64) -> bool {
        if values.len() != self.variables.len() {
            return false;
        }

        let within_bounds = self.variables.iter().zip(values).all(|(var, &value)| {
            value >= var.lower - tolerance
                && value <= var.upper + tolerance
                && (!var.kind.is_integral() || (value - value.round()).abs() <= tolerance)
        });

        within_bounds
            && self
                .constraints
                .iter()
                .all(|c| c.is_satisfied(values, tolerance))
    }

    fn validate_expr(&self, label: &str, expr: &LinearExpr) -> MilpResult<()> {
        for (var, coeff) in expr.terms() {
            if var.index() >= self.variables.len() {
                return Err(MilpError::invalid_model(format!(
                    "{label} references unknown variable #{}",
                    var.index()
                )));
            }
            if !coeff.is_finite() {
                return Err(MilpError::invalid_model(format!(
                    "{label} has non-finite coefficient {coeff} on {}",
                    self.variable(*var).name
                )));
            }
        }
        Ok(())
    }

    fn named_terms<'m>(&'m self, expr: &LinearExpr) -> Vec<(f64, &'m str)> {
        expr.terms()
            .iter()
            .map(|(var, coeff)| (*coeff, self.variable(*var).name.as_str()))
            .collect()
    }
}

/// Renders the model in CPLEX LP format.
impl Display for Model {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut writer = LpWriter::new(f);

        writer.comment(format_args!("Problem name: {}", self.name))?;
        writer.line(self.sense)?;
        writer.labeled_terms("obj", &self.named_terms(&self.objective))?;
        writer.line("")?;

        writer.line("Subject To")?;
        for constraint in &self.constraints {
            writer.labeled_terms(&constraint.name, &self.named_terms(&constraint.expr))?;
            writer.line(format_args!(" {} {}", constraint.op, constraint.rhs))?;
        }

        writer.line("Bounds")?;
        for var in self.variables.iter().filter(|v| v.kind != VarKind::Binary) {
            if var.upper.is_infinite() {
                writer.line(format_args!(" {} >= {}", var.name, var.lower))?;
            } else {
                writer.line(format_args!(" {} <= {} <= {}", var.lower, var.name, var.upper))?;
            }
        }

        let names_of = |kind: VarKind| -> Vec<&str> {
            self.variables
                .iter()
                .filter(|v| v.kind == kind)
                .map(|v| v.name.as_str())
                .collect()
        };
        writer.names("Binaries", &names_of(VarKind::Binary))?;
        writer.names("Generals", &names_of(VarKind::Integer))?;

        writer.line("End")
    }
}
