//! Vendor-neutral MIP description
//!
//! The builder emits this representation; backend adapters translate it to
//! whatever their solver wants. The sense is always maximisation.

/// Handle of a variable within one model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VarId(pub usize);

/// Variable domain
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VarDomain {
    Binary,
    Continuous { min: f64, max: f64 },
}

/// One decision variable with its objective coefficient
#[derive(Debug, Clone)]
pub struct MipVar {
    pub name: String,
    pub domain: VarDomain,
    pub objective: f64,
}

/// Constraint comparison operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cmp {
    Le,
    Ge,
    Eq,
}

/// One linear constraint `Σ coef·var  cmp  rhs`
#[derive(Debug, Clone)]
pub struct MipConstraint {
    pub name: String,
    pub terms: Vec<(VarId, f64)>,
    pub cmp: Cmp,
    pub rhs: f64,
}

/// A maximisation MIP
#[derive(Debug, Clone, Default)]
pub struct MipModel {
    pub vars: Vec<MipVar>,
    pub constraints: Vec<MipConstraint>,
}

impl MipModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_var(
        &mut self,
        name: impl Into<String>,
        domain: VarDomain,
        objective: f64,
    ) -> VarId {
        self.vars.push(MipVar {
            name: name.into(),
            domain,
            objective,
        });
        VarId(self.vars.len() - 1)
    }

    pub fn add_constraint(
        &mut self,
        name: impl Into<String>,
        terms: Vec<(VarId, f64)>,
        cmp: Cmp,
        rhs: f64,
    ) {
        self.constraints.push(MipConstraint {
            name: name.into(),
            terms,
            cmp,
            rhs,
        });
    }

    pub fn num_vars(&self) -> usize {
        self.vars.len()
    }

    pub fn num_constraints(&self) -> usize {
        self.constraints.len()
    }

    /// Objective value of a full variable assignment
    pub fn evaluate_objective(&self, values: &[f64]) -> f64 {
        self.vars
            .iter()
            .zip(values)
            .map(|(var, value)| var.objective * value)
            .sum()
    }

    /// Checks a full assignment against every constraint, returning the
    /// names of violated ones (used by tests and the stub backend)
    pub fn violated_constraints(&self, values: &[f64], tolerance: f64) -> Vec<&str> {
        self.constraints
            .iter()
            .filter(|c| {
                let lhs: f64 = c.terms.iter().map(|(v, coef)| coef * values[v.0]).sum();
                match c.cmp {
                    Cmp::Le => lhs > c.rhs + tolerance,
                    Cmp::Ge => lhs < c.rhs - tolerance,
                    Cmp::Eq => (lhs - c.rhs).abs() > tolerance,
                }
            })
            .map(|c| c.name.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_construction_and_evaluation() {
        let mut model = MipModel::new();
        let x = model.add_var("x", VarDomain::Binary, 3.0);
        let y = model.add_var(
            "y",
            VarDomain::Continuous {
                min: 0.0,
                max: 10.0,
            },
            -1.0,
        );
        model.add_constraint("cap", vec![(x, 1.0), (y, 1.0)], Cmp::Le, 5.0);

        assert_eq!(model.num_vars(), 2);
        assert_eq!(model.evaluate_objective(&[1.0, 2.0]), 1.0);
        assert!(model.violated_constraints(&[1.0, 2.0], 1e-9).is_empty());
        assert_eq!(
            model.violated_constraints(&[1.0, 5.0], 1e-9),
            vec!["cap"]
        );
    }
}
